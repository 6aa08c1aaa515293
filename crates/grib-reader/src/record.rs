//! Decoded GRIB records: metadata, grid geometry and packed payload.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::fmt;

use crate::error::{GribError, GribResult};
use crate::tables::{LevelKind, Parameter};
use crate::unpacking::unpack_simple;

/// Scanning mode flag: points of a row run westward (-i).
pub const SCAN_I_NEGATIVE: u8 = 0x80;
/// Scanning mode flag: rows run northward (+j).
pub const SCAN_J_POSITIVE: u8 = 0x40;
/// Scanning mode flag: adjacent points are consecutive in j (column-major).
pub const SCAN_J_CONSECUTIVE: u8 = 0x20;

/// Regular latitude/longitude grid geometry, in degrees.
#[derive(Debug, Clone, PartialEq)]
pub struct LatLonGrid {
    /// Points along a parallel (columns)
    pub ni: usize,
    /// Points along a meridian (rows)
    pub nj: usize,
    pub first_lat: f64,
    pub first_lon: f64,
    pub last_lat: f64,
    pub last_lon: f64,
    pub lon_increment: f64,
    pub lat_increment: f64,
    pub scanning_mode: u8,
}

impl LatLonGrid {
    pub fn num_points(&self) -> usize {
        self.ni * self.nj
    }

    /// Latitude of each row, in storage order.
    pub fn latitudes(&self) -> Vec<f64> {
        if self.nj == 1 {
            return vec![self.first_lat];
        }
        let span = self.last_lat - self.first_lat;
        if span.abs() < 1e-9 {
            let step = if self.scanning_mode & SCAN_J_POSITIVE != 0 {
                self.lat_increment
            } else {
                -self.lat_increment
            };
            return (0..self.nj)
                .map(|j| self.first_lat + step * j as f64)
                .collect();
        }
        let step = span / (self.nj - 1) as f64;
        (0..self.nj).map(|j| self.first_lat + step * j as f64).collect()
    }

    /// Longitude of each column, in storage order.
    ///
    /// The last longitude is unwrapped across the 0/360 seam so the sequence
    /// is monotonic in the scanning direction.
    pub fn longitudes(&self) -> Vec<f64> {
        if self.ni == 1 {
            return vec![self.first_lon];
        }
        let westward = self.scanning_mode & SCAN_I_NEGATIVE != 0;
        let mut last = self.last_lon;
        if !westward && last < self.first_lon {
            last += 360.0;
        } else if westward && last > self.first_lon {
            last -= 360.0;
        }
        let step = (last - self.first_lon) / (self.ni - 1) as f64;
        (0..self.ni).map(|i| self.first_lon + step * i as f64).collect()
    }

    /// Whether rows are stored from north to south.
    pub fn rows_north_to_south(&self) -> bool {
        let lats = self.latitudes();
        match (lats.first(), lats.last()) {
            (Some(first), Some(last)) if lats.len() > 1 => first > last,
            _ => false,
        }
    }

    /// Two grids describe the same mesh.
    pub fn same_mesh(&self, other: &LatLonGrid) -> bool {
        const EPS: f64 = 1e-6;
        self.ni == other.ni
            && self.nj == other.nj
            && (self.first_lat - other.first_lat).abs() < EPS
            && (self.first_lon - other.first_lon).abs() < EPS
            && (self.last_lat - other.last_lat).abs() < EPS
            && (self.last_lon - other.last_lon).abs() < EPS
    }

    pub(crate) fn validate(&self, section: u8) -> GribResult<()> {
        if self.ni == 0 || self.nj == 0 {
            return Err(GribError::InvalidSection {
                section,
                reason: format!("Empty grid {}x{}", self.ni, self.nj),
            });
        }
        if self.scanning_mode & SCAN_J_CONSECUTIVE != 0 {
            return Err(GribError::Unsupported(
                "j-consecutive (column-major) scanning".to_string(),
            ));
        }
        Ok(())
    }
}

/// Simple-packing parameters and raw payload of one field.
#[derive(Debug, Clone)]
pub struct PackedField {
    pub reference_value: f64,
    pub binary_scale_factor: i16,
    pub decimal_scale_factor: i16,
    pub bits_per_value: u8,
    /// One bit per grid point, set when the point carries a value.
    pub bitmap: Option<Bytes>,
    pub data: Bytes,
}

/// Searchable metadata of a record.
#[derive(Debug, Clone)]
pub struct RecordInfo {
    /// 1-based position of the record in the file
    pub message_number: usize,
    pub edition: u8,
    pub parameter: Parameter,
    pub level_kind: LevelKind,
    /// Level value; hPa for isobaric surfaces
    pub level: f64,
    pub reference_time: DateTime<Utc>,
    /// Forecast time in the record's time unit (hours for reanalysis)
    pub forecast_time: u32,
}

impl fmt::Display for RecordInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{} ({}):regular_ll:{}:level {}:fcst time {} hrs:from {}",
            self.message_number,
            self.parameter.long_name,
            self.parameter.units,
            self.parameter.short_name,
            self.level_kind,
            self.level,
            self.forecast_time,
            self.reference_time.format("%Y%m%d%H%M"),
        )
    }
}

/// One decoded GRIB field. Values are unpacked on demand.
#[derive(Debug, Clone)]
pub struct GribRecord {
    pub info: RecordInfo,
    pub grid: LatLonGrid,
    pub packed: PackedField,
}

impl GribRecord {
    /// Unpack the field in storage order (rows in scanning order, each row
    /// in scanning order). Missing points are NaN.
    pub fn values(&self) -> GribResult<Vec<f32>> {
        let values = unpack_simple(&self.packed, self.grid.num_points())?;
        tracing::debug!(
            message = self.info.message_number,
            param = %self.info.parameter.short_name,
            points = values.len(),
            "Unpacked record"
        );
        Ok(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jra55_grid() -> LatLonGrid {
        LatLonGrid {
            ni: 288,
            nj: 145,
            first_lat: 90.0,
            first_lon: 0.0,
            last_lat: -90.0,
            last_lon: 358.75,
            lon_increment: 1.25,
            lat_increment: 1.25,
            scanning_mode: 0,
        }
    }

    #[test]
    fn test_latitudes_follow_scan_order() {
        let grid = jra55_grid();
        let lats = grid.latitudes();
        assert_eq!(lats.len(), 145);
        assert_eq!(lats[0], 90.0);
        assert!((lats[1] - 88.75).abs() < 1e-9);
        assert_eq!(lats[144], -90.0);
        assert!(grid.rows_north_to_south());
    }

    #[test]
    fn test_longitudes_unwrap_across_seam() {
        let grid = LatLonGrid {
            ni: 5,
            nj: 2,
            first_lat: 10.0,
            first_lon: 350.0,
            last_lat: 0.0,
            last_lon: 10.0,
            lon_increment: 5.0,
            lat_increment: 10.0,
            scanning_mode: 0,
        };
        assert_eq!(grid.longitudes(), vec![350.0, 355.0, 360.0, 365.0, 370.0]);
    }

    #[test]
    fn test_column_major_scanning_is_rejected() {
        let mut grid = jra55_grid();
        grid.scanning_mode = SCAN_J_CONSECUTIVE;
        assert!(matches!(grid.validate(3), Err(GribError::Unsupported(_))));
    }
}
