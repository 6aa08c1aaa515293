//! GRIB edition 1 decoding (WMO FM 92 GRIB Edition 1).
//!
//! Layout: indicator (8 octets), product definition section (PDS),
//! optional grid description (GDS), optional bitmap (BMS), binary data
//! (BDS), `7777`. JRA-55 pressure-level analyses use this edition with a
//! regular lat/lon GDS and simple packing.

use bytes::Bytes;
use chrono::{DateTime, NaiveDate, Utc};

use crate::error::{GribError, GribResult};
use crate::octets::{ibm_f32_at, signed16_at, signed24_at, u16_at, u24_at};
use crate::record::{GribRecord, LatLonGrid, PackedField, RecordInfo};
use crate::tables::{grib1_parameter, LevelKind};

const PDS_HAS_GDS: u8 = 0x80;
const PDS_HAS_BMS: u8 = 0x40;
const BDS_SPHERICAL_HARMONICS: u8 = 0x80;
const BDS_COMPLEX_PACKING: u8 = 0x40;

/// Product definition section of an edition 1 message.
#[derive(Debug, Clone)]
pub struct ProductDefinition {
    pub table_version: u8,
    pub center: u8,
    pub has_grid_description: bool,
    pub has_bitmap: bool,
    pub parameter_number: u8,
    pub level_kind: LevelKind,
    pub level_value: f64,
    pub reference_time: DateTime<Utc>,
    pub forecast_time: u32,
    pub decimal_scale_factor: i16,
}

/// Decode one edition 1 message into a record.
pub fn decode_message(message: &Bytes, message_number: usize) -> GribResult<GribRecord> {
    if message.len() < 8 || &message[0..4] != b"GRIB" || message[7] != 1 {
        return Err(GribError::InvalidFormat(
            "Not a GRIB edition 1 message".to_string(),
        ));
    }

    let mut offset = 8;
    let pds = section_at(message, offset, 1, 28)?;
    let product = parse_product_definition(&pds)?;
    offset += pds.len();

    if !product.has_grid_description {
        return Err(GribError::Unsupported(
            "GRIB1 message without grid description (catalogued grid)".to_string(),
        ));
    }
    let gds = section_at(message, offset, 2, 32)?;
    let grid = parse_grid_description(&gds)?;
    offset += gds.len();

    let bitmap = if product.has_bitmap {
        let bms = section_at(message, offset, 3, 6)?;
        offset += bms.len();
        if u16_at(&bms, 4) != 0 {
            return Err(GribError::Unsupported("predefined GRIB1 bitmap".to_string()));
        }
        Some(bms.slice(6..))
    } else {
        None
    };

    let bds = section_at(message, offset, 4, 11)?;
    let flags = bds[3];
    if flags & BDS_SPHERICAL_HARMONICS != 0 {
        return Err(GribError::Unsupported("spherical harmonic coefficients".to_string()));
    }
    if flags & BDS_COMPLEX_PACKING != 0 {
        return Err(GribError::Unsupported("GRIB1 second-order packing".to_string()));
    }

    tracing::debug!(
        message = message_number,
        parameter = product.parameter_number,
        level = product.level_value,
        ni = grid.ni,
        nj = grid.nj,
        "Decoded GRIB1 headers"
    );

    Ok(GribRecord {
        info: RecordInfo {
            message_number,
            edition: 1,
            parameter: grib1_parameter(product.table_version, product.parameter_number),
            level_kind: product.level_kind,
            level: product.level_value,
            reference_time: product.reference_time,
            forecast_time: product.forecast_time,
        },
        grid,
        packed: PackedField {
            reference_value: ibm_f32_at(&bds, 6),
            binary_scale_factor: signed16_at(&bds, 4),
            decimal_scale_factor: product.decimal_scale_factor,
            bits_per_value: bds[10],
            bitmap,
            data: bds.slice(11..),
        },
    })
}

/// Slice a section whose length is stored in its first three octets.
fn section_at(message: &Bytes, offset: usize, section: u8, min_len: usize) -> GribResult<Bytes> {
    if offset + 3 > message.len() {
        return Err(GribError::InvalidSection {
            section,
            reason: "Section starts past end of message".to_string(),
        });
    }
    let length = u24_at(message, offset) as usize;
    if length < min_len || offset + length > message.len() {
        return Err(GribError::InvalidSection {
            section,
            reason: format!("Invalid section length {}", length),
        });
    }
    Ok(message.slice(offset..offset + length))
}

/// Parse the product definition section.
pub fn parse_product_definition(pds: &[u8]) -> GribResult<ProductDefinition> {
    if pds.len() < 28 {
        return Err(GribError::InvalidSection {
            section: 1,
            reason: "Not enough data".to_string(),
        });
    }

    let flags = pds[7];
    let level_type = pds[9];
    let level_kind = LevelKind::from_grib1(level_type);

    // Layer types pack top and bottom into octets 11 and 12
    let level_value = match level_type {
        101 | 104 | 106 | 108 | 110 | 112 | 114 | 116 | 120 | 121 | 128 | 141 => pds[10] as f64,
        _ => u16_at(pds, 10) as f64,
    };

    let century = pds[24] as i32;
    let year_of_century = pds[12] as i32;
    let year = if century == 0 {
        1900 + year_of_century
    } else {
        (century - 1) * 100 + year_of_century
    };
    let (month, day, hour, minute) = (pds[13], pds[14], pds[15], pds[16]);

    let reference_time = NaiveDate::from_ymd_opt(year, month as u32, day as u32)
        .and_then(|date| date.and_hms_opt(hour as u32, minute as u32, 0))
        .ok_or_else(|| GribError::InvalidSection {
            section: 1,
            reason: format!(
                "Invalid date: {}-{:02}-{:02} {:02}:{:02}",
                year, month, day, hour, minute
            ),
        })?;

    Ok(ProductDefinition {
        table_version: pds[3],
        center: pds[4],
        has_grid_description: flags & PDS_HAS_GDS != 0,
        has_bitmap: flags & PDS_HAS_BMS != 0,
        parameter_number: pds[8],
        level_kind,
        level_value,
        reference_time: DateTime::<Utc>::from_naive_utc_and_offset(reference_time, Utc),
        forecast_time: pds[18] as u32,
        decimal_scale_factor: signed16_at(pds, 26),
    })
}

/// Parse a grid description section. Only data representation type 0
/// (regular latitude/longitude) is supported.
pub fn parse_grid_description(gds: &[u8]) -> GribResult<LatLonGrid> {
    let representation = gds[5];
    if representation != 0 {
        return Err(GribError::Unsupported(format!(
            "GRIB1 data representation type {}",
            representation
        )));
    }

    // Angles in millidegrees; increments of 0xFFFF are "not given"
    let increment = |raw: u16| {
        if raw == u16::MAX {
            0.0
        } else {
            raw as f64 / 1000.0
        }
    };

    let grid = LatLonGrid {
        ni: u16_at(gds, 6) as usize,
        nj: u16_at(gds, 8) as usize,
        first_lat: signed24_at(gds, 10) as f64 / 1000.0,
        first_lon: signed24_at(gds, 13) as f64 / 1000.0,
        last_lat: signed24_at(gds, 17) as f64 / 1000.0,
        last_lon: signed24_at(gds, 20) as f64 / 1000.0,
        lon_increment: increment(u16_at(gds, 23)),
        lat_increment: increment(u16_at(gds, 25)),
        scanning_mode: gds[27],
    };
    grid.validate(2)?;
    Ok(grid)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jra55_pds() -> Vec<u8> {
        let mut pds = vec![0u8; 28];
        pds[0..3].copy_from_slice(&[0, 0, 28]);
        pds[3] = 200; // JMA local table
        pds[4] = 34; // Tokyo
        pds[7] = PDS_HAS_GDS;
        pds[8] = 7; // HGT
        pds[9] = 100; // isobaric
        pds[10..12].copy_from_slice(&850u16.to_be_bytes());
        pds[12] = 12; // 2012
        pds[13] = 1;
        pds[14] = 10;
        pds[15] = 12;
        pds[24] = 21;
        pds
    }

    #[test]
    fn test_pds_level_and_time() {
        let product = parse_product_definition(&jra55_pds()).unwrap();
        assert_eq!(product.level_kind, LevelKind::Isobaric);
        assert_eq!(product.level_value, 850.0);
        assert_eq!(
            product.reference_time.format("%Y%m%d%H").to_string(),
            "2012011012"
        );
        assert!(product.has_grid_description);
        assert!(!product.has_bitmap);
    }

    #[test]
    fn test_negative_decimal_scale() {
        let mut pds = jra55_pds();
        pds[26..28].copy_from_slice(&[0x80, 0x01]);
        assert_eq!(parse_product_definition(&pds).unwrap().decimal_scale_factor, -1);
    }

    #[test]
    fn test_gaussian_grid_is_unsupported() {
        let mut gds = vec![0u8; 32];
        gds[5] = 4;
        assert!(matches!(
            parse_grid_description(&gds),
            Err(GribError::Unsupported(_))
        ));
    }
}
