//! Record selection and the stacked data cube handed to renderers.

use std::fmt;
use std::path::Path;
use tracing::info;

use crate::error::{GribError, GribResult};
use crate::file::GribFile;
use crate::record::{GribRecord, RecordInfo};

/// Which records to load: by variable name, by level value, or all of them.
#[derive(Debug, Clone, PartialEq)]
pub enum Selector {
    All,
    /// Short name (`HGT`) or long name (`Geopotential height`), any case
    Name(String),
    /// Level value; hPa for pressure surfaces
    Level(f64),
}

impl Selector {
    pub fn matches(&self, info: &RecordInfo) -> bool {
        match self {
            Selector::All => true,
            Selector::Name(name) => {
                info.parameter.short_name.eq_ignore_ascii_case(name)
                    || info.parameter.long_name.eq_ignore_ascii_case(name)
            }
            Selector::Level(level) => (info.level - level).abs() < 1e-6,
        }
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::All => write!(f, "all records"),
            Selector::Name(name) => write!(f, "name={}", name),
            Selector::Level(level) => write!(f, "level={}", level),
        }
    }
}

/// Records matching the selector, in file order. Empty when none match.
pub fn select<'a>(records: &'a [GribRecord], selector: &Selector) -> Vec<&'a GribRecord> {
    records
        .iter()
        .filter(|record| selector.matches(&record.info))
        .collect()
}

/// Coordinate grids, level values and a (record, y, x) data cube.
///
/// Rows are ordered south to north: `lats[0..nx]` is the southernmost row.
#[derive(Debug, Clone)]
pub struct GridCube {
    pub nx: usize,
    pub ny: usize,
    /// Longitude of each point, row-major (ny * nx)
    pub lons: Vec<f64>,
    /// Latitude of each point, row-major (ny * nx), ascending by row
    pub lats: Vec<f64>,
    /// Level value of each record
    pub levels: Vec<f32>,
    /// Record-major values (n_records * ny * nx), NaN where missing
    pub data: Vec<f32>,
}

impl GridCube {
    /// Stack the selected records. All records must share the first record's mesh.
    pub fn from_records(records: &[&GribRecord]) -> GribResult<Self> {
        let first = records
            .first()
            .ok_or_else(|| GribError::NoMatchingRecords("empty record list".to_string()))?;
        let grid = &first.grid;
        let (nx, ny) = (grid.ni, grid.nj);
        let flip = grid.rows_north_to_south();

        let mut row_lats = grid.latitudes();
        if flip {
            row_lats.reverse();
        }
        let col_lons = grid.longitudes();

        let mut lons = Vec::with_capacity(nx * ny);
        let mut lats = Vec::with_capacity(nx * ny);
        for &lat in &row_lats {
            for &lon in &col_lons {
                lons.push(lon);
                lats.push(lat);
            }
        }

        let mut levels = Vec::with_capacity(records.len());
        let mut data = Vec::with_capacity(records.len() * nx * ny);

        for record in records {
            if !record.grid.same_mesh(grid) {
                return Err(GribError::GridMismatch(format!(
                    "record {} is {}x{}, expected {}x{}",
                    record.info.message_number, record.grid.ni, record.grid.nj, nx, ny
                )));
            }
            let values = record.values()?;
            if values.len() != nx * ny {
                return Err(GribError::GridMismatch(format!(
                    "record {} unpacked {} values for a {}x{} grid",
                    record.info.message_number,
                    values.len(),
                    nx,
                    ny
                )));
            }

            if flip {
                for row in values.chunks_exact(nx).rev() {
                    data.extend_from_slice(row);
                }
            } else {
                data.extend_from_slice(&values);
            }
            levels.push(record.info.level as f32);
        }

        Ok(Self {
            nx,
            ny,
            lons,
            lats,
            levels,
            data,
        })
    }

    pub fn record_count(&self) -> usize {
        self.levels.len()
    }

    /// (records, rows, columns)
    pub fn shape(&self) -> (usize, usize, usize) {
        (self.record_count(), self.ny, self.nx)
    }

    /// One 2-D field, row-major.
    pub fn slice(&self, record: usize) -> Option<&[f32]> {
        let size = self.nx * self.ny;
        let start = record.checked_mul(size)?;
        self.data.get(start..start + size)
    }

    /// Index of the first record at `level`.
    pub fn level_index(&self, level: f32) -> Option<usize> {
        self.levels.iter().position(|l| (l - level).abs() < 1e-3)
    }

    /// Latitude of each row.
    pub fn row_latitudes(&self) -> Vec<f64> {
        self.lats.iter().step_by(self.nx.max(1)).copied().collect()
    }
}

/// Open a file and build the cube for the selected records.
///
/// Fails when the file cannot be read or decoded, or when nothing matches.
pub fn read_grid_cube<P: AsRef<Path>>(path: P, selector: &Selector) -> GribResult<GridCube> {
    let path = path.as_ref();
    let file = GribFile::open(path)?;
    let records = file.records()?;
    let selected = select(&records, selector);

    if selected.is_empty() {
        return Err(GribError::NoMatchingRecords(format!(
            "{} in {}",
            selector,
            path.display()
        )));
    }

    let cube = GridCube::from_records(&selected)?;
    info!(
        path = %path.display(),
        selector = %selector,
        records = cube.record_count(),
        nx = cube.nx,
        ny = cube.ny,
        "Loaded grid cube"
    );
    Ok(cube)
}

/// Metadata of every record in the file, for listing.
pub fn inventory<P: AsRef<Path>>(path: P) -> GribResult<Vec<(RecordInfo, usize, usize)>> {
    let records = GribFile::open(path)?.records()?;
    Ok(records
        .into_iter()
        .map(|record| (record.info, record.grid.ni, record.grid.nj))
        .collect())
}
