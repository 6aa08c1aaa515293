//! GRIB reader for regular latitude/longitude reanalysis products.
//!
//! Decodes edition 1 (JRA-55 `anl_p125`) and edition 2 messages with
//! simple packing, and stacks selected records into a [`GridCube`] whose
//! rows run south to north.
//!
//! ```ignore
//! use grib_reader::{read_grid_cube, Selector};
//!
//! let cube = read_grid_cube("anl_p125.007_hgt.2012011012", &Selector::Level(850.0))?;
//! let (records, ny, nx) = cube.shape();
//! ```

pub mod cube;
pub mod edition1;
pub mod error;
pub mod file;
mod octets;
pub mod record;
pub mod sections;
pub mod tables;
pub mod unpacking;

pub use cube::{inventory, read_grid_cube, select, GridCube, Selector};
pub use error::{GribError, GribResult};
pub use file::GribFile;
pub use record::{GribRecord, LatLonGrid, PackedField, RecordInfo};
pub use tables::{LevelKind, Parameter};
