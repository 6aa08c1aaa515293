//! Reanalysis map pipeline.
//!
//! Reads a geopotential height field from GRIB, draws contour and
//! filled-contour maps, overlays a scraped station table and a cluster
//! table, and charts k-means clusters in principal-component space.

pub mod config;
pub mod error;
pub mod pipeline;
pub mod plots;
pub mod stations;

pub use config::PipelineConfig;
pub use error::{PipelineError, PipelineResult};
pub use pipeline::{ClusterOutcome, Pipeline, RunSummary};
