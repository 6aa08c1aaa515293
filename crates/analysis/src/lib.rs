//! Tabular analysis for the station climatology table.
//!
//! - [`table`]: encoded CSV loading, typed column access, feature slicing
//! - [`kmeans`]: seeded k-means with k-means++ initialisation
//! - [`pca`]: principal components of the feature matrix

pub mod error;
pub mod kmeans;
pub mod pca;
pub mod table;

pub use error::{AnalysisError, AnalysisResult};
pub use kmeans::{KMeansConfig, KMeansModel};
pub use pca::{pca_rows, Pca, PcaRow};
pub use table::{ClusterPoint, ClusterTable, ColumnNames};

/// Default text encoding of the cluster table.
pub const DEFAULT_ENCODING: &str = "shift_jis";
