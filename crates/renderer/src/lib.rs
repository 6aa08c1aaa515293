//! Raster rendering for gridded fields and scatter data.
//!
//! - Contour lines (marching squares) with inline labels
//! - Filled contour bands with extended ends and a colour bar
//! - Scatter markers, legends, gridlines and coastlines on projected maps
//! - Cartesian scatter charts
//! - PNG encoding (indexed when the palette fits)

pub mod canvas;
pub mod chart;
pub mod coastline;
pub mod colormap;
pub mod contour;
pub mod draw;
pub mod error;
pub mod field;
pub mod png;
pub mod text;

pub use canvas::{MapCanvas, MapStyle, Marker, GLOBAL_EXTENT};
pub use chart::{ChartPoint, ChartStyle, ScatterChart};
pub use coastline::Coastlines;
pub use colormap::{BandColors, Color, Colormap};
pub use contour::{half_open_levels, nice_levels};
pub use draw::{Legend, LegendItem, LegendPlacement, Margins, MarkerShape};
pub use error::{RenderError, RenderResult};
pub use field::ScalarField;
pub use text::{fonts, install_fonts, FontSet};
