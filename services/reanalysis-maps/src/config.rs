//! Pipeline configuration.
//!
//! Loaded from a YAML file; every field has a default, so a missing file
//! or a partial one is fine. A few paths and the station URL can be
//! overridden from the environment (a `.env` file is honoured by the
//! binary).

use std::path::{Path, PathBuf};

use analysis::{ColumnNames, KMeansConfig, DEFAULT_ENCODING};
use grib_reader::Selector;
use projection::ProjectionKind;
use renderer::{half_open_levels, Colormap, LegendPlacement, MapStyle, RenderResult};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{PipelineError, PipelineResult};

pub const ENV_GRIB_PATH: &str = "REANALYSIS_GRIB_PATH";
pub const ENV_CLUSTER_PATH: &str = "REANALYSIS_CLUSTER_PATH";
pub const ENV_OUTPUT_DIR: &str = "REANALYSIS_OUTPUT_DIR";
pub const ENV_STATION_URL: &str = "REANALYSIS_STATION_URL";

/// Top-level pipeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Directory receiving the images; created when absent
    pub output_dir: PathBuf,
    pub figure: FigureConfig,
    pub grib: GribConfig,
    /// Line-contour map of the whole field
    pub global_map: MapConfig,
    /// Filled-contour map, also the base of the station map
    pub regional_map: MapConfig,
    pub stations: StationConfig,
    pub clusters: ClusterConfig,
    pub kmeans: KMeansConfig,
    /// Optional GeoJSON coastline file drawn on every map
    pub coastlines: Option<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("output"),
            figure: FigureConfig::default(),
            grib: GribConfig::default(),
            global_map: MapConfig {
                projection: ProjectionKind::plate_carree(),
                extent: None,
                levels: None,
                colormap: Colormap::Rainbow,
            },
            regional_map: MapConfig {
                projection: ProjectionKind::lambert_conformal(),
                extent: Some(JAPAN_EXTENT),
                levels: Some(LevelRange::default()),
                colormap: Colormap::Rainbow,
            },
            stations: StationConfig::default(),
            clusters: ClusterConfig::default(),
            kmeans: KMeansConfig::default(),
            coastlines: None,
        }
    }
}

/// Longitude and latitude bounds [west, east, south, north] of the
/// regional maps.
pub const JAPAN_EXTENT: [f64; 4] = [120.0, 150.0, 20.0, 50.0];

/// Image size and type scale, in pixels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FigureConfig {
    pub width: u32,
    pub height: u32,
    pub font_size: f32,
    /// Inline contour labels
    pub label_font_size: f32,
    /// Fallback font files tried after the embedded face, in order; the
    /// ones that do not exist are skipped
    pub fonts: Vec<PathBuf>,
}

/// Japanese gothic faces at their usual install locations.
pub const DEFAULT_FONT_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/opentype/ipaexfont-gothic/ipaexg.ttf",
    "/usr/share/fonts/truetype/fonts-japanese-gothic.ttf",
    "/usr/share/fonts/opentype/noto/NotoSansCJK-Regular.ttc",
    "/usr/share/fonts/noto-cjk/NotoSansCJK-Regular.ttc",
    "/usr/share/fonts/google-noto-cjk/NotoSansCJK-Regular.ttc",
    "/System/Library/Fonts/ヒラギノ角ゴシック W3.ttc",
    "C:\\Windows\\Fonts\\msgothic.ttc",
];

impl Default for FigureConfig {
    fn default() -> Self {
        // 20 x 15 inches at 100 dpi, 18 pt text and 14 pt labels
        Self {
            width: 2000,
            height: 1500,
            font_size: 25.0,
            label_font_size: 19.0,
            fonts: DEFAULT_FONT_CANDIDATES.iter().map(PathBuf::from).collect(),
        }
    }
}

impl FigureConfig {
    /// Map style scaled to this figure.
    pub fn map_style(&self) -> MapStyle {
        let scale = self.font_size / 25.0;
        let defaults = MapStyle::default();
        MapStyle {
            font_size: self.font_size,
            label_font_size: self.label_font_size,
            label_spacing: defaults.label_spacing * scale,
            margins: renderer::Margins {
                left: defaults.margins.left * scale,
                top: defaults.margins.top * scale,
                right: defaults.margins.right * scale,
                bottom: defaults.margins.bottom * scale,
            },
            ..defaults
        }
    }

    /// Scatter marker diameter for a matplotlib marker area in points².
    pub fn marker_size(&self, area_pt2: f32) -> f32 {
        area_pt2.sqrt() * self.font_size / 18.0
    }
}

/// GRIB input and record selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GribConfig {
    pub path: PathBuf,
    /// Variable short or long name; exclusive with `level`
    pub variable: Option<String>,
    /// Pressure level in hPa; exclusive with `variable`
    pub level: Option<f64>,
}

impl Default for GribConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./anl_p125_hgt.2012011012"),
            variable: None,
            level: Some(850.0),
        }
    }
}

impl GribConfig {
    pub fn selector(&self) -> PipelineResult<Selector> {
        match (&self.variable, self.level) {
            (Some(_), Some(_)) => Err(PipelineError::Config(
                "grib.variable and grib.level are mutually exclusive".to_string(),
            )),
            (Some(name), None) => Ok(Selector::Name(name.clone())),
            (None, Some(level)) => Ok(Selector::Level(level)),
            (None, None) => Ok(Selector::All),
        }
    }
}

/// Half-open level range `[start, stop)` with a fixed step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LevelRange {
    pub start: f64,
    pub stop: f64,
    pub step: f64,
}

impl Default for LevelRange {
    fn default() -> Self {
        Self {
            start: 1200.0,
            stop: 1600.0,
            step: 50.0,
        }
    }
}

impl LevelRange {
    pub fn values(&self) -> RenderResult<Vec<f64>> {
        half_open_levels(self.start, self.stop, self.step)
    }
}

/// One map: projection, visible extent and contour levels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapConfig {
    pub projection: ProjectionKind,
    /// [west, east, south, north] in degrees; the whole globe when absent
    #[serde(default)]
    pub extent: Option<[f64; 4]>,
    /// Fixed levels; chosen from the data range when absent
    #[serde(default)]
    pub levels: Option<LevelRange>,
    #[serde(default)]
    pub colormap: Colormap,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StationConfig {
    pub url: String,
    pub lon_column: String,
    pub lat_column: String,
    /// Station name column; rows keep no name when absent
    pub name_column: Option<String>,
    /// Categories drawn at random for each station
    pub labels: Vec<String>,
    pub legend_title: String,
    /// Fixed seed for the label draw; OS entropy when absent
    pub label_seed: Option<u64>,
    pub colormap: Colormap,
    pub timeout_secs: u64,
}

impl Default for StationConfig {
    fn default() -> Self {
        Self {
            url: "https://www.geekpage.jp/web/livedoor-weather-hacks/latlng.php".to_string(),
            lon_column: "経度(lng)".to_string(),
            lat_column: "緯度(lat)".to_string(),
            name_column: Some("地点".to_string()),
            labels: vec!["晴れ".to_string(), "曇り".to_string(), "雨".to_string()],
            legend_title: "天気".to_string(),
            label_seed: None,
            colormap: Colormap::Rainbow,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    pub path: PathBuf,
    /// WHATWG encoding label of the CSV file
    pub encoding: String,
    pub columns: ColumnNames,
    pub extent: [f64; 4],
    pub colormap: Colormap,
    /// Legend position on the PCA chart
    pub pca_legend: LegendPlacement,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("cluster_data.csv"),
            encoding: DEFAULT_ENCODING.to_string(),
            columns: ColumnNames::default(),
            extent: JAPAN_EXTENT,
            colormap: Colormap::RainbowR,
            pca_legend: LegendPlacement::OutsideRight,
        }
    }
}

impl PipelineConfig {
    /// Read `path` when it exists, otherwise start from the defaults, then
    /// apply environment overrides and validate.
    pub fn load(path: Option<&Path>) -> PipelineResult<Self> {
        let mut config = match path {
            Some(path) if path.exists() => Self::from_yaml_file(path)?,
            Some(path) => {
                warn!(path = %path.display(), "Config file not found, using defaults");
                Self::default()
            }
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_file(path: &Path) -> PipelineResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::Config(format!("Failed to read config from {:?}: {}", path, e))
        })?;
        let config = Self::from_yaml(&content)
            .map_err(|e| PipelineError::Config(format!("{:?}: {}", path, e)))?;
        info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    pub fn from_yaml(content: &str) -> PipelineResult<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content)
            .map_err(|e| PipelineError::Config(format!("Failed to parse config YAML: {}", e)))
    }

    /// Override inputs and outputs from variables returned by `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(path) = non_empty(ENV_GRIB_PATH) {
            self.grib.path = PathBuf::from(path);
        }
        if let Some(path) = non_empty(ENV_CLUSTER_PATH) {
            self.clusters.path = PathBuf::from(path);
        }
        if let Some(dir) = non_empty(ENV_OUTPUT_DIR) {
            self.output_dir = PathBuf::from(dir);
        }
        if let Some(url) = non_empty(ENV_STATION_URL) {
            self.stations.url = url;
        }
    }

    pub fn validate(&self) -> PipelineResult<()> {
        self.grib.selector()?;

        if self.figure.width == 0 || self.figure.height == 0 {
            return Err(PipelineError::Config(format!(
                "figure size must be positive, got {}x{}",
                self.figure.width, self.figure.height
            )));
        }
        if !(self.figure.font_size > 0.0 && self.figure.label_font_size > 0.0) {
            return Err(PipelineError::Config(
                "font sizes must be positive".to_string(),
            ));
        }

        for (name, map) in [
            ("global_map", &self.global_map),
            ("regional_map", &self.regional_map),
        ] {
            if let Some(extent) = map.extent {
                validate_extent(name, extent)?;
            }
            if let Some(levels) = map.levels {
                levels
                    .values()
                    .map_err(|e| PipelineError::Config(format!("{}.levels: {}", name, e)))?;
            }
        }
        validate_extent("clusters", self.clusters.extent)?;

        if self.stations.labels.is_empty() {
            return Err(PipelineError::Config(
                "stations.labels must not be empty".to_string(),
            ));
        }
        if self.stations.url.trim().is_empty() {
            return Err(PipelineError::Config("stations.url is empty".to_string()));
        }

        self.kmeans
            .validate()
            .map_err(|e| PipelineError::Config(format!("kmeans: {}", e)))?;
        Ok(())
    }
}

fn validate_extent(name: &str, [west, east, south, north]: [f64; 4]) -> PipelineResult<()> {
    let finite = [west, east, south, north].iter().all(|v| v.is_finite());
    if !finite || west >= east || south >= north || south < -90.0 || north > 90.0 {
        return Err(PipelineError::Config(format!(
            "{}.extent must be [west, east, south, north] with west < east and south < north, got {:?}",
            name,
            [west, east, south, north]
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_match_script_constants() {
        let config = PipelineConfig::default();
        assert_eq!(config.grib.selector().unwrap(), Selector::Level(850.0));
        assert_eq!((config.figure.width, config.figure.height), (2000, 1500));
        assert_eq!(config.kmeans.n_clusters, 6);
        assert_eq!(config.kmeans.seed, 42);
        assert_eq!(config.regional_map.extent, Some(JAPAN_EXTENT));
        assert_eq!(config.clusters.encoding, "shift_jis");
        assert_eq!(config.stations.labels.len(), 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_levels_exclude_stop() {
        let levels = LevelRange::default().values().unwrap();
        assert_eq!(levels.len(), 8);
        assert_eq!(levels.last().copied(), Some(1550.0));
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config = PipelineConfig::from_yaml(
            r#"
output_dir: /tmp/maps
grib:
  path: data/hgt.grib
kmeans:
  n_clusters: 4
regional_map:
  projection:
    kind: plate_carree
  levels: { start: 1000, stop: 2000, step: 100 }
"#,
        )
        .unwrap();
        assert_eq!(config.output_dir, PathBuf::from("/tmp/maps"));
        assert_eq!(config.grib.level, Some(850.0));
        assert_eq!(config.kmeans.n_clusters, 4);
        assert_eq!(config.kmeans.seed, 42);
        assert_eq!(config.regional_map.projection, ProjectionKind::plate_carree());
        assert_eq!(config.regional_map.extent, None);
        assert_eq!(config.regional_map.levels.unwrap().values().unwrap().len(), 10);
    }

    #[test]
    fn test_empty_yaml_is_default() {
        let config = PipelineConfig::from_yaml("  \n").unwrap();
        assert_eq!(config.output_dir, PathBuf::from("output"));
    }

    #[test]
    fn test_name_and_level_conflict() {
        let mut config = PipelineConfig::default();
        config.grib.variable = Some("HGT".to_string());
        assert!(matches!(config.validate(), Err(PipelineError::Config(_))));

        config.grib.level = None;
        assert_eq!(
            config.grib.selector().unwrap(),
            Selector::Name("HGT".to_string())
        );
    }

    #[test]
    fn test_invalid_settings_rejected() {
        let mut config = PipelineConfig::default();
        config.stations.labels.clear();
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::default();
        config.regional_map.levels = Some(LevelRange {
            start: 1200.0,
            stop: 1600.0,
            step: 0.0,
        });
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::default();
        config.kmeans.n_clusters = 0;
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::default();
        config.figure.width = 0;
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::default();
        config.clusters.extent = [150.0, 120.0, 20.0, 50.0];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            (ENV_GRIB_PATH, "/data/anl.grib"),
            (ENV_OUTPUT_DIR, "/tmp/out"),
            (ENV_STATION_URL, ""),
        ]
        .into_iter()
        .collect();
        let mut config = PipelineConfig::default();
        config.apply_env(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.grib.path, PathBuf::from("/data/anl.grib"));
        assert_eq!(config.output_dir, PathBuf::from("/tmp/out"));
        // Empty values are ignored
        assert_eq!(config.stations.url, StationConfig::default().url);
        assert_eq!(config.clusters.path, PathBuf::from("cluster_data.csv"));
    }

    #[test]
    fn test_missing_config_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = PipelineConfig::load(Some(&dir.path().join("absent.yaml"))).unwrap();
        assert_eq!(config.kmeans.seed, 42);
    }

    #[test]
    fn test_marker_size_scales_with_font() {
        let figure = FigureConfig::default();
        let small = FigureConfig {
            font_size: 12.5,
            ..FigureConfig::default()
        };
        assert!((figure.marker_size(100.0) - 2.0 * small.marker_size(100.0)).abs() < 1e-4);
    }
}
