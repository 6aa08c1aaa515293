//! One run: GRIB maps, station overlay, cluster maps, k-means and PCA.

use std::path::{Path, PathBuf};
use std::time::Instant;

use analysis::{kmeans, pca_rows, ClusterTable, Pca};
use grib_reader::read_grid_cube;
use renderer::{install_fonts, Coastlines, FontSet, ScalarField};
use tracing::{debug, info, warn};

use crate::config::{FigureConfig, PipelineConfig};
use crate::error::{PipelineError, PipelineResult};
use crate::plots;
use crate::stations::{self, label_rng};

/// What a run produced.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    /// Images in the order they were written
    pub images: Vec<PathBuf>,
    pub grid_shape: (usize, usize),
    pub stations: usize,
    pub cluster_rows: usize,
    pub inertia: f64,
    pub explained_variance_ratio: Vec<f64>,
}

/// Outcome of the clustering stage.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterOutcome {
    pub images: Vec<PathBuf>,
    pub rows: usize,
    pub labels: Vec<usize>,
    pub inertia: f64,
    pub explained_variance_ratio: Vec<f64>,
}

pub struct Pipeline {
    config: PipelineConfig,
    coastlines: Option<Coastlines>,
}

impl Pipeline {
    /// Validate the configuration and load the optional coastlines.
    pub fn new(config: PipelineConfig) -> PipelineResult<Self> {
        config.validate()?;

        let fonts = load_fonts(&config.figure);
        let stations = &config.stations;
        let missing = fonts.missing_chars(&format!(
            "{}{}",
            stations.legend_title,
            stations.labels.concat()
        ));
        if !missing.is_empty() {
            warn!(
                missing = %missing.iter().collect::<String>(),
                "No configured font draws every station label, list a Japanese font under figure.fonts"
            );
        }
        if !install_fonts(fonts) {
            debug!("Fonts were installed earlier in this process");
        }

        let coastlines = match &config.coastlines {
            Some(path) => {
                require_input(path)?;
                let coastlines = Coastlines::load(path)?;
                info!(path = %path.display(), lines = coastlines.lines.len(), "Loaded coastlines");
                Some(coastlines)
            }
            None => {
                warn!("No coastline file configured, maps are drawn without coastlines");
                None
            }
        };
        Ok(Self { config, coastlines })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run every stage, fetching the station page over HTTP.
    pub async fn run(&self) -> PipelineResult<RunSummary> {
        let started = Instant::now();
        self.prepare_output()?;
        let field = self.load_field()?;
        let mut images = self.render_grid_maps(&field)?;

        let page = stations::fetch_page(&self.config.stations).await?;
        self.finish(started, &field, &page, &mut images)
    }

    /// Run every stage with an already fetched station page.
    pub fn run_with_page(&self, page: &str) -> PipelineResult<RunSummary> {
        let started = Instant::now();
        self.prepare_output()?;
        let field = self.load_field()?;
        let mut images = self.render_grid_maps(&field)?;
        self.finish(started, &field, page, &mut images)
    }

    fn finish(
        &self,
        started: Instant,
        field: &ScalarField,
        page: &str,
        images: &mut Vec<PathBuf>,
    ) -> PipelineResult<RunSummary> {
        let (path, stations) = self.render_station_map(field, page)?;
        images.push(path);

        let clusters = self.run_cluster_analysis()?;
        images.extend(clusters.images.iter().cloned());

        let summary = RunSummary {
            images: images.clone(),
            grid_shape: (field.ny, field.nx),
            stations,
            cluster_rows: clusters.rows,
            inertia: clusters.inertia,
            explained_variance_ratio: clusters.explained_variance_ratio,
        };
        info!(
            images = summary.images.len(),
            stations = summary.stations,
            rows = summary.cluster_rows,
            inertia = summary.inertia,
            explained_variance = ?summary.explained_variance_ratio,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Run completed"
        );
        Ok(summary)
    }

    fn output_path(&self, file: &str) -> PathBuf {
        self.config.output_dir.join(file)
    }

    fn prepare_output(&self) -> PipelineResult<()> {
        let dir = &self.config.output_dir;
        std::fs::create_dir_all(dir).map_err(|source| PipelineError::Output {
            path: dir.clone(),
            source,
        })
    }

    /// First selected record of the GRIB file as a plottable field.
    pub fn load_field(&self) -> PipelineResult<ScalarField> {
        let start = Instant::now();
        let grib = &self.config.grib;
        require_input(&grib.path)?;
        let selector = grib.selector()?;
        let cube = read_grid_cube(&grib.path, &selector)?;
        let values = cube
            .slice(0)
            .ok_or_else(|| {
                PipelineError::Grib(grib_reader::GribError::NoMatchingRecords(selector.to_string()))
            })?
            .to_vec();

        info!(
            path = %grib.path.display(),
            selector = %selector,
            records = cube.record_count(),
            level = cube.levels.first().copied().unwrap_or(f32::NAN),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Loaded GRIB field"
        );
        Ok(ScalarField::new(
            cube.nx,
            cube.ny,
            cube.lons,
            cube.lats,
            values,
        )?)
    }

    /// The global contour map and the regional filled-contour map.
    pub fn render_grid_maps(&self, field: &ScalarField) -> PipelineResult<Vec<PathBuf>> {
        let config = &self.config;
        let coast = self.coastlines.as_ref();

        let contour = self.output_path(plots::CONTOUR_FILE);
        plots::contour_map(field, &config.global_map, &config.figure, coast, &contour)?;
        info!(path = %contour.display(), "Wrote contour map");

        let filled = self.output_path(plots::CONTOURF_FILE);
        plots::filled_contour_map(field, &config.regional_map, &config.figure, coast, &filled)?;
        info!(path = %filled.display(), "Wrote filled contour map");

        Ok(vec![contour, filled])
    }

    /// Label the stations of `page` and draw them over the regional map.
    pub fn render_station_map(
        &self,
        field: &ScalarField,
        page: &str,
    ) -> PipelineResult<(PathBuf, usize)> {
        let config = &self.config;
        let mut rng = label_rng(config.stations.label_seed);
        let stations = stations::stations_from_html(page, &config.stations, &mut rng)?;
        info!(
            stations = stations.len(),
            seeded = config.stations.label_seed.is_some(),
            "Labelled stations"
        );

        let path = self.output_path(plots::STATION_FILE);
        let drawn = plots::station_map(
            field,
            &stations,
            &config.regional_map,
            &config.stations,
            &config.figure,
            self.coastlines.as_ref(),
            &path,
        )?;
        info!(path = %path.display(), markers = drawn, "Wrote station map");
        Ok((path, stations.len()))
    }

    /// Both cluster maps and the PCA chart.
    pub fn run_cluster_analysis(&self) -> PipelineResult<ClusterOutcome> {
        let config = &self.config.clusters;
        let columns = &config.columns;
        let figure = &self.config.figure;
        let coast = self.coastlines.as_ref();

        require_input(&config.path)?;
        let table = ClusterTable::load(&config.path, &config.encoding)?;
        let flags = table.flag_levels(&columns.flag)?;
        info!(path = %config.path.display(), rows = table.len(), "Loaded cluster table");

        let given = table.points(columns, &columns.cluster, &columns.flag)?;
        let cluster_r = self.output_path(plots::CLUSTER_FILE);
        plots::cluster_map(
            &given,
            &columns.cluster,
            &columns.flag,
            &flags,
            config,
            figure,
            coast,
            &cluster_r,
        )?;
        info!(path = %cluster_r.display(), "Wrote cluster map");

        let features = table.feature_matrix(&columns.first_feature, &columns.last_feature)?;
        let model = kmeans::fit(&features, &self.config.kmeans)?;
        info!(
            clusters = model.n_clusters(),
            inertia = model.inertia,
            iterations = model.iterations,
            sizes = ?model.cluster_sizes(),
            "Fitted k-means"
        );

        let labelled = table.with_column(&columns.computed_cluster, &model.labels)?;
        let computed = labelled.points(columns, &columns.computed_cluster, &columns.flag)?;
        let cluster_py = self.output_path(plots::CLUSTER_PY_FILE);
        plots::cluster_map(
            &computed,
            &columns.computed_cluster,
            &columns.flag,
            &flags,
            config,
            figure,
            coast,
            &cluster_py,
        )?;
        info!(path = %cluster_py.display(), "Wrote computed cluster map");

        let (pca, projected) = Pca::fit_transform(&features, 2)?;
        let rows = pca_rows(&projected, &model.labels)?;
        let pca_path = self.output_path(plots::PCA_FILE);
        plots::pca_chart(&rows, config, figure, &pca_path)?;
        info!(
            path = %pca_path.display(),
            explained_variance = ?pca.explained_variance_ratio,
            "Wrote PCA chart"
        );

        Ok(ClusterOutcome {
            images: vec![cluster_r, cluster_py, pca_path],
            rows: table.len(),
            labels: model.labels,
            inertia: model.inertia,
            explained_variance_ratio: pca.explained_variance_ratio,
        })
    }
}

/// The embedded face followed by the configured fallbacks found on disk.
/// Unreadable fallbacks are skipped with a warning.
pub fn load_fonts(figure: &FigureConfig) -> FontSet {
    let mut set = FontSet::embedded();
    for path in &figure.fonts {
        if !path.is_file() {
            debug!(path = %path.display(), "Font not installed, skipping");
            continue;
        }
        match set.add_file(path) {
            Ok(()) => info!(path = %path.display(), "Loaded fallback font"),
            Err(e) => warn!(error = %e, "Skipping unusable font"),
        }
    }
    set
}

fn require_input(path: &Path) -> PipelineResult<()> {
    if path.is_file() {
        Ok(())
    } else {
        Err(PipelineError::MissingInput {
            path: path.to_path_buf(),
            reason: "file not found".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_load_fonts_skips_absent_and_broken_files() {
        let dir = tempfile::tempdir().unwrap();
        let broken = dir.path().join("broken.ttf");
        std::fs::write(&broken, b"not a font").unwrap();

        let figure = FigureConfig {
            fonts: vec![PathBuf::from("/nonexistent/ipaexg.ttf"), broken],
            ..FigureConfig::default()
        };
        let set = load_fonts(&figure);
        assert_eq!(set.len(), 1);
        assert_eq!(set.missing_chars("晴れ"), vec!['晴', 'れ']);
    }

    #[test]
    fn test_missing_input_names_the_path() {
        match require_input(Path::new("/nonexistent/cluster_data.csv")) {
            Err(PipelineError::MissingInput { path, .. }) => {
                assert_eq!(path, PathBuf::from("/nonexistent/cluster_data.csv"));
            }
            other => panic!("expected MissingInput, got {:?}", other),
        }
    }
}
