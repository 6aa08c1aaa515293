//! End-to-end runs over synthetic inputs.

use std::fs;
use std::path::{Path, PathBuf};

use reanalysis_maps::config::FigureConfig;
use reanalysis_maps::{Pipeline, PipelineConfig, PipelineError};
use test_utils::{
    cluster_csv, height_field, shift_jis, workspace_root, Grib1Builder, TestMesh,
    COASTLINE_GEOJSON, STATION_COMPLETE_ROWS, STATION_HTML,
};

const PNG_SIGNATURE: [u8; 8] = [137, 80, 78, 71, 13, 10, 26, 10];

struct Inputs {
    _dir: tempfile::TempDir,
    config: PipelineConfig,
}

fn write(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, bytes).unwrap();
    path
}

fn inputs() -> Inputs {
    let dir = tempfile::tempdir().unwrap();
    let mesh = TestMesh::JAPAN_NORTH_FIRST;
    let grib = Grib1Builder::jra55_hgt()
        .with_values(height_field(&mesh, 1000.0))
        .build();

    let mut config = PipelineConfig::default();
    config.output_dir = dir.path().join("output");
    config.grib.path = write(dir.path(), "anl_p125_hgt.2012011012", &grib);
    config.clusters.path = write(dir.path(), "cluster_data.csv", &shift_jis(&cluster_csv()));
    config.coastlines = Some(write(
        dir.path(),
        "coast.geojson",
        COASTLINE_GEOJSON.as_bytes(),
    ));
    config.stations.label_seed = Some(11);
    config.figure = FigureConfig {
        width: 640,
        height: 480,
        font_size: 12.5,
        label_font_size: 10.0,
        fonts: Vec::new(),
    };

    Inputs { _dir: dir, config }
}

fn assert_png(path: &Path) {
    let bytes = fs::read(path).unwrap_or_else(|e| panic!("{:?}: {}", path, e));
    assert_eq!(&bytes[..8], &PNG_SIGNATURE, "{:?} is not a PNG", path);
}

#[test]
fn test_full_run_writes_six_images() {
    let inputs = inputs();
    let pipeline = Pipeline::new(inputs.config.clone()).unwrap();
    let summary = pipeline.run_with_page(STATION_HTML).unwrap();

    let names: Vec<String> = summary
        .images
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(
        names,
        vec![
            "jra55_contour.png",
            "jra55_contourf.png",
            "weather_sample.png",
            "cluster_r.png",
            "cluster_py.png",
            "pca.png",
        ]
    );
    for image in &summary.images {
        assert!(image.starts_with(&inputs.config.output_dir));
        assert_png(image);
    }

    assert_eq!(summary.grid_shape, (4, 5));
    assert_eq!(summary.stations, STATION_COMPLETE_ROWS);
    assert_eq!(summary.cluster_rows, 12);
    assert_eq!(summary.explained_variance_ratio.len(), 2);
    assert!(summary.inertia >= 0.0);
}

#[test]
fn test_field_rows_run_south_to_north() {
    let inputs = inputs();
    let pipeline = Pipeline::new(inputs.config).unwrap();
    let field = pipeline.load_field().unwrap();

    assert_eq!((field.nx, field.ny), (5, 4));
    assert_eq!(field.lats[0], 20.0);
    assert_eq!(field.lats[field.nx * (field.ny - 1)], 50.0);
    assert!((field.values[0] - 1200.0).abs() < 0.01);
}

#[test]
fn test_cluster_stage_is_deterministic() {
    let inputs = inputs();
    fs::create_dir_all(&inputs.config.output_dir).unwrap();
    let pipeline = Pipeline::new(inputs.config).unwrap();

    let first = pipeline.run_cluster_analysis().unwrap();
    let second = pipeline.run_cluster_analysis().unwrap();

    assert_eq!(first.labels, second.labels);
    assert_eq!(first.labels.len(), 12);
    assert!(first.labels.iter().all(|&l| l < 6));
    assert_eq!(first.images.len(), 3);
}

#[test]
fn test_missing_grib_is_missing_input() {
    let mut inputs = inputs();
    inputs.config.grib.path = inputs.config.output_dir.join("absent.grib");
    let pipeline = Pipeline::new(inputs.config).unwrap();

    match pipeline.run_with_page(STATION_HTML) {
        Err(PipelineError::MissingInput { path, .. }) => {
            assert!(path.ends_with("absent.grib"));
        }
        other => panic!("expected MissingInput, got {:?}", other),
    }
}

#[test]
fn test_failure_keeps_earlier_images() {
    let mut inputs = inputs();
    let output = inputs.config.output_dir.clone();
    inputs.config.clusters.path = output.join("no_clusters.csv");
    let pipeline = Pipeline::new(inputs.config).unwrap();

    let err = pipeline.run_with_page(STATION_HTML).unwrap_err();
    assert!(matches!(err, PipelineError::MissingInput { .. }));
    assert!(!err.is_retryable());

    assert_png(&output.join("jra55_contour.png"));
    assert_png(&output.join("jra55_contourf.png"));
    assert_png(&output.join("weather_sample.png"));
    assert!(!output.join("cluster_r.png").exists());
}

#[test]
fn test_page_without_table_is_station_error() {
    let inputs = inputs();
    let pipeline = Pipeline::new(inputs.config).unwrap();
    assert!(matches!(
        pipeline.run_with_page("<html><body>gone</body></html>"),
        Err(PipelineError::Station(_))
    ));
}

#[test]
fn test_missing_coastline_file_is_rejected() {
    let mut inputs = inputs();
    inputs.config.coastlines = Some(PathBuf::from("/nonexistent/coast.geojson"));
    assert!(matches!(
        Pipeline::new(inputs.config),
        Err(PipelineError::MissingInput { .. })
    ));
}

#[test]
fn test_shipped_config_parses() {
    let path = workspace_root().join("config/reanalysis-maps.yaml");
    let config = PipelineConfig::from_yaml_file(&path).unwrap();
    config.validate().unwrap();

    let defaults = PipelineConfig::default();
    assert_eq!(config.grib, defaults.grib);
    assert_eq!(config.regional_map, defaults.regional_map);
    assert_eq!(config.global_map, defaults.global_map);
    assert_eq!(config.stations, defaults.stations);
    assert_eq!(config.clusters, defaults.clusters);
    assert_eq!(config.kmeans, defaults.kmeans);
    assert_eq!(config.figure, defaults.figure);
}
