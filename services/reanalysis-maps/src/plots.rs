//! The six images of a run.

use std::path::Path;

use analysis::{ClusterPoint, PcaRow};
use renderer::{
    nice_levels, ChartPoint, ChartStyle, Coastlines, Color, Legend, LegendItem, LegendPlacement,
    MapCanvas, MapStyle, Marker, MarkerShape, RenderError, ScalarField, ScatterChart,
};
use tracing::debug;

use crate::config::{ClusterConfig, FigureConfig, MapConfig, StationConfig};
use crate::error::PipelineResult;
use crate::stations::Station;

pub const CONTOUR_FILE: &str = "jra55_contour.png";
pub const CONTOURF_FILE: &str = "jra55_contourf.png";
pub const STATION_FILE: &str = "weather_sample.png";
pub const CLUSTER_FILE: &str = "cluster_r.png";
pub const CLUSTER_PY_FILE: &str = "cluster_py.png";
pub const PCA_FILE: &str = "pca.png";

/// Marker areas in points², as in the scatter plots being reproduced.
const STATION_MARKER_AREA: f32 = 36.0;
const CLUSTER_MARKER_AREA: f32 = 100.0;

/// Edge colour of style-only legend entries.
const STYLE_LEGEND_COLOR: Color = Color::rgb(51, 51, 51);

/// Configured levels, or about eight nice levels over the data range.
pub fn contour_levels(map: &MapConfig, field: &ScalarField) -> PipelineResult<Vec<f64>> {
    if let Some(range) = map.levels {
        return Ok(range.values()?);
    }
    let (lo, hi) = field
        .value_range()
        .ok_or_else(|| RenderError::InvalidLevels("field has no valid values".to_string()))?;
    let levels = nice_levels(lo as f64, hi as f64, 8);
    if levels.is_empty() {
        return Err(RenderError::InvalidLevels(format!(
            "no contour levels between {} and {}",
            lo, hi
        ))
        .into());
    }
    Ok(levels)
}

fn new_map(
    map: &MapConfig,
    figure: &FigureConfig,
    style: MapStyle,
) -> PipelineResult<MapCanvas> {
    Ok(MapCanvas::new(
        figure.width,
        figure.height,
        map.projection.build()?,
        map.extent,
        style,
    )?)
}

fn draw_base(canvas: &mut MapCanvas, coastlines: Option<&Coastlines>) {
    if let Some(coastlines) = coastlines {
        let drawn = canvas.draw_coastlines(coastlines);
        debug!(lines = drawn, "Drew coastlines");
    }
    canvas.draw_gridlines();
}

/// Land sits under every other layer of the reanalysis maps.
fn draw_land(canvas: &mut MapCanvas, coastlines: Option<&Coastlines>) {
    if let Some(coastlines) = coastlines {
        let filled = canvas.fill_land(coastlines);
        debug!(polygons = filled, "Filled land");
    }
}

/// Labelled line contours of the field.
pub fn contour_map(
    field: &ScalarField,
    map: &MapConfig,
    figure: &FigureConfig,
    coastlines: Option<&Coastlines>,
    path: &Path,
) -> PipelineResult<()> {
    let levels = contour_levels(map, field)?;
    let mut canvas = new_map(map, figure, figure.map_style())?;
    draw_land(&mut canvas, coastlines);
    draw_base(&mut canvas, coastlines);
    let lines = canvas.draw_contour_lines(field, &levels, map.colormap, true)?;
    debug!(levels = levels.len(), lines, "Drew contour map");
    canvas.save_png(path)?;
    Ok(())
}

/// Filled bands, extended at both ends, with a colour bar.
pub fn filled_contour_map(
    field: &ScalarField,
    map: &MapConfig,
    figure: &FigureConfig,
    coastlines: Option<&Coastlines>,
    path: &Path,
) -> PipelineResult<()> {
    let levels = contour_levels(map, field)?;
    let mut canvas = new_map(map, figure, figure.map_style())?;
    draw_land(&mut canvas, coastlines);
    let colors = canvas.draw_filled_contours(field, &levels, map.colormap)?;
    draw_base(&mut canvas, coastlines);
    canvas.draw_colorbar(&levels, &colors);
    canvas.save_png(path)?;
    Ok(())
}

/// Stations coloured by label over line contours.
pub fn station_map(
    field: &ScalarField,
    stations: &[Station],
    map: &MapConfig,
    config: &StationConfig,
    figure: &FigureConfig,
    coastlines: Option<&Coastlines>,
    path: &Path,
) -> PipelineResult<usize> {
    let levels = contour_levels(map, field)?;
    let mut canvas = new_map(map, figure, figure.map_style())?;
    draw_land(&mut canvas, coastlines);
    draw_base(&mut canvas, coastlines);
    canvas.draw_contour_lines(field, &levels, map.colormap, true)?;

    // Legend order is first appearance, as seaborn does for string hues
    let mut order: Vec<&str> = Vec::new();
    for station in stations {
        if !order.contains(&station.label.as_str()) {
            order.push(&station.label);
        }
    }
    let palette = config.colormap.categorical(order.len());
    let color_of = |label: &str| {
        order
            .iter()
            .position(|l| *l == label)
            .map(|i| palette[i])
            .unwrap_or(Color::BLACK)
    };

    let size = figure.marker_size(STATION_MARKER_AREA);
    let markers: Vec<Marker> = stations
        .iter()
        .map(|s| Marker {
            lon: s.lon,
            lat: s.lat,
            color: color_of(&s.label),
            shape: MarkerShape::Circle,
            size,
        })
        .collect();
    let drawn = canvas.draw_markers(&markers);

    if !order.is_empty() {
        let mut items = vec![LegendItem::Title(config.legend_title.clone())];
        items.extend(order.iter().map(|label| LegendItem::Entry {
            label: label.to_string(),
            color: color_of(label),
            shape: MarkerShape::Circle,
        }));
        canvas.draw_legend(
            &Legend {
                items,
                font_size: figure.font_size,
                marker_size: size,
            },
            LegendPlacement::UpperRight,
        );
    }

    canvas.save_png(path)?;
    Ok(drawn)
}

fn sorted_distinct(values: impl Iterator<Item = i64>) -> Vec<i64> {
    let mut values: Vec<i64> = values.collect();
    values.sort_unstable();
    values.dedup();
    values
}

/// Cluster points over a Plate Carrée map: colour by `hue_title` values,
/// shape by the flag levels (first circle, second triangle).
pub fn cluster_map(
    points: &[ClusterPoint],
    hue_title: &str,
    style_title: &str,
    flag_levels: &[i64],
    config: &ClusterConfig,
    figure: &FigureConfig,
    coastlines: Option<&Coastlines>,
    path: &Path,
) -> PipelineResult<usize> {
    let style = MapStyle {
        gridline_color: None,
        ..figure.map_style()
    };
    let map = MapConfig {
        projection: projection::ProjectionKind::plate_carree(),
        extent: Some(config.extent),
        levels: None,
        colormap: config.colormap,
    };
    let mut canvas = new_map(&map, figure, style)?;
    draw_base(&mut canvas, coastlines);

    let hues = sorted_distinct(points.iter().map(|p| p.hue));
    let palette = config.colormap.categorical(hues.len());
    let hue_color = |hue: i64| {
        hues.binary_search(&hue)
            .map(|i| palette[i])
            .unwrap_or(Color::BLACK)
    };
    let shape_of = |flag: i64| {
        flag_levels
            .iter()
            .position(|&f| f == flag)
            .map(MarkerShape::nth)
            .unwrap_or_default()
    };

    let size = figure.marker_size(CLUSTER_MARKER_AREA);
    let markers: Vec<Marker> = points
        .iter()
        .map(|p| Marker {
            lon: p.lon,
            lat: p.lat,
            color: hue_color(p.hue),
            shape: shape_of(p.style),
            size,
        })
        .collect();
    let drawn = canvas.draw_markers(&markers);

    let mut items = vec![LegendItem::Title(hue_title.to_string())];
    items.extend(hues.iter().map(|&hue| LegendItem::Entry {
        label: hue.to_string(),
        color: hue_color(hue),
        shape: MarkerShape::Circle,
    }));
    items.push(LegendItem::Title(style_title.to_string()));
    items.extend(flag_levels.iter().enumerate().map(|(i, flag)| LegendItem::Entry {
        label: flag.to_string(),
        color: STYLE_LEGEND_COLOR,
        shape: MarkerShape::nth(i),
    }));
    canvas.draw_legend(
        &Legend {
            items,
            font_size: figure.font_size,
            marker_size: size,
        },
        LegendPlacement::UpperRight,
    );

    canvas.save_png(path)?;
    Ok(drawn)
}

/// First two principal components coloured by cluster.
pub fn pca_chart(
    rows: &[PcaRow],
    config: &ClusterConfig,
    figure: &FigureConfig,
    path: &Path,
) -> PipelineResult<usize> {
    let coords: Vec<(f64, f64)> = rows.iter().map(|r| (r.first, r.second)).collect();
    let scale = figure.font_size / 25.0;
    let defaults = ChartStyle::default();
    let style = ChartStyle {
        font_size: figure.font_size,
        margins: renderer::Margins {
            left: defaults.margins.left * scale,
            top: defaults.margins.top * scale,
            right: defaults.margins.right * scale,
            bottom: defaults.margins.bottom * scale,
        },
        ..defaults
    };
    let mut chart = ScatterChart::for_points(figure.width, figure.height, &coords, style)?;
    chart.draw_axes("1st", "2nd");

    let clusters = sorted_distinct(rows.iter().map(|r| r.cluster as i64));
    let palette = config.colormap.categorical(clusters.len());
    let color_of = |cluster: usize| {
        clusters
            .binary_search(&(cluster as i64))
            .map(|i| palette[i])
            .unwrap_or(Color::BLACK)
    };

    let points: Vec<ChartPoint> = rows
        .iter()
        .map(|r| ChartPoint {
            x: r.first,
            y: r.second,
            color: color_of(r.cluster),
            shape: MarkerShape::Circle,
        })
        .collect();
    let size = figure.marker_size(STATION_MARKER_AREA);
    let drawn = chart.draw_points(&points, size);

    let mut items = vec![LegendItem::Title("cluster".to_string())];
    items.extend(clusters.iter().map(|&c| LegendItem::Entry {
        label: c.to_string(),
        color: color_of(c as usize),
        shape: MarkerShape::Circle,
    }));
    chart.draw_legend(
        &Legend {
            items,
            font_size: figure.font_size,
            marker_size: size,
        },
        config.pca_legend,
    );

    chart.save_png(path)?;
    Ok(drawn)
}
