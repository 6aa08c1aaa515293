//! End-to-end map and chart rendering to PNG files.

use projection::{LambertConformal, PlateCarree};
use renderer::{
    half_open_levels, Coastlines, Color, Colormap, Legend, LegendItem, LegendPlacement, MapCanvas,
    MapStyle, Margins, Marker, MarkerShape, ScalarField,
};
use test_utils::{extent, COASTLINE_GEOJSON};

const PNG_SIGNATURE: [u8; 8] = [137, 80, 78, 71, 13, 10, 26, 10];

/// Global 2.5 degree field, rows south to north, heights rising polewards
/// from 1200 to 1600 with a zonal wave.
fn global_field() -> ScalarField {
    let (nx, ny) = (144, 73);
    let mut lons = Vec::with_capacity(nx * ny);
    let mut lats = Vec::with_capacity(nx * ny);
    let mut values = Vec::with_capacity(nx * ny);
    for j in 0..ny {
        let lat = -90.0 + 2.5 * j as f64;
        for i in 0..nx {
            let lon = 2.5 * i as f64;
            lons.push(lon);
            lats.push(lat);
            let wave = 30.0 * (3.0 * lon.to_radians()).sin();
            values.push((1200.0 + 400.0 * lat.abs() / 90.0 + wave) as f32);
        }
    }
    ScalarField::new(nx, ny, lons, lats, values).unwrap()
}

fn compact_style() -> MapStyle {
    MapStyle {
        margins: Margins {
            left: 60.0,
            top: 30.0,
            right: 140.0,
            bottom: 50.0,
        },
        font_size: 14.0,
        label_font_size: 11.0,
        label_spacing: 200.0,
        ..MapStyle::default()
    }
}

fn read_png(path: &std::path::Path) -> Vec<u8> {
    let bytes = std::fs::read(path).unwrap();
    assert_eq!(&bytes[..8], &PNG_SIGNATURE);
    bytes
}

#[test]
fn test_global_contour_map() {
    let field = global_field();
    let mut canvas = MapCanvas::new(
        720,
        400,
        Box::new(PlateCarree::default()),
        None,
        compact_style(),
    )
    .unwrap();
    let coast = Coastlines::from_geojson(COASTLINE_GEOJSON).unwrap();
    assert_eq!(canvas.draw_coastlines(&coast), 2);

    let (lo, hi) = field.value_range().unwrap();
    let levels = renderer::nice_levels(lo as f64, hi as f64, 8);
    let drawn = canvas
        .draw_contour_lines(&field, &levels, Colormap::Rainbow, true)
        .unwrap();
    assert!(drawn >= levels.len());
    canvas.draw_gridlines();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("jra55_contour.png");
    canvas.save_png(&path).unwrap();
    read_png(&path);
}

#[test]
fn test_regional_filled_map_with_colorbar() {
    let field = global_field();
    let mut canvas = MapCanvas::new(
        600,
        450,
        Box::new(LambertConformal::conventional()),
        Some(extent::JAPAN),
        compact_style(),
    )
    .unwrap();
    let levels = half_open_levels(1200.0, 1600.0, 50.0).unwrap();
    let colors = canvas
        .draw_filled_contours(&field, &levels, Colormap::Rainbow)
        .unwrap();
    canvas.draw_gridlines();
    canvas.draw_colorbar(&levels, &colors);

    // The whole frame is covered: the global field has no gaps
    let frame = *canvas.frame();
    let rgba = canvas.to_rgba();
    let width = canvas.width() as usize;
    let (cx, cy) = (
        (frame.left + frame.width / 2.0) as usize,
        (frame.top + frame.height / 2.0) as usize,
    );
    let centre = &rgba[(cy * width + cx) * 4..(cy * width + cx) * 4 + 3];
    assert_ne!(centre, &[255, 255, 255]);

    // Colour bar sits right of the frame and uses the over colour at its top
    let bar_x = (frame.right() + 14.0 * 1.5 + 14.0 * 0.6) as usize;
    let bar_top_y = (frame.top + frame.height * 0.1 + frame.height * 0.8 * 0.05 + 2.0) as usize;
    let top_band = colors.interior[6];
    let px = &rgba[(bar_top_y * width + bar_x) * 4..(bar_top_y * width + bar_x) * 4 + 3];
    assert_eq!(px, &[top_band.r, top_band.g, top_band.b]);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("jra55_contourf.png");
    canvas.save_png(&path).unwrap();
    read_png(&path);
}

#[test]
fn test_station_style_overlay() {
    let field = global_field();
    let mut canvas = MapCanvas::new(
        600,
        450,
        Box::new(LambertConformal::conventional()),
        Some(extent::JAPAN),
        compact_style(),
    )
    .unwrap();
    let levels = half_open_levels(1200.0, 1600.0, 50.0).unwrap();
    canvas
        .draw_contour_lines(&field, &levels, Colormap::Rainbow, true)
        .unwrap();

    let palette = Colormap::Rainbow.categorical(3);
    let stations = [(141.35, 43.06), (139.69, 35.69), (135.50, 34.69), (127.68, 26.21)];
    let markers: Vec<Marker> = stations
        .iter()
        .enumerate()
        .map(|(i, &(lon, lat))| Marker {
            lon,
            lat,
            color: palette[i % 3],
            shape: MarkerShape::Circle,
            size: 10.0,
        })
        .collect();
    assert_eq!(canvas.draw_markers(&markers), 4);

    let legend = Legend {
        items: ["sunny", "cloudy", "rain"]
            .iter()
            .zip(&palette)
            .map(|(label, &color)| LegendItem::Entry {
                label: label.to_string(),
                color,
                shape: MarkerShape::Circle,
            })
            .collect(),
        font_size: 14.0,
        marker_size: 10.0,
    };
    canvas.draw_legend(&legend, LegendPlacement::OutsideRight);

    // Tokyo's marker colour shows at its projected position
    let (x, y) = canvas.to_pixel(139.69, 35.69).unwrap();
    let rgba = canvas.to_rgba();
    let idx = (y as usize * canvas.width() as usize + x as usize) * 4;
    let expected: Color = palette[1];
    assert_eq!(&rgba[idx..idx + 3], &[expected.r, expected.g, expected.b]);
}
