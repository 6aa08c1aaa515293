//! Tests for contour level generation and isoline tracing.

use renderer::contour::{
    classify, connect_segments, format_label, generate_contour_levels, half_open_levels,
    march_squares, nice_levels, smooth_contour, trace_contours, Band, Contour, Point,
};
use test_utils::{create_constant_grid, create_grid_with_nans, create_height_gradient, create_hill_grid};

// ============================================================================
// level generation
// ============================================================================

#[test]
fn test_generate_contour_levels_negative_range() {
    let levels = generate_contour_levels(-20.0, 20.0, 10.0);
    assert_eq!(levels, vec![-20.0, -10.0, 0.0, 10.0, 20.0]);
}

#[test]
fn test_generate_contour_levels_fractional_interval() {
    let levels = generate_contour_levels(0.0, 1.0, 0.25);
    assert_eq!(levels.len(), 5);
    assert!((levels[4] - 1.0).abs() < 1e-9);
}

#[test]
fn test_generate_contour_levels_invalid_input() {
    assert!(generate_contour_levels(0.0, 100.0, 0.0).is_empty());
    assert!(generate_contour_levels(100.0, 0.0, 10.0).is_empty());
}

#[test]
fn test_filled_levels_default_range() {
    let levels = half_open_levels(1200.0, 1600.0, 50.0).unwrap();
    assert_eq!(levels.len(), 8);
    assert_eq!(levels[0], 1200.0);
    assert_eq!(levels[7], 1550.0);
    assert!(levels.iter().all(|&l| l < 1600.0));
}

#[test]
fn test_nice_levels_steps() {
    // Range 0..10 with about eight levels steps by 2
    assert_eq!(nice_levels(0.0, 10.0, 8), vec![0.0, 2.0, 4.0, 6.0, 8.0, 10.0]);
    // Range 0..1 with about four levels steps by 0.25
    let quarter = nice_levels(0.0, 1.0, 4);
    assert_eq!(quarter.len(), 5);
    assert!((quarter[1] - 0.25).abs() < 1e-12);
}

#[test]
fn test_band_classification_every_level() {
    let levels = half_open_levels(1200.0, 1600.0, 50.0).unwrap();
    assert_eq!(classify(1199.9, &levels), Some(Band::Under));
    for (i, &level) in levels[..7].iter().enumerate() {
        assert_eq!(classify((level + 10.0) as f32, &levels), Some(Band::Interior(i)));
    }
    assert_eq!(classify(1550.0, &levels), Some(Band::Over));
    assert_eq!(classify(1700.0, &levels), Some(Band::Over));
}

#[test]
fn test_labels_one_decimal_place() {
    for level in [1200.0, 1250.0, 1587.25, 0.04] {
        let label = format_label(level);
        let decimals = label.split('.').nth(1).map(str::len);
        assert_eq!(decimals, Some(1), "label {} for {}", label, level);
    }
}

// ============================================================================
// tracing
// ============================================================================

#[test]
fn test_constant_field_has_no_contours() {
    let data = create_constant_grid(10, 10, 1500.0);
    assert!(trace_contours(&data, 10, 10, &[1400.0, 1500.0, 1600.0], 0).is_empty());
}

#[test]
fn test_gradient_gives_one_line_per_level() {
    let data = create_height_gradient(12, 9);
    let levels = [1250.0, 1400.0, 1550.0];
    let contours = trace_contours(&data, 12, 9, &levels, 0);
    assert_eq!(contours.len(), 3);
    for contour in &contours {
        assert!(!contour.closed);
        // Spans every column
        assert_eq!(contour.points.len(), 12);
    }
}

#[test]
fn test_hill_gives_closed_rings() {
    let data = create_hill_grid(21, 21, 0.0, 100.0);
    let contours = trace_contours(&data, 21, 21, &[50.0], 0);
    assert_eq!(contours.len(), 1);
    assert!(contours[0].closed);
}

#[test]
fn test_missing_cells_break_lines() {
    let mut data = create_height_gradient(9, 5);
    let holes = create_grid_with_nans(9, 5, &[(4, 2)]);
    for (v, h) in data.iter_mut().zip(&holes) {
        if h.is_nan() {
            *v = f32::NAN;
        }
    }
    let contours = trace_contours(&data, 9, 5, &[1400.0], 0);
    // The line through row 2 splits around the hole
    assert_eq!(contours.len(), 2);
}

#[test]
fn test_march_squares_wrong_length() {
    assert!(march_squares(&[0.0; 5], 3, 2, 0.5).is_empty());
}

#[test]
fn test_connect_empty() {
    assert!(connect_segments(Vec::new()).is_empty());
}

#[test]
fn test_smoothing_keeps_open_endpoints() {
    let contour = Contour {
        level: 1.0,
        points: vec![Point::new(0.0, 0.0), Point::new(1.0, 1.0), Point::new(2.0, 0.0)],
        closed: false,
    };
    let smooth = smooth_contour(&contour, 2);
    assert_eq!(smooth.points.first(), contour.points.first());
    assert_eq!(smooth.points.last(), contour.points.last());
    assert!(smooth.points.len() > contour.points.len());
}
