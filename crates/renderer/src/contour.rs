//! Contour line (isoline) geometry using the marching squares algorithm.
//!
//! Contours are traced in grid-index space: `x` is the column, `y` the row
//! (row 0 southernmost). The map canvas maps vertices through the field's
//! coordinate grids and the projection afterwards.

use crate::error::{RenderError, RenderResult};

/// A point in 2D space (grid indices or pixels, depending on the stage)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    fn distance(&self, other: &Point) -> f32 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

/// A line segment between two points
#[derive(Debug, Clone)]
pub struct Segment {
    pub start: Point,
    pub end: Point,
}

/// A complete contour line (polyline)
#[derive(Debug, Clone)]
pub struct Contour {
    pub level: f64,
    pub points: Vec<Point>,
    pub closed: bool,
}

/// Levels from `start` up to but excluding `stop`, every `step`.
///
/// ```
/// use renderer::contour::half_open_levels;
///
/// let levels = half_open_levels(1200.0, 1600.0, 50.0).unwrap();
/// assert_eq!(levels.len(), 8);
/// assert_eq!(levels.last(), Some(&1550.0));
/// ```
pub fn half_open_levels(start: f64, stop: f64, step: f64) -> RenderResult<Vec<f64>> {
    if !(step > 0.0) || !step.is_finite() {
        return Err(RenderError::InvalidLevels(format!(
            "step must be positive, got {}",
            step
        )));
    }
    if !(stop > start) {
        return Err(RenderError::InvalidLevels(format!(
            "empty level range [{}, {})",
            start, stop
        )));
    }
    let count = ((stop - start) / step - 1e-9).ceil().max(0.0) as usize;
    Ok((0..count).map(|i| start + step * i as f64).collect())
}

/// Generate contour levels at multiples of `interval` inside the data range
pub fn generate_contour_levels(min_value: f64, max_value: f64, interval: f64) -> Vec<f64> {
    if interval <= 0.0 || max_value <= min_value {
        return vec![];
    }

    // Start from first multiple of interval at or above min_value
    let first = (min_value / interval).ceil() as i64;
    let last = (max_value / interval).floor() as i64;
    (first..=last).map(|k| k as f64 * interval).collect()
}

/// About `target` levels over the data range on a 1, 2, 2.5 or 5 times
/// 10^k step.
pub fn nice_levels(min_value: f64, max_value: f64, target: usize) -> Vec<f64> {
    if !min_value.is_finite() || !max_value.is_finite() || max_value <= min_value {
        return vec![];
    }
    let target = target.max(2) as f64;
    let raw = (max_value - min_value) / target;
    let magnitude = 10f64.powf(raw.log10().floor());
    let step = [1.0, 2.0, 2.5, 5.0, 10.0]
        .iter()
        .map(|m| m * magnitude)
        .find(|&s| s >= raw)
        .unwrap_or(10.0 * magnitude);
    generate_contour_levels(min_value, max_value, step)
}

/// Where a value falls relative to filled-contour levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Band {
    /// Below the first level
    Under,
    /// Between `levels[i]` and `levels[i + 1]`
    Interior(usize),
    /// At or above the last level
    Over,
}

/// Classify a value against ascending levels; `None` for NaN.
pub fn classify(value: f32, levels: &[f64]) -> Option<Band> {
    if value.is_nan() || levels.is_empty() {
        return None;
    }
    let v = value as f64;
    if v < levels[0] {
        return Some(Band::Under);
    }
    match levels.iter().rposition(|&l| v >= l) {
        Some(i) if i + 1 < levels.len() => Some(Band::Interior(i)),
        _ => Some(Band::Over),
    }
}

/// Inline label text, one decimal place.
pub fn format_label(level: f64) -> String {
    format!("{:.1}", level)
}

/// Marching squares algorithm to generate contour lines
///
/// # Arguments
/// * `data` - Grid data in row-major order
/// * `width` - Grid width
/// * `height` - Grid height
/// * `level` - Contour level to extract
///
/// # Returns
/// Vector of line segments representing the contour
pub fn march_squares(data: &[f32], width: usize, height: usize, level: f32) -> Vec<Segment> {
    if width < 2 || height < 2 || data.len() != width * height {
        return vec![];
    }

    let mut segments = Vec::new();

    for y in 0..(height - 1) {
        for x in 0..(width - 1) {
            let tl = data[y * width + x];
            let tr = data[y * width + x + 1];
            let bl = data[(y + 1) * width + x];
            let br = data[(y + 1) * width + x + 1];

            // Skip cells with missing values
            if tl.is_nan() || tr.is_nan() || bl.is_nan() || br.is_nan() {
                continue;
            }

            // Cell index (0-15) from which corners are at or above the level
            let mut cell_index = 0;
            if tl >= level {
                cell_index |= 1;
            }
            if tr >= level {
                cell_index |= 2;
            }
            if br >= level {
                cell_index |= 4;
            }
            if bl >= level {
                cell_index |= 8;
            }

            segments.extend(get_cell_segments(
                cell_index, x as f32, y as f32, tl, tr, br, bl, level,
            ));
        }
    }

    segments
}

/// Line segments for a marching squares cell, with edge crossings found by
/// linear interpolation
#[allow(clippy::too_many_arguments)]
fn get_cell_segments(
    cell_index: u8,
    x: f32,
    y: f32,
    tl: f32,
    tr: f32,
    br: f32,
    bl: f32,
    level: f32,
) -> Vec<Segment> {
    let top = interpolate_edge(x, y, x + 1.0, y, tl, tr, level);
    let right = interpolate_edge(x + 1.0, y, x + 1.0, y + 1.0, tr, br, level);
    let bottom = interpolate_edge(x, y + 1.0, x + 1.0, y + 1.0, bl, br, level);
    let left = interpolate_edge(x, y, x, y + 1.0, tl, bl, level);

    let seg = |start, end| Segment { start, end };
    match cell_index {
        0 | 15 => vec![],
        1 | 14 => vec![seg(left, top)],
        2 | 13 => vec![seg(top, right)],
        3 | 12 => vec![seg(left, right)],
        4 | 11 => vec![seg(right, bottom)],
        // Saddles: resolve by the cell centre value
        5 | 10 => {
            let centre = (tl + tr + br + bl) / 4.0;
            let centre_high = centre >= level;
            if (cell_index == 5) == centre_high {
                vec![seg(left, bottom), seg(top, right)]
            } else {
                vec![seg(left, top), seg(right, bottom)]
            }
        }
        6 | 9 => vec![seg(top, bottom)],
        7 | 8 => vec![seg(left, bottom)],
        _ => vec![],
    }
}

/// Linearly interpolate between two edge points based on data values
fn interpolate_edge(
    x1: f32,
    y1: f32,
    x2: f32,
    y2: f32,
    val1: f32,
    val2: f32,
    level: f32,
) -> Point {
    if (val2 - val1).abs() < 1e-6 {
        return Point::new((x1 + x2) / 2.0, (y1 + y2) / 2.0);
    }

    let t = ((level - val1) / (val2 - val1)).clamp(0.0, 1.0);
    Point::new(x1 + t * (x2 - x1), y1 + t * (y2 - y1))
}

/// Connect line segments into continuous polylines
///
/// Takes a collection of unordered segments and joins them end to end,
/// growing each polyline from both ends.
pub fn connect_segments(segments: Vec<Segment>) -> Vec<Contour> {
    let mut contours = Vec::new();
    let mut used = vec![false; segments.len()];
    let epsilon = 0.001;

    // Next unused segment touching `at`, with the far end it contributes
    let find_next = |used: &[bool], at: Point| {
        segments.iter().enumerate().find_map(|(i, seg)| {
            if used[i] {
                None
            } else if seg.start.distance(&at) < epsilon {
                Some((i, seg.end))
            } else if seg.end.distance(&at) < epsilon {
                Some((i, seg.start))
            } else {
                None
            }
        })
    };

    for start_idx in 0..segments.len() {
        if used[start_idx] {
            continue;
        }
        used[start_idx] = true;
        let mut head = vec![segments[start_idx].start];
        let mut tail = vec![segments[start_idx].end];

        while let Some(&end) = tail.last() {
            match find_next(&used, end) {
                Some((i, next)) => {
                    used[i] = true;
                    tail.push(next);
                }
                None => break,
            }
        }
        while let Some(&start) = head.last() {
            match find_next(&used, start) {
                Some((i, next)) => {
                    used[i] = true;
                    head.push(next);
                }
                None => break,
            }
        }

        head.reverse();
        head.extend(tail);
        let points = head;

        let closed = match (points.first(), points.last()) {
            (Some(first), Some(last)) => points.len() > 2 && first.distance(last) < epsilon,
            _ => false,
        };

        contours.push(Contour {
            level: 0.0, // Level will be set by caller
            points,
            closed,
        });
    }

    contours
}

/// Apply Chaikin's corner cutting algorithm for smoothing
pub fn smooth_contour(contour: &Contour, iterations: u32) -> Contour {
    if iterations == 0 || contour.points.len() < 3 {
        return contour.clone();
    }

    let mut points = contour.points.clone();

    for _ in 0..iterations {
        let mut new_points = Vec::with_capacity(points.len() * 2);

        for i in 0..points.len() {
            let p1 = points[i];
            let p2 = if contour.closed {
                points[(i + 1) % points.len()]
            } else if i + 1 < points.len() {
                points[i + 1]
            } else {
                break;
            };

            // 25% and 75% along the segment
            new_points.push(Point::new(0.75 * p1.x + 0.25 * p2.x, 0.75 * p1.y + 0.25 * p2.y));
            new_points.push(Point::new(0.25 * p1.x + 0.75 * p2.x, 0.25 * p1.y + 0.75 * p2.y));
        }

        // Open lines keep their endpoints
        if !contour.closed {
            new_points.insert(0, points[0]);
            if let Some(&last) = points.last() {
                new_points.push(last);
            }
        }

        points = new_points;
    }

    Contour {
        level: contour.level,
        points,
        closed: contour.closed,
    }
}

/// Trace every level over a grid.
pub fn trace_contours(
    data: &[f32],
    width: usize,
    height: usize,
    levels: &[f64],
    smoothing_passes: u32,
) -> Vec<Contour> {
    let mut all_contours = Vec::new();

    for &level in levels {
        let segments = march_squares(data, width, height, level as f32);
        let mut contours = connect_segments(segments);

        for contour in &mut contours {
            contour.level = level;
            if smoothing_passes > 0 {
                *contour = smooth_contour(contour, smoothing_passes);
            }
        }

        all_contours.extend(contours);
    }

    tracing::debug!(
        levels = levels.len(),
        contours = all_contours.len(),
        total_points = all_contours.iter().map(|c| c.points.len()).sum::<usize>(),
        "Traced contours"
    );

    all_contours
}

/// Position and metadata for an inline contour label
#[derive(Debug, Clone)]
pub struct LabelPosition {
    pub x: f32,
    pub y: f32,
    /// Rotation angle in radians
    pub angle: f32,
    pub text: String,
    pub level: f64,
}

/// Label placement along pixel-space polylines.
#[derive(Debug, Clone, Copy)]
pub struct LabelLayout {
    pub font_size: f32,
    /// Minimum spacing between labels on one line, in pixels
    pub spacing: f32,
    /// Labels must fall inside this rectangle: left, top, right, bottom
    pub bounds: (f32, f32, f32, f32),
}

/// Length of a polyline
pub fn polyline_length(points: &[Point]) -> f32 {
    points.windows(2).map(|w| w[0].distance(&w[1])).sum()
}

/// Collect label positions along a pixel-space polyline, skipping spots
/// that overlap labels already placed.
pub fn collect_label_positions(
    points: &[Point],
    level: f64,
    layout: &LabelLayout,
    positions: &mut Vec<LabelPosition>,
) {
    let total_length = polyline_length(points);
    if total_length < layout.spacing * 0.5 {
        return;
    }

    let text = format_label(level);
    let margin = layout.font_size * 2.0;
    let (left, top, right, bottom) = layout.bounds;

    let num_labels = ((total_length / layout.spacing).floor() as usize).max(1);
    let spacing = total_length / (num_labels as f32 + 1.0);

    let mut accumulated_length = 0.0;
    let mut next_label_at = spacing;
    let mut label_count = 0;

    for pair in points.windows(2) {
        if label_count >= num_labels {
            break;
        }
        let (p1, p2) = (pair[0], pair[1]);
        let dx = p2.x - p1.x;
        let dy = p2.y - p1.y;
        let segment_length = (dx * dx + dy * dy).sqrt();

        while accumulated_length + segment_length >= next_label_at && label_count < num_labels {
            let t = (next_label_at - accumulated_length) / segment_length.max(f32::EPSILON);
            let x = p1.x + t * dx;
            let y = p1.y + t * dy;

            if x > left + margin && x < right - margin && y > top + margin && y < bottom - margin {
                // Keep text upright
                let angle = dy.atan2(dx);
                let angle = if angle.abs() > std::f32::consts::FRAC_PI_2 {
                    angle + std::f32::consts::PI
                } else {
                    angle
                };

                let min_distance = layout.font_size * 4.0;
                let has_overlap = positions.iter().any(|pos| {
                    (pos.x - x).powi(2) + (pos.y - y).powi(2) < min_distance * min_distance
                });

                if !has_overlap {
                    positions.push(LabelPosition {
                        x,
                        y,
                        angle,
                        text: text.clone(),
                        level,
                    });
                }
            }

            next_label_at += spacing;
            label_count += 1;
        }

        accumulated_length += segment_length;
    }
}
