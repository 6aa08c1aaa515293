//! Map canvas: a projected plot area on a raster with geographic layers.
//!
//! Layers are drawn in call order. Everything geographic is clipped to the
//! plot frame; the colour bar, tick labels and an outside legend live in the
//! margins.

use std::path::Path;

use projection::{BoundingBox, MapProjection};
use rayon::prelude::*;
use tiny_skia::{
    FillRule, LineCap, LineJoin, Mask, PathBuilder, Pixmap, PremultipliedColorU8, Rect, Stroke,
    Transform,
};

use crate::coastline::Coastlines;
use crate::colormap::{BandColors, Color, Colormap};
use crate::contour::{
    classify, collect_label_positions, trace_contours, Band, LabelLayout, LabelPosition, Point,
};
use crate::draw::{
    draw_marker, format_tick, pixmap_to_rgba, Legend, LegendPlacement, Margins, MarkerShape,
    PlotFrame,
};
use crate::error::{RenderError, RenderResult};
use crate::field::ScalarField;
use crate::png::write_png;
use crate::text::{draw_label_box, draw_text, Align, Baseline, TextStyle};

/// Whole-globe extent `[lon_min, lon_max, lat_min, lat_max]`.
pub const GLOBAL_EXTENT: [f64; 4] = [-180.0, 180.0, -90.0, 90.0];

/// Appearance of a map canvas. Sizes are in pixels.
#[derive(Debug, Clone)]
pub struct MapStyle {
    pub font_size: f32,
    pub label_font_size: f32,
    pub line_width: f32,
    pub background: Color,
    pub coastline_color: Color,
    pub coastline_width: f32,
    /// Fill of land polygons
    pub land_color: Color,
    /// `None` draws gridline labels without the lines
    pub gridline_color: Option<Color>,
    /// Degrees between gridlines; `None` picks 30 for views spanning 180
    /// degrees of longitude or more and 10 otherwise
    pub grid_spacing: Option<f64>,
    pub grid_labels: bool,
    /// Distance between inline labels along one contour line
    pub label_spacing: f32,
    pub smoothing_passes: u32,
    pub margins: Margins,
}

impl Default for MapStyle {
    fn default() -> Self {
        Self {
            font_size: 25.0,
            label_font_size: 19.0,
            line_width: 2.0,
            background: Color::WHITE,
            coastline_color: Color::GRAY,
            coastline_width: 1.5,
            land_color: Color::rgb(240, 240, 220),
            gridline_color: Some(Color::GRAY.with_alpha(128)),
            grid_spacing: None,
            grid_labels: true,
            label_spacing: 600.0,
            smoothing_passes: 1,
            margins: Margins {
                left: 130.0,
                top: 80.0,
                right: 280.0,
                bottom: 110.0,
            },
        }
    }
}

/// A scatter point in geographic coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Marker {
    pub lon: f64,
    pub lat: f64,
    pub color: Color,
    pub shape: MarkerShape,
    /// Diameter in pixels
    pub size: f32,
}

pub struct MapCanvas {
    pixmap: Pixmap,
    projection: Box<dyn MapProjection>,
    frame: PlotFrame,
    extent: [f64; 4],
    style: MapStyle,
    clip: Option<Mask>,
}

impl MapCanvas {
    /// A blank map of `width` x `height` pixels showing `extent` (the whole
    /// globe when `None`) under `projection`.
    pub fn new(
        width: u32,
        height: u32,
        projection: Box<dyn MapProjection>,
        extent: Option<[f64; 4]>,
        style: MapStyle,
    ) -> RenderResult<Self> {
        let mut pixmap = Pixmap::new(width, height).ok_or_else(|| {
            RenderError::Canvas(format!("cannot allocate a {}x{} canvas", width, height))
        })?;
        pixmap.fill(tiny_skia::Color::from_rgba8(
            style.background.r,
            style.background.g,
            style.background.b,
            style.background.a,
        ));

        let extent = extent.unwrap_or(GLOBAL_EXTENT);
        let bbox = BoundingBox::from_geo_extent(projection.as_ref(), extent)?;
        let frame = PlotFrame::fit(width, height, style.margins, bbox, true);
        let clip = frame.clip_mask(width, height);

        tracing::debug!(
            projection = projection.name(),
            width,
            height,
            frame_width = frame.width,
            frame_height = frame.height,
            "Created map canvas"
        );

        Ok(Self {
            pixmap,
            projection,
            frame,
            extent,
            style,
            clip,
        })
    }

    pub fn frame(&self) -> &PlotFrame {
        &self.frame
    }

    pub fn width(&self) -> u32 {
        self.pixmap.width()
    }

    pub fn height(&self) -> u32 {
        self.pixmap.height()
    }

    /// Pixel position of a geographic point, if the projection covers it.
    pub fn to_pixel(&self, lon: f64, lat: f64) -> Option<(f32, f32)> {
        let (x, y) = self.projection.project(lon, lat)?;
        Some(self.frame.to_pixel(x, y))
    }

    /// Project a geographic polyline into pixel pieces, breaking it where a
    /// point falls outside the projection or the line jumps across a seam.
    fn project_polyline<I>(&self, geo: I) -> Vec<Vec<Point>>
    where
        I: IntoIterator<Item = (f64, f64)>,
    {
        let wrap = self.projection.wrap_width();
        let max_jump = self.frame.width.max(self.frame.height) * 0.5;

        let mut pieces = Vec::new();
        let mut current: Vec<Point> = Vec::new();
        let mut last_x: Option<f64> = None;

        for (lon, lat) in geo {
            let Some((x, y)) = self.projection.project(lon, lat) else {
                flush(&mut pieces, &mut current);
                last_x = None;
                continue;
            };
            let (px, py) = self.frame.to_pixel(x, y);
            let seam = match (wrap, last_x) {
                (Some(w), Some(prev)) => (x - prev).abs() > w / 2.0,
                _ => false,
            };
            let jump = current
                .last()
                .map(|p| ((p.x - px).powi(2) + (p.y - py).powi(2)).sqrt() > max_jump)
                .unwrap_or(false);
            if seam || jump {
                flush(&mut pieces, &mut current);
            }
            current.push(Point::new(px, py));
            last_x = Some(x);
        }
        flush(&mut pieces, &mut current);

        // Drop pieces that never come near the frame
        let pad = self.frame.width.max(self.frame.height) * 0.1;
        let (left, top) = (self.frame.left - pad, self.frame.top - pad);
        let (right, bottom) = (self.frame.right() + pad, self.frame.bottom() + pad);
        pieces.retain(|piece: &Vec<Point>| {
            let (min_x, max_x, min_y, max_y) = piece.iter().fold(
                (f32::MAX, f32::MIN, f32::MAX, f32::MIN),
                |(a, b, c, d), p| (a.min(p.x), b.max(p.x), c.min(p.y), d.max(p.y)),
            );
            max_x >= left && min_x <= right && max_y >= top && min_y <= bottom
        });
        pieces
    }

    fn stroke_pieces(&mut self, pieces: &[Vec<Point>], color: Color, width: f32, dash: bool) {
        let mut pb = PathBuilder::new();
        for piece in pieces {
            for (i, p) in piece.iter().enumerate() {
                if i == 0 {
                    pb.move_to(p.x, p.y);
                } else {
                    pb.line_to(p.x, p.y);
                }
            }
        }
        let Some(path) = pb.finish() else {
            return;
        };
        let mut stroke = Stroke {
            width,
            line_cap: LineCap::Round,
            line_join: LineJoin::Round,
            ..Stroke::default()
        };
        if dash {
            stroke.dash = tiny_skia::StrokeDash::new(vec![width * 4.0, width * 3.0], 0.0);
        }
        self.pixmap.stroke_path(
            &path,
            &color.paint(),
            &stroke,
            Transform::identity(),
            self.clip.as_ref(),
        );
    }

    /// Fill the plot area by band: every pixel is inverse-projected, the
    /// field sampled bilinearly and the value classified against `levels`,
    /// with both ends extended. Missing values stay background.
    pub fn draw_filled_contours(
        &mut self,
        field: &ScalarField,
        levels: &[f64],
        colormap: Colormap,
    ) -> RenderResult<BandColors> {
        if levels.len() < 2 || levels.windows(2).any(|w| w[1] <= w[0]) {
            return Err(RenderError::InvalidLevels(format!(
                "filled contours need at least two ascending levels, got {:?}",
                levels
            )));
        }
        let colors = colormap.for_bands(levels);
        let lookup = |band: Band| match band {
            Band::Under => colors.under,
            Band::Interior(i) => colors.interior[i],
            Band::Over => colors.over,
        };

        let width = self.pixmap.width() as usize;
        let frame = self.frame;
        let projection = self.projection.as_ref();
        let col_range = (frame.left.floor().max(0.0) as usize)..(frame.right().ceil() as usize).min(width);
        let row_top = frame.top.floor().max(0.0) as usize;
        let row_bottom = (frame.bottom().ceil() as usize).min(self.pixmap.height() as usize);

        self.pixmap
            .pixels_mut()
            .par_chunks_mut(width)
            .enumerate()
            .filter(|(row, _)| (row_top..row_bottom).contains(row))
            .for_each(|(row, pixels)| {
                let py = row as f32 + 0.5;
                for col in col_range.clone() {
                    let px = col as f32 + 0.5;
                    if !frame.contains(px, py) {
                        continue;
                    }
                    let (x, y) = frame.to_plane(px, py);
                    let Some((lon, lat)) = projection.unproject(x, y) else {
                        continue;
                    };
                    let Some(band) = classify(field.sample(lon, lat), levels) else {
                        continue;
                    };
                    let c = lookup(band);
                    if let Some(color) = PremultipliedColorU8::from_rgba(c.r, c.g, c.b, 255) {
                        pixels[col] = color;
                    }
                }
            });

        tracing::debug!(levels = levels.len(), "Drew filled contours");
        Ok(colors)
    }

    /// Line contours coloured by level, optionally with inline labels
    /// (one decimal place). Returns the number of polylines drawn.
    pub fn draw_contour_lines(
        &mut self,
        field: &ScalarField,
        levels: &[f64],
        colormap: Colormap,
        labels: bool,
    ) -> RenderResult<usize> {
        if levels.is_empty() {
            return Err(RenderError::InvalidLevels("no contour levels".to_string()));
        }
        let colors = colormap.for_levels(levels);
        let contours = trace_contours(
            &field.values,
            field.nx,
            field.ny,
            levels,
            self.style.smoothing_passes,
        );

        let layout = LabelLayout {
            font_size: self.style.label_font_size,
            spacing: self.style.label_spacing,
            bounds: (
                self.frame.left,
                self.frame.top,
                self.frame.right(),
                self.frame.bottom(),
            ),
        };
        let mut positions: Vec<LabelPosition> = Vec::new();
        let mut drawn = 0;

        for contour in &contours {
            let level_index = levels
                .iter()
                .position(|&l| l == contour.level)
                .unwrap_or(0);
            let color = colors[level_index];
            let geo = contour
                .points
                .iter()
                .map(|p| field.geo_at(p.x as f64, p.y as f64));
            let pieces = self.project_polyline(geo);
            if pieces.is_empty() {
                continue;
            }
            self.stroke_pieces(&pieces, color, self.style.line_width, false);
            drawn += pieces.len();

            if labels {
                for piece in &pieces {
                    collect_label_positions(piece, contour.level, &layout, &mut positions);
                }
            }
        }

        for pos in &positions {
            let level_index = levels.iter().position(|&l| l == pos.level).unwrap_or(0);
            let style = TextStyle::new(self.style.label_font_size, colors[level_index])
                .rotated(pos.angle);
            draw_label_box(&mut self.pixmap, &pos.text, pos.x, pos.y, &style, self.clip.as_ref());
        }

        tracing::debug!(
            contours = contours.len(),
            polylines = drawn,
            labels = positions.len(),
            "Drew contour lines"
        );
        Ok(drawn)
    }

    /// Coastline outlines. Returns the number of pieces drawn.
    pub fn draw_coastlines(&mut self, coastlines: &Coastlines) -> usize {
        let pieces: Vec<Vec<Point>> = coastlines
            .lines
            .iter()
            .flat_map(|line| self.project_polyline(densify(line, 1.0)))
            .collect();
        let (color, width) = (self.style.coastline_color, self.style.coastline_width);
        self.stroke_pieces(&pieces, color, width, false);
        pieces.len()
    }

    /// Fill land polygons, holes left open. Returns the number of polygons
    /// with any part on the map.
    pub fn fill_land(&mut self, coastlines: &Coastlines) -> usize {
        let mut pb = PathBuilder::new();
        let mut drawn = 0;
        for rings in &coastlines.land {
            let mut visible = false;
            for ring in rings {
                for piece in self.project_polyline(densify(ring, 1.0)) {
                    if piece.len() < 3 {
                        continue;
                    }
                    pb.move_to(piece[0].x, piece[0].y);
                    for p in &piece[1..] {
                        pb.line_to(p.x, p.y);
                    }
                    pb.close();
                    visible = true;
                }
            }
            if visible {
                drawn += 1;
            }
        }
        if let Some(path) = pb.finish() {
            self.pixmap.fill_path(
                &path,
                &self.style.land_color.paint(),
                FillRule::EvenOdd,
                Transform::identity(),
                self.clip.as_ref(),
            );
        }
        drawn
    }

    fn grid_spacing(&self) -> f64 {
        self.style.grid_spacing.unwrap_or_else(|| {
            if self.extent[1] - self.extent[0] >= 180.0 {
                30.0
            } else {
                10.0
            }
        })
    }

    /// Meridians and parallels every grid spacing, labelled where they
    /// leave the bottom and left edges of the plot frame.
    pub fn draw_gridlines(&mut self) {
        let spacing = self.grid_spacing();
        let steps = (180.0 / spacing).floor() as i64;
        let meridians: Vec<f64> = (-steps..=steps)
            .map(|k| k as f64 * spacing)
            .filter(|lon| *lon >= -180.0 && *lon < 180.0)
            .collect();
        let parallels: Vec<f64> = (-steps..=steps)
            .map(|k| k as f64 * spacing)
            .filter(|lat| lat.abs() <= 90.0)
            .collect();

        let mut label_style = TextStyle::new(self.style.font_size, Color::BLACK);
        let pad = self.style.font_size * 0.5;

        for &lon in &meridians {
            let pieces = self.project_polyline((0..=360).map(|i| (lon, -90.0 + i as f64 * 0.5)));
            if let Some(color) = self.style.gridline_color {
                self.stroke_pieces(&pieces, color, 1.0, true);
            }
            if self.style.grid_labels {
                if let Some(x) = crossing_x(&pieces, self.frame.bottom(), &self.frame) {
                    label_style = label_style.aligned(Align::Middle, Baseline::Top);
                    draw_text(
                        &mut self.pixmap,
                        &format_lon(lon),
                        x,
                        self.frame.bottom() + pad,
                        &label_style,
                        None,
                    );
                }
            }
        }

        for &lat in &parallels {
            let pieces =
                self.project_polyline((0..=720).map(|i| (-180.0 + i as f64 * 0.5, lat)));
            if let Some(color) = self.style.gridline_color {
                self.stroke_pieces(&pieces, color, 1.0, true);
            }
            if self.style.grid_labels {
                if let Some(y) = crossing_y(&pieces, self.frame.left, &self.frame) {
                    label_style = label_style.aligned(Align::End, Baseline::Middle);
                    draw_text(
                        &mut self.pixmap,
                        &format_lat(lat),
                        self.frame.left - pad,
                        y,
                        &label_style,
                        None,
                    );
                }
            }
        }

        self.frame.draw_outline(&mut self.pixmap, 1.5);
    }

    /// Scatter markers; points the projection rejects are skipped. Returns
    /// the number of markers drawn.
    pub fn draw_markers(&mut self, markers: &[Marker]) -> usize {
        let mut drawn = 0;
        for marker in markers {
            if let Some((x, y)) = self.to_pixel(marker.lon, marker.lat) {
                draw_marker(
                    &mut self.pixmap,
                    x,
                    y,
                    marker.size,
                    marker.shape,
                    marker.color,
                    self.clip.as_ref(),
                );
                drawn += 1;
            }
        }
        drawn
    }

    pub fn draw_legend(&mut self, legend: &Legend, placement: LegendPlacement) {
        let (x, y) = legend.origin(&self.frame, placement);
        legend.draw(&mut self.pixmap, x, y);
    }

    /// Vertical colour bar right of the frame, 80% of its height, with
    /// triangular ends for the extended bands and a tick at every level.
    pub fn draw_colorbar(&mut self, levels: &[f64], colors: &BandColors) {
        if levels.len() < 2 || colors.interior.len() + 1 != levels.len() {
            return;
        }
        let bar_w = self.style.font_size * 1.2;
        let x = self.frame.right() + self.style.font_size * 1.5;
        let height = self.frame.height * 0.8;
        let ext = height * 0.05;
        let inner = height - 2.0 * ext;
        let top = self.frame.top + (self.frame.height - height) / 2.0 + ext;
        let bottom = top + inner;
        let band_h = inner / colors.interior.len() as f32;

        for (i, color) in colors.interior.iter().enumerate() {
            // Lowest band at the bottom
            let y = bottom - (i + 1) as f32 * band_h;
            if let Some(rect) = Rect::from_xywh(x, y, bar_w, band_h + 0.5) {
                self.pixmap
                    .fill_rect(rect, &color.paint(), Transform::identity(), None);
            }
        }

        let mut outline = PathBuilder::new();
        outline.move_to(x, top);
        outline.line_to(x + bar_w / 2.0, top - ext);
        outline.line_to(x + bar_w, top);
        outline.line_to(x + bar_w, bottom);
        outline.line_to(x + bar_w / 2.0, bottom + ext);
        outline.line_to(x, bottom);
        outline.close();

        for (apex, base, color) in [(top - ext, top, colors.over), (bottom + ext, bottom, colors.under)] {
            let mut pb = PathBuilder::new();
            pb.move_to(x, base);
            pb.line_to(x + bar_w / 2.0, apex);
            pb.line_to(x + bar_w, base);
            pb.close();
            if let Some(path) = pb.finish() {
                self.pixmap.fill_path(
                    &path,
                    &color.paint(),
                    FillRule::Winding,
                    Transform::identity(),
                    None,
                );
            }
        }
        if let Some(path) = outline.finish() {
            let stroke = Stroke {
                width: 1.0,
                ..Stroke::default()
            };
            self.pixmap.stroke_path(
                &path,
                &Color::BLACK.paint(),
                &stroke,
                Transform::identity(),
                None,
            );
        }

        let style = TextStyle::new(self.style.font_size * 0.8, Color::BLACK)
            .aligned(Align::Start, Baseline::Middle);
        for (i, &level) in levels.iter().enumerate() {
            let y = bottom - i as f32 * band_h;
            let mut tick = PathBuilder::new();
            tick.move_to(x + bar_w, y);
            tick.line_to(x + bar_w + 6.0, y);
            if let Some(path) = tick.finish() {
                self.pixmap.stroke_path(
                    &path,
                    &Color::BLACK.paint(),
                    &Stroke::default(),
                    Transform::identity(),
                    None,
                );
            }
            draw_text(
                &mut self.pixmap,
                &format_tick(level),
                x + bar_w + 10.0,
                y,
                &style,
                None,
            );
        }
    }

    /// Straight RGBA bytes of the canvas.
    pub fn to_rgba(&self) -> Vec<u8> {
        pixmap_to_rgba(&self.pixmap)
    }

    pub fn save_png(&self, path: &Path) -> RenderResult<()> {
        write_png(
            path,
            &self.to_rgba(),
            self.pixmap.width() as usize,
            self.pixmap.height() as usize,
        )
    }
}

fn flush(pieces: &mut Vec<Vec<Point>>, current: &mut Vec<Point>) {
    if current.len() >= 2 {
        pieces.push(std::mem::take(current));
    } else {
        current.clear();
    }
}

/// Insert points so no step along the line exceeds `max_step` degrees.
fn densify(line: &[(f64, f64)], max_step: f64) -> Vec<(f64, f64)> {
    let mut out = Vec::with_capacity(line.len());
    for pair in line.windows(2) {
        let ((lon0, lat0), (lon1, lat1)) = (pair[0], pair[1]);
        let steps = ((lon1 - lon0).abs().max((lat1 - lat0).abs()) / max_step).ceil().max(1.0) as usize;
        for s in 0..steps {
            let t = s as f64 / steps as f64;
            out.push((lon0 + (lon1 - lon0) * t, lat0 + (lat1 - lat0) * t));
        }
    }
    if let Some(&last) = line.last() {
        out.push(last);
    }
    out
}

/// Where a pixel polyline crosses the horizontal line `y` inside the frame.
fn crossing_x(pieces: &[Vec<Point>], y: f32, frame: &PlotFrame) -> Option<f32> {
    pieces.iter().flat_map(|piece| piece.windows(2)).find_map(|w| {
        let (a, b) = (w[0], w[1]);
        if (a.y - y) * (b.y - y) > 0.0 || a.y == b.y {
            return None;
        }
        let x = a.x + (y - a.y) / (b.y - a.y) * (b.x - a.x);
        (x >= frame.left && x <= frame.right()).then_some(x)
    })
}

/// Where a pixel polyline crosses the vertical line `x` inside the frame.
fn crossing_y(pieces: &[Vec<Point>], x: f32, frame: &PlotFrame) -> Option<f32> {
    pieces.iter().flat_map(|piece| piece.windows(2)).find_map(|w| {
        let (a, b) = (w[0], w[1]);
        if (a.x - x) * (b.x - x) > 0.0 || a.x == b.x {
            return None;
        }
        let y = a.y + (x - a.x) / (b.x - a.x) * (b.y - a.y);
        (y >= frame.top && y <= frame.bottom()).then_some(y)
    })
}

fn degrees(value: f64) -> String {
    format_tick(value.abs())
}

/// Longitude label: `120E`, `60W`, `0` and `180`.
pub fn format_lon(lon: f64) -> String {
    let lon = projection::normalize_longitude(lon);
    if lon == 0.0 || lon == -180.0 {
        degrees(lon)
    } else if lon > 0.0 {
        format!("{}E", degrees(lon))
    } else {
        format!("{}W", degrees(lon))
    }
}

/// Latitude label: `30N`, `30S` and `0`.
pub fn format_lat(lat: f64) -> String {
    if lat == 0.0 {
        "0".to_string()
    } else if lat > 0.0 {
        format!("{}N", degrees(lat))
    } else {
        format!("{}S", degrees(lat))
    }
}
