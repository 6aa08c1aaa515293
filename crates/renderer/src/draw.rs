//! Plot frames, scatter markers and legends shared by maps and charts.

use projection::BoundingBox;
use serde::{Deserialize, Serialize};
use tiny_skia::{FillRule, Mask, PathBuilder, Pixmap, Rect, Stroke, Transform};

use crate::colormap::Color;
use crate::text::{draw_text, text_height, text_width, Align, Baseline, TextStyle};

/// Space around the plot area, in pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Margins {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl Margins {
    pub fn uniform(m: f32) -> Self {
        Self {
            left: m,
            top: m,
            right: m,
            bottom: m,
        }
    }
}

/// Plot area on the canvas and the plane rectangle it shows.
#[derive(Debug, Clone, Copy)]
pub struct PlotFrame {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
    pub bbox: BoundingBox,
}

impl PlotFrame {
    /// Largest frame inside the margins. With `keep_aspect` the frame has
    /// the aspect ratio of `bbox` (equal scale on both axes) and is centred
    /// in the available space.
    pub fn fit(
        canvas_width: u32,
        canvas_height: u32,
        margins: Margins,
        bbox: BoundingBox,
        keep_aspect: bool,
    ) -> Self {
        let avail_w = (canvas_width as f32 - margins.left - margins.right).max(1.0);
        let avail_h = (canvas_height as f32 - margins.top - margins.bottom).max(1.0);

        let (width, height) = if keep_aspect && bbox.height() > 0.0 {
            let aspect = bbox.aspect_ratio() as f32;
            if avail_w / avail_h > aspect {
                (avail_h * aspect, avail_h)
            } else {
                (avail_w, avail_w / aspect)
            }
        } else {
            (avail_w, avail_h)
        };

        Self {
            left: margins.left + (avail_w - width) / 2.0,
            top: margins.top + (avail_h - height) / 2.0,
            width,
            height,
            bbox,
        }
    }

    pub fn right(&self) -> f32 {
        self.left + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.top + self.height
    }

    /// Plane coordinates to pixels; y grows downwards on screen.
    pub fn to_pixel(&self, x: f64, y: f64) -> (f32, f32) {
        let fx = (x - self.bbox.min_x) / self.bbox.width();
        let fy = (self.bbox.max_y - y) / self.bbox.height();
        (
            self.left + (fx as f32) * self.width,
            self.top + (fy as f32) * self.height,
        )
    }

    /// Pixels to plane coordinates.
    pub fn to_plane(&self, px: f32, py: f32) -> (f64, f64) {
        let fx = ((px - self.left) / self.width) as f64;
        let fy = ((py - self.top) / self.height) as f64;
        (
            self.bbox.min_x + fx * self.bbox.width(),
            self.bbox.max_y - fy * self.bbox.height(),
        )
    }

    pub fn contains(&self, px: f32, py: f32) -> bool {
        px >= self.left && px <= self.right() && py >= self.top && py <= self.bottom()
    }

    pub fn rect(&self) -> Option<Rect> {
        Rect::from_xywh(self.left, self.top, self.width, self.height)
    }

    /// Mask limiting drawing to the plot area.
    pub fn clip_mask(&self, canvas_width: u32, canvas_height: u32) -> Option<Mask> {
        let mut mask = Mask::new(canvas_width, canvas_height)?;
        let path = PathBuilder::from_rect(self.rect()?);
        mask.fill_path(&path, FillRule::Winding, false, Transform::identity());
        Some(mask)
    }

    /// Black outline around the plot area.
    pub fn draw_outline(&self, pixmap: &mut Pixmap, line_width: f32) {
        if let Some(rect) = self.rect() {
            let path = PathBuilder::from_rect(rect);
            let stroke = Stroke {
                width: line_width,
                ..Stroke::default()
            };
            pixmap.stroke_path(&path, &Color::BLACK.paint(), &stroke, Transform::identity(), None);
        }
    }
}

/// Scatter marker shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkerShape {
    #[default]
    Circle,
    Triangle,
}

impl MarkerShape {
    /// Shape for the `index`-th distinct style value.
    pub fn nth(index: usize) -> Self {
        if index % 2 == 0 {
            MarkerShape::Circle
        } else {
            MarkerShape::Triangle
        }
    }
}

/// A filled marker with a thin white edge, `size` being its diameter.
pub fn draw_marker(
    pixmap: &mut Pixmap,
    x: f32,
    y: f32,
    size: f32,
    shape: MarkerShape,
    color: Color,
    mask: Option<&Mask>,
) {
    let r = size / 2.0;
    let path = match shape {
        MarkerShape::Circle => PathBuilder::from_circle(x, y, r),
        MarkerShape::Triangle => {
            let mut pb = PathBuilder::new();
            pb.move_to(x, y - r);
            pb.line_to(x + r * 0.866, y + r * 0.5);
            pb.line_to(x - r * 0.866, y + r * 0.5);
            pb.close();
            pb.finish()
        }
    };
    let Some(path) = path else {
        return;
    };
    pixmap.fill_path(&path, &color.paint(), FillRule::Winding, Transform::identity(), mask);
    let edge = Stroke {
        width: (size * 0.08).max(0.75),
        ..Stroke::default()
    };
    pixmap.stroke_path(&path, &Color::WHITE.paint(), &edge, Transform::identity(), mask);
}

/// One legend row.
#[derive(Debug, Clone, PartialEq)]
pub enum LegendItem {
    /// Group heading, drawn without a marker
    Title(String),
    Entry {
        label: String,
        color: Color,
        shape: MarkerShape,
    },
}

/// Where the legend box goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LegendPlacement {
    /// Inside the plot area, top right corner
    #[default]
    UpperRight,
    /// Outside the plot area, top aligned, to the right of it
    OutsideRight,
}

/// Legend box renderer.
#[derive(Debug, Clone)]
pub struct Legend {
    pub items: Vec<LegendItem>,
    pub font_size: f32,
    pub marker_size: f32,
}

impl Legend {
    fn row_height(&self) -> f32 {
        (text_height(self.font_size) * 1.8).max(self.marker_size * 1.4)
    }

    fn padding(&self) -> f32 {
        self.font_size * 0.5
    }

    /// Box width and height in pixels.
    pub fn size(&self) -> (f32, f32) {
        let label_w = self
            .items
            .iter()
            .map(|item| match item {
                LegendItem::Title(t) => text_width(t, self.font_size),
                LegendItem::Entry { label, .. } => {
                    self.marker_size * 2.0 + text_width(label, self.font_size)
                }
            })
            .fold(0.0f32, f32::max);
        let pad = self.padding();
        (
            label_w + pad * 2.0,
            self.items.len() as f32 * self.row_height() + pad * 2.0,
        )
    }

    /// Top-left corner of the box for a placement relative to `frame`.
    pub fn origin(&self, frame: &PlotFrame, placement: LegendPlacement) -> (f32, f32) {
        let (w, _) = self.size();
        let gap = self.font_size * 0.5;
        match placement {
            LegendPlacement::UpperRight => (frame.right() - w - gap, frame.top + gap),
            LegendPlacement::OutsideRight => (frame.right() + frame.width * 0.05, frame.top),
        }
    }

    /// Draw the box with its top-left corner at (`x`, `y`).
    pub fn draw(&self, pixmap: &mut Pixmap, x: f32, y: f32) {
        let (w, h) = self.size();
        if let Some(rect) = Rect::from_xywh(x, y, w, h) {
            let path = PathBuilder::from_rect(rect);
            pixmap.fill_path(
                &path,
                &Color::WHITE.with_alpha(230).paint(),
                FillRule::Winding,
                Transform::identity(),
                None,
            );
            let stroke = Stroke {
                width: 1.0,
                ..Stroke::default()
            };
            pixmap.stroke_path(
                &path,
                &Color::rgb(204, 204, 204).paint(),
                &stroke,
                Transform::identity(),
                None,
            );
        }

        let pad = self.padding();
        let style = TextStyle::new(self.font_size, Color::BLACK);
        for (row, item) in self.items.iter().enumerate() {
            let cy = y + pad + self.row_height() * (row as f32 + 0.5);
            match item {
                LegendItem::Title(title) => {
                    draw_text(pixmap, title, x + pad, cy, &style, None);
                }
                LegendItem::Entry {
                    label,
                    color,
                    shape,
                } => {
                    draw_marker(pixmap, x + pad + self.marker_size * 0.75, cy, self.marker_size, *shape, *color, None);
                    draw_text(
                        pixmap,
                        label,
                        x + pad + self.marker_size * 2.0,
                        cy,
                        &style.aligned(Align::Start, Baseline::Middle),
                        None,
                    );
                }
            }
        }
    }
}

/// Straight (not premultiplied) RGBA bytes of a pixmap.
pub(crate) fn pixmap_to_rgba(pixmap: &Pixmap) -> Vec<u8> {
    pixmap
        .pixels()
        .iter()
        .flat_map(|p| {
            let c = p.demultiply();
            [c.red(), c.green(), c.blue(), c.alpha()]
        })
        .collect()
}

/// Tick label text: whole numbers without decimals, otherwise the
/// shortest exact rendering.
pub fn format_tick(value: f64) -> String {
    if value == 0.0 {
        return "0".to_string();
    }
    if (value - value.round()).abs() < 1e-9 * value.abs().max(1.0) {
        format!("{:.0}", value)
    } else {
        let text = format!("{:.4}", value);
        text.trim_end_matches('0').trim_end_matches('.').to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_tick() {
        assert_eq!(format_tick(1200.0), "1200");
        assert_eq!(format_tick(-0.5), "-0.5");
        assert_eq!(format_tick(2.25), "2.25");
        assert_eq!(format_tick(-0.0), "0");
    }

    #[test]
    fn test_frame_keeps_aspect_and_centres() {
        let bbox = BoundingBox::new(120.0, 20.0, 150.0, 50.0);
        let frame = PlotFrame::fit(2000, 1500, Margins::uniform(100.0), bbox, true);
        assert!((frame.width - frame.height).abs() < 1e-3);
        assert!((frame.height - 1300.0).abs() < 1e-3);
        assert!((frame.left - 350.0).abs() < 1e-3);
    }

    #[test]
    fn test_pixel_plane_roundtrip() {
        let bbox = BoundingBox::new(-180.0, -90.0, 180.0, 90.0);
        let frame = PlotFrame::fit(800, 600, Margins::uniform(50.0), bbox, true);
        let (px, py) = frame.to_pixel(135.0, 35.0);
        let (x, y) = frame.to_plane(px, py);
        assert!((x - 135.0).abs() < 1e-3);
        assert!((y - 35.0).abs() < 1e-3);
        // North is up
        assert!(frame.to_pixel(0.0, 60.0).1 < frame.to_pixel(0.0, -60.0).1);
    }

    #[test]
    fn test_marker_shapes_cover_centre() {
        for shape in [MarkerShape::Circle, MarkerShape::Triangle] {
            let mut pixmap = Pixmap::new(30, 30).unwrap();
            draw_marker(&mut pixmap, 15.0, 15.0, 20.0, shape, Color::rgb(255, 0, 0), None);
            let centre = pixmap.pixel(15, 16).unwrap();
            assert_eq!((centre.red(), centre.green(), centre.blue()), (255, 0, 0));
        }
        assert_eq!(MarkerShape::nth(0), MarkerShape::Circle);
        assert_eq!(MarkerShape::nth(1), MarkerShape::Triangle);
    }

    #[test]
    fn test_outside_legend_clears_plot_area() {
        let bbox = BoundingBox::new(0.0, 0.0, 1.0, 1.0);
        let frame = PlotFrame::fit(1000, 800, Margins::uniform(100.0), bbox, false);
        let legend = Legend {
            items: vec![
                LegendItem::Title("cluster".into()),
                LegendItem::Entry {
                    label: "0".into(),
                    color: Color::BLACK,
                    shape: MarkerShape::Circle,
                },
            ],
            font_size: 25.0,
            marker_size: 14.0,
        };
        let (x, y) = legend.origin(&frame, LegendPlacement::OutsideRight);
        assert!(x > frame.right());
        assert_eq!(y, frame.top);
        let (inside_x, _) = legend.origin(&frame, LegendPlacement::UpperRight);
        assert!(inside_x + legend.size().0 <= frame.right());
    }
}
