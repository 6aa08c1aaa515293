//! Cartesian scatter charts.

use std::path::Path;

use projection::BoundingBox;
use tiny_skia::{PathBuilder, Pixmap, Stroke, Transform};

use crate::colormap::Color;
use crate::contour::nice_levels;
use crate::draw::{
    draw_marker, format_tick, pixmap_to_rgba, Legend, LegendPlacement, Margins, MarkerShape,
    PlotFrame,
};
use crate::error::{RenderError, RenderResult};
use crate::png::write_png;
use crate::text::{draw_text, Align, Baseline, TextStyle};

/// Appearance of a chart. Sizes are in pixels.
#[derive(Debug, Clone)]
pub struct ChartStyle {
    pub font_size: f32,
    pub background: Color,
    pub margins: Margins,
}

impl Default for ChartStyle {
    fn default() -> Self {
        Self {
            font_size: 25.0,
            background: Color::WHITE,
            margins: Margins {
                left: 150.0,
                top: 80.0,
                right: 420.0,
                bottom: 130.0,
            },
        }
    }
}

/// A scatter point in data coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChartPoint {
    pub x: f64,
    pub y: f64,
    pub color: Color,
    pub shape: MarkerShape,
}

pub struct ScatterChart {
    pixmap: Pixmap,
    frame: PlotFrame,
    style: ChartStyle,
}

impl ScatterChart {
    /// A chart whose axes cover `points` with 5% padding on every side.
    pub fn for_points(
        width: u32,
        height: u32,
        points: &[(f64, f64)],
        style: ChartStyle,
    ) -> RenderResult<Self> {
        let mut finite = points.iter().filter(|(x, y)| x.is_finite() && y.is_finite());
        let first = finite
            .next()
            .ok_or_else(|| RenderError::Canvas("no finite points to chart".to_string()))?;
        let data = finite.fold(
            BoundingBox::new(first.0, first.1, first.0, first.1),
            |b, &(x, y)| b.including(x, y),
        );
        let pad_x = if data.width() > 0.0 { data.width() * 0.05 } else { 1.0 };
        let pad_y = if data.height() > 0.0 { data.height() * 0.05 } else { 1.0 };
        let bbox = BoundingBox::new(
            data.min_x - pad_x,
            data.min_y - pad_y,
            data.max_x + pad_x,
            data.max_y + pad_y,
        );
        Self::new(width, height, bbox, style)
    }

    pub fn new(width: u32, height: u32, bbox: BoundingBox, style: ChartStyle) -> RenderResult<Self> {
        let mut pixmap = Pixmap::new(width, height).ok_or_else(|| {
            RenderError::Canvas(format!("cannot allocate a {}x{} canvas", width, height))
        })?;
        let bg = style.background;
        pixmap.fill(tiny_skia::Color::from_rgba8(bg.r, bg.g, bg.b, bg.a));
        let frame = PlotFrame::fit(width, height, style.margins, bbox, false);
        Ok(Self {
            pixmap,
            frame,
            style,
        })
    }

    pub fn frame(&self) -> &PlotFrame {
        &self.frame
    }

    /// Frame, ticks on nice steps with labels, and axis titles.
    pub fn draw_axes(&mut self, x_label: &str, y_label: &str) {
        self.frame.draw_outline(&mut self.pixmap, 1.5);

        let bbox = self.frame.bbox;
        let font = self.style.font_size;
        let tick_style = TextStyle::new(font * 0.8, Color::BLACK);
        let tick_len = 8.0;
        let mut ticks = PathBuilder::new();

        for x in nice_levels(bbox.min_x, bbox.max_x, 6) {
            let (px, _) = self.frame.to_pixel(x, bbox.min_y);
            ticks.move_to(px, self.frame.bottom());
            ticks.line_to(px, self.frame.bottom() + tick_len);
            draw_text(
                &mut self.pixmap,
                &format_tick(x),
                px,
                self.frame.bottom() + tick_len * 2.0,
                &tick_style.aligned(Align::Middle, Baseline::Top),
                None,
            );
        }
        for y in nice_levels(bbox.min_y, bbox.max_y, 6) {
            let (_, py) = self.frame.to_pixel(bbox.min_x, y);
            ticks.move_to(self.frame.left, py);
            ticks.line_to(self.frame.left - tick_len, py);
            draw_text(
                &mut self.pixmap,
                &format_tick(y),
                self.frame.left - tick_len * 2.0,
                py,
                &tick_style.aligned(Align::End, Baseline::Middle),
                None,
            );
        }
        if let Some(path) = ticks.finish() {
            let stroke = Stroke {
                width: 1.5,
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

        let title_style = TextStyle::new(font, Color::BLACK);
        draw_text(
            &mut self.pixmap,
            x_label,
            self.frame.left + self.frame.width / 2.0,
            self.frame.bottom() + font * 2.6,
            &title_style.aligned(Align::Middle, Baseline::Top),
            None,
        );
        draw_text(
            &mut self.pixmap,
            y_label,
            self.frame.left - font * 4.0,
            self.frame.top + self.frame.height / 2.0,
            &title_style
                .aligned(Align::Middle, Baseline::Bottom)
                .rotated(-std::f32::consts::FRAC_PI_2),
            None,
        );
    }

    /// Scatter markers of `size` pixels. Returns the number drawn.
    pub fn draw_points(&mut self, points: &[ChartPoint], size: f32) -> usize {
        let clip = self.frame.clip_mask(self.pixmap.width(), self.pixmap.height());
        let mut drawn = 0;
        for point in points.iter().filter(|p| p.x.is_finite() && p.y.is_finite()) {
            let (px, py) = self.frame.to_pixel(point.x, point.y);
            draw_marker(&mut self.pixmap, px, py, size, point.shape, point.color, clip.as_ref());
            drawn += 1;
        }
        drawn
    }

    pub fn draw_legend(&mut self, legend: &Legend, placement: LegendPlacement) {
        let (x, y) = legend.origin(&self.frame, placement);
        legend.draw(&mut self.pixmap, x, y);
    }

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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::draw::LegendItem;

    #[test]
    fn test_bbox_padded_around_points() {
        let chart = ScatterChart::for_points(
            800,
            600,
            &[(-2.0, -1.0), (2.0, 1.0), (f64::NAN, 0.0)],
            ChartStyle::default(),
        )
        .unwrap();
        let bbox = chart.frame().bbox;
        assert!((bbox.min_x + 2.2).abs() < 1e-9);
        assert!((bbox.max_y - 1.1).abs() < 1e-9);
    }

    #[test]
    fn test_no_points_is_an_error() {
        assert!(ScatterChart::for_points(100, 100, &[], ChartStyle::default()).is_err());
    }

    #[test]
    fn test_points_and_outside_legend() {
        let mut chart = ScatterChart::for_points(
            1000,
            700,
            &[(0.0, 0.0), (1.0, 1.0)],
            ChartStyle::default(),
        )
        .unwrap();
        chart.draw_axes("1st", "2nd");
        let red = Color::rgb(255, 0, 0);
        let drawn = chart.draw_points(
            &[
                ChartPoint {
                    x: 0.0,
                    y: 0.0,
                    color: red,
                    shape: MarkerShape::Circle,
                },
                ChartPoint {
                    x: 1.0,
                    y: 1.0,
                    color: red,
                    shape: MarkerShape::Triangle,
                },
            ],
            14.0,
        );
        assert_eq!(drawn, 2);

        let legend = Legend {
            items: vec![
                LegendItem::Title("cluster".into()),
                LegendItem::Entry {
                    label: "0".into(),
                    color: red,
                    shape: MarkerShape::Circle,
                },
            ],
            font_size: 25.0,
            marker_size: 14.0,
        };
        chart.draw_legend(&legend, LegendPlacement::OutsideRight);

        // Red ink right of the frame belongs to the legend marker
        let frame = *chart.frame();
        let rgba = chart.to_rgba();
        let red_outside = rgba
            .chunks_exact(4)
            .enumerate()
            .filter(|(i, p)| (i % 1000) as f32 > frame.right() + 1.0 && p[0] > 200 && p[1] < 50)
            .count();
        assert!(red_outside > 20);
    }
}
