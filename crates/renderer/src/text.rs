//! TrueType text for labels, legends and tick marks.
//!
//! A [`FontSet`] holds the embedded DejaVu Sans followed by any fallback
//! faces loaded from disk (a Japanese gothic face, for instance). Each
//! character is drawn with the first face that has a glyph for it.
//! `rusttype` rasterises the glyph coverage into a small sprite which is
//! then composited onto the target pixmap, rotated when asked.

use std::fmt;
use std::path::Path;
use std::sync::OnceLock;

use rusttype::{point, Font, PositionedGlyph, Scale};
use tiny_skia::{
    FillRule, FilterQuality, Mask, PathBuilder, Pixmap, PixmapPaint, PremultipliedColorU8,
    Transform,
};
use tracing::{debug, warn};

use crate::colormap::Color;
use crate::error::{RenderError, RenderResult};

/// Embedded font data - DejaVu Sans
const FONT_DATA: &[u8] = include_bytes!("../assets/DejaVuSans.ttf");

/// Transparent border around a rasterised string, in pixels.
const SPRITE_PAD: u32 = 2;

static FONTS: OnceLock<FontSet> = OnceLock::new();

/// Faces searched in order for each character.
pub struct FontSet {
    faces: Vec<(String, Font<'static>)>,
}

impl fmt::Debug for FontSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.faces.iter().map(|(name, _)| name))
            .finish()
    }
}

impl Default for FontSet {
    fn default() -> Self {
        Self::embedded()
    }
}

impl FontSet {
    /// The embedded face alone.
    pub fn embedded() -> Self {
        let mut faces = Vec::new();
        match Font::try_from_bytes(FONT_DATA) {
            Some(font) => faces.push(("DejaVu Sans".to_string(), font)),
            None => warn!("Failed to load embedded font, text will not be drawn"),
        }
        Self { faces }
    }

    /// Append a TrueType or OpenType face (first face of a collection).
    pub fn add_file(&mut self, path: &Path) -> RenderResult<()> {
        let data = std::fs::read(path)
            .map_err(|e| RenderError::Font(format!("{}: {}", path.display(), e)))?;
        let font = Font::try_from_vec(data).ok_or_else(|| {
            RenderError::Font(format!("{} is not a TrueType or OpenType font", path.display()))
        })?;
        debug!(path = %path.display(), glyphs = font.glyph_count(), "Loaded fallback font");
        self.faces.push((path.display().to_string(), font));
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.faces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }

    /// Face names in search order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.faces.iter().map(|(name, _)| name.as_str())
    }

    fn face_for(&self, ch: char) -> Option<&Font<'static>> {
        self.faces
            .iter()
            .map(|(_, font)| font)
            .find(|font| font.glyph(ch).id().0 != 0)
            .or_else(|| self.faces.first().map(|(_, font)| font))
    }

    pub fn has_glyph(&self, ch: char) -> bool {
        ch.is_whitespace() || self.faces.iter().any(|(_, font)| font.glyph(ch).id().0 != 0)
    }

    /// Characters of `text` that no face can draw, each listed once.
    pub fn missing_chars(&self, text: &str) -> Vec<char> {
        let mut missing: Vec<char> = Vec::new();
        for ch in text.chars() {
            if !self.has_glyph(ch) && !missing.contains(&ch) {
                missing.push(ch);
            }
        }
        missing
    }

    /// Ascent and descent (negative) of the primary face.
    fn vertical_metrics(&self, size: f32) -> (f32, f32) {
        match self.faces.first() {
            Some((_, font)) => {
                let v = font.v_metrics(Scale::uniform(size));
                (v.ascent, v.descent)
            }
            None => (size * 0.8, -size * 0.2),
        }
    }

    fn layout(&self, text: &str, size: f32) -> Layout {
        let scale = Scale::uniform(size);
        let (ascent, descent) = self.vertical_metrics(size);
        let mut caret = 0.0;
        let mut glyphs = Vec::with_capacity(text.len());
        for ch in text.chars() {
            let Some(font) = self.face_for(ch) else {
                continue;
            };
            let glyph = font.glyph(ch).scaled(scale);
            let advance = glyph.h_metrics().advance_width;
            glyphs.push(glyph.positioned(point(caret, ascent)));
            caret += advance;
        }
        Layout {
            glyphs,
            width: caret,
            height: ascent - descent,
        }
    }

    /// Advance width of `text` in pixels.
    pub fn text_width(&self, text: &str, size: f32) -> f32 {
        self.layout(text, size).width
    }

    /// Line height (ascent to descent) in pixels.
    pub fn text_height(&self, size: f32) -> f32 {
        let (ascent, descent) = self.vertical_metrics(size);
        ascent - descent
    }

    /// Draw `text` anchored at (`x`, `y`).
    pub fn draw_text(
        &self,
        pixmap: &mut Pixmap,
        text: &str,
        x: f32,
        y: f32,
        style: &TextStyle,
        mask: Option<&Mask>,
    ) {
        let layout = self.layout(text, style.size);
        let Some(sprite) = layout.rasterize(style.color) else {
            return;
        };
        let dx = match style.align {
            Align::Start => 0.0,
            Align::Middle => -layout.width / 2.0,
            Align::End => -layout.width,
        };
        let dy = match style.baseline {
            Baseline::Top => 0.0,
            Baseline::Middle => -layout.height / 2.0,
            Baseline::Bottom => -layout.height,
        };
        let pad = SPRITE_PAD as f32;

        if style.angle == 0.0 {
            pixmap.draw_pixmap(
                (x + dx - pad).round() as i32,
                (y + dy - pad).round() as i32,
                sprite.as_ref(),
                &PixmapPaint::default(),
                Transform::identity(),
                mask,
            );
        } else {
            let transform = Transform::from_translate(x, y)
                .pre_concat(Transform::from_rotate(style.angle.to_degrees()))
                .pre_translate(dx - pad, dy - pad);
            let paint = PixmapPaint {
                quality: FilterQuality::Bilinear,
                ..PixmapPaint::default()
            };
            pixmap.draw_pixmap(0, 0, sprite.as_ref(), &paint, transform, mask);
        }
    }

    /// Centred text over a translucent white box rotated with the text,
    /// as used for inline contour labels.
    pub fn draw_label_box(
        &self,
        pixmap: &mut Pixmap,
        text: &str,
        x: f32,
        y: f32,
        style: &TextStyle,
        mask: Option<&Mask>,
    ) {
        let style = style.aligned(Align::Middle, Baseline::Middle);
        let padding = style.size * 0.2;
        let half_w = self.text_width(text, style.size) / 2.0 + padding;
        let half_h = self.text_height(style.size) / 2.0 + padding;
        let (sin_a, cos_a) = style.angle.sin_cos();

        let mut pb = PathBuilder::new();
        let corners = [
            (-half_w, -half_h),
            (half_w, -half_h),
            (half_w, half_h),
            (-half_w, half_h),
        ];
        for (i, (cx, cy)) in corners.iter().enumerate() {
            let rx = cx * cos_a - cy * sin_a + x;
            let ry = cx * sin_a + cy * cos_a + y;
            if i == 0 {
                pb.move_to(rx, ry);
            } else {
                pb.line_to(rx, ry);
            }
        }
        pb.close();

        if let Some(path) = pb.finish() {
            pixmap.fill_path(
                &path,
                &Color::WHITE.with_alpha(220).paint(),
                FillRule::Winding,
                Transform::identity(),
                mask,
            );
        }

        self.draw_text(pixmap, text, x, y, &style, mask);
    }
}

/// Glyphs positioned on one line, top of the line at y = 0.
struct Layout {
    glyphs: Vec<PositionedGlyph<'static>>,
    width: f32,
    height: f32,
}

impl Layout {
    /// Coverage of every glyph in `color`, padded by [`SPRITE_PAD`].
    fn rasterize(&self, color: Color) -> Option<Pixmap> {
        if self.glyphs.is_empty() {
            return None;
        }
        let width = self.width.ceil().max(1.0) as u32 + 2 * SPRITE_PAD;
        let height = self.height.ceil().max(1.0) as u32 + 2 * SPRITE_PAD;
        let mut coverage = vec![0.0f32; (width * height) as usize];

        for glyph in &self.glyphs {
            let Some(bb) = glyph.pixel_bounding_box() else {
                continue;
            };
            glyph.draw(|gx, gy, v| {
                let px = bb.min.x + gx as i32 + SPRITE_PAD as i32;
                let py = bb.min.y + gy as i32 + SPRITE_PAD as i32;
                if px >= 0 && py >= 0 && (px as u32) < width && (py as u32) < height {
                    let cell = &mut coverage[(py as u32 * width + px as u32) as usize];
                    *cell = (*cell + v).min(1.0);
                }
            });
        }

        let mut sprite = Pixmap::new(width, height)?;
        for (pixel, &v) in sprite.pixels_mut().iter_mut().zip(&coverage) {
            if v <= 0.0 {
                continue;
            }
            let a = (v * color.a as f32).round() as u8;
            let premultiply = |c: u8| ((c as u16 * a as u16 + 127) / 255) as u8;
            if let Some(p) = PremultipliedColorU8::from_rgba(
                premultiply(color.r),
                premultiply(color.g),
                premultiply(color.b),
                a,
            ) {
                *pixel = p;
            }
        }
        Some(sprite)
    }
}

/// Fonts used by the free drawing functions: those passed to
/// [`install_fonts`], or the embedded face.
pub fn fonts() -> &'static FontSet {
    FONTS.get_or_init(FontSet::embedded)
}

/// Make `set` the process-wide font set. Returns false when text has
/// already been drawn or fonts were installed before.
pub fn install_fonts(set: FontSet) -> bool {
    FONTS.set(set).is_ok()
}

/// Horizontal alignment relative to the anchor point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    Start,
    Middle,
    End,
}

/// Vertical alignment relative to the anchor point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Baseline {
    Top,
    Middle,
    Bottom,
}

#[derive(Debug, Clone, Copy)]
pub struct TextStyle {
    /// Font size in pixels
    pub size: f32,
    pub color: Color,
    pub align: Align,
    pub baseline: Baseline,
    /// Rotation in radians, clockwise on screen
    pub angle: f32,
}

impl TextStyle {
    pub fn new(size: f32, color: Color) -> Self {
        Self {
            size,
            color,
            align: Align::Start,
            baseline: Baseline::Middle,
            angle: 0.0,
        }
    }

    pub fn aligned(mut self, align: Align, baseline: Baseline) -> Self {
        self.align = align;
        self.baseline = baseline;
        self
    }

    pub fn rotated(mut self, angle: f32) -> Self {
        self.angle = angle;
        self
    }
}

pub fn text_width(text: &str, size: f32) -> f32 {
    fonts().text_width(text, size)
}

pub fn text_height(size: f32) -> f32 {
    fonts().text_height(size)
}

pub fn draw_text(
    pixmap: &mut Pixmap,
    text: &str,
    x: f32,
    y: f32,
    style: &TextStyle,
    mask: Option<&Mask>,
) {
    fonts().draw_text(pixmap, text, x, y, style, mask);
}

pub fn draw_label_box(
    pixmap: &mut Pixmap,
    text: &str,
    x: f32,
    y: f32,
    style: &TextStyle,
    mask: Option<&Mask>,
) {
    fonts().draw_label_box(pixmap, text, x, y, style, mask);
}
