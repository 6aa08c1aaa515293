//! Colour maps for contour levels and categorical markers.

use serde::{Deserialize, Serialize};

/// Colour value in RGBA format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const WHITE: Color = Color::new(255, 255, 255, 255);
    pub const BLACK: Color = Color::new(0, 0, 0, 255);
    pub const GRAY: Color = Color::new(128, 128, 128, 255);

    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    /// Parse `#rrggbb` or `#rrggbbaa`.
    pub fn from_hex(hex: &str) -> Option<Self> {
        let hex = hex.trim_start_matches('#');
        let channel = |i: usize| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok();
        match hex.len() {
            6 => Some(Self::rgb(channel(0)?, channel(2)?, channel(4)?)),
            8 => Some(Self::new(channel(0)?, channel(2)?, channel(4)?, channel(6)?)),
            _ => None,
        }
    }

    pub fn with_alpha(self, a: u8) -> Self {
        Self { a, ..self }
    }

    pub(crate) fn paint(self) -> tiny_skia::Paint<'static> {
        let mut paint = tiny_skia::Paint::default();
        paint.set_color_rgba8(self.r, self.g, self.b, self.a);
        paint.anti_alias = true;
        paint
    }
}

/// Continuous colour maps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Colormap {
    /// Blue through green to red (gnuplot formulae 33, 13, 10)
    #[default]
    Rainbow,
    /// Rainbow reversed: red through green to blue
    RainbowR,
}

impl Colormap {
    /// Colour at `t` in [0, 1]; values outside are clamped.
    pub fn sample(self, t: f64) -> Color {
        let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) };
        let x = match self {
            Colormap::Rainbow => t,
            Colormap::RainbowR => 1.0 - t,
        };
        let r = (2.0 * x - 0.5).abs();
        let g = (std::f64::consts::PI * x).sin();
        let b = (std::f64::consts::FRAC_PI_2 * x).cos();
        Color::rgb(to_byte(r), to_byte(g), to_byte(b))
    }

    /// `n` distinct colours for categorical data, sampled away from the
    /// map's extremes at the interior points of an even `n + 2` split.
    pub fn categorical(self, n: usize) -> Vec<Color> {
        (1..=n)
            .map(|i| self.sample(i as f64 / (n + 1) as f64))
            .collect()
    }

    /// One colour per line-contour level, the levels normalised to [0, 1].
    pub fn for_levels(self, levels: &[f64]) -> Vec<Color> {
        let (lo, hi) = match (levels.first(), levels.last()) {
            (Some(&lo), Some(&hi)) => (lo, hi),
            _ => return Vec::new(),
        };
        levels
            .iter()
            .map(|&level| {
                if hi > lo {
                    self.sample((level - lo) / (hi - lo))
                } else {
                    self.sample(0.5)
                }
            })
            .collect()
    }

    /// Colours of filled bands: one per interior band (coloured at its
    /// midpoint), plus the under and over extensions at the map's ends.
    pub fn for_bands(self, levels: &[f64]) -> BandColors {
        let (lo, hi) = match (levels.first(), levels.last()) {
            (Some(&lo), Some(&hi)) if hi > lo => (lo, hi),
            _ => {
                return BandColors {
                    under: self.sample(0.0),
                    interior: Vec::new(),
                    over: self.sample(1.0),
                }
            }
        };
        let interior = levels
            .windows(2)
            .map(|w| self.sample(((w[0] + w[1]) / 2.0 - lo) / (hi - lo)))
            .collect();
        BandColors {
            under: self.sample(0.0),
            interior,
            over: self.sample(1.0),
        }
    }
}

/// Colours for filled contours with both ends extended.
#[derive(Debug, Clone, PartialEq)]
pub struct BandColors {
    /// Values below the first level
    pub under: Color,
    /// `levels.len() - 1` bands
    pub interior: Vec<Color>,
    /// Values at or above the last level
    pub over: Color,
}

fn to_byte(v: f64) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rainbow_ends() {
        // Purple-blue at 0, red at 1
        assert_eq!(Colormap::Rainbow.sample(0.0), Color::rgb(128, 0, 255));
        assert_eq!(Colormap::Rainbow.sample(1.0), Color::rgb(255, 0, 0));
        assert_eq!(Colormap::RainbowR.sample(0.0), Color::rgb(255, 0, 0));
    }

    #[test]
    fn test_categorical_avoids_extremes() {
        let colors = Colormap::RainbowR.categorical(6);
        assert_eq!(colors.len(), 6);
        assert_ne!(colors[0], Colormap::RainbowR.sample(0.0));
        assert_ne!(colors[5], Colormap::RainbowR.sample(1.0));
        assert_ne!(colors[0], colors[1]);
    }

    #[test]
    fn test_band_colors_for_default_levels() {
        let levels: Vec<f64> = (0..8).map(|i| 1200.0 + 50.0 * i as f64).collect();
        let bands = Colormap::Rainbow.for_bands(&levels);
        assert_eq!(bands.interior.len(), 7);
        assert_eq!(bands.under, Colormap::Rainbow.sample(0.0));
        assert_eq!(bands.over, Colormap::Rainbow.sample(1.0));
    }

    #[test]
    fn test_from_hex() {
        assert_eq!(Color::from_hex("#808080"), Some(Color::GRAY));
        assert_eq!(Color::from_hex("ff000080"), Some(Color::new(255, 0, 0, 128)));
        assert_eq!(Color::from_hex("#12"), None);
    }
}
