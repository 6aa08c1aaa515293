//! PNG output for rendered maps and charts.
//!
//! Rasters with at most 256 distinct colours are written as palette
//! images (colour type 3) with a palette sorted by colour value, so the
//! same pixels always give the same bytes. Everything else, which is any
//! map carrying anti-aliased text, is written as 8-bit RGBA (colour type
//! 6) with the Sub filter on every scanline.

use std::collections::BTreeSet;
use std::io::Write;
use std::path::Path;

use flate2::write::ZlibEncoder;
use flate2::Compression;
use rayon::prelude::*;
use tracing::debug;

use crate::error::{RenderError, RenderResult};

const SIGNATURE: [u8; 8] = [137, 80, 78, 71, 13, 10, 26, 10];
const MAX_PALETTE_SIZE: usize = 256;
/// Largest dimension PNG allows
const MAX_DIMENSION: usize = (1 << 31) - 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColorType {
    Indexed = 3,
    Rgba = 6,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Filter {
    None = 0,
    Sub = 1,
}

fn pack(px: &[u8]) -> u32 {
    u32::from_be_bytes([px[0], px[1], px[2], px[3]])
}

/// Distinct RGBA colours of a raster, ascending by packed value.
#[derive(Debug, Clone, PartialEq)]
struct Palette {
    colors: Vec<u32>,
}

impl Palette {
    /// Scan rows in parallel; `None` as soon as the raster has more than
    /// 256 colours.
    fn from_rgba(pixels: &[u8], width: usize) -> Option<Self> {
        let colors = pixels
            .par_chunks(width * 4)
            .try_fold(BTreeSet::new, |mut seen, row| {
                for px in row.chunks_exact(4) {
                    seen.insert(pack(px));
                    if seen.len() > MAX_PALETTE_SIZE {
                        return None;
                    }
                }
                Some(seen)
            })
            .try_reduce(BTreeSet::new, |mut a, b| {
                a.extend(b);
                (a.len() <= MAX_PALETTE_SIZE).then_some(a)
            })?;
        Some(Self {
            colors: colors.into_iter().collect(),
        })
    }

    fn len(&self) -> usize {
        self.colors.len()
    }

    fn indices(&self, pixels: &[u8]) -> Vec<u8> {
        pixels
            .par_chunks_exact(4)
            .map(|px| self.colors.binary_search(&pack(px)).unwrap_or(0) as u8)
            .collect()
    }

    fn plte(&self) -> Vec<u8> {
        self.colors
            .iter()
            .flat_map(|c| {
                let [r, g, b, _] = c.to_be_bytes();
                [r, g, b]
            })
            .collect()
    }

    /// Alpha per entry, only when some entry is not opaque.
    fn trns(&self) -> Option<Vec<u8>> {
        let alphas: Vec<u8> = self.colors.iter().map(|c| c.to_be_bytes()[3]).collect();
        alphas.iter().any(|&a| a < 255).then_some(alphas)
    }
}

/// Chunks in file order behind the signature.
struct ChunkWriter {
    out: Vec<u8>,
}

impl ChunkWriter {
    fn new() -> Self {
        Self {
            out: SIGNATURE.to_vec(),
        }
    }

    fn chunk(&mut self, kind: &[u8; 4], data: &[u8]) {
        self.out.extend_from_slice(&(data.len() as u32).to_be_bytes());
        self.out.extend_from_slice(kind);
        self.out.extend_from_slice(data);
        let mut crc = crc32fast::Hasher::new();
        crc.update(kind);
        crc.update(data);
        self.out.extend_from_slice(&crc.finalize().to_be_bytes());
    }

    fn finish(self) -> Vec<u8> {
        self.out
    }
}

fn check_dimensions(pixels: &[u8], width: usize, height: usize) -> RenderResult<()> {
    if width == 0 || height == 0 || width > MAX_DIMENSION || height > MAX_DIMENSION {
        return Err(RenderError::Encode(format!(
            "cannot encode a {}x{} image",
            width, height
        )));
    }
    let expected = width
        .checked_mul(height)
        .and_then(|n| n.checked_mul(4))
        .ok_or_else(|| RenderError::Encode(format!("{}x{} image is too large", width, height)))?;
    if pixels.len() != expected {
        return Err(RenderError::ShapeMismatch {
            what: "RGBA pixels",
            expected,
            actual: pixels.len(),
        });
    }
    Ok(())
}

fn header(width: usize, height: usize, color_type: ColorType) -> [u8; 13] {
    let mut ihdr = [0u8; 13];
    ihdr[0..4].copy_from_slice(&(width as u32).to_be_bytes());
    ihdr[4..8].copy_from_slice(&(height as u32).to_be_bytes());
    ihdr[8] = 8; // bit depth
    ihdr[9] = color_type as u8;
    // compression, filter and interlace methods stay 0
    ihdr
}

/// Prefix every scanline with its filter byte and apply the filter.
fn filter_scanlines(data: &[u8], row_bytes: usize, bpp: usize, filter: Filter) -> Vec<u8> {
    let rows: Vec<Vec<u8>> = data
        .par_chunks(row_bytes)
        .map(|row| {
            let mut line = Vec::with_capacity(row.len() + 1);
            line.push(filter as u8);
            match filter {
                Filter::None => line.extend_from_slice(row),
                Filter::Sub => line.extend(
                    row.iter()
                        .enumerate()
                        .map(|(i, &b)| if i < bpp { b } else { b.wrapping_sub(row[i - bpp]) }),
                ),
            }
            line
        })
        .collect();
    rows.concat()
}

fn deflate(data: &[u8]) -> RenderResult<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::with_capacity(data.len() / 4), Compression::default());
    encoder
        .write_all(data)
        .and_then(|_| encoder.finish())
        .map_err(|e| RenderError::Encode(format!("IDAT compression failed: {}", e)))
}

/// Encode straight (not premultiplied) RGBA pixels, 4 bytes per pixel.
pub fn encode_png(pixels: &[u8], width: usize, height: usize) -> RenderResult<Vec<u8>> {
    check_dimensions(pixels, width, height)?;
    let mut png = ChunkWriter::new();

    match Palette::from_rgba(pixels, width) {
        Some(palette) => {
            png.chunk(b"IHDR", &header(width, height, ColorType::Indexed));
            png.chunk(b"PLTE", &palette.plte());
            if let Some(trns) = palette.trns() {
                png.chunk(b"tRNS", &trns);
            }
            let indices = palette.indices(pixels);
            let scanlines = filter_scanlines(&indices, width, 1, Filter::None);
            png.chunk(b"IDAT", &deflate(&scanlines)?);
            debug!(width, height, colors = palette.len(), "Encoded palette PNG");
        }
        None => {
            png.chunk(b"IHDR", &header(width, height, ColorType::Rgba));
            let scanlines = filter_scanlines(pixels, width * 4, 4, Filter::Sub);
            png.chunk(b"IDAT", &deflate(&scanlines)?);
            debug!(width, height, "Encoded RGBA PNG");
        }
    }

    png.chunk(b"IEND", &[]);
    Ok(png.finish())
}

/// Encode and write a PNG file, replacing any existing file.
pub fn write_png(path: &Path, pixels: &[u8], width: usize, height: usize) -> RenderResult<()> {
    let png = encode_png(pixels, width, height)?;
    std::fs::write(path, &png)?;
    debug!(path = %path.display(), bytes = png.len(), "Wrote PNG");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use test_utils::{create_banded_pixels, create_test_rgba_pixels};

    /// (type, data) of every chunk.
    fn chunks(png: &[u8]) -> Vec<(String, Vec<u8>)> {
        let mut out = Vec::new();
        let mut pos = 8;
        while pos + 8 <= png.len() {
            let len = u32::from_be_bytes([png[pos], png[pos + 1], png[pos + 2], png[pos + 3]]) as usize;
            let kind = String::from_utf8_lossy(&png[pos + 4..pos + 8]).into_owned();
            out.push((kind, png[pos + 8..pos + 8 + len].to_vec()));
            pos += 12 + len;
        }
        out
    }

    fn kinds(png: &[u8]) -> Vec<String> {
        chunks(png).into_iter().map(|(kind, _)| kind).collect()
    }

    fn inflate_idat(png: &[u8]) -> Vec<u8> {
        let (_, idat) = chunks(png).into_iter().find(|(k, _)| k == "IDAT").unwrap();
        let mut out = Vec::new();
        flate2::read::ZlibDecoder::new(&idat[..]).read_to_end(&mut out).unwrap();
        out
    }

    #[test]
    fn test_palette_is_sorted_and_distinct() {
        let pixels = [
            255, 0, 0, 255, // red
            0, 255, 0, 255, // green
            0, 0, 255, 255, // blue
            255, 0, 0, 255, // red again
        ];
        let palette = Palette::from_rgba(&pixels, 2).unwrap();
        assert_eq!(palette.len(), 3);
        assert!(palette.colors.windows(2).all(|w| w[0] < w[1]));

        let indices = palette.indices(&pixels);
        assert_eq!(indices[0], indices[3]);
        assert_eq!(palette.plte()[indices[1] as usize * 3..][..3], [0, 255, 0]);
    }

    #[test]
    fn test_palette_indices_map_back_to_pixels() {
        let pixels = create_banded_pixels(128, 128, 7);
        let palette = Palette::from_rgba(&pixels, 128).unwrap();
        assert_eq!(palette.len(), 7);
        for (i, idx) in palette.indices(&pixels).into_iter().enumerate() {
            let color = palette.colors[idx as usize].to_be_bytes();
            assert_eq!(&pixels[i * 4..i * 4 + 4], &color);
        }
    }

    #[test]
    fn test_too_many_colours_has_no_palette() {
        let pixels = create_test_rgba_pixels(300, 300);
        assert!(Palette::from_rgba(&pixels, 300).is_none());
    }

    #[test]
    fn test_banded_map_is_indexed() {
        let pixels = create_banded_pixels(64, 64, 9);
        let png = encode_png(&pixels, 64, 64).unwrap();
        assert_eq!(&png[0..8], &SIGNATURE);
        assert_eq!(png[25], 3, "color type should be indexed");
        assert_eq!(kinds(&png), vec!["IHDR", "PLTE", "IDAT", "IEND"]);

        let raw = inflate_idat(&png);
        assert_eq!(raw.len(), 64 * 65);
        assert!(raw.chunks(65).all(|line| line[0] == Filter::None as u8));
    }

    #[test]
    fn test_same_pixels_same_bytes() {
        let pixels = create_banded_pixels(96, 96, 12);
        assert_eq!(
            encode_png(&pixels, 96, 96).unwrap(),
            encode_png(&pixels, 96, 96).unwrap()
        );
    }

    #[test]
    fn test_rgba_rows_use_sub_filter() {
        let width = 300;
        let pixels = create_test_rgba_pixels(width, 300);
        let png = encode_png(&pixels, width, 300).unwrap();
        assert_eq!(png[25], 6, "color type should be RGBA");

        let raw = inflate_idat(&png);
        let line = &raw[..1 + width * 4];
        assert_eq!(line[0], Filter::Sub as u8);
        let mut row = line[1..].to_vec();
        for i in 4..row.len() {
            row[i] = row[i].wrapping_add(row[i - 4]);
        }
        assert_eq!(&row[..], &pixels[..width * 4]);
    }

    #[test]
    fn test_transparency_chunk() {
        let pixels = [255, 0, 0, 255, 0, 0, 0, 0];
        let png = encode_png(&pixels, 2, 1).unwrap();
        let (_, trns) = chunks(&png).into_iter().find(|(k, _)| k == "tRNS").unwrap();
        // Transparent black sorts first
        assert_eq!(trns, vec![0, 255]);
    }

    #[test]
    fn test_bad_dimensions_rejected() {
        let err = encode_png(&[0u8; 12], 2, 2).unwrap_err();
        assert!(matches!(err, RenderError::ShapeMismatch { expected: 16, actual: 12, .. }));
        assert!(matches!(encode_png(&[], 0, 5), Err(RenderError::Encode(_))));
    }

    #[test]
    fn test_write_png_replaces_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.png");
        std::fs::write(&path, b"stale").unwrap();
        write_png(&path, &create_banded_pixels(8, 8, 2), 8, 8).unwrap();
        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(&bytes[1..4], b"PNG");
    }
}
