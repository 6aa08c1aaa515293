//! Test data generators for synthetic fields and images.
//!
//! These produce predictable patterns so tests can check values at known
//! positions.

/// A single hill centred in the grid, `peak` at the centre falling off
/// linearly to `base` at the corners. Closed contours form around the
/// centre for any level between the two.
pub fn create_hill_grid(width: usize, height: usize, base: f32, peak: f32) -> Vec<f32> {
    let cx = (width as f32 - 1.0) / 2.0;
    let cy = (height as f32 - 1.0) / 2.0;
    let max_dist = (cx * cx + cy * cy).sqrt().max(f32::EPSILON);

    let mut data = Vec::with_capacity(width * height);
    for row in 0..height {
        for col in 0..width {
            let dx = col as f32 - cx;
            let dy = row as f32 - cy;
            let t = (dx * dx + dy * dy).sqrt() / max_dist;
            data.push(peak + (base - peak) * t);
        }
    }
    data
}

/// Geopotential-height-like field: 1200 gpm in the south rising to 1600
/// gpm in the north, flat along rows.
pub fn create_height_gradient(width: usize, height: usize) -> Vec<f32> {
    let mut data = Vec::with_capacity(width * height);
    for row in 0..height {
        let t = row as f32 / (height.max(2) - 1) as f32;
        data.extend(std::iter::repeat(1200.0 + 400.0 * t).take(width));
    }
    data
}

/// A grid filled with a constant value.
pub fn create_constant_grid(width: usize, height: usize, value: f32) -> Vec<f32> {
    vec![value; width * height]
}

/// A zero grid with NaN at the given (col, row) positions.
pub fn create_grid_with_nans(
    width: usize,
    height: usize,
    nan_positions: &[(usize, usize)],
) -> Vec<f32> {
    let mut data = vec![0.0f32; width * height];
    for &(col, row) in nan_positions {
        if col < width && row < height {
            data[row * width + col] = f32::NAN;
        }
    }
    data
}

/// RGBA gradient pixels (4 bytes per pixel), for PNG encoder tests.
pub fn create_test_rgba_pixels(width: usize, height: usize) -> Vec<u8> {
    let mut pixels = Vec::with_capacity(width * height * 4);
    for y in 0..height {
        for x in 0..width {
            let r = ((x as f32 / width as f32) * 255.0) as u8;
            let g = ((y as f32 / height as f32) * 255.0) as u8;
            pixels.extend_from_slice(&[r, g, 128, 255]);
        }
    }
    pixels
}

/// RGBA pixels drawn from a handful of flat colours, the way a map with
/// filled bands looks. Suitable for indexed PNG encoding.
pub fn create_banded_pixels(width: usize, height: usize, bands: usize) -> Vec<u8> {
    let bands = bands.max(1);
    let mut pixels = Vec::with_capacity(width * height * 4);
    for y in 0..height {
        let band = (y * bands / height.max(1)).min(bands - 1);
        let shade = (band * 255 / bands) as u8;
        for _ in 0..width {
            pixels.extend_from_slice(&[shade, 255 - shade, 64, 255]);
        }
    }
    pixels
}

/// Deterministic pseudo-random features for `rows` samples around `centres`
/// cluster centres, flattened row-major with `features` columns.
pub fn create_blob_features(rows: usize, features: usize, centres: usize, seed: u32) -> Vec<f64> {
    let centres = centres.max(1);
    let mut data = Vec::with_capacity(rows * features);
    for row in 0..rows {
        let centre = (row % centres) as f64 * 10.0;
        for col in 0..features {
            let jitter = (simple_hash(row as u32, col as u32, seed) % 1000) as f64 / 1000.0;
            data.push(centre + jitter - 0.5);
        }
    }
    data
}

fn simple_hash(x: u32, y: u32, seed: u32) -> u32 {
    let mut h = seed;
    h = h.wrapping_mul(31).wrapping_add(x);
    h = h.wrapping_mul(31).wrapping_add(y);
    h ^= h >> 16;
    h = h.wrapping_mul(0x85eb_ca6b);
    h ^= h >> 13;
    h = h.wrapping_mul(0xc2b2_ae35);
    h ^= h >> 16;
    h
}
