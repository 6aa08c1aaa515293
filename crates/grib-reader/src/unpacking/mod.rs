//! GRIB data unpacking.
//!
//! Both editions share the simple-packing formula:
//! value = (reference_value + packed_value * 2^binary_scale) * 10^(-decimal_scale)
//!
//! Only points flagged present in the bitmap occupy bits in the payload.

use crate::error::{GribError, GribResult};
use crate::record::PackedField;

/// Unpack a simple-packed field into `num_points` values, NaN where the
/// bitmap marks a point missing.
pub fn unpack_simple(field: &PackedField, num_points: usize) -> GribResult<Vec<f32>> {
    let decimal_scale = 10.0_f64.powi(-(field.decimal_scale_factor as i32));
    let bitmap = field.bitmap.as_deref();

    if let Some(bm) = bitmap {
        if bm.len() * 8 < num_points {
            return Err(GribError::UnpackingError(format!(
                "Bitmap covers {} points, grid has {}",
                bm.len() * 8,
                num_points
            )));
        }
    }

    if field.bits_per_value == 0 {
        // Constant field: every present point is the reference value
        let constant = (field.reference_value * decimal_scale) as f32;
        return Ok((0..num_points)
            .map(|i| {
                if is_present(bitmap, i) {
                    constant
                } else {
                    f32::NAN
                }
            })
            .collect());
    }

    if field.bits_per_value > 32 {
        return Err(GribError::UnpackingError(format!(
            "Invalid number of bits per value: {}",
            field.bits_per_value
        )));
    }

    let binary_scale = 2.0_f64.powi(field.binary_scale_factor as i32);
    let bits_per_value = field.bits_per_value as usize;
    let mut values = Vec::with_capacity(num_points);
    let mut bit_position = 0;

    for i in 0..num_points {
        if !is_present(bitmap, i) {
            values.push(f32::NAN);
            continue;
        }

        let packed_value = extract_bits(&field.data, bit_position, bits_per_value)
            .map_err(|e| GribError::UnpackingError(format!("Point {}: {}", i, e)))?;
        bit_position += bits_per_value;

        let value = (field.reference_value + packed_value as f64 * binary_scale) * decimal_scale;
        values.push(value as f32);
    }

    Ok(values)
}

fn is_present(bitmap: Option<&[u8]>, index: usize) -> bool {
    match bitmap {
        Some(bm) => (bm[index / 8] >> (7 - (index % 8))) & 1 == 1,
        None => true,
    }
}

/// Extract `num_bits` bits starting at `start_bit`, MSB first.
fn extract_bits(data: &[u8], start_bit: usize, num_bits: usize) -> Result<u32, String> {
    if num_bits > 32 || num_bits == 0 {
        return Err(format!("Invalid number of bits: {}", num_bits));
    }
    if (start_bit + num_bits + 7) / 8 > data.len() {
        return Err("Not enough data to extract bits".to_string());
    }

    let mut result = 0u64;
    let mut bit = start_bit;
    let end = start_bit + num_bits;

    while bit < end {
        let byte = data[bit / 8] as u64;
        let offset = bit % 8;
        let take = (8 - offset).min(end - bit);
        let chunk = (byte >> (8 - offset - take)) & ((1 << take) - 1);
        result = (result << take) | chunk;
        bit += take;
    }

    Ok(result as u32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn field(data: Vec<u8>, bits: u8, bitmap: Option<Vec<u8>>) -> PackedField {
        PackedField {
            reference_value: 0.0,
            binary_scale_factor: 0,
            decimal_scale_factor: 0,
            bits_per_value: bits,
            bitmap: bitmap.map(Bytes::from),
            data: Bytes::from(data),
        }
    }

    #[test]
    fn test_extract_bits() {
        let data = vec![0b10110101];

        assert_eq!(extract_bits(&data, 0, 2).unwrap(), 0b10);
        assert_eq!(extract_bits(&data, 2, 2).unwrap(), 0b11);
        assert_eq!(extract_bits(&data, 0, 8).unwrap(), 0b10110101);
    }

    #[test]
    fn test_extract_bits_across_bytes() {
        let data = vec![0b0000_1111, 0b1100_0000];
        assert_eq!(extract_bits(&data, 4, 6).unwrap(), 0b111111);
        assert!(extract_bits(&data, 12, 8).is_err());
    }

    #[test]
    fn test_simple_unpacking() {
        let values = unpack_simple(&field(vec![100, 200], 8, None), 2).unwrap();
        assert_eq!(values, vec![100.0, 200.0]);
    }

    #[test]
    fn test_scale_factors() {
        let mut f = field(vec![0, 1, 0, 2], 16, None);
        f.reference_value = 1000.0;
        f.binary_scale_factor = 1; // packed * 2
        f.decimal_scale_factor = 1; // / 10
        let values = unpack_simple(&f, 2).unwrap();
        assert!((values[0] - 100.2).abs() < 1e-4);
        assert!((values[1] - 100.4).abs() < 1e-4);
    }

    #[test]
    fn test_bitmap_skips_missing_points() {
        // Points 0 and 2 present, point 1 missing; only two values packed
        let values = unpack_simple(&field(vec![7, 9], 8, Some(vec![0b1010_0000])), 3).unwrap();
        assert_eq!(values[0], 7.0);
        assert!(values[1].is_nan());
        assert_eq!(values[2], 9.0);
    }

    #[test]
    fn test_constant_field() {
        let mut f = field(vec![], 0, None);
        f.reference_value = 1500.0;
        assert_eq!(unpack_simple(&f, 3).unwrap(), vec![1500.0; 3]);
    }

    #[test]
    fn test_truncated_payload_fails() {
        assert!(unpack_simple(&field(vec![1], 8, None), 2).is_err());
    }
}
