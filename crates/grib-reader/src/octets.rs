//! Big-endian octet readers shared by both GRIB editions.
//!
//! GRIB encodes negative integers as sign-and-magnitude (most significant
//! bit is the sign), not two's complement. Edition 1 also stores the
//! packing reference value as an IBM System/360 single-precision float.

pub(crate) fn u16_at(data: &[u8], offset: usize) -> u16 {
    u16::from_be_bytes([data[offset], data[offset + 1]])
}

pub(crate) fn u24_at(data: &[u8], offset: usize) -> u32 {
    u32::from_be_bytes([0, data[offset], data[offset + 1], data[offset + 2]])
}

pub(crate) fn u32_at(data: &[u8], offset: usize) -> u32 {
    u32::from_be_bytes([
        data[offset],
        data[offset + 1],
        data[offset + 2],
        data[offset + 3],
    ])
}

pub(crate) fn u64_at(data: &[u8], offset: usize) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&data[offset..offset + 8]);
    u64::from_be_bytes(buf)
}

pub(crate) fn signed16_at(data: &[u8], offset: usize) -> i16 {
    let raw = u16_at(data, offset);
    let magnitude = (raw & 0x7FFF) as i16;
    if raw & 0x8000 != 0 {
        -magnitude
    } else {
        magnitude
    }
}

pub(crate) fn signed24_at(data: &[u8], offset: usize) -> i32 {
    let raw = u24_at(data, offset);
    let magnitude = (raw & 0x7F_FFFF) as i32;
    if raw & 0x80_0000 != 0 {
        -magnitude
    } else {
        magnitude
    }
}

pub(crate) fn signed32_at(data: &[u8], offset: usize) -> i32 {
    let raw = u32_at(data, offset);
    let magnitude = (raw & 0x7FFF_FFFF) as i32;
    if raw & 0x8000_0000 != 0 {
        -magnitude
    } else {
        magnitude
    }
}

/// Decode an IBM single-precision float: sign bit, 7-bit base-16 exponent
/// biased by 64, 24-bit fraction.
pub(crate) fn ibm_f32_at(data: &[u8], offset: usize) -> f64 {
    let raw = u32_at(data, offset);
    let sign = if raw & 0x8000_0000 != 0 { -1.0 } else { 1.0 };
    let exponent = ((raw >> 24) & 0x7F) as i32;
    let mantissa = (raw & 0x00FF_FFFF) as f64;
    if mantissa == 0.0 {
        return 0.0;
    }
    sign * mantissa / 16_777_216.0 * 16f64.powi(exponent - 64)
}
