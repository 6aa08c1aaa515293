//! Synthetic GRIB messages for exercising the reader.
//!
//! The builders produce structurally valid edition 1 and edition 2
//! messages on a small regular lat/lon grid with 16-bit simple packing.
//! NaN values are written as missing points through a bitmap.

/// Regular lat/lon mesh shared by both builders, in degrees.
#[derive(Debug, Clone, Copy)]
pub struct TestMesh {
    pub ni: usize,
    pub nj: usize,
    pub first_lat: f64,
    pub first_lon: f64,
    pub last_lat: f64,
    pub last_lon: f64,
    pub increment: f64,
}

impl TestMesh {
    /// 5 x 4 mesh over Japan at 10 degrees, rows stored north to south
    /// as JRA-55 does.
    pub const JAPAN_NORTH_FIRST: TestMesh = TestMesh {
        ni: 5,
        nj: 4,
        first_lat: 50.0,
        first_lon: 120.0,
        last_lat: 20.0,
        last_lon: 160.0,
        increment: 10.0,
    };

    /// Same mesh with rows stored south to north.
    pub const JAPAN_SOUTH_FIRST: TestMesh = TestMesh {
        ni: 5,
        nj: 4,
        first_lat: 20.0,
        first_lon: 120.0,
        last_lat: 50.0,
        last_lon: 160.0,
        increment: 10.0,
    };

    pub fn num_points(&self) -> usize {
        self.ni * self.nj
    }

    /// Scanning mode byte: +i, and +j when rows run northward.
    fn scanning_mode(&self) -> u8 {
        if self.last_lat > self.first_lat {
            0x40
        } else {
            0x00
        }
    }
}

/// Build GRIB edition 1 messages in the layout JRA-55 distributes.
#[derive(Debug, Clone)]
pub struct Grib1Builder {
    table_version: u8,
    center: u8,
    parameter: u8,
    level_type: u8,
    level: u16,
    year: u16,
    month: u8,
    day: u8,
    hour: u8,
    forecast_hour: u8,
    decimal_scale: i16,
    mesh: TestMesh,
    values: Vec<f32>,
}

impl Grib1Builder {
    /// 850 hPa geopotential height from JMA, 2012-01-10 12Z.
    pub fn jra55_hgt() -> Self {
        let mesh = TestMesh::JAPAN_NORTH_FIRST;
        Self {
            table_version: 200,
            center: 34,
            parameter: 7,
            level_type: 100,
            level: 850,
            year: 2012,
            month: 1,
            day: 10,
            hour: 12,
            forecast_hour: 0,
            decimal_scale: 0,
            mesh,
            values: vec![1500.0; mesh.num_points()],
        }
    }

    pub fn with_parameter(mut self, parameter: u8) -> Self {
        self.parameter = parameter;
        self
    }

    pub fn with_level(mut self, level_type: u8, level: u16) -> Self {
        self.level_type = level_type;
        self.level = level;
        self
    }

    pub fn with_reference_time(mut self, year: u16, month: u8, day: u8, hour: u8) -> Self {
        self.year = year;
        self.month = month;
        self.day = day;
        self.hour = hour;
        self
    }

    pub fn with_decimal_scale(mut self, decimal_scale: i16) -> Self {
        self.decimal_scale = decimal_scale;
        self
    }

    pub fn with_mesh(mut self, mesh: TestMesh) -> Self {
        self.mesh = mesh;
        self.values = vec![0.0; mesh.num_points()];
        self
    }

    pub fn with_values(mut self, values: Vec<f32>) -> Self {
        self.values = values;
        self
    }

    /// Complete message bytes, `GRIB` through `7777`.
    pub fn build(&self) -> Vec<u8> {
        let packing = Packing::new(&self.values, self.decimal_scale, |r| {
            ibm_to_f64(f64_to_ibm(r))
        });

        let pds = self.build_pds(packing.bitmap.is_some());
        let gds = self.build_gds();
        let bms = packing.bitmap.as_ref().map(|bits| {
            let mut section = Vec::with_capacity(6 + bits.len());
            section.extend_from_slice(&u24(6 + bits.len() as u32));
            section.push(0); // unused bits at end
            section.extend_from_slice(&[0, 0]); // bitmap follows
            section.extend_from_slice(bits);
            section
        });
        let bds = {
            let mut section = Vec::with_capacity(11 + packing.data.len());
            section.extend_from_slice(&u24(11 + packing.data.len() as u32));
            section.push(0); // grid point data, simple packing, float
            section.extend_from_slice(&sign_magnitude16(packing.binary_scale));
            section.extend_from_slice(&f64_to_ibm(packing.reference));
            section.push(packing.bits);
            section.extend_from_slice(&packing.data);
            section
        };

        let total = 8 + pds.len() + gds.len() + bms.as_ref().map_or(0, Vec::len) + bds.len() + 4;
        let mut message = Vec::with_capacity(total);
        message.extend_from_slice(b"GRIB");
        message.extend_from_slice(&u24(total as u32));
        message.push(1);
        message.extend_from_slice(&pds);
        message.extend_from_slice(&gds);
        if let Some(bms) = bms {
            message.extend_from_slice(&bms);
        }
        message.extend_from_slice(&bds);
        message.extend_from_slice(b"7777");
        message
    }

    fn build_pds(&self, has_bitmap: bool) -> Vec<u8> {
        let century = (self.year - 1) / 100 + 1;
        let year_of_century = self.year - (century - 1) * 100;

        let mut pds = vec![0u8; 28];
        pds[0..3].copy_from_slice(&u24(28));
        pds[3] = self.table_version;
        pds[4] = self.center;
        pds[5] = 0; // generating process
        pds[6] = 255; // grid defined by GDS
        pds[7] = 0x80 | if has_bitmap { 0x40 } else { 0 };
        pds[8] = self.parameter;
        pds[9] = self.level_type;
        pds[10..12].copy_from_slice(&self.level.to_be_bytes());
        pds[12] = year_of_century as u8;
        pds[13] = self.month;
        pds[14] = self.day;
        pds[15] = self.hour;
        pds[16] = 0;
        pds[17] = 1; // hours
        pds[18] = self.forecast_hour;
        pds[24] = century as u8;
        pds[26..28].copy_from_slice(&sign_magnitude16(self.decimal_scale));
        pds
    }

    fn build_gds(&self) -> Vec<u8> {
        let mesh = &self.mesh;
        let millidegrees = |deg: f64| (deg * 1000.0).round() as i32;
        let increment = (mesh.increment * 1000.0).round() as u16;

        let mut gds = vec![0u8; 32];
        gds[0..3].copy_from_slice(&u24(32));
        gds[3] = 0;
        gds[4] = 255;
        gds[5] = 0; // regular lat/lon
        gds[6..8].copy_from_slice(&(mesh.ni as u16).to_be_bytes());
        gds[8..10].copy_from_slice(&(mesh.nj as u16).to_be_bytes());
        gds[10..13].copy_from_slice(&sign_magnitude24(millidegrees(mesh.first_lat)));
        gds[13..16].copy_from_slice(&sign_magnitude24(millidegrees(mesh.first_lon)));
        gds[16] = 0x80; // increments given
        gds[17..20].copy_from_slice(&sign_magnitude24(millidegrees(mesh.last_lat)));
        gds[20..23].copy_from_slice(&sign_magnitude24(millidegrees(mesh.last_lon)));
        gds[23..25].copy_from_slice(&increment.to_be_bytes());
        gds[25..27].copy_from_slice(&increment.to_be_bytes());
        gds[27] = mesh.scanning_mode();
        gds
    }
}

/// One product (sections 4 to 7) inside a GRIB2 message.
#[derive(Debug, Clone)]
struct Grib2Field {
    category: u8,
    number: u8,
    level_type: u8,
    /// Level in the unit written on the wire (Pa for isobaric surfaces)
    level: u32,
    values: Vec<f32>,
}

/// Build GRIB edition 2 messages, optionally with several fields that
/// share one grid definition.
#[derive(Debug, Clone)]
pub struct Grib2Builder {
    center: u16,
    year: u16,
    month: u8,
    day: u8,
    hour: u8,
    decimal_scale: i16,
    mesh: TestMesh,
    fields: Vec<Grib2Field>,
}

impl Grib2Builder {
    /// 850 hPa geopotential height on the north-first test mesh.
    pub fn hgt_850() -> Self {
        let mesh = TestMesh::JAPAN_NORTH_FIRST;
        Self {
            center: 34,
            year: 2012,
            month: 1,
            day: 10,
            hour: 12,
            decimal_scale: 0,
            mesh,
            fields: vec![Grib2Field {
                category: 3,
                number: 5,
                level_type: 100,
                level: 85_000,
                values: vec![1500.0; mesh.num_points()],
            }],
        }
    }

    pub fn with_mesh(mut self, mesh: TestMesh) -> Self {
        self.mesh = mesh;
        for field in &mut self.fields {
            field.values = vec![0.0; mesh.num_points()];
        }
        self
    }

    pub fn with_decimal_scale(mut self, decimal_scale: i16) -> Self {
        self.decimal_scale = decimal_scale;
        self
    }

    /// Replace the values of the first field.
    pub fn with_values(mut self, values: Vec<f32>) -> Self {
        if let Some(field) = self.fields.first_mut() {
            field.values = values;
        }
        self
    }

    /// Append another isobaric field of the same parameter, level in hPa.
    pub fn with_extra_level(mut self, level_hpa: u32, values: Vec<f32>) -> Self {
        let (category, number) = self
            .fields
            .first()
            .map_or((3, 5), |f| (f.category, f.number));
        self.fields.push(Grib2Field {
            category,
            number,
            level_type: 100,
            level: level_hpa * 100,
            values,
        });
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut body = Vec::new();
        body.extend_from_slice(&self.build_section1());
        body.extend_from_slice(&self.build_section3());
        for field in &self.fields {
            let packing = Packing::new(&field.values, self.decimal_scale, |r| r as f32 as f64);
            body.extend_from_slice(&build_section4(field));
            body.extend_from_slice(&build_section5(&packing));
            body.extend_from_slice(&build_section6(&packing));
            body.extend_from_slice(&build_section7(&packing));
        }

        let total = 16 + body.len() + 4;
        let mut message = Vec::with_capacity(total);
        message.extend_from_slice(b"GRIB");
        message.extend_from_slice(&[0, 0]);
        message.push(0); // meteorological
        message.push(2);
        message.extend_from_slice(&(total as u64).to_be_bytes());
        message.extend_from_slice(&body);
        message.extend_from_slice(b"7777");
        message
    }

    fn build_section1(&self) -> Vec<u8> {
        let mut section = Vec::with_capacity(21);
        section.extend_from_slice(&21u32.to_be_bytes());
        section.push(1);
        section.extend_from_slice(&self.center.to_be_bytes());
        section.extend_from_slice(&0u16.to_be_bytes()); // sub-center
        section.push(2); // master table version
        section.push(1); // local table version
        section.push(0); // analysis
        section.extend_from_slice(&self.year.to_be_bytes());
        section.push(self.month);
        section.push(self.day);
        section.push(self.hour);
        section.push(0);
        section.push(0);
        section.push(0); // operational
        section.push(0); // analysis products
        section
    }

    fn build_section3(&self) -> Vec<u8> {
        let mesh = &self.mesh;
        let microdegrees = |deg: f64| (deg * 1e6).round() as i32;
        let increment = (mesh.increment * 1e6).round() as u32;

        let mut section = Vec::with_capacity(72);
        section.extend_from_slice(&72u32.to_be_bytes());
        section.push(3);
        section.push(0); // source of grid definition
        section.extend_from_slice(&(mesh.num_points() as u32).to_be_bytes());
        section.push(0);
        section.push(0);
        section.extend_from_slice(&0u16.to_be_bytes()); // template 3.0

        section.push(6); // spherical earth, radius 6371229 m
        section.push(0);
        section.extend_from_slice(&0u32.to_be_bytes());
        section.push(0);
        section.extend_from_slice(&0u32.to_be_bytes());
        section.push(0);
        section.extend_from_slice(&0u32.to_be_bytes());
        section.extend_from_slice(&(mesh.ni as u32).to_be_bytes());
        section.extend_from_slice(&(mesh.nj as u32).to_be_bytes());
        section.extend_from_slice(&0u32.to_be_bytes()); // basic angle
        section.extend_from_slice(&u32::MAX.to_be_bytes()); // subdivisions
        section.extend_from_slice(&sign_magnitude32(microdegrees(mesh.first_lat)));
        section.extend_from_slice(&sign_magnitude32(microdegrees(mesh.first_lon)));
        section.push(48); // increments given
        section.extend_from_slice(&sign_magnitude32(microdegrees(mesh.last_lat)));
        section.extend_from_slice(&sign_magnitude32(microdegrees(mesh.last_lon)));
        section.extend_from_slice(&increment.to_be_bytes());
        section.extend_from_slice(&increment.to_be_bytes());
        section.push(mesh.scanning_mode());
        section
    }
}

fn build_section4(field: &Grib2Field) -> Vec<u8> {
    let mut section = Vec::with_capacity(34);
    section.extend_from_slice(&34u32.to_be_bytes());
    section.push(4);
    section.extend_from_slice(&0u16.to_be_bytes()); // coordinate values
    section.extend_from_slice(&0u16.to_be_bytes()); // template 4.0
    section.push(field.category);
    section.push(field.number);
    section.push(0); // analysis
    section.push(0);
    section.push(0);
    section.extend_from_slice(&0u16.to_be_bytes());
    section.push(0);
    section.push(1); // hours
    section.extend_from_slice(&0u32.to_be_bytes()); // forecast time
    section.push(field.level_type);
    section.push(0); // scale factor
    section.extend_from_slice(&field.level.to_be_bytes());
    section.push(255); // no second surface
    section.push(0);
    section.extend_from_slice(&0u32.to_be_bytes());
    section
}

fn build_section5(packing: &Packing) -> Vec<u8> {
    let mut section = Vec::with_capacity(21);
    section.extend_from_slice(&21u32.to_be_bytes());
    section.push(5);
    section.extend_from_slice(&(packing.present as u32).to_be_bytes());
    section.extend_from_slice(&0u16.to_be_bytes()); // template 5.0
    section.extend_from_slice(&(packing.reference as f32).to_be_bytes());
    section.extend_from_slice(&sign_magnitude16(packing.binary_scale));
    section.extend_from_slice(&sign_magnitude16(packing.decimal_scale));
    section.push(packing.bits);
    section.push(0); // floating point
    section
}

fn build_section6(packing: &Packing) -> Vec<u8> {
    match &packing.bitmap {
        Some(bits) => {
            let mut section = Vec::with_capacity(6 + bits.len());
            section.extend_from_slice(&(6 + bits.len() as u32).to_be_bytes());
            section.push(6);
            section.push(0);
            section.extend_from_slice(bits);
            section
        }
        None => {
            let mut section = Vec::with_capacity(6);
            section.extend_from_slice(&6u32.to_be_bytes());
            section.push(6);
            section.push(255);
            section
        }
    }
}

fn build_section7(packing: &Packing) -> Vec<u8> {
    let mut section = Vec::with_capacity(5 + packing.data.len());
    section.extend_from_slice(&(5 + packing.data.len() as u32).to_be_bytes());
    section.push(7);
    section.extend_from_slice(&packing.data);
    section
}

/// 16-bit simple packing of the finite values, with a bitmap when any
/// value is NaN.
struct Packing {
    reference: f64,
    binary_scale: i16,
    decimal_scale: i16,
    bits: u8,
    present: usize,
    bitmap: Option<Vec<u8>>,
    data: Vec<u8>,
}

impl Packing {
    /// `round_reference` reproduces the precision loss of the wire format
    /// so packed offsets are computed against the value a reader will see.
    fn new(values: &[f32], decimal_scale: i16, round_reference: impl Fn(f64) -> f64) -> Self {
        let factor = 10f64.powi(decimal_scale as i32);
        let scaled: Vec<Option<f64>> = values
            .iter()
            .map(|&v| (!v.is_nan()).then(|| v as f64 * factor))
            .collect();

        let bitmap = values.iter().any(|v| v.is_nan()).then(|| {
            let mut bits = vec![0u8; (values.len() + 7) / 8];
            for (i, v) in scaled.iter().enumerate() {
                if v.is_some() {
                    bits[i / 8] |= 0x80 >> (i % 8);
                }
            }
            bits
        });

        let present: Vec<f64> = scaled.into_iter().flatten().collect();
        let min = present.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = present.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let reference = if present.is_empty() { 0.0 } else { round_reference(min) };
        let range = max - reference;

        if present.is_empty() || range <= 0.0 {
            return Self {
                reference,
                binary_scale: 0,
                decimal_scale,
                bits: 0,
                present: present.len(),
                bitmap,
                data: Vec::new(),
            };
        }

        let binary_scale = (range / 65535.0).log2().ceil() as i16;
        let step = 2f64.powi(binary_scale as i32);
        let mut data = Vec::with_capacity(present.len() * 2);
        for v in &present {
            let packed = ((v - reference) / step).round().clamp(0.0, 65535.0) as u16;
            data.extend_from_slice(&packed.to_be_bytes());
        }

        Self {
            reference,
            binary_scale,
            decimal_scale,
            bits: 16,
            present: present.len(),
            bitmap,
            data,
        }
    }
}

fn u24(value: u32) -> [u8; 3] {
    let b = value.to_be_bytes();
    [b[1], b[2], b[3]]
}

/// GRIB sign-and-magnitude encodings.
pub fn sign_magnitude16(value: i16) -> [u8; 2] {
    let magnitude = value.unsigned_abs() & 0x7FFF;
    let sign = if value < 0 { 0x8000 } else { 0 };
    (magnitude | sign).to_be_bytes()
}

pub fn sign_magnitude24(value: i32) -> [u8; 3] {
    let magnitude = value.unsigned_abs() & 0x7F_FFFF;
    let sign = if value < 0 { 0x80_0000 } else { 0 };
    u24(magnitude | sign)
}

pub fn sign_magnitude32(value: i32) -> [u8; 4] {
    let magnitude = value.unsigned_abs() & 0x7FFF_FFFF;
    let sign = if value < 0 { 0x8000_0000 } else { 0 };
    (magnitude | sign).to_be_bytes()
}

/// Encode an IBM single-precision float, truncating the fraction.
pub fn f64_to_ibm(value: f64) -> [u8; 4] {
    if value == 0.0 || !value.is_finite() {
        return [0; 4];
    }
    let sign: u32 = if value < 0.0 { 0x8000_0000 } else { 0 };
    let mut fraction = value.abs();
    let mut exponent: i32 = 64;
    while fraction >= 1.0 {
        fraction /= 16.0;
        exponent += 1;
    }
    while fraction < 0.0625 {
        fraction *= 16.0;
        exponent -= 1;
    }
    let mantissa = ((fraction * 16_777_216.0) as u32).min(0x00FF_FFFF);
    (sign | ((exponent as u32 & 0x7F) << 24) | mantissa).to_be_bytes()
}

fn ibm_to_f64(bytes: [u8; 4]) -> f64 {
    let raw = u32::from_be_bytes(bytes);
    let mantissa = (raw & 0x00FF_FFFF) as f64;
    if mantissa == 0.0 {
        return 0.0;
    }
    let sign = if raw & 0x8000_0000 != 0 { -1.0 } else { 1.0 };
    let exponent = ((raw >> 24) & 0x7F) as i32;
    sign * mantissa / 16_777_216.0 * 16f64.powi(exponent - 64)
}

/// A smooth height-like field, one value per point of `mesh` in storage
/// order, rising from south to north: `base + 10 * latitude + column`.
pub fn height_field(mesh: &TestMesh, base: f32) -> Vec<f32> {
    let lat_step = if mesh.nj > 1 {
        (mesh.last_lat - mesh.first_lat) / (mesh.nj - 1) as f64
    } else {
        0.0
    };
    let mut values = Vec::with_capacity(mesh.num_points());
    for j in 0..mesh.nj {
        let lat = mesh.first_lat + lat_step * j as f64;
        for i in 0..mesh.ni {
            values.push(base + 10.0 * lat as f32 + i as f32);
        }
    }
    values
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grib1_message_framing() {
        let message = Grib1Builder::jra55_hgt().build();
        assert_eq!(&message[0..4], b"GRIB");
        assert_eq!(message[7], 1);
        let length = u32::from_be_bytes([0, message[4], message[5], message[6]]) as usize;
        assert_eq!(length, message.len());
        assert_eq!(&message[message.len() - 4..], b"7777");
    }

    #[test]
    fn test_grib2_message_framing() {
        let message = Grib2Builder::hgt_850()
            .with_extra_level(500, vec![5500.0; 20])
            .build();
        assert_eq!(&message[0..4], b"GRIB");
        assert_eq!(message[7], 2);
        let mut length = [0u8; 8];
        length.copy_from_slice(&message[8..16]);
        assert_eq!(u64::from_be_bytes(length) as usize, message.len());
    }

    #[test]
    fn test_sign_magnitude_encoding() {
        assert_eq!(sign_magnitude16(-3), [0x80, 0x03]);
        assert_eq!(sign_magnitude24(-90_000), [0x81, 0x5F, 0x90]);
        assert_eq!(sign_magnitude32(1), [0, 0, 0, 1]);
    }

    #[test]
    fn test_ibm_encoding() {
        assert_eq!(f64_to_ibm(1.0), [0x41, 0x10, 0x00, 0x00]);
        assert_eq!(f64_to_ibm(-118.625), [0xC2, 0x76, 0xA0, 0x00]);
        assert_eq!(ibm_to_f64(f64_to_ibm(1500.0)), 1500.0);
    }

    #[test]
    fn test_height_field_rises_northward() {
        let values = height_field(&TestMesh::JAPAN_SOUTH_FIRST, 1000.0);
        assert_eq!(values.len(), 20);
        assert!(values[15] > values[0]);
    }
}
