//! GRIB2 section parsing.
//!
//! A GRIB2 message is an indicator (section 0) followed by numbered
//! sections and the `7777` end marker. Sections 2-7 may repeat inside one
//! message; every section 7 closes one field, using the most recent
//! grid, product, representation and bitmap sections.

use bytes::Bytes;
use chrono::{DateTime, NaiveDate, Utc};

use crate::error::{GribError, GribResult};
use crate::octets::{signed16_at, signed32_at, u16_at, u32_at, u64_at};
use crate::record::{GribRecord, LatLonGrid, PackedField, RecordInfo};
use crate::tables::{grib2_parameter, LevelKind};

/// Section 0: Indicator Section (16 bytes)
#[derive(Debug, Clone)]
pub struct Indicator {
    pub discipline: u8,
    pub edition: u8,
    pub message_length: u64,
}

/// Section 1: Identification Section
#[derive(Debug, Clone)]
pub struct Identification {
    pub center: u16,
    pub sub_center: u16,
    pub reference_time: DateTime<Utc>,
}

/// Section 4: Product Definition Section
#[derive(Debug, Clone)]
pub struct ProductDefinition {
    pub template: u16,
    pub parameter_category: u8,
    pub parameter_number: u8,
    pub forecast_time: u32,
    pub level_kind: LevelKind,
    /// Level value after scale factor; hPa for isobaric surfaces
    pub level_value: f64,
}

/// Section 5: Data Representation Section
#[derive(Debug, Clone)]
pub struct DataRepresentation {
    pub num_data_points: u32,
    pub template: u16,
    pub reference_value: f32,
    pub binary_scale_factor: i16,
    pub decimal_scale_factor: i16,
    pub bits_per_value: u8,
}

/// Section 6: Bitmap Section
#[derive(Debug, Clone)]
pub enum Bitmap {
    Present(Bytes),
    /// Reuse the bitmap defined earlier in the same message
    PreviouslyDefined,
    Absent,
}

// ===== Parsing Functions =====

/// Parse Section 0 (Indicator) from start of message
pub fn parse_indicator(data: &[u8]) -> GribResult<Indicator> {
    if data.len() < 16 {
        return Err(GribError::InvalidFormat(
            "Not enough data for indicator section".to_string(),
        ));
    }

    if &data[0..4] != b"GRIB" {
        return Err(GribError::InvalidFormat("Invalid GRIB magic bytes".to_string()));
    }

    // Octets 1-4: "GRIB", 5-6: reserved, 7: discipline, 8: edition,
    // 9-16: total length of the message
    let discipline = data[6];
    let edition = data[7];

    if edition != 2 {
        return Err(GribError::InvalidFormat(format!(
            "Expected GRIB edition 2, got {}",
            edition
        )));
    }

    Ok(Indicator {
        discipline,
        edition,
        message_length: u64_at(data, 8),
    })
}

/// Parse Section 1 (Identification). `section` starts at the length octets.
pub fn parse_identification(section: &[u8]) -> GribResult<Identification> {
    if section.len() < 21 {
        return Err(GribError::InvalidSection {
            section: 1,
            reason: "Not enough data".to_string(),
        });
    }

    let center = u16_at(section, 5);
    let sub_center = u16_at(section, 7);

    let year = u16_at(section, 12);
    let (month, day, hour, minute, second) =
        (section[14], section[15], section[16], section[17], section[18]);

    let reference_time = NaiveDate::from_ymd_opt(year as i32, month as u32, day as u32)
        .and_then(|date| date.and_hms_opt(hour as u32, minute as u32, second as u32))
        .ok_or_else(|| GribError::InvalidSection {
            section: 1,
            reason: format!(
                "Invalid date: {}-{:02}-{:02} {:02}:{:02}:{:02}",
                year, month, day, hour, minute, second
            ),
        })?;

    Ok(Identification {
        center,
        sub_center,
        reference_time: DateTime::<Utc>::from_naive_utc_and_offset(reference_time, Utc),
    })
}

/// Parse Section 3 (Grid Definition). Only template 3.0 (regular
/// latitude/longitude) is supported.
pub fn parse_grid_definition(section: &[u8]) -> GribResult<LatLonGrid> {
    if section.len() < 14 {
        return Err(GribError::InvalidSection {
            section: 3,
            reason: "Not enough data".to_string(),
        });
    }

    // Octets 13-14: grid definition template number
    let template = u16_at(section, 12);
    if template != 0 {
        return Err(GribError::Unsupported(format!(
            "grid definition template 3.{}",
            template
        )));
    }

    // Template 3.0 data starts at octet 15
    let gd = &section[14..];
    if gd.len() < 58 {
        return Err(GribError::InvalidSection {
            section: 3,
            reason: format!("Template 0 needs at least 58 bytes, got {}", gd.len()),
        });
    }

    let ni = u32_at(gd, 16) as usize;
    let nj = u32_at(gd, 20) as usize;

    // Angles are in microdegrees unless a basic angle and subdivisions are given
    let basic_angle = u32_at(gd, 24);
    let subdivisions = u32_at(gd, 28);
    let unit = if basic_angle == 0
        || basic_angle == u32::MAX
        || subdivisions == 0
        || subdivisions == u32::MAX
    {
        1e-6
    } else {
        basic_angle as f64 / subdivisions as f64
    };

    let increment = |raw: u32| if raw == u32::MAX { 0.0 } else { raw as f64 * unit };

    let grid = LatLonGrid {
        ni,
        nj,
        first_lat: signed32_at(gd, 32) as f64 * unit,
        first_lon: signed32_at(gd, 36) as f64 * unit,
        last_lat: signed32_at(gd, 41) as f64 * unit,
        last_lon: signed32_at(gd, 45) as f64 * unit,
        lon_increment: increment(u32_at(gd, 49)),
        lat_increment: increment(u32_at(gd, 53)),
        scanning_mode: gd[57],
    };
    grid.validate(3)?;
    Ok(grid)
}

/// Parse Section 4 (Product Definition).
///
/// Templates 4.0 through 4.15 share the layout read here: parameter,
/// forecast time and first fixed surface.
pub fn parse_product_definition(section: &[u8]) -> GribResult<ProductDefinition> {
    if section.len() < 34 {
        return Err(GribError::InvalidSection {
            section: 4,
            reason: "Not enough data".to_string(),
        });
    }

    let template = u16_at(section, 7);
    if template > 15 {
        return Err(GribError::Unsupported(format!(
            "product definition template 4.{}",
            template
        )));
    }

    let parameter_category = section[9];
    let parameter_number = section[10];
    let forecast_time = u32_at(section, 18);

    let level_type = section[22];
    let scale_factor = section[23];
    let scaled_value = u32_at(section, 24);

    let level_kind = LevelKind::from_grib2(level_type);
    let mut level_value = if scaled_value == u32::MAX {
        0.0
    } else if scale_factor == u8::MAX {
        scaled_value as f64
    } else {
        let magnitude = (scale_factor & 0x7F) as i32;
        let scale = if scale_factor & 0x80 != 0 { -magnitude } else { magnitude };
        scaled_value as f64 * 10f64.powi(-scale)
    };
    if level_kind == LevelKind::Isobaric {
        // Pa on the wire, hPa everywhere else
        level_value /= 100.0;
    }

    Ok(ProductDefinition {
        template,
        parameter_category,
        parameter_number,
        forecast_time,
        level_kind,
        level_value,
    })
}

/// Parse Section 5 (Data Representation)
pub fn parse_data_representation(section: &[u8]) -> GribResult<DataRepresentation> {
    if section.len() < 21 {
        return Err(GribError::InvalidSection {
            section: 5,
            reason: "Not enough data".to_string(),
        });
    }

    // Octets 6-9: number of packed values, 10-11: template number.
    // Template 5.0: 12-15 reference value (IEEE float), 16-17 binary scale,
    // 18-19 decimal scale, 20 bits per value.
    let template = u16_at(section, 9);
    let reference_value = f32::from_bits(u32_at(section, 11));

    Ok(DataRepresentation {
        num_data_points: u32_at(section, 5),
        template,
        reference_value,
        binary_scale_factor: signed16_at(section, 15),
        decimal_scale_factor: signed16_at(section, 17),
        bits_per_value: section[19],
    })
}

/// Parse Section 6 (Bitmap)
pub fn parse_bitmap(section: &Bytes) -> GribResult<Bitmap> {
    if section.len() < 6 {
        return Err(GribError::InvalidSection {
            section: 6,
            reason: "Not enough data".to_string(),
        });
    }

    match section[5] {
        0 => Ok(Bitmap::Present(section.slice(6..))),
        254 => Ok(Bitmap::PreviouslyDefined),
        255 => Ok(Bitmap::Absent),
        other => Err(GribError::Unsupported(format!(
            "predefined bitmap indicator {}",
            other
        ))),
    }
}

/// Decode every field of one GRIB2 message.
///
/// `first_number` is the 1-based record number assigned to the first field.
pub fn decode_message(message: &Bytes, first_number: usize) -> GribResult<Vec<GribRecord>> {
    let indicator = parse_indicator(message)?;

    let mut identification = None;
    let mut grid = None;
    let mut product = None;
    let mut representation = None;
    let mut defined_bitmap: Option<Bytes> = None;
    let mut active_bitmap: Option<Bytes> = None;
    let mut records = Vec::new();
    let mut offset = 16;

    loop {
        if offset + 4 > message.len() {
            return Err(GribError::InvalidFormat(
                "Message truncated before end section".to_string(),
            ));
        }
        if &message[offset..offset + 4] == b"7777" {
            break;
        }
        if offset + 5 > message.len() {
            return Err(GribError::InvalidFormat("Truncated section header".to_string()));
        }

        let length = u32_at(message, offset) as usize;
        let number = message[offset + 4];
        if length < 5 || offset + length > message.len() {
            return Err(GribError::InvalidSection {
                section: number,
                reason: format!("Invalid section length {}", length),
            });
        }
        let section = message.slice(offset..offset + length);

        match number {
            1 => identification = Some(parse_identification(&section)?),
            2 => {} // Local use section
            3 => grid = Some(parse_grid_definition(&section)?),
            4 => product = Some(parse_product_definition(&section)?),
            5 => representation = Some(parse_data_representation(&section)?),
            6 => {
                active_bitmap = match parse_bitmap(&section)? {
                    Bitmap::Present(bits) => {
                        defined_bitmap = Some(bits.clone());
                        Some(bits)
                    }
                    Bitmap::PreviouslyDefined => Some(defined_bitmap.clone().ok_or_else(|| {
                        GribError::InvalidSection {
                            section: 6,
                            reason: "Bitmap refers to an undefined previous bitmap".to_string(),
                        }
                    })?),
                    Bitmap::Absent => None,
                }
            }
            7 => {
                let record = assemble_record(
                    &indicator,
                    identification.as_ref(),
                    grid.as_ref(),
                    product.as_ref(),
                    representation.as_ref(),
                    active_bitmap.clone(),
                    section.slice(5..),
                    first_number + records.len(),
                )?;
                records.push(record);
            }
            other => {
                return Err(GribError::InvalidSection {
                    section: other,
                    reason: "Unknown section number".to_string(),
                })
            }
        }

        offset += length;
    }

    Ok(records)
}

#[allow(clippy::too_many_arguments)]
fn assemble_record(
    indicator: &Indicator,
    identification: Option<&Identification>,
    grid: Option<&LatLonGrid>,
    product: Option<&ProductDefinition>,
    representation: Option<&DataRepresentation>,
    bitmap: Option<Bytes>,
    data: Bytes,
    message_number: usize,
) -> GribResult<GribRecord> {
    let missing = |section: u8| GribError::InvalidSection {
        section,
        reason: "Required section missing before data section".to_string(),
    };
    let identification = identification.ok_or_else(|| missing(1))?;
    let grid = grid.ok_or_else(|| missing(3))?;
    let product = product.ok_or_else(|| missing(4))?;
    let representation = representation.ok_or_else(|| missing(5))?;

    if representation.template != 0 {
        return Err(GribError::Unsupported(format!(
            "data representation template 5.{}",
            representation.template
        )));
    }

    Ok(GribRecord {
        info: RecordInfo {
            message_number,
            edition: indicator.edition,
            parameter: grib2_parameter(
                indicator.discipline,
                product.parameter_category,
                product.parameter_number,
            ),
            level_kind: product.level_kind,
            level: product.level_value,
            reference_time: identification.reference_time,
            forecast_time: product.forecast_time,
        },
        grid: grid.clone(),
        packed: PackedField {
            reference_value: representation.reference_value as f64,
            binary_scale_factor: representation.binary_scale_factor,
            decimal_scale_factor: representation.decimal_scale_factor,
            bits_per_value: representation.bits_per_value,
            bitmap,
            data,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indicator_rejects_other_editions() {
        let mut data = b"GRIB".to_vec();
        data.extend_from_slice(&[0, 0, 0, 1]);
        data.extend_from_slice(&[0; 8]);
        assert!(matches!(
            parse_indicator(&data),
            Err(GribError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_isobaric_level_is_reported_in_hpa() {
        let mut section = vec![0u8; 34];
        section[4] = 4;
        section[9] = 3;
        section[10] = 5;
        section[22] = 100;
        section[24..28].copy_from_slice(&85_000u32.to_be_bytes());
        let product = parse_product_definition(&section).unwrap();
        assert_eq!(product.level_kind, LevelKind::Isobaric);
        assert_eq!(product.level_value, 850.0);
    }

    #[test]
    fn test_non_latlon_grid_is_unsupported() {
        let mut section = vec![0u8; 72];
        section[4] = 3;
        section[13] = 30; // Lambert conformal template
        assert!(matches!(
            parse_grid_definition(&section),
            Err(GribError::Unsupported(_))
        ));
    }
}
