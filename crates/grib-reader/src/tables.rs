//! GRIB parameter and level lookup tables.
//!
//! Translates numeric codes from both editions into the short names,
//! long names and units used for record selection and inventory output.

use std::fmt;

/// Human-readable description of a parameter code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    pub short_name: String,
    pub long_name: String,
    pub units: String,
}

impl Parameter {
    fn known(short_name: &str, long_name: &str, units: &str) -> Self {
        Self {
            short_name: short_name.to_string(),
            long_name: long_name.to_string(),
            units: units.to_string(),
        }
    }

    fn unknown(short_name: String) -> Self {
        Self {
            long_name: short_name.clone(),
            short_name,
            units: "unknown".to_string(),
        }
    }
}

/// Look up a GRIB1 parameter (WMO code table 2, shared by JMA's local table
/// for the variables JRA-55 distributes).
pub fn grib1_parameter(table_version: u8, number: u8) -> Parameter {
    match number {
        1 => Parameter::known("PRES", "Pressure", "Pa"),
        2 => Parameter::known("PRMSL", "Pressure reduced to MSL", "Pa"),
        6 => Parameter::known("GP", "Geopotential", "m2 s-2"),
        7 => Parameter::known("HGT", "Geopotential height", "gpm"),
        11 => Parameter::known("TMP", "Temperature", "K"),
        13 => Parameter::known("POT", "Potential temperature", "K"),
        17 => Parameter::known("DPT", "Dew point temperature", "K"),
        33 => Parameter::known("UGRD", "u-component of wind", "m s-1"),
        34 => Parameter::known("VGRD", "v-component of wind", "m s-1"),
        39 => Parameter::known("VVEL", "Vertical velocity", "Pa s-1"),
        51 => Parameter::known("SPFH", "Specific humidity", "kg kg-1"),
        52 => Parameter::known("RH", "Relative humidity", "%"),
        61 => Parameter::known("APCP", "Total precipitation", "kg m-2"),
        71 => Parameter::known("TCDC", "Total cloud cover", "%"),
        _ => Parameter::unknown(format!("T{}_P{}", table_version, number)),
    }
}

/// Look up a GRIB2 parameter by (discipline, category, number).
pub fn grib2_parameter(discipline: u8, category: u8, number: u8) -> Parameter {
    match (discipline, category, number) {
        // Category 0: Temperature
        (0, 0, 0) => Parameter::known("TMP", "Temperature", "K"),
        (0, 0, 2) => Parameter::known("POT", "Potential temperature", "K"),
        (0, 0, 6) => Parameter::known("DPT", "Dew point temperature", "K"),

        // Category 1: Moisture
        (0, 1, 0) => Parameter::known("SPFH", "Specific humidity", "kg kg-1"),
        (0, 1, 1) => Parameter::known("RH", "Relative humidity", "%"),
        (0, 1, 8) => Parameter::known("APCP", "Total precipitation", "kg m-2"),

        // Category 2: Momentum
        (0, 2, 2) => Parameter::known("UGRD", "u-component of wind", "m s-1"),
        (0, 2, 3) => Parameter::known("VGRD", "v-component of wind", "m s-1"),
        (0, 2, 8) => Parameter::known("VVEL", "Vertical velocity", "Pa s-1"),

        // Category 3: Mass
        (0, 3, 0) => Parameter::known("PRES", "Pressure", "Pa"),
        (0, 3, 1) => Parameter::known("PRMSL", "Pressure reduced to MSL", "Pa"),
        (0, 3, 4) => Parameter::known("GP", "Geopotential", "m2 s-2"),
        (0, 3, 5) => Parameter::known("HGT", "Geopotential height", "gpm"),

        // Category 6: Cloud
        (0, 6, 1) => Parameter::known("TCDC", "Total cloud cover", "%"),

        _ => Parameter::unknown(format!("P{}_{}_{}", discipline, category, number)),
    }
}

/// Kind of vertical coordinate, normalised across editions.
///
/// GRIB1 code table 3 and GRIB2 code table 4.5 use different numbers for
/// the same surface (height above ground is 105 in edition 1 and 103 in
/// edition 2), so records carry this enum instead of the raw code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LevelKind {
    Surface,
    /// Constant-pressure surface, value in hPa.
    Isobaric,
    MeanSeaLevel,
    /// Height above mean sea level, value in metres.
    AltitudeAboveMsl,
    /// Height above ground, value in metres.
    HeightAboveGround,
    Sigma,
    Hybrid,
    DepthBelowLand,
    EntireAtmosphere,
    Other(u8),
}

impl LevelKind {
    pub fn from_grib1(code: u8) -> Self {
        match code {
            1 => Self::Surface,
            100 => Self::Isobaric,
            102 => Self::MeanSeaLevel,
            103 => Self::AltitudeAboveMsl,
            105 => Self::HeightAboveGround,
            107 => Self::Sigma,
            109 => Self::Hybrid,
            111 => Self::DepthBelowLand,
            200 => Self::EntireAtmosphere,
            other => Self::Other(other),
        }
    }

    pub fn from_grib2(code: u8) -> Self {
        match code {
            1 => Self::Surface,
            100 => Self::Isobaric,
            101 => Self::MeanSeaLevel,
            102 => Self::AltitudeAboveMsl,
            103 => Self::HeightAboveGround,
            104 => Self::Sigma,
            105 => Self::Hybrid,
            106 => Self::DepthBelowLand,
            10 | 200 => Self::EntireAtmosphere,
            other => Self::Other(other),
        }
    }
}

impl fmt::Display for LevelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Surface => write!(f, "surface"),
            Self::Isobaric => write!(f, "isobaricInhPa"),
            Self::MeanSeaLevel => write!(f, "meanSea"),
            Self::AltitudeAboveMsl => write!(f, "heightAboveSea"),
            Self::HeightAboveGround => write!(f, "heightAboveGround"),
            Self::Sigma => write!(f, "sigma"),
            Self::Hybrid => write!(f, "hybrid"),
            Self::DepthBelowLand => write!(f, "depthBelowLand"),
            Self::EntireAtmosphere => write!(f, "atmosphere"),
            Self::Other(code) => write!(f, "level type {}", code),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geopotential_height_in_both_editions() {
        assert_eq!(grib1_parameter(3, 7).short_name, "HGT");
        assert_eq!(grib2_parameter(0, 3, 5).short_name, "HGT");
        assert_eq!(grib1_parameter(3, 7).long_name, grib2_parameter(0, 3, 5).long_name);
    }

    #[test]
    fn test_unknown_parameter_falls_back_to_code() {
        assert_eq!(grib1_parameter(200, 250).short_name, "T200_P250");
        assert_eq!(grib2_parameter(0, 99, 1).short_name, "P0_99_1");
    }

    #[test]
    fn test_height_above_ground_codes_differ_by_edition() {
        assert_eq!(LevelKind::from_grib1(105), LevelKind::HeightAboveGround);
        assert_eq!(LevelKind::from_grib2(103), LevelKind::HeightAboveGround);
        assert_eq!(LevelKind::from_grib1(100).to_string(), "isobaricInhPa");
    }
}
