//! Raw ADC code to engineering-unit conversion.
//!
//! Pure functions over device-configuration constants; there is no error
//! path because resolution, encoding and range come from validated
//! configuration, not user input.

use serde::{Deserialize, Serialize};

/// How the converter encodes raw codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Encoding {
    /// Straight binary: 0 maps to full-scale minimum.
    #[default]
    Binary,
    /// Two's complement: the sign bit is folded to straight binary before
    /// scaling.
    TwosComplement,
}

/// Full-scale input interval of a channel, in engineering units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InputRange {
    pub min: f64,
    pub max: f64,
}

impl InputRange {
    /// Symmetric ±10 V range, the collector default.
    pub fn bipolar_10v() -> Self {
        Self {
            min: -10.0,
            max: 10.0,
        }
    }

    /// Width of the interval.
    pub fn span(&self) -> f64 {
        self.max - self.min
    }
}

impl Default for InputRange {
    fn default() -> Self {
        Self::bipolar_10v()
    }
}

/// Convert a raw code of `resolution_bits` width to an engineering-unit
/// value within `range`.
///
/// `v = code * span / 2^bits + min`, where `code` is the raw value for
/// binary encoding, or the raw value with the sign bit flipped for
/// two's-complement encoding.
pub fn raw_to_units(raw: u16, resolution_bits: u32, encoding: Encoding, range: InputRange) -> f64 {
    let code = match encoding {
        Encoding::Binary => raw,
        Encoding::TwosComplement => raw ^ (1u16 << (resolution_bits - 1)),
    };
    f64::from(code) * range.span() / (1u64 << resolution_bits) as f64 + range.min
}

/// Inverse of [`raw_to_units`]: quantize an engineering-unit value to a raw
/// code, saturating at the ends of the range.
pub fn units_to_raw(value: f64, resolution_bits: u32, encoding: Encoding, range: InputRange) -> u16 {
    let levels = (1u64 << resolution_bits) as f64;
    let max_code = ((1u64 << resolution_bits) - 1) as u16;
    let scaled = (value - range.min) / range.span() * levels;
    let code = scaled.floor().clamp(0.0, f64::from(max_code)) as u16;
    match encoding {
        Encoding::Binary => code,
        Encoding::TwosComplement => code ^ (1u16 << (resolution_bits - 1)),
    }
}
