//! Compact encoding for doubles in geometry payloads
//!
//! Most coordinates in markup are small integers or short decimals. Each value
//! is written as a tag byte followed by the narrowest payload that reproduces
//! it exactly.

use crate::error::{CompilerError, Result};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

const SCALE: f64 = 1_000_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DoubleKind {
    Zero = 0x01,
    One = 0x02,
    MinusOne = 0x03,
    /// i32 holding the value multiplied by 1e6
    ScaledInteger = 0x04,
    Integer = 0x05,
    Double = 0x06,
}

impl DoubleKind {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x01 => Some(Self::Zero),
            0x02 => Some(Self::One),
            0x03 => Some(Self::MinusOne),
            0x04 => Some(Self::ScaledInteger),
            0x05 => Some(Self::Integer),
            0x06 => Some(Self::Double),
            _ => None,
        }
    }

    /// Narrowest kind that reproduces `value` bit for bit
    pub fn classify(value: f64) -> Self {
        // -0.0 keeps its sign only as a full double
        if value == 0.0 {
            return if value.is_sign_positive() { Self::Zero } else { Self::Double };
        }
        if value == 1.0 {
            return Self::One;
        }
        if value == -1.0 {
            return Self::MinusOne;
        }
        if fits_i32(value) && value.fract() == 0.0 {
            return Self::Integer;
        }

        let scaled = (value * SCALE).round();
        if fits_i32(scaled) && scaled / SCALE == value {
            return Self::ScaledInteger;
        }
        Self::Double
    }
}

fn fits_i32(value: f64) -> bool {
    value.is_finite() && value >= i32::MIN as f64 && value <= i32::MAX as f64
}

pub fn write_double<W: Write + ?Sized>(writer: &mut W, value: f64) -> Result<()> {
    let kind = DoubleKind::classify(value);
    writer.write_u8(kind as u8)?;

    match kind {
        DoubleKind::Zero | DoubleKind::One | DoubleKind::MinusOne => {}
        DoubleKind::Integer => writer.write_i32::<LittleEndian>(value as i32)?,
        DoubleKind::ScaledInteger => {
            writer.write_i32::<LittleEndian>((value * SCALE).round() as i32)?
        }
        DoubleKind::Double => writer.write_f64::<LittleEndian>(value)?,
    }
    Ok(())
}

pub fn read_double<R: Read + ?Sized>(reader: &mut R) -> Result<f64> {
    let tag = reader.read_u8()?;
    let kind = DoubleKind::from_u8(tag).ok_or(CompilerError::UnknownDiscriminator {
        what: "double",
        value: tag,
    })?;

    Ok(match kind {
        DoubleKind::Zero => 0.0,
        DoubleKind::One => 1.0,
        DoubleKind::MinusOne => -1.0,
        DoubleKind::Integer => reader.read_i32::<LittleEndian>()? as f64,
        DoubleKind::ScaledInteger => reader.read_i32::<LittleEndian>()? as f64 / SCALE,
        DoubleKind::Double => reader.read_f64::<LittleEndian>()?,
    })
}

/// Parse a markup number token (`12`, `-3.5`, `1e3`, `Infinity`, `NaN`)
pub fn parse_number(token: &str) -> Option<f64> {
    match token {
        "Infinity" => Some(f64::INFINITY),
        "-Infinity" => Some(f64::NEG_INFINITY),
        "NaN" => Some(f64::NAN),
        _ => token.parse::<f64>().ok().filter(|v| v.is_finite()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn encoded(value: f64) -> Vec<u8> {
        let mut out = Vec::new();
        write_double(&mut out, value).unwrap();
        out
    }

    #[test]
    fn test_classification() {
        assert_eq!(DoubleKind::classify(0.0), DoubleKind::Zero);
        assert_eq!(DoubleKind::classify(1.0), DoubleKind::One);
        assert_eq!(DoubleKind::classify(-1.0), DoubleKind::MinusOne);
        assert_eq!(DoubleKind::classify(42.0), DoubleKind::Integer);
        assert_eq!(DoubleKind::classify(0.5), DoubleKind::ScaledInteger);
        assert_eq!(DoubleKind::classify(1e10), DoubleKind::Double);
        assert_eq!(DoubleKind::classify(0.1234567), DoubleKind::Double);
        assert_eq!(DoubleKind::classify(-0.0), DoubleKind::Double);
    }

    #[test]
    fn test_payload_sizes() {
        assert_eq!(encoded(0.0).len(), 1);
        assert_eq!(encoded(-17.0).len(), 5);
        assert_eq!(encoded(2.25).len(), 5);
        assert_eq!(encoded(std::f64::consts::PI).len(), 9);
    }

    #[test]
    fn test_values_survive_encoding() {
        for value in [0.0, 1.0, -1.0, 250.0, -3.75, 0.000001, 123456.5, 1e12, f64::INFINITY] {
            let mut cursor = Cursor::new(encoded(value));
            assert_eq!(read_double(&mut cursor).unwrap(), value);
        }
    }

    #[test]
    fn test_unknown_tag() {
        let mut cursor = Cursor::new(vec![0x09u8]);
        assert!(matches!(
            read_double(&mut cursor),
            Err(CompilerError::UnknownDiscriminator { what: "double", value: 0x09 })
        ));
    }

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_number("-3.5"), Some(-3.5));
        assert_eq!(parse_number("1e3"), Some(1000.0));
        assert_eq!(parse_number("Infinity"), Some(f64::INFINITY));
        assert_eq!(parse_number("abc"), None);
    }
}
