//! Brush serializer
//!
//! Payload layout:
//!
//! ```text
//! [0x01 KnownSolidColor][u32 LE ARGB id]
//! [0x02 OtherColor][varint length][UTF-8 color text]
//! ```
//!
//! Any color name from the known table is written by id. Other text is kept
//! verbatim when it is long enough to be color syntax; parsing it is left to
//! the reader. Shorter strings are not eligible.

use super::color::{Color, KnownColor};
use super::{CustomBinarySerializer, SerializedValue};
use crate::error::{CompilerError, Result};
use crate::types::ValueTypeId;
use crate::varint;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::io::{Read, Write};
use std::sync::Mutex;

/// Texts of this length or shorter cannot be color syntax
const MIN_OTHER_COLOR_LEN: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum BrushKind {
    Unknown = 0x00,
    KnownSolidColor = 0x01,
    OtherColor = 0x02,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrushValue {
    SolidColor(Color),
}

impl BrushValue {
    pub fn color(&self) -> Color {
        match self {
            BrushValue::SolidColor(color) => *color,
        }
    }
}

/// Process-wide cache of colors parsed from `OtherColor` payloads, keyed by the
/// exact payload text. Shared by every reader in the process.
static COLOR_STRING_CACHE: Lazy<Mutex<HashMap<String, Color>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

fn color_from_cached_string(text: &str) -> Result<Color> {
    let mut cache = COLOR_STRING_CACHE.lock().unwrap_or_else(|e| e.into_inner());
    if let Some(color) = cache.get(text) {
        return Ok(*color);
    }

    let color = Color::parse(text)?;
    cache.insert(text.to_string(), color);
    Ok(color)
}

/// Number of distinct color strings parsed so far
pub fn color_cache_len() -> usize {
    COLOR_STRING_CACHE.lock().unwrap_or_else(|e| e.into_inner()).len()
}

pub fn clear_color_cache() {
    COLOR_STRING_CACHE.lock().unwrap_or_else(|e| e.into_inner()).clear();
}

#[derive(Debug, Default, Clone, Copy)]
pub struct BrushSerializer;

impl BrushSerializer {
    pub fn new() -> Self {
        Self
    }
}

impl CustomBinarySerializer for BrushSerializer {
    fn name(&self) -> &'static str {
        "BrushSerializer"
    }

    fn value_type(&self) -> ValueTypeId {
        ValueTypeId::Brush
    }

    fn convert_string_to_custom_binary(&self, sink: &mut dyn Write, text: &str) -> Result<bool> {
        let text = text.trim();

        if let Some(known) = KnownColor::from_name(text) {
            sink.write_u8(BrushKind::KnownSolidColor as u8)?;
            sink.write_u32::<LittleEndian>(known.id())?;
            return Ok(true);
        }

        if text.chars().count() > MIN_OTHER_COLOR_LEN {
            sink.write_u8(BrushKind::OtherColor as u8)?;
            varint::write_string(sink, text)?;
            return Ok(true);
        }

        Ok(false)
    }

    fn convert_custom_binary_to_object(&self, source: &mut dyn Read) -> Result<SerializedValue> {
        let tag = source.read_u8()?;

        let color = if tag == BrushKind::KnownSolidColor as u8 {
            let id = source.read_u32::<LittleEndian>()?;
            // Ids outside the table are still valid ARGB values
            KnownColor::from_id(id)
                .map(|known| known.color())
                .unwrap_or_else(|| Color::from_argb(id))
        } else if tag == BrushKind::OtherColor as u8 {
            let text = varint::read_string(source)?;
            color_from_cached_string(&text)?
        } else {
            return Err(CompilerError::UnknownDiscriminator {
                what: "brush",
                value: tag,
            });
        };

        Ok(SerializedValue::Brush(BrushValue::SolidColor(color)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn encode(text: &str) -> (bool, Vec<u8>) {
        let mut out = Vec::new();
        let eligible = BrushSerializer::new()
            .convert_string_to_custom_binary(&mut out, text)
            .unwrap();
        (eligible, out)
    }

    fn decode(bytes: Vec<u8>) -> (Color, u64) {
        let mut cursor = Cursor::new(bytes);
        let value = BrushSerializer::new()
            .convert_custom_binary_to_object(&mut cursor)
            .unwrap();
        match value {
            SerializedValue::Brush(brush) => (brush.color(), cursor.position()),
            other => panic!("Expected brush, got {:?}", other),
        }
    }

    #[test]
    fn test_known_color_by_id() {
        let (eligible, bytes) = encode("Red");
        assert!(eligible);
        assert_eq!(bytes, vec![0x01, 0x00, 0x00, 0xFF, 0xFF]);

        let (color, consumed) = decode(bytes);
        assert_eq!(color, KnownColor::Red.color());
        assert_eq!(consumed, 5);
    }

    #[test]
    fn test_known_color_is_case_insensitive() {
        assert_eq!(encode("red"), encode("Red"));
        assert_eq!(encode("  RED "), encode("Red"));
    }

    #[test]
    fn test_other_color_is_length_prefixed_text() {
        let (eligible, bytes) = encode("#FF0000");
        assert!(eligible);
        assert_eq!(bytes[0], BrushKind::OtherColor as u8);
        assert_eq!(bytes[1], 7);
        assert_eq!(&bytes[2..], b"#FF0000");

        let (color, consumed) = decode(bytes);
        assert_eq!(color, Color::new(0xFF, 0xFF, 0, 0));
        assert_eq!(consumed, 9);
    }

    #[test]
    fn test_short_strings_are_ineligible() {
        let (eligible, bytes) = encode("zz");
        assert!(!eligible);
        assert!(bytes.is_empty());

        let (eligible, bytes) = encode("#F0");
        assert!(!eligible);
        assert!(bytes.is_empty());

        // Two characters, six bytes of UTF-8
        let (eligible, bytes) = encode("红色");
        assert!(!eligible);
        assert!(bytes.is_empty());
    }

    #[test]
    fn test_reader_stops_after_payload() {
        let (_, mut bytes) = encode("#80FFFFFF");
        bytes.extend_from_slice(&[0xAA, 0xBB]);
        let (color, consumed) = decode(bytes);
        assert_eq!(color.a, 0x80);
        assert_eq!(consumed, 11);
    }

    #[test]
    fn test_unknown_discriminator() {
        for tag in [BrushKind::Unknown as u8, 0x07] {
            let mut cursor = Cursor::new(vec![tag, 0, 0, 0, 0]);
            assert!(matches!(
                BrushSerializer::new().convert_custom_binary_to_object(&mut cursor),
                Err(CompilerError::UnknownDiscriminator { what: "brush", .. })
            ));
        }
    }

    #[test]
    fn test_unparseable_other_color_fails_on_read() {
        let (eligible, bytes) = encode("NotAColor");
        assert!(eligible);

        let mut cursor = Cursor::new(bytes);
        assert!(BrushSerializer::new().convert_custom_binary_to_object(&mut cursor).is_err());
    }

    #[test]
    fn test_color_cache_reuses_parsed_strings() {
        let first = color_from_cached_string("#FF123456").unwrap();
        assert!(color_cache_len() >= 1);
        let second = color_from_cached_string("#FF123456").unwrap();
        assert_eq!(first, second);
    }
}
