//! Int32 collection serializer (`"0,1,2 2,3,0"`)
//!
//! Payload: `[varint count][kind u8]` then the narrowest representation of the
//! values. A run of consecutive integers is stored as its first value only.

use super::{CustomBinarySerializer, SerializedValue};
use crate::error::{CompilerError, Result};
use crate::types::ValueTypeId;
use crate::varint;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum IntegerCollectionKind {
    Consecutive = 0x01,
    Byte = 0x02,
    UShort = 0x03,
    Integer = 0x04,
}

impl IntegerCollectionKind {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x01 => Some(Self::Consecutive),
            0x02 => Some(Self::Byte),
            0x03 => Some(Self::UShort),
            0x04 => Some(Self::Integer),
            _ => None,
        }
    }

    pub fn classify(values: &[i32]) -> Self {
        let consecutive = values.len() > 1
            && values.windows(2).all(|w| w[0].checked_add(1) == Some(w[1]));
        if consecutive {
            return Self::Consecutive;
        }

        let (min, max) = values
            .iter()
            .fold((0i32, 0i32), |(lo, hi), &v| (lo.min(v), hi.max(v)));
        if min >= 0 && max <= u8::MAX as i32 {
            Self::Byte
        } else if min >= 0 && max <= u16::MAX as i32 {
            Self::UShort
        } else {
            Self::Integer
        }
    }
}

pub fn parse_int32s(text: &str) -> Option<Vec<i32>> {
    text.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|token| !token.is_empty())
        .map(|token| token.parse::<i32>().ok())
        .collect()
}

#[derive(Debug, Default, Clone, Copy)]
pub struct Int32CollectionSerializer;

impl Int32CollectionSerializer {
    pub fn new() -> Self {
        Self
    }
}

impl CustomBinarySerializer for Int32CollectionSerializer {
    fn name(&self) -> &'static str {
        "Int32CollectionSerializer"
    }

    fn value_type(&self) -> ValueTypeId {
        ValueTypeId::Int32Collection
    }

    fn convert_string_to_custom_binary(&self, sink: &mut dyn Write, text: &str) -> Result<bool> {
        let values = match parse_int32s(text) {
            Some(values) => values,
            None => return Ok(false),
        };

        let kind = IntegerCollectionKind::classify(&values);
        let mut payload = Vec::new();
        varint::encode(&mut payload, values.len() as u32)?;
        payload.write_u8(kind as u8)?;

        match kind {
            IntegerCollectionKind::Consecutive => payload.write_i32::<LittleEndian>(values[0])?,
            IntegerCollectionKind::Byte => {
                for &v in &values {
                    payload.write_u8(v as u8)?;
                }
            }
            IntegerCollectionKind::UShort => {
                for &v in &values {
                    payload.write_u16::<LittleEndian>(v as u16)?;
                }
            }
            IntegerCollectionKind::Integer => {
                for &v in &values {
                    payload.write_i32::<LittleEndian>(v)?;
                }
            }
        }

        sink.write_all(&payload)?;
        Ok(true)
    }

    fn convert_custom_binary_to_object(&self, source: &mut dyn Read) -> Result<SerializedValue> {
        let count = varint::decode_count(source, "integer collection")?;
        let tag = source.read_u8()?;
        let kind = IntegerCollectionKind::from_u8(tag).ok_or(CompilerError::UnknownDiscriminator {
            what: "integer collection",
            value: tag,
        })?;

        let mut values = Vec::with_capacity(count.min(4096));
        match kind {
            IntegerCollectionKind::Consecutive => {
                let first = source.read_i32::<LittleEndian>()?;
                for offset in 0..count {
                    let value = i32::try_from(offset)
                        .ok()
                        .and_then(|o| first.checked_add(o))
                        .ok_or_else(|| CompilerError::invalid_format("Consecutive integer run overflows i32"))?;
                    values.push(value);
                }
            }
            IntegerCollectionKind::Byte => {
                for _ in 0..count {
                    values.push(source.read_u8()? as i32);
                }
            }
            IntegerCollectionKind::UShort => {
                for _ in 0..count {
                    values.push(source.read_u16::<LittleEndian>()? as i32);
                }
            }
            IntegerCollectionKind::Integer => {
                for _ in 0..count {
                    values.push(source.read_i32::<LittleEndian>()?);
                }
            }
        }

        Ok(SerializedValue::Int32s(values))
    }
}
