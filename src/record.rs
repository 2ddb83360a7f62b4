//! BAML record format
//!
//! A document is the 8-byte header followed by a flat sequence of records:
//!
//! ```text
//! "BAML" | major u16 LE | minor u16 LE
//! [record type u8][varint payload length][payload] ...
//! ```
//!
//! Strings inside payloads are varint-length-prefixed UTF-8. Every record is
//! self-delimiting, so a reader can always skip to the next one.

use crate::error::{CompilerError, Result};
use crate::types::*;
use crate::varint;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Cursor, Read, Write};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RecordType {
    DocumentStart = 0x01,
    DocumentEnd = 0x02,
    ElementStart = 0x03,
    ElementEnd = 0x04,
    Property = 0x05,
    PropertyCustom = 0x06,
    PropertyWithExtension = 0x07,
    PropertyTypeReference = 0x08,
    PropertyComplexStart = 0x09,
    PropertyComplexEnd = 0x0A,
    ConstructorParameter = 0x0B,
    Text = 0x0C,
    DefKey = 0x0D,
    DefName = 0x0E,
}

impl RecordType {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x01 => Some(Self::DocumentStart),
            0x02 => Some(Self::DocumentEnd),
            0x03 => Some(Self::ElementStart),
            0x04 => Some(Self::ElementEnd),
            0x05 => Some(Self::Property),
            0x06 => Some(Self::PropertyCustom),
            0x07 => Some(Self::PropertyWithExtension),
            0x08 => Some(Self::PropertyTypeReference),
            0x09 => Some(Self::PropertyComplexStart),
            0x0A => Some(Self::PropertyComplexEnd),
            0x0B => Some(Self::ConstructorParameter),
            0x0C => Some(Self::Text),
            0x0D => Some(Self::DefKey),
            0x0E => Some(Self::DefName),
            _ => None,
        }
    }
}

const EXTENSION_VALUE_IS_TYPE: u8 = 1 << 0;
const EXTENSION_VALUE_IS_STATIC: u8 = 1 << 1;

#[derive(Debug, Clone, PartialEq)]
pub enum BamlRecord {
    DocumentStart,
    DocumentEnd,
    ElementStart {
        type_id: u16,
        assembly_name: String,
        type_name: String,
    },
    ElementEnd,
    /// Property stored as its attribute text
    Property {
        name: String,
        value: String,
    },
    /// Property stored through a custom binary serializer
    PropertyCustom {
        name: String,
        value_type: ValueTypeId,
        payload: Vec<u8>,
    },
    /// Property set from a built-in extension with one simple argument
    PropertyWithExtension {
        name: String,
        extension: ExtensionTypeId,
        /// The argument is itself `{x:Type ...}`
        value_is_type_extension: bool,
        /// The argument is itself `{x:Static ...}`
        value_is_static_extension: bool,
        value: String,
    },
    PropertyTypeReference {
        name: String,
        type_name: String,
    },
    PropertyComplexStart {
        name: String,
    },
    PropertyComplexEnd,
    ConstructorParameter {
        value: String,
    },
    Text {
        value: String,
    },
    DefKey {
        key: String,
    },
    DefName {
        name: String,
    },
}

impl BamlRecord {
    pub fn record_type(&self) -> RecordType {
        match self {
            BamlRecord::DocumentStart => RecordType::DocumentStart,
            BamlRecord::DocumentEnd => RecordType::DocumentEnd,
            BamlRecord::ElementStart { .. } => RecordType::ElementStart,
            BamlRecord::ElementEnd => RecordType::ElementEnd,
            BamlRecord::Property { .. } => RecordType::Property,
            BamlRecord::PropertyCustom { .. } => RecordType::PropertyCustom,
            BamlRecord::PropertyWithExtension { .. } => RecordType::PropertyWithExtension,
            BamlRecord::PropertyTypeReference { .. } => RecordType::PropertyTypeReference,
            BamlRecord::PropertyComplexStart { .. } => RecordType::PropertyComplexStart,
            BamlRecord::PropertyComplexEnd => RecordType::PropertyComplexEnd,
            BamlRecord::ConstructorParameter { .. } => RecordType::ConstructorParameter,
            BamlRecord::Text { .. } => RecordType::Text,
            BamlRecord::DefKey { .. } => RecordType::DefKey,
            BamlRecord::DefName { .. } => RecordType::DefName,
        }
    }

    /// Property name for property records
    pub fn property_name(&self) -> Option<&str> {
        match self {
            BamlRecord::Property { name, .. }
            | BamlRecord::PropertyCustom { name, .. }
            | BamlRecord::PropertyWithExtension { name, .. }
            | BamlRecord::PropertyTypeReference { name, .. }
            | BamlRecord::PropertyComplexStart { name } => Some(name),
            _ => None,
        }
    }

    fn write_payload(&self, out: &mut Vec<u8>) -> Result<()> {
        match self {
            BamlRecord::DocumentStart
            | BamlRecord::DocumentEnd
            | BamlRecord::ElementEnd
            | BamlRecord::PropertyComplexEnd => {}
            BamlRecord::ElementStart { type_id, assembly_name, type_name } => {
                out.write_u16::<LittleEndian>(*type_id)?;
                varint::write_string(out, assembly_name)?;
                varint::write_string(out, type_name)?;
            }
            BamlRecord::Property { name, value } => {
                varint::write_string(out, name)?;
                varint::write_string(out, value)?;
            }
            BamlRecord::PropertyCustom { name, value_type, payload } => {
                varint::write_string(out, name)?;
                out.write_u8(*value_type as u8)?;
                out.extend_from_slice(payload);
            }
            BamlRecord::PropertyWithExtension {
                name,
                extension,
                value_is_type_extension,
                value_is_static_extension,
                value,
            } => {
                varint::write_string(out, name)?;
                out.write_u16::<LittleEndian>(*extension as u16)?;
                let mut flags = 0u8;
                if *value_is_type_extension {
                    flags |= EXTENSION_VALUE_IS_TYPE;
                }
                if *value_is_static_extension {
                    flags |= EXTENSION_VALUE_IS_STATIC;
                }
                out.write_u8(flags)?;
                varint::write_string(out, value)?;
            }
            BamlRecord::PropertyTypeReference { name, type_name } => {
                varint::write_string(out, name)?;
                varint::write_string(out, type_name)?;
            }
            BamlRecord::PropertyComplexStart { name } => {
                varint::write_string(out, name)?;
            }
            BamlRecord::ConstructorParameter { value } | BamlRecord::Text { value } => {
                varint::write_string(out, value)?;
            }
            BamlRecord::DefKey { key } => {
                varint::write_string(out, key)?;
            }
            BamlRecord::DefName { name } => {
                varint::write_string(out, name)?;
            }
        }
        Ok(())
    }

    /// Write the framed record and return the bytes written
    pub fn write_to<W: Write + ?Sized>(&self, writer: &mut W) -> Result<usize> {
        let mut payload = Vec::new();
        self.write_payload(&mut payload)?;

        let length = u32::try_from(payload.len()).map_err(|_| CompilerError::LimitExceeded {
            limit_type: "record payload size".to_string(),
            limit: u32::MAX as usize,
        })?;

        writer.write_u8(self.record_type() as u8)?;
        let prefix = varint::encode(writer, length)?;
        writer.write_all(&payload)?;
        Ok(1 + prefix + payload.len())
    }

    /// Size of the framed record without writing it
    pub fn encoded_size(&self) -> Result<usize> {
        let mut payload = Vec::new();
        self.write_payload(&mut payload)?;
        Ok(1 + varint::size_of(payload.len() as u64) + payload.len())
    }

    /// Read one framed record. The declared payload length must match what the
    /// record's fields consume.
    pub fn read_from<R: Read + ?Sized>(reader: &mut R) -> Result<Self> {
        let tag = reader.read_u8()?;
        let record_type = RecordType::from_u8(tag).ok_or(CompilerError::UnknownDiscriminator {
            what: "record",
            value: tag,
        })?;

        let length = varint::decode(reader)? as usize;
        let payload = varint::read_bytes(reader, length)?;

        let mut cursor = Cursor::new(payload.as_slice());
        let record = Self::read_payload(record_type, &mut cursor, length)?;

        let consumed = cursor.position() as usize;
        if consumed != length {
            return Err(CompilerError::PayloadLengthMismatch {
                record: format!("{:?}", record_type),
                declared: length,
                consumed,
            });
        }
        Ok(record)
    }

    fn read_payload(record_type: RecordType, cursor: &mut Cursor<&[u8]>, length: usize) -> Result<Self> {
        let record = match record_type {
            RecordType::DocumentStart => BamlRecord::DocumentStart,
            RecordType::DocumentEnd => BamlRecord::DocumentEnd,
            RecordType::ElementEnd => BamlRecord::ElementEnd,
            RecordType::PropertyComplexEnd => BamlRecord::PropertyComplexEnd,
            RecordType::ElementStart => BamlRecord::ElementStart {
                type_id: cursor.read_u16::<LittleEndian>()?,
                assembly_name: varint::read_string(cursor)?,
                type_name: varint::read_string(cursor)?,
            },
            RecordType::Property => BamlRecord::Property {
                name: varint::read_string(cursor)?,
                value: varint::read_string(cursor)?,
            },
            RecordType::PropertyCustom => {
                let name = varint::read_string(cursor)?;
                let tag = cursor.read_u8()?;
                let value_type = ValueTypeId::from_u8(tag).ok_or(CompilerError::UnknownDiscriminator {
                    what: "serializer",
                    value: tag,
                })?;
                // The custom payload runs to the end of the record
                let start = cursor.position() as usize;
                let payload = cursor.get_ref()[start..length].to_vec();
                cursor.set_position(length as u64);
                BamlRecord::PropertyCustom { name, value_type, payload }
            }
            RecordType::PropertyWithExtension => {
                let name = varint::read_string(cursor)?;
                let raw = cursor.read_u16::<LittleEndian>()?;
                let extension = ExtensionTypeId::from_u16(raw).ok_or_else(|| {
                    CompilerError::invalid_format(format!("Unknown extension id 0x{:04X}", raw))
                })?;
                let flags = cursor.read_u8()?;
                BamlRecord::PropertyWithExtension {
                    name,
                    extension,
                    value_is_type_extension: flags & EXTENSION_VALUE_IS_TYPE != 0,
                    value_is_static_extension: flags & EXTENSION_VALUE_IS_STATIC != 0,
                    value: varint::read_string(cursor)?,
                }
            }
            RecordType::PropertyTypeReference => BamlRecord::PropertyTypeReference {
                name: varint::read_string(cursor)?,
                type_name: varint::read_string(cursor)?,
            },
            RecordType::PropertyComplexStart => BamlRecord::PropertyComplexStart {
                name: varint::read_string(cursor)?,
            },
            RecordType::ConstructorParameter => BamlRecord::ConstructorParameter {
                value: varint::read_string(cursor)?,
            },
            RecordType::Text => BamlRecord::Text {
                value: varint::read_string(cursor)?,
            },
            RecordType::DefKey => BamlRecord::DefKey {
                key: varint::read_string(cursor)?,
            },
            RecordType::DefName => BamlRecord::DefName {
                name: varint::read_string(cursor)?,
            },
        };
        Ok(record)
    }
}

/// Check the magic and version at the start of a stream and leave the cursor
/// on the first record. Returns the stream's `(major, minor)` version.
pub fn read_header(cursor: &mut Cursor<&[u8]>) -> Result<(u16, u16)> {
    let bytes = cursor.get_ref();
    if bytes.len() < BAML_HEADER_SIZE || &bytes[..4] != BAML_MAGIC {
        return Err(CompilerError::invalid_format("Missing BAML header"));
    }

    cursor.set_position(4);
    let major = cursor.read_u16::<LittleEndian>()?;
    let minor = cursor.read_u16::<LittleEndian>()?;
    if major != BAML_VERSION_MAJOR || minor > BAML_VERSION_MINOR {
        return Err(CompilerError::invalid_format(format!(
            "Unsupported BAML version {}.{} (expected {}.{})",
            major, minor, BAML_VERSION_MAJOR, BAML_VERSION_MINOR
        )));
    }
    Ok((major, minor))
}

/// An ordered list of records
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BamlDocument {
    pub records: Vec<BamlRecord>,
}

impl BamlDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: BamlRecord) {
        self.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn write_to<W: Write + ?Sized>(&self, writer: &mut W) -> Result<usize> {
        writer.write_all(BAML_MAGIC)?;
        writer.write_u16::<LittleEndian>(BAML_VERSION_MAJOR)?;
        writer.write_u16::<LittleEndian>(BAML_VERSION_MINOR)?;

        let mut written = BAML_HEADER_SIZE;
        for record in &self.records {
            written += record.write_to(writer)?;
        }
        Ok(written)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        self.write_to(&mut out)?;
        Ok(out)
    }

    /// Parse a complete stream
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut cursor = Cursor::new(bytes);
        read_header(&mut cursor)?;

        let mut document = Self::new();
        while (cursor.position() as usize) < bytes.len() {
            document.push(BamlRecord::read_from(&mut cursor)?);
        }
        Ok(document)
    }
}
