//! Custom binary serializers for attribute values
//!
//! A serializer turns the text of an attribute into a compact binary payload
//! that is embedded in a `PropertyCustom` record, and turns that payload back
//! into a typed value. The reader is positioned right after the payload once
//! `convert_custom_binary_to_object` returns, so each variant must read exactly
//! what it wrote.
//!
//! Serializers are looked up through a [`SerializerRegistry`] keyed by
//! [`ValueTypeId`], built once before compilation starts.

pub mod brush;
pub mod color;
pub mod int32_collection;
pub mod numeric;
pub mod path;
pub mod point_collection;

use crate::error::{CompilerError, Result};
use crate::types::ValueTypeId;
use std::collections::HashMap;
use std::io::{Read, Write};

pub use brush::{BrushSerializer, BrushValue};
pub use color::Color;
pub use int32_collection::Int32CollectionSerializer;
pub use path::{FillRule, PathCommand, PathGeometry, PathGeometrySerializer};
pub use point_collection::{Point, PointCollectionSerializer};

/// A value reconstructed from a custom binary payload
#[derive(Debug, Clone, PartialEq)]
pub enum SerializedValue {
    Brush(BrushValue),
    Geometry(PathGeometry),
    Points(Vec<Point>),
    Int32s(Vec<i32>),
}

pub trait CustomBinarySerializer: Send + Sync {
    fn name(&self) -> &'static str;

    fn value_type(&self) -> ValueTypeId;

    /// Encode `text` into `sink`. `Ok(false)` means the value is not eligible
    /// and nothing was written; the caller stores it as text instead.
    fn convert_string_to_custom_binary(&self, _sink: &mut dyn Write, _text: &str) -> Result<bool> {
        Err(CompilerError::UnsupportedCustomSerialization {
            serializer: self.name(),
        })
    }

    /// Decode one payload previously written by this serializer
    fn convert_custom_binary_to_object(&self, _source: &mut dyn Read) -> Result<SerializedValue> {
        Err(CompilerError::UnsupportedCustomSerialization {
            serializer: self.name(),
        })
    }
}

/// Serializer for values that are only ever stored as text
#[derive(Debug, Default, Clone, Copy)]
pub struct TextOnlySerializer;

impl CustomBinarySerializer for TextOnlySerializer {
    fn name(&self) -> &'static str {
        "TextOnlySerializer"
    }

    fn value_type(&self) -> ValueTypeId {
        ValueTypeId::Text
    }
}

/// Maps value types to their serializer
pub struct SerializerRegistry {
    serializers: HashMap<ValueTypeId, Box<dyn CustomBinarySerializer>>,
}

impl Default for SerializerRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl std::fmt::Debug for SerializerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<_> = self.serializers.values().map(|s| s.name()).collect();
        names.sort_unstable();
        f.debug_struct("SerializerRegistry").field("serializers", &names).finish()
    }
}

impl SerializerRegistry {
    /// Registry with no serializers at all
    pub fn empty() -> Self {
        Self {
            serializers: HashMap::new(),
        }
    }

    /// Registry with every built-in serializer
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        registry.register(Box::new(TextOnlySerializer));
        registry.register(Box::new(BrushSerializer::new()));
        registry.register(Box::new(PathGeometrySerializer::new()));
        registry.register(Box::new(PointCollectionSerializer::new()));
        registry.register(Box::new(Int32CollectionSerializer::new()));
        registry
    }

    /// Register `serializer`, replacing any previous one for the same value type
    pub fn register(&mut self, serializer: Box<dyn CustomBinarySerializer>) {
        self.serializers.insert(serializer.value_type(), serializer);
    }

    /// Remove the serializer named `name`; returns whether one was removed
    pub fn disable(&mut self, name: &str) -> bool {
        let before = self.serializers.len();
        self.serializers.retain(|_, s| s.name() != name);
        before != self.serializers.len()
    }

    pub fn get(&self, value_type: ValueTypeId) -> Option<&dyn CustomBinarySerializer> {
        self.serializers.get(&value_type).map(|s| s.as_ref())
    }

    pub fn len(&self) -> usize {
        self.serializers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.serializers.is_empty()
    }

    /// Try to encode `text` as a custom payload.
    ///
    /// `Ok(None)` when there is no serializer, the serializer is text-only, or
    /// the value is ineligible. The caller then writes a text record.
    pub fn try_encode(&self, value_type: ValueTypeId, text: &str) -> Result<Option<Vec<u8>>> {
        let serializer = match self.get(value_type) {
            Some(serializer) => serializer,
            None => return Ok(None),
        };

        let mut payload = Vec::new();
        match serializer.convert_string_to_custom_binary(&mut payload, text) {
            Ok(true) => {
                log::trace!("{} encoded '{}' as {}", serializer.name(), text, hex::encode(&payload));
                Ok(Some(payload))
            }
            Ok(false) => {
                log::debug!("{} rejected '{}', storing as text", serializer.name(), text);
                Ok(None)
            }
            Err(e) if e.is_recoverable() => {
                log::trace!("{}: {}", serializer.name(), e);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Decode a payload written by the serializer registered for `value_type`
    pub fn decode(&self, value_type: ValueTypeId, source: &mut dyn Read) -> Result<SerializedValue> {
        match self.get(value_type) {
            Some(serializer) => serializer.convert_custom_binary_to_object(source),
            None => Err(CompilerError::InvalidFormat {
                message: format!("No serializer registered for {}", value_type),
            }),
        }
    }
}
