//! BAML reader
//!
//! Reads a BAML stream back into records and builds a lightweight node tree.
//! Custom payloads are decoded through the serializer registry. In strict mode
//! a serializer must consume its whole payload and the stream must be bracketed
//! by document start and end records.

use crate::context_stack::{ContextFlags, ContextFrame, ParserStack};
use crate::error::{CompilerError, Result};
use crate::record::{self, BamlRecord};
use crate::serializer::{SerializedValue, SerializerRegistry};
use crate::types::*;
use crate::CompilerOptions;
use std::io::Cursor;

/// Value of one property on a materialized node
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Text(String),
    Custom(SerializedValue),
    Extension {
        extension: ExtensionTypeId,
        value: String,
        value_is_type_extension: bool,
        value_is_static_extension: bool,
    },
    TypeReference(String),
    Objects(Vec<BamlNode>),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BamlNode {
    pub type_name: String,
    pub assembly_name: String,
    pub type_id: u16,
    pub key: Option<String>,
    pub name: Option<String>,
    pub properties: Vec<(String, PropertyValue)>,
    pub constructor_args: Vec<String>,
    pub children: Vec<BamlNode>,
    pub text: Option<String>,
}

impl BamlNode {
    pub fn property(&self, name: &str) -> Option<&PropertyValue> {
        self.properties
            .iter()
            .find(|(property, _)| property == name)
            .map(|(_, value)| value)
    }

    /// Type name without its namespace
    pub fn short_name(&self) -> &str {
        self.type_name.rsplit('.').next().unwrap_or(&self.type_name)
    }

    /// Number of nodes below this one, including objects held by properties
    pub fn descendant_count(&self) -> usize {
        let in_properties: usize = self
            .properties
            .iter()
            .filter_map(|(_, value)| match value {
                PropertyValue::Objects(nodes) => Some(nodes),
                _ => None,
            })
            .flatten()
            .map(|node| 1 + node.descendant_count())
            .sum();
        let in_children: usize = self.children.iter().map(|node| 1 + node.descendant_count()).sum();
        in_properties + in_children
    }
}

/// Data held by a reader frame
#[derive(Debug, Clone)]
enum ReaderScope {
    Object(BamlNode),
    /// Objects collected for a complex property
    Property(Vec<BamlNode>),
}

pub struct BamlReader<'a> {
    cursor: Cursor<&'a [u8]>,
    registry: SerializerRegistry,
    strict: bool,
    debug_mode: bool,
    max_depth: usize,
    saw_document_end: bool,
}

impl<'a> BamlReader<'a> {
    pub fn new(bytes: &'a [u8]) -> Result<Self> {
        Self::with_options(bytes, &CompilerOptions::default())
    }

    /// Validate the header and position the reader on the first record
    pub fn with_options(bytes: &'a [u8], options: &CompilerOptions) -> Result<Self> {
        let mut cursor = Cursor::new(bytes);
        let (major, minor) = record::read_header(&mut cursor)?;

        let mut registry = SerializerRegistry::with_defaults();
        for name in &options.disabled_serializers {
            registry.disable(name);
        }

        if options.debug_mode {
            log::debug!("Reading BAML {}.{} stream of {} bytes", major, minor, bytes.len());
        }

        Ok(Self {
            cursor,
            registry,
            strict: options.strict_reader,
            debug_mode: options.debug_mode,
            max_depth: options.max_element_depth.saturating_add(EXTENSION_SCOPE_HEADROOM),
            saw_document_end: false,
        })
    }

    pub fn with_registry(mut self, registry: SerializerRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Byte offset of the next record
    pub fn position(&self) -> u64 {
        self.cursor.position()
    }

    fn at_end(&self) -> bool {
        self.cursor.position() as usize >= self.cursor.get_ref().len()
    }

    /// Next record, `None` once the stream is exhausted
    pub fn next_record(&mut self) -> Result<Option<BamlRecord>> {
        if self.at_end() {
            return Ok(None);
        }
        if self.saw_document_end && self.strict {
            return Err(CompilerError::invalid_format(format!(
                "Trailing data after DocumentEnd at offset {}",
                self.cursor.position()
            )));
        }

        let offset = self.cursor.position();
        let record = BamlRecord::read_from(&mut self.cursor)?;
        log::trace!("Record at {}: {:?}", offset, record);

        if record == BamlRecord::DocumentEnd {
            self.saw_document_end = true;
        }
        Ok(Some(record))
    }

    pub fn read_records(&mut self) -> Result<Vec<BamlRecord>> {
        let mut records = Vec::new();
        while let Some(record) = self.next_record()? {
            records.push(record);
        }
        Ok(records)
    }

    /// Decode a custom property payload
    pub fn decode_custom(&self, name: &str, value_type: ValueTypeId, payload: &[u8]) -> Result<SerializedValue> {
        let mut source = Cursor::new(payload);
        let value = self.registry.decode(value_type, &mut source)?;

        let consumed = source.position() as usize;
        if consumed != payload.len() {
            if self.strict {
                return Err(CompilerError::PayloadLengthMismatch {
                    record: format!("PropertyCustom {} ({})", name, value_type),
                    declared: payload.len(),
                    consumed,
                });
            }
            log::warn!(
                "{} payload for '{}' has {} unread bytes",
                value_type,
                name,
                payload.len() - consumed
            );
        }
        Ok(value)
    }

    /// Read the whole stream and build the node tree of its root element
    pub fn read_tree(&mut self) -> Result<BamlNode> {
        let mut stack: ParserStack<ReaderScope> = ParserStack::new();
        let mut root: Option<BamlNode> = None;
        let mut saw_start = false;

        while let Some(record) = self.next_record()? {
            match record {
                BamlRecord::DocumentStart => saw_start = true,
                BamlRecord::DocumentEnd => {}
                BamlRecord::ElementStart { type_id, assembly_name, type_name } => {
                    if root.is_some() {
                        return Err(CompilerError::invalid_format("Element after the root element"));
                    }
                    self.check_depth(&stack)?;
                    let handle = TypeHandle::new(assembly_name.clone(), type_name.clone(), type_id);
                    let mut flags = ContextFlags::OBJECT;
                    if !stack.is_empty() {
                        flags |= ContextFlags::ADDED_TO_TREE;
                    }
                    let mut frame = ContextFrame::expecting(flags, handle);
                    frame.set_data(ReaderScope::Object(BamlNode {
                        type_name,
                        assembly_name,
                        type_id,
                        ..BamlNode::default()
                    }));
                    stack.push(frame);
                }
                BamlRecord::ElementEnd => {
                    let mut frame = stack.pop()?;
                    let mut node = match frame.take_data() {
                        Some(ReaderScope::Object(node)) => node,
                        _ => return Err(CompilerError::invalid_format("ElementEnd closes a property scope")),
                    };
                    node.key = frame.key.take();
                    node.name = frame.name.take();

                    match stack.current_mut().and_then(|parent| parent.data_mut()) {
                        Some(ReaderScope::Object(parent)) => parent.children.push(node),
                        Some(ReaderScope::Property(values)) => values.push(node),
                        None => root = Some(node),
                    }
                }
                BamlRecord::PropertyComplexStart { name } => {
                    Self::current_object(&mut stack, "PropertyComplexStart")?;
                    self.check_depth(&stack)?;
                    let mut frame = ContextFrame::with_data(ContextFlags::PROPERTY, ReaderScope::Property(Vec::new()));
                    frame.name = Some(name);
                    stack.push(frame);
                }
                BamlRecord::PropertyComplexEnd => {
                    let mut frame = stack.pop()?;
                    let values = match frame.take_data() {
                        Some(ReaderScope::Property(values)) if frame.is_property() => values,
                        _ => return Err(CompilerError::invalid_format("PropertyComplexEnd closes an element")),
                    };
                    let name = frame.name.take().unwrap_or_default();
                    Self::current_object(&mut stack, "PropertyComplexEnd")?
                        .properties
                        .push((name, PropertyValue::Objects(values)));
                }
                BamlRecord::Property { name, value } => {
                    Self::current_object(&mut stack, "Property")?
                        .properties
                        .push((name, PropertyValue::Text(value)));
                }
                BamlRecord::PropertyCustom { name, value_type, payload } => {
                    let value = self.decode_custom(&name, value_type, &payload)?;
                    Self::current_object(&mut stack, "PropertyCustom")?
                        .properties
                        .push((name, PropertyValue::Custom(value)));
                }
                BamlRecord::PropertyWithExtension {
                    name,
                    extension,
                    value_is_type_extension,
                    value_is_static_extension,
                    value,
                } => {
                    Self::current_object(&mut stack, "PropertyWithExtension")?.properties.push((
                        name,
                        PropertyValue::Extension {
                            extension,
                            value,
                            value_is_type_extension,
                            value_is_static_extension,
                        },
                    ));
                }
                BamlRecord::PropertyTypeReference { name, type_name } => {
                    Self::current_object(&mut stack, "PropertyTypeReference")?
                        .properties
                        .push((name, PropertyValue::TypeReference(type_name)));
                }
                BamlRecord::ConstructorParameter { value } => {
                    Self::current_object(&mut stack, "ConstructorParameter")?
                        .constructor_args
                        .push(value);
                }
                BamlRecord::Text { value } => {
                    let node = Self::current_object(&mut stack, "Text")?;
                    match &mut node.text {
                        Some(text) => {
                            text.push(' ');
                            text.push_str(&value);
                        }
                        None => node.text = Some(value),
                    }
                }
                BamlRecord::DefKey { key } => {
                    stack.peek_mut()?.key = Some(key);
                }
                BamlRecord::DefName { name } => {
                    let frame = stack.peek_mut()?;
                    if !frame.is_object() {
                        return Err(CompilerError::invalid_format("DefName outside an element"));
                    }
                    frame.name = Some(name);
                }
            }
        }

        if !stack.is_empty() {
            return Err(CompilerError::invalid_format(format!(
                "Stream ended with {} open scopes",
                stack.depth()
            )));
        }
        if self.strict && !(saw_start && self.saw_document_end) {
            return Err(CompilerError::invalid_format("Stream is not bracketed by DocumentStart/DocumentEnd"));
        }

        let root = root.ok_or_else(|| CompilerError::invalid_format("Stream has no root element"))?;
        if self.debug_mode {
            log::debug!("Read {} with {} descendants", root.type_name, root.descendant_count());
        }
        Ok(root)
    }

    /// Nesting is bounded so that the node tree can be walked and dropped recursively
    fn check_depth(&self, stack: &ParserStack<ReaderScope>) -> Result<()> {
        if stack.depth() >= self.max_depth {
            return Err(CompilerError::LimitExceeded {
                limit_type: format!("scope nesting at offset {}", self.cursor.position()),
                limit: self.max_depth,
            });
        }
        Ok(())
    }

    fn current_object<'s>(
        stack: &'s mut ParserStack<ReaderScope>,
        record: &'static str,
    ) -> Result<&'s mut BamlNode> {
        match stack.peek_mut()?.data_mut() {
            Some(ReaderScope::Object(node)) => Ok(node),
            _ => Err(CompilerError::invalid_format(format!("{} record outside an element", record))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::BamlDocument;
    use crate::serializer::Color;

    fn stream(records: Vec<BamlRecord>) -> Vec<u8> {
        BamlDocument { records }.to_bytes().unwrap()
    }

    fn element(name: &str) -> BamlRecord {
        BamlRecord::ElementStart {
            type_id: UNKNOWN_TYPE_ID,
            assembly_name: String::new(),
            type_name: name.to_string(),
        }
    }

    fn strict() -> CompilerOptions {
        CompilerOptions {
            strict_reader: true,
            ..CompilerOptions::default()
        }
    }

    #[test]
    fn test_tree_from_records() {
        let bytes = stream(vec![
            BamlRecord::DocumentStart,
            element("Grid"),
            BamlRecord::DefName { name: "root".to_string() },
            element("Button"),
            BamlRecord::Property {
                name: "Width".to_string(),
                value: "100".to_string(),
            },
            BamlRecord::PropertyCustom {
                name: "Background".to_string(),
                value_type: ValueTypeId::Brush,
                payload: vec![0x01, 0x00, 0x00, 0xFF, 0xFF],
            },
            BamlRecord::Text { value: "OK".to_string() },
            BamlRecord::ElementEnd,
            BamlRecord::ElementEnd,
            BamlRecord::DocumentEnd,
        ]);

        let root = BamlReader::with_options(&bytes, &strict()).unwrap().read_tree().unwrap();
        assert_eq!(root.type_name, "Grid");
        assert_eq!(root.name.as_deref(), Some("root"));
        assert_eq!(root.children.len(), 1);
        assert_eq!(root.descendant_count(), 1);

        let button = &root.children[0];
        assert_eq!(button.property("Width"), Some(&PropertyValue::Text("100".to_string())));
        match button.property("Background") {
            Some(PropertyValue::Custom(SerializedValue::Brush(brush))) => {
                assert_eq!(brush.color(), Color::new(0xFF, 0xFF, 0, 0));
            }
            other => panic!("Unexpected background {:?}", other),
        }
        assert_eq!(button.text.as_deref(), Some("OK"));
    }

    #[test]
    fn test_complex_property_and_keys() {
        let bytes = stream(vec![
            BamlRecord::DocumentStart,
            element("ResourceDictionary"),
            element("Style"),
            BamlRecord::DefKey { key: "Primary".to_string() },
            BamlRecord::PropertyTypeReference {
                name: "TargetType".to_string(),
                type_name: "Button".to_string(),
            },
            BamlRecord::PropertyComplexStart { name: "Tag".to_string() },
            element("NullExtension"),
            BamlRecord::ElementEnd,
            BamlRecord::PropertyComplexEnd,
            BamlRecord::ElementEnd,
            BamlRecord::ElementEnd,
            BamlRecord::DocumentEnd,
        ]);

        let root = BamlReader::new(&bytes).unwrap().read_tree().unwrap();
        let style = &root.children[0];
        assert_eq!(style.key.as_deref(), Some("Primary"));
        assert_eq!(
            style.property("TargetType"),
            Some(&PropertyValue::TypeReference("Button".to_string()))
        );
        match style.property("Tag") {
            Some(PropertyValue::Objects(nodes)) => assert_eq!(nodes[0].short_name(), "NullExtension"),
            other => panic!("Unexpected tag {:?}", other),
        }
        assert_eq!(root.descendant_count(), 2);
    }

    #[test]
    fn test_strict_reader_rejects_unconsumed_custom_payload() {
        let bytes = stream(vec![
            BamlRecord::DocumentStart,
            element("Border"),
            BamlRecord::PropertyCustom {
                name: "Background".to_string(),
                value_type: ValueTypeId::Brush,
                payload: vec![0x01, 0x00, 0x00, 0xFF, 0xFF, 0xEE],
            },
            BamlRecord::ElementEnd,
            BamlRecord::DocumentEnd,
        ]);

        assert!(matches!(
            BamlReader::with_options(&bytes, &strict()).unwrap().read_tree(),
            Err(CompilerError::PayloadLengthMismatch { declared: 6, consumed: 5, .. })
        ));
        // Lenient readers skip the extra byte
        assert!(BamlReader::new(&bytes).unwrap().read_tree().is_ok());
    }

    #[test]
    fn test_strict_reader_requires_document_brackets() {
        let bytes = stream(vec![element("Grid"), BamlRecord::ElementEnd]);
        assert!(BamlReader::new(&bytes).unwrap().read_tree().is_ok());
        assert!(BamlReader::with_options(&bytes, &strict()).unwrap().read_tree().is_err());

        let bytes = stream(vec![
            BamlRecord::DocumentStart,
            element("Grid"),
            BamlRecord::ElementEnd,
            BamlRecord::DocumentEnd,
            BamlRecord::DocumentEnd,
        ]);
        assert!(BamlReader::with_options(&bytes, &strict()).unwrap().read_tree().is_err());
    }

    #[test]
    fn test_unbalanced_streams() {
        let bytes = stream(vec![BamlRecord::DocumentStart, element("Grid"), BamlRecord::DocumentEnd]);
        assert!(BamlReader::new(&bytes).unwrap().read_tree().is_err());

        let bytes = stream(vec![BamlRecord::ElementEnd]);
        assert!(matches!(
            BamlReader::new(&bytes).unwrap().read_tree(),
            Err(CompilerError::EmptyStack { .. })
        ));

        let bytes = stream(vec![
            element("Grid"),
            BamlRecord::PropertyComplexStart { name: "Children".to_string() },
            BamlRecord::ElementEnd,
        ]);
        assert!(BamlReader::new(&bytes).unwrap().read_tree().is_err());
    }

    fn nested(depth: usize) -> Vec<u8> {
        let mut records = vec![BamlRecord::DocumentStart];
        records.extend((0..depth).map(|_| element("Border")));
        records.extend((0..depth).map(|_| BamlRecord::ElementEnd));
        records.push(BamlRecord::DocumentEnd);
        stream(records)
    }

    #[test]
    fn test_nesting_depth_is_limited() {
        let options = CompilerOptions {
            max_element_depth: 8,
            ..CompilerOptions::default()
        };
        let limit = 8 + EXTENSION_SCOPE_HEADROOM;
        assert!(BamlReader::with_options(&nested(limit), &options).unwrap().read_tree().is_ok());
        match BamlReader::with_options(&nested(limit + 1), &options).unwrap().read_tree() {
            Err(CompilerError::LimitExceeded { limit: reported, .. }) => assert_eq!(reported, limit),
            other => panic!("Expected depth limit, got {:?}", other),
        }

        // A deep stream fails cleanly under the default limit
        assert!(matches!(
            BamlReader::new(&nested(20_000)).unwrap().read_tree(),
            Err(CompilerError::LimitExceeded { .. })
        ));
    }

    #[test]
    fn test_property_scopes_count_toward_depth() {
        let options = CompilerOptions {
            max_element_depth: 1,
            ..CompilerOptions::default()
        };
        let mut records = Vec::new();
        records.extend((0..=EXTENSION_SCOPE_HEADROOM / 2).flat_map(|_| {
            vec![element("Grid"), BamlRecord::PropertyComplexStart { name: "Tag".to_string() }]
        }));
        records.push(element("NullExtension"));
        records.push(BamlRecord::ElementEnd);
        for _ in 0..=EXTENSION_SCOPE_HEADROOM / 2 {
            records.push(BamlRecord::PropertyComplexEnd);
            records.push(BamlRecord::ElementEnd);
        }
        let bytes = stream(records);

        assert!(matches!(
            BamlReader::with_options(&bytes, &options).unwrap().read_tree(),
            Err(CompilerError::LimitExceeded { .. })
        ));
    }

    #[test]
    fn test_truncated_stream() {
        let mut bytes = stream(vec![
            BamlRecord::DocumentStart,
            element("Grid"),
            BamlRecord::ElementEnd,
            BamlRecord::DocumentEnd,
        ]);
        bytes.truncate(bytes.len() - 3);
        assert!(BamlReader::new(&bytes).unwrap().read_records().is_err());
    }

    #[test]
    fn test_header_validation() {
        assert!(BamlReader::new(b"BAM").is_err());
        assert!(BamlReader::new(b"XAML\x00\x00\x60\x00").is_err());
        assert!(BamlReader::new(b"BAML\x00\x00\x60\x00").is_ok());
    }
}
