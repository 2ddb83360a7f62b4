//! Deferred attribute records
//!
//! Compact-syntax attribute values are not written when they are read. They are
//! captured here and expanded once every ordinary attribute on the element has
//! been processed, in the order they appeared in the source.

use crate::error::SourcePosition;
use crate::markup_extension::MarkupExtension;
use crate::types::{ExtensionTypeId, TypeHandle, ValueTypeId};

/// One deferred attribute.
///
/// The base fields describe the extension being applied. Property assignments
/// additionally carry an [`ExtendedProperty`] payload; directive attributes such
/// as `x:Key` do not.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeRecord {
    /// Resolved type of the extension, or the owning element for deferred literals
    pub target_type: TypeHandle,
    /// Type declaring the attribute (`Grid` for `Grid.Row`)
    pub declaring_type: Option<TypeHandle>,
    /// Argument text with the `{TypeName` prefix stripped
    pub args: String,
    pub namespace_uri: String,
    pub position: SourcePosition,
    /// Eligible for a single-record fast path
    pub is_simple: bool,
    /// Parsed form of the value, `None` for deferred literals
    pub extension: Option<MarkupExtension>,
    pub extended: Option<ExtendedProperty>,
}

/// Fields only present when the attribute assigns a property
#[derive(Debug, Clone, PartialEq)]
pub struct ExtendedProperty {
    pub property_name: String,
    pub serializer_type: Option<ValueTypeId>,
    extension_type_id: ExtensionTypeId,
    pub is_value_nested_extension: bool,
    pub is_value_type_extension: bool,
}

impl ExtendedProperty {
    /// Property whose value is a plain literal held back for later
    pub fn literal(property_name: impl Into<String>, serializer_type: Option<ValueTypeId>) -> Self {
        Self {
            property_name: property_name.into(),
            serializer_type,
            extension_type_id: ExtensionTypeId::None,
            is_value_nested_extension: false,
            is_value_type_extension: false,
        }
    }

    /// Property whose value is the extension `extension`
    pub fn from_extension(
        property_name: impl Into<String>,
        serializer_type: Option<ValueTypeId>,
        extension: &MarkupExtension,
    ) -> Self {
        let nested = extension.nested_simple_extension();
        Self {
            property_name: property_name.into(),
            serializer_type,
            extension_type_id: extension.extension_type_id(),
            is_value_nested_extension: nested.is_some(),
            is_value_type_extension: nested
                .map(|inner| inner.extension_type_id() == ExtensionTypeId::Type)
                .unwrap_or(false),
        }
    }

    /// `ExtensionTypeId::None` unless the value is itself an extension
    pub fn extension_type_id(&self) -> ExtensionTypeId {
        self.extension_type_id
    }
}

impl AttributeRecord {
    pub fn new(
        target_type: TypeHandle,
        namespace_uri: impl Into<String>,
        args: impl Into<String>,
        position: SourcePosition,
    ) -> Self {
        Self {
            target_type,
            declaring_type: None,
            args: args.into(),
            namespace_uri: namespace_uri.into(),
            position,
            is_simple: false,
            extension: None,
            extended: None,
        }
    }

    /// Record for a compact-syntax value; argument text and simplicity come from `extension`
    pub fn for_extension(
        target_type: TypeHandle,
        namespace_uri: impl Into<String>,
        extension: MarkupExtension,
        position: SourcePosition,
    ) -> Self {
        let mut record = Self::new(target_type, namespace_uri, extension.raw_args.clone(), position);
        record.is_simple = extension.is_simple() || extension.nested_simple_extension().is_some();
        record.extension = Some(extension);
        record
    }

    pub fn with_declaring_type(mut self, declaring_type: TypeHandle) -> Self {
        self.declaring_type = Some(declaring_type);
        self
    }

    pub fn with_property(mut self, property: ExtendedProperty) -> Self {
        self.extended = Some(property);
        self
    }

    pub fn property_name(&self) -> Option<&str> {
        self.extended.as_ref().map(|p| p.property_name.as_str())
    }

    fn extension_type_id(&self) -> ExtensionTypeId {
        match (&self.extended, &self.extension) {
            (Some(property), _) => property.extension_type_id(),
            (None, Some(extension)) => extension.extension_type_id(),
            (None, None) => ExtensionTypeId::None,
        }
    }

    pub fn is_type_extension(&self) -> bool {
        self.extension_type_id() == ExtensionTypeId::Type
    }

    pub fn is_static_extension(&self) -> bool {
        self.extension_type_id() == ExtensionTypeId::Static
    }

    /// The extension type was not recognized by the resolver; the value is
    /// expanded as an ordinary object element.
    pub fn is_unknown_extension(&self) -> bool {
        self.target_type.is_unknown_extension()
    }
}

/// Append-only record buffer for one element scope
#[derive(Debug, Default, Clone)]
pub struct AttributeCache {
    records: Vec<AttributeRecord>,
}

impl AttributeCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn capture(&mut self, record: AttributeRecord) {
        log::trace!(
            "Deferring attribute {} ({}) at {}",
            record.property_name().unwrap_or("<directive>"),
            record.target_type.full_name,
            record.position
        );
        self.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AttributeRecord> {
        self.records.iter()
    }

    /// Find a captured property assignment by name
    pub fn find_property(&self, name: &str) -> Option<&AttributeRecord> {
        self.records.iter().find(|r| r.property_name() == Some(name))
    }

    /// Take every record in encounter order, leaving the cache empty
    pub fn flush(&mut self) -> Vec<AttributeRecord> {
        std::mem::take(&mut self.records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markup_extension;
    use crate::types::XAML_ASSEMBLY;

    fn position(column: usize) -> SourcePosition {
        SourcePosition::new(4, column, 2)
    }

    fn extension_record(text: &str, property: &str, column: usize) -> AttributeRecord {
        let extension = markup_extension::parse(text).unwrap();
        let id = extension.extension_type_id();
        let target = TypeHandle::new(XAML_ASSEMBLY, format!("{:?}Extension", id), 0x0100 + id as u16);
        let prop = ExtendedProperty::from_extension(property, None, &extension);
        AttributeRecord::for_extension(target, "", extension, position(column)).with_property(prop)
    }

    #[test]
    fn test_type_and_static_predicates() {
        let ty = extension_record("{x:Type Button}", "TargetType", 10);
        assert!(ty.is_type_extension());
        assert!(!ty.is_static_extension());

        let st = extension_record("{x:Static SystemColors.WindowBrush}", "Background", 12);
        assert!(st.is_static_extension());
        assert!(!st.is_type_extension());
        assert!(st.is_simple);
    }

    #[test]
    fn test_literal_has_no_extension_id() {
        let prop = ExtendedProperty::literal("Value", Some(ValueTypeId::Brush));
        assert_eq!(prop.extension_type_id(), ExtensionTypeId::None);

        let record = AttributeRecord::new(TypeHandle::default(), "", "Red", position(3)).with_property(prop);
        assert!(!record.is_type_extension());
        assert!(!record.is_static_extension());
        assert!(record.extension.is_none());
    }

    #[test]
    fn test_nested_type_extension_flags() {
        let record = extension_record("{StaticResource {x:Type Button}}", "Style", 7);
        let prop = record.extended.as_ref().unwrap();
        assert!(prop.is_value_nested_extension);
        assert!(prop.is_value_type_extension);
        assert_eq!(prop.extension_type_id(), ExtensionTypeId::StaticResource);
    }

    #[test]
    fn test_unknown_extension() {
        let extension = markup_extension::parse("{local:Localize Greeting}").unwrap();
        let record = AttributeRecord::for_extension(TypeHandle::unknown_extension(), "clr-namespace:App", extension, position(1));
        assert!(record.is_unknown_extension());
        assert!(record.property_name().is_none());
    }

    #[test]
    fn test_flush_preserves_encounter_order() {
        let mut cache = AttributeCache::new();
        cache.capture(extension_record("{StaticResource A}", "Background", 5));
        cache.capture(extension_record("{StaticResource B}", "Foreground", 30));
        cache.capture(extension_record("{x:Null}", "Tag", 60));
        assert_eq!(cache.len(), 3);
        assert!(cache.find_property("Foreground").is_some());

        let names: Vec<_> = cache
            .flush()
            .into_iter()
            .map(|r| r.property_name().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["Background", "Foreground", "Tag"]);
        assert!(cache.is_empty());
    }
}
