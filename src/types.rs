//! Core types and constants for the BAML format

use std::fmt;

// BAML Format Constants
pub const BAML_MAGIC: &[u8; 4] = b"BAML";
pub const BAML_VERSION_MAJOR: u16 = 0;
pub const BAML_VERSION_MINOR: u16 = 96;
pub const BAML_HEADER_SIZE: usize = 8;

/// XAML presentation namespace
pub const PRESENTATION_NAMESPACE: &str = "http://schemas.microsoft.com/winfx/2006/xaml/presentation";
/// XAML language namespace (`x:` prefix)
pub const XAML_NAMESPACE: &str = "http://schemas.microsoft.com/winfx/2006/xaml";

pub const PRESENTATION_ASSEMBLY: &str = "PresentationFramework";
pub const CORE_ASSEMBLY: &str = "PresentationCore";
pub const XAML_ASSEMBLY: &str = "System.Xaml";

/// Type id for types without a fast numeric id
pub const UNKNOWN_TYPE_ID: u16 = 0;
/// Type id of the unrecognized-extension marker
pub const UNKNOWN_EXTENSION_TYPE_ID: u16 = 0xFFFF;

// Compiler limits
pub const MAX_ELEMENT_DEPTH: usize = 256;
pub const MAX_EXTENSION_NESTING: usize = 32;
/// Scopes a compact-syntax expansion adds on top of its element when read back
pub const EXTENSION_SCOPE_HEADROOM: usize = 2 * (MAX_EXTENSION_NESTING + 1);
/// Upper bound on values decoded from one collection payload
pub const MAX_COLLECTION_COUNT: usize = 1 << 20;

/// Built-in markup extensions with a fast-path numeric id.
///
/// `None` is the sentinel stored when an attribute value is not itself an
/// extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u16)]
pub enum ExtensionTypeId {
    #[default]
    None = 0x0000,
    Type = 0x0001,
    Static = 0x0002,
    StaticResource = 0x0003,
    DynamicResource = 0x0004,
    Null = 0x0005,
    Binding = 0x0006,
    TemplateBinding = 0x0007,
}

impl ExtensionTypeId {
    /// Map an extension type name (with or without the `Extension` suffix)
    pub fn from_name(name: &str) -> Self {
        let local = name.rsplit(':').next().unwrap_or(name);
        let short = local.strip_suffix("Extension").unwrap_or(local);
        match short {
            "Type" => Self::Type,
            "Static" => Self::Static,
            "StaticResource" => Self::StaticResource,
            "DynamicResource" => Self::DynamicResource,
            "Null" => Self::Null,
            "Binding" => Self::Binding,
            "TemplateBinding" => Self::TemplateBinding,
            _ => Self::None,
        }
    }

    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            0x0000 => Some(Self::None),
            0x0001 => Some(Self::Type),
            0x0002 => Some(Self::Static),
            0x0003 => Some(Self::StaticResource),
            0x0004 => Some(Self::DynamicResource),
            0x0005 => Some(Self::Null),
            0x0006 => Some(Self::Binding),
            0x0007 => Some(Self::TemplateBinding),
            _ => None,
        }
    }

    /// Extensions that can be written as a single `PropertyWithExtension` record
    pub fn has_fast_path(self) -> bool {
        matches!(
            self,
            Self::Type | Self::Static | Self::StaticResource | Self::DynamicResource
        )
    }
}

/// Value types with a custom binary serializer.
///
/// The numeric value is the serializer id written into `PropertyCustom` records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ValueTypeId {
    Text = 0x00,
    Brush = 0x01,
    PathGeometry = 0x02,
    PointCollection = 0x03,
    Int32Collection = 0x04,
}

impl ValueTypeId {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x00 => Some(Self::Text),
            0x01 => Some(Self::Brush),
            0x02 => Some(Self::PathGeometry),
            0x03 => Some(Self::PointCollection),
            0x04 => Some(Self::Int32Collection),
            _ => None,
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "Text" | "String" => Some(Self::Text),
            "Brush" => Some(Self::Brush),
            "PathGeometry" | "Geometry" => Some(Self::PathGeometry),
            "PointCollection" => Some(Self::PointCollection),
            "Int32Collection" => Some(Self::Int32Collection),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Text => "Text",
            Self::Brush => "Brush",
            Self::PathGeometry => "PathGeometry",
            Self::PointCollection => "PointCollection",
            Self::Int32Collection => "Int32Collection",
        }
    }
}

impl fmt::Display for ValueTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Resolved type identity handed out by a type resolver
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct TypeHandle {
    pub assembly_name: String,
    pub full_name: String,
    /// Fast numeric id, `UNKNOWN_TYPE_ID` for types outside the known table
    pub type_id: u16,
}

impl TypeHandle {
    pub fn new(assembly_name: impl Into<String>, full_name: impl Into<String>, type_id: u16) -> Self {
        Self {
            assembly_name: assembly_name.into(),
            full_name: full_name.into(),
            type_id,
        }
    }

    /// Marker handed out for extensions the resolver does not recognize
    pub fn unknown_extension() -> Self {
        Self::new("", "UnknownExtension", UNKNOWN_EXTENSION_TYPE_ID)
    }

    pub fn is_unknown_extension(&self) -> bool {
        self.type_id == UNKNOWN_EXTENSION_TYPE_ID
    }

    /// Type name without its namespace
    pub fn short_name(&self) -> &str {
        self.full_name.rsplit('.').next().unwrap_or(&self.full_name)
    }
}

impl fmt::Display for TypeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.assembly_name.is_empty() {
            write!(f, "{}", self.full_name)
        } else {
            write!(f, "{}, {}", self.full_name, self.assembly_name)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_from_name() {
        assert_eq!(ExtensionTypeId::from_name("x:Type"), ExtensionTypeId::Type);
        assert_eq!(ExtensionTypeId::from_name("StaticExtension"), ExtensionTypeId::Static);
        assert_eq!(ExtensionTypeId::from_name("StaticResource"), ExtensionTypeId::StaticResource);
        assert_eq!(ExtensionTypeId::from_name("local:Custom"), ExtensionTypeId::None);
    }

    #[test]
    fn test_value_type_ids_round_trip() {
        for id in [
            ValueTypeId::Text,
            ValueTypeId::Brush,
            ValueTypeId::PathGeometry,
            ValueTypeId::PointCollection,
            ValueTypeId::Int32Collection,
        ] {
            assert_eq!(ValueTypeId::from_u8(id as u8), Some(id));
            assert_eq!(ValueTypeId::from_name(id.name()), Some(id));
        }
        assert_eq!(ValueTypeId::from_u8(0x7F), None);
    }

    #[test]
    fn test_unknown_extension_marker() {
        let marker = TypeHandle::unknown_extension();
        assert!(marker.is_unknown_extension());
        assert!(!TypeHandle::new(XAML_ASSEMBLY, "System.Windows.Markup.TypeExtension", 1).is_unknown_extension());
        assert_eq!(
            TypeHandle::new(PRESENTATION_ASSEMBLY, "System.Windows.Controls.Button", 40).short_name(),
            "Button"
        );
    }
}
