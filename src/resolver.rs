//! Type resolution seam
//!
//! Reflection-based type resolution lives outside this crate. The compiler only
//! needs three answers from it: the handle for an element name, the handle for
//! a markup extension name, and the value type of a property. `KnownTypeResolver`
//! answers them from a built-in table of framework types.

use crate::types::*;

pub trait TypeResolver {
    /// Resolve an element tag. `None` for names the resolver has never heard of.
    fn resolve_element(&self, namespace_uri: &str, name: &str) -> Option<TypeHandle>;

    /// Resolve a markup extension name as written inside `{...}`.
    /// Unrecognized names yield `TypeHandle::unknown_extension()`.
    fn resolve_extension(&self, namespace_uri: &str, name: &str) -> TypeHandle;

    /// Value type of `property` on `owner`, `ValueTypeId::Text` when no custom
    /// serializer applies.
    fn property_value_type(&self, owner: Option<&TypeHandle>, property: &str) -> ValueTypeId;

    /// Content property of `owner`, if it declares one
    fn content_property(&self, _owner: &TypeHandle) -> Option<&'static str> {
        None
    }
}

/// Resolver backed by a fixed table of framework element and extension types
#[derive(Debug, Clone, Copy, Default)]
pub struct KnownTypeResolver;

impl KnownTypeResolver {
    pub fn new() -> Self {
        Self
    }

    fn known_element(name: &str) -> Option<(&'static str, &'static str, u16)> {
        let entry = match name {
            "Window" => ("System.Windows.Window", PRESENTATION_ASSEMBLY, 0x0010),
            "Grid" => ("System.Windows.Controls.Grid", PRESENTATION_ASSEMBLY, 0x0011),
            "StackPanel" => ("System.Windows.Controls.StackPanel", PRESENTATION_ASSEMBLY, 0x0012),
            "Canvas" => ("System.Windows.Controls.Canvas", PRESENTATION_ASSEMBLY, 0x0013),
            "Border" => ("System.Windows.Controls.Border", PRESENTATION_ASSEMBLY, 0x0014),
            "Button" => ("System.Windows.Controls.Button", PRESENTATION_ASSEMBLY, 0x0015),
            "TextBlock" => ("System.Windows.Controls.TextBlock", PRESENTATION_ASSEMBLY, 0x0016),
            "TextBox" => ("System.Windows.Controls.TextBox", PRESENTATION_ASSEMBLY, 0x0017),
            "ContentPresenter" => ("System.Windows.Controls.ContentPresenter", PRESENTATION_ASSEMBLY, 0x0018),
            "Rectangle" => ("System.Windows.Shapes.Rectangle", PRESENTATION_ASSEMBLY, 0x0020),
            "Ellipse" => ("System.Windows.Shapes.Ellipse", PRESENTATION_ASSEMBLY, 0x0021),
            "Path" => ("System.Windows.Shapes.Path", PRESENTATION_ASSEMBLY, 0x0022),
            "Polygon" => ("System.Windows.Shapes.Polygon", PRESENTATION_ASSEMBLY, 0x0023),
            "Polyline" => ("System.Windows.Shapes.Polyline", PRESENTATION_ASSEMBLY, 0x0024),
            "Style" => ("System.Windows.Style", PRESENTATION_ASSEMBLY, 0x0030),
            "Setter" => ("System.Windows.Setter", PRESENTATION_ASSEMBLY, 0x0031),
            "Trigger" => ("System.Windows.Trigger", PRESENTATION_ASSEMBLY, 0x0032),
            "DataTrigger" => ("System.Windows.DataTrigger", PRESENTATION_ASSEMBLY, 0x0033),
            "MultiTrigger" => ("System.Windows.MultiTrigger", PRESENTATION_ASSEMBLY, 0x0034),
            "EventTrigger" => ("System.Windows.EventTrigger", PRESENTATION_ASSEMBLY, 0x0035),
            "ControlTemplate" => ("System.Windows.Controls.ControlTemplate", PRESENTATION_ASSEMBLY, 0x0036),
            "DataTemplate" => ("System.Windows.DataTemplate", PRESENTATION_ASSEMBLY, 0x0037),
            "ItemsPanelTemplate" => ("System.Windows.Controls.ItemsPanelTemplate", PRESENTATION_ASSEMBLY, 0x0038),
            "ResourceDictionary" => ("System.Windows.ResourceDictionary", PRESENTATION_ASSEMBLY, 0x0039),
            "BeginStoryboard" => ("System.Windows.Media.Animation.BeginStoryboard", PRESENTATION_ASSEMBLY, 0x003A),
            "SolidColorBrush" => ("System.Windows.Media.SolidColorBrush", CORE_ASSEMBLY, 0x0040),
            "PathGeometry" => ("System.Windows.Media.PathGeometry", CORE_ASSEMBLY, 0x0041),
            "MeshGeometry3D" => ("System.Windows.Media.Media3D.MeshGeometry3D", CORE_ASSEMBLY, 0x0042),
            _ => return None,
        };
        Some(entry)
    }

    fn known_extension(name: &str) -> Option<(&'static str, &'static str, u16)> {
        let entry = match ExtensionTypeId::from_name(name) {
            ExtensionTypeId::Type => ("System.Windows.Markup.TypeExtension", XAML_ASSEMBLY),
            ExtensionTypeId::Static => ("System.Windows.Markup.StaticExtension", XAML_ASSEMBLY),
            ExtensionTypeId::Null => ("System.Windows.Markup.NullExtension", XAML_ASSEMBLY),
            ExtensionTypeId::StaticResource => ("System.Windows.StaticResourceExtension", PRESENTATION_ASSEMBLY),
            ExtensionTypeId::DynamicResource => ("System.Windows.DynamicResourceExtension", PRESENTATION_ASSEMBLY),
            ExtensionTypeId::Binding => ("System.Windows.Data.Binding", PRESENTATION_ASSEMBLY),
            ExtensionTypeId::TemplateBinding => ("System.Windows.TemplateBindingExtension", PRESENTATION_ASSEMBLY),
            ExtensionTypeId::None => return None,
        };
        Some((entry.0, entry.1, 0x0100 + ExtensionTypeId::from_name(name) as u16))
    }
}

impl TypeResolver for KnownTypeResolver {
    fn resolve_element(&self, _namespace_uri: &str, name: &str) -> Option<TypeHandle> {
        let local = name.rsplit(':').next().unwrap_or(name);
        Self::known_element(local).map(|(full, assembly, id)| TypeHandle::new(assembly, full, id))
    }

    fn resolve_extension(&self, _namespace_uri: &str, name: &str) -> TypeHandle {
        match Self::known_extension(name) {
            Some((full, assembly, id)) => TypeHandle::new(assembly, full, id),
            None => TypeHandle::unknown_extension(),
        }
    }

    fn property_value_type(&self, owner: Option<&TypeHandle>, property: &str) -> ValueTypeId {
        let local = property.rsplit('.').next().unwrap_or(property);
        match local {
            "Background" | "Foreground" | "BorderBrush" | "Fill" | "Stroke" | "OpacityMask"
            | "CaretBrush" | "SelectionBrush" => ValueTypeId::Brush,
            "Points" => ValueTypeId::PointCollection,
            "TriangleIndices" => ValueTypeId::Int32Collection,
            "Data" => {
                // Data is only geometry on Path; elsewhere it is an arbitrary object
                match owner {
                    Some(owner) if owner.short_name() != "Path" => ValueTypeId::Text,
                    _ => ValueTypeId::PathGeometry,
                }
            }
            _ => ValueTypeId::Text,
        }
    }

    fn content_property(&self, owner: &TypeHandle) -> Option<&'static str> {
        match owner.short_name() {
            "Window" | "Button" | "Border" => Some("Content"),
            "Grid" | "StackPanel" | "Canvas" => Some("Children"),
            "TextBlock" | "TextBox" => Some("Text"),
            "Style" => Some("Setters"),
            "ControlTemplate" | "DataTemplate" | "ItemsPanelTemplate" => Some("VisualTree"),
            "EventTrigger" => Some("Actions"),
            "Trigger" | "DataTrigger" | "MultiTrigger" => Some("Setters"),
            _ => None,
        }
    }
}
