//! Markup compiler
//!
//! Event-driven writer that turns a stream of markup events (element start,
//! attribute, text, element end) into BAML records. The tokenizer producing the
//! events lives outside this crate.
//!
//! Ordinary attributes are written as soon as they arrive. Compact-syntax values
//! and `Setter.Value` are captured into the element's attribute cache and
//! expanded when the start tag closes, which happens on the first child, text,
//! or end event for that element.

use crate::attribute_cache::{AttributeCache, AttributeRecord, ExtendedProperty};
use crate::context_stack::{ContextFlags, ParserStack};
use crate::error::{CompilerError, Result, SourcePosition};
use crate::markup_extension::{self, ExtensionArg, ExtensionValue, MarkupExtension};
use crate::record::{BamlDocument, BamlRecord};
use crate::resolver::{KnownTypeResolver, TypeResolver};
use crate::serializer::SerializerRegistry;
use crate::style_mode::{StyleMode, StyleModeStack};
use crate::types::*;
use crate::CompilerOptions;
use serde::Serialize;

/// Property name used for `x:Key` values that need expansion
const KEY_DIRECTIVE: &str = "x:Key";

/// One event from the markup tokenizer
#[derive(Debug, Clone, PartialEq)]
pub enum MarkupEvent {
    StartElement {
        namespace_uri: String,
        name: String,
        position: SourcePosition,
    },
    Attribute {
        namespace_uri: String,
        name: String,
        value: String,
        position: SourcePosition,
    },
    Text {
        value: String,
        position: SourcePosition,
    },
    EndElement {
        position: SourcePosition,
    },
}

/// Counters collected while compiling one document
#[derive(Debug, Clone, Default, Serialize)]
pub struct CompilationStats {
    /// Object elements written
    pub element_count: usize,

    /// Attributes received, including deferred ones
    pub attribute_count: usize,

    /// Attributes captured into an attribute cache
    pub deferred_attribute_count: usize,

    /// Properties written with a custom binary payload
    pub custom_property_count: usize,

    /// Values a serializer rejected and that were stored as text
    pub text_fallback_count: usize,

    /// Records written, including document start and end
    pub record_count: usize,

    /// Deepest element nesting reached
    pub max_depth: usize,
}

/// Per-frame compiler state
#[derive(Debug, Clone, Default)]
struct ElementScope {
    /// Element type; unset for property element scopes
    handle: Option<TypeHandle>,
    cache: AttributeCache,
    start_tag_closed: bool,
    /// Style modes to pop when the scope closes
    style_modes_pushed: usize,
    /// `Property` attribute of a `Setter`
    setter_property: Option<String>,
    /// `TargetType` of a style or template
    target_type: Option<String>,
    position: SourcePosition,
}

pub struct MarkupCompiler<R: TypeResolver = KnownTypeResolver> {
    options: CompilerOptions,
    resolver: R,
    registry: SerializerRegistry,
    stack: ParserStack<ElementScope>,
    style_modes: StyleModeStack,
    document: BamlDocument,
    stats: CompilationStats,
    started: bool,
    root_closed: bool,
}

impl MarkupCompiler<KnownTypeResolver> {
    pub fn new() -> Self {
        Self::with_options(CompilerOptions::default())
    }

    pub fn with_options(options: CompilerOptions) -> Self {
        Self::with_resolver(KnownTypeResolver::new(), options)
    }
}

impl Default for MarkupCompiler<KnownTypeResolver> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: TypeResolver> MarkupCompiler<R> {
    pub fn with_resolver(resolver: R, options: CompilerOptions) -> Self {
        let mut registry = SerializerRegistry::with_defaults();
        for name in &options.disabled_serializers {
            if !registry.disable(name) {
                log::warn!("Cannot disable unknown serializer '{}'", name);
            }
        }

        Self {
            options,
            resolver,
            registry,
            stack: ParserStack::new(),
            style_modes: StyleModeStack::new(),
            document: BamlDocument::new(),
            stats: CompilationStats::default(),
            started: false,
            root_closed: false,
        }
    }

    /// Replace the serializer registry. Disabled serializers from the options
    /// are not re-applied.
    pub fn with_registry(mut self, registry: SerializerRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn stats(&self) -> &CompilationStats {
        &self.stats
    }

    /// Records written so far
    pub fn records(&self) -> &[BamlRecord] {
        &self.document.records
    }

    /// Current element nesting depth
    pub fn depth(&self) -> usize {
        self.stack.depth()
    }

    pub fn style_mode(&self) -> StyleMode {
        self.style_modes.mode()
    }

    pub fn style_depth(&self) -> usize {
        self.style_modes.depth()
    }

    /// Attributes captured on the innermost element and not yet expanded
    pub fn pending_attribute_count(&self) -> usize {
        self.stack
            .current()
            .and_then(|frame| frame.data())
            .map(|scope| scope.cache.len())
            .unwrap_or(0)
    }

    pub fn feed(&mut self, event: &MarkupEvent) -> Result<()> {
        match event {
            MarkupEvent::StartElement { namespace_uri, name, position } => {
                self.start_element(namespace_uri, name, *position)
            }
            MarkupEvent::Attribute { namespace_uri, name, value, position } => {
                self.attribute(namespace_uri, name, value, *position)
            }
            MarkupEvent::Text { value, position } => self.text(value, *position),
            MarkupEvent::EndElement { position } => self.end_element(*position),
        }
    }

    pub fn start_element(&mut self, namespace_uri: &str, name: &str, position: SourcePosition) -> Result<()> {
        let position = self.locate(position);

        if self.root_closed {
            return Err(CompilerError::markup(position, format!("Element '{}' after the root element", name)));
        }
        if !self.started {
            self.started = true;
            self.emit(BamlRecord::DocumentStart);
        }
        if self.stack.depth() >= self.options.max_element_depth {
            return Err(CompilerError::LimitExceeded {
                limit_type: "element depth".to_string(),
                limit: self.options.max_element_depth,
            });
        }

        self.close_start_tag()?;

        let local = name.rsplit(':').next().unwrap_or(name);
        match local.split_once('.') {
            Some((_, property)) => self.start_property_element(property, position)?,
            None => self.start_object_element(namespace_uri, name, position)?,
        }

        self.stats.max_depth = self.stats.max_depth.max(self.stack.depth());
        Ok(())
    }

    fn start_property_element(&mut self, property: &str, position: SourcePosition) -> Result<()> {
        match self.stack.current() {
            Some(frame) if frame.is_object() => {}
            _ => {
                return Err(CompilerError::markup(
                    position,
                    format!("Property element '{}' must be nested in an object element", property),
                ))
            }
        }

        let mut pushed = 0;
        if self.style_modes.depth() > 0 {
            let mode = StyleMode::for_property_element(self.style_modes.mode(), property);
            self.style_modes.push(mode);
            pushed += 1;
        }

        self.emit(BamlRecord::PropertyComplexStart {
            name: property.to_string(),
        });

        let mut flags = ContextFlags::PROPERTY;
        if property == "Resources" {
            flags |= ContextFlags::DICTIONARY;
        }

        let frame = self.stack.push_reset();
        frame.flags = flags;
        frame.name = Some(property.to_string());
        frame.set_data(ElementScope {
            start_tag_closed: true,
            style_modes_pushed: pushed,
            position,
            ..ElementScope::default()
        });
        Ok(())
    }

    fn start_object_element(&mut self, namespace_uri: &str, name: &str, position: SourcePosition) -> Result<()> {
        let handle = self
            .resolver
            .resolve_element(namespace_uri, name)
            .unwrap_or_else(|| TypeHandle::new("", name, UNKNOWN_TYPE_ID));

        let mut pushed = 0;
        let mut flags = ContextFlags::OBJECT;

        if let Some(parent) = self.stack.current() {
            flags |= ContextFlags::ADDED_TO_TREE;
            // Direct children of styles, templates, and triggers fill the
            // parent's content property
            let implicit_region = parent.flags.contains(ContextFlags::STYLE_REGION)
                || self.style_modes.mode() == StyleMode::TriggerBase;
            let content = parent.content_property.clone().filter(|_| parent.is_object());
            if let Some(content) = content {
                if implicit_region && self.style_modes.depth() > 0 {
                    let mode = StyleMode::for_property_element(self.style_modes.mode(), &content);
                    self.style_modes.push(mode);
                    pushed += 1;
                }
            }
        }

        let short_name = handle.short_name();
        if short_name == "Style" || short_name.ends_with("Template") {
            self.style_modes.push_current();
            pushed += 1;
            flags |= ContextFlags::STYLE_REGION;
        }
        if short_name == "ResourceDictionary" {
            flags |= ContextFlags::DICTIONARY;
        }

        let content_property = self.resolver.content_property(&handle).map(str::to_string);

        if self.options.debug_mode {
            log::debug!("Element {} at {}", handle, position);
        }

        self.emit(BamlRecord::ElementStart {
            type_id: handle.type_id,
            assembly_name: handle.assembly_name.clone(),
            type_name: handle.full_name.clone(),
        });
        self.stats.element_count += 1;

        let frame = self.stack.push_reset();
        frame.flags = flags;
        frame.content_property = content_property;
        frame.set_expected_type(handle.clone());
        frame.set_data(ElementScope {
            handle: Some(handle),
            style_modes_pushed: pushed,
            position,
            ..ElementScope::default()
        });
        Ok(())
    }

    pub fn attribute(&mut self, namespace_uri: &str, name: &str, value: &str, position: SourcePosition) -> Result<()> {
        let position = self.locate(position);

        if name == "xmlns" || name.starts_with("xmlns:") {
            log::trace!("Namespace declaration {}={}", name, value);
            return Ok(());
        }

        let frame = self
            .stack
            .current()
            .ok_or_else(|| CompilerError::markup(position, format!("Attribute '{}' outside any element", name)))?;
        if !frame.is_object() {
            return Err(CompilerError::markup(
                position,
                format!("Attribute '{}' is not allowed on a property element", name),
            ));
        }

        let scope = frame.data().ok_or(CompilerError::EmptyStack { operation: "attribute" })?;
        if scope.start_tag_closed {
            return Err(CompilerError::markup(
                position,
                format!("Attribute '{}' after element content", name),
            ));
        }
        let owner = scope.handle.clone().unwrap_or_default();

        self.stats.attribute_count += 1;

        let attribute_mode = StyleMode::for_attribute(name);
        if let Some(mode) = attribute_mode {
            self.style_modes.push(mode);
        }
        let result = self.write_attribute(namespace_uri, name, value, &owner, position);
        if attribute_mode.is_some() {
            self.style_modes.pop()?;
        }
        result
    }

    fn write_attribute(
        &mut self,
        namespace_uri: &str,
        name: &str,
        value: &str,
        owner: &TypeHandle,
        position: SourcePosition,
    ) -> Result<()> {
        let mode = self.style_modes.mode();

        // Only children of a dictionary carry a key
        if mode == StyleMode::Key && !self.stack.parent().map_or(false, |parent| parent.is_dictionary()) {
            return Err(CompilerError::markup(
                position,
                format!("'{}' on {} outside a dictionary", name, owner.short_name()),
            ));
        }

        if markup_extension::is_compact_syntax(value) {
            let extension = markup_extension::parse(value).map_err(|e| e.at(position))?;
            let target = self.resolver.resolve_extension(namespace_uri, &extension.type_name);

            if mode == StyleMode::Key {
                let record = AttributeRecord::for_extension(target, namespace_uri, extension, position);
                return self.capture(record);
            }

            if mode == StyleMode::TargetTypeProperty && extension.extension_type_id() == ExtensionTypeId::Type {
                let type_name = extension.first_text_arg().map(str::to_string);
                self.current_scope_mut()?.target_type = type_name;
            }

            let serializer_type = Some(self.resolver.property_value_type(Some(owner), name))
                .filter(|ty| *ty != ValueTypeId::Text);
            let property = ExtendedProperty::from_extension(name, serializer_type, &extension);
            let mut record = AttributeRecord::for_extension(target, namespace_uri, extension, position)
                .with_property(property);
            if let Some(declaring) = self.declaring_type(namespace_uri, name) {
                record = record.with_declaring_type(declaring);
            }
            return self.capture(record);
        }

        let text = markup_extension::unescape_literal(value);

        if mode == StyleMode::Key {
            self.stack.peek_mut()?.key = Some(text.to_string());
            self.emit(BamlRecord::DefKey { key: text.to_string() });
            return Ok(());
        }

        if name == "x:Name" || name == "Name" {
            self.stack.peek_mut()?.name = Some(text.to_string());
            self.emit(BamlRecord::DefName { name: text.to_string() });
            return Ok(());
        }

        if mode.expects_type_name() {
            if mode == StyleMode::TargetTypeProperty {
                self.current_scope_mut()?.target_type = Some(text.to_string());
            }
            self.emit(BamlRecord::PropertyTypeReference {
                name: name.to_string(),
                type_name: text.to_string(),
            });
            return Ok(());
        }

        if mode.is_setter_region() {
            match name {
                "Property" => {
                    self.current_scope_mut()?.setter_property = Some(text.to_string());
                }
                "Value" => {
                    // Typed by the sibling Property attribute, which may come later
                    let mut record = AttributeRecord::new(owner.clone(), namespace_uri, text, position)
                        .with_property(ExtendedProperty::literal(name, None));
                    record.is_simple = true;
                    return self.capture(record);
                }
                _ => {}
            }
        }

        let value_type = self.resolver.property_value_type(Some(owner), name);
        self.write_property(name, value_type, text)
    }

    pub fn text(&mut self, value: &str, position: SourcePosition) -> Result<()> {
        let position = self.locate(position);
        let normalized = value.split_whitespace().collect::<Vec<_>>().join(" ");

        if self.stack.is_empty() {
            if normalized.is_empty() {
                return Ok(());
            }
            return Err(CompilerError::markup(position, "Text outside the root element"));
        }

        self.close_start_tag()?;
        if !normalized.is_empty() {
            self.emit(BamlRecord::Text { value: normalized });
        }
        Ok(())
    }

    pub fn end_element(&mut self, position: SourcePosition) -> Result<()> {
        let position = self.locate(position);
        self.close_start_tag()?;

        let mut frame = self
            .stack
            .pop()
            .map_err(|_| CompilerError::markup(position, "End tag without a matching start tag"))?;
        let scope = frame.take_data().unwrap_or_default();

        if frame.is_property() {
            self.emit(BamlRecord::PropertyComplexEnd);
        } else {
            self.emit(BamlRecord::ElementEnd);
        }

        for _ in 0..scope.style_modes_pushed {
            self.style_modes.pop()?;
        }

        if self.stack.is_empty() {
            self.root_closed = true;
            log::trace!("Root element closed at {}", position);
        }
        Ok(())
    }

    /// Close the document and hand back the records
    pub fn finish(mut self) -> Result<BamlDocument> {
        if let Some(frame) = self.stack.current() {
            let position = frame.data().map(|scope| scope.position).unwrap_or_default();
            let name = frame
                .expected_type()
                .map(|ty| ty.short_name().to_string())
                .or_else(|| frame.name.clone())
                .unwrap_or_default();
            return Err(CompilerError::markup(position, format!("Unclosed element '{}'", name)));
        }
        if !self.started {
            return Err(CompilerError::invalid_format("Document has no root element"));
        }

        self.emit(BamlRecord::DocumentEnd);

        if self.options.debug_mode {
            log::debug!(
                "Compiled {} elements into {} records ({} deferred attributes, {} custom payloads, {} text fallbacks)",
                self.stats.element_count,
                self.stats.record_count,
                self.stats.deferred_attribute_count,
                self.stats.custom_property_count,
                self.stats.text_fallback_count
            );
        }
        Ok(self.document)
    }

    fn locate(&self, position: SourcePosition) -> SourcePosition {
        SourcePosition {
            depth: self.stack.depth(),
            ..position
        }
    }

    fn emit(&mut self, record: BamlRecord) {
        log::trace!("{:?}", record);
        self.stats.record_count += 1;
        self.document.push(record);
    }

    fn current_scope_mut(&mut self) -> Result<&mut ElementScope> {
        self.stack
            .peek_mut()?
            .data_mut()
            .ok_or(CompilerError::EmptyStack { operation: "scope" })
    }

    fn capture(&mut self, record: AttributeRecord) -> Result<()> {
        self.current_scope_mut()?.cache.capture(record);
        self.stats.deferred_attribute_count += 1;
        Ok(())
    }

    fn declaring_type(&self, namespace_uri: &str, name: &str) -> Option<TypeHandle> {
        let (owner, _) = name.rsplit_once('.')?;
        self.resolver.resolve_element(namespace_uri, owner)
    }

    /// Write a literal property, through a custom serializer when one accepts it
    fn write_property(&mut self, name: &str, value_type: ValueTypeId, text: &str) -> Result<()> {
        if self.options.enable_custom_binary && value_type != ValueTypeId::Text {
            if let Some(payload) = self.registry.try_encode(value_type, text)? {
                self.stats.custom_property_count += 1;
                self.emit(BamlRecord::PropertyCustom {
                    name: name.to_string(),
                    value_type,
                    payload,
                });
                return Ok(());
            }
            self.stats.text_fallback_count += 1;
        }

        self.emit(BamlRecord::Property {
            name: name.to_string(),
            value: text.to_string(),
        });
        Ok(())
    }

    /// Expand every captured attribute of the innermost element, once
    fn close_start_tag(&mut self) -> Result<()> {
        let (records, setter_property) = match self.stack.current_mut().and_then(|frame| frame.data_mut()) {
            Some(scope) if !scope.start_tag_closed => {
                scope.start_tag_closed = true;
                (scope.cache.flush(), scope.setter_property.clone())
            }
            _ => return Ok(()),
        };

        for record in records {
            self.expand_record(record, setter_property.as_deref())?;
        }
        Ok(())
    }

    fn expand_record(&mut self, record: AttributeRecord, setter_property: Option<&str>) -> Result<()> {
        let name = record.property_name().unwrap_or(KEY_DIRECTIVE).to_string();
        let position = record.position;

        match &record.extension {
            None => {
                let value_type = match setter_property {
                    Some(property) => self.setter_value_type(property),
                    None => {
                        log::debug!("Setter at {} has no Property attribute, storing Value as text", position);
                        record
                            .extended
                            .as_ref()
                            .and_then(|property| property.serializer_type)
                            .unwrap_or(ValueTypeId::Text)
                    }
                };
                self.write_property(&name, value_type, &record.args)
            }
            Some(extension) => {
                if record.is_simple && !record.is_unknown_extension() {
                    if let Some(fast) = Self::fast_path_record(&name, extension) {
                        self.emit(fast);
                        return Ok(());
                    }
                }
                self.write_complex_extension(&name, extension, &record.target_type, &record.namespace_uri)
                    .map_err(|e| e.at(position))
            }
        }
    }

    /// Value type of the property a `Setter` targets. Unqualified names are
    /// looked up on the enclosing style's `TargetType`.
    fn setter_value_type(&self, property: &str) -> ValueTypeId {
        let owner = match property.rsplit_once('.') {
            Some((owner, _)) => self.resolver.resolve_element("", owner),
            None => self
                .stack
                .iter()
                .rev()
                .filter_map(|frame| frame.data())
                .find_map(|scope| scope.target_type.as_deref())
                .and_then(|name| self.resolver.resolve_element("", name)),
        };
        self.resolver.property_value_type(owner.as_ref(), property)
    }

    /// Single-record form for built-in extensions with one simple argument
    fn fast_path_record(name: &str, extension: &MarkupExtension) -> Option<BamlRecord> {
        let id = extension.extension_type_id();
        if !id.has_fast_path() {
            return None;
        }

        if extension.is_simple() {
            return Some(BamlRecord::PropertyWithExtension {
                name: name.to_string(),
                extension: id,
                value_is_type_extension: false,
                value_is_static_extension: false,
                value: extension.first_text_arg().unwrap_or_default().to_string(),
            });
        }

        let inner = extension.nested_simple_extension()?;
        let inner_id = inner.extension_type_id();
        if inner_id != ExtensionTypeId::Type && inner_id != ExtensionTypeId::Static {
            return None;
        }
        Some(BamlRecord::PropertyWithExtension {
            name: name.to_string(),
            extension: id,
            value_is_type_extension: inner_id == ExtensionTypeId::Type,
            value_is_static_extension: inner_id == ExtensionTypeId::Static,
            value: inner.first_text_arg().unwrap_or_default().to_string(),
        })
    }

    fn write_extension_value(
        &mut self,
        name: &str,
        extension: &MarkupExtension,
        handle: &TypeHandle,
        namespace_uri: &str,
    ) -> Result<()> {
        if !handle.is_unknown_extension() {
            if let Some(fast) = Self::fast_path_record(name, extension) {
                self.emit(fast);
                return Ok(());
            }
        }
        self.write_complex_extension(name, extension, handle, namespace_uri)
    }

    fn write_complex_extension(
        &mut self,
        name: &str,
        extension: &MarkupExtension,
        handle: &TypeHandle,
        namespace_uri: &str,
    ) -> Result<()> {
        self.emit(BamlRecord::PropertyComplexStart { name: name.to_string() });
        self.write_extension_object(extension, handle, namespace_uri)?;
        self.emit(BamlRecord::PropertyComplexEnd);
        Ok(())
    }

    /// Expand an extension as an object element: positional arguments become
    /// constructor parameters and named arguments become properties.
    fn write_extension_object(
        &mut self,
        extension: &MarkupExtension,
        handle: &TypeHandle,
        namespace_uri: &str,
    ) -> Result<()> {
        let type_name = if handle.is_unknown_extension() {
            extension.type_name.clone()
        } else {
            handle.full_name.clone()
        };
        self.emit(BamlRecord::ElementStart {
            type_id: handle.type_id,
            assembly_name: handle.assembly_name.clone(),
            type_name,
        });

        for arg in &extension.args {
            match arg {
                ExtensionArg::Positional(ExtensionValue::Text(text)) => {
                    self.emit(BamlRecord::ConstructorParameter { value: text.clone() });
                }
                ExtensionArg::Positional(ExtensionValue::Extension(inner)) => {
                    let inner_handle = self.resolver.resolve_extension(namespace_uri, &inner.type_name);
                    self.write_extension_object(inner, &inner_handle, namespace_uri)?;
                }
                ExtensionArg::Named(property, ExtensionValue::Text(text)) => {
                    let value_type = self.resolver.property_value_type(Some(handle), property);
                    self.write_property(property, value_type, text)?;
                }
                ExtensionArg::Named(property, ExtensionValue::Extension(inner)) => {
                    let inner_handle = self.resolver.resolve_extension(namespace_uri, &inner.type_name);
                    self.write_extension_value(property, inner, &inner_handle, namespace_uri)?;
                }
            }
        }

        self.emit(BamlRecord::ElementEnd);
        Ok(())
    }
}
