//! BAML Serialization Core
//!
//! Compiles a stream of XAML markup events into BAML, a compact binary record
//! format, and reads BAML back into records and a node tree.
//!
//! # Features
//!
//! - Deferred expansion of compact-syntax attribute values (`{StaticResource Key}`)
//! - Style, trigger, and template aware attribute interpretation
//! - Custom binary payloads for brushes, path geometry, point and integer collections
//! - Variable-length integer framing for every record
//! - Hardened reader that checks each record's declared length
//!
//! # Basic Usage
//!
//! ```rust
//! use bamlc::{MarkupCompiler, SourcePosition, Result};
//!
//! fn main() -> Result<()> {
//!     let at = SourcePosition::new(1, 1, 0);
//!     let mut compiler = MarkupCompiler::new();
//!     compiler.start_element("", "Button", at)?;
//!     compiler.attribute("", "Background", "Red", at)?;
//!     compiler.attribute("", "Style", "{StaticResource Primary}", at)?;
//!     compiler.end_element(at)?;
//!
//!     let bytes = compiler.finish()?.to_bytes()?;
//!     let root = bamlc::read_document(&bytes)?;
//!     assert_eq!(root.short_name(), "Button");
//!     Ok(())
//! }
//! ```
//!
//! # Pipeline
//!
//! 1. **Compiler**: markup events drive a parser stack and a style mode stack;
//!    attributes are written directly or captured into the element's attribute cache
//! 2. **Serializers**: typed attribute values are encoded by the registered serializer
//! 3. **Records**: each record is framed as type byte, varint length, payload
//! 4. **Reader**: records are read back and materialized as a node tree

pub mod attribute_cache;
pub mod compiler;
pub mod config;
pub mod context_stack;
pub mod error;
pub mod markup_extension;
pub mod reader;
pub mod record;
pub mod resolver;
pub mod serializer;
pub mod style_mode;
pub mod types;
pub mod varint;

pub use attribute_cache::{AttributeCache, AttributeRecord, ExtendedProperty};
pub use compiler::{CompilationStats, MarkupCompiler, MarkupEvent};
pub use context_stack::{ContextFlags, ContextFrame, ParserStack};
pub use error::{CompilerError, Result, SourcePosition};
pub use markup_extension::MarkupExtension;
pub use reader::{BamlNode, BamlReader, PropertyValue};
pub use record::{BamlDocument, BamlRecord, RecordType};
pub use resolver::{KnownTypeResolver, TypeResolver};
pub use serializer::{CustomBinarySerializer, SerializedValue, SerializerRegistry};
pub use style_mode::{StyleMode, StyleModeStack};
pub use types::*;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

/// Compilation and reading options
#[derive(Debug, Clone)]
pub struct CompilerOptions {
    /// Log progress and statistics at debug level
    pub debug_mode: bool,

    /// Encode typed values through custom serializers; text records otherwise
    pub enable_custom_binary: bool,

    /// Serializers removed from the registry, by name
    pub disabled_serializers: Vec<String>,

    /// Maximum element nesting depth
    pub max_element_depth: usize,

    /// Require fully consumed custom payloads and document brackets when reading
    pub strict_reader: bool,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        Self {
            debug_mode: false,
            enable_custom_binary: true,
            disabled_serializers: Vec::new(),
            max_element_depth: types::MAX_ELEMENT_DEPTH,
            strict_reader: false,
        }
    }
}

/// Compile markup events to BAML bytes with default options
pub fn compile_events(events: &[MarkupEvent]) -> Result<Vec<u8>> {
    let (bytes, _stats) = compile_events_with_options(events, CompilerOptions::default())?;
    Ok(bytes)
}

/// Compile markup events to BAML bytes with custom options
pub fn compile_events_with_options(
    events: &[MarkupEvent],
    options: CompilerOptions,
) -> Result<(Vec<u8>, CompilationStats)> {
    let debug_mode = options.debug_mode;
    if debug_mode {
        log::info!("{} v{}", NAME, VERSION);
        log::info!("Target BAML version: {}.{}", BAML_VERSION_MAJOR, BAML_VERSION_MINOR);
        log::debug!("Compiler options: {:?}", options);
    }

    let mut compiler = MarkupCompiler::with_options(options);
    for event in events {
        compiler.feed(event)?;
    }

    let stats = compiler.stats().clone();
    let bytes = compiler.finish()?.to_bytes()?;

    if debug_mode {
        log::info!("Compilation successful!");
        log::info!("Output size: {} bytes", bytes.len());
        log::debug!("Full stats: {:?}", stats);
    }
    Ok((bytes, stats))
}

/// Read a BAML stream into the node tree of its root element
pub fn read_document(bytes: &[u8]) -> Result<BamlNode> {
    read_document_with_options(bytes, &CompilerOptions::default())
}

pub fn read_document_with_options(bytes: &[u8], options: &CompilerOptions) -> Result<BamlNode> {
    BamlReader::with_options(bytes, options)?.read_tree()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serializer::{Point, SerializedValue};

    fn start(name: &str, line: usize) -> MarkupEvent {
        MarkupEvent::StartElement {
            namespace_uri: PRESENTATION_NAMESPACE.to_string(),
            name: name.to_string(),
            position: SourcePosition::new(line, 1, 0),
        }
    }

    fn attr(name: &str, value: &str, line: usize) -> MarkupEvent {
        MarkupEvent::Attribute {
            namespace_uri: PRESENTATION_NAMESPACE.to_string(),
            name: name.to_string(),
            value: value.to_string(),
            position: SourcePosition::new(line, 5, 0),
        }
    }

    fn end(line: usize) -> MarkupEvent {
        MarkupEvent::EndElement {
            position: SourcePosition::new(line, 1, 0),
        }
    }

    #[test]
    fn test_compile_and_read_back() {
        let events = vec![
            start("Window", 1),
            attr("xmlns", PRESENTATION_NAMESPACE, 1),
            attr("Title", "Main", 1),
            start("Canvas", 2),
            start("Polyline", 3),
            attr("Points", "0,0 10,5 20,0", 3),
            attr("Stroke", "{DynamicResource Accent}", 3),
            end(3),
            end(4),
            end(5),
        ];

        let (bytes, stats) = compile_events_with_options(&events, CompilerOptions::default()).unwrap();
        assert_eq!(&bytes[..4], BAML_MAGIC);
        assert_eq!(stats.element_count, 3);
        assert_eq!(stats.deferred_attribute_count, 1);
        assert_eq!(stats.max_depth, 3);

        let options = CompilerOptions {
            strict_reader: true,
            ..CompilerOptions::default()
        };
        let window = read_document_with_options(&bytes, &options).unwrap();
        assert_eq!(window.short_name(), "Window");
        assert_eq!(window.property("Title"), Some(&PropertyValue::Text("Main".to_string())));

        let polyline = &window.children[0].children[0];
        assert_eq!(
            polyline.property("Points"),
            Some(&PropertyValue::Custom(SerializedValue::Points(vec![
                Point::new(0.0, 0.0),
                Point::new(10.0, 5.0),
                Point::new(20.0, 0.0),
            ])))
        );
        assert!(matches!(
            polyline.property("Stroke"),
            Some(PropertyValue::Extension { extension: ExtensionTypeId::DynamicResource, value, .. }) if value == "Accent"
        ));
    }

    #[test]
    fn test_errors_propagate_from_events() {
        let events = vec![start("Grid", 1), attr("Tag", "{Binding", 1), end(1)];
        assert!(matches!(compile_events(&events), Err(CompilerError::Markup { .. })));
    }

    #[test]
    fn test_default_options() {
        let options = CompilerOptions::default();
        assert!(options.enable_custom_binary);
        assert_eq!(options.max_element_depth, MAX_ELEMENT_DEPTH);
        assert!(!NAME.is_empty());
    }
}
