//! Style and template parsing modes
//!
//! Attributes inside `Style`, trigger, and template markup are interpreted
//! differently depending on the region being parsed. The mode stack tracks that
//! region. `Base` sits at the bottom permanently.

use crate::error::{CompilerError, Result};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StyleMode {
    Base,
    TargetTypeProperty,
    BasedOnProperty,
    DataTypeProperty,
    ComplexProperty,
    Resources,
    Setters,
    Key,
    TriggerBase,
    TriggerActions,
    TriggerSetters,
    TriggerEnterExitActions,
    VisualTree,
}

impl StyleMode {
    /// Mode entered by a property element named `property` while in `current`
    pub fn for_property_element(current: StyleMode, property: &str) -> StyleMode {
        let local = property.rsplit('.').next().unwrap_or(property);
        match (current, local) {
            (_, "Resources") => StyleMode::Resources,
            (StyleMode::TriggerBase, "Setters") => StyleMode::TriggerSetters,
            (_, "Setters") => StyleMode::Setters,
            (_, "Triggers") => StyleMode::TriggerBase,
            (StyleMode::TriggerBase, "Actions") => StyleMode::TriggerActions,
            (StyleMode::TriggerBase, "EnterActions") | (StyleMode::TriggerBase, "ExitActions") => {
                StyleMode::TriggerEnterExitActions
            }
            (_, "VisualTree") => StyleMode::VisualTree,
            _ => StyleMode::ComplexProperty,
        }
    }

    /// Mode entered while reading the value of attribute `name`
    pub fn for_attribute(name: &str) -> Option<StyleMode> {
        match name {
            "TargetType" => Some(StyleMode::TargetTypeProperty),
            "BasedOn" => Some(StyleMode::BasedOnProperty),
            "DataType" => Some(StyleMode::DataTypeProperty),
            "x:Key" => Some(StyleMode::Key),
            _ => None,
        }
    }

    /// Modes in which a `Setter` is being declared
    pub fn is_setter_region(self) -> bool {
        matches!(self, StyleMode::Setters | StyleMode::TriggerSetters)
    }

    /// Modes whose attribute value names a type
    pub fn expects_type_name(self) -> bool {
        matches!(self, StyleMode::TargetTypeProperty | StyleMode::DataTypeProperty)
    }
}

impl fmt::Display for StyleMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone)]
pub struct StyleModeStack {
    modes: Vec<StyleMode>,
}

impl Default for StyleModeStack {
    fn default() -> Self {
        Self::new()
    }
}

impl StyleModeStack {
    pub fn new() -> Self {
        Self {
            modes: vec![StyleMode::Base],
        }
    }

    /// Number of modes above the `Base` floor
    pub fn depth(&self) -> usize {
        self.modes.len() - 1
    }

    pub fn mode(&self) -> StyleMode {
        // The floor entry is never removed
        *self.modes.last().unwrap_or(&StyleMode::Base)
    }

    pub fn push(&mut self, mode: StyleMode) {
        log::trace!("Style mode {} -> {} (depth {})", self.mode(), mode, self.depth() + 1);
        self.modes.push(mode);
    }

    /// Enter a sub-scope that inherits the current mode
    pub fn push_current(&mut self) {
        self.push(self.mode());
    }

    pub fn pop(&mut self) -> Result<StyleMode> {
        if self.depth() == 0 {
            return Err(CompilerError::StyleModeFloor {
                operation: "pop",
                depth: 0,
            });
        }
        let mode = self.modes.pop().unwrap_or(StyleMode::Base);
        log::trace!("Style mode {} popped, now {} (depth {})", mode, self.mode(), self.depth());
        Ok(mode)
    }
}
