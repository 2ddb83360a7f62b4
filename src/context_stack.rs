//! Parsing context stack
//!
//! One frame per open element or property scope. Lookback is limited to the
//! top four frames, which is all the writer and reader ever need to decide how
//! an element relates to its container.
//!
//! Frames live in an arena of slots indexed by depth. A popped slot is not
//! released; the next push at that depth resets it in place.

use crate::error::{CompilerError, Result};
use crate::types::{TypeHandle, UNKNOWN_TYPE_ID};
use bitflags::bitflags;

bitflags! {
    /// What a context frame represents
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ContextFlags: u16 {
        /// A constructible object rather than a plain value
        const OBJECT = 1 << 0;
        /// The object has been attached to its parent
        const ADDED_TO_TREE = 1 << 1;
        /// A property element scope such as `Style.Setters`
        const PROPERTY = 1 << 2;
        /// Children are addressed by `x:Key`
        const DICTIONARY = 1 << 3;
        /// A `Style` or template element
        const STYLE_REGION = 1 << 4;
    }
}

/// Parser state for one open element or property scope
#[derive(Debug, Clone)]
pub struct ContextFrame<T> {
    pub flags: ContextFlags,
    data: Option<T>,
    /// Key under which the object is added to a dictionary parent
    pub key: Option<String>,
    /// Declared element name (`x:Name`) or property name for property scopes
    pub name: Option<String>,
    /// Property receiving child content, overriding the type's default
    pub content_property: Option<String>,
    expected_type: Option<TypeHandle>,
    expected_type_id: u16,
    create_using_type_converter: bool,
}

impl<T> Default for ContextFrame<T> {
    fn default() -> Self {
        Self {
            flags: ContextFlags::empty(),
            data: None,
            key: None,
            name: None,
            content_property: None,
            expected_type: None,
            expected_type_id: UNKNOWN_TYPE_ID,
            create_using_type_converter: false,
        }
    }
}

impl<T> ContextFrame<T> {
    pub fn new(flags: ContextFlags) -> Self {
        Self {
            flags,
            ..Self::default()
        }
    }

    /// Frame for an object that has not been instantiated yet
    pub fn expecting(flags: ContextFlags, expected_type: TypeHandle) -> Self {
        let mut frame = Self::new(flags);
        frame.set_expected_type(expected_type);
        frame
    }

    pub fn with_data(flags: ContextFlags, data: T) -> Self {
        let mut frame = Self::new(flags);
        frame.set_data(data);
        frame
    }

    /// Reset every field. Reused slots go through here so that no field can be
    /// left over from the previous occupant.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn data(&self) -> Option<&T> {
        self.data.as_ref()
    }

    pub fn data_mut(&mut self) -> Option<&mut T> {
        self.data.as_mut()
    }

    /// Install the instantiated object; the frame no longer waits for a converter
    pub fn set_data(&mut self, data: T) {
        self.data = Some(data);
        self.create_using_type_converter = false;
    }

    /// Hand the object over to the caller, typically to promote it to the parent
    pub fn take_data(&mut self) -> Option<T> {
        self.data.take()
    }

    pub fn expected_type(&self) -> Option<&TypeHandle> {
        self.expected_type.as_ref()
    }

    pub fn expected_type_id(&self) -> u16 {
        self.expected_type_id
    }

    pub fn set_expected_type(&mut self, expected_type: TypeHandle) {
        self.expected_type_id = expected_type.type_id;
        self.expected_type = Some(expected_type);
    }

    pub fn create_using_type_converter(&self) -> bool {
        self.create_using_type_converter
    }

    /// Mark the object as built from text through a converter. Only valid
    /// before instantiation, so the data slot is cleared.
    pub fn require_type_converter(&mut self, expected_type: TypeHandle) {
        self.data = None;
        self.set_expected_type(expected_type);
        self.create_using_type_converter = true;
    }

    pub fn is_object(&self) -> bool {
        self.flags.contains(ContextFlags::OBJECT)
    }

    pub fn is_property(&self) -> bool {
        self.flags.contains(ContextFlags::PROPERTY)
    }

    pub fn is_dictionary(&self) -> bool {
        self.flags.contains(ContextFlags::DICTIONARY)
    }
}

/// Depth-indexed stack of context frames
#[derive(Debug)]
pub struct ParserStack<T> {
    slots: Vec<ContextFrame<T>>,
    depth: usize,
}

impl<T> Default for ParserStack<T> {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            depth: 0,
        }
    }
}

impl<T: Clone> Clone for ParserStack<T> {
    /// Copies live frames only; pooled slots above the top are not carried over
    fn clone(&self) -> Self {
        Self {
            slots: self.slots[..self.depth].to_vec(),
            depth: self.depth,
        }
    }
}

impl<T> ParserStack<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn is_empty(&self) -> bool {
        self.depth == 0
    }

    /// Number of slots allocated so far, live or pooled
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn push(&mut self, frame: ContextFrame<T>) {
        if self.depth < self.slots.len() {
            self.slots[self.depth] = frame;
        } else {
            self.slots.push(frame);
        }
        self.depth += 1;
    }

    /// Push a cleared frame, reusing the pooled slot at this depth when present
    pub fn push_reset(&mut self) -> &mut ContextFrame<T> {
        if self.depth < self.slots.len() {
            self.slots[self.depth].reset();
        } else {
            self.slots.push(ContextFrame::default());
        }
        self.depth += 1;
        &mut self.slots[self.depth - 1]
    }

    pub fn pop(&mut self) -> Result<ContextFrame<T>> {
        if self.depth == 0 {
            return Err(CompilerError::EmptyStack { operation: "pop" });
        }
        self.depth -= 1;
        Ok(std::mem::take(&mut self.slots[self.depth]))
    }

    /// Top frame, treating an empty stack as a contract violation
    pub fn peek(&self) -> Result<&ContextFrame<T>> {
        self.current().ok_or(CompilerError::EmptyStack { operation: "peek" })
    }

    pub fn peek_mut(&mut self) -> Result<&mut ContextFrame<T>> {
        self.current_mut().ok_or(CompilerError::EmptyStack { operation: "peek" })
    }

    /// Frame `distance` levels below the top, `None` when the stack is not that deep
    pub fn from_top(&self, distance: usize) -> Option<&ContextFrame<T>> {
        if distance < self.depth {
            self.slots.get(self.depth - 1 - distance)
        } else {
            None
        }
    }

    pub fn from_top_mut(&mut self, distance: usize) -> Option<&mut ContextFrame<T>> {
        if distance < self.depth {
            let index = self.depth - 1 - distance;
            self.slots.get_mut(index)
        } else {
            None
        }
    }

    pub fn current(&self) -> Option<&ContextFrame<T>> {
        self.from_top(0)
    }

    pub fn current_mut(&mut self) -> Option<&mut ContextFrame<T>> {
        self.from_top_mut(0)
    }

    pub fn parent(&self) -> Option<&ContextFrame<T>> {
        self.from_top(1)
    }

    pub fn parent_mut(&mut self) -> Option<&mut ContextFrame<T>> {
        self.from_top_mut(1)
    }

    pub fn grandparent(&self) -> Option<&ContextFrame<T>> {
        self.from_top(2)
    }

    pub fn great_grandparent(&self) -> Option<&ContextFrame<T>> {
        self.from_top(3)
    }

    /// Live frames from the bottom of the stack to the top
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &ContextFrame<T>> {
        self.slots[..self.depth].iter()
    }
}
