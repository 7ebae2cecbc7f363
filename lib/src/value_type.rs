//! The values an ink story computes with, tagged with their type.
use crate::{ink_list::InkList, path::Path, story_error::StoryError};

/// An ink value, tagged with its type.
///
/// The variant order is the coercion order used by binary operators: when
/// two operands differ, the one lower in the list is cast to the type of
/// the other. `DivertTarget` and `VariablePointer` never take part in that
/// promotion.
#[derive(Clone, Debug, PartialEq)]
pub enum ValueType {
    Bool(bool),
    Int(i32),
    Float(f32),
    /// An ink list value.
    List(InkList),
    /// Ink string, constructed with [`new`](ValueType::new) from a `&str`.
    String(StringValue),
    /// Reference to a location in the story, as in `-> knot`.
    DivertTarget(Path),
    /// Reference to a variable, as passed with `ref` parameters.
    VariablePointer(VariablePointerValue),
}

impl From<bool> for ValueType {
    fn from(value: bool) -> ValueType {
        ValueType::Bool(value)
    }
}

impl From<i32> for ValueType {
    fn from(value: i32) -> ValueType {
        ValueType::Int(value)
    }
}

impl From<f32> for ValueType {
    fn from(value: f32) -> ValueType {
        ValueType::Float(value)
    }
}

impl From<&str> for ValueType {
    fn from(value: &str) -> ValueType {
        ValueType::String(StringValue::new(value))
    }
}

impl From<String> for ValueType {
    fn from(value: String) -> ValueType {
        ValueType::String(StringValue::new(&value))
    }
}

impl From<InkList> for ValueType {
    fn from(value: InkList) -> ValueType {
        ValueType::List(value)
    }
}

impl From<Path> for ValueType {
    fn from(value: Path) -> ValueType {
        ValueType::DivertTarget(value)
    }
}

impl From<VariablePointerValue> for ValueType {
    fn from(value: VariablePointerValue) -> Self {
        ValueType::VariablePointer(value)
    }
}

impl TryFrom<&ValueType> for bool {
    type Error = ();
    fn try_from(value: &ValueType) -> Result<Self, Self::Error> {
        match value {
            ValueType::Bool(v) => Ok(*v),
            _ => Err(()),
        }
    }
}

impl TryFrom<&ValueType> for i32 {
    type Error = ();
    fn try_from(value: &ValueType) -> Result<Self, Self::Error> {
        match value {
            ValueType::Int(v) => Ok(*v),
            _ => Err(()),
        }
    }
}

impl TryFrom<&ValueType> for f32 {
    type Error = ();
    fn try_from(value: &ValueType) -> Result<Self, Self::Error> {
        match value {
            ValueType::Float(v) => Ok(*v),
            _ => Err(()),
        }
    }
}

impl<'val> TryFrom<&'val ValueType> for &'val str {
    type Error = ();
    fn try_from(value: &'val ValueType) -> Result<Self, Self::Error> {
        match value {
            ValueType::String(v) => Ok(&v.string),
            _ => Err(()),
        }
    }
}

impl<'val> TryFrom<&'val ValueType> for &'val InkList {
    type Error = ();
    fn try_from(value: &'val ValueType) -> Result<Self, Self::Error> {
        match value {
            ValueType::List(l) => Ok(l),
            _ => Err(()),
        }
    }
}

impl<'val> TryFrom<&'val ValueType> for &'val Path {
    type Error = ();
    fn try_from(value: &'val ValueType) -> Result<Self, Self::Error> {
        match value {
            ValueType::DivertTarget(p) => Ok(p),
            _ => Err(()),
        }
    }
}

impl ValueType {
    pub fn new<T: Into<ValueType>>(v: T) -> Self {
        v.into()
    }

    pub fn new_variable_pointer(variable_name: &str, context_index: i32) -> Self {
        ValueType::VariablePointer(VariablePointerValue {
            variable_name: variable_name.to_string(),
            context_index,
        })
    }

    /// Typed access to the payload, e.g. `value.get::<i32>()`.
    pub fn get<'val, T>(&'val self) -> Option<T>
    where
        &'val Self: TryInto<T>,
    {
        self.try_into().ok()
    }

    pub fn coerce_to_int(&self) -> Result<i32, StoryError> {
        match self {
            ValueType::Bool(v) => Ok(i32::from(*v)),
            ValueType::Int(v) => Ok(*v),
            ValueType::Float(v) => Ok(*v as i32),
            _ => Err(StoryError::BadArgument("Failed to cast to int".to_owned())),
        }
    }

    pub fn coerce_to_float(&self) -> Result<f32, StoryError> {
        match self {
            ValueType::Bool(v) => Ok(if *v { 1.0 } else { 0.0 }),
            ValueType::Int(v) => Ok(*v as f32),
            ValueType::Float(v) => Ok(*v),
            _ => Err(StoryError::BadArgument(
                "Failed to cast to float".to_owned(),
            )),
        }
    }

    pub fn coerce_to_bool(&self) -> Result<bool, StoryError> {
        match self {
            ValueType::Bool(v) => Ok(*v),
            ValueType::Int(v) => Ok(*v == 1),
            _ => Err(StoryError::BadArgument(
                "Failed to cast to boolean".to_owned(),
            )),
        }
    }

    pub fn coerce_to_string(&self) -> Result<String, StoryError> {
        match self {
            ValueType::Bool(v) => Ok(v.to_string()),
            ValueType::Int(v) => Ok(v.to_string()),
            ValueType::Float(v) => Ok(v.to_string()),
            ValueType::String(v) => Ok(v.string.clone()),
            _ => Err(StoryError::BadArgument(
                "Failed to cast to string".to_owned(),
            )),
        }
    }
}

/// Ink runtime representation of a string.
#[derive(Clone, Debug, PartialEq)]
pub struct StringValue {
    pub string: String,
    pub(crate) is_inline_whitespace: bool,
    pub(crate) is_newline: bool,
}

impl StringValue {
    pub fn new(s: &str) -> Self {
        StringValue {
            string: s.to_string(),
            is_inline_whitespace: s.chars().all(|c| c == ' ' || c == '\t'),
            is_newline: s == "\n",
        }
    }

    pub fn is_non_whitespace(&self) -> bool {
        !self.is_newline && !self.is_inline_whitespace
    }
}

/// Ink runtime representation of a reference to a variable.
#[derive(Clone, Debug, PartialEq)]
pub struct VariablePointerValue {
    pub(crate) variable_name: String,

    // -1 = not yet known
    // 0  = global scope
    // 1+ = callstack element index + 1
    pub(crate) context_index: i32,
}

impl VariablePointerValue {
    pub fn get_variable_name(&self) -> &str {
        &self.variable_name
    }

    pub fn get_context_index(&self) -> i32 {
        self.context_index
    }
}
