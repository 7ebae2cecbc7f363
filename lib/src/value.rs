use std::fmt;

use crate::{ink_list::InkList, story_error::StoryError, value_type::ValueType};

/// Target of a value cast, in promotion order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum CastType {
    Bool,
    Int,
    Float,
    List,
    String,
    DivertTarget,
    VariablePointer,
}

impl ValueType {
    pub(crate) fn cast_type(&self) -> CastType {
        match self {
            ValueType::Bool(_) => CastType::Bool,
            ValueType::Int(_) => CastType::Int,
            ValueType::Float(_) => CastType::Float,
            ValueType::List(_) => CastType::List,
            ValueType::String(_) => CastType::String,
            ValueType::DivertTarget(_) => CastType::DivertTarget,
            ValueType::VariablePointer(_) => CastType::VariablePointer,
        }
    }

    pub fn is_truthy(&self) -> Result<bool, StoryError> {
        match self {
            ValueType::Bool(v) => Ok(*v),
            ValueType::Int(v) => Ok(*v != 0),
            ValueType::Float(v) => Ok(*v != 0.0),
            ValueType::String(v) => Ok(!v.string.is_empty()),
            ValueType::List(l) => Ok(!l.items.is_empty()),
            ValueType::DivertTarget(_) => Err(StoryError::InvalidStoryState(
                "Shouldn't be checking the truthiness of a divert target".to_owned(),
            )),
            ValueType::VariablePointer(_) => Err(StoryError::InvalidStoryState(
                "Shouldn't be checking the truthiness of a variable pointer".to_owned(),
            )),
        }
    }

    /// An emptied list assigned over an existing list keeps the old list's type.
    pub(crate) fn retain_list_origins_for_assignment(old_value: &ValueType, new_value: &mut ValueType) {
        if let (ValueType::List(old_list), ValueType::List(new_list)) = (old_value, new_value) {
            if new_list.items.is_empty() {
                new_list.set_initial_origin_names(old_list.get_origin_names());
            }
        }
    }

    /// Casts to `dest`. Returns `None` when the value already has that type.
    pub(crate) fn cast(&self, dest: CastType) -> Result<Option<ValueType>, StoryError> {
        if self.cast_type() == dest {
            return Ok(None);
        }

        let bad_cast = || {
            StoryError::InvalidStoryState(format!(
                "Can't cast {} from {:?} to {:?}",
                self,
                self.cast_type(),
                dest
            ))
        };

        let casted = match (self, dest) {
            (ValueType::Bool(v), CastType::Int) => ValueType::Int(i32::from(*v)),
            (ValueType::Bool(v), CastType::Float) => ValueType::Float(if *v { 1.0 } else { 0.0 }),
            (ValueType::Bool(v), CastType::String) => ValueType::new(if *v { "true" } else { "false" }),

            (ValueType::Int(v), CastType::Bool) => ValueType::Bool(*v != 0),
            (ValueType::Int(v), CastType::Float) => ValueType::Float(*v as f32),
            (ValueType::Int(v), CastType::String) => ValueType::new(v.to_string()),

            (ValueType::Float(v), CastType::Bool) => ValueType::Bool(*v != 0.0),
            (ValueType::Float(v), CastType::Int) => ValueType::Int(*v as i32),
            (ValueType::Float(v), CastType::String) => ValueType::new(v.to_string()),

            (ValueType::String(s), CastType::Int) => {
                ValueType::Int(s.string.trim().parse::<i32>().map_err(|_| bad_cast())?)
            }
            (ValueType::String(s), CastType::Float) => {
                ValueType::Float(s.string.trim().parse::<f32>().map_err(|_| bad_cast())?)
            }

            (ValueType::List(l), CastType::Int) => ValueType::Int(l.get_max_item().1),
            (ValueType::List(l), CastType::Float) => ValueType::Float(l.get_max_item().1 as f32),
            (ValueType::List(l), CastType::String) => match l.get_max_item() {
                (Some(item), _) => ValueType::new(item.to_string()),
                (None, _) => ValueType::new(""),
            },

            _ => return Err(bad_cast()),
        };

        Ok(Some(casted))
    }

    pub(crate) fn get_list_mut(&mut self) -> Option<&mut InkList> {
        match self {
            ValueType::List(l) => Some(l),
            _ => None,
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueType::Bool(v) => write!(f, "{v}"),
            ValueType::Int(v) => write!(f, "{v}"),
            ValueType::Float(v) => write!(f, "{v}"),
            ValueType::String(v) => write!(f, "{}", v.string),
            ValueType::List(l) => write!(f, "{l}"),
            ValueType::DivertTarget(p) => write!(f, "DivertTargetValue({p})"),
            ValueType::VariablePointer(v) => {
                write!(f, "VariablePointerValue({})", v.variable_name)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_promotes_to_float() {
        let v = ValueType::new(3);
        let casted = v.cast(CastType::Float).unwrap().unwrap();
        assert_eq!(casted, ValueType::Float(3.0));
        assert!(ValueType::Float(1.5).cast(CastType::Float).unwrap().is_none());
    }

    #[test]
    fn promotion_order() {
        assert!(CastType::Bool < CastType::Int);
        assert!(CastType::Int < CastType::Float);
        assert!(CastType::Float < CastType::List);
        assert!(CastType::List < CastType::String);
    }

    #[test]
    fn divert_targets_do_not_cast() {
        let p = ValueType::DivertTarget(crate::path::Path::new_with_components_string(Some("knot")));
        assert!(p.cast(CastType::Int).is_err());
        assert!(ValueType::new(1).cast(CastType::DivertTarget).is_err());
    }

    #[test]
    fn strings_parse_or_fail() {
        assert_eq!(
            ValueType::new("42").cast(CastType::Int).unwrap(),
            Some(ValueType::Int(42))
        );
        assert!(ValueType::new("nope").cast(CastType::Int).is_err());
        assert_eq!(ValueType::Bool(true).cast(CastType::String).unwrap(), Some(ValueType::new("true")));
    }
}
