//! Built-in operators and functions (`+`, `==`, `LIST_COUNT`, ...).
//!
//! Operators are a closed enum resolved by name when the story is loaded,
//! so there is no shared operator table between stories.
use strum::{Display, EnumString, IntoStaticStr};

use crate::{
    ink_list::InkList, object::RTObject, story_error::StoryError, value::CastType,
    value_type::ValueType as V,
};

#[derive(Debug, PartialEq, Eq, Clone, Copy, EnumString, IntoStaticStr, Display)]
pub enum Op {
    #[strum(serialize = "+")]
    Add,
    #[strum(serialize = "-")]
    Subtract,
    #[strum(serialize = "/")]
    Divide,
    #[strum(serialize = "*")]
    Multiply,
    #[strum(serialize = "%")]
    Mod,
    #[strum(serialize = "_")]
    Negate,

    #[strum(serialize = "==")]
    Equal,
    #[strum(serialize = ">")]
    Greater,
    #[strum(serialize = "<")]
    Less,
    #[strum(serialize = ">=")]
    GreaterThanOrEquals,
    #[strum(serialize = "<=")]
    LessThanOrEquals,
    #[strum(serialize = "!=")]
    NotEquals,
    #[strum(serialize = "!")]
    Not,

    #[strum(serialize = "&&")]
    And,
    #[strum(serialize = "||")]
    Or,

    #[strum(serialize = "MIN")]
    Min,
    #[strum(serialize = "MAX")]
    Max,

    #[strum(serialize = "POW")]
    Pow,
    #[strum(serialize = "FLOOR")]
    Floor,
    #[strum(serialize = "CEILING")]
    Ceiling,
    #[strum(serialize = "INT")]
    Int,
    #[strum(serialize = "FLOAT")]
    Float,

    #[strum(serialize = "?")]
    Has,
    #[strum(serialize = "!?")]
    Hasnt,
    #[strum(serialize = "^")]
    Intersect,

    #[strum(serialize = "LIST_MIN")]
    ListMin,
    #[strum(serialize = "LIST_MAX")]
    ListMax,
    #[strum(serialize = "LIST_ALL")]
    All,
    #[strum(serialize = "LIST_COUNT")]
    Count,
    #[strum(serialize = "LIST_VALUE")]
    ValueOfList,
    #[strum(serialize = "LIST_INVERT")]
    Invert,
}

fn not_available(op: Op, params: &[&V]) -> StoryError {
    let types: Vec<String> = params.iter().map(|p| format!("{:?}", p.cast_type())).collect();

    StoryError::InvalidStoryState(format!(
        "Operation '{}' not available for type {}.",
        op,
        types.join(", ")
    ))
}

impl Op {
    pub fn new_from_name(name: &str) -> Option<Op> {
        name.parse().ok()
    }

    pub fn get_name(&self) -> &'static str {
        self.into()
    }

    pub fn get_number_of_parameters(&self) -> usize {
        match self {
            Op::Negate
            | Op::Not
            | Op::Floor
            | Op::Ceiling
            | Op::Int
            | Op::Float
            | Op::ListMin
            | Op::ListMax
            | Op::All
            | Op::Count
            | Op::ValueOfList
            | Op::Invert => 1,
            _ => 2,
        }
    }

    pub(crate) fn call(&self, params: Vec<RTObject>) -> Result<V, StoryError> {
        if self.get_number_of_parameters() != params.len() {
            return Err(StoryError::WrongArity {
                operator: self.to_string(),
                expected: self.get_number_of_parameters(),
                found: params.len(),
            });
        }

        let mut values = Vec::with_capacity(params.len());

        for p in params {
            match p {
                RTObject::Value(v) => values.push(v),
                RTObject::Void => {
                    return Err(StoryError::InvalidStoryState(
                        "Attempting to perform operation on a void value. Did you forget to 'return' a value from a function you called here?".to_owned(),
                    ))
                }
                other => {
                    return Err(StoryError::InvalidStoryState(format!(
                        "Value expected as operand of '{self}', found {other:?}"
                    )))
                }
            }
        }

        // Binary operations on lists don't follow the standard coercion rules
        if values.len() == 2 && values.iter().any(|v| matches!(v, V::List(_))) {
            return self.call_binary_list_operation(&values[0], &values[1]);
        }

        let coerced = coerce_values_to_single_type(values)?;

        match coerced.as_slice() {
            [a] => self.call_unary(a),
            [a, b] => self.call_binary(a, b),
            _ => Err(StoryError::InvalidStoryState(format!(
                "Unexpected number of parameters to '{self}'"
            ))),
        }
    }

    fn call_binary_list_operation(&self, a: &V, b: &V) -> Result<V, StoryError> {
        // LIST + 1 moves every item to its successor in its own definition
        if let (Op::Add | Op::Subtract, V::List(list), V::Int(delta)) = (self, a, b) {
            return Ok(V::List(self.call_list_increment_operation(list, *delta)));
        }

        match (self, a, b) {
            (Op::And | Op::Or, V::List(_), V::List(_)) => self.call_binary(a, b),
            (Op::And, _, _) => Ok(V::Bool(a.is_truthy()? && b.is_truthy()?)),
            (Op::Or, _, _) => Ok(V::Bool(a.is_truthy()? || b.is_truthy()?)),
            (_, V::List(_), V::List(_)) => self.call_binary(a, b),
            _ => Err(StoryError::InvalidStoryState(format!(
                "Can not call use '{self}' operation on {a} and {b}"
            ))),
        }
    }

    fn call_list_increment_operation(&self, list: &InkList, delta: i32) -> InkList {
        let mut result = InkList::new();

        for (item, value) in list.items.iter() {
            let target = match self {
                Op::Add => value.wrapping_add(delta),
                _ => value.wrapping_sub(delta),
            };

            let origin = list
                .origins
                .iter()
                .find(|o| Some(o.get_name()) == item.get_origin_name());

            if let Some(origin) = origin {
                if let Some(incremented) = origin.get_item_with_value(target) {
                    result.items.insert(incremented, target);
                }
            }
        }

        result.origins = list.origins.clone();
        result
    }

    fn call_unary(&self, a: &V) -> Result<V, StoryError> {
        let result = match (self, a) {
            (Op::Negate, V::Int(x)) => V::Int(x.wrapping_neg()),
            (Op::Negate, V::Float(x)) => V::Float(-x),

            (Op::Not, V::Int(x)) => V::Bool(*x == 0),
            (Op::Not, V::Float(x)) => V::Bool(*x == 0.0),
            (Op::Not, V::List(l)) => V::Int(i32::from(l.is_empty())),

            (Op::Floor | Op::Ceiling | Op::Int, V::Int(x)) => V::Int(*x),
            (Op::Floor, V::Float(x)) => V::Float(x.floor()),
            (Op::Ceiling, V::Float(x)) => V::Float(x.ceil()),
            (Op::Int, V::Float(x)) => V::Int(*x as i32),
            (Op::Float, V::Int(x)) => V::Float(*x as f32),
            (Op::Float, V::Float(x)) => V::Float(*x),

            (Op::ListMin, V::List(l)) => V::List(l.min_as_list()),
            (Op::ListMax, V::List(l)) => V::List(l.max_as_list()),
            (Op::All, V::List(l)) => V::List(l.get_all()),
            (Op::Count, V::List(l)) => V::Int(l.len() as i32),
            (Op::ValueOfList, V::List(l)) => V::Int(l.get_max_item().1),
            (Op::Invert, V::List(l)) => V::List(l.inverse()),

            _ => return Err(not_available(*self, &[a])),
        };

        Ok(result)
    }

    fn call_binary(&self, a: &V, b: &V) -> Result<V, StoryError> {
        let result = match (self, a, b) {
            (Op::Add, V::Int(x), V::Int(y)) => V::Int(x.wrapping_add(*y)),
            (Op::Add, V::Float(x), V::Float(y)) => V::Float(x + y),
            (Op::Add, V::String(x), V::String(y)) => V::new(format!("{}{}", x.string, y.string)),
            (Op::Add, V::List(x), V::List(y)) => V::List(x.union(y)),

            (Op::Subtract, V::Int(x), V::Int(y)) => V::Int(x.wrapping_sub(*y)),
            (Op::Subtract, V::Float(x), V::Float(y)) => V::Float(x - y),
            (Op::Subtract, V::List(x), V::List(y)) => V::List(x.without(y)),

            (Op::Multiply, V::Int(x), V::Int(y)) => V::Int(x.wrapping_mul(*y)),
            (Op::Multiply, V::Float(x), V::Float(y)) => V::Float(x * y),

            (Op::Divide | Op::Mod, V::Int(_), V::Int(0)) => {
                return Err(StoryError::InvalidStoryState(
                    "Integer division by zero".to_owned(),
                ))
            }
            (Op::Divide, V::Int(x), V::Int(y)) => V::Int(x.wrapping_div(*y)),
            (Op::Divide, V::Float(x), V::Float(y)) => V::Float(x / y),
            (Op::Mod, V::Int(x), V::Int(y)) => V::Int(x.wrapping_rem(*y)),
            (Op::Mod, V::Float(x), V::Float(y)) => V::Float(x % y),

            (Op::Equal, _, _) => V::Bool(values_equal(*self, a, b)?),
            (Op::NotEquals, _, _) => V::Bool(!values_equal(*self, a, b)?),

            (Op::Greater, V::Int(x), V::Int(y)) => V::Bool(x > y),
            (Op::Greater, V::Float(x), V::Float(y)) => V::Bool(x > y),
            (Op::Greater, V::List(x), V::List(y)) => V::Bool(x.greater_than(y)),
            (Op::Less, V::Int(x), V::Int(y)) => V::Bool(x < y),
            (Op::Less, V::Float(x), V::Float(y)) => V::Bool(x < y),
            (Op::Less, V::List(x), V::List(y)) => V::Bool(x.less_than(y)),
            (Op::GreaterThanOrEquals, V::Int(x), V::Int(y)) => V::Bool(x >= y),
            (Op::GreaterThanOrEquals, V::Float(x), V::Float(y)) => V::Bool(x >= y),
            (Op::GreaterThanOrEquals, V::List(x), V::List(y)) => {
                V::Bool(x.greater_than_or_equals(y))
            }
            (Op::LessThanOrEquals, V::Int(x), V::Int(y)) => V::Bool(x <= y),
            (Op::LessThanOrEquals, V::Float(x), V::Float(y)) => V::Bool(x <= y),
            (Op::LessThanOrEquals, V::List(x), V::List(y)) => V::Bool(x.less_than_or_equals(y)),

            (Op::And, V::Int(x), V::Int(y)) => V::Bool(*x != 0 && *y != 0),
            (Op::And, V::Float(x), V::Float(y)) => V::Bool(*x != 0.0 && *y != 0.0),
            (Op::And, V::List(x), V::List(y)) => V::Bool(!x.is_empty() && !y.is_empty()),
            (Op::Or, V::Int(x), V::Int(y)) => V::Bool(*x != 0 || *y != 0),
            (Op::Or, V::Float(x), V::Float(y)) => V::Bool(*x != 0.0 || *y != 0.0),
            (Op::Or, V::List(x), V::List(y)) => V::Bool(!x.is_empty() || !y.is_empty()),

            (Op::Min, V::Int(x), V::Int(y)) => V::Int(*x.min(y)),
            (Op::Min, V::Float(x), V::Float(y)) => V::Float(x.min(*y)),
            (Op::Max, V::Int(x), V::Int(y)) => V::Int(*x.max(y)),
            (Op::Max, V::Float(x), V::Float(y)) => V::Float(x.max(*y)),

            (Op::Pow, V::Int(x), V::Int(y)) => V::Float((*x as f32).powf(*y as f32)),
            (Op::Pow, V::Float(x), V::Float(y)) => V::Float(x.powf(*y)),

            (Op::Has, V::String(x), V::String(y)) => V::Bool(x.string.contains(&y.string)),
            (Op::Has, V::List(x), V::List(y)) => V::Bool(x.contains(y)),
            (Op::Hasnt, V::String(x), V::String(y)) => V::Bool(!x.string.contains(&y.string)),
            (Op::Hasnt, V::List(x), V::List(y)) => V::Bool(!x.contains(y)),

            (Op::Intersect, V::List(x), V::List(y)) => V::List(x.intersect(y)),

            _ => return Err(not_available(*self, &[a, b])),
        };

        Ok(result)
    }
}

fn values_equal(op: Op, a: &V, b: &V) -> Result<bool, StoryError> {
    match (a, b) {
        (V::Int(x), V::Int(y)) => Ok(x == y),
        (V::Float(x), V::Float(y)) => Ok(x == y),
        (V::String(x), V::String(y)) => Ok(x.string == y.string),
        (V::List(x), V::List(y)) => Ok(x == y),
        (V::DivertTarget(x), V::DivertTarget(y)) => Ok(x == y),
        (V::VariablePointer(x), V::VariablePointer(y)) => Ok(x == y),
        _ => Err(not_available(op, &[a, b])),
    }
}

/// Casts every operand to the highest type among them, never below Int.
fn coerce_values_to_single_type(values: Vec<V>) -> Result<Vec<V>, StoryError> {
    let dest = values
        .iter()
        .map(|v| v.cast_type())
        .fold(CastType::Int, CastType::max);

    values
        .into_iter()
        .map(|v| -> Result<V, StoryError> { Ok(v.cast(dest)?.unwrap_or(v)) })
        .collect()
}
