use std::collections::HashMap;

use serde_json::{json, Map};

use crate::{
    choice::Choice, ink_list::InkList, native_function_call::Op, object::RTObject,
    story_error::StoryError, value_type::ValueType,
};

/// Writes a float so that it reads back as a float, using the shortest
/// decimal form of the `f32`.
fn write_float(f: f32) -> serde_json::Value {
    let shortest: f64 = f.to_string().parse().unwrap_or(f as f64);
    json!(shortest)
}

fn write_ink_list(list: &InkList) -> serde_json::Value {
    let mut items: Map<String, serde_json::Value> = Map::new();

    for (item, value) in list.items.iter() {
        items.insert(item.get_full_name(), json!(*value));
    }

    let mut obj: Map<String, serde_json::Value> = Map::new();
    obj.insert("list".to_owned(), serde_json::Value::Object(items));

    // An empty list still needs to know its type
    if list.items.is_empty() {
        if let Some(names) = list.get_origin_names() {
            if !names.is_empty() {
                obj.insert("origins".to_owned(), json!(names));
            }
        }
    }

    serde_json::Value::Object(obj)
}

pub(crate) fn write_value(value: &ValueType) -> Result<serde_json::Value, StoryError> {
    Ok(match value {
        ValueType::Bool(b) => json!(*b),
        ValueType::Int(i) => json!(*i),
        ValueType::Float(f) => write_float(*f),
        ValueType::String(s) => {
            if s.is_newline {
                json!("\n")
            } else {
                json!(format!("^{}", s.string))
            }
        }
        ValueType::List(l) => write_ink_list(l),
        ValueType::DivertTarget(p) => json!({ "^->": p.get_components_string() }),
        ValueType::VariablePointer(v) => json!({
            "^var": v.get_variable_name(),
            "ci": v.get_context_index(),
        }),
    })
}

/// Writes the runtime objects that can appear on the output and evaluation
/// stacks.
pub(crate) fn write_rtobject(o: &RTObject) -> Result<serde_json::Value, StoryError> {
    match o {
        RTObject::Value(v) => write_value(v),
        RTObject::ControlCommand(c) => Ok(json!(c.get_name())),
        RTObject::NativeFunctionCall(Op::Intersect) => Ok(json!("L^")),
        RTObject::NativeFunctionCall(op) => Ok(json!(op.get_name())),
        RTObject::Tag(t) => Ok(json!({ "#": t.get_text() })),
        RTObject::Glue => Ok(json!("<>")),
        RTObject::Void => Ok(json!("void")),
        other => Err(StoryError::BadArgument(format!(
            "Failed to write runtime object to JSON: {other}"
        ))),
    }
}

pub(crate) fn write_list_rt_objs(objs: &[RTObject]) -> Result<serde_json::Value, StoryError> {
    Ok(serde_json::Value::Array(
        objs.iter().map(write_rtobject).collect::<Result<_, _>>()?,
    ))
}

pub(crate) fn write_dictionary_values(values: &HashMap<String, ValueType>) -> Result<serde_json::Value, StoryError> {
    let mut jobj: Map<String, serde_json::Value> = Map::new();

    for (k, v) in values {
        jobj.insert(k.clone(), write_value(v)?);
    }

    Ok(serde_json::Value::Object(jobj))
}

pub(crate) fn write_int_dictionary(map: &HashMap<String, i32>) -> serde_json::Value {
    let jobj: Map<String, serde_json::Value> = map.iter().map(|(k, v)| (k.clone(), json!(*v))).collect();
    serde_json::Value::Object(jobj)
}

pub(crate) fn write_choice(choice: &Choice) -> serde_json::Value {
    let mut jobj: Map<String, serde_json::Value> = Map::new();

    jobj.insert("text".to_owned(), json!(choice.text));
    jobj.insert("index".to_owned(), json!(choice.index));
    jobj.insert("originalChoicePath".to_owned(), json!(choice.source_path));
    jobj.insert("originalThreadIndex".to_owned(), json!(choice.original_thread_index));
    jobj.insert("targetPath".to_owned(), json!(choice.get_path_string_on_choice()));

    if !choice.tags.is_empty() {
        jobj.insert("tags".to_owned(), json!(choice.tags));
    }

    serde_json::Value::Object(jobj)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{json_read, ink_list_item::InkListItem};

    #[test]
    fn values_read_back() {
        let mut list = InkList::new();
        list.items.insert(InkListItem::from_full_name("colors.red"), 1);

        let values = vec![
            ValueType::Bool(true),
            ValueType::Int(-3),
            ValueType::Float(3.3),
            ValueType::Float(2.0),
            ValueType::new("hello"),
            ValueType::new("\n"),
            ValueType::List(list),
            ValueType::new_variable_pointer("x", 2),
        ];

        for v in values {
            let j = write_value(&v).unwrap();
            assert_eq!(json_read::jtoken_to_value(&j).unwrap(), v);
        }

        assert_eq!(write_value(&ValueType::Float(2.0)).unwrap().to_string(), "2.0");
    }

    #[test]
    fn empty_list_keeps_its_origins() {
        let mut list = InkList::new();
        list.set_initial_origin_names(Some(vec!["colors".to_owned()]));

        let j = write_value(&ValueType::List(list)).unwrap();
        assert_eq!(j, json!({"list": {}, "origins": ["colors"]}));
    }

    #[test]
    fn stream_objects() {
        let objs = vec![
            RTObject::Glue,
            RTObject::ControlCommand(crate::control_command::CommandType::BeginString),
            RTObject::NativeFunctionCall(Op::Intersect),
            RTObject::Void,
        ];

        assert_eq!(
            write_list_rt_objs(&objs).unwrap(),
            json!(["<>", "str", "L^", "void"])
        );
    }
}
