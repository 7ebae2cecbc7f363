use std::collections::HashMap;

use serde_json::Map;

use crate::{
    choice::Choice,
    choice_point::ChoicePoint,
    container::Container,
    control_command::CommandType,
    divert::Divert,
    ink_list::InkList,
    ink_list_item::InkListItem,
    list_definition::ListDefinition,
    list_definitions_origin::ListDefinitionsOrigin,
    native_function_call::Op,
    object::{ContentGraph, ObjectId, RTObject},
    path::Path,
    push_pop::PushPopType,
    story::{INK_VERSION_CURRENT, INK_VERSION_MINIMUM_COMPATIBLE},
    story_error::{Document, StoryError},
    tag::Tag,
    value_type::ValueType,
    variable_assigment::VariableAssignment,
    variable_reference::VariableReference,
};

/// Parses a compiled story into its content graph and list definitions.
/// Also returns the ink version the story was compiled with.
pub(crate) fn load_from_string(s: &str) -> Result<(i32, ContentGraph, ListDefinitionsOrigin), StoryError> {
    let json: serde_json::Value = serde_json::from_str(s)?;

    let version = json
        .get("inkVersion")
        .and_then(|v| v.as_i64())
        .ok_or(StoryError::BadJson(
            "ink version number not found. Are you sure it's a valid .ink.json file?".to_owned(),
        ))? as i32;

    if !(INK_VERSION_MINIMUM_COMPATIBLE..=INK_VERSION_CURRENT).contains(&version) {
        return Err(StoryError::IncompatibleVersion {
            document: Document::Story,
            found: version as i64,
            minimum: INK_VERSION_MINIMUM_COMPATIBLE,
            current: INK_VERSION_CURRENT,
        });
    }

    let root_token = json.get("root").ok_or(StoryError::BadJson(
        "Root node for ink not found. Are you sure it's a valid .ink.json file?".to_owned(),
    ))?;

    let list_definitions = match json.get("listDefs") {
        Some(def) => jtoken_to_list_definitions(def)?,
        None => ListDefinitionsOrigin::new(Vec::new()),
    };

    let mut graph = ContentGraph::new();
    let root = jtoken_to_content(&mut graph, root_token, None)?;

    if graph.get_container(root).is_none() {
        return Err(StoryError::BadJson("The root node must be a container".to_owned()));
    }

    graph.set_root(root);

    Ok((version, graph, list_definitions))
}

/// Adds a compiled token to the graph. Arrays become containers, with their
/// children added recursively.
fn jtoken_to_content(
    graph: &mut ContentGraph,
    token: &serde_json::Value,
    name: Option<&str>,
) -> Result<ObjectId, StoryError> {
    match token {
        serde_json::Value::Array(jarray) => jarray_to_container(graph, jarray, name),
        _ => Ok(graph.add(jtoken_to_runtime_object(token)?)),
    }
}

fn jarray_to_container(
    graph: &mut ContentGraph,
    jarray: &[serde_json::Value],
    name: Option<&str>,
) -> Result<ObjectId, StoryError> {
    // The last element holds the name, the count flags and the named-only
    // sub containers, or is null
    let (terminating_obj, content) = match jarray.split_last() {
        Some((serde_json::Value::Object(obj), content)) => (Some(obj), content),
        Some((serde_json::Value::Null, content)) => (None, content),
        _ => {
            return Err(StoryError::BadJson(
                "Container arrays must end with an object or null".to_owned(),
            ))
        }
    };

    let mut own_name = name.map(str::to_string);
    let mut flags = 0;

    if let Some(terminating_obj) = terminating_obj {
        if let Some(f) = terminating_obj.get("#f") {
            flags = f
                .as_i64()
                .ok_or(StoryError::BadJson("Invalid container count flags".to_owned()))? as i32;
        }

        if let (None, Some(n)) = (&own_name, terminating_obj.get("#n")) {
            own_name = n.as_str().map(str::to_string);
        }
    }

    let container = graph.add(RTObject::Container(Container::new(own_name, flags)));

    for jtok in content {
        let child = jtoken_to_content(graph, jtok, None)?;
        graph.add_content(container, child)?;
    }

    if let Some(terminating_obj) = terminating_obj {
        for (k, v) in terminating_obj {
            if k == "#f" || k == "#n" {
                continue;
            }

            let named = jtoken_to_content(graph, v, Some(k))?;
            graph.add_to_named_content_only(container, named)?;
        }
    }

    Ok(container)
}

fn bad_token(token: &serde_json::Value) -> StoryError {
    StoryError::BadJson(format!("Failed to convert token to runtime object: {token}"))
}

fn str_prop<'a>(obj: &'a Map<String, serde_json::Value>, key: &str) -> Result<&'a str, StoryError> {
    obj.get(key)
        .and_then(|v| v.as_str())
        .ok_or_else(|| StoryError::BadJson(format!("Expected a string for '{key}'")))
}

/// Converts a token that is not a container: the content of the compiled
/// story and of the output and evaluation stacks in save files.
pub(crate) fn jtoken_to_runtime_object(token: &serde_json::Value) -> Result<RTObject, StoryError> {
    match token {
        serde_json::Value::Null => Ok(RTObject::Void),
        serde_json::Value::Bool(value) => Ok(RTObject::Value(ValueType::Bool(*value))),
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(i) => Ok(RTObject::Value(ValueType::Int(
                i32::try_from(i).map_err(|_| bad_token(token))?,
            ))),
            None => Ok(RTObject::Value(ValueType::Float(
                n.as_f64().ok_or_else(|| bad_token(token))? as f32,
            ))),
        },
        serde_json::Value::String(str) => {
            if let Some(text) = str.strip_prefix('^') {
                return Ok(RTObject::new_string(text));
            } else if str == "\n" {
                return Ok(RTObject::new_string("\n"));
            }

            if str == "<>" {
                return Ok(RTObject::Glue);
            }

            if let Some(control_command) = CommandType::new_from_name(str) {
                return Ok(RTObject::ControlCommand(control_command));
            }

            // "^" is taken by strings, so list intersection is written "L^"
            let call_str = if str == "L^" { "^" } else { str.as_str() };
            if let Some(op) = Op::new_from_name(call_str) {
                return Ok(RTObject::NativeFunctionCall(op));
            }

            if str == "void" {
                return Ok(RTObject::Void);
            }

            Err(bad_token(token))
        }
        serde_json::Value::Array(_) => Err(StoryError::BadJson(format!(
            "Unexpected container outside of the story content: {token}"
        ))),
        serde_json::Value::Object(obj) => jobject_to_runtime_object(obj, token),
    }
}

fn jobject_to_runtime_object(
    obj: &Map<String, serde_json::Value>,
    token: &serde_json::Value,
) -> Result<RTObject, StoryError> {
    if obj.contains_key("^->") {
        return Ok(RTObject::Value(ValueType::DivertTarget(
            Path::new_with_components_string(Some(str_prop(obj, "^->")?)),
        )));
    }

    if obj.contains_key("^var") {
        let context_index = match obj.get("ci") {
            Some(ci) => ci.as_i64().ok_or_else(|| bad_token(token))? as i32,
            None => -1,
        };

        return Ok(RTObject::Value(ValueType::new_variable_pointer(
            str_prop(obj, "^var")?,
            context_index,
        )));
    }

    let divert_kind = [
        ("->", false, PushPopType::Function, false),
        ("f()", true, PushPopType::Function, false),
        ("->t->", true, PushPopType::Tunnel, false),
        ("x()", false, PushPopType::Function, true),
    ]
    .into_iter()
    .find(|(key, ..)| obj.contains_key(*key));

    if let Some((key, pushes_to_stack, push_type, external)) = divert_kind {
        let target = str_prop(obj, key)?;

        let (var_divert_name, target_path) = if obj.contains_key("var") {
            (Some(target.to_string()), None)
        } else {
            (None, Some(target))
        };

        let external_args = match (external, obj.get("exArgs")) {
            (true, Some(n)) => n.as_u64().ok_or_else(|| bad_token(token))? as usize,
            _ => 0,
        };

        return Ok(RTObject::Divert(Divert::new(
            pushes_to_stack,
            push_type,
            external,
            external_args,
            obj.contains_key("c"),
            var_divert_name,
            target_path,
        )));
    }

    if obj.contains_key("*") {
        let flags = match obj.get("flg") {
            Some(f) => f.as_i64().ok_or_else(|| bad_token(token))? as i32,
            None => 0,
        };

        return Ok(RTObject::ChoicePoint(ChoicePoint::new(flags, str_prop(obj, "*")?)));
    }

    if obj.contains_key("VAR?") {
        return Ok(RTObject::VariableReference(VariableReference::new(str_prop(obj, "VAR?")?)));
    }

    if obj.contains_key("CNT?") {
        return Ok(RTObject::VariableReference(VariableReference::from_path_for_count(
            str_prop(obj, "CNT?")?,
        )));
    }

    let assignment = [("VAR=", true), ("temp=", false)]
        .into_iter()
        .find(|(key, _)| obj.contains_key(*key));

    if let Some((key, is_global)) = assignment {
        let is_new_decl = !obj.contains_key("re");
        return Ok(RTObject::VariableAssignment(VariableAssignment::new(
            str_prop(obj, key)?,
            is_new_decl,
            is_global,
        )));
    }

    // Legacy tag
    if obj.contains_key("#") {
        return Ok(RTObject::Tag(Tag::new(str_prop(obj, "#")?)));
    }

    if let Some(list_content) = obj.get("list") {
        return Ok(RTObject::Value(ValueType::List(jobject_to_list(
            list_content,
            obj.get("origins"),
        )?)));
    }

    Err(bad_token(token))
}

fn jobject_to_list(
    list_content: &serde_json::Value,
    origins: Option<&serde_json::Value>,
) -> Result<InkList, StoryError> {
    let list_content = list_content
        .as_object()
        .ok_or(StoryError::BadJson("Invalid list content".to_owned()))?;

    let mut raw_list = InkList::new();

    if let Some(origins) = origins {
        let names = origins
            .as_array()
            .ok_or(StoryError::BadJson("Invalid list origins".to_owned()))?
            .iter()
            .map(|e| e.as_str().map(str::to_string))
            .collect::<Option<Vec<String>>>()
            .ok_or(StoryError::BadJson("Invalid list origin name".to_owned()))?;

        raw_list.set_initial_origin_names(Some(names));
    }

    for (k, v) in list_content {
        let value = v
            .as_i64()
            .ok_or_else(|| StoryError::BadJson(format!("Invalid value for list item '{k}'")))?;
        raw_list.items.insert(InkListItem::from_full_name(k), value as i32);
    }

    Ok(raw_list)
}

pub(crate) fn jtoken_to_value(token: &serde_json::Value) -> Result<ValueType, StoryError> {
    match jtoken_to_runtime_object(token)? {
        RTObject::Value(v) => Ok(v),
        other => Err(StoryError::BadJson(format!("Expected a value but found {other}"))),
    }
}

pub(crate) fn jarray_to_runtime_obj_list(jarray: &[serde_json::Value]) -> Result<Vec<RTObject>, StoryError> {
    jarray.iter().map(jtoken_to_runtime_object).collect()
}

pub(crate) fn jtoken_to_choice(token: &serde_json::Value) -> Result<Choice, StoryError> {
    let obj = token
        .as_object()
        .ok_or(StoryError::BadJson("Invalid choice".to_owned()))?;

    let index = obj
        .get("index")
        .and_then(|i| i.as_u64())
        .ok_or(StoryError::BadJson("Invalid choice index".to_owned()))? as usize;
    let original_thread_index = obj
        .get("originalThreadIndex")
        .and_then(|i| i.as_u64())
        .ok_or(StoryError::BadJson("Invalid choice thread index".to_owned()))?
        as usize;

    let tags = match obj.get("tags").and_then(|t| t.as_array()) {
        Some(tags) => tags
            .iter()
            .filter_map(|t| t.as_str().map(str::to_string))
            .collect(),
        None => Vec::new(),
    };

    Ok(Choice::new_from_json(
        str_prop(obj, "targetPath")?,
        str_prop(obj, "originalChoicePath")?.to_string(),
        str_prop(obj, "text")?,
        index,
        original_thread_index,
        tags,
    ))
}

pub(crate) fn jtoken_to_list_definitions(def: &serde_json::Value) -> Result<ListDefinitionsOrigin, StoryError> {
    let defs = def
        .as_object()
        .ok_or(StoryError::BadJson("Invalid list definitions".to_owned()))?;

    let mut all_defs: Vec<ListDefinition> = Vec::with_capacity(defs.len());

    for (name, list_def_json) in defs {
        let mut items: HashMap<String, i32> = HashMap::new();

        for (k, v) in list_def_json
            .as_object()
            .ok_or_else(|| StoryError::BadJson(format!("Invalid definition of list '{name}'")))?
        {
            let value = v
                .as_i64()
                .ok_or_else(|| StoryError::BadJson(format!("Invalid value for '{name}.{k}'")))?;
            items.insert(k.clone(), value as i32);
        }

        all_defs.push(ListDefinition::new(name.clone(), items));
    }

    Ok(ListDefinitionsOrigin::new(all_defs))
}

pub(crate) fn jobject_to_hashmap_values(
    jobj: &Map<String, serde_json::Value>,
) -> Result<HashMap<String, ValueType>, StoryError> {
    jobj.iter()
        .map(|(k, v)| Ok((k.clone(), jtoken_to_value(v)?)))
        .collect()
}

pub(crate) fn jobject_to_int_hashmap(
    jobj: &Map<String, serde_json::Value>,
) -> Result<HashMap<String, i32>, StoryError> {
    jobj.iter()
        .map(|(k, v)| {
            let n = v
                .as_i64()
                .ok_or_else(|| StoryError::BadJson(format!("Expected an integer for '{k}'")))?;
            Ok((k.clone(), n as i32))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_checked() {
        let too_new = r#"{"inkVersion":22,"root":[null],"listDefs":{}}"#;
        assert!(matches!(
            load_from_string(too_new),
            Err(StoryError::IncompatibleVersion {
                document: Document::Story,
                found: 22,
                ..
            })
        ));

        let too_old = r#"{"inkVersion":17,"root":[null],"listDefs":{}}"#;
        assert!(load_from_string(too_old).is_err());

        assert!(load_from_string("not json").is_err());
    }

    #[test]
    fn containers_and_named_content() {
        let json = r##"{"inkVersion":21,"root":[["^Hi","\n",{"->":"knot"},null],"done",{"knot":[{"#":"t"},"<>","L^","end",{"#f":1}],"#f":3}],"listDefs":{}}"##;
        let (version, graph, _) = load_from_string(json).unwrap();
        assert_eq!(version, 21);

        let root = graph.get_container(graph.root()).unwrap();
        assert_eq!(root.content.len(), 2);
        assert!(root.visits_should_be_counted && root.turn_index_should_be_counted);

        let knot = graph.knot_container_with_name("knot").unwrap();
        let knot_c = graph.get_container(knot).unwrap();
        assert!(knot_c.visits_should_be_counted);
        assert!(matches!(graph.get(knot_c.content[0]), RTObject::Tag(_)));
        assert!(matches!(graph.get(knot_c.content[1]), RTObject::Glue));
        assert!(matches!(
            graph.get(knot_c.content[2]),
            RTObject::NativeFunctionCall(Op::Intersect)
        ));
        assert_eq!(graph.get_path(knot_c.content[3]).to_string(), "knot.3");
    }

    #[test]
    fn object_tokens() {
        let j: serde_json::Value = serde_json::json!(
            [{"^->": "a.b"}, {"^var": "x", "ci": 0}, {"f()": "f"}, {"->": "v", "var": true, "c": true},
             {"x()": "ext", "exArgs": 2}, {"*": ".^.c-0", "flg": 20}, {"VAR?": "x"}, {"CNT?": ".^"},
             {"temp=": "t", "re": true}, {"list": {"a.one": 1}, "origins": ["a"]}, 1.5, 2, "void"]
        );
        let objs = jarray_to_runtime_obj_list(j.as_array().unwrap()).unwrap();

        assert!(matches!(&objs[0], RTObject::Value(ValueType::DivertTarget(p)) if p.to_string() == "a.b"));
        assert!(matches!(&objs[1], RTObject::Value(ValueType::VariablePointer(v)) if v.get_context_index() == 0));
        assert!(matches!(&objs[2], RTObject::Divert(d) if d.pushes_to_stack && d.stack_push_type == PushPopType::Function));
        assert!(matches!(&objs[3], RTObject::Divert(d) if d.is_conditional && d.has_variable_target()));
        assert!(matches!(&objs[4], RTObject::Divert(d) if d.is_external && d.external_args == 2));
        assert!(matches!(&objs[5], RTObject::ChoicePoint(cp) if cp.once_only && cp.has_choice_only_content));
        assert!(matches!(&objs[6], RTObject::VariableReference(v) if v.name == "x"));
        assert!(matches!(&objs[7], RTObject::VariableReference(v) if v.path_for_count.is_some()));
        assert!(matches!(&objs[8], RTObject::VariableAssignment(v) if !v.is_new_declaration && !v.is_global));
        assert!(matches!(&objs[9], RTObject::Value(ValueType::List(l)) if l.contains_item_named("one")));
        assert!(matches!(&objs[10], RTObject::Value(ValueType::Float(f)) if *f == 1.5));
        assert!(matches!(&objs[11], RTObject::Value(ValueType::Int(2))));
        assert!(matches!(&objs[12], RTObject::Void));
    }
}
