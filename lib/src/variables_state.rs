use std::{
    collections::{HashMap, HashSet},
    rc::Rc,
};

use serde_json::Map;

use crate::{
    callstack::CallStack,
    json_read, json_write,
    list_definitions_origin::ListDefinitionsOrigin,
    state_patch::StatePatch,
    story_error::StoryError,
    value::CastType,
    value_type::{ValueType, VariablePointerValue},
    variable_assigment::VariableAssignment,
};

/// Global variables of a story. Temporaries live in the call stack, which
/// is passed in by the caller whenever a lookup may reach it.
///
/// The committed globals are shared between a state and its speculative
/// copies; the copies write to their patch instead.
#[derive(Debug, Clone)]
pub struct VariablesState {
    pub(crate) global_variables: Rc<HashMap<String, ValueType>>,
    pub(crate) default_global_variables: Rc<HashMap<String, ValueType>>,
    batch_observing_variable_changes: bool,
    changed_variables_for_batch_obs: Option<HashSet<String>>,
    pub(crate) patch: Option<StatePatch>,
    list_defs_origin: Rc<ListDefinitionsOrigin>,
    /// Globals still holding their initial value are left out of saves.
    pub dont_save_default_values: bool,
}

impl VariablesState {
    pub fn new(list_defs_origin: Rc<ListDefinitionsOrigin>) -> VariablesState {
        VariablesState {
            global_variables: Rc::new(HashMap::new()),
            default_global_variables: Rc::new(HashMap::new()),
            batch_observing_variable_changes: false,
            changed_variables_for_batch_obs: None,
            patch: None,
            list_defs_origin,
            dont_save_default_values: true,
        }
    }

    pub(crate) fn start_batch_observing_variable_changes(&mut self) {
        self.batch_observing_variable_changes = true;
        self.changed_variables_for_batch_obs = Some(HashSet::new());
    }

    pub(crate) fn is_batch_observing(&self) -> bool {
        self.batch_observing_variable_changes
    }

    /// Ends the batch, returning every global that changed during it with
    /// its current value.
    pub(crate) fn stop_batch_observing_variable_changes(&mut self) -> Vec<(String, ValueType)> {
        self.batch_observing_variable_changes = false;

        let mut changed: Vec<(String, ValueType)> = self
            .changed_variables_for_batch_obs
            .take()
            .unwrap_or_default()
            .into_iter()
            .filter_map(|name| {
                let value = self.get(&name)?.clone();
                Some((name, value))
            })
            .collect();

        changed.sort_by(|a, b| a.0.cmp(&b.0));
        changed
    }

    pub(crate) fn snapshot_default_globals(&mut self) {
        self.default_global_variables = Rc::clone(&self.global_variables);
    }

    /// Commits the globals of `patch`.
    pub(crate) fn apply_patch(&mut self, patch: &StatePatch) {
        if !patch.globals.is_empty() {
            let globals = Rc::make_mut(&mut self.global_variables);
            for (name, value) in patch.globals.iter() {
                globals.insert(name.clone(), value.clone());
            }
        }

        if let Some(changed_variables) = &mut self.changed_variables_for_batch_obs {
            for name in patch.changed_variables.iter() {
                changed_variables.insert(name.clone());
            }
        }
    }

    pub(crate) fn assign(
        &mut self,
        callstack: &mut CallStack,
        var_ass: &VariableAssignment,
        mut value: ValueType,
    ) -> Result<(), StoryError> {
        let mut name = var_ass.variable_name.to_string();
        let mut context_index = -1;

        let mut set_global = if var_ass.is_new_declaration {
            var_ass.is_global
        } else {
            self.global_variable_exists_with_name(&name)
        };

        if var_ass.is_new_declaration {
            // A new reference parameter: pin down which variable it points at
            if let ValueType::VariablePointer(var_pointer) = &value {
                value = self.resolve_variable_pointer(callstack, var_pointer)?;
            }
        } else {
            // Assigning through a reference assigns to the variable it points at
            while let Some(ValueType::VariablePointer(pv)) =
                self.get_raw_variable_with_name(callstack, &name, context_index)?
            {
                name = pv.variable_name.to_string();
                context_index = pv.context_index;
                set_global = context_index == 0;
            }
        }

        if set_global {
            self.set_global(&name, value);
            Ok(())
        } else {
            callstack.set_temporary_variable(name, value, var_ass.is_new_declaration, context_index)
        }
    }

    pub fn global_variable_exists_with_name(&self, name: &str) -> bool {
        self.global_variables.contains_key(name) || self.default_global_variables.contains_key(name)
    }

    /// Turns a pointer that only knows the variable name into one that knows
    /// the exact context. A pointer to a pointer collapses to its target.
    fn resolve_variable_pointer(
        &self,
        callstack: &CallStack,
        var_pointer: &VariablePointerValue,
    ) -> Result<ValueType, StoryError> {
        let mut context_index = var_pointer.context_index;

        if context_index == -1 {
            context_index = self.get_context_index_of_variable_named(callstack, &var_pointer.variable_name);
        }

        if let Some(pointed @ ValueType::VariablePointer(_)) =
            self.get_raw_variable_with_name(callstack, &var_pointer.variable_name, context_index)?
        {
            return Ok(pointed.clone());
        }

        Ok(ValueType::new_variable_pointer(&var_pointer.variable_name, context_index))
    }

    /// Sets a global from the host. The variable must be declared in the
    /// story and keep a compatible type. Returns whether the value changed.
    pub fn set(&mut self, variable_name: &str, value: ValueType) -> Result<bool, StoryError> {
        let old_value = match self.default_global_variables.get(variable_name) {
            Some(_) => self.get(variable_name).cloned(),
            None => {
                return Err(StoryError::BadArgument(format!(
                    "Cannot assign to a variable ({variable_name}) that hasn't been declared in the story"
                )))
            }
        };

        if let Some(old_value) = &old_value {
            if !Self::is_compatible_type(old_value, &value) {
                return Err(StoryError::BadArgument(format!(
                    "Cannot assign a {:?} to the variable '{}', which holds a {:?}",
                    value.cast_type(),
                    variable_name,
                    old_value.cast_type()
                )));
            }
        }

        let changed = old_value.as_ref() != Some(&value);
        self.set_global(variable_name, value);

        Ok(changed)
    }

    fn is_compatible_type(old_value: &ValueType, new_value: &ValueType) -> bool {
        let primitive = |t: CastType| t <= CastType::Float || t == CastType::String;
        let (old_t, new_t) = (old_value.cast_type(), new_value.cast_type());

        old_t == new_t || (primitive(old_t) && primitive(new_t))
    }

    /// Value of a global, with pending speculative changes taken into account.
    pub fn get(&self, variable_name: &str) -> Option<&ValueType> {
        if let Some(var) = self.patch.as_ref().and_then(|p| p.get_global(variable_name)) {
            return Some(var);
        }

        // A global added to the story after a save was made only exists in
        // the defaults
        self.global_variables
            .get(variable_name)
            .or_else(|| self.default_global_variables.get(variable_name))
    }

    /// 0 for a global, otherwise the context of the frame the temporary is
    /// referenced from.
    fn get_context_index_of_variable_named(&self, callstack: &CallStack, var_name: &str) -> i32 {
        if self.global_variable_exists_with_name(var_name) {
            return 0;
        }

        callstack.get_current_element_index()
    }

    fn get_raw_variable_with_name<'a>(
        &'a self,
        callstack: &'a CallStack,
        name: &str,
        context_index: i32,
    ) -> Result<Option<&'a ValueType>, StoryError> {
        let temporary = || callstack.get_temporary_variable_with_name(name, context_index);

        // 0 context = global
        if context_index == 0 || context_index == -1 {
            if let Some(global) = self.get(name) {
                return Ok(Some(global));
            }

            // `VAR x = A_LIST_ITEM` reads list items during the global set up
            match self.list_defs_origin.find_single_item_list_with_name(name) {
                Ok(Some(list_item_value)) => return Ok(Some(list_item_value)),
                Ok(None) => {}
                Err(ambiguous) => return temporary().map(Some).ok_or(ambiguous),
            }
        }

        Ok(temporary())
    }

    /// Reads a variable, following a variable pointer once.
    pub(crate) fn get_variable_with_name(
        &self,
        callstack: &CallStack,
        name: &str,
        context_index: i32,
    ) -> Result<Option<ValueType>, StoryError> {
        match self.get_raw_variable_with_name(callstack, name, context_index)? {
            Some(ValueType::VariablePointer(pointer)) => Ok(self
                .get_raw_variable_with_name(callstack, &pointer.variable_name, pointer.context_index)?
                .cloned()),
            other => Ok(other.cloned()),
        }
    }

    fn set_global(&mut self, name: &str, mut value: ValueType) {
        let old_value = self.get(name).cloned();

        if let Some(old_value) = &old_value {
            ValueType::retain_list_origins_for_assignment(old_value, &mut value);
        }

        let changed = old_value.as_ref() != Some(&value);

        if self.batch_observing_variable_changes && changed {
            match &mut self.patch {
                Some(patch) => patch.add_changed_variable(name),
                None => {
                    if let Some(changed_variables) = &mut self.changed_variables_for_batch_obs {
                        changed_variables.insert(name.to_string());
                    }
                }
            }
        }

        match &mut self.patch {
            Some(patch) => patch.set_global(name, value),
            None => {
                Rc::make_mut(&mut self.global_variables).insert(name.to_string(), value);
            }
        }
    }

    pub(crate) fn write_json(&self) -> Result<serde_json::Value, StoryError> {
        let mut jobj: Map<String, serde_json::Value> = Map::new();

        for (name, val) in self.global_variables.iter() {
            if self.dont_save_default_values && self.default_global_variables.get(name) == Some(val) {
                continue;
            }

            jobj.insert(name.clone(), json_write::write_value(val)?);
        }

        Ok(serde_json::Value::Object(jobj))
    }

    pub(crate) fn load_json(&mut self, jobj: &Map<String, serde_json::Value>) -> Result<(), StoryError> {
        let mut globals = HashMap::new();

        for (k, v) in self.default_global_variables.iter() {
            let value = match jobj.get(k) {
                Some(loaded_token) => json_read::jtoken_to_value(loaded_token)?,
                None => v.clone(),
            };

            globals.insert(k.to_string(), value);
        }

        self.global_variables = Rc::new(globals);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{list_definition::ListDefinition, pointer::Pointer, object::ContentGraph};

    fn vars() -> (VariablesState, CallStack) {
        let defs = Rc::new(ListDefinitionsOrigin::new(vec![ListDefinition::new(
            "colors".to_owned(),
            HashMap::from([("red".to_owned(), 1), ("blue".to_owned(), 2)]),
        )]));
        let mut vs = VariablesState::new(defs);
        vs.set_global("g", ValueType::new(5));
        vs.snapshot_default_globals();

        let graph = ContentGraph::new();
        (vs, CallStack::new(Pointer::start_of(graph.root())))
    }

    #[test]
    fn patch_commit_and_discard() {
        let (mut vs, _) = vars();

        vs.patch = Some(StatePatch::new(None));
        vs.set("g", ValueType::new(9)).unwrap();
        assert_eq!(vs.get("g"), Some(&ValueType::new(9)));
        assert_eq!(vs.global_variables.get("g"), Some(&ValueType::new(5)));

        // discard
        vs.patch = None;
        assert_eq!(vs.get("g"), Some(&ValueType::new(5)));
        vs.patch = Some(StatePatch::new(None));
        assert_eq!(vs.get("g"), Some(&ValueType::new(5)));

        // commit
        vs.set("g", ValueType::new(9)).unwrap();
        let patch = vs.patch.take().unwrap();
        vs.apply_patch(&patch);
        assert_eq!(vs.get("g"), Some(&ValueType::new(9)));
    }

    #[test]
    fn undeclared_or_incompatible_host_sets_fail() {
        let (mut vs, _) = vars();
        assert!(vs.set("nope", ValueType::new(1)).is_err());
        assert!(vs.set("g", ValueType::new(crate::ink_list::InkList::new())).is_err());
        assert!(vs.set("g", ValueType::new(1.5f32)).is_ok());
    }

    #[test]
    fn references_are_followed_once() {
        let (mut vs, mut cs) = vars();

        let decl = VariableAssignment::new("r", true, false);
        vs.assign(&mut cs, &decl, ValueType::new_variable_pointer("g", -1))
            .unwrap();

        assert_eq!(
            vs.get_variable_with_name(&cs, "r", -1).unwrap(),
            Some(ValueType::new(5))
        );

        // assigning to the reference writes the global
        let set = VariableAssignment::new("r", false, false);
        vs.assign(&mut cs, &set, ValueType::new(7)).unwrap();
        assert_eq!(vs.get("g"), Some(&ValueType::new(7)));
    }

    #[test]
    fn list_items_resolve_as_variables() {
        let (vs, cs) = vars();
        let red = vs.get_variable_with_name(&cs, "red", -1).unwrap().unwrap();
        assert!(matches!(red, ValueType::List(l) if l.contains_item_named("red")));
    }

    #[test]
    fn batch_reports_changed_globals() {
        let (mut vs, _) = vars();
        vs.start_batch_observing_variable_changes();
        vs.set("g", ValueType::new(5)).unwrap();
        vs.set("g", ValueType::new(6)).unwrap();
        let changed = vs.stop_batch_observing_variable_changes();
        assert_eq!(changed, vec![("g".to_owned(), ValueType::new(6))]);
    }

    #[test]
    fn defaults_are_not_saved() {
        let (mut vs, _) = vars();
        assert_eq!(vs.write_json().unwrap(), serde_json::json!({}));

        vs.dont_save_default_values = false;
        assert_eq!(vs.write_json().unwrap(), serde_json::json!({"g": 5}));
    }
}
