use std::collections::{HashMap, HashSet};

use crate::{object::ObjectId, value_type::ValueType};

/// Changes made while running speculatively. Reads look here first and fall
/// back to the committed state; the patch is later applied or dropped.
#[derive(Debug, Clone, Default)]
pub struct StatePatch {
    pub(crate) globals: HashMap<String, ValueType>,
    pub(crate) changed_variables: HashSet<String>,
    pub(crate) visit_counts: HashMap<ObjectId, i32>,
    pub(crate) turn_indices: HashMap<ObjectId, i32>,
}

impl StatePatch {
    pub fn new(to_copy: Option<&StatePatch>) -> StatePatch {
        to_copy.cloned().unwrap_or_default()
    }

    pub fn get_global(&self, name: &str) -> Option<&ValueType> {
        self.globals.get(name)
    }

    pub fn set_global(&mut self, name: &str, value: ValueType) {
        self.globals.insert(name.to_string(), value);
    }

    pub(crate) fn add_changed_variable(&mut self, name: &str) {
        self.changed_variables.insert(name.to_string());
    }

    pub fn get_visit_count(&self, container: ObjectId) -> Option<i32> {
        self.visit_counts.get(&container).copied()
    }

    pub fn set_visit_count(&mut self, container: ObjectId, count: i32) {
        self.visit_counts.insert(container, count);
    }

    pub fn get_turn_index(&self, container: ObjectId) -> Option<i32> {
        self.turn_indices.get(&container).copied()
    }

    pub fn set_turn_index(&mut self, container: ObjectId, index: i32) {
        self.turn_indices.insert(container, index);
    }
}
