use std::{cell::OnceCell, fmt};

use crate::{
    object::{ContentGraph, ObjectId},
    path::Path,
};

/// Template for a player choice. When stepped on, it is filtered by its
/// condition and once-only flag and may become a [`Choice`](crate::choice::Choice).
#[derive(Debug, Clone)]
pub struct ChoicePoint {
    pub has_condition: bool,
    pub has_start_content: bool,
    pub has_choice_only_content: bool,
    pub is_invisible_default: bool,
    pub once_only: bool,
    path_on_choice: Path,
    resolved_path: OnceCell<Option<Path>>,
}

impl ChoicePoint {
    pub fn new(flags: i32, path_string_on_choice: &str) -> Self {
        Self {
            has_condition: (flags & 1) > 0,
            has_start_content: (flags & 2) > 0,
            has_choice_only_content: (flags & 4) > 0,
            is_invisible_default: (flags & 8) > 0,
            once_only: (flags & 16) > 0,
            path_on_choice: Path::new_with_components_string(Some(path_string_on_choice)),
            resolved_path: OnceCell::new(),
        }
    }

    pub fn get_flags(&self) -> i32 {
        let mut flags = 0;
        if self.has_condition {
            flags |= 1;
        }
        if self.has_start_content {
            flags |= 2;
        }
        if self.has_choice_only_content {
            flags |= 4;
        }
        if self.is_invisible_default {
            flags |= 8;
        }
        if self.once_only {
            flags |= 16;
        }
        flags
    }

    /// The container the choice leads to.
    pub fn get_choice_target(&self, graph: &ContentGraph, own_id: ObjectId) -> Option<ObjectId> {
        let result = graph.resolve_path(own_id, &self.path_on_choice);
        result.correct_obj()?;
        result.container(graph)
    }

    /// Absolute path of the choice target, or `None` if it can't be found.
    pub fn get_path_on_choice(&self, graph: &ContentGraph, own_id: ObjectId) -> Option<Path> {
        self.resolved_path
            .get_or_init(|| {
                if self.path_on_choice.is_relative() {
                    self.get_choice_target(graph, own_id)
                        .map(|target| graph.get_path(target))
                } else {
                    Some(self.path_on_choice.clone())
                }
            })
            .clone()
    }

    pub fn get_raw_path_on_choice(&self) -> &Path {
        &self.path_on_choice
    }
}

impl fmt::Display for ChoicePoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Choice: -> {}", self.path_on_choice)
    }
}
