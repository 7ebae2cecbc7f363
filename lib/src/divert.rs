use std::{cell::OnceCell, fmt};

use crate::{
    object::{ContentGraph, ObjectId},
    path::{Component, Path},
    pointer::{self, Pointer},
    push_pop::PushPopType,
};

/// A jump to another location, optionally pushing a function or tunnel
/// frame first (`f()` / `->t->`), optionally conditional, or a call to an
/// external host function (`x()`).
#[derive(Debug, Clone)]
pub struct Divert {
    pub external_args: usize,
    pub is_conditional: bool,
    pub is_external: bool,
    pub pushes_to_stack: bool,
    pub stack_push_type: PushPopType,
    pub variable_divert_name: Option<String>,
    target_path: Option<Path>,
    target_pointer: OnceCell<Pointer>,
}

impl Divert {
    pub fn new(
        pushes_to_stack: bool,
        stack_push_type: PushPopType,
        is_external: bool,
        external_args: usize,
        is_conditional: bool,
        variable_divert_name: Option<String>,
        target_path: Option<&str>,
    ) -> Self {
        Divert {
            external_args,
            is_conditional,
            is_external,
            pushes_to_stack,
            stack_push_type,
            variable_divert_name,
            target_path: target_path.map(|p| Path::new_with_components_string(Some(p))),
            target_pointer: OnceCell::new(),
        }
    }

    pub fn has_variable_target(&self) -> bool {
        self.variable_divert_name.is_some()
    }

    /// The target exactly as written in the compiled story.
    pub fn get_raw_target_path(&self) -> Option<&Path> {
        self.target_path.as_ref()
    }

    /// Where the divert goes, resolved relative to the divert itself (`own_id`).
    /// A null pointer means the target doesn't exist in the graph.
    pub fn get_target_pointer(&self, graph: &ContentGraph, own_id: ObjectId) -> Pointer {
        *self.target_pointer.get_or_init(|| {
            let target_path = match &self.target_path {
                Some(p) => p,
                None => return pointer::NULL,
            };

            match target_path.get_last_component() {
                // Pointing at a specific child: resolve its container only,
                // the index may be one past the end.
                Some(Component::Index(index)) => {
                    let comps = target_path.get_components();
                    let container_path = Path::new(&comps[..comps.len() - 1], target_path.is_relative());
                    let result = graph.resolve_path(own_id, &container_path);

                    match result.correct_obj().and_then(|id| result.container(graph).map(|_| id)) {
                        Some(container) => Pointer::new(Some(container), *index as i32),
                        None => pointer::NULL,
                    }
                }
                _ => {
                    let result = graph.resolve_path(own_id, target_path);

                    match result.correct_obj() {
                        Some(id) if graph.get_container(id).is_some() => Pointer::start_of(id),
                        _ => pointer::NULL,
                    }
                }
            }
        })
    }

    /// Absolute target path, when the target exists.
    pub fn get_target_path(&self, graph: &ContentGraph, own_id: ObjectId) -> Option<Path> {
        let target_path = self.target_path.as_ref()?;

        if !target_path.is_relative() {
            return Some(target_path.clone());
        }

        self.get_target_pointer(graph, own_id).get_path(graph)
    }

    /// Shortest string form of the target, relative or absolute.
    pub fn get_target_path_string(&self, graph: &ContentGraph, own_id: ObjectId) -> Option<String> {
        let target_path = self.get_target_path(graph, own_id)?;
        Some(graph.compact_path_string(own_id, &target_path))
    }
}

impl fmt::Display for Divert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(name) = &self.variable_divert_name {
            return write!(f, "Divert(variable: {name})");
        }

        let target = match &self.target_path {
            Some(target) => target,
            None => return write!(f, "Divert(null)"),
        };

        write!(f, "Divert")?;

        if self.is_conditional {
            write!(f, "?")?;
        }

        if self.pushes_to_stack {
            match self.stack_push_type {
                PushPopType::Function => write!(f, " function")?,
                _ => write!(f, " tunnel")?,
            }
        }

        write!(f, " -> {target}")
    }
}
