use crate::{
    object::{ContentGraph, ObjectId},
    path::{Component, Path},
};

pub const NULL: Pointer = Pointer::new(None, -1);

/// A position inside a container: a cheap stand-in for a [`Path`] used while
/// stepping through content.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Pointer {
    pub container: Option<ObjectId>,
    pub index: i32,
}

impl Default for Pointer {
    fn default() -> Self {
        NULL
    }
}

impl Pointer {
    pub const fn new(container: Option<ObjectId>, index: i32) -> Pointer {
        Pointer { container, index }
    }

    pub fn start_of(container: ObjectId) -> Pointer {
        Pointer {
            container: Some(container),
            index: 0,
        }
    }

    pub fn is_null(&self) -> bool {
        self.container.is_none()
    }

    /// The pointed object: the container itself for a negative index, the
    /// child at `index`, or `None` past the end of the container.
    pub fn resolve(&self, graph: &ContentGraph) -> Option<ObjectId> {
        let container_id = self.container?;
        let container = graph.get_container(container_id)?;

        if self.index < 0 || container.content.is_empty() {
            return Some(container_id);
        }

        container.content.get(self.index as usize).copied()
    }

    pub fn get_path(&self, graph: &ContentGraph) -> Option<Path> {
        let container = self.container?;
        let path = graph.get_path(container);

        if self.index >= 0 {
            Some(path.path_by_appending_component(Component::new_i(self.index as usize)))
        } else {
            Some(path)
        }
    }
}
