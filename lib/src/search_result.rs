use crate::object::{ContentGraph, ObjectId};

/// Outcome of looking up a path. When the lookup stops early, `obj` is the
/// deepest object that was reached and `approximate` is set.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SearchResult {
    pub obj: ObjectId,
    pub approximate: bool,
}

impl SearchResult {
    pub fn new(obj: ObjectId, approximate: bool) -> Self {
        SearchResult { obj, approximate }
    }

    /// The object only when the whole path was resolved.
    pub fn correct_obj(&self) -> Option<ObjectId> {
        if self.approximate {
            None
        } else {
            Some(self.obj)
        }
    }

    /// The reached object if it is a container.
    pub fn container(&self, graph: &ContentGraph) -> Option<ObjectId> {
        graph.get_container(self.obj).map(|_| self.obj)
    }
}
