//! The content graph: every node of a compiled story lives in one arena and
//! is addressed by an [`ObjectId`]. Containers own their children by id and
//! every node keeps the id of its parent as a plain back reference.
use std::{cell::OnceCell, collections::VecDeque, fmt};

use crate::{
    choice_point::ChoicePoint,
    container::Container,
    control_command::CommandType,
    divert::Divert,
    native_function_call::Op,
    path::{Component, Path},
    pointer::{self, Pointer},
    search_result::SearchResult,
    story_error::StoryError,
    tag::Tag,
    value_type::ValueType,
    variable_assigment::VariableAssignment,
    variable_reference::VariableReference,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(usize);

/// Every kind of content the runtime can step over. The same type is used
/// for the items of the output stream and the evaluation stack, which only
/// ever hold values, glue, tags, control commands and void.
#[derive(Debug, Clone)]
pub(crate) enum RTObject {
    Container(Container),
    Value(ValueType),
    ControlCommand(CommandType),
    NativeFunctionCall(Op),
    Divert(Divert),
    ChoicePoint(ChoicePoint),
    VariableReference(VariableReference),
    VariableAssignment(VariableAssignment),
    Tag(Tag),
    Glue,
    Void,
}

impl RTObject {
    pub(crate) fn new_string(s: &str) -> RTObject {
        RTObject::Value(ValueType::new(s))
    }

    pub(crate) fn as_value(&self) -> Option<&ValueType> {
        match self {
            RTObject::Value(v) => Some(v),
            _ => None,
        }
    }

    pub(crate) fn as_string(&self) -> Option<&crate::value_type::StringValue> {
        match self {
            RTObject::Value(ValueType::String(s)) => Some(s),
            _ => None,
        }
    }

    pub(crate) fn as_command(&self) -> Option<CommandType> {
        match self {
            RTObject::ControlCommand(c) => Some(*c),
            _ => None,
        }
    }

    pub(crate) fn is_command(&self, command: CommandType) -> bool {
        self.as_command() == Some(command)
    }
}

impl fmt::Display for RTObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RTObject::Container(c) => match &c.name {
                Some(name) => write!(f, "Container({name})"),
                None => write!(f, "Container"),
            },
            RTObject::Value(ValueType::String(s)) => {
                write!(f, "\"{}\"", s.string.replace('\n', "\\n"))
            }
            RTObject::Value(v) => write!(f, "{v}"),
            RTObject::ControlCommand(c) => write!(f, "{c:?}"),
            RTObject::NativeFunctionCall(op) => write!(f, "Native '{op:?}'"),
            RTObject::Divert(d) => write!(f, "{d}"),
            RTObject::ChoicePoint(cp) => write!(f, "{cp}"),
            RTObject::VariableReference(v) => match &v.path_for_count {
                Some(path) => write!(f, "read_count({path})"),
                None => write!(f, "var({})", v.name),
            },
            RTObject::VariableAssignment(v) => write!(f, "VarAssign to {}", v.variable_name),
            RTObject::Tag(t) => write!(f, "# {}", t.get_text()),
            RTObject::Glue => write!(f, "Glue"),
            RTObject::Void => write!(f, "Void"),
        }
    }
}

#[derive(Debug)]
struct Node {
    parent: Option<ObjectId>,
    obj: RTObject,
    path: OnceCell<Path>,
}

/// Arena holding the whole compiled story. It is filled once by the loader
/// and read-only afterwards.
#[derive(Debug, Default)]
pub struct ContentGraph {
    nodes: Vec<Node>,
    root: Option<ObjectId>,
}

impl ContentGraph {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn add(&mut self, obj: RTObject) -> ObjectId {
        self.nodes.push(Node {
            parent: None,
            obj,
            path: OnceCell::new(),
        });

        ObjectId(self.nodes.len() - 1)
    }

    pub(crate) fn set_root(&mut self, root: ObjectId) {
        self.root = Some(root);
    }

    /// The main container. An empty graph has its root at id 0.
    pub fn root(&self) -> ObjectId {
        self.root.unwrap_or(ObjectId(0))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub(crate) fn get(&self, id: ObjectId) -> &RTObject {
        &self.nodes[id.0].obj
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (ObjectId, &RTObject)> {
        self.nodes.iter().enumerate().map(|(i, n)| (ObjectId(i), &n.obj))
    }

    pub fn get_parent(&self, id: ObjectId) -> Option<ObjectId> {
        self.nodes[id.0].parent
    }

    pub fn get_container(&self, id: ObjectId) -> Option<&Container> {
        match &self.nodes.get(id.0)?.obj {
            RTObject::Container(c) => Some(c),
            _ => None,
        }
    }

    fn get_container_mut(&mut self, id: ObjectId) -> Result<&mut Container, StoryError> {
        match &mut self.nodes[id.0].obj {
            RTObject::Container(c) => Ok(c),
            other => Err(StoryError::InvalidStoryState(format!(
                "Content can only be added to containers, not to {other}"
            ))),
        }
    }

    fn adopt(&mut self, container: ObjectId, child: ObjectId) -> Result<(), StoryError> {
        if let Some(parent) = self.nodes[child.0].parent {
            return Err(StoryError::InvalidStoryState(format!(
                "Content is already in {}",
                self.get(parent)
            )));
        }

        self.nodes[child.0].parent = Some(container);
        Ok(())
    }

    /// Appends `child` to the ordered content of `container`, also
    /// registering it by name when it is a named container.
    pub(crate) fn add_content(&mut self, container: ObjectId, child: ObjectId) -> Result<(), StoryError> {
        self.get_container_mut(container)?;
        self.adopt(container, child)?;

        let child_name = match self.get(child) {
            RTObject::Container(c) if c.has_valid_name() => c.name.clone(),
            _ => None,
        };

        let c = self.get_container_mut(container)?;
        c.content.push(child);

        if let Some(name) = child_name {
            c.named_content.insert(name, child);
        }

        Ok(())
    }

    /// Registers a named container that is only reachable by name.
    pub(crate) fn add_to_named_content_only(
        &mut self,
        container: ObjectId,
        child: ObjectId,
    ) -> Result<(), StoryError> {
        let name = match self.get(child) {
            RTObject::Container(c) if c.has_valid_name() => c.name.clone().unwrap_or_default(),
            other => {
                return Err(StoryError::InvalidStoryState(format!(
                    "Can only add named containers to named content, not {other}"
                )))
            }
        };

        self.get_container_mut(container)?;
        self.adopt(container, child)?;
        self.get_container_mut(container)?
            .named_content
            .insert(name, child);

        Ok(())
    }

    /// Absolute path of a node, computed by walking up its parents.
    pub fn get_path(&self, id: ObjectId) -> Path {
        self.nodes[id.0]
            .path
            .get_or_init(|| {
                let mut comps: Vec<Component> = Vec::new();
                let mut child = id;

                while let Some(parent) = self.nodes[child.0].parent {
                    match self.get(child) {
                        RTObject::Container(c) if c.has_valid_name() => {
                            comps.push(Component::new(c.name.as_deref().unwrap_or_default()));
                        }
                        _ => {
                            // only named containers live outside the ordered content
                            let index = self
                                .get_container(parent)
                                .and_then(|pc| pc.content.iter().position(|c| *c == child))
                                .unwrap_or_default();
                            comps.push(Component::new_i(index));
                        }
                    }

                    child = parent;
                }

                comps.reverse();
                Path::new(&comps, false)
            })
            .clone()
    }

    pub fn content_with_path_component(&self, container: ObjectId, component: &Component) -> Option<ObjectId> {
        let c = self.get_container(container)?;

        match component {
            Component::Index(index) => c.content.get(*index).copied(),
            _ if component.is_parent() => self.get_parent(container),
            Component::Name(name) => c.named_content.get(name).copied(),
        }
    }

    /// Follows `path` from `container`, using the components in
    /// `[start, end)`. A path that can't be followed to its end gives an
    /// approximate result holding the deepest object reached.
    pub fn content_at_path(
        &self,
        container: ObjectId,
        path: &Path,
        start: usize,
        end: Option<usize>,
    ) -> SearchResult {
        let end = end.unwrap_or(path.len());
        let mut approximate = false;
        let mut current_container = Some(container);
        let mut current_obj = container;

        for i in start..end {
            let comp = match path.get_component(i) {
                Some(comp) => comp,
                None => {
                    approximate = true;
                    break;
                }
            };

            let found = match current_container {
                Some(cc) => self.content_with_path_component(cc, comp),
                None => None,
            };

            let found = match found {
                Some(found) => found,
                None => {
                    approximate = true;
                    break;
                }
            };

            let next_container = self.get_container(found).map(|_| found);

            // Only the last component may land on a non-container
            if i < end - 1 && next_container.is_none() {
                approximate = true;
                break;
            }

            current_obj = found;
            current_container = next_container;
        }

        SearchResult::new(current_obj, approximate)
    }

    /// Resolves an absolute path from the root, or a relative one from `from`.
    pub fn resolve_path(&self, from: ObjectId, path: &Path) -> SearchResult {
        if path.is_relative() {
            match self.get_container(from) {
                Some(_) => self.content_at_path(from, path, 0, None),
                None => {
                    let parent = self.get_parent(from).unwrap_or(self.root());
                    self.content_at_path(parent, &path.get_tail(), 0, None)
                }
            }
        } else {
            self.content_at_path(self.root(), path, 0, None)
        }
    }

    /// Resolves a path written relative to a scope: the first component is
    /// looked up in `context` and then in each of its ancestors. Only the
    /// original scope is additionally searched in depth for the first name,
    /// so that a sibling scope's weave points never shadow global names.
    pub fn resolve_from(&self, context: ObjectId, path: &Path) -> Option<SearchResult> {
        if path.is_relative() || path.is_empty() {
            return self.resolve_path(context, path).correct_obj().map(|id| SearchResult::new(id, false));
        }

        let mut ancestor = match self.get_container(context) {
            Some(_) => Some(context),
            None => self.get_parent(context),
        };
        let mut deep_search = true;

        while let Some(scope) = ancestor {
            let result = self.content_at_path(scope, path, 0, None);
            if !result.approximate {
                return Some(result);
            }

            if deep_search {
                deep_search = false;

                if let Some(Component::Name(head)) = path.get_head() {
                    if let Some(found) = self.find_named_descendant(scope, head) {
                        let result = self.content_at_path(found, path, 1, None);
                        if !result.approximate {
                            return Some(result);
                        }
                    }
                }
            }

            ancestor = self.get_parent(scope);
        }

        None
    }

    /// Breadth first search for a named container below `scope`.
    fn find_named_descendant(&self, scope: ObjectId, name: &str) -> Option<ObjectId> {
        let mut queue = VecDeque::from([scope]);

        while let Some(id) = queue.pop_front() {
            let c = match self.get_container(id) {
                Some(c) => c,
                None => continue,
            };

            if let Some(found) = c.named_content.get(name) {
                return Some(*found);
            }

            queue.extend(c.content.iter().copied());
            queue.extend(c.get_named_only_content().into_iter().map(|(_, id)| id));
        }

        None
    }

    /// Expresses `global_path` relative to the node `from`, or returns it
    /// unchanged when they share no leading component.
    pub fn convert_path_to_relative(&self, from: ObjectId, global_path: &Path) -> Path {
        let own_path = self.get_path(from);

        let shared = own_path
            .get_components()
            .iter()
            .zip(global_path.get_components())
            .take_while(|(own, other)| own == other)
            .count();

        if shared == 0 {
            return global_path.clone();
        }

        let upward_moves = own_path.len() - shared;
        let mut comps: Vec<Component> = vec![Component::to_parent(); upward_moves];
        comps.extend_from_slice(&global_path.get_components()[shared..]);

        Path::new(&comps, true)
    }

    /// Shortest string that resolves to `other_path` from `from`.
    pub fn compact_path_string(&self, from: ObjectId, other_path: &Path) -> String {
        let (relative, global) = if other_path.is_relative() {
            (
                other_path.get_components_string(),
                self.get_path(from)
                    .path_by_appending_path(other_path)
                    .get_components_string(),
            )
        } else {
            (
                self.convert_path_to_relative(from, other_path)
                    .get_components_string(),
                other_path.get_components_string(),
            )
        };

        if relative.len() < global.len() {
            relative
        } else {
            global
        }
    }

    /// Pointer for an absolute path: into the parent container when the last
    /// component is an index, otherwise at the container itself (index -1).
    pub fn pointer_at_path(&self, path: &Path) -> Result<Pointer, StoryError> {
        if path.is_empty() {
            return Ok(pointer::NULL);
        }

        let (result, path_length_to_use, index) = match path.get_last_component() {
            Some(Component::Index(index)) => {
                let len = path.len() - 1;
                (self.content_at_path(self.root(), path, 0, Some(len)), len, *index as i32)
            }
            _ => (self.content_at_path(self.root(), path, 0, None), path.len(), -1),
        };

        if result.obj == self.root() && path_length_to_use > 0 && result.approximate {
            return Err(StoryError::InvalidStoryState(format!(
                "Failed to find content at path '{path}', and no approximation of it was possible."
            )));
        }

        if result.approximate {
            tracing::warn!(
                "Failed to find content at path '{}', so it was approximated to: '{}'.",
                path,
                self.get_path(result.obj)
            );
        }

        Ok(Pointer::new(result.container(self), index))
    }

    /// Named container directly under the root, i.e. a knot or function.
    pub fn knot_container_with_name(&self, name: &str) -> Option<ObjectId> {
        let id = *self.get_container(self.root())?.named_content.get(name)?;
        self.get_container(id).map(|_| id)
    }

    pub fn build_string_of_hierarchy(
        &self,
        container: ObjectId,
        sb: &mut String,
        indentation: usize,
        pointed_obj: Option<ObjectId>,
    ) {
        let c = match self.get_container(container) {
            Some(c) => c,
            None => return,
        };

        append_indentation(sb, indentation);
        sb.push('[');

        if c.has_valid_name() {
            sb.push_str(&format!(" ({})", c.name.as_deref().unwrap_or_default()));
        }

        if pointed_obj == Some(container) {
            sb.push_str("  <---");
        }

        sb.push('\n');

        for (i, child) in c.content.iter().enumerate() {
            match self.get(*child) {
                RTObject::Container(_) => {
                    self.build_string_of_hierarchy(*child, sb, indentation + 1, pointed_obj);
                }
                other => {
                    append_indentation(sb, indentation + 1);
                    sb.push_str(&other.to_string());
                }
            }

            if i != c.content.len() - 1 {
                sb.push(',');
            }

            if pointed_obj == Some(*child) && self.get_container(*child).is_none() {
                sb.push_str("  <---");
            }

            sb.push('\n');
        }

        let named_only = c.get_named_only_content();

        if !named_only.is_empty() {
            append_indentation(sb, indentation + 1);
            sb.push_str("-- named: --\n");

            for (_, id) in named_only {
                self.build_string_of_hierarchy(id, sb, indentation + 1, pointed_obj);
                sb.push('\n');
            }
        }

        append_indentation(sb, indentation);
        sb.push(']');
    }
}

fn append_indentation(sb: &mut String, indentation: usize) {
    const SPACES_PER_INDENT: usize = 4;
    sb.push_str(&" ".repeat(SPACES_PER_INDENT * indentation));
}
