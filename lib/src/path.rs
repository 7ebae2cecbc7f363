use std::{
    cell::OnceCell,
    fmt,
    hash::{Hash, Hasher},
};

const PARENT_ID: &str = "^";

/// An address inside the content graph. Components are either child indices
/// or names, and the special name `^` moves to the parent container.
///
/// A relative path is written with a leading dot, e.g. `.^.^.hello.5`, which is
/// equivalent to the file system path `../../hello/5`.
#[derive(Clone, Default)]
pub struct Path {
    components: Vec<Component>,
    is_relative: bool,
    components_string: OnceCell<String>,
}

impl Path {
    pub fn new(components: &[Component], relative: bool) -> Path {
        Path {
            components: components.to_vec(),
            is_relative: relative,
            ..Default::default()
        }
    }

    pub fn new_with_defaults() -> Path {
        Path::default()
    }

    pub fn new_with_components_string(components_string: Option<&str>) -> Path {
        let cs = match components_string {
            Some(cs) if !cs.is_empty() => cs,
            // Empty path, empty components (path to root, like "/")
            _ => return Path::default(),
        };

        let (is_relative, cs) = match cs.strip_prefix('.') {
            Some(rest) => (true, rest),
            None => (false, cs),
        };

        let components = cs
            .split('.')
            .map(|part| match part.parse::<usize>() {
                Ok(index) => Component::new_i(index),
                Err(_) => Component::new(part),
            })
            .collect();

        Path {
            components,
            is_relative,
            ..Default::default()
        }
    }

    /// The empty relative path, which resolves to the object it is resolved from.
    pub fn get_self() -> Path {
        Path {
            is_relative: true,
            ..Default::default()
        }
    }

    pub fn get_component(&self, index: usize) -> Option<&Component> {
        self.components.get(index)
    }

    pub fn get_components(&self) -> &[Component] {
        &self.components
    }

    pub fn is_relative(&self) -> bool {
        self.is_relative
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    pub fn get_head(&self) -> Option<&Component> {
        self.components.first()
    }

    pub fn get_tail(&self) -> Path {
        if self.components.len() >= 2 {
            Path::new(&self.components[1..], false)
        } else {
            Path::get_self()
        }
    }

    pub fn get_last_component(&self) -> Option<&Component> {
        self.components.last()
    }

    pub fn contains_named_component(&self) -> bool {
        self.components.iter().any(|c| !c.is_index())
    }

    /// Joins a (possibly relative) path onto this one. Leading parent hops of
    /// `path_to_append` consume trailing components of `self`.
    pub fn path_by_appending_path(&self, path_to_append: &Path) -> Path {
        let upward_moves = path_to_append
            .components
            .iter()
            .take_while(|c| c.is_parent())
            .count();

        let kept = self.components.len().saturating_sub(upward_moves);

        let mut components: Vec<Component> = self.components[..kept].to_vec();
        components.extend_from_slice(&path_to_append.components[upward_moves..]);

        Path::new(&components, false)
    }

    pub fn path_by_appending_component(&self, c: Component) -> Path {
        let mut p = Path::new(&self.components, false);
        p.components.push(c);
        p
    }

    pub fn get_components_string(&self) -> String {
        self.components_string
            .get_or_init(|| {
                let joined = self
                    .components
                    .iter()
                    .map(|c| c.to_string())
                    .collect::<Vec<String>>()
                    .join(".");

                if self.is_relative {
                    format!(".{joined}")
                } else {
                    joined
                }
            })
            .clone()
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.get_components_string())
    }
}

impl fmt::Debug for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Path({})", self.get_components_string())
    }
}

impl PartialEq for Path {
    fn eq(&self, other: &Self) -> bool {
        self.is_relative == other.is_relative && self.components == other.components
    }
}

impl Eq for Path {}

impl Hash for Path {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.is_relative.hash(state);
        self.components.hash(state);
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Component {
    Index(usize),
    Name(String),
}

impl Component {
    pub fn new(name: &str) -> Component {
        Component::Name(name.to_string())
    }

    pub fn new_i(index: usize) -> Component {
        Component::Index(index)
    }

    pub fn to_parent() -> Component {
        Component::new(PARENT_ID)
    }

    pub fn is_index(&self) -> bool {
        matches!(self, Component::Index(_))
    }

    pub fn is_parent(&self) -> bool {
        matches!(self, Component::Name(name) if name == PARENT_ID)
    }

    pub fn index(&self) -> Option<usize> {
        match self {
            Component::Index(i) => Some(*i),
            Component::Name(_) => None,
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            Component::Index(_) => None,
            Component::Name(name) => Some(name),
        }
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Component::Index(i) => write!(f, "{i}"),
            Component::Name(name) => write!(f, "{name}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_relative_and_absolute_paths() {
        let p = Path::new_with_components_string(Some(".^.^.hello.5"));
        assert!(p.is_relative());
        assert_eq!(p.len(), 4);
        assert!(p.get_component(0).unwrap().is_parent());
        assert_eq!(p.get_last_component().unwrap().index(), Some(5));
        assert_eq!(p.to_string(), ".^.^.hello.5");

        let p = Path::new_with_components_string(Some("knot.stitch.0"));
        assert!(!p.is_relative());
        assert_eq!(p.get_head().unwrap().name(), Some("knot"));
        assert_eq!(p.get_tail().to_string(), "stitch.0");
    }

    #[test]
    fn empty_string_is_root_path() {
        let p = Path::new_with_components_string(Some(""));
        assert!(p.is_empty());
        assert!(!p.is_relative());
        assert_eq!(p, Path::new_with_defaults());
    }

    #[test]
    fn string_round_trip_is_structural() {
        for s in ["0", "knot.0.c-1", "a.b.c", ".^.s", "global decl.3"] {
            let p = Path::new_with_components_string(Some(s));
            let again = Path::new_with_components_string(Some(&p.to_string()));
            assert_eq!(p, again);
        }
    }

    #[test]
    fn appending_relative_path_consumes_parents() {
        let base = Path::new_with_components_string(Some("knot.stitch.3"));
        let rel = Path::new_with_components_string(Some(".^.^.other.0"));
        let joined = base.path_by_appending_path(&rel);
        assert_eq!(joined.to_string(), "knot.other.0");

        let appended = base.path_by_appending_component(Component::new_i(7));
        assert_eq!(appended.to_string(), "knot.stitch.3.7");
    }

    #[test]
    fn index_and_name_components_differ() {
        assert_ne!(Component::new_i(1), Component::new("1"));
        assert!(Component::to_parent().is_parent());
        assert!(!Component::new("x").is_parent());
    }
}
