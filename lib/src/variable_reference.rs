use crate::path::Path;

/// Reads a variable (`VAR?`) or the visit count of a container (`CNT?`).
#[derive(Debug, Clone)]
pub struct VariableReference {
    pub name: String,
    pub path_for_count: Option<Path>,
}

impl VariableReference {
    pub fn new(name: &str) -> Self {
        VariableReference {
            name: name.to_string(),
            path_for_count: None,
        }
    }

    pub fn from_path_for_count(path_for_count: &str) -> Self {
        VariableReference {
            name: String::new(),
            path_for_count: Some(Path::new_with_components_string(Some(path_for_count))),
        }
    }
}
