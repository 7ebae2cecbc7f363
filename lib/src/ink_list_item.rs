use std::fmt;

/// A single item of an ink list, identified by the list definition it comes
/// from (its origin) and its own name.
#[derive(Debug, PartialEq, Eq, Hash, Clone, PartialOrd, Ord)]
pub struct InkListItem {
    origin_name: Option<String>,
    item_name: String,
}

impl InkListItem {
    pub fn new(origin_name: Option<String>, item_name: String) -> Self {
        Self {
            origin_name,
            item_name,
        }
    }

    /// Parses `Origin.item`. A name without a dot has no origin.
    pub fn from_full_name(full_name: &str) -> Self {
        match full_name.split_once('.') {
            Some((origin, item)) => Self::new(Some(origin.to_string()), item.to_string()),
            None => Self::new(None, full_name.to_string()),
        }
    }

    pub fn get_null() -> Self {
        Self::new(None, String::new())
    }

    pub fn get_origin_name(&self) -> Option<&str> {
        self.origin_name.as_deref()
    }

    pub fn get_item_name(&self) -> &str {
        &self.item_name
    }

    pub fn get_full_name(&self) -> String {
        format!(
            "{}.{}",
            self.origin_name.as_deref().unwrap_or("?"),
            self.item_name
        )
    }

    pub fn is_null(&self) -> bool {
        self.origin_name.is_none() && self.item_name.is_empty()
    }
}

impl fmt::Display for InkListItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.get_full_name())
    }
}
