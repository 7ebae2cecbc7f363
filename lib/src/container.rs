use std::collections::HashMap;

use crate::object::ObjectId;

pub const COUNTFLAGS_VISITS: i32 = 1;
pub const COUNTFLAGS_TURNS: i32 = 2;
pub const COUNTFLAGS_COUNTSTARTONLY: i32 = 4;

/// A node of the content graph that owns an ordered list of children, plus
/// a name lookup for named children. Named-only children (not reachable by
/// index) are kept in `named_content` alone.
#[derive(Debug, Clone, Default)]
pub struct Container {
    pub name: Option<String>,
    pub content: Vec<ObjectId>,
    pub named_content: HashMap<String, ObjectId>,
    pub visits_should_be_counted: bool,
    pub turn_index_should_be_counted: bool,
    pub counting_at_start_only: bool,
}

impl Container {
    pub fn new(name: Option<String>, count_flags: i32) -> Container {
        let mut container = Container {
            name,
            ..Default::default()
        };
        container.set_count_flags(count_flags);
        container
    }

    pub fn has_valid_name(&self) -> bool {
        matches!(&self.name, Some(name) if !name.is_empty())
    }

    pub fn get_count_flags(&self) -> i32 {
        let mut flags = 0;

        if self.visits_should_be_counted {
            flags |= COUNTFLAGS_VISITS;
        }

        if self.turn_index_should_be_counted {
            flags |= COUNTFLAGS_TURNS;
        }

        if self.counting_at_start_only {
            flags |= COUNTFLAGS_COUNTSTARTONLY;
        }

        // "start only" is meaningless without one of the counts
        if flags == COUNTFLAGS_COUNTSTARTONLY {
            flags = 0;
        }

        flags
    }

    pub fn set_count_flags(&mut self, flags: i32) {
        self.visits_should_be_counted = flags & COUNTFLAGS_VISITS > 0;
        self.turn_index_should_be_counted = flags & COUNTFLAGS_TURNS > 0;
        self.counting_at_start_only = flags & COUNTFLAGS_COUNTSTARTONLY > 0;
    }

    /// Named children that are not also part of the ordered content.
    pub fn get_named_only_content(&self) -> Vec<(&String, ObjectId)> {
        let mut named_only: Vec<(&String, ObjectId)> = self
            .named_content
            .iter()
            .filter(|(_, id)| !self.content.contains(id))
            .map(|(name, id)| (name, *id))
            .collect();

        named_only.sort_by(|a, b| a.0.cmp(b.0));
        named_only
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn count_flags_round_trip() {
        let c = Container::new(None, COUNTFLAGS_VISITS | COUNTFLAGS_COUNTSTARTONLY);
        assert!(c.visits_should_be_counted);
        assert!(!c.turn_index_should_be_counted);
        assert!(c.counting_at_start_only);
        assert_eq!(c.get_count_flags(), 5);

        let start_only = Container::new(None, COUNTFLAGS_COUNTSTARTONLY);
        assert_eq!(start_only.get_count_flags(), 0);
    }

    #[test]
    fn names() {
        assert!(!Container::new(None, 0).has_valid_name());
        assert!(!Container::new(Some(String::new()), 0).has_valid_name());
        assert!(Container::new(Some("knot".to_string()), 0).has_valid_name());
    }
}
