//! Ink list values: a set of items drawn from one or more list definitions,
//! each item carrying its integer rank.
use std::{collections::HashMap, fmt, rc::Rc};

use crate::{
    ink_list_item::InkListItem, list_definition::ListDefinition,
    list_definitions_origin::ListDefinitionsOrigin, story_error::StoryError,
};

#[derive(Clone, Debug, Default)]
pub struct InkList {
    pub items: HashMap<InkListItem, i32>,
    pub(crate) origins: Vec<Rc<ListDefinition>>,
    // Keeps the type of a list alive once all its items have been removed.
    origin_names: Option<Vec<String>>,
}

impl InkList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_single_element(item: InkListItem, value: i32) -> Self {
        let mut list = Self::new();
        list.items.insert(item, value);
        list
    }

    /// Creates an empty list typed after the named list definition.
    pub fn from_single_origin_list_name(
        single_origin_list_name: &str,
        list_definitions: &ListDefinitionsOrigin,
    ) -> Result<Self, StoryError> {
        let mut list = Self::new();
        list.set_initial_origin_name(single_origin_list_name, list_definitions)?;
        Ok(list)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub(crate) fn set_initial_origin_name(
        &mut self,
        name: &str,
        list_definitions: &ListDefinitionsOrigin,
    ) -> Result<(), StoryError> {
        let def = list_definitions.get_list_definition(name).ok_or_else(|| {
            StoryError::ListOrigin(format!(
                "No list definition named '{name}' in this story"
            ))
        })?;

        self.origins = vec![def];
        self.origin_names = Some(vec![name.to_string()]);

        Ok(())
    }

    pub(crate) fn set_initial_origin_names(&mut self, names: Option<Vec<String>>) {
        self.origin_names = names;
    }

    /// Names of the definitions this list draws from. Derived from the items
    /// when there are any, otherwise the names remembered for the empty list.
    pub fn get_origin_names(&self) -> Option<Vec<String>> {
        if self.items.is_empty() {
            return self.origin_names.clone();
        }

        let mut names: Vec<String> = Vec::new();
        for item in self.items.keys() {
            if let Some(origin) = item.get_origin_name() {
                if !names.iter().any(|n| n == origin) {
                    names.push(origin.to_string());
                }
            }
        }
        names.sort();

        Some(names)
    }

    /// Looks up the definitions named by [`get_origin_names`](Self::get_origin_names)
    /// and caches them on the list.
    pub(crate) fn resolve_origins(&mut self, list_definitions: &ListDefinitionsOrigin) {
        if let Some(names) = self.get_origin_names() {
            self.origins.clear();

            for name in names.iter() {
                if let Some(def) = list_definitions.get_list_definition(name) {
                    if !self.origins.iter().any(|o| Rc::ptr_eq(o, &def)) {
                        self.origins.push(def);
                    }
                }
            }

            if self.items.is_empty() {
                self.origin_names = Some(names);
            }
        }
    }

    pub fn get_origin_of_max_item(&self) -> Option<Rc<ListDefinition>> {
        let (max, _) = self.get_max_item();
        let origin_name = max?.get_origin_name()?.to_string();

        self.origins
            .iter()
            .find(|o| o.get_name() == origin_name)
            .cloned()
    }

    /// Adds an item whose definition is already known to this list.
    pub fn add_item(&mut self, item: &InkListItem) -> Result<(), StoryError> {
        let origin_name = match item.get_origin_name() {
            Some(origin_name) => origin_name,
            None => return self.add_item_by_name(item.get_item_name()),
        };

        match self.origins.iter().find(|o| o.get_name() == origin_name) {
            Some(origin) => match origin.get_value_for_item(item) {
                Some(value) => {
                    self.items.insert(item.clone(), value);
                    Ok(())
                }
                None => Err(StoryError::ListOrigin(format!(
                    "'{item}' is not an item of list '{origin_name}'"
                ))),
            },
            None => Err(StoryError::ListOrigin(format!(
                "'{item}' comes from list '{origin_name}', which this list has no origin for"
            ))),
        }
    }

    pub fn add_item_by_name(&mut self, item_name: &str) -> Result<(), StoryError> {
        let mut found: Option<&Rc<ListDefinition>> = None;

        for origin in self.origins.iter() {
            if origin.contains_item_with_name(item_name) {
                if let Some(previous) = found {
                    return Err(StoryError::ListOrigin(format!(
                        "'{item_name}' could come from either '{}' or '{}'",
                        origin.get_name(),
                        previous.get_name()
                    )));
                }
                found = Some(origin);
            }
        }

        let def = found.ok_or_else(|| {
            StoryError::ListOrigin(format!(
                "'{item_name}' is not an item of any list this list has an origin for"
            ))
        })?;

        let item = InkListItem::new(Some(def.get_name().to_string()), item_name.to_string());
        let value = def.get_value_for_item(&item).unwrap_or(0);
        self.items.insert(item, value);

        Ok(())
    }

    pub fn contains_item_named(&self, item_name: &str) -> bool {
        self.items.keys().any(|i| i.get_item_name() == item_name)
    }

    /// Items sorted by rank, ties broken by origin name.
    pub fn get_ordered_items(&self) -> Vec<(&InkListItem, i32)> {
        let mut ordered: Vec<(&InkListItem, i32)> =
            self.items.iter().map(|(k, v)| (k, *v)).collect();

        ordered.sort_by(|a, b| {
            a.1.cmp(&b.1)
                .then_with(|| a.0.get_origin_name().cmp(&b.0.get_origin_name()))
                .then_with(|| a.0.get_item_name().cmp(b.0.get_item_name()))
        });

        ordered
    }

    pub fn get_max_item(&self) -> (Option<&InkListItem>, i32) {
        let mut max: (Option<&InkListItem>, i32) = (None, 0);

        for (item, value) in self.get_ordered_items() {
            if max.0.is_none() || value > max.1 {
                max = (Some(item), value);
            }
        }

        max
    }

    pub fn get_min_item(&self) -> (Option<&InkListItem>, i32) {
        let mut min: (Option<&InkListItem>, i32) = (None, 0);

        for (item, value) in self.get_ordered_items() {
            if min.0.is_none() || value < min.1 {
                min = (Some(item), value);
            }
        }

        min
    }

    /// Every item from this list's definitions that is not in the list.
    pub fn inverse(&self) -> InkList {
        let mut list = InkList::new();

        for origin in self.origins.iter() {
            for (item, value) in origin.get_items() {
                if !self.items.contains_key(&item) {
                    list.items.insert(item, value);
                }
            }
        }

        list.origins = self.origins.clone();
        list.origin_names = self.get_origin_names();

        list
    }

    /// Every item from this list's definitions.
    pub fn get_all(&self) -> InkList {
        let mut list = InkList::new();

        for origin in self.origins.iter() {
            for (item, value) in origin.get_items() {
                list.items.insert(item, value);
            }
        }

        list.origins = self.origins.clone();
        list.origin_names = self.get_origin_names();

        list
    }

    pub fn union(&self, other: &InkList) -> InkList {
        let mut union = self.clone();

        for (item, value) in other.items.iter() {
            union.items.insert(item.clone(), *value);
        }

        for origin in other.origins.iter() {
            if !union.origins.iter().any(|o| Rc::ptr_eq(o, origin)) {
                union.origins.push(origin.clone());
            }
        }

        union
    }

    pub fn intersect(&self, other: &InkList) -> InkList {
        let mut intersection = InkList::new();

        for (item, value) in self.items.iter() {
            if other.items.contains_key(item) {
                intersection.items.insert(item.clone(), *value);
            }
        }

        intersection
    }

    pub fn without(&self, to_remove: &InkList) -> InkList {
        let mut result = self.clone();

        for item in to_remove.items.keys() {
            result.items.remove(item);
        }

        result.origin_names = self.get_origin_names();

        result
    }

    /// True when every item of `other` is in this list. An empty list only
    /// contains another empty list.
    pub fn contains(&self, other: &InkList) -> bool {
        if other.items.is_empty() {
            return self.items.is_empty();
        }

        if self.items.is_empty() {
            return false;
        }

        other.items.keys().all(|k| self.items.contains_key(k))
    }

    pub fn greater_than(&self, other: &InkList) -> bool {
        if self.items.is_empty() {
            return false;
        }
        if other.items.is_empty() {
            return true;
        }

        self.get_min_item().1 > other.get_max_item().1
    }

    pub fn greater_than_or_equals(&self, other: &InkList) -> bool {
        if self.items.is_empty() {
            return false;
        }
        if other.items.is_empty() {
            return true;
        }

        self.get_min_item().1 >= other.get_min_item().1
            && self.get_max_item().1 >= other.get_max_item().1
    }

    pub fn less_than(&self, other: &InkList) -> bool {
        if other.items.is_empty() {
            return false;
        }
        if self.items.is_empty() {
            return true;
        }

        self.get_max_item().1 < other.get_min_item().1
    }

    pub fn less_than_or_equals(&self, other: &InkList) -> bool {
        if other.items.is_empty() {
            return false;
        }
        if self.items.is_empty() {
            return true;
        }

        self.get_max_item().1 <= other.get_max_item().1
            && self.get_min_item().1 <= other.get_min_item().1
    }

    pub fn max_as_list(&self) -> InkList {
        match self.get_max_item() {
            (Some(item), value) => InkList::from_single_element(item.clone(), value),
            (None, _) => InkList::new(),
        }
    }

    pub fn min_as_list(&self) -> InkList {
        match self.get_min_item() {
            (Some(item), value) => InkList::from_single_element(item.clone(), value),
            (None, _) => InkList::new(),
        }
    }

    /// Items whose rank lies within `[min_value, max_value]`.
    pub fn list_with_sub_range(&self, min_value: i32, max_value: i32) -> InkList {
        let mut sub_list = InkList::new();

        if self.items.is_empty() {
            return sub_list;
        }

        sub_list.set_initial_origin_names(self.get_origin_names());
        sub_list.origins = self.origins.clone();

        for (item, value) in self.get_ordered_items() {
            if value >= min_value && value <= max_value {
                sub_list.items.insert(item.clone(), value);
            }
        }

        sub_list
    }
}

impl PartialEq for InkList {
    fn eq(&self, other: &Self) -> bool {
        self.items.len() == other.items.len()
            && self.items.keys().all(|k| other.items.contains_key(k))
    }
}

impl fmt::Display for InkList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self
            .get_ordered_items()
            .into_iter()
            .map(|(item, _)| item.get_item_name())
            .collect();

        write!(f, "{}", names.join(", "))
    }
}
