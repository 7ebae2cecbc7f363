use std::collections::HashMap;

use crate::ink_list_item::InkListItem;

/// The compile time definition of an ink list: a name plus the rank of each
/// item that can be drawn from it.
#[derive(Clone, Debug)]
pub struct ListDefinition {
    name: String,
    item_name_to_values: HashMap<String, i32>,
}

impl ListDefinition {
    pub fn new(name: String, items: HashMap<String, i32>) -> Self {
        Self {
            name,
            item_name_to_values: items,
        }
    }

    pub fn get_name(&self) -> &str {
        &self.name
    }

    /// Every item of the definition, qualified with this definition's name.
    pub fn get_items(&self) -> impl Iterator<Item = (InkListItem, i32)> + '_ {
        self.item_name_to_values.iter().map(|(item_name, value)| {
            (
                InkListItem::new(Some(self.name.clone()), item_name.clone()),
                *value,
            )
        })
    }

    pub fn get_value_for_item(&self, item: &InkListItem) -> Option<i32> {
        self.item_name_to_values.get(item.get_item_name()).copied()
    }

    pub fn contains_item(&self, item: &InkListItem) -> bool {
        item.get_origin_name() == Some(self.name.as_str())
            && self.item_name_to_values.contains_key(item.get_item_name())
    }

    pub fn contains_item_with_name(&self, item_name: &str) -> bool {
        self.item_name_to_values.contains_key(item_name)
    }

    pub fn get_item_with_value(&self, val: i32) -> Option<InkListItem> {
        self.item_name_to_values
            .iter()
            .find(|(_, value)| **value == val)
            .map(|(item_name, _)| InkListItem::new(Some(self.name.clone()), item_name.clone()))
    }

    pub fn len(&self) -> usize {
        self.item_name_to_values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.item_name_to_values.is_empty()
    }
}
