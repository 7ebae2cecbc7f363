use std::{
    collections::{HashMap, HashSet},
    rc::Rc,
};

use crate::{
    ink_list::InkList, list_definition::ListDefinition, story_error::StoryError,
    value_type::ValueType,
};

/// All the list definitions of a story, plus a cache of ready made single
/// item lists addressable by `item` or `Definition.item`.
#[derive(Clone, Debug, Default)]
pub struct ListDefinitionsOrigin {
    lists: HashMap<String, Rc<ListDefinition>>,
    single_item_lists: HashMap<String, ValueType>,
    ambiguous_names: HashSet<String>,
}

impl ListDefinitionsOrigin {
    pub fn new(lists: Vec<ListDefinition>) -> Self {
        let mut origin = ListDefinitionsOrigin::default();

        for list in lists {
            let list = Rc::new(list);

            for (item, value) in list.get_items() {
                let mut l = InkList::from_single_element(item.clone(), value);
                l.origins.push(list.clone());
                let list_value = ValueType::List(l);

                let bare_name = item.get_item_name().to_string();
                if origin.single_item_lists.contains_key(&bare_name) {
                    origin.ambiguous_names.insert(bare_name.clone());
                }

                origin
                    .single_item_lists
                    .insert(bare_name, list_value.clone());
                origin
                    .single_item_lists
                    .insert(item.get_full_name(), list_value);
            }

            origin.lists.insert(list.get_name().to_string(), list);
        }

        origin
    }

    pub fn get_list_definition(&self, name: &str) -> Option<Rc<ListDefinition>> {
        self.lists.get(name).cloned()
    }

    pub fn get_lists(&self) -> impl Iterator<Item = &Rc<ListDefinition>> {
        self.lists.values()
    }

    /// Single item list for `name`, which may be bare or qualified. A bare
    /// name defined by more than one list is an error.
    pub fn find_single_item_list_with_name(
        &self,
        name: &str,
    ) -> Result<Option<&ValueType>, StoryError> {
        if self.ambiguous_names.contains(name) {
            return Err(StoryError::ListOrigin(format!(
                "'{name}' is defined in more than one list, use the qualified Definition.item form"
            )));
        }

        Ok(self.single_item_lists.get(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_names_resolve_unless_ambiguous() {
        let mut a = HashMap::new();
        a.insert("x".to_string(), 1);
        a.insert("only_a".to_string(), 2);
        let mut b = HashMap::new();
        b.insert("x".to_string(), 1);

        let origin = ListDefinitionsOrigin::new(vec![
            ListDefinition::new("A".to_string(), a),
            ListDefinition::new("B".to_string(), b),
        ]);

        assert!(matches!(
            origin.find_single_item_list_with_name("x"),
            Err(StoryError::ListOrigin(_))
        ));
        assert!(origin
            .find_single_item_list_with_name("A.x")
            .unwrap()
            .is_some());
        assert!(origin
            .find_single_item_list_with_name("only_a")
            .unwrap()
            .is_some());
        assert!(origin
            .find_single_item_list_with_name("missing")
            .unwrap()
            .is_none());
    }
}
