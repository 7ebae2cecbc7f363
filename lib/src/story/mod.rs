//! [`Story`] is the entry point to load and run a compiled ink story.
use crate::{
    list_definitions_origin::ListDefinitionsOrigin,
    object::{ContentGraph, ObjectId},
    story::{
        errors::ErrorHandler, external_functions::ExternalFunctionDef,
        variable_observer::VariableObserver,
    },
    story_state::StoryState,
};
use std::{cell::RefCell, collections::HashMap, rc::Rc};

/// The current version of the ink story file format.
pub const INK_VERSION_CURRENT: i32 = 21;
/// The oldest story file format that can still be loaded.
pub const INK_VERSION_MINIMUM_COMPATIBLE: i32 = 18;

#[derive(PartialEq, Debug)]
pub(crate) enum OutputStateChange {
    NoChange,
    ExtendedBeyondNewline,
    NewlineRemoved,
}

/// A loaded story plus the session that is playing it.
///
/// The compiled content is shared and never changes; everything that moves
/// while playing lives in the [`StoryState`].
pub struct Story {
    graph: Rc<ContentGraph>,
    state: StoryState,
    list_definitions: Rc<ListDefinitionsOrigin>,
    recursive_continue_count: usize,
    async_continue_active: bool,
    prev_containers: Vec<ObjectId>,
    pub(crate) on_error: Option<Rc<RefCell<dyn ErrorHandler>>>,
    pub(crate) state_snapshot_at_last_new_line: Option<StoryState>,
    pub(crate) variable_observers: HashMap<String, Vec<Rc<RefCell<dyn VariableObserver>>>>,
    pub(crate) has_validated_externals: bool,
    pub(crate) allow_external_function_fallbacks: bool,
    pub(crate) saw_lookahead_unsafe_function_after_new_line: bool,
    pub(crate) externals: HashMap<String, ExternalFunctionDef>,
}

mod misc {
    use crate::{
        json_read,
        object::RTObject,
        story::{Story, INK_VERSION_CURRENT},
        story_error::StoryError,
        story_state::StoryState,
        value_type::ValueType,
    };
    use rand::{rngs::StdRng, Rng, SeedableRng};
    use std::{collections::HashMap, rc::Rc};

    impl Story {
        /// Constructs a `Story` out of the JSON produced by the ink compiler.
        pub fn new(json_string: &str) -> Result<Self, StoryError> {
            let (version, graph, list_definitions) = json_read::load_from_string(json_string)?;

            let graph = Rc::new(graph);
            let list_definitions = Rc::new(list_definitions);

            let mut story = Story {
                state: StoryState::new(graph.clone(), list_definitions.clone()),
                graph,
                list_definitions,
                recursive_continue_count: 0,
                async_continue_active: false,
                prev_containers: Vec::new(),
                on_error: None,
                state_snapshot_at_last_new_line: None,
                variable_observers: HashMap::new(),
                has_validated_externals: false,
                allow_external_function_fallbacks: false,
                saw_lookahead_unsafe_function_after_new_line: false,
                externals: HashMap::new(),
            };

            if version != INK_VERSION_CURRENT {
                tracing::warn!(
                    "Version of ink used to build story ({}) doesn't match current version ({}) of engine. Non-critical, but recommend synchronising.",
                    version,
                    INK_VERSION_CURRENT
                );
            }

            story.reset_globals()?;

            tracing::debug!(nodes = story.graph.len(), "story loaded");

            Ok(story)
        }

        /// Renders the whole content tree, marking the current position
        /// with `<---`.
        pub fn build_string_of_hierarchy(&self) -> String {
            let mut sb = String::new();

            let cp = self.get_state().get_current_pointer().resolve(&self.graph);

            self.graph
                .build_string_of_hierarchy(self.graph.root(), &mut sb, 0, cp);

            sb
        }

        pub(crate) fn is_truthy(&self, obj: &RTObject) -> Result<bool, StoryError> {
            match obj {
                RTObject::Value(ValueType::DivertTarget(target_path)) => {
                    Err(StoryError::InvalidStoryState(format!("Shouldn't use a divert target (to {}) as a conditional value. Did you intend a function call 'likeThis()' or a read count check 'likeThis'? (no arrows)", target_path)))
                }
                RTObject::Value(val) => val.is_truthy(),
                _ => Ok(false),
            }
        }

        /// Picks the element of a shuffle sequence to show this time. The
        /// shuffle is the same every time the sequence comes round, until it
        /// has gone through all its elements.
        pub(crate) fn next_sequence_shuffle_index(&mut self) -> Result<i32, StoryError> {
            let num_elements = match self.get_state_mut().pop_evaluation_stack()? {
                RTObject::Value(ValueType::Int(v)) => v,
                _ => {
                    return Err(StoryError::InvalidStoryState(
                        "Expected number of elements in sequence for shuffle index".to_owned(),
                    ))
                }
            };

            let seq_container = self
                .get_state()
                .get_current_pointer()
                .container
                .ok_or_else(|| {
                    StoryError::InvalidStoryState("Shuffle index outside of a container".to_owned())
                })?;

            let seq_count = match self.get_state_mut().pop_evaluation_stack()? {
                RTObject::Value(ValueType::Int(v)) => v,
                _ => {
                    return Err(StoryError::InvalidStoryState(
                        "Expected sequence count value for shuffle index".to_owned(),
                    ))
                }
            };

            if num_elements <= 0 {
                return Err(StoryError::InvalidStoryState(
                    "Shuffle sequence without elements".to_owned(),
                ));
            }

            let loop_index = seq_count / num_elements;
            let iteration_index = seq_count % num_elements;

            // Same shuffle for the same container, loop and seed
            let seq_path_str = self.graph.get_path(seq_container).to_string();
            let sequence_hash: i32 = seq_path_str.chars().map(|c| c as i32).sum();
            let random_seed = sequence_hash
                .wrapping_add(loop_index)
                .wrapping_add(self.get_state().story_seed);

            let mut rng = StdRng::seed_from_u64(random_seed as u64);

            let mut unpicked_indices: Vec<i32> = (0..num_elements).collect();

            for i in 0..=iteration_index {
                let chosen = rng.gen_range(0..unpicked_indices.len());
                let chosen_index = unpicked_indices.remove(chosen);

                if i == iteration_index {
                    return Ok(chosen_index);
                }
            }

            Err(StoryError::InvalidStoryState(
                "Should never reach here".to_owned(),
            ))
        }
    }
}

mod choices;
mod control_logic;
pub mod errors;
pub mod external_functions;
mod flow;
mod navigation;
mod progress;
mod state;
mod tags;
pub mod variable_observer;
