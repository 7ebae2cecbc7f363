//! A generated Choice from the story.
use crate::{callstack::Thread, path::Path};

#[derive(Debug, Clone)]
pub struct Choice {
    pub(crate) thread_at_generation: Option<Thread>,
    pub(crate) original_thread_index: usize,
    /// Path to the choice point that generated this choice.
    pub(crate) source_path: String,
    pub(crate) target_path: Path,
    pub(crate) is_invisible_default: bool,
    pub tags: Vec<String>,
    /// Position in the story's current choices when the choice was generated.
    pub index: usize,
    /// The text to present to the player.
    pub text: String,
}

impl Choice {
    pub(crate) fn new(
        target_path: Path,
        source_path: String,
        is_invisible_default: bool,
        tags: Vec<String>,
        thread_at_generation: Thread,
        text: String,
    ) -> Choice {
        Self {
            original_thread_index: thread_at_generation.thread_index,
            thread_at_generation: Some(thread_at_generation),
            target_path,
            source_path,
            is_invisible_default,
            tags,
            index: 0,
            text,
        }
    }

    pub(crate) fn new_from_json(
        path_string_on_choice: &str,
        source_path: String,
        text: &str,
        index: usize,
        original_thread_index: usize,
        tags: Vec<String>,
    ) -> Choice {
        Choice {
            target_path: Path::new_with_components_string(Some(path_string_on_choice)),
            is_invisible_default: false,
            tags,
            index,
            original_thread_index,
            text: text.to_string(),
            thread_at_generation: None,
            source_path,
        }
    }

    /// The path the story continues from when this choice is taken.
    pub fn get_path_string_on_choice(&self) -> String {
        self.target_path.to_string()
    }

    pub fn get_source_path(&self) -> &str {
        &self.source_path
    }

    pub fn is_invisible_default(&self) -> bool {
        self.is_invisible_default
    }
}
