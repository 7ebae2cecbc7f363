//! Runtime for [ink](https://github.com/inkle/ink), inkle's scripting language
//! for interactive narrative.
//!
//! Load the JSON produced by the ink compiler into a [`Story`](story::Story),
//! then alternate between [`cont`](story::Story::cont) to get the next line
//! of text and [`choose_choice_index`](story::Story::choose_choice_index)
//! when the story offers choices. The state of a play-through can be saved
//! to JSON and loaded back at any time.
//!
//! ```no_run
//! # use inkrt::{story::Story, story_error::StoryError};
//! # fn main() -> Result<(), StoryError> {
//! let json = std::fs::read_to_string("story.ink.json").unwrap();
//! let mut story = Story::new(&json)?;
//!
//! while story.can_continue() {
//!     print!("{}", story.cont()?);
//! }
//!
//! if !story.get_current_choices().is_empty() {
//!     story.choose_choice_index(0)?;
//! }
//! # Ok(())
//! # }
//! ```

mod callstack;
pub mod choice;
mod choice_point;
mod container;
mod control_command;
mod divert;
mod flow;
pub mod ink_list;
pub mod ink_list_item;
mod json_read;
mod json_write;
mod list_definition;
mod list_definitions_origin;
mod native_function_call;
pub mod object;
pub mod path;
pub mod pointer;
mod push_pop;
mod search_result;
mod state_patch;
pub mod story;
pub mod story_error;
pub mod story_state;
mod tag;
mod value;
pub mod value_type;
mod variable_assigment;
mod variable_reference;
pub mod variables_state;
