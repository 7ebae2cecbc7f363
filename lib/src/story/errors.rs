use std::{cell::RefCell, rc::Rc};

use crate::story::Story;

/// Defines the method that will be called when an error occurs while executing
/// the story.
pub trait ErrorHandler {
    fn error(&mut self, message: &str, error_type: ErrorType);
}

/// Types of errors an Ink story might throw.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ErrorType {
    /// Problem that is not critical, but should be fixed.
    Warning,
    /// Critical error that can't be recovered from.
    Error,
}

/// # Errors
/// Methods to check for errors.
impl Story {
    /// Assign the error handler for all runtime errors in ink, i.e. problems
    /// with the source ink itself that are only discovered when playing
    /// the story.
    ///
    /// Without a handler, [`cont`](Story::cont) returns the errors as a
    /// [`StoryError`](crate::story_error::StoryError) instead.
    pub fn set_error_handler(&mut self, err_handler: Rc<RefCell<dyn ErrorHandler>>) {
        self.on_error = Some(err_handler);
    }

    /// Records a runtime error or warning at the current position. Errors
    /// also end the current flow.
    pub(crate) fn add_error(&mut self, message: &str, is_warning: bool) {
        let error_type_str = if is_warning { "WARNING" } else { "ERROR" };

        let m = match self.get_state().get_current_pointer().get_path(&self.graph) {
            Some(path) => format!("RUNTIME {error_type_str}: ({path}): {message}"),
            None => format!("RUNTIME {error_type_str}: {message}"),
        };

        self.get_state_mut().add_error(m, is_warning);

        if !is_warning {
            self.get_state_mut().force_end();
        }
    }

    /// Whether errors were raised and not yet handed to an error handler.
    pub fn has_error(&self) -> bool {
        self.get_state().has_error()
    }

    pub fn has_warning(&self) -> bool {
        self.get_state().has_warning()
    }

    /// Any critical errors generated during evaluation of the `Story`.
    pub fn get_current_errors(&self) -> &[String] {
        self.get_state().get_current_errors()
    }

    /// Any warnings generated during evaluation of the `Story`.
    pub fn get_current_warnings(&self) -> &[String] {
        self.get_state().get_current_warnings()
    }
}
