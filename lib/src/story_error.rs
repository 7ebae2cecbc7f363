//! Errors raised while loading or running a [`Story`](crate::story::Story).
use core::fmt;

/// The kind of document whose format version was checked on load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Document {
    /// A compiled `.ink.json` story.
    Story,
    /// A state saved with [`Story::save_state`](crate::story::Story::save_state).
    Save,
}

/// Error raised by the runtime. Most of them mean there's a problem with the
/// ink content or with how the host drives the story, not with the engine.
#[derive(Debug)]
pub enum StoryError {
    /// Content or host calls left the story in a state it can't continue from.
    InvalidStoryState(String),
    /// A compiled story or save document is malformed.
    BadJson(String),
    /// A host call got an argument out of range or of the wrong type.
    BadArgument(String),
    /// A story or save document was written by an unsupported format version.
    IncompatibleVersion {
        document: Document,
        found: i64,
        minimum: i32,
        current: i32,
    },
    /// A native operator was called with the wrong number of operands.
    WrongArity {
        operator: String,
        expected: usize,
        found: usize,
    },
    /// A list item whose name can't be tied to exactly one list definition.
    ListOrigin(String),
}

impl StoryError {
    /// The message without its category prefix, as reported to error handlers.
    pub(crate) fn get_message(&self) -> String {
        match self {
            StoryError::InvalidStoryState(msg)
            | StoryError::BadJson(msg)
            | StoryError::BadArgument(msg)
            | StoryError::ListOrigin(msg) => msg.clone(),
            StoryError::IncompatibleVersion {
                document: Document::Story,
                found,
                minimum,
                current,
            } => {
                if *found > *current as i64 {
                    format!("Story was compiled with ink version {found}, newer than the {current} this engine supports")
                } else {
                    format!("Story was compiled with ink version {found}, older than the minimum {minimum} this engine loads")
                }
            }
            StoryError::IncompatibleVersion {
                document: Document::Save,
                found,
                minimum,
                ..
            } => format!("Save format version {found} is older than the minimum {minimum} this engine loads"),
            StoryError::WrongArity {
                operator,
                expected,
                found,
            } => format!("Operator '{operator}' takes {expected} operand(s) but was given {found}"),
        }
    }
}

impl std::error::Error for StoryError {}

impl fmt::Display for StoryError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let category = match self {
            StoryError::InvalidStoryState(_) | StoryError::WrongArity { .. } => "Invalid story state",
            StoryError::BadJson(_) => "Error parsing JSON",
            StoryError::BadArgument(_) => "Bad argument",
            StoryError::IncompatibleVersion { .. } => "Incompatible version",
            StoryError::ListOrigin(_) => "List origin",
        };

        write!(f, "{category}: {}", self.get_message())
    }
}

impl From<serde_json::Error> for StoryError {
    fn from(err: serde_json::Error) -> StoryError {
        StoryError::BadJson(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_errors_say_which_way_they_are_off() {
        let newer = StoryError::IncompatibleVersion {
            document: Document::Story,
            found: 22,
            minimum: 18,
            current: 21,
        };
        let older = StoryError::IncompatibleVersion {
            document: Document::Story,
            found: 17,
            minimum: 18,
            current: 21,
        };

        assert!(newer.to_string().contains("newer than the 21"));
        assert!(older.to_string().contains("older than the minimum 18"));
        assert!(older.to_string().starts_with("Incompatible version: "));
    }

    #[test]
    fn arity_message_names_the_operator() {
        let err = StoryError::WrongArity {
            operator: "+".to_owned(),
            expected: 2,
            found: 1,
        };

        assert_eq!("Operator '+' takes 2 operand(s) but was given 1", err.get_message());
        assert!(err.to_string().starts_with("Invalid story state: "));
    }
}
