use crate::story_error::StoryError;

/// Kind of a call stack frame. The discriminants are the values written to
/// save files.
#[derive(PartialEq, Clone, Copy, Eq, Hash, Debug)]
pub enum PushPopType {
    Tunnel,
    Function,
    FunctionEvaluationFromHost,
    /// The root frame of a thread, which is never popped.
    Plain,
}

impl PushPopType {
    pub(crate) fn from_value(value: usize) -> Result<PushPopType, StoryError> {
        match value {
            0 => Ok(PushPopType::Tunnel),
            1 => Ok(PushPopType::Function),
            2 => Ok(PushPopType::FunctionEvaluationFromHost),
            3 => Ok(PushPopType::Plain),
            _ => Err(StoryError::BadJson(format!(
                "Unexpected PushPopType value: {value}"
            ))),
        }
    }

    pub(crate) fn to_value(self) -> usize {
        match self {
            PushPopType::Tunnel => 0,
            PushPopType::Function => 1,
            PushPopType::FunctionEvaluationFromHost => 2,
            PushPopType::Plain => 3,
        }
    }
}
