use strum::{Display, EnumString, IntoStaticStr};

/// Instructions for the virtual machine that are not values, diverts or
/// variable accesses. The serialized name is what appears in compiled
/// stories and in saved output streams.
#[derive(Debug, PartialEq, Eq, Clone, Copy, EnumString, IntoStaticStr, Display)]
pub enum CommandType {
    #[strum(serialize = "ev")]
    EvalStart,
    #[strum(serialize = "out")]
    EvalOutput,
    #[strum(serialize = "/ev")]
    EvalEnd,
    #[strum(serialize = "du")]
    Duplicate,
    #[strum(serialize = "pop")]
    PopEvaluatedValue,
    #[strum(serialize = "~ret")]
    PopFunction,
    #[strum(serialize = "->->")]
    PopTunnel,
    #[strum(serialize = "str")]
    BeginString,
    #[strum(serialize = "/str")]
    EndString,
    #[strum(serialize = "nop")]
    NoOp,
    #[strum(serialize = "choiceCnt")]
    ChoiceCount,
    #[strum(serialize = "turn")]
    Turns,
    #[strum(serialize = "turns")]
    TurnsSince,
    #[strum(serialize = "readc")]
    ReadCount,
    #[strum(serialize = "rnd")]
    Random,
    #[strum(serialize = "srnd")]
    SeedRandom,
    #[strum(serialize = "visit")]
    VisitIndex,
    #[strum(serialize = "seq")]
    SequenceShuffleIndex,
    #[strum(serialize = "thread")]
    StartThread,
    #[strum(serialize = "done")]
    Done,
    #[strum(serialize = "end")]
    End,
    #[strum(serialize = "listInt")]
    ListFromInt,
    #[strum(serialize = "range")]
    ListRange,
    #[strum(serialize = "lrnd")]
    ListRandom,
    #[strum(serialize = "#")]
    BeginTag,
    #[strum(serialize = "/#")]
    EndTag,
}

impl CommandType {
    pub fn new_from_name(name: &str) -> Option<CommandType> {
        name.parse().ok()
    }

    pub fn get_name(&self) -> &'static str {
        self.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_match_compiled_format() {
        assert_eq!(CommandType::new_from_name("ev"), Some(CommandType::EvalStart));
        assert_eq!(CommandType::new_from_name("->->"), Some(CommandType::PopTunnel));
        assert_eq!(CommandType::new_from_name("/#"), Some(CommandType::EndTag));
        assert_eq!(CommandType::SequenceShuffleIndex.get_name(), "seq");
        assert_eq!(CommandType::new_from_name("^hello"), None);
    }
}
