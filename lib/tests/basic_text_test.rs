use inkrt::{
    story::Story,
    story_error::{Document, StoryError},
};

mod common;

const ONELINE: &str = r##"{"inkVersion":21,"root":[["^Line.","\n",["done",{"#n":"g-0"}],null],"done",null],"listDefs":{}}"##;

#[test]
fn oneline_test() -> Result<(), StoryError> {
    let mut story = Story::new(ONELINE)?;

    assert!(story.can_continue());
    assert_eq!("Line.\n", story.cont()?);
    assert!(!story.can_continue());
    assert!(common::is_ended(&story));

    Ok(())
}

#[test]
fn two_lines_test() -> Result<(), StoryError> {
    let json = r##"{"inkVersion":21,"root":[["^Line.","\n","^Second line.","\n",["done",{"#n":"g-0"}],null],"done",null],"listDefs":{}}"##;
    let mut story = Story::new(json)?;

    assert_eq!("Line.\n", story.cont()?);
    assert_eq!("Second line.\n", story.cont()?);
    assert!(!story.can_continue());

    Ok(())
}

#[test]
fn glue_test() -> Result<(), StoryError> {
    let json = r##"{"inkVersion":21,"root":[["^Some ","<>","\n","^content","<>","^ with glue.","\n",["done",{"#n":"g-0"}],null],"done",null],"listDefs":{}}"##;
    let mut story = Story::new(json)?;

    assert_eq!("Some content with glue.\n", story.continue_maximally()?);

    Ok(())
}

#[test]
fn whitespace_test() -> Result<(), StoryError> {
    let json = r##"{"inkVersion":21,"root":[["^Hello   ","^  world","\n","^  Indented","\n",["done",{"#n":"g-0"}],null],"done",null],"listDefs":{}}"##;
    let mut story = Story::new(json)?;

    assert_eq!("Hello world\n", story.cont()?);
    assert_eq!("Indented\n", story.cont()?);

    Ok(())
}

#[test]
fn continue_without_content_test() -> Result<(), StoryError> {
    let mut story = Story::new(ONELINE)?;

    story.continue_maximally()?;

    assert!(matches!(story.cont(), Err(StoryError::InvalidStoryState(_))));

    Ok(())
}

#[test]
fn unsupported_version_test() {
    let too_new = ONELINE.replace("\"inkVersion\":21", "\"inkVersion\":22");
    assert!(matches!(
        Story::new(&too_new),
        Err(StoryError::IncompatibleVersion { found: 22, .. })
    ));

    let too_old = ONELINE.replace("\"inkVersion\":21", "\"inkVersion\":17");
    match Story::new(&too_old) {
        Err(
            err @ StoryError::IncompatibleVersion {
                document: Document::Story,
                found: 17,
                minimum: 18,
                ..
            },
        ) => assert!(err.to_string().contains("older than the minimum 18")),
        _ => panic!("a story compiled with ink 17 should be rejected"),
    }
}

#[test]
fn older_compatible_version_test() -> Result<(), StoryError> {
    let older = ONELINE.replace("\"inkVersion\":21", "\"inkVersion\":20");
    let mut story = Story::new(&older)?;

    assert_eq!("Line.\n", story.cont()?);

    Ok(())
}

#[test]
fn bad_json_test() {
    assert!(matches!(Story::new("{ this is not json"), Err(StoryError::BadJson(_))));
    assert!(matches!(
        Story::new(r#"{"inkVersion":21,"listDefs":{}}"#),
        Err(StoryError::BadJson(_))
    ));
}

#[test]
fn hierarchy_test() -> Result<(), StoryError> {
    let story = Story::new(ONELINE)?;

    let hierarchy = story.build_string_of_hierarchy();

    assert!(hierarchy.contains("Line."));
    assert!(hierarchy.contains("g-0"));
    assert!(hierarchy.contains("<---"));

    Ok(())
}

#[test]
fn async_continue_test() -> Result<(), StoryError> {
    let mut story = Story::new(ONELINE)?;

    story.continue_async(1000.0)?;

    assert!(story.async_continue_complete());
    assert_eq!("Line.\n", story.get_current_text()?);

    Ok(())
}
