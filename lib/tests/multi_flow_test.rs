use inkrt::{story::Story, story_error::StoryError};

const FLOWS: &str = r##"{"inkVersion":21,"root":[["done",null],"done",{"knot1":["^knot 1 line 1","\n","^knot 1 line 2","\n","end",{"#f":1}],"knot2":["^knot 2 line 1","\n","^knot 2 line 2","\n","end",{"#f":1}]}],"listDefs":{}}"##;

#[test]
fn basics_test() -> Result<(), StoryError> {
    let mut story = Story::new(FLOWS)?;

    story.switch_flow("First")?;
    story.choose_path_string("knot1", true, None)?;
    assert_eq!("knot 1 line 1\n", story.cont()?);

    story.switch_flow("Second")?;
    story.choose_path_string("knot2", true, None)?;
    assert_eq!("knot 2 line 1\n", story.cont()?);

    story.switch_flow("First")?;
    assert_eq!("knot 1 line 2\n", story.cont()?);

    story.switch_flow("Second")?;
    assert_eq!("knot 2 line 2\n", story.cont()?);

    Ok(())
}

#[test]
fn flow_names_test() -> Result<(), StoryError> {
    let mut story = Story::new(FLOWS)?;

    assert!(story.current_flow_is_default_flow());
    assert!(story.get_alive_flow_names().is_empty());

    story.switch_flow("Second")?;
    story.switch_flow("First")?;

    assert_eq!("First", story.get_current_flow_name());
    assert!(!story.current_flow_is_default_flow());
    assert_eq!(vec!["First", "Second"], story.get_alive_flow_names());

    story.switch_to_default_flow()?;
    assert!(story.current_flow_is_default_flow());
    assert_eq!(vec!["First", "Second"], story.get_alive_flow_names());

    Ok(())
}

#[test]
fn remove_flow_test() -> Result<(), StoryError> {
    let mut story = Story::new(FLOWS)?;

    story.switch_flow("First")?;
    story.remove_flow("First")?;

    // Removing the current flow goes back to the default one
    assert!(story.current_flow_is_default_flow());
    assert!(story.get_alive_flow_names().is_empty());

    assert!(story.remove_flow("DEFAULT_FLOW").is_err());

    Ok(())
}

#[test]
fn save_load_flows_test() -> Result<(), StoryError> {
    let mut story = Story::new(FLOWS)?;

    story.switch_flow("First")?;
    story.choose_path_string("knot1", true, None)?;
    assert_eq!("knot 1 line 1\n", story.cont()?);

    story.switch_flow("Second")?;
    story.choose_path_string("knot2", true, None)?;
    assert_eq!("knot 2 line 1\n", story.cont()?);

    let saved = story.save_state()?;

    let mut restored = Story::new(FLOWS)?;
    restored.load_state(&saved)?;

    assert_eq!("Second", restored.get_current_flow_name());
    assert_eq!("knot 2 line 2\n", restored.cont()?);

    restored.switch_flow("First")?;
    assert_eq!("knot 1 line 2\n", restored.cont()?);

    Ok(())
}
