use inkrt::{story::Story, story_error::StoryError};

const TAGS: &str = r##"{"inkVersion":21,"root":[["#","^author: Joe","/#","^Hello","\n","ev","str","^Pick","/str","/ev",{"*":"0.c-0","flg":20},{"c-0":["^Picked","#","^mood: happy","/#","\n","end",{"#f":5}]}],"done",{"knot":["#","^knot tag","/#","^Knot text","\n","end",{"#f":1}]}],"listDefs":{}}"##;

#[test]
fn global_tags_test() -> Result<(), StoryError> {
    let story = Story::new(TAGS)?;

    assert_eq!(vec!["author: Joe"], story.get_global_tags()?);

    Ok(())
}

#[test]
fn knot_tags_test() -> Result<(), StoryError> {
    let story = Story::new(TAGS)?;

    assert_eq!(vec!["knot tag"], story.tags_for_content_at_path("knot")?);

    Ok(())
}

#[test]
fn line_tags_test() -> Result<(), StoryError> {
    let mut story = Story::new(TAGS)?;

    assert_eq!("Hello\n", story.cont()?);
    assert_eq!(vec!["author: Joe"], story.get_current_tags()?);

    story.choose_choice_index(0)?;

    assert_eq!("Picked\n", story.cont()?);
    assert_eq!(vec!["mood: happy"], story.get_current_tags()?);

    Ok(())
}

#[test]
fn tags_after_divert_test() -> Result<(), StoryError> {
    let mut story = Story::new(TAGS)?;

    story.choose_path_string("knot", true, None)?;

    assert_eq!("Knot text\n", story.cont()?);
    assert_eq!(vec!["knot tag"], story.get_current_tags()?);

    Ok(())
}

#[test]
fn legacy_tags_test() -> Result<(), StoryError> {
    let json = r##"{"inkVersion":21,"root":[[{"#":"old style"},"^Line","\n","end",null],"done",null],"listDefs":{}}"##;
    let mut story = Story::new(json)?;

    assert_eq!(vec!["old style"], story.get_global_tags()?);
    assert_eq!("Line\n", story.cont()?);
    assert_eq!(vec!["old style"], story.get_current_tags()?);

    Ok(())
}
