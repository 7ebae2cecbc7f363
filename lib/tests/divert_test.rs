use inkrt::{story::Story, story_error::StoryError, value_type::ValueType};

mod common;

const CONDITIONAL: &str = r##"{"inkVersion":21,"root":[[{"->":"check"},null],"done",{"check":["ev",{"VAR?":"x"},3,">","/ev",[{"->":".^.b","c":true},{"b":["^big",{"->":"check.7"},null]}],[{"->":".^.b"},{"b":["^small",{"->":"check.7"},null]}],"nop","\n","done",{"#f":1}],"global decl":["ev",5,{"VAR=":"x"},"/ev","end",null]}],"listDefs":{}}"##;

const TUNNEL: &str = r##"{"inkVersion":21,"root":[["^Start","\n",{"->t->":"tunnel"},"^End","\n","end",null],"done",{"tunnel":["^Inside","\n","ev","void","/ev","->->",{"#f":1}]}],"listDefs":{}}"##;

const KNOTS: &str = r##"{"inkVersion":21,"root":[["^Intro","\n",{"->":"first"},null],"done",{"first":["^First knot","\n",{"->":"second"},{"#f":1}],"second":["^Second knot","\n","end",{"stitch":["^In the stitch","\n","end",{"#f":1}],"#f":1}]}],"listDefs":{}}"##;

const INN: &str = r##"{"inkVersion":21,"root":[[{"->":"inn"},null],"done",{"inn":["^At the inn","\n","^It is loud","\n","end",{"cellar":["^In the cellar","\n","end",{"#f":1}],"#f":1}]}],"listDefs":{}}"##;

#[test]
fn divert_test() -> Result<(), StoryError> {
    let mut story = Story::new(KNOTS)?;

    assert_eq!("Intro\nFirst knot\nSecond knot\n", story.continue_maximally()?);
    assert_eq!(1, story.get_visit_count_at_path_string("first")?);
    assert_eq!(1, story.get_visit_count_at_path_string("second")?);
    assert_eq!(0, story.get_visit_count_at_path_string("second.stitch")?);

    Ok(())
}

#[test]
fn choose_path_string_test() -> Result<(), StoryError> {
    let mut story = Story::new(KNOTS)?;

    story.choose_path_string("second.stitch", true, None)?;

    assert_eq!("In the stitch\n", story.continue_maximally()?);
    assert_eq!(1, story.get_visit_count_at_path_string("second.stitch")?);

    Ok(())
}

#[test]
fn choose_path_string_from_current_knot_test() -> Result<(), StoryError> {
    let mut story = Story::new(INN)?;

    assert_eq!("At the inn\n", story.cont()?);

    // Not a root name, found from inside the knot being played
    story.choose_path_string("cellar", true, None)?;

    assert_eq!("In the cellar\n", story.continue_maximally()?);
    assert_eq!(1, story.get_visit_count_at_path_string("inn.cellar")?);

    Ok(())
}

#[test]
fn choose_path_string_unknown_from_knot_test() -> Result<(), StoryError> {
    let mut story = Story::new(INN)?;

    assert_eq!("At the inn\n", story.cont()?);
    assert!(story.choose_path_string("attic", true, None).is_err());

    Ok(())
}

#[test]
fn choose_missing_path_test() -> Result<(), StoryError> {
    let mut story = Story::new(KNOTS)?;

    assert!(story.choose_path_string("nowhere", true, None).is_err());

    Ok(())
}

#[test]
fn visit_count_of_missing_path_test() -> Result<(), StoryError> {
    let story = Story::new(KNOTS)?;

    assert_eq!(0, story.get_visit_count_at_path_string("nowhere")?);

    Ok(())
}

#[test]
fn conditional_test() -> Result<(), StoryError> {
    let mut story = Story::new(CONDITIONAL)?;

    assert_eq!("big\n", story.continue_maximally()?);

    story.set_variable("x", &ValueType::Int(1))?;
    story.choose_path_string("check", true, None)?;

    assert_eq!("small\n", story.continue_maximally()?);

    Ok(())
}

#[test]
fn tunnel_test() -> Result<(), StoryError> {
    let mut story = Story::new(TUNNEL)?;

    assert_eq!("Start\nInside\nEnd\n", story.continue_maximally()?);
    assert_eq!(1, story.get_visit_count_at_path_string("tunnel")?);
    assert!(common::is_ended(&story));

    Ok(())
}

#[test]
fn tunnel_line_by_line_test() -> Result<(), StoryError> {
    let mut story = Story::new(TUNNEL)?;
    let mut text = Vec::new();

    common::next_all(&mut story, &mut text)?;

    assert_eq!(vec!["Start", "Inside", "End"], text);

    Ok(())
}
