use inkrt::{
    story::Story,
    story_error::{Document, StoryError},
    value_type::ValueType,
};

mod common;

const CHOICES: &str = r##"{"inkVersion":21,"root":[["^Hello","\n","ev","str","^Option A","/str","/ev",{"*":"0.c-0","flg":20},"ev","str","^Option B","/str","/ev",{"*":"0.c-1","flg":20},{"c-0":["^Chose A","\n",{"->":"0.g-0"},{"#f":5}],"c-1":["^Chose B","\n",{"->":"0.g-0"},{"#f":5}],"g-0":["^End","\n","end",null]}],"done",null],"listDefs":{}}"##;

const COUNTER: &str = r##"{"inkVersion":21,"root":[["ev",{"VAR?":"x"},"out","/ev","\n","ev","str","^Inc","/str","/ev",{"*":"0.c-0","flg":20},{"c-0":["ev",{"VAR?":"x"},1,"+",{"VAR=":"x","re":true},"/ev","ev",{"VAR?":"x"},"out","/ev","\n","end",{"#f":5}]}],"done",{"global decl":["ev",5,{"VAR=":"x"},"/ev","end",null]}],"listDefs":{}}"##;

#[test]
fn save_and_restore_choices_test() -> Result<(), StoryError> {
    let mut story = Story::new(CHOICES)?;

    story.continue_maximally()?;
    let saved = story.save_state()?;

    story.choose_choice_index(0)?;
    assert_eq!("Chose A\nEnd\n", story.continue_maximally()?);

    story.load_state(&saved)?;

    let choices = story.get_current_choices();
    assert_eq!(2, choices.len());
    assert_eq!("Option B", choices[1].text);

    story.choose_choice_index(1)?;
    assert_eq!("Chose B\nEnd\n", story.continue_maximally()?);

    Ok(())
}

#[test]
fn load_into_new_story_test() -> Result<(), StoryError> {
    let mut story = Story::new(COUNTER)?;

    story.continue_maximally()?;
    story.choose_choice_index(0)?;
    story.continue_maximally()?;

    let saved = story.save_state()?;

    let mut restored = Story::new(COUNTER)?;
    restored.load_state(&saved)?;

    assert_eq!(Some(ValueType::Int(6)), restored.get_variable("x"));
    assert_eq!(1, restored.get_visit_count_at_path_string("0.c-0")?);
    assert!(common::is_ended(&restored));

    Ok(())
}

#[test]
fn save_version_test() -> Result<(), StoryError> {
    let mut story = Story::new(CHOICES)?;

    story.continue_maximally()?;
    let saved = story.save_state()?;

    assert!(saved.contains("\"inkSaveVersion\":10"));

    let old = saved.replace("\"inkSaveVersion\":10", "\"inkSaveVersion\":7");
    assert!(matches!(
        story.load_state(&old),
        Err(StoryError::IncompatibleVersion {
            document: Document::Save,
            found: 7,
            minimum: 8,
            ..
        })
    ));

    assert!(matches!(story.load_state("not a save"), Err(StoryError::BadJson(_))));

    Ok(())
}

#[test]
fn reset_state_test() -> Result<(), StoryError> {
    let mut story = Story::new(COUNTER)?;

    story.set_variable("x", &ValueType::Int(100))?;
    story.continue_maximally()?;
    story.choose_choice_index(0)?;
    story.continue_maximally()?;

    story.reset_state()?;

    assert_eq!(Some(ValueType::Int(5)), story.get_variable("x"));
    assert_eq!(0, story.get_visit_count_at_path_string("0.c-0")?);
    assert_eq!("5\n", story.cont()?);

    Ok(())
}
