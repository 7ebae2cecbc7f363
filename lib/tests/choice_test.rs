use inkrt::{story::Story, story_error::StoryError};

mod common;

pub const CHOICES: &str = r##"{"inkVersion":21,"root":[["^Hello","\n","ev","str","^Option A","/str","/ev",{"*":"0.c-0","flg":20},"ev","str","^Option B","/str","/ev",{"*":"0.c-1","flg":20},{"c-0":["^Chose A","\n",{"->":"0.g-0"},{"#f":5}],"c-1":["^Chose B","\n",{"->":"0.g-0"},{"#f":5}],"g-0":["^End","\n","end",null]}],"done",null],"listDefs":{}}"##;

const INVISIBLE_DEFAULT: &str = r##"{"inkVersion":21,"root":[[{"->":"hub"},null],"done",{"hub":["ev","str","^Once","/str","/ev",{"*":"hub.c-0","flg":20},{"*":"hub.c-1","flg":24},{"c-0":["^Picked once","\n",{"->":"hub"},{"#f":5}],"c-1":["^Fallback","\n","end",{"#f":5}],"#f":1}]}],"listDefs":{}}"##;

#[test]
fn choice_count_test() -> Result<(), StoryError> {
    let mut story = Story::new(CHOICES)?;

    assert_eq!("Hello\n", story.continue_maximally()?);

    let choices = story.get_current_choices();
    assert_eq!(2, choices.len());
    assert_eq!("Option A", choices[0].text);
    assert_eq!("Option B", choices[1].text);
    assert_eq!(0, choices[0].index);
    assert_eq!(1, choices[1].index);

    Ok(())
}

#[test]
fn choose_first_test() -> Result<(), StoryError> {
    let mut story = Story::new(CHOICES)?;

    story.continue_maximally()?;
    story.choose_choice_index(0)?;

    assert_eq!("Chose A\nEnd\n", story.continue_maximally()?);
    assert!(common::is_ended(&story));
    assert_eq!(1, story.get_visit_count_at_path_string("0.c-0")?);
    assert_eq!(0, story.get_visit_count_at_path_string("0.c-1")?);

    Ok(())
}

#[test]
fn choose_second_test() -> Result<(), StoryError> {
    let text = common::run_story_json(CHOICES, Some(vec![1]))?;

    assert_eq!(
        "Hello\nOption A\nOption B\nChose B\nEnd\n",
        common::join_text(&text)
    );

    Ok(())
}

#[test]
fn choice_out_of_range_test() -> Result<(), StoryError> {
    let mut story = Story::new(CHOICES)?;

    story.continue_maximally()?;

    assert!(matches!(
        story.choose_choice_index(2),
        Err(StoryError::BadArgument(_))
    ));

    // Still waiting for a valid choice
    assert_eq!(2, story.get_current_choices().len());

    Ok(())
}

#[test]
fn turn_index_test() -> Result<(), StoryError> {
    let mut story = Story::new(CHOICES)?;

    story.continue_maximally()?;
    let turn_before = story.get_state().get_current_turn_index();

    story.choose_choice_index(1)?;
    story.continue_maximally()?;

    assert_eq!(turn_before + 1, story.get_state().get_current_turn_index());

    Ok(())
}

#[test]
fn invisible_default_test() -> Result<(), StoryError> {
    let mut story = Story::new(INVISIBLE_DEFAULT)?;

    assert_eq!("", story.continue_maximally()?);

    // The fallback is never offered to the player
    let choices = story.get_current_choices();
    assert_eq!(1, choices.len());
    assert_eq!("Once", choices[0].text);

    story.choose_choice_index(0)?;

    // With the once-only choice used up, the fallback is taken straight away
    assert_eq!("Picked once\nFallback\n", story.continue_maximally()?);
    assert!(common::is_ended(&story));

    Ok(())
}
