use std::{cell::RefCell, rc::Rc};

use inkrt::{
    story::{variable_observer::VariableObserver, Story},
    story_error::StoryError,
    value_type::ValueType,
};

const COUNTER: &str = r##"{"inkVersion":21,"root":[["ev",{"VAR?":"x"},"out","/ev","\n","ev","str","^Inc","/str","/ev",{"*":"0.c-0","flg":20},{"c-0":["ev",{"VAR?":"x"},1,"+",{"VAR=":"x","re":true},"/ev","ev",{"VAR?":"x"},"out","/ev","\n","end",{"#f":5}]}],"done",{"global decl":["ev",5,{"VAR=":"x"},"/ev","end",null]}],"listDefs":{}}"##;

const LISTS: &str = r#"{"inkVersion":21,"root":[["ev",{"VAR?":"colours"},"out","/ev","\n","ev",{"VAR?":"colours"},{"list":{"colours.blue":3}},"+",{"VAR=":"colours","re":true},"/ev","ev",{"VAR?":"colours"},"out","/ev","\n","ev",{"VAR?":"colours"},"LIST_COUNT","out","/ev","\n","end",null],"done",{"global decl":["ev",{"list":{"colours.green":2}},{"VAR=":"colours"},"/ev","end",null]}],"listDefs":{"colours":{"red":1,"green":2,"blue":3}}}"#;

#[derive(Default)]
struct Recorder {
    changes: Vec<(String, ValueType)>,
}

impl VariableObserver for Recorder {
    fn changed(&mut self, variable_name: &str, value: &ValueType) {
        self.changes.push((variable_name.to_owned(), value.clone()));
    }
}

#[test]
fn global_declaration_test() -> Result<(), StoryError> {
    let mut story = Story::new(COUNTER)?;

    assert_eq!(Some(ValueType::Int(5)), story.get_variable("x"));
    assert_eq!("5\n", story.cont()?);

    Ok(())
}

#[test]
fn assignment_test() -> Result<(), StoryError> {
    let mut story = Story::new(COUNTER)?;

    story.continue_maximally()?;
    story.choose_choice_index(0)?;

    assert_eq!("6\n", story.continue_maximally()?);
    assert_eq!(Some(6), story.get_variable("x").and_then(|v| v.get::<i32>()));

    Ok(())
}

#[test]
fn set_variable_test() -> Result<(), StoryError> {
    let mut story = Story::new(COUNTER)?;

    story.set_variable("x", &ValueType::Int(41))?;

    assert_eq!("41\n", story.cont()?);

    story.choose_choice_index(0)?;
    assert_eq!("42\n", story.cont()?);

    Ok(())
}

#[test]
fn set_undeclared_variable_test() -> Result<(), StoryError> {
    let mut story = Story::new(COUNTER)?;

    assert!(story.set_variable("y", &ValueType::Int(1)).is_err());
    assert_eq!(None, story.get_variable("y"));

    Ok(())
}

#[test]
fn observer_test() -> Result<(), StoryError> {
    let mut story = Story::new(COUNTER)?;
    let recorder = Rc::new(RefCell::new(Recorder::default()));

    story.observe_variable("x", recorder.clone())?;

    story.continue_maximally()?;
    assert!(recorder.borrow().changes.is_empty());

    story.choose_choice_index(0)?;
    story.continue_maximally()?;

    assert_eq!(
        vec![("x".to_owned(), ValueType::Int(6))],
        recorder.borrow().changes
    );

    Ok(())
}

#[test]
fn observer_of_host_change_test() -> Result<(), StoryError> {
    let mut story = Story::new(COUNTER)?;
    let recorder = Rc::new(RefCell::new(Recorder::default()));

    story.observe_variable("x", recorder.clone())?;

    story.set_variable("x", &ValueType::Int(10))?;
    // Same value again: nothing to report
    story.set_variable("x", &ValueType::Int(10))?;

    assert_eq!(
        vec![("x".to_owned(), ValueType::Int(10))],
        recorder.borrow().changes
    );

    Ok(())
}

#[test]
fn remove_observer_test() -> Result<(), StoryError> {
    let mut story = Story::new(COUNTER)?;
    let recorder = Rc::new(RefCell::new(Recorder::default()));
    let observer: Rc<RefCell<dyn VariableObserver>> = recorder.clone();

    story.observe_variable("x", observer.clone())?;
    story.remove_variable_observer(&observer, Some("x"))?;

    story.set_variable("x", &ValueType::Int(7))?;

    assert!(recorder.borrow().changes.is_empty());

    // Removing it again is harmless
    story.remove_variable_observer(&observer, None)?;

    Ok(())
}

#[test]
fn observe_undeclared_variable_test() -> Result<(), StoryError> {
    let mut story = Story::new(COUNTER)?;
    let recorder = Rc::new(RefCell::new(Recorder::default()));

    assert!(matches!(
        story.observe_variable("nope", recorder),
        Err(StoryError::BadArgument(_))
    ));

    Ok(())
}

#[test]
fn list_test() -> Result<(), StoryError> {
    let mut story = Story::new(LISTS)?;

    assert_eq!("green\n", story.cont()?);
    assert_eq!("green, blue\n", story.cont()?);
    assert_eq!("2\n", story.cont()?);

    let colours = story.get_variable("colours");
    let colours = colours.as_ref().and_then(|v| v.get::<&inkrt::ink_list::InkList>());

    assert!(colours.is_some_and(|l| l.contains_item_named("blue")));
    assert!(colours.is_some_and(|l| !l.contains_item_named("red")));

    Ok(())
}
