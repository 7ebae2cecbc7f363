use std::{cell::RefCell, rc::Rc};

use inkrt::{
    story::{external_functions::ExternalFunction, Story},
    story_error::StoryError,
    value_type::ValueType,
};

const FUNCTIONS: &str = r#"{"inkVersion":21,"root":[["ev",2,3,{"f()":"add"},"out","/ev","\n","end",null],"done",{"add":[{"temp=":"b"},{"temp=":"a"},"ev",{"VAR?":"a"},{"VAR?":"b"},"+","/ev","~ret",null],"say":["^Hello from ink","\n","ev",1,"/ev","~ret",null],"quiet":["ev","void","/ev","~ret",null]}],"listDefs":{}}"#;

const EXTERNAL: &str = r#"{"inkVersion":21,"root":[["ev",4,{"x()":"double","exArgs":1},"out","/ev","\n","end",null],"done",{"double":[{"temp=":"x"},"ev",{"VAR?":"x"},2,"*","/ev","~ret",null]}],"listDefs":{}}"#;

struct Triple {
    calls: usize,
}

impl ExternalFunction for Triple {
    fn call(&mut self, _func_name: &str, args: Vec<ValueType>) -> Option<ValueType> {
        self.calls += 1;
        let n = args.first().and_then(|v| v.get::<i32>()).unwrap_or_default();
        Some(ValueType::Int(n * 3))
    }
}

#[test]
fn ink_function_call_test() -> Result<(), StoryError> {
    let mut story = Story::new(FUNCTIONS)?;

    assert_eq!("5\n", story.continue_maximally()?);

    Ok(())
}

#[test]
fn evaluate_function_test() -> Result<(), StoryError> {
    let mut story = Story::new(FUNCTIONS)?;
    let mut text = String::new();

    let result = story.evaluate_function("add", &[ValueType::Int(20), ValueType::Int(22)], &mut text)?;

    assert_eq!(Some(ValueType::Int(42)), result);
    assert!(text.is_empty());

    Ok(())
}

#[test]
fn evaluate_function_text_output_test() -> Result<(), StoryError> {
    let mut story = Story::new(FUNCTIONS)?;
    let mut text = String::new();

    let result = story.evaluate_function("say", &[], &mut text)?;

    assert_eq!(Some(ValueType::Int(1)), result);
    assert_eq!("Hello from ink\n", text);

    Ok(())
}

#[test]
fn evaluate_void_function_test() -> Result<(), StoryError> {
    let mut story = Story::new(FUNCTIONS)?;
    let mut text = String::new();

    assert_eq!(None, story.evaluate_function("quiet", &[], &mut text)?);

    Ok(())
}

#[test]
fn evaluate_function_keeps_story_going_test() -> Result<(), StoryError> {
    let mut story = Story::new(FUNCTIONS)?;
    let mut text = String::new();

    story.evaluate_function("add", &[ValueType::Int(1), ValueType::Int(1)], &mut text)?;

    // The main flow is untouched
    assert!(story.can_continue());
    assert_eq!("5\n", story.cont()?);

    Ok(())
}

#[test]
fn evaluate_missing_function_test() -> Result<(), StoryError> {
    let mut story = Story::new(FUNCTIONS)?;
    let mut text = String::new();

    assert!(story.evaluate_function("nope", &[], &mut text).is_err());
    assert!(story.evaluate_function("  ", &[], &mut text).is_err());

    Ok(())
}

#[test]
fn has_function_test() -> Result<(), StoryError> {
    let story = Story::new(FUNCTIONS)?;

    assert!(story.has_function("add"));
    assert!(story.has_function("say"));
    assert!(!story.has_function("subtract"));

    Ok(())
}

#[test]
fn external_binding_test() -> Result<(), StoryError> {
    let mut story = Story::new(EXTERNAL)?;
    let triple = Rc::new(RefCell::new(Triple { calls: 0 }));

    story.bind_external_function("double", triple.clone(), true)?;

    assert_eq!("12\n", story.continue_maximally()?);
    assert_eq!(1, triple.borrow().calls);

    Ok(())
}

#[test]
fn external_fallback_test() -> Result<(), StoryError> {
    let mut story = Story::new(EXTERNAL)?;

    story.set_allow_external_function_fallbacks(true);

    assert_eq!("8\n", story.continue_maximally()?);

    Ok(())
}

#[test]
fn missing_external_test() -> Result<(), StoryError> {
    let mut story = Story::new(EXTERNAL)?;

    story.set_allow_external_function_fallbacks(false);

    let err = story.cont().unwrap_err();
    assert!(err.to_string().contains("Missing function binding"));

    Ok(())
}

#[test]
fn bind_twice_test() -> Result<(), StoryError> {
    let mut story = Story::new(EXTERNAL)?;

    story.bind_external_function("double", Rc::new(RefCell::new(Triple { calls: 0 })), true)?;

    assert!(story
        .bind_external_function("double", Rc::new(RefCell::new(Triple { calls: 0 })), true)
        .is_err());

    story.unbind_external_function("double")?;
    assert!(story.unbind_external_function("double").is_err());

    Ok(())
}
