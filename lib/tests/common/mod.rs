#![allow(dead_code)]

use inkrt::{story::Story, story_error::StoryError};
use rand::Rng;
use tracing_subscriber::EnvFilter;

/// Sends the runtime logs to the test output, filtered by `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn next_all(story: &mut Story, text: &mut Vec<String>) -> Result<(), StoryError> {
    while story.can_continue() {
        let line = story.cont()?;
        print!("{line}");

        if !line.trim().is_empty() {
            text.push(line.trim().to_string());
        }
    }

    if story.has_error() {
        panic!("{}", join_text(story.get_current_errors()));
    }

    Ok(())
}

pub fn join_text(text: &[String]) -> String {
    let mut sb = String::new();

    for s in text {
        sb.push_str(s);
    }

    sb
}

/// Plays a story to the end, taking the choices in `choice_list` and random
/// ones when the list runs out. Returns every line and choice text seen.
pub fn run_story_json(json: &str, choice_list: Option<Vec<usize>>) -> Result<Vec<String>, StoryError> {
    init_tracing();

    let mut story = Story::new(json)?;

    let mut text = Vec::new();
    let mut choice_list_index = 0;
    let mut rng = rand::thread_rng();

    while story.can_continue() || !story.get_current_choices().is_empty() {
        println!("{}", story.build_string_of_hierarchy());

        while story.can_continue() {
            let line = story.cont()?;
            print!("{}", line);
            text.push(line);
        }

        let current_choices = story.get_current_choices();
        if current_choices.is_empty() {
            break;
        }

        let len = current_choices.len();

        for choice in current_choices {
            println!("{}", choice.text);
            text.push(format!("{}\n", choice.text));
        }

        let choice_index = match &choice_list {
            Some(choice_list) if choice_list_index < choice_list.len() => {
                choice_list_index += 1;
                choice_list[choice_list_index - 1]
            }
            _ => rng.gen_range(0..len),
        };

        story.choose_choice_index(choice_index)?;
    }

    Ok(text)
}

pub fn is_ended(story: &Story) -> bool {
    !story.can_continue() && story.get_current_choices().is_empty()
}
