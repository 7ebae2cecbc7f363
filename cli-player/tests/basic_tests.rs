use assert_cmd::prelude::*;
use predicates::prelude::predicate;
use std::io::Write;
use std::process::{Command, Output, Stdio};

fn run_with_input(args: &[&str], input: &[u8]) -> Result<Output, Box<dyn std::error::Error>> {
    let mut cmd = Command::cargo_bin("inkplayer")?;

    cmd.args(args);
    cmd.stdin(Stdio::piped());
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());

    let mut child = cmd.spawn()?;
    let mut stdin = child.stdin.take().ok_or("no stdin")?;

    stdin.write_all(input)?;
    drop(stdin);

    Ok(child.wait_with_output()?)
}

#[test]
fn basic_story_test() -> Result<(), Box<dyn std::error::Error>> {
    let output = run_with_input(&["tests/data/choices.ink.json"], b"1\n")?;
    let output_str = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success());
    assert!(output_str.starts_with("Hello\n"));
    assert!(output_str.contains("1. Option A"));
    assert!(output_str.contains("2. Option B"));
    assert!(output_str.ends_with("Chose A\nEnd\n"));

    Ok(())
}

#[test]
fn story_not_found_test() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::cargo_bin("inkplayer")?;

    cmd.arg("nonexistent.ink.json");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("could not read file"));

    Ok(())
}

#[test]
fn out_of_range_choice_test() -> Result<(), Box<dyn std::error::Error>> {
    let output = run_with_input(&["tests/data/choices.ink.json"], b"7\n2\n")?;
    let output_str = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("<option out of range>"));
    assert!(output_str.ends_with("Chose B\nEnd\n"));

    Ok(())
}

#[test]
fn help_and_quit_test() -> Result<(), Box<dyn std::error::Error>> {
    let output = run_with_input(&["tests/data/choices.ink.json"], b"help\nquit\n")?;
    let output_str = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success());
    assert!(output_str.contains("Commands:"));
    assert!(!output_str.contains("Chose"));

    Ok(())
}

#[test]
fn closed_input_test() -> Result<(), Box<dyn std::error::Error>> {
    let output = run_with_input(&["tests/data/choices.ink.json"], b"")?;

    assert!(output.status.success());

    Ok(())
}

#[test]
fn save_and_load_test() -> Result<(), Box<dyn std::error::Error>> {
    let save_file = std::env::temp_dir().join(format!("inkplayer-save-{}.json", std::process::id()));
    let save_path = save_file.to_string_lossy();

    let input = format!("save {save_path}\nload {save_path}\n2\n");
    let output = run_with_input(&["tests/data/choices.ink.json"], input.as_bytes())?;
    let output_str = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success());
    assert!(output_str.contains("Ok."));
    assert!(output_str.ends_with("Chose B\nEnd\n"));

    let saved = std::fs::read_to_string(&save_file)?;
    assert!(saved.contains("\"inkSaveVersion\""));

    std::fs::remove_file(&save_file)?;

    Ok(())
}

#[test]
fn divert_command_test() -> Result<(), Box<dyn std::error::Error>> {
    let output = run_with_input(&["tests/data/tags.ink.json"], b"-> knot\n")?;
    let output_str = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success());
    assert!(output_str.contains("Knot text\n# tags: knot tag\n"));

    Ok(())
}

#[test]
fn tags_test() -> Result<(), Box<dyn std::error::Error>> {
    let output = run_with_input(&["tests/data/tags.ink.json"], b"1\n")?;
    let output_str = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success());
    assert!(output_str.starts_with("Hello\n# tags: author: Joe\n"));
    assert!(output_str.ends_with("Picked\n# tags: mood: happy\n"));

    Ok(())
}

#[test]
fn auto_play_test() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::cargo_bin("inkplayer")?;

    cmd.arg("-a").arg("tests/data/choices.ink.json");
    cmd.assert()
        .success()
        .stdout(predicate::str::ends_with("End\n"));

    Ok(())
}

#[test]
fn external_fallback_test() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::cargo_bin("inkplayer")?;

    cmd.arg("tests/data/external.ink.json");
    cmd.assert().success().stdout(predicate::str::diff("8\n"));

    let mut cmd = Command::cargo_bin("inkplayer")?;

    cmd.arg("-e").arg("tests/data/external.ink.json");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Missing function binding"));

    Ok(())
}
