//! Console player for compiled `.json` story files written in the **ink**
//! language.
use std::{cell::RefCell, fs, io, io::Write, path::Path, rc::Rc};

use anyhow::{Context, Result};
use clap::Parser;
use inkrt::{
    choice::Choice,
    story::{
        errors::{ErrorHandler, ErrorType},
        Story,
    },
};
use rand::Rng;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// The compiled .json story file
    pub json_filename: String,

    /// Choose options randomly
    #[arg(short, long, default_value_t = false)]
    pub auto_play: bool,

    /// Forbid external function fallbacks
    #[arg(short = 'e', long, default_value_t = false)]
    pub forbid_external_fallbacks: bool,
}

#[derive(Debug, PartialEq)]
enum Command {
    Choose(usize),
    Exit,
    Help,
    Load(String),
    Save(String),
    DivertPath(String),
    Flow(String),
}

struct EHandler {
    pub should_terminate: bool,
}

impl EHandler {
    pub fn new() -> Rc<RefCell<EHandler>> {
        Rc::new(RefCell::new(EHandler {
            should_terminate: false,
        }))
    }
}

impl ErrorHandler for EHandler {
    fn error(&mut self, message: &str, error_type: ErrorType) {
        eprintln!("{}", message);

        if error_type == ErrorType::Error {
            self.should_terminate = true;
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .compact()
        .with_writer(io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let args = Args::parse();
    let json_string = get_json_string(&args.json_filename)?;

    // Compilers on Windows may write a BOM
    let json_string_without_bom = json_string.strip_prefix('\u{feff}').unwrap_or(&json_string);

    let mut story = Story::new(json_string_without_bom)
        .with_context(|| format!("could not load story `{}`", args.json_filename))?;
    tracing::debug!(file = %args.json_filename, "story loaded");
    let err_handler = EHandler::new();
    story.set_error_handler(err_handler.clone());
    story.set_allow_external_function_fallbacks(!args.forbid_external_fallbacks);

    let mut end = false;

    while !end && !err_handler.borrow().should_terminate {
        while story.can_continue() {
            let line = story.cont()?;

            print!("{}", line);

            let tags = story.get_current_tags()?;

            if !tags.is_empty() {
                println!("# tags: {}", tags.join(", "));
            }
        }

        let choices = story.get_current_choices();
        if choices.is_empty() {
            break;
        }

        let command = if args.auto_play {
            let i = rand::thread_rng().gen_range(0..choices.len());

            println!();
            print_choices(&choices);
            println!("?> {}", i + 1);

            Command::Choose(i)
        } else {
            read_input(&choices)?
        };

        end = process_command(command, &mut story)?;
    }

    Ok(())
}

// Returns true if the program has to stop
fn process_command(command: Command, story: &mut Story) -> Result<bool> {
    match command {
        Command::Choose(c) => story.choose_choice_index(c)?,
        Command::Exit => return Ok(true),
        Command::Load(filename) => {
            let saved_string = get_json_string(&filename)?;

            match story.load_state(&saved_string) {
                Ok(()) => println!("Ok."),
                Err(e) => print_error(&format!("error loading '{filename}': {e}")),
            }
        }
        Command::Save(filename) => {
            let json_string = story.save_state()?;
            save_json(&filename, &json_string)?;
            println!("Ok.")
        }
        Command::Flow(flow) => {
            if let Err(desc) = story.switch_flow(&flow) {
                print_error(&format!("error switching to '{flow}': {desc}"));
            }
        }
        Command::DivertPath(path) => {
            if let Err(desc) = story.choose_path_string(&path, true, None) {
                print_error(&format!("error diverting to '{path}': {desc}"));
            }
        }
        Command::Help => println!(
            "Commands:\n\tload <filename>\n\tsave <filename>\n\t-> <divert_path>\n\tswitch <flow_name>\n\tquit\n\t"
        ),
    }

    Ok(false)
}

fn print_choices(choices: &[&Choice]) {
    for (i, c) in choices.iter().enumerate() {
        println!("{}. {}", i + 1, c.text);
    }
}

/// Reads lines until one is a valid choice number or command.
fn read_input(choices: &[&Choice]) -> Result<Command> {
    let mut line = String::new();

    loop {
        println!();
        print_choices(choices);
        print!("?> ");
        io::stdout().flush()?;

        line.clear();
        let read = io::stdin().read_line(&mut line)?;

        // Closed input ends the session like `quit`
        if read == 0 {
            return Ok(Command::Exit);
        }

        match parse_command(&line, choices.len()) {
            Ok(Some(command)) => return Ok(command),
            Ok(None) => continue,
            Err(e) => print_error(e),
        }
    }
}

fn parse_command(line: &str, num_choices: usize) -> Result<Option<Command>, &'static str> {
    let trimmed = line.trim();

    if trimmed.is_empty() {
        return Ok(None);
    }

    if let Ok(v) = trimmed.parse::<usize>() {
        if v < 1 || v > num_choices {
            return Err("option out of range");
        }

        return Ok(Some(Command::Choose(v - 1)));
    }

    let words: Vec<&str> = trimmed.split_whitespace().collect();

    let command = match (words[0].to_lowercase().as_str(), words.get(1)) {
        ("exit" | "quit", _) => Command::Exit,
        ("help", _) => Command::Help,
        ("load", Some(file)) if words.len() == 2 => Command::Load(file.to_string()),
        ("load", _) => return Err("incorrect filename"),
        ("save", Some(file)) if words.len() == 2 => Command::Save(file.to_string()),
        ("save", _) => return Err("incorrect filename"),
        ("switch", Some(flow)) if words.len() == 2 => Command::Flow(flow.to_string()),
        ("switch", _) => return Err("incorrect flow name"),
        ("->", Some(path)) if words.len() == 2 => Command::DivertPath(path.to_string()),
        ("->", _) => return Err("incorrect divert"),
        _ => return Err("unrecognized option or command"),
    };

    Ok(Some(command))
}

fn print_error(error: &str) {
    eprintln!("<{error}>");
}

fn get_json_string(filename: &str) -> Result<String> {
    let path = Path::new(filename);

    fs::read_to_string(path)
        .with_context(|| format!("could not read file `{}`", path.to_string_lossy()))
}

fn save_json(filename: &str, content: &str) -> Result<()> {
    let path = Path::new(filename);

    fs::write(path, content)
        .with_context(|| format!("could not write file `{}`", path.to_string_lossy()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_choice_numbers() {
        assert_eq!(parse_command("2\n", 3), Ok(Some(Command::Choose(1))));
        assert_eq!(parse_command("12", 12), Ok(Some(Command::Choose(11))));
        assert_eq!(parse_command("4", 3), Err("option out of range"));
        assert_eq!(parse_command("0", 3), Err("option out of range"));
        assert_eq!(parse_command("   ", 3), Ok(None));
    }

    #[test]
    fn parses_commands() {
        assert_eq!(parse_command("QUIT", 1), Ok(Some(Command::Exit)));
        assert_eq!(parse_command("help", 1), Ok(Some(Command::Help)));
        assert_eq!(
            parse_command("save game.json", 1),
            Ok(Some(Command::Save("game.json".to_owned())))
        );
        assert_eq!(
            parse_command("-> knot.stitch", 1),
            Ok(Some(Command::DivertPath("knot.stitch".to_owned())))
        );
        assert_eq!(
            parse_command("switch side", 1),
            Ok(Some(Command::Flow("side".to_owned())))
        );
        assert_eq!(parse_command("load", 1), Err("incorrect filename"));
        assert_eq!(parse_command("dance", 1), Err("unrecognized option or command"));
    }
}
