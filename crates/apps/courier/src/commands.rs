//! Line commands typed at the courier prompt

use mailsync::{Action, Field, ItemId, TextRange};

pub const HELP: &str = "\
Commands:
  more | retry                 load the next page / retry a failed page
  open <id> | close            select an item / clear the selection
  folder <name>                switch folder
  subject <text> | body <text> edit the draft
  focus subject|body|none      move input focus
  mark <start> <end> | unmark  set or clear the text selection
  variant <n>                  toggle variant n (1-based)
  correct                      correct the focused field
  instruct <text>              set the refinement instruction
  refine [<text>]              refine both fields
  undo | redo                  one history step on the focused field
  discard                      drop the open item's draft
  help | quit";

#[derive(Debug)]
pub enum Command {
    /// Forward straight to the workspace
    Act(Action),
    /// Set the instruction, then refine
    Refine(Option<String>),
    SwitchFolder(String),
    Discard,
    Help,
    Quit,
}

pub fn parse(line: &str) -> Result<Command, String> {
    let line = line.trim();
    let (verb, rest) = line.split_once(' ').unwrap_or((line, ""));
    let rest = rest.trim();

    let command = match verb {
        "more" => Command::Act(Action::LoadMore),
        "retry" => Command::Act(Action::RetryPage),
        "open" => Command::Act(Action::Select(Some(parse_id(rest)?))),
        "close" => Command::Act(Action::Select(None)),
        "folder" if !rest.is_empty() => Command::SwitchFolder(rest.to_string()),
        "subject" => edit(Field::Subject, rest),
        "body" => edit(Field::Body, rest),
        "focus" => Command::Act(Action::Focus(parse_focus(rest)?)),
        "mark" => {
            let (start, end) = rest
                .split_once(' ')
                .ok_or_else(|| "usage: mark <start> <end>".to_string())?;
            let range = TextRange::new(parse_number(start)?, parse_number(end)?);
            Command::Act(Action::SetTextSelection(Some(range)))
        }
        "unmark" => Command::Act(Action::SetTextSelection(None)),
        "variant" => match parse_number(rest)? {
            0 => return Err("variants are numbered from 1".to_string()),
            n => Command::Act(Action::SelectVariant(n - 1)),
        },
        "correct" => Command::Act(Action::Correct),
        "instruct" => Command::Act(Action::SetInstruction(rest.to_string())),
        "refine" if rest.is_empty() => Command::Refine(None),
        "refine" => Command::Refine(Some(rest.to_string())),
        "undo" => Command::Act(Action::Undo),
        "redo" => Command::Act(Action::Redo),
        "discard" => Command::Discard,
        "help" | "?" => Command::Help,
        "quit" | "exit" => Command::Quit,
        "" => return Err(String::new()),
        _ => return Err(format!("unknown command: {line} (try 'help')")),
    };
    Ok(command)
}

fn edit(field: Field, value: &str) -> Command {
    Command::Act(Action::Edit {
        field,
        value: value.to_string(),
    })
}

fn parse_id(text: &str) -> Result<ItemId, String> {
    text.parse::<i64>()
        .map(ItemId::new)
        .map_err(|_| format!("not an item id: {text:?}"))
}

fn parse_number(text: &str) -> Result<usize, String> {
    text.trim()
        .parse()
        .map_err(|_| format!("not a number: {text:?}"))
}

fn parse_focus(text: &str) -> Result<Option<Field>, String> {
    match text {
        "subject" => Ok(Some(Field::Subject)),
        "body" => Ok(Some(Field::Body)),
        "none" | "" => Ok(None),
        other => Err(format!("unknown field: {other}")),
    }
}
