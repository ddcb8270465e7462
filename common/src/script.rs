// Event-title script parsing

use crate::models::{Action, ActionScript};

/// Parse an event title into an ordered action script.
///
/// The title is a tiny command language: actions are separated by `;`,
/// tokens within an action by whitespace, and the first token of an action
/// is the command name. The remaining tokens are kept as raw string
/// arguments; typed conversion happens in the command handler.
///
/// Empty and whitespace-only segments are skipped silently, so a trailing
/// `;` yields fewer actions than separators. Command names are not validated
/// here; an unknown name surfaces as an execution-time error.
pub fn parse(title: &str) -> ActionScript {
    let mut actions = Vec::new();
    for segment in title.split(';') {
        let mut tokens = segment.split_whitespace();
        let Some(command) = tokens.next() else {
            continue;
        };
        actions.push(Action {
            command: command.to_string(),
            args: tokens.map(str::to_string).collect(),
        });
    }
    ActionScript::new(actions)
}
