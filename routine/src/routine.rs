//! Routines: addressed sequences of commands

use crate::{Command, MacroTable, ParseError};

/// Target of a routine with no address
pub const SELF_TARGET: &str = "self";

/// Target addressing every known remote node
pub const ALL_TARGETS: &str = "*";

/// A parsed routine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Routine {
    target: String,
    commands: Vec<Command>,
    expanded_text: Option<String>,
}

impl Routine {
    /// Parses a routine
    ///
    /// A leading `@name` term addresses node `name`; a leading `*` term
    /// addresses every known node. The rest is split on `;` outside double
    /// quotes and each non-blank segment is parsed as a [`Command`].
    pub fn parse(text: &str) -> Result<Self, ParseError> {
        let text = text.trim();
        let (target, body) = split_target(text);

        let commands = split_commands(body)
            .into_iter()
            .map(Command::parse)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            target,
            commands,
            expanded_text: None,
        })
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// True when the routine runs on this node
    pub fn is_local(&self) -> bool {
        self.target.is_empty() || self.target == SELF_TARGET
    }

    /// True when the routine addresses every known node
    pub fn is_broadcast(&self) -> bool {
        self.target == ALL_TARGETS
    }

    /// The macro-expanded text, once [`Routine::unpack`] has run
    pub fn expanded_text(&self) -> Option<&str> {
        self.expanded_text.as_deref()
    }

    /// Expands macros in every command and records the result
    ///
    /// Each expanded command is followed by `;`, keeping any spacing a macro
    /// body carries, then repeated, leading and trailing separators outside
    /// quotes are collapsed. `ping;help` unpacks to `ping;help;`.
    pub fn unpack(&mut self, macros: &MacroTable) -> &str {
        let joined: String = self
            .commands
            .iter()
            .map(|command| format!("{};", macros.expand(command.raw())))
            .collect();

        self.expanded_text.insert(collapse_separators(&joined)).as_str()
    }
}

/// Separates a leading `@name` or `*` term from the rest of the text
fn split_target(text: &str) -> (String, &str) {
    let first = text.split_whitespace().next().unwrap_or("");

    if first == ALL_TARGETS {
        return (ALL_TARGETS.to_string(), &text[first.len()..]);
    }
    match first.strip_prefix('@') {
        Some(name) if !name.is_empty() => (name.to_string(), &text[first.len()..]),
        _ => (SELF_TARGET.to_string(), text),
    }
}

/// Drops `;` separators that are leading or follow another separator
///
/// Separators inside double quotes are kept. A non-empty result always ends
/// with exactly one `;`.
fn collapse_separators(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_quotes = false;

    for c in text.chars() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                out.push(c);
            }
            ';' if !in_quotes => {
                let tail = out.trim_end();
                if !tail.is_empty() && !tail.ends_with(';') {
                    out.push(c);
                }
            }
            _ => out.push(c),
        }
    }

    let mut out = out.trim().to_string();
    if !out.is_empty() && !out.ends_with(';') {
        out.push(';');
    }
    out
}

/// Splits on `;` outside double quotes, returning trimmed non-blank segments
fn split_commands(text: &str) -> Vec<&str> {
    let mut segments = Vec::new();
    let mut in_quotes = false;
    let mut start = 0;

    for (i, c) in text.char_indices() {
        match c {
            '"' => in_quotes = !in_quotes,
            ';' if !in_quotes => {
                segments.push(&text[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    segments.push(&text[start..]);

    segments
        .into_iter()
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
        .collect()
}
