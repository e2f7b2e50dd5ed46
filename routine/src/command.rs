//! Single commands

use crate::ParseError;
use std::collections::BTreeMap;
use std::fmt;

/// One parsed command
///
/// Immutable once parsed; `name` is never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    name: String,
    arguments: Vec<String>,
    options: BTreeMap<String, String>,
    raw: String,
}

impl Command {
    /// Parses one command
    ///
    /// Terms starting with `--` are options: `--key=value`, or `--key` which
    /// stores `"true"`. A repeated option keeps its last value. The first
    /// remaining term is the name; the rest are arguments in order.
    pub fn parse(text: &str) -> Result<Self, ParseError> {
        let raw = text.replace('\r', "").trim().to_string();
        let mut positional = Vec::new();
        let mut options = BTreeMap::new();

        for term in split_terms(&raw) {
            match term.strip_prefix("--") {
                Some(option) => {
                    let (key, value) = option.split_once('=').unwrap_or((option, "true"));
                    options.insert(key.to_string(), value.to_string());
                }
                None => positional.push(term),
            }
        }

        if positional.is_empty() {
            return Err(ParseError::EmptyCommand(raw));
        }
        let name = positional.remove(0);

        Ok(Self {
            name,
            arguments: positional,
            options,
            raw,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn arguments(&self) -> &[String] {
        &self.arguments
    }

    /// Returns the argument at `index`, if present
    pub fn argument(&self, index: usize) -> Option<&str> {
        self.arguments.get(index).map(String::as_str)
    }

    pub fn options(&self) -> &BTreeMap<String, String> {
        &self.options
    }

    /// Returns an option's value, or `""` when absent
    pub fn option(&self, key: &str) -> &str {
        self.options.get(key).map_or("", String::as_str)
    }

    /// Returns true if the option was given as a flag or with any value
    pub fn has_option(&self, key: &str) -> bool {
        self.options.contains_key(key)
    }

    /// The trimmed text this command was parsed from
    pub fn raw(&self) -> &str {
        &self.raw
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Splits on whitespace, keeping double-quoted spans together
///
/// Quotes are dropped. A closing quote always ends a term, so `""` yields an
/// empty term. An unclosed quote runs to the end of the input.
fn split_terms(input: &str) -> Vec<String> {
    let mut terms = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for c in input.chars() {
        if c == '"' {
            if in_quotes {
                terms.push(std::mem::take(&mut current));
            }
            in_quotes = !in_quotes;
        } else if c.is_whitespace() && !in_quotes {
            if !current.is_empty() {
                terms.push(std::mem::take(&mut current));
            }
        } else {
            current.push(c);
        }
    }

    if !current.trim().is_empty() {
        terms.push(current);
    }
    terms
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_name_arguments_and_options() {
        let command =
            Command::parse(r#"light/blink "Light 1" --interval=0.5 --length=0.25 --offset=0.1"#)
                .unwrap();

        assert_eq!(command.name(), "light/blink");
        assert_eq!(command.arguments(), &["Light 1".to_string()]);
        assert_eq!(command.option("interval"), "0.5");
        assert_eq!(command.option("length"), "0.25");
        assert_eq!(command.option("offset"), "0.1");
        assert_eq!(command.options().len(), 3);
    }

    #[test]
    fn test_negative_number_stays_an_argument() {
        let command = Command::parse("rotor/rotate -45 --speed=100 --delay=0.5 --force").unwrap();

        assert_eq!(command.name(), "rotor/rotate");
        assert_eq!(command.arguments(), &["-45".to_string()]);
        assert_eq!(command.option("speed"), "100");
        assert_eq!(command.option("delay"), "0.5");
        assert_eq!(command.option("force"), "true");
        assert_eq!(command.options().len(), 3);
    }

    #[test]
    fn test_flag_option_stores_true() {
        let command = Command::parse("purge --force").unwrap();
        assert_eq!(command.option("force"), "true");
        assert!(command.has_option("force"));
        assert_eq!(command.option("missing"), "");
        assert!(!command.has_option("missing"));
    }

    #[test]
    fn test_options_may_precede_name() {
        let command = Command::parse("--force purge almanac").unwrap();
        assert_eq!(command.name(), "purge");
        assert_eq!(command.argument(0), Some("almanac"));
        assert_eq!(command.argument(1), None);
    }

    #[test]
    fn test_option_value_keeps_later_equals_signs() {
        let command = Command::parse("set --expr=a=b").unwrap();
        assert_eq!(command.option("expr"), "a=b");
    }

    #[test]
    fn test_repeated_option_keeps_last_value() {
        let command = Command::parse("move --speed=1 --speed=2").unwrap();
        assert_eq!(command.option("speed"), "2");
    }

    #[test]
    fn test_quotes_keep_spaces_and_are_stripped() {
        let command = Command::parse(r#"print   "hello   world"  again "" "#).unwrap();
        assert_eq!(
            command.arguments(),
            &["hello   world".to_string(), "again".to_string(), String::new()]
        );
    }

    #[test]
    fn test_raw_is_trimmed_text() {
        let command = Command::parse("  ping\r ").unwrap();
        assert_eq!(command.raw(), "ping");
        assert_eq!(command.to_string(), "ping");
    }

    #[test]
    fn test_empty_or_options_only_fails() {
        assert_eq!(
            Command::parse("   "),
            Err(ParseError::EmptyCommand(String::new()))
        );
        assert!(matches!(
            Command::parse("--force --all"),
            Err(ParseError::EmptyCommand(_))
        ));
    }
}
