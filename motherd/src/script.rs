//! # Host Script Parser
//!
//! Line-based scripts that drive a simulation run.
//!
//! ## Format
//!
//! - `tick <seconds>`: advance every node by that much simulated time
//! - `dump <node>`: print that node's terminal
//! - `<node> <routine>`: type a routine into that node
//! - `# comment` and blank lines are skipped
//!
//! ## Example
//!
//! ```text
//! # Let the cluster boot, then light up the miner
//! tick 2
//! Mother @Miner1 lights
//! tick 0.5
//! dump Miner1
//! ```

use services_clock::parse_seconds;
use std::collections::VecDeque;
use std::time::Duration;
use thiserror::Error;

/// Script error types
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScriptError {
    #[error("Parse error at line {line}: {message}")]
    ParseError { line: usize, message: String },

    #[error("Empty script")]
    EmptyScript,
}

/// A single scripted action
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptStep {
    /// Advance simulated time
    Tick(Duration),
    /// Operator input for a node
    Input { node: String, text: String },
    /// Print a node's terminal
    Dump(String),
}

/// A parsed host script
#[derive(Debug, Clone, Default)]
pub struct HostScript {
    steps: VecDeque<ScriptStep>,
}

impl HostScript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a script from text
    pub fn from_text(text: &str) -> Result<Self, ScriptError> {
        let mut steps = VecDeque::new();

        for (index, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            steps.push_back(Self::parse_line(line, index + 1)?);
        }

        if steps.is_empty() {
            return Err(ScriptError::EmptyScript);
        }
        Ok(Self { steps })
    }

    fn parse_line(line: &str, line_num: usize) -> Result<ScriptStep, ScriptError> {
        let error = |message: String| ScriptError::ParseError {
            line: line_num,
            message,
        };
        let (head, rest) = match line.split_once(char::is_whitespace) {
            Some((head, rest)) => (head, rest.trim()),
            None => (line, ""),
        };

        match head {
            "tick" => parse_seconds(rest)
                .map(ScriptStep::Tick)
                .ok_or_else(|| error(format!("Invalid tick duration: '{}'", rest))),
            "dump" if rest.is_empty() => Err(error("Missing node name for dump".to_string())),
            "dump" => Ok(ScriptStep::Dump(rest.to_string())),
            _ if rest.is_empty() => Err(error(format!("Missing input for node {}", head))),
            _ => Ok(ScriptStep::Input {
                node: head.to_string(),
                text: rest.to_string(),
            }),
        }
    }

    /// Takes the next step
    pub fn next_step(&mut self) -> Option<ScriptStep> {
        self.steps.pop_front()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}
