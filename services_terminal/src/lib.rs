//! # Terminal Service
//!
//! The node's operator-facing output.
//!
//! [`DisplaySink`] is the one seam every service prints through.
//! [`Terminal`] implements it as a bounded line buffer: once full, the oldest
//! lines are dropped.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

/// Default number of lines a terminal keeps
pub const DEFAULT_LINES: usize = 64;

/// Where operator-facing text goes
pub trait DisplaySink {
    fn print(&self, text: &str);
}

#[derive(Debug)]
struct TerminalState {
    lines: VecDeque<String>,
    capacity: usize,
}

/// A bounded line buffer
///
/// Cloning yields another handle onto the same buffer.
#[derive(Debug, Clone)]
pub struct Terminal {
    state: Rc<RefCell<TerminalState>>,
}

impl Terminal {
    /// Creates a terminal keeping at most `capacity` lines
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Rc::new(RefCell::new(TerminalState {
                lines: VecDeque::with_capacity(capacity),
                capacity,
            })),
        }
    }

    /// Appends text; multi-line text becomes several lines
    pub fn print(&self, text: &str) {
        let mut state = self.state.borrow_mut();
        if state.capacity == 0 {
            return;
        }
        for line in text.lines() {
            if state.lines.len() == state.capacity {
                state.lines.pop_front();
            }
            state.lines.push_back(line.to_string());
        }
    }

    /// Lines in print order, oldest first
    pub fn lines(&self) -> Vec<String> {
        self.state.borrow().lines.iter().cloned().collect()
    }

    /// The most recent line, if any
    pub fn last_line(&self) -> Option<String> {
        self.state.borrow().lines.back().cloned()
    }

    /// True if any kept line contains `needle`
    pub fn contains(&self, needle: &str) -> bool {
        self.state.borrow().lines.iter().any(|line| line.contains(needle))
    }

    pub fn len(&self) -> usize {
        self.state.borrow().lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.borrow().lines.is_empty()
    }

    pub fn clear(&self) {
        self.state.borrow_mut().lines.clear();
    }

    /// Renders `header`, a rule, then the lines newest first
    pub fn render(&self, header: &str) -> String {
        let state = self.state.borrow();
        let mut out = String::new();
        if !header.is_empty() {
            out.push_str(header);
            out.push('\n');
            out.push_str(&"-".repeat(40));
            out.push('\n');
        }
        for line in state.lines.iter().rev() {
            out.push_str(line);
            out.push('\n');
        }
        out
    }
}

impl Default for Terminal {
    fn default() -> Self {
        Self::new(DEFAULT_LINES)
    }
}

impl DisplaySink for Terminal {
    fn print(&self, text: &str) {
        Terminal::print(self, text);
    }
}
