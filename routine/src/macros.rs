//! Named routine snippets

use regex::Regex;
use std::collections::BTreeMap;
use tracing::warn;

/// Macro name → routine text
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MacroTable {
    entries: BTreeMap<String, String>,
}

impl MacroTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a macro
    pub fn insert(&mut self, name: impl Into<String>, body: impl Into<String>) {
        self.entries.insert(name.into(), body.into());
    }

    /// Returns the body of a macro, as written
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries.get(name).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Macro names in sorted order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Every macro with its body fully expanded against the others
    pub fn expanded(&self) -> Vec<(String, String)> {
        let Some(pattern) = self.pattern() else {
            return Vec::new();
        };
        self.entries
            .iter()
            .map(|(name, body)| {
                let mut active = vec![name.as_str()];
                (name.clone(), self.expand_with(&pattern, body, &mut active))
            })
            .collect()
    }

    /// Replaces every whole-word macro name in `text` with its expansion
    ///
    /// Expansion recurses into macro bodies. A name met again inside its own
    /// expansion is left as written, so cycles terminate.
    pub fn expand(&self, text: &str) -> String {
        match self.pattern() {
            Some(pattern) => self.expand_with(&pattern, text, &mut Vec::new()),
            None => text.to_string(),
        }
    }

    fn expand_with<'a>(&'a self, pattern: &Regex, text: &str, active: &mut Vec<&'a str>) -> String {
        let mut out = String::with_capacity(text.len());
        let mut last = 0;

        for found in pattern.find_iter(text) {
            let Some((name, body)) = self.entries.get_key_value(found.as_str()) else {
                continue;
            };
            if active.contains(&name.as_str()) {
                continue;
            }
            out.push_str(&text[last..found.start()]);
            active.push(name);
            out.push_str(&self.expand_with(pattern, body, active));
            active.pop();
            last = found.end();
        }

        out.push_str(&text[last..]);
        out
    }

    /// One alternation over all names, longest first, bounded by word edges
    fn pattern(&self) -> Option<Regex> {
        if self.entries.is_empty() {
            return None;
        }
        let mut names: Vec<&String> = self.entries.keys().collect();
        names.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        let alternation = names
            .iter()
            .map(|name| regex::escape(name))
            .collect::<Vec<_>>()
            .join("|");

        match Regex::new(&format!(r"\b(?:{alternation})\b")) {
            Ok(re) => Some(re),
            Err(err) => {
                warn!(%err, "macro names do not form a usable pattern");
                None
            }
        }
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for MacroTable {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut table = Self::new();
        for (name, body) in iter {
            table.insert(name, body);
        }
        table
    }
}
