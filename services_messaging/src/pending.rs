//! Calls waiting for a response

use ipc::{MessageId, Response};
use std::collections::HashMap;

/// Runs when the matching response arrives
pub type Continuation = Box<dyn FnOnce(&Response)>;

/// Message id → optional continuation
#[derive(Default)]
pub struct PendingCalls {
    entries: HashMap<MessageId, Option<Continuation>>,
}

impl PendingCalls {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a call; a later registration under the same id replaces it
    pub fn register(&mut self, id: MessageId, continuation: Option<Continuation>) {
        self.entries.insert(id, continuation);
    }

    /// Removes the entry for `id`
    ///
    /// The outer `Option` tells whether the id was pending at all.
    pub fn take(&mut self, id: &MessageId) -> Option<Option<Continuation>> {
        self.entries.remove(id)
    }

    pub fn contains(&self, id: &MessageId) -> bool {
        self.entries.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drops every pending call and returns how many there were
    ///
    /// Responses to dropped calls are no longer delivered.
    pub fn clear(&mut self) -> usize {
        let dropped = self.entries.len();
        self.entries.clear();
        dropped
    }
}
