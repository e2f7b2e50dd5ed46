//! Unique identifiers for system entities

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Transport address of a node
///
/// Nodes are addressed by the numeric id their transport assigns them. The
/// id is carried as text in message headers (`OriginId`, `TargetId`) and
/// parsed back on receipt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(i64);

impl NodeId {
    /// Creates a node ID from its raw transport value
    pub const fn new(raw: i64) -> Self {
        Self(raw)
    }

    /// Returns the raw transport value
    pub const fn as_i64(&self) -> i64 {
        self.0
    }

    /// Returns the last five digits, used as a short display handle
    pub fn short(&self) -> String {
        let full = self.0.to_string();
        let start = full.len().saturating_sub(5);
        full[start..].to_string()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Error returned when text is not a valid node id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseNodeIdError(pub String);

impl fmt::Display for ParseNodeIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid node id: {}", self.0)
    }
}

impl std::error::Error for ParseNodeIdError {}

impl FromStr for NodeId {
    type Err = ParseNodeIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<i64>()
            .map(NodeId)
            .map_err(|_| ParseNodeIdError(s.to_string()))
    }
}

impl From<i64> for NodeId {
    fn from(raw: i64) -> Self {
        Self(raw)
    }
}
