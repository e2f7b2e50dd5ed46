//! # Node Configuration
//!
//! The read-only settings a node is constructed from, loaded from JSON.
//!
//! ## Format
//!
//! ```json
//! {
//!   "id": 101,
//!   "name": "Miner1",
//!   "channels": { "*": "", "ops": "s3cret" },
//!   "macros": { "lights": "light/on --all" },
//!   "heartbeat_interval_secs": 2.0
//! }
//! ```
//!
//! Everything except `id` and `name` has a default. A host file holds a JSON
//! list of such objects; see [`load_list`].

use core_types::{NodeEnvironment, NodeId, Vector3};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Name of the channel every node joins unless told otherwise
pub const PUBLIC_CHANNEL: &str = "*";

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Node name must not be empty")]
    EmptyName,

    #[error("Channel name must not be empty")]
    EmptyChannelName,

    #[error("Passcode of channel '{0}' must be ASCII")]
    NonAsciiPasscode(String),

    #[error("Invalid macro name: '{0}'")]
    InvalidMacroName(String),

    #[error("Invalid {field}: {value}")]
    InvalidInterval { field: &'static str, value: f64 },

    #[error("Duplicate node id: {0}")]
    DuplicateId(NodeId),

    #[error("Duplicate node name: {0}")]
    DuplicateName(String),
}

fn default_channels() -> BTreeMap<String, String> {
    BTreeMap::from([(PUBLIC_CHANNEL.to_string(), String::new())])
}

fn default_heartbeat() -> f64 {
    2.0
}

fn default_position_interval() -> f64 {
    1.0
}

fn default_safe_radius() -> f64 {
    50.0
}

fn default_terminal_lines() -> usize {
    64
}

/// One node's settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeConfig {
    pub id: NodeId,
    pub name: String,
    /// Channel name → passcode; an empty passcode means cleartext
    #[serde(default = "default_channels")]
    pub channels: BTreeMap<String, String>,
    /// Macro name → routine text
    #[serde(default)]
    pub macros: BTreeMap<String, String>,
    #[serde(default = "default_heartbeat")]
    pub heartbeat_interval_secs: f64,
    #[serde(default = "default_position_interval")]
    pub position_interval_secs: f64,
    #[serde(default)]
    pub position: Vector3,
    #[serde(default)]
    pub speed: f64,
    #[serde(default = "default_safe_radius")]
    pub safe_radius: f64,
    #[serde(default = "default_terminal_lines")]
    pub terminal_lines: usize,
}

impl NodeConfig {
    /// A config with every optional field at its default
    pub fn new(id: NodeId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            channels: default_channels(),
            macros: BTreeMap::new(),
            heartbeat_interval_secs: default_heartbeat(),
            position_interval_secs: default_position_interval(),
            position: Vector3::ZERO,
            speed: 0.0,
            safe_radius: default_safe_radius(),
            terminal_lines: default_terminal_lines(),
        }
    }

    /// Adds or replaces a channel
    pub fn with_channel(mut self, name: &str, passcode: &str) -> Self {
        self.channels.insert(name.to_string(), passcode.to_string());
        self
    }

    /// Adds or replaces a macro
    pub fn with_macro(mut self, name: &str, body: &str) -> Self {
        self.macros.insert(name.to_string(), body.to_string());
        self
    }

    /// Parses and validates a single node object
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: NodeConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and validates a single node object from `path`
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        Self::from_json(&read(path)?)
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Checks everything serde cannot
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::EmptyName);
        }
        for (channel, passcode) in &self.channels {
            if channel.trim().is_empty() {
                return Err(ConfigError::EmptyChannelName);
            }
            if !passcode.is_ascii() {
                return Err(ConfigError::NonAsciiPasscode(channel.clone()));
            }
        }
        if let Some(name) = self.macros.keys().find(|name| !is_macro_name(name)) {
            return Err(ConfigError::InvalidMacroName(name.clone()));
        }
        check_interval("heartbeat_interval_secs", self.heartbeat_interval_secs)?;
        check_interval("position_interval_secs", self.position_interval_secs)?;
        check_interval("safe_radius", self.safe_radius)?;
        Ok(())
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::try_from_secs_f64(self.heartbeat_interval_secs).unwrap_or_default()
    }

    pub fn position_interval(&self) -> Duration {
        Duration::try_from_secs_f64(self.position_interval_secs).unwrap_or_default()
    }

    /// Position, speed and safe radius as stamped into message headers
    pub fn environment(&self) -> NodeEnvironment {
        NodeEnvironment {
            position: self.position,
            speed: self.speed,
            safe_radius: self.safe_radius,
        }
    }
}

fn is_macro_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_alphanumeric() || c == '_')
}

fn check_interval(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidInterval { field, value })
    }
}

fn read(path: &Path) -> Result<String, ConfigError> {
    debug!(path = %path.display(), "reading config");
    fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Parses and validates a JSON list of nodes
///
/// Ids and names must be unique across the list.
pub fn parse_list(text: &str) -> Result<Vec<NodeConfig>, ConfigError> {
    let configs: Vec<NodeConfig> = serde_json::from_str(text)?;
    let mut ids = BTreeSet::new();
    let mut names = BTreeSet::new();
    for config in &configs {
        config.validate()?;
        if !ids.insert(config.id) {
            return Err(ConfigError::DuplicateId(config.id));
        }
        if !names.insert(config.name.as_str()) {
            return Err(ConfigError::DuplicateName(config.name.clone()));
        }
    }
    Ok(configs)
}

/// Reads a JSON list of nodes from `path`
pub fn load_list(path: &Path) -> Result<Vec<NodeConfig>, ConfigError> {
    parse_list(&read(path)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_fill_missing_fields() {
        let config = NodeConfig::from_json(r#"{"id": 7, "name": "Miner1"}"#).unwrap();
        assert_eq!(config, NodeConfig::new(NodeId::new(7), "Miner1"));
        assert_eq!(config.channels.get(PUBLIC_CHANNEL).map(String::as_str), Some(""));
        assert_eq!(config.heartbeat_interval(), Duration::from_secs(2));
        assert_eq!(config.terminal_lines, 64);
    }

    #[test]
    fn test_full_object() {
        let config = NodeConfig::from_json(
            r#"{
                "id": 101,
                "name": "Mother",
                "channels": {"*": "", "ops": "pw"},
                "macros": {"lights": "light/on --all"},
                "heartbeat_interval_secs": 0.5,
                "position": {"x": 1.0, "y": 2.0, "z": 3.0},
                "safe_radius": 25.0
            }"#,
        )
        .unwrap();
        assert_eq!(config.channels.len(), 2);
        assert_eq!(config.macros["lights"], "light/on --all");
        assert_eq!(config.environment().position, Vector3::new(1.0, 2.0, 3.0));
        assert_eq!(config.environment().safe_radius, 25.0);
    }

    #[test]
    fn test_validation_errors() {
        let base = NodeConfig::new(NodeId::new(1), "A");

        let mut blank = base.clone();
        blank.name = " ".to_string();
        assert!(matches!(blank.validate(), Err(ConfigError::EmptyName)));

        let accented = base.clone().with_channel("ops", "clé");
        assert!(matches!(
            accented.validate(),
            Err(ConfigError::NonAsciiPasscode(channel)) if channel == "ops"
        ));

        let unnamed = base.clone().with_channel("", "pw");
        assert!(matches!(unnamed.validate(), Err(ConfigError::EmptyChannelName)));

        let spaced = base.clone().with_macro("two words", "ping");
        assert!(matches!(spaced.validate(), Err(ConfigError::InvalidMacroName(_))));

        let mut negative = base.clone();
        negative.heartbeat_interval_secs = -1.0;
        assert!(matches!(
            negative.validate(),
            Err(ConfigError::InvalidInterval {
                field: "heartbeat_interval_secs",
                ..
            })
        ));

        assert!(base.validate().is_ok());
    }

    #[test]
    fn test_bad_json_is_reported() {
        assert!(matches!(
            NodeConfig::from_json("{\"name\": \"x\"}"),
            Err(ConfigError::Json(_))
        ));
    }

    #[test]
    fn test_list_rejects_duplicates() {
        let dup_id = r#"[{"id": 1, "name": "A"}, {"id": 1, "name": "B"}]"#;
        assert!(matches!(parse_list(dup_id), Err(ConfigError::DuplicateId(_))));

        let dup_name = r#"[{"id": 1, "name": "A"}, {"id": 2, "name": "A"}]"#;
        assert!(matches!(parse_list(dup_name), Err(ConfigError::DuplicateName(_))));
    }

    #[test]
    fn test_load_list_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"id": 1, "name": "Alpha"}}, {{"id": 2, "name": "Bravo", "channels": {{"*": "", "ops": "k"}}}}]"#
        )
        .unwrap();

        let configs = load_list(file.path()).unwrap();
        assert_eq!(configs.len(), 2);
        assert_eq!(configs[1].channels["ops"], "k");
    }

    #[test]
    fn test_load_single_and_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("node.json");
        let config = NodeConfig::new(NodeId::new(3), "Charlie").with_macro("lights", "light/on");
        fs::write(&path, config.to_json().unwrap()).unwrap();

        assert_eq!(NodeConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.json");
        assert!(matches!(
            NodeConfig::load(&missing),
            Err(ConfigError::Io { .. })
        ));
    }
}
