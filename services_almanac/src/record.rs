//! Address book records

use codec::{Value, ValueMap};
use core_types::{NodeEnvironment, Vector3};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors decoding a stored record
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RecordError {
    #[error("Missing field: {0}")]
    MissingField(&'static str),

    #[error("Invalid {field}: '{value}'")]
    InvalidField { field: &'static str, value: String },
}

/// What a record describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    /// Another node
    Grid,
    /// A named position
    Waypoint,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Grid => "grid",
            EntityKind::Waypoint => "waypoint",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = RecordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "grid" => Ok(EntityKind::Grid),
            "waypoint" => Ok(EntityKind::Waypoint),
            other => Err(RecordError::InvalidField {
                field: "EntityType",
                value: other.to_string(),
            }),
        }
    }
}

/// Identification friend-or-foe status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Transponder {
    /// This node itself
    Local,
    Friendly,
    #[default]
    Neutral,
    Hostile,
}

impl Transponder {
    pub fn as_str(&self) -> &'static str {
        match self {
            Transponder::Local => "Local",
            Transponder::Friendly => "Friendly",
            Transponder::Neutral => "Neutral",
            Transponder::Hostile => "Hostile",
        }
    }
}

impl fmt::Display for Transponder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Transponder {
    type Err = RecordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Local" => Ok(Transponder::Local),
            "Friendly" => Ok(Transponder::Friendly),
            "Neutral" => Ok(Transponder::Neutral),
            "Hostile" => Ok(Transponder::Hostile),
            other => Err(RecordError::InvalidField {
                field: "Transponder",
                value: other.to_string(),
            }),
        }
    }
}

/// One address book entry
#[derive(Debug, Clone, PartialEq)]
pub struct NodeRecord {
    /// Node id for grids, free text for waypoints
    pub id: String,
    pub kind: EntityKind,
    pub position: Vector3,
    pub speed: f64,
    pub safe_radius: f64,
    /// Display names this record answers to, in the order first seen
    pub nicknames: Vec<String>,
    /// Channels the node has been heard on
    pub channels: BTreeSet<String>,
    pub transponder: Transponder,
    /// Recency stamp; higher is newer
    pub updated_at: u64,
}

impl NodeRecord {
    /// A grid record at the given environment
    pub fn grid(id: impl Into<String>, environment: NodeEnvironment) -> Self {
        Self {
            id: id.into(),
            kind: EntityKind::Grid,
            position: environment.position,
            speed: environment.speed,
            safe_radius: environment.safe_radius,
            nicknames: Vec::new(),
            channels: BTreeSet::new(),
            transponder: Transponder::default(),
            updated_at: 0,
        }
    }

    /// A waypoint record
    pub fn waypoint(id: impl Into<String>, position: Vector3) -> Self {
        Self {
            kind: EntityKind::Waypoint,
            ..Self::grid(
                id,
                NodeEnvironment {
                    position,
                    ..NodeEnvironment::default()
                },
            )
        }
    }

    /// Adds a nickname unless already present or blank
    pub fn add_nickname(&mut self, nickname: &str) -> bool {
        if nickname.is_empty() || self.nicknames.iter().any(|n| n == nickname) {
            return false;
        }
        self.nicknames.push(nickname.to_string());
        true
    }

    /// True if `identifier` is this record's id or one of its nicknames
    pub fn matches(&self, identifier: &str) -> bool {
        self.id == identifier || self.nicknames.iter().any(|n| n == identifier)
    }

    /// The first nickname, or the id when there is none
    pub fn display_name(&self) -> &str {
        self.nicknames.first().map_or(self.id.as_str(), String::as_str)
    }

    /// Encodes the record as codec fields
    pub fn to_fields(&self) -> ValueMap {
        let mut fields = ValueMap::new();
        fields.insert("Id".into(), self.id.as_str().into());
        fields.insert("EntityType".into(), self.kind.as_str().into());
        fields.insert("pos".into(), self.position.to_string().into());
        fields.insert("Speed".into(), self.speed.to_string().into());
        fields.insert("SafeRadius".into(), self.safe_radius.to_string().into());
        fields.insert("Nicknames".into(), string_list(self.nicknames.iter()));
        fields.insert("Channels".into(), string_list(self.channels.iter()));
        fields.insert("Transponder".into(), self.transponder.as_str().into());
        fields.insert("UpdatedAt".into(), self.updated_at.to_string().into());
        fields
    }

    /// Decodes a record written by [`NodeRecord::to_fields`]
    ///
    /// Id, entity type and position are required; other fields fall back to
    /// defaults when absent.
    pub fn from_fields(fields: &ValueMap) -> Result<Self, RecordError> {
        let id = required(fields, "Id")?;
        let kind: EntityKind = required(fields, "EntityType")?.parse()?;
        let pos = required(fields, "pos")?;
        let position: Vector3 = pos.parse().map_err(|_| RecordError::InvalidField {
            field: "pos",
            value: pos.to_string(),
        })?;

        let mut record = Self::grid(
            id,
            NodeEnvironment {
                position,
                speed: number(fields, "Speed")?,
                safe_radius: number(fields, "SafeRadius")?,
            },
        );
        record.kind = kind;
        record.nicknames = strings(fields, "Nicknames");
        record.channels = strings(fields, "Channels").into_iter().collect();
        if let Some(transponder) = text(fields, "Transponder") {
            record.transponder = transponder.parse()?;
        }
        if let Some(stamp) = text(fields, "UpdatedAt") {
            record.updated_at = stamp.parse().map_err(|_| RecordError::InvalidField {
                field: "UpdatedAt",
                value: stamp.to_string(),
            })?;
        }
        Ok(record)
    }
}

fn string_list<'a>(items: impl Iterator<Item = &'a String>) -> Value {
    Value::List(items.map(|s| Value::from(s.as_str())).collect())
}

fn text<'a>(fields: &'a ValueMap, key: &str) -> Option<&'a str> {
    fields.get(key).and_then(Value::as_str)
}

fn required<'a>(fields: &'a ValueMap, key: &'static str) -> Result<&'a str, RecordError> {
    text(fields, key)
        .filter(|s| !s.is_empty())
        .ok_or(RecordError::MissingField(key))
}

fn number(fields: &ValueMap, key: &'static str) -> Result<f64, RecordError> {
    match text(fields, key) {
        None => Ok(0.0),
        Some(s) => s.parse().map_err(|_| RecordError::InvalidField {
            field: key,
            value: s.to_string(),
        }),
    }
}

fn strings(fields: &ValueMap, key: &str) -> Vec<String> {
    fields
        .get(key)
        .and_then(Value::as_list)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fields_round_trip() {
        let mut record = NodeRecord::grid(
            "144115188075855873",
            NodeEnvironment {
                position: Vector3::new(1.5, -2.0, 3.0),
                speed: 12.5,
                safe_radius: 40.0,
            },
        );
        record.add_nickname("Miner1");
        record.channels.insert("*".to_string());
        record.transponder = Transponder::Friendly;
        record.updated_at = 9;

        let decoded = NodeRecord::from_fields(&record.to_fields()).unwrap();
        assert_eq!(decoded, record);
    }

    #[test]
    fn test_missing_required_field() {
        let mut fields = NodeRecord::waypoint("Dock", Vector3::ZERO).to_fields();
        fields.remove("pos");
        assert_eq!(
            NodeRecord::from_fields(&fields),
            Err(RecordError::MissingField("pos"))
        );
    }

    #[test]
    fn test_invalid_kind() {
        let mut fields = NodeRecord::waypoint("Dock", Vector3::ZERO).to_fields();
        fields.insert("EntityType".into(), "asteroid".into());
        assert!(matches!(
            NodeRecord::from_fields(&fields),
            Err(RecordError::InvalidField { field: "EntityType", .. })
        ));
    }

    #[test]
    fn test_nicknames_are_unique() {
        let mut record = NodeRecord::grid("1", NodeEnvironment::default());
        assert!(record.add_nickname("A"));
        assert!(!record.add_nickname("A"));
        assert!(!record.add_nickname(""));
        assert_eq!(record.display_name(), "A");
        assert!(record.matches("A"));
        assert!(record.matches("1"));
    }
}
