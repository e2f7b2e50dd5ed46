//! World positions and per-node environment readings

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A point in world space
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vector3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vector3 {
    pub const ZERO: Vector3 = Vector3 {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Euclidean distance to another point
    pub fn distance(&self, other: &Vector3) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}

/// Renders as `X:1 Y:2 Z:3`, the same layout [`FromStr`] accepts.
impl fmt::Display for Vector3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "X:{} Y:{} Z:{}", self.x, self.y, self.z)
    }
}

/// Error returned when text is not a valid `X:.. Y:.. Z:..` triple
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseVectorError(pub String);

impl fmt::Display for ParseVectorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid vector: {}", self.0)
    }
}

impl std::error::Error for ParseVectorError {}

impl FromStr for Vector3 {
    type Err = ParseVectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseVectorError(s.to_string());
        let mut axes = [0.0f64; 3];
        let mut parts = s.split_whitespace();

        for (axis, label) in axes.iter_mut().zip(["X:", "Y:", "Z:"]) {
            let part = parts.next().ok_or_else(err)?;
            let value = part.strip_prefix(label).ok_or_else(err)?;
            *axis = value.parse().map_err(|_| err())?;
        }

        if parts.next().is_some() {
            return Err(err());
        }

        Ok(Vector3::new(axes[0], axes[1], axes[2]))
    }
}

/// Environment readings a node stamps into every outbound header
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct NodeEnvironment {
    /// Current world position
    pub position: Vector3,
    /// Current speed in m/s
    pub speed: f64,
    /// Radius around the node other nodes should keep clear of
    pub safe_radius: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vector_display_parses_back() {
        let v = Vector3::new(1.5, -2.0, 300.25);
        let parsed: Vector3 = v.to_string().parse().unwrap();
        assert_eq!(parsed, v);
    }

    #[test]
    fn test_vector_parse_rejects_missing_axis() {
        assert!("X:1 Y:2".parse::<Vector3>().is_err());
        assert!("X:1 Y:2 W:3".parse::<Vector3>().is_err());
        assert!("X:1 Y:2 Z:3 Q:4".parse::<Vector3>().is_err());
    }

    #[test]
    fn test_vector_distance() {
        let a = Vector3::new(0.0, 0.0, 0.0);
        let b = Vector3::new(3.0, 4.0, 0.0);
        assert_eq!(a.distance(&b), 5.0);
    }
}
