//! Position value object - a point in world space.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::DomainError;

/// A point in world space.
///
/// # Invariants
///
/// - All components are finite when built through [`Position::try_new`] or
///   parsed from text.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Position {
    /// Spawn point used when neither the world nor the caller names one.
    pub const DEFAULT_SPAWN: Position = Position::new(0.0, 64.0, 0.0);

    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Create a position, rejecting NaN and infinite components.
    pub fn try_new(x: f64, y: f64, z: f64) -> Result<Self, DomainError> {
        if !(x.is_finite() && y.is_finite() && z.is_finite()) {
            return Err(DomainError::validation(
                "Position components must be finite",
            ));
        }
        Ok(Self::new(x, y, z))
    }

    /// Parse three separate textual components (as typed in a command).
    pub fn from_components(x: &str, y: &str, z: &str) -> Result<Self, DomainError> {
        let parse = |axis: &str, raw: &str| {
            raw.trim()
                .parse::<f64>()
                .map_err(|_| DomainError::parse(format!("invalid {axis} coordinate: {raw}")))
        };
        Self::try_new(parse("x", x)?, parse("y", y)?, parse("z", z)?)
    }
}

impl Default for Position {
    fn default() -> Self {
        Self::DEFAULT_SPAWN
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// Accepts `x y z` or `x,y,z`.
impl FromStr for Position {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|p| !p.is_empty())
            .collect();
        match parts.as_slice() {
            [x, y, z] => Self::from_components(x, y, z),
            _ => Err(DomainError::parse(format!(
                "expected three coordinates, got '{s}'"
            ))),
        }
    }
}
