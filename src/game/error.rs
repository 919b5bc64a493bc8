//! Recoverable error types for the bubble field.
//!
//! Nothing here is fatal to a session: placement and invariant problems are
//! corrected in place, and IO problems fall back to defaults after a warning.

use std::{fmt, io, path::PathBuf};

use super::hex::CellCoord;

/// No legal empty cell could be found for a landing projectile.
#[derive(Debug, Clone, PartialEq)]
pub enum PlacementError {
    /// Every candidate around the contact point is occupied or overlapping,
    /// and the top rows are full as well.
    NoFreeCell {
        /// Estimated cell under the contact point.
        near: CellCoord,
    },
}

impl fmt::Display for PlacementError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlacementError::NoFreeCell { near } => {
                write!(f, "no free cell to place a bubble near {}", near)
            }
        }
    }
}

impl std::error::Error for PlacementError {}

/// A broken field invariant, found by [`super::grid::FieldStore::check_invariants`].
#[derive(Debug, Clone, PartialEq)]
pub enum InvariantViolation {
    /// An anchored bubble with no path to the anchor row.
    Disconnected { cell: CellCoord },
    /// Two anchored bubbles closer than the allowed minimum distance.
    Overlap {
        a: CellCoord,
        b: CellCoord,
        distance: f32,
    },
    /// A bubble whose stored position drifted away from its cell.
    Misplaced { cell: CellCoord, drift: f32 },
}

impl fmt::Display for InvariantViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvariantViolation::Disconnected { cell } => {
                write!(f, "bubble at {} is not connected to the anchor row", cell)
            }
            InvariantViolation::Overlap { a, b, distance } => {
                write!(f, "bubbles at {} and {} overlap ({:.2}px apart)", a, b, distance)
            }
            InvariantViolation::Misplaced { cell, drift } => {
                write!(f, "bubble at {} drifted {:.2}px from its cell", cell, drift)
            }
        }
    }
}

impl std::error::Error for InvariantViolation {}

/// Configuration could not be read or is out of range.
#[derive(Debug)]
pub enum ConfigError {
    Io { path: PathBuf, source: io::Error },
    Parse(serde_json::Error),
    OutOfRange {
        field: &'static str,
        value: f64,
        expected: &'static str,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io { path, source } => {
                write!(f, "failed to read config {:?}: {}", path, source)
            }
            ConfigError::Parse(e) => write!(f, "failed to parse config: {}", e),
            ConfigError::OutOfRange {
                field,
                value,
                expected,
            } => write!(f, "config '{}' = {} is out of range (expected {})", field, value, expected),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io { source, .. } => Some(source),
            ConfigError::Parse(e) => Some(e),
            ConfigError::OutOfRange { .. } => None,
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(e: serde_json::Error) -> Self {
        ConfigError::Parse(e)
    }
}

/// High score file could not be read or written.
#[derive(Debug)]
pub enum HighScoreError {
    NoDataDir,
    Io { path: PathBuf, source: io::Error },
    Format(serde_json::Error),
}

impl fmt::Display for HighScoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HighScoreError::NoDataDir => write!(f, "could not determine data directory"),
            HighScoreError::Io { path, source } => {
                write!(f, "high score file {:?}: {}", path, source)
            }
            HighScoreError::Format(e) => write!(f, "high score format: {}", e),
        }
    }
}

impl std::error::Error for HighScoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            HighScoreError::NoDataDir => None,
            HighScoreError::Io { source, .. } => Some(source),
            HighScoreError::Format(e) => Some(e),
        }
    }
}

impl From<serde_json::Error> for HighScoreError {
    fn from(e: serde_json::Error) -> Self {
        HighScoreError::Format(e)
    }
}
