use std::fmt;

use serde::{Deserialize, Serialize};

pub mod client;
pub mod config;
pub mod error;
pub mod local;
pub mod map;
pub mod memory;
pub mod navigator;
pub mod run;

pub use error::{MazeError, SessionAction};

/// Represents a 2D coordinate on the maze.
///
/// The remote service owns the coordinate system, so components are signed
/// and compared by exact equality only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub x: i64,
    pub y: i64,
}

impl Position {
    pub const fn new(x: i64, y: i64) -> Self {
        Position { x, y }
    }

    /// Returns true if `other` is one orthogonal step away.
    pub fn is_adjacent(self, other: Position) -> bool {
        (self.x - other.x).abs() + (self.y - other.y).abs() == 1
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Classification of a tile as reported by discovery.
///
/// Informational only: movement decisions rely on [`Tile::traversable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TileKind {
    Path,
    Wall,
    Trap,
    Exit,
}

/// A neighbouring tile returned by a discovery call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tile {
    pub x: i64,
    pub y: i64,
    #[serde(rename = "move")]
    pub traversable: bool,
    #[serde(rename = "value")]
    pub kind: TileKind,
}

impl Tile {
    pub fn position(&self) -> Position {
        Position::new(self.x, self.y)
    }
}

/// The live action endpoints of a session.
///
/// Both URLs are rotated by the server after every move; only the most
/// recently issued pair may be used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub move_url: String,
    pub discover_url: String,
}

/// Result of starting a new session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionStart {
    pub position: Position,
    pub endpoints: Endpoints,
}

/// Server answer to a move attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveResult {
    pub position: Position,
    pub dead: bool,
    pub win: bool,
    pub endpoints: Endpoints,
}

/// Terminal result of an exploration.
///
/// Fatal failures are reported as [`MazeError`] instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Victory { position: Position },
    Exhausted,
}

impl Outcome {
    pub fn is_victory(&self) -> bool {
        matches!(self, Outcome::Victory { .. })
    }
}
