use std::fmt;

use crate::Position;

/// The remote operation that produced an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionAction {
    Start,
    Discover,
    Move,
}

impl fmt::Display for SessionAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionAction::Start => "start game",
            SessionAction::Discover => "discover",
            SessionAction::Move => "move",
        };
        f.write_str(name)
    }
}

/// Errors that abort a maze run.
///
/// Dead ends are not errors; the navigator recovers from them by backtracking.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MazeError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("failed to {action}: {status} - {body}")]
    Transport {
        action: SessionAction,
        status: u16,
        body: String,
    },

    #[error("failed to {action}: request did not complete: {message}")]
    Connection {
        action: SessionAction,
        message: String,
    },

    #[error("failed to {action}: unexpected response body: {message}")]
    Protocol {
        action: SessionAction,
        message: String,
    },

    #[error("player died while backtracking to {position}")]
    LostOnBacktrack { position: Position },

    #[error("backtrack to {expected} landed on {actual}")]
    BacktrackDiverged { expected: Position, actual: Position },
}
