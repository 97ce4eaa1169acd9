use std::{env, time::Duration};

use crate::MazeError;

/// Public deployment of the maze service.
pub const DEFAULT_BASE_URL: &str = "https://hire-game-maze.pertimm.dev";

/// Environment variable holding the player identity.
pub const PLAYER_ENV: &str = "PLAYER_NAME";

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Resolves the player identity: `explicit` wins, then `PLAYER_NAME`.
pub fn resolve_player(explicit: Option<&str>) -> Result<String, MazeError> {
    let candidate = match explicit {
        Some(name) => Some(name.to_string()),
        None => env::var(PLAYER_ENV).ok(),
    };
    validate_player(candidate)
}

fn validate_player(candidate: Option<String>) -> Result<String, MazeError> {
    match candidate.map(|name| name.trim().to_string()) {
        Some(name) if !name.is_empty() => Ok(name),
        Some(_) => Err(MazeError::Config(format!("{PLAYER_ENV} is blank"))),
        None => Err(MazeError::Config(format!(
            "{PLAYER_ENV} env variable is not defined"
        ))),
    }
}
