//! Session client for the remote maze service.
//!
//! The service hands out capability URLs that rotate after every move. The
//! client keeps no state of its own: callers pass the URL to use on every call.

use std::time::Duration;

use reqwest::blocking::{Client, Response};
use serde::{Deserialize, de::DeserializeOwned};
use tracing::debug;

use crate::{Endpoints, MazeError, MoveResult, Position, SessionAction, SessionStart, Tile};

/// The three remote operations a navigator needs.
///
/// Implementations perform I/O only; legality of a move is decided by the
/// service, not checked locally.
pub trait MazeSession {
    /// Starts a new game for `player` and returns the initial position and endpoints.
    fn start_session(&mut self, player: &str) -> Result<SessionStart, MazeError>;

    /// Lists the tiles around the current position.
    fn discover_tiles(&mut self, discover_url: &str) -> Result<Vec<Tile>, MazeError>;

    /// Tries to move the player to `target`.
    fn attempt_move(&mut self, move_url: &str, target: Position) -> Result<MoveResult, MazeError>;
}

impl<S: MazeSession + ?Sized> MazeSession for &mut S {
    fn start_session(&mut self, player: &str) -> Result<SessionStart, MazeError> {
        (**self).start_session(player)
    }

    fn discover_tiles(&mut self, discover_url: &str) -> Result<Vec<Tile>, MazeError> {
        (**self).discover_tiles(discover_url)
    }

    fn attempt_move(&mut self, move_url: &str, target: Position) -> Result<MoveResult, MazeError> {
        (**self).attempt_move(move_url, target)
    }
}

/// Body of `POST /start-game/`.
#[derive(Debug, Deserialize)]
struct StartGameBody {
    position_x: i64,
    position_y: i64,
    url_move: String,
    url_discover: String,
}

impl From<StartGameBody> for SessionStart {
    fn from(body: StartGameBody) -> Self {
        SessionStart {
            position: Position::new(body.position_x, body.position_y),
            endpoints: Endpoints {
                move_url: body.url_move,
                discover_url: body.url_discover,
            },
        }
    }
}

/// Body of `POST <url_move>`. Some deployments echo `player` back; it is ignored.
#[derive(Debug, Deserialize)]
struct MoveBody {
    position_x: i64,
    position_y: i64,
    dead: bool,
    win: bool,
    url_move: String,
    url_discover: String,
}

impl From<MoveBody> for MoveResult {
    fn from(body: MoveBody) -> Self {
        MoveResult {
            position: Position::new(body.position_x, body.position_y),
            dead: body.dead,
            win: body.win,
            endpoints: Endpoints {
                move_url: body.url_move,
                discover_url: body.url_discover,
            },
        }
    }
}

/// Blocking HTTP implementation of [`MazeSession`].
#[derive(Debug, Clone)]
pub struct HttpSession {
    http: Client,
    base_url: String,
}

impl HttpSession {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, MazeError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| MazeError::Config(format!("failed to create HTTP client: {e}")))?;

        Ok(HttpSession {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Endpoint URLs are normally absolute; relative ones are joined to the base URL.
    fn resolve(&self, url: &str) -> String {
        resolve_url(&self.base_url, url)
    }
}

impl MazeSession for HttpSession {
    fn start_session(&mut self, player: &str) -> Result<SessionStart, MazeError> {
        if player.trim().is_empty() {
            return Err(MazeError::Config("player name is empty".to_string()));
        }

        let url = format!("{}/start-game/", self.base_url);
        debug!(%url, player, "starting session");
        let response = self.http.post(&url).form(&[("player", player)]).send();
        let body: StartGameBody = read_json(SessionAction::Start, response)?;
        Ok(body.into())
    }

    fn discover_tiles(&mut self, discover_url: &str) -> Result<Vec<Tile>, MazeError> {
        let response = self.http.get(self.resolve(discover_url)).send();
        read_json(SessionAction::Discover, response)
    }

    fn attempt_move(&mut self, move_url: &str, target: Position) -> Result<MoveResult, MazeError> {
        let form = [
            ("position_x", target.x.to_string()),
            ("position_y", target.y.to_string()),
        ];
        let response = self.http.post(self.resolve(move_url)).form(&form).send();
        let body: MoveBody = read_json(SessionAction::Move, response)?;
        Ok(body.into())
    }
}

fn resolve_url(base_url: &str, url: &str) -> String {
    if url.starts_with("http://") || url.starts_with("https://") {
        url.to_string()
    } else {
        format!(
            "{}/{}",
            base_url.trim_end_matches('/'),
            url.trim_start_matches('/')
        )
    }
}

fn read_json<T: DeserializeOwned>(
    action: SessionAction,
    response: reqwest::Result<Response>,
) -> Result<T, MazeError> {
    let connection_error = |e: reqwest::Error| MazeError::Connection {
        action,
        message: e.to_string(),
    };
    let response = response.map_err(connection_error)?;
    let status = response.status().as_u16();
    let body = response.text().map_err(connection_error)?;
    decode(action, status, &body)
}

/// Turns a status and body into a typed value, or the matching error kind.
fn decode<T: DeserializeOwned>(
    action: SessionAction,
    status: u16,
    body: &str,
) -> Result<T, MazeError> {
    if !(200..300).contains(&status) {
        return Err(MazeError::Transport {
            action,
            status,
            body: body.to_string(),
        });
    }
    serde_json::from_str(body).map_err(|e| MazeError::Protocol {
        action,
        message: e.to_string(),
    })
}
