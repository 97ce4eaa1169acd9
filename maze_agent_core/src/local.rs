//! In-memory maze service for offline runs and tests.
//!
//! [`LocalMaze`] answers the same three calls as the remote service and
//! enforces the same rules: endpoints rotate after every move and stale ones
//! are refused, walls cannot be entered, traps kill without moving the player,
//! and reaching the exit ends the game.

use std::{fmt, str::FromStr};

use rand::{Rng, SeedableRng, rngs::StdRng, seq::SliceRandom};
use tracing::debug;

use crate::{
    Endpoints, MazeError, MoveResult, Position, SessionAction, SessionStart, Tile, TileKind,
    client::MazeSession, map::Grid,
};

const STATUS_BAD_REQUEST: u16 = 400;
const STATUS_GONE: u16 = 410;

/// Upper bound on the tiles of a generated maze, walls included.
const MAX_GENERATED_TILES: usize = 1 << 24;

/// Neighbour order used by discovery: up, right, down, left.
const DIRECTIONS: [(i64, i64); 4] = [(0, -1), (1, 0), (0, 1), (-1, 0)];

/// Errors raised while loading or generating a local maze.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MapError {
    #[error("Map string is empty.")]
    Empty,
    #[error("Inconsistent width at row {row}: expected {expected}, found {found}")]
    Ragged {
        row: usize,
        expected: usize,
        found: usize,
    },
    #[error("Unknown map code '{code}' at position ({x}, {y}).")]
    UnknownCode { code: String, x: usize, y: usize },
    #[error("Multiple start positions ('ST') found.")]
    MultipleStarts,
    #[error("No start position ('ST') found in map.")]
    NoStart,
    #[error("A generated maze needs at least two cells, got {width}x{height}.")]
    TooSmall { width: usize, height: usize },
    #[error("A generated maze of {width}x{height} cells exceeds {} tiles.", MAX_GENERATED_TILES)]
    TooLarge { width: usize, height: usize },
}

/// Number of calls the maze has answered, successful or not.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub starts: usize,
    pub discoveries: usize,
    pub moves: usize,
}

/// A maze held entirely in memory.
#[derive(Debug, Clone)]
pub struct LocalMaze {
    terrain: Grid<TileKind>,
    start: Position,
    player: Position,
    turn: u64,
    /// `None` before a session starts and after the game is won.
    live: Option<Endpoints>,
    calls: CallCounts,
}

impl LocalMaze {
    fn with_terrain(terrain: Grid<TileKind>, start: Position) -> Self {
        LocalMaze {
            terrain,
            start,
            player: start,
            turn: 0,
            live: None,
            calls: CallCounts::default(),
        }
    }

    /// Loads a maze from whitespace-separated two-letter codes, one row per line.
    ///
    /// Codes: `ST` start, `PA` path, `WA` wall, `TR` trap, `EX` exit.
    pub fn parse(map_string: &str) -> Result<Self, MapError> {
        let lines: Vec<&str> = map_string
            .trim()
            .lines()
            .filter(|line| !line.trim().is_empty())
            .collect();
        if lines.is_empty() {
            return Err(MapError::Empty);
        }

        let mut start = None;
        let mut rows = Vec::with_capacity(lines.len());
        for (y, line) in lines.iter().enumerate() {
            let mut row = Vec::new();
            for (x, code) in line.split_whitespace().enumerate() {
                let kind = match code {
                    "ST" => {
                        if start.is_some() {
                            return Err(MapError::MultipleStarts);
                        }
                        start = Some(Position::new(x as i64, y as i64));
                        TileKind::Path
                    }
                    "PA" => TileKind::Path,
                    "WA" => TileKind::Wall,
                    "TR" => TileKind::Trap,
                    "EX" => TileKind::Exit,
                    unknown => {
                        return Err(MapError::UnknownCode {
                            code: unknown.to_string(),
                            x,
                            y,
                        });
                    }
                };
                row.push(kind);
            }
            if let Some(first) = rows.first().map(Vec::len) {
                if row.len() != first {
                    return Err(MapError::Ragged {
                        row: y,
                        expected: first,
                        found: row.len(),
                    });
                }
            }
            rows.push(row);
        }

        let start = start.ok_or(MapError::NoStart)?;
        let terrain = Grid::from_rows(rows).ok_or(MapError::Empty)?;
        Ok(Self::with_terrain(terrain, start))
    }

    /// Generates a perfect maze of `width` x `height` cells (walls excluded).
    ///
    /// The start is the top-left cell and the exit the bottom-right one. Up to
    /// `traps` dead-end cells become traps; dead ends never lie on the path to
    /// the exit, so the maze stays solvable. Without a seed the maze is random.
    pub fn generate(
        width: usize,
        height: usize,
        traps: usize,
        seed: Option<u64>,
    ) -> Result<Self, MapError> {
        if width == 0 || height == 0 || (width == 1 && height == 1) {
            return Err(MapError::TooSmall { width, height });
        }
        let tiles_wide = width.checked_mul(2).and_then(|w| w.checked_add(1));
        let tiles_high = height.checked_mul(2).and_then(|h| h.checked_add(1));
        let fits = |w: usize, h: usize| w.checked_mul(h).is_some_and(|n| n <= MAX_GENERATED_TILES);
        let (tiles_wide, tiles_high) = match (tiles_wide, tiles_high) {
            (Some(w), Some(h)) if fits(w, h) => (w, h),
            _ => return Err(MapError::TooLarge { width, height }),
        };
        let mut rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        let mut terrain = Grid::filled(tiles_wide, tiles_high, TileKind::Wall);
        let cell = |cx: usize, cy: usize| Position::new(2 * cx as i64 + 1, 2 * cy as i64 + 1);

        // Iterative recursive-backtracker carve.
        let mut seen = vec![false; width * height];
        let mut stack = vec![(0usize, 0usize)];
        seen[0] = true;
        terrain[cell(0, 0)] = TileKind::Path;
        while let Some(&(cx, cy)) = stack.last() {
            let mut next = Vec::with_capacity(4);
            if cy > 0 && !seen[(cy - 1) * width + cx] {
                next.push((cx, cy - 1));
            }
            if cx + 1 < width && !seen[cy * width + cx + 1] {
                next.push((cx + 1, cy));
            }
            if cy + 1 < height && !seen[(cy + 1) * width + cx] {
                next.push((cx, cy + 1));
            }
            if cx > 0 && !seen[cy * width + cx - 1] {
                next.push((cx - 1, cy));
            }
            if next.is_empty() {
                stack.pop();
                continue;
            }

            let (nx, ny) = next[rng.random_range(0..next.len())];
            let (from, to) = (cell(cx, cy), cell(nx, ny));
            let between = Position::new((from.x + to.x) / 2, (from.y + to.y) / 2);
            terrain[between] = TileKind::Path;
            terrain[to] = TileKind::Path;
            seen[ny * width + nx] = true;
            stack.push((nx, ny));
        }

        let start = cell(0, 0);
        let exit = cell(width - 1, height - 1);
        terrain[exit] = TileKind::Exit;

        let mut dead_ends: Vec<Position> = terrain
            .enumerate()
            .filter(|&(position, kind)| {
                *kind == TileKind::Path
                    && position != start
                    && open_neighbours(&terrain, position) == 1
            })
            .map(|(position, _)| position)
            .collect();
        dead_ends.shuffle(&mut rng);
        for position in dead_ends.into_iter().take(traps) {
            terrain[position] = TileKind::Trap;
        }

        Ok(Self::with_terrain(terrain, start))
    }

    pub fn start(&self) -> Position {
        self.start
    }

    /// Where the player currently stands.
    pub fn player(&self) -> Position {
        self.player
    }

    pub fn calls(&self) -> CallCounts {
        self.calls
    }

    /// Number of tiles that are not walls.
    pub fn open_tiles(&self) -> usize {
        self.terrain
            .enumerate()
            .filter(|(_, kind)| **kind != TileKind::Wall)
            .count()
    }

    fn rotate_endpoints(&mut self) -> Endpoints {
        self.turn += 1;
        let endpoints = Endpoints {
            move_url: format!("local://move/{}/", self.turn),
            discover_url: format!("local://discover/{}/", self.turn),
        };
        self.live = Some(endpoints.clone());
        endpoints
    }

    /// Refuses any URL that is not part of the live endpoint pair.
    fn check_live(
        &self,
        action: SessionAction,
        url: &str,
        pick: fn(&Endpoints) -> &str,
    ) -> Result<(), MazeError> {
        match &self.live {
            Some(live) if pick(live) == url => Ok(()),
            _ => Err(MazeError::Transport {
                action,
                status: STATUS_GONE,
                body: format!("stale or unknown endpoint {url}"),
            }),
        }
    }
}

fn open_neighbours(terrain: &Grid<TileKind>, position: Position) -> usize {
    DIRECTIONS
        .iter()
        .filter(|(dx, dy)| {
            terrain
                .get(Position::new(position.x + dx, position.y + dy))
                .is_some_and(|kind| *kind != TileKind::Wall)
        })
        .count()
}

impl MazeSession for LocalMaze {
    fn start_session(&mut self, player: &str) -> Result<SessionStart, MazeError> {
        self.calls.starts += 1;
        if player.trim().is_empty() {
            return Err(MazeError::Config("player name is empty".to_string()));
        }
        self.player = self.start;
        let endpoints = self.rotate_endpoints();
        debug!(player, start = %self.start, "local session started");
        Ok(SessionStart {
            position: self.start,
            endpoints,
        })
    }

    fn discover_tiles(&mut self, discover_url: &str) -> Result<Vec<Tile>, MazeError> {
        self.calls.discoveries += 1;
        self.check_live(SessionAction::Discover, discover_url, |e| e.discover_url.as_str())?;

        let tiles = DIRECTIONS
            .iter()
            .filter_map(|(dx, dy)| {
                let position = Position::new(self.player.x + dx, self.player.y + dy);
                self.terrain.get(position).map(|&kind| Tile {
                    x: position.x,
                    y: position.y,
                    traversable: kind != TileKind::Wall,
                    kind,
                })
            })
            .collect();
        Ok(tiles)
    }

    fn attempt_move(&mut self, move_url: &str, target: Position) -> Result<MoveResult, MazeError> {
        self.calls.moves += 1;
        self.check_live(SessionAction::Move, move_url, |e| e.move_url.as_str())?;

        let kind = match self.terrain.get(target) {
            Some(&kind) if kind != TileKind::Wall && self.player.is_adjacent(target) => kind,
            _ => {
                return Err(MazeError::Transport {
                    action: SessionAction::Move,
                    status: STATUS_BAD_REQUEST,
                    body: format!("illegal move from {} to {target}", self.player),
                });
            }
        };

        let endpoints = self.rotate_endpoints();
        let (dead, win) = match kind {
            TileKind::Trap => (true, false),
            TileKind::Exit => {
                self.player = target;
                (false, true)
            }
            TileKind::Path | TileKind::Wall => {
                self.player = target;
                (false, false)
            }
        };
        if win {
            self.live = None;
        }

        Ok(MoveResult {
            position: self.player,
            dead,
            win,
            endpoints,
        })
    }
}

impl FromStr for LocalMaze {
    type Err = MapError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Writes the maze back in the map format accepted by [`LocalMaze::parse`].
impl fmt::Display for LocalMaze {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (position, kind) in self.terrain.enumerate() {
            let code = match kind {
                _ if position == self.start => "ST",
                TileKind::Path => "PA",
                TileKind::Wall => "WA",
                TileKind::Trap => "TR",
                TileKind::Exit => "EX",
            };
            let last_in_row = position.x as usize + 1 == self.terrain.width();
            write!(f, "{code}{}", if last_in_row { "\n" } else { " " })?;
        }
        Ok(())
    }
}
