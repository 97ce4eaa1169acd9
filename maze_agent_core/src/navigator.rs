//! Depth-first exploration of a maze that is only visible through a session.
//!
//! The search keeps an explicit stack of frames instead of recursing, so its
//! depth is bounded by memory rather than the thread stack. Each frame holds a
//! coordinate that was entered and the discovery tiles not yet tried from it.
//!
//! The player physically walks the search: before a frame tries its next
//! candidate the player stands on that frame's coordinate, holding the
//! endpoints returned by the most recent successful response.

use std::vec;

use tracing::{debug, info, warn};

use crate::{
    Endpoints, MazeError, MoveResult, Outcome, Position, Tile, client::MazeSession,
    memory::GridMemory,
};

/// What to do after a move answered `dead = true`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrapRecovery {
    /// Assume the service left the player on the pre-move tile.
    #[default]
    Resume,
    /// Walk back to the pre-move tile if the service reports another position.
    StepBack,
}

/// Counters collected while exploring.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExplorationStats {
    pub discoveries: usize,
    pub moves: usize,
    pub deaths: usize,
    pub backtracks: usize,
    /// Entries refused because the coordinate was already visited.
    pub guard_hits: usize,
}

/// Where the player stands and which endpoints are live.
#[derive(Debug)]
struct Cursor {
    position: Position,
    endpoints: Endpoints,
}

#[derive(Debug)]
struct Frame {
    position: Position,
    candidates: vec::IntoIter<Tile>,
}

impl Frame {
    /// Next traversable tile in server order that has not been entered yet.
    fn next_candidate(&mut self, memory: &GridMemory) -> Option<Position> {
        self.candidates
            .find(|tile| tile.traversable && !memory.is_visited(&tile.position()))
            .map(|tile| tile.position())
    }
}

/// Depth-first explorer driving a [`MazeSession`].
///
/// The visited set outlives a single [`explore`](Navigator::explore) call, so
/// exploring from an already visited coordinate is a no-op.
pub struct Navigator<S> {
    session: S,
    memory: GridMemory,
    trap_recovery: TrapRecovery,
    stats: ExplorationStats,
}

impl<S: MazeSession> Navigator<S> {
    pub fn new(session: S) -> Self {
        Navigator {
            session,
            memory: GridMemory::new(),
            trap_recovery: TrapRecovery::default(),
            stats: ExplorationStats::default(),
        }
    }

    pub fn with_trap_recovery(mut self, trap_recovery: TrapRecovery) -> Self {
        self.trap_recovery = trap_recovery;
        self
    }

    pub fn memory(&self) -> &GridMemory {
        &self.memory
    }

    pub fn stats(&self) -> ExplorationStats {
        self.stats
    }

    pub fn session(&self) -> &S {
        &self.session
    }

    /// Explores depth-first from `start` until the exit is reached or every
    /// reachable tile has been entered.
    ///
    /// Any session error aborts the whole exploration.
    pub fn explore(&mut self, start: Position, endpoints: Endpoints) -> Result<Outcome, MazeError> {
        let mut cursor = Cursor {
            position: start,
            endpoints,
        };
        let Some(root) = self.enter(&cursor)? else {
            return Ok(Outcome::Exhausted);
        };
        let mut stack = vec![root];

        while let Some(frame) = stack.last_mut() {
            let origin = frame.position;
            let Some(target) = frame.next_candidate(&self.memory) else {
                stack.pop();
                if let Some(parent) = stack.last() {
                    if let Some(outcome) = self.backtrack(&mut cursor, parent.position)? {
                        return Ok(outcome);
                    }
                }
                continue;
            };

            let response = self.session.attempt_move(&cursor.endpoints.move_url, target)?;
            self.stats.moves += 1;
            info!("Moved to {target}");

            if response.dead {
                self.stats.deaths += 1;
                warn!("Dead at {target}");
                // A trap is never tried again from any neighbour.
                self.memory.mark_visited(target);
                if let Some(outcome) = self.recover_from_trap(&mut cursor, origin, response)? {
                    return Ok(outcome);
                }
                continue;
            }

            if response.win {
                info!("Victory at {}", response.position);
                return Ok(Outcome::Victory {
                    position: response.position,
                });
            }

            cursor.position = response.position;
            cursor.endpoints = response.endpoints;
            match self.enter(&cursor)? {
                Some(child) => stack.push(child),
                None => {
                    if let Some(outcome) = self.backtrack(&mut cursor, origin)? {
                        return Ok(outcome);
                    }
                }
            }
        }

        info!("No path found after visiting {} tiles", self.memory.len());
        Ok(Outcome::Exhausted)
    }

    /// Marks the cursor's coordinate and discovers its neighbours, unless it
    /// was visited before.
    fn enter(&mut self, cursor: &Cursor) -> Result<Option<Frame>, MazeError> {
        if !self.memory.mark_visited(cursor.position) {
            self.stats.guard_hits += 1;
            warn!("{} already visited, not exploring again", cursor.position);
            return Ok(None);
        }

        let tiles = self.session.discover_tiles(&cursor.endpoints.discover_url)?;
        self.stats.discoveries += 1;
        debug!(position = %cursor.position, ?tiles, "discovered");

        Ok(Some(Frame {
            position: cursor.position,
            candidates: tiles.into_iter(),
        }))
    }

    /// Moves the player back to `to`, the coordinate of the frame that will
    /// try its next candidate.
    fn backtrack(
        &mut self,
        cursor: &mut Cursor,
        to: Position,
    ) -> Result<Option<Outcome>, MazeError> {
        let response = self.session.attempt_move(&cursor.endpoints.move_url, to)?;
        self.stats.backtracks += 1;
        info!("Backtracked from {} to {to}", cursor.position);

        if response.win {
            info!("Victory at {}", response.position);
            return Ok(Some(Outcome::Victory {
                position: response.position,
            }));
        }
        if response.dead {
            return Err(MazeError::LostOnBacktrack { position: to });
        }
        if response.position != to {
            return Err(MazeError::BacktrackDiverged {
                expected: to,
                actual: response.position,
            });
        }

        cursor.position = to;
        cursor.endpoints = response.endpoints;
        Ok(None)
    }

    fn recover_from_trap(
        &mut self,
        cursor: &mut Cursor,
        origin: Position,
        response: MoveResult,
    ) -> Result<Option<Outcome>, MazeError> {
        // The dead response still carries the newest endpoints.
        cursor.endpoints = response.endpoints;

        match self.trap_recovery {
            TrapRecovery::StepBack if response.position != origin => {
                cursor.position = response.position;
                self.backtrack(cursor, origin)
            }
            TrapRecovery::StepBack | TrapRecovery::Resume => {
                cursor.position = origin;
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{SessionAction, SessionStart, TileKind};

    /// One expected call and the canned answer to it.
    #[derive(Debug)]
    enum Step {
        Discover(&'static str, Vec<Tile>),
        Move(&'static str, Position, MoveResult),
        Fail(MazeError),
    }

    /// Session that replays a script and panics on any call it did not expect,
    /// including calls made with the wrong endpoint.
    #[derive(Debug, Default)]
    struct ScriptedSession {
        script: VecDeque<Step>,
        calls: Vec<String>,
    }

    impl ScriptedSession {
        fn new(steps: Vec<Step>) -> Self {
            ScriptedSession {
                script: steps.into(),
                calls: Vec::new(),
            }
        }

        fn next_step(&mut self, call: String) -> Step {
            self.calls.push(call.clone());
            self.script
                .pop_front()
                .unwrap_or_else(|| panic!("unexpected call {call}"))
        }
    }

    impl MazeSession for ScriptedSession {
        fn start_session(&mut self, _player: &str) -> Result<SessionStart, MazeError> {
            unreachable!("navigator never starts sessions")
        }

        fn discover_tiles(&mut self, discover_url: &str) -> Result<Vec<Tile>, MazeError> {
            match self.next_step(format!("discover {discover_url}")) {
                Step::Discover(url, tiles) => {
                    assert_eq!(discover_url, url, "discovered with a stale endpoint");
                    Ok(tiles)
                }
                Step::Fail(err) => Err(err),
                other => panic!("expected {other:?}, got discover {discover_url}"),
            }
        }

        fn attempt_move(
            &mut self,
            move_url: &str,
            target: Position,
        ) -> Result<MoveResult, MazeError> {
            match self.next_step(format!("move {move_url} {target}")) {
                Step::Move(url, expected, result) => {
                    assert_eq!(move_url, url, "moved with a stale endpoint");
                    assert_eq!(target, expected);
                    Ok(result)
                }
                Step::Fail(err) => Err(err),
                other => panic!("expected {other:?}, got move {move_url} {target}"),
            }
        }
    }

    fn endpoints(turn: u32) -> Endpoints {
        Endpoints {
            move_url: format!("m{turn}"),
            discover_url: format!("d{turn}"),
        }
    }

    fn tile(x: i64, y: i64, kind: TileKind) -> Tile {
        Tile {
            x,
            y,
            traversable: kind != TileKind::Wall,
            kind,
        }
    }

    fn at(x: i64, y: i64, turn: u32) -> MoveResult {
        MoveResult {
            position: Position::new(x, y),
            dead: false,
            win: false,
            endpoints: endpoints(turn),
        }
    }

    fn dead(x: i64, y: i64, turn: u32) -> MoveResult {
        MoveResult {
            dead: true,
            ..at(x, y, turn)
        }
    }

    fn won(x: i64, y: i64, turn: u32) -> MoveResult {
        MoveResult {
            win: true,
            ..at(x, y, turn)
        }
    }

    fn p(x: i64, y: i64) -> Position {
        Position::new(x, y)
    }

    #[test]
    fn exhausted_branch_is_backtracked_before_next_candidate() {
        let session = ScriptedSession::new(vec![
            Step::Discover(
                "d0",
                vec![tile(1, 0, TileKind::Path), tile(0, 1, TileKind::Exit)],
            ),
            Step::Move("m0", p(1, 0), at(1, 0, 1)),
            Step::Discover(
                "d1",
                vec![tile(0, 0, TileKind::Path), tile(2, 0, TileKind::Wall)],
            ),
            Step::Move("m1", p(0, 0), at(0, 0, 2)),
            Step::Move("m2", p(0, 1), won(0, 1, 3)),
        ]);
        let mut navigator = Navigator::new(session);

        let outcome = navigator.explore(p(0, 0), endpoints(0)).unwrap();

        assert_eq!(outcome, Outcome::Victory { position: p(0, 1) });
        assert_eq!(
            navigator.stats(),
            ExplorationStats {
                discoveries: 2,
                moves: 2,
                deaths: 0,
                backtracks: 1,
                guard_hits: 0,
            }
        );
        assert!(navigator.session().script.is_empty());
    }

    #[test]
    fn only_walls_means_no_move() {
        let session = ScriptedSession::new(vec![Step::Discover(
            "d0",
            vec![tile(2, 1, TileKind::Wall)],
        )]);
        let mut navigator = Navigator::new(session);

        let outcome = navigator.explore(p(2, 2), endpoints(0)).unwrap();

        assert_eq!(outcome, Outcome::Exhausted);
        assert_eq!(navigator.session().calls, vec!["discover d0"]);
    }

    #[test]
    fn death_skips_to_next_candidate_without_recursing() {
        let session = ScriptedSession::new(vec![
            Step::Discover(
                "d0",
                vec![tile(3, 3, TileKind::Trap), tile(2, 4, TileKind::Path)],
            ),
            Step::Move("m0", p(3, 3), dead(2, 3, 1)),
            Step::Move("m1", p(2, 4), at(2, 4, 2)),
            Step::Discover("d2", vec![tile(2, 3, TileKind::Path)]),
            Step::Move("m2", p(2, 3), at(2, 3, 3)),
        ]);
        let mut navigator = Navigator::new(session);

        let outcome = navigator.explore(p(2, 3), endpoints(0)).unwrap();

        assert_eq!(outcome, Outcome::Exhausted);
        let stats = navigator.stats();
        assert_eq!(stats.deaths, 1);
        assert_eq!(stats.discoveries, 2);
        assert_eq!(stats.backtracks, 1);
        assert!(navigator.memory().is_visited(&p(3, 3)));
    }

    #[test]
    fn step_back_walks_off_a_trap_before_the_next_candidate() {
        let session = ScriptedSession::new(vec![
            Step::Discover(
                "d0",
                vec![tile(1, 0, TileKind::Trap), tile(0, 1, TileKind::Exit)],
            ),
            Step::Move("m0", p(1, 0), dead(1, 0, 1)),
            Step::Move("m1", p(0, 0), at(0, 0, 2)),
            Step::Move("m2", p(0, 1), won(0, 1, 3)),
        ]);
        let mut navigator = Navigator::new(session).with_trap_recovery(TrapRecovery::StepBack);

        let outcome = navigator.explore(p(0, 0), endpoints(0)).unwrap();

        assert!(outcome.is_victory());
        assert_eq!(navigator.stats().backtracks, 1);
    }

    #[test]
    fn victory_deep_in_the_search_stops_all_calls() {
        let session = ScriptedSession::new(vec![
            Step::Discover(
                "d0",
                vec![tile(1, 0, TileKind::Path), tile(0, 1, TileKind::Path)],
            ),
            Step::Move("m0", p(1, 0), at(1, 0, 1)),
            Step::Discover(
                "d1",
                vec![tile(2, 0, TileKind::Exit), tile(1, 1, TileKind::Path)],
            ),
            Step::Move("m1", p(2, 0), won(2, 0, 2)),
        ]);
        let mut navigator = Navigator::new(session);

        let outcome = navigator.explore(p(0, 0), endpoints(0)).unwrap();

        assert_eq!(outcome, Outcome::Victory { position: p(2, 0) });
        assert_eq!(navigator.session().calls.len(), 4);
    }

    #[test]
    fn revisiting_an_entered_coordinate_does_not_discover_again() {
        let session = ScriptedSession::new(vec![Step::Discover("d0", vec![])]);
        let mut navigator = Navigator::new(session);

        assert_eq!(
            navigator.explore(p(5, 5), endpoints(0)).unwrap(),
            Outcome::Exhausted
        );
        assert_eq!(
            navigator.explore(p(5, 5), endpoints(1)).unwrap(),
            Outcome::Exhausted
        );
        assert_eq!(
            navigator.explore(p(5, 5), endpoints(2)).unwrap(),
            Outcome::Exhausted
        );
        assert_eq!(navigator.session().calls, vec!["discover d0"]);
        assert_eq!(navigator.stats().guard_hits, 2);
    }

    #[test]
    fn server_reporting_a_visited_position_counts_as_dead_end() {
        // The service moves the player somewhere other than requested.
        let session = ScriptedSession::new(vec![
            Step::Discover("d0", vec![tile(1, 0, TileKind::Path)]),
            Step::Move("m0", p(1, 0), at(0, 0, 1)),
            Step::Move("m1", p(0, 0), at(0, 0, 2)),
        ]);
        let mut navigator = Navigator::new(session);

        let outcome = navigator.explore(p(0, 0), endpoints(0)).unwrap();

        assert_eq!(outcome, Outcome::Exhausted);
        assert_eq!(navigator.stats().guard_hits, 1);
    }

    #[test]
    fn transport_error_aborts_exploration() {
        let failure = MazeError::Transport {
            action: SessionAction::Move,
            status: 500,
            body: "boom".to_string(),
        };
        let session = ScriptedSession::new(vec![
            Step::Discover(
                "d0",
                vec![tile(1, 0, TileKind::Path), tile(0, 1, TileKind::Exit)],
            ),
            Step::Fail(failure.clone()),
        ]);
        let mut navigator = Navigator::new(session);

        let err = navigator.explore(p(0, 0), endpoints(0)).unwrap_err();

        assert_eq!(err, failure);
        assert_eq!(navigator.session().calls.len(), 2);
    }

    #[test]
    fn backtrack_landing_elsewhere_is_an_error() {
        let session = ScriptedSession::new(vec![
            Step::Discover("d0", vec![tile(1, 0, TileKind::Path)]),
            Step::Move("m0", p(1, 0), at(1, 0, 1)),
            Step::Discover("d1", vec![]),
            Step::Move("m1", p(0, 0), at(1, 0, 2)),
        ]);
        let mut navigator = Navigator::new(session);

        let err = navigator.explore(p(0, 0), endpoints(0)).unwrap_err();

        assert_eq!(
            err,
            MazeError::BacktrackDiverged {
                expected: p(0, 0),
                actual: p(1, 0),
            }
        );
    }

    #[test]
    fn dying_on_backtrack_is_an_error() {
        let session = ScriptedSession::new(vec![
            Step::Discover("d0", vec![tile(1, 0, TileKind::Path)]),
            Step::Move("m0", p(1, 0), at(1, 0, 1)),
            Step::Discover("d1", vec![]),
            Step::Move("m1", p(0, 0), dead(1, 0, 2)),
        ]);
        let mut navigator = Navigator::new(session);

        let err = navigator.explore(p(0, 0), endpoints(0)).unwrap_err();

        assert_eq!(err, MazeError::LostOnBacktrack { position: p(0, 0) });
    }

    #[test]
    fn deep_branch_backtracks_one_step_at_a_time() {
        // Corridor (0,0) -> (1,0) -> (2,0), dead end, then the exit is south of the start.
        let session = ScriptedSession::new(vec![
            Step::Discover(
                "d0",
                vec![tile(1, 0, TileKind::Path), tile(0, 1, TileKind::Exit)],
            ),
            Step::Move("m0", p(1, 0), at(1, 0, 1)),
            Step::Discover(
                "d1",
                vec![tile(2, 0, TileKind::Path), tile(0, 0, TileKind::Path)],
            ),
            Step::Move("m1", p(2, 0), at(2, 0, 2)),
            Step::Discover("d2", vec![tile(1, 0, TileKind::Path)]),
            Step::Move("m2", p(1, 0), at(1, 0, 3)),
            Step::Move("m3", p(0, 0), at(0, 0, 4)),
            Step::Move("m4", p(0, 1), won(0, 1, 5)),
        ]);
        let mut navigator = Navigator::new(session);

        let outcome = navigator.explore(p(0, 0), endpoints(0)).unwrap();

        assert!(outcome.is_victory());
        assert_eq!(navigator.stats().backtracks, 2);
    }

    #[test]
    fn trap_bordering_two_frames_kills_only_once() {
        // (0,0) -> trap (1,0); (0,0) -> (0,1) -> (1,1), which also borders the trap.
        let session = ScriptedSession::new(vec![
            Step::Discover(
                "d0",
                vec![tile(1, 0, TileKind::Trap), tile(0, 1, TileKind::Path)],
            ),
            Step::Move("m0", p(1, 0), dead(0, 0, 1)),
            Step::Move("m1", p(0, 1), at(0, 1, 2)),
            Step::Discover("d2", vec![tile(1, 1, TileKind::Path)]),
            Step::Move("m2", p(1, 1), at(1, 1, 3)),
            Step::Discover(
                "d3",
                vec![tile(1, 0, TileKind::Trap), tile(0, 1, TileKind::Path)],
            ),
            Step::Move("m3", p(0, 1), at(0, 1, 4)),
            Step::Move("m4", p(0, 0), at(0, 0, 5)),
        ]);
        let mut navigator = Navigator::new(session);

        let outcome = navigator.explore(p(0, 0), endpoints(0)).unwrap();

        assert_eq!(outcome, Outcome::Exhausted);
        assert_eq!(navigator.stats().deaths, 1);
        assert!(navigator.session().script.is_empty());
    }

    #[test]
    fn malformed_response_aborts_exploration() {
        let failure = MazeError::Protocol {
            action: SessionAction::Discover,
            message: "missing field `move`".to_string(),
        };
        let session = ScriptedSession::new(vec![
            Step::Discover("d0", vec![tile(1, 0, TileKind::Path)]),
            Step::Move("m0", p(1, 0), at(1, 0, 1)),
            Step::Fail(failure.clone()),
        ]);
        let mut navigator = Navigator::new(session);

        let err = navigator.explore(p(0, 0), endpoints(0)).unwrap_err();

        assert_eq!(err, failure);
        assert_eq!(navigator.stats().moves, 1);
        assert_eq!(navigator.stats().backtracks, 0);
    }
}
