use tracing::info;

use crate::{
    MazeError, Outcome, Position,
    client::MazeSession,
    navigator::{ExplorationStats, Navigator, TrapRecovery},
};

/// Options for a single run.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    pub trap_recovery: TrapRecovery,
}

/// Summary of a finished run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub player: String,
    pub start: Position,
    pub outcome: Outcome,
    pub stats: ExplorationStats,
    /// Number of distinct tiles entered, traps included.
    pub visited: usize,
}

/// Starts a session for `player` and explores it until victory or exhaustion.
///
/// Any configuration, transport or protocol failure aborts the run; partial
/// progress is discarded.
pub fn run<S: MazeSession>(
    mut session: S,
    player: &str,
    options: RunOptions,
) -> Result<RunReport, MazeError> {
    let start = session.start_session(player)?;
    info!("Game started at {} for {player}", start.position);

    let mut navigator = Navigator::new(session).with_trap_recovery(options.trap_recovery);
    let outcome = navigator.explore(start.position, start.endpoints)?;

    Ok(RunReport {
        player: player.to_string(),
        start: start.position,
        outcome,
        stats: navigator.stats(),
        visited: navigator.memory().len(),
    })
}
