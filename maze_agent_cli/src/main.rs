use anyhow::{Context, Result, anyhow};
use clap::{Parser, ValueEnum};
use maze_agent_core::{
    Outcome,
    client::HttpSession,
    config::{self, DEFAULT_BASE_URL},
    local::LocalMaze,
    navigator::TrapRecovery,
    run::{RunOptions, RunReport, run},
};
use std::{path::PathBuf, time::Duration};
use tracing::info;

mod logging;

/// Player name used against local mazes when none is configured.
const LOCAL_PLAYER: &str = "local";

#[derive(Parser, Debug)]
#[command(version, about = "Solves a maze by depth-first exploration", long_about = None)]
struct Args {
    /// Player name registered with the maze service
    #[arg(short, long, env = config::PLAYER_ENV)]
    player: Option<String>,

    /// Base URL of the maze service
    #[arg(long, env = "MAZE_BASE_URL", default_value = DEFAULT_BASE_URL)]
    base_url: String,

    /// HTTP timeout in seconds
    #[arg(long, default_value_t = config::DEFAULT_TIMEOUT.as_secs())]
    timeout_secs: u64,

    /// Solve a local map file instead of the remote service
    #[arg(short, long, value_name = "MAP_FILE", conflicts_with = "generate")]
    map: Option<PathBuf>,

    /// Solve a generated local maze of WIDTHxHEIGHT cells
    #[arg(long, value_name = "WIDTHxHEIGHT", value_parser = parse_size)]
    generate: Option<(usize, usize)>,

    /// Number of traps placed in a generated maze
    #[arg(long, default_value_t = 0)]
    traps: usize,

    /// Seed for the generated maze
    #[arg(long)]
    seed: Option<u64>,

    /// Print the local maze before solving it
    #[arg(long)]
    print_map: bool,

    /// What to do after stepping on a trap
    #[arg(long, value_enum, default_value_t = TrapPolicy::Resume)]
    trap_recovery: TrapPolicy,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum TrapPolicy {
    /// The service keeps the player on the tile it came from
    Resume,
    /// Walk back to the previous tile when the service moved the player
    StepBack,
}

impl From<TrapPolicy> for TrapRecovery {
    fn from(policy: TrapPolicy) -> Self {
        match policy {
            TrapPolicy::Resume => TrapRecovery::Resume,
            TrapPolicy::StepBack => TrapRecovery::StepBack,
        }
    }
}

fn parse_size(value: &str) -> Result<(usize, usize), String> {
    let (width, height) = value
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got '{value}'"))?;
    let parse = |s: &str| {
        s.trim()
            .parse::<usize>()
            .map_err(|e| format!("invalid dimension '{s}': {e}"))
    };
    Ok((parse(width)?, parse(height)?))
}

fn main() -> Result<()> {
    // Load .env before parsing so PLAYER_NAME can come from it
    dotenvy::dotenv().ok();
    let args = Args::parse();
    logging::init();

    let options = RunOptions {
        trap_recovery: args.trap_recovery.into(),
    };

    let report = match local_maze(&args)? {
        Some(maze) => {
            if args.print_map {
                print!("{maze}");
            }
            let player = args.player.as_deref().unwrap_or(LOCAL_PLAYER);
            run(maze, player, options)?
        }
        None => {
            let player = config::resolve_player(args.player.as_deref())?;
            let session = HttpSession::new(&args.base_url, Duration::from_secs(args.timeout_secs))?;
            info!(base_url = session.base_url(), "using remote maze service");
            run(session, &player, options)?
        }
    };

    print_report(&report);
    Ok(())
}

fn local_maze(args: &Args) -> Result<Option<LocalMaze>> {
    if let Some(path) = &args.map {
        if !path.exists() {
            return Err(anyhow!("Map file does not exist: {}", path.display()));
        }
        let map = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read map file {}", path.display()))?;
        let maze = LocalMaze::parse(&map)
            .with_context(|| format!("Failed to load maze from {}", path.display()))?;
        return Ok(Some(maze));
    }

    if let Some((width, height)) = args.generate {
        let maze = LocalMaze::generate(width, height, args.traps, args.seed)
            .context("Failed to generate maze")?;
        return Ok(Some(maze));
    }

    Ok(None)
}

fn print_report(report: &RunReport) {
    match report.outcome {
        Outcome::Victory { position } => println!("🎉 Victory at {position}"),
        Outcome::Exhausted => println!("No path found"),
    }
    let stats = &report.stats;
    println!(
        "player: {} start: {} tiles visited: {}",
        report.player, report.start, report.visited
    );
    println!(
        "discoveries: {} moves: {} deaths: {} backtracks: {}",
        stats.discoveries, stats.moves, stats.deaths, stats.backtracks
    );
}
