//! Galaxy server - headless tick loop for the galaxy engine.
//!
//! - `galaxy-server run` - drive the simulation until Ctrl-C or a tick limit
//! - `galaxy-server config` - print the effective configuration

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::sync::{broadcast, watch, Mutex};
use tracing_subscriber::{fmt, EnvFilter};

use galaxy_core::kernel::Runner;
use galaxy_core::units::builtin::reference_catalog;
use galaxy_core::{
    Engine, EngineConfig, EventKind, GameEvent, JsonDirStore, MemoryStore, Persistence,
    PlayerDescriptor,
};

#[derive(Parser)]
#[command(name = "galaxy-server")]
#[command(about = "Persistent multiplayer galaxy simulation server", version)]
struct Cli {
    /// Configuration file (YAML)
    #[arg(short, long, global = true, default_value = "galaxy.yaml")]
    config: PathBuf,

    /// Directory for saved civilizations and sessions (in-memory if unset)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the tick loop
    Run {
        /// Stop after this many ticks
        #[arg(long)]
        ticks: Option<u64>,

        /// AI civilizations to seed the galaxy with
        #[arg(long, default_value_t = 2)]
        ai_civs: usize,

        /// Override the tick interval
        #[arg(long)]
        interval_ms: Option<u64>,
    },

    /// Print the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    let filter = if cli.verbose {
        EnvFilter::new(level)
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
    };
    fmt().with_env_filter(filter).with_target(false).init();

    let mut config = EngineConfig::load_or_default(&cli.config)?;

    match cli.command.unwrap_or(Commands::Run {
        ticks: None,
        ai_civs: 2,
        interval_ms: None,
    }) {
        Commands::Run {
            ticks,
            ai_civs,
            interval_ms,
        } => {
            if let Some(ms) = interval_ms {
                config.tick_interval_ms = ms;
            }
            run_server(config, cli.data_dir, ticks, ai_civs).await
        }
        Commands::Config => {
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(())
        }
    }
}

async fn run_server(
    config: EngineConfig,
    data_dir: Option<PathBuf>,
    ticks: Option<u64>,
    ai_civs: usize,
) -> Result<()> {
    let store: Arc<dyn Persistence> = match data_dir {
        Some(dir) => {
            tracing::info!(data_dir = %dir.display(), "using JSON store");
            Arc::new(JsonDirStore::new(dir))
        }
        None => Arc::new(MemoryStore::new()),
    };

    let interval = config.tick_interval();
    let mut engine = Engine::builder()
        .catalog(reference_catalog(config.seed))
        .persistence(store)
        .config(config)
        .build();
    engine.initialize().await;

    for i in 1..=ai_civs {
        let descriptor = PlayerDescriptor::ai(format!("AI Empire {i}"))
            .with_civilization(format!("ai-civ-{i}"))
            .with_civilization_name(format!("AI Empire {i}"));
        engine
            .register_player(descriptor)
            .await
            .with_context(|| format!("Failed to seed AI civilization {i}"))?;
    }

    let events = engine.subscribe();
    engine.start()?;
    tracing::info!(game = %engine.game_id(), civilizations = ai_civs, "galaxy started");

    let engine = Arc::new(Mutex::new(engine));
    let logger = tokio::spawn(log_events(events));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = shutdown_tx.send(true);
        }
    });

    let summary = Runner::new(engine.clone(), interval)
        .run(shutdown_rx, ticks)
        .await;

    let mut engine = engine.lock().await;
    engine.end().await?;
    let lobby = engine.get_game_lobby_state();
    drop(engine);
    logger.abort();

    tracing::info!(
        ticks = summary.ticks,
        unit_failures = summary.unit_failures,
        flagged = summary.flagged,
        "galaxy stopped"
    );
    println!("{}", serde_json::to_string_pretty(&lobby)?);
    Ok(())
}

async fn log_events(mut events: broadcast::Receiver<GameEvent>) {
    loop {
        match events.recv().await {
            Ok(event) => log_event(&event),
            Err(broadcast::error::RecvError::Lagged(missed)) => {
                tracing::warn!(missed, "event log lagging");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

fn log_event(event: &GameEvent) {
    let civilization = event.civilization.as_ref().map(|c| c.as_str());
    match &event.kind {
        EventKind::TickCompleted
        | EventKind::ResourcesChanged
        | EventKind::TerritoryChanged
        | EventKind::Unit(_) => tracing::debug!(
            tick = event.tick,
            kind = ?event.kind,
            civilization,
            payload = %event.payload,
            "event"
        ),
        EventKind::UnitFailed | EventKind::CivilizationFlaggedForReview => tracing::warn!(
            tick = event.tick,
            kind = ?event.kind,
            civilization,
            payload = %event.payload,
            "event"
        ),
        _ => tracing::info!(
            tick = event.tick,
            kind = ?event.kind,
            civilization,
            "event"
        ),
    }
}
