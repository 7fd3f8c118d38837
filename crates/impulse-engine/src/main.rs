//! Service binary for the impulse needs-driven action engine.
//!
//! Wires the engine to in-process collaborators, seeds a handful of
//! agents and runs the periodic sweep until Ctrl-C.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `impulse-config.yaml`
//! 2. Initialize structured logging (tracing)
//! 3. Build the engine with in-memory storage and template content
//! 4. Seed agents
//! 5. Start the event log task
//! 6. Start the periodic sweep
//! 7. Wait for Ctrl-C
//! 8. Stop the sweep and interrupt in-flight actions

mod error;
mod spawner;

use std::path::Path;

use impulse_core::{
    Engine, EngineConfig, LogFormat, LogNotifier, LoggingConfig, MemoryStorage,
    TemplateContentGenerator,
};
use impulse_types::EngineEvent;
use tokio::sync::broadcast;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::error::StartupError;
use crate::spawner::SeedConfig;

/// Path of the configuration file, relative to the working directory.
const CONFIG_PATH: &str = "impulse-config.yaml";

/// Application entry point for the impulse engine.
///
/// # Errors
///
/// Returns an error if configuration, seeding or signal handling fails.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load configuration.
    let config_path = Path::new(CONFIG_PATH);
    let (config, from_file) = load_config(config_path)?;

    // 2. Initialize structured logging.
    init_tracing(&config.logging);
    info!("impulse-engine starting");
    if from_file {
        info!(path = CONFIG_PATH, "Configuration loaded");
    } else {
        info!("Config file not found, using defaults");
    }
    info!(
        interval_secs = config.sweep.interval_secs,
        max_concurrent_agents = config.sweep.max_concurrent_agents,
        collaborator_retries = config.sweep.collaborator_retries,
        seed = ?config.seed,
        "Sweep configuration"
    );

    // 3. Build the engine.
    let engine = Engine::new(
        config,
        MemoryStorage::new(),
        TemplateContentGenerator,
        LogNotifier,
    );

    // 4. Seed agents.
    let seed_config = SeedConfig::load(config_path)?;
    let agents = spawner::seed_agents(&engine, &seed_config, &mut rand::rng()).await?;
    info!(agents_seeded = agents.len(), "Seed agents registered");

    // 5. Log the event stream.
    let events = tokio::spawn(log_events(engine.subscribe()));

    // 6. Start the periodic sweep.
    let sweep = engine.start_sweep();
    info!("Sweep started, press Ctrl-C to stop");

    // 7. Wait for shutdown.
    tokio::signal::ctrl_c().await.map_err(StartupError::from)?;
    info!("Shutdown requested");

    // 8. Stop and drain.
    sweep.stop().await;
    let interrupted = engine.shutdown().await;
    events.abort();

    info!(interrupted, "impulse-engine shutdown complete");
    Ok(())
}

/// Load `EngineConfig` from `path`, or the defaults when it is absent.
///
/// The flag reports whether the file was found.
fn load_config(path: &Path) -> Result<(EngineConfig, bool), StartupError> {
    if path.exists() {
        Ok((EngineConfig::from_file(path)?, true))
    } else {
        Ok((EngineConfig::default(), false))
    }
}

/// Install the global subscriber. `RUST_LOG` wins over the configured level.
fn init_tracing(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);
    match logging.format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.init(),
    }
}

/// Write every engine event to the log until the bus closes.
async fn log_events(mut rx: broadcast::Receiver<EngineEvent>) {
    loop {
        match rx.recv().await {
            Ok(event) => info!(
                agent_id = %event.agent_id,
                kind = ?event.kind,
                action_id = ?event.action_id,
                payload = %event.payload,
                "engine event"
            ),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "event log lagged");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
