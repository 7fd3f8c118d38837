//! Seed agents for a fresh engine.
//!
//! At startup the binary registers N agents with the configured need
//! defaults, then nudges every need by a random amount so the agents do
//! not all cross their thresholds on the same sweep.

use std::path::Path;

use impulse_core::{ContentGenerator, Engine, Notifier, Storage};
use impulse_types::{AgentId, NeedType};
use rand::Rng;
use serde::Deserialize;
use tracing::info;

use crate::error::StartupError;

// -----------------------------------------------------------------------
// Configuration
// -----------------------------------------------------------------------

/// Configuration for seeding, read from the `agents` section of
/// `impulse-config.yaml`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SeedConfig {
    /// Number of agents to register at startup.
    #[serde(default = "default_seed_count")]
    pub seed_count: u32,

    /// Largest random offset applied to each initial need value.
    #[serde(default = "default_initial_jitter")]
    pub initial_jitter: f64,
}

impl Default for SeedConfig {
    fn default() -> Self {
        Self {
            seed_count: default_seed_count(),
            initial_jitter: default_initial_jitter(),
        }
    }
}

const fn default_seed_count() -> u32 {
    5
}

const fn default_initial_jitter() -> f64 {
    10.0
}

impl SeedConfig {
    /// Read the `agents` section of the config file at `path`.
    ///
    /// A missing file or a missing section yields the defaults.
    pub fn load(path: &Path) -> Result<Self, StartupError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path).map_err(|e| StartupError::Seed {
            message: format!("failed to read config file: {e}"),
        })?;
        Self::parse(&contents)
    }

    /// Extract the `agents` section from a full config document.
    pub fn parse(yaml: &str) -> Result<Self, StartupError> {
        let raw: serde_yml::Value = serde_yml::from_str(yaml).map_err(|e| StartupError::Seed {
            message: format!("failed to parse config YAML: {e}"),
        })?;
        let Some(section) = raw.get("agents") else {
            return Ok(Self::default());
        };
        serde_yml::from_value(section.clone()).map_err(|e| StartupError::Seed {
            message: format!("failed to parse agents config: {e}"),
        })
    }
}

// -----------------------------------------------------------------------
// Seeding
// -----------------------------------------------------------------------

/// Register `config.seed_count` fresh agents and randomize their needs.
pub async fn seed_agents<S, G, N, R>(
    engine: &Engine<S, G, N>,
    config: &SeedConfig,
    rng: &mut R,
) -> Result<Vec<AgentId>, StartupError>
where
    S: Storage,
    G: ContentGenerator,
    N: Notifier,
    R: Rng,
{
    let jitter = if config.initial_jitter.is_finite() {
        config.initial_jitter.abs()
    } else {
        0.0
    };
    let mut agents = Vec::new();

    for _ in 0..config.seed_count {
        let agent_id = AgentId::new();
        engine.register_agent(agent_id).await?;

        if jitter > 0.0 {
            let offsets: Vec<(NeedType, f64)> = engine
                .needs(agent_id)
                .await?
                .iter()
                .map(|n| (n.need_type, rng.random_range(-jitter..=jitter)))
                .collect();
            engine
                .update_needs(agent_id, |book, now| {
                    for (need_type, delta) in offsets {
                        book.update_level(need_type, delta, now)?;
                    }
                    Ok(())
                })
                .await?;
        }

        info!(agent_id = %agent_id, "seed agent registered");
        agents.push(agent_id);
    }
    Ok(agents)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use impulse_core::{EngineConfig, LogNotifier, MemoryStorage, TemplateContentGenerator};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;

    #[test]
    fn missing_section_uses_defaults() {
        let config = SeedConfig::parse("sweep:\n  interval_secs: 60\n").unwrap();
        assert_eq!(config, SeedConfig::default());
    }

    #[test]
    fn parses_agents_section() {
        let config = SeedConfig::parse("agents:\n  seed_count: 2\n").unwrap();
        assert_eq!(config.seed_count, 2);
        assert!((config.initial_jitter - 10.0).abs() < f64::EPSILON);
    }

    #[test]
    fn rejects_malformed_section() {
        assert!(SeedConfig::parse("agents:\n  seed_count: lots\n").is_err());
    }

    #[tokio::test]
    async fn seeds_agents_within_jitter() {
        let engine = Engine::new(
            EngineConfig::default(),
            MemoryStorage::new(),
            TemplateContentGenerator,
            LogNotifier,
        );
        let config = SeedConfig {
            seed_count: 3,
            initial_jitter: 5.0,
        };
        let mut rng = StdRng::seed_from_u64(7);
        let agents = seed_agents(&engine, &config, &mut rng).await.unwrap();

        assert_eq!(agents.len(), 3);
        assert_eq!(engine.agents().await.len(), 3);
        let defaults = &engine.config().needs.defaults;
        for agent in agents {
            for need in engine.needs(agent).await.unwrap() {
                let initial = defaults.get(&need.need_type).unwrap().initial_value;
                assert!((need.current_value - initial).abs() <= 5.0 + 1e-9);
            }
        }
    }
}
