//! Engine configuration loading and management.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::player::{AiDifficulty, AiPersonality};

/// Engine configuration, usually loaded from `galaxy.yaml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Wall-clock period of the run loop (1 second = 1 game day)
    pub tick_interval_ms: u64,

    /// Budget for a single unit's `process_tick`
    pub unit_timeout_ms: u64,

    /// Budget for a single AI module's `get_decisions`
    pub ai_module_timeout_ms: u64,

    /// Maximum non-observer players
    pub max_players: usize,

    /// Upper bound on actions one civilization's AI may queue per tick
    pub max_ai_actions_per_civilization: usize,

    /// AI cadence in ticks
    pub ai_think_every_ticks: u32,

    /// Consecutive failing ticks before a civilization is flagged for review
    pub failure_review_threshold: u32,

    /// Ticks a disconnected human keeps control before AI takes over
    pub disconnect_grace_ticks: u64,

    /// Unclaimed actions older than this many ticks are dropped
    pub stale_action_ticks: u64,

    /// Persistence cadence in ticks (0 disables autosave)
    pub autosave_every_ticks: u64,

    /// Capacity of the outbound event channel
    pub event_channel_capacity: usize,

    /// Events retained for AI context and inspection
    pub recent_event_window: usize,

    /// World seed for deterministic generation
    pub seed: u64,

    /// Difficulty given to AI players created by takeover
    pub default_ai_difficulty: AiDifficulty,

    /// Personality given to AI players created by takeover
    pub default_ai_personality: AiPersonality,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 1_000,
            unit_timeout_ms: 5_000,
            ai_module_timeout_ms: 2_000,
            max_players: 50,
            max_ai_actions_per_civilization: 16,
            ai_think_every_ticks: 1,
            failure_review_threshold: 3,
            disconnect_grace_ticks: 60,
            stale_action_ticks: 10,
            autosave_every_ticks: 300,
            event_channel_capacity: 1_024,
            recent_event_window: 128,
            seed: 0x5EED,
            default_ai_difficulty: AiDifficulty::Medium,
            default_ai_personality: AiPersonality::Balanced,
        }
    }
}

impl EngineConfig {
    /// Load configuration from a YAML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;
        let config: Self = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))?;
        Ok(config)
    }

    /// Load from `path` if it exists, otherwise use defaults
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }

    pub fn unit_timeout(&self) -> Duration {
        Duration::from_millis(self.unit_timeout_ms)
    }

    pub fn ai_module_timeout(&self) -> Duration {
        Duration::from_millis(self.ai_module_timeout_ms)
    }
}
