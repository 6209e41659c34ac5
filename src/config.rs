// Configuration module for reading Paper.toml
// Board defaults, search tunables, free-kick enumerator limits and debug logging

use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::ai::{AiOptions, DEFAULT_HISTORY_CAPACITY};
use crate::bsf::BsfParams;
use crate::geometry::BoardParams;
use crate::mcts::MctsParams;

/// Main configuration structure containing all tunable parameters
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub board: BoardConfig,
    pub mcts: MctsConfig,
    pub free_kicks: FreeKicksConfig,
    pub engine: EngineConfig,
    pub debug: DebugConfig,
}

/// Board used by a new game
#[derive(Debug, Deserialize, Clone)]
pub struct BoardConfig {
    pub width: u32,
    pub height: u32,
    pub goal_width: u32,
    pub free_kick_len: u32,
}

impl BoardConfig {
    pub fn params(&self) -> BoardParams {
        BoardParams {
            width: self.width,
            height: self.height,
            goal_width: self.goal_width,
            free_kick_len: self.free_kick_len,
        }
    }
}

/// Search tunables, same names as the engine parameters
#[derive(Debug, Deserialize, Clone)]
pub struct MctsConfig {
    /// Step budget per search
    pub qthink: u32,
    /// Node arena size in bytes, 0 derives it from qthink
    pub cache: u32,
    /// Rollout length cap
    pub max_depth: u32,
    /// UCB1 exploration constant
    pub c: f32,
}

/// Free-kick enumerator limits
#[derive(Debug, Deserialize, Clone)]
pub struct FreeKicksConfig {
    pub capacity: usize,
    pub max_depth: u32,
    pub max_alts: u32,
    pub max_visits: u32,
}

/// Engine construction
#[derive(Debug, Deserialize, Clone)]
pub struct EngineConfig {
    /// Random seed, 0 seeds from OS entropy
    pub seed: u64,
    pub history_capacity: usize,
}

/// Debug logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct DebugConfig {
    pub enabled: bool,
    pub log_file_path: String,
}

impl Config {
    /// Loads configuration from a TOML file
    ///
    /// # Arguments
    /// * `path` - Path to the Paper.toml configuration file
    ///
    /// # Returns
    /// * `Result<Config, String>` - Parsed configuration or error message
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, String> {
        let contents = fs::read_to_string(path.as_ref())
            .map_err(|e| format!("Failed to read config file: {}", e))?;

        toml::from_str(&contents)
            .map_err(|e| format!("Failed to parse config file: {}", e))
    }

    /// Loads default configuration from Paper.toml in the project root
    pub fn load_default() -> Result<Self, String> {
        Self::from_file("Paper.toml")
    }

    /// Creates a configuration with hardcoded default values as fallback
    /// This should match the constants defined in Paper.toml
    pub fn default_hardcoded() -> Self {
        Config {
            board: BoardConfig {
                width: 15,
                height: 23,
                goal_width: 6,
                free_kick_len: 5,
            },
            mcts: MctsConfig {
                qthink: 1024 * 1024,
                cache: 0,
                max_depth: 128,
                c: 1.4,
            },
            free_kicks: FreeKicksConfig {
                capacity: 256,
                max_depth: 32,
                max_alts: 8,
                max_visits: 8,
            },
            engine: EngineConfig {
                seed: 0,
                history_capacity: DEFAULT_HISTORY_CAPACITY,
            },
            debug: DebugConfig {
                enabled: false,
                log_file_path: "paper_debug.jsonl".to_string(),
            },
        }
    }

    /// Attempts to load from file, falls back to hardcoded defaults on error
    pub fn load_or_default() -> Self {
        Self::load_default()
            .unwrap_or_else(|e| {
                eprintln!("Warning: Could not load Paper.toml ({}), using hardcoded defaults", e);
                Self::default_hardcoded()
            })
    }

    /// Engine options described by this configuration
    pub fn ai_options(&self) -> AiOptions {
        AiOptions {
            mcts: MctsParams {
                qthink: self.mcts.qthink,
                cache: self.mcts.cache,
                max_depth: self.mcts.max_depth,
                c: self.mcts.c,
            },
            bsf: BsfParams {
                capacity: self.free_kicks.capacity,
                max_depth: self.free_kicks.max_depth,
                max_alts: self.free_kicks.max_alts,
                max_visits: self.free_kicks.max_visits,
            },
            seed: self.engine.seed,
            history_capacity: self.engine.history_capacity,
        }
    }
}
