// Debug logging module for engine decisions
//
// Each answer of the engine is appended to a JSONL file together with the
// board and the steps that led to the position, so the replay tool can
// rebuild it later.

use log::error;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::Write;

use crate::ai::Explanation;
use crate::geometry::BoardParams;
use crate::step::Step;

/// Represents a single debug log entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebugLogEntry {
    /// Number of steps played before the answer
    pub turn: usize,
    pub board: BoardParams,
    pub steps: Vec<Step>,
    pub active: u8,
    pub chosen_step: Step,
    /// Expected result for player 1, `-1` when the search was skipped
    pub score: f64,
    pub time_secs: f64,
    pub timestamp: String,
}

impl DebugLogEntry {
    pub fn new(
        board: BoardParams,
        steps: &[Step],
        active: u8,
        chosen_step: Step,
        explanation: &Explanation,
    ) -> Self {
        DebugLogEntry {
            turn: steps.len(),
            board,
            steps: steps.to_vec(),
            active,
            chosen_step,
            score: explanation.score,
            time_secs: explanation.time,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Append-only JSONL writer; a disabled logger ignores every entry
pub struct DebugLogger {
    file: Option<File>,
}

impl DebugLogger {
    /// Creates a new debug logger
    /// If enabled is true, initializes the log file (truncating if it exists)
    pub fn new(enabled: bool, log_file_path: &str) -> Self {
        if !enabled {
            return DebugLogger::disabled();
        }

        match OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(log_file_path)
        {
            Ok(file) => {
                log::info!("Debug logging enabled: {}", log_file_path);
                DebugLogger { file: Some(file) }
            }
            Err(e) => {
                error!("Failed to create debug log file '{}': {}", log_file_path, e);
                DebugLogger::disabled()
            }
        }
    }

    /// Creates a disabled debug logger (no-op)
    pub fn disabled() -> Self {
        DebugLogger { file: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.file.is_some()
    }

    /// Writes one entry and flushes it
    pub fn log_answer(&mut self, entry: &DebugLogEntry) {
        let file = match self.file.as_mut() {
            Some(file) => file,
            None => return,
        };

        match serde_json::to_string(entry) {
            Ok(json_line) => {
                if let Err(e) = writeln!(file, "{}", json_line) {
                    error!("Failed to write debug log entry: {}", e);
                } else if let Err(e) = file.flush() {
                    error!("Failed to flush debug log: {}", e);
                }
            }
            Err(e) => {
                error!("Failed to serialize debug log entry: {}", e);
            }
        }
    }
}
