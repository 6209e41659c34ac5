// Recorded games
//
// A protocol is a named game: board parameters plus the steps played so far.
// Stored as JSON, the step list may be a single string ("N NE, S") or an array.

use serde::{Deserialize, Serialize};
use std::convert::TryFrom;
use std::fs;
use std::path::Path;
use std::rc::Rc;
use thiserror::Error;

use crate::ai::{Ai, StepError};
use crate::geometry::{BoardParams, Geometry, GeometryError, NO_WAY};
use crate::state::State;
use crate::step::{parse_steps, Step};

/// Failure to set up or replay a protocol
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProtocolError {
    #[error("protocol {name}: {source}")]
    InvalidBoard {
        name: String,
        source: GeometryError,
    },
    #[error("protocol {name}: step #{index} ({step}) rejected: {reason}")]
    Rejected {
        name: String,
        index: usize,
        step: Step,
        reason: String,
    },
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum StepList {
    Text(String),
    List(Vec<Step>),
}

#[derive(Debug, Deserialize)]
struct RawProtocol {
    name: String,
    board: BoardParams,
    #[serde(default)]
    steps: Option<StepList>,
}

/// A named recorded game
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawProtocol")]
pub struct GameProtocol {
    pub name: String,
    pub board: BoardParams,
    pub steps: Vec<Step>,
}

impl TryFrom<RawProtocol> for GameProtocol {
    type Error = String;

    fn try_from(raw: RawProtocol) -> Result<Self, Self::Error> {
        let steps = match raw.steps {
            None => Vec::new(),
            Some(StepList::List(steps)) => steps,
            Some(StepList::Text(text)) => parse_steps(&text)?,
        };
        Ok(GameProtocol {
            name: raw.name,
            board: raw.board,
            steps,
        })
    }
}

impl GameProtocol {
    pub fn new(name: &str, board: BoardParams, steps: Vec<Step>) -> Self {
        GameProtocol {
            name: name.to_string(),
            board,
            steps,
        }
    }

    /// Loads a protocol from a JSON file
    ///
    /// # Arguments
    /// * `path` - Path to the protocol file
    ///
    /// # Returns
    /// * `Result<GameProtocol, String>` - Parsed protocol or error message
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, String> {
        let contents = fs::read_to_string(path.as_ref())
            .map_err(|e| format!("Failed to read protocol file: {}", e))?;

        Self::from_json(&contents)
    }

    pub fn from_json(json: &str) -> Result<Self, String> {
        serde_json::from_str(json).map_err(|e| format!("Failed to parse protocol: {}", e))
    }

    pub fn to_json(&self) -> Result<String, String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| format!("Failed to serialize protocol: {}", e))
    }

    /// The same game cut after its first `len` steps
    pub fn prefix(&self, len: usize) -> GameProtocol {
        GameProtocol {
            name: self.name.clone(),
            board: self.board,
            steps: self.steps[..len.min(self.steps.len())].to_vec(),
        }
    }

    pub fn geometry(&self) -> Result<Geometry, ProtocolError> {
        Geometry::from_params(self.board).map_err(|source| ProtocolError::InvalidBoard {
            name: self.name.clone(),
            source,
        })
    }

    /// Resets `ai` to the protocol board and plays every step
    ///
    /// On failure the engine is left at the position before the rejected step.
    pub fn replay(&self, ai: &mut dyn Ai) -> Result<(), ProtocolError> {
        let geometry = Rc::new(self.geometry()?);
        ai.reset(geometry);

        for (index, &step) in self.steps.iter().enumerate() {
            ai.do_step(step).map_err(|error: StepError| ProtocolError::Rejected {
                name: self.name.clone(),
                index,
                step,
                reason: error.to_string(),
            })?;
        }

        log::debug!("Protocol {} replayed, {} steps", self.name, self.steps.len());
        Ok(())
    }

    /// Plays the protocol on a bare state without history
    pub fn state(&self) -> Result<State, ProtocolError> {
        let geometry = Rc::new(self.geometry()?);
        let mut state = State::new(geometry);

        for (index, &step) in self.steps.iter().enumerate() {
            if state.step(step) == NO_WAY {
                return Err(ProtocolError::Rejected {
                    name: self.name.clone(),
                    index,
                    step,
                    reason: "direction is occupied".to_string(),
                });
            }
            state.clear_changes();
        }
        Ok(state)
    }
}
