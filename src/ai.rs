// AI facade
//
// Uniform contract between the shell and an engine: step bookkeeping with a
// transactional history, tunable parameters, the search itself and the
// warnings it produced.

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use std::fmt;
use std::rc::Rc;
use std::time::Instant;
use thiserror::Error;

use crate::bsf::BsfParams;
use crate::geometry::{Geometry, NO_WAY};
use crate::history::{History, HistoryError};
use crate::mcts::{AnswerStat, CacheStats, Mcts, MctsParams, CACHE_AUTO};
use crate::node::MIN_CACHE;
use crate::preparation::Preparation;
use crate::state::State;
use crate::step::{mask_steps, Step};
use crate::warns::{Warn, Warnings};

/// Steps kept in the history by default
pub const DEFAULT_HISTORY_CAPACITY: usize = 16 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StepError {
    #[error("Direction occupied: {0}.")]
    OccupiedDirection(Step),
    #[error("History is full.")]
    HistoryFull,
    #[error("Error on step {index}: {source}")]
    AtStep {
        index: usize,
        #[source]
        source: Box<StepError>,
    },
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParamError {
    #[error("Unknown parameter “{0}”.")]
    Unknown(String),
    #[error("Invalid value “{value}” for parameter {name}.")]
    InvalidValue { name: &'static str, value: String },
    #[error("Too small value for cache, minimum is {0}.")]
    CacheTooSmall(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    I32,
    U32,
    F32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamValue {
    I32(i32),
    U32(u32),
    F32(f32),
}

impl ParamValue {
    fn as_u32(self) -> Option<u32> {
        match self {
            ParamValue::U32(value) => Some(value),
            ParamValue::I32(value) if value >= 0 => Some(value as u32),
            _ => None,
        }
    }

    fn as_f32(self) -> f32 {
        match self {
            ParamValue::F32(value) => value,
            ParamValue::U32(value) => value as f32,
            ParamValue::I32(value) => value as f32,
        }
    }

    /// Parses `text` as a value of type `kind`
    pub fn parse(kind: ParamType, text: &str) -> Option<ParamValue> {
        let text = text.trim();
        match kind {
            ParamType::I32 => text.parse().ok().map(ParamValue::I32),
            ParamType::U32 => text.parse().ok().map(ParamValue::U32),
            ParamType::F32 => text
                .parse::<f32>()
                .ok()
                .filter(|value| value.is_finite())
                .map(ParamValue::F32),
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::I32(value) => write!(f, "{}", value),
            ParamValue::U32(value) => write!(f, "{}", value),
            ParamValue::F32(value) => write!(f, "{}", value),
        }
    }
}

/// A named tunable and its current value
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Param {
    pub name: &'static str,
    pub kind: ParamType,
    pub value: ParamValue,
}

const PARAM_TYPES: [(&str, ParamType); 4] = [
    ("qthink", ParamType::U32),
    ("cache", ParamType::U32),
    ("max_depth", ParamType::U32),
    ("C", ParamType::F32),
];

/// What `go` looked at before answering
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Explanation {
    pub stats: Vec<AnswerStat>,
    /// Seconds spent in the search
    pub time: f64,
    /// Expected result for player 1 in `0..=1`, `-1` when unknown
    pub score: f64,
    pub cache: CacheStats,
    pub qthink: u32,
}

impl Default for Explanation {
    fn default() -> Self {
        Explanation {
            stats: Vec::new(),
            time: 0.0,
            score: -1.0,
            cache: CacheStats::default(),
            qthink: 0,
        }
    }
}

/// Construction options of an engine
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AiOptions {
    pub mcts: MctsParams,
    pub bsf: BsfParams,
    /// `0` seeds the random source from OS entropy
    pub seed: u64,
    pub history_capacity: usize,
}

impl Default for AiOptions {
    fn default() -> Self {
        AiOptions {
            mcts: MctsParams::default(),
            bsf: BsfParams::default(),
            seed: 0,
            history_capacity: DEFAULT_HISTORY_CAPACITY,
        }
    }
}

/// Copy of `params` with parameter `name` set to `value`
fn updated_params(
    mut params: MctsParams,
    name: &'static str,
    value: ParamValue,
) -> Result<MctsParams, ParamError> {
    let invalid = || ParamError::InvalidValue {
        name,
        value: value.to_string(),
    };

    match name {
        "qthink" => params.qthink = value.as_u32().ok_or_else(invalid)?,
        "cache" => {
            let cache = value.as_u32().ok_or_else(invalid)?;
            if cache != CACHE_AUTO && (cache as usize) < MIN_CACHE {
                return Err(ParamError::CacheTooSmall(MIN_CACHE));
            }
            params.cache = cache;
        }
        "max_depth" => params.max_depth = value.as_u32().ok_or_else(invalid)?,
        _ => {
            let c = value.as_f32();
            if !c.is_finite() || c < 0.0 {
                return Err(invalid());
            }
            params.c = c;
        }
    }
    Ok(params)
}

/// Contract every engine exposes to the shell
pub trait Ai {
    /// Starts a new game on `geometry`, keeping the parameters
    fn reset(&mut self, geometry: Rc<Geometry>);
    fn do_step(&mut self, step: Step) -> Result<(), StepError>;
    /// Applies all steps or none of them
    fn do_steps(&mut self, steps: &[Step]) -> Result<(), StepError>;
    fn undo_step(&mut self) -> Result<(), HistoryError>;
    fn undo_steps(&mut self, count: usize) -> Result<(), HistoryError>;
    /// Chooses the next step; `None` leaves a message in `error()`
    fn go(&mut self, explanation: Option<&mut Explanation>) -> Option<Step>;
    fn get_params(&self) -> Vec<Param>;
    fn set_param(&mut self, name: &str, value: ParamValue) -> Result<(), ParamError>;
    fn get_state(&self) -> &State;
    fn get_warn(&self, index: usize) -> Option<&Warn>;
    fn history(&self) -> &History;
    fn error(&self) -> Option<&str>;

    /// Parses `text` with the type of parameter `name` and sets it
    fn set_param_str(&mut self, name: &str, text: &str) -> Result<(), ParamError> {
        let param = self
            .get_params()
            .into_iter()
            .find(|param| param.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| ParamError::Unknown(name.to_string()))?;
        let value = ParamValue::parse(param.kind, text).ok_or_else(|| ParamError::InvalidValue {
            name: param.name,
            value: text.to_string(),
        })?;
        self.set_param(param.name, value)
    }
}

/// MCTS engine behind the `Ai` contract
pub struct MctsAi {
    geometry: Rc<Geometry>,
    state: State,
    history: History,
    prep: Preparation,
    warns: Warnings,
    mcts: Mcts,
    error: Option<String>,
}

impl MctsAi {
    /// Creates an engine; the random source follows `options.seed`
    pub fn new(geometry: Rc<Geometry>, options: AiOptions) -> Self {
        let rng = if options.seed == 0 {
            StdRng::from_os_rng()
        } else {
            StdRng::seed_from_u64(options.seed)
        };
        Self::with_rng(geometry, options, rng)
    }

    /// Creates an engine drawing all random choices from `rng`
    pub fn with_rng(geometry: Rc<Geometry>, options: AiOptions, rng: StdRng) -> Self {
        MctsAi {
            state: State::new(Rc::clone(&geometry)),
            history: History::new(options.history_capacity),
            prep: Preparation::new(),
            warns: Warnings::new(),
            mcts: Mcts::new(&geometry, options.mcts, options.bsf, rng),
            error: None,
            geometry,
        }
    }

    pub fn geometry(&self) -> &Rc<Geometry> {
        &self.geometry
    }

    pub fn warnings(&self) -> &Warnings {
        &self.warns
    }

    /// Steps cached from the last free-kick answer
    pub fn preparation(&self) -> &Preparation {
        &self.prep
    }

    /// One-line dump of the position
    pub fn status_line(&self) -> String {
        format!(
            "{} status={:?} history={}",
            self.state,
            self.state.status(),
            self.history.len()
        )
    }

    fn fail<E: fmt::Display>(&mut self, error: E) -> E {
        self.error = Some(error.to_string());
        error
    }
}

impl Ai for MctsAi {
    fn reset(&mut self, geometry: Rc<Geometry>) {
        self.error = None;
        self.state = State::new(Rc::clone(&geometry));
        self.history.clear();
        self.prep.reset();
        self.warns.reset();
        self.mcts.set_geometry(&geometry);
        self.geometry = geometry;
    }

    fn do_step(&mut self, step: Step) -> Result<(), StepError> {
        self.error = None;

        if self.prep.pop() != Some(step) {
            self.prep.reset();
        }

        if self.history.is_full() {
            return Err(self.fail(StepError::HistoryFull));
        }

        self.state.clear_changes();
        if self.state.step(step) == NO_WAY {
            return Err(self.fail(StepError::OccupiedDirection(step)));
        }

        let pushed = self.history.push(step, self.state.changes());
        self.state.clear_changes();
        match pushed {
            Ok(()) => Ok(()),
            Err(_) => Err(self.fail(StepError::HistoryFull)),
        }
    }

    fn do_steps(&mut self, steps: &[Step]) -> Result<(), StepError> {
        self.error = None;
        let qsteps = self.history.len();
        let qchanges = self.history.changes().len();

        for (index, step) in steps.iter().enumerate() {
            if let Err(error) = self.do_step(*step) {
                self.state.rollback(&self.history.changes()[qchanges..]);
                self.history.restore(qsteps, qchanges);
                self.prep.reset();
                let error = StepError::AtStep {
                    index,
                    source: Box::new(error),
                };
                return Err(self.fail(error));
            }
        }
        Ok(())
    }

    fn undo_step(&mut self) -> Result<(), HistoryError> {
        self.undo_steps(1)
    }

    fn undo_steps(&mut self, count: usize) -> Result<(), HistoryError> {
        if count == 0 {
            return Ok(());
        }
        self.error = None;

        let start = match self.history.tail_start(count) {
            Ok(start) => start,
            Err(error) => return Err(self.fail(error)),
        };

        self.prep.reset();
        self.state.rollback(&self.history.changes()[start..]);
        self.history.truncate(count, start);
        Ok(())
    }

    fn go(&mut self, mut explanation: Option<&mut Explanation>) -> Option<Step> {
        self.error = None;
        self.warns.reset();
        if let Some(explanation) = explanation.as_mut() {
            **explanation = Explanation::default();
        }

        if let Some(step) = self.prep.peek() {
            log::debug!("Returning prepared step {}", step);
            return Some(step);
        }

        let start = Instant::now();
        let steps = self.state.get_steps();
        if steps == 0 {
            self.error = Some("no possible steps.".to_string());
            return None;
        }
        if steps.count_ones() == 1 {
            return mask_steps(steps).next();
        }

        let explain = explanation.is_some();
        let thought = match self.mcts.think(&mut self.warns, &self.state, explain) {
            Ok(thought) => thought,
            Err(message) if self.state.is_free_kick_situation() => {
                // Only losing or unstorable series: the kicker still has to move
                log::debug!("No free-kick answer ({}), kicking first legal step", message);
                return mask_steps(steps).next();
            }
            Err(message) => {
                log::error!("Search failed: {}", message);
                self.error = Some(message);
                return None;
            }
        };

        if let Some(serie) = &thought.serie {
            self.prep.fill(serie);
        }

        if let Some(explanation) = explanation {
            explanation.time = start.elapsed().as_secs_f64();
            explanation.score = match thought.stats.first() {
                Some(stat) if self.state.active() == 2 && stat.score >= 0.0 => 1.0 - stat.score,
                Some(stat) => stat.score,
                None => -1.0,
            };
            explanation.stats = thought.stats;
            explanation.cache = thought.cache;
            explanation.qthink = thought.qthink;
        }

        Some(thought.step)
    }

    fn get_params(&self) -> Vec<Param> {
        let params = self.mcts.params();
        PARAM_TYPES
            .iter()
            .map(|&(name, kind)| {
                let value = match name {
                    "qthink" => ParamValue::U32(params.qthink),
                    "cache" => ParamValue::U32(params.cache),
                    "max_depth" => ParamValue::U32(params.max_depth),
                    _ => ParamValue::F32(params.c),
                };
                Param { name, kind, value }
            })
            .collect()
    }

    fn set_param(&mut self, name: &str, value: ParamValue) -> Result<(), ParamError> {
        self.error = None;

        let name = match PARAM_TYPES
            .iter()
            .find(|(param, _)| param.eq_ignore_ascii_case(name))
        {
            Some((param, _)) => *param,
            None => return Err(self.fail(ParamError::Unknown(name.to_string()))),
        };

        let params = match updated_params(self.mcts.params(), name, value) {
            Ok(params) => params,
            Err(error) => return Err(self.fail(error)),
        };

        log::debug!("Parameter {} set to {}", name, value);
        self.mcts.set_params(params);
        Ok(())
    }

    fn get_state(&self) -> &State {
        &self.state
    }

    fn get_warn(&self, index: usize) -> Option<&Warn> {
        self.warns.get(index)
    }

    fn history(&self) -> &History {
        &self.history
    }

    fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }
}
