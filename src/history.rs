// Step changes and game history
//
// Every state mutation is recorded as a run of atomic changes terminated by
// exactly one Pass or FreeKick atom. Rolling the atoms back in reverse order
// restores the previous position.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::step::{Step, INVALID_STEP};

pub const CHANGE_PASS: i32 = -1;
pub const CHANGE_FREE_KICK: i32 = -2;
pub const CHANGE_STEP1: i32 = -3;
pub const CHANGE_STEP2: i32 = -4;
pub const CHANGE_STEP_12_LO: i32 = -5;
pub const CHANGE_STEP_12_HI: i32 = -6;
pub const CHANGE_ACTIVE: i32 = -7;
pub const CHANGE_BALL: i32 = -8;

/// One atomic change of a state, carrying the value needed to undo it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepChange {
    /// Unit step terminating a run; the segment it drew is erased on rollback
    Pass(Step),
    /// Free-kick jump terminating a run
    FreeKick(Step),
    Step1(Option<Step>),
    Step2(Option<Step>),
    Step12Lo(u32),
    Step12Hi(u32),
    Active(u8),
    Ball(i32),
}

impl StepChange {
    /// Numeric record kind
    pub fn kind(&self) -> i32 {
        match self {
            StepChange::Pass(_) => CHANGE_PASS,
            StepChange::FreeKick(_) => CHANGE_FREE_KICK,
            StepChange::Step1(_) => CHANGE_STEP1,
            StepChange::Step2(_) => CHANGE_STEP2,
            StepChange::Step12Lo(_) => CHANGE_STEP_12_LO,
            StepChange::Step12Hi(_) => CHANGE_STEP_12_HI,
            StepChange::Active(_) => CHANGE_ACTIVE,
            StepChange::Ball(_) => CHANGE_BALL,
        }
    }

    /// 32-bit payload, interpretation depends on the kind
    pub fn payload(&self) -> u32 {
        fn step_value(step: Option<Step>) -> u32 {
            step.map_or(INVALID_STEP as u32, |s| s as u32)
        }

        match *self {
            StepChange::Pass(step) | StepChange::FreeKick(step) => step as u32,
            StepChange::Step1(step) | StepChange::Step2(step) => step_value(step),
            StepChange::Step12Lo(bits) | StepChange::Step12Hi(bits) => bits,
            StepChange::Active(active) => active as u32,
            StepChange::Ball(ball) => ball as u32,
        }
    }

    /// Rebuilds a change from its numeric record
    pub fn from_record(kind: i32, payload: u32) -> Option<StepChange> {
        let step = |value: u32| -> Option<Option<Step>> {
            if value == INVALID_STEP as u32 {
                Some(None)
            } else if value < INVALID_STEP as u32 {
                Step::from_index(value as u8).map(Some)
            } else {
                None
            }
        };

        match kind {
            CHANGE_PASS => step(payload)?.map(StepChange::Pass),
            CHANGE_FREE_KICK => step(payload)?.map(StepChange::FreeKick),
            CHANGE_STEP1 => step(payload).map(StepChange::Step1),
            CHANGE_STEP2 => step(payload).map(StepChange::Step2),
            CHANGE_STEP_12_LO => Some(StepChange::Step12Lo(payload)),
            CHANGE_STEP_12_HI => Some(StepChange::Step12Hi(payload)),
            CHANGE_ACTIVE => Some(StepChange::Active(payload as u8)),
            CHANGE_BALL => Some(StepChange::Ball(payload as i32)),
            _ => None,
        }
    }

    /// True for the atom that closes a step's run
    pub fn is_terminator(&self) -> bool {
        matches!(self, StepChange::Pass(_) | StepChange::FreeKick(_))
    }

    /// The user-visible step of a terminator atom
    pub fn step(&self) -> Option<Step> {
        match *self {
            StepChange::Pass(step) | StepChange::FreeKick(step) => Some(step),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HistoryError {
    #[error("history is full ({0} steps)")]
    Full(usize),
    #[error("history is empty")]
    Empty,
    #[error("cannot undo {requested} steps, only {available} in history")]
    TooManySteps { requested: usize, available: usize },
    #[error("history does not end with a completed step")]
    Corrupted,
}

/// Append-only record of played steps and the changes they produced
#[derive(Debug, Clone, Default)]
pub struct History {
    steps: Vec<Step>,
    changes: Vec<StepChange>,
    capacity: usize,
}

impl History {
    /// Creates a history holding at most `capacity` steps
    pub fn new(capacity: usize) -> Self {
        History {
            steps: Vec::new(),
            changes: Vec::new(),
            capacity,
        }
    }

    pub fn clear(&mut self) {
        self.steps.clear();
        self.changes.clear();
    }

    pub fn is_full(&self) -> bool {
        self.steps.len() >= self.capacity
    }

    /// Records one completed step with its change run
    pub fn push(&mut self, step: Step, changes: &[StepChange]) -> Result<(), HistoryError> {
        if self.is_full() {
            return Err(HistoryError::Full(self.capacity));
        }
        self.steps.push(step);
        self.changes.extend_from_slice(changes);
        Ok(())
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn changes(&self) -> &[StepChange] {
        &self.changes
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Index in `changes()` where the last `n` steps begin
    ///
    /// # Returns
    /// * `Result<usize, HistoryError>` - Offset of the first atom to roll back
    pub fn tail_start(&self, n: usize) -> Result<usize, HistoryError> {
        if self.changes.is_empty() {
            return Err(HistoryError::Empty);
        }
        if n > self.steps.len() {
            return Err(HistoryError::TooManySteps {
                requested: n,
                available: self.steps.len(),
            });
        }
        match self.changes.last() {
            Some(change) if change.is_terminator() => {}
            _ => return Err(HistoryError::Corrupted),
        }

        // Walk back n terminators; the run of the n-th starts right after the
        // (n+1)-th terminator or at the very beginning.
        let mut seen = 0;
        for (index, change) in self.changes.iter().enumerate().rev() {
            if change.is_terminator() {
                if seen == n {
                    return Ok(index + 1);
                }
                seen += 1;
            }
        }
        if seen == n {
            Ok(0)
        } else {
            Err(HistoryError::Corrupted)
        }
    }

    /// Drops the last `n` steps together with their changes
    pub fn truncate(&mut self, n: usize, changes_start: usize) {
        let keep = self.steps.len().saturating_sub(n);
        self.steps.truncate(keep);
        self.changes.truncate(changes_start);
    }

    /// Restores the lengths recorded by an earlier snapshot
    pub fn restore(&mut self, qsteps: usize, qchanges: usize) {
        self.steps.truncate(qsteps);
        self.changes.truncate(qchanges);
    }
}
