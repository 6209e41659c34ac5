// Engine warnings
//
// Non-fatal anomalies found during a search. Each code is stored once per
// search together with two named values and the source location that raised it.

use serde::Serialize;
use std::fmt;
use std::panic::Location;

/// Stable warning codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum WarnCode {
    WrongWarn = 1,
    StepsAreCycles = 2,
    ActiveOutOfRange = 3,
    InconsistentStepsPriority = 4,
    BsfAllocFailed = 5,
    BsfSeriesOverflow = 6,
    BsfNodeParentNull = 7,
    BsfNodeNotFromRoot = 8,
}

/// Number of distinct codes; also the maximum number of stored warnings
pub const QWARNS: usize = 8;

impl WarnCode {
    pub fn code(self) -> i32 {
        self as i32
    }

    pub fn message(self) -> &'static str {
        match self {
            WarnCode::WrongWarn => "Wrong warning",
            WarnCode::StepsAreCycles => "All steps are cycles!",
            WarnCode::ActiveOutOfRange => "state->active value is out of range",
            WarnCode::InconsistentStepsPriority => "Inconsistent values for steps/priories",
            WarnCode::BsfAllocFailed => "BSF node allocation failed",
            WarnCode::BsfSeriesOverflow => "BSF series capacity exceeded",
            WarnCode::BsfNodeParentNull => "BSF node parent is NULL before reaching root",
            WarnCode::BsfNodeNotFromRoot => "BSF serie path does not start from root",
        }
    }
}

/// One recorded warning
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Warn {
    pub code: WarnCode,
    pub msg: &'static str,
    pub param1: Option<&'static str>,
    pub value1: u64,
    pub param2: Option<&'static str>,
    pub value2: u64,
    pub file_name: &'static str,
    pub line_num: u32,
}

impl fmt::Display for Warn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}: {}", self.file_name, self.line_num, self.msg)?;
        if let Some(name) = self.param1 {
            write!(f, " {}={}", name, self.value1)?;
        }
        if let Some(name) = self.param2 {
            write!(f, " {}={}", name, self.value2)?;
        }
        Ok(())
    }
}

/// Deduplicated warnings of the current search
#[derive(Debug, Clone, Default)]
pub struct Warnings {
    warns: Vec<Warn>,
}

impl Warnings {
    pub fn new() -> Self {
        Warnings {
            warns: Vec::with_capacity(QWARNS),
        }
    }

    pub fn reset(&mut self) {
        self.warns.clear();
    }

    /// Records a warning at the caller's location unless its code is already stored
    #[track_caller]
    pub fn add(
        &mut self,
        code: WarnCode,
        param1: Option<&'static str>,
        value1: u64,
        param2: Option<&'static str>,
        value2: u64,
    ) {
        let location = Location::caller();
        self.insert(code, param1, value1, param2, value2, location);
    }

    fn insert(
        &mut self,
        code: WarnCode,
        param1: Option<&'static str>,
        value1: u64,
        param2: Option<&'static str>,
        value2: u64,
        location: &'static Location<'static>,
    ) {
        if self.warns.iter().any(|warn| warn.code == code) || self.warns.len() >= QWARNS {
            return;
        }

        let warn = Warn {
            code,
            msg: code.message(),
            param1,
            value1,
            param2,
            value2,
            file_name: location.file(),
            line_num: location.line(),
        };
        log::warn!("{}", warn);
        self.warns.push(warn);
    }

    pub fn get(&self, index: usize) -> Option<&Warn> {
        self.warns.get(index)
    }

    pub fn len(&self) -> usize {
        self.warns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.warns.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Warn> {
        self.warns.iter()
    }
}
