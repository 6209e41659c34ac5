// Step directions and step masks
// A step is one of the eight compass directions, indexed clockwise from NW

use serde::{Deserialize, Serialize};
use std::convert::TryFrom;
use std::fmt;
use std::str::FromStr;

/// Number of step directions
pub const QSTEPS: usize = 8;

/// 8-bit set of steps, bit `i` stands for the step with index `i`
pub type StepMask = u8;

/// Raw value used where a step slot is empty (step tables, packed records)
pub const INVALID_STEP: u8 = QSTEPS as u8;

/// One of the eight lattice directions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Step {
    NorthWest = 0,
    North = 1,
    NorthEast = 2,
    East = 3,
    SouthEast = 4,
    South = 5,
    SouthWest = 6,
    West = 7,
}

const ALL_STEPS: [Step; QSTEPS] = [
    Step::NorthWest,
    Step::North,
    Step::NorthEast,
    Step::East,
    Step::SouthEast,
    Step::South,
    Step::SouthWest,
    Step::West,
];

const STEP_NAMES: [&str; QSTEPS] = ["NW", "N", "NE", "E", "SE", "S", "SW", "W"];

impl Step {
    /// Returns all steps in index order
    pub fn all() -> [Step; QSTEPS] {
        ALL_STEPS
    }

    /// Converts an index in 0..8 into a step
    pub fn from_index(index: u8) -> Option<Step> {
        ALL_STEPS.get(index as usize).copied()
    }

    pub fn index(self) -> usize {
        self as usize
    }

    /// Single-bit mask of this step
    pub fn bit(self) -> StepMask {
        1 << (self as u8)
    }

    /// The opposite direction, `(s + 4) mod 8`
    pub fn back(self) -> Step {
        ALL_STEPS[(self as usize + 4) & 7]
    }

    /// Rotates clockwise by `eighths` eighths of a turn
    pub fn rotate(self, eighths: usize) -> Step {
        ALL_STEPS[(self as usize + eighths) & 7]
    }

    pub fn is_diagonal(self) -> bool {
        (self as u8) & 1 == 0
    }

    /// Lattice offset `(dx, dy)` with `y` growing southwards
    pub fn delta(self) -> (i32, i32) {
        match self {
            Step::NorthWest => (-1, -1),
            Step::North => (0, -1),
            Step::NorthEast => (1, -1),
            Step::East => (1, 0),
            Step::SouthEast => (1, 1),
            Step::South => (0, 1),
            Step::SouthWest => (-1, 1),
            Step::West => (-1, 0),
        }
    }

    /// Canonical upper-case name
    pub fn as_str(self) -> &'static str {
        STEP_NAMES[self as usize]
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for Step {
    type Err = String;

    /// Parses a step name, case-insensitive
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        STEP_NAMES
            .iter()
            .position(|name| *name == upper)
            .map(|index| ALL_STEPS[index])
            .ok_or_else(|| format!("Invalid step: {}", s))
    }
}

impl TryFrom<String> for Step {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Step> for String {
    fn from(step: Step) -> Self {
        step.as_str().to_string()
    }
}

/// Iterates over the steps contained in a mask, lowest index first
pub fn mask_steps(mask: StepMask) -> impl Iterator<Item = Step> {
    ALL_STEPS
        .iter()
        .copied()
        .filter(move |step| mask & step.bit() != 0)
}

/// Formats a mask as a space separated list of step names
pub fn format_mask(mask: StepMask) -> String {
    mask_steps(mask)
        .map(Step::as_str)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Parses a list of steps separated by spaces and/or commas
pub fn parse_steps(text: &str) -> Result<Vec<Step>, String> {
    text.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|token| !token.is_empty())
        .map(str::parse)
        .collect()
}

/// Formats a step sequence with canonical names
pub fn format_steps(steps: &[Step]) -> String {
    steps
        .iter()
        .map(|step| step.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}
