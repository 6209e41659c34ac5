// Cached tail of a free-kick serie
// Filled by one search and consumed one step per `go` call.

use std::collections::VecDeque;

use crate::step::Step;

/// Longest serie the queue accepts
pub const MAX_FREE_KICK_SERIE: usize = 32;

#[derive(Debug, Clone, Default)]
pub struct Preparation {
    steps: VecDeque<Step>,
}

impl Preparation {
    pub fn new() -> Self {
        Preparation {
            steps: VecDeque::with_capacity(MAX_FREE_KICK_SERIE),
        }
    }

    pub fn reset(&mut self) {
        self.steps.clear();
    }

    /// Replaces the queue content; longer series are cut to `MAX_FREE_KICK_SERIE`
    pub fn fill(&mut self, steps: &[Step]) {
        self.steps.clear();
        self.steps
            .extend(steps.iter().copied().take(MAX_FREE_KICK_SERIE));
    }

    pub fn peek(&self) -> Option<Step> {
        self.steps.front().copied()
    }

    pub fn pop(&mut self) -> Option<Step> {
        self.steps.pop_front()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}
