// Cycle guard for free-kick chains
//
// Bounded log of the jumps made during one chain. A jump that retraces an
// earlier edge is flagged as an override; a run of overrides that returns to
// an already reached point is a cycle.

/// Outcome of `CycleGuard::push`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleResult {
    NoCycle,
    CycleFound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Kick {
    from: i32,
    to: i32,
    retraces: bool,
}

/// Jumps of the current free-kick chain
#[derive(Debug, Clone)]
pub struct CycleGuard {
    kicks: Vec<Kick>,
    capacity: usize,
}

impl CycleGuard {
    pub fn new(capacity: usize) -> Self {
        CycleGuard {
            kicks: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Capacity for a board: `4 + qpoints / (free_kick_len - 1)^2`
    pub fn capacity_for(qpoints: usize, free_kick_len: u32) -> usize {
        let jump = free_kick_len.saturating_sub(1).max(1) as usize;
        4 + qpoints / (jump * jump)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.kicks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kicks.is_empty()
    }

    pub fn reset(&mut self) {
        self.kicks.clear();
    }

    /// Removes the last jump
    pub fn pop(&mut self) {
        self.kicks.pop();
    }

    /// Duplicates the jumps of `other`, keeping own capacity
    pub fn copy_from(&mut self, other: &CycleGuard) {
        self.kicks.clear();
        self.kicks.extend_from_slice(&other.kicks);
    }

    /// Records the jump `from -> to` unless it closes a cycle
    ///
    /// # Returns
    /// * `CycleResult::CycleFound` - The guard is full or the jump loops back;
    ///   nothing is recorded
    /// * `CycleResult::NoCycle` - The jump was appended
    pub fn push(&mut self, from: i32, to: i32) -> CycleResult {
        if self.kicks.len() >= self.capacity {
            return CycleResult::CycleFound;
        }

        let retraces = self.kicks.iter().rev().any(|kick| {
            let matches = (from == kick.from) as u32
                + (from == kick.to) as u32
                + (to == kick.from) as u32
                + (to == kick.to) as u32;
            matches >= 2
        });

        if retraces && self.kicks.len() >= 2 {
            for kick in self.kicks.iter().rev() {
                if kick.to == to {
                    return CycleResult::CycleFound;
                }
                if !kick.retraces {
                    break;
                }
            }
        }

        self.kicks.push(Kick { from, to, retraces });
        CycleResult::NoCycle
    }
}
