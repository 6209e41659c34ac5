// Breadth-first free-kick enumerator
//
// Expands every jump sequence available to the kicker from a free-kick
// position and collects the series that end the chain: a fresh landing point,
// a win or a loss. All nodes live in a fixed pool threaded on three intrusive
// lists (free, waiting, used) so repeated searches never allocate.

use serde::Serialize;
use std::rc::Rc;

use crate::cycle_guard::{CycleGuard, CycleResult};
use crate::geometry::{Geometry, GOAL_1, GOAL_2, NO_WAY};
use crate::state::State;
use crate::step::{mask_steps, Step};
use crate::warns::{WarnCode, Warnings};

/// Pool and pruning limits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BsfParams {
    /// Pool size in nodes; also the capacity of the series list
    pub capacity: usize,
    /// Chains reaching this depth are dropped
    pub max_depth: u32,
    /// Series kept per landing point
    pub max_alts: u32,
    /// Expansions allowed per ball position
    pub max_visits: u32,
}

impl Default for BsfParams {
    fn default() -> Self {
        BsfParams {
            capacity: 256,
            max_depth: 32,
            max_alts: 8,
            max_visits: 8,
        }
    }
}

/// A completed free-kick chain, steps in play order
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Serie {
    pub ball: i32,
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddSerieStatus {
    AddedOk,
    /// The series list is full
    AddedLast,
    /// The parent chain is broken
    AddedFailure,
}

#[derive(Debug, Clone, Copy, Default)]
struct Link {
    prev: Option<usize>,
    next: Option<usize>,
}

#[derive(Debug, Clone, Copy, Default)]
struct List {
    head: Option<usize>,
    tail: Option<usize>,
    len: usize,
}

impl List {
    fn push_back(&mut self, links: &mut [Link], index: usize) {
        links[index] = Link {
            prev: self.tail,
            next: None,
        };
        match self.tail {
            Some(tail) => links[tail].next = Some(index),
            None => self.head = Some(index),
        }
        self.tail = Some(index);
        self.len += 1;
    }

    fn pop_front(&mut self, links: &mut [Link]) -> Option<usize> {
        let index = self.head?;
        self.head = links[index].next;
        match self.head {
            Some(head) => links[head].prev = None,
            None => self.tail = None,
        }
        links[index] = Link::default();
        self.len -= 1;
        Some(index)
    }

    /// Moves every element of `other` to the end of `self`
    fn splice(&mut self, links: &mut [Link], other: &mut List) {
        let (head, tail) = match (other.head, other.tail) {
            (Some(head), Some(tail)) => (head, tail),
            _ => return,
        };
        match self.tail {
            Some(own_tail) => {
                links[own_tail].next = Some(head);
                links[head].prev = Some(own_tail);
            }
            None => self.head = Some(head),
        }
        self.tail = Some(tail);
        self.len += other.len;
        *other = List::default();
    }
}

#[derive(Debug, Clone)]
struct BsfNode {
    parent: Option<usize>,
    state: State,
    guard: CycleGuard,
    step: Option<Step>,
    depth: u32,
}

/// Reusable enumerator bound to one geometry
#[derive(Debug, Clone)]
pub struct FreeKickSearch {
    params: BsfParams,
    nodes: Vec<BsfNode>,
    links: Vec<Link>,
    free: List,
    waiting: List,
    used: List,
    root: Option<usize>,
    series: Vec<Serie>,
    win: Option<Serie>,
    loss: Option<Serie>,
    alts: Vec<u32>,
    visits: Vec<u32>,
}

fn pair_mut(nodes: &mut [BsfNode], a: usize, b: usize) -> (&mut BsfNode, &mut BsfNode) {
    if a < b {
        let (left, right) = nodes.split_at_mut(b);
        (&mut left[a], &mut right[0])
    } else {
        let (left, right) = nodes.split_at_mut(a);
        (&mut right[0], &mut left[b])
    }
}

impl FreeKickSearch {
    pub fn new(geometry: &Rc<Geometry>, params: BsfParams) -> Self {
        let qpoints = geometry.qpoints();
        let guard_capacity = CycleGuard::capacity_for(qpoints, geometry.free_kick_len());
        let template = BsfNode {
            parent: None,
            state: State::new(Rc::clone(geometry)),
            guard: CycleGuard::new(guard_capacity),
            step: None,
            depth: 0,
        };

        let mut links = vec![Link::default(); params.capacity];
        let mut free = List::default();
        for index in 0..params.capacity {
            free.push_back(&mut links, index);
        }

        FreeKickSearch {
            params,
            nodes: vec![template; params.capacity],
            links,
            free,
            waiting: List::default(),
            used: List::default(),
            root: None,
            series: Vec::with_capacity(params.capacity),
            win: None,
            loss: None,
            alts: vec![0; qpoints],
            visits: vec![0; qpoints],
        }
    }

    pub fn params(&self) -> BsfParams {
        self.params
    }

    /// Series ending on a board point, in discovery order
    pub fn series(&self) -> &[Serie] {
        &self.series
    }

    /// First serie scoring for the kicker
    pub fn win(&self) -> Option<&Serie> {
        self.win.as_ref()
    }

    /// First serie scoring against the kicker
    pub fn loss(&self) -> Option<&Serie> {
        self.loss.as_ref()
    }

    /// Nodes taken from the pool by the last run
    pub fn used_nodes(&self) -> usize {
        self.params.capacity - self.free.len
    }

    fn recycle(&mut self) {
        let mut waiting = std::mem::take(&mut self.waiting);
        let mut used = std::mem::take(&mut self.used);
        self.free.splice(&mut self.links, &mut waiting);
        self.free.splice(&mut self.links, &mut used);
        self.root = None;
        self.series.clear();
        self.win = None;
        self.loss = None;
        for value in self.alts.iter_mut().chain(self.visits.iter_mut()) {
            *value = 0;
        }
    }

    fn alloc(&mut self, warns: &mut Warnings) -> Option<usize> {
        let index = self.free.pop_front(&mut self.links);
        if index.is_none() {
            warns.add(
                WarnCode::BsfAllocFailed,
                Some("capacity"),
                self.params.capacity as u64,
                Some("series"),
                self.series.len() as u64,
            );
        }
        index
    }

    /// Enumerates the free-kick series of the kicker in `state`
    ///
    /// Stops at the first winning serie. Pool exhaustion stops the search with
    /// a warning; the series found so far stay valid.
    pub fn generate(&mut self, warns: &mut Warnings, state: &State, guard: &CycleGuard) {
        self.recycle();

        let root = match self.alloc(warns) {
            Some(index) => index,
            None => return,
        };
        {
            let node = &mut self.nodes[root];
            node.parent = None;
            node.state.copy_from(state);
            node.guard.copy_from(guard);
            node.step = None;
            node.depth = 0;
        }
        self.root = Some(root);
        self.waiting.push_back(&mut self.links, root);

        let mut cycles = 0u64;
        while let Some(index) = self.waiting.pop_front(&mut self.links) {
            if self.win.is_some() {
                self.free.push_back(&mut self.links, index);
                break;
            }

            let ball = self.nodes[index].state.ball();
            if ball < 0 || self.visits[ball as usize] >= self.params.max_visits {
                self.free.push_back(&mut self.links, index);
                continue;
            }
            self.visits[ball as usize] += 1;
            self.used.push_back(&mut self.links, index);

            let active = self.nodes[index].state.active();
            let depth = self.nodes[index].depth;
            let steps = self.nodes[index].state.get_steps();

            for step in mask_steps(steps) {
                let child = match self.alloc(warns) {
                    Some(child) => child,
                    None => return,
                };

                let next = {
                    let (parent, node) = pair_mut(&mut self.nodes, index, child);
                    node.state.copy_from(&parent.state);
                    node.state.step(step)
                };

                if next < 0 || !self.nodes[child].state.is_free_kick_situation() {
                    self.free.push_back(&mut self.links, child);
                    self.add_serie(warns, index, active, step, next);
                    continue;
                }

                if depth + 1 >= self.params.max_depth {
                    self.free.push_back(&mut self.links, child);
                    continue;
                }

                if self.nodes[index].guard.push(ball, next) == CycleResult::CycleFound {
                    cycles += 1;
                    self.free.push_back(&mut self.links, child);
                    continue;
                }

                {
                    let (parent, node) = pair_mut(&mut self.nodes, index, child);
                    node.guard.copy_from(&parent.guard);
                    parent.guard.pop();
                    node.parent = Some(index);
                    node.step = Some(step);
                    node.depth = depth + 1;
                }
                self.waiting.push_back(&mut self.links, child);
            }
        }

        if self.series.is_empty() && self.win.is_none() && self.loss.is_none() && cycles > 0 {
            warns.add(WarnCode::StepsAreCycles, Some("cycles"), cycles, None, 0);
        }

        log::debug!(
            "Free kick search: {} series, win={}, loss={}, nodes={}",
            self.series.len(),
            self.win.is_some(),
            self.loss.is_some(),
            self.used_nodes()
        );
    }

    /// Records the serie leading from the root through `parent` and `step` to `ball`
    pub fn add_serie(
        &mut self,
        warns: &mut Warnings,
        parent: usize,
        active: u8,
        step: Step,
        ball: i32,
    ) -> AddSerieStatus {
        if ball == NO_WAY {
            warns.add(
                WarnCode::InconsistentStepsPriority,
                Some("step"),
                step as u64,
                Some("parent"),
                parent as u64,
            );
            return AddSerieStatus::AddedFailure;
        }

        if ball < 0 {
            let is_win = (active == 1 && ball == GOAL_1) || (active == 2 && ball == GOAL_2);
            let taken = if is_win {
                self.win.is_some()
            } else {
                self.loss.is_some()
            };
            if taken {
                return AddSerieStatus::AddedOk;
            }

            let steps = match self.trace(warns, parent, step) {
                Some(steps) => steps,
                None => return AddSerieStatus::AddedFailure,
            };
            let serie = Serie { ball, steps };
            if is_win {
                self.win = Some(serie);
            } else {
                self.loss = Some(serie);
            }
            return AddSerieStatus::AddedOk;
        }

        let landing = ball as usize;
        if self.alts[landing] >= self.params.max_alts {
            return AddSerieStatus::AddedOk;
        }

        if self.series.len() >= self.params.capacity {
            warns.add(
                WarnCode::BsfSeriesOverflow,
                Some("capacity"),
                self.params.capacity as u64,
                Some("ball"),
                landing as u64,
            );
            return AddSerieStatus::AddedLast;
        }

        let steps = match self.trace(warns, parent, step) {
            Some(steps) => steps,
            None => return AddSerieStatus::AddedFailure,
        };
        self.alts[landing] += 1;
        self.series.push(Serie { ball, steps });

        if self.series.len() >= self.params.capacity {
            AddSerieStatus::AddedLast
        } else {
            AddSerieStatus::AddedOk
        }
    }

    /// Step path from the root to `parent`, followed by `step`
    fn trace(&self, warns: &mut Warnings, parent: usize, step: Step) -> Option<Vec<Step>> {
        let depth = self.nodes[parent].depth as usize;
        let mut steps = vec![step; depth + 1];

        let mut current = parent;
        for slot in (0..depth).rev() {
            let node = &self.nodes[current];
            match (node.step, node.parent) {
                (Some(node_step), Some(up)) => {
                    steps[slot] = node_step;
                    current = up;
                }
                _ => {
                    warns.add(
                        WarnCode::BsfNodeParentNull,
                        Some("node"),
                        current as u64,
                        Some("depth"),
                        slot as u64,
                    );
                    return None;
                }
            }
        }

        if self.root != Some(current) {
            warns.add(
                WarnCode::BsfNodeNotFromRoot,
                Some("node"),
                current as u64,
                None,
                0,
            );
            return None;
        }

        Some(steps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_splice_and_pop() {
        let mut links = vec![Link::default(); 4];
        let mut a = List::default();
        let mut b = List::default();
        a.push_back(&mut links, 0);
        a.push_back(&mut links, 1);
        b.push_back(&mut links, 2);
        b.push_back(&mut links, 3);
        a.splice(&mut links, &mut b);
        assert_eq!(a.len, 4);
        assert_eq!(b.len, 0);
        let order: Vec<usize> = std::iter::from_fn(|| a.pop_front(&mut links)).collect();
        assert_eq!(order, vec![0, 1, 2, 3]);
        assert!(a.head.is_none() && a.tail.is_none());
    }

    #[test]
    fn test_no_series_outside_free_kick() {
        let geometry = Rc::new(Geometry::new(15, 23, 6, 5).unwrap());
        let state = State::new(Rc::clone(&geometry));
        let mut search = FreeKickSearch::new(&geometry, BsfParams::default());
        let mut warns = Warnings::new();
        let guard = CycleGuard::new(8);
        search.generate(&mut warns, &state, &guard);
        // Kick-off: every unit step lands outside a free-kick situation
        assert_eq!(search.series().len(), 8);
        assert!(search.series().iter().all(|serie| serie.steps.len() == 1));
        assert!(search.win().is_none());
        assert!(warns.is_empty());
    }
}
