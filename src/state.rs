// Game state engine
//
// Mutable position on top of an immutable geometry: drawn segments, active
// player, ball, and the two-step look-ahead of the current move. Every
// mutation appends step-change atoms so the caller can roll it back.

use std::fmt;
use std::rc::Rc;

use crate::geometry::{Geometry, GOAL_1, GOAL_2, NO_WAY};
use crate::history::StepChange;
use crate::step::{format_mask, Step, StepMask};

/// Outcome of a position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    InProgress,
    Win1,
    Win2,
}

/// Full game position
#[derive(Debug, Clone)]
pub struct State {
    geometry: Rc<Geometry>,
    lines: Vec<u8>,
    active: u8,
    ball: i32,
    step1: Option<Step>,
    step2: Option<Step>,
    step12: u64,
    changes: Vec<StepChange>,
}

impl State {
    /// Creates the kick-off position: empty board, ball in the centre, player 1 to move
    pub fn new(geometry: Rc<Geometry>) -> Self {
        let lines = vec![0; geometry.qpoints()];
        let ball = geometry.center();
        let mut state = State {
            geometry,
            lines,
            active: 1,
            ball,
            step1: None,
            step2: None,
            step12: 0,
            changes: Vec::new(),
        };
        state.step12 = state.lookahead(ball);
        state
    }

    /// Returns to the kick-off position, keeping the geometry
    pub fn reset(&mut self) {
        for line in self.lines.iter_mut() {
            *line = 0;
        }
        self.active = 1;
        self.ball = self.geometry.center();
        self.step1 = None;
        self.step2 = None;
        self.changes.clear();
        self.step12 = self.lookahead(self.ball);
    }

    /// Copies the position of `other`; the change log of `self` is emptied
    pub fn copy_from(&mut self, other: &State) {
        if !Rc::ptr_eq(&self.geometry, &other.geometry) {
            self.geometry = Rc::clone(&other.geometry);
        }
        self.lines.clear();
        self.lines.extend_from_slice(&other.lines);
        self.active = other.active;
        self.ball = other.ball;
        self.step1 = other.step1;
        self.step2 = other.step2;
        self.step12 = other.step12;
        self.changes.clear();
    }

    pub fn geometry(&self) -> &Rc<Geometry> {
        &self.geometry
    }

    /// Directions already drawn from every point
    pub fn lines(&self) -> &[u8] {
        &self.lines
    }

    pub fn active(&self) -> u8 {
        self.active
    }

    pub fn ball(&self) -> i32 {
        self.ball
    }

    pub fn step1(&self) -> Option<Step> {
        self.step1
    }

    pub fn step2(&self) -> Option<Step> {
        self.step2
    }

    pub fn step12(&self) -> u64 {
        self.step12
    }

    /// Changes appended since the last `clear_changes`
    pub fn changes(&self) -> &[StepChange] {
        &self.changes
    }

    pub fn clear_changes(&mut self) {
        self.changes.clear();
    }

    /// The active player must kick: no move started and no look-ahead pairs
    pub fn is_free_kick_situation(&self) -> bool {
        self.step1.is_none() && self.step12 == 0
    }

    pub fn status(&self) -> Status {
        match self.ball {
            GOAL_1 => Status::Win1,
            GOAL_2 => Status::Win2,
            _ if self.get_steps() == 0 => {
                if self.active == 1 {
                    Status::Win2
                } else {
                    Status::Win1
                }
            }
            _ => Status::InProgress,
        }
    }

    /// Legal steps from the current position
    pub fn get_steps(&self) -> StepMask {
        if self.ball < 0 {
            return 0;
        }

        if self.is_free_kick_situation() {
            return self.geometry.free_kick_steps(self.ball);
        }

        match (self.step1, self.step2) {
            (None, _) => Step::all()
                .iter()
                .filter(|step| (self.step12 >> (step.index() * 8)) & 0xFF != 0)
                .fold(0, |mask, step| mask | step.bit()),
            (Some(step1), None) => ((self.step12 >> (step1.index() * 8)) & 0xFF) as StepMask,
            (Some(_), Some(_)) => self.unit_steps(self.ball),
        }
    }

    /// Applies a step
    ///
    /// # Returns
    /// * `i32` - New ball point, `GOAL_1`/`GOAL_2`, or `NO_WAY` when the step
    ///   is not legal (the state is left untouched)
    pub fn step(&mut self, step: Step) -> i32 {
        if self.get_steps() & step.bit() == 0 {
            return NO_WAY;
        }

        if self.is_free_kick_situation() {
            self.kick(step)
        } else {
            self.pass(step)
        }
    }

    fn pass(&mut self, step: Step) -> i32 {
        let from = self.ball;
        let next = self.geometry.connection(from, step);

        self.changes.push(StepChange::Ball(from));
        self.draw(from, step);
        self.ball = next;

        if next >= 0 {
            match (self.step1, self.step2) {
                (None, _) => {
                    self.changes.push(StepChange::Step1(None));
                    self.step1 = Some(step);
                }
                (Some(_), None) => {
                    self.changes.push(StepChange::Step2(None));
                    self.step2 = Some(step);
                }
                (Some(step1), Some(step2)) => {
                    self.changes.push(StepChange::Step1(Some(step1)));
                    self.changes.push(StepChange::Step2(Some(step2)));
                    self.step1 = None;
                    self.step2 = None;

                    // Opponent without a complete move: the mover kicks
                    let lookahead = self.lookahead(next);
                    self.set_step12(lookahead);
                    if lookahead != 0 {
                        self.swap_active();
                    }
                }
            }
        }

        self.changes.push(StepChange::Pass(step));
        next
    }

    fn kick(&mut self, step: Step) -> i32 {
        let next = self.geometry.free_kick(self.ball, step);

        self.changes.push(StepChange::Ball(self.ball));
        self.ball = next;

        if next >= 0 {
            let lookahead = if self.lines[next as usize] != 0 {
                0
            } else {
                self.lookahead(next)
            };
            if lookahead != 0 {
                self.set_step12(lookahead);
                self.swap_active();
            }
        }

        self.changes.push(StepChange::FreeKick(step));
        next
    }

    fn set_step12(&mut self, value: u64) {
        self.changes.push(StepChange::Step12Lo(self.step12 as u32));
        self.changes.push(StepChange::Step12Hi((self.step12 >> 32) as u32));
        self.step12 = value;
    }

    fn swap_active(&mut self) {
        self.changes.push(StepChange::Active(self.active));
        self.active = 3 - self.active;
    }

    /// Undoes a run of changes produced by `step`, newest last
    pub fn rollback(&mut self, changes: &[StepChange]) {
        let mut erase = None;
        for change in changes.iter().rev() {
            match *change {
                StepChange::Pass(step) => erase = Some(step),
                StepChange::FreeKick(_) => erase = None,
                StepChange::Step1(step) => self.step1 = step,
                StepChange::Step2(step) => self.step2 = step,
                StepChange::Step12Lo(bits) => {
                    self.step12 = (self.step12 & !0xFFFF_FFFF) | bits as u64;
                }
                StepChange::Step12Hi(bits) => {
                    self.step12 = (self.step12 & 0xFFFF_FFFF) | ((bits as u64) << 32);
                }
                StepChange::Active(active) => self.active = active,
                StepChange::Ball(ball) => {
                    if let Some(step) = erase.take() {
                        self.erase(ball, step);
                    }
                    self.ball = ball;
                }
            }
        }
    }

    fn draw(&mut self, point: i32, step: Step) {
        self.lines[point as usize] |= step.bit();
        let next = self.geometry.connection(point, step);
        if next >= 0 {
            self.lines[next as usize] |= step.back().bit();
        }
    }

    fn erase(&mut self, point: i32, step: Step) {
        self.lines[point as usize] &= !step.bit();
        let next = self.geometry.connection(point, step);
        if next >= 0 {
            self.lines[next as usize] &= !step.back().bit();
        }
    }

    /// Unit step rule: free segment, unvisited destination, no crossing of a
    /// drawn diagonal
    fn is_unit_step_legal(&self, point: i32, step: Step) -> bool {
        let next = self.geometry.connection(point, step);
        if next == NO_WAY {
            return false;
        }
        if self.lines[point as usize] & step.bit() != 0 {
            return false;
        }
        if next >= 0 && self.lines[next as usize] != 0 {
            return false;
        }
        if step.is_diagonal() {
            let side = self.geometry.neighbour(point, step.rotate(1));
            let other = self.geometry.neighbour(point, step.rotate(7));
            if side >= 0 && other >= 0 && self.lines[side as usize] & step.rotate(6).bit() != 0 {
                return false;
            }
        }
        true
    }

    fn unit_steps(&self, point: i32) -> StepMask {
        Step::all()
            .iter()
            .filter(|step| self.is_unit_step_legal(point, **step))
            .fold(0, |mask, step| mask | step.bit())
    }

    /// Pairs `(s1, s2)` after which a third step completes the move, bit `s1 * 8 + s2`
    fn lookahead(&mut self, point: i32) -> u64 {
        let mut result = 0u64;

        for step1 in Step::all() {
            if !self.is_unit_step_legal(point, step1) {
                continue;
            }
            let mid = self.geometry.connection(point, step1);
            if mid < 0 {
                result |= 0xFF << (step1.index() * 8);
                continue;
            }

            self.draw(point, step1);
            for step2 in Step::all() {
                if !self.is_unit_step_legal(mid, step2) {
                    continue;
                }
                let last = self.geometry.connection(mid, step2);
                let bit = 1u64 << (step1.index() * 8 + step2.index());
                if last < 0 {
                    result |= bit;
                    continue;
                }
                self.draw(mid, step2);
                if self.unit_steps(last) != 0 {
                    result |= bit;
                }
                self.erase(mid, step2);
            }
            self.erase(point, step1);
        }

        result
    }
}

impl PartialEq for State {
    /// Positions are equal when lines, players, ball and look-ahead agree
    fn eq(&self, other: &Self) -> bool {
        self.lines == other.lines
            && self.active == other.active
            && self.ball == other.ball
            && self.step1 == other.step1
            && self.step2 == other.step2
            && self.step12 == other.step12
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "active={}", self.active)?;
        match self.ball {
            GOAL_1 => write!(f, " ball=GOAL_1")?,
            GOAL_2 => write!(f, " ball=GOAL_2")?,
            ball => {
                let (x, y) = self.geometry.coords(ball);
                write!(f, " ball={} ({}, {})", ball, x, y)?;
            }
        }
        if let Some(step) = self.step1 {
            write!(f, " step1={}", step)?;
        }
        if let Some(step) = self.step2 {
            write!(f, " step2={}", step)?;
        }
        if self.step12 != 0 {
            write!(f, " step12={:016X}", self.step12)?;
        }
        if self.is_free_kick_situation() && self.ball >= 0 {
            write!(f, " free-kick")?;
        }
        write!(f, " steps=[{}]", format_mask(self.get_steps()))
    }
}
