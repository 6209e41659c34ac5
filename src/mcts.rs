// Monte-Carlo tree search
//
// UCB1 descent over the node arena, random rollouts and score
// back-propagation. Regular positions expand one single-step child per
// answer; free-kick positions are expanded through the free-kick enumerator
// into ball-move children grouping packed series by landing point.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;
use std::rc::Rc;

use crate::bsf::{BsfParams, FreeKickSearch};
use crate::cycle_guard::CycleGuard;
use crate::geometry::Geometry;
use crate::node::{
    NodeArena, NodeIndex, NodeKind, PackedSerie, MAX_QANSWERS, NODE_SIZE, ROOT, ZERO,
};
use crate::state::{State, Status};
use crate::step::{mask_steps, Step, StepMask};
use crate::warns::{WarnCode, Warnings};

/// `cache` value asking for an arena sized from `qthink`
pub const CACHE_AUTO: u32 = 0;

/// Search tunables
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MctsParams {
    /// Step budget of one search
    pub qthink: u32,
    /// Arena size in bytes, `CACHE_AUTO` derives it from `qthink`
    pub cache: u32,
    /// Rollout length cap
    pub max_depth: u32,
    /// UCB1 exploration constant
    pub c: f32,
}

impl Default for MctsParams {
    fn default() -> Self {
        MctsParams {
            qthink: 1024 * 1024,
            cache: CACHE_AUTO,
            max_depth: 128,
            c: 1.4,
        }
    }
}

impl MctsParams {
    /// Arena size in bytes
    pub fn cache_bytes(&self) -> usize {
        if self.cache == CACHE_AUTO {
            (self.qthink as usize).max(1024 * NODE_SIZE)
        } else {
            self.cache as usize
        }
    }
}

/// Statistics of one root answer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnswerStat {
    pub steps: Vec<Step>,
    pub ball: i32,
    pub qgames: i32,
    /// Expected result for the mover in `0..=1`, `-1` when never played
    pub score: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct CacheStats {
    pub used: usize,
    pub total: usize,
    pub good_alloc: u32,
    pub bad_alloc: u32,
}

/// Result of one search
#[derive(Debug, Clone, PartialEq)]
pub struct Thought {
    pub step: Step,
    /// Full serie when the answer is a free-kick chain, `step` is its head
    pub serie: Option<Vec<Step>>,
    /// Chosen answer first, then by descending visits
    pub stats: Vec<AnswerStat>,
    pub cache: CacheStats,
    pub qthink: u32,
}

#[derive(Debug, Clone, Copy)]
struct HistItem {
    node: NodeIndex,
    active: u8,
}

struct BallMove {
    ball: i32,
    distance: u32,
    series: Vec<PackedSerie>,
}

/// Picks a random step of a non-empty mask
pub fn random_step<R: Rng>(steps: StepMask, rng: &mut R) -> Option<Step> {
    let count = steps.count_ones() as usize;
    if count == 0 {
        return None;
    }
    let choice = if count == 1 {
        0
    } else {
        rng.random_range(0..count)
    };
    mask_steps(steps).nth(choice)
}

/// Plays random steps until the game ends or `max_steps` runs out
///
/// # Returns
/// * `i32` - `+1` when player 1 wins, `-1` when player 2 wins, `0` on cutoff
pub fn rollout<R: Rng>(state: &mut State, max_steps: u32, qthink: &mut u32, rng: &mut R) -> i32 {
    let mut remaining = max_steps;
    loop {
        match state.status() {
            Status::Win1 => return 1,
            Status::Win2 => return -1,
            Status::InProgress => {}
        }

        if remaining == 0 {
            return 0;
        }
        remaining -= 1;

        let step = match random_step(state.get_steps(), rng) {
            Some(step) => step,
            None => return if state.active() != 1 { 1 } else { -1 },
        };
        state.step(step);
        *qthink += 1;
    }
}

/// UCB1 choice among the answers of `index`
///
/// Unplayed children are taken first, in answer order; ties of the weight
/// are broken uniformly at random.
pub fn select_answer<R: Rng>(
    nodes: &NodeArena,
    index: NodeIndex,
    qanswers: usize,
    c: f32,
    rng: &mut R,
) -> usize {
    if qanswers <= 1 {
        return 0;
    }

    let parent_games = nodes.get(index).map_or(0, |node| node.qgames);
    if parent_games <= 0 {
        return rng.random_range(0..qanswers);
    }

    let log_total = (parent_games as f32).ln();
    let mut best = [0usize; MAX_QANSWERS];
    let mut qbest = 0;
    let mut best_weight = -1.0e10f32;

    for answer in 0..qanswers.min(MAX_QANSWERS) {
        let child = match nodes.answer(index, answer).and_then(|child| nodes.get(child)) {
            Some(child) => child,
            None => continue,
        };

        if child.qgames == 0 {
            return answer;
        }

        let qgames = child.qgames as f32;
        let weight = child.score as f32 / qgames + c * (log_total / qgames).sqrt();
        if weight > best_weight {
            best_weight = weight;
            qbest = 0;
        }
        if weight == best_weight {
            best[qbest] = answer;
            qbest += 1;
        }
    }

    match qbest {
        0 => 0,
        1 => best[0],
        _ => best[rng.random_range(0..qbest)],
    }
}

pub struct Mcts {
    geometry: Rc<Geometry>,
    params: MctsParams,
    nodes: NodeArena,
    bsf: FreeKickSearch,
    guard: CycleGuard,
    backup: Option<State>,
    hist: Vec<HistItem>,
    max_hist_len: usize,
    rng: StdRng,
}

impl Mcts {
    pub fn new(
        geometry: &Rc<Geometry>,
        params: MctsParams,
        bsf_params: BsfParams,
        rng: StdRng,
    ) -> Self {
        let guard_capacity =
            CycleGuard::capacity_for(geometry.qpoints(), geometry.free_kick_len());
        Mcts {
            geometry: Rc::clone(geometry),
            params,
            nodes: NodeArena::with_cache(params.cache_bytes()),
            bsf: FreeKickSearch::new(geometry, bsf_params),
            guard: CycleGuard::new(guard_capacity),
            backup: None,
            hist: Vec::new(),
            max_hist_len: 0,
            rng,
        }
    }

    pub fn params(&self) -> MctsParams {
        self.params
    }

    /// Installs new tunables, rebuilding the arena when its size changes
    pub fn set_params(&mut self, params: MctsParams) {
        let resize = params.cache_bytes() != self.params.cache_bytes();
        self.params = params;
        if resize {
            self.nodes = NodeArena::with_cache(params.cache_bytes());
        }
    }

    pub fn nodes(&self) -> &NodeArena {
        &self.nodes
    }

    /// Rebinds the search to a new board; tunables and random source are kept
    pub fn set_geometry(&mut self, geometry: &Rc<Geometry>) {
        let bsf_params = self.bsf.params();
        self.geometry = Rc::clone(geometry);
        self.bsf = FreeKickSearch::new(geometry, bsf_params);
        self.guard = CycleGuard::new(CycleGuard::capacity_for(
            geometry.qpoints(),
            geometry.free_kick_len(),
        ));
        self.backup = None;
        self.nodes.reset();
    }

    pub fn max_hist_len(&self) -> usize {
        self.max_hist_len
    }

    pub fn cache_stats(&self) -> CacheStats {
        CacheStats {
            used: self.nodes.used(),
            total: self.nodes.total(),
            good_alloc: self.nodes.good_alloc(),
            bad_alloc: self.nodes.bad_alloc(),
        }
    }

    /// Clears the arena and allocates the `zero` sentinel and the root
    pub fn reset_tree(&mut self) -> Result<(), String> {
        self.nodes.reset();

        let zero = self
            .nodes
            .alloc(NodeKind::Terminal, None)
            .ok_or_else(|| "alloc zero node failed.".to_string())?;
        if let Some(node) = self.nodes.get_mut(zero) {
            node.score = 2;
            node.qgames = 1;
        }

        let root = self
            .nodes
            .alloc(NodeKind::Terminal, None)
            .ok_or_else(|| "alloc root node failed.".to_string())?;
        if let Some(node) = self.nodes.get_mut(root) {
            node.qgames = 1;
        }
        Ok(())
    }

    /// Materialises the answers of `index` on its first visit
    ///
    /// # Returns
    /// * `Option<usize>` - Number of answers, `None` when the arena ran out
    pub fn calc_answers(
        &mut self,
        warns: &mut Warnings,
        index: NodeIndex,
        state: &State,
    ) -> Option<usize> {
        let node = self.nodes.get(index)?;
        if let Some(qanswers) = node.qanswers {
            return Some(qanswers);
        }

        if !state.is_free_kick_situation() || state.ball() < 0 {
            let steps = state.get_steps();
            let node = self.nodes.get_mut(index)?;
            node.steps = steps;
            node.qanswers = Some(steps.count_ones() as usize);
            return node.qanswers;
        }

        self.guard.reset();
        self.bsf.generate(warns, state, &self.guard);

        if let Some(win) = self.bsf.win() {
            match PackedSerie::pack(&win.steps) {
                Some(packed) => {
                    let ball = win.ball;
                    return self.add_win(index, ball, packed);
                }
                None => log::debug!("Winning serie of {} steps is too long", win.steps.len()),
            }
        }

        let active = state.active();
        let mut series: Vec<(i32, PackedSerie)> = self
            .bsf
            .series()
            .iter()
            .filter_map(|serie| PackedSerie::pack(&serie.steps).map(|packed| (serie.ball, packed)))
            .collect();
        if series.is_empty() {
            let node = self.nodes.get_mut(index)?;
            node.qanswers = Some(0);
            return Some(0);
        }
        series.sort_by_key(|(ball, _)| *ball);

        let mut ball_moves: Vec<BallMove> = Vec::new();
        for (ball, packed) in series {
            match ball_moves.last_mut() {
                Some(last) if last.ball == ball => last.series.push(packed),
                _ => ball_moves.push(BallMove {
                    ball,
                    distance: self.geometry.dist_to_goal(active, ball),
                    series: vec![packed],
                }),
            }
        }

        // Equal distances come out in random order
        ball_moves.shuffle(&mut self.rng);
        ball_moves.sort_by_key(|ball_move| ball_move.distance);
        if ball_moves.len() > MAX_QANSWERS {
            log::debug!("Dropping {} ball moves", ball_moves.len() - MAX_QANSWERS);
            ball_moves.truncate(MAX_QANSWERS);
        }

        self.nodes
            .alloc_answers(index, ball_moves.len(), NodeKind::BallMove)
            .ok()?;

        for (answer, ball_move) in ball_moves.iter().enumerate() {
            let bnode = self.nodes.answer(index, answer)?;
            let count = ball_move.series.len().min(MAX_QANSWERS);
            self.nodes
                .alloc_answers(bnode, count, NodeKind::Path)
                .ok()?;
            self.nodes.get_mut(bnode)?.ball = ball_move.ball;

            for (path, packed) in ball_move.series.iter().take(count).enumerate() {
                let pnode = self.nodes.answer(bnode, path)?;
                let node = self.nodes.get_mut(pnode)?;
                node.serie = *packed;
                node.step = packed.first();
                node.ball = ball_move.ball;
            }
        }

        Some(ball_moves.len())
    }

    /// Pins a winning serie as the only answer of `index`
    fn add_win(&mut self, index: NodeIndex, ball: i32, packed: PackedSerie) -> Option<usize> {
        self.nodes.alloc_answers(index, 1, NodeKind::BallMove).ok()?;
        let bnode = self.nodes.answer(index, 0)?;
        self.nodes.alloc_answers(bnode, 1, NodeKind::Path).ok()?;
        let pnode = self.nodes.answer(bnode, 0)?;

        {
            let node = self.nodes.get_mut(pnode)?;
            node.serie = packed;
            node.step = packed.first();
            node.ball = ball;
            node.qanswers = Some(0);
        }
        {
            let node = self.nodes.get_mut(bnode)?;
            node.score = 2;
            node.qgames = 1;
            node.ball = ball;
        }
        let node = self.nodes.get_mut(index)?;
        node.ball = ball;
        Some(1)
    }

    fn apply_answer(&self, state: &mut State, index: NodeIndex) {
        let node = match self.nodes.get(index) {
            Some(node) => node,
            None => return,
        };
        match node.kind {
            NodeKind::Single => {
                if let Some(step) = node.step {
                    state.step(step);
                }
            }
            NodeKind::Path => {
                for step in node.serie.unpack() {
                    state.step(step);
                }
            }
            NodeKind::BallMove | NodeKind::Terminal => {}
        }
    }

    fn add_history(&mut self, node: NodeIndex, active: u8) {
        self.hist.push(HistItem { node, active });
    }

    /// Adds one game with `score` (player 1 view) to every node of the descent
    fn update_history(&mut self, warns: &mut Warnings, score: i32) {
        for item in &self.hist {
            let node = match self.nodes.get_mut(item.node) {
                Some(node) => node,
                None => continue,
            };
            node.qgames += 1;
            match item.active {
                1 => node.score += score,
                2 => node.score -= score,
                active => warns.add(
                    WarnCode::ActiveOutOfRange,
                    Some("active"),
                    active as u64,
                    Some("node"),
                    item.node as u64,
                ),
            }
        }
        self.max_hist_len = self.max_hist_len.max(self.hist.len());
    }

    /// Step of an unexpanded single-step answer
    fn pending_step(&self, index: NodeIndex, answer: usize) -> Option<Step> {
        let node = self.nodes.get(index)?;
        self.geometry.nth_step(node.steps, answer)
    }

    /// One descent from the root followed by a rollout
    ///
    /// # Returns
    /// * `u32` - Steps consumed, `0` when the arena is exhausted
    pub fn simulate(&mut self, warns: &mut Warnings, origin: &State) -> u32 {
        let mut state = match self.backup.take() {
            Some(state) => state,
            None => origin.clone(),
        };
        state.copy_from(origin);
        let result = self.descend(warns, &mut state);
        self.backup = Some(state);
        result
    }

    fn descend(&mut self, warns: &mut Warnings, state: &mut State) -> u32 {
        if state.ball() < 0 {
            return 1;
        }

        let mut qthink = 1u32;
        self.hist.clear();

        let mut index = ROOT;
        let (last_step, last_answer) = loop {
            let active = state.active();

            let qanswers = match self.calc_answers(warns, index, state) {
                Some(qanswers) => qanswers,
                None => return 0,
            };

            if qanswers == 0 {
                self.update_history(warns, if active != 1 { 1 } else { -1 });
                return qthink;
            }

            let answer = select_answer(&self.nodes, index, qanswers, self.params.c, &mut self.rng);
            qthink += 1;

            let child = match self.nodes.answer(index, answer) {
                Some(child) => child,
                None => return 0,
            };

            if child == ZERO {
                break (self.pending_step(index, answer), answer);
            }

            self.apply_answer(state, child);
            self.add_history(child, active);

            match state.status() {
                Status::Win1 => {
                    self.update_history(warns, 1);
                    return qthink;
                }
                Status::Win2 => {
                    self.update_history(warns, -1);
                    return qthink;
                }
                Status::InProgress => {}
            }

            index = child;
        };

        let step = match last_step {
            Some(step) => step,
            None => {
                warns.add(
                    WarnCode::InconsistentStepsPriority,
                    Some("node"),
                    index as u64,
                    Some("answer"),
                    last_answer as u64,
                );
                return 0;
            }
        };

        let old_active = state.active();
        let ball = state.step(step);

        let child = match self.nodes.alloc(NodeKind::Single, Some(step)) {
            Some(child) => child,
            None => return 0,
        };
        if let Some(node) = self.nodes.get_mut(child) {
            node.ball = ball;
        }
        self.nodes.set_answer(index, last_answer, child);
        self.add_history(child, old_active);

        let score = rollout(state, self.params.max_depth, &mut qthink, &mut self.rng);
        self.update_history(warns, score);
        qthink
    }

    /// Most visited answer of `index`, ties broken at random
    pub fn best_answer(&mut self, index: NodeIndex) -> Option<usize> {
        let qanswers = self.nodes.get(index)?.qanswers?;
        let mut best = Vec::with_capacity(qanswers);
        let mut best_qgames = i32::MIN;

        for answer in 0..qanswers {
            let qgames = match self.nodes.answer(index, answer) {
                Some(ZERO) => 0,
                Some(child) => match self.nodes.get(child) {
                    Some(node) => node.qgames,
                    None => continue,
                },
                None => continue,
            };
            if qgames > best_qgames {
                best_qgames = qgames;
                best.clear();
            }
            if qgames == best_qgames {
                best.push(answer);
            }
        }

        match best.len() {
            0 => None,
            1 => Some(best[0]),
            n => Some(best[self.rng.random_range(0..n)]),
        }
    }

    /// Steps played by `answer` of `index`: one step or the best serie of a ball move
    fn answer_steps(&mut self, index: NodeIndex, answer: usize) -> Option<(Vec<Step>, i32)> {
        let child = self.nodes.answer(index, answer)?;
        if child == ZERO {
            let step = self.pending_step(index, answer)?;
            return Some((vec![step], crate::geometry::NO_WAY));
        }

        let (kind, step, ball) = {
            let node = self.nodes.get(child)?;
            (node.kind, node.step, node.ball)
        };
        match kind {
            NodeKind::Single => step.map(|step| (vec![step], ball)),
            NodeKind::BallMove => {
                let path = self.best_answer(child)?;
                let pnode = self.nodes.answer(child, path)?;
                let steps = self.nodes.get(pnode)?.serie.unpack();
                if steps.is_empty() {
                    None
                } else {
                    Some((steps, ball))
                }
            }
            NodeKind::Path | NodeKind::Terminal => None,
        }
    }

    /// Runs simulations from the root until the budget is spent or the arena is full
    ///
    /// # Returns
    /// * `u32` - Steps consumed
    pub fn run(&mut self, warns: &mut Warnings, state: &State, budget: u32) -> u32 {
        let mut qthink = 0u32;
        loop {
            let delta = self.simulate(warns, state);
            if delta == 0 {
                break;
            }
            qthink = qthink.saturating_add(delta);
            if let Some(root) = self.nodes.get_mut(ROOT) {
                root.qgames += 1;
            }
            if qthink >= budget {
                break;
            }
        }
        qthink
    }

    /// Full search from `state`
    pub fn think(
        &mut self,
        warns: &mut Warnings,
        state: &State,
        explain: bool,
    ) -> Result<Thought, String> {
        self.reset_tree()?;

        let qanswers = self
            .calc_answers(warns, ROOT, state)
            .ok_or_else(|| "calc answers for root failed.".to_string())?;
        if qanswers == 0 {
            return Err("no possible steps.".to_string());
        }

        let qthink = if qanswers > 1 {
            self.run(warns, state, self.params.qthink)
        } else {
            0
        };

        let best = self
            .best_answer(ROOT)
            .ok_or_else(|| "no valid answer at root.".to_string())?;
        let (steps, _) = self
            .answer_steps(ROOT, best)
            .ok_or_else(|| format!("unexpected node for answer {}.", best))?;
        let step = steps[0];
        let serie = if self.is_ball_move(ROOT, best) {
            Some(steps)
        } else {
            None
        };

        let stats = if explain && qanswers > 1 {
            self.answer_stats(best, qanswers)
        } else {
            Vec::new()
        };

        log::debug!(
            "Search done: qthink={} nodes={}/{} bad_alloc={}",
            qthink,
            self.nodes.used(),
            self.nodes.total(),
            self.nodes.bad_alloc()
        );

        Ok(Thought {
            step,
            serie,
            stats,
            cache: self.cache_stats(),
            qthink,
        })
    }

    fn is_ball_move(&self, index: NodeIndex, answer: usize) -> bool {
        self.nodes
            .answer(index, answer)
            .and_then(|child| self.nodes.get(child))
            .map_or(false, |node| node.kind == NodeKind::BallMove)
    }

    fn answer_stats(&mut self, best: usize, qanswers: usize) -> Vec<AnswerStat> {
        let mut chosen = None;
        let mut others = Vec::with_capacity(qanswers);

        for answer in 0..qanswers {
            let (steps, ball) = match self.answer_steps(ROOT, answer) {
                Some(result) => result,
                None => continue,
            };
            let (qgames, score) = match self.nodes.answer(ROOT, answer) {
                Some(ZERO) | None => (0, 0),
                Some(child) => self
                    .nodes
                    .get(child)
                    .map_or((0, 0), |node| (node.qgames, node.score)),
            };
            let norm = if qgames > 0 {
                0.5 * (score + qgames) as f64 / qgames as f64
            } else {
                -1.0
            };
            let stat = AnswerStat {
                steps,
                ball,
                qgames,
                score: norm,
            };
            if answer == best {
                chosen = Some(stat);
            } else {
                others.push(stat);
            }
        }

        others.sort_by(|a, b| b.qgames.cmp(&a.qgames));
        chosen.into_iter().chain(others).collect()
    }
}
