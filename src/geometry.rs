// Board geometry
//
// Immutable lattice topology built once per game: neighbour and connection
// tables, free-kick jump tables, goal distances and the nth-set-bit table.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use thiserror::Error;

use crate::step::{Step, StepMask, INVALID_STEP, QSTEPS};

/// Ball reached the north goal (player 1 scores)
pub const GOAL_1: i32 = -1;
/// Ball reached the south goal (player 2 scores)
pub const GOAL_2: i32 = -2;
/// Direction leads off the board or along a drawn border line
pub const NO_WAY: i32 = -3;

/// Distance value for points that cannot reach a goal
pub const UNREACHABLE: u32 = u32::MAX;

/// Rejected board parameters
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GeometryError {
    #[error("width must be odd and at least 5, got {0}")]
    BadWidth(u32),
    #[error("height must be odd and at least 5, got {0}")]
    BadHeight(u32),
    #[error("goal width must be even and in 2..={max}, got {value}")]
    BadGoalWidth { value: u32, max: u32 },
    #[error("free kick length must be at least 4 and below half of the shorter side, got {0}")]
    BadFreeKickLen(u32),
}

/// Board parameters as given by the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardParams {
    pub width: u32,
    pub height: u32,
    pub goal_width: u32,
    pub free_kick_len: u32,
}

impl BoardParams {
    /// Validates the parameters without building any table
    pub fn validate(&self) -> Result<(), GeometryError> {
        if self.width < 5 || self.width % 2 == 0 {
            return Err(GeometryError::BadWidth(self.width));
        }
        if self.height < 5 || self.height % 2 == 0 {
            return Err(GeometryError::BadHeight(self.height));
        }
        let max_goal = self.width - 3;
        if self.goal_width < 2 || self.goal_width % 2 != 0 || self.goal_width > max_goal {
            return Err(GeometryError::BadGoalWidth {
                value: self.goal_width,
                max: max_goal,
            });
        }
        let shorter = self.width.min(self.height);
        if self.free_kick_len < 4 || 2 * self.free_kick_len >= shorter {
            return Err(GeometryError::BadFreeKickLen(self.free_kick_len));
        }
        Ok(())
    }
}

/// Lattice topology of a standard Paper Football board
#[derive(Debug, Clone)]
pub struct Geometry {
    params: BoardParams,
    qpoints: usize,
    neighbours: Vec<i32>,
    connections: Vec<i32>,
    free_kicks: Vec<i32>,
    dist_goal1: Vec<u32>,
    dist_goal2: Vec<u32>,
    bit_index_table: Vec<u8>,
}

impl Geometry {
    /// Builds all tables for a `width x height` board
    ///
    /// # Arguments
    /// * `width`, `height` - Odd point counts, at least 5
    /// * `goal_width` - Even mouth width in cells, `2 <= goal_width <= width - 3`
    /// * `free_kick_len` - Free kick length, `4 <= free_kick_len < min(width, height) / 2`
    ///
    /// # Returns
    /// * `Result<Geometry, GeometryError>` - The geometry or the offending parameter
    pub fn new(
        width: u32,
        height: u32,
        goal_width: u32,
        free_kick_len: u32,
    ) -> Result<Self, GeometryError> {
        let params = BoardParams {
            width,
            height,
            goal_width,
            free_kick_len,
        };
        params.validate()?;
        Ok(Self::build(params))
    }

    pub fn from_params(params: BoardParams) -> Result<Self, GeometryError> {
        Self::new(
            params.width,
            params.height,
            params.goal_width,
            params.free_kick_len,
        )
    }

    fn build(params: BoardParams) -> Self {
        let width = params.width as i32;
        let height = params.height as i32;
        let qpoints = (width * height) as usize;

        let mut neighbours = vec![NO_WAY; qpoints * QSTEPS];
        let mut connections = vec![NO_WAY; qpoints * QSTEPS];
        let mut free_kicks = vec![NO_WAY; qpoints * QSTEPS];

        for y in 0..height {
            for x in 0..width {
                let point = (y * width + x) as usize;
                for step in Step::all() {
                    let (dx, dy) = step.delta();
                    let (nx, ny) = (x + dx, y + dy);
                    if nx >= 0 && nx < width && ny >= 0 && ny < height {
                        neighbours[point * QSTEPS + step.index()] = ny * width + nx;
                    }
                }

                // Mouth points are never standable
                if Self::mouth(&params, x, y).is_some() {
                    continue;
                }

                for step in Step::all() {
                    let slot = point * QSTEPS + step.index();
                    connections[slot] = Self::calc_connection(&params, x, y, step);
                    free_kicks[slot] = Self::calc_free_kick(&params, x, y, step);
                }
            }
        }

        let dist_goal1 = Self::calc_distances(qpoints, &connections, GOAL_1);
        let dist_goal2 = Self::calc_distances(qpoints, &connections, GOAL_2);

        let mut bit_index_table = vec![INVALID_STEP; 256 * QSTEPS];
        for mask in 0..256usize {
            let mut k = 0;
            for bit in 0..QSTEPS {
                if mask & (1 << bit) != 0 {
                    bit_index_table[mask * QSTEPS + k] = bit as u8;
                    k += 1;
                }
            }
        }

        Geometry {
            params,
            qpoints,
            neighbours,
            connections,
            free_kicks,
            dist_goal1,
            dist_goal2,
            bit_index_table,
        }
    }

    /// Goal sentinel if `(x, y)` lies inside a goal mouth
    fn mouth(params: &BoardParams, x: i32, y: i32) -> Option<i32> {
        let cx = (params.width as i32 - 1) / 2;
        if 2 * (x - cx).abs() >= params.goal_width as i32 {
            return None;
        }
        if y == 0 {
            Some(GOAL_1)
        } else if y == params.height as i32 - 1 {
            Some(GOAL_2)
        } else {
            None
        }
    }

    fn calc_connection(params: &BoardParams, x: i32, y: i32, step: Step) -> i32 {
        let width = params.width as i32;
        let height = params.height as i32;
        let (dx, dy) = step.delta();
        let (nx, ny) = (x + dx, y + dy);
        if nx < 0 || nx >= width || ny < 0 || ny >= height {
            return NO_WAY;
        }

        // Border lines are already drawn
        let along_side = dx == 0 && (x == 0 || x == width - 1);
        let along_end = dy == 0 && (y == 0 || y == height - 1);
        if along_side || along_end {
            return NO_WAY;
        }

        Self::mouth(params, nx, ny).unwrap_or(ny * width + nx)
    }

    fn calc_free_kick(params: &BoardParams, x: i32, y: i32, step: Step) -> i32 {
        let width = params.width as i32;
        let height = params.height as i32;
        let (dx, dy) = step.delta();
        let (mut nx, mut ny) = (x, y);
        for _ in 0..params.free_kick_len {
            nx += dx;
            ny += dy;
            if nx < 0 || nx >= width || ny < 0 || ny >= height {
                return NO_WAY;
            }
            if let Some(goal) = Self::mouth(params, nx, ny) {
                return goal;
            }
        }
        ny * width + nx
    }

    /// Goal-rooted BFS over the connection table
    fn calc_distances(qpoints: usize, connections: &[i32], goal: i32) -> Vec<u32> {
        let mut dist = vec![UNREACHABLE; qpoints];
        let mut queue = VecDeque::new();

        for point in 0..qpoints {
            let targets = &connections[point * QSTEPS..(point + 1) * QSTEPS];
            if targets.contains(&goal) {
                dist[point] = 1;
                queue.push_back(point);
            }
        }

        while let Some(point) = queue.pop_front() {
            let next_dist = dist[point] + 1;
            for &next in &connections[point * QSTEPS..(point + 1) * QSTEPS] {
                if next < 0 {
                    continue;
                }
                let next = next as usize;
                if dist[next] == UNREACHABLE {
                    dist[next] = next_dist;
                    queue.push_back(next);
                }
            }
        }

        dist
    }

    pub fn params(&self) -> BoardParams {
        self.params
    }

    pub fn width(&self) -> u32 {
        self.params.width
    }

    pub fn height(&self) -> u32 {
        self.params.height
    }

    pub fn goal_width(&self) -> u32 {
        self.params.goal_width
    }

    pub fn free_kick_len(&self) -> u32 {
        self.params.free_kick_len
    }

    pub fn qpoints(&self) -> usize {
        self.qpoints
    }

    /// Kick-off point in the centre of the board
    pub fn center(&self) -> i32 {
        self.point_at(self.params.width / 2, self.params.height / 2)
    }

    pub fn point_at(&self, x: u32, y: u32) -> i32 {
        (y * self.params.width + x) as i32
    }

    /// `(x, y)` of a point id
    pub fn coords(&self, point: i32) -> (u32, u32) {
        let point = point as u32;
        (point % self.params.width, point / self.params.width)
    }

    /// Destination of a unit step, or `GOAL_1`/`GOAL_2`/`NO_WAY`
    pub fn connection(&self, point: i32, step: Step) -> i32 {
        self.connections[point as usize * QSTEPS + step.index()]
    }

    /// In-board neighbour ignoring border lines and goals
    pub fn neighbour(&self, point: i32, step: Step) -> i32 {
        self.neighbours[point as usize * QSTEPS + step.index()]
    }

    /// Destination of a free-kick jump, or `GOAL_1`/`GOAL_2`/`NO_WAY`
    pub fn free_kick(&self, point: i32, step: Step) -> i32 {
        self.free_kicks[point as usize * QSTEPS + step.index()]
    }

    /// Steps whose free kick from `point` stays in play or scores
    pub fn free_kick_steps(&self, point: i32) -> StepMask {
        Step::all()
            .iter()
            .filter(|step| self.free_kick(point, **step) != NO_WAY)
            .fold(0, |mask, step| mask | step.bit())
    }

    pub fn dist_goal1(&self, point: i32) -> u32 {
        self.dist_goal1[point as usize]
    }

    pub fn dist_goal2(&self, point: i32) -> u32 {
        self.dist_goal2[point as usize]
    }

    /// Distance to the goal the given player attacks
    pub fn dist_to_goal(&self, player: u8, point: i32) -> u32 {
        if player == 1 {
            self.dist_goal1(point)
        } else {
            self.dist_goal2(point)
        }
    }

    /// The k-th set step of `mask`, `None` when `k >= popcount(mask)`
    pub fn nth_step(&self, mask: StepMask, k: usize) -> Option<Step> {
        if k >= QSTEPS {
            return None;
        }
        Step::from_index(self.bit_index_table[mask as usize * QSTEPS + k])
    }

    /// True for points inside a goal mouth
    pub fn is_mouth(&self, point: i32) -> bool {
        let (x, y) = self.coords(point);
        Self::mouth(&self.params, x as i32, y as i32).is_some()
    }
}
