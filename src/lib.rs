// Library exports for the Paper Football engine
// The shell and the replay tool are thin binaries over these modules

pub mod ai;
pub mod bsf;
pub mod config;
pub mod cycle_guard;
pub mod debug_logger;
pub mod geometry;
pub mod history;
pub mod mcts;
pub mod node;
pub mod preparation;
pub mod protocol;
pub mod replay;
pub mod state;
pub mod step;
pub mod warns;
