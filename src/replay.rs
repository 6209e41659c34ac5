// Replaying logged engine answers
//
// Each JSONL entry carries its board and full step history, so the position
// is rebuilt on a fresh engine and searched again with the current
// configuration. Differences point at search regressions or at parameter
// changes worth a closer look.

use log::{debug, info, warn};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::rc::Rc;

use crate::ai::{Ai, Explanation, MctsAi};
use crate::config::Config;
use crate::debug_logger::DebugLogEntry;
use crate::geometry::Geometry;
use crate::step::Step;

/// Logged answer next to the replayed one
#[derive(Debug, Clone)]
pub struct ReplayResult {
    pub turn: usize,
    pub logged_step: Step,
    pub replayed_step: Step,
    pub matches: bool,
    pub logged_score: f64,
    pub replayed_score: f64,
    /// Steps actually simulated by the replayed search
    pub qthink: u32,
    pub elapsed_ms: u128,
}

impl ReplayResult {
    /// Score difference when both searches produced one
    pub fn score_drift(&self) -> Option<f64> {
        if self.logged_score < 0.0 || self.replayed_score < 0.0 {
            return None;
        }
        Some((self.logged_score - self.replayed_score).abs())
    }
}

/// Aggregates over a replay session
#[derive(Debug, Default)]
pub struct ReplayStats {
    pub total_turns: usize,
    pub matches: usize,
    pub mismatches: usize,
    /// Percentage of matching answers
    pub match_rate: f64,
    pub avg_qthink: f64,
    pub avg_elapsed_ms: f64,
    /// Mean absolute score drift over answers scored by both searches
    pub mean_score_drift: Option<f64>,
}

/// Reads JSONL entries, skipping blank lines
pub fn parse_log<R: BufRead>(reader: R) -> Result<Vec<DebugLogEntry>, String> {
    let mut entries = Vec::new();

    for (index, line) in reader.lines().enumerate() {
        let line_no = index + 1;
        let line = line.map_err(|e| format!("Failed to read line {}: {}", line_no, e))?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let entry = serde_json::from_str::<DebugLogEntry>(line)
            .map_err(|e| format!("Bad log entry on line {}: {}", line_no, e))?;
        entries.push(entry);
    }

    Ok(entries)
}

pub struct ReplayEngine {
    config: Config,
    verbose: bool,
}

impl ReplayEngine {
    pub fn new(config: Config, verbose: bool) -> Self {
        ReplayEngine { config, verbose }
    }

    /// Loads all entries of a JSONL debug log
    ///
    /// # Arguments
    /// * `log_path` - Path to the log written by the shell
    ///
    /// # Returns
    /// * `Result<Vec<DebugLogEntry>, String>` - Entries in file order or error message
    pub fn load_log_file<P: AsRef<Path>>(&self, log_path: P) -> Result<Vec<DebugLogEntry>, String> {
        let path = log_path.as_ref();
        let file = File::open(path)
            .map_err(|e| format!("Failed to open log file {}: {}", path.display(), e))?;

        let entries = parse_log(BufReader::new(file))?;
        info!("Loaded {} logged answers from {}", entries.len(), path.display());
        Ok(entries)
    }

    /// Rebuilds the position of an entry on a fresh engine
    pub fn rebuild(&self, entry: &DebugLogEntry) -> Result<MctsAi, String> {
        let geometry = Geometry::from_params(entry.board)
            .map_err(|e| format!("Invalid board in turn {}: {}", entry.turn, e))?;

        let mut ai = MctsAi::new(Rc::new(geometry), self.config.ai_options());
        ai.do_steps(&entry.steps)
            .map_err(|e| format!("Cannot rebuild turn {}: {}", entry.turn, e))?;

        if ai.get_state().active() != entry.active {
            return Err(format!(
                "Turn {}: logged active player {} but rebuilt position has {}",
                entry.turn,
                entry.active,
                ai.get_state().active()
            ));
        }
        Ok(ai)
    }

    /// Searches the position of one entry again
    pub fn replay_entry(&self, entry: &DebugLogEntry) -> Result<ReplayResult, String> {
        debug!("Rebuilding turn {} ({} steps)", entry.turn, entry.steps.len());
        let mut ai = self.rebuild(entry)?;

        let mut explanation = Explanation::default();
        let replayed_step = match ai.go(Some(&mut explanation)) {
            Some(step) => step,
            None => {
                return Err(format!(
                    "Turn {}: engine gave no answer ({})",
                    entry.turn,
                    ai.error().unwrap_or("unknown error")
                ))
            }
        };

        let result = ReplayResult {
            turn: entry.turn,
            logged_step: entry.chosen_step,
            replayed_step,
            matches: replayed_step == entry.chosen_step,
            logged_score: entry.score,
            replayed_score: explanation.score,
            qthink: explanation.qthink,
            elapsed_ms: (explanation.time * 1000.0) as u128,
        };

        if self.verbose {
            if result.matches {
                info!(
                    "Turn {}: ✓ {} (score {:.3}, {} simulated steps, {}ms)",
                    result.turn, replayed_step, result.replayed_score, result.qthink, result.elapsed_ms
                );
            } else {
                warn!(
                    "Turn {}: ✗ logged {} replayed {} (score {:.3} vs {:.3}, {} simulated steps)",
                    result.turn,
                    result.logged_step,
                    replayed_step,
                    result.logged_score,
                    result.replayed_score,
                    result.qthink
                );
            }
        }

        Ok(result)
    }

    /// Replays entries in order; entries that fail to rebuild are reported and skipped
    fn replay_each<'a, I>(&self, entries: I) -> Vec<ReplayResult>
    where
        I: IntoIterator<Item = &'a DebugLogEntry>,
    {
        entries
            .into_iter()
            .filter_map(|entry| match self.replay_entry(entry) {
                Ok(result) => Some(result),
                Err(e) => {
                    warn!("Skipping turn {}: {}", entry.turn, e);
                    None
                }
            })
            .collect()
    }

    /// Replays every entry of a log
    pub fn replay_all(&self, entries: &[DebugLogEntry]) -> Result<Vec<ReplayResult>, String> {
        Ok(self.replay_each(entries))
    }

    /// Replays the entries of the given turns; an unknown turn fails before any search
    pub fn replay_turns(
        &self,
        entries: &[DebugLogEntry],
        turn_numbers: &[usize],
    ) -> Result<Vec<ReplayResult>, String> {
        let selected = turn_numbers
            .iter()
            .map(|turn| {
                entries
                    .iter()
                    .find(|entry| entry.turn == *turn)
                    .ok_or_else(|| format!("Turn {} not found in log file", turn))
            })
            .collect::<Result<Vec<_>, String>>()?;

        Ok(self.replay_each(selected))
    }

    pub fn generate_stats(&self, results: &[ReplayResult]) -> ReplayStats {
        if results.is_empty() {
            return ReplayStats::default();
        }

        let total = results.len() as f64;
        let matches = results.iter().filter(|r| r.matches).count();
        let drifts: Vec<f64> = results.iter().filter_map(ReplayResult::score_drift).collect();

        ReplayStats {
            total_turns: results.len(),
            matches,
            mismatches: results.len() - matches,
            match_rate: matches as f64 * 100.0 / total,
            avg_qthink: results.iter().map(|r| f64::from(r.qthink)).sum::<f64>() / total,
            avg_elapsed_ms: results.iter().map(|r| r.elapsed_ms as f64).sum::<f64>() / total,
            mean_score_drift: if drifts.is_empty() {
                None
            } else {
                Some(drifts.iter().sum::<f64>() / drifts.len() as f64)
            },
        }
    }

    /// Prints the per-turn table followed by the session totals
    pub fn print_report(&self, results: &[ReplayResult]) {
        let rule = "═".repeat(59);
        let stats = self.generate_stats(results);

        println!("\n{}", rule);
        println!("                    REPLAY REPORT");
        println!("{}", rule);
        println!("  Turn  Logged  Replayed   Score (log → now)   Simulated");
        for result in results {
            println!(
                "{} {:>4}  {:<6}  {:<8}   {:>6.3} → {:<6.3}     {:>9}",
                if result.matches { "✓" } else { "✗" },
                result.turn,
                result.logged_step,
                result.replayed_step,
                result.logged_score,
                result.replayed_score,
                result.qthink
            );
        }
        println!("{}", rule);
        println!("Answers:          {}", stats.total_turns);
        println!("Matches:          {} ({:.1}%)", stats.matches, stats.match_rate);
        println!("Mismatches:       {}", stats.mismatches);
        println!("Simulated steps:  {:.0} per answer", stats.avg_qthink);
        println!("Search time:      {:.1}ms per answer", stats.avg_elapsed_ms);
        if let Some(drift) = stats.mean_score_drift {
            println!("Score drift:      {:.3}", drift);
        }
        println!("{}\n", rule);
    }

    /// Checks logged answers against the steps acceptable for their turns
    pub fn validate_expected_moves(
        &self,
        entries: &[DebugLogEntry],
        expected_moves: &[(usize, Vec<Step>)],
    ) -> Result<(), String> {
        for (turn, acceptable) in expected_moves {
            let entry = match entries.iter().find(|entry| entry.turn == *turn) {
                Some(entry) => entry,
                None => return Err(format!("Turn {} not found in log", turn)),
            };

            if !acceptable.contains(&entry.chosen_step) {
                let names: Vec<&str> = acceptable.iter().map(|step| step.as_str()).collect();
                return Err(format!(
                    "Turn {}: logged {}, expected {}",
                    turn,
                    entry.chosen_step,
                    names.join(" or ")
                ));
            }
        }

        Ok(())
    }
}
