// Tests for the free-kick series enumerator
//
// Recorded positions with a free kick pending; the expected series come from
// the rules of the chain: a jump landing on a clean point ends the serie.

use paper_football::bsf::{BsfParams, FreeKickSearch, Serie};
use paper_football::cycle_guard::CycleGuard;
use paper_football::geometry::{GOAL_1, GOAL_2};
use paper_football::protocol::GameProtocol;
use paper_football::state::State;
use paper_football::step::{parse_steps, Step};
use paper_football::warns::Warnings;
use std::path::PathBuf;
use std::rc::Rc;

/// Helper function to get the path to test fixtures
fn fixture_path(filename: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(filename)
}

fn protocol_state(filename: &str) -> State {
    GameProtocol::from_file(fixture_path(filename))
        .expect("fixture should load")
        .state()
        .expect("fixture should replay")
}

/// Game 000050 four steps before its end: player 2 kicks at (20,16)
fn game_000050_state() -> State {
    GameProtocol::from_file(fixture_path("game_000050.json"))
        .expect("fixture should load")
        .prefix(87)
        .state()
        .expect("prefix should replay")
}

fn search(state: &State) -> (FreeKickSearch, Warnings) {
    let geometry = Rc::clone(state.geometry());
    let guard = CycleGuard::new(CycleGuard::capacity_for(
        geometry.qpoints(),
        geometry.free_kick_len(),
    ));
    let mut search = FreeKickSearch::new(&geometry, BsfParams::default());
    let mut warns = Warnings::new();
    search.generate(&mut warns, state, &guard);
    (search, warns)
}

fn landings(series: &[Serie]) -> Vec<i32> {
    let mut balls: Vec<i32> = series.iter().map(|serie| serie.ball).collect();
    balls.sort_unstable();
    balls
}

/// Every serie must replay on the position and end where it claims
fn assert_series_replay(state: &State, series: &[Serie]) {
    for serie in series {
        let mut copy = state.clone();
        let kicker = copy.active();
        let mut ball = copy.ball();
        for (index, step) in serie.steps.iter().enumerate() {
            assert!(copy.is_free_kick_situation(), "serie {:?} left the chain early", serie);
            assert_eq!(copy.active(), kicker);
            ball = copy.step(*step);
            if index + 1 < serie.steps.len() {
                assert!(ball >= 0);
            }
        }
        assert_eq!(ball, serie.ball, "serie {:?} ends elsewhere", serie);
        if serie.ball >= 0 {
            assert!(
                !copy.is_free_kick_situation(),
                "serie {:?} stops inside the chain",
                serie
            );
        }
    }
}

#[test]
fn test_fastest_free_kick_player_one() {
    let state = protocol_state("fastest_free_kick1.json");
    let (search, warns) = search(&state);

    assert_eq!(search.series().len(), 8);
    assert_eq!(
        landings(search.series()),
        vec![63, 68, 73, 138, 148, 213, 218, 223]
    );
    assert!(search.series().iter().all(|serie| serie.steps.len() == 1));
    assert!(search.win().is_none());
    assert!(search.loss().is_none());
    assert!(warns.is_empty());
    assert_series_replay(&state, search.series());
}

#[test]
fn test_fastest_free_kick_player_two() {
    let state = protocol_state("fastest_free_kick2.json");
    let (search, warns) = search(&state);

    assert_eq!(
        landings(search.series()),
        vec![61, 66, 71, 136, 146, 211, 216, 221]
    );
    assert!(search.win().is_none());
    assert!(warns.is_empty());
}

#[test]
fn test_game_000461_wins_in_one_kick() {
    let state = protocol_state("game_000461.json");
    let (search, warns) = search(&state);

    let win = search.win().expect("winning kick expected");
    assert_eq!(win.ball, GOAL_1);
    assert_eq!(win.steps, vec![Step::NorthWest]);
    assert!(search.loss().is_none());
    assert_eq!(search.series().len(), 5);
    assert!(warns.is_empty());
    assert_series_replay(&state, search.series());
}

#[test]
fn test_game_000050_wins_before_the_end() {
    let state = game_000050_state();
    assert!(state.is_free_kick_situation());
    assert_eq!(state.active(), 2);
    assert_eq!(state.geometry().coords(state.ball()), (20, 16));

    let (search, warns) = search(&state);
    let win = search.win().expect("winning serie expected");
    assert_eq!(win.ball, GOAL_2);
    assert!(win.steps.len() <= 4);
    assert_eq!(win.steps, parse_steps("SW S SW").unwrap());
    assert!(search.loss().is_none());
    assert_eq!(search.series().len(), 27);
    assert!(warns.is_empty());

    assert_series_replay(&state, search.series());
    assert_series_replay(&state, std::slice::from_ref(win));
}

#[test]
fn test_search_is_reproducible() {
    let state = game_000050_state();
    let geometry = Rc::clone(state.geometry());
    let guard = CycleGuard::new(CycleGuard::capacity_for(
        geometry.qpoints(),
        geometry.free_kick_len(),
    ));
    let mut search = FreeKickSearch::new(&geometry, BsfParams::default());
    let mut warns = Warnings::new();

    search.generate(&mut warns, &state, &guard);
    let first: Vec<Serie> = search.series().to_vec();
    let first_win = search.win().cloned();

    // The pool is recycled between runs
    search.generate(&mut warns, &state, &guard);
    assert_eq!(search.series(), &first[..]);
    assert_eq!(search.win().cloned(), first_win);
}

#[test]
fn test_small_pool_reports_exhaustion() {
    let state = game_000050_state();
    let geometry = Rc::clone(state.geometry());
    let guard = CycleGuard::new(CycleGuard::capacity_for(
        geometry.qpoints(),
        geometry.free_kick_len(),
    ));
    let params = BsfParams {
        capacity: 4,
        ..BsfParams::default()
    };
    let mut search = FreeKickSearch::new(&geometry, params);
    let mut warns = Warnings::new();
    search.generate(&mut warns, &state, &guard);

    assert!(!warns.is_empty());
    assert!(search.series().len() <= 4);
    assert_series_replay(&state, search.series());
}
