// Tests for the AI facade
//
// Full games played by the engine against itself, transactional step
// handling, cached free-kick series and parameters.

use paper_football::ai::{Ai, AiOptions, Explanation, MctsAi, ParamError, ParamValue, StepError};
use paper_football::geometry::Geometry;
use paper_football::history::HistoryError;
use paper_football::mcts::MctsParams;
use paper_football::preparation::Preparation;
use paper_football::protocol::GameProtocol;
use paper_football::state::{State, Status};
use paper_football::step::{parse_steps, Step};
use std::path::PathBuf;
use std::rc::Rc;

/// Helper function to get the path to test fixtures
fn fixture_path(filename: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(filename)
}

fn options(qthink: u32, seed: u64) -> AiOptions {
    AiOptions {
        mcts: MctsParams {
            qthink,
            ..MctsParams::default()
        },
        seed,
        ..AiOptions::default()
    }
}

fn engine(width: u32, height: u32, qthink: u32, seed: u64) -> MctsAi {
    let geometry = Rc::new(Geometry::new(width, height, 6, 5).unwrap());
    MctsAi::new(geometry, options(qthink, seed))
}

/// Game 000050 four steps before its end, player 2 to kick
fn game_000050_before_end() -> GameProtocol {
    GameProtocol::from_file(fixture_path("game_000050.json"))
        .unwrap()
        .prefix(87)
}

/// Plays a game engine against engine, then takes every step back
fn round_trip(ai: &mut MctsAi) {
    let mut positions: Vec<State> = vec![ai.get_state().clone()];

    for _ in 0..4000 {
        if ai.get_state().status() != Status::InProgress {
            break;
        }
        let step = ai
            .go(None)
            .unwrap_or_else(|| panic!("go failed: {:?}", ai.error()));
        assert_ne!(
            ai.get_state().get_steps() & step.bit(),
            0,
            "go returned illegal step {} in {}",
            step,
            ai.get_state()
        );
        ai.do_step(step)
            .unwrap_or_else(|e| panic!("step {} rejected: {}", step, e));
        positions.push(ai.get_state().clone());
    }

    assert_ne!(ai.get_state().status(), Status::InProgress, "game did not finish");
    assert_eq!(ai.history().len(), positions.len() - 1);

    // Undo one by one, every intermediate position must come back
    positions.pop();
    while let Some(expected) = positions.pop() {
        ai.undo_step().unwrap();
        assert!(*ai.get_state() == expected, "undo mismatch at {}", positions.len());
    }
    assert!(ai.history().is_empty());
    assert!(*ai.get_state() == State::new(Rc::clone(ai.geometry())));
}

#[test]
fn test_self_play_round_trip() {
    let mut ai = engine(15, 23, 1024, 7);
    round_trip(&mut ai);
}

#[test]
fn test_self_play_round_trip_on_large_board() {
    let mut ai = engine(21, 31, 1024, 8);
    round_trip(&mut ai);
}

#[test]
fn test_self_play_undone_in_one_call() {
    let mut ai = engine(15, 23, 32 * 1024, 11);
    let start = ai.get_state().clone();

    for _ in 0..4000 {
        if ai.get_state().status() != Status::InProgress {
            break;
        }
        let step = ai
            .go(None)
            .unwrap_or_else(|| panic!("go failed: {:?}", ai.error()));
        ai.do_step(step)
            .unwrap_or_else(|e| panic!("step {} rejected: {}", step, e));
    }
    assert_ne!(ai.get_state().status(), Status::InProgress, "game did not finish");

    let played = ai.history().len();
    assert!(played > 0);
    ai.undo_steps(played).unwrap();

    assert!(ai.history().is_empty());
    assert!(ai.preparation().is_empty());
    assert_eq!(ai.get_state().lines(), start.lines());
    assert_eq!(ai.get_state().active(), 1);
    assert_eq!(ai.get_state().ball(), ai.geometry().center());
    assert!(*ai.get_state() == State::new(Rc::clone(ai.geometry())));
}

#[test]
#[ignore] // slow: full strength search on every step
fn test_self_play_round_trip_strong() {
    let mut ai = engine(21, 31, 32 * 1024, 9);
    round_trip(&mut ai);
}

#[test]
fn test_undo_many_steps_restores_position() {
    let mut ai = engine(15, 23, 1024, 3);
    let start = ai.get_state().clone();
    let steps = parse_steps("N N N SW S W").unwrap();

    ai.do_steps(&steps[..3]).unwrap();
    let middle = ai.get_state().clone();
    ai.do_steps(&steps[3..]).unwrap();

    ai.undo_steps(3).unwrap();
    assert!(*ai.get_state() == middle);
    ai.undo_steps(3).unwrap();
    assert!(*ai.get_state() == start);
    assert_eq!(ai.undo_step(), Err(HistoryError::Empty));
}

#[test]
fn test_undo_too_many_steps_changes_nothing() {
    let mut ai = engine(15, 23, 1024, 3);
    ai.do_steps(&parse_steps("N N N").unwrap()).unwrap();
    let before = ai.get_state().clone();

    assert_eq!(
        ai.undo_steps(5),
        Err(HistoryError::TooManySteps {
            requested: 5,
            available: 3
        })
    );
    assert!(*ai.get_state() == before);
    assert_eq!(ai.history().len(), 3);
    assert!(ai.error().is_some());
}

#[test]
fn test_do_steps_is_transactional() {
    let mut ai = engine(15, 23, 1024, 3);
    ai.do_step(Step::NorthEast).unwrap();
    let before = ai.get_state().clone();

    let result = ai.do_steps(&parse_steps("N N S").unwrap());
    match result {
        Err(StepError::AtStep { index, source }) => {
            assert_eq!(index, 2);
            assert_eq!(*source, StepError::OccupiedDirection(Step::South));
        }
        other => panic!("expected failure at step 2, got {:?}", other),
    }
    assert!(*ai.get_state() == before);
    assert_eq!(ai.history().steps(), &[Step::NorthEast]);
    assert!(ai.error().is_some());

    // The engine stays usable
    ai.do_steps(&parse_steps("N N").unwrap()).unwrap();
    assert_eq!(ai.history().len(), 3);
    assert!(ai.error().is_none());
}

#[test]
fn test_full_history_rejects_steps() {
    let geometry = Rc::new(Geometry::new(15, 23, 6, 5).unwrap());
    let mut ai = MctsAi::new(
        geometry,
        AiOptions {
            history_capacity: 2,
            ..options(1024, 3)
        },
    );
    ai.do_steps(&parse_steps("N N").unwrap()).unwrap();
    assert_eq!(ai.do_step(Step::North), Err(StepError::HistoryFull));
    assert_eq!(ai.history().len(), 2);
}

#[test]
fn test_go_without_steps_reports_error() {
    let mut ai = engine(15, 23, 1024, 3);
    ai.do_steps(&parse_steps("S S S S S S S S S S S").unwrap()).unwrap();
    assert_eq!(ai.get_state().status(), Status::Win2);

    let mut explanation = Explanation::default();
    assert_eq!(ai.go(Some(&mut explanation)), None);
    assert!(ai.error().is_some());
    assert_eq!(explanation.score, -1.0);
}

#[test]
fn test_go_plays_cached_serie() {
    let mut ai = engine(21, 31, 16 * 1024, 5);
    game_000050_before_end().replay(&mut ai).unwrap();

    let expected = parse_steps("SW S SW").unwrap();
    assert_eq!(ai.go(None), Some(expected[0]));
    assert_eq!(ai.preparation().len(), 3);

    for (index, step) in expected.iter().enumerate() {
        let mut explanation = Explanation::default();
        assert_eq!(ai.go(Some(&mut explanation)), Some(*step));
        if index > 0 {
            // Prepared answers skip the search
            assert_eq!(explanation.score, -1.0);
            assert_eq!(explanation.qthink, 0);
        }
        ai.do_step(*step).unwrap();
    }

    assert!(ai.preparation().is_empty());
    assert_eq!(ai.get_state().status(), Status::Win2);
    assert_eq!(ai.go(None), None);
    assert!(ai.error().is_some());
}

#[test]
fn test_other_step_drops_cached_serie() {
    let mut ai = engine(21, 31, 16 * 1024, 5);
    game_000050_before_end().replay(&mut ai).unwrap();

    assert_eq!(ai.go(None), Some(Step::SouthWest));
    let other = Step::all()
        .iter()
        .copied()
        .find(|step| *step != Step::SouthWest && ai.get_state().get_steps() & step.bit() != 0)
        .expect("another kick is possible");
    ai.do_step(other).unwrap();
    assert!(ai.preparation().is_empty());
}

#[test]
fn test_preparation_queue() {
    let mut prep = Preparation::new();
    prep.fill(&parse_steps("NE SW SE NW N").unwrap());

    for expected in parse_steps("NE SW SE NW N").unwrap() {
        assert_eq!(prep.peek(), Some(expected));
        assert_eq!(prep.pop(), Some(expected));
    }
    assert_eq!(prep.peek(), None);
}

#[test]
fn test_params_round_trip() {
    let mut ai = engine(15, 23, 1024, 3);

    let names: Vec<&str> = ai.get_params().iter().map(|param| param.name).collect();
    assert_eq!(names, vec!["qthink", "cache", "max_depth", "C"]);

    ai.set_param_str("QTHINK", "2048").unwrap();
    ai.set_param_str("max_depth", "64").unwrap();
    ai.set_param_str("c", "0.5").unwrap();
    let params = ai.get_params();
    assert_eq!(params[0].value, ParamValue::U32(2048));
    assert_eq!(params[2].value, ParamValue::U32(64));
    assert_eq!(params[3].value, ParamValue::F32(0.5));

    assert!(matches!(
        ai.set_param_str("cache", "10"),
        Err(ParamError::CacheTooSmall(_))
    ));
    assert!(matches!(ai.set_param_str("speed", "1"), Err(ParamError::Unknown(_))));
    assert!(matches!(
        ai.set_param_str("C", "-1"),
        Err(ParamError::InvalidValue { .. })
    ));
    assert!(matches!(
        ai.set_param_str("qthink", "many"),
        Err(ParamError::InvalidValue { .. })
    ));

    // Failed updates leave the values alone
    assert_eq!(ai.get_params()[0].value, ParamValue::U32(2048));
}

#[test]
fn test_search_after_param_change() {
    let mut ai = engine(15, 23, 1024, 3);
    ai.set_param_str("qthink", "4096").unwrap();

    let mut explanation = Explanation::default();
    let step = ai.go(Some(&mut explanation)).unwrap();
    assert_ne!(ai.get_state().get_steps() & step.bit(), 0);
    assert!(explanation.qthink >= 4096);
    assert!(explanation.score >= 0.0 && explanation.score <= 1.0);
    assert_eq!(explanation.stats[0].steps, vec![step]);
    assert!(ai.get_warn(0).is_none());
}

#[test]
fn test_reset_starts_new_game() {
    let mut ai = engine(15, 23, 1024, 3);
    ai.do_steps(&parse_steps("N N N").unwrap()).unwrap();

    let geometry = Rc::new(Geometry::new(9, 11, 2, 4).unwrap());
    ai.reset(Rc::clone(&geometry));
    assert!(ai.history().is_empty());
    assert!(*ai.get_state() == State::new(geometry));
    assert!(ai.go(None).is_some());
}
