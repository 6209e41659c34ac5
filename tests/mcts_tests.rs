// Tests for the MCTS engine
//
// Node packing, UCB1 selection and the bookkeeping of the search tree.

use paper_football::bsf::BsfParams;
use paper_football::geometry::Geometry;
use paper_football::mcts::{rollout, select_answer, Mcts, MctsParams};
use paper_football::node::{NodeArena, NodeKind, PackedSerie, MIN_CACHE, NODE_SIZE, ROOT, ZERO};
use paper_football::protocol::GameProtocol;
use paper_football::state::{State, Status};
use paper_football::step::{parse_steps, Step};
use paper_football::warns::Warnings;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::PathBuf;
use std::rc::Rc;

/// Helper function to get the path to test fixtures
fn fixture_path(filename: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(filename)
}

fn engine(geometry: &Rc<Geometry>, qthink: u32, seed: u64) -> Mcts {
    let params = MctsParams {
        qthink,
        ..MctsParams::default()
    };
    Mcts::new(geometry, params, BsfParams::default(), StdRng::seed_from_u64(seed))
}

fn standard() -> Rc<Geometry> {
    Rc::new(Geometry::new(15, 23, 6, 5).unwrap())
}

#[test]
fn test_pack_unpack() {
    let cases = [
        "E",
        "E S",
        "NW N NE E SE S SW W NW N",
        "W SW S SE E NE N NW W SW S SE",
        "N N N N N N N N N N N N N N N N W",
    ];
    for case in cases.iter() {
        let steps = parse_steps(case).unwrap();
        let packed = PackedSerie::pack(&steps).expect("fits into a path node");
        assert_eq!(packed.len(), steps.len());
        assert_eq!(packed.first(), steps.first().copied());
        assert_eq!(packed.unpack(), steps, "case {}", case);
    }
}

#[test]
fn test_ucb_prefers_best_weight() {
    let mut arena = NodeArena::with_cache(64 * NODE_SIZE);
    arena.alloc(NodeKind::Terminal, None);
    arena.alloc(NodeKind::Terminal, None);
    arena.alloc_answers(ROOT, 4, NodeKind::Single).unwrap();
    arena.get_mut(ROOT).unwrap().qgames = 10;

    for (answer, (qgames, score)) in [(3, 1), (4, 2), (5, 3), (6, 4)].iter().enumerate() {
        let child = arena.answer(ROOT, answer).unwrap();
        let node = arena.get_mut(child).unwrap();
        node.qgames = *qgames;
        node.score = *score;
    }

    let mut rng = StdRng::seed_from_u64(3);
    assert_eq!(select_answer(&arena, ROOT, 4, 1.4, &mut rng), 1);
}

#[test]
fn test_ucb_visits_every_child_first() {
    let mut arena = NodeArena::with_cache(64 * NODE_SIZE);
    arena.alloc(NodeKind::Terminal, None);
    arena.alloc(NodeKind::Terminal, None);
    arena.alloc_answers(ROOT, 8, NodeKind::Single).unwrap();
    arena.get_mut(ROOT).unwrap().qgames = 1;

    let mut rng = StdRng::seed_from_u64(5);
    let mut visited = [false; 8];
    for _ in 0..8 {
        let answer = select_answer(&arena, ROOT, 8, 1.4, &mut rng);
        assert!(!visited[answer], "answer {} visited twice", answer);
        visited[answer] = true;

        let child = arena.answer(ROOT, answer).unwrap();
        let node = arena.get_mut(child).unwrap();
        node.qgames += 1;
        node.score += 1;
        arena.get_mut(ROOT).unwrap().qgames += 1;
    }
    assert!(visited.iter().all(|v| *v));
}

#[test]
fn test_simulations_expand_every_root_answer() {
    let geometry = standard();
    let state = State::new(Rc::clone(&geometry));
    let mut mcts = engine(&geometry, 4096, 11);
    let mut warns = Warnings::new();

    mcts.reset_tree().unwrap();
    assert_eq!(mcts.calc_answers(&mut warns, ROOT, &state), Some(8));

    for _ in 0..8 {
        assert!(mcts.simulate(&mut warns, &state) > 0);
    }
    for answer in 0..8 {
        let child = mcts.nodes().answer(ROOT, answer).unwrap();
        assert_ne!(child, ZERO, "answer {} never expanded", answer);
        assert_eq!(mcts.nodes().get(child).unwrap().qgames, 1);
    }
    assert!(warns.is_empty());
}

#[test]
fn test_run_counts_games_at_root() {
    let geometry = standard();
    let state = State::new(Rc::clone(&geometry));
    let mut mcts = engine(&geometry, 20_000, 13);
    let mut warns = Warnings::new();

    mcts.reset_tree().unwrap();
    mcts.calc_answers(&mut warns, ROOT, &state).unwrap();
    let qthink = mcts.run(&mut warns, &state, 20_000);
    assert!(qthink >= 20_000);

    let nodes = mcts.nodes();
    let root = nodes.get(ROOT).unwrap();
    let children_games: i32 = (0..8)
        .filter_map(|answer| nodes.answer(ROOT, answer))
        .filter(|child| *child != ZERO)
        .map(|child| nodes.get(child).unwrap().qgames)
        .sum();
    assert_eq!(root.qgames, 1 + children_games);

    let cache = mcts.cache_stats();
    assert!(cache.used <= cache.total);
    assert_eq!(cache.good_alloc as usize, cache.used);
    assert_eq!(cache.bad_alloc, 0);
}

#[test]
fn test_think_answers_with_legal_step() {
    let geometry = standard();
    let state = State::new(Rc::clone(&geometry));
    let mut mcts = engine(&geometry, 8 * 1024, 17);
    let mut warns = Warnings::new();

    let thought = mcts.think(&mut warns, &state, true).unwrap();
    assert_ne!(state.get_steps() & thought.step.bit(), 0);
    assert!(thought.serie.is_none());
    assert_eq!(thought.stats.len(), 8);
    assert_eq!(thought.stats[0].steps, vec![thought.step]);
    for pair in thought.stats[1..].windows(2) {
        assert!(pair[0].qgames >= pair[1].qgames, "stats not sorted by visits");
    }
    assert!(thought.stats.iter().all(|stat| stat.score <= 1.0));
}

#[test]
fn test_think_is_reproducible_with_same_seed() {
    let geometry = standard();
    let state = State::new(Rc::clone(&geometry));
    let mut warns = Warnings::new();

    let first = engine(&geometry, 4096, 23)
        .think(&mut warns, &state, true)
        .unwrap();
    let second = engine(&geometry, 4096, 23)
        .think(&mut warns, &state, true)
        .unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_exhausted_arena_still_answers() {
    let geometry = standard();
    let state = State::new(Rc::clone(&geometry));
    let params = MctsParams {
        qthink: 100_000,
        cache: MIN_CACHE as u32,
        ..MctsParams::default()
    };
    let mut mcts = Mcts::new(&geometry, params, BsfParams::default(), StdRng::seed_from_u64(29));
    let mut warns = Warnings::new();

    let thought = mcts.think(&mut warns, &state, true).unwrap();
    assert_ne!(state.get_steps() & thought.step.bit(), 0);
    assert!(thought.cache.bad_alloc > 0);
    assert_eq!(thought.cache.used, thought.cache.total);
}

#[test]
fn test_winning_free_kick_is_played_at_once() {
    let state = GameProtocol::from_file(fixture_path("game_000461.json"))
        .unwrap()
        .state()
        .unwrap();
    let geometry = Rc::clone(state.geometry());
    let mut mcts = engine(&geometry, 16 * 1024, 31);
    let mut warns = Warnings::new();

    let thought = mcts.think(&mut warns, &state, false).unwrap();
    assert_eq!(thought.step, Step::NorthWest);
    assert_eq!(thought.serie, Some(vec![Step::NorthWest]));
    assert_eq!(thought.qthink, 0);
}

#[test]
fn test_winning_serie_is_chosen() {
    let state = GameProtocol::from_file(fixture_path("game_000050.json"))
        .unwrap()
        .prefix(87)
        .state()
        .unwrap();
    let geometry = Rc::clone(state.geometry());
    let mut mcts = engine(&geometry, 16 * 1024, 37);
    let mut warns = Warnings::new();

    let thought = mcts.think(&mut warns, &state, false).unwrap();
    assert_eq!(thought.step, Step::SouthWest);
    assert_eq!(thought.serie, Some(parse_steps("SW S SW").unwrap()));
    assert_eq!(thought.qthink, 0);
}

#[test]
fn test_free_kick_answers_are_ball_moves() {
    let state = GameProtocol::from_file(fixture_path("fastest_free_kick1.json"))
        .unwrap()
        .state()
        .unwrap();
    let geometry = Rc::clone(state.geometry());
    let mut mcts = engine(&geometry, 4096, 41);
    let mut warns = Warnings::new();

    mcts.reset_tree().unwrap();
    assert_eq!(mcts.calc_answers(&mut warns, ROOT, &state), Some(8));

    let mut last_distance = 0;
    for answer in 0..8 {
        let child = mcts.nodes().answer(ROOT, answer).unwrap();
        let node = mcts.nodes().get(child).unwrap();
        assert_eq!(node.kind, NodeKind::BallMove);
        let distance = geometry.dist_goal1(node.ball);
        assert!(distance >= last_distance, "ball moves not sorted by distance");
        last_distance = distance;

        let path = mcts.nodes().answer(child, 0).unwrap();
        assert_eq!(mcts.nodes().get(path).unwrap().kind, NodeKind::Path);
    }
}

#[test]
fn test_full_rollouts_end_the_game() {
    let geometry = standard();
    let mut rng = StdRng::seed_from_u64(43);

    for game in 0..20 {
        let mut state = State::new(Rc::clone(&geometry));
        let mut qthink = 0;
        let score = rollout(&mut state, 100_000, &mut qthink, &mut rng);

        let expected = match score {
            1 => Status::Win1,
            -1 => Status::Win2,
            other => panic!("game {} scored {}", game, other),
        };
        assert_eq!(state.status(), expected, "game {}", game);
        assert!(qthink > 0);
    }
}

#[test]
fn test_short_rollout_is_a_draw() {
    let geometry = standard();
    let mut rng = StdRng::seed_from_u64(47);
    let start = State::new(Rc::clone(&geometry));

    let mut state = start.clone();
    let mut qthink = 10;
    assert_eq!(rollout(&mut state, 2, &mut qthink, &mut rng), 0);
    assert_eq!(qthink, 12);
    assert_eq!(state.status(), Status::InProgress);
    assert_ne!(state.ball(), start.ball());

    let mut state = start.clone();
    let mut qthink = 10;
    assert_eq!(rollout(&mut state, 0, &mut qthink, &mut rng), 0);
    assert_eq!(qthink, 10);
    assert!(state == start);
}

#[test]
fn test_rollout_of_finished_game_plays_nothing() {
    let mut state = GameProtocol::from_file(fixture_path("game_000050.json"))
        .unwrap()
        .prefix(87)
        .state()
        .unwrap();
    for step in parse_steps("SW S SW").unwrap() {
        state.step(step);
    }
    assert_eq!(state.status(), Status::Win2);

    let mut rng = StdRng::seed_from_u64(53);
    let mut qthink = 5;
    assert_eq!(rollout(&mut state, 128, &mut qthink, &mut rng), -1);
    assert_eq!(qthink, 5);
}

#[test]
fn test_winning_serie_scores_for_its_kicker() {
    let state = GameProtocol::from_file(fixture_path("game_000050.json"))
        .unwrap()
        .prefix(87)
        .state()
        .unwrap();
    let geometry = Rc::clone(state.geometry());
    let mut mcts = engine(&geometry, 4096, 59);
    let mut warns = Warnings::new();

    mcts.reset_tree().unwrap();
    for _ in 0..3 {
        // root, ball move, winning path
        assert_eq!(mcts.simulate(&mut warns, &state), 3);
    }
    assert!(warns.is_empty());
    assert_eq!(mcts.max_hist_len(), 2);

    let bnode = mcts.nodes().answer(ROOT, 0).unwrap();
    let pnode = mcts.nodes().answer(bnode, 0).unwrap();
    let ball_move = mcts.nodes().get(bnode).unwrap();
    let path = mcts.nodes().get(pnode).unwrap();

    // Player 2 kicked, so a win of player 2 adds to both nodes
    assert_eq!((ball_move.qgames, ball_move.score), (1 + 3, 2 + 3));
    assert_eq!((path.qgames, path.score), (3, 3));
    assert_eq!(path.serie.unpack(), parse_steps("SW S SW").unwrap());

    let root = mcts.nodes().get(ROOT).unwrap();
    assert_eq!((root.qgames, root.score), (1, 0));
}
