// Tests for the free-kick cycle guard
//
// Each vector is a chain of landing points; only the final jump closes a cycle.

use paper_football::cycle_guard::{CycleGuard, CycleResult};

fn push_chain(guard: &mut CycleGuard, points: &[i32]) -> Vec<CycleResult> {
    points
        .windows(2)
        .map(|jump| guard.push(jump[0], jump[1]))
        .collect()
}

fn assert_cycle_at_end(points: &[i32]) {
    let mut guard = CycleGuard::new(100);
    let results = push_chain(&mut guard, points);
    let (last, head) = results.split_last().expect("chain has jumps");

    assert!(
        head.iter().all(|result| *result == CycleResult::NoCycle),
        "early cycle in {:?}: {:?}",
        points,
        results
    );
    assert_eq!(*last, CycleResult::CycleFound, "no cycle in {:?}", points);
    assert_eq!(guard.len(), points.len() - 2, "cycle jump must not be recorded");
}

#[test]
fn test_back_and_forth() {
    assert_cycle_at_end(&[1, 2, 1, 2]);
}

#[test]
fn test_triangle_then_back() {
    assert_cycle_at_end(&[1, 2, 3, 1, 2, 1]);
}

#[test]
fn test_triangle_twice() {
    assert_cycle_at_end(&[1, 2, 3, 1, 2, 3, 1]);
}

#[test]
fn test_two_loops_through_one_point() {
    assert_cycle_at_end(&[1, 2, 1, 3, 1, 2, 1]);
}

#[test]
fn test_star_around_point() {
    assert_cycle_at_end(&[1, 2, 3, 2, 4, 2, 1, 2]);
}

#[test]
fn test_loop_after_long_path() {
    assert_cycle_at_end(&[1, 2, 3, 4, 5, 6, 7, 5, 6, 7, 6]);
}

#[test]
fn test_open_chains_have_no_cycle() {
    for points in &[vec![1, 2, 3, 4, 5], vec![1, 2, 1, 3], vec![10, 20, 30, 20, 40]] {
        let mut guard = CycleGuard::new(100);
        let results = push_chain(&mut guard, points);
        assert!(
            results.iter().all(|result| *result == CycleResult::NoCycle),
            "unexpected cycle in {:?}",
            points
        );
        assert_eq!(guard.len(), points.len() - 1);
    }
}

#[test]
fn test_reset_forgets_jumps() {
    let mut guard = CycleGuard::new(100);
    push_chain(&mut guard, &[1, 2, 1]);
    guard.reset();
    assert!(guard.is_empty());
    assert_eq!(guard.push(1, 2), CycleResult::NoCycle);
}
