// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use rt_core::FakeClock;
use std::sync::atomic::AtomicUsize;
use std::time::Duration;

fn child_record(restart: RestartPolicy, order: u64) -> ChildRecord {
    ChildRecord {
        id: ChildId::new(),
        spec: ChildSpec::new("prop", restart, |_token| 0),
        order,
        state: ChildState::Init,
        last_exit_status: None,
        generation: 0,
        cancel: None,
        thread: None,
        restart_count: 0,
        first_restart_at: None,
    }
}

fn wait_until(mut condition: impl FnMut() -> bool, timeout: Duration) -> bool {
    let deadline = std::time::Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if std::time::Instant::now() >= deadline {
            return false;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
}

/// A child that crashes exactly once then parks until canceled.
fn crash_once(runs: Arc<AtomicUsize>) -> ChildSpec {
    ChildSpec::new("flaky", RestartPolicy::Permanent, move |token| {
        let attempt = runs.fetch_add(1, Ordering::SeqCst);
        if attempt == 0 {
            1
        } else {
            while !token.is_canceled() {
                std::thread::sleep(Duration::from_millis(5));
            }
            0
        }
    })
}

fn parked(runs: Arc<AtomicUsize>, restart: RestartPolicy) -> ChildSpec {
    ChildSpec::new("steady", restart, move |token| {
        runs.fetch_add(1, Ordering::SeqCst);
        while !token.is_canceled() {
            std::thread::sleep(Duration::from_millis(5));
        }
        0
    })
}

#[test]
fn one_for_one_restarts_only_the_failed_permanent_child() {
    let runs = Arc::new(AtomicUsize::new(0));
    let sup = Supervisor::new(Strategy::OneForOne, 5, Duration::from_secs(10));
    let id = sup.add_child(crash_once(runs.clone()));
    sup.start();

    assert!(wait_until(|| runs.load(Ordering::SeqCst) >= 2, Duration::from_secs(2)), "child should restart after crashing");
    assert!(sup.is_running());
    assert_eq!(sup.child_count(), 1);

    sup.stop();
    assert!(!sup.is_running());
    let _ = id;
}

#[test]
fn temporary_child_never_restarts() {
    let runs = Arc::new(AtomicUsize::new(0));
    let sup = Supervisor::new(Strategy::OneForOne, 5, Duration::from_secs(10));
    sup.add_child(ChildSpec::new("one-shot", RestartPolicy::Temporary, {
        let runs = runs.clone();
        move |_token| {
            runs.fetch_add(1, Ordering::SeqCst);
            1
        }
    }));
    sup.start();

    assert!(wait_until(|| runs.load(Ordering::SeqCst) == 1, Duration::from_secs(1)));
    std::thread::sleep(Duration::from_millis(100));
    assert_eq!(runs.load(Ordering::SeqCst), 1, "a temporary child must never be restarted");
    sup.stop();
}

#[test]
fn transient_child_restarts_on_failure_but_not_on_clean_exit() {
    let runs = Arc::new(AtomicUsize::new(0));
    let sup = Supervisor::new(Strategy::OneForOne, 5, Duration::from_secs(10));
    sup.add_child(ChildSpec::new("transient", RestartPolicy::Transient, {
        let runs = runs.clone();
        move |_token| {
            let attempt = runs.fetch_add(1, Ordering::SeqCst);
            if attempt == 0 {
                1
            } else {
                0
            }
        }
    }));
    sup.start();

    assert!(wait_until(|| runs.load(Ordering::SeqCst) >= 2, Duration::from_secs(1)), "must restart after failing once");
    std::thread::sleep(Duration::from_millis(100));
    assert_eq!(runs.load(Ordering::SeqCst), 2, "a clean exit must not trigger another restart");
    sup.stop();
}

#[test]
fn rest_for_one_restarts_the_failed_child_and_its_later_siblings_only() {
    let a_runs = Arc::new(AtomicUsize::new(0));
    let b_runs = Arc::new(AtomicUsize::new(0));
    let c_runs = Arc::new(AtomicUsize::new(0));

    let sup = Supervisor::new(Strategy::RestForOne, 10, Duration::from_secs(10));
    sup.add_child(parked(a_runs.clone(), RestartPolicy::Permanent));
    sup.add_child(crash_once(b_runs.clone()));
    sup.add_child(parked(c_runs.clone(), RestartPolicy::Permanent));
    sup.start();

    assert!(wait_until(|| b_runs.load(Ordering::SeqCst) >= 2, Duration::from_secs(2)), "b should crash and restart");
    assert!(wait_until(|| c_runs.load(Ordering::SeqCst) >= 2, Duration::from_secs(2)), "c was inserted after b and must be swept in too");
    std::thread::sleep(Duration::from_millis(100));
    assert_eq!(a_runs.load(Ordering::SeqCst), 1, "a was inserted before b and must be left alone");

    sup.stop();
}

/// Seed scenario 6: restart intensity escalation under OneForAll.
#[test]
fn one_for_all_sweeps_siblings_and_escalates_past_the_restart_budget() {
    let clock = FakeClock::new();
    let x_runs = Arc::new(AtomicUsize::new(0));
    let y_runs = Arc::new(AtomicUsize::new(0));

    let sup = Supervisor::with_clock(Strategy::OneForAll, 3, Duration::from_secs(1), clock);
    sup.add_child(ChildSpec::new("x", RestartPolicy::Permanent, {
        let x_runs = x_runs.clone();
        move |_token| {
            x_runs.fetch_add(1, Ordering::SeqCst);
            1
        }
    }));
    sup.add_child(parked(y_runs.clone(), RestartPolicy::Transient));
    sup.start();

    assert!(wait_until(|| !sup.is_running(), Duration::from_secs(2)), "the fourth crash within the window must escalate");
    assert_eq!(x_runs.load(Ordering::SeqCst), 4, "3 restarts are permitted, the 4th run is the one that gets denied");
    assert!(y_runs.load(Ordering::SeqCst) >= 2, "y is swept into every OneForAll restart even though it never fails on its own");
}

#[test]
fn remove_child_stops_it_and_drops_it_from_the_registry() {
    let runs = Arc::new(AtomicUsize::new(0));
    let sup = Supervisor::new(Strategy::OneForOne, 5, Duration::from_secs(10));
    let id = sup.add_child(parked(runs.clone(), RestartPolicy::Permanent));
    sup.start();
    assert!(wait_until(|| runs.load(Ordering::SeqCst) == 1, Duration::from_secs(1)));

    sup.remove_child(id).unwrap();
    assert_eq!(sup.child_count(), 0);
    assert_eq!(sup.remove_child(id).unwrap_err(), SupervisorError::UnknownChild);
    sup.stop();
}

#[test]
fn restart_child_is_manual_and_still_subject_to_intensity() {
    let runs = Arc::new(AtomicUsize::new(0));
    let sup = Supervisor::new(Strategy::OneForOne, 5, Duration::from_secs(10));
    let id = sup.add_child(parked(runs.clone(), RestartPolicy::Permanent));
    sup.start();
    assert!(wait_until(|| runs.load(Ordering::SeqCst) == 1, Duration::from_secs(1)));

    sup.restart_child(id).unwrap();
    assert!(wait_until(|| runs.load(Ordering::SeqCst) == 2, Duration::from_secs(1)));
    sup.stop();
}

#[test]
fn restart_child_rejects_an_unknown_id_and_a_stopped_supervisor() {
    let sup = Supervisor::new(Strategy::OneForOne, 5, Duration::from_secs(10));
    let bogus = rt_core::ChildId::new();
    assert_eq!(sup.restart_child(bogus).unwrap_err(), SupervisorError::NotRunning);
    sup.start();
    assert_eq!(sup.restart_child(bogus).unwrap_err(), SupervisorError::UnknownChild);
    sup.stop();
}

#[test]
fn stopping_twice_is_a_no_op() {
    let sup = Supervisor::new(Strategy::OneForOne, 5, Duration::from_secs(10));
    sup.start();
    sup.stop();
    sup.stop();
    assert!(!sup.is_running());
}

#[test]
fn starting_twice_does_not_spawn_a_second_monitor_or_double_spawn_children() {
    let runs = Arc::new(AtomicUsize::new(0));
    let sup = Supervisor::new(Strategy::OneForOne, 5, Duration::from_secs(10));
    sup.add_child(parked(runs.clone(), RestartPolicy::Permanent));
    sup.start();
    sup.start();
    std::thread::sleep(Duration::from_millis(50));
    assert_eq!(runs.load(Ordering::SeqCst), 1);
    sup.stop();
}

mod properties {
    use super::*;
    use proptest::prelude::*;
    use rt_core::test_support::strategies::{arb_restart_policy, arb_strategy};

    proptest! {
        /// Restart-intensity invariant: over any sequence of restart
        /// attempts, the number permitted within a sliding window never
        /// exceeds `max_restarts`.
        #[test]
        fn restart_count_never_exceeds_max_within_the_window(
            max_restarts in 1i64..8,
            offsets_ms in proptest::collection::vec(0u64..20, 1..30),
        ) {
            let mut child = child_record(RestartPolicy::Permanent, 0);
            let window = Duration::from_millis(100);
            let base = std::time::Instant::now();
            let mut elapsed = Duration::ZERO;
            for offset in offsets_ms {
                elapsed += Duration::from_millis(offset);
                let now = base + elapsed;
                if can_restart(&mut child, max_restarts, window, now) {
                    prop_assert!(i64::from(child.restart_count) <= max_restarts);
                }
            }
        }

        /// An unlimited budget (`max_restarts <= 0`) never denies a restart.
        #[test]
        fn unlimited_budget_always_permits(
            offsets_ms in proptest::collection::vec(0u64..20, 1..30),
        ) {
            let mut child = child_record(RestartPolicy::Permanent, 0);
            let window = Duration::from_millis(100);
            let base = std::time::Instant::now();
            let mut elapsed = Duration::ZERO;
            for offset in offsets_ms {
                elapsed += Duration::from_millis(offset);
                prop_assert!(can_restart(&mut child, 0, window, base + elapsed));
            }
        }

        /// Per-policy restart decision, independent of strategy: a
        /// permanent child always restarts, a temporary one never does, and
        /// a transient one restarts only when it is the child that actually
        /// failed with a non-zero status.
        #[test]
        fn should_restart_matches_policy_semantics(
            policy in arb_restart_policy(),
            _strategy in arb_strategy(),
            is_failed_child in any::<bool>(),
            status in any::<i32>(),
        ) {
            let child = child_record(policy, 0);
            let failed_idx = if is_failed_child { 0 } else { 1 };
            let result = should_restart(&child, 0, failed_idx, status);
            match policy {
                RestartPolicy::Permanent => prop_assert!(result),
                RestartPolicy::Temporary => prop_assert!(!result),
                RestartPolicy::Transient => {
                    let expected = !is_failed_child || status != 0;
                    prop_assert_eq!(result, expected);
                }
            }
        }
    }
}
