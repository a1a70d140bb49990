//! Concurrent behaviour of the limiter under many checkers and sweepers.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Barrier, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use rand::Rng;

use gatekeeper::ratelimit::{Decision, Key, Limiter};

const WINDOW: Duration = Duration::from_millis(5000);

#[test]
fn test_same_key_counts_are_not_lost() {
    const THREADS: usize = 8;
    const CHECKS: usize = 500;

    let limiter = Arc::new(Limiter::new());
    let key = Key::new(1, "10.0.0.1", "agent");
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let limiter = limiter.clone();
            let key = key.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                (0..CHECKS)
                    .map(|_| limiter.check(&key, u64::MAX, Duration::ZERO).count())
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let mut seen = HashSet::new();
    for handle in handles {
        for count in handle.join().unwrap() {
            assert!(seen.insert(count), "count {} observed twice", count);
        }
    }

    let total = (THREADS * CHECKS) as u64;
    assert_eq!(limiter.count_for(&key), Some(total));
    assert_eq!(limiter.processed_count(), total);
    // Every count from 1 to total was handed out exactly once.
    assert_eq!(seen, (1..=total).collect::<HashSet<_>>());
}

#[test]
fn test_exactly_max_rate_admitted_under_contention() {
    const THREADS: usize = 8;
    const CHECKS: usize = 100;
    const MAX_RATE: u64 = 137;

    let limiter = Arc::new(Limiter::new());
    let key = Key::new(1, "10.0.0.1", "agent");

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let limiter = limiter.clone();
            let key = key.clone();
            thread::spawn(move || {
                (0..CHECKS)
                    .filter(|_| limiter.check(&key, MAX_RATE, Duration::ZERO).is_admitted())
                    .count()
            })
        })
        .collect();

    let admitted: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
    assert_eq!(admitted as u64, MAX_RATE);
    assert_eq!(limiter.denied_count(), (THREADS * CHECKS) as u64 - MAX_RATE);
}

#[test]
fn test_distinct_keys_get_distinct_slots() {
    let limiter = Arc::new(Limiter::new());

    let handles: Vec<_> = (0..4u32)
        .map(|context_id| {
            let limiter = limiter.clone();
            thread::spawn(move || {
                for addr in 0..25 {
                    let key = Key::new(context_id, format!("10.0.0.{}", addr), "agent");
                    limiter.check(&key, 100, WINDOW);
                    limiter.check(&key.with_route("login"), 100, WINDOW);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(limiter.slot_count(), 4 * 25 * 2);
    assert_eq!(limiter.processed_count(), 4 * 25 * 2);
}

#[test]
fn test_window_rollover() {
    let limiter = Limiter::new();
    let key = Key::new(0, "10.0.0.1", "agent");
    let window = Duration::from_millis(100);

    for _ in 0..3 {
        assert!(limiter.check(&key, 3, window).is_admitted());
    }
    let decision = limiter.check(&key, 3, window);
    assert!(!decision.is_admitted());
    let retry_after = decision.retry_after().expect("window rolls over");
    assert!(retry_after <= window);

    thread::sleep(window + Duration::from_millis(20));

    assert_eq!(
        limiter.check(&key, 3, window),
        Decision::Admit { count: 1, remaining: 2 }
    );
}

// Same shape as the production defaults (1500 per 5 s window, idle after two
// windows) with the window scaled down to 500 ms to keep the test fast.
#[test]
fn test_idle_slots_are_evicted_after_two_windows_scaled() {
    const THREADS: usize = 10;
    const CHECKS: usize = 10;
    let window = Duration::from_millis(500);

    let limiter = Arc::new(Limiter::new());
    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let limiter = limiter.clone();
            thread::spawn(move || {
                let mut rng = rand::thread_rng();
                for _ in 0..CHECKS {
                    let key = Key::new(
                        0,
                        format!("192.168.{}.{}", rng.gen_range(0..4), rng.gen_range(0..255)),
                        format!("agent-{}", rng.gen_range(0..3)),
                    );
                    assert!(limiter.check(&key, 1500, window).is_admitted());
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    assert!(limiter.slot_count() > 0);

    thread::sleep(2 * window);

    assert_eq!(limiter.live_slot_count(window), 0);
    assert_eq!(limiter.processed_count(), (THREADS * CHECKS) as u64);
}

#[test]
fn test_idle_slots_are_evicted_after_two_windows_at_full_width() {
    const THREADS: usize = 10;
    const CHECKS: usize = 10;

    let limiter = Arc::new(Limiter::new());
    let t0 = Instant::now();
    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let limiter = limiter.clone();
            thread::spawn(move || {
                let mut rng = rand::thread_rng();
                for _ in 0..CHECKS {
                    let key = Key::new(
                        0,
                        format!("192.168.{}.{}", rng.gen_range(0..4), rng.gen_range(0..255)),
                        format!("agent-{}", rng.gen_range(0..3)),
                    );
                    assert!(limiter.check_at(&key, 1500, WINDOW, t0).is_admitted());
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    let slots = limiter.slot_count();
    assert!(slots > 0);

    assert_eq!(limiter.sweep_at(WINDOW, t0 + WINDOW), 0);
    assert_eq!(limiter.sweep_at(WINDOW, t0 + 2 * WINDOW), slots);
    assert_eq!(limiter.slot_count(), 0);
    assert_eq!(limiter.processed_count(), (THREADS * CHECKS) as u64);
}

#[test]
fn test_sweepers_and_checkers_run_together() {
    const CHECKERS: usize = 6;
    const SWEEPERS: usize = 2;
    const CHECKS: usize = 2000;

    let limiter = Arc::new(Limiter::new());
    let hot = Key::new(9, "10.9.9.9", "hot");
    let done = Arc::new(AtomicBool::new(false));
    let hot_counts = Arc::new(Mutex::new(Vec::new()));

    let sweepers: Vec<_> = (0..SWEEPERS)
        .map(|_| {
            let limiter = limiter.clone();
            let done = done.clone();
            thread::spawn(move || {
                let mut evicted = 0;
                while !done.load(Ordering::Relaxed) {
                    // Anything not touched in the last millisecond is fair game.
                    evicted += limiter.sweep(Duration::from_millis(1));
                    thread::yield_now();
                }
                evicted
            })
        })
        .collect();

    let checkers: Vec<_> = (0..CHECKERS)
        .map(|id| {
            let limiter = limiter.clone();
            let hot = hot.clone();
            let hot_counts = hot_counts.clone();
            thread::spawn(move || {
                let mut counts = Vec::with_capacity(CHECKS);
                for i in 0..CHECKS {
                    let cold = Key::new(id as u32, format!("10.0.{}.{}", id, i % 50), "cold");
                    limiter.check(&cold, 10, WINDOW);
                    counts.push(limiter.check(&hot, u64::MAX, Duration::ZERO).count());
                }
                hot_counts.lock().unwrap().extend(counts);
            })
        })
        .collect();

    for handle in checkers {
        handle.join().unwrap();
    }
    done.store(true, Ordering::Relaxed);
    for handle in sweepers {
        handle.join().unwrap();
    }

    assert_eq!(limiter.processed_count(), (CHECKERS * CHECKS * 2) as u64);

    // The hot key may have been evicted and recreated between bursts, but each
    // incarnation hands out 1..=n without duplicates, so no count can exceed
    // the number of hot checks and the counts seen must sum consistently.
    let counts = hot_counts.lock().unwrap();
    assert_eq!(counts.len(), CHECKERS * CHECKS);
    assert!(counts.iter().all(|&c| c >= 1 && c <= (CHECKERS * CHECKS) as u64));
    let ones = counts.iter().filter(|&&c| c == 1).count();
    let max_seen = *counts.iter().max().unwrap();
    assert!(ones >= 1);
    assert!(max_seen as usize <= CHECKERS * CHECKS - (ones - 1));
}

#[test]
fn test_read_accessors_are_idempotent() {
    let limiter = Limiter::new();
    for addr in 0..10 {
        limiter.check(&Key::new(0, format!("10.0.0.{}", addr), ""), 5, WINDOW);
    }

    let slots = limiter.slot_count();
    let processed = limiter.processed_count();
    for _ in 0..5 {
        assert_eq!(limiter.slot_count(), slots);
        assert_eq!(limiter.processed_count(), processed);
    }
    assert_eq!(slots, 10);
    assert_eq!(processed, 10);
}
