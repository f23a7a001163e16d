// tests/property/timer_order_test.rs

//! Property-based tests for the timer queue
//! Tests that due tasks fire in non-decreasing due order and never early

use chatrelay::core::tasks::TimerQueue;
use proptest::prelude::*;
use std::time::Duration;
use tokio::time::Instant;

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 200,
        max_shrink_iters: 1000,
        ..ProptestConfig::default()
    })]

    #[test]
    fn test_run_due_order_and_bound(
        delays in prop::collection::vec(0u64..10_000, 1..50),
        cutoff in 0u64..10_000,
        cancel_mask in prop::collection::vec(any::<bool>(), 50),
    ) {
        let start = Instant::now();
        let mut queue = TimerQueue::new();
        let mut live = Vec::new();
        for (i, delay) in delays.iter().enumerate() {
            let id = queue.schedule_at(start + Duration::from_millis(*delay), (i, *delay));
            if cancel_mask[i] {
                queue.cancel(id);
            } else {
                live.push(*delay);
            }
        }

        let now = start + Duration::from_millis(cutoff);
        let mut fired = Vec::new();
        while let Some(f) = queue.pop_due(now) {
            fired.push(f.task);
        }

        // Never early, never out of order, FIFO among equals.
        prop_assert!(fired.iter().all(|(_, d)| *d <= cutoff));
        prop_assert!(fired.windows(2).all(|w| (w[0].1, w[0].0) < (w[1].1, w[1].0)));

        let expected = live.iter().filter(|d| **d <= cutoff).count();
        prop_assert_eq!(fired.len(), expected);
        prop_assert_eq!(queue.len(), live.len() - expected);
    }
}
