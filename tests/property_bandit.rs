//! Property tests for the UCB1 tracker and the prompt pool's size guarantees.

use proptest::prelude::*;
use proptest::test_runner::TestCaseError;

use tactician::domain::models::{PromptPoolConfig, PromptPoolSnapshot};
use tactician::domain::ports::NullVariantGenerator;
use tactician::services::{PromptPool, StatTracker};

fn arms(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("arm_{i}")).collect()
}

proptest! {
    /// Property: an untried candidate is always selected while one exists.
    #[test]
    fn prop_untried_arm_wins(
        pulls in prop::collection::vec((0usize..6, 0.0f64..1.0), 0..40),
        extra_untried in 1usize..4,
    ) {
        let tried = arms(6);
        let mut tracker = StatTracker::new(std::f64::consts::SQRT_2);
        for (arm, reward) in &pulls {
            tracker.update(&tried[*arm], *reward);
        }

        let mut candidates = tried.clone();
        let untried: Vec<String> = (0..extra_untried).map(|i| format!("fresh_{i}")).collect();
        candidates.extend(untried.iter().cloned());

        let total = tracker.pulls_in_scope(&candidates);
        let chosen = tracker.select(&candidates, total)
            .map_err(|e| TestCaseError::fail(e.to_string()))?;
        prop_assert_eq!(tracker.get(&chosen).map_or(0, |s| s.pull_count), 0);
    }

    /// Property: selection always returns one of the candidates.
    #[test]
    fn prop_selection_is_a_candidate(
        pulls in prop::collection::vec((0usize..5, -1.0f64..2.0), 1..60),
        scope in 1usize..5,
    ) {
        let all = arms(5);
        let mut tracker = StatTracker::new(1.0);
        for (arm, reward) in &pulls {
            tracker.update(&all[*arm], *reward);
        }
        let candidates = &all[..scope];
        let chosen = tracker.select(candidates, tracker.pulls_in_scope(candidates))
            .map_err(|e| TestCaseError::fail(e.to_string()))?;
        prop_assert!(candidates.contains(&chosen));
    }

    /// Property: pull counts and cumulative rewards add up to what was recorded.
    #[test]
    fn prop_counters_are_conserved(
        pulls in prop::collection::vec((0usize..4, 0.0f64..1.0), 0..80),
    ) {
        let all = arms(4);
        let mut tracker = StatTracker::new(std::f64::consts::SQRT_2);
        for (arm, reward) in &pulls {
            tracker.update(&all[*arm], *reward);
        }

        let total_pulls: u64 = tracker.iter().map(|s| s.pull_count).sum();
        prop_assert_eq!(total_pulls, pulls.len() as u64);
        prop_assert_eq!(tracker.pulls_in_scope(&all), pulls.len() as u64);

        let total_reward: f64 = tracker.iter().map(|s| s.cumulative_reward).sum();
        let expected: f64 = pulls.iter().map(|(_, r)| r).sum();
        prop_assert!((total_reward - expected).abs() < 1e-9);
    }

    /// Property: `best` has the highest mean among tried candidates.
    #[test]
    fn prop_best_has_highest_mean(
        pulls in prop::collection::vec((0usize..5, 0.0f64..1.0), 1..50),
    ) {
        let all = arms(5);
        let mut tracker = StatTracker::new(std::f64::consts::SQRT_2);
        for (arm, reward) in &pulls {
            tracker.update(&all[*arm], *reward);
        }

        let best = tracker.best(&all).ok_or_else(|| TestCaseError::fail("nothing tried"))?;
        let best_mean = tracker.get(&best).map(|s| s.mean_reward()).unwrap_or_default();
        for stat in tracker.iter().filter(|s| s.pull_count > 0) {
            prop_assert!(stat.mean_reward() <= best_mean);
        }
    }

    /// Property: evolution never shrinks the pool and never grows it.
    #[test]
    fn prop_evolution_preserves_pool_size(
        rewards in prop::collection::vec((0usize..4, 0.0f64..1.0), 0..60),
        games in 0u32..12,
        quota in 1usize..4,
    ) {
        let config = PromptPoolConfig {
            replacement_quota: quota,
            ..PromptPoolConfig::default()
        };
        let seeds: Vec<String> = (0..4)
            .map(|i| format!("Seed prompt {i}. Fight with purpose and end with ACTION: <action_name>."))
            .collect();
        let mut pool = PromptPool::seed(config, std::f64::consts::SQRT_2, seeds)
            .map_err(|e| TestCaseError::fail(e.to_string()))?;
        let ids: Vec<_> = pool.variants().iter().map(|v| v.id.clone()).collect();
        for (slot, reward) in &rewards {
            pool.record_result(&ids[*slot], *reward)
                .map_err(|e| TestCaseError::fail(e.to_string()))?;
        }

        let before = pool.len();
        let report = tokio_test::block_on(
            pool.maybe_evolve(&NullVariantGenerator::new(), games, "notes"),
        )
        .map_err(|e| TestCaseError::fail(e.to_string()))?;

        prop_assert_eq!(pool.len(), before);
        prop_assert!(pool.len() >= pool.config().min_pool_size);
        if let Some(report) = report {
            prop_assert!(report.replaced.is_empty());
            prop_assert!(report.aborted.len() <= quota);
        }

        let snapshot: PromptPoolSnapshot = pool.snapshot();
        prop_assert_eq!(snapshot.variants.len(), snapshot.stats.len());
    }
}
