use std::sync::atomic::{AtomicUsize, Ordering};

use rand::Rng;

use crate::model::{Backend, LoadBalanceStrategy};

/// Picks one backend from a host's pool per `LoadBalanceStrategy`, skipping
/// any backend the caller's `is_available` predicate rejects (circuit-open).
pub struct LoadBalancer {
    strategy: LoadBalanceStrategy,
    round_robin_cursor: AtomicUsize,
}

impl LoadBalancer {
    pub fn new(strategy: LoadBalanceStrategy) -> Self {
        Self {
            strategy,
            round_robin_cursor: AtomicUsize::new(0),
        }
    }

    pub fn pick<'a>(
        &self,
        backends: &'a [Backend],
        is_available: impl Fn(&Backend) -> bool,
    ) -> Option<&'a Backend> {
        let candidates: Vec<&Backend> = backends.iter().filter(|b| is_available(b)).collect();
        if candidates.is_empty() {
            return None;
        }

        match self.strategy {
            LoadBalanceStrategy::RoundRobin => {
                let idx = self.round_robin_cursor.fetch_add(1, Ordering::Relaxed) % candidates.len();
                Some(candidates[idx])
            }
            LoadBalanceStrategy::Random => {
                let idx = rand::thread_rng().gen_range(0..candidates.len());
                Some(candidates[idx])
            }
            LoadBalanceStrategy::WeightedRoundRobin => {
                let total_weight: u32 = candidates.iter().map(|b| b.weight.max(1)).sum();
                let mut target = rand::thread_rng().gen_range(0..total_weight);
                for backend in &candidates {
                    let weight = backend.weight.max(1);
                    if target < weight {
                        return Some(backend);
                    }
                    target -= weight;
                }
                candidates.last().copied()
            }
        }
    }
}
