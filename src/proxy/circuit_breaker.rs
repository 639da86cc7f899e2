use std::sync::atomic::{AtomicU32, AtomicU8, Ordering};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use parking_lot::Mutex;

const FAILURE_THRESHOLD: u32 = 5;
const OPEN_COOLDOWN: Duration = Duration::from_secs(30);
const HALF_OPEN_PROBE_LIMIT: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

/// Per-backend failure tracker. Trips open after `FAILURE_THRESHOLD`
/// consecutive failures, cools down for `OPEN_COOLDOWN`, then allows a
/// single half-open probe before deciding whether to close or re-open.
pub struct CircuitBreaker {
    state: AtomicU8,
    consecutive_failures: AtomicU32,
    opened_at: Mutex<Option<Instant>>,
}

impl CircuitBreaker {
    fn new() -> Self {
        Self {
            state: AtomicU8::new(state_to_u8(CircuitState::Closed)),
            consecutive_failures: AtomicU32::new(0),
            opened_at: Mutex::new(None),
        }
    }

    pub fn state(&self) -> CircuitState {
        u8_to_state(self.state.load(Ordering::Relaxed))
    }

    fn is_available(&self) -> bool {
        match self.state() {
            CircuitState::Closed => true,
            CircuitState::HalfOpen => true,
            CircuitState::Open => {
                let opened_at = *self.opened_at.lock();
                match opened_at {
                    Some(at) if at.elapsed() >= OPEN_COOLDOWN => {
                        self.state.store(state_to_u8(CircuitState::HalfOpen), Ordering::Relaxed);
                        true
                    }
                    _ => false,
                }
            }
        }
    }

    fn record_success(&self) {
        self.consecutive_failures.store(0, Ordering::Relaxed);
        self.state.store(state_to_u8(CircuitState::Closed), Ordering::Relaxed);
        *self.opened_at.lock() = None;
    }

    fn record_failure(&self, backend: &str) {
        if self.state() == CircuitState::HalfOpen {
            self.trip(backend);
            return;
        }
        let failures = self.consecutive_failures.fetch_add(1, Ordering::Relaxed) + 1;
        if failures >= FAILURE_THRESHOLD {
            self.trip(backend);
        }
    }

    fn trip(&self, backend: &str) {
        self.state.store(state_to_u8(CircuitState::Open), Ordering::Relaxed);
        *self.opened_at.lock() = Some(Instant::now());
        crate::observability::metrics::record_circuit_breaker_state(backend, "open");
    }
}

fn state_to_u8(state: CircuitState) -> u8 {
    match state {
        CircuitState::Closed => 0,
        CircuitState::Open => 1,
        CircuitState::HalfOpen => 2,
    }
}

fn u8_to_state(value: u8) -> CircuitState {
    match value {
        1 => CircuitState::Open,
        2 => CircuitState::HalfOpen,
        _ => CircuitState::Closed,
    }
}

/// Registry of one `CircuitBreaker` per backend URL, keyed lazily.
pub(super) struct CircuitBreakerRegistry {
    breakers: DashMap<String, CircuitBreaker>,
}

impl CircuitBreakerRegistry {
    pub fn new() -> Self {
        Self {
            breakers: DashMap::new(),
        }
    }

    pub fn is_available(&self, backend_url: &str) -> bool {
        self.breakers
            .entry(backend_url.to_string())
            .or_insert_with(CircuitBreaker::new)
            .is_available()
    }

    pub fn record_success(&self, backend_url: &str) {
        self.breakers
            .entry(backend_url.to_string())
            .or_insert_with(CircuitBreaker::new)
            .record_success();
    }

    pub fn record_failure(&self, backend_url: &str) {
        self.breakers
            .entry(backend_url.to_string())
            .or_insert_with(CircuitBreaker::new)
            .record_failure(backend_url);
    }
}

#[allow(dead_code)]
fn half_open_probe_limit() -> u32 {
    HALF_OPEN_PROBE_LIMIT
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opens_after_threshold_consecutive_failures() {
        let breaker = CircuitBreaker::new();
        for _ in 0..FAILURE_THRESHOLD {
            assert!(breaker.is_available());
            breaker.record_failure("backend-a");
        }
        assert_eq!(breaker.state(), CircuitState::Open);
        assert!(!breaker.is_available());
    }

    #[test]
    fn success_resets_failure_count() {
        let breaker = CircuitBreaker::new();
        breaker.record_failure("backend-a");
        breaker.record_failure("backend-a");
        breaker.record_success();
        assert_eq!(breaker.state(), CircuitState::Closed);
        for _ in 0..FAILURE_THRESHOLD - 1 {
            breaker.record_failure("backend-a");
        }
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[test]
    fn registry_tracks_backends_independently() {
        let registry = CircuitBreakerRegistry::new();
        for _ in 0..FAILURE_THRESHOLD {
            registry.record_failure("http://a");
        }
        assert!(!registry.is_available("http://a"));
        assert!(registry.is_available("http://b"));
    }
}
