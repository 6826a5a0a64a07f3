//! Circuit breaker for the decision collaborator.
//!
//! After `failure_threshold` consecutive failures the circuit opens and turns
//! are decided locally. Once `open_timeout` has passed the circuit lets trial
//! calls through; `success_threshold` successes close it again and any failure
//! reopens it.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::models::CircuitBreakerSettings;

/// State of a circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Calls flow normally.
    Closed,
    /// Calls are blocked.
    Open,
    /// Trial calls are allowed to test recovery.
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::HalfOpen => "half_open",
        }
    }
}

/// One year; longer timeouts are clamped.
const MAX_OPEN_TIMEOUT_SECS: u64 = 365 * 24 * 60 * 60;

#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    failure_threshold: u32,
    open_timeout: Duration,
    success_threshold: u32,
    state: CircuitState,
    consecutive_failures: u32,
    half_open_successes: u32,
    opened_at: Option<DateTime<Utc>>,
    /// Total times the circuit opened.
    open_count: u32,
}

impl CircuitBreaker {
    pub fn new(settings: &CircuitBreakerSettings) -> Self {
        Self {
            failure_threshold: settings.failure_threshold.max(1),
            open_timeout: Duration::seconds(
                i64::try_from(settings.open_timeout_secs.min(MAX_OPEN_TIMEOUT_SECS))
                    .unwrap_or(0),
            ),
            success_threshold: settings.success_threshold.max(1),
            state: CircuitState::Closed,
            consecutive_failures: 0,
            half_open_successes: 0,
            opened_at: None,
            open_count: 0,
        }
    }

    pub fn state(&self) -> CircuitState {
        self.state
    }

    pub fn open_count(&self) -> u32 {
        self.open_count
    }

    pub fn record_failure(&mut self) {
        self.record_failure_at(Utc::now());
    }

    fn record_failure_at(&mut self, now: DateTime<Utc>) {
        self.consecutive_failures += 1;
        match self.state {
            CircuitState::Closed if self.consecutive_failures >= self.failure_threshold => {
                self.open(now);
            }
            // Any failure during a trial reopens the circuit.
            CircuitState::HalfOpen => self.open(now),
            _ => {}
        }
    }

    pub fn record_success(&mut self) {
        self.consecutive_failures = 0;
        if self.state == CircuitState::HalfOpen {
            self.half_open_successes += 1;
            if self.half_open_successes >= self.success_threshold {
                self.close();
            }
        }
    }

    /// Whether a call may go out now. Moves an expired open circuit to half-open.
    pub fn allows(&mut self) -> bool {
        self.allows_at(Utc::now())
    }

    fn allows_at(&mut self, now: DateTime<Utc>) -> bool {
        match self.state {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => match self.opened_at {
                Some(opened_at) if now >= opened_at + self.open_timeout => {
                    self.state = CircuitState::HalfOpen;
                    self.half_open_successes = 0;
                    tracing::info!("decision circuit half-open, allowing trial call");
                    true
                }
                _ => false,
            },
        }
    }

    fn open(&mut self, now: DateTime<Utc>) {
        self.state = CircuitState::Open;
        self.opened_at = Some(now);
        self.half_open_successes = 0;
        self.open_count += 1;
        tracing::warn!(
            consecutive_failures = self.consecutive_failures,
            open_count = self.open_count,
            "decision circuit opened"
        );
    }

    fn close(&mut self) {
        self.state = CircuitState::Closed;
        self.opened_at = None;
        self.half_open_successes = 0;
        self.consecutive_failures = 0;
        tracing::info!("decision circuit closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker() -> CircuitBreaker {
        CircuitBreaker::new(&CircuitBreakerSettings {
            failure_threshold: 3,
            open_timeout_secs: 30,
            success_threshold: 1,
        })
    }

    #[test]
    fn test_opens_after_consecutive_failures() {
        let mut cb = breaker();
        cb.record_failure();
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Closed);
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);
        assert!(!cb.allows());
        assert_eq!(cb.open_count(), 1);
    }

    #[test]
    fn test_success_resets_failure_streak() {
        let mut cb = breaker();
        cb.record_failure();
        cb.record_failure();
        cb.record_success();
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[test]
    fn test_half_open_after_timeout_then_close() {
        let mut cb = breaker();
        let start = Utc::now();
        for _ in 0..3 {
            cb.record_failure_at(start);
        }
        assert!(!cb.allows_at(start + Duration::seconds(10)));
        assert!(cb.allows_at(start + Duration::seconds(31)));
        assert_eq!(cb.state(), CircuitState::HalfOpen);
        cb.record_success();
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[test]
    fn test_half_open_failure_reopens() {
        let mut cb = breaker();
        let start = Utc::now();
        for _ in 0..3 {
            cb.record_failure_at(start);
        }
        assert!(cb.allows_at(start + Duration::seconds(31)));
        cb.record_failure_at(start + Duration::seconds(32));
        assert_eq!(cb.state(), CircuitState::Open);
        assert_eq!(cb.open_count(), 2);
    }
}
