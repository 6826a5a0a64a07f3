//! Admission control for decision calls: a per-agent rate limit plus a circuit
//! breaker. A refused call means the turn is decided by the bandit instead.

use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use std::num::NonZeroU32;
use tokio::sync::Mutex;

use super::circuit_breaker::{CircuitBreaker, CircuitState};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{CircuitBreakerSettings, RateLimitConfig};

/// Verdict for one prospective decision call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    Allowed,
    RateLimited,
    CircuitOpen,
}

impl GateDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed)
    }
}

pub struct DecisionGate {
    limiter: DefaultDirectRateLimiter,
    breaker: Mutex<CircuitBreaker>,
}

impl DecisionGate {
    pub fn new(rate: &RateLimitConfig, breaker: &CircuitBreakerSettings) -> DomainResult<Self> {
        let per_minute = NonZeroU32::new(rate.decisions_per_minute).ok_or_else(|| {
            DomainError::InvalidConfiguration(
                "rate_limit.decisions_per_minute must be at least 1".to_string(),
            )
        })?;
        Ok(Self {
            limiter: RateLimiter::direct(Quota::per_minute(per_minute)),
            breaker: Mutex::new(CircuitBreaker::new(breaker)),
        })
    }

    /// Ask to make one call. The circuit is consulted first so an open circuit
    /// does not consume rate-limit budget.
    pub async fn try_acquire(&self) -> GateDecision {
        if !self.breaker.lock().await.allows() {
            return GateDecision::CircuitOpen;
        }
        if self.limiter.check().is_err() {
            return GateDecision::RateLimited;
        }
        GateDecision::Allowed
    }

    pub async fn record_success(&self) {
        self.breaker.lock().await.record_success();
    }

    pub async fn record_failure(&self) {
        self.breaker.lock().await.record_failure();
    }

    pub async fn circuit_state(&self) -> CircuitState {
        self.breaker.lock().await.state()
    }
}

impl std::fmt::Debug for DecisionGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecisionGate").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gate(per_minute: u32, failure_threshold: u32) -> DecisionGate {
        DecisionGate::new(
            &RateLimitConfig {
                decisions_per_minute: per_minute,
            },
            &CircuitBreakerSettings {
                failure_threshold,
                open_timeout_secs: 600,
                success_threshold: 1,
            },
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_rate_limit_refuses_after_quota() {
        let gate = gate(2, 5);
        assert_eq!(gate.try_acquire().await, GateDecision::Allowed);
        assert_eq!(gate.try_acquire().await, GateDecision::Allowed);
        assert_eq!(gate.try_acquire().await, GateDecision::RateLimited);
    }

    #[tokio::test]
    async fn test_open_circuit_refuses() {
        let gate = gate(100, 2);
        gate.record_failure().await;
        gate.record_failure().await;
        assert_eq!(gate.circuit_state().await, CircuitState::Open);
        assert_eq!(gate.try_acquire().await, GateDecision::CircuitOpen);
    }

    #[test]
    fn test_zero_rate_is_rejected() {
        let result = DecisionGate::new(
            &RateLimitConfig {
                decisions_per_minute: 0,
            },
            &CircuitBreakerSettings::default(),
        );
        assert!(matches!(result, Err(DomainError::InvalidConfiguration(_))));
    }
}
