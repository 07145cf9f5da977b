use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::behavior::CircuitBreakerBehavior;
use super::metrics::CircuitBreakerMetrics;

/// The three states of the breaker's state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl From<u8> for CircuitState {
    fn from(value: u8) -> Self {
        match value {
            0 => CircuitState::Closed,
            1 => CircuitState::Open,
            2 => CircuitState::HalfOpen,
            // An unrecognized encoding fails toward the safest state: stop
            // sending traffic rather than guess it is healthy.
            _ => CircuitState::Open,
        }
    }
}

/// Tunables for a [`CircuitBreaker`].
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures (while closed) before the circuit opens.
    pub failure_threshold: u32,
    /// How long the circuit stays open before allowing a half-open probe.
    pub timeout: Duration,
    /// Consecutive successes (while half-open) before the circuit closes.
    pub success_threshold: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            timeout: Duration::from_secs(30),
            success_threshold: 2,
        }
    }
}

#[derive(Debug)]
struct Inner {
    state: CircuitState,
    consecutive_failures: u64,
    half_open_calls: u64,
    opened_at: Option<Instant>,
    total_calls: u64,
    success_count: u64,
    failure_count: u64,
    total_duration: Duration,
    forced: bool,
}

impl Default for Inner {
    fn default() -> Self {
        Self {
            state: CircuitState::Closed,
            consecutive_failures: 0,
            half_open_calls: 0,
            opened_at: None,
            total_calls: 0,
            success_count: 0,
            failure_count: 0,
            total_duration: Duration::ZERO,
            forced: false,
        }
    }
}

/// A generic circuit breaker: closed → open after `failure_threshold`
/// consecutive failures; open → half-open once `timeout` elapses; half-open
/// → closed after `success_threshold` consecutive successes, or → open
/// immediately on any half-open failure.
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            inner: Mutex::new(Inner::default()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current state, transitioning Open → HalfOpen lazily if the timeout
    /// has elapsed since the circuit opened.
    pub fn state(&self) -> CircuitState {
        let mut inner = self.inner.lock().expect("circuit breaker lock poisoned");
        self.maybe_transition_to_half_open(&mut inner);
        inner.state
    }

    /// Whether a caller should be allowed to proceed right now.
    pub fn should_allow(&self) -> bool {
        let mut inner = self.inner.lock().expect("circuit breaker lock poisoned");
        self.maybe_transition_to_half_open(&mut inner);
        !matches!(inner.state, CircuitState::Open)
    }

    fn maybe_transition_to_half_open(&self, inner: &mut Inner) {
        if inner.forced {
            return;
        }
        if inner.state == CircuitState::Open {
            if let Some(opened_at) = inner.opened_at {
                if opened_at.elapsed() >= self.config.timeout {
                    inner.state = CircuitState::HalfOpen;
                    inner.half_open_calls = 0;
                    info!(breaker = %self.name, "circuit transitioning to half-open");
                }
            }
        }
    }

    pub fn record_success_manual(&self, duration: Duration) {
        let mut inner = self.inner.lock().expect("circuit breaker lock poisoned");
        self.maybe_transition_to_half_open(&mut inner);
        inner.total_calls += 1;
        inner.success_count += 1;
        inner.total_duration += duration;

        match inner.state {
            CircuitState::Closed => {
                inner.consecutive_failures = 0;
            }
            CircuitState::HalfOpen => {
                inner.half_open_calls += 1;
                if inner.half_open_calls >= self.config.success_threshold as u64 {
                    inner.state = CircuitState::Closed;
                    inner.consecutive_failures = 0;
                    inner.half_open_calls = 0;
                    inner.opened_at = None;
                    info!(breaker = %self.name, "circuit closed after successful probes");
                }
            }
            CircuitState::Open => {}
        }
    }

    pub fn record_failure_manual(&self, duration: Duration) {
        let mut inner = self.inner.lock().expect("circuit breaker lock poisoned");
        self.maybe_transition_to_half_open(&mut inner);
        inner.total_calls += 1;
        inner.failure_count += 1;
        inner.total_duration += duration;

        match inner.state {
            CircuitState::Closed => {
                inner.consecutive_failures += 1;
                if inner.consecutive_failures >= self.config.failure_threshold as u64 {
                    inner.state = CircuitState::Open;
                    inner.opened_at = Some(Instant::now());
                    warn!(breaker = %self.name, "circuit opened after consecutive failures");
                }
            }
            CircuitState::HalfOpen => {
                inner.state = CircuitState::Open;
                inner.opened_at = Some(Instant::now());
                inner.half_open_calls = 0;
                warn!(breaker = %self.name, "circuit reopened: probe failed");
            }
            CircuitState::Open => {}
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.state() == CircuitState::Closed
    }

    pub fn force_open(&self) {
        let mut inner = self.inner.lock().expect("circuit breaker lock poisoned");
        inner.state = CircuitState::Open;
        inner.opened_at = Some(Instant::now());
        inner.forced = true;
    }

    pub fn force_closed(&self) {
        let mut inner = self.inner.lock().expect("circuit breaker lock poisoned");
        inner.state = CircuitState::Closed;
        inner.consecutive_failures = 0;
        inner.half_open_calls = 0;
        inner.opened_at = None;
        inner.forced = false;
    }

    pub fn metrics(&self) -> CircuitBreakerMetrics {
        let mut inner = self.inner.lock().expect("circuit breaker lock poisoned");
        self.maybe_transition_to_half_open(&mut inner);
        CircuitBreakerMetrics {
            current_state: inner.state,
            total_calls: inner.total_calls,
            success_count: inner.success_count,
            failure_count: inner.failure_count,
            consecutive_failures: inner.consecutive_failures,
            half_open_calls: inner.half_open_calls,
            total_duration: inner.total_duration,
        }
    }
}

impl CircuitBreakerBehavior for CircuitBreaker {
    fn name(&self) -> &str {
        self.name()
    }

    fn state(&self) -> CircuitState {
        self.state()
    }

    fn should_allow(&self) -> bool {
        self.should_allow()
    }

    fn record_success(&self, duration: Duration) {
        self.record_success_manual(duration)
    }

    fn record_failure(&self, duration: Duration) {
        self.record_failure_manual(duration)
    }

    fn is_healthy(&self) -> bool {
        self.is_healthy()
    }

    fn force_open(&self) {
        self.force_open()
    }

    fn force_closed(&self) {
        self.force_closed()
    }

    fn metrics(&self) -> CircuitBreakerMetrics {
        self.metrics()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_closed() {
        let cb = CircuitBreaker::new("test", CircuitBreakerConfig::default());
        assert_eq!(cb.state(), CircuitState::Closed);
        assert!(cb.should_allow());
    }

    #[test]
    fn opens_after_exact_threshold_failures() {
        let cb = CircuitBreaker::new(
            "test",
            CircuitBreakerConfig {
                failure_threshold: 3,
                timeout: Duration::from_secs(60),
                success_threshold: 2,
            },
        );
        cb.record_failure_manual(Duration::ZERO);
        cb.record_failure_manual(Duration::ZERO);
        assert_eq!(cb.state(), CircuitState::Closed);
        cb.record_failure_manual(Duration::ZERO);
        assert_eq!(cb.state(), CircuitState::Open);
        assert!(!cb.should_allow());
    }

    #[test]
    fn success_resets_consecutive_failures_while_closed() {
        let cb = CircuitBreaker::new(
            "test",
            CircuitBreakerConfig {
                failure_threshold: 5,
                timeout: Duration::from_secs(60),
                success_threshold: 1,
            },
        );
        cb.record_failure_manual(Duration::ZERO);
        cb.record_failure_manual(Duration::ZERO);
        assert_eq!(cb.metrics().consecutive_failures, 2);
        cb.record_success_manual(Duration::ZERO);
        assert_eq!(cb.metrics().consecutive_failures, 0);
    }

    #[test]
    fn half_open_closes_after_success_threshold_probes() {
        let cb = CircuitBreaker::new(
            "test",
            CircuitBreakerConfig {
                failure_threshold: 1,
                timeout: Duration::from_millis(0),
                success_threshold: 2,
            },
        );
        cb.record_failure_manual(Duration::ZERO);
        assert_eq!(cb.state(), CircuitState::Open);
        // timeout is zero, so the next state() call transitions us to half-open
        assert_eq!(cb.state(), CircuitState::HalfOpen);

        cb.record_success_manual(Duration::ZERO);
        assert_eq!(cb.state(), CircuitState::HalfOpen);

        cb.record_success_manual(Duration::ZERO);
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[test]
    fn half_open_failure_reopens_immediately() {
        let cb = CircuitBreaker::new(
            "test",
            CircuitBreakerConfig {
                failure_threshold: 1,
                timeout: Duration::from_millis(0),
                success_threshold: 2,
            },
        );
        cb.record_failure_manual(Duration::ZERO);
        assert_eq!(cb.state(), CircuitState::HalfOpen);
        cb.record_failure_manual(Duration::ZERO);
        assert_eq!(cb.state(), CircuitState::Open);
    }

    #[test]
    fn force_open_and_force_closed_override_state() {
        let cb = CircuitBreaker::new("test", CircuitBreakerConfig::default());
        cb.force_open();
        assert_eq!(cb.state(), CircuitState::Open);
        cb.force_closed();
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[test]
    fn behavior_trait_is_object_safe_and_conforms() {
        let cb = CircuitBreaker::new("test", CircuitBreakerConfig::default());
        let behavior: &dyn CircuitBreakerBehavior = &cb;
        assert_eq!(behavior.name(), "test");
        assert_eq!(behavior.state(), CircuitState::Closed);
        assert!(behavior.should_allow());
    }

    #[test]
    fn invalid_u8_state_encoding_fails_toward_open() {
        assert_eq!(CircuitState::from(0), CircuitState::Closed);
        assert_eq!(CircuitState::from(1), CircuitState::Open);
        assert_eq!(CircuitState::from(2), CircuitState::HalfOpen);
        assert_eq!(CircuitState::from(99), CircuitState::Open);
    }
}
