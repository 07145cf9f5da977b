use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::circuit_breaker::CircuitState;

/// Point-in-time snapshot of a circuit breaker's counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerMetrics {
    pub current_state: CircuitState,
    pub total_calls: u64,
    pub success_count: u64,
    pub failure_count: u64,
    pub consecutive_failures: u64,
    pub half_open_calls: u64,
    pub total_duration: Duration,
}

impl CircuitBreakerMetrics {
    pub fn failure_rate(&self) -> f64 {
        if self.total_calls == 0 {
            0.0
        } else {
            self.failure_count as f64 / self.total_calls as f64
        }
    }

    pub fn success_rate(&self) -> f64 {
        1.0 - self.failure_rate()
    }

    pub fn average_duration(&self) -> Duration {
        if self.total_calls == 0 {
            Duration::ZERO
        } else {
            self.total_duration / self.total_calls as u32
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.current_state == CircuitState::Closed
    }

    pub fn state_description(&self) -> &'static str {
        match self.current_state {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half-open",
        }
    }

    pub fn format_summary(&self) -> String {
        format!(
            "state={} calls={} failure_rate={:.2}%",
            self.state_description(),
            self.total_calls,
            self.failure_rate() * 100.0
        )
    }
}

impl Default for CircuitBreakerMetrics {
    fn default() -> Self {
        Self {
            current_state: CircuitState::Closed,
            total_calls: 0,
            success_count: 0,
            failure_count: 0,
            consecutive_failures: 0,
            half_open_calls: 0,
            total_duration: Duration::ZERO,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_rate_zero_calls_is_zero() {
        let m = CircuitBreakerMetrics::default();
        assert_eq!(m.failure_rate(), 0.0);
    }

    #[test]
    fn failure_rate_computed_from_counts() {
        let m = CircuitBreakerMetrics {
            total_calls: 4,
            failure_count: 1,
            ..Default::default()
        };
        assert_eq!(m.failure_rate(), 0.25);
        assert_eq!(m.success_rate(), 0.75);
    }
}
