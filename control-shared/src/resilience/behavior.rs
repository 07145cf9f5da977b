use std::fmt::Debug;
use std::time::Duration;

use super::circuit_breaker::CircuitState;
use super::metrics::CircuitBreakerMetrics;

/// Object-safe behavior every circuit breaker implementation exposes.
///
/// Kept as a trait (rather than exposing `CircuitBreaker` directly
/// everywhere) so call sites can be written against `&dyn
/// CircuitBreakerBehavior` and swapped for test doubles.
pub trait CircuitBreakerBehavior: Send + Sync + Debug {
    fn name(&self) -> &str;
    fn state(&self) -> CircuitState;
    fn should_allow(&self) -> bool;
    fn record_success(&self, duration: Duration);
    fn record_failure(&self, duration: Duration);
    fn is_healthy(&self) -> bool;
    fn force_open(&self);
    fn force_closed(&self);
    fn metrics(&self) -> CircuitBreakerMetrics;
}

#[allow(dead_code)]
fn _assert_object_safe(_: &dyn CircuitBreakerBehavior) {}
