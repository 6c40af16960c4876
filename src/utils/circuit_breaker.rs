use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use crate::metrics::Metrics;

// ============================================================================
// Circuit Breaker
// ============================================================================
//
// Fails fast while a downstream dependency keeps erroring.
//
// States:
// - Closed: calls pass through; consecutive failures are counted
// - Open: calls are rejected until the cool-down elapses
// - HalfOpen: calls pass through; enough successes close the circuit,
//   any failure reopens it
//
// `check` only admits a call. Its outcome may arrive much later (a delivery
// report) and is reported through `record_success` / `record_failure`.
//
// Every transition is logged and exported through the metrics registry.
//
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "Closed",
            CircuitState::Open => "Open",
            CircuitState::HalfOpen => "HalfOpen",
        }
    }

    /// Gauge encoding: 0=Closed, 1=Open, 2=HalfOpen
    pub fn as_gauge(&self) -> u8 {
        match self {
            CircuitState::Closed => 0,
            CircuitState::Open => 1,
            CircuitState::HalfOpen => 2,
        }
    }
}

#[derive(Clone, Debug)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before opening
    pub failure_threshold: u32,
    /// Cool-down before a half-open probe is allowed
    pub timeout: Duration,
    /// Half-open successes needed to close again
    pub success_threshold: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            timeout: Duration::from_secs(30),
            success_threshold: 3,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CircuitBreakerError {
    #[error("Circuit breaker '{0}' is open")]
    CircuitOpen(String),
}

struct BreakerState {
    state: CircuitState,
    failure_count: u32,
    success_count: u32,
    opened_at: Option<Instant>,
}

#[derive(Clone)]
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    inner: Arc<Mutex<BreakerState>>,
    metrics: Option<Arc<Metrics>>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            inner: Arc::new(Mutex::new(BreakerState {
                state: CircuitState::Closed,
                failure_count: 0,
                success_count: 0,
                opened_at: None,
            })),
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        metrics.update_circuit_breaker_state(CircuitState::Closed.as_gauge());
        self.metrics = Some(metrics);
        self
    }

    /// Rejects while open; after the cool-down, admits and half-opens.
    pub async fn check(&self) -> Result<(), CircuitBreakerError> {
        let mut inner = self.inner.lock().await;
        if inner.state == CircuitState::Open {
            let cooled_down = inner
                .opened_at
                .map(|opened| opened.elapsed() >= self.config.timeout)
                .unwrap_or(true);

            if !cooled_down {
                return Err(CircuitBreakerError::CircuitOpen(self.name.clone()));
            }
            self.transition(&mut inner, CircuitState::HalfOpen);
        }
        Ok(())
    }

    pub async fn state(&self) -> CircuitState {
        self.inner.lock().await.state
    }

    pub async fn record_success(&self) {
        let mut inner = self.inner.lock().await;
        match inner.state {
            CircuitState::HalfOpen => {
                inner.success_count += 1;
                if inner.success_count >= self.config.success_threshold {
                    self.transition(&mut inner, CircuitState::Closed);
                }
            }
            CircuitState::Closed => inner.failure_count = 0,
            CircuitState::Open => {}
        }
    }

    pub async fn record_failure(&self) {
        let mut inner = self.inner.lock().await;
        inner.failure_count += 1;

        match inner.state {
            CircuitState::Closed if inner.failure_count >= self.config.failure_threshold => {
                self.transition(&mut inner, CircuitState::Open);
            }
            CircuitState::HalfOpen => self.transition(&mut inner, CircuitState::Open),
            _ => {}
        }
    }

    fn transition(&self, inner: &mut BreakerState, to: CircuitState) {
        let from = inner.state;
        inner.state = to;
        inner.success_count = 0;

        match to {
            CircuitState::Open => {
                inner.opened_at = Some(Instant::now());
                tracing::warn!(
                    breaker = %self.name,
                    failures = inner.failure_count,
                    "Circuit breaker opened"
                );
            }
            CircuitState::Closed => {
                inner.failure_count = 0;
                inner.opened_at = None;
                tracing::info!(breaker = %self.name, "Circuit breaker closed");
            }
            CircuitState::HalfOpen => {
                tracing::info!(breaker = %self.name, "Circuit breaker half-open, probing");
            }
        }

        if let Some(ref metrics) = self.metrics {
            metrics.update_circuit_breaker_state(to.as_gauge());
            metrics.record_circuit_breaker_transition(from.as_str(), to.as_str());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker(failure_threshold: u32, timeout: Duration, success_threshold: u32) -> CircuitBreaker {
        CircuitBreaker::new(
            "test",
            CircuitBreakerConfig {
                failure_threshold,
                timeout,
                success_threshold,
            },
        )
    }

    #[tokio::test]
    async fn test_opens_after_consecutive_failures() {
        let cb = breaker(3, Duration::from_secs(60), 1);

        for _ in 0..3 {
            cb.check().await.unwrap();
            cb.record_failure().await;
        }
        assert_eq!(cb.state().await, CircuitState::Open);

        let result = cb.check().await;
        assert!(matches!(result, Err(CircuitBreakerError::CircuitOpen(ref name)) if name == "test"));
    }

    #[tokio::test]
    async fn test_success_resets_failure_count() {
        let cb = breaker(2, Duration::from_secs(60), 1);

        cb.record_failure().await;
        cb.record_success().await;
        cb.record_failure().await;

        assert_eq!(cb.state().await, CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_admission_does_not_reset_reported_failures() {
        let cb = breaker(2, Duration::from_secs(60), 1);

        for _ in 0..10 {
            cb.check().await.unwrap();
        }
        cb.record_failure().await;

        for _ in 0..10 {
            cb.check().await.unwrap();
        }
        cb.record_failure().await;

        assert_eq!(cb.state().await, CircuitState::Open);
        assert!(matches!(cb.check().await, Err(CircuitBreakerError::CircuitOpen(_))));
    }

    #[tokio::test]
    async fn test_half_open_then_closed_after_timeout() {
        let cb = breaker(1, Duration::from_millis(50), 2);

        cb.record_failure().await;
        assert_eq!(cb.state().await, CircuitState::Open);

        tokio::time::sleep(Duration::from_millis(80)).await;

        for _ in 0..5 {
            cb.check().await.unwrap();
        }
        assert_eq!(cb.state().await, CircuitState::HalfOpen);

        cb.record_success().await;
        assert_eq!(cb.state().await, CircuitState::HalfOpen);
        cb.record_success().await;
        assert_eq!(cb.state().await, CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_failure_while_half_open_reopens() {
        let cb = breaker(1, Duration::from_millis(30), 2);

        cb.record_failure().await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        cb.check().await.unwrap();
        cb.record_failure().await;

        assert_eq!(cb.state().await, CircuitState::Open);
        assert!(cb.check().await.is_err());
    }

    #[tokio::test]
    async fn test_transitions_are_exported() {
        let metrics = Arc::new(Metrics::new().unwrap());
        let cb = breaker(1, Duration::from_secs(60), 1).with_metrics(metrics.clone());

        cb.record_failure().await;

        let gathered = metrics.registry().gather();
        let state = gathered
            .iter()
            .find(|m| m.name() == "circuit_breaker_state")
            .unwrap();
        assert_eq!(state.metric[0].gauge.value, Some(1.0));
    }
}
