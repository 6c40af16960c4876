// Private module declaration
mod server;

use prometheus::{
    HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry,
};

// Re-export for public API
pub use server::{start_ops_server, OpsState};

// ============================================================================
// Metrics Module - Prometheus metrics for observability
// ============================================================================
//
// Provides metrics for:
// - Queue consumption (received, acked, requeued, dead-lettered, latency)
// - Outbound notifications
// - Repository operations
// - Publisher circuit breaker state transitions
//
// All metrics are registered with Prometheus and can be scraped via /metrics
// ============================================================================

pub struct Metrics {
    registry: Registry,

    // Consumer Metrics
    pub messages_received: IntCounterVec,
    pub messages_acked: IntCounterVec,
    pub messages_requeued: IntCounterVec,
    pub messages_dead_lettered: IntCounterVec,
    pub message_processing_duration: HistogramVec,

    // Notification Metrics
    pub notifications_published: IntCounterVec,

    // Repository Metrics
    pub repository_operations: IntCounterVec,

    // Circuit Breaker Metrics
    pub circuit_breaker_state: IntGauge,
    pub circuit_breaker_transitions: IntCounterVec,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let messages_received = IntCounterVec::new(
            Opts::new("queue_messages_received_total", "Messages received from a queue"),
            &["queue"],
        )?;
        registry.register(Box::new(messages_received.clone()))?;

        let messages_acked = IntCounterVec::new(
            Opts::new("queue_messages_acked_total", "Messages acknowledged after successful processing"),
            &["queue"],
        )?;
        registry.register(Box::new(messages_acked.clone()))?;

        let messages_requeued = IntCounterVec::new(
            Opts::new("queue_messages_requeued_total", "Messages negatively acknowledged and requeued"),
            &["queue"],
        )?;
        registry.register(Box::new(messages_requeued.clone()))?;

        let messages_dead_lettered = IntCounterVec::new(
            Opts::new("queue_messages_dead_lettered_total", "Messages moved to the dead letter store"),
            &["queue"],
        )?;
        registry.register(Box::new(messages_dead_lettered.clone()))?;

        let message_processing_duration = HistogramVec::new(
            HistogramOpts::new("queue_message_processing_duration_seconds", "Handler duration per message")
                .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
            &["queue"],
        )?;
        registry.register(Box::new(message_processing_duration.clone()))?;

        let notifications_published = IntCounterVec::new(
            Opts::new("order_notifications_total", "Order status notifications by outcome"),
            &["status", "outcome"],
        )?;
        registry.register(Box::new(notifications_published.clone()))?;

        let repository_operations = IntCounterVec::new(
            Opts::new("order_repository_operations_total", "Repository round trips by outcome"),
            &["operation", "outcome"],
        )?;
        registry.register(Box::new(repository_operations.clone()))?;

        let circuit_breaker_state = IntGauge::new(
            "circuit_breaker_state",
            "Circuit breaker state (0=Closed, 1=Open, 2=HalfOpen)",
        )?;
        registry.register(Box::new(circuit_breaker_state.clone()))?;

        let circuit_breaker_transitions = IntCounterVec::new(
            Opts::new("circuit_breaker_transitions_total", "Circuit breaker state transitions"),
            &["from_state", "to_state"],
        )?;
        registry.register(Box::new(circuit_breaker_transitions.clone()))?;

        Ok(Self {
            registry,
            messages_received,
            messages_acked,
            messages_requeued,
            messages_dead_lettered,
            message_processing_duration,
            notifications_published,
            repository_operations,
            circuit_breaker_state,
            circuit_breaker_transitions,
        })
    }

    /// Get the Prometheus registry for exposing metrics via HTTP
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn record_received(&self, queue: &str) {
        self.messages_received.with_label_values(&[queue]).inc();
    }

    pub fn record_acked(&self, queue: &str, duration_secs: f64) {
        self.messages_acked.with_label_values(&[queue]).inc();
        self.message_processing_duration.with_label_values(&[queue]).observe(duration_secs);
    }

    pub fn record_requeued(&self, queue: &str, duration_secs: f64) {
        self.messages_requeued.with_label_values(&[queue]).inc();
        self.message_processing_duration.with_label_values(&[queue]).observe(duration_secs);
    }

    pub fn record_dead_lettered(&self, queue: &str) {
        self.messages_dead_lettered.with_label_values(&[queue]).inc();
    }

    pub fn record_notification(&self, status: &str, success: bool) {
        let outcome = if success { "published" } else { "failed" };
        self.notifications_published.with_label_values(&[status, outcome]).inc();
    }

    pub fn record_repository_operation(&self, operation: &str, success: bool) {
        let outcome = if success { "ok" } else { "error" };
        self.repository_operations.with_label_values(&[operation, outcome]).inc();
    }

    pub fn update_circuit_breaker_state(&self, state: u8) {
        self.circuit_breaker_state.set(state as i64);
    }

    pub fn record_circuit_breaker_transition(&self, from_state: &str, to_state: &str) {
        self.circuit_breaker_transitions.with_label_values(&[from_state, to_state]).inc();
    }
}
