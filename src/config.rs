use anyhow::Context;
use std::str::FromStr;
use std::time::Duration;

// ============================================================================
// Configuration - loaded from environment variables with defaults
// ============================================================================

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub scylla: ScyllaConfig,
    pub kafka: KafkaConfig,
    pub metrics_port: u16,
}

#[derive(Debug, Clone)]
pub struct ScyllaConfig {
    pub nodes: Vec<String>,
    pub keyspace: String,
    pub order_table: String,
    pub dead_letter_table: String,
}

#[derive(Debug, Clone)]
pub struct KafkaConfig {
    pub brokers: String,
    pub consumer_group: String,
    pub order_paid_queue: String,
    /// No status consumer runs when unset.
    pub order_status_queue: Option<String>,
    /// Exchange topic the publisher is bound to.
    pub order_events_topic: String,
    /// Routing key for status notifications.
    pub order_ready_destination: String,
    pub publish_timeout: Duration,
    /// `0` disables dead-lettering.
    pub max_deliveries: u32,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let text = |key: &str, default: &str| -> String {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        let nodes = text("SCYLLA_NODES", "127.0.0.1:9042")
            .split(',')
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string)
            .collect();

        let order_status_queue = lookup("ORDER_STATUS_QUEUE")
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());

        Ok(Self {
            scylla: ScyllaConfig {
                nodes,
                keyspace: text("SCYLLA_KEYSPACE", "production_ks"),
                order_table: text("ORDER_TABLE", "production_orders"),
                dead_letter_table: text("DEAD_LETTER_TABLE", "dead_letters_by_queue"),
            },
            kafka: KafkaConfig {
                brokers: text("KAFKA_BROKERS", "127.0.0.1:9092"),
                consumer_group: text("CONSUMER_GROUP", "production-service"),
                order_paid_queue: text("ORDER_PAID_QUEUE", "orders.paid"),
                order_status_queue,
                order_events_topic: text("ORDER_EVENTS_TOPIC", "order-events"),
                order_ready_destination: text("ORDER_READY_DESTINATION", "order.ready"),
                publish_timeout: Duration::from_millis(parse(&lookup, "PUBLISH_TIMEOUT_MS", 5000)?),
                max_deliveries: parse(&lookup, "MAX_DELIVERIES", 10)?,
            },
            metrics_port: parse(&lookup, "METRICS_PORT", 9090)?,
        })
    }
}

fn parse<F, T>(lookup: &F, key: &str, default: T) -> anyhow::Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) {
        Some(value) => value
            .parse()
            .with_context(|| format!("Invalid value for {}: {:?}", key, value)),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> anyhow::Result<AppConfig> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[]).unwrap();

        assert_eq!(config.scylla.nodes, vec!["127.0.0.1:9042"]);
        assert_eq!(config.scylla.keyspace, "production_ks");
        assert_eq!(config.scylla.order_table, "production_orders");
        assert_eq!(config.scylla.dead_letter_table, "dead_letters_by_queue");
        assert_eq!(config.kafka.consumer_group, "production-service");
        assert_eq!(config.kafka.order_paid_queue, "orders.paid");
        assert_eq!(config.kafka.order_status_queue, None);
        assert_eq!(config.kafka.order_events_topic, "order-events");
        assert_eq!(config.kafka.order_ready_destination, "order.ready");
        assert_eq!(config.kafka.publish_timeout, Duration::from_millis(5000));
        assert_eq!(config.kafka.max_deliveries, 10);
        assert_eq!(config.metrics_port, 9090);
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("SCYLLA_NODES", "scylla-1:9042, scylla-2:9042,"),
            ("ORDER_STATUS_QUEUE", "orders.status"),
            ("MAX_DELIVERIES", "0"),
            ("PUBLISH_TIMEOUT_MS", "250"),
        ])
        .unwrap();

        assert_eq!(config.scylla.nodes, vec!["scylla-1:9042", "scylla-2:9042"]);
        assert_eq!(config.kafka.order_status_queue.as_deref(), Some("orders.status"));
        assert_eq!(config.kafka.max_deliveries, 0);
        assert_eq!(config.kafka.publish_timeout, Duration::from_millis(250));
    }

    #[test]
    fn test_blank_values_fall_back_to_defaults() {
        let config = load(&[("ORDER_PAID_QUEUE", "  "), ("ORDER_STATUS_QUEUE", "")]).unwrap();

        assert_eq!(config.kafka.order_paid_queue, "orders.paid");
        assert!(config.kafka.order_status_queue.is_none());
    }

    #[test]
    fn test_invalid_number_names_the_variable() {
        let err = load(&[("METRICS_PORT", "ninety")]).unwrap_err();
        assert!(err.to_string().contains("METRICS_PORT"));

        let err = load(&[("MAX_DELIVERIES", "-1")]).unwrap_err();
        assert!(err.to_string().contains("MAX_DELIVERIES"));
    }
}
