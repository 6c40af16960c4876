use rdkafka::config::ClientConfig;
use std::time::Duration;

// ============================================================================
// Kafka Connection Settings
// ============================================================================
//
// Built once in main and handed to the publisher and to every queue, so
// every client talks to the same cluster with the same base settings.
//
// ============================================================================

#[derive(Clone, Debug)]
pub struct KafkaConnection {
    brokers: String,
}

impl KafkaConnection {
    pub fn new(brokers: impl Into<String>) -> Self {
        Self {
            brokers: brokers.into(),
        }
    }

    pub fn brokers(&self) -> &str {
        &self.brokers
    }

    fn base_config(&self) -> ClientConfig {
        let mut config = ClientConfig::new();
        config.set("bootstrap.servers", &self.brokers);
        config
    }

    /// Producer settings. `publish_timeout` bounds how long a record may wait
    /// in the client before its delivery is reported as failed.
    pub fn producer_config(&self, publish_timeout: Duration) -> ClientConfig {
        let mut config = self.base_config();
        config
            .set("message.timeout.ms", publish_timeout.as_millis().to_string())
            .set("acks", "all");
        config
    }

    /// Consumer settings with manual acknowledgment: offsets are only ever
    /// committed explicitly after a message has been handled.
    pub fn consumer_config(&self, group_id: &str) -> ClientConfig {
        let mut config = self.base_config();
        config
            .set("group.id", group_id)
            .set("enable.auto.commit", "false")
            .set("auto.offset.reset", "earliest")
            .set("session.timeout.ms", "6000")
            .set("enable.partition.eof", "false");
        config
    }
}
