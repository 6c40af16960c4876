use kameo::prelude::*;
use scylla::client::session::Session;
use scylla::client::session_builder::SessionBuilder;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod actors;
mod config;
mod domain;
mod messaging;
mod metrics;
mod store;
mod usecases;
mod utils;

use actors::{HealthMonitorActor, HealthProbe};
use config::AppConfig;
use messaging::{
    BrokerOrderNotifier, KafkaConnection, KafkaPublisher, KafkaQueue, Publisher, QueueConsumer,
    RedeliveryPolicy,
};
use store::{DeadLetterSink, ScyllaDeadLetterStore, ScyllaOrderRepository};
use usecases::{OrderPaidHandler, OrderStatusHandler, OrderUseCase};

const HEALTH_PROBE_INTERVAL: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize structured logging with environment-based filtering
    // Default to INFO level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,production_orders=debug"))
        )
        .init();

    tracing::info!("🚀 Starting production order service");

    let config = AppConfig::from_env()?;
    tracing::debug!(?config, "Loaded configuration");

    // === 1. Create ScyllaDB Session ===
    tracing::info!(nodes = ?config.scylla.nodes, "Connecting to ScyllaDB...");
    let session: Session = SessionBuilder::new()
        .known_nodes(&config.scylla.nodes)
        .build()
        .await?;

    session
        .query_unpaged(
            format!(
                "CREATE KEYSPACE IF NOT EXISTS {} WITH REPLICATION = \
                 {{'class': 'SimpleStrategy', 'replication_factor': 1}}",
                config.scylla.keyspace
            ),
            &[],
        )
        .await?;

    session.use_keyspace(&config.scylla.keyspace, false).await?;

    let session = Arc::new(session);

    // === 2. Initialize Prometheus metrics ===
    let metrics = Arc::new(metrics::Metrics::new()?);
    tracing::info!("📊 Metrics registry created with {} metrics", metrics.registry().gather().len());

    // === 3. Stores ===
    let repository = ScyllaOrderRepository::new(session.clone(), &config.scylla.order_table)
        .with_metrics(metrics.clone());
    repository.ensure_schema().await?;

    let dead_letter_queues = std::iter::once(config.kafka.order_paid_queue.clone())
        .chain(config.kafka.order_status_queue.clone())
        .collect();
    let dead_letters = ScyllaDeadLetterStore::new(
        session.clone(),
        &config.scylla.dead_letter_table,
        dead_letter_queues,
    );
    dead_letters.ensure_schema().await?;
    let dead_letters: Arc<dyn DeadLetterSink> = Arc::new(dead_letters);

    // === 4. Broker publisher (with circuit breaker) ===
    let connection = KafkaConnection::new(config.kafka.brokers.clone());
    let publisher = Arc::new(
        KafkaPublisher::new(
            &connection,
            &config.kafka.order_events_topic,
            config.kafka.publish_timeout,
        )?
        .with_metrics(metrics.clone()),
    );

    // === 5. Health monitor ===
    let probes: Vec<Arc<dyn HealthProbe>> = vec![publisher.clone()];
    let health = HealthMonitorActor::spawn(HealthMonitorActor::new(probes, HEALTH_PROBE_INTERVAL));

    // === 6. Use case ===
    let notifier = BrokerOrderNotifier::new(publisher.clone(), &config.kafka.order_ready_destination)
        .with_metrics(metrics.clone());
    let use_case = Arc::new(
        OrderUseCase::new(Arc::new(repository)).with_notifier(Arc::new(notifier)),
    );

    // === 7. Consumers ===
    let mut consumers = Vec::new();

    let paid_queue = KafkaQueue::new(
        &connection,
        &config.kafka.consumer_group,
        &config.kafka.order_paid_queue,
    )?;
    consumers.push(
        QueueConsumer::new(Arc::new(paid_queue), Arc::new(OrderPaidHandler::new(use_case.clone())))
            .with_redelivery_policy(RedeliveryPolicy::from_max_deliveries(
                config.kafka.max_deliveries,
                dead_letters.clone(),
            ))
            .with_metrics(metrics.clone())
            .with_health_monitor(health.clone())
            .start_consumer(),
    );

    if let Some(ref status_queue) = config.kafka.order_status_queue {
        let status_queue = KafkaQueue::new(&connection, &config.kafka.consumer_group, status_queue)?;
        consumers.push(
            QueueConsumer::new(
                Arc::new(status_queue),
                Arc::new(OrderStatusHandler::new(use_case.clone())),
            )
            .with_redelivery_policy(RedeliveryPolicy::from_max_deliveries(
                config.kafka.max_deliveries,
                dead_letters.clone(),
            ))
            .with_metrics(metrics.clone())
            .with_health_monitor(health.clone())
            .start_consumer(),
        );
    } else {
        tracing::info!("ORDER_STATUS_QUEUE not set, status consumer disabled");
    }

    // === 8. Operations server (metrics, health, dead letters) ===
    metrics::start_ops_server(
        metrics::OpsState {
            metrics: metrics.clone(),
            health: health.clone(),
            dead_letters,
        },
        config.metrics_port,
    );

    tracing::info!(consumers = consumers.len(), "✅ Service running, press Ctrl+C to stop");

    tokio::signal::ctrl_c().await?;

    // === 9. Teardown ===
    tracing::info!("🛑 Shutting down");
    for consumer in &consumers {
        consumer.abort();
    }
    if let Err(e) = publisher.close().await {
        tracing::warn!(error = %e, "Publisher flush incomplete");
    }

    tracing::info!("👋 Shutdown complete");
    Ok(())
}
