use async_trait::async_trait;
use chrono::{DateTime, Utc};
use scylla::client::session::Session;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

// ============================================================================
// Dead Letter Store
// ============================================================================
//
// Holds messages that exhausted their redelivery budget so they stop
// looping through the queue. Provides:
// - Persistent storage of the raw payload and the last processing error
// - Queryable for manual intervention (newest first, bounded)
//
// Table layout: one partition per source queue, clustered newest first, so
// `LIMIT n` on a partition returns its n most recent letters.
//
//   PRIMARY KEY ((queue), dead_lettered_at, id)
//   CLUSTERING ORDER BY (dead_lettered_at DESC, id ASC)
//
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct DeadLetter {
    pub id: Uuid,
    pub queue: String,
    pub partition: i32,
    pub offset: i64,
    pub payload: String,
    pub error_message: String,
    pub delivery_count: i32,
    pub first_failed_at: DateTime<Utc>,
    pub dead_lettered_at: DateTime<Utc>,
}

#[async_trait]
pub trait DeadLetterSink: Send + Sync {
    async fn dead_letter(&self, letter: DeadLetter) -> anyhow::Result<()>;

    /// Newest first, at most `limit` letters across all queues.
    async fn recent(&self, limit: i32) -> anyhow::Result<Vec<DeadLetter>>;
}

type DeadLetterRow = (
    Uuid,
    String,
    i32,
    i64,
    String,
    String,
    i32,
    DateTime<Utc>,
    DateTime<Utc>,
);

pub struct ScyllaDeadLetterStore {
    session: Arc<Session>,
    table: String,
    queues: Vec<String>,
}

impl ScyllaDeadLetterStore {
    /// `queues` are the partitions `recent` reads from.
    pub fn new(session: Arc<Session>, table: &str, queues: Vec<String>) -> Self {
        Self {
            session,
            table: table.to_string(),
            queues,
        }
    }

    pub async fn ensure_schema(&self) -> anyhow::Result<()> {
        self.session
            .query_unpaged(
                format!(
                    "CREATE TABLE IF NOT EXISTS {} (
                        queue text,
                        dead_lettered_at timestamp,
                        id uuid,
                        queue_partition int,
                        queue_offset bigint,
                        payload text,
                        error_message text,
                        delivery_count int,
                        first_failed_at timestamp,
                        PRIMARY KEY ((queue), dead_lettered_at, id)
                    ) WITH CLUSTERING ORDER BY (dead_lettered_at DESC, id ASC)",
                    self.table
                ),
                &[],
            )
            .await?;

        tracing::info!(table = %self.table, "Dead letter table schema ready");
        Ok(())
    }
}

#[async_trait]
impl DeadLetterSink for ScyllaDeadLetterStore {
    async fn dead_letter(&self, letter: DeadLetter) -> anyhow::Result<()> {
        tracing::error!(
            dead_letter_id = %letter.id,
            queue = %letter.queue,
            partition = letter.partition,
            offset = letter.offset,
            delivery_count = letter.delivery_count,
            error = %letter.error_message,
            "💀 Adding message to dead letter store"
        );

        self.session
            .query_unpaged(
                format!(
                    "INSERT INTO {} (
                        id, queue, queue_partition, queue_offset, payload, error_message,
                        delivery_count, first_failed_at, dead_lettered_at
                    ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
                    self.table
                ),
                (
                    letter.id,
                    &letter.queue,
                    letter.partition,
                    letter.offset,
                    &letter.payload,
                    &letter.error_message,
                    letter.delivery_count,
                    letter.first_failed_at,
                    letter.dead_lettered_at,
                ),
            )
            .await
            .map_err(|e| anyhow::anyhow!("Failed to insert dead letter: {}", e))?;

        tracing::info!(dead_letter_id = %letter.id, "Message stored in dead letter store");
        Ok(())
    }

    async fn recent(&self, limit: i32) -> anyhow::Result<Vec<DeadLetter>> {
        let mut per_queue = Vec::with_capacity(self.queues.len());
        for queue in &self.queues {
            per_queue.push(self.recent_in_queue(queue, limit).await?);
        }
        Ok(newest_first(per_queue, limit))
    }
}

impl ScyllaDeadLetterStore {
    async fn recent_in_queue(&self, queue: &str, limit: i32) -> anyhow::Result<Vec<DeadLetter>> {
        let result = self
            .session
            .query_unpaged(
                format!(
                    "SELECT id, queue, queue_partition, queue_offset, payload, error_message,
                            delivery_count, first_failed_at, dead_lettered_at
                     FROM {}
                     WHERE queue = ?
                     LIMIT ?",
                    self.table
                ),
                (queue, limit),
            )
            .await
            .map_err(|e| anyhow::anyhow!("Failed to query dead letters: {}", e))?;

        let rows_result = result
            .into_rows_result()
            .map_err(|e| anyhow::anyhow!("Failed to parse dead letter results: {}", e))?;

        let mut letters = Vec::new();
        for row in rows_result.rows::<DeadLetterRow>()? {
            let (
                id,
                queue,
                partition,
                offset,
                payload,
                error_message,
                delivery_count,
                first_failed_at,
                dead_lettered_at,
            ) = row?;

            letters.push(DeadLetter {
                id,
                queue,
                partition,
                offset,
                payload,
                error_message,
                delivery_count,
                first_failed_at,
                dead_lettered_at,
            });
        }

        Ok(letters)
    }
}

/// Merges per-queue pages, each already newest first, into one bounded page.
fn newest_first(per_queue: Vec<Vec<DeadLetter>>, limit: i32) -> Vec<DeadLetter> {
    let mut letters: Vec<DeadLetter> = per_queue.into_iter().flatten().collect();
    letters.sort_by(|a, b| b.dead_lettered_at.cmp(&a.dead_lettered_at));
    letters.truncate(limit.max(0) as usize);
    letters
}
