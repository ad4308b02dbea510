//! SQLite workflow store.
//!
//! Admission runs in a `BEGIN IMMEDIATE` transaction, which takes the
//! database write lock before the first read. Every executor sharing the
//! database file is serialized on that lock, and each promotion is a
//! conditional `UPDATE ... WHERE status = 'ENQUEUED'` counted only when a row
//! actually changed.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::types::Type;
use rusqlite::{params, params_from_iter, OptionalExtension, Row, TransactionBehavior};
use tokio_rusqlite::Connection;
use tracing::debug;

use crate::admission::{admission_budget, rate_window_start};
use crate::error::QueueError;
use crate::queue::Queue;
use crate::schema::init_schema;
use crate::store::{outcome_status, WorkflowStore};
use crate::workflow::{WorkflowOutcome, WorkflowRecord, WorkflowStatus};

#[cfg(test)]
#[path = "sqlite_tests.rs"]
mod tests;

const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const SELECT_COLUMNS: &str = "workflow_uuid, status, name, queue_name, inputs, output, error, \
     executor_id, app_id, app_version, created_at_ms, started_at_ms, updated_at_ms";

/// SQLite-based workflow store.
pub struct SqliteWorkflowStore {
    conn: Connection,
}

impl SqliteWorkflowStore {
    /// Create a new in-memory database.
    pub async fn in_memory() -> Result<Self, QueueError> {
        let conn = Connection::open_in_memory().await?;
        Self::init(conn, DEFAULT_BUSY_TIMEOUT).await
    }

    /// Open (or create) a file-backed database.
    ///
    /// Several stores, in this or other processes, may open the same file.
    /// `busy_timeout` bounds how long a writer waits for the lock.
    pub async fn open(path: impl AsRef<Path>, busy_timeout: Duration) -> Result<Self, QueueError> {
        let path = path.as_ref().to_path_buf();
        debug!("Opening workflow store at {:?}", path);
        let conn = Connection::open(path).await?;
        Self::init(conn, busy_timeout).await
    }

    async fn init(conn: Connection, busy_timeout: Duration) -> Result<Self, QueueError> {
        conn.call(move |conn| {
            conn.busy_timeout(busy_timeout)?;
            init_schema(conn)
        })
        .await?;
        Ok(Self { conn })
    }
}

fn conversion_error(
    index: usize,
    err: impl Into<Box<dyn std::error::Error + Send + Sync>>,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(index, Type::Text, err.into())
}

fn map_row(row: &Row<'_>) -> rusqlite::Result<WorkflowRecord> {
    let status: String = row.get(1)?;
    let inputs: String = row.get(4)?;
    let output: Option<String> = row.get(5)?;

    Ok(WorkflowRecord {
        workflow_uuid: row.get(0)?,
        status: status.parse().map_err(|e: String| conversion_error(1, e))?,
        name: row.get(2)?,
        queue_name: row.get(3)?,
        inputs: serde_json::from_str(&inputs).map_err(|e| conversion_error(4, e))?,
        output: output
            .map(|text| serde_json::from_str(&text))
            .transpose()
            .map_err(|e| conversion_error(5, e))?,
        error: row.get(6)?,
        executor_id: row.get(7)?,
        app_id: row.get(8)?,
        app_version: row.get(9)?,
        created_at_ms: row.get(10)?,
        started_at_ms: row.get(11)?,
        updated_at_ms: row.get(12)?,
    })
}

fn other(err: QueueError) -> tokio_rusqlite::Error {
    tokio_rusqlite::Error::Other(Box::new(err))
}

#[async_trait]
impl WorkflowStore for SqliteWorkflowStore {
    async fn insert_workflow(&self, record: &WorkflowRecord) -> Result<bool, QueueError> {
        let record = record.clone();
        let inputs = record.inputs.to_string();
        let output = record.output.as_ref().map(|v| v.to_string());

        let changed = self
            .conn
            .call(move |conn| {
                let changed = conn.execute(
                    "INSERT OR IGNORE INTO workflow_status
                     (workflow_uuid, status, name, queue_name, inputs, output, error,
                      executor_id, app_id, app_version, created_at_ms, started_at_ms, updated_at_ms)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
                    params![
                        record.workflow_uuid,
                        record.status.as_str(),
                        record.name,
                        record.queue_name,
                        inputs,
                        output,
                        record.error,
                        record.executor_id,
                        record.app_id,
                        record.app_version,
                        record.created_at_ms,
                        record.started_at_ms,
                        record.updated_at_ms,
                    ],
                )?;
                Ok(changed)
            })
            .await?;

        Ok(changed == 1)
    }

    async fn get_workflow(&self, id: &str) -> Result<Option<WorkflowRecord>, QueueError> {
        let id = id.to_string();
        let record = self
            .conn
            .call(move |conn| {
                let sql = format!(
                    "SELECT {} FROM workflow_status WHERE workflow_uuid = ?1",
                    SELECT_COLUMNS
                );
                let record = conn.query_row(&sql, [&id], map_row).optional()?;
                Ok(record)
            })
            .await?;
        Ok(record)
    }

    async fn start_queued_workflows(
        &self,
        queue: &Queue,
        executor_id: &str,
        now_ms: i64,
    ) -> Result<Vec<String>, QueueError> {
        let queue = queue.clone();
        let executor_id = executor_id.to_string();

        let started = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

                let pending: i64 = tx.query_row(
                    "SELECT COUNT(*) FROM workflow_status
                     WHERE queue_name = ?1 AND status = 'PENDING'",
                    params![queue.name()],
                    |row| row.get(0),
                )?;
                let recent_starts: i64 = match rate_window_start(&queue, now_ms) {
                    Some(window_start) => tx.query_row(
                        "SELECT COUNT(*) FROM workflow_status
                         WHERE queue_name = ?1 AND started_at_ms > ?2",
                        params![queue.name(), window_start],
                        |row| row.get(0),
                    )?,
                    None => 0,
                };

                let budget = admission_budget(&queue, pending as usize, recent_starts as usize);
                if budget == Some(0) {
                    return Ok(Vec::new());
                }
                // LIMIT -1 is unbounded in SQLite
                let limit = budget.map_or(-1, |b| b as i64);

                let candidates = {
                    let mut stmt = tx.prepare(
                        "SELECT workflow_uuid FROM workflow_status
                         WHERE queue_name = ?1 AND status = 'ENQUEUED'
                         ORDER BY created_at_ms ASC, workflow_uuid ASC
                         LIMIT ?2",
                    )?;
                    let rows = stmt.query_map(params![queue.name(), limit], |row| row.get(0))?;
                    rows.collect::<Result<Vec<String>, _>>()?
                };

                let mut started = Vec::with_capacity(candidates.len());
                for id in candidates {
                    let changed = tx.execute(
                        "UPDATE workflow_status
                         SET status = 'PENDING', executor_id = ?2,
                             started_at_ms = ?3, updated_at_ms = ?3
                         WHERE workflow_uuid = ?1 AND status = 'ENQUEUED'",
                        params![id, executor_id, now_ms],
                    )?;
                    if changed == 1 {
                        started.push(id);
                    }
                }

                tx.commit()?;
                Ok(started)
            })
            .await?;

        Ok(started)
    }

    async fn claim_workflow(&self, id: &str, executor_id: &str) -> Result<bool, QueueError> {
        let id = id.to_string();
        let executor_id = executor_id.to_string();
        let now = Utc::now().timestamp_millis();

        let claimed = self
            .conn
            .call(move |conn| {
                let changed = conn.execute(
                    "UPDATE workflow_status SET executor_id = ?2, updated_at_ms = ?3
                     WHERE workflow_uuid = ?1 AND status = 'PENDING'",
                    params![id, executor_id, now],
                )?;
                if changed == 1 {
                    return Ok(true);
                }

                let exists = conn
                    .prepare("SELECT 1 FROM workflow_status WHERE workflow_uuid = ?1")?
                    .exists([&id])?;
                if !exists {
                    return Err(other(QueueError::WorkflowNotFound(id)));
                }
                Ok(false)
            })
            .await?;

        Ok(claimed)
    }

    async fn record_outcome(&self, id: &str, outcome: WorkflowOutcome) -> Result<(), QueueError> {
        let id = id.to_string();
        let next = outcome_status(&outcome);
        let (output, error) = match outcome {
            Ok(value) => (Some(value.to_string()), None),
            Err(message) => (None, Some(message)),
        };
        let now = Utc::now().timestamp_millis();

        self.conn
            .call(move |conn| {
                let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

                let current: Option<String> = tx
                    .query_row(
                        "SELECT status FROM workflow_status WHERE workflow_uuid = ?1",
                        [&id],
                        |row| row.get(0),
                    )
                    .optional()?;
                let current: WorkflowStatus = match current {
                    Some(status) => status.parse().map_err(|e: String| conversion_error(0, e))?,
                    None => return Err(other(QueueError::WorkflowNotFound(id))),
                };
                if !current.can_transition_to(next) {
                    return Err(other(QueueError::InvalidTransition {
                        id,
                        from: current,
                        to: next,
                    }));
                }

                tx.execute(
                    "UPDATE workflow_status
                     SET status = ?2, output = ?3, error = ?4, updated_at_ms = ?5
                     WHERE workflow_uuid = ?1",
                    params![id, next.as_str(), output, error, now],
                )?;
                tx.commit()?;
                Ok(())
            })
            .await?;

        Ok(())
    }

    async fn find_pending_workflows(
        &self,
        executor_ids: &[String],
    ) -> Result<Vec<String>, QueueError> {
        if executor_ids.is_empty() {
            return Ok(Vec::new());
        }
        let executor_ids = executor_ids.to_vec();

        let ids = self
            .conn
            .call(move |conn| {
                let placeholders = vec!["?"; executor_ids.len()].join(", ");
                let sql = format!(
                    "SELECT workflow_uuid FROM workflow_status
                     WHERE status = 'PENDING' AND executor_id IN ({})
                     ORDER BY created_at_ms ASC, workflow_uuid ASC",
                    placeholders
                );
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt.query_map(params_from_iter(executor_ids.iter()), |row| row.get(0))?;
                let ids = rows.collect::<Result<Vec<String>, _>>()?;
                Ok(ids)
            })
            .await?;

        Ok(ids)
    }

    async fn count_by_status(
        &self,
        queue_name: &str,
        status: WorkflowStatus,
    ) -> Result<usize, QueueError> {
        let queue_name = queue_name.to_string();
        let count: i64 = self
            .conn
            .call(move |conn| {
                let count = conn.query_row(
                    "SELECT COUNT(*) FROM workflow_status WHERE queue_name = ?1 AND status = ?2",
                    params![queue_name, status.as_str()],
                    |row| row.get(0),
                )?;
                Ok(count)
            })
            .await?;
        Ok(count as usize)
    }
}
