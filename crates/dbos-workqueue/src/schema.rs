//! Database schema management.

use rusqlite::Connection;
use tokio_rusqlite::Error;

/// Initialize the database schema.
pub fn init_schema(conn: &Connection) -> Result<(), Error> {
    conn.execute_batch(SCHEMA)?;
    Ok(())
}

const SCHEMA: &str = r#"
-- One row per workflow
CREATE TABLE IF NOT EXISTS workflow_status (
    workflow_uuid TEXT PRIMARY KEY,
    status TEXT NOT NULL,
    name TEXT NOT NULL,
    queue_name TEXT,
    inputs TEXT NOT NULL DEFAULT 'null',
    output TEXT,
    error TEXT,
    executor_id TEXT,
    app_id TEXT,
    app_version TEXT,
    created_at_ms INTEGER NOT NULL,
    started_at_ms INTEGER,
    updated_at_ms INTEGER NOT NULL
);

-- Admission: FIFO scan and PENDING count per queue
CREATE INDEX IF NOT EXISTS idx_workflow_status_queue
    ON workflow_status(queue_name, status, created_at_ms);

-- Rate limiting: starts per queue inside the window
CREATE INDEX IF NOT EXISTS idx_workflow_status_started
    ON workflow_status(queue_name, started_at_ms);

-- Recovery: PENDING workflows by owner
CREATE INDEX IF NOT EXISTS idx_workflow_status_executor
    ON workflow_status(status, executor_id);
"#;
