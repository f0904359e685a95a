//! Idempotent schema creation for the SQLite database.
//!
//! Two tables and their indexes; a batch of CREATE IF NOT EXISTS
//! statements replaces a full migration framework.

use diesel_async::SimpleAsyncConnection;

use super::pool::{AsyncSqlitePool, DieselError};

/// Schema DDL. The UNIQUE index on (fault_code, fault_name) is what the
/// get-or-create retry path relies on: concurrent creators of the same name
/// collide here instead of producing duplicate rows. SQLite treats NULLs as
/// distinct in unique indexes, so the code column goes through COALESCE to
/// make code-less names collide too.
const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS fault_references (
    fault_id INTEGER PRIMARY KEY AUTOINCREMENT,
    fault_code TEXT,
    fault_name TEXT NOT NULL
);
CREATE UNIQUE INDEX IF NOT EXISTS idx_fault_code_name
    ON fault_references (COALESCE(fault_code, ''), fault_name);
CREATE TABLE IF NOT EXISTS maintenance_records (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    event_date TEXT NOT NULL,
    event_time TEXT NOT NULL,
    act INTEGER NOT NULL,
    fault_name TEXT NOT NULL,
    crane_id INTEGER NOT NULL,
    fault_id INTEGER NOT NULL REFERENCES fault_references (fault_id)
);
CREATE INDEX IF NOT EXISTS idx_records_date ON maintenance_records (event_date);
CREATE INDEX IF NOT EXISTS idx_records_crane_fault
    ON maintenance_records (crane_id, fault_id);
"#;

/// Create the schema if it does not exist yet.
pub async fn run(pool: &AsyncSqlitePool) -> Result<(), DieselError> {
    let mut conn = pool.get().await?;
    conn.batch_execute(SCHEMA_SQL).await?;
    Ok(())
}
