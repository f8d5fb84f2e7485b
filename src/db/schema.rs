//! SQLite schema initialization for the export job store.

use rusqlite::Connection;

// ---------------------------------------------------------------------------
// DDL constants, kept as separate strings so each statement can be executed
// individually and schema tests can target one object at a time.
// ---------------------------------------------------------------------------

const CREATE_EXPORT_JOBS: &str = "\
CREATE TABLE IF NOT EXISTS export_jobs (
  job_id TEXT PRIMARY KEY,
  building_id TEXT NOT NULL,
  format TEXT NOT NULL,
  quality TEXT NOT NULL,
  options_json TEXT NOT NULL DEFAULT '{}',
  status TEXT NOT NULL DEFAULT 'pending',
  created_at TEXT NOT NULL,
  started_at TEXT,
  completed_at TEXT,
  file_path TEXT,
  file_size INTEGER,
  error_message TEXT,
  validation_results_json TEXT,
  optimization_metrics_json TEXT,
  analytics_json TEXT,
  metadata_json TEXT NOT NULL DEFAULT '{}'
)";

const CREATE_EXPORT_BATCHES: &str = "\
CREATE TABLE IF NOT EXISTS export_batches (
  batch_id TEXT PRIMARY KEY,
  priority INTEGER NOT NULL DEFAULT 1,
  created_at TEXT NOT NULL,
  completed_at TEXT,
  status TEXT NOT NULL DEFAULT 'pending',
  metadata_json TEXT NOT NULL DEFAULT '{}'
)";

// Append-only history of analytics snapshots.
const CREATE_EXPORT_ANALYTICS: &str = "\
CREATE TABLE IF NOT EXISTS export_analytics (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  recorded_at TEXT NOT NULL,
  snapshot_json TEXT NOT NULL
)";

const CREATE_INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_jobs_building ON export_jobs(building_id)",
    "CREATE INDEX IF NOT EXISTS idx_jobs_status ON export_jobs(status)",
    "CREATE INDEX IF NOT EXISTS idx_jobs_created ON export_jobs(created_at)",
    "CREATE INDEX IF NOT EXISTS idx_batches_status ON export_batches(status)",
];

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Open (or create) the SQLite database at `db_path` and apply the job
/// store schema.
///
/// The returned connection has WAL mode and synchronous NORMAL already
/// configured. `:memory:` is accepted for tests and ephemeral engines.
///
/// # Errors
///
/// Returns a `rusqlite::Error` if the database cannot be opened or any DDL
/// statement fails.
pub fn initialize_database(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;

    // -- Pragmas ----------------------------------------------------------
    // WAL is a no-op for :memory: databases; harmless either way.
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;

    // -- Tables -----------------------------------------------------------
    conn.execute_batch(CREATE_EXPORT_JOBS)?;
    conn.execute_batch(CREATE_EXPORT_BATCHES)?;
    conn.execute_batch(CREATE_EXPORT_ANALYTICS)?;

    // -- Indexes ----------------------------------------------------------
    for ddl in CREATE_INDEXES {
        conn.execute_batch(ddl)?;
    }

    Ok(conn)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    /// Helper: initialize an in-memory database and return the connection.
    fn setup() -> Connection {
        initialize_database(":memory:").expect("schema creation should succeed on :memory:")
    }

    /// Helper: query sqlite_master for a given type and name.
    fn object_exists(conn: &Connection, obj_type: &str, obj_name: &str) -> bool {
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = ?1 AND name = ?2",
                rusqlite::params![obj_type, obj_name],
                |row| row.get(0),
            )
            .unwrap();
        count > 0
    }

    #[test]
    fn schema_creation_succeeds() {
        let _conn = setup();
        // If we get here without panicking, the schema was applied.
    }

    #[test]
    fn tables_exist() {
        let conn = setup();
        for table in &["export_jobs", "export_batches", "export_analytics"] {
            assert!(
                object_exists(&conn, "table", table),
                "table '{table}' should exist"
            );
        }
    }

    #[test]
    fn indexes_exist() {
        let conn = setup();
        for idx in &[
            "idx_jobs_building",
            "idx_jobs_status",
            "idx_jobs_created",
            "idx_batches_status",
        ] {
            assert!(
                object_exists(&conn, "index", idx),
                "index '{idx}' should exist"
            );
        }
    }

    #[test]
    fn schema_is_idempotent() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("jobs.db");
        let path = path.to_str().unwrap();
        initialize_database(path).unwrap();
        initialize_database(path).unwrap();
    }

    #[test]
    fn job_insert_defaults_apply() {
        let conn = setup();
        conn.execute(
            "INSERT INTO export_jobs (job_id, building_id, format, quality, created_at)
             VALUES ('j1', 'B1', 'csv', 'draft', '2026-01-01T00:00:00Z')",
            [],
        )
        .unwrap();
        let status: String = conn
            .query_row("SELECT status FROM export_jobs WHERE job_id = 'j1'", [], |r| {
                r.get(0)
            })
            .unwrap();
        assert_eq!(status, "pending");
    }
}
