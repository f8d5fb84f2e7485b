//! Durable job store over SQLite.
//!
//! All writes go through one `Mutex<Connection>`; that single lock is the
//! write-serialization point the engine relies on. Status transitions are
//! guarded in SQL (`WHERE status IN (...)`) so a terminal row can never be
//! overwritten, no matter how calls race.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Mutex;

use chrono::Utc;
use rusqlite::{params, Connection, Row};

use crate::db::schema;
use crate::error::Result;
use crate::types::{
    ExportAnalytics, ExportBatch, ExportFormat, ExportJob, ExportQuality, JobStatus,
};

const NON_TERMINAL: &str = "('pending','processing','validating','optimizing')";

pub fn now_rfc3339() -> String {
    Utc::now().to_rfc3339()
}

// ---------------------------------------------------------------------------
// JobStore
// ---------------------------------------------------------------------------

pub struct JobStore {
    conn: Mutex<Connection>,
}

impl JobStore {
    /// Open the store at `db_path`, or in memory when `None`.
    pub fn open(db_path: Option<&Path>) -> Result<Self> {
        let path = db_path
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_else(|| ":memory:".to_string());
        let conn = schema::initialize_database(&path)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    // -- Jobs ---------------------------------------------------------------

    pub fn insert_job(&self, job: &ExportJob) -> Result<()> {
        let conn = self.lock();
        let mut stmt = conn.prepare_cached(
            "INSERT INTO export_jobs
               (job_id, building_id, format, quality, options_json, status,
                created_at, metadata_json)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        )?;
        stmt.execute(params![
            job.job_id,
            job.building_id,
            job.format.as_str(),
            job.quality.as_str(),
            serde_json::Value::Object(job.options.clone()).to_string(),
            job.status.as_str(),
            job.created_at,
            serde_json::Value::Object(job.metadata.clone()).to_string(),
        ])?;
        Ok(())
    }

    pub fn get_job(&self, job_id: &str) -> Result<Option<ExportJob>> {
        let conn = self.lock();
        let mut stmt = conn.prepare_cached("SELECT * FROM export_jobs WHERE job_id = ?1")?;
        let mut rows = stmt.query(params![job_id])?;
        match rows.next()? {
            Some(row) => Ok(Some(job_from_row(row)?)),
            None => Ok(None),
        }
    }

    /// List jobs, optionally filtered, newest first.
    pub fn list_jobs(
        &self,
        building_id: Option<&str>,
        status: Option<JobStatus>,
    ) -> Result<Vec<ExportJob>> {
        let conn = self.lock();
        let mut stmt = conn.prepare_cached(
            "SELECT * FROM export_jobs
             WHERE (?1 IS NULL OR building_id = ?1)
               AND (?2 IS NULL OR status = ?2)
             ORDER BY created_at DESC, job_id DESC",
        )?;
        let rows = stmt.query_map(params![building_id, status.map(|s| s.as_str())], |row| {
            job_from_row(row)
        })?;
        let mut jobs = Vec::new();
        for job in rows {
            jobs.push(job?);
        }
        Ok(jobs)
    }

    /// Atomically move a PENDING job to PROCESSING.
    ///
    /// Returns false when the job is missing or no longer pending, which is
    /// how workers skip jobs cancelled while queued.
    pub fn claim_for_processing(&self, job_id: &str) -> Result<bool> {
        let conn = self.lock();
        let mut stmt = conn.prepare_cached(
            "UPDATE export_jobs SET status = 'processing', started_at = ?2
             WHERE job_id = ?1 AND status = 'pending'",
        )?;
        Ok(stmt.execute(params![job_id, now_rfc3339()])? == 1)
    }

    /// Move a job through an intermediate stage (validating/optimizing).
    /// Terminal rows are left untouched.
    pub fn mark_stage(&self, job_id: &str, stage: JobStatus) -> Result<bool> {
        let conn = self.lock();
        let mut stmt = conn.prepare_cached(&format!(
            "UPDATE export_jobs SET status = ?2
             WHERE job_id = ?1 AND status IN {NON_TERMINAL}"
        ))?;
        Ok(stmt.execute(params![job_id, stage.as_str()])? == 1)
    }

    /// Finish a job successfully. Guarded: returns false if the row reached
    /// a terminal state in the meantime (e.g. a mid-flight cancel).
    pub fn complete(
        &self,
        job_id: &str,
        file_path: &str,
        file_size: u64,
        validation_results: &serde_json::Value,
        optimization_metrics: &serde_json::Value,
        analytics: &serde_json::Value,
    ) -> Result<bool> {
        let conn = self.lock();
        let mut stmt = conn.prepare_cached(&format!(
            "UPDATE export_jobs
             SET status = 'completed', completed_at = ?2, file_path = ?3,
                 file_size = ?4, validation_results_json = ?5,
                 optimization_metrics_json = ?6, analytics_json = ?7
             WHERE job_id = ?1 AND status IN {NON_TERMINAL}"
        ))?;
        Ok(stmt.execute(params![
            job_id,
            now_rfc3339(),
            file_path,
            file_size,
            validation_results.to_string(),
            optimization_metrics.to_string(),
            analytics.to_string(),
        ])? == 1)
    }

    /// Mark a job FAILED with a message. Terminal rows are never overwritten.
    pub fn fail(&self, job_id: &str, error_message: &str) -> Result<bool> {
        let conn = self.lock();
        let mut stmt = conn.prepare_cached(&format!(
            "UPDATE export_jobs
             SET status = 'failed', completed_at = ?2, error_message = ?3
             WHERE job_id = ?1 AND status IN {NON_TERMINAL}"
        ))?;
        Ok(stmt.execute(params![job_id, now_rfc3339(), error_message])? == 1)
    }

    /// Cancel a job. Permitted only from PENDING or PROCESSING; returns
    /// false when the job is missing or already terminal.
    pub fn cancel(&self, job_id: &str) -> Result<bool> {
        let conn = self.lock();
        let mut stmt = conn.prepare_cached(
            "UPDATE export_jobs
             SET status = 'cancelled', completed_at = ?2
             WHERE job_id = ?1 AND status IN ('pending','processing')",
        )?;
        Ok(stmt.execute(params![job_id, now_rfc3339()])? == 1)
    }

    /// Job counts per status, for processing statistics.
    pub fn status_counts(&self) -> Result<BTreeMap<String, u64>> {
        let conn = self.lock();
        let mut stmt =
            conn.prepare_cached("SELECT status, COUNT(*) FROM export_jobs GROUP BY status")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, u64>(1)?))
        })?;
        let mut counts = BTreeMap::new();
        for row in rows {
            let (status, count) = row?;
            counts.insert(status, count);
        }
        Ok(counts)
    }

    // -- Batches ------------------------------------------------------------

    pub fn insert_batch(&self, batch: &ExportBatch) -> Result<()> {
        let conn = self.lock();
        let metadata = serde_json::json!({ "job_ids": batch.job_ids });
        let mut stmt = conn.prepare_cached(
            "INSERT INTO export_batches
               (batch_id, priority, created_at, status, metadata_json)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )?;
        stmt.execute(params![
            batch.batch_id,
            batch.priority,
            batch.created_at,
            batch.status.as_str(),
            metadata.to_string(),
        ])?;
        Ok(())
    }

    pub fn get_batch(&self, batch_id: &str) -> Result<Option<ExportBatch>> {
        let conn = self.lock();
        let mut stmt = conn.prepare_cached(
            "SELECT batch_id, priority, created_at, completed_at, status, metadata_json
             FROM export_batches WHERE batch_id = ?1",
        )?;
        let mut rows = stmt.query(params![batch_id])?;
        match rows.next()? {
            Some(row) => Ok(Some(batch_from_row(row)?)),
            None => Ok(None),
        }
    }

    pub fn update_batch_status(&self, batch_id: &str, status: JobStatus) -> Result<bool> {
        let conn = self.lock();
        let completed_at = status.is_terminal().then(now_rfc3339);
        let mut stmt = conn.prepare_cached(
            "UPDATE export_batches
             SET status = ?2, completed_at = COALESCE(?3, completed_at)
             WHERE batch_id = ?1",
        )?;
        Ok(stmt.execute(params![batch_id, status.as_str(), completed_at])? == 1)
    }

    // -- Analytics ----------------------------------------------------------

    /// Append an analytics snapshot to the history table.
    pub fn record_analytics(&self, analytics: &ExportAnalytics) -> Result<()> {
        let snapshot = serde_json::to_string(analytics)
            .unwrap_or_else(|_| "{}".to_string());
        let conn = self.lock();
        let mut stmt = conn.prepare_cached(
            "INSERT INTO export_analytics (recorded_at, snapshot_json) VALUES (?1, ?2)",
        )?;
        stmt.execute(params![now_rfc3339(), snapshot])?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Row mapping
// ---------------------------------------------------------------------------

fn invalid_text(column: &str, value: &str) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        0,
        rusqlite::types::Type::Text,
        format!("unrecognized {column}: {value}").into(),
    )
}

fn parse_json_map(raw: Option<String>) -> serde_json::Map<String, serde_json::Value> {
    raw.and_then(|s| serde_json::from_str(&s).ok())
        .unwrap_or_default()
}

fn parse_json(raw: Option<String>) -> Option<serde_json::Value> {
    raw.and_then(|s| serde_json::from_str(&s).ok())
}

fn job_from_row(row: &Row<'_>) -> rusqlite::Result<ExportJob> {
    let format_raw: String = row.get("format")?;
    let quality_raw: String = row.get("quality")?;
    let status_raw: String = row.get("status")?;
    Ok(ExportJob {
        job_id: row.get("job_id")?,
        building_id: row.get("building_id")?,
        format: ExportFormat::from_str_loose(&format_raw)
            .ok_or_else(|| invalid_text("format", &format_raw))?,
        quality: ExportQuality::from_str_loose(&quality_raw)
            .ok_or_else(|| invalid_text("quality", &quality_raw))?,
        options: parse_json_map(row.get("options_json")?),
        status: JobStatus::from_str_loose(&status_raw)
            .ok_or_else(|| invalid_text("status", &status_raw))?,
        created_at: row.get("created_at")?,
        started_at: row.get("started_at")?,
        completed_at: row.get("completed_at")?,
        file_path: row.get("file_path")?,
        file_size: row.get("file_size")?,
        error_message: row.get("error_message")?,
        validation_results: parse_json(row.get("validation_results_json")?),
        optimization_metrics: parse_json(row.get("optimization_metrics_json")?),
        analytics: parse_json(row.get("analytics_json")?),
        metadata: parse_json_map(row.get("metadata_json")?),
    })
}

fn batch_from_row(row: &Row<'_>) -> rusqlite::Result<ExportBatch> {
    let status_raw: String = row.get("status")?;
    let metadata = parse_json_map(row.get("metadata_json")?);
    let job_ids = metadata
        .get("job_ids")
        .and_then(|v| v.as_array())
        .map(|ids| {
            ids.iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default();
    Ok(ExportBatch {
        batch_id: row.get("batch_id")?,
        job_ids,
        priority: row.get("priority")?,
        status: JobStatus::from_str_loose(&status_raw)
            .ok_or_else(|| invalid_text("status", &status_raw))?,
        created_at: row.get("created_at")?,
        completed_at: row.get("completed_at")?,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
