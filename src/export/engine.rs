//! The export job engine: submission facade, worker pool, and analytics.
//!
//! Submissions validate, persist a PENDING row, and enqueue without ever
//! blocking on encoding. A fixed pool of named OS threads drains the queue;
//! each worker owns a claimed job for its whole lifetime and every failure
//! is contained to that job. The queue is the only synchronization point
//! between submitters and workers; the store serializes its own writes.

use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;
use std::time::Instant;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::encode;
use crate::error::{PlanforgeError, Result};
use crate::snapshot::BuildingSnapshotProvider;
use crate::types::{
    ExportAnalytics, ExportBatch, ExportFormat, ExportJob, ExportQuality, JobStatus,
};

use super::queue::JobQueue;
use super::store::{now_rfc3339, JobStore};

// ---------------------------------------------------------------------------
// Submission types
// ---------------------------------------------------------------------------

/// One job in a batch submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSpec {
    pub building_id: String,
    pub format: ExportFormat,
    pub quality: ExportQuality,
    #[serde(default)]
    pub options: serde_json::Map<String, serde_json::Value>,
}

/// Point-in-time processing statistics, complementing lifetime analytics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingStats {
    pub queued: usize,
    pub status_counts: BTreeMap<String, u64>,
}

// ---------------------------------------------------------------------------
// ExportEngine
// ---------------------------------------------------------------------------

pub struct ExportEngine {
    config: EngineConfig,
    store: Arc<JobStore>,
    queue: Arc<JobQueue>,
    analytics: Arc<Mutex<ExportAnalytics>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    stopped: AtomicBool,
}

impl ExportEngine {
    /// Open the store, create the output directory, and start the worker
    /// pool.
    pub fn new(
        config: EngineConfig,
        provider: Arc<dyn BuildingSnapshotProvider>,
    ) -> Result<Self> {
        let store = Arc::new(JobStore::open(config.db_path.as_deref())?);
        let queue = Arc::new(JobQueue::new(config.queue_capacity));
        let analytics = Arc::new(Mutex::new(ExportAnalytics::default()));
        std::fs::create_dir_all(&config.output_dir)?;

        let mut workers = Vec::with_capacity(config.workers);
        for i in 0..config.workers {
            let worker = Worker {
                store: Arc::clone(&store),
                queue: Arc::clone(&queue),
                provider: Arc::clone(&provider),
                analytics: Arc::clone(&analytics),
                output_dir: config.output_dir.clone(),
            };
            let handle = std::thread::Builder::new()
                .name(format!("planforge-worker-{i}"))
                .spawn(move || worker.run())?;
            workers.push(handle);
        }
        info!(workers = config.workers, "export engine started");

        Ok(Self {
            config,
            store,
            queue,
            analytics,
            workers: Mutex::new(workers),
            stopped: AtomicBool::new(false),
        })
    }

    // -- Submission ---------------------------------------------------------

    /// Submit one export job at the default priority. Returns the job id
    /// immediately; encoding happens on the worker pool.
    pub fn create_job(
        &self,
        building_id: &str,
        format: ExportFormat,
        quality: ExportQuality,
        options: serde_json::Map<String, serde_json::Value>,
    ) -> Result<String> {
        self.create_job_with_priority(building_id, format, quality, options, self.config.default_priority)
    }

    /// Submit one export job at an explicit priority (lower runs first).
    pub fn create_job_with_priority(
        &self,
        building_id: &str,
        format: ExportFormat,
        quality: ExportQuality,
        options: serde_json::Map<String, serde_json::Value>,
        priority: i64,
    ) -> Result<String> {
        if self.stopped.load(Ordering::SeqCst) {
            return Err(PlanforgeError::InputValidation(
                "engine is shut down".to_string(),
            ));
        }
        if building_id.trim().is_empty() {
            return Err(PlanforgeError::InputValidation(
                "building_id must be non-empty".to_string(),
            ));
        }

        let job_id = Uuid::new_v4().to_string();
        let job = ExportJob {
            job_id: job_id.clone(),
            building_id: building_id.to_string(),
            format,
            quality,
            options,
            status: JobStatus::Pending,
            created_at: now_rfc3339(),
            started_at: None,
            completed_at: None,
            file_path: None,
            file_size: None,
            error_message: None,
            validation_results: None,
            optimization_metrics: None,
            analytics: None,
            metadata: serde_json::Map::new(),
        };
        self.store.insert_job(&job)?;

        if let Err(e) = self.queue.push(priority, job_id.clone()) {
            // The row exists but will never be served; close it out.
            self.store.cancel(&job_id)?;
            return Err(e);
        }
        debug!(job_id = %job_id, %format, %quality, priority, "job queued");
        Ok(job_id)
    }

    /// Create N jobs under one batch record sharing one priority.
    pub fn create_batch(&self, specs: &[JobSpec], priority: i64) -> Result<String> {
        if specs.is_empty() {
            return Err(PlanforgeError::InputValidation(
                "batch must contain at least one job".to_string(),
            ));
        }
        for spec in specs {
            if spec.building_id.trim().is_empty() {
                return Err(PlanforgeError::InputValidation(
                    "building_id must be non-empty".to_string(),
                ));
            }
        }

        let mut job_ids = Vec::with_capacity(specs.len());
        for spec in specs {
            let job_id = self.create_job_with_priority(
                &spec.building_id,
                spec.format,
                spec.quality,
                spec.options.clone(),
                priority,
            )?;
            job_ids.push(job_id);
        }

        let batch = ExportBatch {
            batch_id: Uuid::new_v4().to_string(),
            job_ids,
            priority,
            status: JobStatus::Pending,
            created_at: now_rfc3339(),
            completed_at: None,
        };
        self.store.insert_batch(&batch)?;
        debug!(batch_id = %batch.batch_id, jobs = batch.job_ids.len(), "batch queued");
        Ok(batch.batch_id)
    }

    // -- Queries ------------------------------------------------------------

    pub fn get_status(&self, job_id: &str) -> Result<Option<ExportJob>> {
        self.store.get_job(job_id)
    }

    pub fn list_jobs(
        &self,
        building_id: Option<&str>,
        status: Option<JobStatus>,
    ) -> Result<Vec<ExportJob>> {
        self.store.list_jobs(building_id, status)
    }

    /// Cancel a job. Only PENDING or PROCESSING jobs can be cancelled;
    /// returns false for missing or already-terminal jobs. A cancelled
    /// PENDING job is skipped at claim time and never processed.
    pub fn cancel_job(&self, job_id: &str) -> Result<bool> {
        self.store.cancel(job_id)
    }

    pub fn get_analytics(&self) -> ExportAnalytics {
        self.analytics
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn get_statistics(&self) -> Result<ProcessingStats> {
        Ok(ProcessingStats {
            queued: self.queue.len(),
            status_counts: self.store.status_counts()?,
        })
    }

    pub fn get_batch(&self, batch_id: &str) -> Result<Option<ExportBatch>> {
        self.store.get_batch(batch_id)
    }

    /// Recompute a batch's status from its member jobs, persist it, and
    /// return it.
    pub fn batch_status(&self, batch_id: &str) -> Result<Option<JobStatus>> {
        let Some(batch) = self.store.get_batch(batch_id)? else {
            return Ok(None);
        };
        let mut statuses = Vec::with_capacity(batch.job_ids.len());
        for job_id in &batch.job_ids {
            if let Some(job) = self.store.get_job(job_id)? {
                statuses.push(job.status);
            }
        }
        let derived = derive_batch_status(&statuses);
        if derived != batch.status {
            self.store.update_batch_status(batch_id, derived)?;
        }
        Ok(Some(derived))
    }

    // -- Shutdown -----------------------------------------------------------

    /// Stop the engine. With `drain` the queue is worked to completion
    /// first; otherwise still-pending entries are discarded and their jobs
    /// marked CANCELLED. In-flight jobs always run to completion.
    pub fn shutdown(&self, drain: bool) -> Result<()> {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        if !drain {
            for job_id in self.queue.take_pending() {
                self.store.cancel(&job_id)?;
            }
        }
        self.queue.close();
        let handles = std::mem::take(
            &mut *self
                .workers
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );
        for handle in handles {
            let _ = handle.join();
        }
        self.store.record_analytics(&self.get_analytics())?;
        info!(drained = drain, "export engine stopped");
        Ok(())
    }
}

impl Drop for ExportEngine {
    fn drop(&mut self) {
        let _ = self.shutdown(false);
    }
}

fn derive_batch_status(statuses: &[JobStatus]) -> JobStatus {
    if statuses.is_empty() || statuses.iter().all(|s| *s == JobStatus::Pending) {
        return JobStatus::Pending;
    }
    if !statuses.iter().all(JobStatus::is_terminal) {
        return JobStatus::Processing;
    }
    if statuses.iter().any(|s| *s == JobStatus::Failed) {
        JobStatus::Failed
    } else if statuses.iter().any(|s| *s == JobStatus::Completed) {
        JobStatus::Completed
    } else {
        JobStatus::Cancelled
    }
}

fn error_class(err: &PlanforgeError) -> &'static str {
    match err {
        PlanforgeError::InputValidation(_) => "input_validation",
        PlanforgeError::Encoding(_) => "encoding",
        PlanforgeError::Persistence(_) => "persistence",
        PlanforgeError::QueueFull => "queue_full",
        PlanforgeError::Io(_) => "io",
    }
}

// ---------------------------------------------------------------------------
// Worker
// ---------------------------------------------------------------------------

struct Worker {
    store: Arc<JobStore>,
    queue: Arc<JobQueue>,
    provider: Arc<dyn BuildingSnapshotProvider>,
    analytics: Arc<Mutex<ExportAnalytics>>,
    output_dir: PathBuf,
}

impl Worker {
    fn run(&self) {
        while let Some(job_id) = self.queue.pop() {
            match self.process(&job_id) {
                Ok(()) => {}
                Err(err) => {
                    // Store unavailability is the only way to land here;
                    // the job itself may be left mid-flight.
                    warn!(job_id = %job_id, %err, "job processing aborted");
                }
            }
        }
        debug!("worker exiting");
    }

    /// Process one claimed job end to end. Encoder errors and panics mark
    /// the job FAILED; only persistence failures propagate.
    fn process(&self, job_id: &str) -> Result<()> {
        if !self.store.claim_for_processing(job_id)? {
            debug!(job_id, "skipping unclaimed job (missing or cancelled)");
            return Ok(());
        }
        let Some(job) = self.store.get_job(job_id)? else {
            return Ok(());
        };

        let started = Instant::now();
        match self.encode_and_finish(&job) {
            Ok(true) => {
                let duration = started.elapsed().as_secs_f64();
                let snapshot = {
                    let mut analytics = self
                        .analytics
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner);
                    analytics.record_success(job.format, job.quality, duration);
                    analytics.clone()
                };
                self.store.record_analytics(&snapshot)?;
                info!(job_id, format = %job.format, duration, "job completed");
            }
            Ok(false) => {
                // Terminal state raced us (cancel during processing).
                debug!(job_id, "job reached a terminal state mid-flight");
            }
            Err(err) => {
                self.store.fail(job_id, &err.to_string())?;
                let mut analytics = self
                    .analytics
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner);
                analytics.record_failure(error_class(&err));
                warn!(job_id, %err, "job failed");
            }
        }
        Ok(())
    }

    /// Returns Ok(true) when the job was completed, Ok(false) when a
    /// guarded transition found the row already terminal.
    fn encode_and_finish(&self, job: &ExportJob) -> Result<bool> {
        let snapshot = self.provider.snapshot(&job.building_id)?;

        let artifact = catch_unwind(AssertUnwindSafe(|| {
            encode::encode(job.format, job.quality, &snapshot, &job.options)
        }))
        .map_err(|_| PlanforgeError::Encoding("encoder panicked".to_string()))??;

        self.store.mark_stage(&job.job_id, JobStatus::Validating)?;
        let report = encode::validate(job.format, job.quality, &artifact);
        if !report.passed() {
            return Err(PlanforgeError::Encoding(format!(
                "validation failed: {:?}",
                report
                    .checks
                    .iter()
                    .filter(|c| !c.passed)
                    .map(|c| c.name.as_str())
                    .collect::<Vec<_>>()
            )));
        }

        self.store.mark_stage(&job.job_id, JobStatus::Optimizing)?;
        let optimization = encode::optimize(job.quality, &artifact);

        let file_path = self.artifact_path(job);
        std::fs::write(&file_path, &artifact.payload)?;

        let completed = self.store.complete(
            &job.job_id,
            &file_path.to_string_lossy(),
            optimization.optimized_size,
            &serde_json::to_value(&report).unwrap_or_default(),
            &serde_json::to_value(&optimization).unwrap_or_default(),
            &serde_json::to_value(&artifact.metrics).unwrap_or_default(),
        )?;
        Ok(completed)
    }

    fn artifact_path(&self, job: &ExportJob) -> PathBuf {
        let stamp = Utc::now().format("%Y%m%d%H%M%S");
        let short_id: String = job.job_id.chars().take(8).collect();
        self.output_dir.join(format!(
            "export_{}_{}_{}_{}.{}",
            job.format.as_str(),
            job.quality.as_str(),
            stamp,
            short_id,
            job.format.extension(),
        ))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
