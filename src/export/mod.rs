//! Asynchronous export pipeline: durable store, priority queue, and the
//! worker-pool engine.

pub mod engine;
pub mod queue;
pub mod store;

pub use engine::{ExportEngine, JobSpec, ProcessingStats};
pub use queue::JobQueue;
pub use store::JobStore;
