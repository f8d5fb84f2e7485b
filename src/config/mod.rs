//! Engine configuration.
//!
//! Plain serde struct with defaults; callers construct it directly or
//! deserialize it from JSON. Every knob has a default so `EngineConfig::default()`
//! yields a runnable engine.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// EngineConfig
// ---------------------------------------------------------------------------

/// Tuning knobs for the export engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Number of worker threads draining the job queue.
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Maximum number of queued (not yet claimed) jobs.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// SQLite database path. `None` selects an in-memory database.
    #[serde(default)]
    pub db_path: Option<PathBuf>,

    /// Directory artifact files are written into.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Default priority assigned when a submission does not specify one.
    /// Lower values are served first.
    #[serde(default = "default_priority")]
    pub default_priority: i64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            queue_capacity: default_queue_capacity(),
            db_path: None,
            output_dir: default_output_dir(),
            default_priority: default_priority(),
        }
    }
}

fn default_workers() -> usize {
    2
}

fn default_queue_capacity() -> usize {
    256
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("exports")
}

fn default_priority() -> i64 {
    1
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_runnable() {
        let config = EngineConfig::default();
        assert!(config.workers >= 1);
        assert!(config.queue_capacity >= 1);
        assert!(config.db_path.is_none());
        assert_eq!(config.output_dir, PathBuf::from("exports"));
        assert_eq!(config.default_priority, 1);
    }

    #[test]
    fn deserializes_with_partial_fields() {
        let config: EngineConfig = serde_json::from_str(r#"{"workers": 4}"#).unwrap();
        assert_eq!(config.workers, 4);
        assert_eq!(config.queue_capacity, 256);
    }
}
