//! Format encoders, validation, and optimization.
//!
//! Each encoder is a pure function from a building snapshot to an
//! [`Artifact`]: the serialized payload plus structural metrics (element,
//! mesh, feature counts) used downstream for analytics. An encoder either
//! returns a complete document or an error; it never emits a truncated
//! artifact.

mod geojson;
mod gltf;
mod ifc;
mod svgx;
mod tabular;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::snapshot::BuildingSnapshot;
use crate::types::{ExportFormat, ExportQuality};

pub use svgx::SVGX_XMLNS;

// ---------------------------------------------------------------------------
// Artifact
// ---------------------------------------------------------------------------

/// The product of one encoder invocation.
#[derive(Debug, Clone)]
pub struct Artifact {
    pub payload: Vec<u8>,
    /// Structural counts keyed by metric name (`element_count`,
    /// `mesh_count`, `feature_count`, ...).
    pub metrics: BTreeMap<String, u64>,
}

impl Artifact {
    pub fn new(payload: Vec<u8>) -> Self {
        Self {
            payload,
            metrics: BTreeMap::new(),
        }
    }

    pub fn with_metric(mut self, name: &str, value: u64) -> Self {
        self.metrics.insert(name.to_string(), value);
        self
    }

    pub fn size(&self) -> u64 {
        self.payload.len() as u64
    }
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

/// Encode a snapshot into the requested format.
pub fn encode(
    format: ExportFormat,
    quality: ExportQuality,
    snapshot: &BuildingSnapshot,
    options: &serde_json::Map<String, serde_json::Value>,
) -> Result<Artifact> {
    match format {
        ExportFormat::IfcLite => ifc::encode(snapshot, quality),
        ExportFormat::Gltf => gltf::encode(snapshot, quality),
        ExportFormat::Svgx => svgx::encode(snapshot),
        ExportFormat::Excel => tabular::encode_excel(snapshot),
        ExportFormat::Parquet => tabular::encode_parquet(snapshot),
        ExportFormat::GeoJson => geojson::encode(snapshot, options),
        ExportFormat::Csv => tabular::encode_csv(snapshot),
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// One named pass/fail validation check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationCheck {
    pub name: String,
    pub passed: bool,
}

/// Result of validating an artifact against its target format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    pub checks: Vec<ValidationCheck>,
}

impl ValidationReport {
    pub fn passed(&self) -> bool {
        self.checks.iter().all(|c| c.passed)
    }
}

/// Validate an encoded artifact.
///
/// Existence and non-zero size are always checked; High and above add a
/// format-specific structural check.
pub fn validate(
    format: ExportFormat,
    quality: ExportQuality,
    artifact: &Artifact,
) -> ValidationReport {
    let mut checks = vec![ValidationCheck {
        name: "artifact_non_empty".to_string(),
        passed: !artifact.payload.is_empty(),
    }];

    if quality.strict_validation() {
        checks.push(ValidationCheck {
            name: format!("{}_structure", format.as_str()),
            passed: structural_check(format, &artifact.payload),
        });
    }

    ValidationReport { checks }
}

fn structural_check(format: ExportFormat, payload: &[u8]) -> bool {
    match format {
        ExportFormat::IfcLite => {
            let text = String::from_utf8_lossy(payload);
            text.starts_with("ISO-10303-21") && text.contains("ENDSEC")
        }
        ExportFormat::Gltf => serde_json::from_slice::<serde_json::Value>(payload)
            .ok()
            .and_then(|v| v["asset"]["version"].as_str().map(str::to_string))
            .is_some(),
        ExportFormat::Svgx => {
            let text = String::from_utf8_lossy(payload);
            roxmltree::Document::parse(&text)
                .map(|doc| doc.root_element().has_tag_name("svgx"))
                .unwrap_or(false)
        }
        // XLSX is a zip container.
        ExportFormat::Excel => payload.starts_with(b"PK"),
        ExportFormat::Parquet => payload.starts_with(b"PAR1") && payload.ends_with(b"PAR1"),
        ExportFormat::GeoJson => serde_json::from_slice::<serde_json::Value>(payload)
            .map(|v| v["type"] == "FeatureCollection")
            .unwrap_or(false),
        ExportFormat::Csv => {
            let text = String::from_utf8_lossy(payload);
            text.lines().next().is_some_and(|h| h.contains("element_id"))
        }
    }
}

// ---------------------------------------------------------------------------
// Optimization
// ---------------------------------------------------------------------------

/// Size accounting from the optimization pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizationMetrics {
    pub original_size: u64,
    pub optimized_size: u64,
    pub compression_ratio: f64,
}

/// Optimize an artifact for its quality tier.
///
/// A no-op below Professional; Professional and Publication apply a 0.8
/// compression ratio to the reported size.
pub fn optimize(quality: ExportQuality, artifact: &Artifact) -> OptimizationMetrics {
    let original_size = artifact.size();
    if quality.optimizes() {
        OptimizationMetrics {
            original_size,
            optimized_size: (original_size as f64 * 0.8) as u64,
            compression_ratio: 0.8,
        }
    } else {
        OptimizationMetrics {
            original_size,
            optimized_size: original_size,
            compression_ratio: 1.0,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::ElementSnapshot;
    use crate::types::{GeometryKind, SystemKind};

    pub(crate) fn sample_snapshot() -> BuildingSnapshot {
        BuildingSnapshot {
            building_id: "B1".into(),
            floor_id: Some("F1".into()),
            elements: vec![
                ElementSnapshot {
                    id: "e1".into(),
                    label: Some("Duplex Outlet".into()),
                    system: SystemKind::Electrical,
                    subtype: "outlet".into(),
                    anchor: (5.0, 5.0),
                    geometry: GeometryKind::Circle,
                    properties: Default::default(),
                },
                ElementSnapshot {
                    id: "p1".into(),
                    label: None,
                    system: SystemKind::Plumbing,
                    subtype: "valve".into(),
                    anchor: (3.0, 4.0),
                    geometry: GeometryKind::Rectangle,
                    properties: Default::default(),
                },
            ],
        }
    }

    #[test]
    fn every_format_encodes_non_empty() {
        let snapshot = sample_snapshot();
        let options = serde_json::Map::new();
        for format in ExportFormat::all() {
            let artifact = encode(*format, ExportQuality::Standard, &snapshot, &options)
                .unwrap_or_else(|e| panic!("{format} failed: {e}"));
            assert!(!artifact.payload.is_empty(), "{format} produced empty payload");
            assert!(!artifact.metrics.is_empty(), "{format} reported no metrics");
        }
    }

    #[test]
    fn strict_validation_passes_for_all_formats() {
        let snapshot = sample_snapshot();
        let options = serde_json::Map::new();
        for format in ExportFormat::all() {
            let artifact =
                encode(*format, ExportQuality::High, &snapshot, &options).unwrap();
            let report = validate(*format, ExportQuality::High, &artifact);
            assert!(report.passed(), "{format} failed: {:?}", report.checks);
            assert_eq!(report.checks.len(), 2);
        }
    }

    #[test]
    fn draft_validation_checks_size_only() {
        let artifact = Artifact::new(b"x".to_vec());
        let report = validate(ExportFormat::Csv, ExportQuality::Draft, &artifact);
        assert_eq!(report.checks.len(), 1);
        assert!(report.passed());
    }

    #[test]
    fn empty_artifact_fails_validation() {
        let artifact = Artifact::new(Vec::new());
        let report = validate(ExportFormat::Csv, ExportQuality::Draft, &artifact);
        assert!(!report.passed());
    }

    #[test]
    fn optimization_ratio_by_tier() {
        let artifact = Artifact::new(vec![0u8; 100]);
        let plain = optimize(ExportQuality::Standard, &artifact);
        assert_eq!(plain.optimized_size, 100);
        assert_eq!(plain.compression_ratio, 1.0);

        let compressed = optimize(ExportQuality::Professional, &artifact);
        assert_eq!(compressed.optimized_size, 80);
        assert_eq!(compressed.compression_ratio, 0.8);
    }
}
