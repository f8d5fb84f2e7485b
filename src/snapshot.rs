//! Normalized building snapshots consumed by the format encoders.
//!
//! The export engine never talks to the extraction pipeline directly; it
//! asks a [`BuildingSnapshotProvider`] for the current element graph of a
//! building. The in-memory provider backs tests and the CLI; a production
//! deployment plugs its repository layer in behind the same trait.

use std::collections::BTreeMap;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use crate::error::{PlanforgeError, Result};
use crate::extract::ExtractionResult;
use crate::types::{GeometryKind, SystemKind};

// ---------------------------------------------------------------------------
// Snapshot types
// ---------------------------------------------------------------------------

/// One element in a normalized snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementSnapshot {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub system: SystemKind,
    pub subtype: String,
    pub anchor: (f64, f64),
    pub geometry: GeometryKind,
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

/// The element graph of one building at a point in time.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BuildingSnapshot {
    pub building_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub floor_id: Option<String>,
    pub elements: Vec<ElementSnapshot>,
}

impl BuildingSnapshot {
    /// Element count per system, for encoder metrics.
    pub fn system_counts(&self) -> BTreeMap<SystemKind, usize> {
        let mut counts = BTreeMap::new();
        for element in &self.elements {
            *counts.entry(element.system).or_insert(0) += 1;
        }
        counts
    }
}

/// Build a snapshot from a completed extraction pass.
pub fn snapshot_from_extraction(result: &ExtractionResult) -> BuildingSnapshot {
    BuildingSnapshot {
        building_id: result.building_id.clone(),
        floor_id: Some(result.floor_id.clone()),
        elements: result
            .elements
            .iter()
            .map(|e| ElementSnapshot {
                id: e.id.clone(),
                label: e.label.clone(),
                system: e.system,
                subtype: e.subtype.clone(),
                anchor: e.anchor,
                geometry: e.geometry,
                properties: e.metadata.properties.clone(),
            })
            .collect(),
    }
}

// ---------------------------------------------------------------------------
// Provider
// ---------------------------------------------------------------------------

/// Source of building snapshots for the export engine.
pub trait BuildingSnapshotProvider: Send + Sync {
    fn snapshot(&self, building_id: &str) -> Result<BuildingSnapshot>;
}

/// Map-backed provider for tests and the CLI.
#[derive(Debug, Default)]
pub struct InMemorySnapshotProvider {
    snapshots: RwLock<BTreeMap<String, BuildingSnapshot>>,
}

impl InMemorySnapshotProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, snapshot: BuildingSnapshot) {
        if let Ok(mut map) = self.snapshots.write() {
            map.insert(snapshot.building_id.clone(), snapshot);
        }
    }
}

impl BuildingSnapshotProvider for InMemorySnapshotProvider {
    fn snapshot(&self, building_id: &str) -> Result<BuildingSnapshot> {
        self.snapshots
            .read()
            .ok()
            .and_then(|map| map.get(building_id).cloned())
            .ok_or_else(|| {
                PlanforgeError::InputValidation(format!("unknown building: {building_id}"))
            })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::ExtractionPipeline;

    #[test]
    fn snapshot_carries_extraction_elements() {
        let xml = r#"<svg><g id="electrical"><circle id="e1" cx="5" cy="5" label="outlet"/></g></svg>"#;
        let result = ExtractionPipeline::new().extract(xml, "B1", "F1").unwrap();
        let snapshot = snapshot_from_extraction(&result);
        assert_eq!(snapshot.building_id, "B1");
        assert_eq!(snapshot.floor_id.as_deref(), Some("F1"));
        assert_eq!(snapshot.elements.len(), 1);
        assert_eq!(snapshot.elements[0].system, SystemKind::Electrical);
        assert_eq!(snapshot.system_counts()[&SystemKind::Electrical], 1);
    }

    #[test]
    fn in_memory_provider_round_trip() {
        let provider = InMemorySnapshotProvider::new();
        provider.insert(BuildingSnapshot {
            building_id: "B1".into(),
            floor_id: None,
            elements: Vec::new(),
        });
        assert!(provider.snapshot("B1").is_ok());
        let err = provider.snapshot("missing").unwrap_err();
        assert!(matches!(err, PlanforgeError::InputValidation(_)));
    }
}
