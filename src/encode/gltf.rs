//! glTF 2.0 encoder: a JSON skeleton with one scene node per element, all
//! sharing a single unit quad mesh.

use serde_json::json;

use crate::error::{PlanforgeError, Result};
use crate::snapshot::BuildingSnapshot;
use crate::types::ExportQuality;

use super::Artifact;

/// Byte length of the shared position buffer (4 vec3 f32 vertices).
const UNIT_QUAD_BYTES: u64 = 48;

pub fn encode(snapshot: &BuildingSnapshot, quality: ExportQuality) -> Result<Artifact> {
    let nodes: Vec<serde_json::Value> = snapshot
        .elements
        .iter()
        .map(|e| {
            json!({
                "name": e.id,
                "mesh": 0,
                "translation": [e.anchor.0, e.anchor.1, 0.0],
                "extras": {
                    "system": e.system.as_str(),
                    "subtype": e.subtype,
                    "label": e.label,
                },
            })
        })
        .collect();

    let document = json!({
        "asset": {
            "version": "2.0",
            "generator": "planforge",
        },
        "scene": 0,
        "scenes": [{ "nodes": (0..nodes.len()).collect::<Vec<_>>() }],
        "nodes": nodes,
        "meshes": [{
            "name": "unit_quad",
            "primitives": [{ "attributes": { "POSITION": 0 }, "mode": 4 }],
        }],
        "accessors": [{
            "bufferView": 0,
            "componentType": 5126,
            "count": 4,
            "type": "VEC3",
            "min": [0.0, 0.0, 0.0],
            "max": [1.0, 1.0, 0.0],
        }],
        "bufferViews": [{
            "buffer": 0,
            "byteOffset": 0,
            "byteLength": UNIT_QUAD_BYTES,
        }],
        "buffers": [{ "byteLength": UNIT_QUAD_BYTES }],
    });

    let payload = if quality.strict_validation() {
        serde_json::to_vec_pretty(&document)
    } else {
        serde_json::to_vec(&document)
    }
    .map_err(|e| PlanforgeError::Encoding(format!("gltf serialization: {e}")))?;

    Ok(Artifact::new(payload)
        .with_metric("node_count", snapshot.elements.len() as u64)
        .with_metric("mesh_count", 1)
        .with_metric("element_count", snapshot.elements.len() as u64))
}

#[cfg(test)]
mod tests {
    use super::super::tests::sample_snapshot;
    use super::*;

    #[test]
    fn emits_valid_gltf_skeleton() {
        let artifact = encode(&sample_snapshot(), ExportQuality::Standard).unwrap();
        let doc: serde_json::Value = serde_json::from_slice(&artifact.payload).unwrap();
        assert_eq!(doc["asset"]["version"], "2.0");
        assert_eq!(doc["nodes"].as_array().unwrap().len(), 2);
        assert_eq!(doc["nodes"][0]["translation"][0], 5.0);
        assert_eq!(doc["nodes"][0]["extras"]["system"], "electrical");
        assert_eq!(doc["scenes"][0]["nodes"], json!([0, 1]));
        assert_eq!(artifact.metrics["mesh_count"], 1);
        assert_eq!(artifact.metrics["node_count"], 2);
    }

    #[test]
    fn empty_snapshot_still_encodes() {
        let snapshot = BuildingSnapshot {
            building_id: "B1".into(),
            floor_id: None,
            elements: Vec::new(),
        };
        let artifact = encode(&snapshot, ExportQuality::Draft).unwrap();
        assert_eq!(artifact.metrics["node_count"], 0);
        assert!(!artifact.payload.is_empty());
    }
}
