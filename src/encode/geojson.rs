//! GeoJSON encoder: a FeatureCollection with one Point feature per element.

use serde_json::json;

use crate::error::{PlanforgeError, Result};
use crate::snapshot::BuildingSnapshot;

use super::Artifact;

pub fn encode(
    snapshot: &BuildingSnapshot,
    options: &serde_json::Map<String, serde_json::Value>,
) -> Result<Artifact> {
    let include_properties = options
        .get("include_properties")
        .and_then(serde_json::Value::as_bool)
        .unwrap_or(false);

    let features: Vec<serde_json::Value> = snapshot
        .elements
        .iter()
        .map(|e| {
            let mut properties = json!({
                "id": e.id,
                "system": e.system.as_str(),
                "subtype": e.subtype,
                "label": e.label,
                "geometry_kind": e.geometry.as_str(),
            });
            if include_properties {
                properties["attributes"] = json!(e.properties);
            }
            json!({
                "type": "Feature",
                "geometry": {
                    "type": "Point",
                    "coordinates": [e.anchor.0, e.anchor.1],
                },
                "properties": properties,
            })
        })
        .collect();

    let collection = json!({
        "type": "FeatureCollection",
        "features": features,
        "bbox": bbox(snapshot),
    });

    let payload = serde_json::to_vec(&collection)
        .map_err(|e| PlanforgeError::Encoding(format!("geojson serialization: {e}")))?;
    Ok(Artifact::new(payload)
        .with_metric("feature_count", snapshot.elements.len() as u64)
        .with_metric("element_count", snapshot.elements.len() as u64))
}

/// [min_x, min_y, max_x, max_y] over all anchors; zeros for an empty set.
fn bbox(snapshot: &BuildingSnapshot) -> [f64; 4] {
    let mut bounds = [f64::MAX, f64::MAX, f64::MIN, f64::MIN];
    if snapshot.elements.is_empty() {
        return [0.0; 4];
    }
    for element in &snapshot.elements {
        let (x, y) = element.anchor;
        bounds[0] = bounds[0].min(x);
        bounds[1] = bounds[1].min(y);
        bounds[2] = bounds[2].max(x);
        bounds[3] = bounds[3].max(y);
    }
    bounds
}

#[cfg(test)]
mod tests {
    use super::super::tests::sample_snapshot;
    use super::*;

    #[test]
    fn emits_feature_collection_with_point_per_element() {
        let artifact = encode(&sample_snapshot(), &serde_json::Map::new()).unwrap();
        let doc: serde_json::Value = serde_json::from_slice(&artifact.payload).unwrap();
        assert_eq!(doc["type"], "FeatureCollection");
        let features = doc["features"].as_array().unwrap();
        assert_eq!(features.len(), 2);
        assert_eq!(features[0]["geometry"]["type"], "Point");
        assert_eq!(features[0]["geometry"]["coordinates"], json!([5.0, 5.0]));
        assert_eq!(features[0]["properties"]["system"], "electrical");
        assert_eq!(doc["bbox"], json!([3.0, 4.0, 5.0, 5.0]));
        assert_eq!(artifact.metrics["feature_count"], 2);
    }

    #[test]
    fn attributes_included_on_request() {
        let mut options = serde_json::Map::new();
        options.insert("include_properties".into(), serde_json::Value::Bool(true));
        let artifact = encode(&sample_snapshot(), &options).unwrap();
        let doc: serde_json::Value = serde_json::from_slice(&artifact.payload).unwrap();
        assert!(doc["features"][0]["properties"]["attributes"].is_object());
    }
}
