//! Floorplan extraction pipeline.
//!
//! One depth-first pass over a parsed SVG/XML document, delegating each
//! candidate node to the classifier and assembling typed elements. A node
//! that cannot be turned into an element is skipped and counted; the pass
//! itself never aborts once the document has parsed.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::classifier;
use crate::error::{PlanforgeError, Result};
use crate::types::{ElementPayload, SystemElement, SystemKind};

/// Container tags that only provide structure; they are traversed but not
/// counted as element candidates.
const CONTAINER_TAGS: &[&str] = &["svg", "g", "defs", "metadata", "style", "title", "desc"];

/// Tags that always produce an element candidate.
const DRAWABLE_TAGS: &[&str] = &[
    "circle", "rect", "ellipse", "line", "polygon", "polyline", "path", "text",
];

/// Label attribute candidates, in priority order.
const LABEL_ATTRS: &[&str] = &["label", "data-label", "name", "data-name", "title"];

/// Property key recording the pre-remap system of an SVGX-classified node.
const ORIGINAL_SYSTEM_KEY: &str = "original_system";

// ---------------------------------------------------------------------------
// ExtractionResult
// ---------------------------------------------------------------------------

/// Outcome of one extraction pass over a document.
///
/// Accounting invariant: `elements.len() + nodes_skipped == nodes_visited`,
/// where visited counts candidate nodes only (containers are structural).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub building_id: String,
    pub floor_id: String,
    pub elements: Vec<SystemElement>,
    pub system_counts: BTreeMap<SystemKind, usize>,
    pub svgx_element_count: usize,
    pub nodes_visited: usize,
    pub nodes_skipped: usize,
}

// ---------------------------------------------------------------------------
// ExtractionPipeline
// ---------------------------------------------------------------------------

/// Stateless extraction entry point.
#[derive(Debug, Default)]
pub struct ExtractionPipeline;

impl ExtractionPipeline {
    pub fn new() -> Self {
        Self
    }

    /// Extract all system elements from an SVG/XML document.
    ///
    /// Malformed XML yields [`PlanforgeError::InputValidation`]; after a
    /// successful parse the pass always completes, skipping and counting
    /// nodes it cannot convert.
    pub fn extract(
        &self,
        xml: &str,
        building_id: &str,
        floor_id: &str,
    ) -> Result<ExtractionResult> {
        let doc = roxmltree::Document::parse(xml)
            .map_err(|e| PlanforgeError::InputValidation(format!("malformed XML: {e}")))?;

        let mut elements: Vec<SystemElement> = Vec::new();
        let mut seen_ids: BTreeSet<String> = BTreeSet::new();
        let mut system_counts: BTreeMap<SystemKind, usize> = BTreeMap::new();
        let mut svgx_element_count = 0;
        let mut nodes_visited = 0;
        let mut nodes_skipped = 0;
        let mut synth_counter = 0usize;

        for node in doc.descendants().filter(roxmltree::Node::is_element) {
            let tag = node.tag_name().name();
            if CONTAINER_TAGS.contains(&tag) {
                continue;
            }

            let is_candidate =
                DRAWABLE_TAGS.contains(&tag) || node.attribute("data-component").is_some();
            if !is_candidate {
                nodes_visited += 1;
                nodes_skipped += 1;
                debug!(tag, "skipping non-drawable node");
                continue;
            }
            nodes_visited += 1;

            match build_element(node, &mut seen_ids, &mut synth_counter) {
                Some(mut element) => {
                    if element.system == SystemKind::Svgx {
                        svgx_element_count += 1;
                        element
                            .metadata
                            .properties
                            .insert(ORIGINAL_SYSTEM_KEY.to_string(), SystemKind::Svgx.as_str().to_string());
                        element.system = SystemKind::Structural;
                    }
                    *system_counts.entry(element.system).or_insert(0) += 1;
                    elements.push(element);
                }
                None => {
                    nodes_skipped += 1;
                    warn!(tag, "node skipped during element construction");
                }
            }
        }

        debug!(
            building_id,
            floor_id,
            produced = elements.len(),
            skipped = nodes_skipped,
            "extraction pass complete"
        );

        Ok(ExtractionResult {
            building_id: building_id.to_string(),
            floor_id: floor_id.to_string(),
            elements,
            system_counts,
            svgx_element_count,
            nodes_visited,
            nodes_skipped,
        })
    }
}

/// Construct one element from a candidate node. Returns `None` when the
/// node is malformed in a way that prevents construction (an explicitly
/// empty id attribute).
fn build_element(
    node: roxmltree::Node<'_, '_>,
    seen_ids: &mut BTreeSet<String>,
    synth_counter: &mut usize,
) -> Option<SystemElement> {
    let id = match node.attribute("id") {
        Some("") => return None,
        Some(id) => id.to_string(),
        None => {
            *synth_counter += 1;
            format!("{}-{}", node.tag_name().name(), synth_counter)
        }
    };
    let id = dedupe_id(id, seen_ids);

    let label = LABEL_ATTRS
        .iter()
        .find_map(|attr| node.attribute(*attr))
        .map(str::to_string);

    let namespace = classifier::resolve_namespace(node);
    let (system, subtype) = classifier::classify(node, label.as_deref(), &namespace);
    let (anchor, geometry) = classifier::extract_geometry(node);
    let metadata = classifier::extract_metadata(node, &namespace);
    let payload = build_payload(system, &metadata.properties);

    Some(SystemElement {
        id,
        label,
        system,
        subtype,
        anchor,
        geometry,
        metadata,
        payload,
    })
}

/// Ensure id uniqueness within one pass by suffixing duplicates.
fn dedupe_id(id: String, seen_ids: &mut BTreeSet<String>) -> String {
    if seen_ids.insert(id.clone()) {
        return id;
    }
    let mut n = 2;
    loop {
        let candidate = format!("{id}-{n}");
        if seen_ids.insert(candidate.clone()) {
            return candidate;
        }
        n += 1;
    }
}

/// System-specific payload from the element's property bag. Absent or
/// unparseable fields default to `None`.
fn build_payload(system: SystemKind, properties: &BTreeMap<String, String>) -> ElementPayload {
    let get = |keys: &[&str]| -> Option<String> {
        keys.iter()
            .find_map(|k| properties.get(*k))
            .map(String::clone)
    };
    let get_num = |keys: &[&str]| -> Option<f64> {
        keys.iter()
            .find_map(|k| properties.get(*k))
            .and_then(|v| v.trim().parse().ok())
    };

    match system {
        SystemKind::Electrical => ElementPayload::Electrical {
            circuit: get(&["circuit"]),
            voltage: get_num(&["voltage"]),
            panel: get(&["panel"]),
        },
        SystemKind::Plumbing => ElementPayload::Plumbing {
            line_type: get(&["line-type", "line_type"]),
            diameter: get_num(&["diameter"]),
        },
        SystemKind::FireAlarm => ElementPayload::FireAlarm {
            zone: get(&["zone"]),
            candela: get_num(&["candela"]),
        },
        _ => ElementPayload::Generic,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::GeometryKind;
    use pretty_assertions::assert_eq;

    #[test]
    fn single_electrical_outlet() {
        let xml = r#"<svg><g id='electrical'><circle id='e1' cx='5' cy='5' label='outlet'/></g></svg>"#;
        let result = ExtractionPipeline::new().extract(xml, "B1", "F1").unwrap();
        assert_eq!(result.elements.len(), 1);
        let element = &result.elements[0];
        assert_eq!(element.id, "e1");
        assert_eq!(element.system, SystemKind::Electrical);
        assert_eq!(element.subtype, "outlet");
        assert_eq!(element.anchor, (5.0, 5.0));
        assert_eq!(element.geometry, GeometryKind::Circle);
        assert_eq!(result.system_counts[&SystemKind::Electrical], 1);
        assert_eq!(result.nodes_visited, 1);
        assert_eq!(result.nodes_skipped, 0);
    }

    #[test]
    fn malformed_xml_is_input_validation() {
        let err = ExtractionPipeline::new()
            .extract("<svg><circle", "B1", "F1")
            .unwrap_err();
        assert!(matches!(err, PlanforgeError::InputValidation(_)));
    }

    #[test]
    fn accounting_invariant_holds() {
        let xml = r#"<svg>
            <g id="plumbing">
                <circle id="p1" cx="1" cy="1" label="valve"/>
                <widget/>
                <rect id="" x="1" y="1"/>
                <path id="p2" d="M 2,2"/>
            </g>
        </svg>"#;
        let result = ExtractionPipeline::new().extract(xml, "B1", "F1").unwrap();
        // widget is not drawable, empty-id rect fails construction.
        assert_eq!(result.elements.len() + result.nodes_skipped, result.nodes_visited);
        assert_eq!(result.elements.len(), 2);
        assert_eq!(result.nodes_skipped, 2);
        assert_eq!(result.nodes_visited, 4);
    }

    #[test]
    fn synthesized_ids_use_tag_and_counter() {
        let xml = r#"<svg><circle cx="1" cy="1"/><rect x="2" y="2"/></svg>"#;
        let result = ExtractionPipeline::new().extract(xml, "B1", "F1").unwrap();
        assert_eq!(result.elements[0].id, "circle-1");
        assert_eq!(result.elements[1].id, "rect-2");
    }

    #[test]
    fn duplicate_ids_are_suffixed() {
        let xml = r#"<svg><circle id="x" cx="1" cy="1"/><circle id="x" cx="2" cy="2"/></svg>"#;
        let result = ExtractionPipeline::new().extract(xml, "B1", "F1").unwrap();
        assert_eq!(result.elements[0].id, "x");
        assert_eq!(result.elements[1].id, "x-2");
    }

    #[test]
    fn svgx_nodes_are_remapped_to_structural() {
        let xml = r#"<svg><g data-namespace="svgx"><circle id="s1" cx="1" cy="1"/></g></svg>"#;
        let result = ExtractionPipeline::new().extract(xml, "B1", "F1").unwrap();
        let element = &result.elements[0];
        assert_eq!(element.system, SystemKind::Structural);
        assert_eq!(element.metadata.properties[ORIGINAL_SYSTEM_KEY], "svgx");
        assert_eq!(result.svgx_element_count, 1);
        assert_eq!(result.system_counts[&SystemKind::Structural], 1);
    }

    #[test]
    fn electrical_payload_from_properties() {
        let xml = r#"<svg><g id="electrical">
            <circle id="e1" cx="1" cy="1" data-circuit="A1" data-voltage="120" data-panel="LP-1"/>
        </g></svg>"#;
        let result = ExtractionPipeline::new().extract(xml, "B1", "F1").unwrap();
        match &result.elements[0].payload {
            ElementPayload::Electrical {
                circuit,
                voltage,
                panel,
            } => {
                assert_eq!(circuit.as_deref(), Some("A1"));
                assert_eq!(*voltage, Some(120.0));
                assert_eq!(panel.as_deref(), Some("LP-1"));
            }
            other => panic!("unexpected payload: {other:?}"),
        }
    }

    #[test]
    fn fire_alarm_payload_defaults_absent() {
        let xml = r#"<svg><g id="fire_alarm"><circle id="f1" cx="1" cy="1" label="horn"/></g></svg>"#;
        let result = ExtractionPipeline::new().extract(xml, "B1", "F1").unwrap();
        assert_eq!(
            result.elements[0].payload,
            ElementPayload::FireAlarm {
                zone: None,
                candela: None
            }
        );
        assert_eq!(result.elements[0].subtype, "horn_strobe");
    }

    #[test]
    fn component_attr_makes_any_tag_a_candidate() {
        let xml = r##"<svg><use id="u1" data-component="outlet" href="#sym"/></svg>"##;
        let result = ExtractionPipeline::new().extract(xml, "B1", "F1").unwrap();
        assert_eq!(result.elements.len(), 1);
        assert_eq!(result.elements[0].geometry, GeometryKind::Unknown);
        assert_eq!(
            result.elements[0].metadata.component_type.as_deref(),
            Some("outlet")
        );
    }
}
