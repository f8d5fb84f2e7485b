//! SVGX-native encoder.
//!
//! Emits a namespaced vendor document with `elements`, `behaviors`, and
//! `physics` sections. Elements are grouped per system under `<g>` layers
//! whose ids resolve through the classification group table, and each
//! element carries its canonical subtype token as its label, so feeding the
//! emitted document back through the extraction pipeline recovers every
//! element's (system, subtype) pair.
//!
//! The vendor token deliberately appears only in the root tag name and the
//! xmlns URI, never in an attribute: the classifier's namespace scan must
//! not short-circuit re-classification of emitted elements.

use std::collections::BTreeMap;

use crate::error::Result;
use crate::snapshot::{BuildingSnapshot, ElementSnapshot};
use crate::types::{GeometryKind, SystemKind};

use super::Artifact;

/// Namespace URI for SVGX-native documents.
pub const SVGX_XMLNS: &str = "urn:planforge:svgx";

pub fn encode(snapshot: &BuildingSnapshot) -> Result<Artifact> {
    let mut by_system: BTreeMap<SystemKind, Vec<&ElementSnapshot>> = BTreeMap::new();
    for element in &snapshot.elements {
        by_system.entry(element.system).or_default().push(element);
    }

    let mut out = String::new();
    out.push_str(&format!(
        "<svgx xmlns=\"{}\" building=\"{}\"{}>\n",
        SVGX_XMLNS,
        xml_escape(&snapshot.building_id),
        snapshot
            .floor_id
            .as_deref()
            .map(|f| format!(" floor=\"{}\"", xml_escape(f)))
            .unwrap_or_default(),
    ));
    out.push_str("  <elements>\n");
    for (system, elements) in &by_system {
        out.push_str(&format!("    <g id=\"{}\">\n", system.group_id()));
        for element in elements {
            out.push_str("      ");
            out.push_str(&element_markup(element));
            out.push('\n');
        }
        out.push_str("    </g>\n");
    }
    out.push_str("  </elements>\n");
    out.push_str("  <behaviors/>\n");
    out.push_str("  <physics/>\n");
    out.push_str("</svgx>\n");

    Ok(Artifact::new(out.into_bytes())
        .with_metric("element_count", snapshot.elements.len() as u64)
        .with_metric("group_count", by_system.len() as u64)
        .with_metric("behavior_count", 0)
        .with_metric("physics_count", 0))
}

fn element_markup(element: &ElementSnapshot) -> String {
    let (x, y) = element.anchor;
    let mut attrs = format!("id=\"{}\"", xml_escape(&element.id));
    if element.subtype != "unknown" {
        attrs.push_str(&format!(" label=\"{}\"", xml_escape(&element.subtype)));
    }
    if let Some(label) = &element.label {
        // The display name must not carry the vendor token, or the
        // classifier's namespace scan would misfire on re-extraction.
        if !label.to_lowercase().contains("svgx") {
            attrs.push_str(&format!(" data-display-name=\"{}\"", xml_escape(label)));
        }
    }
    match element.geometry {
        GeometryKind::Circle => format!("<circle {attrs} cx=\"{x}\" cy=\"{y}\"/>"),
        GeometryKind::Ellipse => format!("<ellipse {attrs} cx=\"{x}\" cy=\"{y}\"/>"),
        GeometryKind::Line => format!("<line {attrs} x1=\"{x}\" y1=\"{y}\" x2=\"{x}\" y2=\"{y}\"/>"),
        GeometryKind::Polygon => format!("<polygon {attrs} points=\"{x},{y}\"/>"),
        GeometryKind::Polyline => format!("<polyline {attrs} points=\"{x},{y}\"/>"),
        GeometryKind::Path => format!("<path {attrs} d=\"M {x},{y}\"/>"),
        GeometryKind::Text => format!("<text {attrs} x=\"{x}\" y=\"{y}\"/>"),
        GeometryKind::Rectangle | GeometryKind::Group | GeometryKind::Unknown => {
            format!("<rect {attrs} x=\"{x}\" y=\"{y}\"/>")
        }
    }
}

fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::super::tests::sample_snapshot;
    use super::*;
    use crate::extract::ExtractionPipeline;

    #[test]
    fn document_parses_with_expected_sections() {
        let artifact = encode(&sample_snapshot()).unwrap();
        let text = String::from_utf8(artifact.payload).unwrap();
        let doc = roxmltree::Document::parse(&text).unwrap();
        let root = doc.root_element();
        assert_eq!(root.tag_name().name(), "svgx");
        assert_eq!(root.attribute("building"), Some("B1"));
        let sections: Vec<_> = root
            .children()
            .filter(roxmltree::Node::is_element)
            .map(|n| n.tag_name().name().to_string())
            .collect();
        assert_eq!(sections, ["elements", "behaviors", "physics"]);
        assert_eq!(artifact.metrics["element_count"], 2);
        assert_eq!(artifact.metrics["group_count"], 2);
    }

    #[test]
    fn emitted_elements_reclassify_identically() {
        let snapshot = sample_snapshot();
        let artifact = encode(&snapshot).unwrap();
        let text = String::from_utf8(artifact.payload).unwrap();

        let reextracted = ExtractionPipeline::new().extract(&text, "B1", "F1").unwrap();
        assert_eq!(reextracted.elements.len(), snapshot.elements.len());
        for original in &snapshot.elements {
            let recovered = reextracted
                .elements
                .iter()
                .find(|e| e.id == original.id)
                .unwrap();
            assert_eq!(recovered.system, original.system, "system for {}", original.id);
            assert_eq!(recovered.subtype, original.subtype, "subtype for {}", original.id);
        }
    }

    #[test]
    fn escapes_attribute_values() {
        assert_eq!(xml_escape(r#"a<b>&"c""#), "a&lt;b&gt;&amp;&quot;c&quot;");
    }
}
