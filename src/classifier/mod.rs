//! Element classification over parsed SVG/XML nodes.
//!
//! Pure, stateless functions: given a `roxmltree` node they resolve the
//! vendor namespace, map the node to a (system, subtype) pair through the
//! ordered tables in [`tables`], and pull out anchor geometry and metadata.
//! Nothing here allocates a document or holds state between calls.

pub mod tables;

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;
use roxmltree::Node;

use crate::types::{ElementMetadata, GeometryKind, SystemKind};

/// Attribute carrying an explicit vendor namespace declaration.
const NAMESPACE_ATTR: &str = "data-namespace";

/// Vendor extension token searched for in attribute names and values.
const SVGX_TOKEN: &str = "svgx";

// ---------------------------------------------------------------------------
// Namespace resolution
// ---------------------------------------------------------------------------

/// Resolve the vendor namespace for a node.
///
/// Checks the explicit namespace attribute on the node, then each ancestor.
/// Failing that, scans attribute names and values case-insensitively for
/// the SVGX token, again node first and then ancestors. Returns "" when
/// nothing matches.
pub fn resolve_namespace(node: Node<'_, '_>) -> String {
    if let Some(ns) = node.attribute(NAMESPACE_ATTR) {
        return ns.to_string();
    }
    for ancestor in node.ancestors().skip(1) {
        if let Some(ns) = ancestor.attribute(NAMESPACE_ATTR) {
            return ns.to_string();
        }
    }

    if attributes_mention_svgx(node) {
        return SVGX_TOKEN.to_string();
    }
    for ancestor in node.ancestors().skip(1) {
        if attributes_mention_svgx(ancestor) {
            return SVGX_TOKEN.to_string();
        }
    }

    String::new()
}

fn attributes_mention_svgx(node: Node<'_, '_>) -> bool {
    node.attributes().any(|attr| {
        attr.name().to_lowercase().contains(SVGX_TOKEN)
            || attr.value().to_lowercase().contains(SVGX_TOKEN)
    })
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// Map a node to a (system, subtype) pair.
///
/// An SVGX namespace short-circuits to `(Svgx, "generic")`. Otherwise the
/// default is `(Structural, "unknown")`, refined first by the nearest
/// ancestor group id through the ordered group table, then by the label
/// through the ordered subtype patterns. A label match refines the subtype
/// only, never the system.
pub fn classify(node: Node<'_, '_>, label: Option<&str>, namespace: &str) -> (SystemKind, String) {
    if namespace.to_lowercase().contains(SVGX_TOKEN) {
        return (SystemKind::Svgx, "generic".to_string());
    }

    let mut system = SystemKind::Structural;
    let mut subtype = "unknown".to_string();

    for ancestor in node.ancestors().skip(1) {
        if !ancestor.has_tag_name("g") {
            continue;
        }
        let Some(group_id) = ancestor.attribute("id") else {
            continue;
        };
        if let Some(matched) = tables::system_for_group_id(group_id) {
            system = matched;
            break;
        }
    }

    if let Some(label) = label {
        if let Some(matched) = tables::subtype_for_label(label) {
            subtype = matched.to_string();
        }
    }

    (system, subtype)
}

// ---------------------------------------------------------------------------
// Geometry
// ---------------------------------------------------------------------------

fn path_move_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        // First move command: "M x,y" or "m x y".
        Regex::new(r"(?i)m\s*(-?[0-9]*\.?[0-9]+)[\s,]+(-?[0-9]*\.?[0-9]+)")
            .expect("valid literal regex")
    })
}

/// Read a numeric attribute. A missing attribute defaults to 0.0; a present
/// but unparseable one returns `None` so the caller can degrade to Unknown.
fn coord(node: Node<'_, '_>, attr: &str) -> Option<f64> {
    match node.attribute(attr) {
        None => Some(0.0),
        Some(raw) => raw.trim().parse().ok(),
    }
}

/// First coordinate pair from a polygon/polyline `points` attribute.
fn first_point(points: &str) -> Option<(f64, f64)> {
    let mut numbers = points
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|s| !s.is_empty());
    let x = numbers.next()?.parse().ok()?;
    let y = numbers.next()?.parse().ok()?;
    Some((x, y))
}

/// Extract the anchor point and geometry kind for a node.
///
/// Never panics: any numeric-parse failure yields `((0.0, 0.0), Unknown)`.
/// Groups recurse into children and report the first non-origin child
/// anchor with kind `Group`.
pub fn extract_geometry(node: Node<'_, '_>) -> ((f64, f64), GeometryKind) {
    let bad = ((0.0, 0.0), GeometryKind::Unknown);
    match node.tag_name().name() {
        "circle" => match (coord(node, "cx"), coord(node, "cy")) {
            (Some(x), Some(y)) => ((x, y), GeometryKind::Circle),
            _ => bad,
        },
        "rect" => match (coord(node, "x"), coord(node, "y")) {
            (Some(x), Some(y)) => ((x, y), GeometryKind::Rectangle),
            _ => bad,
        },
        "ellipse" => match (coord(node, "cx"), coord(node, "cy")) {
            (Some(x), Some(y)) => ((x, y), GeometryKind::Ellipse),
            _ => bad,
        },
        "line" => match (coord(node, "x1"), coord(node, "y1")) {
            (Some(x), Some(y)) => ((x, y), GeometryKind::Line),
            _ => bad,
        },
        "polygon" => match node.attribute("points").map(first_point) {
            Some(Some(anchor)) => (anchor, GeometryKind::Polygon),
            Some(None) => bad,
            None => ((0.0, 0.0), GeometryKind::Polygon),
        },
        "polyline" => match node.attribute("points").map(first_point) {
            Some(Some(anchor)) => (anchor, GeometryKind::Polyline),
            Some(None) => bad,
            None => ((0.0, 0.0), GeometryKind::Polyline),
        },
        "path" => {
            let anchor = node
                .attribute("d")
                .and_then(|d| path_move_regex().captures(d))
                .and_then(|caps| {
                    let x = caps.get(1)?.as_str().parse().ok()?;
                    let y = caps.get(2)?.as_str().parse().ok()?;
                    Some((x, y))
                })
                .unwrap_or((0.0, 0.0));
            (anchor, GeometryKind::Path)
        }
        "text" => match (coord(node, "x"), coord(node, "y")) {
            (Some(x), Some(y)) => ((x, y), GeometryKind::Text),
            _ => bad,
        },
        "g" => {
            for child in node.children().filter(Node::is_element) {
                let (anchor, _) = extract_geometry(child);
                if anchor != (0.0, 0.0) {
                    return (anchor, GeometryKind::Group);
                }
            }
            ((0.0, 0.0), GeometryKind::Group)
        }
        _ => bad,
    }
}

// ---------------------------------------------------------------------------
// Metadata
// ---------------------------------------------------------------------------

/// Collect element metadata from a node.
///
/// `component_type` prefers the dedicated component attribute and falls
/// back to `class`; `parent_id` is the nearest ancestor id; `properties`
/// gathers every `data-`/`svgx-` prefixed attribute with its prefix
/// stripped (the namespace attribute itself excluded).
pub fn extract_metadata(node: Node<'_, '_>, namespace: &str) -> ElementMetadata {
    let component_type = node
        .attribute("data-component")
        .or_else(|| node.attribute("class"))
        .map(str::to_string);

    let parent_id = node
        .ancestors()
        .skip(1)
        .find_map(|a| a.attribute("id"))
        .map(str::to_string);

    let layer = node.attribute("data-layer").map(str::to_string);

    let mut properties = BTreeMap::new();
    let mut raw_attributes = BTreeMap::new();
    for attr in node.attributes() {
        let name = attr.name();
        raw_attributes.insert(name.to_string(), attr.value().to_string());
        if name == NAMESPACE_ATTR {
            continue;
        }
        if let Some(stripped) = name.strip_prefix("data-").or_else(|| name.strip_prefix("svgx-")) {
            properties.insert(stripped.to_string(), attr.value().to_string());
        }
    }

    ElementMetadata {
        namespace: namespace.to_string(),
        component_type,
        parent_id,
        layer,
        properties,
        raw_attributes,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
