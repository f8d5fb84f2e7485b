//! IFC-lite encoder: an ISO-10303-21 (STEP) document with one proxy entity
//! record per element.

use chrono::Utc;

use crate::error::Result;
use crate::snapshot::BuildingSnapshot;
use crate::types::ExportQuality;

use super::Artifact;

pub fn encode(snapshot: &BuildingSnapshot, quality: ExportQuality) -> Result<Artifact> {
    let mut out = String::new();
    out.push_str("ISO-10303-21;\n");
    out.push_str("HEADER;\n");
    out.push_str("FILE_DESCRIPTION(('PlanForge IFC-lite export'),'2;1');\n");
    out.push_str(&format!(
        "FILE_NAME('{}.ifc','{}',('planforge'),(''),'','planforge','');\n",
        step_escape(&snapshot.building_id),
        Utc::now().to_rfc3339(),
    ));
    out.push_str("FILE_SCHEMA(('IFC4'));\n");
    out.push_str("ENDSEC;\n");
    out.push_str("DATA;\n");

    let mut entity_id = 0u64;
    entity_id += 1;
    out.push_str(&format!(
        "#{}=IFCBUILDING('{}',$,'{}',$);\n",
        entity_id,
        step_escape(&snapshot.building_id),
        step_escape(snapshot.floor_id.as_deref().unwrap_or("")),
    ));
    for element in &snapshot.elements {
        entity_id += 1;
        out.push_str(&format!(
            "#{}=IFCBUILDINGELEMENTPROXY('{}','{}','{}','{}',({:.3},{:.3}));\n",
            entity_id,
            step_escape(&element.id),
            step_escape(element.label.as_deref().unwrap_or("")),
            element.system.as_str(),
            step_escape(&element.subtype),
            element.anchor.0,
            element.anchor.1,
        ));
    }
    out.push_str("ENDSEC;\n");
    out.push_str("END-ISO-10303-21;\n");

    let detail_level = if quality.strict_validation() { 1 } else { 0 };
    Ok(Artifact::new(out.into_bytes())
        .with_metric("entity_count", entity_id)
        .with_metric("element_count", snapshot.elements.len() as u64)
        .with_metric("detail_level", detail_level))
}

/// STEP strings quote apostrophes by doubling them.
fn step_escape(s: &str) -> String {
    s.replace('\'', "''")
}

#[cfg(test)]
mod tests {
    use super::super::tests::sample_snapshot;
    use super::*;

    #[test]
    fn emits_step_framing_and_entities() {
        let artifact = encode(&sample_snapshot(), ExportQuality::Standard).unwrap();
        let text = String::from_utf8(artifact.payload).unwrap();
        assert!(text.starts_with("ISO-10303-21;"));
        assert!(text.contains("IFCBUILDINGELEMENTPROXY('e1','Duplex Outlet','electrical','outlet',(5.000,5.000))"));
        assert!(text.ends_with("END-ISO-10303-21;\n"));
        assert_eq!(artifact.metrics["element_count"], 2);
        assert_eq!(artifact.metrics["entity_count"], 3);
    }

    #[test]
    fn escapes_apostrophes() {
        assert_eq!(step_escape("o'brien"), "o''brien");
    }
}
