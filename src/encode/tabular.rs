//! Tabular encoders: CSV, Excel (XLSX), and Parquet.
//!
//! All three share one flat row shape per element; only the container
//! format differs.

use std::sync::Arc;

use parquet::basic::Compression;
use parquet::data_type::{ByteArray, ByteArrayType, DoubleType};
use parquet::file::properties::WriterProperties;
use parquet::file::writer::SerializedFileWriter;
use parquet::schema::parser::parse_message_type;
use rust_xlsxwriter::Workbook;

use crate::error::{PlanforgeError, Result};
use crate::snapshot::BuildingSnapshot;

use super::Artifact;

const COLUMNS: &[&str] = &[
    "element_id",
    "building_id",
    "system",
    "subtype",
    "label",
    "geometry",
    "anchor_x",
    "anchor_y",
];

// ---------------------------------------------------------------------------
// CSV
// ---------------------------------------------------------------------------

pub fn encode_csv(snapshot: &BuildingSnapshot) -> Result<Artifact> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record(COLUMNS)
        .map_err(|e| PlanforgeError::Encoding(format!("csv header: {e}")))?;
    for element in &snapshot.elements {
        writer
            .write_record([
                element.id.as_str(),
                snapshot.building_id.as_str(),
                element.system.as_str(),
                element.subtype.as_str(),
                element.label.as_deref().unwrap_or(""),
                element.geometry.as_str(),
                &element.anchor.0.to_string(),
                &element.anchor.1.to_string(),
            ])
            .map_err(|e| PlanforgeError::Encoding(format!("csv row: {e}")))?;
    }
    let payload = writer
        .into_inner()
        .map_err(|e| PlanforgeError::Encoding(format!("csv flush: {e}")))?;

    Ok(Artifact::new(payload).with_metric("element_count", snapshot.elements.len() as u64))
}

// ---------------------------------------------------------------------------
// Excel
// ---------------------------------------------------------------------------

pub fn encode_excel(snapshot: &BuildingSnapshot) -> Result<Artifact> {
    let excel_err = |e: rust_xlsxwriter::XlsxError| PlanforgeError::Encoding(format!("xlsx: {e}"));

    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name("Elements").map_err(excel_err)?;

    for (col, name) in COLUMNS.iter().enumerate() {
        sheet.write_string(0, col as u16, *name).map_err(excel_err)?;
    }
    for (i, element) in snapshot.elements.iter().enumerate() {
        let row = (i + 1) as u32;
        sheet.write_string(row, 0, &element.id).map_err(excel_err)?;
        sheet
            .write_string(row, 1, &snapshot.building_id)
            .map_err(excel_err)?;
        sheet
            .write_string(row, 2, element.system.as_str())
            .map_err(excel_err)?;
        sheet
            .write_string(row, 3, &element.subtype)
            .map_err(excel_err)?;
        sheet
            .write_string(row, 4, element.label.as_deref().unwrap_or(""))
            .map_err(excel_err)?;
        sheet
            .write_string(row, 5, element.geometry.as_str())
            .map_err(excel_err)?;
        sheet.write_number(row, 6, element.anchor.0).map_err(excel_err)?;
        sheet.write_number(row, 7, element.anchor.1).map_err(excel_err)?;
    }

    let payload = workbook.save_to_buffer().map_err(excel_err)?;
    Ok(Artifact::new(payload)
        .with_metric("element_count", snapshot.elements.len() as u64)
        .with_metric("sheet_count", 1))
}

// ---------------------------------------------------------------------------
// Parquet
// ---------------------------------------------------------------------------

const PARQUET_SCHEMA: &str = "
    message system_element {
        required binary element_id (UTF8);
        required binary building_id (UTF8);
        required binary system (UTF8);
        required binary subtype (UTF8);
        required binary label (UTF8);
        required binary geometry (UTF8);
        required double anchor_x;
        required double anchor_y;
    }
";

pub fn encode_parquet(snapshot: &BuildingSnapshot) -> Result<Artifact> {
    let parquet_err =
        |e: parquet::errors::ParquetError| PlanforgeError::Encoding(format!("parquet: {e}"));

    let schema = Arc::new(parse_message_type(PARQUET_SCHEMA).map_err(parquet_err)?);
    let props = Arc::new(
        WriterProperties::builder()
            .set_compression(Compression::UNCOMPRESSED)
            .build(),
    );

    let strings = |f: &dyn Fn(&crate::snapshot::ElementSnapshot) -> String| -> Vec<ByteArray> {
        snapshot
            .elements
            .iter()
            .map(|e| ByteArray::from(f(e).as_str()))
            .collect()
    };
    let string_columns: [Vec<ByteArray>; 6] = [
        strings(&|e| e.id.clone()),
        strings(&|_| snapshot.building_id.clone()),
        strings(&|e| e.system.as_str().to_string()),
        strings(&|e| e.subtype.clone()),
        strings(&|e| e.label.clone().unwrap_or_default()),
        strings(&|e| e.geometry.as_str().to_string()),
    ];
    let xs: Vec<f64> = snapshot.elements.iter().map(|e| e.anchor.0).collect();
    let ys: Vec<f64> = snapshot.elements.iter().map(|e| e.anchor.1).collect();

    let mut buffer = Vec::new();
    let mut writer =
        SerializedFileWriter::new(&mut buffer, schema, props).map_err(parquet_err)?;
    let mut row_group = writer.next_row_group().map_err(parquet_err)?;
    let mut col_idx = 0usize;
    while let Some(mut column) = row_group.next_column().map_err(parquet_err)? {
        match col_idx {
            0..=5 => {
                column
                    .typed::<ByteArrayType>()
                    .write_batch(&string_columns[col_idx], None, None)
                    .map_err(parquet_err)?;
            }
            6 => {
                column
                    .typed::<DoubleType>()
                    .write_batch(&xs, None, None)
                    .map_err(parquet_err)?;
            }
            _ => {
                column
                    .typed::<DoubleType>()
                    .write_batch(&ys, None, None)
                    .map_err(parquet_err)?;
            }
        }
        column.close().map_err(parquet_err)?;
        col_idx += 1;
    }
    row_group.close().map_err(parquet_err)?;
    writer.close().map_err(parquet_err)?;

    Ok(Artifact::new(buffer)
        .with_metric("element_count", snapshot.elements.len() as u64)
        .with_metric("row_group_count", 1))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::super::tests::sample_snapshot;
    use super::*;

    #[test]
    fn csv_has_header_and_one_row_per_element() {
        let artifact = encode_csv(&sample_snapshot()).unwrap();
        let text = String::from_utf8(artifact.payload).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("element_id,building_id,system"));
        assert!(lines[1].contains("e1,B1,electrical,outlet,Duplex Outlet,circle,5,5"));
        assert_eq!(artifact.metrics["element_count"], 2);
    }

    #[test]
    fn excel_emits_zip_container() {
        let artifact = encode_excel(&sample_snapshot()).unwrap();
        assert!(artifact.payload.starts_with(b"PK"));
        assert_eq!(artifact.metrics["sheet_count"], 1);
    }

    #[test]
    fn parquet_emits_magic_framing() {
        let artifact = encode_parquet(&sample_snapshot()).unwrap();
        assert!(artifact.payload.starts_with(b"PAR1"));
        assert!(artifact.payload.ends_with(b"PAR1"));
        assert_eq!(artifact.metrics["element_count"], 2);
    }

    #[test]
    fn parquet_handles_empty_snapshot() {
        let snapshot = BuildingSnapshot {
            building_id: "B1".into(),
            floor_id: None,
            elements: Vec::new(),
        };
        let artifact = encode_parquet(&snapshot).unwrap();
        assert!(artifact.payload.starts_with(b"PAR1"));
        assert_eq!(artifact.metrics["element_count"], 0);
    }
}
