//! PlanForge CLI - extract building systems from SVG floorplans and run
//! export jobs against the embedded engine.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use planforge::config::EngineConfig;
use planforge::error::{PlanforgeError, Result};
use planforge::export::ExportEngine;
use planforge::extract::ExtractionPipeline;
use planforge::observability::init_logging;
use planforge::snapshot::{snapshot_from_extraction, InMemorySnapshotProvider};
use planforge::types::{ExportFormat, ExportQuality};

#[derive(Parser)]
#[command(name = "planforge", version, about = "Floorplan intelligence engine")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Extract system elements from an SVG floorplan and print them as JSON.
    Extract {
        /// Path to the SVG/XML drawing.
        input: PathBuf,
        /// Building id recorded on the extraction result.
        #[arg(long, default_value = "building-1")]
        building_id: String,
        /// Floor id recorded on the extraction result.
        #[arg(long, default_value = "floor-1")]
        floor_id: String,
    },
    /// Extract a floorplan and export it through the job engine.
    Export {
        /// Path to the SVG/XML drawing.
        input: PathBuf,
        /// Target format (ifc, gltf, svgx, xlsx, parquet, geojson, csv),
        /// repeatable.
        #[arg(long = "format", required = true)]
        formats: Vec<String>,
        /// Quality tier (draft, standard, high, professional, publication).
        #[arg(long, default_value = "standard")]
        quality: String,
        #[arg(long, default_value = "building-1")]
        building_id: String,
        #[arg(long, default_value = "floor-1")]
        floor_id: String,
        /// Directory artifacts are written into.
        #[arg(long, default_value = "exports")]
        output_dir: PathBuf,
        /// Worker threads.
        #[arg(long, default_value_t = 2)]
        workers: usize,
    },
}

fn main() {
    init_logging();
    if let Err(e) = run() {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Extract {
            input,
            building_id,
            floor_id,
        } => {
            let xml = std::fs::read_to_string(&input)?;
            let result = ExtractionPipeline::new().extract(&xml, &building_id, &floor_id)?;
            println!(
                "{}",
                serde_json::to_string_pretty(&result)
                    .map_err(|e| PlanforgeError::Encoding(e.to_string()))?
            );
            Ok(())
        }
        Command::Export {
            input,
            formats,
            quality,
            building_id,
            floor_id,
            output_dir,
            workers,
        } => {
            let quality = ExportQuality::from_str_loose(&quality)
                .ok_or_else(|| PlanforgeError::InputValidation(format!("unknown quality: {quality}")))?;
            let formats = formats
                .iter()
                .map(|f| {
                    ExportFormat::from_str_loose(f).ok_or_else(|| {
                        PlanforgeError::InputValidation(format!("unknown format: {f}"))
                    })
                })
                .collect::<Result<Vec<_>>>()?;

            let xml = std::fs::read_to_string(&input)?;
            let result = ExtractionPipeline::new().extract(&xml, &building_id, &floor_id)?;
            println!(
                "extracted {} elements ({} skipped of {} visited)",
                result.elements.len(),
                result.nodes_skipped,
                result.nodes_visited
            );

            let provider = Arc::new(InMemorySnapshotProvider::new());
            provider.insert(snapshot_from_extraction(&result));

            let config = EngineConfig {
                workers,
                output_dir,
                ..EngineConfig::default()
            };
            let engine = ExportEngine::new(config, provider)?;
            let mut job_ids = Vec::new();
            for format in formats {
                let job_id =
                    engine.create_job(&building_id, format, quality, serde_json::Map::new())?;
                job_ids.push(job_id);
            }
            engine.shutdown(true)?;

            for job_id in &job_ids {
                if let Some(job) = engine.get_status(job_id)? {
                    println!(
                        "{}: {} {}",
                        job.format,
                        job.status,
                        job.file_path.unwrap_or_default()
                    );
                }
            }
            let analytics = engine.get_analytics();
            println!(
                "exports: {} ok, {} failed, avg {:.3}s",
                analytics.successful_exports,
                analytics.failed_exports,
                analytics.average_processing_time
            );
            Ok(())
        }
    }
}
