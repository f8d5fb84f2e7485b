//! Core domain types for PlanForge.
//!
//! String representations are the canonical on-disk forms: the job store
//! persists `as_str()` values and `from_str_loose()` accepts whatever the
//! CLI or an upstream caller hands us.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// SystemKind
// ---------------------------------------------------------------------------

/// Building systems an extracted element can belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SystemKind {
    Electrical,
    Plumbing,
    FireAlarm,
    LowVoltage,
    Network,
    Mechanical,
    Security,
    AudioVisual,
    BuildingAutomation,
    Structural,
    Svgx,
    Unknown,
}

impl SystemKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Electrical => "electrical",
            Self::Plumbing => "plumbing",
            Self::FireAlarm => "fire_alarm",
            Self::LowVoltage => "low_voltage",
            Self::Network => "network",
            Self::Mechanical => "mechanical",
            Self::Security => "security",
            Self::AudioVisual => "audio_visual",
            Self::BuildingAutomation => "building_automation",
            Self::Structural => "structural",
            Self::Svgx => "svgx",
            Self::Unknown => "unknown",
        }
    }

    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "electrical" | "e" => Some(Self::Electrical),
            "plumbing" | "p" => Some(Self::Plumbing),
            "fire_alarm" | "fa" => Some(Self::FireAlarm),
            "low_voltage" | "lv" => Some(Self::LowVoltage),
            "network" | "n" => Some(Self::Network),
            "mechanical" | "m" => Some(Self::Mechanical),
            "security" => Some(Self::Security),
            "audio_visual" | "av" => Some(Self::AudioVisual),
            "building_automation" | "bas" => Some(Self::BuildingAutomation),
            "structural" => Some(Self::Structural),
            "svgx" => Some(Self::Svgx),
            "unknown" => Some(Self::Unknown),
            _ => None,
        }
    }

    /// Canonical layer-group id used when emitting SVGX-native documents.
    ///
    /// Chosen so re-classifying an emitted document through the ordered
    /// group table recovers the same system (see `classifier::tables`).
    pub fn group_id(&self) -> &'static str {
        match self {
            Self::Electrical => "electrical",
            Self::Plumbing => "plumbing",
            Self::FireAlarm => "fire_alarm",
            Self::LowVoltage => "low_voltage",
            Self::Network => "network",
            Self::Mechanical => "mechanical",
            Self::Security => "security",
            Self::AudioVisual => "audio",
            Self::BuildingAutomation => "controls",
            Self::Structural => "structural",
            Self::Svgx => "svgx_native",
            Self::Unknown => "unclassified",
        }
    }
}

impl std::fmt::Display for SystemKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// GeometryKind
// ---------------------------------------------------------------------------

/// Graphic primitive shapes recognized by the geometry extractor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeometryKind {
    Circle,
    Rectangle,
    Ellipse,
    Line,
    Polygon,
    Polyline,
    Path,
    Text,
    Group,
    Unknown,
}

impl GeometryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Circle => "circle",
            Self::Rectangle => "rectangle",
            Self::Ellipse => "ellipse",
            Self::Line => "line",
            Self::Polygon => "polygon",
            Self::Polyline => "polyline",
            Self::Path => "path",
            Self::Text => "text",
            Self::Group => "group",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for GeometryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// ElementMetadata
// ---------------------------------------------------------------------------

/// Open metadata attached to every extracted element.
///
/// `properties` holds `data-`/`svgx-` prefixed attributes with the prefix
/// stripped; `raw_attributes` preserves the node's full attribute map.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ElementMetadata {
    pub namespace: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub component_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub layer: Option<String>,
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
    #[serde(default)]
    pub raw_attributes: BTreeMap<String, String>,
}

// ---------------------------------------------------------------------------
// ElementPayload
// ---------------------------------------------------------------------------

/// System-specific element data.
///
/// Electrical, plumbing, and fire-alarm elements carry optional typed
/// fields pulled from the node's property bag; everything else is
/// `Generic`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ElementPayload {
    Electrical {
        #[serde(skip_serializing_if = "Option::is_none")]
        circuit: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        voltage: Option<f64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        panel: Option<String>,
    },
    Plumbing {
        #[serde(skip_serializing_if = "Option::is_none")]
        line_type: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        diameter: Option<f64>,
    },
    FireAlarm {
        #[serde(skip_serializing_if = "Option::is_none")]
        zone: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        candela: Option<f64>,
    },
    Generic,
}

// ---------------------------------------------------------------------------
// SystemElement
// ---------------------------------------------------------------------------

/// A classified building-system element extracted from a drawing.
///
/// Immutable once produced by an extraction pass; ids are unique within a
/// single [`crate::extract::ExtractionResult`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemElement {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub system: SystemKind,
    pub subtype: String,
    /// Anchor point (x, y) in drawing coordinates.
    pub anchor: (f64, f64),
    pub geometry: GeometryKind,
    pub metadata: ElementMetadata,
    pub payload: ElementPayload,
}

// ---------------------------------------------------------------------------
// ExportFormat
// ---------------------------------------------------------------------------

/// Target interchange formats for the export engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportFormat {
    IfcLite,
    Gltf,
    Svgx,
    Excel,
    Parquet,
    GeoJson,
    Csv,
}

impl ExportFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::IfcLite => "ifc_lite",
            Self::Gltf => "gltf",
            Self::Svgx => "svgx",
            Self::Excel => "excel",
            Self::Parquet => "parquet",
            Self::GeoJson => "geojson",
            Self::Csv => "csv",
        }
    }

    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "ifc_lite" | "ifc-lite" | "ifc" => Some(Self::IfcLite),
            "gltf" | "gltf2" => Some(Self::Gltf),
            "svgx" => Some(Self::Svgx),
            "excel" | "xlsx" => Some(Self::Excel),
            "parquet" => Some(Self::Parquet),
            "geojson" => Some(Self::GeoJson),
            "csv" => Some(Self::Csv),
            _ => None,
        }
    }

    /// File extension (no dot) for emitted artifacts.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::IfcLite => "ifc",
            Self::Gltf => "gltf",
            Self::Svgx => "svgx",
            Self::Excel => "xlsx",
            Self::Parquet => "parquet",
            Self::GeoJson => "geojson",
            Self::Csv => "csv",
        }
    }

    pub fn all() -> &'static [ExportFormat] {
        &[
            Self::IfcLite,
            Self::Gltf,
            Self::Svgx,
            Self::Excel,
            Self::Parquet,
            Self::GeoJson,
            Self::Csv,
        ]
    }
}

impl std::fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// ExportQuality
// ---------------------------------------------------------------------------

/// Export fidelity tier. Higher tiers run stricter validation and apply
/// size optimization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportQuality {
    Draft,
    Standard,
    High,
    Professional,
    Publication,
}

impl ExportQuality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Standard => "standard",
            Self::High => "high",
            Self::Professional => "professional",
            Self::Publication => "publication",
        }
    }

    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "draft" => Some(Self::Draft),
            "standard" => Some(Self::Standard),
            "high" => Some(Self::High),
            "professional" => Some(Self::Professional),
            "publication" => Some(Self::Publication),
            _ => None,
        }
    }

    /// Structural validation beyond existence/size checks.
    pub fn strict_validation(&self) -> bool {
        matches!(self, Self::High | Self::Professional | Self::Publication)
    }

    /// Whether the optimization pass compresses the reported size.
    pub fn optimizes(&self) -> bool {
        matches!(self, Self::Professional | Self::Publication)
    }
}

impl std::fmt::Display for ExportQuality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// JobStatus
// ---------------------------------------------------------------------------

/// Export job state machine.
///
/// `Pending -> Processing -> (Validating -> Optimizing ->) Completed | Failed`;
/// `Pending -> Cancelled`; a `Processing` job may also be marked `Cancelled`
/// cooperatively. No transition ever leaves a terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Processing,
    Validating,
    Optimizing,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Validating => "validating",
            Self::Optimizing => "optimizing",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "processing" => Some(Self::Processing),
            "validating" => Some(Self::Validating),
            "optimizing" => Some(Self::Optimizing),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// ExportJob
// ---------------------------------------------------------------------------

/// Durable record of one export job, mirroring the `export_jobs` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportJob {
    pub job_id: String,
    pub building_id: String,
    pub format: ExportFormat,
    pub quality: ExportQuality,
    #[serde(default)]
    pub options: serde_json::Map<String, serde_json::Value>,
    pub status: JobStatus,
    /// RFC 3339 timestamps.
    pub created_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation_results: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub optimization_metrics: Option<serde_json::Value>,
    /// Structural metrics reported by the encoder (element/mesh/feature
    /// counts), persisted for analytics queries.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analytics: Option<serde_json::Value>,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

// ---------------------------------------------------------------------------
// ExportBatch
// ---------------------------------------------------------------------------

/// A group of export jobs submitted and tracked together under one
/// priority.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportBatch {
    pub batch_id: String,
    pub job_ids: Vec<String>,
    pub priority: i64,
    pub status: JobStatus,
    pub created_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<String>,
}

// ---------------------------------------------------------------------------
// ExportAnalytics
// ---------------------------------------------------------------------------

/// Lifetime export analytics maintained by the engine.
///
/// The moving average follows `new_avg = (old_avg * (n - 1) + d) / n`
/// where `n` counts successful exports after the update.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExportAnalytics {
    pub total_exports: u64,
    pub successful_exports: u64,
    pub failed_exports: u64,
    pub average_processing_time: f64,
    #[serde(default)]
    pub format_distribution: BTreeMap<String, u64>,
    #[serde(default)]
    pub quality_distribution: BTreeMap<String, u64>,
    #[serde(default)]
    pub error_distribution: BTreeMap<String, u64>,
}

impl ExportAnalytics {
    /// Record a successful export and fold its duration into the moving
    /// average.
    pub fn record_success(
        &mut self,
        format: ExportFormat,
        quality: ExportQuality,
        duration_secs: f64,
    ) {
        self.total_exports += 1;
        self.successful_exports += 1;
        let n = self.successful_exports as f64;
        self.average_processing_time =
            (self.average_processing_time * (n - 1.0) + duration_secs) / n;
        *self
            .format_distribution
            .entry(format.as_str().to_string())
            .or_insert(0) += 1;
        *self
            .quality_distribution
            .entry(quality.as_str().to_string())
            .or_insert(0) += 1;
    }

    /// Record a failed export under a coarse error class.
    pub fn record_failure(&mut self, error_class: &str) {
        self.total_exports += 1;
        self.failed_exports += 1;
        *self
            .error_distribution
            .entry(error_class.to_string())
            .or_insert(0) += 1;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
