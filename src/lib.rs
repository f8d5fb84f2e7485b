//! PlanForge: floorplan intelligence library.
//!
//! Ingests SVG/XML building floorplans, classifies every graphic primitive
//! into a building-system element (electrical, plumbing, fire-alarm, ...),
//! and exposes those elements through an asynchronous, priority-queued
//! export engine serializing to IFC-lite, glTF, SVGX-native, Excel,
//! Parquet, GeoJSON, and CSV.

pub mod classifier;
pub mod config;
pub mod db;
pub mod encode;
pub mod error;
pub mod export;
pub mod extract;
pub mod observability;
pub mod snapshot;
pub mod types;
