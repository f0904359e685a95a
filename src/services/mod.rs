//! Domain services: ingestion, debouncing, aggregation and chart input
//! preparation. Everything here is storage-backed or pure; chat concerns
//! live in [`crate::bot`].

pub mod aggregate;
pub mod chart;
pub mod dedup;
pub mod ingest;

pub use chart::{ChartInput, ChartRenderer};
pub use dedup::debounce;
pub use ingest::{ArchiveEntry, ArchiveKind, ArchiveOpener, IngestReport, Ingestor};
