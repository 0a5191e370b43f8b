// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod analyze;
pub mod config;
pub mod error;
pub mod fanout;
pub mod ingest;
pub mod llm;
pub mod reports;
pub mod telemetry;

// ---- Re-exports for stable public API ----
pub use crate::config::Settings;
pub use crate::error::ReportError;
pub use crate::ingest::{Aggregator, Snapshot};
pub use crate::reports::{Report, ReportBuilder, ReportConfig, ReportLevel};
