// src/reports/mod.rs
//! Report assembly over one snapshot.

pub mod builder;
pub mod derive;
pub mod models;
pub mod research;
pub mod sections;

pub use builder::{ReportBuilder, SnapshotSource, REPORT_VERSION};
pub use models::{Report, ReportConfig, ReportLevel};
pub use research::{MemoryResearchStore, ResearchRetriever, ResearchStore};
