// src/error.rs
//! The one error class that escapes a report build.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReportError {
    /// A section every report must carry could not be built.
    #[error("mandatory section `{section}` failed: {message}")]
    MandatorySection { section: String, message: String },
}

impl ReportError {
    pub fn section(&self) -> &str {
        match self {
            ReportError::MandatorySection { section, .. } => section,
        }
    }
}
