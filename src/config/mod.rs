//! Runtime configuration: file (TOML/JSON) + environment.

pub mod settings;

pub use settings::{Settings, SourceSettings, Timeouts};
