// src/ingest/mod.rs
//! Market-data ingestion: per-source policy (cache + rate limit), provider
//! adapters and the concurrent aggregator built on top of them.

pub mod aggregator;
pub mod cache;
pub mod providers;
pub mod rate_limiter;
pub mod source;
pub mod types;
pub mod upstream;

pub use aggregator::{Aggregator, Snapshot, SourceError};
pub use cache::{Cache, CacheStore, CallArgs, MemoryStore};
pub use providers::Sources;
pub use rate_limiter::{RateLimiter, RateLimiterRegistry};
pub use source::{DataSource, SourcePolicy};
