// src/telemetry.rs
//! Tracing setup for the binary and one-time metric descriptions.
//!
//! The library only records through the `metrics` facade; whichever recorder
//! the embedding process installs receives the series.

use metrics::{describe_counter, describe_histogram};
use once_cell::sync::OnceCell;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

pub const DEFAULT_LOG_FILTER: &str = "marketview=info,warn";

/// One-time metrics registration so every series carries a description.
pub fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_histogram!(
            "rate_limiter_wait_ms",
            "Time spent waiting for a rate-limit token, in milliseconds."
        );
        describe_counter!(
            "cache_backend_errors_total",
            "Cache backend failures absorbed as misses/no-ops, by op."
        );
        describe_counter!("source_cache_hits_total", "Source calls answered from cache.");
        describe_counter!(
            "source_cache_misses_total",
            "Source calls that went upstream."
        );
        describe_counter!("source_fetch_errors_total", "Upstream fetch failures, by source.");
        describe_counter!(
            "aggregator_category_failures_total",
            "Snapshot categories that ended in an error, by category."
        );
        describe_histogram!("aggregator_snapshot_ms", "Full snapshot wall time in milliseconds.");
        describe_counter!(
            "report_section_failures_total",
            "Optional report sections omitted after a failure."
        );
        describe_counter!(
            "report_enhancement_fallbacks_total",
            "Narrative enhancements that fell back to deterministic text."
        );
        describe_histogram!("report_build_ms", "Report build wall time in milliseconds.");
    });
}

/// Install the global subscriber. `LOG_FORMAT=json` switches to JSON lines;
/// `RUST_LOG` overrides the default filter. Safe to call twice.
pub fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    let res = if json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
    } else {
        registry
            .with(fmt::layer().compact().with_writer(std::io::stderr))
            .try_init()
    };
    if res.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}
