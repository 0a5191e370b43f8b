//! marketview binary entrypoint.
//! Wires settings, cache, limiters and providers into an [`Aggregator`] and a
//! [`ReportBuilder`], runs one command and prints JSON to stdout.
//!
//! Usage: `marketview <health|quick|snapshot|report [brief|standard|deep]>`

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use serde::Serialize;
use tracing::info;

use marketview::ingest::{Cache, RateLimiterRegistry, Sources};
use marketview::llm::LlmClientFactory;
use marketview::reports::sections::TechnicalsBuilder;
use marketview::{telemetry, Aggregator, ReportBuilder, ReportConfig, ReportLevel, Settings};

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    telemetry::init_tracing();

    let settings = Settings::load_default().context("loading settings")?;
    let limiters = RateLimiterRegistry::new();
    let sources = Sources::from_settings(&settings, Cache::memory(), &limiters)?;
    let aggregator = Arc::new(Aggregator::from_sources(&sources, settings.timeouts.clone()));

    let mut args = std::env::args().skip(1);
    let command = args.next().unwrap_or_else(|| "quick".to_string());
    info!(command = %command, "marketview starting");

    match command.as_str() {
        "health" => print_json(&aggregator.health_check_all().await),
        "quick" => print_json(&aggregator.quick_snapshot().await),
        "snapshot" => print_json(&aggregator.snapshot().await),
        "report" => {
            let level: ReportLevel = match args.next() {
                Some(l) => l.parse()?,
                None => ReportLevel::Standard,
            };
            let factory = LlmClientFactory::new(settings.llm.clone(), settings.timeouts.enhancement());
            let technicals = TechnicalsBuilder::new().with_price_history(Arc::new(sources.clone()));
            let builder = ReportBuilder::new(aggregator, settings.timeouts.clone())
                .with_technicals_builder(Arc::new(technicals))
                .with_generators(Arc::new(factory));
            let mut config = ReportConfig::for_level(level);
            if let Ok(p) = std::env::var("MARKETVIEW_LLM_PROVIDER") {
                config.llm_provider = Some(p.parse()?);
            }
            let report = builder.build(config).await?;
            print_json(&report)
        }
        other => bail!("unknown command `{other}` (expected health, quick, snapshot or report)"),
    }
}
