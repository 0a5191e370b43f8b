// src/reports/builder.rs
//! Report assembly: one snapshot, concurrent section builds, optional
//! research retrieval, optional narrative enhancement, then derivation.
//!
//! Mandatory sections (pulse, macro, assets, forward) fail the whole build.
//! Everything else degrades: an optional section that fails is omitted, a
//! failed retrieval yields no research context, and a failed enhancement
//! leaves its section exactly as the rules produced it. Each degradation
//! lands in `Report::warnings`.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use chrono::Utc;
use futures::FutureExt;
use metrics::{counter, histogram};
use serde_json::Value;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::analyze::{RegimeClassifier, RuleRegimeClassifier};
use crate::config::Timeouts;
use crate::error::ReportError;
use crate::fanout::{gather_ordered, NamedTask};
use crate::ingest::{Aggregator, Snapshot};
use crate::llm::{GeneratorFactory, SectionEnhancer};
use crate::reports::derive;
use crate::reports::models::{
    AssetSection, ForwardSection, MacroSection, PulseSection, Report, ReportConfig,
    SentimentSection, TechnicalsSection,
};
use crate::reports::research::{ResearchContext, ResearchRetriever};
use crate::reports::sections::{
    AssetsBuilder, ForwardBuilder, MacroBuilder, PulseBuilder, SectionBuilder, SectionContext,
    SentimentBuilder, TechnicalsBuilder,
};
use crate::telemetry::ensure_metrics_described;

pub const REPORT_VERSION: &str = "1.0";

const MANDATORY: [&str; 4] = ["pulse", "macro", "assets", "forward"];

/// Where a build takes its one snapshot from.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    async fn snapshot(&self) -> Snapshot;
}

#[async_trait]
impl SnapshotSource for Aggregator {
    async fn snapshot(&self) -> Snapshot {
        Aggregator::snapshot(self).await
    }
}

enum BuiltSection {
    Pulse(PulseSection),
    Macro(MacroSection),
    Assets(AssetSection),
    Forward(ForwardSection),
    Sentiment(SentimentSection),
    Technicals(TechnicalsSection),
}

enum Enhanced {
    Pulse(PulseSection),
    Macro(MacroSection),
    Sentiment(SentimentSection),
    Forward(ForwardSection),
}

fn section_task<B>(
    key: &'static str,
    builder: Arc<B>,
    ctx: Arc<SectionContext>,
    wrap: fn(B::Output) -> BuiltSection,
) -> NamedTask<BuiltSection>
where
    B: SectionBuilder + ?Sized + 'static,
{
    let fut = async move {
        let out = builder.build(&ctx).await?;
        debug!(section = builder.name(), "section built");
        Ok::<_, anyhow::Error>(wrap(out))
    };
    (key.to_string(), fut.boxed())
}

pub struct ReportBuilder {
    source: Arc<dyn SnapshotSource>,
    classifier: Arc<dyn RegimeClassifier>,
    pulse: Arc<dyn SectionBuilder<Output = PulseSection>>,
    macro_builder: Arc<dyn SectionBuilder<Output = MacroSection>>,
    assets: Arc<dyn SectionBuilder<Output = AssetSection>>,
    forward: Arc<dyn SectionBuilder<Output = ForwardSection>>,
    sentiment: Arc<dyn SectionBuilder<Output = SentimentSection>>,
    technicals: Arc<dyn SectionBuilder<Output = TechnicalsSection>>,
    research: Option<Arc<ResearchRetriever>>,
    generators: Option<Arc<dyn GeneratorFactory>>,
    timeouts: Timeouts,
}

impl ReportBuilder {
    /// Rule-based classifier and the stock section builders; no research
    /// store and no generator factory until configured.
    pub fn new(source: Arc<dyn SnapshotSource>, timeouts: Timeouts) -> Self {
        ensure_metrics_described();
        Self {
            source,
            classifier: Arc::new(RuleRegimeClassifier),
            pulse: Arc::new(PulseBuilder),
            macro_builder: Arc::new(MacroBuilder),
            assets: Arc::new(AssetsBuilder),
            forward: Arc::new(ForwardBuilder),
            sentiment: Arc::new(SentimentBuilder),
            technicals: Arc::new(TechnicalsBuilder::new()),
            research: None,
            generators: None,
            timeouts,
        }
    }

    pub fn with_classifier(mut self, classifier: Arc<dyn RegimeClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn with_pulse_builder(mut self, b: Arc<dyn SectionBuilder<Output = PulseSection>>) -> Self {
        self.pulse = b;
        self
    }

    pub fn with_macro_builder(mut self, b: Arc<dyn SectionBuilder<Output = MacroSection>>) -> Self {
        self.macro_builder = b;
        self
    }

    pub fn with_assets_builder(mut self, b: Arc<dyn SectionBuilder<Output = AssetSection>>) -> Self {
        self.assets = b;
        self
    }

    pub fn with_forward_builder(mut self, b: Arc<dyn SectionBuilder<Output = ForwardSection>>) -> Self {
        self.forward = b;
        self
    }

    pub fn with_sentiment_builder(
        mut self,
        b: Arc<dyn SectionBuilder<Output = SentimentSection>>,
    ) -> Self {
        self.sentiment = b;
        self
    }

    pub fn with_technicals_builder(
        mut self,
        b: Arc<dyn SectionBuilder<Output = TechnicalsSection>>,
    ) -> Self {
        self.technicals = b;
        self
    }

    pub fn with_research(mut self, retriever: ResearchRetriever) -> Self {
        self.research = Some(Arc::new(retriever));
        self
    }

    pub fn with_generators(mut self, factory: Arc<dyn GeneratorFactory>) -> Self {
        self.generators = Some(factory);
        self
    }

    pub async fn build_quick(&self) -> Result<Report, ReportError> {
        self.build(ReportConfig::brief()).await
    }

    pub async fn build_standard(&self) -> Result<Report, ReportError> {
        self.build(ReportConfig::standard()).await
    }

    pub async fn build_deep_dive(&self) -> Result<Report, ReportError> {
        self.build(ReportConfig::deep()).await
    }

    pub async fn build(&self, config: ReportConfig) -> Result<Report, ReportError> {
        let started = Instant::now();
        let created_at = Utc::now();
        let simple = Uuid::new_v4().simple().to_string();
        let report_id = format!("RPT-{}-{}", created_at.format("%Y%m%d%H%M%S"), &simple[..6]);
        let mut warnings = Vec::new();

        let snapshot = self.source.snapshot().await;
        for e in &snapshot.errors {
            warnings.push(format!("snapshot source {} failed: {}", e.source, e.message));
        }
        let ctx = Arc::new(SectionContext::new(
            config.level,
            Arc::new(snapshot),
            self.classifier.as_ref(),
        ));
        info!(report_id = %report_id, level = config.level.as_str(), regime = %ctx.regime.regime, "building report");

        let mut tasks = vec![
            section_task("pulse", self.pulse.clone(), ctx.clone(), BuiltSection::Pulse),
            section_task("macro", self.macro_builder.clone(), ctx.clone(), BuiltSection::Macro),
            section_task("assets", self.assets.clone(), ctx.clone(), BuiltSection::Assets),
            section_task("forward", self.forward.clone(), ctx.clone(), BuiltSection::Forward),
        ];
        if config.include_sentiment {
            tasks.push(section_task(
                "sentiment",
                self.sentiment.clone(),
                ctx.clone(),
                BuiltSection::Sentiment,
            ));
        } else {
            warnings.push("sentiment section not requested".to_string());
        }
        if config.include_technicals {
            tasks.push(section_task(
                "technicals",
                self.technicals.clone(),
                ctx.clone(),
                BuiltSection::Technicals,
            ));
        } else {
            warnings.push("technicals section not requested".to_string());
        }

        let (mut pulse, mut macro_section, mut assets, mut forward) = (None, None, None, None);
        let (mut sentiment, mut technicals) = (None, None);
        for (name, result) in gather_ordered(tasks, self.timeouts.section()).await {
            match result.outcome {
                Ok(BuiltSection::Pulse(s)) => pulse = Some(s),
                Ok(BuiltSection::Macro(s)) => macro_section = Some(s),
                Ok(BuiltSection::Assets(s)) => assets = Some(s),
                Ok(BuiltSection::Forward(s)) => forward = Some(s),
                Ok(BuiltSection::Sentiment(s)) => sentiment = Some(s),
                Ok(BuiltSection::Technicals(s)) => technicals = Some(s),
                Err(e) if MANDATORY.contains(&name.as_str()) => {
                    warn!(report_id = %report_id, section = %name, error = ?e, "mandatory section failed");
                    return Err(ReportError::MandatorySection {
                        section: name,
                        message: format!("{e:#}"),
                    });
                }
                Err(e) => {
                    warn!(report_id = %report_id, section = %name, error = ?e, "optional section omitted");
                    counter!("report_section_failures_total", "section" => name.clone()).increment(1);
                    warnings.push(format!("{name} section omitted: {e}"));
                }
            }
        }
        let (Some(mut pulse), Some(mut macro_section), Some(assets), Some(mut forward)) =
            (pulse, macro_section, assets, forward)
        else {
            return Err(ReportError::MandatorySection {
                section: "report".to_string(),
                message: "mandatory section missing after build".to_string(),
            });
        };

        let research = if config.include_research {
            self.retrieve(&config, &mut warnings).await
        } else {
            None
        };

        let enhancer = match config.llm_provider {
            Some(provider) => match &self.generators {
                Some(factory) => match factory.generator(provider, config.llm_model.as_deref()) {
                    Ok(g) => Some(Arc::new(
                        SectionEnhancer::new(g).with_custom_prompt(config.custom_prompt.clone()),
                    )),
                    Err(e) => {
                        warn!(report_id = %report_id, provider = provider.as_str(), error = ?e, "no generator");
                        warnings.push(format!("narrative enhancement skipped: {e}"));
                        None
                    }
                },
                None => {
                    warnings.push("narrative enhancement skipped: no generator configured".to_string());
                    None
                }
            },
            None => None,
        };

        if let Some(enhancer) = &enhancer {
            let chunks = |name: &str| {
                research
                    .as_ref()
                    .map(|r| r.for_section(name).to_vec())
                    .unwrap_or_default()
            };
            let mut tasks: Vec<NamedTask<Enhanced>> = Vec::new();
            {
                let (e, s, c) = (enhancer.clone(), pulse.clone(), chunks("pulse"));
                tasks.push((
                    "pulse".into(),
                    async move { e.enhance_pulse(&s, &c).await.map(Enhanced::Pulse) }.boxed(),
                ));
            }
            {
                let (e, s, c) = (enhancer.clone(), macro_section.clone(), chunks("macro"));
                tasks.push((
                    "macro".into(),
                    async move { e.enhance_macro(&s, &c).await.map(Enhanced::Macro) }.boxed(),
                ));
            }
            if let Some(section) = &sentiment {
                let (e, s, c) = (enhancer.clone(), section.clone(), chunks("sentiment"));
                tasks.push((
                    "sentiment".into(),
                    async move { e.enhance_sentiment(&s, &c).await.map(Enhanced::Sentiment) }
                        .boxed(),
                ));
            }
            {
                let (e, s, c) = (enhancer.clone(), forward.clone(), chunks("forward"));
                tasks.push((
                    "forward".into(),
                    async move { e.enhance_forward(&s, &c).await.map(Enhanced::Forward) }.boxed(),
                ));
            }

            for (name, result) in gather_ordered(tasks, self.timeouts.enhancement()).await {
                match result.outcome {
                    Ok(Enhanced::Pulse(s)) => pulse = s,
                    Ok(Enhanced::Macro(s)) => macro_section = s,
                    Ok(Enhanced::Sentiment(s)) => sentiment = Some(s),
                    Ok(Enhanced::Forward(s)) => forward = s,
                    Err(e) => {
                        warn!(report_id = %report_id, section = %name, error = ?e, "enhancement failed, keeping rule-based text");
                        counter!("report_enhancement_fallbacks_total", "section" => name).increment(1);
                    }
                }
            }
        }

        let regime = &ctx.regime;
        let title = config
            .title
            .clone()
            .unwrap_or_else(|| derive::title(config.level, regime.regime, created_at));
        let mut executive_summary = derive::executive_summary(
            regime,
            &pulse,
            &macro_section,
            &assets,
            sentiment.as_ref(),
        );
        if let Some(enhancer) = &enhancer {
            let top_move = derive::top_asset_move(&assets).unwrap_or_else(|| "n/a".to_string());
            let headlines = derive::headlines(&pulse, &macro_section, &assets);
            let regime_title = regime.regime.title();
            let call = enhancer.enhance_executive_summary(
                &regime_title,
                &top_move,
                &macro_section.global_outlook,
                &headlines,
            );
            match tokio::time::timeout(self.timeouts.enhancement(), call).await {
                Ok(Ok(s)) => executive_summary = s,
                Ok(Err(e)) => {
                    warn!(report_id = %report_id, error = ?e, "executive summary enhancement failed");
                    counter!("report_enhancement_fallbacks_total", "section" => "executive_summary")
                        .increment(1);
                }
                Err(_) => {
                    warn!(report_id = %report_id, "executive summary enhancement timed out");
                    counter!("report_enhancement_fallbacks_total", "section" => "executive_summary")
                        .increment(1);
                }
            }
        }

        let mut metadata = BTreeMap::new();
        metadata.insert("generated_at".to_string(), Value::from(created_at.to_rfc3339()));
        metadata.insert("version".to_string(), Value::from(REPORT_VERSION));
        if let Some(provider) = config.llm_provider {
            metadata.insert("llm_provider".to_string(), Value::from(provider.as_str()));
            let model = config
                .llm_model
                .clone()
                .unwrap_or_else(|| provider.default_model().to_string());
            metadata.insert("llm_model".to_string(), Value::from(model));
        }
        if config.include_research {
            metadata.insert("include_research".to_string(), Value::from(true));
        }

        let report = Report {
            report_id,
            title,
            level: config.level,
            created_at,
            executive_summary,
            thesis: derive::thesis(regime, &ctx.implications),
            positioning_summary: derive::positioning_summary(regime, &ctx.implications),
            pulse,
            sentiment,
            macro_section,
            assets,
            technicals,
            forward,
            research: research.as_ref().and_then(ResearchContext::to_section),
            metadata,
            warnings,
            config,
        };

        let elapsed_ms = started.elapsed().as_secs_f64() * 1_000.0;
        histogram!("report_build_ms").record(elapsed_ms);
        info!(
            report_id = %report.report_id,
            warnings = report.warnings.len(),
            elapsed_ms,
            "report built"
        );
        Ok(report)
    }

    async fn retrieve(
        &self,
        config: &ReportConfig,
        warnings: &mut Vec<String>,
    ) -> Option<ResearchContext> {
        let Some(retriever) = &self.research else {
            warnings.push("research retrieval skipped: no research store configured".to_string());
            return None;
        };
        let call = retriever.retrieve(config.document_ids.as_deref());
        match tokio::time::timeout(self.timeouts.retrieval(), call).await {
            Ok(Ok(ctx)) => {
                if ctx.to_section().is_none() {
                    warnings.push("research retrieval found no relevant passages".to_string());
                }
                Some(ctx)
            }
            Ok(Err(e)) => {
                warn!(error = ?e, "research retrieval failed");
                warnings.push(format!("research retrieval failed: {e}"));
                None
            }
            Err(_) => {
                warn!("research retrieval timed out");
                warnings.push("research retrieval timed out".to_string());
                None
            }
        }
    }
}
