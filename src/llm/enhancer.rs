// src/llm/enhancer.rs
//! Narrative enhancement of rule-built sections.
//!
//! Each `enhance_*` call is one atomic unit: it either returns a new section
//! with *all* of its owned fields rewritten, or an error. It never returns a
//! half-updated value, so callers simply keep the original on `Err`.
//!
//! | unit      | owned fields                     |
//! |-----------|----------------------------------|
//! | pulse     | `big_narrative`, `key_takeaways` |
//! | macro     | `global_outlook`, `themes`       |
//! | sentiment | `narrative`                      |
//! | forward   | `lesson_of_the_day`              |

use std::sync::Arc;

use anyhow::{bail, Result};

use crate::llm::client::tidy_output;
use crate::llm::prompts::{self, SYSTEM_PROMPT};
use crate::llm::TextGenerator;
use crate::reports::models::{ForwardSection, MacroSection, PulseSection, SentimentSection};
use crate::reports::research::ResearchChunk;

pub struct SectionEnhancer {
    generator: Arc<dyn TextGenerator>,
    custom_prompt: Option<String>,
}

impl SectionEnhancer {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self {
            generator,
            custom_prompt: None,
        }
    }

    pub fn with_custom_prompt(mut self, custom_prompt: Option<String>) -> Self {
        self.custom_prompt = custom_prompt;
        self
    }

    fn suffix(&self, research: &[ResearchChunk]) -> String {
        prompts::context_suffix(research, self.custom_prompt.as_deref())
    }

    async fn text(&self, prompt: &str, what: &str) -> Result<String> {
        let out = tidy_output(&self.generator.generate(prompt, SYSTEM_PROMPT).await?);
        if out.is_empty() {
            bail!("empty {what} from {}", self.generator.provider());
        }
        Ok(out)
    }

    async fn list(&self, prompt: &str, what: &str) -> Result<Vec<String>> {
        let raw = self.generator.generate(prompt, SYSTEM_PROMPT).await?;
        let items = prompts::parse_bullets(&raw);
        if items.is_empty() {
            bail!("no {what} bullets from {}", self.generator.provider());
        }
        Ok(items)
    }

    pub async fn enhance_pulse(
        &self,
        pulse: &PulseSection,
        research: &[ResearchChunk],
    ) -> Result<PulseSection> {
        let divergences: Vec<String> = pulse
            .divergences
            .iter()
            .map(|d| d.description.clone())
            .collect();
        let regime = pulse.regime.regime.label();
        let prompt = prompts::pulse_narrative(
            &regime,
            pulse.regime.confidence,
            &pulse.regime.signals,
            pulse.sentiment.as_ref().map(|s| s.overall_score),
            &divergences,
            &self.suffix(research),
        );
        let narrative = self.text(&prompt, "pulse narrative").await?;

        let prompt = prompts::pulse_takeaways(&regime, &narrative, &pulse.key_takeaways);
        let takeaways = self.list(&prompt, "takeaway").await?;

        Ok(PulseSection {
            big_narrative: narrative,
            key_takeaways: takeaways,
            ..pulse.clone()
        })
    }

    pub async fn enhance_macro(
        &self,
        section: &MacroSection,
        research: &[ResearchChunk],
    ) -> Result<MacroSection> {
        let prompt = prompts::macro_outlook(
            section.us.as_ref().map(|r| r.headline.as_str()),
            &section.global_outlook,
            &self.suffix(research),
        );
        let outlook = self.text(&prompt, "macro outlook").await?;
        let themes = self
            .list(&prompts::macro_themes(&section.themes, &outlook), "theme")
            .await?;

        Ok(MacroSection {
            global_outlook: outlook,
            themes,
            ..section.clone()
        })
    }

    pub async fn enhance_sentiment(
        &self,
        section: &SentimentSection,
        research: &[ResearchChunk],
    ) -> Result<SentimentSection> {
        let communities: Vec<String> = section
            .subreddit_breakdowns
            .iter()
            .map(|b| {
                format!(
                    "{}: score {:+.2}, {:.0}% bullish",
                    b.subreddit,
                    b.sentiment_score,
                    b.bullish_ratio * 100.0
                )
            })
            .collect();
        let prompt = prompts::sentiment_narrative(
            section.overall_score,
            section.bullish_ratio,
            section.total_posts,
            &section.trending_tickers,
            &communities,
            &section.contrarian_signals,
            &self.suffix(research),
        );
        let narrative = self.text(&prompt, "sentiment narrative").await?;

        Ok(SentimentSection {
            narrative,
            ..section.clone()
        })
    }

    pub async fn enhance_forward(
        &self,
        section: &ForwardSection,
        research: &[ResearchChunk],
    ) -> Result<ForwardSection> {
        let events: Vec<String> = section
            .upcoming_events
            .iter()
            .map(|e| format!("{}: {} ({})", e.date, e.event, e.importance))
            .collect();
        let prompt = prompts::forward_lesson(
            &events,
            &section.outlier_event.event,
            &section.lesson_of_the_day,
            &self.suffix(research),
        );
        let lesson = self.text(&prompt, "lesson").await?;

        Ok(ForwardSection {
            lesson_of_the_day: lesson,
            ..section.clone()
        })
    }

    pub async fn enhance_executive_summary(
        &self,
        regime: &str,
        top_asset_move: &str,
        macro_outlook: &str,
        headlines: &[String],
    ) -> Result<String> {
        let prompt = prompts::executive_summary(regime, top_asset_move, macro_outlook, headlines);
        self.text(&prompt, "executive summary").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyze::MarketRegime;
    use crate::llm::LlmProvider;
    use crate::reports::models::{EconomicEvent, OutlierEvent, RegimeInfo};
    use anyhow::anyhow;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Replies from a script, in call order; `None` means fail.
    struct Scripted(Mutex<Vec<Option<&'static str>>>);

    impl Scripted {
        fn new(replies: Vec<Option<&'static str>>) -> Arc<Self> {
            Arc::new(Self(Mutex::new(replies)))
        }
    }

    #[async_trait]
    impl TextGenerator for Scripted {
        fn provider(&self) -> LlmProvider {
            LlmProvider::Ollama
        }

        async fn generate(&self, _prompt: &str, _system: &str) -> Result<String> {
            let mut q = self.0.lock().unwrap();
            if q.is_empty() {
                return Err(anyhow!("script exhausted"));
            }
            match q.remove(0) {
                Some(s) => Ok(s.to_string()),
                None => Err(anyhow!("provider down")),
            }
        }
    }

    fn pulse() -> PulseSection {
        PulseSection {
            regime: RegimeInfo {
                regime: MarketRegime::Goldilocks,
                confidence: 0.6,
                description: "calm".into(),
                signals: vec!["Low VIX (13.0)".into()],
            },
            sentiment: None,
            divergences: vec![],
            big_narrative: "rule narrative".into(),
            key_takeaways: vec!["rule takeaway".into()],
        }
    }

    fn forward() -> ForwardSection {
        ForwardSection {
            lesson_of_the_day: "rule lesson".into(),
            upcoming_events: vec![EconomicEvent {
                date: "Friday".into(),
                event: "Jobs report".into(),
                importance: "high".into(),
                expected_impact: "rates".into(),
            }],
            outlier_event: OutlierEvent {
                event: "Surprise cut".into(),
                probability: "low".into(),
                potential_impact: "big".into(),
                hedging_idea: None,
            },
            positioning_suggestions: None,
        }
    }

    #[tokio::test]
    async fn pulse_unit_updates_both_fields() {
        let g = Scripted::new(vec![Some("New narrative."), Some("- one\n- two")]);
        let e = SectionEnhancer::new(g);
        let out = e.enhance_pulse(&pulse(), &[]).await.unwrap();
        assert_eq!(out.big_narrative, "New narrative.");
        assert_eq!(out.key_takeaways, vec!["one", "two"]);
        assert_eq!(out.regime, pulse().regime);
    }

    #[tokio::test]
    async fn pulse_unit_is_all_or_nothing() {
        // Narrative succeeds, takeaways come back without bullets.
        let g = Scripted::new(vec![Some("New narrative."), Some("no bullets here")]);
        let e = SectionEnhancer::new(g);
        assert!(e.enhance_pulse(&pulse(), &[]).await.is_err());
    }

    #[tokio::test]
    async fn empty_or_failed_generation_is_an_error() {
        let e = SectionEnhancer::new(Scripted::new(vec![Some("   ")]));
        assert!(e.enhance_forward(&forward(), &[]).await.is_err());

        let e = SectionEnhancer::new(Scripted::new(vec![None]));
        assert!(e.enhance_forward(&forward(), &[]).await.is_err());

        let e = SectionEnhancer::new(Scripted::new(vec![Some("Patience pays.")]));
        let f = e.enhance_forward(&forward(), &[]).await.unwrap();
        assert_eq!(f.lesson_of_the_day, "Patience pays.");
        assert_eq!(f.upcoming_events, forward().upcoming_events);
    }
}
