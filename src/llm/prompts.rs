// src/llm/prompts.rs
//! Prompt templates for narrative enhancement.

use crate::reports::research::ResearchChunk;

pub const SYSTEM_PROMPT: &str = "You are an institutional-grade market analyst writing a \
self-contained professional daily brief for a hedge fund. Be concise, data-driven and \
actionable. Use a confident, professional tone. Reference specific data points.\n\n\
IMPORTANT RULES:\n\
- Write as one cohesive document; each section should read as part of a single narrative.\n\
- Never reference internal system IDs, relevance scores, data pipeline names or technical metadata.\n\
- Connect sections thematically: the macro environment informs asset views, which inform positioning.\n\
- Avoid filler phrases like 'it is important to note' or 'as we can see'.\n\
- Do not mention Reddit, post counts or social media platforms by name.";

const RESEARCH_INSTRUCTION: &str = "Incorporate relevant insights from the provided research \
documents into your analysis. Reference the source when citing specific findings.";

const PREVIEW_CHARS: usize = 500;

/// At most `max` chars of `s`, cut on a char boundary.
pub(crate) fn preview(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

fn bullets<S: AsRef<str>>(items: &[S]) -> String {
    items
        .iter()
        .map(|s| format!("- {}", s.as_ref()))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn research_block(chunks: &[ResearchChunk]) -> String {
    if chunks.is_empty() {
        return String::new();
    }
    let mut lines = vec!["RESEARCH CONTEXT:".to_string()];
    for (i, c) in chunks.iter().enumerate() {
        let page = c.page.map(|p| format!(", p.{p}")).unwrap_or_default();
        lines.push(format!(
            "[{}] ({}{}): {}",
            i + 1,
            c.source,
            page,
            preview(&c.text, PREVIEW_CHARS)
        ));
    }
    lines.join("\n")
}

fn custom_block(custom_prompt: Option<&str>) -> String {
    match custom_prompt.map(str::trim).filter(|s| !s.is_empty()) {
        Some(p) => format!(
            "\n\nCUSTOM FOCUS INSTRUCTIONS:\n{p}\nPrioritize these focus areas in your analysis."
        ),
        None => String::new(),
    }
}

/// Research and custom-focus suffix shared by every narrative prompt.
pub fn context_suffix(research: &[ResearchChunk], custom_prompt: Option<&str>) -> String {
    let block = research_block(research);
    let mut out = if block.is_empty() {
        String::new()
    } else {
        format!("\n\n{block}\n\n{RESEARCH_INSTRUCTION}")
    };
    out.push_str(&custom_block(custom_prompt));
    out
}

pub fn pulse_narrative(
    regime: &str,
    confidence: f64,
    signals: &[String],
    sentiment_score: Option<f64>,
    divergences: &[String],
    suffix: &str,
) -> String {
    let mut parts = vec![
        format!("Market regime: {regime} (confidence: {:.0}%)", confidence * 100.0),
        format!("Key signals:\n{}", bullets(signals)),
    ];
    if let Some(score) = sentiment_score {
        parts.push(format!("Sentiment score: {score:.2}"));
    }
    if !divergences.is_empty() {
        parts.push(format!("Divergences:\n{}", bullets(divergences)));
    }
    format!(
        "Given the following market data, write a compelling 2-3 paragraph narrative \
(the 'big picture') for today's market pulse. Set the scene and establish the day's \
dominant theme. Explain what the regime means, connect the signals, and highlight what \
matters most for positioning.\n\n{}{suffix}",
        parts.join("\n\n")
    )
}

pub fn pulse_takeaways(regime: &str, narrative: &str, existing: &[String]) -> String {
    format!(
        "Current regime: {regime}\nNarrative context: {}\nRule-based takeaways:\n{}\n\n\
Rewrite these takeaways to be sharper and more actionable. Return exactly {} bullet \
points, each on its own line starting with '- '. Keep them under 20 words each.",
        preview(narrative, PREVIEW_CHARS),
        bullets(existing),
        existing.len()
    )
}

pub fn macro_outlook(us_headline: Option<&str>, existing: &str, suffix: &str) -> String {
    let regions = match us_headline {
        Some(h) => format!("US: {h}"),
        None => "No regional data available".to_string(),
    };
    format!(
        "Regional macro summaries:\n{regions}\n\nCurrent outlook: {existing}\n\n\
Write a concise 2-3 sentence global macro outlook that synthesizes these views into a \
coherent narrative. Focus on what it means for global risk.{suffix}"
    )
}

pub fn macro_themes(existing: &[String], outlook: &str) -> String {
    format!(
        "Global outlook: {}\nRule-based themes:\n{}\n\nRefine these themes to be more \
insightful. Return exactly {} themes, each on its own line starting with '- '. Make them \
specific and forward-looking.",
        preview(outlook, 300),
        bullets(existing),
        existing.len()
    )
}

pub fn sentiment_narrative(
    overall_score: f64,
    bullish_ratio: f64,
    total_posts: u32,
    trending: &[(String, u32)],
    community_summaries: &[String],
    contrarian: &[String],
    suffix: &str,
) -> String {
    let tickers = trending
        .iter()
        .take(8)
        .map(|(t, n)| format!("${t} ({n})"))
        .collect::<Vec<_>>()
        .join(", ");
    let contrarian = if contrarian.is_empty() {
        "None detected".to_string()
    } else {
        bullets(contrarian)
    };
    format!(
        "Retail sentiment data ({total_posts} data points analyzed):\n\
- Overall score: {overall_score:+.2}\n- Bullish ratio: {:.0}%\n- Trending tickers: {tickers}\n\n\
Per-community breakdown:\n{}\n\nContrarian signals:\n{contrarian}\n\n\
Write a 2-3 paragraph sentiment analysis narrative. Focus on what the sentiment data implies \
for positioning. Cover the overall mood and what drives it, notable divergences between \
investor communities, and any contrarian implications. Reference specific tickers where \
relevant.{suffix}",
        bullish_ratio * 100.0,
        bullets(community_summaries)
    )
}

pub fn forward_lesson(events: &[String], outlier: &str, existing: &str, suffix: &str) -> String {
    let events: Vec<&String> = events.iter().take(5).collect();
    format!(
        "Upcoming events:\n{}\nOutlier scenario: {outlier}\nCurrent lesson: {existing}\n\n\
Write a thought-provoking 'lesson of the day' (2-3 sentences) that ties the forward calendar \
to historical patterns or market wisdom. Make it feel connected to today's specific market \
context, not generic.{suffix}",
        bullets(&events)
    )
}

pub fn executive_summary(
    regime: &str,
    top_asset_move: &str,
    macro_outlook: &str,
    headlines: &[String],
) -> String {
    let headlines = if headlines.is_empty() {
        String::new()
    } else {
        format!("\n\nSection headlines:\n{}", bullets(headlines))
    };
    format!(
        "Market regime: {regime}\nTop asset move: {top_asset_move}\nMacro outlook: \
{macro_outlook}\n{headlines}\n\nWrite a concise 2-3 sentence executive summary for today's \
brief. Tie together the regime, the most important asset move and the macro backdrop. Write \
in present tense, as if briefing a portfolio manager at the start of the trading day."
    )
}

/// Lines starting with `-`, stripped of the marker. Empty input yields nothing.
pub fn parse_bullets(raw: &str) -> Vec<String> {
    raw.lines()
        .map(str::trim)
        .filter(|l| l.starts_with('-'))
        .map(|l| l.trim_start_matches(['-', ' ']).trim().to_string())
        .filter(|l| !l.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_cuts_on_char_boundaries() {
        assert_eq!(preview("naïve", 3), "naï");
        assert_eq!(preview("short", 50), "short");
    }

    fn chunk(text: &str, page: Option<u32>) -> ResearchChunk {
        ResearchChunk {
            text: text.to_string(),
            source: "fomc-minutes.pdf".to_string(),
            document_id: "doc-1".to_string(),
            page,
            score: 0.8,
        }
    }

    #[test]
    fn bullets_are_parsed_from_dash_lines_only() {
        let raw = "Here you go:\n- First point\n  - Second point \nnot a bullet\n-\n";
        assert_eq!(parse_bullets(raw), vec!["First point", "Second point"]);
        assert!(parse_bullets("").is_empty());
    }

    #[test]
    fn research_block_numbers_and_truncates() {
        let long = "x".repeat(800);
        let block = research_block(&[chunk("short", Some(4)), chunk(&long, None)]);
        assert!(block.starts_with("RESEARCH CONTEXT:"));
        assert!(block.contains("[1] (fomc-minutes.pdf, p.4): short"));
        let second = block.lines().nth(2).unwrap();
        assert_eq!(second.matches('x').count(), PREVIEW_CHARS);
        assert!(research_block(&[]).is_empty());
    }

    #[test]
    fn suffix_combines_research_and_focus() {
        assert_eq!(context_suffix(&[], None), "");
        assert_eq!(context_suffix(&[], Some("   ")), "");
        let s = context_suffix(&[chunk("t", None)], Some("energy names"));
        assert!(s.contains(RESEARCH_INSTRUCTION));
        assert!(s.ends_with("Prioritize these focus areas in your analysis."));
        assert!(s.contains("energy names"));
    }

    #[test]
    fn takeaways_prompt_requests_same_count() {
        let p = pulse_takeaways("goldilocks", "calm", &["a".into(), "b".into()]);
        assert!(p.contains("Return exactly 2 bullet points"));
    }
}
