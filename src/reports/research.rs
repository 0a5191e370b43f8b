// src/reports/research.rs
//! Retrieval of supporting research passages per report section.
//!
//! One fixed query per section is embedded and searched; hits under the
//! score threshold are dropped and at most three survive per section. The
//! store behind [`ResearchStore`] is external; [`MemoryResearchStore`] is the
//! in-process version.

use std::collections::BTreeSet;
use std::sync::Arc;

use anyhow::{bail, Result};
use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::llm::Embedder;
use crate::reports::models::{ResearchInsight, ResearchInsightsSection};

pub const SECTION_QUERIES: [(&str, &str); 5] = [
    ("pulse", "market regime conditions outlook risk sentiment"),
    ("macro", "macroeconomics inflation GDP growth monetary policy rates"),
    ("assets", "equities bonds forex commodities crypto prices"),
    ("sentiment", "market sentiment investor positioning retail institutional"),
    ("forward", "upcoming events risks catalysts forward outlook predictions"),
];

pub const SCORE_THRESHOLD: f64 = 0.3;
pub const CHUNKS_PER_SECTION: usize = 3;

/// A retrieved passage, as handed to prompts and the research section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchChunk {
    pub text: String,
    /// File name or title.
    pub source: String,
    pub document_id: String,
    pub page: Option<u32>,
    pub score: f64,
}

/// Raw hit from a [`ResearchStore`]. `source` falls back to the document id.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub text: String,
    pub document_id: String,
    pub source: Option<String>,
    pub page: Option<u32>,
    pub score: f64,
}

impl From<SearchHit> for ResearchChunk {
    fn from(h: SearchHit) -> Self {
        ResearchChunk {
            source: h.source.unwrap_or_else(|| h.document_id.clone()),
            text: h.text,
            document_id: h.document_id,
            page: h.page,
            score: h.score,
        }
    }
}

#[async_trait]
pub trait ResearchStore: Send + Sync {
    /// Ranked by descending score; `document_id` scopes to one document.
    async fn search(
        &self,
        embedding: &[f32],
        limit: usize,
        document_id: Option<&str>,
    ) -> Result<Vec<SearchHit>>;
}

struct StoredChunk {
    document_id: String,
    source: String,
    page: Option<u32>,
    text: String,
    embedding: Vec<f32>,
}

/// Brute-force cosine search over chunks held in memory.
#[derive(Default)]
pub struct MemoryResearchStore {
    chunks: DashMap<String, StoredChunk>,
}

impl MemoryResearchStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(
        &self,
        chunk_id: &str,
        document_id: &str,
        source: &str,
        page: Option<u32>,
        text: &str,
        embedding: Vec<f32>,
    ) {
        self.chunks.insert(
            chunk_id.to_string(),
            StoredChunk {
                document_id: document_id.to_string(),
                source: source.to_string(),
                page,
                text: text.to_string(),
                embedding,
            },
        );
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

fn cosine(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let (mut dot, mut na, mut nb) = (0.0f64, 0.0f64, 0.0f64);
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (*x as f64, *y as f64);
        dot += x * y;
        na += x * x;
        nb += y * y;
    }
    if na == 0.0 || nb == 0.0 {
        0.0
    } else {
        dot / (na.sqrt() * nb.sqrt())
    }
}

#[async_trait]
impl ResearchStore for MemoryResearchStore {
    async fn search(
        &self,
        embedding: &[f32],
        limit: usize,
        document_id: Option<&str>,
    ) -> Result<Vec<SearchHit>> {
        let mut scored: Vec<(String, SearchHit)> = self
            .chunks
            .iter()
            .filter(|e| document_id.map_or(true, |d| e.value().document_id == d))
            .map(|e| {
                let c = e.value();
                let hit = SearchHit {
                    text: c.text.clone(),
                    document_id: c.document_id.clone(),
                    source: Some(c.source.clone()),
                    page: c.page,
                    score: cosine(embedding, &c.embedding),
                };
                (e.key().clone(), hit)
            })
            .collect();
        // Map iteration order is arbitrary; tie-break on chunk id.
        scored.sort_by(|(ia, a), (ib, b)| b.score.total_cmp(&a.score).then_with(|| ia.cmp(ib)));
        Ok(scored.into_iter().take(limit).map(|(_, h)| h).collect())
    }
}

/// Passages per section, in [`SECTION_QUERIES`] order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResearchContext {
    pub sections: Vec<(&'static str, Vec<ResearchChunk>)>,
    pub total_chunks_searched: usize,
}

impl ResearchContext {
    pub fn for_section(&self, name: &str) -> &[ResearchChunk] {
        self.sections
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, c)| c.as_slice())
            .unwrap_or(&[])
    }

    /// `None` when nothing relevant was found.
    pub fn to_section(&self) -> Option<ResearchInsightsSection> {
        let mut docs = BTreeSet::new();
        let mut insights = Vec::new();
        for (section, chunks) in &self.sections {
            for c in chunks {
                docs.insert(c.document_id.as_str());
                insights.push(ResearchInsight {
                    text: c.text.clone(),
                    source: c.source.clone(),
                    document_id: c.document_id.clone(),
                    page: c.page,
                    relevance_score: c.score,
                    section: section.to_string(),
                });
            }
        }
        if insights.is_empty() {
            return None;
        }
        Some(ResearchInsightsSection {
            insights,
            document_count: docs.len(),
            total_chunks_searched: self.total_chunks_searched,
        })
    }
}

pub struct ResearchRetriever {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn ResearchStore>,
}

impl ResearchRetriever {
    pub fn new(embedder: Arc<dyn Embedder>, store: Arc<dyn ResearchStore>) -> Self {
        Self { embedder, store }
    }

    /// A failed embedding skips its section; a failed search fails the whole
    /// retrieval.
    pub async fn retrieve(&self, document_ids: Option<&[String]>) -> Result<ResearchContext> {
        let scopes: Vec<Option<&str>> = match document_ids {
            Some(ids) if !ids.is_empty() => ids.iter().map(|d| Some(d.as_str())).collect(),
            _ => vec![None],
        };

        let mut ctx = ResearchContext::default();
        let mut embedded_any = false;
        for (section, query) in SECTION_QUERIES {
            let embedding = match self.embedder.embed(query).await {
                Ok(e) => e,
                Err(e) => {
                    warn!(section, error = ?e, "research embedding failed");
                    continue;
                }
            };
            embedded_any = true;

            let mut chunks: Vec<ResearchChunk> = Vec::new();
            for scope in &scopes {
                let hits = self.store.search(&embedding, CHUNKS_PER_SECTION, *scope).await?;
                ctx.total_chunks_searched += hits.len();
                chunks.extend(
                    hits.into_iter()
                        .filter(|h| h.score >= SCORE_THRESHOLD)
                        .map(ResearchChunk::from),
                );
            }
            chunks.sort_by(|a, b| b.score.total_cmp(&a.score));
            chunks.truncate(CHUNKS_PER_SECTION);
            debug!(section, kept = chunks.len(), "research retrieved");
            ctx.sections.push((section, chunks));
        }

        if !embedded_any {
            bail!("no section query could be embedded");
        }
        Ok(ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Embeds every query onto the same axis, so stored vectors decide scores.
    struct AxisEmbedder;

    #[async_trait]
    impl Embedder for AxisEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Ok(vec![1.0, 0.0])
        }
    }

    fn store() -> MemoryResearchStore {
        let s = MemoryResearchStore::new();
        s.insert("a1", "doc-a", "outlook.pdf", Some(2), "strong match", vec![1.0, 0.0]);
        s.insert("a2", "doc-a", "outlook.pdf", Some(3), "partial match", vec![1.0, 1.0]);
        s.insert("b1", "doc-b", "rates.pdf", None, "orthogonal", vec![0.0, 1.0]);
        s.insert("b2", "doc-b", "rates.pdf", None, "weak match", vec![0.2, 1.0]);
        s
    }

    #[test]
    fn cosine_handles_degenerate_vectors() {
        assert_eq!(cosine(&[], &[]), 0.0);
        assert_eq!(cosine(&[1.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        assert!((cosine(&[2.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn memory_store_ranks_and_scopes() {
        let s = store();
        let hits = s.search(&[1.0, 0.0], 2, None).await.unwrap();
        assert_eq!(hits[0].text, "strong match");
        assert_eq!(hits[1].text, "partial match");

        let scoped = s.search(&[1.0, 0.0], 5, Some("doc-b")).await.unwrap();
        assert_eq!(scoped.len(), 2);
        assert!(scoped.iter().all(|h| h.document_id == "doc-b"));
    }

    #[tokio::test]
    async fn retrieval_applies_threshold_and_counts_searched() {
        let r = ResearchRetriever::new(Arc::new(AxisEmbedder), Arc::new(store()));
        let ctx = r.retrieve(None).await.unwrap();

        assert_eq!(ctx.sections.len(), SECTION_QUERIES.len());
        // 3 hits searched per section, weak/orthogonal ones dropped.
        assert_eq!(ctx.total_chunks_searched, 3 * SECTION_QUERIES.len());
        let pulse = ctx.for_section("pulse");
        assert_eq!(pulse.len(), 2);
        assert!(pulse.iter().all(|c| c.score >= SCORE_THRESHOLD));
        assert_eq!(pulse[0].source, "outlook.pdf");

        let section = ctx.to_section().unwrap();
        assert_eq!(section.document_count, 1);
        assert_eq!(section.insights.len(), 2 * SECTION_QUERIES.len());
        assert_eq!(section.insights[0].section, "pulse");
    }

    #[tokio::test]
    async fn document_scoping_searches_each_document() {
        let r = ResearchRetriever::new(Arc::new(AxisEmbedder), Arc::new(store()));
        let ids = vec!["doc-b".to_string(), "doc-a".to_string()];
        let ctx = r.retrieve(Some(&ids)).await.unwrap();
        // doc-b yields 2 hits and doc-a yields 2 per section.
        assert_eq!(ctx.total_chunks_searched, 4 * SECTION_QUERIES.len());
        assert_eq!(ctx.for_section("macro")[0].document_id, "doc-a");
        assert!(ctx.for_section("unknown").is_empty());
    }

    #[test]
    fn empty_context_has_no_section() {
        assert!(ResearchContext::default().to_section().is_none());
    }
}
