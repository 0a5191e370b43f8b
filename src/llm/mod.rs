// src/llm/mod.rs
//! Narrative-enhancement and embedding capabilities.
//!
//! Callers only see [`TextGenerator`] and [`Embedder`]; the concrete backend
//! is chosen once from an [`LlmProvider`] tag when the client is built.

pub mod client;
pub mod enhancer;
pub mod prompts;

use std::str::FromStr;
use std::sync::Arc;

use anyhow::{anyhow, Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use client::{LlmClient, LlmClientFactory};
pub use enhancer::SectionEnhancer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    OpenAi,
    Anthropic,
    Gemini,
    Ollama,
}

impl LlmProvider {
    pub const ALL: [LlmProvider; 4] = [
        LlmProvider::OpenAi,
        LlmProvider::Anthropic,
        LlmProvider::Gemini,
        LlmProvider::Ollama,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LlmProvider::OpenAi => "openai",
            LlmProvider::Anthropic => "anthropic",
            LlmProvider::Gemini => "gemini",
            LlmProvider::Ollama => "ollama",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            LlmProvider::OpenAi => "gpt-4o-mini",
            LlmProvider::Anthropic => "claude-sonnet-4-20250514",
            LlmProvider::Gemini => "gemini-2.0-flash",
            LlmProvider::Ollama => "llama3.2",
        }
    }

    /// Env var holding the API key; local providers need none.
    pub fn key_env_var(&self) -> Option<&'static str> {
        match self {
            LlmProvider::OpenAi => Some("OPENAI_API_KEY"),
            LlmProvider::Anthropic => Some("ANTHROPIC_API_KEY"),
            LlmProvider::Gemini => Some("GEMINI_API_KEY"),
            LlmProvider::Ollama => None,
        }
    }
}

impl std::fmt::Display for LlmProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LlmProvider {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(LlmProvider::OpenAi),
            "anthropic" | "claude" => Ok(LlmProvider::Anthropic),
            "gemini" | "google" => Ok(LlmProvider::Gemini),
            "ollama" => Ok(LlmProvider::Ollama),
            other => Err(anyhow!("unknown LLM provider: {other}")),
        }
    }
}

/// `generate(prompt, system_prompt) -> text`, identical for every provider.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    fn provider(&self) -> LlmProvider;
    async fn generate(&self, prompt: &str, system_prompt: &str) -> Result<String>;
}

#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// Builds a generator for a `(provider, model)` pair at report time.
pub trait GeneratorFactory: Send + Sync {
    fn generator(&self, provider: LlmProvider, model: Option<&str>) -> Result<Arc<dyn TextGenerator>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_tags_parse_once() {
        assert_eq!("OpenAI".parse::<LlmProvider>().unwrap(), LlmProvider::OpenAi);
        assert_eq!("claude".parse::<LlmProvider>().unwrap(), LlmProvider::Anthropic);
        assert!("mystery".parse::<LlmProvider>().is_err());
        for p in LlmProvider::ALL {
            assert_eq!(p.as_str().parse::<LlmProvider>().unwrap(), p);
        }
        assert_eq!(LlmProvider::Ollama.key_env_var(), None);
    }

    #[test]
    fn provider_serde_uses_lowercase_tags() {
        let s = serde_json::to_string(&LlmProvider::OpenAi).unwrap();
        assert_eq!(s, "\"openai\"");
    }
}
