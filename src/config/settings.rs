// src/config/settings.rs
use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};

use crate::ingest::source::SourcePolicy;

pub const ENV_CONFIG_PATH: &str = "MARKETVIEW_CONFIG_PATH";

/// Built-in `(cache_ttl_secs, requests_per_minute)` per source. Macro series
/// tolerate an hour of staleness, crypto only a few minutes.
pub const DEFAULT_POLICIES: [(&str, SourcePolicy); 6] = [
    ("fred", SourcePolicy::new(3600, 120)),
    ("reddit", SourcePolicy::new(900, 60)),
    ("crypto", SourcePolicy::new(300, 30)),
    ("equity", SourcePolicy::new(900, 33)),
    ("fx", SourcePolicy::new(900, 33)),
    ("commodity", SourcePolicy::new(900, 33)),
];

const FALLBACK_POLICY: SourcePolicy = SourcePolicy::new(3600, 60);

fn default_gateway_url() -> String {
    "http://127.0.0.1:8700".to_string()
}

/// Per-source overrides; anything left out falls back to the built-ins.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SourceSettings {
    #[serde(default)]
    pub base_url: Option<String>,
    /// `"ENV"` means: read `<NAME>_API_KEY` from the environment.
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub cache_ttl_secs: Option<u64>,
    #[serde(default)]
    pub requests_per_minute: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Timeouts {
    pub category_secs: u64,
    pub quick_secs: u64,
    pub health_secs: u64,
    pub section_secs: u64,
    pub enhancement_secs: u64,
    pub retrieval_secs: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            category_secs: 30,
            quick_secs: 10,
            health_secs: 5,
            section_secs: 120,
            enhancement_secs: 60,
            retrieval_secs: 15,
        }
    }
}

impl Timeouts {
    pub fn category(&self) -> Duration {
        Duration::from_secs(self.category_secs)
    }
    pub fn quick(&self) -> Duration {
        Duration::from_secs(self.quick_secs)
    }
    pub fn health(&self) -> Duration {
        Duration::from_secs(self.health_secs)
    }
    pub fn section(&self) -> Duration {
        Duration::from_secs(self.section_secs)
    }
    pub fn enhancement(&self) -> Duration {
        Duration::from_secs(self.enhancement_secs)
    }
    pub fn retrieval(&self) -> Duration {
        Duration::from_secs(self.retrieval_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LlmSettings {
    pub openai_api_key: Option<String>,
    pub anthropic_api_key: Option<String>,
    pub gemini_api_key: Option<String>,
    pub ollama_base_url: String,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            openai_api_key: None,
            anthropic_api_key: None,
            gemini_api_key: None,
            ollama_base_url: "http://localhost:11434".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    /// Market-data gateway; each source defaults to `{gateway_url}/{name}`.
    pub gateway_url: String,
    pub sources: BTreeMap<String, SourceSettings>,
    pub timeouts: Timeouts,
    pub llm: LlmSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            gateway_url: default_gateway_url(),
            sources: BTreeMap::new(),
            timeouts: Timeouts::default(),
            llm: LlmSettings::default(),
        }
    }
}

impl Settings {
    /// Load from an explicit path (TOML or JSON), then resolve env keys.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading settings from {}", path.display()))?;
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        let mut cfg = parse_settings(&content, ext.as_str())?;
        cfg.resolve_env()?;
        Ok(cfg)
    }

    /// Load using env var + fallbacks:
    /// 1) $MARKETVIEW_CONFIG_PATH
    /// 2) config/marketview.toml
    /// 3) config/marketview.json
    /// 4) built-in defaults
    pub fn load_default() -> Result<Self> {
        if let Ok(p) = env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if pb.exists() {
                return Self::load_from(&pb);
            }
            return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
        }
        for candidate in ["config/marketview.toml", "config/marketview.json"] {
            let pb = PathBuf::from(candidate);
            if pb.exists() {
                return Self::load_from(&pb);
            }
        }
        let mut cfg = Settings::default();
        cfg.resolve_env()?;
        Ok(cfg)
    }

    /// Effective policy for `name`: file override, else built-in, else fallback.
    pub fn source_policy(&self, name: &str) -> SourcePolicy {
        let base = DEFAULT_POLICIES
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, p)| *p)
            .unwrap_or(FALLBACK_POLICY);
        match self.sources.get(name) {
            Some(s) => SourcePolicy::new(
                s.cache_ttl_secs.unwrap_or(base.cache_ttl_secs),
                s.requests_per_minute.unwrap_or(base.requests_per_minute),
            ),
            None => base,
        }
    }

    pub fn source_base_url(&self, name: &str) -> String {
        self.sources
            .get(name)
            .and_then(|s| s.base_url.clone())
            .unwrap_or_else(|| format!("{}/{}", self.gateway_url.trim_end_matches('/'), name))
    }

    pub fn source_api_key(&self, name: &str) -> Option<String> {
        self.sources.get(name).and_then(|s| s.api_key.clone())
    }

    /// Replace `"ENV"` placeholders and fill unset keys from the environment.
    fn resolve_env(&mut self) -> Result<()> {
        for (name, s) in self.sources.iter_mut() {
            if let Some(k) = &s.api_key {
                if k.trim().eq_ignore_ascii_case("env") {
                    let var = format!("{}_API_KEY", name.to_ascii_uppercase());
                    s.api_key = Some(
                        env::var(&var).map_err(|_| anyhow!("Missing {var} env var"))?,
                    );
                }
            }
        }
        for name in ["fred", "equity", "fx", "commodity", "crypto", "reddit"] {
            let var = format!("{}_API_KEY", name.to_ascii_uppercase());
            if let Ok(v) = env::var(&var) {
                let entry = self.sources.entry(name.to_string()).or_default();
                if entry.api_key.is_none() {
                    entry.api_key = Some(v);
                }
            }
        }

        resolve_key(&mut self.llm.openai_api_key, "OPENAI_API_KEY");
        resolve_key(&mut self.llm.anthropic_api_key, "ANTHROPIC_API_KEY");
        resolve_key(&mut self.llm.gemini_api_key, "GEMINI_API_KEY");
        if let Ok(url) = env::var("OLLAMA_BASE_URL") {
            if !url.trim().is_empty() {
                self.llm.ollama_base_url = url;
            }
        }
        Ok(())
    }
}

fn resolve_key(slot: &mut Option<String>, var: &str) {
    let wants_env = match slot.as_deref() {
        None => true,
        Some(k) => k.trim().is_empty() || k.trim().eq_ignore_ascii_case("env"),
    };
    if wants_env {
        *slot = env::var(var).ok().filter(|v| !v.trim().is_empty());
    }
}

fn parse_settings(s: &str, hint_ext: &str) -> Result<Settings> {
    if hint_ext == "json" {
        return serde_json::from_str(s).context("parsing settings json");
    }
    if hint_ext == "toml" {
        return toml::from_str(s).context("parsing settings toml");
    }
    // Unknown extension: sniff.
    if let Ok(v) = serde_json::from_str::<Settings>(s) {
        return Ok(v);
    }
    toml::from_str(s).map_err(|e| anyhow!("unsupported settings format: {e}"))
}
