// src/llm/client.rs
//! reqwest-backed clients for the hosted providers and a local Ollama.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::config::settings::LlmSettings;
use crate::llm::prompts::preview;
use crate::llm::{Embedder, GeneratorFactory, LlmProvider, TextGenerator};

const OPENAI_BASE: &str = "https://api.openai.com/v1";
const ANTHROPIC_BASE: &str = "https://api.anthropic.com/v1";
const GEMINI_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
const ANTHROPIC_VERSION: &str = "2023-06-01";

const MAX_TOKENS: u32 = 2048;
const TEMPERATURE: f32 = 0.7;

pub struct LlmClient {
    provider: LlmProvider,
    model: String,
    http: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
}

impl LlmClient {
    /// Fails when the provider needs a key and none is configured.
    pub fn new(
        provider: LlmProvider,
        model: Option<&str>,
        settings: &LlmSettings,
        timeout: Duration,
    ) -> Result<Self> {
        let api_key = match provider {
            LlmProvider::OpenAi => settings.openai_api_key.clone(),
            LlmProvider::Anthropic => settings.anthropic_api_key.clone(),
            LlmProvider::Gemini => settings.gemini_api_key.clone(),
            LlmProvider::Ollama => None,
        }
        .filter(|k| !k.trim().is_empty());

        if let Some(var) = provider.key_env_var() {
            if api_key.is_none() {
                bail!("{var} is not configured");
            }
        }

        let base_url = match provider {
            LlmProvider::OpenAi => OPENAI_BASE.to_string(),
            LlmProvider::Anthropic => ANTHROPIC_BASE.to_string(),
            LlmProvider::Gemini => GEMINI_BASE.to_string(),
            LlmProvider::Ollama => settings.ollama_base_url.trim_end_matches('/').to_string(),
        };

        let http = reqwest::Client::builder()
            .user_agent(concat!("marketview/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(4))
            .timeout(timeout)
            .build()
            .context("building llm http client")?;

        let model = model
            .filter(|m| !m.trim().is_empty())
            .unwrap_or(provider.default_model())
            .to_string();

        tracing::info!(provider = %provider, model = %model, "llm client ready");
        Ok(Self {
            provider,
            model,
            http,
            api_key,
            base_url,
        })
    }

    /// Point the client at a different endpoint (proxies, local gateways).
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn key(&self) -> Result<&str> {
        self.api_key
            .as_deref()
            .ok_or_else(|| anyhow!("{} api key missing", self.provider))
    }

    async fn post_json<B: Serialize, R: for<'de> Deserialize<'de>>(
        &self,
        req: reqwest::RequestBuilder,
        body: &B,
    ) -> Result<R> {
        let resp = req
            .json(body)
            .send()
            .await
            .with_context(|| format!("{} request", self.provider))?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            bail!("{} returned {status}: {}", self.provider, preview(&text, 300));
        }
        resp.json::<R>()
            .await
            .with_context(|| format!("decoding {} response", self.provider))
    }

    async fn generate_openai(&self, prompt: &str, system: &str) -> Result<String> {
        #[derive(Deserialize)]
        struct Resp {
            choices: Vec<Choice>,
        }
        #[derive(Deserialize)]
        struct Choice {
            message: ChoiceMsg,
        }
        #[derive(Deserialize)]
        struct ChoiceMsg {
            #[serde(default)]
            content: Option<String>,
        }

        let mut messages = Vec::new();
        if !system.is_empty() {
            messages.push(json!({"role": "system", "content": system}));
        }
        messages.push(json!({"role": "user", "content": prompt}));
        let body = json!({
            "model": self.model,
            "messages": messages,
            "temperature": TEMPERATURE,
            "max_tokens": MAX_TOKENS,
        });

        let req = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(self.key()?);
        let resp: Resp = self.post_json(req, &body).await?;
        Ok(resp
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default())
    }

    async fn generate_anthropic(&self, prompt: &str, system: &str) -> Result<String> {
        #[derive(Deserialize)]
        struct Resp {
            content: Vec<Block>,
        }
        #[derive(Deserialize)]
        struct Block {
            #[serde(default)]
            text: Option<String>,
        }

        let mut body = json!({
            "model": self.model,
            "max_tokens": MAX_TOKENS,
            "messages": [{"role": "user", "content": prompt}],
        });
        if !system.is_empty() {
            body["system"] = json!(system);
        }

        let req = self
            .http
            .post(format!("{}/messages", self.base_url))
            .header("x-api-key", self.key()?)
            .header("anthropic-version", ANTHROPIC_VERSION);
        let resp: Resp = self.post_json(req, &body).await?;
        Ok(resp
            .content
            .into_iter()
            .find_map(|b| b.text)
            .unwrap_or_default())
    }

    async fn generate_gemini(&self, prompt: &str, system: &str) -> Result<String> {
        #[derive(Deserialize)]
        struct Resp {
            #[serde(default)]
            candidates: Vec<Candidate>,
        }
        #[derive(Deserialize)]
        struct Candidate {
            content: Content,
        }
        #[derive(Deserialize)]
        struct Content {
            #[serde(default)]
            parts: Vec<Part>,
        }
        #[derive(Deserialize)]
        struct Part {
            #[serde(default)]
            text: Option<String>,
        }

        let full = if system.is_empty() {
            prompt.to_string()
        } else {
            format!("{system}\n\n{prompt}")
        };
        let body = json!({ "contents": [{ "parts": [{ "text": full }] }] });

        let req = self
            .http
            .post(format!("{}/models/{}:generateContent", self.base_url, self.model))
            .query(&[("key", self.key()?)]);
        let resp: Resp = self.post_json(req, &body).await?;
        Ok(resp
            .candidates
            .into_iter()
            .next()
            .map(|c| {
                c.content
                    .parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default())
    }

    async fn generate_ollama(&self, prompt: &str, system: &str) -> Result<String> {
        #[derive(Deserialize)]
        struct Resp {
            #[serde(default)]
            response: String,
        }

        let mut body = json!({
            "model": self.model,
            "prompt": prompt,
            "stream": false,
        });
        if !system.is_empty() {
            body["system"] = json!(system);
        }
        let req = self.http.post(format!("{}/api/generate", self.base_url));
        let resp: Resp = self.post_json(req, &body).await?;
        Ok(resp.response)
    }
}

#[async_trait]
impl TextGenerator for LlmClient {
    fn provider(&self) -> LlmProvider {
        self.provider
    }

    async fn generate(&self, prompt: &str, system_prompt: &str) -> Result<String> {
        let raw = match self.provider {
            LlmProvider::OpenAi => self.generate_openai(prompt, system_prompt).await?,
            LlmProvider::Anthropic => self.generate_anthropic(prompt, system_prompt).await?,
            LlmProvider::Gemini => self.generate_gemini(prompt, system_prompt).await?,
            LlmProvider::Ollama => self.generate_ollama(prompt, system_prompt).await?,
        };
        tracing::debug!(provider = %self.provider, chars = raw.len(), "llm response");
        Ok(raw)
    }
}

#[async_trait]
impl Embedder for LlmClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        match self.provider {
            LlmProvider::OpenAi => {
                #[derive(Deserialize)]
                struct Resp {
                    data: Vec<Item>,
                }
                #[derive(Deserialize)]
                struct Item {
                    embedding: Vec<f32>,
                }
                let body = json!({ "model": "text-embedding-3-small", "input": text });
                let req = self
                    .http
                    .post(format!("{}/embeddings", self.base_url))
                    .bearer_auth(self.key()?);
                let resp: Resp = self.post_json(req, &body).await?;
                resp.data
                    .into_iter()
                    .next()
                    .map(|i| i.embedding)
                    .ok_or_else(|| anyhow!("openai returned no embedding"))
            }
            LlmProvider::Ollama => {
                #[derive(Deserialize)]
                struct Resp {
                    embedding: Vec<f32>,
                }
                let body = json!({ "model": "nomic-embed-text", "prompt": text });
                let req = self.http.post(format!("{}/api/embeddings", self.base_url));
                let resp: Resp = self.post_json(req, &body).await?;
                Ok(resp.embedding)
            }
            other => Err(anyhow!("{other} does not provide embeddings")),
        }
    }
}

/// Default [`GeneratorFactory`]: real clients from [`LlmSettings`].
pub struct LlmClientFactory {
    settings: LlmSettings,
    timeout: Duration,
}

impl LlmClientFactory {
    pub fn new(settings: LlmSettings, timeout: Duration) -> Self {
        Self { settings, timeout }
    }
}

impl GeneratorFactory for LlmClientFactory {
    fn generator(&self, provider: LlmProvider, model: Option<&str>) -> Result<Arc<dyn TextGenerator>> {
        let client = LlmClient::new(provider, model, &self.settings, self.timeout)?;
        Ok(Arc::new(client))
    }
}

/// Trim model output and drop a wrapping markdown code fence or quotes.
pub fn tidy_output(raw: &str) -> String {
    let mut s = raw.trim();
    if let Some(rest) = s.strip_prefix("```") {
        let rest = rest.split_once('\n').map(|(_, body)| body).unwrap_or("");
        s = rest.trim_end().strip_suffix("```").unwrap_or(rest).trim();
    }
    if s.len() >= 2 && s.starts_with('"') && s.ends_with('"') {
        s = &s[1..s.len() - 1];
    }
    s.trim().to_string()
}
