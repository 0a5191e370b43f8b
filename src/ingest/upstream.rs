// src/ingest/upstream.rs
//! Raw fetch functions. The core only needs "call method with args, get JSON
//! or an error"; caching and rate limiting live in [`DataSource`].
//!
//! [`DataSource`]: crate::ingest::source::DataSource

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;

use crate::ingest::cache::CallArgs;

#[async_trait]
pub trait Upstream: Send + Sync {
    /// Invoke `method` with the positional and keyword `args` of one logical
    /// call and return the decoded body.
    async fn call(&self, method: &str, args: &CallArgs) -> Result<serde_json::Value>;
    /// Liveness probe; `Ok(())` means reachable.
    async fn ping(&self) -> Result<()>;
}

/// JSON-over-HTTP upstream: `GET {base_url}/{method}/{args...}?{kwargs}`.
pub struct HttpUpstream {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpUpstream {
    pub fn new(base_url: &str, api_key: Option<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("marketview/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(4))
            .timeout(timeout)
            .build()
            .context("building http client")?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
        })
    }

    fn url_for(&self, method: &str, args: &CallArgs) -> String {
        let mut url = format!("{}/{}", self.base_url, method);
        for a in &args.positional {
            url.push('/');
            url.push_str(&encode_segment(a));
        }
        let query: Vec<String> = args
            .keyword
            .iter()
            .map(|(k, v)| format!("{}={}", encode_segment(k), encode_segment(v)))
            .collect();
        if !query.is_empty() {
            url.push('?');
            url.push_str(&query.join("&"));
        }
        url
    }

    fn request(&self, url: &str) -> reqwest::RequestBuilder {
        let req = self.http.get(url);
        match &self.api_key {
            Some(k) => req.bearer_auth(k),
            None => req,
        }
    }
}

#[async_trait]
impl Upstream for HttpUpstream {
    async fn call(&self, method: &str, args: &CallArgs) -> Result<serde_json::Value> {
        let url = self.url_for(method, args);
        let resp = self
            .request(&url)
            .send()
            .await
            .with_context(|| format!("GET {url}"))?
            .error_for_status()
            .with_context(|| format!("GET {url} non-2xx"))?;
        resp.json::<serde_json::Value>()
            .await
            .with_context(|| format!("decoding body of {url}"))
    }

    async fn ping(&self) -> Result<()> {
        let url = format!("{}/health", self.base_url);
        self.request(&url)
            .send()
            .await
            .with_context(|| format!("GET {url}"))?
            .error_for_status()
            .context("health non-2xx")?;
        Ok(())
    }
}

/// Percent-encode anything outside the unreserved URL set.
fn encode_segment(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(b as char)
            }
            _ => out.push_str(&format!("%{b:02X}")),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_segments_are_encoded() {
        let up = HttpUpstream::new("http://gateway:8080/", None, Duration::from_secs(1)).unwrap();
        let url = up.url_for("quote", &CallArgs::positional(["^GSPC", "EUR/USD"]));
        assert_eq!(url, "http://gateway:8080/quote/%5EGSPC/EUR%2FUSD");
    }

    #[test]
    fn keyword_args_become_a_sorted_query() {
        let up = HttpUpstream::new("http://gateway", None, Duration::from_secs(1)).unwrap();
        let args = CallArgs::positional(["wallstreetbets,stocks"])
            .with_kw("window", "24h")
            .with_kw("sort", "top & new");
        assert_eq!(
            up.url_for("sentiment", &args),
            "http://gateway/sentiment/wallstreetbets%2Cstocks?sort=top%20%26%20new&window=24h"
        );
        assert_eq!(up.url_for("vix", &CallArgs::none()), "http://gateway/vix");
    }

    #[test]
    fn blank_api_key_is_ignored() {
        let up = HttpUpstream::new("http://x", Some("  ".into()), Duration::from_secs(1)).unwrap();
        assert!(up.api_key.is_none());
    }
}
