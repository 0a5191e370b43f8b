// src/fanout.rs
//! Fan-out / fan-in with per-task failure isolation.
//!
//! Every task is spawned on its own, bounded by its own timeout, and always
//! awaited. Outcomes come back in registration order regardless of which task
//! finished first; an error, timeout or panic in one task never cancels or
//! short-circuits its siblings.

use std::time::Duration;

use anyhow::anyhow;
use chrono::Utc;
use futures::future::BoxFuture;

use crate::ingest::types::SourceResult;

/// A named unit of concurrent work.
pub type NamedTask<T> = (String, BoxFuture<'static, anyhow::Result<T>>);

pub async fn gather_ordered<T>(tasks: Vec<NamedTask<T>>, timeout: Duration) -> Vec<(String, SourceResult<T>)>
where
    T: Send + 'static,
{
    let handles: Vec<_> = tasks
        .into_iter()
        .map(|(name, fut)| {
            let handle = tokio::spawn(async move {
                let outcome = match tokio::time::timeout(timeout, fut).await {
                    Ok(res) => res,
                    Err(_) => Err(anyhow!("timed out after {}s", timeout.as_secs_f64())),
                };
                SourceResult {
                    fetched_at: Utc::now(),
                    outcome,
                }
            });
            (name, handle)
        })
        .collect();

    let mut out = Vec::with_capacity(handles.len());
    for (name, handle) in handles {
        let result = match handle.await {
            Ok(r) => r,
            Err(join_err) => SourceResult::now(Err(anyhow!("task failed: {join_err}"))),
        };
        out.push((name, result));
    }
    out
}
