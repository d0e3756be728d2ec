// src/fetch.rs
//! Board fetch client: one HTTP GET per attempt, bounded retries with
//! exponential backoff, typed failure classification.

use std::time::Duration;

use async_trait::async_trait;
use metrics::counter;
use rand::Rng;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::FetchConfig;

/// Fetch failure for one source. `retryable` drives the retry loop: network
/// failures (no status), 5xx, and 429 are worth another attempt; everything
/// else is terminal for this run.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct FetchError {
    pub source_id: String,
    pub status: Option<u16>,
    pub retryable: bool,
    message: String,
}

impl FetchError {
    pub fn new(
        source_id: &str,
        status: Option<u16>,
        retryable: bool,
        message: impl Into<String>,
    ) -> Self {
        Self {
            source_id: source_id.to_string(),
            status,
            retryable,
            message: message.into(),
        }
    }
}

/// Compensation fields as served on the wire; only the two summary variants
/// are ever read.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawCompensation {
    pub compensation_tier_summary: Option<String>,
    pub scrapeable_compensation_salary_summary: Option<String>,
}

/// One posting as served by the board API. Everything is optional at this
/// layer; the normalizer decides what is usable.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawPosting {
    pub title: Option<String>,
    pub location: Option<String>,
    pub team: Option<String>,
    pub department: Option<String>,
    pub employment_type: Option<String>,
    #[serde(default)]
    pub is_remote: bool,
    pub description_plain: Option<String>,
    pub description_html: Option<String>,
    pub apply_url: Option<String>,
    pub job_url: Option<String>,
    pub published_at: Option<String>,
    pub is_listed: Option<bool>,
    pub compensation: Option<RawCompensation>,
}

/// A board response is only structurally valid when it carries a `jobs`
/// list; any other shape fails the fetch without retry.
#[derive(Debug, Clone, Deserialize)]
pub struct RawBoard {
    pub jobs: Vec<RawPosting>,
}

/// Read side of one employer's job board.
#[async_trait]
pub trait JobBoard: Send + Sync {
    async fn fetch(&self, source_id: &str) -> Result<RawBoard, FetchError>;
}

/// True when a failed attempt with this status is worth retrying.
pub fn is_retryable(status: Option<u16>) -> bool {
    match status {
        None => true,
        Some(s) => s >= 500 || s == 429,
    }
}

/// Exponential backoff for a 1-based attempt: `base * 2^(attempt-1)` plus a
/// `jitter` fraction (0..1) of up to 50% on top.
pub fn backoff_delay(base_ms: u64, attempt: u32, jitter: f64) -> Duration {
    let shift = attempt.saturating_sub(1).min(16);
    let backoff = base_ms.saturating_mul(1u64 << shift);
    let extra = (backoff as f64 * 0.5 * jitter.clamp(0.0, 1.0)) as u64;
    Duration::from_millis(backoff.saturating_add(extra))
}

pub struct FetchClient {
    http: reqwest::Client,
    cfg: FetchConfig,
}

impl FetchClient {
    pub fn new(cfg: FetchConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .user_agent(cfg.user_agent.clone())
            .build()?;
        Ok(Self { http, cfg })
    }

    /// One scrape of a board: up to `max_retries` attempts, backoff between
    /// retryable failures, immediate abort on terminal ones.
    pub async fn fetch_board(&self, source_id: &str) -> Result<RawBoard, FetchError> {
        let mut last_err = None;

        for attempt in 1..=self.cfg.max_retries {
            debug!(
                source_id,
                attempt,
                max = self.cfg.max_retries,
                "fetching board"
            );
            match self.attempt(source_id).await {
                Ok(board) => {
                    info!(source_id, jobs = board.jobs.len(), "fetched board");
                    return Ok(board);
                }
                Err(err) if !err.retryable => return Err(err),
                Err(err) => {
                    counter!("scrape_fetch_retries_total").increment(1);
                    if attempt < self.cfg.max_retries {
                        let wait = backoff_delay(
                            self.cfg.retry_base_ms,
                            attempt,
                            rand::rng().random(),
                        );
                        warn!(
                            source_id,
                            attempt,
                            wait_ms = wait.as_millis() as u64,
                            error = %err,
                            "transient fetch failure, retrying"
                        );
                        tokio::time::sleep(wait).await;
                    }
                    last_err = Some(err);
                }
            }
        }

        Err(last_err.unwrap_or_else(|| {
            FetchError::new(source_id, None, false, "no fetch attempts configured")
        }))
    }

    async fn attempt(&self, source_id: &str) -> Result<RawBoard, FetchError> {
        let url = format!("{}/{}", self.cfg.base_url, source_id);
        let mut req = self.http.get(&url);
        if self.cfg.include_compensation {
            req = req.query(&[("includeCompensation", "true")]);
        }

        let resp = req.send().await.map_err(|e| {
            FetchError::new(source_id, None, true, format!("network error for `{source_id}`: {e}"))
        })?;

        let status = resp.status().as_u16();
        if !resp.status().is_success() {
            return Err(FetchError::new(
                source_id,
                Some(status),
                is_retryable(Some(status)),
                format!("fetch failed for `{source_id}`: HTTP {status}"),
            ));
        }

        resp.json::<RawBoard>().await.map_err(|e| {
            FetchError::new(
                source_id,
                Some(status),
                false,
                format!("invalid board payload for `{source_id}`: {e}"),
            )
        })
    }
}

#[async_trait]
impl JobBoard for FetchClient {
    async fn fetch(&self, source_id: &str) -> Result<RawBoard, FetchError> {
        self.fetch_board(source_id).await
    }
}
