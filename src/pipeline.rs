// src/pipeline.rs
//! One pipeline run: due-check, then per due source fetch → normalize →
//! diff → persist, then a scoring pass over everything still active.
//!
//! Sources are processed strictly sequentially; a failed source is logged
//! and skipped so the rest of the run proceeds. Only an unreachable store
//! aborts the run.

use std::time::Duration;

use chrono::Utc;
use metrics::{counter, describe_counter, describe_gauge, gauge};
use once_cell::sync::OnceCell;
use rand::Rng;
use tracing::{error, info};

use crate::diff::{ChangeEvent, ChangeKind, DiffEngine};
use crate::fetch::JobBoard;
use crate::normalize::normalize_board;
use crate::registry::{Registry, RegistryEntry};
use crate::relevance::{Ranked, RelevanceEngine};
use crate::storage::{Storage, StorageError};

/// One-time metrics registration (so series show up for any exporter).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("scrape_runs_total", "Completed pipeline runs.");
        describe_counter!("scrape_sources_failed_total", "Sources skipped after errors.");
        describe_counter!("scrape_fetch_retries_total", "Fetch attempts that were retried.");
        describe_counter!("scrape_jobs_new_total", "Jobs first seen.");
        describe_counter!("scrape_jobs_updated_total", "Jobs with changed content.");
        describe_counter!("scrape_jobs_removed_total", "Jobs delisted by their source.");
        describe_gauge!("scrape_last_run_ts", "Unix ts of the last completed run.");
    });
}

/// What a run produced, handed to reporting.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub changes: Vec<ChangeEvent>,
    pub ranked: Ranked,
    pub sources_processed: usize,
    pub sources_failed: usize,
}

pub struct Pipeline<'a> {
    board: &'a dyn JobBoard,
    storage: &'a dyn Storage,
    relevance: &'a RelevanceEngine,
    registry: &'a Registry,
    pace_min_ms: u64,
    pace_max_ms: u64,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        board: &'a dyn JobBoard,
        storage: &'a dyn Storage,
        relevance: &'a RelevanceEngine,
        registry: &'a Registry,
        pace_min_ms: u64,
        pace_max_ms: u64,
    ) -> Self {
        Self {
            board,
            storage,
            relevance,
            registry,
            pace_min_ms,
            pace_max_ms,
        }
    }

    pub async fn run_once(&self) -> Result<RunSummary, StorageError> {
        ensure_metrics_described();
        let started = std::time::Instant::now();
        info!("pipeline run started");

        let last_scraped = self.storage.last_scraped_all().await?;
        let due = self.registry.due_sources(&last_scraped, Utc::now());
        if due.is_empty() {
            info!("no sources due for scraping");
            return Ok(RunSummary::default());
        }
        info!(sources = due.len(), "processing due sources");

        let diff = DiffEngine::new(self.storage);
        let mut changes: Vec<ChangeEvent> = Vec::new();
        let mut failed = 0usize;

        for (i, source) in due.iter().enumerate() {
            match self.process_source(&diff, source).await {
                Ok(mut events) => changes.append(&mut events),
                Err(err) => {
                    // An unreachable store means nothing further can commit.
                    if let Some(StorageError::Unavailable(msg)) =
                        err.downcast_ref::<StorageError>()
                    {
                        return Err(StorageError::Unavailable(msg.clone()));
                    }
                    failed += 1;
                    counter!("scrape_sources_failed_total").increment(1);
                    error!(source = %source.slug, error = %err, "source failed, continuing");
                }
            }

            if i + 1 < due.len() {
                tokio::time::sleep(pacing_delay(self.pace_min_ms, self.pace_max_ms)).await;
            }
        }

        let count = |kind: ChangeKind| changes.iter().filter(|e| e.kind == kind).count();
        counter!("scrape_jobs_new_total").increment(count(ChangeKind::New) as u64);
        counter!("scrape_jobs_updated_total").increment(count(ChangeKind::Updated) as u64);
        counter!("scrape_jobs_removed_total").increment(count(ChangeKind::Removed) as u64);

        let active = self.storage.all_active_jobs().await?;
        let ranked = self.relevance.filter_and_rank(active, Utc::now());

        counter!("scrape_runs_total").increment(1);
        gauge!("scrape_last_run_ts").set(Utc::now().timestamp().max(0) as f64);
        info!(
            elapsed_s = started.elapsed().as_secs_f64(),
            changes = changes.len(),
            failed,
            "pipeline run complete"
        );

        Ok(RunSummary {
            changes,
            ranked,
            sources_processed: due.len() - failed,
            sources_failed: failed,
        })
    }

    async fn process_source(
        &self,
        diff: &DiffEngine<'_>,
        source: &RegistryEntry,
    ) -> anyhow::Result<Vec<ChangeEvent>> {
        self.storage.upsert_source(&source.slug, &source.name).await?;

        let board = self.board.fetch(&source.slug).await?;
        let jobs = normalize_board(&board, &source.slug);
        let events = diff.detect_changes(&jobs, &source.slug).await?;

        self.storage.update_last_scraped(&source.slug).await?;

        info!(
            source = %source.slug,
            jobs = jobs.len(),
            changes = events.len(),
            "source complete"
        );
        Ok(events)
    }
}

/// Politeness pause between sources.
fn pacing_delay(min_ms: u64, max_ms: u64) -> Duration {
    let span = max_ms.saturating_sub(min_ms);
    let extra = if span == 0 {
        0
    } else {
        rand::rng().random_range(0..=span)
    };
    Duration::from_millis(min_ms + extra)
}
