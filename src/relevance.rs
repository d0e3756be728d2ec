// src/relevance.rs
//! Relevance scoring: declarative rule set, per-job scores and matched
//! signals, ranked and threshold-filtered output.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::info;

use crate::job::Job;

pub const DEFAULT_RULES_PATH: &str = "config/rules.toml";
pub const ENV_RULES_PATH: &str = "RULES_PATH";
pub const ENV_MIN_SCORE: &str = "MIN_RELEVANCE_SCORE";

/// Declarative rule set (TOML). Keyword weights may be negative to penalize
/// e.g. seniority terms; each boost applies at most once per job.
///
/// Keywords are kept ordered so signal output is deterministic.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RuleSet {
    pub keywords: BTreeMap<String, i32>,
    pub locations: Vec<String>,
    pub departments: Vec<String>,
    pub location_boost: i32,
    pub remote_boost: i32,
    pub department_boost: i32,
    pub freshness_boost: i32,
    pub freshness_boost_hours: i64,
    pub min_score: i32,
}

impl Default for RuleSet {
    fn default() -> Self {
        Self {
            keywords: BTreeMap::new(),
            locations: Vec::new(),
            departments: Vec::new(),
            location_boost: 5,
            remote_boost: 0,
            department_boost: 3,
            freshness_boost: 0,
            freshness_boost_hours: 0,
            min_score: 5,
        }
    }
}

/// A job plus its computed relevance.
#[derive(Debug, Clone)]
pub struct ScoredJob {
    pub job: Job,
    pub score: i32,
    pub signals: Vec<String>,
}

/// `all` is every job scored, sorted descending (stable on ties); `filtered`
/// keeps those at or above the configured minimum.
#[derive(Debug, Clone, Default)]
pub struct Ranked {
    pub all: Vec<ScoredJob>,
    pub filtered: Vec<ScoredJob>,
}

pub struct RelevanceEngine {
    rules: RuleSet,
}

impl RelevanceEngine {
    pub fn new(rules: RuleSet) -> Self {
        Self { rules }
    }

    pub fn from_toml_str(toml_str: &str) -> anyhow::Result<Self> {
        let rules: RuleSet = toml::from_str(toml_str)?;
        Ok(Self::new(rules))
    }

    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading rules from {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("parsing rules from {}", path.display()))
    }

    /// Load from `$RULES_PATH` or the default path, with `$MIN_RELEVANCE_SCORE`
    /// overriding the file's threshold.
    pub fn load_default() -> anyhow::Result<Self> {
        let path = std::env::var(ENV_RULES_PATH)
            .unwrap_or_else(|_| DEFAULT_RULES_PATH.to_string());
        let mut engine = Self::from_path(Path::new(&path))?;
        if let Some(min) = std::env::var(ENV_MIN_SCORE)
            .ok()
            .and_then(|v| v.trim().parse().ok())
        {
            engine.rules.min_score = min;
        }
        Ok(engine)
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    pub fn set_min_score(&mut self, min_score: i32) {
        self.rules.min_score = min_score;
    }

    /// Score one job at a fixed instant. Signals record every triggered rule
    /// in keyword → location → remote → department → freshness order.
    pub fn score_at(&self, job: &Job, now: DateTime<Utc>) -> (i32, Vec<String>) {
        let mut score = 0;
        let mut signals = Vec::new();

        let haystack = format!("{} {}", job.title, job.description).to_lowercase();
        for (keyword, weight) in &self.rules.keywords {
            if haystack.contains(&keyword.to_lowercase()) {
                score += weight;
                signals.push(format!("keyword:\"{keyword}\" ({weight:+})"));
            }
        }

        let location = job.location.to_lowercase();
        for wanted in &self.rules.locations {
            if location.contains(&wanted.to_lowercase()) {
                score += self.rules.location_boost;
                signals.push(format!(
                    "location:\"{wanted}\" (+{})",
                    self.rules.location_boost
                ));
                break;
            }
        }

        if self.rules.remote_boost != 0 && job.remote {
            score += self.rules.remote_boost;
            signals.push(format!("remote (+{})", self.rules.remote_boost));
        }

        let department = job.department.as_deref().unwrap_or_default().to_lowercase();
        if !department.is_empty() {
            for wanted in &self.rules.departments {
                if department.contains(&wanted.to_lowercase()) {
                    score += self.rules.department_boost;
                    signals.push(format!(
                        "department:\"{wanted}\" (+{})",
                        self.rules.department_boost
                    ));
                    break;
                }
            }
        }

        if self.rules.freshness_boost != 0 && self.rules.freshness_boost_hours > 0 {
            let hours = (now - job.published_at).num_hours();
            if hours <= self.rules.freshness_boost_hours {
                score += self.rules.freshness_boost;
                signals.push(format!(
                    "fresh:{hours}h (+{})",
                    self.rules.freshness_boost
                ));
            }
        }

        (score, signals)
    }

    /// Score every job, sort descending (ties keep input order), and keep
    /// jobs at or above `min_score` in `filtered`.
    pub fn filter_and_rank(&self, jobs: Vec<Job>, now: DateTime<Utc>) -> Ranked {
        let mut all: Vec<ScoredJob> = jobs
            .into_iter()
            .map(|job| {
                let (score, signals) = self.score_at(&job, now);
                ScoredJob {
                    job,
                    score,
                    signals,
                }
            })
            .collect();
        all.sort_by(|a, b| b.score.cmp(&a.score));

        let filtered: Vec<ScoredJob> = all
            .iter()
            .filter(|s| s.score >= self.rules.min_score)
            .cloned()
            .collect();

        info!(
            above = filtered.len(),
            total = all.len(),
            min = self.rules.min_score,
            "relevance pass complete"
        );

        Ranked { all, filtered }
    }
}
