// src/config.rs
//! Process configuration, resolved once at startup from the environment.
//!
//! `.env` loading happens in the binary before this runs; everything here is
//! plain env-var reads over hard defaults.

use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result};

pub const DEFAULT_RULES_PATH: &str = "config/rules.toml";
pub const DEFAULT_REGISTRY_PATH: &str = "config/registry.toml";
pub const DEFAULT_REPORTS_DIR: &str = "reports";

const DEFAULT_BASE_URL: &str = "https://api.ashbyhq.com/posting-api/job-board";
const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/122.0.0.0 Safari/537.36";

/// Fetch client tuning. Defaults match the production board API.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub base_url: String,
    pub include_compensation: bool,
    pub max_retries: u32,
    pub retry_base_ms: u64,
    pub timeout_secs: u64,
    pub user_agent: String,
    /// Politeness pause between sources, min/max milliseconds.
    pub pace_min_ms: u64,
    pub pace_max_ms: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            include_compensation: true,
            max_retries: 3,
            retry_base_ms: 1000,
            timeout_secs: 30,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            pace_min_ms: 2000,
            pace_max_ms: 10_000,
        }
    }
}

/// Scheduler cadence for the `start` command.
#[derive(Debug, Clone)]
pub struct ScheduleConfig {
    pub interval_hours: u64,
    pub jitter_max_minutes: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            interval_hours: 12,
            jitter_max_minutes: 5,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub fetch: FetchConfig,
    pub schedule: ScheduleConfig,
    pub rules_path: PathBuf,
    pub registry_path: PathBuf,
    pub reports_dir: PathBuf,
    /// Overrides the rule file's `min_score` when set.
    pub min_score: Option<i32>,
    pub cli_output: bool,
    pub markdown_report: bool,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let database_url =
            std::env::var("DATABASE_URL").context("DATABASE_URL is required")?;

        let mut fetch = FetchConfig::default();
        if let Ok(url) = std::env::var("FETCH_BASE_URL") {
            fetch.base_url = url;
        }
        fetch.max_retries = env_parse("FETCH_MAX_RETRIES").unwrap_or(fetch.max_retries);
        fetch.retry_base_ms = env_parse("FETCH_RETRY_BASE_MS").unwrap_or(fetch.retry_base_ms);
        fetch.timeout_secs = env_parse("FETCH_TIMEOUT_SECS").unwrap_or(fetch.timeout_secs);
        fetch.pace_min_ms = env_parse("PACE_MIN_MS").unwrap_or(fetch.pace_min_ms);
        fetch.pace_max_ms = env_parse("PACE_MAX_MS").unwrap_or(fetch.pace_max_ms);

        let mut schedule = ScheduleConfig::default();
        schedule.interval_hours =
            env_parse("SCRAPE_INTERVAL_HOURS").unwrap_or(schedule.interval_hours);
        schedule.jitter_max_minutes =
            env_parse("JITTER_MAX_MINUTES").unwrap_or(schedule.jitter_max_minutes);

        Ok(Self {
            database_url,
            fetch,
            schedule,
            rules_path: env_path("RULES_PATH", DEFAULT_RULES_PATH),
            registry_path: env_path("REGISTRY_PATH", DEFAULT_REGISTRY_PATH),
            reports_dir: env_path("REPORTS_DIR", DEFAULT_REPORTS_DIR),
            min_score: env_parse("MIN_RELEVANCE_SCORE"),
            cli_output: env_flag("ENABLE_CLI_OUTPUT", true),
            markdown_report: env_flag("ENABLE_MARKDOWN_REPORT", true),
        })
    }
}

fn env_parse<T: FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

fn env_path(name: &str, default: &str) -> PathBuf {
    std::env::var(name)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(default))
}

fn env_flag(name: &str, default: bool) -> bool {
    match std::env::var(name) {
        Ok(v) => v != "false" && v != "0",
        Err(_) => default,
    }
}
