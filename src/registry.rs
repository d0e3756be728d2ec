// src/registry.rs
//! Source registry: the employers to poll and how often.
//!
//! A TOML file of entries; merging with database-discovered sources is
//! deliberately not modeled here — the file is the source list.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use anyhow::Context;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

fn default_true() -> bool {
    true
}

fn default_frequency() -> i64 {
    12
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryEntry {
    pub name: String,
    pub slug: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_frequency")]
    pub frequency_hours: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Registry {
    #[serde(default)]
    pub sources: Vec<RegistryEntry>,
}

impl Registry {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading registry from {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("parsing registry from {}", path.display()))
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)
            .with_context(|| format!("writing registry to {}", path.display()))
    }

    /// Append a source unless its slug is already present (case-insensitive).
    pub fn add(&mut self, slug: &str, name: Option<&str>) -> bool {
        if self
            .sources
            .iter()
            .any(|e| e.slug.eq_ignore_ascii_case(slug))
        {
            return false;
        }
        self.sources.push(RegistryEntry {
            name: name.unwrap_or(slug).to_string(),
            slug: slug.to_string(),
            enabled: true,
            frequency_hours: default_frequency(),
        });
        true
    }

    /// Enabled sources that are due at `now`: never scraped, or elapsed time
    /// at or past the per-source frequency.
    pub fn due_sources(
        &self,
        last_scraped: &HashMap<String, Option<DateTime<Utc>>>,
        now: DateTime<Utc>,
    ) -> Vec<RegistryEntry> {
        self.sources
            .iter()
            .filter(|e| e.enabled)
            .filter(|e| match last_scraped.get(&e.slug).copied().flatten() {
                None => true,
                Some(ts) => now - ts >= Duration::hours(e.frequency_hours),
            })
            .cloned()
            .collect()
    }
}
