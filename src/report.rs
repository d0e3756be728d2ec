// src/report.rs
//! Run summary rendering: console overview and Markdown report files.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{DateTime, Utc};
use colored::Colorize;

use crate::diff::{ChangeEvent, ChangeKind};
use crate::job::Job;
use crate::pipeline::RunSummary;
use crate::relevance::ScoredJob;

const TOP_OPPORTUNITIES: usize = 10;

fn format_meta(job: &Job) -> String {
    let mut parts = vec![job.location.clone()];
    if job.remote {
        parts.push("Remote".to_string());
    }
    if let Some(dept) = &job.department {
        parts.push(dept.clone());
    }
    if let Some(team) = &job.team {
        parts.push(team.clone());
    }
    if let Some(kind) = &job.employment_type {
        parts.push(kind.clone());
    }
    parts.retain(|p| !p.is_empty());
    parts.join(" · ")
}

fn by_source(changes: &[ChangeEvent]) -> BTreeMap<&str, Vec<&ChangeEvent>> {
    let mut map: BTreeMap<&str, Vec<&ChangeEvent>> = BTreeMap::new();
    for change in changes {
        map.entry(change.job.source_id.as_str()).or_default().push(change);
    }
    map
}

/// Console overview: per-source change groups, then the top-scored postings.
pub fn print_run_summary(summary: &RunSummary) {
    println!("\n{}", "═".repeat(43).bold());
    println!("{}", "  Job Board Tracker — Run Summary".bold());
    println!("{}\n", "═".repeat(43).bold());

    if summary.changes.is_empty() {
        println!("{}\n", "  No changes detected.".dimmed());
        return;
    }

    for (source, changes) in by_source(&summary.changes) {
        let count = |kind: ChangeKind| changes.iter().filter(|c| c.kind == kind).count();
        println!("  {}", source.cyan().bold());
        println!(
            "  {}",
            format!(
                "{} new · {} updated · {} removed",
                count(ChangeKind::New),
                count(ChangeKind::Updated),
                count(ChangeKind::Removed)
            )
            .dimmed()
        );
        println!();

        for change in &changes {
            let job = &change.job;
            match change.kind {
                ChangeKind::New => {
                    let score_tag = summary
                        .ranked
                        .all
                        .iter()
                        .find(|s| {
                            s.job.job_id == job.job_id && s.job.source_id == job.source_id
                        })
                        .map(|s| format!(" [score: {}]", s.score).yellow().to_string())
                        .unwrap_or_default();
                    println!("    {} {}{}", "+".green(), job.title, score_tag);
                    println!("      {}", format_meta(job).dimmed());
                    if let Some(comp) = &job.compensation_summary {
                        println!("      {}", comp.green());
                    }
                    println!("      {}", job.apply_url.blue());
                }
                ChangeKind::Updated => {
                    println!("    {} {}", "~".yellow(), job.title);
                    println!("      {}", format_meta(job).dimmed());
                }
                ChangeKind::Removed => {
                    println!("    {} {}", "-".red(), job.title.strikethrough());
                    println!("      {}", format_meta(job).dimmed());
                }
            }
            println!();
        }
    }

    if !summary.ranked.filtered.is_empty() {
        println!("{}", "─".repeat(43).bold());
        println!(
            "{}",
            format!(
                "  Top Opportunities ({} above threshold)",
                summary.ranked.filtered.len()
            )
            .bold()
        );
        println!("{}\n", "─".repeat(43).bold());

        for scored in summary.ranked.filtered.iter().take(TOP_OPPORTUNITIES) {
            print_scored(scored);
        }
    }

    println!("{}\n", "═".repeat(43).bold());
}

fn print_scored(scored: &ScoredJob) {
    let job = &scored.job;
    println!(
        "  {} {} {}",
        job.title.white().bold(),
        "at".dimmed(),
        job.source_id.cyan()
    );
    println!(
        "    Score: {} — {}",
        scored.score.to_string().yellow(),
        scored.signals.join(", ").dimmed()
    );
    println!("    {}", format_meta(job).dimmed());
    if let Some(comp) = &job.compensation_summary {
        println!("    {}", comp.green());
    }
    println!("    {}", job.apply_url.blue());
    println!();
}

/// Render the run as Markdown.
pub fn render_markdown(summary: &RunSummary, generated_at: DateTime<Utc>) -> String {
    let mut out = String::new();
    out.push_str("# Job Board Tracker Report\n\n");
    out.push_str(&format!(
        "Generated: {}\n\n",
        generated_at.format("%Y-%m-%d %H:%M UTC")
    ));

    if summary.changes.is_empty() {
        out.push_str("No changes detected in this run.\n");
    } else {
        out.push_str("## Changes\n\n");
        for (source, changes) in by_source(&summary.changes) {
            out.push_str(&format!("### {source}\n\n"));
            for change in changes {
                let job = &change.job;
                let marker = match change.kind {
                    ChangeKind::New => "**NEW**",
                    ChangeKind::Updated => "**UPDATED**",
                    ChangeKind::Removed => "**REMOVED**",
                };
                out.push_str(&format!(
                    "- {marker} [{}]({}) — {}\n",
                    job.title,
                    if job.job_url.is_empty() {
                        &job.apply_url
                    } else {
                        &job.job_url
                    },
                    format_meta(job)
                ));
            }
            out.push('\n');
        }
    }

    if !summary.ranked.filtered.is_empty() {
        out.push_str("## Top Opportunities\n\n");
        out.push_str("| Score | Title | Source | Signals |\n");
        out.push_str("|---|---|---|---|\n");
        for scored in summary.ranked.filtered.iter().take(TOP_OPPORTUNITIES) {
            out.push_str(&format!(
                "| {} | [{}]({}) | {} | {} |\n",
                scored.score,
                scored.job.title,
                scored.job.apply_url,
                scored.job.source_id,
                scored.signals.join(", ")
            ));
        }
        out.push('\n');
    }

    out
}

/// Write a timestamped Markdown report under `dir`, returning its path.
pub fn write_markdown_report(dir: &Path, summary: &RunSummary) -> anyhow::Result<PathBuf> {
    let now = Utc::now();
    fs::create_dir_all(dir)
        .with_context(|| format!("creating reports dir {}", dir.display()))?;
    let path = dir.join(format!("report-{}.md", now.format("%Y%m%d-%H%M%S")));
    fs::write(&path, render_markdown(summary, now))
        .with_context(|| format!("writing report to {}", path.display()))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::{ChangeEvent, ChangeKind};
    use crate::relevance::Ranked;

    fn job(id: &str, title: &str) -> Job {
        Job {
            source_id: "acme".into(),
            job_id: id.into(),
            title: title.into(),
            location: "Remote".into(),
            team: None,
            department: Some("Engineering".into()),
            employment_type: Some("FullTime".into()),
            remote: true,
            description: String::new(),
            description_html: String::new(),
            apply_url: "https://jobs.example.com/apply/1".into(),
            job_url: "https://jobs.example.com/acme/1".into(),
            published_at: Utc::now(),
            scraped_at: Utc::now(),
            compensation_summary: Some("$100k – $140k".into()),
            content_hash: "h".into(),
            is_active: true,
        }
    }

    #[test]
    fn markdown_covers_changes_and_ranking() {
        let j = job("1", "Software Engineer");
        let summary = RunSummary {
            changes: vec![ChangeEvent {
                kind: ChangeKind::New,
                job: j.clone(),
                previous: None,
            }],
            ranked: Ranked {
                all: vec![],
                filtered: vec![ScoredJob {
                    job: j,
                    score: 12,
                    signals: vec!["remote (+10)".into()],
                }],
            },
            sources_processed: 1,
            sources_failed: 0,
        };

        let md = render_markdown(&summary, Utc::now());
        assert!(md.contains("### acme"));
        assert!(md.contains("**NEW** [Software Engineer]"));
        assert!(md.contains("| 12 |"));
        assert!(md.contains("remote (+10)"));
    }

    #[test]
    fn markdown_notes_quiet_runs() {
        let md = render_markdown(&RunSummary::default(), Utc::now());
        assert!(md.contains("No changes detected"));
    }

    #[test]
    fn meta_skips_missing_fields() {
        let mut j = job("1", "T");
        j.remote = false;
        j.department = None;
        j.employment_type = None;
        assert_eq!(format_meta(&j), "Remote"); // the location string itself
    }
}
