// src/normalize.rs
//! Converts raw board payloads into canonical [`Job`] records.

use chrono::{DateTime, Utc};
use once_cell::sync::OnceCell;
use regex::Regex;
use tracing::{debug, warn};
use url::Url;

use crate::fetch::{RawBoard, RawPosting};
use crate::job::{fingerprint, Job};

/// Last non-empty path segment of the posting URL. A URL that does not parse
/// is used verbatim as the id, so oddly-shaped but stable links keep an
/// identity; no URL or no segment means the posting cannot be tracked.
pub fn extract_job_id(job_url: Option<&str>) -> Option<String> {
    let raw = job_url?.trim();
    if raw.is_empty() {
        return None;
    }
    match Url::parse(raw) {
        Ok(url) => url
            .path_segments()
            .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
            .map(str::to_string),
        Err(_) => Some(raw.to_string()),
    }
}

/// Strip tags and attributes from posting markup, leaving plain text.
pub fn strip_markup(html: &str) -> String {
    static RE_TAGS: OnceCell<Regex> = OnceCell::new();
    static RE_WS: OnceCell<Regex> = OnceCell::new();

    let mut out = html_escape::decode_html_entities(html).to_string();

    let re_tags = RE_TAGS.get_or_init(|| Regex::new(r"(?is)</?[^>]+>").unwrap());
    out = re_tags.replace_all(&out, " ").to_string();

    let re_ws = RE_WS.get_or_init(|| Regex::new(r"\s+").unwrap());
    out = re_ws.replace_all(&out, " ").to_string();

    out.trim().to_string()
}

fn parse_published_at(raw: Option<&str>, fallback: DateTime<Utc>) -> DateTime<Utc> {
    raw.and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(fallback)
}

/// Canonicalize one raw posting. Returns `None` when no stable identity can
/// be extracted.
pub fn normalize_posting(raw: &RawPosting, source_id: &str) -> Option<Job> {
    let job_id = match extract_job_id(raw.job_url.as_deref()) {
        Some(id) => id,
        None => {
            warn!(
                source_id,
                title = raw.title.as_deref().unwrap_or(""),
                "skipping posting with no extractable id"
            );
            return None;
        }
    };

    let title = raw
        .title
        .clone()
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| "Untitled".to_string());
    let location = raw
        .location
        .clone()
        .filter(|l| !l.is_empty())
        .unwrap_or_else(|| "Unknown".to_string());

    let description = match raw.description_plain.as_deref() {
        Some(plain) if !plain.is_empty() => plain.to_string(),
        _ => strip_markup(raw.description_html.as_deref().unwrap_or_default()),
    };

    let compensation_summary = raw.compensation.as_ref().and_then(|c| {
        c.compensation_tier_summary
            .clone()
            .filter(|s| !s.is_empty())
            .or_else(|| {
                c.scrapeable_compensation_salary_summary
                    .clone()
                    .filter(|s| !s.is_empty())
            })
    });

    let content_hash = fingerprint([
        title.as_str(),
        location.as_str(),
        description.as_str(),
        raw.employment_type.as_deref().unwrap_or_default(),
        if raw.is_remote { "true" } else { "false" },
        raw.team.as_deref().unwrap_or_default(),
        raw.department.as_deref().unwrap_or_default(),
    ]);

    let now = Utc::now();
    Some(Job {
        source_id: source_id.to_string(),
        job_id,
        title,
        location,
        team: raw.team.clone(),
        department: raw.department.clone(),
        employment_type: raw.employment_type.clone(),
        remote: raw.is_remote,
        description,
        description_html: raw.description_html.clone().unwrap_or_default(),
        apply_url: raw.apply_url.clone().unwrap_or_default(),
        job_url: raw.job_url.clone().unwrap_or_default(),
        published_at: parse_published_at(raw.published_at.as_deref(), now),
        scraped_at: now,
        compensation_summary,
        content_hash,
        is_active: true,
    })
}

/// Normalize a whole board response. Postings the source already delists are
/// dropped here; removal events are the diff engine's job and are driven only
/// by currently-listed postings.
pub fn normalize_board(board: &RawBoard, source_id: &str) -> Vec<Job> {
    let jobs: Vec<Job> = board
        .jobs
        .iter()
        .filter(|p| p.is_listed != Some(false))
        .filter_map(|p| normalize_posting(p, source_id))
        .collect();
    debug!(source_id, count = jobs.len(), "normalized board");
    jobs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_id_is_last_nonempty_segment() {
        assert_eq!(
            extract_job_id(Some("https://jobs.example.com/board/acme/abc-123")),
            Some("abc-123".to_string())
        );
        assert_eq!(
            extract_job_id(Some("https://jobs.example.com/board/acme/abc-123/")),
            Some("abc-123".to_string())
        );
    }

    #[test]
    fn job_id_absent_for_bare_host_or_missing_url() {
        assert_eq!(extract_job_id(Some("https://jobs.example.com")), None);
        assert_eq!(extract_job_id(Some("https://jobs.example.com/")), None);
        assert_eq!(extract_job_id(Some("")), None);
        assert_eq!(extract_job_id(None), None);
    }

    #[test]
    fn unparseable_url_is_used_verbatim() {
        assert_eq!(
            extract_job_id(Some("not a url")),
            Some("not a url".to_string())
        );
    }

    #[test]
    fn strip_markup_drops_tags_and_entities() {
        assert_eq!(
            strip_markup("<p>Build <b>things</b> &amp; ship</p>"),
            "Build things & ship"
        );
        assert_eq!(strip_markup("<ul><li>a</li><li>b</li></ul>"), "a b");
        assert_eq!(strip_markup(""), "");
    }

    #[test]
    fn plain_description_preferred_over_markup() {
        let raw = RawPosting {
            job_url: Some("https://jobs.example.com/x/id1".into()),
            description_plain: Some("plain text".into()),
            description_html: Some("<p>markup</p>".into()),
            ..Default::default()
        };
        let job = normalize_posting(&raw, "acme").unwrap();
        assert_eq!(job.description, "plain text");
        assert_eq!(job.description_html, "<p>markup</p>");
    }

    #[test]
    fn missing_title_and_location_get_placeholders() {
        let raw = RawPosting {
            job_url: Some("https://jobs.example.com/x/id1".into()),
            ..Default::default()
        };
        let job = normalize_posting(&raw, "acme").unwrap();
        assert_eq!(job.title, "Untitled");
        assert_eq!(job.location, "Unknown");
    }
}
