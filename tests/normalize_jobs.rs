// tests/normalize_jobs.rs
// Board-level normalization: identity extraction, filtering, hash stability.

use jobwatch::fetch::{RawBoard, RawCompensation, RawPosting};
use jobwatch::normalize::{normalize_board, normalize_posting};

fn posting(id: &str) -> RawPosting {
    RawPosting {
        title: Some("Software Engineer".into()),
        location: Some("New York".into()),
        team: Some("Platform".into()),
        department: Some("Engineering".into()),
        employment_type: Some("FullTime".into()),
        is_remote: true,
        description_plain: None,
        description_html: Some("<p>Build <b>things</b></p>".into()),
        apply_url: Some(format!("https://jobs.example.com/{id}/apply")),
        job_url: Some(format!("https://jobs.example.com/acme/{id}")),
        published_at: Some("2026-07-01T12:00:00Z".into()),
        is_listed: Some(true),
        compensation: None,
    }
}

#[test]
fn posting_without_url_is_dropped() {
    let mut raw = posting("abc");
    raw.job_url = None;
    assert!(normalize_posting(&raw, "acme").is_none());
}

#[test]
fn job_identity_comes_from_url_path() {
    let job = normalize_posting(&posting("abc-123"), "acme").unwrap();
    assert_eq!(job.job_id, "abc-123");
    assert_eq!(job.source_id, "acme");
}

#[test]
fn renormalizing_same_posting_yields_identical_hash() {
    let raw = posting("abc");
    let first = normalize_posting(&raw, "acme").unwrap();
    let second = normalize_posting(&raw, "acme").unwrap();
    assert_eq!(first.content_hash, second.content_hash);
}

#[test]
fn description_change_changes_hash() {
    let raw = posting("abc");
    let mut changed = posting("abc");
    changed.description_html = Some("<p>Build other things</p>".into());

    let a = normalize_posting(&raw, "acme").unwrap();
    let b = normalize_posting(&changed, "acme").unwrap();
    assert_ne!(a.content_hash, b.content_hash);
}

#[test]
fn compensation_and_publish_date_do_not_affect_hash() {
    let plain = posting("abc");

    let mut with_comp = posting("abc");
    with_comp.compensation = Some(RawCompensation {
        compensation_tier_summary: Some("$150k – $180k".into()),
        scrapeable_compensation_salary_summary: None,
    });
    with_comp.published_at = Some("2026-08-01T00:00:00Z".into());

    let a = normalize_posting(&plain, "acme").unwrap();
    let b = normalize_posting(&with_comp, "acme").unwrap();
    assert_eq!(a.content_hash, b.content_hash);
    assert_eq!(b.compensation_summary.as_deref(), Some("$150k – $180k"));
}

#[test]
fn compensation_prefers_tier_summary() {
    let mut raw = posting("abc");
    raw.compensation = Some(RawCompensation {
        compensation_tier_summary: Some("".into()),
        scrapeable_compensation_salary_summary: Some("$90k".into()),
    });
    let job = normalize_posting(&raw, "acme").unwrap();
    // empty tier summary falls through to the scrapeable one
    assert_eq!(job.compensation_summary.as_deref(), Some("$90k"));
}

#[test]
fn unlisted_postings_never_reach_the_diff() {
    let mut delisted = posting("gone");
    delisted.is_listed = Some(false);
    let board = RawBoard {
        jobs: vec![posting("kept"), delisted],
    };

    let jobs = normalize_board(&board, "acme");
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].job_id, "kept");
}

#[test]
fn markup_is_stripped_for_display_and_hashing() {
    let job = normalize_posting(&posting("abc"), "acme").unwrap();
    assert_eq!(job.description, "Build things");
    assert_eq!(job.description_html, "<p>Build <b>things</b></p>");
}

#[test]
fn published_at_parses_rfc3339() {
    let job = normalize_posting(&posting("abc"), "acme").unwrap();
    assert_eq!(job.published_at.to_rfc3339(), "2026-07-01T12:00:00+00:00");
}
