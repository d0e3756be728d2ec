// tests/relevance_rules.rs
// Handpicked scoring scenarios against a fixed rule set.

use chrono::{Duration, Utc};
use jobwatch::job::Job;
use jobwatch::relevance::{RelevanceEngine, RuleSet};

const RULES: &str = r#"
min_score = 5
location_boost = 5
remote_boost = 10
department_boost = 3
freshness_boost = 8
freshness_boost_hours = 48
locations = ["San Francisco", "New York"]
departments = ["Engineering"]

[keywords]
"new grad" = 15
"python" = 5
"senior" = -5
"#;

fn engine() -> RelevanceEngine {
    RelevanceEngine::from_toml_str(RULES).expect("load test rules")
}

fn job(title: &str) -> Job {
    Job {
        source_id: "acme".into(),
        job_id: "j1".into(),
        title: title.into(),
        location: "Nowhere".into(),
        team: None,
        department: None,
        employment_type: None,
        remote: false,
        description: String::new(),
        description_html: String::new(),
        apply_url: String::new(),
        job_url: String::new(),
        published_at: Utc::now() - Duration::days(30),
        scraped_at: Utc::now(),
        compensation_summary: None,
        content_hash: "h".into(),
        is_active: true,
    }
}

#[test]
fn new_grad_remote_fresh_scores_exactly_33() {
    let now = Utc::now();
    let mut j = job("New Grad Software Engineer");
    j.remote = true;
    j.published_at = now - Duration::hours(12);

    let (score, signals) = engine().score_at(&j, now);
    // keyword 15 + remote 10 + freshness 8; no location/department match
    assert_eq!(score, 33);
    assert_eq!(signals.len(), 3);
    assert!(signals[0].starts_with("keyword:\"new grad\""));
    assert!(signals[1].starts_with("remote"));
    assert!(signals[2].starts_with("fresh:"));
}

#[test]
fn keyword_match_is_case_insensitive_over_title_and_description() {
    let now = Utc::now();
    let mut j = job("Backend Developer");
    j.description = "We use PYTHON daily".into();

    let (score, signals) = engine().score_at(&j, now);
    assert_eq!(score, 5);
    assert_eq!(signals, vec!["keyword:\"python\" (+5)"]);
}

#[test]
fn negative_weights_penalize() {
    let now = Utc::now();
    let (score, signals) = engine().score_at(&job("Senior Python Engineer"), now);
    // python +5, senior -5
    assert_eq!(score, 0);
    assert!(signals.iter().any(|s| s == "keyword:\"senior\" (-5)"));
}

#[test]
fn location_boost_fires_once_on_first_match() {
    let now = Utc::now();
    let mut j = job("Engineer");
    // substring-matches both configured locations; only the first one counts
    j.location = "San Francisco or New York".into();

    let (score, signals) = engine().score_at(&j, now);
    assert_eq!(score, 5);
    assert_eq!(signals, vec!["location:\"San Francisco\" (+5)"]);
}

#[test]
fn department_boost_fires_once() {
    let now = Utc::now();
    let mut j = job("Engineer");
    j.department = Some("Platform Engineering".into());

    let (score, signals) = engine().score_at(&j, now);
    assert_eq!(score, 3);
    assert_eq!(signals, vec!["department:\"Engineering\" (+3)"]);
}

#[test]
fn stale_postings_get_no_freshness_boost() {
    let now = Utc::now();
    let mut j = job("Engineer");
    j.published_at = now - Duration::hours(72);

    let (score, signals) = engine().score_at(&j, now);
    assert_eq!(score, 0);
    assert!(signals.is_empty());
}

#[test]
fn filter_and_rank_partitions_at_threshold() {
    let now = Utc::now();
    let mut high = job("New Grad Engineer");
    high.job_id = "high".into();
    let mut low = job("Quiet Role");
    low.job_id = "low".into();

    let ranked = engine().filter_and_rank(vec![low, high], now);

    assert_eq!(ranked.all.len(), 2);
    assert_eq!(ranked.filtered.len(), 1);
    assert_eq!(ranked.filtered[0].job.job_id, "high");
    assert!(ranked.all.len() >= ranked.filtered.len());
    let min = engine().rules().min_score;
    assert!(ranked.filtered.iter().all(|s| s.score >= min));
    // descending order
    assert!(ranked.all[0].score >= ranked.all[1].score);
}

#[test]
fn equal_scores_keep_input_order() {
    let now = Utc::now();
    let mut first = job("Python Role A");
    first.job_id = "first".into();
    let mut second = job("Python Role B");
    second.job_id = "second".into();

    let ranked = engine().filter_and_rank(vec![first, second], now);
    assert_eq!(ranked.all[0].job.job_id, "first");
    assert_eq!(ranked.all[1].job.job_id, "second");
}

#[test]
fn empty_rule_set_scores_zero() {
    let engine = RelevanceEngine::new(RuleSet::default());
    let (score, signals) = engine.score_at(&job("Anything"), Utc::now());
    assert_eq!(score, 0);
    assert!(signals.is_empty());
}
