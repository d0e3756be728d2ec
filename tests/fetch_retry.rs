// tests/fetch_retry.rs
// Fetch client against a local stub board server: retry on transient
// statuses, immediate abort on terminal ones.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;

use jobwatch::config::FetchConfig;
use jobwatch::fetch::FetchClient;

const VALID_BOARD: &str =
    r#"{"jobs": [{"title": "Engineer", "jobUrl": "https://jobs.example.com/acme/eng-1"}]}"#;

/// Serves the scripted statuses in order, then the success body forever.
#[derive(Clone)]
struct Script {
    hits: Arc<AtomicUsize>,
    failures: Arc<Vec<StatusCode>>,
    success_body: &'static str,
}

impl Script {
    fn new(failures: Vec<StatusCode>, success_body: &'static str) -> Self {
        Self {
            hits: Arc::new(AtomicUsize::new(0)),
            failures: Arc::new(failures),
            success_body,
        }
    }

    fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

async fn board(State(script): State<Script>) -> impl IntoResponse {
    let hit = script.hits.fetch_add(1, Ordering::SeqCst);
    match script.failures.get(hit) {
        Some(&status) => (status, "upstream error".to_string()),
        None => (StatusCode::OK, script.success_body.to_string()),
    }
}

async fn spawn_board(script: Script) -> SocketAddr {
    let app = Router::new()
        .route("/board/{slug}", get(board))
        .with_state(script);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn client_for(addr: SocketAddr) -> FetchClient {
    let cfg = FetchConfig {
        base_url: format!("http://{addr}/board"),
        retry_base_ms: 5,
        timeout_secs: 5,
        ..FetchConfig::default()
    };
    FetchClient::new(cfg).unwrap()
}

#[tokio::test]
async fn healthy_board_fetches_on_first_attempt() {
    let script = Script::new(vec![], VALID_BOARD);
    let addr = spawn_board(script.clone()).await;

    let board = client_for(addr).fetch_board("acme").await.unwrap();
    assert_eq!(board.jobs.len(), 1);
    assert_eq!(board.jobs[0].title.as_deref(), Some("Engineer"));
    assert_eq!(script.hits(), 1);
}

#[tokio::test]
async fn rate_limit_is_retried_until_success() {
    let script = Script::new(vec![StatusCode::TOO_MANY_REQUESTS], VALID_BOARD);
    let addr = spawn_board(script.clone()).await;

    let board = client_for(addr).fetch_board("acme").await.unwrap();
    assert_eq!(board.jobs.len(), 1);
    // one 429 then one successful attempt
    assert_eq!(script.hits(), 2);
}

#[tokio::test]
async fn server_errors_exhaust_the_retry_budget() {
    let script = Script::new(
        vec![
            StatusCode::INTERNAL_SERVER_ERROR,
            StatusCode::BAD_GATEWAY,
            StatusCode::SERVICE_UNAVAILABLE,
        ],
        VALID_BOARD,
    );
    let addr = spawn_board(script.clone()).await;

    let err = client_for(addr).fetch_board("acme").await.unwrap_err();
    assert!(err.retryable);
    assert_eq!(err.status, Some(503));
    assert_eq!(err.source_id, "acme");
    // default budget is 3 attempts, all spent
    assert_eq!(script.hits(), 3);
}

#[tokio::test]
async fn not_found_aborts_without_retrying() {
    let script = Script::new(vec![StatusCode::NOT_FOUND], VALID_BOARD);
    let addr = spawn_board(script.clone()).await;

    let err = client_for(addr).fetch_board("missing").await.unwrap_err();
    assert!(!err.retryable);
    assert_eq!(err.status, Some(404));
    assert_eq!(script.hits(), 1);
}

#[tokio::test]
async fn payload_without_jobs_list_is_terminal() {
    let script = Script::new(vec![], r#"{"postings": []}"#);
    let addr = spawn_board(script.clone()).await;

    let err = client_for(addr).fetch_board("acme").await.unwrap_err();
    assert!(!err.retryable);
    assert_eq!(err.status, Some(200));
    // structural errors never burn retry attempts
    assert_eq!(script.hits(), 1);
}
