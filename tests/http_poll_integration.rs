//! Integration tests for the HTTP poll client.
//!
//! Each test spins up an Axum server on a random port and points a real
//! `HttpPollClient` at it.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use axum::Router;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use serde_json::json;
use tokio::net::TcpListener;

use bot_fleet::agent::{AgentStatus, Credentials};
use bot_fleet::config::StagnationPolicy;
use bot_fleet::error::PollError;
use bot_fleet::poll::{HttpPollClient, PollClient};
use bot_fleet::supervisor::Supervisor;
use bot_fleet::worker::WorkerSettings;

const TEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Start a server with `app` on a random port, return its airdrop URL.
async fn serve(app: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    tokio::time::sleep(Duration::from_millis(50)).await;
    format!("http://127.0.0.1:{port}/api/airdrop")
}

/// Airdrop endpoint that checks both credential headers.
async fn airdrop(State(points): State<Arc<AtomicU64>>, headers: HeaderMap) -> impl IntoResponse {
    let auth = headers.get("authorization").and_then(|v| v.to_str().ok());
    let cookie = headers.get("cookie").and_then(|v| v.to_str().ok());
    if auth != Some("Bearer good-token") || cookie != Some("session=abc") {
        return (StatusCode::UNAUTHORIZED, "denied").into_response();
    }
    let n = points.fetch_add(10, Ordering::SeqCst) + 10;
    axum::Json(json!({ "points": n, "streak": 2 })).into_response()
}

fn airdrop_app() -> Router {
    Router::new()
        .route("/api/airdrop", get(airdrop))
        .with_state(Arc::new(AtomicU64::new(0)))
}

fn good_creds() -> Credentials {
    Credentials::new(Some("good-token".into()), Some("session=abc".into()))
}

#[tokio::test]
async fn fetch_sends_headers_and_parses_points() {
    let url = serve(airdrop_app()).await;
    let client = HttpPollClient::new(url, TEST_TIMEOUT).unwrap();

    let snap = client.fetch(&good_creds()).await.unwrap();
    assert_eq!(snap.score, 10.0);
    assert_eq!(snap.payload["streak"], 2);

    let snap = client.fetch(&good_creds()).await.unwrap();
    assert_eq!(snap.score, 20.0);
}

#[tokio::test]
async fn non_200_is_unexpected_status() {
    let url = serve(airdrop_app()).await;
    let client = HttpPollClient::new(url, TEST_TIMEOUT).unwrap();

    let creds = Credentials::new(Some("stale".into()), Some("session=abc".into()));
    assert_eq!(
        client.fetch(&creds).await.unwrap_err(),
        PollError::UnexpectedStatus(401)
    );
}

#[tokio::test]
async fn non_json_body_is_malformed() {
    let app = Router::new().route("/api/airdrop", get(|| async { "<html>maintenance</html>" }));
    let url = serve(app).await;
    let client = HttpPollClient::new(url, TEST_TIMEOUT).unwrap();

    assert!(matches!(
        client.fetch(&good_creds()).await,
        Err(PollError::MalformedResponse(_))
    ));
}

#[tokio::test]
async fn json_without_points_is_malformed() {
    let app = Router::new().route(
        "/api/airdrop",
        get(|| async { axum::Json(json!({ "message": "come back later" })) }),
    );
    let url = serve(app).await;
    let client = HttpPollClient::new(url, TEST_TIMEOUT).unwrap();

    assert!(matches!(
        client.fetch(&good_creds()).await,
        Err(PollError::MalformedResponse(_))
    ));
}

#[tokio::test]
async fn slow_server_hits_timeout() {
    let app = Router::new().route(
        "/api/airdrop",
        get(|| async {
            tokio::time::sleep(Duration::from_secs(2)).await;
            axum::Json(json!({ "points": 1 }))
        }),
    );
    let url = serve(app).await;
    let client = HttpPollClient::new(url, Duration::from_millis(100)).unwrap();

    assert!(matches!(
        client.fetch(&good_creds()).await,
        Err(PollError::TransportFailure(_))
    ));
}

#[tokio::test]
async fn connection_refused_is_transport_failure() {
    // Bind and drop to get a port nothing listens on.
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().port()
    };
    let client =
        HttpPollClient::new(format!("http://127.0.0.1:{port}/api/airdrop"), TEST_TIMEOUT).unwrap();

    assert!(matches!(
        client.fetch(&good_creds()).await,
        Err(PollError::TransportFailure(_))
    ));
}

#[tokio::test]
async fn supervised_agent_polls_real_endpoint_until_rejected() {
    let url = serve(airdrop_app()).await;
    let client: Arc<dyn PollClient> = Arc::new(HttpPollClient::new(url, TEST_TIMEOUT).unwrap());
    let sup = Supervisor::new(
        client,
        WorkerSettings {
            poll_interval: Duration::from_millis(10),
            stagnation: StagnationPolicy::Stop,
        },
    );

    let good = sup.create("good", good_creds()).await.unwrap();
    // Missing cookie marker: accepted at creation, fails on first poll.
    let partial = sup
        .create("partial", Credentials::new(Some("good-token".into()), None))
        .await
        .unwrap();
    sup.start(good).await.unwrap();
    sup.start(partial).await.unwrap();

    tokio::time::timeout(TEST_TIMEOUT, async {
        loop {
            let good_snap = sup.snapshot(good).await.unwrap();
            let partial_snap = sup.snapshot(partial).await.unwrap();
            if good_snap.successful_polls >= 2 && partial_snap.status == AgentStatus::Stopped {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("agents never reached expected state");

    assert_eq!(sup.snapshot(good).await.unwrap().status, AgentStatus::Running);
    assert_eq!(sup.snapshot(partial).await.unwrap().score, 0.0);
    sup.shutdown(TEST_TIMEOUT).await;
    assert_eq!(sup.running_count().await, 0);
}
