//! Retry and backoff behaviour of the fetcher.

mod support;

use devfetch_core::ErrorKind;
use devfetch_core::tools::AttemptOutcome;
use devfetch_tools_release::{Fetcher, RetryPolicy};
use std::time::{Duration, Instant};
use support::{BINARY, staged_files};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_recovers_after_transient_failures() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/artifact"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/artifact"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(BINARY))
        .mount(&server)
        .await;

    let staging = TempDir::new().unwrap();
    let policy = RetryPolicy::new(3, Duration::from_millis(25));
    let fetcher = Fetcher::new(policy).unwrap();

    let started = Instant::now();
    let downloaded = fetcher
        .download(&format!("{}/artifact", server.uri()), staging.path())
        .await
        .unwrap();
    let elapsed = started.elapsed();

    assert_eq!(std::fs::read(downloaded.path()).unwrap(), BINARY);
    assert_eq!(downloaded.report.attempt_count(), 3);
    assert_eq!(
        downloaded.report.attempts[0].outcome,
        AttemptOutcome::HttpError { status: 503 }
    );
    assert!(downloaded.report.attempts[2].outcome.is_success());

    // 25ms after the first failure, 50ms after the second
    assert_eq!(downloaded.report.total_backoff(), Duration::from_millis(75));
    assert!(elapsed >= Duration::from_millis(75));

    // Only the good file survives
    let files = staged_files(staging.path());
    assert_eq!(files.len(), 1);
    assert!(files[0].starts_with(".devfetch-"));
    assert!(files[0].ends_with(".part"));

    drop(downloaded);
    assert!(staged_files(staging.path()).is_empty());
}

#[tokio::test]
async fn test_exhaustion_reports_attempts() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/artifact"))
        .respond_with(ResponseTemplate::new(404))
        .expect(2)
        .mount(&server)
        .await;

    let staging = TempDir::new().unwrap();
    let fetcher = Fetcher::new(RetryPolicy::new(2, Duration::from_millis(5))).unwrap();
    let url = format!("{}/artifact", server.uri());

    let err = fetcher.download(&url, staging.path()).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::FetchExhausted);
    match err {
        devfetch_core::Error::FetchExhausted {
            url: failed,
            attempts,
            last_error,
        } => {
            assert_eq!(failed, url);
            assert_eq!(attempts, 2);
            assert_eq!(last_error, "HTTP 404");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(staged_files(staging.path()).is_empty());
}

#[tokio::test]
async fn test_connection_refused_is_retried() {
    // Bind then drop a listener to get a port nothing listens on
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };

    let staging = TempDir::new().unwrap();
    let fetcher = Fetcher::new(RetryPolicy::new(2, Duration::from_millis(5))).unwrap();
    let err = fetcher
        .download(&format!("http://127.0.0.1:{port}/artifact"), staging.path())
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::FetchExhausted);
    assert!(err.to_string().contains("2 attempt(s)"));
}

#[tokio::test]
async fn test_creates_staging_dir() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/artifact"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(BINARY))
        .mount(&server)
        .await;

    let root = TempDir::new().unwrap();
    let staging = root.path().join("downloads").join("tool");
    let fetcher = Fetcher::new(RetryPolicy::default()).unwrap();
    let downloaded = fetcher
        .download(&format!("{}/artifact", server.uri()), &staging)
        .await
        .unwrap();

    assert!(downloaded.path().starts_with(&staging));
    assert_eq!(downloaded.report.total_backoff(), Duration::ZERO);
}
