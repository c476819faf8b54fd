//! Integration tests for retry classification against real HTTP responses.
//!
//! Tests cover:
//! - 429 with `Retry-After` retried until success (N failures, N + 1 calls)
//! - 5xx retried until the budget is spent
//! - 4xx surfaced immediately
//! - overall deadline shorter than the backoff
//! - configuration wiring into a `Directory`

use std::time::Duration;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, ResponseTemplate};
use xavyo_directory_sync::{
    Directory, DirectoryConfig, DirectoryError, FieldFetchMode, RetryPolicy, UserRef,
};

mod helpers;
use helpers::mock_directory::{user_json, MockDirectory, TEST_TOKEN};

#[tokio::test]
async fn test_rate_limited_then_success() {
    let mock = MockDirectory::start().await;
    Mock::given(method("GET"))
        .and(path(mock.scim_path("/Users/U1")))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "0"))
        .up_to_n_times(2)
        .with_priority(1)
        .mount(&mock.server)
        .await;
    Mock::given(method("GET"))
        .and(path(mock.scim_path("/Users/U1")))
        .and(header("Authorization", format!("Bearer {TEST_TOKEN}").as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(user_json("U1", "jdoe", true)))
        .mount(&mock.server)
        .await;

    let directory = mock.directory();
    let user = directory
        .users()
        .lookup(&UserRef::Id("U1".into()))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(user.user_name, "jdoe");
    assert_eq!(mock.hits(&mock.scim_path("/Users/U1")).await, 3);
}

#[tokio::test]
async fn test_server_errors_exhaust_budget() {
    let mock = MockDirectory::start().await;
    Mock::given(method("GET"))
        .and(path(mock.scim_path("/Users/U1")))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .expect(3)
        .mount(&mock.server)
        .await;

    let directory = mock.directory_with(RetryPolicy::new(2, 0), FieldFetchMode::Silent);
    let result = directory.users().lookup(&UserRef::Id("U1".into())).await;

    match result {
        Err(DirectoryError::RetriesExhausted { attempts, source }) => {
            assert_eq!(attempts, 3);
            assert!(matches!(
                *source,
                DirectoryError::RemoteStatus { status: 503, .. }
            ));
        }
        other => panic!("expected RetriesExhausted, got {other:?}"),
    }
}

#[tokio::test]
async fn test_client_error_is_not_retried() {
    let mock = MockDirectory::start().await;
    Mock::given(method("PATCH"))
        .and(path(mock.scim_path("/Users/U1")))
        .respond_with(ResponseTemplate::new(400).set_body_string("bad attribute"))
        .expect(1)
        .mount(&mock.server)
        .await;

    let directory = mock.directory();
    let result = directory.users().activate(&UserRef::Id("U1".into())).await;

    match result {
        Err(DirectoryError::RemoteStatus { status, detail }) => {
            assert_eq!(status, 400);
            assert_eq!(detail, "bad attribute");
        }
        other => panic!("expected RemoteStatus, got {other:?}"),
    }
}

#[tokio::test]
async fn test_deadline_shorter_than_backoff() {
    let mock = MockDirectory::start().await;
    Mock::given(method("GET"))
        .and(path(mock.scim_path("/Users/U1")))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&mock.server)
        .await;

    let policy = RetryPolicy::new(5, 30).with_total_timeout(Duration::from_secs(2));
    let directory = mock.directory_with(policy, FieldFetchMode::Silent);
    let started = std::time::Instant::now();
    let result = directory.users().lookup(&UserRef::Id("U1".into())).await;

    assert!(matches!(result, Err(DirectoryError::DeadlineExceeded(_))));
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[tokio::test]
async fn test_from_config_targets_configured_urls() {
    let mock = MockDirectory::start().await;
    Mock::given(method("GET"))
        .and(path(mock.scim_path("/Users/U1")))
        .and(header("Authorization", "Bearer xoxp-config"))
        .respond_with(ResponseTemplate::new(200).set_body_json(user_json("U1", "cfg", true)))
        .expect(1)
        .mount(&mock.server)
        .await;

    let mut config = DirectoryConfig::with_token("xoxp-config");
    config.scim_url = format!("{}{}", mock.server.uri(), mock.scim_path(""));
    config.web_api_url = format!("{}/api", mock.server.uri());
    config.max_retries = 0;

    let directory = Directory::from_config(&config).unwrap();
    assert_eq!(directory.retry_policy().max_retries, 0);
    let user = directory
        .users()
        .lookup(&UserRef::Id("U1".into()))
        .await
        .unwrap();
    assert_eq!(user.map(|u| u.user_name).as_deref(), Some("cfg"));
}
