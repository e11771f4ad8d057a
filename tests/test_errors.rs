//! Error taxonomy and exit-code tests
mod common;

use std::time::Duration;

use recurl::{Error, ParseReason, TimeoutPhase};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{run, unused_local_addr};

#[tokio::test]
async fn test_empty_command() {
    let err = run("").await.unwrap_err();
    assert!(matches!(
        err.error,
        Error::MalformedCommand {
            reason: ParseReason::EmptyCommand
        }
    ));
    assert_eq!(err.error.curl_code(), 3);
}

#[tokio::test]
async fn test_missing_url() {
    let err = run("curl -s -L").await.unwrap_err();
    assert!(matches!(
        err.error,
        Error::MalformedCommand {
            reason: ParseReason::MissingUrl
        }
    ));
}

#[tokio::test]
async fn test_malformed_long_option() {
    let err = run("curl --hea!der 'X: 1' http://example.test").await.unwrap_err();
    assert!(matches!(
        err.error,
        Error::MalformedCommand {
            reason: ParseReason::UnknownOption(_)
        }
    ));
}

#[tokio::test]
async fn test_unsupported_protocol() {
    let err = run("curl ftp://mirror.test/file.iso").await.unwrap_err();
    assert!(matches!(err.error, Error::UnsupportedProtocol(ref scheme) if scheme == "ftp"));
    assert_eq!(err.error.curl_code(), 1);
}

#[tokio::test]
async fn test_connection_refused() {
    let addr = unused_local_addr();
    let err = run(&format!("curl http://{}/", addr)).await.unwrap_err();
    assert!(matches!(err.error, Error::ConnectionFailed { .. }));
    assert_eq!(err.error.curl_code(), 7);
    assert!(err.error.is_retryable());
}

#[tokio::test]
async fn test_total_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(10)))
        .mount(&server)
        .await;

    let command = format!("curl --max-time 0.2 {}/slow", server.uri());
    let err = run(&command).await.unwrap_err();
    assert!(matches!(
        err.error,
        Error::Timeout {
            phase: TimeoutPhase::Total,
            ..
        }
    ));
    assert_eq!(err.error.curl_code(), 28);
}

#[tokio::test]
async fn test_fail_flag_on_server_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/boom"))
        .respond_with(ResponseTemplate::new(500).set_body_string("oh no"))
        .mount(&server)
        .await;

    let command = format!("curl -f {}/boom", server.uri());
    let err = run(&command).await.unwrap_err();
    assert!(matches!(
        err.error,
        Error::HttpStatusError { status: 500, ref body } if body == "oh no"
    ));
    assert_eq!(err.error.curl_code(), 22);
    assert!(err.error.is_retryable());
}

#[tokio::test]
async fn test_without_fail_flag_5xx_is_ok() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/boom"))
        .respond_with(ResponseTemplate::new(500).set_body_string("oh no"))
        .mount(&server)
        .await;

    let command = format!("curl {}/boom", server.uri());
    let result = run(&command).await.unwrap();
    assert_eq!(result.status_code, 500);
    assert!(!result.is_success());
}

#[tokio::test]
async fn test_command_error_carries_original_command() {
    let err = run("curl ftp://x.test/").await.unwrap_err();
    assert_eq!(err.command, "curl ftp://x.test/");
}

#[tokio::test]
async fn test_retry_exhaustion_returns_last_error() {
    let addr = unused_local_addr();
    let command = format!("curl --retry 2 --retry-delay 0.01 http://{}/", addr);
    let err = run(&command).await.unwrap_err();
    assert!(matches!(err.error, Error::ConnectionFailed { .. }));
}
