//! Redirect handling tests
mod common;

use recurl::Error;
use wiremock::matchers::{header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{run, run_ok};

#[tokio::test]
async fn test_follow_redirect_chain() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/step1"))
        .respond_with(ResponseTemplate::new(302).insert_header("Location", "/step2"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/step2"))
        .respond_with(ResponseTemplate::new(302).insert_header("Location", "/final"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/final"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Content-Type", "text/plain")
                .set_body_string("arrived"),
        )
        .mount(&server)
        .await;

    let command = format!("curl -L {}/step1", server.uri());
    let result = run_ok(&command).await;
    assert_eq!(result.status_code, 200);
    assert_eq!(result.body.as_deref(), Some("arrived"));
}

#[tokio::test]
async fn test_redirect_not_followed_by_default() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/r"))
        .respond_with(ResponseTemplate::new(302).insert_header("Location", "/elsewhere"))
        .mount(&server)
        .await;

    let command = format!("curl {}/r", server.uri());
    let result = run_ok(&command).await;
    assert_eq!(result.status_code, 302);
    assert_eq!(result.headers.get("location"), Some("/elsewhere"));
}

#[tokio::test]
async fn test_max_redirs_exceeded() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/loop"))
        .respond_with(ResponseTemplate::new(302).insert_header("Location", "/loop"))
        .mount(&server)
        .await;

    let command = format!("curl -L --max-redirs 2 {}/loop", server.uri());
    let err = run(&command).await.unwrap_err();
    assert!(matches!(err.error, Error::TooManyRedirects(2)));
    assert_eq!(err.error.curl_code(), 47);
}

#[tokio::test]
async fn test_302_rewrites_post_to_get() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/submit"))
        .respond_with(ResponseTemplate::new(302).insert_header("Location", "/done"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/done"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .mount(&server)
        .await;

    let command = format!("curl -L -d a=1 {}/submit", server.uri());
    let result = run_ok(&command).await;
    assert_eq!(result.status_code, 200);

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests[1].method.as_str(), "GET");
    assert!(requests[1].body.is_empty());
}

#[tokio::test]
async fn test_307_preserves_post_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/submit"))
        .respond_with(ResponseTemplate::new(307).insert_header("Location", "/again"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/again"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let command = format!("curl -L -d a=1 {}/submit", server.uri());
    let result = run_ok(&command).await;
    assert_eq!(result.status_code, 200);

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests[1].method.as_str(), "POST");
    assert_eq!(requests[1].body, b"a=1");
}

#[tokio::test]
async fn test_auth_not_forwarded_cross_host() {
    let other = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/landing"))
        .respond_with(ResponseTemplate::new(200).set_body_string("other host"))
        .mount(&other)
        .await;

    let origin = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/away"))
        .respond_with(
            ResponseTemplate::new(302)
                .insert_header("Location", format!("{}/landing", other.uri()).as_str()),
        )
        .mount(&origin)
        .await;

    let command = format!("curl -L -u bob:secret {}/away", origin.uri());
    let result = run_ok(&command).await;
    assert_eq!(result.status_code, 200);

    let origin_requests = origin.received_requests().await.unwrap();
    assert!(origin_requests[0].headers.contains_key("authorization"));
    let other_requests = other.received_requests().await.unwrap();
    assert!(!other_requests[0].headers.contains_key("authorization"));
}

#[tokio::test]
async fn test_location_trusted_forwards_auth() {
    let other = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/landing"))
        .and(header_exists("authorization"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&other)
        .await;

    let origin = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/away"))
        .respond_with(
            ResponseTemplate::new(302)
                .insert_header("Location", format!("{}/landing", other.uri()).as_str()),
        )
        .mount(&origin)
        .await;

    let command = format!(
        "curl --location-trusted -u bob:secret {}/away",
        origin.uri()
    );
    assert_eq!(run_ok(&command).await.status_code, 200);
}

#[tokio::test]
async fn test_include_headers_shows_all_hops() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/a"))
        .respond_with(ResponseTemplate::new(301).insert_header("Location", "/b"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/b"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Content-Type", "text/plain")
                .set_body_string("end"),
        )
        .mount(&server)
        .await;

    let command = format!("curl -i -L {}/a", server.uri());
    let result = run_ok(&command).await;
    let body = result.body.unwrap();
    assert!(body.contains("HTTP/1.1 301 Moved Permanently"));
    assert!(body.contains("HTTP/1.1 200 OK"));
    assert!(body.ends_with("end"));
}

#[tokio::test]
async fn test_num_redirects_write_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/one"))
        .respond_with(ResponseTemplate::new(302).insert_header("Location", "/two"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/two"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let command = format!(
        "curl -s -L -w '%{{num_redirects}} %{{url_effective}}' {}/one",
        server.uri()
    );
    let result = run_ok(&command).await;
    assert_eq!(
        result.body.as_deref(),
        Some(format!("1 {}/two", server.uri()).as_str())
    );
}
