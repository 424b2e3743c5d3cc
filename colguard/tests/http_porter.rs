//! `HttpPorter` against a local mock server.

use colguard::http::{Authorization, HttpMethod, HttpPorter, TRANSPORT_FAILURE};
use secrecy::SecretString;
use serde_json::json;
use std::net::TcpListener;
use wiremock::matchers::{body_json, header, header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn porter() -> HttpPorter {
    HttpPorter::new().expect("Failed to build client").allow_plain_http()
}

#[tokio::test]
async fn test_patch_sent_as_put_with_override() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/v2/tenant/scim/Users/u1"))
        .and(header("X-HTTP-Method-Override", "PATCH"))
        .and(header("Content-Type", "application/json"))
        .and(body_json(json!({"active": false})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "u1"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PATCH")).respond_with(ResponseTemplate::new(405)).expect(0).mount(&server).await;

    let url = format!("{}/v2/tenant/scim/Users/u1", server.uri());
    let response = porter().send(HttpMethod::Patch, &url, None, Some(r#"{"active":false}"#)).await;
    assert_eq!(response.status_code, 200);
    assert_eq!(response.body, json!({"id": "u1"}));
}

#[tokio::test]
async fn test_accept_and_authorization_headers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/tenant/policies"))
        .and(header("Accept", "application/json"))
        .and(header("Authorization", "Basic dXNlcjpwYXNz"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"totalResults": 0})))
        .expect(1)
        .mount(&server)
        .await;

    let authorization = Authorization::basic("user", &SecretString::new("pass".to_string()));
    let url = format!("{}/v2/tenant/policies", server.uri());
    let response = porter().send(HttpMethod::Get, &url, Some(&authorization), None).await;
    assert!(response.is_success());
}

#[tokio::test]
async fn test_get_without_body_has_no_content_type() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(header_exists("Content-Type"))
        .respond_with(ResponseTemplate::new(400))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("GET")).respond_with(ResponseTemplate::new(200)).mount(&server).await;

    let response = porter().send(HttpMethod::Get, &server.uri(), None, Some("")).await;
    assert_eq!(response.status_code, 200);
}

#[tokio::test]
async fn test_empty_and_plain_bodies() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE")).respond_with(ResponseTemplate::new(204)).mount(&server).await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(502).set_body_string("Bad Gateway"))
        .mount(&server)
        .await;

    let response = porter().send(HttpMethod::Delete, &server.uri(), None, None).await;
    assert_eq!(response.status_code, 204);
    assert_eq!(response.body, json!({}));

    let response = porter().send(HttpMethod::Get, &server.uri(), None, None).await;
    assert_eq!(response.status_code, 502);
    assert_eq!(response.error_message(), "Bad Gateway");
}

#[tokio::test]
async fn test_server_error_body_kept() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(409).set_body_json(json!({"error": "policy exists", "code": 40900})),
        )
        .mount(&server)
        .await;

    let response = porter().send(HttpMethod::Post, &server.uri(), None, Some("{}")).await;
    assert_eq!(response.status_code, 409);
    assert!(!response.is_success());
    assert_eq!(response.body["code"], json!(40900));
    assert_eq!(response.error_message(), "policy exists");
}

#[tokio::test]
async fn test_malformed_url_is_transport_failure() {
    let response = porter().send(HttpMethod::Get, "not a url", None, None).await;
    assert_eq!(response.status_code, TRANSPORT_FAILURE);
    assert!(response.is_transport_failure());
    assert!(response.error_message().contains("not a url"));
}

#[tokio::test]
async fn test_plain_http_refused_by_default() {
    let server = MockServer::start().await;
    Mock::given(method("GET")).respond_with(ResponseTemplate::new(200)).expect(0).mount(&server).await;

    let porter = HttpPorter::new().unwrap();
    let response = porter.send(HttpMethod::Get, &server.uri(), None, None).await;
    assert_eq!(response.status_code, TRANSPORT_FAILURE);
}

#[tokio::test]
async fn test_connection_refused_is_transport_failure() {
    // Bind then drop to get a port nobody listens on.
    let port = TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap().port();

    let response = porter().send(HttpMethod::Get, &format!("http://127.0.0.1:{port}/"), None, None).await;
    assert_eq!(response.status_code, TRANSPORT_FAILURE);
    assert!(!response.error_message().is_empty());
}
