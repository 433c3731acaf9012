//! Tests against in-process transports.

use std::sync::{Arc, Mutex};

use http::{HeaderMap, HeaderValue};
use serde_json::json;
use url::Url;
use zenschema::{
    Error, GeneratedRequest, Method, RequestConfig, RequestInit, StatusCode, fetch_with,
    generate_request,
    request::{Params, RequestPatch},
    schema::{RequestSchema, Schema},
    transport::RawResponse,
};

type Seen = Arc<Mutex<Vec<GeneratedRequest>>>;

/// Transport that records every request and answers with `body`.
fn recording(
    body: &'static str,
) -> (
    Seen,
    impl Fn(Url, RequestInit) -> std::future::Ready<zenschema::Result<RawResponse>>
    + Send
    + Sync
    + 'static,
) {
    let seen: Seen = Arc::default();
    let log = seen.clone();
    let transport = move |url: Url, init: RequestInit| {
        log.lock().unwrap().push(GeneratedRequest { url, init });
        std::future::ready(Ok(RawResponse::new(StatusCode::OK, body)))
    };
    (seen, transport)
}

fn config() -> RequestConfig {
    RequestConfig::new()
        .method(Method::POST)
        .schema(
            RequestSchema::new()
                .path(Schema::object([("id", Schema::integer())]))
                .search_params(Schema::object([("expand", Schema::boolean())]))
                .body(Schema::object([("name", Schema::string())]))
                .response(Schema::object([("ok", Schema::boolean())])),
        )
        .path(Params::new().set("id", 7))
        .search_params(Params::new().set("expand", true))
        .headers(Params::new().set("content-type", "application/json"))
        .body(json!({"name": "zen"}))
}

#[tokio::test]
async fn test_transport_receives_generated_request() {
    let (seen, transport) = recording(r#"{"ok":true}"#);
    let url = "https://api.example.com/users/{{id}}";

    let response = fetch_with(&transport, url, config()).await.unwrap();
    assert_eq!(response.json().await.unwrap(), json!({"ok": true}));

    let expected = generate_request(url, &config()).unwrap();
    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0], expected);
    assert_eq!(
        seen[0].url.as_str(),
        "https://api.example.com/users/7?expand=true"
    );
}

#[tokio::test]
async fn test_generation_errors_skip_the_transport() {
    let (seen, transport) = recording("{}");
    let config = config().path(Params::new().set("id", "seven"));

    let err = fetch_with(&transport, "https://api.example.com/users/{{id}}", config)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::RequestValidation(_)));
    assert!(seen.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_transport_errors_propagate() {
    let failing = |_url: Url, _init: RequestInit| async {
        Err::<RawResponse, _>(Error::transport("connection refused"))
    };
    let err = fetch_with(&failing, "https://api.example.com/", RequestConfig::new())
        .await
        .unwrap_err();
    assert!(err.is_transport_error());
    assert_eq!(err.to_string(), "transport error: connection refused");
}

#[tokio::test]
async fn test_response_metadata_passes_through() {
    let transport = |url: Url, _init: RequestInit| async move {
        let mut headers = HeaderMap::new();
        headers.insert("x-request-id", HeaderValue::from_static("42"));
        Ok::<_, Error>(
            RawResponse::new(StatusCode::CREATED, r#"{"ok":"yes"}"#)
                .with_headers(headers)
                .with_status_text("Made It")
                .with_url(Some(url))
                .with_redirected(true),
        )
    };
    let config = RequestConfig::new().response_schema(Schema::object([("ok", Schema::boolean())]));

    let response = fetch_with(&transport, "https://api.example.com/items", config)
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(response.status_text(), "Made It");
    assert_eq!(response.headers()["x-request-id"], "42");
    assert_eq!(
        response.url().map(Url::as_str),
        Some("https://api.example.com/items")
    );
    assert!(response.redirected());
    assert!(!response.body_used());

    // Metadata is available even though the body does not match.
    assert!(matches!(
        response.json().await,
        Err(Error::ResponseValidation(_))
    ));
}

#[tokio::test]
async fn test_refine_overrides_reach_the_transport() {
    let (seen, transport) = recording("{}");
    let config = RequestConfig::new().refine(|url, init| {
        let mut url = url.clone();
        url.set_path("/v2/refined");
        let mut headers = init.headers.clone();
        headers.insert("x-refined", HeaderValue::from_static("1"));
        RequestPatch::new().url(url).headers(headers)
    });

    fetch_with(&transport, "https://api.example.com/v1", config)
        .await
        .unwrap();

    let seen = seen.lock().unwrap();
    assert_eq!(seen[0].url.as_str(), "https://api.example.com/v2/refined");
    assert_eq!(seen[0].init.headers["x-refined"], "1");
    assert_eq!(seen[0].init.method, Method::GET);
}

#[tokio::test]
async fn test_builder_uses_explicit_transport() {
    let (seen, transport) = recording(r#"{"ok":true}"#);
    let ok = zenschema::delete("https://api.example.com/items/{{id}}")
        .path([("id", 3)])
        .response_schema(Schema::object([("ok", Schema::boolean())]))
        .transport(Arc::new(transport))
        .json()
        .await
        .unwrap();
    assert_eq!(ok, json!({"ok": true}));

    let seen = seen.lock().unwrap();
    assert_eq!(seen[0].init.method, Method::DELETE);
    assert_eq!(seen[0].url.as_str(), "https://api.example.com/items/3");
}

#[tokio::test]
async fn test_builder_reports_bad_urls() {
    let (seen, transport) = recording("{}");
    let err = zenschema::get("not a url")
        .transport(Arc::new(transport))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidUrl(_)));
    assert!(seen.lock().unwrap().is_empty());
}
