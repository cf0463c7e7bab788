//! Request pipeline tests driven through the layered router without a socket.

use std::net::SocketAddr;
use std::sync::Arc;

use api_gateway::config::{Environment, GatewayConfig};
use api_gateway::http::HttpServer;
use axum::body::Body;
use axum::extract::connect_info::MockConnectInfo;
use axum::http::{header, HeaderValue, Method, Request, Response, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;

mod common;

use common::RecordingForwarder;

const CLIENT: &str = "203.0.113.9:51000";

fn gateway(config: GatewayConfig) -> (Router, Arc<RecordingForwarder>) {
    let forwarder = Arc::new(RecordingForwarder::default());
    let server = HttpServer::with_forwarder(config, forwarder.clone()).unwrap();
    let client: SocketAddr = CLIENT.parse().unwrap();
    (server.router().layer(MockConnectInfo(client)), forwarder)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: &'static str) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::CONTENT_LENGTH, body.len())
        .body(Body::from(body))
        .unwrap()
}

async fn json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn request_id_is_generated_when_missing() {
    let (app, _) = gateway(common::offline_config());

    let response = app.oneshot(get("/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let id = response.headers()["x-request-id"].to_str().unwrap().to_string();
    assert!(uuid::Uuid::parse_str(&id).is_ok());

    let body = json(response).await;
    assert_eq!(body["request_id"], id.as_str());
    assert_eq!(body["name"], "LLM-Frontend API Gateway");
    assert_eq!(body["api_version"], "v1");
}

#[tokio::test]
async fn inbound_request_id_is_echoed_and_forwarded() {
    let (app, forwarder) = gateway(common::offline_config());

    let request = Request::builder()
        .uri("/api/v1/core/items")
        .header("x-request-id", "trace-abc-123")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.headers()["x-request-id"], "trace-abc-123");
    let seen = forwarder.requests();
    assert_eq!(seen[0].1["x-request-id"], "trace-abc-123");
}

#[tokio::test]
async fn non_ascii_request_id_is_propagated_byte_for_byte() {
    let (app, forwarder) = gateway(common::offline_config());
    let raw = HeaderValue::from_bytes(b"trace-\xe9t\xe9").unwrap();

    let request = Request::builder()
        .uri("/api/v1/core/items")
        .header("x-request-id", raw.clone())
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers().get("x-request-id"), Some(&raw));
    assert_eq!(forwarder.requests()[0].1.get("x-request-id"), Some(&raw));
}

#[tokio::test]
async fn proxied_request_keeps_path_and_tags_service() {
    let (app, forwarder) = gateway(common::offline_config());

    let response = app.oneshot(get("/api/v1/core/items/7?expand=true")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-service"], "core");
    assert_eq!(json(response).await, serde_json::json!({ "ok": true }));

    let seen = forwarder.requests();
    assert_eq!(seen.len(), 1);
    let (uri, headers) = &seen[0];
    assert!(uri.ends_with("/api/v1/core/items/7?expand=true"), "forwarded to {}", uri);
    assert_eq!(headers["x-gateway-service"], "core");
    assert_eq!(headers["x-forwarded-for"], "203.0.113.9");
}

#[tokio::test]
async fn legacy_paths_reach_the_same_service() {
    let (app, forwarder) = gateway(common::offline_config());

    let response = app.oneshot(get("/api/rag/search")).await.unwrap();
    assert_eq!(response.headers()["x-service"], "rag");
    assert!(forwarder.requests()[0].0.ends_with("/api/rag/search"));
}

#[tokio::test]
async fn path_rewrite_is_applied_before_forwarding() {
    let mut config = common::offline_config();
    let llm = config.services.iter_mut().find(|s| s.name == "llm").unwrap();
    llm.path_rewrite
        .insert("/api/v1/llm".to_string(), "/v2".to_string());

    let (app, forwarder) = gateway(config);
    app.oneshot(get("/api/v1/llm/chat?stream=1")).await.unwrap();

    assert!(forwarder.requests()[0].0.ends_with("/v2/chat?stream=1"));
}

#[tokio::test]
async fn unknown_path_returns_uniform_not_found() {
    let (app, forwarder) = gateway(common::offline_config());

    let response = app.oneshot(get("/nope?x=1")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(response.headers().contains_key("x-request-id"));

    let body = json(response).await;
    assert_eq!(body["code"], "RESOURCE_NOT_FOUND");
    assert_eq!(body["error"], "Not Found");
    assert_eq!(body["available_endpoints"]["documentation"], "/docs");
    assert_eq!(body["available_endpoints"]["api"], "/api/v1");
    assert!(forwarder.requests().is_empty());
}

#[tokio::test]
async fn non_get_on_local_endpoint_is_not_found() {
    let (app, _) = gateway(common::offline_config());

    let response = app.oneshot(post_json("/health", "{}")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(json(response).await["code"], "RESOURCE_NOT_FOUND");
}

#[tokio::test]
async fn malformed_json_is_rejected_before_forwarding() {
    let (app, forwarder) = gateway(common::offline_config());

    let response = app
        .oneshot(post_json("/api/v1/auth/profile", "{\"name\": "))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = json(response).await;
    assert_eq!(body["code"], "INVALID_JSON");
    assert!(body["error_id"].is_string());
    assert!(forwarder.requests().is_empty());
}

#[tokio::test]
async fn oversized_body_is_rejected() {
    let mut config = common::offline_config();
    config.security.max_body_bytes = 16;
    let (app, forwarder) = gateway(config);

    let response = app
        .oneshot(post_json("/api/v1/core/items", r#"{"payload":"far too long for the limit"}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(json(response).await["code"], "PAYLOAD_TOO_LARGE");
    assert!(forwarder.requests().is_empty());
}

#[tokio::test]
async fn valid_json_is_forwarded_intact() {
    let (app, forwarder) = gateway(common::offline_config());

    let response = app
        .oneshot(post_json("/api/v1/payment/charges", r#"{"amount": 42}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(forwarder.requests()[0].1["content-type"], "application/json");
}

#[tokio::test]
async fn general_limiter_rejects_the_101st_request() {
    let (app, _) = gateway(common::offline_config());

    for i in 0..100 {
        let response = app.clone().oneshot(get("/api/v1/core/items")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK, "request {} rejected", i + 1);
    }

    let response = app.clone().oneshot(get("/api/v1/core/items")).await.unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(response.headers()["ratelimit-limit"], "100");
    assert_eq!(response.headers()["ratelimit-remaining"], "0");
    assert!(response.headers().contains_key("retry-after"));

    let body = json(response).await;
    assert_eq!(body["code"], "RATE_LIMIT_EXCEEDED");
    assert_eq!(body["error"], "Too many requests");

    // exempt paths stay reachable for the same client
    let response = app.clone().oneshot(get("/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let response = app.oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn health_and_root_are_never_limited() {
    let mut config = common::offline_config();
    config.rate_limit.max_requests = 2;
    let (app, _) = gateway(config);

    for _ in 0..10 {
        assert_eq!(app.clone().oneshot(get("/health")).await.unwrap().status(), StatusCode::OK);
        assert_eq!(app.clone().oneshot(get("/")).await.unwrap().status(), StatusCode::OK);
    }
}

#[tokio::test]
async fn sixth_login_attempt_hits_the_auth_limiter() {
    let (app, _) = gateway(common::offline_config());

    for _ in 0..5 {
        let response = app
            .clone()
            .oneshot(post_json("/api/v1/auth/login", r#"{"user":"a"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = app
        .clone()
        .oneshot(post_json("/api/v1/auth/login", r#"{"user":"a"}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(response.headers()["ratelimit-limit"], "5");
    assert_eq!(json(response).await["code"], "AUTH_RATE_LIMIT_EXCEEDED");

    // other auth routes only see the general limiter
    let response = app.oneshot(get("/api/v1/auth/profile")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn disabled_limiter_admits_everything() {
    let mut config = common::offline_config();
    config.rate_limit.enabled = false;
    config.rate_limit.max_requests = 1;
    let (app, _) = gateway(config);

    for _ in 0..5 {
        let response = app.clone().oneshot(get("/api/v1/llm/models")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}

#[tokio::test]
async fn disallowed_origin_is_forbidden() {
    let mut config = common::offline_config();
    config.environment = Environment::Production;
    let (app, forwarder) = gateway(config);

    let request = Request::builder()
        .uri("/api/v1/core/items")
        .header(header::ORIGIN, "https://evil.example")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = json(response).await;
    assert_eq!(body["code"], "CORS_NOT_ALLOWED");
    assert_eq!(body["error"], "CORS Error");
    assert!(forwarder.requests().is_empty());
}

#[tokio::test]
async fn missing_origin_is_admitted_only_in_development() {
    let mut dev = GatewayConfig::default();
    dev.environment = Environment::Development;
    let (app, _) = gateway(dev);
    assert_eq!(app.oneshot(get("/api/v1/core/x")).await.unwrap().status(), StatusCode::OK);

    let mut prod = GatewayConfig::default();
    prod.environment = Environment::Production;
    let (app, _) = gateway(prod);
    assert_eq!(app.oneshot(get("/api/v1/core/x")).await.unwrap().status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn preflight_from_allowed_origin_is_answered_locally() {
    let (app, forwarder) = gateway(common::offline_config());

    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/api/v1/payment/charges")
        .header(header::ORIGIN, "http://localhost:3000")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "http://localhost:3000"
    );
    assert!(forwarder.requests().is_empty());
}

#[tokio::test]
async fn security_headers_are_set_on_every_response() {
    let (app, _) = gateway(common::offline_config());

    for uri in ["/", "/api/v1/core/items", "/missing"] {
        let response = app.clone().oneshot(get(uri)).await.unwrap();
        let headers = response.headers();
        assert_eq!(headers["x-content-type-options"], "nosniff");
        assert!(headers.contains_key("content-security-policy"), "{}", uri);
        assert!(headers.contains_key("strict-transport-security"), "{}", uri);
    }
}

#[tokio::test]
async fn health_reports_every_service() {
    let (app, forwarder) = gateway(common::offline_config());

    let response = app.oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json(response).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], "api-gateway");
    for name in common::SERVICES {
        assert_eq!(body["services"][name]["status"], "healthy", "{}", name);
    }
    assert!(body["uptime"].as_f64().unwrap() >= 0.0);
    assert_eq!(forwarder.requests().len(), 5);
}

#[tokio::test]
async fn documentation_endpoints_are_served() {
    let (app, _) = gateway(common::offline_config());

    let response = app.clone().oneshot(get("/openapi.json")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let doc = json(response).await;
    assert!(doc["paths"]["/health"].is_object());

    let response = app.oneshot(get("/docs")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers()[header::CONTENT_TYPE]
        .to_str()
        .unwrap()
        .starts_with("text/html"));
}

#[tokio::test]
async fn responses_are_compressed_when_the_client_accepts_it() {
    let (app, _) = gateway(common::offline_config());

    let request = Request::builder()
        .uri("/")
        .header(header::ACCEPT_ENCODING, "gzip")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_ENCODING], "gzip");
    assert!(response.headers().contains_key("x-request-id"));

    let plain = app.oneshot(get("/")).await.unwrap();
    assert!(!plain.headers().contains_key(header::CONTENT_ENCODING));
}

#[tokio::test]
async fn top_level_json_scalar_is_invalid() {
    let (app, forwarder) = gateway(common::offline_config());

    let response = app
        .oneshot(post_json("/api/v1/llm/chat", "42"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json(response).await["code"], "INVALID_JSON");
    assert!(forwarder.requests().is_empty());
}
