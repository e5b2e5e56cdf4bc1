//! HTTP surface: CRUD round-trips and on-demand check error propagation.

use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use tower::ServiceExt;

use visa_sentinel::api;
use visa_sentinel::core::config::SentinelConfig;
use visa_sentinel::core::errors::CheckError;
use visa_sentinel::core::types::{Application, NotificationPayload, StatusSnapshot};
use visa_sentinel::mail::PassportProbe;
use visa_sentinel::notify::NotificationSink;
use visa_sentinel::registry::MemoryRegistry;
use visa_sentinel::scraping::StatusProbe;
use visa_sentinel::AppState;

struct FixedStatusProbe(Result<StatusSnapshot, String>);

#[async_trait]
impl StatusProbe for FixedStatusProbe {
    async fn scrape(&self, _app: &Application) -> Result<StatusSnapshot, CheckError> {
        self.0.clone().map_err(CheckError::Transient)
    }
}

struct FixedPassportProbe(StatusSnapshot);

#[async_trait]
impl PassportProbe for FixedPassportProbe {
    async fn track(&self, _app: &Application) -> Result<StatusSnapshot, CheckError> {
        Ok(self.0.clone())
    }
}

struct NullSink;

#[async_trait]
impl NotificationSink for NullSink {
    async fn send(&self, _payload: &NotificationPayload) -> Result<(), CheckError> {
        Ok(())
    }
}

fn state(scrape: Result<StatusSnapshot, String>) -> AppState {
    AppState {
        http_client: reqwest::Client::new(),
        registry: Arc::new(MemoryRegistry::new()),
        status_probe: Arc::new(FixedStatusProbe(scrape)),
        passport_probe: Arc::new(FixedPassportProbe(StatusSnapshot {
            status: "护照已寄出".into(),
            ..Default::default()
        })),
        sink: Arc::new(NullSink),
        config: Arc::new(SentinelConfig::default()),
    }
}

fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn app_json() -> serde_json::Value {
    serde_json::json!({
        "location": "BEJ",
        "application_id": "AA001",
        "passport_number": "P123",
        "first_5_letters_of_surname": "ZHANG"
    })
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn application_crud_round_trip() {
    let router = api::router(state(Ok(StatusSnapshot::default())));

    let response = router
        .clone()
        .oneshot(json_request("POST", "/api/application", app_json()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/application?application_id=AA001")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let fetched = body_json(response).await;
    assert_eq!(fetched["application_id"], "AA001");
    assert_eq!(fetched["first_5_letters_of_surname"], "ZHANG");

    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/applications")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let listed = body_json(response).await;
    assert_eq!(listed.as_array().unwrap().len(), 1);

    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri("/api/application?application_id=AA001")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = router
        .oneshot(
            Request::builder()
                .uri("/api/application?application_id=AA001")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn on_demand_check_returns_snapshot_with_code() {
    let router = api::router(state(Ok(StatusSnapshot {
        status: "Issued".into(),
        created: "01-Jan-2024".into(),
        last_updated: "10-Jan-2024".into(),
        ..Default::default()
    })));

    let response = router
        .oneshot(json_request("POST", "/api/us-visa-status", app_json()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let snapshot = body_json(response).await;
    assert_eq!(snapshot["status"], "Issued");
    assert_eq!(snapshot["code"], 200);
}

#[tokio::test]
async fn on_demand_check_propagates_scrape_failure() {
    let router = api::router(state(Err("captcha field never appeared".into())));

    let response = router
        .oneshot(json_request("POST", "/api/us-visa-status", app_json()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn tracking_endpoint_returns_mail_status() {
    let router = api::router(state(Ok(StatusSnapshot::default())));

    let response = router
        .oneshot(json_request("POST", "/api/us-visa-tracking", app_json()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let snapshot = body_json(response).await;
    assert_eq!(snapshot["status"], "护照已寄出");
    assert_eq!(snapshot["code"], 200);
}
