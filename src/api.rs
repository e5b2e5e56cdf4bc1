//! HTTP surface: on-demand checks plus registry CRUD.
//!
//! The on-demand endpoints run the same probes the sweep uses, but
//! synchronously — their errors come back to the caller as failed responses
//! instead of ending at the sweep log.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::core::errors::CheckError;
use crate::core::types::{Application, StatusSnapshot};
use crate::core::AppState;
use crate::registry::parse_record;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/us-visa-status", post(status_check))
        .route("/api/us-visa-tracking", post(email_tracking))
        .route(
            "/api/application",
            post(upsert_application)
                .put(upsert_application)
                .get(retrieve_application)
                .delete(delete_application),
        )
        .route("/api/applications", get(list_applications))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// `CheckError` mapped onto an HTTP response.
pub struct ApiError(CheckError);

impl From<CheckError> for ApiError {
    fn from(e: CheckError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            CheckError::Data { .. } => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, self.0.to_string()).into_response()
    }
}

async fn status_check(
    State(state): State<AppState>,
    Json(app): Json<Application>,
) -> Result<Json<StatusSnapshot>, ApiError> {
    let mut snapshot = state.status_probe.scrape(&app).await?;
    snapshot.code = 200;
    Ok(Json(snapshot))
}

async fn email_tracking(
    State(state): State<AppState>,
    Json(app): Json<Application>,
) -> Result<Json<StatusSnapshot>, ApiError> {
    let mut snapshot = state.passport_probe.track(&app).await?;
    snapshot.code = 200;
    Ok(Json(snapshot))
}

#[derive(Deserialize)]
struct AppIdQuery {
    application_id: String,
}

async fn upsert_application(
    State(state): State<AppState>,
    Json(app): Json<Application>,
) -> Result<StatusCode, ApiError> {
    if app.application_id.trim().is_empty() {
        return Err(CheckError::Data {
            key: String::new(),
            reason: "application_id is required".into(),
        }
        .into());
    }
    state.registry.put(&app).await?;
    Ok(StatusCode::OK)
}

async fn retrieve_application(
    State(state): State<AppState>,
    Query(query): Query<AppIdQuery>,
) -> Result<Response, ApiError> {
    match state.registry.get(&query.application_id).await? {
        Some(raw) => {
            let app = parse_record(&query.application_id, &raw)?;
            Ok(Json(app).into_response())
        }
        None => Ok((StatusCode::NOT_FOUND, "Application not found").into_response()),
    }
}

async fn delete_application(
    State(state): State<AppState>,
    Query(query): Query<AppIdQuery>,
) -> Result<Response, ApiError> {
    if state.registry.delete(&query.application_id).await? {
        Ok(StatusCode::OK.into_response())
    } else {
        Ok((StatusCode::NOT_FOUND, "Application not found").into_response())
    }
}

async fn list_applications(
    State(state): State<AppState>,
) -> Result<Json<Vec<Application>>, ApiError> {
    let records = state.registry.scan_all().await?;
    // Malformed records are skipped here exactly as the sweep skips them.
    let apps = records
        .iter()
        .filter_map(|(key, raw)| parse_record(key, raw).ok())
        .collect();
    Ok(Json(apps))
}
