//! HTTP surface: on-demand trigger, snapshot read and health check.

use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use caa_pipeline::{read_snapshot, Aggregator};
use serde::Serialize;
use tokio::net::TcpListener;
use tracing::{error, info};

pub const CRATE_NAME: &str = "caa-web";

const NO_SNAPSHOT_MESSAGE: &str = "No aggregated data available";

#[derive(Clone)]
pub struct AppState {
    pub aggregator: Arc<Aggregator>,
    pub snapshot_path: PathBuf,
}

impl AppState {
    pub fn new(aggregator: Arc<Aggregator>) -> Self {
        let snapshot_path = aggregator.snapshot_path().to_path_buf();
        Self {
            aggregator,
            snapshot_path,
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    message: String,
}

/// Build the router. `base_path` must already be normalized (leading slash,
/// no trailing slash, or empty).
pub fn app(state: AppState, base_path: &str) -> Router {
    Router::new()
        .route(&format!("{base_path}/aggregator/run"), get(run_handler))
        .route(
            &format!("{base_path}/aggregator/latest"),
            get(latest_handler),
        )
        .route(&format!("{base_path}/health"), get(health_handler))
        .with_state(Arc::new(state))
}

pub async fn serve(state: AppState, base_path: &str, port: u16) -> anyhow::Result<()> {
    let listener = TcpListener::bind(("0.0.0.0", port)).await?;
    info!(port, base_path, "http server listening");
    axum::serve(listener, app(state, base_path)).await?;
    Ok(())
}

/// Runs the full pipeline synchronously within the request. Does not touch
/// the on-disk snapshot; only the scheduled path persists one.
async fn run_handler(State(state): State<Arc<AppState>>) -> Response {
    match state.aggregator.run().await {
        Ok(bundle) => (StatusCode::OK, Json(bundle)).into_response(),
        Err(err) => {
            error!(error = %err, "on-demand aggregation failed");
            server_error(format!("{err:#}"))
        }
    }
}

async fn latest_handler(State(state): State<Arc<AppState>>) -> Response {
    match read_snapshot(&state.snapshot_path).await {
        Ok(value) => (StatusCode::OK, Json(value)).into_response(),
        Err(_) => server_error(NO_SNAPSHOT_MESSAGE.to_string()),
    }
}

async fn health_handler() -> Response {
    Json(serde_json::json!({ "status": "ok" })).into_response()
}

fn server_error(message: String) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorBody { message }),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use caa_core::{Appointment, Doctor, Patient};
    use caa_source::MemorySourceStore;
    use caa_warehouse::MemoryWarehouse;
    use chrono::{TimeZone, Utc};
    use http_body_util::BodyExt;
    use tempfile::TempDir;
    use tower::ServiceExt;

    const BASE: &str = "/api/v1";

    fn seeded_state(dir: &TempDir) -> AppState {
        let date = Utc.with_ymd_and_hms(2026, 5, 4, 9, 0, 0).single().unwrap();
        let source = MemorySourceStore::new(
            vec![Doctor { id: 1, name: "A".into(), specialization: None }],
            vec![
                Appointment { id: "a1".into(), doctor_id: 1, date },
                Appointment { id: "a2".into(), doctor_id: 1, date },
                Appointment { id: "a3".into(), doctor_id: 99, date },
            ],
            vec![Patient {
                id: "p1".into(),
                specialty: Some("cardiology".into()),
                medical_history: vec!["hypertension".into()],
            }],
        );
        let aggregator = Aggregator::new(
            Arc::new(source),
            Arc::new(MemoryWarehouse::new()),
            dir.path().join("aggregated_data.json"),
        );
        AppState::new(Arc::new(aggregator))
    }

    fn failing_state(dir: &TempDir) -> AppState {
        let aggregator = Aggregator::new(
            Arc::new(MemorySourceStore::failing("source store down")),
            Arc::new(MemoryWarehouse::new()),
            dir.path().join("aggregated_data.json"),
        );
        AppState::new(Arc::new(aggregator))
    }

    async fn get(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let resp = app
            .oneshot(
                axum::http::Request::builder()
                    .uri(uri)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = resp.status();
        let body = resp.into_body().collect().await.unwrap().to_bytes();
        let value = serde_json::from_slice(&body).unwrap();
        (status, value)
    }

    #[tokio::test]
    async fn run_returns_bundle_with_unknown_doctor_dropped() {
        let dir = TempDir::new().unwrap();
        let app = app(seeded_state(&dir), BASE);

        let (status, body) = get(app, "/api/v1/aggregator/run").await;
        assert_eq!(status, StatusCode::OK);

        let rows = body["appointmentsPerDoctor"].as_array().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["doctorId"], 1);
        assert_eq!(rows[0]["doctorName"], "A");
        assert_eq!(rows[0]["totalAppointments"], 2);
        assert!(body["appointmentFrequency"].is_array());
        assert!(body["commonConditionsBySpecialty"].is_array());
    }

    #[tokio::test]
    async fn run_failure_surfaces_error_message_with_500() {
        let dir = TempDir::new().unwrap();
        let app = app(failing_state(&dir), BASE);

        let (status, body) = get(app, "/api/v1/aggregator/run").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["message"]
            .as_str()
            .unwrap()
            .contains("source store down"));
    }

    // The on-demand path never refreshes the snapshot the latest endpoint
    // serves; only the scheduled job writes it.
    #[tokio::test]
    async fn on_demand_run_does_not_touch_the_snapshot() {
        let dir = TempDir::new().unwrap();
        let state = seeded_state(&dir);
        let snapshot_path = state.snapshot_path.clone();
        let app = app(state, BASE);

        let (status, _body) = get(app.clone(), "/api/v1/aggregator/run").await;
        assert_eq!(status, StatusCode::OK);
        assert!(!snapshot_path.exists());

        let (status, body) = get(app, "/api/v1/aggregator/latest").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["message"], "No aggregated data available");
    }

    #[tokio::test]
    async fn latest_serves_persisted_snapshot() {
        let dir = TempDir::new().unwrap();
        let state = seeded_state(&dir);
        let bundle = state.aggregator.run().await.unwrap();
        state.aggregator.write_snapshot(&bundle).await.unwrap();
        let app = app(state, BASE);

        let (status, body) = get(app, "/api/v1/aggregator/latest").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body["appointmentsPerDoctor"].as_array().unwrap().len(),
            1
        );
    }

    #[tokio::test]
    async fn latest_before_any_run_is_the_fixed_500() {
        let dir = TempDir::new().unwrap();
        let app = app(seeded_state(&dir), BASE);

        let (status, body) = get(app, "/api/v1/aggregator/latest").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["message"], "No aggregated data available");
    }

    #[tokio::test]
    async fn health_is_ok_under_the_base_path() {
        let dir = TempDir::new().unwrap();
        let app = app(seeded_state(&dir), BASE);

        let (status, body) = get(app, "/api/v1/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn empty_base_path_mounts_routes_at_root() {
        let dir = TempDir::new().unwrap();
        let app = app(seeded_state(&dir), "");

        let (status, _body) = get(app, "/health").await;
        assert_eq!(status, StatusCode::OK);
    }
}
