//! Job intake and status API handlers.

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::warn;

use harvester_core::job::{decode_job, MessageHeaders};
use harvester_core::metrics;

use crate::state::AppState;

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Serialize)]
pub struct SubmitResponse {
    pub id: String,
    pub status: String,
}

/// Accept one inbound job message. Malformed messages are rejected with
/// the reason; nothing is silently dropped.
pub async fn submit_job(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    let message_headers = MessageHeaders {
        identificador: header_value(&headers, "identificador"),
        token: header_value(&headers, "token"),
    };

    let period_days = state.config().orchestrator.period_days;
    let job = match decode_job(&body, &message_headers, period_days) {
        Ok(job) => job,
        Err(e) => {
            metrics::INTAKE_REJECTIONS.inc();
            warn!("Rejected inbound job message: {}", e);
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse {
                    error: e.to_string(),
                }),
            )
                .into_response();
        }
    };

    let job_id = job.id.clone();
    match state.jobs_tx().try_send(job) {
        Ok(()) => (
            StatusCode::ACCEPTED,
            Json(SubmitResponse {
                id: job_id,
                status: "PROCESSING".to_string(),
            }),
        )
            .into_response(),
        Err(TrySendError::Full(_)) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ErrorResponse {
                error: "job queue is full".to_string(),
            }),
        )
            .into_response(),
        Err(TrySendError::Closed(_)) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ErrorResponse {
                error: "service is shutting down".to_string(),
            }),
        )
            .into_response(),
    }
}

/// Latest published status for one job.
pub async fn get_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.registry().latest(&id).await {
        Some(status) => Json(status).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: format!("unknown job: {}", id),
            }),
        )
            .into_response(),
    }
}

fn header_value(headers: &HeaderMap, name: &str) -> String {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use std::sync::Arc;
    use tokio::sync::mpsc;
    use tower::ServiceExt;

    use harvester_core::job::Job;
    use harvester_core::publisher::StatusPublisher;
    use harvester_core::{load_config_from_str, StatusMessage, WireStatus};

    use crate::api::create_router;
    use crate::state::{AppState, JobRegistry, RegistryPublisher};

    fn test_state() -> (Arc<AppState>, mpsc::Receiver<Job>, Arc<JobRegistry>) {
        let config = load_config_from_str(
            r#"
[paths]
download_dir = "/tmp/harvester-test/dl"
xml_dir = "/tmp/harvester-test/xml"
"#,
        )
        .unwrap();
        let (jobs_tx, jobs_rx) = mpsc::channel(4);
        let registry = Arc::new(JobRegistry::new());
        let state = Arc::new(AppState::new(config, jobs_tx, Arc::clone(&registry)));
        (state, jobs_rx, registry)
    }

    fn valid_body() -> String {
        r#"{
            "id": "job-1",
            "empresas": [{"ie": "101", "oper": "1"}],
            "dataInicial": "2024-01-01",
            "dataFinal": "2024-01-31",
            "contador": {"cpf": "12345678900", "senha": "secret"}
        }"#
        .to_string()
    }

    fn submit_request(body: &str, with_headers: bool) -> Request<Body> {
        let mut builder = Request::builder().method("POST").uri("/jobs");
        if with_headers {
            builder = builder.header("identificador", "4321").header("token", "tok-1");
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    #[tokio::test]
    async fn valid_job_is_accepted_and_queued() {
        let (state, mut jobs_rx, _) = test_state();
        let app = create_router(state);

        let response = app.oneshot(submit_request(&valid_body(), true)).await.unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);

        let queued = jobs_rx.try_recv().unwrap();
        assert_eq!(queued.id, "job-1");
        assert_eq!(queued.company_id, "4321");
    }

    #[tokio::test]
    async fn malformed_body_is_rejected_with_reason() {
        let (state, mut jobs_rx, _) = test_state();
        let app = create_router(state);

        let response = app.oneshot(submit_request("{not json", true)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let error: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert!(error["error"].as_str().unwrap().contains("Malformed"));
        assert!(jobs_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn missing_transport_headers_are_rejected() {
        let (state, _, _) = test_state();
        let app = create_router(state);

        let response = app.oneshot(submit_request(&valid_body(), false)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn job_status_reflects_latest_published_message() {
        let (state, _, registry) = test_state();
        let app = create_router(state);

        let unknown = app
            .clone()
            .oneshot(Request::get("/jobs/job-9").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(unknown.status(), StatusCode::NOT_FOUND);

        let publisher = RegistryPublisher::new(registry);
        publisher
            .publish(&StatusMessage::new("job-9", WireStatus::Processing, "Processamento iniciado"))
            .await
            .unwrap();

        let response = app
            .oneshot(Request::get("/jobs/job-9").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let status: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(status["status"], "PROCESSING");
    }

    #[tokio::test]
    async fn health_endpoint_reports_ok() {
        let (state, _, _) = test_state();
        let app = create_router(state);

        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
