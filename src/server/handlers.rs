// HTTP request handlers

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    middleware,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Json, Response,
    },
    routing::{get, patch, post},
    Extension, Router,
};
use futures::stream::{self, Stream};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;

use super::middleware::{identity_middleware, require_responder};
use super::AppState;
use crate::conversation::ConversationEntry;
use crate::crisis::{AlertStatus, AlertTransitionError, CrisisAlert, RiskResult};
use crate::identity::StudentIdentity;
use crate::pipeline::{Escalation, PipelineError, ResponsePayload};
use crate::store::Stored;

const DEFAULT_LIST_LIMIT: usize = 50;
const MAX_LIST_LIMIT: usize = 200;

/// Create the main application router
pub fn create_router(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .route("/api/chat/analyze", post(analyze_message))
        .route("/api/classify", post(classify_message))
        .route("/api/alerts", get(list_alerts))
        .route("/api/alerts/stream", get(alert_stream))
        .route("/api/alerts/:id/status", patch(update_alert_status))
        .route("/api/conversations/:owner_id", get(conversation_history))
        .route_layer(middleware::from_fn(identity_middleware));

    Router::new()
        .merge(api)
        .route("/health", get(health_check))
        .route("/metrics", get(metrics_endpoint))
        .with_state(state)
}

/// Request body for message endpoints
#[derive(Debug, Deserialize)]
pub struct MessageRequest {
    #[serde(default)]
    pub message: String,
}

/// Handle POST /api/chat/analyze - one chat turn
async fn analyze_message(
    State(state): State<Arc<AppState>>,
    Extension(student): Extension<StudentIdentity>,
    Json(request): Json<MessageRequest>,
) -> Result<Json<ResponsePayload>, AppError> {
    let outcome = state
        .pipeline()
        .handle_incoming_message(&student, &request.message)
        .await?;

    // Fan-out keeps running on its own task; the student is not kept waiting
    // and never hears about delivery problems.
    if let Some(Escalation::Dispatched(pending)) = &outcome.escalation {
        tracing::info!(alert_id = %pending.alert_id(), "Escalation dispatched");
    }

    Ok(Json(outcome.payload))
}

/// Handle POST /api/classify - risk result only, no side effects
async fn classify_message(
    State(state): State<Arc<AppState>>,
    Json(request): Json<MessageRequest>,
) -> Result<Json<RiskResult>, AppError> {
    if request.message.trim().is_empty() {
        return Err(PipelineError::EmptyMessage.into());
    }
    Ok(Json(state.pipeline().classify_message(&request.message)))
}

#[derive(Debug, Deserialize)]
pub struct ListAlertsParams {
    pub status: Option<String>,
    pub limit: Option<usize>,
}

/// Handle GET /api/alerts - dashboard feed, newest first
async fn list_alerts(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<StudentIdentity>,
    Query(params): Query<ListAlertsParams>,
) -> Result<Json<Vec<Stored<CrisisAlert>>>, AppError> {
    require_responder(&caller)?;

    let status = params
        .status
        .as_deref()
        .map(str::parse::<AlertStatus>)
        .transpose()
        .map_err(|e| AppError::new(StatusCode::BAD_REQUEST, anyhow::anyhow!(e)))?;
    let limit = params
        .limit
        .unwrap_or(DEFAULT_LIST_LIMIT)
        .min(MAX_LIST_LIMIT);

    let alerts = state.pipeline().alerts().list(status, limit).await?;
    Ok(Json(alerts))
}

#[derive(Debug, Deserialize)]
pub struct StatusUpdateRequest {
    pub status: AlertStatus,
}

/// Handle PATCH /api/alerts/:id/status - responder action, forward only
async fn update_alert_status(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<StudentIdentity>,
    Path(id): Path<String>,
    Json(request): Json<StatusUpdateRequest>,
) -> Result<Json<Stored<CrisisAlert>>, AppError> {
    require_responder(&caller)?;

    let updated = state
        .pipeline()
        .alerts()
        .update_status(&id, request.status)
        .await?;

    tracing::info!(alert_id = %id, by = %caller.id, status = %request.status, "Alert status changed by responder");
    Ok(Json(updated))
}

#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    pub limit: Option<usize>,
}

/// Handle GET /api/conversations/:owner_id - a student's recent chat log
async fn conversation_history(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<StudentIdentity>,
    Path(owner_id): Path<String>,
    Query(params): Query<HistoryParams>,
) -> Result<Json<Vec<Stored<ConversationEntry>>>, AppError> {
    require_responder(&caller)?;

    let limit = params
        .limit
        .unwrap_or(DEFAULT_LIST_LIMIT)
        .min(MAX_LIST_LIMIT);
    let entries = state.pipeline().conversation().history(&owner_id, limit).await?;
    Ok(Json(entries))
}

/// Handle GET /api/alerts/stream - server-sent crisis alerts
async fn alert_stream(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<StudentIdentity>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    require_responder(&caller)?;

    let receiver = state.broadcaster().subscribe();
    tracing::info!(monitor = %caller.id, "Monitoring client connected");

    let events = stream::unfold(receiver, |mut receiver| async move {
        loop {
            match receiver.recv().await {
                Ok(event) => match Event::default().event(&event.topic).json_data(&event.payload) {
                    Ok(sse) => return Some((Ok::<Event, Infallible>(sse), receiver)),
                    Err(e) => tracing::warn!(error = %e, "Failed to encode alert event"),
                },
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Monitoring client lagged, alerts dropped");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    });

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub uptime_seconds: u64,
    pub monitors: usize,
    pub offline_mode: bool,
}

/// Handle GET /health
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        uptime_seconds: state.uptime_secs(),
        monitors: state.broadcaster().monitor_count(),
        offline_mode: state.pipeline().is_offline(),
    })
}

/// Handle GET /metrics - Prometheus metrics endpoint
pub async fn metrics_endpoint(State(state): State<Arc<AppState>>) -> Result<Response, AppError> {
    let metrics = state.telemetry().render()?;
    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        metrics,
    )
        .into_response())
}

/// Application error wrapper for proper HTTP error responses
///
/// Known domain errors pick their own status; anything else is a 500.
pub struct AppError {
    status: StatusCode,
    error: anyhow::Error,
}

impl AppError {
    pub fn new(status: StatusCode, error: anyhow::Error) -> Self {
        Self { status, error }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

fn status_for(error: &anyhow::Error) -> StatusCode {
    if let Some(e) = error.downcast_ref::<PipelineError>() {
        return match e {
            PipelineError::EmptyMessage => StatusCode::BAD_REQUEST,
            PipelineError::AlertNotPersisted(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
    }
    if let Some(e) = error.downcast_ref::<AlertTransitionError>() {
        return match e {
            AlertTransitionError::NotFound(_) => StatusCode::NOT_FOUND,
            AlertTransitionError::NotForward { .. } => StatusCode::CONFLICT,
            AlertTransitionError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
    }
    StatusCode::INTERNAL_SERVER_ERROR
}

fn error_type(status: StatusCode) -> &'static str {
    match status {
        StatusCode::BAD_REQUEST => "invalid_request_error",
        StatusCode::UNAUTHORIZED => "authentication_error",
        StatusCode::FORBIDDEN => "permission_error",
        StatusCode::NOT_FOUND => "not_found_error",
        StatusCode::CONFLICT => "conflict_error",
        _ => "api_error",
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(error = %self.error, "Request failed");
        } else {
            tracing::debug!(status = %self.status, error = %self.error, "Request rejected");
        }

        let body = serde_json::json!({
            "message": self.error.to_string(),
            "error": {
                "message": self.error.to_string(),
                "type": error_type(self.status)
            }
        });

        (self.status, Json(body)).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        let error = err.into();
        Self {
            status: status_for(&error),
            error,
        }
    }
}
