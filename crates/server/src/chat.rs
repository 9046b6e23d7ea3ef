//! Conversation endpoints.
//!
//! - `POST /api/v1/sessions/{id}/messages`     runs one turn for the session
//! - `GET  /api/v1/sessions/{id}/flow-events`  streams the session's progress events (SSE)

use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;
use wayfarer_agent::{AgentRuntime, FlowSubscriber};
use wayfarer_core::{
    ApplicationError, IntentSlots, InterfaceError, SessionId, UsageDecision, UsageGate,
};
use wayfarer_db::{RepositoryError, SessionSlotRepository};

const DEFAULT_LOCALE: &str = "en";

type SessionLocks = Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>;

#[derive(Clone)]
pub struct ChatState {
    runtime: Arc<AgentRuntime>,
    subscriber: FlowSubscriber,
    slots: Arc<dyn SessionSlotRepository>,
    usage: Arc<dyn UsageGate>,
    session_locks: SessionLocks,
}

impl ChatState {
    pub fn new(
        runtime: Arc<AgentRuntime>,
        subscriber: FlowSubscriber,
        slots: Arc<dyn SessionSlotRepository>,
        usage: Arc<dyn UsageGate>,
    ) -> Self {
        Self { runtime, subscriber, slots, usage, session_locks: SessionLocks::default() }
    }

    async fn session_lock(&self, session_id: &SessionId) -> Arc<Mutex<()>> {
        let mut locks = self.session_locks.lock().await;
        locks.entry(session_id.as_str().to_string()).or_default().clone()
    }

    /// Forgets the session's lock once no other turn holds or waits on it.
    async fn release_session_lock(&self, session_id: &SessionId, lock: Arc<Mutex<()>>) {
        let mut locks = self.session_locks.lock().await;
        // One reference in the map, one here.
        if Arc::strong_count(&lock) <= 2 {
            locks.remove(session_id.as_str());
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct MessageRequest {
    pub message: String,
    #[serde(default)]
    pub locale: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub reply: String,
    pub slots: IntentSlots,
    pub route: String,
    pub low_confidence: bool,
    pub complete: bool,
    pub missing_fields: Vec<&'static str>,
    pub model: Option<String>,
    pub correlation_id: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub correlation_id: String,
}

/// HTTP rendering of [`InterfaceError`].
#[derive(Debug)]
pub struct ApiError(pub InterfaceError);

impl From<InterfaceError> for ApiError {
    fn from(value: InterfaceError) -> Self {
        Self(value)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            InterfaceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            InterfaceError::TooManyRequests { .. } => StatusCode::TOO_MANY_REQUESTS,
            InterfaceError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            InterfaceError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = ErrorBody {
            error: self.0.user_message(),
            correlation_id: self.0.correlation_id().to_string(),
        };
        (status, Json(body)).into_response()
    }
}

fn bad_request(message: &str, correlation_id: &str) -> ApiError {
    ApiError(InterfaceError::BadRequest {
        message: message.to_string(),
        correlation_id: correlation_id.to_string(),
    })
}

fn repository_failure(error: RepositoryError) -> ApplicationError {
    match error {
        RepositoryError::Invalid(domain) => ApplicationError::Domain(domain),
        other => ApplicationError::Persistence(other.to_string()),
    }
}

fn session_from_path(raw: &str, correlation_id: &str) -> Result<SessionId, ApiError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(bad_request("session id must not be empty", correlation_id));
    }
    Ok(SessionId::from(trimmed))
}

pub fn router(state: ChatState) -> Router {
    Router::new()
        .route("/api/v1/sessions/{session_id}/messages", post(post_message))
        .route("/api/v1/sessions/{session_id}/flow-events", get(flow_events))
        .with_state(state)
}

pub async fn post_message(
    State(state): State<ChatState>,
    Path(session_id): Path<String>,
    Json(request): Json<MessageRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let correlation_id = Uuid::new_v4().to_string();
    let session_id = session_from_path(&session_id, &correlation_id)?;
    if request.message.trim().is_empty() {
        return Err(bad_request("message must not be empty", &correlation_id));
    }

    if let UsageDecision::Deny { reason } = state.usage.check(&session_id).await {
        warn!(
            event_name = "server.chat.usage_denied",
            correlation_id = %correlation_id,
            session_id = %session_id,
            reason = %reason,
            "turn rejected by usage gate"
        );
        return Err(ApplicationError::UsageDenied(reason).into_interface(&correlation_id).into());
    }

    let lock = state.session_lock(&session_id).await;
    let result = {
        let _turn = lock.lock().await;
        run_turn(&state, &session_id, &request, &correlation_id).await
    };
    state.release_session_lock(&session_id, lock).await;
    result.map(Json)
}

async fn run_turn(
    state: &ChatState,
    session_id: &SessionId,
    request: &MessageRequest,
    correlation_id: &str,
) -> Result<MessageResponse, ApiError> {
    let prior = state
        .slots
        .get(session_id)
        .await
        .map_err(|error| repository_failure(error).into_interface(correlation_id))?
        .unwrap_or_default();

    let locale = request.locale.as_deref().unwrap_or(DEFAULT_LOCALE);
    let outcome = state.runtime.process_turn(session_id, &request.message, &prior, locale).await;

    state
        .slots
        .put(session_id, &outcome.slots)
        .await
        .map_err(|error| repository_failure(error).into_interface(correlation_id))?;

    info!(
        event_name = "server.chat.turn_completed",
        correlation_id = %correlation_id,
        session_id = %session_id,
        route = %outcome.decision.route,
        model = outcome.model.as_deref().unwrap_or("none"),
        "turn served"
    );

    Ok(MessageResponse {
        route: outcome.decision.route.label(),
        low_confidence: outcome.decision.low_confidence,
        complete: outcome.slots.is_complete(),
        missing_fields: outcome.slots.missing_fields(),
        reply: outcome.reply,
        slots: outcome.slots,
        model: outcome.model,
        correlation_id: correlation_id.to_string(),
    })
}

pub async fn flow_events(
    State(state): State<ChatState>,
    Path(session_id): Path<String>,
) -> Result<Response, ApiError> {
    let correlation_id = Uuid::new_v4().to_string();
    let session_id = session_from_path(&session_id, &correlation_id)?;

    let stream = state.subscriber.subscribe(&session_id).await.map_err(|error| {
        warn!(
            event_name = "server.chat.subscribe_failed",
            correlation_id = %correlation_id,
            session_id = %session_id,
            error = %error,
            "could not open flow subscription"
        );
        ApiError::from(ApplicationError::Integration(error.to_string()).into_interface(&correlation_id))
    })?;

    let frames = stream.map(|item| Ok::<_, Infallible>(item.to_sse_frame()));
    let headers = [
        (header::CONTENT_TYPE, "text/event-stream"),
        (header::CACHE_CONTROL, "no-cache"),
    ];
    Ok((headers, Body::from_stream(frames)).into_response())
}
