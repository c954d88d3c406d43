//! HTTP request handlers

use super::types::{
    ChatRequest, DocumentRequest, DocumentResponse, ErrorResponse, FinalizeResponse,
    IdentityRequest, ModelsResponse, SessionResponse, SuccessResponse, TranscriptListResponse,
};
use super::AppState;
use crate::db::{DbError, TranscriptRecord};
use crate::render::RenderArtifact;
use crate::session::{ChatReply, SessionError, SessionHandle};
use crate::state_machine::{Action, Identity};
use axum::{
    extract::{DefaultBodyLimit, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use base64::Engine;

/// Uploaded documents arrive base64-encoded inside JSON
const DOCUMENT_BODY_LIMIT: usize = 32 * 1024 * 1024;

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Session lifecycle
        .route("/api/sessions", post(create_session))
        .route("/api/sessions/:id", get(get_session).delete(delete_session))
        // Intake
        .route("/api/sessions/:id/identity", put(set_identity))
        // Wizard navigation
        .route("/api/sessions/:id/next", post(next_stage))
        .route("/api/sessions/:id/previous", post(previous_stage))
        // Chat
        .route("/api/sessions/:id/chat", post(send_chat))
        .route(
            "/api/sessions/:id/document",
            post(upload_document).layer(DefaultBodyLimit::max(DOCUMENT_BODY_LIMIT)),
        )
        .route("/api/sessions/:id/turns/:index/render", get(render_turn))
        // Reflection
        .route("/api/sessions/:id/finalize", post(finalize_session))
        // Saved transcripts
        .route("/api/transcripts/:id", get(get_transcript))
        .route(
            "/api/students/:student_id/transcripts",
            get(list_student_transcripts),
        )
        // Model info
        .route("/api/models", get(list_models))
        // Version
        .route("/version", get(get_version))
        .with_state(state)
}

async fn find_session(state: &AppState, id: &str) -> Result<SessionHandle, AppError> {
    state
        .sessions
        .get(id)
        .await
        .ok_or_else(|| AppError::NotFound(format!("Session not found: {id}")))
}

// ============================================================
// Session Lifecycle
// ============================================================

async fn create_session(State(state): State<AppState>) -> Json<SessionResponse> {
    let (_, handle) = state.sessions.create().await;
    let session = handle.lock().await.view();
    Json(SessionResponse { session })
}

async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionResponse>, AppError> {
    let handle = find_session(&state, &id).await?;
    let session = handle.lock().await.view();
    Ok(Json(SessionResponse { session }))
}

async fn delete_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SuccessResponse>, AppError> {
    if state.sessions.remove(&id).await {
        Ok(Json(SuccessResponse { success: true }))
    } else {
        Err(AppError::NotFound(format!("Session not found: {id}")))
    }
}

// ============================================================
// Intake & Navigation
// ============================================================

async fn set_identity(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<IdentityRequest>,
) -> Result<Json<SessionResponse>, AppError> {
    let handle = find_session(&state, &id).await?;
    let mut session = handle.lock().await;
    session.set_identity(Identity::new(req.student_id, req.student_name))?;
    Ok(Json(SessionResponse {
        session: session.view(),
    }))
}

async fn navigate(state: &AppState, id: &str, action: Action) -> Result<SessionResponse, AppError> {
    let handle = find_session(state, id).await?;
    let mut session = handle.lock().await;
    session.navigate(action).await?;
    Ok(SessionResponse {
        session: session.view(),
    })
}

async fn next_stage(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionResponse>, AppError> {
    navigate(&state, &id, Action::Next).await.map(Json)
}

async fn previous_stage(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionResponse>, AppError> {
    navigate(&state, &id, Action::Previous).await.map(Json)
}

// ============================================================
// Chat
// ============================================================

async fn send_chat(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatReply>, AppError> {
    let handle = find_session(&state, &id).await?;
    let reply = handle.lock().await.submit(&req.text).await?;
    Ok(Json(reply))
}

async fn upload_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<DocumentRequest>,
) -> Result<Json<DocumentResponse>, AppError> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(req.data.as_bytes())
        .map_err(|e| AppError::BadRequest(format!("Invalid base64 document data: {e}")))?;
    let handle = find_session(&state, &id).await?;
    let status = handle
        .lock()
        .await
        .upload_document(&req.file_name, &req.mime_type, &bytes)
        .await?;
    Ok(Json(DocumentResponse {
        status,
        file_name: req.file_name,
    }))
}

async fn render_turn(
    State(state): State<AppState>,
    Path((id, index)): Path<(String, usize)>,
) -> Result<Json<RenderArtifact>, AppError> {
    let handle = find_session(&state, &id).await?;
    let artifact = handle.lock().await.render_turn(index).await?;
    Ok(Json(artifact))
}

// ============================================================
// Reflection
// ============================================================

async fn finalize_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<FinalizeResponse>, AppError> {
    let handle = find_session(&state, &id).await?;
    let mut session = handle.lock().await;
    let outcome = session.finalize().await?;
    Ok(Json(FinalizeResponse {
        outcome,
        session: session.view(),
    }))
}

// ============================================================
// Saved Transcripts
// ============================================================

async fn get_transcript(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<TranscriptRecord>, AppError> {
    let record = state.db.get_transcript(id)?;
    Ok(Json(record))
}

async fn list_student_transcripts(
    State(state): State<AppState>,
    Path(student_id): Path<String>,
) -> Result<Json<TranscriptListResponse>, AppError> {
    let transcripts = state.db.transcripts_for_student(&student_id)?;
    Ok(Json(TranscriptListResponse { transcripts }))
}

// ============================================================
// Model Info
// ============================================================

async fn list_models(State(state): State<AppState>) -> Json<ModelsResponse> {
    Json(ModelsResponse {
        models: state.llm_registry.available_models(),
        default: state.llm_registry.default_model_id().to_string(),
    })
}

async fn get_version() -> &'static str {
    concat!("mathbuddy ", env!("CARGO_PKG_VERSION"))
}

// ============================================================
// Error Handling
// ============================================================

#[derive(Debug)]
enum AppError {
    BadRequest(String),
    NotFound(String),
    Conflict(String),
    Unprocessable(String),
    BadGateway(String),
    Internal(String),
}

impl From<SessionError> for AppError {
    fn from(error: SessionError) -> Self {
        let message = error.to_string();
        match error {
            SessionError::Validation(_) => AppError::BadRequest(message),
            SessionError::WrongStage { .. } => AppError::Conflict(message),
            SessionError::TurnNotFound(_) => AppError::NotFound(message),
            SessionError::Extraction(_) => AppError::Unprocessable(message),
            SessionError::Model(_) => AppError::BadGateway(message),
            SessionError::Persistence(_) => AppError::Internal(message),
        }
    }
}

impl From<DbError> for AppError {
    fn from(error: DbError) -> Self {
        match error {
            DbError::TranscriptNotFound(_) => AppError::NotFound(error.to_string()),
            other => AppError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::Unprocessable(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg),
            AppError::BadGateway(msg) => (StatusCode::BAD_GATEWAY, msg),
            AppError::Internal(msg) => {
                tracing::error!(error = %msg, "Request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        let body = Json(ErrorResponse::new(message));
        (status, body).into_response()
    }
}
