//! API request and response types

use crate::db::TranscriptRecord;
use crate::session::{DocumentStatus, FinalizeOutcome, SessionView};
use serde::{Deserialize, Serialize};

/// Request to edit the student's identity
#[derive(Debug, Deserialize)]
pub struct IdentityRequest {
    pub student_id: String,
    pub student_name: String,
}

/// Request to send a chat message
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub text: String,
}

/// Uploaded document; `data` is base64
#[derive(Debug, Deserialize)]
pub struct DocumentRequest {
    pub file_name: String,
    pub mime_type: String,
    pub data: String,
}

/// Response with the session view
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub session: SessionView,
}

/// Response for a document upload
#[derive(Debug, Serialize)]
pub struct DocumentResponse {
    pub status: DocumentStatus,
    pub file_name: String,
}

/// Response for a finalize retry
#[derive(Debug, Serialize)]
pub struct FinalizeResponse {
    #[serde(flatten)]
    pub outcome: FinalizeOutcome,
    pub session: SessionView,
}

/// Saved transcripts for one student
#[derive(Debug, Serialize)]
pub struct TranscriptListResponse {
    pub transcripts: Vec<TranscriptRecord>,
}

/// Response for lifecycle actions
#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

/// Response for model list
#[derive(Debug, Serialize)]
pub struct ModelsResponse {
    pub models: Vec<String>,
    pub default: String,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}
