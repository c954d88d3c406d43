//! Document extraction collaborator
//!
//! Turns an uploaded PDF or image into plain text for the context injector.
//! Extraction is best-effort: any failure leaves the session without a
//! document rather than ending it.

mod external;

pub use external::ExternalToolExtractor;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// File kinds the tutor accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    Pdf,
    Image,
}

impl DocumentKind {
    /// Classify a declared MIME type, ignoring parameters and case
    pub fn from_mime(mime: &str) -> Result<Self, ExtractionError> {
        let essence = mime
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        match essence.as_str() {
            "application/pdf" => Ok(DocumentKind::Pdf),
            image if image.starts_with("image/") && image.len() > "image/".len() => {
                Ok(DocumentKind::Image)
            }
            _ => Err(ExtractionError::UnsupportedType(mime.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractionError {
    #[error("Unsupported file type: {0}")]
    UnsupportedType(String),
    #[error("{0} is not installed")]
    ToolMissing(String),
    #[error("Could not read the document: {0}")]
    Failed(String),
    #[error("No text could be extracted from the document")]
    Empty,
    #[error("Document extraction timed out")]
    Timeout,
}

/// Extracts text from raw file bytes
#[async_trait]
pub trait DocumentExtractor: Send + Sync {
    async fn extract(&self, bytes: &[u8], kind: DocumentKind) -> Result<String, ExtractionError>;
}

#[async_trait]
impl<T: DocumentExtractor + ?Sized> DocumentExtractor for Arc<T> {
    async fn extract(&self, bytes: &[u8], kind: DocumentKind) -> Result<String, ExtractionError> {
        (**self).extract(bytes, kind).await
    }
}
