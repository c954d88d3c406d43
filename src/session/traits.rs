//! Collaborator seams for the session controller
//!
//! The controller talks to the model, persistence, and document extraction
//! only through these traits so tests can substitute recording mocks.

use crate::conversation::Turn;
use crate::db::Database;
use crate::llm::{LlmError, LlmRequest, LlmResponse, LlmService, ModelRegistry};
use crate::state_machine::Identity;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PersistenceError {
    #[error("Cannot save a transcript without a student ID and name")]
    MissingIdentity,
    #[error("Failed to save transcript: {0}")]
    Storage(String),
}

/// Persistence collaborator for finished sessions
#[async_trait]
pub trait TranscriptStore: Send + Sync {
    /// Save identity, every turn, and the summary as one record
    async fn save(
        &self,
        identity: &Identity,
        turns: &[Turn],
        summary: &str,
    ) -> Result<(), PersistenceError>;
}

#[async_trait]
impl<T: TranscriptStore + ?Sized> TranscriptStore for Arc<T> {
    async fn save(
        &self,
        identity: &Identity,
        turns: &[Turn],
        summary: &str,
    ) -> Result<(), PersistenceError> {
        (**self).save(identity, turns, summary).await
    }
}

// ============================================================================
// Production Adapters
// ============================================================================

/// Adapter to use Database as a `TranscriptStore`
#[derive(Clone)]
pub struct DatabaseStorage {
    db: Database,
}

impl DatabaseStorage {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    #[allow(dead_code)] // Useful for tests
    pub fn inner(&self) -> &Database {
        &self.db
    }
}

#[async_trait]
impl TranscriptStore for DatabaseStorage {
    async fn save(
        &self,
        identity: &Identity,
        turns: &[Turn],
        summary: &str,
    ) -> Result<(), PersistenceError> {
        if !identity.is_complete() {
            return Err(PersistenceError::MissingIdentity);
        }
        let id = self
            .db
            .insert_transcript(&identity.trimmed(), turns, summary)
            .map_err(|e| PersistenceError::Storage(e.to_string()))?;
        tracing::info!(transcript_id = id, turns = turns.len(), "Transcript saved");
        Ok(())
    }
}

/// Adapter resolving the configured model from the registry per request
pub struct RegistryLlmClient {
    registry: Arc<ModelRegistry>,
    model_id: String,
}

impl RegistryLlmClient {
    pub fn new(registry: Arc<ModelRegistry>, model_id: String) -> Self {
        Self { registry, model_id }
    }
}

#[async_trait]
impl LlmService for RegistryLlmClient {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        let llm = self
            .registry
            .get(&self.model_id)
            .or_else(|| self.registry.default())
            .ok_or_else(|| LlmError::auth("No LLM available: set OPENAI_API_KEY or LLM_GATEWAY"))?;
        llm.complete(request).await
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::Role;
    use crate::llm::{LlmConfig, LlmErrorKind, LlmMessage};

    #[tokio::test]
    async fn test_database_storage_requires_identity() {
        let storage = DatabaseStorage::new(Database::open_in_memory().unwrap());
        let err = storage
            .save(&Identity::new("42", "  "), &[], "summary")
            .await
            .unwrap_err();
        assert_eq!(err, PersistenceError::MissingIdentity);
        assert_eq!(storage.inner().transcript_count().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_database_storage_saves_trimmed_identity() {
        let storage = DatabaseStorage::new(Database::open_in_memory().unwrap());
        let turns = vec![Turn::new(Role::User, "hi")];
        storage
            .save(&Identity::new(" 42 ", "Ada "), &turns, "summary")
            .await
            .unwrap();
        let records = storage.inner().transcripts_for_student("42").unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].student_name, "Ada");
    }

    #[tokio::test]
    async fn test_registry_client_without_models() {
        let registry = Arc::new(ModelRegistry::new(&LlmConfig::default()));
        let client = RegistryLlmClient::new(registry, "gpt-4o".to_string());
        let err = client
            .complete(&LlmRequest::new(vec![LlmMessage::user("hi")]))
            .await
            .unwrap_err();
        assert_eq!(err.kind, LlmErrorKind::Auth);
        assert_eq!(client.model_id(), "gpt-4o");
    }
}
