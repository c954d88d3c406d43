//! Mock implementations for testing
//!
//! These mocks enable controller and HTTP tests without real I/O. Every
//! call is recorded so tests can assert on exactly what was sent.

use super::traits::{PersistenceError, TranscriptStore};
use crate::conversation::Turn;
use crate::document::{DocumentExtractor, DocumentKind, ExtractionError};
use crate::llm::{LlmError, LlmRequest, LlmResponse, LlmService};
use crate::state_machine::Identity;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

// ============================================================================
// Mock LLM Service
// ============================================================================

/// Mock LLM service that returns queued responses
pub struct MockLlmService {
    responses: Mutex<VecDeque<Result<LlmResponse, LlmError>>>,
    model_id: String,
    delay: Mutex<Option<Duration>>,
    /// Record of all requests made
    pub requests: Mutex<Vec<LlmRequest>>,
}

#[allow(dead_code)]
impl MockLlmService {
    pub fn new(model_id: impl Into<String>) -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            model_id: model_id.into(),
            delay: Mutex::new(None),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Queue a successful response
    pub fn queue_response(&self, response: LlmResponse) {
        self.responses.lock().unwrap().push_back(Ok(response));
    }

    /// Queue an error response
    pub fn queue_error(&self, error: LlmError) {
        self.responses.lock().unwrap().push_back(Err(error));
    }

    /// Sleep this long before answering each request
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    /// Get recorded requests
    pub fn recorded_requests(&self) -> Vec<LlmRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmService for MockLlmService {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        self.requests.lock().unwrap().push(request.clone());
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(LlmError::network("No mock response queued")))
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

// ============================================================================
// Mock Transcript Store
// ============================================================================

/// One recorded `save` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedTranscript {
    pub identity: Identity,
    pub turns: Vec<Turn>,
    pub summary: String,
}

/// In-memory transcript store with injectable failures
#[derive(Default)]
pub struct MockTranscriptStore {
    failures: Mutex<VecDeque<PersistenceError>>,
    /// Every call, including failed ones
    pub attempts: Mutex<usize>,
    pub saved: Mutex<Vec<SavedTranscript>>,
}

#[allow(dead_code)]
impl MockTranscriptStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next save fail with `error`
    pub fn fail_next(&self, error: PersistenceError) {
        self.failures.lock().unwrap().push_back(error);
    }

    pub fn saved(&self) -> Vec<SavedTranscript> {
        self.saved.lock().unwrap().clone()
    }

    pub fn attempts(&self) -> usize {
        *self.attempts.lock().unwrap()
    }
}

#[async_trait]
impl TranscriptStore for MockTranscriptStore {
    async fn save(
        &self,
        identity: &Identity,
        turns: &[Turn],
        summary: &str,
    ) -> Result<(), PersistenceError> {
        *self.attempts.lock().unwrap() += 1;
        if !identity.is_complete() {
            return Err(PersistenceError::MissingIdentity);
        }
        if let Some(error) = self.failures.lock().unwrap().pop_front() {
            return Err(error);
        }
        self.saved.lock().unwrap().push(SavedTranscript {
            identity: identity.clone(),
            turns: turns.to_vec(),
            summary: summary.to_string(),
        });
        Ok(())
    }
}

// ============================================================================
// Mock Extractor
// ============================================================================

/// Extractor returning queued results and recording each call
#[derive(Default)]
pub struct MockExtractor {
    results: Mutex<VecDeque<Result<String, ExtractionError>>>,
    pub calls: Mutex<Vec<(Vec<u8>, DocumentKind)>>,
}

#[allow(dead_code)]
impl MockExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue_text(&self, text: impl Into<String>) {
        self.results.lock().unwrap().push_back(Ok(text.into()));
    }

    pub fn queue_error(&self, error: ExtractionError) {
        self.results.lock().unwrap().push_back(Err(error));
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl DocumentExtractor for MockExtractor {
    async fn extract(&self, bytes: &[u8], kind: DocumentKind) -> Result<String, ExtractionError> {
        self.calls.lock().unwrap().push((bytes.to_vec(), kind));
        self.results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ExtractionError::Failed("No mock result queued".to_string())))
    }
}
