//! Per-session controller
//!
//! Owns one student's `SessionState` and drives it: stage navigation,
//! chat turns, document uploads, and the reflection summary/save cycle.
//! Every operation runs to completion before the next one starts; the
//! manager serializes access per session.

use super::traits::{PersistenceError, TranscriptStore};
use crate::conversation::{Role, Turn};
use crate::document::{DocumentExtractor, DocumentKind, ExtractionError};
use crate::feedback::FeedbackSynthesizer;
use crate::llm::{LlmError, LlmService};
use crate::render::{RenderArtifact, ResponseRenderer};
use crate::state_machine::{
    transition, Action, DocumentContext, Effect, Identity, SessionState, Stage, TransitionError,
    ValidationError,
};
use crate::system_prompt::ContextInjector;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;

/// Errors surfaced to the presentation layer
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("{action} is not available during the {stage} stage")]
    WrongStage {
        stage: &'static str,
        action: &'static str,
    },
    #[error("Turn {0} does not exist")]
    TurnNotFound(usize),
    #[error(transparent)]
    Extraction(#[from] ExtractionError),
    #[error("Model call failed: {0}. {hint}", hint = .0.kind.student_hint())]
    Model(#[from] LlmError),
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

impl From<TransitionError> for SessionError {
    fn from(error: TransitionError) -> Self {
        match error {
            TransitionError::Validation(e) => SessionError::Validation(e),
        }
    }
}

/// Shared collaborators; cheap to clone into every session
#[derive(Clone)]
pub struct SessionServices {
    pub llm: Arc<dyn LlmService>,
    pub store: Arc<dyn TranscriptStore>,
    pub extractor: Arc<dyn DocumentExtractor>,
    pub renderer: ResponseRenderer,
    pub injector: ContextInjector,
}

/// Result of a successful chat submission
#[derive(Debug, Clone, Serialize)]
pub struct ChatReply {
    /// Index of the assistant turn in the history
    pub turn_index: usize,
    pub turn: Turn,
    pub artifact: RenderArtifact,
}

/// What an upload did to the document context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    Extracted,
    /// Same file name as the current document; nothing re-extracted
    Unchanged,
}

/// What a finalize pass accomplished
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FinalizeOutcome {
    pub summary_generated: bool,
    pub saved: bool,
}

/// Read-only projection of the session for the UI
#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub id: String,
    pub stage: Stage,
    pub step: u8,
    pub identity: Identity,
    pub turns: Vec<Turn>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_file_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feedback_summary: Option<String>,
    pub persisted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
}

pub struct SessionController {
    id: String,
    state: SessionState,
    services: SessionServices,
    last_error: Option<String>,
    created_at: DateTime<Utc>,
}

impl SessionController {
    pub fn new(id: impl Into<String>, services: SessionServices) -> Self {
        Self {
            id: id.into(),
            state: SessionState::new(),
            services,
            last_error: None,
            created_at: Utc::now(),
        }
    }

    #[allow(dead_code)] // Used in tests
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    #[allow(dead_code)] // Used in tests
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn view(&self) -> SessionView {
        SessionView {
            id: self.id.clone(),
            stage: self.state.stage(),
            step: self.state.stage().step(),
            identity: self.state.identity().clone(),
            turns: self.state.conversation().all_turns().to_vec(),
            document_file_name: self.state.document().map(|d| d.file_name.clone()),
            feedback_summary: self.state.feedback_summary().map(ToString::to_string),
            persisted: self.state.persisted(),
            last_error: self.last_error.clone(),
            created_at: self.created_at,
        }
    }

    fn require_stage(&self, stage: Stage, action: &'static str) -> Result<(), SessionError> {
        if self.state.stage() == stage {
            Ok(())
        } else {
            Err(SessionError::WrongStage {
                stage: self.state.stage().as_str(),
                action,
            })
        }
    }

    /// Record a surfaced failure for the view, passing it through
    fn record<T>(&mut self, result: Result<T, SessionError>) -> Result<T, SessionError> {
        match &result {
            Ok(_) => self.last_error = None,
            Err(e) => self.last_error = Some(e.to_string()),
        }
        result
    }

    /// Edit the student's identity; only the intake form exposes it
    pub fn set_identity(&mut self, identity: Identity) -> Result<(), SessionError> {
        self.require_stage(Stage::Intake, "Editing your details")?;
        self.state.set_identity(identity);
        Ok(())
    }

    /// Press Next or Previous.
    ///
    /// Entering Reflection runs the summary/save cycle; its failure is kept
    /// in `last_error` and does not undo the stage change.
    pub async fn navigate(&mut self, action: Action) -> Result<Stage, SessionError> {
        let from = self.state.stage();
        let result = match transition(from, self.state.identity(), action) {
            Ok(result) => result,
            Err(e) => return self.record(Err(e.into())),
        };
        let effects = self.state.apply(result);
        let to = self.state.stage();
        self.last_error = None;

        if from != to {
            tracing::info!(
                session_id = %self.id,
                from = from.as_str(),
                to = to.as_str(),
                ?action,
                "Stage changed"
            );
        }

        for effect in effects {
            match effect {
                Effect::SynthesizeFeedback => {
                    if let Err(e) = self.finalize().await {
                        tracing::warn!(session_id = %self.id, error = %e, "Reflection cycle incomplete");
                    }
                }
                Effect::ResetPersisted | Effect::DiscardFeedbackSummary => {}
            }
        }
        Ok(to)
    }

    /// Send a chat message and append the exchange.
    ///
    /// The user turn and its answer are appended together only after the
    /// model answers, so a failed call leaves the history untouched.
    pub async fn submit(&mut self, text: &str) -> Result<ChatReply, SessionError> {
        self.require_stage(Stage::ChatSession, "Chatting")?;
        if text.trim().is_empty() {
            return self.record(Err(ValidationError::EmptyMessage.into()));
        }

        let request = self.services.injector.build_request(
            self.state.document_text(),
            self.state.conversation().all_turns(),
            text,
        );
        let response = match self.services.llm.complete(&request).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(session_id = %self.id, error = %e, "Chat turn failed");
                return self.record(Err(e.into()));
            }
        };

        let conversation = self.state.conversation_mut();
        conversation.append(Role::User, text);
        let turn = conversation.append(Role::Assistant, response.text).clone();
        let turn_index = conversation.len() - 1;

        let artifact = self.services.renderer.render(turn.content()).await;
        tracing::info!(
            session_id = %self.id,
            turn_index,
            document = self.state.document().is_some(),
            plot = artifact.is_plot(),
            "Chat turn completed"
        );
        self.last_error = None;
        Ok(ChatReply {
            turn_index,
            turn,
            artifact,
        })
    }

    /// Extract an uploaded file into the document context.
    ///
    /// Re-uploading the current file is a no-op. A failed extraction leaves
    /// any existing context in place.
    pub async fn upload_document(
        &mut self,
        file_name: &str,
        mime_type: &str,
        bytes: &[u8],
    ) -> Result<DocumentStatus, SessionError> {
        self.require_stage(Stage::ChatSession, "Uploading a document")?;
        let result = self.extract_document(file_name, mime_type, bytes).await;
        self.record(result)
    }

    async fn extract_document(
        &mut self,
        file_name: &str,
        mime_type: &str,
        bytes: &[u8],
    ) -> Result<DocumentStatus, SessionError> {
        if self.state.document().is_some_and(|d| d.file_name == file_name) {
            return Ok(DocumentStatus::Unchanged);
        }
        let kind = DocumentKind::from_mime(mime_type)?;
        let text = self.services.extractor.extract(bytes, kind).await?;
        tracing::info!(session_id = %self.id, file_name, ?kind, chars = text.chars().count(), "Document context set");
        self.state.set_document(DocumentContext {
            file_name: file_name.to_string(),
            text,
        });
        Ok(DocumentStatus::Extracted)
    }

    /// Generate the summary if missing, then save if not yet saved.
    ///
    /// Safe to call repeatedly: an existing summary is reused, and a
    /// completed save is not repeated.
    pub async fn finalize(&mut self) -> Result<FinalizeOutcome, SessionError> {
        self.require_stage(Stage::Reflection, "Saving your reflection")?;
        let result = self.run_reflection_cycle().await;
        self.record(result)
    }

    async fn run_reflection_cycle(&mut self) -> Result<FinalizeOutcome, SessionError> {
        let mut outcome = FinalizeOutcome {
            summary_generated: false,
            saved: false,
        };

        if self.state.feedback_summary().is_none() {
            let synthesizer = FeedbackSynthesizer::new(Arc::clone(&self.services.llm));
            let summary = synthesizer.synthesize(self.state.conversation()).await?;
            self.state.set_feedback_summary(summary);
            outcome.summary_generated = true;
        }

        if !self.state.persisted() {
            let summary = self.state.feedback_summary().unwrap_or_default();
            self.services
                .store
                .save(
                    self.state.identity(),
                    self.state.conversation().all_turns(),
                    summary,
                )
                .await?;
            self.state.mark_persisted();
            outcome.saved = true;
            tracing::info!(session_id = %self.id, turns = self.state.conversation().len(), "Session persisted");
        }
        Ok(outcome)
    }

    /// Render one stored turn for display
    pub async fn render_turn(&self, index: usize) -> Result<RenderArtifact, SessionError> {
        let turn = self
            .state
            .conversation()
            .get(index)
            .ok_or(SessionError::TurnNotFound(index))?;
        Ok(match turn.role() {
            Role::Assistant => self.services.renderer.render(turn.content()).await,
            Role::User | Role::System | Role::FeedbackSummary => RenderArtifact::Text {
                text: turn.content().to_string(),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{LlmErrorKind, LlmResponse, MessageRole};
    use crate::session::testing::{MockExtractor, MockLlmService, MockTranscriptStore};

    const PLOT_REPLY: &str = "Let's look at it:\n```python\nimport numpy as np\nx = np.linspace(-2, 2, 41)\nax.plot(x, x**2 + 1)\nax.set_title('y = x^2 + 1')\n```";

    struct Harness {
        llm: Arc<MockLlmService>,
        store: Arc<MockTranscriptStore>,
        extractor: Arc<MockExtractor>,
        controller: SessionController,
    }

    fn harness() -> Harness {
        let llm = Arc::new(MockLlmService::new("mock"));
        let store = Arc::new(MockTranscriptStore::new());
        let extractor = Arc::new(MockExtractor::new());
        let services = SessionServices {
            llm: llm.clone(),
            store: store.clone(),
            extractor: extractor.clone(),
            renderer: ResponseRenderer::default(),
            injector: ContextInjector::new("persona"),
        };
        Harness {
            llm,
            store,
            extractor,
            controller: SessionController::new("s-1", services),
        }
    }

    async fn at_chat(h: &mut Harness) {
        h.controller
            .set_identity(Identity::new("42", "Ada"))
            .unwrap();
        h.controller.navigate(Action::Next).await.unwrap();
        h.controller.navigate(Action::Next).await.unwrap();
        assert_eq!(h.controller.state().stage(), Stage::ChatSession);
    }

    #[tokio::test]
    async fn test_intake_blocks_without_identity() {
        let mut h = harness();
        let err = h.controller.navigate(Action::Next).await.unwrap_err();
        assert!(matches!(err, SessionError::Validation(ValidationError::MissingIdentity)));
        assert_eq!(h.controller.state().stage(), Stage::Intake);
        assert_eq!(
            h.controller.last_error(),
            Some("Oops! Please enter both your student ID and name.")
        );

        h.controller.set_identity(Identity::new("42", "Ada")).unwrap();
        assert_eq!(h.controller.navigate(Action::Next).await.unwrap(), Stage::Instructions);
        assert_eq!(h.controller.last_error(), None);
    }

    #[tokio::test]
    async fn test_identity_only_editable_at_intake() {
        let mut h = harness();
        at_chat(&mut h).await;
        let err = h.controller.set_identity(Identity::new("1", "Eve")).unwrap_err();
        assert!(matches!(err, SessionError::WrongStage { .. }));
        assert_eq!(h.controller.state().identity(), &Identity::new("42", "Ada"));
    }

    #[tokio::test]
    async fn test_end_to_end_plot_and_reflection() {
        let mut h = harness();
        at_chat(&mut h).await;

        h.llm.queue_response(LlmResponse::text(PLOT_REPLY));
        let reply = h.controller.submit("graph y = x^2 + 1").await.unwrap();
        assert_eq!(reply.turn_index, 1);
        let RenderArtifact::Plot { figure, .. } = &reply.artifact else {
            panic!("expected a plot artifact");
        };
        assert_eq!(figure.axes.series[0].y.len(), 41);

        h.llm.queue_response(LlmResponse::text("You explored vertical shifts."));
        assert_eq!(h.controller.navigate(Action::Next).await.unwrap(), Stage::Reflection);

        let requests = h.llm.recorded_requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[1].messages.len(), 1);
        assert!(requests[1].messages[0].content.contains("user: graph y = x^2 + 1"));

        let state = h.controller.state();
        assert_eq!(state.feedback_summary(), Some("You explored vertical shifts."));
        assert!(state.persisted());
        let saved = h.store.saved();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].turns.len(), 2);
        assert_eq!(saved[0].summary, "You explored vertical shifts.");
    }

    #[tokio::test]
    async fn test_failed_snippet_keeps_turn() {
        let mut h = harness();
        at_chat(&mut h).await;

        let content = "```python\nax.plot(1/0)\n```";
        h.llm.queue_response(LlmResponse::text(content));
        let reply = h.controller.submit("graph 1/0").await.unwrap();
        let RenderArtifact::RenderError { message, code, .. } = &reply.artifact else {
            panic!("expected a render error");
        };
        assert!(message.contains("division by zero"));
        assert_eq!(code, "ax.plot(1/0)\n");
        assert_eq!(h.controller.state().conversation().all_turns()[1].content(), content);
    }

    #[tokio::test]
    async fn test_model_failure_does_not_half_append() {
        let mut h = harness();
        at_chat(&mut h).await;

        h.llm.queue_error(LlmError::server_error("overloaded"));
        let err = h.controller.submit("what is a limit?").await.unwrap_err();
        assert!(matches!(err, SessionError::Model(ref e) if e.kind == LlmErrorKind::ServerError));
        assert!(h.controller.state().conversation().is_empty());
        assert_eq!(
            h.controller.last_error(),
            Some("Model call failed: overloaded. The tutor service had a hiccup. Please send the message again.")
        );
    }

    #[tokio::test]
    async fn test_empty_message_never_reaches_model() {
        let mut h = harness();
        at_chat(&mut h).await;
        let err = h.controller.submit("   ").await.unwrap_err();
        assert!(matches!(err, SessionError::Validation(ValidationError::EmptyMessage)));
        assert!(h.llm.recorded_requests().is_empty());
    }

    #[tokio::test]
    async fn test_chat_only_in_chat_stage() {
        let mut h = harness();
        let err = h.controller.submit("hello").await.unwrap_err();
        assert_eq!(err.to_string(), "Chatting is not available during the intake stage");
    }

    #[tokio::test]
    async fn test_history_is_replayed_in_order() {
        let mut h = harness();
        at_chat(&mut h).await;
        h.llm.queue_response(LlmResponse::text("first answer"));
        h.llm.queue_response(LlmResponse::text("second answer"));
        h.controller.submit("first").await.unwrap();
        h.controller.submit("second").await.unwrap();

        let request = &h.llm.recorded_requests()[1];
        let contents: Vec<&str> = request.messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, ["persona", "first", "first answer", "second"]);
        assert_eq!(request.messages[2].role, MessageRole::Assistant);
    }

    #[tokio::test]
    async fn test_document_context_is_injected_and_cached() {
        let mut h = harness();
        at_chat(&mut h).await;

        h.extractor.queue_text("Theorem: derivatives of polynomials");
        let status = h
            .controller
            .upload_document("notes.pdf", "application/pdf", b"%PDF")
            .await
            .unwrap();
        assert_eq!(status, DocumentStatus::Extracted);

        let again = h
            .controller
            .upload_document("notes.pdf", "application/pdf", b"%PDF")
            .await
            .unwrap();
        assert_eq!(again, DocumentStatus::Unchanged);
        assert_eq!(h.extractor.call_count(), 1);

        h.llm.queue_response(LlmResponse::text("ok"));
        h.llm.queue_response(LlmResponse::text("ok again"));
        h.controller.submit("explain").await.unwrap();
        h.controller.submit("and more").await.unwrap();
        for request in h.llm.recorded_requests() {
            assert_eq!(request.system_count(), 2);
            assert!(request.messages[1].content.contains("Theorem: derivatives"));
        }
    }

    #[tokio::test]
    async fn test_failed_extraction_keeps_previous_document() {
        let mut h = harness();
        at_chat(&mut h).await;

        h.extractor.queue_text("first document");
        h.controller
            .upload_document("a.png", "image/png", b"png")
            .await
            .unwrap();

        h.extractor.queue_error(ExtractionError::Empty);
        let err = h
            .controller
            .upload_document("b.png", "image/png", b"png")
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::Extraction(ExtractionError::Empty)));
        assert_eq!(h.controller.state().document_text(), Some("first document"));

        let err = h
            .controller
            .upload_document("c.txt", "text/plain", b"text")
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::Extraction(ExtractionError::UnsupportedType(_))));
        assert_eq!(h.extractor.call_count(), 2);
    }

    #[tokio::test]
    async fn test_reentering_reflection_regenerates_summary() {
        let mut h = harness();
        at_chat(&mut h).await;

        h.llm.queue_response(LlmResponse::text("first summary"));
        h.controller.navigate(Action::Next).await.unwrap();
        assert!(h.controller.state().persisted());

        h.controller.navigate(Action::Previous).await.unwrap();
        assert_eq!(h.controller.state().feedback_summary(), None);
        assert!(!h.controller.state().persisted());

        h.llm.queue_response(LlmResponse::text("second summary"));
        h.controller.navigate(Action::Next).await.unwrap();
        assert_eq!(h.controller.state().feedback_summary(), Some("second summary"));
        assert_eq!(h.store.saved().len(), 2);
        assert_eq!(h.llm.recorded_requests().len(), 2);
    }

    #[tokio::test]
    async fn test_failed_save_is_retried_without_regenerating() {
        let mut h = harness();
        at_chat(&mut h).await;

        h.store.fail_next(PersistenceError::Storage("disk full".to_string()));
        h.llm.queue_response(LlmResponse::text("summary"));
        assert_eq!(h.controller.navigate(Action::Next).await.unwrap(), Stage::Reflection);
        assert_eq!(h.controller.state().feedback_summary(), Some("summary"));
        assert!(!h.controller.state().persisted());
        assert_eq!(
            h.controller.last_error(),
            Some("Failed to save transcript: disk full")
        );

        let outcome = h.controller.finalize().await.unwrap();
        assert_eq!(
            outcome,
            FinalizeOutcome {
                summary_generated: false,
                saved: true
            }
        );
        assert!(h.controller.state().persisted());
        assert_eq!(h.llm.recorded_requests().len(), 1);
        assert_eq!(h.store.attempts(), 2);

        // Nothing left to do
        let outcome = h.controller.finalize().await.unwrap();
        assert!(!outcome.summary_generated && !outcome.saved);
        assert_eq!(h.store.attempts(), 2);
    }

    #[tokio::test]
    async fn test_render_turn() {
        let mut h = harness();
        at_chat(&mut h).await;
        h.llm.queue_response(LlmResponse::text(PLOT_REPLY));
        h.controller.submit("graph it").await.unwrap();

        let user = h.controller.render_turn(0).await.unwrap();
        assert_eq!(
            user,
            RenderArtifact::Text {
                text: "graph it".to_string()
            }
        );
        assert!(h.controller.render_turn(1).await.unwrap().is_plot());
        assert!(matches!(
            h.controller.render_turn(2).await,
            Err(SessionError::TurnNotFound(2))
        ));
    }

    #[tokio::test]
    async fn test_view_projection() {
        let mut h = harness();
        at_chat(&mut h).await;
        let view = h.controller.view();
        assert_eq!(view.id, "s-1");
        assert_eq!(view.stage, Stage::ChatSession);
        assert_eq!(view.step, 3);
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["stage"], "chat_session");
        assert!(json.get("feedback_summary").is_none());
    }
}
