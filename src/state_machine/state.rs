//! Tutoring session state types

use super::effect::Effect;
use super::transition::TransitionResult;
use crate::conversation::ConversationStore;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// Stage
// ============================================================================

/// One phase of the four-step tutoring wizard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    #[default]
    Intake,
    Instructions,
    ChatSession,
    Reflection,
}

impl Stage {
    pub const ALL: [Stage; 4] = [
        Stage::Intake,
        Stage::Instructions,
        Stage::ChatSession,
        Stage::Reflection,
    ];

    /// 1-based position in the wizard
    pub fn step(self) -> u8 {
        match self {
            Stage::Intake => 1,
            Stage::Instructions => 2,
            Stage::ChatSession => 3,
            Stage::Reflection => 4,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Intake => "intake",
            Stage::Instructions => "instructions",
            Stage::ChatSession => "chat_session",
            Stage::Reflection => "reflection",
        }
    }
}

// ============================================================================
// Identity
// ============================================================================

/// Errors the student can fix by editing their input
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Oops! Please enter both your student ID and name.")]
    MissingIdentity,
    #[error("Please enter a message.")]
    EmptyMessage,
}

/// Who the session belongs to
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub student_id: String,
    pub student_name: String,
}

impl Identity {
    pub fn new(student_id: impl Into<String>, student_name: impl Into<String>) -> Self {
        Self {
            student_id: student_id.into(),
            student_name: student_name.into(),
        }
    }

    /// Both fields must be non-empty after trimming whitespace
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.student_id.trim().is_empty() || self.student_name.trim().is_empty() {
            return Err(ValidationError::MissingIdentity);
        }
        Ok(())
    }

    pub fn is_complete(&self) -> bool {
        self.validate().is_ok()
    }

    /// Copy with surrounding whitespace removed, as stored alongside transcripts
    pub fn trimmed(&self) -> Self {
        Self::new(self.student_id.trim(), self.student_name.trim())
    }
}

// ============================================================================
// Document Context
// ============================================================================

/// Extracted text of the most recently uploaded document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentContext {
    pub file_name: String,
    pub text: String,
}

// ============================================================================
// Session State
// ============================================================================

/// The whole mutable state of one tutoring session.
///
/// Owned by exactly one controller; never shared between students.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    stage: Stage,
    identity: Identity,
    conversation: ConversationStore,
    document: Option<DocumentContext>,
    feedback_summary: Option<String>,
    persisted: bool,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn set_identity(&mut self, identity: Identity) {
        self.identity = identity;
    }

    pub fn conversation(&self) -> &ConversationStore {
        &self.conversation
    }

    pub fn conversation_mut(&mut self) -> &mut ConversationStore {
        &mut self.conversation
    }

    pub fn document(&self) -> Option<&DocumentContext> {
        self.document.as_ref()
    }

    pub fn document_text(&self) -> Option<&str> {
        self.document.as_ref().map(|d| d.text.as_str())
    }

    /// Replace the document context; only called for a newly uploaded file
    pub fn set_document(&mut self, document: DocumentContext) {
        self.document = Some(document);
    }

    pub fn feedback_summary(&self) -> Option<&str> {
        self.feedback_summary.as_deref()
    }

    pub fn set_feedback_summary(&mut self, summary: String) {
        self.feedback_summary = Some(summary);
    }

    pub fn persisted(&self) -> bool {
        self.persisted
    }

    pub fn mark_persisted(&mut self) {
        self.persisted = true;
    }

    /// Apply a transition: move to the new stage and carry out the state
    /// resets it requests. Returns the effects that need I/O.
    pub fn apply(&mut self, result: TransitionResult) -> Vec<Effect> {
        self.stage = result.new_stage;
        let mut pending = Vec::new();
        for effect in result.effects {
            match effect {
                Effect::ResetPersisted => self.persisted = false,
                Effect::DiscardFeedbackSummary => self.feedback_summary = None,
                other => pending.push(other),
            }
        }
        pending
    }
}
