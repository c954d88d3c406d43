//! End-of-session feedback summary
//!
//! One model call over the flattened transcript, sent as a single system
//! entry with no history replay.

use crate::conversation::ConversationStore;
use crate::llm::{LlmError, LlmMessage, LlmRequest, LlmService};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

const SUMMARY_PROMPT_PREFIX: &str = "This is a conversation between a student and MathBuddy:\n";

const SUMMARY_PROMPT_SUFFIX: &str = "\n\nPlease summarize the key concepts discussed, note the student's areas of strength, and suggest improvements or study tips for them to continue their learning.";

const SUMMARY_TIMEOUT: Duration = Duration::from_secs(120);

/// Compose the summary instruction around a transcript
pub fn summary_prompt(transcript: &str) -> String {
    format!("{SUMMARY_PROMPT_PREFIX}{transcript}{SUMMARY_PROMPT_SUFFIX}")
}

pub struct FeedbackSynthesizer {
    llm: Arc<dyn LlmService>,
    timeout: Duration,
}

impl FeedbackSynthesizer {
    pub fn new(llm: Arc<dyn LlmService>) -> Self {
        Self {
            llm,
            timeout: SUMMARY_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The single-entry request for a transcript
    pub fn request_for(transcript: &str) -> LlmRequest {
        LlmRequest::new(vec![LlmMessage::system(summary_prompt(transcript))])
    }

    /// Ask the model for a summary of everything said so far.
    ///
    /// Returns the model's answer as-is; persisting it is the caller's job.
    pub async fn synthesize(&self, conversation: &ConversationStore) -> Result<String, LlmError> {
        if conversation.is_empty() {
            tracing::debug!("Summarizing a session with no turns");
        }
        let request = Self::request_for(&conversation.as_transcript_text());

        match timeout(self.timeout, self.llm.complete(&request)).await {
            Ok(Ok(response)) => {
                tracing::info!(
                    turns = conversation.len(),
                    summary_chars = response.text.chars().count(),
                    "Feedback summary generated"
                );
                Ok(response.text)
            }
            Ok(Err(e)) => {
                tracing::warn!(error = %e.message, "Feedback summary LLM error");
                Err(e)
            }
            Err(_) => {
                tracing::warn!(timeout_secs = self.timeout.as_secs(), "Feedback summary timed out");
                Err(LlmError::network(format!(
                    "Feedback summary timed out after {:?}",
                    self.timeout
                )))
            }
        }
    }
}
