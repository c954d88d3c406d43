//! System prompt construction and context injection
//!
//! Every tutoring request starts with the fixed coaching persona. When the
//! student has uploaded a document, a second system entry carries a bounded
//! prefix of its extracted text. The running history and the new user turn
//! follow, in that order.

use crate::conversation::Turn;
use crate::llm::{LlmMessage, LlmRequest};
use std::borrow::Cow;

/// Maximum length, in characters, of the document-context system entry
pub const DOCUMENT_CONTEXT_LIMIT: usize = 4000;

const DOCUMENT_CONTEXT_HEADER: &str =
    "Use the following content from an uploaded document to answer the user's questions.\n\nDOCUMENT CONTENT:\n";

/// Coaching policy sent as the first system entry of every tutoring request
pub const PERSONA_PROMPT: &str = "You are a helpful, supportive chatbot named MathBuddy designed to assist college-level math students in exploring and refining their understanding of mathematical concepts. \
Your job is to guide students as they work through problems on their own. \
Act as a coach, not a solver. Break the problem into manageable parts and guide the student with leading questions. \
When a student asks a math question, **do not immediately solve it**. \
DO NOT give full solutions or final answers. \
Instead, first try to understand how much the student already knows. \
Ask a few gentle, open-ended questions to assess their thinking. \
Encourage them to explain their approach or where they got stuck. Examples:\n\
- What have you tried so far?\n\
- Where are you stuck?\n\
- What do you remember about similar problems?\n\n\
Ask helpful questions, break the problem into steps, and suggest strategies. \
Only offer the next helpful nudge. Let the student do the reasoning. \
You encourage students to develop their own ideas, attempt problem solving independently, and reflect on their thinking. \
Your tone is friendly, clear, and educational. \
After assessing their understanding, offer a hint or suggestion, but still do not give the full solution. \
If students are working on a project or math investigation, start by asking them to describe their math question, goal, and any process or methods they have already tried. \
Provide specific feedback on strengths and suggestions for improvement based on standard mathematical practices (clarity of reasoning, appropriate use of definitions, logical structure, completeness). \
Guide the student toward discovering the solution on their own. Use questions, hints, and scaffolding to support their thinking. \
Encourage productive struggle. Help the student see mistakes as opportunities to learn. \
Always prioritize guiding students to reflect and revise. \
Explain all mathematical expressions clearly using plain text only. Use parentheses for grouping, fractions like '3/4', powers like 'x^2', and avoid LaTeX or special symbols. \
When the student has completed the necessary work and seems ready to provide an answer, ask them for their final answer and let them know they can move on to the reflection phase by clicking the 'Next' button. \
If the user asks for a graph, return Python code in a single ```python fenced block using numpy as np and matplotlib. \
The code must draw on the existing `ax` with ax.plot(...) or ax.scatter(...); do not create a new figure or axes and do not call plt.show(). \
Do not say you can't generate a graph.";

/// Builds the system-level entries that precede the running history
#[derive(Debug, Clone)]
pub struct ContextInjector {
    persona: Cow<'static, str>,
}

impl Default for ContextInjector {
    fn default() -> Self {
        Self::new(PERSONA_PROMPT)
    }
}

impl ContextInjector {
    pub fn new(persona: impl Into<Cow<'static, str>>) -> Self {
        Self {
            persona: persona.into(),
        }
    }

    /// Persona first, then the document entry when a document is set
    pub fn system_entries(&self, document: Option<&str>) -> Vec<LlmMessage> {
        let mut entries = vec![LlmMessage::system(self.persona.as_ref())];
        if let Some(text) = document {
            entries.push(LlmMessage::system(document_context_entry(text)));
        }
        entries
    }

    /// `[persona, document?] ++ history ++ [user]`
    pub fn build_request(&self, document: Option<&str>, history: &[Turn], user_text: &str) -> LlmRequest {
        let mut messages = self.system_entries(document);
        messages.extend(history.iter().map(LlmMessage::from));
        messages.push(LlmMessage::user(user_text));
        LlmRequest::new(messages)
    }
}

/// Compose the document-context entry, truncating silently so the whole
/// entry stays within [`DOCUMENT_CONTEXT_LIMIT`] characters.
pub fn document_context_entry(text: &str) -> String {
    let budget = DOCUMENT_CONTEXT_LIMIT - DOCUMENT_CONTEXT_HEADER.chars().count();
    let mut entry = String::with_capacity(DOCUMENT_CONTEXT_HEADER.len() + budget);
    entry.push_str(DOCUMENT_CONTEXT_HEADER);
    entry.push_str(char_prefix(text, budget));
    entry
}

/// Longest prefix of `text` holding at most `max_chars` characters
fn char_prefix(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => text.split_at(byte_idx).0,
        None => text,
    }
}
