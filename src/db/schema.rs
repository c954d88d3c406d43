//! Database schema and types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// SQL schema for initialization
pub const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS qna (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    number TEXT NOT NULL,
    name TEXT NOT NULL,
    chat TEXT NOT NULL,
    time TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_qna_number ON qna(number, time);
";

/// One `{role, content}` object of the stored chat array
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatEntry {
    pub role: String,
    pub content: String,
}

impl ChatEntry {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }
}

/// A saved session: who, what was said, and the closing summary
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TranscriptRecord {
    pub id: i64,
    /// Student ID, stored under the legacy column name `number`
    pub student_id: String,
    pub student_name: String,
    pub chat: Vec<ChatEntry>,
    pub time: DateTime<Utc>,
}

#[cfg(test)]
impl TranscriptRecord {
    /// The feedback summary, which is always the last chat entry
    pub fn summary(&self) -> Option<&str> {
        self.chat
            .last()
            .filter(|entry| entry.role == "feedback_summary")
            .map(|entry| entry.content.as_str())
    }
}
