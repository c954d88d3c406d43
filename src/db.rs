//! Database module for MathBuddy
//!
//! Stores finished tutoring sessions: the student's identity, every turn in
//! order, and the feedback summary as the final chat entry.

mod schema;

pub use schema::*;

use crate::conversation::{Role, Turn};
use crate::state_machine::Identity;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::{Arc, Mutex};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Invalid chat payload: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Transcript not found: {0}")]
    TranscriptNotFound(i64),
}

pub type DbResult<T> = Result<T, DbError>;

/// Flatten turns plus the summary into the stored chat array
pub fn chat_entries(turns: &[Turn], summary: &str) -> Vec<ChatEntry> {
    turns
        .iter()
        .map(|turn| ChatEntry::new(turn.role().as_str(), turn.content()))
        .chain(std::iter::once(ChatEntry::new(
            Role::FeedbackSummary.as_str(),
            summary,
        )))
        .collect()
}

/// Thread-safe database handle
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open or create database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let conn = Connection::open(path)?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    /// Open an in-memory database (for testing)
    #[allow(dead_code)] // Used in tests
    pub fn open_in_memory() -> DbResult<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    fn run_migrations(&self) -> DbResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    // ==================== Transcript Operations ====================

    /// Insert one saved session and return its row id
    pub fn insert_transcript(
        &self,
        identity: &Identity,
        turns: &[Turn],
        summary: &str,
    ) -> DbResult<i64> {
        let chat = serde_json::to_string(&chat_entries(turns, summary))?;
        let now = Utc::now();
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO qna (number, name, chat, time) VALUES (?1, ?2, ?3, ?4)",
            params![
                identity.student_id,
                identity.student_name,
                chat,
                now.to_rfc3339()
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Get a saved session by row id
    pub fn get_transcript(&self, id: i64) -> DbResult<TranscriptRecord> {
        let conn = self.conn.lock().unwrap();
        let mut stmt =
            conn.prepare("SELECT id, number, name, chat, time FROM qna WHERE id = ?1")?;
        let row = stmt
            .query_row(params![id], read_row)
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => DbError::TranscriptNotFound(id),
                other => DbError::Sqlite(other),
            })?;
        into_record(row)
    }

    /// All saved sessions of one student, oldest first
    pub fn transcripts_for_student(&self, student_id: &str) -> DbResult<Vec<TranscriptRecord>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, number, name, chat, time FROM qna WHERE number = ?1 ORDER BY time, id",
        )?;
        let rows = stmt
            .query_map(params![student_id], read_row)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(into_record).collect()
    }

    /// Count of saved sessions
    #[allow(dead_code)] // Used in tests
    pub fn transcript_count(&self) -> DbResult<i64> {
        let conn = self.conn.lock().unwrap();
        Ok(conn.query_row("SELECT COUNT(*) FROM qna", [], |row| row.get(0))?)
    }
}

/// Raw column values; the chat JSON is decoded outside the row closure
type RawRow = (i64, String, String, String, String);

fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawRow> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
}

fn into_record((id, student_id, student_name, chat, time): RawRow) -> DbResult<TranscriptRecord> {
    Ok(TranscriptRecord {
        id,
        student_id,
        student_name,
        chat: serde_json::from_str(&chat)?,
        time: parse_datetime(&time),
    })
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).map_or_else(|_| Utc::now(), |dt| dt.with_timezone(&Utc))
}
