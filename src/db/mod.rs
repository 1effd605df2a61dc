//! # SQLite Persistence
//!
//! One store for the three tables the gateway owns: `records` (one row per
//! live session), `segments` (one row per enriched sub-segment) and `users`
//! (enrolled speakers). Every operation opens its own connection and runs a
//! single short statement; SQLite serializes writers internally, so the
//! store can be cloned freely into pipeline tasks.
//!
//! ## Write Rules:
//! - The record row is created when the connection is accepted, before any
//!   segment row can reference it.
//! - Segment rows are immutable once written.
//! - A record's topic is updated exactly once, by the session finalizer.

use crate::services::UNKNOWN_TOPIC;
use crate::session::pipeline::EnrichedSegment;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::PathBuf;

/// One session record as listed by the query surface, with the read-time
/// derived fields.
#[derive(Debug, Clone, serde::Serialize)]
pub struct RecordSummary {
    pub id: String,
    #[serde(rename = "date")]
    pub started_at: String,
    pub topic: String,
    /// `MM:SS`, derived from the last segment's end offset.
    pub duration: String,
    /// Distinct speaker display names, `["Unknown"]` when none were stored.
    pub speakers: Vec<String>,
}

/// One persisted segment row.
#[derive(Debug, Clone)]
pub struct SegmentRow {
    pub start_seconds: f64,
    pub end_seconds: f64,
    pub text: String,
    pub text_sentiment: String,
    pub voice_sentiment: String,
    pub speaker: String,
    pub similarity_score: f64,
}

/// One enrolled user.
#[derive(Debug, Clone, serde::Serialize)]
pub struct UserRow {
    pub id: i64,
    pub name: String,
    pub surname: String,
    #[serde(rename = "date")]
    pub created_at: String,
}

/// Handle to the gateway database. Cheap to clone; each operation opens its
/// own connection.
#[derive(Debug, Clone)]
pub struct Store {
    db_path: PathBuf,
}

impl Store {
    /// Open (or create) the database and ensure the schema exists.
    pub fn new(db_path: impl Into<PathBuf>) -> Result<Self, rusqlite::Error> {
        let store = Self { db_path: db_path.into() };
        store.init()?;
        Ok(store)
    }

    fn open(&self) -> Result<Connection, rusqlite::Error> {
        let conn = Connection::open(&self.db_path)?;
        // Concurrent pipeline tasks write independently; wait out the
        // file lock instead of surfacing SQLITE_BUSY.
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        Ok(conn)
    }

    fn init(&self) -> Result<(), rusqlite::Error> {
        if let Some(parent) = self.db_path.parent() {
            if !parent.as_os_str().is_empty() {
                let _ = std::fs::create_dir_all(parent);
            }
        }

        let conn = self.open()?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS records (
                id TEXT PRIMARY KEY,
                started_at TEXT NOT NULL,
                topic TEXT NOT NULL DEFAULT 'Unknown'
            );

            CREATE TABLE IF NOT EXISTS segments (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                record_id TEXT NOT NULL,
                start_offset REAL NOT NULL,
                end_offset REAL NOT NULL,
                text TEXT NOT NULL,
                text_sentiment TEXT NOT NULL,
                voice_sentiment TEXT NOT NULL,
                speaker TEXT NOT NULL,
                similarity_score REAL NOT NULL DEFAULT 0.0
            );
            CREATE INDEX IF NOT EXISTS idx_segments_record_id ON segments(record_id);

            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                surname TEXT NOT NULL,
                created_at TEXT NOT NULL
            );
            "#,
        )
    }

    /// Create the session record. Must succeed before segments reference it;
    /// session ids are unique so this never conflicts.
    pub fn create_record(&self, id: &str, started_at: DateTime<Utc>) -> Result<(), rusqlite::Error> {
        let conn = self.open()?;
        conn.execute(
            "INSERT INTO records (id, started_at, topic) VALUES (?1, ?2, ?3)",
            params![id, started_at.to_rfc3339(), UNKNOWN_TOPIC],
        )?;
        Ok(())
    }

    /// Store the finalized topic for a session.
    pub fn set_topic(&self, id: &str, topic: &str) -> Result<(), rusqlite::Error> {
        let conn = self.open()?;
        conn.execute("UPDATE records SET topic = ?1 WHERE id = ?2", params![topic, id])?;
        Ok(())
    }

    /// Append one enriched segment.
    pub fn append_segment(&self, segment: &EnrichedSegment) -> Result<(), rusqlite::Error> {
        let conn = self.open()?;
        conn.execute(
            r#"
            INSERT INTO segments
                (record_id, start_offset, end_offset, text,
                 text_sentiment, voice_sentiment, speaker, similarity_score)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                segment.record_id,
                segment.start_seconds,
                segment.end_seconds,
                segment.text,
                segment.text_sentiment,
                segment.voice_sentiment,
                segment.speaker_display,
                segment.similarity_score,
            ],
        )?;
        Ok(())
    }

    /// All segments of one record, ordered by start offset. Used by both the
    /// query surface and the finalizer's transcript aggregation.
    pub fn segments_for_record(&self, record_id: &str) -> Result<Vec<SegmentRow>, rusqlite::Error> {
        let conn = self.open()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT start_offset, end_offset, text, text_sentiment,
                   voice_sentiment, speaker, similarity_score
            FROM segments WHERE record_id = ?1 ORDER BY start_offset ASC
            "#,
        )?;

        let rows = stmt
            .query_map(params![record_id], |row| {
                Ok(SegmentRow {
                    start_seconds: row.get(0)?,
                    end_seconds: row.get(1)?,
                    text: row.get(2)?,
                    text_sentiment: row.get(3)?,
                    voice_sentiment: row.get(4)?,
                    speaker: row.get(5)?,
                    similarity_score: row.get(6)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// All records, newest first, with duration and speakers derived from
    /// their segments.
    pub fn list_records(&self) -> Result<Vec<RecordSummary>, rusqlite::Error> {
        let conn = self.open()?;
        let mut stmt =
            conn.prepare("SELECT id, started_at, topic FROM records ORDER BY started_at DESC")?;
        let base: Vec<(String, String, String)> = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?
            .collect::<Result<Vec<_>, _>>()?;

        let mut records = Vec::with_capacity(base.len());
        for (id, started_at, topic) in base {
            let max_end: Option<f64> = conn.query_row(
                "SELECT MAX(end_offset) FROM segments WHERE record_id = ?1",
                params![id],
                |row| row.get(0),
            )?;

            let mut speaker_stmt = conn.prepare(
                "SELECT DISTINCT speaker FROM segments WHERE record_id = ?1 AND speaker != ''",
            )?;
            let mut speakers: Vec<String> = speaker_stmt
                .query_map(params![id], |row| row.get(0))?
                .collect::<Result<Vec<_>, _>>()?;
            if speakers.is_empty() {
                speakers.push("Unknown".to_string());
            }

            records.push(RecordSummary {
                id,
                started_at,
                topic,
                duration: format_duration(max_end.unwrap_or(0.0)),
                speakers,
            });
        }
        Ok(records)
    }

    /// Look up an enrolled user by primary key.
    pub fn find_user(&self, id: i64) -> Result<Option<UserRow>, rusqlite::Error> {
        let conn = self.open()?;
        conn.query_row(
            "SELECT id, name, surname, created_at FROM users WHERE id = ?1",
            params![id],
            |row| {
                Ok(UserRow {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    surname: row.get(2)?,
                    created_at: row.get(3)?,
                })
            },
        )
        .optional()
    }

    /// Insert a user and return the generated id.
    pub fn insert_user(&self, name: &str, surname: &str) -> Result<i64, rusqlite::Error> {
        let conn = self.open()?;
        conn.execute(
            "INSERT INTO users (name, surname, created_at) VALUES (?1, ?2, ?3)",
            params![name.trim(), surname.trim(), Utc::now().to_rfc3339()],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// All enrolled users, newest first.
    pub fn list_users(&self) -> Result<Vec<UserRow>, rusqlite::Error> {
        let conn = self.open()?;
        let mut stmt =
            conn.prepare("SELECT id, name, surname, created_at FROM users ORDER BY created_at DESC")?;
        let users = stmt
            .query_map([], |row| {
                Ok(UserRow {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    surname: row.get(2)?,
                    created_at: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(users)
    }
}

fn format_duration(seconds: f64) -> String {
    let total = seconds.max(0.0) as i64;
    format!("{:02}:{:02}", total / 60, total % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store() -> (Store, PathBuf) {
        let path = std::env::temp_dir()
            .join(format!("voice-gateway-test-{}.sqlite", uuid::Uuid::new_v4().simple()));
        let store = Store::new(&path).unwrap();
        (store, path)
    }

    fn segment(record_id: &str, start: f64, end: f64, text: &str, speaker: &str) -> EnrichedSegment {
        EnrichedSegment {
            record_id: record_id.to_string(),
            start_seconds: start,
            end_seconds: end,
            text: text.to_string(),
            text_sentiment: "Neutral".to_string(),
            voice_sentiment: "Unknown".to_string(),
            speaker_display: speaker.to_string(),
            similarity_score: 0.5,
        }
    }

    #[test]
    fn record_lifecycle_and_topic_update() {
        let (store, path) = temp_store();

        store.create_record("sess_a", Utc::now()).unwrap();
        let records = store.list_records().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].topic, "Unknown");
        assert_eq!(records[0].duration, "00:00");
        assert_eq!(records[0].speakers, vec!["Unknown".to_string()]);

        store.set_topic("sess_a", "Weather").unwrap();
        let records = store.list_records().unwrap();
        assert_eq!(records[0].topic, "Weather");

        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn segments_are_ordered_and_derive_record_fields() {
        let (store, path) = temp_store();
        store.create_record("sess_b", Utc::now()).unwrap();

        // Inserted out of order on purpose.
        store.append_segment(&segment("sess_b", 70.0, 75.5, "later", "Ada Lovelace")).unwrap();
        store.append_segment(&segment("sess_b", 0.0, 4.2, "first", "Grace Hopper")).unwrap();

        let rows = store.segments_for_record("sess_b").unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].text, "first");
        assert_eq!(rows[1].text, "later");

        let records = store.list_records().unwrap();
        assert_eq!(records[0].duration, "01:15");
        assert_eq!(records[0].speakers.len(), 2);

        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn user_roundtrip_and_missing_lookup() {
        let (store, path) = temp_store();

        let id = store.insert_user("Ada", "Lovelace").unwrap();
        let user = store.find_user(id).unwrap().unwrap();
        assert_eq!(user.name, "Ada");
        assert_eq!(user.surname, "Lovelace");

        assert!(store.find_user(id + 1).unwrap().is_none());
        assert_eq!(store.list_users().unwrap().len(), 1);

        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn duration_formatting() {
        assert_eq!(format_duration(0.0), "00:00");
        assert_eq!(format_duration(59.9), "00:59");
        assert_eq!(format_duration(75.5), "01:15");
        assert_eq!(format_duration(-3.0), "00:00");
    }
}
