use crate::app_dirs::AppDirs;
use crate::session::MismatchPolicy;
use chrono::{DateTime, Local};
use rusqlite::{params, Connection, Result};
use std::path::PathBuf;

/// One finished lesson attempt.
#[derive(Debug, Clone)]
pub struct LessonRecord {
    pub module: String,
    pub lesson: String,
    pub wpm: f64,
    pub accuracy: f64,
    pub errors: u32,
    pub policy: MismatchPolicy,
    pub timestamp: DateTime<Local>,
}

/// Database manager for lesson history
#[derive(Debug)]
pub struct HistoryDb {
    conn: Connection,
}

impl HistoryDb {
    /// Initialize the database connection and create tables if needed
    pub fn new() -> Result<Self> {
        let db_path = AppDirs::db_path().unwrap_or_else(|| PathBuf::from("keydrill_history.db"));

        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                rusqlite::Error::SqliteFailure(
                    rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_CANTOPEN),
                    Some(format!("Failed to create directory: {}", e)),
                )
            })?;
        }

        let conn = Connection::open(&db_path)?;
        Self::with_connection(conn)
    }

    /// In-memory database for tests.
    pub fn in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS lesson_history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                module TEXT NOT NULL,
                lesson TEXT NOT NULL,
                wpm REAL NOT NULL,
                accuracy REAL NOT NULL,
                errors INTEGER NOT NULL,
                policy TEXT NOT NULL,
                timestamp TEXT NOT NULL,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )
            "#,
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_lesson_history_timestamp ON lesson_history(timestamp)",
            [],
        )?;

        Ok(HistoryDb { conn })
    }

    /// Record one finished lesson attempt
    pub fn record_lesson(&self, record: &LessonRecord) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO lesson_history
            (module, lesson, wpm, accuracy, errors, policy, timestamp)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                record.module,
                record.lesson,
                record.wpm,
                record.accuracy,
                record.errors,
                record.policy.to_string(),
                record.timestamp.to_rfc3339(),
            ],
        )?;

        Ok(())
    }

    /// Average WPM over the most recent attempts; `None` with no history.
    /// Used to pick the level for the next plan request.
    pub fn recent_average_wpm(&self, limit: u32) -> Result<Option<f64>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT AVG(wpm) FROM (
                SELECT wpm FROM lesson_history
                ORDER BY timestamp DESC
                LIMIT ?1
            )
            "#,
        )?;

        let avg: Option<f64> = stmt.query_row([limit], |row| row.get(0))?;
        Ok(avg)
    }

    /// All attempts, oldest first.
    pub fn all_records(&self) -> Result<Vec<LessonRecord>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT module, lesson, wpm, accuracy, errors, policy, timestamp
            FROM lesson_history
            ORDER BY timestamp ASC
            "#,
        )?;

        let record_iter = stmt.query_map([], |row| {
            let timestamp_str: String = row.get(6)?;
            let timestamp = DateTime::parse_from_rfc3339(&timestamp_str)
                .map_err(|_| {
                    rusqlite::Error::InvalidColumnType(
                        6,
                        "timestamp".to_string(),
                        rusqlite::types::Type::Text,
                    )
                })?
                .with_timezone(&Local);

            let policy: String = row.get(5)?;
            let policy = if policy == "advance" {
                MismatchPolicy::Advance
            } else {
                MismatchPolicy::Block
            };

            Ok(LessonRecord {
                module: row.get(0)?,
                lesson: row.get(1)?,
                wpm: row.get(2)?,
                accuracy: row.get(3)?,
                errors: row.get(4)?,
                policy,
                timestamp,
            })
        })?;

        let mut records = Vec::new();
        for record in record_iter {
            records.push(record?);
        }

        Ok(records)
    }

    /// Clear all history (for testing or reset purposes)
    pub fn clear(&self) -> Result<()> {
        self.conn.execute("DELETE FROM lesson_history", [])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(lesson: &str, wpm: f64, minute: u32) -> LessonRecord {
        LessonRecord {
            module: "home row".to_string(),
            lesson: lesson.to_string(),
            wpm,
            accuracy: 96.0,
            errors: 2,
            policy: MismatchPolicy::Block,
            timestamp: Local.with_ymd_and_hms(2025, 6, 1, 12, minute, 0).unwrap(),
        }
    }

    #[test]
    fn record_and_retrieve_lesson() {
        let db = HistoryDb::in_memory().unwrap();
        db.record_lesson(&record("asdf", 22.0, 0)).unwrap();

        let records = db.all_records().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].lesson, "asdf");
        assert_eq!(records[0].wpm, 22.0);
        assert_eq!(records[0].policy, MismatchPolicy::Block);
    }

    #[test]
    fn policy_round_trips_through_text() {
        let db = HistoryDb::in_memory().unwrap();
        let mut advanced = record("jkl;", 40.0, 1);
        advanced.policy = MismatchPolicy::Advance;
        db.record_lesson(&advanced).unwrap();

        let records = db.all_records().unwrap();
        assert_eq!(records[0].policy, MismatchPolicy::Advance);
    }

    #[test]
    fn recent_average_is_none_with_no_history() {
        let db = HistoryDb::in_memory().unwrap();
        assert_eq!(db.recent_average_wpm(10).unwrap(), None);
    }

    #[test]
    fn recent_average_respects_limit() {
        let db = HistoryDb::in_memory().unwrap();
        db.record_lesson(&record("one", 10.0, 0)).unwrap();
        db.record_lesson(&record("two", 20.0, 1)).unwrap();
        db.record_lesson(&record("three", 40.0, 2)).unwrap();

        // only the two most recent attempts count
        let avg = db.recent_average_wpm(2).unwrap().unwrap();
        assert_eq!(avg, 30.0);
    }

    #[test]
    fn all_records_come_back_oldest_first() {
        let db = HistoryDb::in_memory().unwrap();
        db.record_lesson(&record("later", 20.0, 5)).unwrap();
        db.record_lesson(&record("earlier", 10.0, 1)).unwrap();

        let records = db.all_records().unwrap();
        assert_eq!(records[0].lesson, "earlier");
        assert_eq!(records[1].lesson, "later");
    }

    #[test]
    fn clear_removes_everything() {
        let db = HistoryDb::in_memory().unwrap();
        db.record_lesson(&record("asdf", 22.0, 0)).unwrap();
        db.clear().unwrap();
        assert!(db.all_records().unwrap().is_empty());
    }
}
