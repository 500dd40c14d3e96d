use chrono::{DateTime, Utc};
use fabric_common::model::{ExecutorSubtask, ExecutorSubtaskStatus};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::str::FromStr;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Clone)]
pub struct Storage {
    conn: Arc<Mutex<Connection>>,
}

impl Storage {
    pub fn new(conn: Connection) -> rusqlite::Result<Self> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS subtask (
                subtask_uid TEXT PRIMARY KEY,
                creator_uid TEXT NOT NULL,
                dataset_uid TEXT,
                status TEXT NOT NULL,
                created_at TEXT,
                finished_at TEXT
            );",
        )?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn upsert(&self, subtask: &ExecutorSubtask) -> rusqlite::Result<()> {
        self.conn.lock().execute(
            "INSERT INTO subtask (subtask_uid, creator_uid, dataset_uid, status, created_at, finished_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(subtask_uid) DO UPDATE SET creator_uid = excluded.creator_uid,
                 dataset_uid = excluded.dataset_uid, status = excluded.status,
                 created_at = excluded.created_at, finished_at = excluded.finished_at",
            params![
                subtask.subtask_uid.to_string(),
                subtask.creator_uid.to_string(),
                subtask.dataset_uid.map(|u| u.to_string()),
                subtask.status.as_str(),
                subtask.created_at.map(|t| t.to_rfc3339()),
                subtask.finished_at.map(|t| t.to_rfc3339()),
            ],
        )?;
        Ok(())
    }

    pub fn get(&self, subtask_uid: Uuid) -> rusqlite::Result<Option<ExecutorSubtask>> {
        self.conn
            .lock()
            .query_row(
                "SELECT subtask_uid, creator_uid, dataset_uid, status, created_at, finished_at
                 FROM subtask WHERE subtask_uid = ?1",
                params![subtask_uid.to_string()],
                Self::map_row,
            )
            .optional()
    }

    pub fn all(&self) -> rusqlite::Result<Vec<ExecutorSubtask>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT subtask_uid, creator_uid, dataset_uid, status, created_at, finished_at FROM subtask",
        )?;
        let rows = stmt.query_map([], Self::map_row)?;
        rows.collect()
    }

    fn map_row(row: &rusqlite::Row) -> rusqlite::Result<ExecutorSubtask> {
        let subtask_uid: String = row.get(0)?;
        let creator_uid: String = row.get(1)?;
        let dataset_uid: Option<String> = row.get(2)?;
        let status: String = row.get(3)?;
        let created_at: Option<String> = row.get(4)?;
        let finished_at: Option<String> = row.get(5)?;
        Ok(ExecutorSubtask {
            subtask_uid: Uuid::parse_str(&subtask_uid)
                .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, e.into()))?,
            creator_uid: Uuid::parse_str(&creator_uid)
                .map_err(|e| rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, e.into()))?,
            dataset_uid: dataset_uid
                .map(|s| Uuid::parse_str(&s))
                .transpose()
                .map_err(|e| rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, e.into()))?,
            status: ExecutorSubtaskStatus::from_str(&status)
                .map_err(|e| rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, e.into()))?,
            created_at: parse_optional_rfc3339(created_at)?,
            finished_at: parse_optional_rfc3339(finished_at)?,
        })
    }
}

fn parse_optional_rfc3339(value: Option<String>) -> rusqlite::Result<Option<DateTime<Utc>>> {
    value
        .map(|s| {
            DateTime::parse_from_rfc3339(&s)
                .map(|t| t.with_timezone(&Utc))
                .map_err(|e| rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, e.into()))
        })
        .transpose()
}
