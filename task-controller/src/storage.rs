use chrono::{DateTime, Utc};
use fabric_common::model::{CreatorSubtask, CreatorSubtaskStatus, SubtaskType, Task, TaskStatus, TaskType};
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
            "CREATE TABLE IF NOT EXISTS task (
                task_uid TEXT PRIMARY KEY,
                task_type TEXT NOT NULL,
                creator_uid TEXT NOT NULL,
                status TEXT NOT NULL,
                dataset_uid TEXT,
                created_at TEXT,
                finished_at TEXT,
                params TEXT NOT NULL,
                result TEXT
            );
            CREATE TABLE IF NOT EXISTS creator_subtask (
                subtask_uid TEXT PRIMARY KEY,
                task_uid TEXT NOT NULL,
                subtask_type TEXT NOT NULL,
                executor_uid TEXT,
                status TEXT NOT NULL,
                created_at TEXT,
                finished_at TEXT,
                params TEXT NOT NULL,
                result TEXT
            );",
        )?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn upsert_task(&self, task: &Task) -> rusqlite::Result<()> {
        self.conn.lock().execute(
            "INSERT INTO task (task_uid, task_type, creator_uid, status, dataset_uid, created_at, finished_at, params, result)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT(task_uid) DO UPDATE SET task_type = excluded.task_type,
                 creator_uid = excluded.creator_uid, status = excluded.status,
                 dataset_uid = excluded.dataset_uid, created_at = excluded.created_at,
                 finished_at = excluded.finished_at, params = excluded.params, result = excluded.result",
            params![
                task.task_uid.to_string(),
                task.task_type.as_str(),
                task.creator_uid.to_string(),
                task.status.as_str(),
                task.dataset_uid.map(|u| u.to_string()),
                task.created_at.map(|t| t.to_rfc3339()),
                task.finished_at.map(|t| t.to_rfc3339()),
                serde_json::to_string(&task.params).expect("json serializes"),
                task.result.as_ref().map(|r| serde_json::to_string(r).expect("json serializes")),
            ],
        )?;
        Ok(())
    }

    pub fn get_task(&self, task_uid: Uuid) -> rusqlite::Result<Option<Task>> {
        let task = self
            .conn
            .lock()
            .query_row(
                "SELECT task_uid, task_type, creator_uid, status, dataset_uid, created_at, finished_at, params, result
                 FROM task WHERE task_uid = ?1",
                params![task_uid.to_string()],
                Self::map_task_row,
            )
            .optional()?;
        let Some(mut task) = task else { return Ok(None) };
        task.subtasks = self.creator_subtasks_for_task(task_uid)?;
        Ok(Some(task))
    }

    pub fn all_tasks(&self) -> rusqlite::Result<Vec<Task>> {
        let rows = {
            let conn = self.conn.lock();
            let mut stmt = conn.prepare(
                "SELECT task_uid, task_type, creator_uid, status, dataset_uid, created_at, finished_at, params, result
                 FROM task",
            )?;
            let rows = stmt.query_map([], Self::map_task_row)?;
            rows.collect::<rusqlite::Result<Vec<_>>>()?
        };
        rows.into_iter()
            .map(|mut t| {
                t.subtasks = self.creator_subtasks_for_task(t.task_uid)?;
                Ok(t)
            })
            .collect()
    }

    pub fn upsert_creator_subtask(&self, subtask: &CreatorSubtask) -> rusqlite::Result<()> {
        self.conn.lock().execute(
            "INSERT INTO creator_subtask (subtask_uid, task_uid, subtask_type, executor_uid, status, created_at, finished_at, params, result)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT(subtask_uid) DO UPDATE SET task_uid = excluded.task_uid,
                 subtask_type = excluded.subtask_type, executor_uid = excluded.executor_uid,
                 status = excluded.status, created_at = excluded.created_at,
                 finished_at = excluded.finished_at, params = excluded.params, result = excluded.result",
            params![
                subtask.subtask_uid.to_string(),
                subtask.task_uid.to_string(),
                subtask.subtask_type.as_str(),
                subtask.executor_uid.map(|u| u.to_string()),
                subtask.status.as_str(),
                subtask.created_at.map(|t| t.to_rfc3339()),
                subtask.finished_at.map(|t| t.to_rfc3339()),
                serde_json::to_string(&subtask.params).expect("json serializes"),
                subtask.result.as_ref().map(|r| serde_json::to_string(r).expect("json serializes")),
            ],
        )?;
        Ok(())
    }

    pub fn creator_subtasks_for_task(&self, task_uid: Uuid) -> rusqlite::Result<Vec<CreatorSubtask>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT subtask_uid, task_uid, subtask_type, executor_uid, status, created_at, finished_at, params, result
             FROM creator_subtask WHERE task_uid = ?1",
        )?;
        let rows = stmt.query_map(params![task_uid.to_string()], Self::map_creator_subtask_row)?;
        rows.collect()
    }

    fn map_task_row(row: &rusqlite::Row) -> rusqlite::Result<Task> {
        let task_uid: String = row.get(0)?;
        let task_type: String = row.get(1)?;
        let creator_uid: String = row.get(2)?;
        let status: String = row.get(3)?;
        let dataset_uid: Option<String> = row.get(4)?;
        let created_at: Option<String> = row.get(5)?;
        let finished_at: Option<String> = row.get(6)?;
        let params: String = row.get(7)?;
        let result: Option<String> = row.get(8)?;
        Ok(Task {
            task_uid: parse_uuid(&task_uid, 0)?,
            task_type: TaskType::from_str(&task_type)
                .map_err(|e| rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, e.into()))?,
            creator_uid: parse_uuid(&creator_uid, 2)?,
            status: TaskStatus::from_str(&status)
                .map_err(|e| rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, e.into()))?,
            dataset_uid: dataset_uid.map(|s| parse_uuid(&s, 4)).transpose()?,
            created_at: parse_optional_rfc3339(created_at, 5)?,
            finished_at: parse_optional_rfc3339(finished_at, 6)?,
            params: serde_json::from_str(&params)
                .map_err(|e| rusqlite::Error::FromSqlConversionFailure(7, rusqlite::types::Type::Text, e.into()))?,
            result: result
                .map(|r| serde_json::from_str(&r))
                .transpose()
                .map_err(|e| rusqlite::Error::FromSqlConversionFailure(8, rusqlite::types::Type::Text, e.into()))?,
            subtasks: Vec::new(),
        })
    }

    fn map_creator_subtask_row(row: &rusqlite::Row) -> rusqlite::Result<CreatorSubtask> {
        let subtask_uid: String = row.get(0)?;
        let task_uid: String = row.get(1)?;
        let subtask_type: String = row.get(2)?;
        let executor_uid: Option<String> = row.get(3)?;
        let status: String = row.get(4)?;
        let created_at: Option<String> = row.get(5)?;
        let finished_at: Option<String> = row.get(6)?;
        let params: String = row.get(7)?;
        let result: Option<String> = row.get(8)?;
        Ok(CreatorSubtask {
            subtask_uid: parse_uuid(&subtask_uid, 0)?,
            task_uid: parse_uuid(&task_uid, 1)?,
            subtask_type: SubtaskType::from_str(&subtask_type)
                .map_err(|e| rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, e.into()))?,
            executor_uid: executor_uid.map(|s| parse_uuid(&s, 3)).transpose()?,
            status: CreatorSubtaskStatus::from_str(&status)
                .map_err(|e| rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, e.into()))?,
            created_at: parse_optional_rfc3339(created_at, 5)?,
            finished_at: parse_optional_rfc3339(finished_at, 6)?,
            params: serde_json::from_str(&params)
                .map_err(|e| rusqlite::Error::FromSqlConversionFailure(7, rusqlite::types::Type::Text, e.into()))?,
            result: result
                .map(|r| serde_json::from_str(&r))
                .transpose()
                .map_err(|e| rusqlite::Error::FromSqlConversionFailure(8, rusqlite::types::Type::Text, e.into()))?,
        })
    }
}

fn parse_uuid(s: &str, col: usize) -> rusqlite::Result<Uuid> {
    Uuid::parse_str(s).map_err(|e| rusqlite::Error::FromSqlConversionFailure(col, rusqlite::types::Type::Text, e.into()))
}

fn parse_optional_rfc3339(value: Option<String>, col: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    value
        .map(|s| {
            DateTime::parse_from_rfc3339(&s)
                .map(|t| t.with_timezone(&Utc))
                .map_err(|e| rusqlite::Error::FromSqlConversionFailure(col, rusqlite::types::Type::Text, e.into()))
        })
        .transpose()
}
