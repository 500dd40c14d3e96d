use crate::model::{ContainerRun, ContainerStatus};
use fabric_common::model::{Image, ImageStatus};
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
            "CREATE TABLE IF NOT EXISTS image (
                image_tag TEXT PRIMARY KEY,
                image_id TEXT,
                status TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS container_run (
                subtask_uid TEXT PRIMARY KEY,
                image_tag TEXT NOT NULL,
                status TEXT NOT NULL
            );",
        )?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn upsert_image(&self, image: &Image) -> rusqlite::Result<()> {
        self.conn.lock().execute(
            "INSERT INTO image (image_tag, image_id, status) VALUES (?1, ?2, ?3)
             ON CONFLICT(image_tag) DO UPDATE SET image_id = excluded.image_id, status = excluded.status",
            params![image.image_tag, image.image_id, image.status.as_str()],
        )?;
        Ok(())
    }

    pub fn get_image(&self, image_tag: &str) -> rusqlite::Result<Option<Image>> {
        self.conn
            .lock()
            .query_row(
                "SELECT image_tag, image_id, status FROM image WHERE image_tag = ?1",
                params![image_tag],
                Self::map_image,
            )
            .optional()
    }

    fn map_image(row: &rusqlite::Row) -> rusqlite::Result<Image> {
        let status: String = row.get(2)?;
        Ok(Image {
            image_tag: row.get(0)?,
            image_id: row.get(1)?,
            status: ImageStatus::from_str(&status).map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, e.into())
            })?,
        })
    }

    pub fn upsert_container_run(&self, run: &ContainerRun) -> rusqlite::Result<()> {
        self.conn.lock().execute(
            "INSERT INTO container_run (subtask_uid, image_tag, status) VALUES (?1, ?2, ?3)
             ON CONFLICT(subtask_uid) DO UPDATE SET image_tag = excluded.image_tag, status = excluded.status",
            params![run.subtask_uid.to_string(), run.image_tag, run.status.as_str()],
        )?;
        Ok(())
    }

    pub fn get_container_run(&self, subtask_uid: Uuid) -> rusqlite::Result<Option<ContainerRun>> {
        self.conn
            .lock()
            .query_row(
                "SELECT subtask_uid, image_tag, status FROM container_run WHERE subtask_uid = ?1",
                params![subtask_uid.to_string()],
                Self::map_run,
            )
            .optional()
    }

    fn map_run(row: &rusqlite::Row) -> rusqlite::Result<ContainerRun> {
        let subtask_uid: String = row.get(0)?;
        let status: String = row.get(2)?;
        Ok(ContainerRun {
            subtask_uid: Uuid::parse_str(&subtask_uid).map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, e.into())
            })?,
            image_tag: row.get(1)?,
            status: ContainerStatus::from_str(&status).map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, e.into())
            })?,
        })
    }
}
