use fabric_common::model::{Dataset, DatasetStatus};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::PathBuf;
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
            "CREATE TABLE IF NOT EXISTS dataset (
                dataset_uid TEXT PRIMARY KEY,
                magnet_link TEXT,
                path TEXT NOT NULL,
                status TEXT NOT NULL
            );",
        )?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn upsert(&self, dataset: &Dataset) -> rusqlite::Result<()> {
        self.conn.lock().execute(
            "INSERT INTO dataset (dataset_uid, magnet_link, path, status) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(dataset_uid) DO UPDATE SET magnet_link = excluded.magnet_link,
                 path = excluded.path, status = excluded.status",
            params![
                dataset.dataset_uid.to_string(),
                dataset.magnet_link,
                dataset.path.to_string_lossy(),
                dataset.status.as_str(),
            ],
        )?;
        Ok(())
    }

    pub fn get(&self, dataset_uid: Uuid) -> rusqlite::Result<Option<Dataset>> {
        self.conn
            .lock()
            .query_row(
                "SELECT dataset_uid, magnet_link, path, status FROM dataset WHERE dataset_uid = ?1",
                params![dataset_uid.to_string()],
                Self::map_row,
            )
            .optional()
    }

    fn map_row(row: &rusqlite::Row) -> rusqlite::Result<Dataset> {
        let dataset_uid: String = row.get(0)?;
        let path: String = row.get(2)?;
        let status: String = row.get(3)?;
        Ok(Dataset {
            dataset_uid: Uuid::parse_str(&dataset_uid).map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, e.into())
            })?,
            magnet_link: row.get(1)?,
            path: PathBuf::from(path),
            status: DatasetStatus::from_str(&status).map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, e.into())
            })?,
        })
    }
}
