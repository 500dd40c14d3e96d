use chrono::{DateTime, Utc};
use fabric_common::model::{Node, NodeRole, NodeStatus};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::net::Ipv4Addr;
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
            "CREATE TABLE IF NOT EXISTS node (
                node_uid TEXT PRIMARY KEY,
                ipv4_address TEXT NOT NULL,
                port INTEGER NOT NULL,
                role TEXT NOT NULL,
                status TEXT NOT NULL,
                last_ping TEXT NOT NULL
            );",
        )?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn upsert(&self, node: &Node) -> rusqlite::Result<()> {
        self.conn.lock().execute(
            "INSERT INTO node (node_uid, ipv4_address, port, role, status, last_ping)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(node_uid) DO UPDATE SET ipv4_address = excluded.ipv4_address,
                 port = excluded.port, role = excluded.role, status = excluded.status,
                 last_ping = excluded.last_ping",
            params![
                node.node_uid.to_string(),
                node.ipv4_address.to_string(),
                node.port,
                node.role.as_str(),
                node.status.as_str(),
                node.last_ping.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn get(&self, node_uid: Uuid) -> rusqlite::Result<Option<Node>> {
        self.conn
            .lock()
            .query_row(
                "SELECT node_uid, ipv4_address, port, role, status, last_ping FROM node WHERE node_uid = ?1",
                params![node_uid.to_string()],
                Self::map_row,
            )
            .optional()
    }

    pub fn remove(&self, node_uid: Uuid) -> rusqlite::Result<()> {
        self.conn
            .lock()
            .execute("DELETE FROM node WHERE node_uid = ?1", params![node_uid.to_string()])?;
        Ok(())
    }

    pub fn all(&self) -> rusqlite::Result<Vec<Node>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT node_uid, ipv4_address, port, role, status, last_ping FROM node")?;
        let rows = stmt.query_map([], Self::map_row)?;
        rows.collect()
    }

    pub fn active(&self) -> rusqlite::Result<Vec<Node>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT node_uid, ipv4_address, port, role, status, last_ping FROM node WHERE status = ?1",
        )?;
        let rows = stmt.query_map(params![NodeStatus::Active.as_str()], Self::map_row)?;
        rows.collect()
    }

    fn map_row(row: &rusqlite::Row) -> rusqlite::Result<Node> {
        let node_uid: String = row.get(0)?;
        let ipv4_address: String = row.get(1)?;
        let role: String = row.get(3)?;
        let status: String = row.get(4)?;
        let last_ping: String = row.get(5)?;
        Ok(Node {
            node_uid: Uuid::parse_str(&node_uid)
                .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, e.into()))?,
            ipv4_address: Ipv4Addr::from_str(&ipv4_address)
                .map_err(|e| rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, e.into()))?,
            port: row.get(2)?,
            role: NodeRole::from_str(&role)
                .map_err(|e| rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, e.into()))?,
            status: NodeStatus::from_str(&status)
                .map_err(|e| rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, e.into()))?,
            last_ping: DateTime::parse_from_rfc3339(&last_ping)
                .map_err(|e| rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, e.into()))?
                .with_timezone(&Utc),
        })
    }
}
