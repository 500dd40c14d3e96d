use rusqlite::Connection;
use std::path::Path;

/// Opens (creating if needed) the service's SQLite file with the same
/// pragmas the teacher's `NodeStorage` uses: full mutex for a connection
/// shared behind `Arc<Mutex<_>>`, WAL for concurrent readers during a
/// writer's short transaction.
pub fn open(path: &Path) -> rusqlite::Result<Connection> {
    if let Some(parent) = path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    let flags = rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
        | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
        | rusqlite::OpenFlags::SQLITE_OPEN_FULL_MUTEX;
    let conn = Connection::open_with_flags(path, flags)?;
    conn.execute_batch("PRAGMA journal_mode = WAL; PRAGMA synchronous = NORMAL;")?;
    Ok(conn)
}

pub fn open_in_memory() -> rusqlite::Result<Connection> {
    Connection::open_in_memory()
}
