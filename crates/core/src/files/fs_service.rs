//! Filesystem-backed file service with a SQLite index.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use tokio::fs;
use tracing::{debug, info};
use uuid::Uuid;

use super::service::{validate_file_name, FileError, FileService};
use super::types::{FileType, ProvisionedFile};

/// Stores file contents under `<root>/<server_id>/<file_type>/<name>` and
/// indexes them in SQLite.
pub struct FsFileService {
    root: PathBuf,
    conn: Mutex<Connection>,
}

impl FsFileService {
    /// Open the index at `db_path`, creating the table if needed.
    pub fn new(root: impl Into<PathBuf>, db_path: &Path) -> Result<Self, FileError> {
        let conn = Connection::open(db_path)?;
        Self::with_connection(root.into(), conn)
    }

    /// Use an in-memory index (useful for testing).
    pub fn in_memory(root: impl Into<PathBuf>) -> Result<Self, FileError> {
        let conn = Connection::open_in_memory()?;
        Self::with_connection(root.into(), conn)
    }

    fn with_connection(root: PathBuf, conn: Connection) -> Result<Self, FileError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS files (
                id TEXT PRIMARY KEY,
                server_id TEXT NOT NULL,
                file_type TEXT NOT NULL,
                name TEXT NOT NULL,
                size_bytes INTEGER NOT NULL,
                path TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_files_server ON files(server_id);
            "#,
        )?;
        Ok(Self {
            root,
            conn: Mutex::new(conn),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn server_dir(&self, server_id: Uuid) -> PathBuf {
        self.root.join(server_id.to_string())
    }

    fn decode(
        id: String,
        server_id: String,
        file_type: String,
        name: String,
        size_bytes: i64,
        path: String,
        created_at: String,
    ) -> Result<ProvisionedFile, FileError> {
        let corrupt = |reason: String| FileError::Corrupt {
            id: id.clone(),
            reason,
        };
        Ok(ProvisionedFile {
            id: Uuid::parse_str(&id).map_err(|e| corrupt(format!("bad id: {}", e)))?,
            server_id: Uuid::parse_str(&server_id)
                .map_err(|e| corrupt(format!("bad server_id: {}", e)))?,
            file_type: file_type.parse().map_err(corrupt)?,
            name,
            size_bytes: u64::try_from(size_bytes)
                .map_err(|_| corrupt(format!("negative size {}", size_bytes)))?,
            path: PathBuf::from(path),
            created_at: DateTime::parse_from_rfc3339(&created_at)
                .map(|t| t.with_timezone(&Utc))
                .map_err(|e| corrupt(format!("bad created_at: {}", e)))?,
        })
    }
}

#[async_trait]
impl FileService for FsFileService {
    async fn list_for_server(&self, server_id: Uuid) -> Result<Vec<ProvisionedFile>, FileError> {
        let rows = {
            let conn = self.conn();
            let mut stmt = conn.prepare(
                "SELECT id, server_id, file_type, name, size_bytes, path, created_at
                 FROM files WHERE server_id = ?1 ORDER BY created_at ASC, name ASC",
            )?;
            let rows = stmt
                .query_map(params![server_id.to_string()], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, i64>(4)?,
                        row.get::<_, String>(5)?,
                        row.get::<_, String>(6)?,
                    ))
                })?
                .collect::<Result<Vec<_>, _>>()?;
            rows
        };

        rows.into_iter()
            .map(|(id, server_id, file_type, name, size, path, created_at)| {
                Self::decode(id, server_id, file_type, name, size, path, created_at)
            })
            .collect()
    }

    async fn add_file(
        &self,
        server_id: Uuid,
        file_type: FileType,
        name: &str,
        bytes: &[u8],
    ) -> Result<ProvisionedFile, FileError> {
        validate_file_name(name)?;

        let dir = self.server_dir(server_id).join(file_type.as_str());
        fs::create_dir_all(&dir).await?;
        let path = dir.join(name);
        fs::write(&path, bytes).await?;

        let file = ProvisionedFile {
            id: Uuid::new_v4(),
            server_id,
            file_type,
            name: name.to_string(),
            size_bytes: bytes.len() as u64,
            path,
            created_at: Utc::now(),
        };

        {
            let mut conn = self.conn();
            let tx = conn.transaction()?;
            tx.execute(
                "DELETE FROM files WHERE server_id = ?1 AND file_type = ?2 AND name = ?3",
                params![server_id.to_string(), file_type.as_str(), name],
            )?;
            tx.execute(
                "INSERT INTO files (id, server_id, file_type, name, size_bytes, path, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    file.id.to_string(),
                    server_id.to_string(),
                    file_type.as_str(),
                    file.name,
                    file.size_bytes as i64,
                    file.path.to_string_lossy(),
                    file.created_at.to_rfc3339(),
                ],
            )?;
            tx.commit()?;
        }

        debug!(
            server_id = %server_id,
            file_type = %file_type,
            name = %file.name,
            size = file.size_bytes,
            "stored file"
        );
        Ok(file)
    }

    async fn delete_for_server(&self, server_id: Uuid) -> Result<usize, FileError> {
        match fs::remove_dir_all(self.server_dir(server_id)).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(FileError::Io(e)),
        }

        let removed = self.conn().execute(
            "DELETE FROM files WHERE server_id = ?1",
            params![server_id.to_string()],
        )?;
        if removed > 0 {
            info!(server_id = %server_id, removed, "purged server files");
        }
        Ok(removed)
    }
}
