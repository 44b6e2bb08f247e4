//! SQLite-backed server store implementation.

use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::{ServerInstance, ServerStatus, ServerStore, StoreError};
use crate::config::ServerConfig;

const SERVER_COLUMNS: &str = "id, name, room_password, avatar_seed, avatar_color, container_address, container_port, container_name, status, start_time, stop_time, created_at";

/// SQLite-backed server store.
pub struct SqliteServerStore {
    conn: Mutex<Connection>,
}

/// Row as read from SQLite, before decoding typed columns.
struct ServerRow {
    id: String,
    name: String,
    room_password: String,
    avatar_seed: String,
    avatar_color: String,
    container_address: String,
    container_port: Option<u16>,
    container_name: Option<String>,
    status: String,
    start_time: Option<String>,
    stop_time: Option<String>,
    created_at: String,
}

impl SqliteServerStore {
    /// Create a new SQLite server store, creating the database file and tables if needed.
    pub fn new(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory SQLite server store (useful for testing).
    pub fn in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), StoreError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS servers (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                room_password TEXT NOT NULL,
                avatar_seed TEXT NOT NULL DEFAULT '',
                avatar_color TEXT NOT NULL DEFAULT '',
                container_address TEXT NOT NULL,
                container_port INTEGER,
                container_name TEXT,
                status TEXT NOT NULL,
                start_time TEXT,
                stop_time TEXT,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_servers_container_port ON servers(container_port);

            CREATE TABLE IF NOT EXISTS server_config (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                min_container_port INTEGER NOT NULL,
                max_container_port INTEGER NOT NULL,
                external_address TEXT NOT NULL
            );
            "#,
        )?;
        Ok(())
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn read_row(row: &rusqlite::Row) -> rusqlite::Result<ServerRow> {
        Ok(ServerRow {
            id: row.get(0)?,
            name: row.get(1)?,
            room_password: row.get(2)?,
            avatar_seed: row.get(3)?,
            avatar_color: row.get(4)?,
            container_address: row.get(5)?,
            container_port: row.get(6)?,
            container_name: row.get(7)?,
            status: row.get(8)?,
            start_time: row.get(9)?,
            stop_time: row.get(10)?,
            created_at: row.get(11)?,
        })
    }
}

impl ServerRow {
    fn decode(self) -> Result<ServerInstance, StoreError> {
        let corrupt = |reason: String| StoreError::Corrupt {
            id: self.id.clone(),
            reason,
        };

        let id = Uuid::parse_str(&self.id).map_err(|e| corrupt(format!("bad id: {}", e)))?;
        let status: ServerStatus = self.status.parse().map_err(corrupt)?;
        let start_time = parse_optional_time(self.start_time.as_deref())
            .map_err(|e| corrupt(format!("bad start_time: {}", e)))?;
        let stop_time = parse_optional_time(self.stop_time.as_deref())
            .map_err(|e| corrupt(format!("bad stop_time: {}", e)))?;
        let created_at = parse_time(&self.created_at)
            .map_err(|e| corrupt(format!("bad created_at: {}", e)))?;

        Ok(ServerInstance {
            id,
            name: self.name,
            room_password: self.room_password,
            avatar_seed: self.avatar_seed,
            avatar_color: self.avatar_color,
            container_address: self.container_address,
            container_port: self.container_port,
            container_name: self.container_name,
            status,
            start_time,
            stop_time,
            created_at,
        })
    }
}

fn parse_time(value: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(value).map(|dt| dt.with_timezone(&Utc))
}

fn parse_optional_time(value: Option<&str>) -> Result<Option<DateTime<Utc>>, chrono::ParseError> {
    value.map(parse_time).transpose()
}

impl ServerStore for SqliteServerStore {
    fn get(&self, id: &Uuid) -> Result<Option<ServerInstance>, StoreError> {
        let conn = self.conn();
        let row = conn
            .query_row(
                &format!("SELECT {} FROM servers WHERE id = ?", SERVER_COLUMNS),
                params![id.to_string()],
                Self::read_row,
            )
            .optional()?;
        row.map(ServerRow::decode).transpose()
    }

    fn list(&self) -> Result<Vec<ServerInstance>, StoreError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM servers ORDER BY created_at ASC",
            SERVER_COLUMNS
        ))?;

        let rows = stmt.query_map([], Self::read_row)?;

        let mut servers = Vec::new();
        for row_result in rows {
            servers.push(row_result?.decode()?);
        }
        Ok(servers)
    }

    fn save(&self, server: &ServerInstance) -> Result<(), StoreError> {
        let conn = self.conn();
        conn.execute(
            &format!(
                "INSERT OR REPLACE INTO servers ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                SERVER_COLUMNS
            ),
            params![
                server.id.to_string(),
                server.name,
                server.room_password,
                server.avatar_seed,
                server.avatar_color,
                server.container_address,
                server.container_port,
                server.container_name,
                server.status.as_str(),
                server.start_time.map(|t| t.to_rfc3339()),
                server.stop_time.map(|t| t.to_rfc3339()),
                server.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn delete(&self, id: &Uuid) -> Result<bool, StoreError> {
        let conn = self.conn();
        let affected = conn.execute("DELETE FROM servers WHERE id = ?", params![id.to_string()])?;
        Ok(affected > 0)
    }

    fn find_by_container_port(&self, port: u16) -> Result<Option<ServerInstance>, StoreError> {
        let conn = self.conn();
        let row = conn
            .query_row(
                &format!(
                    "SELECT {} FROM servers WHERE container_port = ? LIMIT 1",
                    SERVER_COLUMNS
                ),
                params![port],
                Self::read_row,
            )
            .optional()?;
        row.map(ServerRow::decode).transpose()
    }

    fn server_config(&self) -> Result<Option<ServerConfig>, StoreError> {
        let conn = self.conn();
        let config = conn
            .query_row(
                "SELECT min_container_port, max_container_port, external_address FROM server_config WHERE id = 1",
                [],
                |row| {
                    Ok(ServerConfig {
                        min_container_port: row.get(0)?,
                        max_container_port: row.get(1)?,
                        external_address: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(config)
    }

    fn save_server_config(&self, config: &ServerConfig) -> Result<(), StoreError> {
        let conn = self.conn();
        conn.execute(
            "INSERT OR REPLACE INTO server_config (id, min_container_port, max_container_port, external_address) VALUES (1, ?, ?, ?)",
            params![
                config.min_container_port,
                config.max_container_port,
                config.external_address,
            ],
        )?;
        Ok(())
    }
}
