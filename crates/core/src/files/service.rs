//! File service trait and errors.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use super::types::{FileType, ProvisionedFile};

/// Errors from the file service.
#[derive(Debug, Error)]
pub enum FileError {
    /// The file name is empty or would escape the server directory.
    #[error("Invalid file name: {name:?}")]
    InvalidName { name: String },

    /// Database error.
    #[error("Database error: {0}")]
    Database(String),

    /// A stored row could not be decoded.
    #[error("Corrupt file record {id}: {reason}")]
    Corrupt { id: String, reason: String },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<rusqlite::Error> for FileError {
    fn from(e: rusqlite::Error) -> Self {
        FileError::Database(e.to_string())
    }
}

/// Storage for files provisioned into server containers.
#[async_trait]
pub trait FileService: Send + Sync {
    /// Files of a server, oldest first.
    async fn list_for_server(&self, server_id: Uuid) -> Result<Vec<ProvisionedFile>, FileError>;

    /// Store a file. Replaces an earlier file with the same type and name.
    async fn add_file(
        &self,
        server_id: Uuid,
        file_type: FileType,
        name: &str,
        bytes: &[u8],
    ) -> Result<ProvisionedFile, FileError>;

    /// Remove every file of a server. Returns the number removed.
    async fn delete_for_server(&self, server_id: Uuid) -> Result<usize, FileError>;
}

/// Checks that `name` is a plain file name.
pub fn validate_file_name(name: &str) -> Result<(), FileError> {
    let invalid = name.trim().is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\', '\0']);
    if invalid {
        return Err(FileError::InvalidName {
            name: name.to_string(),
        });
    }
    Ok(())
}
