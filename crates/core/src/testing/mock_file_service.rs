//! Mock file service for testing.

use async_trait::async_trait;
use chrono::Utc;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::files::{validate_file_name, FileError, FileService, FileType, ProvisionedFile};

/// In-memory implementation of the FileService trait.
///
/// Files get a synthetic path under `/mock-files`; nothing touches disk.
#[derive(Debug)]
pub struct MockFileService {
    files: Arc<RwLock<Vec<ProvisionedFile>>>,
    /// Servers whose files were purged, in order.
    purged: Arc<RwLock<Vec<Uuid>>>,
    /// If set, the next operation will fail with this error.
    next_error: Arc<RwLock<Option<FileError>>>,
}

impl Default for MockFileService {
    fn default() -> Self {
        Self::new()
    }
}

impl MockFileService {
    pub fn new() -> Self {
        Self {
            files: Arc::new(RwLock::new(Vec::new())),
            purged: Arc::new(RwLock::new(Vec::new())),
            next_error: Arc::new(RwLock::new(None)),
        }
    }

    /// Every stored file.
    pub async fn all_files(&self) -> Vec<ProvisionedFile> {
        self.files.read().await.clone()
    }

    /// Servers passed to `delete_for_server`.
    pub async fn purged_servers(&self) -> Vec<Uuid> {
        self.purged.read().await.clone()
    }

    /// Configure the next operation to fail with the given error.
    pub async fn set_next_error(&self, error: FileError) {
        *self.next_error.write().await = Some(error);
    }

    async fn take_error(&self) -> Result<(), FileError> {
        match self.next_error.write().await.take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl FileService for MockFileService {
    async fn list_for_server(&self, server_id: Uuid) -> Result<Vec<ProvisionedFile>, FileError> {
        self.take_error().await?;
        Ok(self
            .files
            .read()
            .await
            .iter()
            .filter(|f| f.server_id == server_id)
            .cloned()
            .collect())
    }

    async fn add_file(
        &self,
        server_id: Uuid,
        file_type: FileType,
        name: &str,
        bytes: &[u8],
    ) -> Result<ProvisionedFile, FileError> {
        self.take_error().await?;
        validate_file_name(name)?;

        let file = ProvisionedFile {
            id: Uuid::new_v4(),
            server_id,
            file_type,
            name: name.to_string(),
            size_bytes: bytes.len() as u64,
            path: PathBuf::from("/mock-files")
                .join(server_id.to_string())
                .join(file_type.as_str())
                .join(name),
            created_at: Utc::now(),
        };

        let mut files = self.files.write().await;
        files.retain(|f| {
            !(f.server_id == server_id && f.file_type == file_type && f.name == name)
        });
        files.push(file.clone());
        Ok(file)
    }

    async fn delete_for_server(&self, server_id: Uuid) -> Result<usize, FileError> {
        self.take_error().await?;
        let mut files = self.files.write().await;
        let before = files.len();
        files.retain(|f| f.server_id != server_id);
        self.purged.write().await.push(server_id);
        Ok(before - files.len())
    }
}
