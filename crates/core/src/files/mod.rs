//! Files provisioned into server containers.
//!
//! Uploaded files are kept on the orchestrator host and copied into a
//! server's container every time it starts.

mod fs_service;
mod service;
mod types;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub use fs_service::FsFileService;
pub use service::{validate_file_name, FileError, FileService};
pub use types::{FileType, ProvisionedFile};

/// Configuration for file storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilesConfig {
    /// Directory holding uploaded files.
    #[serde(default = "default_root")]
    pub root: PathBuf,
}

fn default_root() -> PathBuf {
    PathBuf::from("data/files")
}

impl Default for FilesConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
        }
    }
}
