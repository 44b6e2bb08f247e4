//! Provisioned file types.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of a file uploaded for a server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileType {
    Configuration,
    DataTable,
    GraphData,
    SolutionArchive,
    /// Zip archive unpacked into the container's source directory.
    SourceArchive,
}

impl FileType {
    pub const ALL: [FileType; 5] = [
        FileType::Configuration,
        FileType::DataTable,
        FileType::GraphData,
        FileType::SolutionArchive,
        FileType::SourceArchive,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FileType::Configuration => "configuration",
            FileType::DataTable => "data_table",
            FileType::GraphData => "graph_data",
            FileType::SolutionArchive => "solution_archive",
            FileType::SourceArchive => "source_archive",
        }
    }

    /// Whether the file is unpacked after being copied into the container.
    pub fn is_unpacked(&self) -> bool {
        matches!(self, FileType::SourceArchive)
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FileType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        FileType::ALL
            .into_iter()
            .find(|t| t.as_str() == normalized)
            .ok_or_else(|| format!("unknown file type: {}", s))
    }
}

/// A file stored for a server and copied into its container on start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisionedFile {
    pub id: Uuid,
    pub server_id: Uuid,
    pub file_type: FileType,
    /// Original file name, also the name inside the container.
    pub name: String,
    pub size_bytes: u64,
    /// Location on the orchestrator host.
    pub path: PathBuf,
    pub created_at: DateTime<Utc>,
}
