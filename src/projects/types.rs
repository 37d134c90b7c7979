use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Contents of a project's metadata file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectMetadata {
    pub id: String,
    pub name: String,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

/// A file stored inside a project
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectFile {
    pub name: String,
    /// Relative to the project directory, `/`-separated
    pub path: String,
    pub size: u64,
}

/// Metadata plus the project's file listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectDetails {
    #[serde(flatten)]
    pub metadata: ProjectMetadata,
    pub files: Vec<ProjectFile>,
}

/// A file supplied when creating a project
#[derive(Debug, Clone)]
pub struct FileUpload {
    pub name: String,
    pub content: Vec<u8>,
}

impl FileUpload {
    pub fn new(name: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }
}

/// One entry of a project's history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitInfo {
    pub hash: String,
    pub author: String,
    pub date: DateTime<Utc>,
    pub message: String,
}
