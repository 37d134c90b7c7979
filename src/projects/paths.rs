use std::path::{Component, Path, PathBuf};

use crate::constants::PROJECT_METADATA_FILE;
use crate::utils::ProjectError;

/// Turn a user supplied path into a clean path relative to the project.
///
/// Only plain components survive; `.` is dropped and anything that could
/// leave the project directory is rejected. The metadata file and the git
/// directory are off limits.
pub fn relative_path(raw: &str) -> Result<PathBuf, ProjectError> {
    let raw = raw.trim();
    let mut clean = PathBuf::new();

    for component in Path::new(raw).components() {
        match component {
            Component::Normal(part) => clean.push(part),
            Component::CurDir => {},
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(ProjectError::InvalidPath(raw.to_string()));
            },
        }
    }

    if clean.as_os_str().is_empty() {
        return Err(ProjectError::InvalidPath(raw.to_string()));
    }

    if clean == Path::new(PROJECT_METADATA_FILE) || clean.starts_with(".git") {
        return Err(ProjectError::InvalidPath(format!("{} is reserved", raw)));
    }

    Ok(clean)
}

/// `/`-separated form used for git tree lookups and listings
pub fn tree_path(relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Project ids are single directory names
pub fn validate_id(id: &str) -> Result<(), ProjectError> {
    let trimmed = id.trim();
    if trimmed.is_empty()
        || trimmed.contains(|c: char| c == '/' || c == '\\')
        || trimmed == "."
        || trimmed == ".."
    {
        return Err(ProjectError::ProjectNotFound(id.to_string()));
    }
    Ok(())
}
