use chrono::Utc;
use std::fs;
use std::io::{Seek, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use uuid::Uuid;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use super::git;
use super::paths::{relative_path, tree_path, validate_id};
use super::types::{CommitInfo, FileUpload, ProjectDetails, ProjectFile, ProjectMetadata};
use crate::constants::PROJECT_METADATA_FILE;
use crate::utils::ProjectError;

type Result<T> = std::result::Result<T, ProjectError>;

/// Directory of projects, each one its own git repository
pub struct ProjectStore {
    root: PathBuf,
}

impl ProjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create a project with its initial files and commit them
    pub fn create(&self, name: &str, files: &[FileUpload]) -> Result<ProjectMetadata> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ProjectError::InvalidProject("Project name is required".to_string()));
        }

        // Validate every path before touching the disk
        let mut staged = Vec::with_capacity(files.len());
        for file in files {
            staged.push((relative_path(&file.name)?, file.content.as_slice()));
        }

        let now = Utc::now();
        let metadata = ProjectMetadata {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            created: now,
            updated: now,
        };

        let dir = self.root.join(&metadata.id);
        fs::create_dir_all(&dir)?;
        write_metadata(&dir, &metadata)?;

        for (relative, content) in staged {
            write_bytes(&dir.join(relative), content)?;
        }

        match git::init(&dir) {
            Ok(()) => auto_commit(&dir, "Initial commit"),
            Err(e) => warn!("Failed to initialize git repository for {}: {}", metadata.id, e),
        }

        info!("Created project '{}' ({})", metadata.name, metadata.id);
        Ok(metadata)
    }

    /// Every project with readable metadata, most recently updated first
    pub fn list(&self) -> Result<Vec<ProjectMetadata>> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }

        let mut projects = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let path = entry?.path();
            if !path.is_dir() {
                continue;
            }
            match read_metadata(&path) {
                Ok(metadata) => projects.push(metadata),
                Err(e) => debug!("Skipping {}: {}", path.display(), e),
            }
        }

        projects.sort_by(|a, b| b.updated.cmp(&a.updated));
        Ok(projects)
    }

    /// Metadata plus the list of files in the project
    pub fn show(&self, id: &str) -> Result<ProjectDetails> {
        let dir = self.project_dir(id)?;
        let metadata = read_metadata(&dir)?;

        let mut files = Vec::new();
        collect_files(&dir, &dir, &mut files)?;
        files.sort_by(|a, b| a.path.cmp(&b.path));

        Ok(ProjectDetails { metadata, files })
    }

    /// Current content of a project file
    pub fn read_file(&self, id: &str, path: &str) -> Result<String> {
        let dir = self.project_dir(id)?;
        let target = dir.join(relative_path(path)?);
        if !target.is_file() {
            return Err(ProjectError::FileNotFound(path.to_string()));
        }

        let bytes = fs::read(&target)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Replace a file's content and record the change
    pub fn write_file(&self, id: &str, path: &str, content: &str) -> Result<ProjectMetadata> {
        let dir = self.project_dir(id)?;
        let relative = relative_path(path)?;

        write_bytes(&dir.join(&relative), content.as_bytes())?;
        let metadata = touch(&dir)?;
        auto_commit(&dir, &format!("Update {}", tree_path(&relative)));

        Ok(metadata)
    }

    /// Store an uploaded file and record the addition
    pub fn upload_file(&self, id: &str, name: &str, content: &[u8]) -> Result<ProjectFile> {
        let dir = self.project_dir(id)?;
        let relative = relative_path(name)?;

        write_bytes(&dir.join(&relative), content)?;
        touch(&dir)?;

        let path = tree_path(&relative);
        auto_commit(&dir, &format!("Add {}", path));

        Ok(ProjectFile {
            name: file_name(&relative),
            path,
            size: content.len() as u64,
        })
    }

    /// Commit log of a project, newest first
    pub fn history(&self, id: &str) -> Result<Vec<CommitInfo>> {
        let dir = self.project_dir(id)?;
        Ok(git::history(&dir)?)
    }

    /// Content of a file as it was at a given commit
    pub fn file_at_version(&self, id: &str, hash: &str, path: &str) -> Result<String> {
        let dir = self.project_dir(id)?;
        let relative = relative_path(path)?;
        let bytes = git::file_at(&dir, hash.trim(), &tree_path(&relative))?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Write the project's files as a zip archive and return the archive's file name.
    ///
    /// Git data and the metadata file are left out.
    pub fn export_zip<W: Write + Seek>(&self, id: &str, writer: W) -> Result<String> {
        let dir = self.project_dir(id)?;
        let metadata = read_metadata(&dir)?;

        let mut files = Vec::new();
        collect_files(&dir, &dir, &mut files)?;
        files.sort_by(|a, b| a.path.cmp(&b.path));

        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        let mut archive = ZipWriter::new(writer);
        for file in &files {
            archive.start_file(file.path.as_str(), options)?;
            archive.write_all(&fs::read(dir.join(&file.path))?)?;
        }
        archive.finish()?;

        info!("Exported {} files from project {}", files.len(), metadata.id);
        Ok(archive_name(&metadata.name))
    }

    fn project_dir(&self, id: &str) -> Result<PathBuf> {
        validate_id(id)?;
        let dir = self.root.join(id.trim());
        if !dir.join(PROJECT_METADATA_FILE).is_file() {
            return Err(ProjectError::ProjectNotFound(id.to_string()));
        }
        Ok(dir)
    }
}

/// Commit failures never fail the write that triggered them
fn auto_commit(dir: &Path, message: &str) {
    match git::commit_all(dir, message) {
        Ok(oid) => debug!("Committed {} as {}", message, oid),
        Err(e) => warn!("Auto-commit '{}' failed in {}: {}", message, dir.display(), e),
    }
}

/// `My Project!` becomes `my_project_.zip`
fn archive_name(project_name: &str) -> String {
    let stem: String = project_name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
        .collect();
    format!("{}.zip", stem)
}

fn read_metadata(dir: &Path) -> Result<ProjectMetadata> {
    let raw = fs::read_to_string(dir.join(PROJECT_METADATA_FILE))?;
    Ok(serde_json::from_str(&raw)?)
}

fn write_metadata(dir: &Path, metadata: &ProjectMetadata) -> Result<()> {
    let raw = serde_json::to_string_pretty(metadata)?;
    fs::write(dir.join(PROJECT_METADATA_FILE), raw)?;
    Ok(())
}

/// Bump the `updated` timestamp
fn touch(dir: &Path) -> Result<ProjectMetadata> {
    let mut metadata = read_metadata(dir)?;
    metadata.updated = Utc::now();
    write_metadata(dir, &metadata)?;
    Ok(metadata)
}

fn write_bytes(path: &Path, content: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, content)?;
    Ok(())
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn collect_files(root: &Path, dir: &Path, files: &mut Vec<ProjectFile>) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let Ok(relative) = path.strip_prefix(root) else {
            continue;
        };

        if relative == Path::new(PROJECT_METADATA_FILE) || relative.starts_with(".git") {
            continue;
        }

        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            collect_files(root, &path, files)?;
        } else if file_type.is_file() {
            files.push(ProjectFile {
                name: file_name(relative),
                path: tree_path(relative),
                size: entry.metadata()?.len(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn store() -> (TempDir, ProjectStore) {
        let temp_dir = TempDir::new().unwrap();
        let store = ProjectStore::new(temp_dir.path().join("projects"));
        (temp_dir, store)
    }

    #[test]
    fn test_create_commits_initial_files() {
        let (_temp, store) = store();
        let project = store
            .create("Demo", &[FileUpload::new("src/main.rs", "fn main() {}")])
            .unwrap();

        assert_eq!(project.name, "Demo");
        assert_eq!(project.created, project.updated);

        let history = store.history(&project.id).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].message, "Initial commit");

        assert_eq!(store.read_file(&project.id, "src/main.rs").unwrap(), "fn main() {}");
    }

    #[test]
    fn test_create_requires_a_name() {
        let (_temp, store) = store();
        assert!(matches!(store.create("  ", &[]), Err(ProjectError::InvalidProject(_))));
    }

    #[test]
    fn test_create_rejects_bad_paths_before_writing() {
        let (_temp, store) = store();
        let result = store.create("Demo", &[FileUpload::new("../escape.txt", "x")]);

        assert!(matches!(result, Err(ProjectError::InvalidPath(_))));
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn test_write_adds_commit_and_keeps_old_version() {
        let (_temp, store) = store();
        let project = store
            .create("Notes", &[FileUpload::new("notes.md", "first draft")])
            .unwrap();

        let updated = store.write_file(&project.id, "notes.md", "second draft").unwrap();
        assert!(updated.updated >= project.updated);

        let history = store.history(&project.id).unwrap();
        let messages: Vec<&str> = history.iter().map(|c| c.message.as_str()).collect();
        assert_eq!(messages, vec!["Update notes.md", "Initial commit"]);

        let initial = &history[1].hash;
        assert_eq!(store.file_at_version(&project.id, initial, "notes.md").unwrap(), "first draft");
        assert_eq!(store.read_file(&project.id, "notes.md").unwrap(), "second draft");
    }

    #[test]
    fn test_upload_and_show() {
        let (_temp, store) = store();
        let project = store.create("Assets", &[]).unwrap();

        let file = store.upload_file(&project.id, "img/logo.png", &[0x89, 0x50, 0x4e, 0x47]).unwrap();
        assert_eq!(file.name, "logo.png");
        assert_eq!(file.path, "img/logo.png");
        assert_eq!(file.size, 4);

        let details = store.show(&project.id).unwrap();
        assert_eq!(details.metadata.id, project.id);
        assert_eq!(details.files, vec![file]);

        let history = store.history(&project.id).unwrap();
        assert_eq!(history[0].message, "Add img/logo.png");
    }

    #[test]
    fn test_missing_project_and_file() {
        let (_temp, store) = store();
        assert!(matches!(store.show("does-not-exist"), Err(ProjectError::ProjectNotFound(_))));
        assert!(matches!(store.history("../.."), Err(ProjectError::ProjectNotFound(_))));

        let project = store.create("Empty", &[]).unwrap();
        assert!(matches!(
            store.read_file(&project.id, "missing.txt"),
            Err(ProjectError::FileNotFound(_))
        ));

        let head = store.history(&project.id).unwrap()[0].hash.clone();
        assert!(matches!(
            store.file_at_version(&project.id, &head, "missing.txt"),
            Err(ProjectError::FileNotFound(_))
        ));
    }

    #[test]
    fn test_path_traversal_rejected() {
        let (_temp, store) = store();
        let project = store.create("Safe", &[]).unwrap();

        for path in ["../other/file", "/etc/passwd", "project.json", ".git/HEAD"] {
            assert!(matches!(
                store.write_file(&project.id, path, "x"),
                Err(ProjectError::InvalidPath(_))
            ));
        }
    }

    #[test]
    fn test_export_zip_contains_project_files_only() {
        let (temp, store) = store();
        let project = store
            .create(
                "My Project!",
                &[FileUpload::new("README.md", "# hi"), FileUpload::new("src/lib.rs", "pub fn f() {}")],
            )
            .unwrap();

        let archive_path = temp.path().join("export.zip");
        let name = store
            .export_zip(&project.id, fs::File::create(&archive_path).unwrap())
            .unwrap();
        assert_eq!(name, "my_project_.zip");

        let mut archive = zip::ZipArchive::new(fs::File::open(&archive_path).unwrap()).unwrap();
        let mut entries: Vec<String> = archive.file_names().map(str::to_string).collect();
        entries.sort();
        assert_eq!(entries, vec!["README.md".to_string(), "src/lib.rs".to_string()]);

        let mut content = String::new();
        std::io::Read::read_to_string(&mut archive.by_name("src/lib.rs").unwrap(), &mut content).unwrap();
        assert_eq!(content, "pub fn f() {}");
    }

    #[test]
    fn test_export_zip_unknown_project() {
        let (_temp, store) = store();
        let result = store.export_zip("missing", std::io::Cursor::new(Vec::new()));
        assert!(matches!(result, Err(ProjectError::ProjectNotFound(_))));
    }

    #[test]
    fn test_list_skips_unrelated_directories() {
        let (_temp, store) = store();
        let project = store.create("Listed", &[]).unwrap();
        fs::create_dir_all(store.root().join("stray")).unwrap();

        let projects = store.list().unwrap();
        assert_eq!(projects.len(), 1);
        assert_eq!(projects[0].id, project.id);
    }
}
