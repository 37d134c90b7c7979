use chrono::{DateTime, Utc};
use git2::{Commit, ErrorCode, IndexAddOption, Oid, Repository, Signature, Sort};
use std::path::Path;

use super::types::CommitInfo;
use crate::constants::{GIT_SIGNATURE_EMAIL, GIT_SIGNATURE_NAME};
use crate::utils::ProjectError;

/// Initialize a repository in `dir`
pub fn init(dir: &Path) -> Result<(), git2::Error> {
    Repository::init(dir)?;
    Ok(())
}

/// Stage everything in the working tree and commit it on HEAD
pub fn commit_all(dir: &Path, message: &str) -> Result<Oid, git2::Error> {
    let repo = Repository::open(dir)?;

    let mut index = repo.index()?;
    index.add_all(["*"].iter(), IndexAddOption::DEFAULT, None)?;
    index.write()?;

    let tree_id = index.write_tree()?;
    let tree = repo.find_tree(tree_id)?;

    let parent = match repo.head() {
        Ok(head) => Some(head.peel_to_commit()?),
        Err(_) => None, // First commit
    };
    let parents: Vec<&Commit> = parent.iter().collect();

    let signature = repo
        .signature()
        .or_else(|_| Signature::now(GIT_SIGNATURE_NAME, GIT_SIGNATURE_EMAIL))?;

    repo.commit(Some("HEAD"), &signature, &signature, message, &tree, &parents)
}

/// Commits reachable from HEAD, newest first
pub fn history(dir: &Path) -> Result<Vec<CommitInfo>, git2::Error> {
    let repo = Repository::open(dir)?;

    let mut revwalk = repo.revwalk()?;
    if revwalk.push_head().is_err() {
        // No commits yet
        return Ok(Vec::new());
    }
    revwalk.set_sorting(Sort::TOPOLOGICAL | Sort::TIME)?;

    let mut commits = Vec::new();
    for oid in revwalk {
        let commit = repo.find_commit(oid?)?;
        let date = DateTime::<Utc>::from_timestamp(commit.time().seconds(), 0).unwrap_or_default();

        commits.push(CommitInfo {
            hash: commit.id().to_string(),
            author: commit.author().name().unwrap_or("unknown").to_string(),
            date,
            message: commit.message().unwrap_or_default().trim().to_string(),
        });
    }

    Ok(commits)
}

/// Content of `path` as of `revision`
pub fn file_at(dir: &Path, revision: &str, path: &str) -> Result<Vec<u8>, ProjectError> {
    let repo = Repository::open(dir)?;
    let commit = repo.revparse_single(revision)?.peel_to_commit()?;
    let tree = commit.tree()?;

    let entry = match tree.get_path(Path::new(path)) {
        Ok(entry) => entry,
        Err(e) if e.code() == ErrorCode::NotFound => {
            return Err(ProjectError::FileNotFound(format!("{} at {}", path, revision)));
        },
        Err(e) => return Err(e.into()),
    };

    let blob = entry.to_object(&repo)?.peel_to_blob()?;
    Ok(blob.content().to_vec())
}
