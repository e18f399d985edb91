//! Version-control queries used as a migration safety check.
//!
//! Migrations rewrite project files in place, so they only run when the
//! storage directory is tracked by git and has nothing uncommitted. The
//! check sits behind [`VcsStatus`] so the migration engine can be driven
//! without a real repository.

use std::path::{Path, PathBuf};

use git2::{ErrorCode, Repository, StatusOptions};

use crate::error::{Error, Result};

/// The one question the migration engine asks a version-control system.
pub trait VcsStatus {
    /// Fail with `NotGitRepo` when `path` is not inside a repository, or
    /// `UncommittedChanges` when anything under `path` differs from HEAD.
    fn ensure_clean(&self, path: &Path) -> Result<()>;
}

/// [`VcsStatus`] backed by libgit2.
#[derive(Debug, Clone, Copy, Default)]
pub struct Git;

impl VcsStatus for Git {
    fn ensure_clean(&self, path: &Path) -> Result<()> {
        let repo = discover_repo(path)?;
        let root = workdir(&repo)?;
        let relative = relative_to(&root, path)?;
        if has_changes_under(&repo, &relative)? {
            return Err(Error::UncommittedChanges(path.to_path_buf()));
        }
        Ok(())
    }
}

/// Discover a git repository from a starting path.
pub fn discover_repo(start: &Path) -> Result<Repository> {
    Repository::discover(start).map_err(|err| {
        if err.code() == ErrorCode::NotFound {
            Error::NotGitRepo(start.to_path_buf())
        } else {
            Error::Git(err)
        }
    })
}

/// Return the repository workdir (root of the working tree).
pub fn workdir(repo: &Repository) -> Result<PathBuf> {
    repo.workdir()
        .map(|path| path.to_path_buf())
        .ok_or_else(|| Error::NotGitRepo(repo.path().to_path_buf()))
}

fn relative_to(root: &Path, path: &Path) -> Result<PathBuf> {
    let root = root.canonicalize()?;
    let path = path.canonicalize()?;
    path.strip_prefix(&root)
        .map(Path::to_path_buf)
        .map_err(|_| Error::NotGitRepo(path.clone()))
}

/// Whether any non-ignored entry under `relative` (repo-relative; empty
/// means the whole tree) is modified, staged, or untracked.
pub fn has_changes_under(repo: &Repository, relative: &Path) -> Result<bool> {
    let mut options = StatusOptions::new();
    options
        .include_untracked(true)
        .recurse_untracked_dirs(true)
        .include_ignored(false);
    if !relative.as_os_str().is_empty() {
        options.pathspec(relative);
    }

    let statuses = repo.statuses(Some(&mut options))?;
    Ok(statuses.iter().any(|entry| {
        let status = entry.status();
        !status.is_ignored() && !status.is_empty()
    }))
}
