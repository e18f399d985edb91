#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use git2::{IndexAddOption, Oid, Repository, Signature};
use tckts::Storage;
use tempfile::TempDir;

/// A temporary git repository with a `.tckts` directory inside it.
pub struct TestRepo {
    dir: TempDir,
    repo: Repository,
}

impl TestRepo {
    pub fn init() -> Result<Self, git2::Error> {
        let dir = tempfile::tempdir().expect("failed to create tempdir");
        let repo = Repository::init(dir.path())?;
        set_identity(&repo)?;
        Ok(Self { dir, repo })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn tickets_dir(&self) -> PathBuf {
        self.dir.path().join(".tckts")
    }

    pub fn storage(&self) -> Storage {
        Storage::new(self.tickets_dir())
    }

    pub fn write_file(&self, rel_path: &str, contents: &str) -> std::io::Result<PathBuf> {
        let path = self.dir.path().join(rel_path);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, contents)?;
        Ok(path)
    }

    pub fn read_file(&self, rel_path: &str) -> std::io::Result<String> {
        fs::read_to_string(self.dir.path().join(rel_path))
    }

    pub fn commit_all(&self, message: &str) -> Result<Oid, git2::Error> {
        let mut index = self.repo.index()?;
        index.add_all(["*"].iter(), IndexAddOption::DEFAULT, None)?;
        index.write()?;

        let tree_id = index.write_tree()?;
        let tree = self.repo.find_tree(tree_id)?;
        let sig = Signature::now("tckts-test", "tckts-test@example.com")?;

        let parent = self
            .repo
            .head()
            .ok()
            .and_then(|head| head.target())
            .and_then(|oid| self.repo.find_commit(oid).ok());

        let oid = match parent {
            Some(parent) => self
                .repo
                .commit(Some("HEAD"), &sig, &sig, message, &tree, &[&parent])?,
            None => self
                .repo
                .commit(Some("HEAD"), &sig, &sig, message, &tree, &[])?,
        };

        Ok(oid)
    }

    pub fn repo(&self) -> &Repository {
        &self.repo
    }
}

fn set_identity(repo: &Repository) -> Result<(), git2::Error> {
    let mut cfg = repo.config()?;
    cfg.set_str("user.name", "tckts-test")?;
    cfg.set_str("user.email", "tckts-test@example.com")?;
    Ok(())
}

/// The tckts binary, isolated from the caller's environment.
pub fn tckts_cmd(cwd: &Path) -> Command {
    let mut cmd = Command::cargo_bin("tckts").expect("binary");
    cmd.current_dir(cwd);
    cmd.env_remove("TCKTS_DIR");
    cmd.env_remove("RUST_LOG");
    cmd
}

/// Block-text project with one finished and one waiting ticket.
pub const LEGACY_PROJECT: &str = "# tckts | prefix: OLD | version: 1
---
id: OLD-1
type: bug
status: done
title: Fix the crash
created_at: 2023-03-01T09:00:00Z
completed_at: 2023-03-04T17:30:00Z
priority: high

Stack trace attached.
\\--- separator kept from the report
---
---
id: OLD-2
type: task
status: pending
title: Write regression test
created_at: 2023-03-02T10:00:00Z
depends: OLD-1
---
";
