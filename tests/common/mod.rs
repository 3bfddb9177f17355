//! Common test utilities: local git fixtures and a filesystem-backed catalog
#![allow(dead_code)]

use async_trait::async_trait;
use cc_mirror::codecommit::RepositoryCatalog;
use cc_mirror::error::DestinationAdminError;
use cc_mirror::MirrorRepo;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Mutex;
use tempfile::TempDir;

/// Run git in `cwd`, panicking with stderr on failure
pub fn git(cwd: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args(["-c", "user.name=Mirror Test", "-c", "user.email=mirror@example.com"])
        .args(args)
        .current_dir(cwd)
        .env("GIT_TERMINAL_PROMPT", "0")
        .output()
        .expect("Failed to execute git");

    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).into_owned()
}

/// A working repository standing in for a GitHub/GitLab project
pub struct SourceRepo {
    pub path: PathBuf,
}

impl SourceRepo {
    pub fn init(parent: &Path, name: &str) -> Self {
        let path = parent.join(name);
        std::fs::create_dir_all(&path).expect("Failed to create source dir");
        git(&path, &["init", "--quiet"]);
        git(&path, &["symbolic-ref", "HEAD", "refs/heads/main"]);
        let repo = Self { path };
        repo.commit("initial commit");
        repo
    }

    pub fn commit(&self, message: &str) -> String {
        git(&self.path, &["commit", "--quiet", "--allow-empty", "-m", message]);
        self.head()
    }

    pub fn head(&self) -> String {
        git(&self.path, &["rev-parse", "HEAD"]).trim().to_string()
    }

    pub fn branch(&self, name: &str) {
        git(&self.path, &["branch", name]);
    }

    pub fn delete_branch(&self, name: &str) {
        git(&self.path, &["branch", "-D", name]);
    }

    pub fn url(&self) -> String {
        self.path.to_string_lossy().into_owned()
    }

    /// Descriptor pointing at this repository
    pub fn descriptor(&self, name: &str) -> MirrorRepo {
        MirrorRepo::new(name, Some(format!("{} fixture", name)), "2024-01-01T00:00:00Z", self.url())
    }
}

/// Branch name to commit hash, for any repository
pub fn heads(repo: &Path) -> BTreeMap<String, String> {
    git(repo, &["for-each-ref", "--format=%(refname) %(objectname)", "refs/heads"])
        .lines()
        .filter_map(|line| line.split_once(' '))
        .map(|(name, hash)| {
            (
                name.trim_start_matches("refs/heads/").to_string(),
                hash.to_string(),
            )
        })
        .collect()
}

/// Destination catalog whose repositories are bare repos in a temp dir
pub struct LocalCatalog {
    pub root: TempDir,
    pub created: Mutex<Vec<(String, String)>>,
    pub list_calls: Mutex<usize>,
}

impl LocalCatalog {
    pub fn new() -> Self {
        Self {
            root: TempDir::new().expect("Failed to create catalog dir"),
            created: Mutex::new(Vec::new()),
            list_calls: Mutex::new(0),
        }
    }

    pub fn repo_path(&self, name: &str) -> PathBuf {
        self.root.path().join(name)
    }

    /// Pre-create a destination repository, as if made by an earlier run
    pub fn existing(self, name: &str) -> Self {
        git(self.root.path(), &["init", "--quiet", "--bare", name]);
        self
    }

    pub fn created_names(&self) -> Vec<String> {
        self.created
            .lock()
            .unwrap()
            .iter()
            .map(|(name, _)| name.clone())
            .collect()
    }
}

#[async_trait]
impl RepositoryCatalog for LocalCatalog {
    async fn list_repository_names(&self) -> Result<HashSet<String>, DestinationAdminError> {
        *self.list_calls.lock().unwrap() += 1;
        let entries = std::fs::read_dir(self.root.path())
            .map_err(|e| DestinationAdminError::List(e.to_string()))?;
        Ok(entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .collect())
    }

    async fn create_repository(&self, name: &str, description: &str) -> Result<(), DestinationAdminError> {
        let output = Command::new("git")
            .args(["init", "--quiet", "--bare", name])
            .current_dir(self.root.path())
            .output()
            .map_err(|e| DestinationAdminError::Create {
                name: name.to_string(),
                detail: e.to_string(),
            })?;
        if !output.status.success() {
            return Err(DestinationAdminError::Create {
                name: name.to_string(),
                detail: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }
        self.created
            .lock()
            .unwrap()
            .push((name.to_string(), description.to_string()));
        Ok(())
    }

    fn push_url(&self, name: &str) -> String {
        self.repo_path(name).to_string_lossy().into_owned()
    }
}
