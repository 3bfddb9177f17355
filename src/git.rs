use anyhow::{anyhow, Context, Result};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tokio::process::Command as AsyncCommand;
use tracing::{debug, warn};

/// Git operations on the local bare clones under one working directory
#[derive(Debug, Clone)]
pub struct GitClient {
    work_dir: PathBuf,
}

/// Mask `user:password@` in any URL inside `text`
pub fn redact_credentials(text: &str) -> String {
    static USERINFO: OnceLock<Regex> = OnceLock::new();
    let re = USERINFO.get_or_init(|| {
        Regex::new(r"(?P<scheme>[A-Za-z][A-Za-z0-9+.-]*://)[^/@\s]+@").expect("static regex")
    });
    re.replace_all(text, "${scheme}***@").into_owned()
}

impl GitClient {
    /// Create a Git client rooted at `work_dir`
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            work_dir: work_dir.into(),
        }
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    /// Location of a bare clone
    pub fn repo_path(&self, local_dir: &str) -> PathBuf {
        self.work_dir.join(local_dir)
    }

    pub fn has_local_clone(&self, local_dir: &str) -> bool {
        self.repo_path(local_dir).exists()
    }

    /// Create `local_dir` and bare-clone `url` into it
    ///
    /// A failed clone leaves nothing behind, so the next run clones again
    /// instead of fetching into a broken directory.
    pub async fn clone_bare(&self, url: &str, local_dir: &str) -> Result<()> {
        let target = self.repo_path(local_dir);

        tokio::fs::create_dir_all(&target)
            .await
            .with_context(|| format!("Failed to create directory {}", target.display()))?;

        let result = self
            .git(&["clone", "--bare", "--", url, local_dir], &self.work_dir)
            .await;

        if result.is_err() {
            if let Err(e) = tokio::fs::remove_dir_all(&target).await {
                warn!("Failed to clean up {} after failed clone: {}", target.display(), e);
            }
        }

        result.map(|_| ())
    }

    /// Fetch all branches from `url`, pruning branches deleted upstream
    ///
    /// `origin` is re-pointed at `url` first so rotated tokens take effect.
    pub async fn fetch_prune(&self, local_dir: &str, url: &str) -> Result<()> {
        let path = self.repo_path(local_dir);

        self.git(&["remote", "set-url", "origin", url], &path).await?;
        self.git(
            &["fetch", "origin", "+refs/heads/*:refs/heads/*", "--prune"],
            &path,
        )
        .await?;

        Ok(())
    }

    /// Make `remote`'s refs an exact copy of the local clone's refs
    pub async fn push_mirror(&self, local_dir: &str, remote: &str) -> Result<()> {
        let path = self.repo_path(local_dir);
        self.git(&["push", "--mirror", remote], &path).await?;
        Ok(())
    }

    async fn git(&self, args: &[&str], cwd: &Path) -> Result<String> {
        let shown = redact_credentials(&args.join(" "));
        debug!("git {} (in {})", shown, cwd.display());

        let output = AsyncCommand::new("git")
            .args(args)
            .current_dir(cwd)
            .env("GIT_TERMINAL_PROMPT", "0")
            .output()
            .await
            .with_context(|| format!("Failed to execute git {}", shown))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!(
                "git {} exited with {}: {}",
                shown,
                output.status,
                redact_credentials(stderr.trim())
            ));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}
