use anyhow::{Context, Result};
use dirs::config_dir;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;

/// Main configuration structure
///
/// Built once at startup from an optional YAML file plus command line
/// overrides, validated, then handed by reference to every component.
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Directory holding the local bare clones
    #[serde(default = "default_work_dir")]
    pub work_dir: String,

    /// Settings shared by both source platforms
    #[serde(default)]
    pub source: SourceConfig,

    /// GitHub organization source
    #[serde(default)]
    pub github: GitHubConfig,

    /// GitLab groups source
    #[serde(default)]
    pub gitlab: GitLabConfig,

    /// AWS CodeCommit destination
    #[serde(default)]
    pub codecommit: CodeCommitConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Which platform repositories are mirrored from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    GitHub,
    GitLab,
}

/// Source selection shared by both platforms
#[derive(Debug, Deserialize, Clone)]
pub struct SourceConfig {
    /// Only mirror repositories pushed within this many minutes
    pub pushed_within: Option<u64>,

    /// Repository exclusion patterns (`*` wildcard)
    #[serde(default)]
    pub exclude_patterns: Vec<String>,

    /// Timeout for source API requests in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,
}

/// GitHub configuration
#[derive(Debug, Deserialize, Clone)]
pub struct GitHubConfig {
    /// Account the token belongs to
    #[serde(default)]
    pub user: String,

    /// Personal access token
    #[serde(default)]
    pub token: String,

    /// Organization whose repositories are mirrored
    #[serde(default)]
    pub organization: String,

    /// GraphQL endpoint
    #[serde(default = "default_github_api_url")]
    pub api_url: String,

    /// Base URL repositories are cloned from
    #[serde(default = "default_github_host")]
    pub host: String,
}

/// GitLab configuration
#[derive(Debug, Deserialize, Clone)]
pub struct GitLabConfig {
    /// Personal API access token
    #[serde(default)]
    pub token: String,

    /// Group ids, listed in this order
    #[serde(default)]
    pub groups: Vec<String>,

    /// GitLab instance
    #[serde(default = "default_gitlab_host")]
    pub host: String,
}

/// CodeCommit configuration
#[derive(Debug, Deserialize, Clone)]
pub struct CodeCommitConfig {
    /// HTTPS Git credentials user name
    #[serde(default)]
    pub user: String,

    /// HTTPS Git credentials password
    #[serde(default)]
    pub password: String,

    /// Prepended to every destination repository name
    #[serde(default)]
    pub prefix: String,

    #[serde(default = "default_region")]
    pub region: String,

    /// Falls back to the AWS SDK credential chain when unset
    pub aws_access_key: Option<String>,
    pub aws_secret_access_key: Option<String>,
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String, // "info"

    /// Log format
    #[serde(default = "default_log_format")]
    pub format: String, // "compact", "json"
}

// Default value functions
fn default_work_dir() -> String {
    ".".to_string()
}
fn default_request_timeout() -> u64 {
    60
}
fn default_github_api_url() -> String {
    "https://api.github.com/graphql".to_string()
}
fn default_github_host() -> String {
    "https://github.com".to_string()
}
fn default_gitlab_host() -> String {
    "https://gitlab.com".to_string()
}
fn default_region() -> String {
    "eu-central-1".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "compact".to_string()
}

// Default implementations
impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            pushed_within: None,
            exclude_patterns: Vec::new(),
            request_timeout: default_request_timeout(),
        }
    }
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            user: String::new(),
            token: String::new(),
            organization: String::new(),
            api_url: default_github_api_url(),
            host: default_github_host(),
        }
    }
}

impl Default for GitLabConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            groups: Vec::new(),
            host: default_gitlab_host(),
        }
    }
}

impl Default for CodeCommitConfig {
    fn default() -> Self {
        Self {
            user: String::new(),
            password: String::new(),
            prefix: String::new(),
            region: default_region(),
            aws_access_key: None,
            aws_secret_access_key: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            work_dir: default_work_dir(),
            source: SourceConfig::default(),
            github: GitHubConfig::default(),
            gitlab: GitLabConfig::default(),
            codecommit: CodeCommitConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl SourceConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }
}

impl Config {
    /// Load the file at `path`, or the default location if it exists
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => match Self::default_config_path() {
                Ok(default_path) if default_path.exists() => {
                    tracing::debug!("Using configuration at: {:?}", default_path);
                    Self::load(&default_path)
                }
                _ => Ok(Self::default()),
            },
        }
    }

    /// Load configuration from a specific file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        Ok(config)
    }

    /// Get the default configuration file path (XDG compliant)
    pub fn default_config_path() -> Result<PathBuf> {
        let config_dir = config_dir().context("Failed to get user config directory")?;

        Ok(config_dir.join("cc-mirror").join("config.yml"))
    }

    /// Expand `~` and environment variables in the working directory
    pub fn expand_paths(&mut self) -> Result<(), ConfigError> {
        self.work_dir = shellexpand::full(&self.work_dir)
            .map_err(|e| ConfigError::Invalid {
                field: "dir",
                reason: e.to_string(),
            })?
            .into_owned();

        Ok(())
    }

    /// Check everything a run of `kind` needs before anything is contacted
    pub fn validate(&self, kind: SourceKind) -> Result<(), ConfigError> {
        match kind {
            SourceKind::GitHub => {
                require("github-user", &self.github.user)?;
                require("github-token", &self.github.token)?;
                require("github-organization", &self.github.organization)?;
                require_url("github-api-url", &self.github.api_url)?;
                require_url("github-host", &self.github.host)?;
            }
            SourceKind::GitLab => {
                require("gitlab-token", &self.gitlab.token)?;
                if self.gitlab.groups.is_empty() {
                    return Err(ConfigError::Missing("gitlab-groups"));
                }
                if self.gitlab.groups.iter().any(|g| g.trim().is_empty()) {
                    return Err(ConfigError::Invalid {
                        field: "gitlab-groups",
                        reason: "empty group id".to_string(),
                    });
                }
                require_url("gitlab-host", &self.gitlab.host)?;
            }
        }

        require("cc-user", &self.codecommit.user)?;
        require("cc-password", &self.codecommit.password)?;
        require("aws-region", &self.codecommit.region)?;

        if self.codecommit.aws_access_key.is_some() != self.codecommit.aws_secret_access_key.is_some() {
            return Err(ConfigError::Invalid {
                field: "aws-access-key",
                reason: "access key and secret access key must be given together".to_string(),
            });
        }

        if self.source.request_timeout == 0 {
            return Err(ConfigError::Invalid {
                field: "request-timeout",
                reason: "must be at least one second".to_string(),
            });
        }

        crate::discovery::ExcludeFilter::new(&self.source.exclude_patterns).map_err(|e| {
            ConfigError::Invalid {
                field: "exclude",
                reason: e.to_string(),
            }
        })?;

        Ok(())
    }
}

fn require(field: &'static str, value: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        Err(ConfigError::Missing(field))
    } else {
        Ok(())
    }
}

fn require_url(field: &'static str, value: &str) -> Result<(), ConfigError> {
    require(field, value)?;
    reqwest::Url::parse(value).map_err(|e| ConfigError::Invalid {
        field,
        reason: e.to_string(),
    })?;
    Ok(())
}

/// Split a comma-separated group list, dropping blanks
pub fn parse_group_list(groups: &str) -> Vec<String> {
    groups
        .split(',')
        .map(str::trim)
        .filter(|g| !g.is_empty())
        .map(str::to_string)
        .collect()
}
