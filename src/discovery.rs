//! Repository discovery abstraction layer
//!
//! This module provides the provider-agnostic pieces shared by the GitHub and
//! GitLab sources: the repository descriptor handed to the destination, the
//! recency filter, and name-based exclusion.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use regex::Regex;
use reqwest::{Client, Url};
use std::time::Duration;

use crate::error::SourceQueryError;

/// One repository selected for mirroring
///
/// Built fresh from API data on every run and never modified afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorRepo {
    /// Repository name, used for the destination name and the local directory
    pub name: String,

    /// Free-text description, empty when the source has none
    pub description: String,

    /// Last push/activity timestamp exactly as the platform reported it
    pub last_updated: String,

    /// HTTPS clone URL with credentials embedded in the authority
    pub clone_url: String,

    /// Local bare clone directory, always `<name>.git`
    pub local_dir: String,
}

impl MirrorRepo {
    pub fn new(
        name: impl Into<String>,
        description: Option<String>,
        last_updated: impl Into<String>,
        clone_url: impl Into<String>,
    ) -> Self {
        let name = name.into();
        let local_dir = format!("{}.git", name);
        Self {
            name,
            description: description.unwrap_or_default(),
            last_updated: last_updated.into(),
            clone_url: clone_url.into(),
            local_dir,
        }
    }
}

/// Trait for repository listing from a source platform
#[async_trait]
pub trait RepositorySource: Send + Sync {
    /// List repositories to mirror, already filtered, in source order
    async fn list_repositories(&self) -> Result<Vec<MirrorRepo>, SourceQueryError>;

    /// Provider name for display/logging
    fn provider_name(&self) -> &'static str;
}

/// Parse a platform timestamp as UTC
///
/// GitHub sends `2018-03-01T10:00:00Z`, GitLab `2018-03-01T10:00:00.123Z`.
/// Offsets are honoured; timestamps without any zone are taken as UTC.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Some(ts.with_timezone(&Utc));
    }

    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Keeps repositories updated within the last `within` minutes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecencyFilter {
    within: Option<u64>,
}

impl RecencyFilter {
    pub fn new(within: Option<u64>) -> Self {
        Self { within }
    }

    pub fn within(&self) -> Option<u64> {
        self.within
    }

    /// Whether a repository last updated at `updated` is kept at time `now`
    pub fn retains_at(&self, updated: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        match self.within {
            None => true,
            Some(within) => {
                let elapsed_minutes = (now - updated).num_milliseconds() as f64 / 60_000.0;
                elapsed_minutes <= within as f64
            }
        }
    }

    /// Apply the filter to raw timestamps, failing on unparseable ones
    ///
    /// Without a threshold timestamps are not even parsed, so an odd format
    /// never blocks an unfiltered run.
    pub fn apply<T>(
        &self,
        items: Vec<T>,
        now: DateTime<Utc>,
        timestamp_of: impl Fn(&T) -> (&str, &str),
    ) -> Result<Vec<T>, SourceQueryError> {
        if self.within.is_none() {
            return Ok(items);
        }

        let mut kept = Vec::with_capacity(items.len());
        for item in items {
            let (name, raw) = timestamp_of(&item);
            let updated = parse_timestamp(raw).ok_or_else(|| SourceQueryError::Timestamp {
                repo: name.to_string(),
                value: raw.to_string(),
            })?;

            if self.retains_at(updated, now) {
                kept.push(item);
            } else {
                tracing::debug!("Skipping {}, last updated at {}", name, raw);
            }
        }
        Ok(kept)
    }
}

/// Name-based exclusion using simple `*` glob patterns
#[derive(Debug, Clone, Default)]
pub struct ExcludeFilter {
    patterns: Vec<Regex>,
}

impl ExcludeFilter {
    pub fn new(patterns: &[String]) -> Result<Self, regex::Error> {
        let patterns = patterns
            .iter()
            .map(|pattern| {
                let escaped = regex::escape(pattern).replace(r"\*", ".*");
                Regex::new(&format!("^{}$", escaped))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { patterns })
    }

    pub fn is_excluded(&self, name: &str) -> bool {
        self.patterns.iter().any(|re| re.is_match(name))
    }

    /// Drop excluded repositories, keeping order
    pub fn apply(&self, repos: Vec<MirrorRepo>) -> Vec<MirrorRepo> {
        if self.patterns.is_empty() {
            return repos;
        }

        repos
            .into_iter()
            .filter(|repo| {
                let excluded = self.is_excluded(&repo.name);
                if excluded {
                    tracing::debug!("Excluding repository due to pattern match: {}", repo.name);
                }
                !excluded
            })
            .collect()
    }
}

/// Put `user:password@` into the authority of an HTTPS URL
///
/// Both parts are percent-encoded, so tokens containing `/`, `+` or `@`
/// survive the round trip through git.
pub fn embed_credentials(url: &str, user: &str, password: &str) -> Option<String> {
    let mut url = Url::parse(url).ok()?;
    url.set_username(user).ok()?;
    url.set_password(Some(password)).ok()?;
    Some(url.to_string())
}

/// HTTP client shared by the source providers, with one timeout policy
pub(crate) fn http_client(timeout: Duration) -> reqwest::Result<Client> {
    Client::builder()
        .timeout(timeout)
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .build()
}
