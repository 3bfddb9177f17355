//! Sync Engine - drives one mirror run
//!
//! Lists repositories from a [`RepositorySource`] and mirrors each one into a
//! [`Destination`], strictly one after another. A failing repository is
//! logged and counted; only a failed listing ends the run early.

use std::time::{Duration, Instant};
use tracing::{error, info};

use crate::codecommit::{Destination, MirrorOutcome};
use crate::discovery::RepositorySource;
use crate::error::SourceQueryError;

/// Outcome of mirroring one repository
#[derive(Debug)]
pub enum SyncResult {
    Mirrored { name: String, outcome: MirrorOutcome },
    Failed { name: String, error: String },
}

impl SyncResult {
    pub fn name(&self) -> &str {
        match self {
            SyncResult::Mirrored { name, .. } | SyncResult::Failed { name, .. } => name,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, SyncResult::Failed { .. })
    }
}

/// Results from a complete sync run
#[derive(Debug)]
pub struct SyncSummary {
    pub total_repositories: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub duration: Duration,
    pub results: Vec<SyncResult>,
}

impl SyncSummary {
    fn compile(results: Vec<SyncResult>, duration: Duration) -> Self {
        let failed = results.iter().filter(|r| r.is_failure()).count();
        Self {
            total_repositories: results.len(),
            succeeded: results.len() - failed,
            failed,
            duration,
            results,
        }
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }
}

/// Wires one source to one destination
pub struct SyncEngine<D> {
    source: Box<dyn RepositorySource>,
    destination: D,
}

impl<D: Destination> SyncEngine<D> {
    pub fn new(source: Box<dyn RepositorySource>, destination: D) -> Self {
        Self { source, destination }
    }

    pub fn destination(&self) -> &D {
        &self.destination
    }

    /// Run a complete sync: list, then mirror every repository in order
    pub async fn run(&mut self) -> Result<SyncSummary, SourceQueryError> {
        let start_time = Instant::now();

        let repos = self.source.list_repositories().await?;
        info!(
            "Mirroring {} repositories from {}",
            repos.len(),
            self.source.provider_name()
        );

        let mut results = Vec::with_capacity(repos.len());
        for repo in &repos {
            info!("Handling {}, last pushed at {}", repo.name, repo.last_updated);

            match self.destination.mirror(repo).await {
                Ok(outcome) => results.push(SyncResult::Mirrored {
                    name: repo.name.clone(),
                    outcome,
                }),
                Err(e) => {
                    error!("Error when handling {}, got {}", repo.name, e);
                    results.push(SyncResult::Failed {
                        name: repo.name.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        let summary = SyncSummary::compile(results, start_time.elapsed());
        info!(
            "Sync completed in {:.2}s: {} mirrored, {} failed",
            summary.duration.as_secs_f64(),
            summary.succeeded,
            summary.failed
        );

        Ok(summary)
    }
}
