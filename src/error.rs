//! Error taxonomy for a mirror run
//!
//! Only [`SourceQueryError`] and [`ConfigError`] may abort a run. Everything a
//! single repository can fail with is collected in [`MirrorError`] and handled
//! per repository by the sync engine.

use thiserror::Error;

/// The source platform could not produce a repository list
#[derive(Debug, Error)]
pub enum SourceQueryError {
    #[error("{provider} request failed: {source}")]
    Request {
        provider: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{provider} returned HTTP {status} for {url}")]
    Status {
        provider: &'static str,
        status: u16,
        url: String,
    },

    #[error("{provider} returned an unreadable payload: {detail}")]
    Payload {
        provider: &'static str,
        detail: String,
    },

    #[error("{provider} query failed: {message}")]
    Query {
        provider: &'static str,
        message: String,
    },

    #[error("unrecognised timestamp {value:?} for repository {repo}")]
    Timestamp { repo: String, value: String },
}

/// Local bare clone or fetch from the source failed
#[derive(Debug, Error)]
#[error("{action} of {local_dir} failed: {detail}")]
pub struct SourceCloneError {
    pub action: &'static str,
    pub local_dir: String,
    pub detail: String,
}

/// Destination repository listing or creation failed
#[derive(Debug, Error)]
pub enum DestinationAdminError {
    #[error("listing destination repositories failed: {0}")]
    List(String),

    #[error("creating destination repository {name} failed: {detail}")]
    Create { name: String, detail: String },

    #[error("local directory {local_dir} is already used by another repository in this run")]
    DuplicateLocalDir { local_dir: String },
}

/// Mirror push to the destination failed
#[derive(Debug, Error)]
#[error("mirror push to {destination} failed: {detail}")]
pub struct DestinationPushError {
    pub destination: String,
    pub detail: String,
}

/// Anything that can go wrong while mirroring one repository
#[derive(Debug, Error)]
pub enum MirrorError {
    #[error(transparent)]
    SourceClone(#[from] SourceCloneError),

    #[error(transparent)]
    DestinationAdmin(#[from] DestinationAdminError),

    #[error(transparent)]
    DestinationPush(#[from] DestinationPushError),
}

/// Startup configuration problems
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required setting: {0}")]
    Missing(&'static str),

    #[error("invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}
