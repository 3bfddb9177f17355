//! cc-mirror - Mirror hosted Git repositories into AWS CodeCommit
//!
//! Lists the repositories of a GitHub organization or of GitLab groups,
//! keeps a bare clone of each one in a working directory, and pushes every
//! clone as an exact mirror into a CodeCommit repository of the same name.
//!
//! ## Modules
//!
//! - [`discovery`]: Repository descriptors, recency and exclude filters
//! - [`github`]: GitHub GraphQL organization listing
//! - [`gitlab`]: GitLab REST group listing
//! - [`git`]: Bare clone, fetch and mirror push
//! - [`codecommit`]: CodeCommit catalog and per-repository mirroring
//! - [`sync`]: Sequential run over all listed repositories
//! - [`config`]: YAML configuration and validation
//! - [`cli`]: Command line entry points

pub mod cli;
pub mod codecommit;
pub mod config;
pub mod discovery;
pub mod error;
pub mod git;
pub mod github;
pub mod gitlab;
pub mod sync;

pub use codecommit::{CodeCommitCatalog, Destination, MirrorRegistry, RepositoryCatalog};
pub use config::Config;
pub use discovery::{MirrorRepo, RepositorySource};
pub use git::GitClient;
pub use github::GitHubSource;
pub use gitlab::GitLabSource;
pub use sync::{SyncEngine, SyncSummary};
