//! Destination side of a mirror run
//!
//! [`RepositoryCatalog`] is the admin API of the destination (AWS CodeCommit in
//! production). [`MirrorRegistry`] combines a catalog with the local bare
//! clones to mirror one repository at a time.

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_codecommit::config::Credentials;
use aws_sdk_codecommit::error::DisplayErrorContext;
use aws_sdk_codecommit::Client;
use std::collections::HashSet;
use tracing::{debug, info};

use crate::config::Config;
use crate::discovery::{embed_credentials, MirrorRepo};
use crate::error::{DestinationAdminError, DestinationPushError, MirrorError, SourceCloneError};
use crate::git::GitClient;

/// CodeCommit rejects longer repository descriptions
const MAX_DESCRIPTION_CHARS: usize = 1000;

/// Admin operations of the destination platform
#[async_trait]
pub trait RepositoryCatalog: Send + Sync {
    /// Names of all existing destination repositories
    async fn list_repository_names(&self) -> Result<HashSet<String>, DestinationAdminError>;

    async fn create_repository(&self, name: &str, description: &str) -> Result<(), DestinationAdminError>;

    /// Git remote to push a destination repository to
    fn push_url(&self, name: &str) -> String;
}

/// Git-over-HTTPS remote of a CodeCommit repository with credentials embedded
pub fn codecommit_push_url(region: &str, user: &str, password: &str, name: &str) -> String {
    let plain = format!("https://git-codecommit.{}.amazonaws.com/v1/repos/{}", region, name);
    embed_credentials(&plain, user, password).unwrap_or(plain)
}

/// AWS CodeCommit catalog
pub struct CodeCommitCatalog {
    client: Client,
    region: String,
    git_user: String,
    git_password: String,
}

impl CodeCommitCatalog {
    /// Build the SDK client from configuration
    ///
    /// Explicit access keys win; without them the SDK's default credential
    /// chain (environment, profile, instance role) applies.
    pub async fn new(config: &Config) -> Self {
        let cc = &config.codecommit;
        let mut loader = aws_config::defaults(BehaviorVersion::latest()).region(Region::new(cc.region.clone()));

        if let (Some(key), Some(secret)) = (&cc.aws_access_key, &cc.aws_secret_access_key) {
            debug!("Using AWS access key from configuration");
            loader = loader.credentials_provider(Credentials::new(
                key.clone(),
                secret.clone(),
                None,
                None,
                "cc-mirror",
            ));
        }

        let sdk_config = loader.load().await;
        Self::from_client(Client::new(&sdk_config), &cc.region, &cc.user, &cc.password)
    }

    pub fn from_client(client: Client, region: &str, git_user: &str, git_password: &str) -> Self {
        Self {
            client,
            region: region.to_string(),
            git_user: git_user.to_string(),
            git_password: git_password.to_string(),
        }
    }
}

#[async_trait]
impl RepositoryCatalog for CodeCommitCatalog {
    async fn list_repository_names(&self) -> Result<HashSet<String>, DestinationAdminError> {
        let mut names = HashSet::new();
        let mut next_token: Option<String> = None;

        loop {
            let output = self
                .client
                .list_repositories()
                .set_next_token(next_token.take())
                .send()
                .await
                .map_err(|e| DestinationAdminError::List(DisplayErrorContext(&e).to_string()))?;

            names.extend(
                output
                    .repositories()
                    .iter()
                    .filter_map(|repo| repo.repository_name())
                    .map(str::to_string),
            );

            match output.next_token() {
                Some(token) => next_token = Some(token.to_string()),
                None => break,
            }
        }

        Ok(names)
    }

    async fn create_repository(&self, name: &str, description: &str) -> Result<(), DestinationAdminError> {
        self.client
            .create_repository()
            .repository_name(name)
            .repository_description(description)
            .send()
            .await
            .map_err(|e| DestinationAdminError::Create {
                name: name.to_string(),
                detail: DisplayErrorContext(&e).to_string(),
            })?;
        Ok(())
    }

    fn push_url(&self, name: &str) -> String {
        codecommit_push_url(&self.region, &self.git_user, &self.git_password, name)
    }
}

/// How the local bare clone was brought up to date
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloneAction {
    Cloned,
    Fetched,
}

/// Result of mirroring one repository
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorOutcome {
    pub destination: String,
    pub created: bool,
    pub clone: CloneAction,
}

/// Something a repository can be mirrored into
#[async_trait]
pub trait Destination: Send {
    async fn mirror(&mut self, repo: &MirrorRepo) -> Result<MirrorOutcome, MirrorError>;
}

/// Mirrors descriptors into a catalog through local bare clones
pub struct MirrorRegistry<C> {
    catalog: C,
    git: GitClient,
    prefix: String,
    known: Option<HashSet<String>>,
    used_dirs: HashSet<String>,
}

impl<C: RepositoryCatalog> MirrorRegistry<C> {
    pub fn new(catalog: C, git: GitClient, prefix: impl Into<String>) -> Self {
        Self {
            catalog,
            git,
            prefix: prefix.into(),
            known: None,
            used_dirs: HashSet::new(),
        }
    }

    pub fn catalog(&self) -> &C {
        &self.catalog
    }

    pub fn into_catalog(self) -> C {
        self.catalog
    }

    /// Destination repository name for a source repository
    pub fn destination_name(&self, name: &str) -> String {
        format!("{}{}", self.prefix, name)
    }

    /// Create `name` unless it exists; `true` when it was created
    ///
    /// The catalog is listed once and cached for the rest of the process.
    pub async fn ensure_repository(&mut self, name: &str, description: &str) -> Result<bool, DestinationAdminError> {
        if self.known.is_none() {
            let names = self.catalog.list_repository_names().await?;
            debug!("Destination has {} repositories", names.len());
            self.known = Some(names);
        }

        let known = self.known.get_or_insert_with(HashSet::new);
        if known.contains(name) {
            return Ok(false);
        }

        info!("\t* Create destination repository: {}", name);
        let description: String = description.chars().take(MAX_DESCRIPTION_CHARS).collect();
        self.catalog.create_repository(name, &description).await?;
        known.insert(name.to_string());

        Ok(true)
    }

    /// Bare-clone the source, or fetch into an existing clone with pruning
    pub async fn sync_local_clone(&self, local_dir: &str, clone_url: &str) -> Result<CloneAction, SourceCloneError> {
        if !self.git.has_local_clone(local_dir) {
            info!("\t* Creating local bare clone {}", local_dir);
            self.git
                .clone_bare(clone_url, local_dir)
                .await
                .map_err(|e| SourceCloneError {
                    action: "clone",
                    local_dir: local_dir.to_string(),
                    detail: format!("{:#}", e),
                })?;
            Ok(CloneAction::Cloned)
        } else {
            info!("\t* Fetching updates into {}", local_dir);
            self.git
                .fetch_prune(local_dir, clone_url)
                .await
                .map_err(|e| SourceCloneError {
                    action: "fetch",
                    local_dir: local_dir.to_string(),
                    detail: format!("{:#}", e),
                })?;
            Ok(CloneAction::Fetched)
        }
    }

    /// Replace the destination's refs with the local clone's refs
    pub async fn push_mirror(&self, local_dir: &str, name: &str) -> Result<(), DestinationPushError> {
        info!("\t* Mirror local bare clone {} to {}", local_dir, name);
        self.git
            .push_mirror(local_dir, &self.catalog.push_url(name))
            .await
            .map_err(|e| DestinationPushError {
                destination: name.to_string(),
                detail: format!("{:#}", e),
            })
    }
}

#[async_trait]
impl<C: RepositoryCatalog> Destination for MirrorRegistry<C> {
    async fn mirror(&mut self, repo: &MirrorRepo) -> Result<MirrorOutcome, MirrorError> {
        if !self.used_dirs.insert(repo.local_dir.clone()) {
            return Err(DestinationAdminError::DuplicateLocalDir {
                local_dir: repo.local_dir.clone(),
            }
            .into());
        }

        let destination = self.destination_name(&repo.name);
        let created = self.ensure_repository(&destination, &repo.description).await?;
        let clone = self.sync_local_clone(&repo.local_dir, &repo.clone_url).await?;
        self.push_mirror(&repo.local_dir, &destination).await?;

        Ok(MirrorOutcome {
            destination,
            created,
            clone,
        })
    }
}
