use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

use crate::config::{Config, GitHubConfig};
use crate::discovery::{embed_credentials, http_client, ExcludeFilter, MirrorRepo, RecencyFilter, RepositorySource};
use crate::error::SourceQueryError;

const PROVIDER: &str = "GitHub";

/// Most recently pushed, non-fork repositories of one organization.
/// GitHub caps a connection page at 100 nodes.
const ORG_REPOSITORIES_QUERY: &str = r#"
query($org: String!) {
  organization(login: $org) {
    repositories(first: 100, isFork: false, orderBy: {field: PUSHED_AT, direction: DESC}) {
      edges { node { name description pushedAt } }
    }
  }
}
"#;

#[derive(Debug, Deserialize)]
struct GraphQlResponse {
    data: Option<ResponseData>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct ResponseData {
    organization: Option<Organization>,
}

#[derive(Debug, Deserialize)]
struct Organization {
    repositories: RepositoryConnection,
}

#[derive(Debug, Deserialize)]
struct RepositoryConnection {
    #[serde(default)]
    edges: Vec<RepositoryEdge>,
}

#[derive(Debug, Deserialize)]
struct RepositoryEdge {
    node: RepositoryNode,
}

#[derive(Debug, Deserialize)]
struct RepositoryNode {
    name: String,
    description: Option<String>,
    #[serde(rename = "pushedAt")]
    pushed_at: Option<String>,
}

/// Lists an organization's repositories through the GitHub GraphQL API
pub struct GitHubSource {
    client: Client,
    github: GitHubConfig,
    recency: RecencyFilter,
    exclude: ExcludeFilter,
}

impl GitHubSource {
    /// Create a source from a validated configuration
    pub fn new(config: &Config) -> Result<Self> {
        let client = http_client(config.source.request_timeout())
            .context("Failed to create GitHub HTTP client")?;
        let exclude = ExcludeFilter::new(&config.source.exclude_patterns)
            .context("Invalid exclusion pattern")?;

        Ok(Self {
            client,
            github: config.github.clone(),
            recency: RecencyFilter::new(config.source.pushed_within),
            exclude,
        })
    }

    async fn query_organization(&self) -> Result<Vec<RepositoryNode>, SourceQueryError> {
        let url = &self.github.api_url;
        debug!("Querying repositories of organization {} at {}", self.github.organization, url);

        let response = self
            .client
            .post(url)
            .basic_auth(&self.github.user, Some(&self.github.token))
            .json(&json!({
                "query": ORG_REPOSITORIES_QUERY,
                "variables": { "org": self.github.organization },
            }))
            .send()
            .await
            .map_err(|source| SourceQueryError::Request { provider: PROVIDER, source })?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceQueryError::Status {
                provider: PROVIDER,
                status: status.as_u16(),
                url: url.clone(),
            });
        }

        let body: GraphQlResponse = response.json().await.map_err(|e| SourceQueryError::Payload {
            provider: PROVIDER,
            detail: e.to_string(),
        })?;

        let organization = body.data.and_then(|data| data.organization);
        match organization {
            Some(org) => Ok(org.repositories.edges.into_iter().map(|edge| edge.node).collect()),
            None if !body.errors.is_empty() => Err(SourceQueryError::Query {
                provider: PROVIDER,
                message: body
                    .errors
                    .into_iter()
                    .map(|e| e.message)
                    .collect::<Vec<_>>()
                    .join("; "),
            }),
            None => Err(SourceQueryError::Query {
                provider: PROVIDER,
                message: format!("organization {} not found", self.github.organization),
            }),
        }
    }

    fn clone_url(&self, name: &str) -> Result<String, SourceQueryError> {
        let plain = format!(
            "{}/{}/{}.git",
            self.github.host.trim_end_matches('/'),
            self.github.organization,
            name
        );
        embed_credentials(&plain, &self.github.user, &self.github.token).ok_or_else(|| {
            SourceQueryError::Payload {
                provider: PROVIDER,
                detail: format!("cannot build clone URL for {}", name),
            }
        })
    }

    fn to_repos(&self, nodes: Vec<RepositoryNode>) -> Result<Vec<MirrorRepo>, SourceQueryError> {
        // Never-pushed repositories have no timestamp to compare against.
        let nodes: Vec<RepositoryNode> = if self.recency.within().is_some() {
            nodes
                .into_iter()
                .filter(|node| {
                    if node.pushed_at.is_none() {
                        debug!("Skipping {}, never pushed", node.name);
                    }
                    node.pushed_at.is_some()
                })
                .collect()
        } else {
            nodes
        };

        let nodes = self.recency.apply(nodes, Utc::now(), |node| {
            (node.name.as_str(), node.pushed_at.as_deref().unwrap_or_default())
        })?;

        nodes
            .into_iter()
            .map(|node| {
                let clone_url = self.clone_url(&node.name)?;
                Ok(MirrorRepo::new(
                    node.name,
                    node.description,
                    node.pushed_at.unwrap_or_default(),
                    clone_url,
                ))
            })
            .collect()
    }
}

#[async_trait]
impl RepositorySource for GitHubSource {
    async fn list_repositories(&self) -> Result<Vec<MirrorRepo>, SourceQueryError> {
        let nodes = self.query_organization().await?;
        let total = nodes.len();

        let repos = self.exclude.apply(self.to_repos(nodes)?);

        info!(
            "Found {} repositories in organization {}, {} selected",
            total,
            self.github.organization,
            repos.len()
        );
        Ok(repos)
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER
    }
}
