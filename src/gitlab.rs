use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info};

use crate::config::{Config, GitLabConfig};
use crate::discovery::{embed_credentials, http_client, ExcludeFilter, MirrorRepo, RecencyFilter, RepositorySource};
use crate::error::SourceQueryError;

const PROVIDER: &str = "GitLab";

/// Entry of `GET /api/v4/groups/:id/projects?simple=true`
#[derive(Debug, Clone, Deserialize)]
struct GroupProject {
    name: String,
    description: Option<String>,
    last_activity_at: String,
    http_url_to_repo: String,
    path_with_namespace: String,
}

/// Lists the projects of one or more GitLab groups
pub struct GitLabSource {
    client: Client,
    gitlab: GitLabConfig,
    recency: RecencyFilter,
    exclude: ExcludeFilter,
}

impl GitLabSource {
    /// Create a source from a validated configuration
    pub fn new(config: &Config) -> Result<Self> {
        let client = http_client(config.source.request_timeout())
            .context("Failed to create GitLab HTTP client")?;
        let exclude = ExcludeFilter::new(&config.source.exclude_patterns)
            .context("Invalid exclusion pattern")?;

        Ok(Self {
            client,
            gitlab: config.gitlab.clone(),
            recency: RecencyFilter::new(config.source.pushed_within),
            exclude,
        })
    }

    fn projects_url(&self, group_id: &str) -> String {
        format!(
            "{}/api/v4/groups/{}/projects?simple=true&order_by=last_activity_at",
            self.gitlab.host.trim_end_matches('/'),
            group_id
        )
    }

    async fn list_group(&self, group_id: &str) -> Result<Vec<GroupProject>, SourceQueryError> {
        let url = self.projects_url(group_id);
        debug!("Fetching projects for group {}", group_id);

        let response = self
            .client
            .get(&url)
            .header("private-token", &self.gitlab.token)
            .send()
            .await
            .map_err(|source| SourceQueryError::Request { provider: PROVIDER, source })?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceQueryError::Status {
                provider: PROVIDER,
                status: status.as_u16(),
                url,
            });
        }

        let projects: Vec<GroupProject> = response.json().await.map_err(|e| SourceQueryError::Payload {
            provider: PROVIDER,
            detail: e.to_string(),
        })?;

        debug!("Group {} has {} projects", group_id, projects.len());
        Ok(projects)
    }

    fn to_repo(&self, project: GroupProject) -> Result<MirrorRepo, SourceQueryError> {
        let clone_url = embed_credentials(&project.http_url_to_repo, "gitlab-ci-token", &self.gitlab.token)
            .ok_or_else(|| SourceQueryError::Payload {
                provider: PROVIDER,
                detail: format!("invalid http_url_to_repo {:?}", project.http_url_to_repo),
            })?;

        let description = format!(
            "{}\n{}",
            project.path_with_namespace,
            project.description.unwrap_or_default()
        );

        Ok(MirrorRepo::new(
            project.name,
            Some(description),
            project.last_activity_at,
            clone_url,
        ))
    }
}

#[async_trait]
impl RepositorySource for GitLabSource {
    /// A failure on any group aborts the whole listing
    async fn list_repositories(&self) -> Result<Vec<MirrorRepo>, SourceQueryError> {
        let mut projects = Vec::new();
        for group_id in &self.gitlab.groups {
            projects.extend(self.list_group(group_id).await?);
        }
        let total = projects.len();

        let projects = self.recency.apply(projects, Utc::now(), |project| {
            (project.name.as_str(), project.last_activity_at.as_str())
        })?;

        let repos = projects
            .into_iter()
            .map(|project| self.to_repo(project))
            .collect::<Result<Vec<_>, _>>()?;
        let repos = self.exclude.apply(repos);

        info!(
            "Found {} projects in {} groups, {} selected",
            total,
            self.gitlab.groups.len(),
            repos.len()
        );
        Ok(repos)
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER
    }
}
