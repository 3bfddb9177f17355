//! Command line surface shared by `gh-cc-mirror` and `gl-cc-mirror`
//!
//! Every value can come from a flag, an environment variable, or the YAML
//! config file, in that order of precedence. Missing or invalid settings
//! are reported the way clap reports usage errors (exit code 2).

use clap::error::ErrorKind;
use clap::{Args, CommandFactory, Parser};
use std::fmt::Display;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::codecommit::{CodeCommitCatalog, MirrorRegistry};
use crate::config::{parse_group_list, Config, LoggingConfig, SourceKind};
use crate::discovery::RepositorySource;
use crate::error::ConfigError;
use crate::git::GitClient;
use crate::github::GitHubSource;
use crate::gitlab::GitLabSource;
use crate::sync::SyncEngine;

/// Options shared by both entry points
#[derive(Args, Debug, Default)]
pub struct CommonArgs {
    /// CodeCommit user name
    #[arg(long, env = "CC_USER")]
    pub cc_user: Option<String>,

    /// CodeCommit password
    #[arg(long, env = "CC_PASSWORD", hide_env_values = true)]
    pub cc_password: Option<String>,

    /// Working directory
    #[arg(long)]
    pub dir: Option<String>,

    /// Prefix for CodeCommit repository name
    #[arg(long)]
    pub prefix: Option<String>,

    /// AWS access key
    #[arg(long)]
    pub aws_access_key: Option<String>,

    /// AWS secret access key
    #[arg(long)]
    pub aws_secret_access_key: Option<String>,

    /// AWS region [default: eu-central-1]
    #[arg(long)]
    pub aws_region: Option<String>,

    /// Limit repositories to changes pushed within the given period, in minutes
    #[arg(long, value_name = "MINUTES")]
    pub pushed_within: Option<u64>,

    /// Skip repositories whose name matches this pattern (`*` wildcard, repeatable)
    #[arg(long, value_name = "PATTERN")]
    pub exclude: Vec<String>,

    /// Timeout for source API requests, in seconds [default: 60]
    #[arg(long, value_name = "SECONDS")]
    pub request_timeout: Option<u64>,

    /// Configuration file path (defaults to XDG config location)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Exit non-zero when any repository failed to mirror
    #[arg(long)]
    pub strict: bool,
}

impl CommonArgs {
    fn apply(&self, config: &mut Config) {
        if let Some(user) = &self.cc_user {
            config.codecommit.user = user.clone();
        }
        if let Some(password) = &self.cc_password {
            config.codecommit.password = password.clone();
        }
        if let Some(dir) = &self.dir {
            config.work_dir = dir.clone();
        }
        if let Some(prefix) = &self.prefix {
            config.codecommit.prefix = prefix.clone();
        }
        if let Some(key) = &self.aws_access_key {
            config.codecommit.aws_access_key = Some(key.clone());
        }
        if let Some(secret) = &self.aws_secret_access_key {
            config.codecommit.aws_secret_access_key = Some(secret.clone());
        }
        if let Some(region) = &self.aws_region {
            config.codecommit.region = region.clone();
        }
        if self.pushed_within.is_some() {
            config.source.pushed_within = self.pushed_within;
        }
        config.source.exclude_patterns.extend(self.exclude.iter().cloned());
        if let Some(timeout) = self.request_timeout {
            config.source.request_timeout = timeout;
        }
    }
}

/// GitHub organization options
#[derive(Args, Debug, Default)]
pub struct GitHubArgs {
    /// Github user account
    #[arg(long, env = "GITHUB_USER")]
    pub github_user: Option<String>,

    /// Github personal API access token
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    pub github_token: Option<String>,

    /// Github organization
    #[arg(long, env = "GITHUB_ORGANIZATION")]
    pub github_organization: Option<String>,

    /// GraphQL endpoint, for GitHub Enterprise [default: https://api.github.com/graphql]
    #[arg(long)]
    pub github_api_url: Option<String>,

    /// Base URL to clone from, for GitHub Enterprise [default: https://github.com]
    #[arg(long)]
    pub github_host: Option<String>,
}

impl GitHubArgs {
    fn apply(&self, config: &mut Config) {
        if let Some(user) = &self.github_user {
            config.github.user = user.clone();
        }
        if let Some(token) = &self.github_token {
            config.github.token = token.clone();
        }
        if let Some(org) = &self.github_organization {
            config.github.organization = org.clone();
        }
        if let Some(url) = &self.github_api_url {
            config.github.api_url = url.clone();
        }
        if let Some(host) = &self.github_host {
            config.github.host = host.clone();
        }
    }
}

/// GitLab group options
#[derive(Args, Debug, Default)]
pub struct GitLabArgs {
    /// Gitlab personal API access token
    #[arg(long, env = "GITLAB_TOKEN", hide_env_values = true)]
    pub gitlab_token: Option<String>,

    /// Gitlab groups, comma-separated string of group ids
    #[arg(long, env = "GITLAB_GROUPS")]
    pub gitlab_groups: Option<String>,

    /// Gitlab host [default: https://gitlab.com]
    #[arg(long)]
    pub gitlab_host: Option<String>,
}

impl GitLabArgs {
    fn apply(&self, config: &mut Config) {
        if let Some(token) = &self.gitlab_token {
            config.gitlab.token = token.clone();
        }
        if let Some(groups) = &self.gitlab_groups {
            config.gitlab.groups = parse_group_list(groups);
        }
        if let Some(host) = &self.gitlab_host {
            config.gitlab.host = host.clone();
        }
    }
}

/// Mirror all repositories of an organization from Github to AWS CodeCommit.
///
/// This command is intended to run as a cronjob, typically.
#[derive(Parser, Debug)]
#[command(name = "gh-cc-mirror", version)]
pub struct GitHubCli {
    #[command(flatten)]
    pub github: GitHubArgs,

    #[command(flatten)]
    pub common: CommonArgs,
}

/// Mirror all repositories of groups from Gitlab to AWS CodeCommit.
///
/// This command is intended to run as a cronjob, typically.
#[derive(Parser, Debug)]
#[command(name = "gl-cc-mirror", version)]
pub struct GitLabCli {
    #[command(flatten)]
    pub gitlab: GitLabArgs,

    #[command(flatten)]
    pub common: CommonArgs,
}

/// Initialize logging based on verbosity level and configured format
pub fn init_logging(verbose: bool, logging: &LoggingConfig) {
    let level = if verbose { "debug" } else { logging.level.as_str() };
    // The AWS SDK is chatty at info level.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "{},aws_config=error,aws_smithy_runtime=error,aws_smithy_runtime_api=error",
            level
        ))
    });

    let registry = tracing_subscriber::registry().with(filter);
    if logging.format == "json" {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }
}

/// Report a configuration problem the way clap reports usage errors
fn exit_with_config_error<P: CommandFactory>(err: impl Display, kind: ErrorKind) -> ! {
    P::command().error(kind, err).exit()
}

fn exit_with_invalid_config<P: CommandFactory>(err: ConfigError) -> ! {
    let kind = match err {
        ConfigError::Missing(_) => ErrorKind::MissingRequiredArgument,
        ConfigError::Invalid { .. } => ErrorKind::ValueValidation,
    };
    exit_with_config_error::<P>(err, kind)
}

/// Merge file and command line configuration, then validate it
fn resolve_config<P: CommandFactory>(
    common: &CommonArgs,
    kind: SourceKind,
    apply_source: impl FnOnce(&mut Config),
) -> Config {
    let mut config = match Config::load_or_default(common.config.as_deref()) {
        Ok(config) => config,
        Err(e) => exit_with_config_error::<P>(format!("{:#}", e), ErrorKind::Io),
    };

    apply_source(&mut config);
    common.apply(&mut config);

    if let Err(e) = config.expand_paths().and_then(|_| config.validate(kind)) {
        exit_with_invalid_config::<P>(e);
    }
    config
}

/// Entry point of `gh-cc-mirror`
pub async fn run_github(cli: GitHubCli) -> ExitCode {
    let config = resolve_config::<GitHubCli>(&cli.common, SourceKind::GitHub, |c| cli.github.apply(c));
    init_logging(cli.common.verbose, &config.logging);

    match GitHubSource::new(&config) {
        Ok(source) => run(Box::new(source), &config, cli.common.strict).await,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// Entry point of `gl-cc-mirror`
pub async fn run_gitlab(cli: GitLabCli) -> ExitCode {
    let config = resolve_config::<GitLabCli>(&cli.common, SourceKind::GitLab, |c| cli.gitlab.apply(c));
    init_logging(cli.common.verbose, &config.logging);

    match GitLabSource::new(&config) {
        Ok(source) => run(Box::new(source), &config, cli.common.strict).await,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// Wire the source to CodeCommit and run one sync
async fn run(source: Box<dyn RepositorySource>, config: &Config, strict: bool) -> ExitCode {
    info!("Starting cc-mirror v{}", env!("CARGO_PKG_VERSION"));

    if let Err(e) = tokio::fs::create_dir_all(&config.work_dir).await {
        error!("Cannot create working directory {}: {}", config.work_dir, e);
        return ExitCode::FAILURE;
    }
    info!("Working directory: {}", config.work_dir);

    let catalog = CodeCommitCatalog::new(config).await;
    let registry = MirrorRegistry::new(catalog, GitClient::new(&config.work_dir), config.codecommit.prefix.clone());
    let mut engine = SyncEngine::new(source, registry);

    match engine.run().await {
        Ok(summary) if strict && summary.has_failures() => {
            error!(
                "{} of {} repositories failed to mirror",
                summary.failed, summary.total_repositories
            );
            ExitCode::FAILURE
        }
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Listing repositories failed: {}", e);
            ExitCode::FAILURE
        }
    }
}
