use cc_mirror::cli::{self, GitHubCli};
use clap::Parser;
use std::process::ExitCode;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    cli::run_github(GitHubCli::parse()).await
}
