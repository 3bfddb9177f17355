use cc_mirror::cli::{self, GitLabCli};
use clap::Parser;
use std::process::ExitCode;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    cli::run_gitlab(GitLabCli::parse()).await
}
