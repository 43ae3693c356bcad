use clap::Parser;
use fork_rebase::cli::{self, WorkspaceArgs};
use fork_rebase::config::TOKEN_ENV;
use fork_rebase::github::GithubClient;
use fork_rebase::rebase::{self, LintSource, RebaseOptions};
use fork_rebase::release::LATEST;
use fork_rebase::SyncResult;
use log::{info, warn};
use std::process::ExitCode;

/// Rebases the deno, deno_ast and deno_lint forks onto a release of denoland/deno
#[derive(Debug, Parser)]
#[command(name = "rebase", version)]
struct Arguments {
    /// Release of denoland/deno: "latest", a tag name or a full commit hash
    #[arg(default_value = LATEST)]
    release: String,
    /// Force-push the rebased forks
    #[arg(long)]
    push: bool,
    /// How the deno_lint release is chosen
    #[arg(long, value_enum, default_value = "declared")]
    lint_source: LintSource,
    #[command(flatten)]
    workspace: WorkspaceArgs,
}

#[tokio::main]
async fn main() -> ExitCode {
    cli::init();
    let arguments = Arguments::parse();
    cli::exit_code(run(arguments).await)
}

async fn run(arguments: Arguments) -> SyncResult<()> {
    info!("Starting rebase action...");
    let config = arguments.workspace.into_config()?;
    if config.token.is_none() {
        warn!("No {TOKEN_ENV} configured: You may want to add the token as repository secret.");
    }

    let api = GithubClient::new(&config)?;
    let options = RebaseOptions {
        release: arguments.release,
        lint_source: arguments.lint_source,
        push: arguments.push,
    };
    rebase::run(&config, &api, &options).await
}
