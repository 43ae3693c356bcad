use clap::Parser;
use fork_rebase::cli::{self, WorkspaceArgs};
use fork_rebase::reset;
use fork_rebase::SyncResult;
use std::process::ExitCode;

/// Deletes the deno, deno_ast and deno_lint checkouts and clones the forks again
#[derive(Debug, Parser)]
#[command(name = "reset", version)]
struct Arguments {
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
    let config = arguments.workspace.into_config()?;
    reset::run(&config).await
}
