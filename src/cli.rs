//! Pieces shared by the `rebase` and `reset` binaries

use crate::config::Config;
use crate::SyncResult;
use clap::Args;
use env_logger::WriteStyle;
use log::{error, LevelFilter};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Clone, Args)]
pub struct WorkspaceArgs {
    /// Directory holding the deno, deno_ast and deno_lint checkouts
    #[arg(long)]
    pub root: Option<PathBuf>,
    /// Owner of the forks on the git host
    #[arg(long, env = "FORK_OWNER")]
    pub fork_owner: Option<String>,
}

impl WorkspaceArgs {
    /// Builds the config from these arguments and the environment,
    /// using the current directory when no root was given
    pub fn into_config(self) -> SyncResult<Config> {
        let root = match self.root {
            Some(root) => root,
            None => std::env::current_dir()?,
        };
        Ok(Config::from_env(root, self.fork_owner))
    }
}

/// Loads a `.env` file when there is one and installs the logger.
/// Info level unless `RUST_LOG` says otherwise
pub fn init() {
    dotenv::dotenv().ok();
    env_logger::builder()
        .write_style(WriteStyle::Auto)
        .filter_level(LevelFilter::Info)
        .parse_default_env()
        .init();
}

/// Logs the error of a failed run and turns the result into the
/// exit code of the process
pub fn exit_code(result: SyncResult<()>) -> ExitCode {
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err}");
            ExitCode::FAILURE
        }
    }
}
