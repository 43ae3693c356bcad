use crate::cmd::{
    capture_command, exit_error, run_command, run_command_format, spawn_command, CommandError,
    Output,
};
use derive_more::{Display, From};
use log::{error, info, warn};
use std::io;
use std::path::Path;

/// Remote the upstream repository is registered as
pub const UPSTREAM_REMOTE: &str = "upstream";
/// Target used when no commit is provided
pub const DEFAULT_TARGET: &str = "upstream/main";
/// Lockfile dropped from every rebased tree
pub const LOCKFILE: &str = "Cargo.lock";
/// Message of the commit removing the lockfile after a clean rebase
pub const REMOVE_LOCKFILE_MESSAGE: &str = "Remove Cargo.lock";

#[derive(Debug, From, Display)]
pub enum GitError {
    #[display(fmt = "IO Error occurred while working with repositories: {}", _0)]
    IO(io::Error),
    #[display(fmt = "Unable to execute git command: {}", _0)]
    Command(CommandError),
    #[from(ignore)]
    #[display(fmt = "Rebase in {} stopped on conflicts besides Cargo.lock: {}", directory, paths)]
    Conflicts { directory: String, paths: String },
}

impl std::error::Error for GitError {}

pub type GitResult<T> = Result<T, GitError>;

/// Result of registering the upstream remote
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteSetup {
    Added,
    AlreadyPresent,
}

/// Result of a rebase that didn't fail outright
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebaseOutcome {
    /// Every commit was replayed
    Completed,
    /// Git stopped with the rebase still in progress
    Stopped,
}

/// Rebases the checkout in `directory` onto `commit` of the upstream
/// repository at `url` and removes the lockfile from the result.
/// `repo` only names the repository in the log
pub async fn rebase_repository(
    repo: &str,
    url: &str,
    directory: &Path,
    commit: Option<&str>,
) -> GitResult<()> {
    let commit = commit.unwrap_or(DEFAULT_TARGET);
    info!("Rebasing {repo} to commit {commit}...");

    if add_upstream_remote(directory, url).await? == RemoteSetup::AlreadyPresent {
        warn!("Remote {UPSTREAM_REMOTE} for {repo} does already exist");
    }
    fetch_upstream(directory).await?;
    let outcome = rebase_onto(directory, commit).await?;
    remove_lockfile(directory, outcome).await?;

    info!("Successfully rebased {repo} to commit {commit}");
    Ok(())
}

/// Registers the `upstream` remote. An existing remote of that name is
/// left as it is and reported instead of failing
pub async fn add_upstream_remote(directory: &Path, url: &str) -> GitResult<RemoteSetup> {
    let captured =
        capture_command(directory, "git remote add {0} {1}", &[UPSTREAM_REMOTE, url]).await?;
    if captured.status.success() {
        return Ok(RemoteSetup::Added);
    }
    if captured.stderr.contains("already exists") {
        return Ok(RemoteSetup::AlreadyPresent);
    }
    error!("{}", captured.stderr.trim_end());
    Err(exit_error(&captured.command, captured.status).into())
}

pub async fn fetch_upstream(directory: &Path) -> GitResult<()> {
    run_command_format(
        directory,
        "git fetch {0} --tags",
        &[UPSTREAM_REMOTE],
        Output::Quiet,
    )
    .await?;
    Ok(())
}

/// Rebases the current branch onto `commit` favoring the side of the
/// replayed commits on conflicting hunks
pub async fn rebase_onto(directory: &Path, commit: &str) -> GitResult<RebaseOutcome> {
    let (command, status) =
        spawn_command(directory, "git rebase -X theirs {0}", &[commit], Output::Inherit).await?;
    if status.success() {
        return Ok(RebaseOutcome::Completed);
    }
    if rebase_in_progress(directory).await? {
        return Ok(RebaseOutcome::Stopped);
    }
    Err(exit_error(&command, status).into())
}

/// Removes the lockfile from the rebased tree. A stopped rebase is
/// continued for as long as the lockfile is the only conflicting path
pub async fn remove_lockfile(directory: &Path, outcome: RebaseOutcome) -> GitResult<()> {
    if outcome == RebaseOutcome::Stopped {
        continue_rebase(directory).await?;
    }

    run_command(directory, "git rm -q --ignore-unmatch {0}", &[LOCKFILE]).await?;
    if has_staged_changes(directory).await? {
        run_command(directory, "git commit -q -m {0}", &[REMOVE_LOCKFILE_MESSAGE]).await?;
    }
    Ok(())
}

async fn continue_rebase(directory: &Path) -> GitResult<()> {
    while rebase_in_progress(directory).await? {
        let unmerged = unmerged_paths(directory).await?;
        let conflicts: Vec<String> = unmerged
            .into_iter()
            .filter(|path| path != LOCKFILE)
            .collect();
        if !conflicts.is_empty() {
            return Err(GitError::Conflicts {
                directory: directory.display().to_string(),
                paths: conflicts.join(", "),
            });
        }

        run_command(directory, "git rm -q --ignore-unmatch {0}", &[LOCKFILE]).await?;
        let (command, status) = spawn_command(
            directory,
            "git -c core.editor=true rebase --continue",
            &[],
            Output::Inherit,
        )
        .await?;
        // A failed continue is only retried when it stopped on the next commit
        if !status.success() && unmerged_paths(directory).await?.is_empty() {
            return Err(exit_error(&command, status).into());
        }
    }
    Ok(())
}

/// Checks for the state directories git keeps while a rebase is running
pub async fn rebase_in_progress(directory: &Path) -> GitResult<bool> {
    for state in ["rebase-merge", "rebase-apply"] {
        let captured = capture_command(directory, "git rev-parse --git-path {0}", &[state])
            .await?
            .check()?;
        if directory.join(captured.stdout.trim()).exists() {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Paths with unresolved conflicts
pub async fn unmerged_paths(directory: &Path) -> GitResult<Vec<String>> {
    let captured = capture_command(directory, "git diff --name-only --diff-filter=U", &[])
        .await?
        .check()?;
    Ok(captured
        .stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}

async fn has_staged_changes(directory: &Path) -> GitResult<bool> {
    let captured = capture_command(directory, "git diff --cached --quiet", &[]).await?;
    match captured.status.code() {
        Some(0) => Ok(false),
        Some(1) => Ok(true),
        _ => {
            captured.check()?;
            Ok(false)
        }
    }
}

/// Logs the status of the checkout prefixed with `name`
pub async fn status(directory: &Path, name: &'static str) -> GitResult<()> {
    run_command_format(directory, "git status", &[], Output::Log(name)).await?;
    Ok(())
}

/// Stages and commits the regenerated lockfile
pub async fn commit_lockfile(directory: &Path, message: &str) -> GitResult<()> {
    run_command(directory, "git add {0}", &[LOCKFILE]).await?;
    run_command(directory, "git commit -q -m {0}", &[message]).await?;
    Ok(())
}

/// Overwrites the branch of the same name on the fork
pub async fn force_push(directory: &Path) -> GitResult<()> {
    run_command(directory, "git push --force origin HEAD", &[]).await?;
    Ok(())
}

/// Clones `url` into `name` inside of `root`
pub async fn clone(root: &Path, url: &str, name: &str) -> GitResult<()> {
    info!("Cloning {url} into {name}");
    run_command(root, "git clone {0} {1}", &[url, name]).await?;
    Ok(())
}
