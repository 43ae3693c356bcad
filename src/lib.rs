use derive_more::{Display, From};
use log::error;
use std::fmt;
use std::io;

pub mod cli;
pub mod cmd;
pub mod config;
pub(crate) mod fs;
pub mod git;
pub mod github;
pub mod manifest;
pub mod rebase;
pub mod release;
pub mod reset;

use crate::cmd::CommandError;
use crate::git::GitError;
use crate::github::ApiError;
use crate::manifest::ManifestError;
use crate::release::ResolveError;

/// Owner of the repositories the forks track
pub const UPSTREAM_OWNER: &str = "denoland";

/// One of the synchronized projects. Its name is also the name of
/// the repository and of the local working directory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Component {
    pub name: &'static str,
}

impl Component {
    /// `owner/name` reference of the upstream repository
    pub fn upstream(&self) -> String {
        format!("{UPSTREAM_OWNER}/{}", self.name)
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// The runtime
pub const DENO: Component = Component { name: "deno" };
/// The AST/parser library of the runtime
pub const DENO_AST: Component = Component { name: "deno_ast" };
/// The linter of the runtime
pub const DENO_LINT: Component = Component { name: "deno_lint" };

pub const COMPONENTS: [Component; 3] = [DENO, DENO_AST, DENO_LINT];

#[derive(Debug, From, Display)]
pub enum SyncError {
    #[display(fmt = "{}", _0)]
    Command(CommandError),
    #[display(fmt = "{}", _0)]
    Git(GitError),
    #[display(fmt = "{}", _0)]
    Api(ApiError),
    #[display(fmt = "{}", _0)]
    Resolve(ResolveError),
    #[display(fmt = "{}", _0)]
    Manifest(ManifestError),
    #[display(fmt = "IO Error: {}", _0)]
    IO(io::Error),
}

impl std::error::Error for SyncError {}

pub type SyncResult<T> = Result<T, SyncError>;

/// Logs every failure of a finished fan-out and returns the first one
pub(crate) fn first_failure<E>(results: impl IntoIterator<Item = Result<(), E>>) -> SyncResult<()>
where
    E: Into<SyncError>,
{
    let mut first = None;
    for result in results {
        if let Err(err) = result {
            let err: SyncError = err.into();
            error!("{err}");
            first.get_or_insert(err);
        }
    }
    match first {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

#[cfg(test)]
mod test {
    use crate::{first_failure, SyncError, DENO_LINT};
    use std::io;

    #[test]
    fn component_references() {
        assert_eq!(DENO_LINT.upstream(), "denoland/deno_lint");
        assert_eq!(DENO_LINT.to_string(), "deno_lint");
    }

    #[test]
    fn first_failure_is_reported() {
        let results: Vec<io::Result<()>> = vec![
            Ok(()),
            Err(io::Error::new(io::ErrorKind::Other, "first")),
            Err(io::Error::new(io::ErrorKind::Other, "second")),
        ];
        match first_failure(results) {
            Err(SyncError::IO(err)) => assert_eq!(err.to_string(), "first"),
            other => panic!("unexpected result: {other:?}"),
        }
        assert!(first_failure(Vec::<io::Result<()>>::new()).is_ok());
    }
}
