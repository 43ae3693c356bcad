//! Rebases the three forks onto a release of the runtime. The runtime
//! is rebased first, its manifests then decide which releases of the
//! AST library and the linter the other two forks are rebased onto.

use crate::config::Config;
use crate::git::{self, LOCKFILE};
use crate::github::ReleaseApi;
use crate::manifest::{read_version, MANIFEST};
use crate::release::{commit_for_release, find_dependent_release, resolve_target, LATEST};
use crate::{cmd, first_failure, Component, SyncResult, COMPONENTS, DENO, DENO_AST, DENO_LINT};
use log::info;
use semver::Version;

/// Message of the commit adding the regenerated lockfile
pub const LOCKFILE_MESSAGE: &str = "Update Cargo.lock";

/// Where the linter release to rebase onto comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum LintSource {
    /// The linter version declared by the runtime CLI manifest
    #[default]
    Declared,
    /// The newest linter release depending on the runtime's AST version
    AstCompatible,
}

#[derive(Debug, Clone)]
pub struct RebaseOptions {
    /// Release of the runtime: "latest", a tag or a full commit hash
    pub release: String,
    pub lint_source: LintSource,
    /// Force-push the rebased forks
    pub push: bool,
}

impl Default for RebaseOptions {
    fn default() -> Self {
        Self {
            release: LATEST.to_string(),
            lint_source: LintSource::default(),
            push: false,
        }
    }
}

pub async fn run(config: &Config, api: &dyn ReleaseApi, options: &RebaseOptions) -> SyncResult<()> {
    info!("Migrating to {} tag {}", DENO.upstream(), options.release);
    let deno_commit = resolve_target(api, &DENO.upstream(), &options.release).await?;
    info!("Commit hash for {}: {deno_commit}", DENO.upstream());
    rebase_component(config, DENO, &deno_commit).await?;

    let deno_dir = config.component_dir(DENO);
    let ast_version = read_version(&deno_dir.join(MANIFEST), DENO_AST.name).await?;
    info!("Using {DENO_AST} version {ast_version}");
    let ast_commit = commit_for_release(api, &DENO_AST.upstream(), &ast_version.to_string()).await?;
    info!("Commit hash for {}: {ast_commit}", DENO_AST.upstream());
    rebase_component(config, DENO_AST, &ast_commit).await?;

    let lint_commit = lint_commit(config, api, &ast_version, options.lint_source).await?;
    info!("Commit hash for {}: {lint_commit}", DENO_LINT.upstream());
    rebase_component(config, DENO_LINT, &lint_commit).await?;

    for component in COMPONENTS {
        git::status(&config.component_dir(component), component.name).await?;
    }

    if options.push {
        push_dependencies(config).await?;
    } else {
        info!("Skipping push of {DENO_AST} and {DENO_LINT}, pass --push to force-push them");
    }
    update_lockfile(config, options.push).await?;

    info!("Successfully rebased the core repos");
    Ok(())
}

async fn rebase_component(config: &Config, component: Component, commit: &str) -> SyncResult<()> {
    git::rebase_repository(
        &component.upstream(),
        &config.upstream_url(component),
        &config.component_dir(component),
        Some(commit),
    )
    .await?;
    Ok(())
}

/// Resolves the linter commit the linter fork is rebased onto
pub async fn lint_commit(
    config: &Config,
    api: &dyn ReleaseApi,
    ast_version: &Version,
    source: LintSource,
) -> SyncResult<String> {
    let repo = DENO_LINT.upstream();
    match source {
        LintSource::Declared => {
            let manifest = config.component_dir(DENO).join("cli").join(MANIFEST);
            let lint_version = read_version(&manifest, DENO_LINT.name).await?;
            info!("Using {DENO_LINT} version {lint_version}");
            Ok(commit_for_release(api, &repo, &lint_version.to_string()).await?)
        }
        LintSource::AstCompatible => {
            let release = find_dependent_release(api, &repo, DENO_AST.name, ast_version).await?;
            info!("Corresponding {repo} tag {}", release.tag);
            Ok(release.commit)
        }
    }
}

/// Force-pushes the AST library and the linter at the same time. Both
/// pushes run to completion even when the other one fails
async fn push_dependencies(config: &Config) -> SyncResult<()> {
    let ast_dir = config.component_dir(DENO_AST);
    let lint_dir = config.component_dir(DENO_LINT);
    info!("Force-pushing {DENO_AST} and {DENO_LINT}");
    let (ast, lint) = tokio::join!(git::force_push(&ast_dir), git::force_push(&lint_dir));
    first_failure([ast, lint])
}

/// Regenerates the runtime lockfile and commits it
async fn update_lockfile(config: &Config, push: bool) -> SyncResult<()> {
    let deno_dir = config.component_dir(DENO);
    info!("Regenerating {LOCKFILE} of {DENO}");
    cmd::run_command(&deno_dir, "cargo update", &[]).await?;
    git::commit_lockfile(&deno_dir, LOCKFILE_MESSAGE).await?;
    if push {
        info!("Force-pushing {DENO}");
        git::force_push(&deno_dir).await?;
    } else {
        info!("Skipping push of {DENO}");
    }
    Ok(())
}
