use crate::github::{ApiError, ApiResult, Release, ReleaseApi};
use crate::manifest::{extract_version, MANIFEST};
use derive_more::Display;
use log::{debug, info, warn};
use semver::Version;
use std::cmp::Ordering;

/// Release identifier resolving to the newest published release
pub const LATEST: &str = "latest";

#[derive(Debug, Display)]
pub enum ResolveError {
    #[display(fmt = "Could not get commit for release '{}' for {}", release, repo)]
    Release { release: String, repo: String },
    #[display(fmt = "Unable to query releases of {}: {}", repo, source)]
    Api { repo: String, source: ApiError },
    #[display(
        fmt = "Could not find a release of {} depending on {} <= {}",
        repo,
        dependency,
        version
    )]
    NoMatchingRelease {
        repo: String,
        dependency: String,
        version: Version,
    },
}

impl std::error::Error for ResolveError {}

pub type ResolveResult<T> = Result<T, ResolveError>;

/// Whether the identifier is taken as a commit hash rather than a tag.
/// This only looks at the shape, so a tag name made of 40 hex digits
/// is treated as a hash too
pub fn is_full_commit_hash(identifier: &str) -> bool {
    identifier.len() == 40 && identifier.chars().all(|c| c.is_ascii_hexdigit())
}

/// Resolves the commit to rebase onto. Full commit hashes are returned
/// as they are without querying anything
pub async fn resolve_target(api: &dyn ReleaseApi, repo: &str, identifier: &str) -> ResolveResult<String> {
    if is_full_commit_hash(identifier) {
        info!("Using '{identifier}' of {repo} as a commit hash");
        return Ok(identifier.to_string());
    }
    commit_for_release(api, repo, identifier).await
}

/// Resolves the commit a release tag (or "latest") points at. Any
/// failure along the way is reported as a single resolution error
pub async fn commit_for_release(api: &dyn ReleaseApi, repo: &str, release: &str) -> ResolveResult<String> {
    let failed = || ResolveError::Release {
        release: release.to_string(),
        repo: repo.to_string(),
    };
    match query_commit(api, repo, release).await {
        Ok(Some(sha)) => Ok(sha),
        Ok(None) => {
            debug!("Release '{release}' of {repo} resolved to an empty hash");
            Err(failed())
        }
        Err(err) => {
            debug!("Resolving release '{release}' of {repo} failed: {err}");
            Err(failed())
        }
    }
}

async fn query_commit(api: &dyn ReleaseApi, repo: &str, release: &str) -> ApiResult<Option<String>> {
    let tag = if release == LATEST {
        api.latest_release(repo).await?.tag_name
    } else {
        release.to_string()
    };
    let object = api.tag_ref(repo, &tag).await?;
    let sha = if object.is_commit() {
        object.sha
    } else {
        api.tag(repo, &object.sha).await?.sha
    };
    Ok(Some(sha).filter(|sha| !sha.is_empty()))
}

/// Release of a dependent repository compatible with a dependency version
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependentRelease {
    pub tag: String,
    pub commit: String,
    /// Version of the dependency the release declares
    pub dependency_version: Version,
}

/// Finds the newest release of `repo` whose manifest declares `dependency`
/// at a version lower than or equal to `target`. Releases whose manifest
/// is missing, answered with an error status or lacks the dependency are
/// skipped. Transport failures abort the search
pub async fn find_dependent_release(
    api: &dyn ReleaseApi,
    repo: &str,
    dependency: &str,
    target: &Version,
) -> ResolveResult<DependentRelease> {
    let releases = api.releases(repo).await.map_err(|source| ResolveError::Api {
        repo: repo.to_string(),
        source,
    })?;
    let releases = newest_first(releases);
    info!("Found {} releases for {repo}", releases.len());

    for release in releases {
        let commit = commit_for_release(api, repo, &release.tag_name).await?;
        let origin = format!("{commit}/{MANIFEST}");
        let manifest = match api.raw_file(repo, &commit, MANIFEST).await {
            Ok(Some(manifest)) => manifest,
            Ok(None) => {
                warn!("Can not get {origin} of {repo}");
                continue;
            }
            // The host answered, just not with the file
            Err(err @ ApiError::Status { .. }) => {
                warn!("Can not get {origin} of {repo}: {err}");
                continue;
            }
            Err(source) => {
                return Err(ResolveError::Api {
                    repo: repo.to_string(),
                    source,
                })
            }
        };
        let version = match extract_version(&manifest, dependency, &origin) {
            Ok(version) => version,
            Err(err) => {
                warn!("{err}");
                continue;
            }
        };
        if version <= *target {
            info!(
                "Found {dependency} {target} >= {version} on release {}",
                release.tag_name
            );
            return Ok(DependentRelease {
                tag: release.tag_name,
                commit,
                dependency_version: version,
            });
        }
        warn!(
            "Wrong {dependency} version on release {}. Info: {version} > {target}",
            release.tag_name
        );
    }

    Err(ResolveError::NoMatchingRelease {
        repo: repo.to_string(),
        dependency: dependency.to_string(),
        version: target.clone(),
    })
}

/// Drops draft releases and orders the rest newest first by publish
/// date. The sort is stable and undated releases go last, so a listing
/// without dates keeps its original order
pub fn newest_first(mut releases: Vec<Release>) -> Vec<Release> {
    releases.retain(|release| !release.draft);
    releases.sort_by(|a, b| match (&a.published_at, &b.published_at) {
        (Some(a), Some(b)) => b.cmp(a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
    releases
}
