use crate::Component;
use std::env;
use std::path::PathBuf;

pub const DEFAULT_API_URL: &str = "https://api.github.com";
pub const DEFAULT_RAW_URL: &str = "https://raw.githubusercontent.com";
pub const DEFAULT_GIT_URL: &str = "https://github.com";
pub const DEFAULT_FORK_OWNER: &str = "unyt-org";

pub const TOKEN_ENV: &str = "GITHUB_TOKEN";
const API_URL_ENV: &str = "GITHUB_API_URL";
const RAW_URL_ENV: &str = "GITHUB_RAW_URL";
const GIT_URL_ENV: &str = "GIT_HOST_URL";

/// Settings shared by every step of a run. Built once at startup
/// and handed to whatever needs it
#[derive(Debug, Clone)]
pub struct Config {
    /// Bearer token sent to the GitHub API when present
    pub token: Option<String>,
    /// Base of the REST API, without the trailing `/repos`
    pub api_url: String,
    /// Base of the raw file content host
    pub raw_url: String,
    /// Base that `owner/name` is appended to for clone and fetch URLs
    pub git_url: String,
    /// Owner of the forks that get cloned by the reset
    pub fork_owner: String,
    /// Directory holding the three working directories
    pub root: PathBuf,
}

impl Config {
    /// Creates a config using the public GitHub endpoints
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            token: None,
            api_url: DEFAULT_API_URL.to_string(),
            raw_url: DEFAULT_RAW_URL.to_string(),
            git_url: DEFAULT_GIT_URL.to_string(),
            fork_owner: DEFAULT_FORK_OWNER.to_string(),
            root: root.into(),
        }
    }

    /// Creates a config from the process environment. Variables
    /// that are unset or empty keep their defaults
    pub fn from_env(root: impl Into<PathBuf>, fork_owner: Option<String>) -> Self {
        let mut config = Self::new(root);
        config.token = env_value(TOKEN_ENV);
        if let Some(url) = env_value(API_URL_ENV) {
            config.api_url = url;
        }
        if let Some(url) = env_value(RAW_URL_ENV) {
            config.raw_url = url;
        }
        if let Some(url) = env_value(GIT_URL_ENV) {
            config.git_url = url;
        }
        if let Some(owner) = fork_owner {
            config.fork_owner = owner;
        }
        config
    }

    /// Local working directory of the component
    pub fn component_dir(&self, component: Component) -> PathBuf {
        self.root.join(component.name)
    }

    /// URL the `upstream` remote of the component points at
    pub fn upstream_url(&self, component: Component) -> String {
        format!("{}/{}.git", trim_base(&self.git_url), component.upstream())
    }

    /// URL the component fork is cloned from
    pub fn fork_url(&self, component: Component) -> String {
        format!(
            "{}/{}/{}",
            trim_base(&self.git_url),
            self.fork_owner,
            component.name
        )
    }
}

fn trim_base(url: &str) -> &str {
    url.trim_end_matches('/')
}

fn env_value(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

#[cfg(test)]
mod test {
    use crate::config::Config;
    use crate::{DENO, DENO_AST, DENO_LINT};
    use std::path::Path;

    #[test]
    fn derives_component_locations() {
        let mut config = Config::new("/work");
        config.git_url = "https://github.com/".to_string();

        assert_eq!(config.component_dir(DENO_AST), Path::new("/work/deno_ast"));
        assert_eq!(
            config.upstream_url(DENO),
            "https://github.com/denoland/deno.git"
        );
        assert_eq!(
            config.fork_url(DENO_LINT),
            "https://github.com/unyt-org/deno_lint"
        );
    }

    #[test]
    fn fork_owner_override() {
        let config = Config::from_env("/work", Some("someone".to_string()));
        assert_eq!(config.fork_owner, "someone");
        assert_eq!(config.fork_url(DENO), format!("{}/someone/deno", config.git_url));
    }
}
