//! Narrow read-only client for the GitHub REST API and the raw
//! file host. Only the release and tag queries needed to find the
//! commits to rebase onto are implemented.

use crate::config::Config;
use async_trait::async_trait;
use derive_more::{Display, From};
use log::debug;
use reqwest::{header, Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;

/// Repository used for requests that don't name one
pub const DEFAULT_REPOSITORY: &str = "denoland/deno";

const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));
const ACCEPT: &str = "application/vnd.github+json";

#[derive(Debug, From, Display)]
pub enum ApiError {
    #[display(fmt = "[Request error] {}", _0)]
    Transport(reqwest::Error),
    #[from(ignore)]
    #[display(fmt = "[Request error] {}: {}", status, message)]
    Status { status: u16, message: String },
}

impl std::error::Error for ApiError {}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    /// Creates the error for a non-success response. The `message` field
    /// of a JSON body is preferred, then the canonical reason of the
    /// status, then the literal "empty"
    pub fn from_response(status: StatusCode, body: &str) -> Self {
        #[derive(Deserialize)]
        struct ErrorBody {
            message: Option<String>,
        }

        let message = serde_json::from_str::<ErrorBody>(body)
            .ok()
            .and_then(|body| body.message)
            .filter(|message| !message.is_empty())
            .or_else(|| status.canonical_reason().map(str::to_string))
            .unwrap_or_else(|| "empty".to_string());
        ApiError::Status {
            status: status.as_u16(),
            message,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Release {
    pub tag_name: String,
    #[serde(default)]
    pub published_at: Option<String>,
    #[serde(default)]
    pub draft: bool,
}

/// Object a tag reference or an annotated tag points at
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GitObject {
    #[serde(rename = "type")]
    pub kind: String,
    pub sha: String,
}

impl GitObject {
    pub fn is_commit(&self) -> bool {
        self.kind == "commit"
    }
}

#[derive(Deserialize)]
struct ObjectEnvelope {
    object: GitObject,
}

/// The queries the release resolution is built on
#[async_trait]
pub trait ReleaseApi: Send + Sync {
    /// `GET /repos/{repo}/releases/latest`
    async fn latest_release(&self, repo: &str) -> ApiResult<Release>;

    /// `GET /repos/{repo}/releases`
    async fn releases(&self, repo: &str) -> ApiResult<Vec<Release>>;

    /// `GET /repos/{repo}/git/ref/tags/{tag}`
    async fn tag_ref(&self, repo: &str, tag: &str) -> ApiResult<GitObject>;

    /// `GET /repos/{repo}/git/tags/{sha}`, the object an annotated tag points at
    async fn tag(&self, repo: &str, sha: &str) -> ApiResult<GitObject>;

    /// Contents of a file at a commit, `None` when the file doesn't exist
    async fn raw_file(&self, repo: &str, commit: &str, path: &str) -> ApiResult<Option<String>>;
}

pub struct GithubClient {
    client: Client,
    api_url: String,
    raw_url: String,
    token: Option<String>,
}

impl GithubClient {
    pub fn new(config: &Config) -> ApiResult<Self> {
        let client = Client::builder().user_agent(USER_AGENT).build()?;
        Ok(Self {
            client,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            raw_url: config.raw_url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
        })
    }

    /// Requests `route` relative to the repository, authenticated when
    /// a token is configured, and parses the JSON response body
    pub async fn request<T: DeserializeOwned>(&self, route: &str, repo: Option<&str>) -> ApiResult<T> {
        let repo = repo.unwrap_or(DEFAULT_REPOSITORY);
        let url = format!("{}/repos/{}{}", self.api_url, repo, route);
        debug!("GET {url}");

        let mut request = self.client.get(&url).header(header::ACCEPT, ACCEPT);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::from_response(status, &body));
        }
        Ok(response.json().await?)
    }
}

#[async_trait]
impl ReleaseApi for GithubClient {
    async fn latest_release(&self, repo: &str) -> ApiResult<Release> {
        self.request("/releases/latest", Some(repo)).await
    }

    async fn releases(&self, repo: &str) -> ApiResult<Vec<Release>> {
        self.request("/releases?per_page=100", Some(repo)).await
    }

    async fn tag_ref(&self, repo: &str, tag: &str) -> ApiResult<GitObject> {
        let envelope: ObjectEnvelope = self
            .request(&format!("/git/ref/tags/{tag}"), Some(repo))
            .await?;
        Ok(envelope.object)
    }

    async fn tag(&self, repo: &str, sha: &str) -> ApiResult<GitObject> {
        let envelope: ObjectEnvelope = self
            .request(&format!("/git/tags/{sha}"), Some(repo))
            .await?;
        Ok(envelope.object)
    }

    async fn raw_file(&self, repo: &str, commit: &str, path: &str) -> ApiResult<Option<String>> {
        let url = format!("{}/{repo}/{commit}/{path}", self.raw_url);
        debug!("GET {url}");

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::from_response(status, &body));
        }
        Ok(Some(response.text().await?))
    }
}


#[cfg(test)]
mod test {
    use crate::config::Config;
    use crate::github::{ApiError, GitObject, GithubClient, Release, ReleaseApi};
    use reqwest::StatusCode;
    use std::sync::{Arc, Mutex};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    type Route = (&'static str, &'static str, &'static str);

    /// Answers every request on a local port with the canned status and
    /// body of its path. Returns the base URL and the request heads seen
    async fn serve(routes: Vec<Route>) -> (String, Arc<Mutex<Vec<String>>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let requests = Arc::new(Mutex::new(Vec::new()));
        let seen = requests.clone();
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let mut head = Vec::new();
                let mut buffer = [0u8; 1024];
                while !head.windows(4).any(|window| window == b"\r\n\r\n") {
                    let read = socket.read(&mut buffer).await.unwrap();
                    if read == 0 {
                        break;
                    }
                    head.extend_from_slice(&buffer[..read]);
                }
                let head = String::from_utf8_lossy(&head).to_string();
                let path = head.split_whitespace().nth(1).unwrap_or_default().to_string();
                seen.lock().unwrap().push(head);

                let (status, body) = routes
                    .iter()
                    .find(|(route, ..)| *route == path)
                    .map(|(_, status, body)| (*status, *body))
                    .unwrap_or(("404 Not Found", ""));
                let response = format!(
                    "HTTP/1.1 {status}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                socket.write_all(response.as_bytes()).await.unwrap();
                let _ = socket.shutdown().await;
            }
        });
        (url, requests)
    }

    fn client(url: &str, token: Option<&str>) -> GithubClient {
        let mut config = Config::new("work");
        config.api_url = format!("{url}/");
        config.raw_url = url.to_string();
        config.token = token.map(str::to_string);
        GithubClient::new(&config).unwrap()
    }

    const LATEST: Route = (
        "/repos/denoland/deno/releases/latest",
        "200 OK",
        r#"{"tag_name":"v1.40.0","published_at":"2024-01-25T00:00:00Z","draft":false}"#,
    );

    #[tokio::test]
    async fn client_talks_to_api_and_raw_host() {
        let (url, requests) = serve(vec![
            LATEST,
            (
                "/repos/denoland/deno_lint/git/ref/tags/0.1.0",
                "404 Not Found",
                r#"{"message":"Not Found","documentation_url":"https://docs.github.com"}"#,
            ),
            ("/denoland/deno_lint/c1/Cargo.toml", "200 OK", "[package]\nname = \"deno_lint\"\n"),
            ("/denoland/deno_lint/c2/Cargo.toml", "404 Not Found", "404: Not Found"),
            ("/denoland/deno_lint/c3/Cargo.toml", "503 Service Unavailable", ""),
        ])
        .await;
        let client = client(&url, Some("secret"));

        // No repository means the runtime repository
        let release: Release = client.request("/releases/latest", None).await.unwrap();
        assert_eq!(release.tag_name, "v1.40.0");

        let text = client.tag_ref("denoland/deno_lint", "0.1.0").await.unwrap_err().to_string();
        assert!(text.contains("404"), "{text}");
        assert!(text.contains("Not Found"), "{text}");

        let manifest = client.raw_file("denoland/deno_lint", "c1", "Cargo.toml").await.unwrap();
        assert_eq!(manifest.as_deref(), Some("[package]\nname = \"deno_lint\"\n"));
        let missing = client.raw_file("denoland/deno_lint", "c2", "Cargo.toml").await.unwrap();
        assert_eq!(missing, None);
        match client.raw_file("denoland/deno_lint", "c3", "Cargo.toml").await {
            Err(ApiError::Status { status, .. }) => assert_eq!(status, 503),
            other => panic!("unexpected result: {other:?}"),
        }

        let requests = requests.lock().unwrap().clone();
        assert_eq!(requests.len(), 5);
        assert!(requests[0].starts_with("GET /repos/denoland/deno/releases/latest "));
        for api_request in &requests[..2] {
            assert!(api_request.to_lowercase().contains("authorization: bearer secret"));
            assert!(api_request.to_lowercase().contains("accept: application/vnd.github+json"));
        }
        for raw_request in &requests[2..] {
            assert!(!raw_request.to_lowercase().contains("authorization"));
        }
    }

    #[tokio::test]
    async fn client_without_token_is_anonymous() {
        let (url, requests) = serve(vec![LATEST]).await;
        let client = client(&url, None);

        let release = client.latest_release("denoland/deno").await.unwrap();
        assert_eq!(release.published_at.as_deref(), Some("2024-01-25T00:00:00Z"));

        let requests = requests.lock().unwrap().clone();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].to_lowercase().contains("user-agent: fork-rebase/"));
        assert!(!requests[0].to_lowercase().contains("authorization"));
    }

    #[test]
    fn error_uses_json_message() {
        let err = ApiError::from_response(StatusCode::NOT_FOUND, r#"{"message":"Not Found"}"#);
        let text = err.to_string();
        assert!(text.contains("404"));
        assert!(text.contains("Not Found"));
    }

    #[test]
    fn error_falls_back_to_status_text() {
        let err = ApiError::from_response(StatusCode::FORBIDDEN, "<html>rate limited</html>");
        assert_eq!(err.to_string(), "[Request error] 403: Forbidden");

        let err = ApiError::from_response(StatusCode::UNAUTHORIZED, r#"{"message":""}"#);
        assert_eq!(err.to_string(), "[Request error] 401: Unauthorized");
    }

    #[test]
    fn error_without_reason_is_empty() {
        let status = StatusCode::from_u16(599).unwrap();
        let err = ApiError::from_response(status, "");
        assert_eq!(err.to_string(), "[Request error] 599: empty");
    }

    #[test]
    fn parses_response_shapes() {
        let object: GitObject =
            serde_json::from_str(r#"{"type":"tag","sha":"abc","url":"https://example.invalid"}"#).unwrap();
        assert_eq!(object.kind, "tag");
        assert!(!object.is_commit());

        let releases: Vec<Release> = serde_json::from_str(
            r#"[{"tag_name":"0.58.0","published_at":"2024-03-01T10:00:00Z","draft":false},{"tag_name":"0.57.0"}]"#,
        )
        .unwrap();
        assert_eq!(releases[0].published_at.as_deref(), Some("2024-03-01T10:00:00Z"));
        assert_eq!(releases[1].published_at, None);
    }
}
