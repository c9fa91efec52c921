//! GitLab Client
//!
//! Main client for interacting with the GitLab REST API, combining the
//! static private token and HTTP functionality.

use super::http::GitLabHttpClient;
use anyhow::{Context, Result};
use serde_json::Value;
use std::time::Duration;
use url::Url;

/// Instance used when no service URL is given
pub const DEFAULT_GITLAB_URL: &str = "https://gitlab.com";

/// Main GitLab client
#[derive(Clone)]
pub struct GitLabClient {
    pub http: GitLabHttpClient,
    api_root: Url,
    token: String,
}

impl std::fmt::Debug for GitLabClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitLabClient")
            .field("api_root", &self.api_root.as_str())
            .field("token", &"<redacted>")
            .finish()
    }
}

impl GitLabClient {
    /// Create a new GitLab client
    ///
    /// An empty `service_url` falls back to [`DEFAULT_GITLAB_URL`].
    pub fn new(service_url: &str, private_token: &str, timeout: Option<Duration>) -> Result<Self> {
        let api_root = api_root(service_url)?;
        let http = GitLabHttpClient::new(timeout)?;

        Ok(Self {
            http,
            api_root,
            token: private_token.to_string(),
        })
    }

    /// Root of the v4 API, always ending with a slash
    pub fn api_root(&self) -> &str {
        self.api_root.as_str()
    }

    /// Make a GET request to a GitLab API path
    pub async fn get(&self, path: &str, query: &[(&str, &str)]) -> Result<Value> {
        self.http.get(&self.api_url(path), &self.token, query).await
    }

    /// Make a POST request to a GitLab API path
    pub async fn post(
        &self,
        path: &str,
        query: &[(&str, &str)],
        body: Option<&Value>,
    ) -> Result<Value> {
        self.http
            .post(&self.api_url(path), &self.token, query, body)
            .await
    }

    /// Make a PUT request to a GitLab API path
    pub async fn put(&self, path: &str, body: &Value) -> Result<Value> {
        self.http.put(&self.api_url(path), &self.token, body).await
    }

    // =========================================================================
    // URL helpers
    // =========================================================================

    /// Build a full API URL from a path relative to `/api/v4`
    pub fn api_url(&self, path: &str) -> String {
        format!("{}{}", self.api_root, path.trim_start_matches('/'))
    }

    /// Build a project-scoped path
    pub fn project_path(&self, project_id: u64, resource: &str) -> String {
        if resource.is_empty() {
            format!("projects/{}", project_id)
        } else {
            format!("projects/{}/{}", project_id, resource)
        }
    }

    /// Build a namespace path, URL-encoding the full path (`group/subgroup`)
    pub fn namespace_path(&self, namespace: &str) -> String {
        format!("namespaces/{}", urlencoding::encode(namespace))
    }
}

/// Resolve `<service_url>/api/v4/`
fn api_root(service_url: &str) -> Result<Url> {
    let base = service_url.trim();
    let base = if base.is_empty() { DEFAULT_GITLAB_URL } else { base };

    let mut url =
        Url::parse(base).with_context(|| format!("Invalid GitLab URL: {}", base))?;
    if url.cannot_be_a_base() {
        anyhow::bail!("Invalid GitLab URL: {}", base);
    }

    let path = url.path().trim_end_matches('/').to_string();
    let path = path.strip_suffix("/api/v4").unwrap_or(&path);
    url.set_path(&format!("{}/api/v4/", path));
    url.set_query(None);

    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(url: &str) -> GitLabClient {
        GitLabClient::new(url, "token", None).unwrap()
    }

    #[test]
    fn test_empty_url_uses_gitlab_com() {
        assert_eq!(client("").api_root(), "https://gitlab.com/api/v4/");
    }

    #[test]
    fn test_api_root_keeps_relative_install_path() {
        assert_eq!(
            client("https://git.example.org/gitlab/").api_root(),
            "https://git.example.org/gitlab/api/v4/"
        );
    }

    #[test]
    fn test_api_root_is_not_duplicated() {
        assert_eq!(
            client("https://git.example.org/api/v4").api_root(),
            "https://git.example.org/api/v4/"
        );
    }

    #[test]
    fn test_invalid_url_is_rejected() {
        assert!(GitLabClient::new("not a url", "token", None).is_err());
    }

    #[test]
    fn test_project_and_namespace_paths() {
        let c = client("https://gitlab.example.com");
        assert_eq!(c.project_path(42, ""), "projects/42");
        assert_eq!(c.project_path(42, "pipelines"), "projects/42/pipelines");
        assert_eq!(c.namespace_path("team/sub"), "namespaces/team%2Fsub");
        assert_eq!(
            c.api_url("/projects"),
            "https://gitlab.example.com/api/v4/projects"
        );
    }

    #[test]
    fn test_debug_redacts_token() {
        let c = GitLabClient::new("", "glpat-secret", None).unwrap();
        assert!(!format!("{:?}", c).contains("glpat-secret"));
    }
}
