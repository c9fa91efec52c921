//! GitLab Projects
//!
//! Functions for searching, resolving and creating projects.

use super::client::GitLabClient;
use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::{Map, Value};

/// Page size for search requests; only the first page is read
const SEARCH_PAGE_SIZE: &str = "100";

/// Project information
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Project {
    pub id: u64,
    pub name: String,
    pub path_with_namespace: String,
}

/// Namespace (user or group) a project can be created in
#[derive(Debug, Clone, Deserialize)]
pub struct Namespace {
    pub id: u64,
    pub full_path: String,
}

/// Authenticated user
#[derive(Debug, Clone, Deserialize)]
pub struct CurrentUser {
    pub id: u64,
    pub username: String,
}

/// `owner/name`, as GitLab reports it in `path_with_namespace`
pub fn full_path(owner: &str, name: &str) -> String {
    format!("{}/{}", owner, name)
}

/// Pick the project whose path is exactly `owner/name`
pub fn find_by_path<'a>(projects: &'a [Project], owner: &str, name: &str) -> Option<&'a Project> {
    let wanted = full_path(owner, name);
    projects.iter().find(|p| p.path_with_namespace == wanted)
}

/// Search projects by name
pub async fn search_projects(client: &GitLabClient, name: &str) -> Result<Vec<Project>> {
    let response = client
        .get("projects", &[("search", name), ("per_page", SEARCH_PAGE_SIZE)])
        .await
        .context("Failed to search projects")?;

    serde_json::from_value(response).context("Unexpected project list payload")
}

/// Resolve `owner/name` to a project, re-fetched on every call
pub async fn find_project(
    client: &GitLabClient,
    owner: &str,
    name: &str,
) -> Result<Option<Project>> {
    let projects = search_projects(client, name).await?;
    Ok(find_by_path(&projects, owner, name).cloned())
}

/// Get the user the private token belongs to
pub async fn current_user(client: &GitLabClient) -> Result<CurrentUser> {
    let response = client
        .get("user", &[])
        .await
        .context("Failed to get authenticated user")?;

    serde_json::from_value(response).context("Unexpected user payload")
}

/// Look up a namespace by its full path
pub async fn get_namespace(client: &GitLabClient, path: &str) -> Result<Namespace> {
    let response = client
        .get(&client.namespace_path(path), &[])
        .await
        .with_context(|| format!("Failed to get namespace {}", path))?;

    serde_json::from_value(response).context("Unexpected namespace payload")
}

/// Creation payload: `extra` fields, then `name` on top
pub fn creation_payload(
    name: &str,
    extra: &Map<String, Value>,
    namespace_id: Option<u64>,
) -> Value {
    let mut payload = extra.clone();
    payload.insert("name".to_string(), Value::from(name));
    if let Some(id) = namespace_id {
        payload.insert("namespace_id".to_string(), Value::from(id));
    }
    Value::Object(payload)
}

/// Create a project, in `namespace_id` if given, else under the token's user
pub async fn create_project(
    client: &GitLabClient,
    name: &str,
    extra: &Map<String, Value>,
    namespace_id: Option<u64>,
) -> Result<Project> {
    let payload = creation_payload(name, extra, namespace_id);
    let response = client
        .post("projects", &[], Some(&payload))
        .await
        .with_context(|| format!("Failed to create project {}", name))?;

    serde_json::from_value(response).context("Unexpected project payload")
}
