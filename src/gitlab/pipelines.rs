//! GitLab Pipelines

use super::client::GitLabClient;
use anyhow::{Context, Result};
use serde::Deserialize;

/// Pipeline summary
#[derive(Debug, Clone, Deserialize)]
pub struct Pipeline {
    pub id: u64,
    #[serde(rename = "ref", default)]
    pub git_ref: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

/// List the project's most recent pipelines (first page only)
pub async fn list_pipelines(client: &GitLabClient, project_id: u64) -> Result<Vec<Pipeline>> {
    let response = client
        .get(&client.project_path(project_id, "pipelines"), &[])
        .await
        .context("Failed to list pipelines")?;

    serde_json::from_value(response).context("Unexpected pipeline list payload")
}

/// Trigger a new pipeline for `git_ref`
pub async fn create_pipeline(
    client: &GitLabClient,
    project_id: u64,
    git_ref: &str,
) -> Result<Pipeline> {
    let response = client
        .post(
            &client.project_path(project_id, "pipeline"),
            &[("ref", git_ref)],
            None,
        )
        .await
        .with_context(|| format!("Failed to create pipeline for ref {}", git_ref))?;

    serde_json::from_value(response).context("Unexpected pipeline payload")
}
