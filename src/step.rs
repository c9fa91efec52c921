//! GitLab Step
//!
//! The three operations an orchestrator can run, each reporting a
//! [`StepOutcome`] instead of an error.
//!
//! Every operation is check-then-act against live GitLab state: nothing is
//! cached between calls and there is no protection against concurrent
//! external changes.

use crate::gitlab::client::GitLabClient;
use crate::gitlab::http::format_api_error;
use crate::gitlab::{members, pipelines, projects};
use crate::params::{parse_members, MemberRequest};
use anyhow::Result;
use serde::Serialize;
use serde_json::{Map, Value};
use std::future::Future;
use std::time::Duration;

/// Result handed back to the orchestrator
///
/// `code` is 0 on success (no-ops included) and 1 on failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepOutcome {
    pub code: i32,
    pub message: String,
    pub context: String,
}

impl StepOutcome {
    pub fn success() -> Self {
        Self {
            code: 0,
            message: String::new(),
            context: String::new(),
        }
    }

    pub fn failure(error: &anyhow::Error) -> Self {
        Self {
            code: 1,
            message: format_api_error(error),
            context: format!("{:#}", error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.code == 0
    }

    /// `(code, message, context)`
    pub fn into_tuple(self) -> (i32, String, String) {
        (self.code, self.message, self.context)
    }
}

/// What happened to one requested member
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberChange {
    Updated,
    Unchanged,
    Invited,
}

/// Facade over the GitLab API for automation steps
#[derive(Debug, Clone)]
pub struct GitLabStep {
    client: GitLabClient,
}

impl GitLabStep {
    pub fn new(service_url: &str, private_token: &str) -> Result<Self> {
        Self::with_timeout(service_url, private_token, None)
    }

    pub fn with_timeout(
        service_url: &str,
        private_token: &str,
        timeout: Option<Duration>,
    ) -> Result<Self> {
        let client = GitLabClient::new(service_url, private_token, timeout)?;
        Ok(Self { client })
    }

    pub fn from_client(client: GitLabClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &GitLabClient {
        &self.client
    }

    /// Create `owner/name` unless it already exists
    ///
    /// `extra_fields` are merged into the creation payload. Without an owner
    /// the project belongs to the token's user.
    pub async fn create_project(
        &self,
        name: &str,
        owner_id: Option<&str>,
        extra_fields: &Map<String, Value>,
    ) -> StepOutcome {
        report("create_project", self.try_create_project(name, owner_id, extra_fields)).await
    }

    /// Trigger a pipeline for `git_ref`, only on projects that already ran one
    pub async fn create_pipeline(&self, name: &str, owner_id: &str, git_ref: &str) -> StepOutcome {
        report("create_pipeline", self.try_create_pipeline(name, owner_id, git_ref)).await
    }

    /// Grant or update access for each `{member, accesslevel}` record
    pub async fn add_member_to_project(
        &self,
        name: &str,
        owner_id: &str,
        members_json: &str,
    ) -> StepOutcome {
        report("add_member_to_project", async {
            let requests = parse_members(members_json)?;
            self.try_add_members(name, owner_id, &requests).await
        })
        .await
    }

    /// Same as [`GitLabStep::add_member_to_project`], for already decoded records
    pub async fn add_members_to_project(
        &self,
        name: &str,
        owner_id: &str,
        requests: &[MemberRequest],
    ) -> StepOutcome {
        report(
            "add_member_to_project",
            self.try_add_members(name, owner_id, requests),
        )
        .await
    }

    async fn try_create_project(
        &self,
        name: &str,
        owner_id: Option<&str>,
        extra_fields: &Map<String, Value>,
    ) -> Result<()> {
        let owner = match owner_id {
            Some(owner) => owner.to_string(),
            None => projects::current_user(&self.client).await?.username,
        };

        if let Some(existing) = projects::find_project(&self.client, &owner, name).await? {
            tracing::info!("Project {} already exists", existing.path_with_namespace);
            return Ok(());
        }

        let namespace_id = match owner_id {
            Some(owner) => Some(projects::get_namespace(&self.client, owner).await?.id),
            None => None,
        };

        let project =
            projects::create_project(&self.client, name, extra_fields, namespace_id).await?;
        tracing::info!(
            "Created project {} (id {})",
            project.path_with_namespace,
            project.id
        );
        Ok(())
    }

    async fn try_create_pipeline(&self, name: &str, owner_id: &str, git_ref: &str) -> Result<()> {
        let Some(project) = projects::find_project(&self.client, owner_id, name).await? else {
            tracing::info!("Project {} does not exist", projects::full_path(owner_id, name));
            return Ok(());
        };

        let existing = pipelines::list_pipelines(&self.client, project.id).await?;
        if existing.is_empty() {
            tracing::info!(
                "Pipeline does not exist in project {}",
                project.path_with_namespace
            );
            return Ok(());
        }

        let pipeline = pipelines::create_pipeline(&self.client, project.id, git_ref).await?;
        tracing::info!(
            "Created pipeline {} on {} for {}",
            pipeline.id,
            project.path_with_namespace,
            git_ref
        );
        Ok(())
    }

    async fn try_add_members(
        &self,
        name: &str,
        owner_id: &str,
        requests: &[MemberRequest],
    ) -> Result<()> {
        let Some(project) = projects::find_project(&self.client, owner_id, name).await? else {
            tracing::info!("Project {} does not exist", projects::full_path(owner_id, name));
            return Ok(());
        };

        for request in requests {
            self.apply_member(project.id, request).await?;
        }
        Ok(())
    }

    /// Update, skip, or invite a single requested member
    pub async fn apply_member(
        &self,
        project_id: u64,
        request: &MemberRequest,
    ) -> Result<MemberChange> {
        let email = request.member.trim();
        let candidates = members::search_members(&self.client, project_id, email).await?;

        match candidates.iter().find(|m| m.has_email(email)) {
            Some(member) if member.has_level(request.access_level) => {
                tracing::info!("{} already has {} access", email, request.access_level);
                Ok(MemberChange::Unchanged)
            }
            Some(member) => {
                members::update_access_level(
                    &self.client,
                    project_id,
                    member.id,
                    request.access_level,
                )
                .await?;
                tracing::info!(
                    "Changed {} access from {} to {}",
                    email,
                    member.access_level,
                    request.access_level
                );
                Ok(MemberChange::Updated)
            }
            None => {
                members::invite_by_email(&self.client, project_id, email, request.access_level)
                    .await?;
                tracing::info!("Invited {} with {} access", email, request.access_level);
                Ok(MemberChange::Invited)
            }
        }
    }
}

/// Fold an operation's error into a failure outcome
async fn report(operation: &str, work: impl Future<Output = Result<()>>) -> StepOutcome {
    match work.await {
        Ok(()) => StepOutcome::success(),
        Err(err) => {
            tracing::error!("{} failed: {:#}", operation, err);
            StepOutcome::failure(&err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gitlab::http::ApiError;
    use reqwest::StatusCode;

    #[test]
    fn test_success_outcome_is_empty() {
        assert_eq!(
            StepOutcome::success().into_tuple(),
            (0, String::new(), String::new())
        );
    }

    #[test]
    fn test_failure_outcome_keeps_chain_in_context() {
        let err: anyhow::Error = ApiError {
            status: StatusCode::NOT_FOUND,
        }
        .into();
        let err = err.context("Failed to search projects");

        let outcome = StepOutcome::failure(&err);
        assert_eq!(outcome.code, 1);
        assert_eq!(outcome.message, "Resource not found.");
        assert_eq!(
            outcome.context,
            "Failed to search projects: API request failed: 404 Not Found"
        );
    }

    #[test]
    fn test_failure_outcome_for_plain_errors() {
        let err =
            anyhow::anyhow!("expected value at line 1 column 2").context("Invalid members list");
        let outcome = StepOutcome::failure(&err);
        assert_eq!(outcome.message, "Invalid members list");
        assert!(!outcome.is_success());
    }

    #[test]
    fn test_outcome_serializes_as_object() {
        let json = serde_json::to_value(StepOutcome::success()).unwrap();
        assert_eq!(json, serde_json::json!({"code": 0, "message": "", "context": ""}));
    }
}
