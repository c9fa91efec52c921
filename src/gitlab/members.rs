//! GitLab Members and Invitations
//!
//! Project membership lookups, access level updates, and email invitations.

use super::client::GitLabClient;
use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer};
use serde_json::{json, Value};
use std::fmt;

/// GitLab permission tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessLevel {
    NoAccess,
    Minimal,
    Guest,
    Planner,
    Reporter,
    Developer,
    Maintainer,
    Owner,
}

impl AccessLevel {
    pub const ALL: [AccessLevel; 8] = [
        AccessLevel::NoAccess,
        AccessLevel::Minimal,
        AccessLevel::Guest,
        AccessLevel::Planner,
        AccessLevel::Reporter,
        AccessLevel::Developer,
        AccessLevel::Maintainer,
        AccessLevel::Owner,
    ];

    /// Numeric value used by the API
    pub fn value(self) -> u8 {
        match self {
            AccessLevel::NoAccess => 0,
            AccessLevel::Minimal => 5,
            AccessLevel::Guest => 10,
            AccessLevel::Planner => 15,
            AccessLevel::Reporter => 20,
            AccessLevel::Developer => 30,
            AccessLevel::Maintainer => 40,
            AccessLevel::Owner => 50,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            AccessLevel::NoAccess => "none",
            AccessLevel::Minimal => "minimal",
            AccessLevel::Guest => "guest",
            AccessLevel::Planner => "planner",
            AccessLevel::Reporter => "reporter",
            AccessLevel::Developer => "developer",
            AccessLevel::Maintainer => "maintainer",
            AccessLevel::Owner => "owner",
        }
    }

    pub fn from_value(value: u64) -> Option<Self> {
        Self::ALL.into_iter().find(|level| u64::from(level.value()) == value)
    }

    /// Parse a tier name (case-insensitive) or its number
    pub fn parse(input: &str) -> Option<Self> {
        let input = input.trim();
        if let Ok(value) = input.parse::<u64>() {
            return Self::from_value(value);
        }
        Self::ALL
            .into_iter()
            .find(|level| level.name().eq_ignore_ascii_case(input))
    }
}

impl fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name(), self.value())
    }
}

impl<'de> Deserialize<'de> for AccessLevel {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(u64),
            Text(String),
        }

        let level = match Raw::deserialize(deserializer)? {
            Raw::Number(n) => AccessLevel::from_value(n),
            Raw::Text(s) => AccessLevel::parse(&s),
        };
        level.ok_or_else(|| serde::de::Error::custom("unknown access level"))
    }
}

/// Existing project member
#[derive(Debug, Clone, Deserialize)]
pub struct Member {
    pub id: u64,
    pub username: String,
    /// Only visible to administrators and for enterprise users
    #[serde(default)]
    pub email: Option<String>,
    /// Raw tier, so tiers this crate doesn't know still decode
    pub access_level: u64,
}

impl Member {
    pub fn has_email(&self, email: &str) -> bool {
        self.email
            .as_deref()
            .is_some_and(|e| e.eq_ignore_ascii_case(email))
    }

    pub fn has_level(&self, level: AccessLevel) -> bool {
        self.access_level == u64::from(level.value())
    }
}

/// Search direct project members
pub async fn search_members(
    client: &GitLabClient,
    project_id: u64,
    query: &str,
) -> Result<Vec<Member>> {
    let response = client
        .get(&client.project_path(project_id, "members"), &[("query", query)])
        .await
        .context("Failed to list project members")?;

    serde_json::from_value(response).context("Unexpected member list payload")
}

/// Change an existing member's access level
pub async fn update_access_level(
    client: &GitLabClient,
    project_id: u64,
    user_id: u64,
    level: AccessLevel,
) -> Result<()> {
    let path = client.project_path(project_id, &format!("members/{}", user_id));
    client
        .put(&path, &json!({ "access_level": level.value() }))
        .await
        .with_context(|| format!("Failed to update member {}", user_id))?;
    Ok(())
}

/// Invite someone by email
pub async fn invite_by_email(
    client: &GitLabClient,
    project_id: u64,
    email: &str,
    level: AccessLevel,
) -> Result<()> {
    let body = json!({ "email": email, "access_level": level.value() });
    let response = client
        .post(&client.project_path(project_id, "invitations"), &[], Some(&body))
        .await
        .with_context(|| format!("Failed to invite {}", email))?;

    check_invitation_response(&response).with_context(|| format!("Failed to invite {}", email))
}

/// The invitations endpoint reports per-email failures inside a 201 body
fn check_invitation_response(response: &Value) -> Result<()> {
    if response.get("status").and_then(Value::as_str) != Some("error") {
        return Ok(());
    }

    let message = match response.get("message") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Object(map)) => map
            .values()
            .filter_map(Value::as_str)
            .collect::<Vec<_>>()
            .join("; "),
        Some(other) => other.to_string(),
        None => "invitation rejected".to_string(),
    };
    anyhow::bail!("Invitation rejected: {}", message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_level_parse_names_and_numbers() {
        assert_eq!(AccessLevel::parse("Developer"), Some(AccessLevel::Developer));
        assert_eq!(AccessLevel::parse("40"), Some(AccessLevel::Maintainer));
        assert_eq!(AccessLevel::parse("none"), Some(AccessLevel::NoAccess));
        assert_eq!(AccessLevel::parse("15"), Some(AccessLevel::Planner));
        assert_eq!(AccessLevel::parse("Planner"), Some(AccessLevel::Planner));
        assert_eq!(AccessLevel::parse("25"), None);
        assert_eq!(AccessLevel::parse("admin"), None);
    }

    #[test]
    fn test_access_level_deserialize() {
        let level: AccessLevel = serde_json::from_str("30").unwrap();
        assert_eq!(level, AccessLevel::Developer);
        let level: AccessLevel = serde_json::from_str("\"reporter\"").unwrap();
        assert_eq!(level, AccessLevel::Reporter);
        assert!(serde_json::from_str::<AccessLevel>("31").is_err());
    }

    #[test]
    fn test_member_email_match_is_case_insensitive() {
        let member: Member = serde_json::from_value(json!({
            "id": 3,
            "username": "jdoe",
            "email": "John.Doe@example.com",
            "access_level": 30
        }))
        .unwrap();

        assert!(member.has_email("john.doe@example.com"));
        assert!(!member.has_email("jane@example.com"));
        assert!(member.has_level(AccessLevel::Developer));
    }

    #[test]
    fn test_member_with_unknown_tier_still_decodes() {
        let members: Vec<Member> = serde_json::from_value(json!([
            {"id": 3, "username": "jdoe", "access_level": 30},
            {"id": 4, "username": "custom", "access_level": 25}
        ]))
        .unwrap();

        assert_eq!(members[1].access_level, 25);
        assert!(AccessLevel::ALL.iter().all(|level| !members[1].has_level(*level)));
    }

    #[test]
    fn test_member_without_email_never_matches() {
        let member: Member = serde_json::from_value(json!({
            "id": 3,
            "username": "jdoe",
            "access_level": 30
        }))
        .unwrap();

        assert!(!member.has_email("jdoe"));
    }

    #[test]
    fn test_invitation_error_body() {
        let ok = json!({"status": "success"});
        assert!(check_invitation_response(&ok).is_ok());

        let err = json!({"status": "error", "message": {"a@b.c": "Already a member"}});
        let message = check_invitation_response(&err).unwrap_err().to_string();
        assert!(message.contains("Already a member"));
    }
}
