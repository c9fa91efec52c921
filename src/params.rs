//! Step Parameters
//!
//! Decoding of the inputs an orchestrator hands to a step: the members list
//! string and YAML step descriptions.

use crate::gitlab::members::AccessLevel;
use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::path::Path;

/// Default git reference pipelines are created for
pub const DEFAULT_REF: &str = "main";

/// One `{member, accesslevel}` record of a members list
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MemberRequest {
    pub member: String,
    #[serde(rename = "accesslevel", alias = "accessLevel", alias = "access_level")]
    pub access_level: AccessLevel,
}

/// Parse a members list written with single-quoted JSON
///
/// Every `'` becomes `"` before parsing, so values can't contain quotes.
pub fn parse_members(input: &str) -> Result<Vec<MemberRequest>> {
    let normalized = input.replace('\'', "\"");
    serde_json::from_str(&normalized).context("Invalid members list")
}

/// Which operation a step runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StepAction {
    CreateProject,
    CreatePipeline,
    AddMemberToProject,
}

/// Step description read from a YAML parameters file
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepParams {
    pub action: StepAction,
    pub project_name: String,
    #[serde(default, alias = "owner")]
    pub user_id: Option<String>,
    #[serde(default, rename = "ref")]
    pub git_ref: Option<String>,
    /// Single-quoted JSON string, or a YAML list of records
    #[serde(default)]
    pub members: Option<MembersParam>,
    /// Extra project creation fields
    #[serde(default)]
    pub fields: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum MembersParam {
    Encoded(String),
    List(Vec<Value>),
}

impl MembersParam {
    /// Decode into records; quote normalization only applies to the string form
    pub fn to_requests(&self) -> Result<Vec<MemberRequest>> {
        match self {
            MembersParam::Encoded(s) => parse_members(s),
            MembersParam::List(items) => items
                .iter()
                .map(|item| serde_json::from_value(item.clone()))
                .collect::<Result<Vec<MemberRequest>, _>>()
                .context("Invalid members list"),
        }
    }
}

impl StepParams {
    pub fn from_yaml(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).context("Invalid step parameters")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::from_yaml(&content)
    }

    pub fn git_ref(&self) -> &str {
        self.git_ref.as_deref().unwrap_or(DEFAULT_REF)
    }
}

/// Parse a `key=value` field; values that parse as JSON keep their type
pub fn parse_field(input: &str) -> Result<(String, Value)> {
    let (key, raw) = input
        .split_once('=')
        .with_context(|| format!("Expected key=value, got {}", input))?;
    let key = key.trim();
    if key.is_empty() {
        anyhow::bail!("Empty field name in {}", input);
    }

    let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::from(raw));
    Ok((key.to_string(), value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_single_quoted_members() {
        let members = parse_members(concat!(
            "[{'member': 'jane@example.com', 'accesslevel': 30}, ",
            "{'member': 'bob@example.com', 'accesslevel': 'maintainer'}]",
        ))
        .unwrap();

        assert_eq!(
            members,
            vec![
                MemberRequest {
                    member: "jane@example.com".to_string(),
                    access_level: AccessLevel::Developer,
                },
                MemberRequest {
                    member: "bob@example.com".to_string(),
                    access_level: AccessLevel::Maintainer,
                },
            ]
        );
    }

    #[test]
    fn test_parse_members_accepts_double_quotes() {
        let members = parse_members(r#"[{"member": "a@b.c", "accesslevel": 10}]"#).unwrap();
        assert_eq!(members[0].access_level, AccessLevel::Guest);
    }

    #[test]
    fn test_parse_members_rejects_malformed_input() {
        assert!(parse_members("[{'member': 'a@b.c', ").is_err());
        assert!(parse_members("[{'member': 'a@b.c'}]").is_err());
        assert!(parse_members("[{'member': 'a@b.c', 'accesslevel': 99}]").is_err());
    }

    #[test]
    fn test_quote_in_value_breaks_parsing() {
        let input = "[{'member': \"o'neil@example.com\", 'accesslevel': 30}]";
        assert!(parse_members(input).is_err());
    }

    #[test]
    fn test_step_params_from_yaml() {
        let params = StepParams::from_yaml(
            r#"
action: addMemberToProject
projectName: website
userId: team
members: "[{'member': 'jane@example.com', 'accesslevel': 30}]"
"#,
        )
        .unwrap();

        assert_eq!(params.action, StepAction::AddMemberToProject);
        assert_eq!(params.user_id.as_deref(), Some("team"));
        assert_eq!(params.git_ref(), DEFAULT_REF);
        assert_eq!(params.members.unwrap().to_requests().unwrap().len(), 1);
    }

    #[test]
    fn test_step_params_members_as_yaml_list() {
        let params = StepParams::from_yaml(
            r#"
action: addMemberToProject
projectName: website
members:
  - member: jane@example.com
    accesslevel: developer
"#,
        )
        .unwrap();

        let members = params.members.unwrap().to_requests().unwrap();
        assert_eq!(members[0].access_level, AccessLevel::Developer);
    }

    #[test]
    fn test_yaml_list_keeps_apostrophes() {
        let params = StepParams::from_yaml(
            r#"
action: addMemberToProject
projectName: website
members:
  - member: o'neil@example.com
    accesslevel: planner
"#,
        )
        .unwrap();

        let members = params.members.unwrap().to_requests().unwrap();
        assert_eq!(members[0].member, "o'neil@example.com");
        assert_eq!(members[0].access_level, AccessLevel::Planner);
    }

    #[test]
    fn test_yaml_list_with_unknown_level_is_rejected() {
        let params = StepParams::from_yaml(
            r#"
action: addMemberToProject
projectName: website
members:
  - member: jane@example.com
    accesslevel: admin
"#,
        )
        .unwrap();

        assert!(params.members.unwrap().to_requests().is_err());
    }

    #[test]
    fn test_step_params_fields_and_ref() {
        let params = StepParams::from_yaml(
            r#"
action: createProject
projectName: website
ref: develop
fields:
  visibility: private
  initialize_with_readme: true
"#,
        )
        .unwrap();

        assert_eq!(params.git_ref(), "develop");
        assert_eq!(params.fields["initialize_with_readme"], json!(true));
    }

    #[test]
    fn test_unknown_action_is_rejected() {
        assert!(StepParams::from_yaml("action: deleteProject\nprojectName: x\n").is_err());
    }

    #[test]
    fn test_parse_field() {
        assert_eq!(
            parse_field("visibility=private").unwrap(),
            ("visibility".to_string(), json!("private"))
        );
        assert_eq!(
            parse_field("initialize_with_readme=true").unwrap(),
            ("initialize_with_readme".to_string(), json!(true))
        );
        assert!(parse_field("novalue").is_err());
        assert!(parse_field("=x").is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("step.yaml");
        std::fs::write(
            &path,
            "action: createPipeline\nprojectName: website\nuserId: team\n",
        )
        .unwrap();

        let params = StepParams::load(&path).unwrap();
        assert_eq!(params.action, StepAction::CreatePipeline);
    }
}
