//! GitLab API interaction module
//!
//! This module provides the core functionality for interacting with the GitLab
//! REST API (v4) using a static private token.
//!
//! # Module Structure
//!
//! - [`client`] - Main GitLab client holding the API root and token
//! - [`http`] - HTTP utilities for REST API calls
//! - [`projects`] - Project search, resolution and creation
//! - [`pipelines`] - Pipeline listing and triggering
//! - [`members`] - Project members, access levels and invitations
//!
//! # Example
//!
//! ```ignore
//! use glstep::gitlab::{client::GitLabClient, projects};
//!
//! async fn example() -> anyhow::Result<()> {
//!     let client = GitLabClient::new("https://gitlab.example.com", "glpat-...", None)?;
//!     let project = projects::find_project(&client, "team", "website").await?;
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod http;
pub mod members;
pub mod pipelines;
pub mod projects;
