//! glstep - GitLab automation step
//!
//! Provisions projects, triggers pipelines and manages project membership
//! through the GitLab REST API, reporting every operation as a uniform
//! `(code, message, context)` outcome for the calling orchestrator.

pub mod config;
pub mod gitlab;
pub mod params;
pub mod step;

pub use step::{GitLabStep, StepOutcome};
