//! Wire-shaped domain types, serde-compatible with the backend's JSON encoding.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Aggregated snapshot of applications and environments the dashboard shows.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Overview {
    pub applications: HashMap<String, Application>,
    pub environment_groups: Vec<EnvironmentGroup>,
    pub git_revision: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Application {
    pub name: String,
    pub team: String,
    pub releases: Vec<Release>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Release {
    pub version: u64,
    pub source_commit_id: String,
    pub source_author: String,
    pub source_message: String,
    pub created_at: Option<DateTime<Utc>>,
    pub undeploy_version: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EnvironmentGroup {
    pub environment_group_name: String,
    pub environments: Vec<Environment>,
    pub distance_to_upstream: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Environment {
    pub name: String,
    pub priority: Priority,
    /// Applications deployed to this environment, by name.
    pub applications: HashMap<String, DeployedApplication>,
    /// Environment-wide locks, by lock id.
    pub locks: HashMap<String, Lock>,
}

/// Relative position of an environment in the promotion pipeline; drives the
/// color coding in the UI shell.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Priority {
    Prod,
    PreProd,
    Upstream,
    Canary,
    Other,
    // unknown values from a newer server decode to the fallback
    #[default]
    #[serde(other)]
    Unrecognized,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DeployedApplication {
    pub name: String,
    /// Deployed release version; 0 means "not deployed".
    pub version: u64,
    /// Application-scoped locks on this environment, by lock id.
    pub locks: HashMap<String, Lock>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Lock {
    pub lock_id: String,
    pub message: String,
    pub created_at: Option<DateTime<Utc>>,
    pub created_by: Option<Actor>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Actor {
    pub name: String,
    pub email: String,
}

/// One-shot frontend configuration served by the config endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FrontendConfig {
    pub source_repo_url: String,
    pub manifest_repo_url: String,
    pub branch: String,
    pub server_version: String,
    pub auth_enabled: bool,
}

/// Rollout state of one application on one environment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RolloutState {
    Successful,
    Progressing,
    Pending,
    Error,
    Unhealthy,
    // unknown values from a newer server decode to the fallback
    #[default]
    #[serde(other)]
    Unknown,
}

/// One event from the rollout status stream.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RolloutStatusEvent {
    pub application: String,
    pub environment: String,
    pub rollout_status: RolloutState,
}

/// Accumulated rollout status, per application per environment.
///
/// `enabled` flips to true on the first received event and back to false when
/// the stream fails and the accumulated view is flushed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RolloutStatus {
    pub enabled: bool,
    pub applications: HashMap<String, HashMap<String, RolloutStatusEvent>>,
}
