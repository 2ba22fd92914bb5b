//! Dashboard store state, its shallow-merge patch, and selector helpers.
//!
//! By convention each field has a single writer: the overview subscriber owns
//! `overview`/`overview_loaded`/`connectivity_error`, the rollout subscriber
//! owns `rollout`, the config loader owns `config`/`config_ready`. Readers
//! project freely.

use chrono::{DateTime, Utc};

use super::types::{
    Application, Environment, FrontendConfig, Overview, Release, RolloutStatus, RolloutStatusEvent,
};
use crate::store::Patchable;

/// Placeholder team for applications without one.
pub const NO_TEAM: &str = "<No Team>";

/// The single shared state the dashboard renders from.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DashboardState {
    pub overview: Overview,
    /// False until the first overview snapshot has been merged.
    pub overview_loaded: bool,
    pub config: FrontendConfig,
    pub config_ready: bool,
    /// Connectivity banner payload; `None` while the stream is healthy.
    pub connectivity_error: Option<String>,
    pub rollout: RolloutStatus,
}

/// Shallow partial update of [`DashboardState`]; unset fields stay untouched.
#[derive(Debug, Default)]
pub struct DashboardPatch {
    overview: Option<Overview>,
    overview_loaded: Option<bool>,
    config: Option<FrontendConfig>,
    config_ready: Option<bool>,
    connectivity_error: Option<Option<String>>,
    rollout: Option<RolloutStatus>,
}

impl DashboardPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn overview(mut self, overview: Overview) -> Self {
        self.overview = Some(overview);
        self
    }

    pub fn overview_loaded(mut self, loaded: bool) -> Self {
        self.overview_loaded = Some(loaded);
        self
    }

    pub fn config(mut self, config: FrontendConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn config_ready(mut self, ready: bool) -> Self {
        self.config_ready = Some(ready);
        self
    }

    pub fn connectivity_error(mut self, error: Option<String>) -> Self {
        self.connectivity_error = Some(error);
        self
    }

    pub fn rollout(mut self, rollout: RolloutStatus) -> Self {
        self.rollout = Some(rollout);
        self
    }
}

impl Patchable for DashboardState {
    type Patch = DashboardPatch;

    fn apply(&mut self, patch: DashboardPatch) {
        if let Some(overview) = patch.overview {
            self.overview = overview;
        }
        if let Some(loaded) = patch.overview_loaded {
            self.overview_loaded = loaded;
        }
        if let Some(config) = patch.config {
            self.config = config;
        }
        if let Some(ready) = patch.config_ready {
            self.config_ready = ready;
        }
        if let Some(error) = patch.connectivity_error {
            self.connectivity_error = error;
        }
        if let Some(rollout) = patch.rollout {
            self.rollout = rollout;
        }
    }
}

/// Merge one rollout status event into the accumulated view.
pub fn apply_rollout_event(rollout: &mut RolloutStatus, event: RolloutStatusEvent) {
    rollout.enabled = true;
    rollout
        .applications
        .entry(event.application.clone())
        .or_default()
        .insert(event.environment.clone(), event);
}

// ============================================================================
// Selectors - pure projections pages hang their rendering on
// ============================================================================

/// All team names, deduplicated and sorted; empty teams map to [`NO_TEAM`].
pub fn team_names(state: &DashboardState) -> Vec<String> {
    let mut teams: Vec<String> = state
        .overview
        .applications
        .values()
        .map(|app| {
            let team = app.team.trim();
            if team.is_empty() {
                NO_TEAM.to_string()
            } else {
                team.to_string()
            }
        })
        .collect();
    teams.sort();
    teams.dedup();
    teams
}

/// Warnings of every application, flattened.
pub fn all_warnings(state: &DashboardState) -> Vec<String> {
    state
        .overview
        .applications
        .values()
        .flat_map(|app| app.warnings.iter().cloned())
        .collect()
}

/// Applications filtered by team, sorted by team then name.
///
/// An empty filter keeps everything.
pub fn applications_for_teams(state: &DashboardState, teams: &[String]) -> Vec<Application> {
    let mut apps: Vec<Application> = state
        .overview
        .applications
        .values()
        .filter(|app| {
            if teams.is_empty() {
                return true;
            }
            let team = app.team.trim();
            let team = if team.is_empty() { NO_TEAM } else { team };
            teams.iter().any(|t| t == team)
        })
        .cloned()
        .collect();
    apps.sort_by(|a, b| a.team.cmp(&b.team).then_with(|| a.name.cmp(&b.name)));
    apps
}

/// All environments across every group, in group order.
pub fn environments(state: &DashboardState) -> Vec<Environment> {
    state
        .overview
        .environment_groups
        .iter()
        .flat_map(|group| group.environments.iter().cloned())
        .collect()
}

pub fn environment_names(state: &DashboardState) -> Vec<String> {
    environments(state).into_iter().map(|env| env.name).collect()
}

/// Flattened, display-ready view of one lock.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DisplayLock {
    pub date: Option<DateTime<Utc>>,
    pub environment: String,
    /// `None` for environment-wide locks.
    pub application: Option<String>,
    pub message: String,
    pub lock_id: String,
    pub author_name: Option<String>,
    pub author_email: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllLocks {
    pub environment_locks: Vec<DisplayLock>,
    pub app_locks: Vec<DisplayLock>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockSortOrder {
    OldestToNewest,
    NewestToOldest,
}

/// Every environment and application lock, flattened for display.
pub fn all_locks(state: &DashboardState) -> AllLocks {
    let mut locks = AllLocks::default();
    for env in environments(state) {
        for lock in env.locks.values() {
            locks.environment_locks.push(DisplayLock {
                date: lock.created_at,
                environment: env.name.clone(),
                application: None,
                message: lock.message.clone(),
                lock_id: lock.lock_id.clone(),
                author_name: lock.created_by.as_ref().map(|a| a.name.clone()),
                author_email: lock.created_by.as_ref().map(|a| a.email.clone()),
            });
        }
        for app in env.applications.values() {
            for lock in app.locks.values() {
                locks.app_locks.push(DisplayLock {
                    date: lock.created_at,
                    environment: env.name.clone(),
                    application: Some(app.name.clone()),
                    message: lock.message.clone(),
                    lock_id: lock.lock_id.clone(),
                    author_name: lock.created_by.as_ref().map(|a| a.name.clone()),
                    author_email: lock.created_by.as_ref().map(|a| a.email.clone()),
                });
            }
        }
    }
    sort_locks(&mut locks.environment_locks, LockSortOrder::NewestToOldest);
    sort_locks(&mut locks.app_locks, LockSortOrder::NewestToOldest);
    locks
}

/// Sort locks by creation date (undated locks last), lock id as tie-breaker.
pub fn sort_locks(locks: &mut [DisplayLock], order: LockSortOrder) {
    locks.sort_by(|a, b| {
        let by_date = match (a.date, b.date) {
            (Some(a), Some(b)) => match order {
                LockSortOrder::OldestToNewest => a.cmp(&b),
                LockSortOrder::NewestToOldest => b.cmp(&a),
            },
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => std::cmp::Ordering::Equal,
        };
        by_date.then_with(|| a.lock_id.cmp(&b.lock_id))
    });
}

/// The release `version` of `application`, if known.
pub fn release(state: &DashboardState, application: &str, version: u64) -> Option<Release> {
    state
        .overview
        .applications
        .get(application)?
        .releases
        .iter()
        .find(|r| r.version == version)
        .cloned()
}

/// Release versions of `application` currently deployed to at least one
/// environment, descending. Version 0 means "not deployed" and is dropped.
pub fn deployed_release_versions(state: &DashboardState, application: &str) -> Vec<u64> {
    let mut versions: Vec<u64> = environments(state)
        .iter()
        .filter_map(|env| env.applications.get(application))
        .map(|deployed| deployed.version)
        .filter(|version| *version != 0)
        .collect();
    versions.sort_unstable_by(|a, b| b.cmp(a));
    versions.dedup();
    versions
}
