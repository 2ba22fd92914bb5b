//! Dashboard domain state
//!
//! The wire-shaped types the backend streams (overview snapshots, rollout
//! status events, frontend configuration) and the store state they merge into,
//! plus the selector helpers pages project from it.

mod dashboard;
mod types;

pub use dashboard::{
    all_locks, all_warnings, applications_for_teams, apply_rollout_event,
    deployed_release_versions, environment_names, environments, release, sort_locks, team_names,
    AllLocks, DashboardPatch, DashboardState, DisplayLock, LockSortOrder, NO_TEAM,
};
pub use types::{
    Actor, Application, DeployedApplication, Environment, EnvironmentGroup, FrontendConfig, Lock,
    Overview, Priority, Release, RolloutState, RolloutStatus, RolloutStatusEvent,
};
