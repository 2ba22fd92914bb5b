//! Frontend configuration - one-shot fetch into the store
//!
//! Unlike the streamed subscriptions, the config call is fetched once and not
//! retried by this core; failure policy belongs to the caller.

use std::future::Future;

use tracing::{error, info};

use crate::state::{DashboardPatch, DashboardState, FrontendConfig};
use crate::store::Store;

/// Await one configuration fetch and merge the result into the store.
///
/// On success `config` and `config_ready` are set; on failure the error is
/// logged and the store is left untouched.
pub async fn load_config<Fut>(store: &Store<DashboardState>, fetch: Fut)
where
    Fut: Future<Output = anyhow::Result<FrontendConfig>>,
{
    match fetch.await {
        Ok(config) => {
            info!(version = %config.server_version, "frontend configuration loaded");
            store.set(DashboardPatch::new().config(config).config_ready(true));
        }
        Err(err) => {
            error!(error = %err, "cannot connect to server for configuration");
        }
    }
}

/// Aggregated readiness of the startup calls, for a single loading spinner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlobalLoadingState {
    pub config_ready: bool,
    pub overview_loaded: bool,
    pub authenticated: bool,
    pub auth_enabled: bool,
}

impl GlobalLoadingState {
    pub fn everything_loaded(&self) -> bool {
        self.overview_loaded && self.config_ready && (self.authenticated || !self.auth_enabled)
    }
}

/// Projection of the startup readiness; `authenticated` comes from the auth
/// provider, everything else from the store.
pub fn global_loading_state(state: &DashboardState, authenticated: bool) -> GlobalLoadingState {
    GlobalLoadingState {
        config_ready: state.config_ready,
        overview_loaded: state.overview_loaded,
        authenticated,
        auth_enabled: state.config.auth_enabled,
    }
}
