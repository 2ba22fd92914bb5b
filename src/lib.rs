//! overview-sync - client-side sync core for a deployment dashboard
//!
//! Keeps a shared [`store::Store`] in sync with server-streamed backend calls:
//! overview snapshots, rollout status events and the one-shot frontend
//! configuration. Stream failures are never fatal; each subscription heals
//! itself on the [`backoff`] ramp until its owner cancels it, and surfaces
//! outages as a connectivity banner field while the last good data stays
//! available.
//!
//! The UI shell, routing and authentication providers live elsewhere; this
//! crate only consumes "a callable returning a cancellable stream of
//! messages" ([`api::StreamConnector`]) and an auth readiness signal
//! ([`api::AuthSignal`]).

pub mod api;
pub mod backoff;
pub mod config;
pub mod history;
pub mod overview;
pub mod state;
pub mod store;
pub mod subscriber;

pub use api::{AuthHeader, AuthSignal, AuthState, MessageStream, StreamConnector, StreamError};
pub use overview::{
    spawn_overview_subscriber, spawn_rollout_subscriber, supervise, SupervisorHandle,
};
pub use state::{DashboardPatch, DashboardState, Overview};
pub use store::{ListenerId, Patchable, Projection, Store};
pub use subscriber::{
    spawn_stream_subscriber, CompletionPolicy, SubscribeOptions, SubscriptionHandle,
};
