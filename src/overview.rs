//! Dashboard wiring - stream subscriptions into the store, auth supervision
//!
//! Connects the generic subscriber to the dashboard state: overview snapshots
//! and rollout status events merge into their store fields, stream failures
//! surface as the connectivity banner (stale data stays displayed until a
//! reconnect replaces it). `supervise` gates subscriptions on authentication
//! readiness and re-subscribes when the header changes.

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::api::{AuthHeader, AuthState, StreamConnector, StreamError};
use crate::state::{
    apply_rollout_event, DashboardPatch, DashboardState, Overview, RolloutStatus,
    RolloutStatusEvent,
};
use crate::store::Store;
use crate::subscriber::{spawn_stream_subscriber, SubscribeOptions, SubscriptionHandle};

fn connectivity_payload(msg: &str, err: &StreamError) -> String {
    serde_json::json!({ "msg": msg, "error": err.to_string() }).to_string()
}

/// Subscribe to the streamed overview and keep the store in sync.
///
/// Every snapshot replaces the `overview` field, marks it loaded and clears
/// the connectivity banner; every stream failure records the banner. The
/// last good overview is never cleared on failure.
pub fn spawn_overview_subscriber(
    store: Store<DashboardState>,
    connector: impl StreamConnector<Overview>,
    auth: AuthHeader,
) -> SubscriptionHandle {
    let on_message_store = store.clone();
    let on_error_store = store;
    spawn_stream_subscriber(
        connector,
        auth,
        move |overview: Overview| {
            on_message_store.set(
                DashboardPatch::new()
                    .overview(overview)
                    .overview_loaded(true)
                    .connectivity_error(None),
            );
        },
        move |err| {
            on_error_store.set(
                DashboardPatch::new()
                    .connectivity_error(Some(connectivity_payload("error in overview stream", err))),
            );
        },
        SubscribeOptions::default(),
    )
}

/// Subscribe to the rollout status stream.
///
/// Events merge per application and environment. On failure the accumulated
/// rollout view is flushed (it cannot be trusted to be current) and the
/// connectivity banner is recorded.
pub fn spawn_rollout_subscriber(
    store: Store<DashboardState>,
    connector: impl StreamConnector<RolloutStatusEvent>,
    auth: AuthHeader,
) -> SubscriptionHandle {
    let on_message_store = store.clone();
    let on_error_store = store;
    spawn_stream_subscriber(
        connector,
        auth,
        move |event: RolloutStatusEvent| {
            let mut rollout = on_message_store.get().rollout;
            apply_rollout_event(&mut rollout, event);
            on_message_store.set(DashboardPatch::new().rollout(rollout));
        },
        move |err| {
            on_error_store.set(
                DashboardPatch::new()
                    .connectivity_error(Some(connectivity_payload("error in rollout stream", err)))
                    .rollout(RolloutStatus::default()),
            );
        },
        SubscribeOptions::default(),
    )
}

/// Owns one supervised subscription slot.
#[derive(Debug)]
pub struct SupervisorHandle {
    join: JoinHandle<()>,
}

impl SupervisorHandle {
    /// Tear down the supervisor and whatever subscription it holds open.
    pub fn shutdown(&self) {
        self.join.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }
}

impl Drop for SupervisorHandle {
    fn drop(&mut self) {
        self.join.abort();
    }
}

/// Gate a subscription on authentication readiness.
///
/// No stream is opened until the auth signal reports ready. When the auth
/// state changes value, the previous subscription is cancelled exactly once
/// before its replacement opens, so there is never more than one live stream
/// per logical subscriber. Losing readiness tears the subscription down
/// without opening a new one.
pub fn supervise<F>(mut auth_rx: watch::Receiver<AuthState>, spawn_fn: F) -> SupervisorHandle
where
    F: Fn(AuthHeader) -> SubscriptionHandle + Send + 'static,
{
    let join = tokio::spawn(async move {
        let mut current: Option<SubscriptionHandle> = None;
        let mut last_auth: Option<AuthState> = None;
        loop {
            let auth = auth_rx.borrow_and_update().clone();
            if last_auth.as_ref() != Some(&auth) {
                if let Some(previous) = current.take() {
                    debug!("auth changed; cancelling previous subscription");
                    previous.cancel();
                }
                if auth.ready {
                    info!("auth ready; opening subscription");
                    current = Some(spawn_fn(auth.header.clone()));
                }
                last_auth = Some(auth);
            }
            if auth_rx.changed().await.is_err() {
                // auth provider went away
                break;
            }
        }
        // dropping `current` cancels the live subscription
    });
    SupervisorHandle { join }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{AuthSignal, MessageStream};
    use crate::state::RolloutState;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio_stream::StreamExt;

    async fn settle() {
        for _ in 0..16 {
            tokio::task::yield_now().await;
        }
    }

    /// Stream that emits the given items and then stays open.
    fn open_stream<T: Send + 'static>(items: Vec<Result<T, StreamError>>) -> MessageStream<T> {
        Box::pin(tokio_stream::iter(items).chain(tokio_stream::pending()))
    }

    #[tokio::test(start_paused = true)]
    async fn test_banner_clears_after_successful_snapshot() {
        let store = Store::new(DashboardState::default());
        let calls = Arc::new(AtomicU32::new(0));
        let connector = {
            let calls = Arc::clone(&calls);
            move |_auth: AuthHeader| {
                let call = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if call == 0 {
                        Err(StreamError::Transport("connection refused".to_string()))
                    } else {
                        let overview = Overview {
                            git_revision: "abc123".to_string(),
                            ..Default::default()
                        };
                        Ok(open_stream(vec![Ok(overview)]))
                    }
                }
            }
        };
        let handle =
            spawn_overview_subscriber(store.clone(), connector, AuthHeader::new("token"));

        // first attempt fails: banner up, no overview yet
        settle().await;
        let state = store.get();
        assert!(state.connectivity_error.is_some());
        assert!(state
            .connectivity_error
            .as_deref()
            .unwrap()
            .contains("error in overview stream"));
        assert!(!state.overview_loaded);

        // the retry fires after one second and delivers the snapshot
        tokio::time::sleep(Duration::from_millis(1_100)).await;
        settle().await;
        let state = store.get();
        assert!(state.connectivity_error.is_none());
        assert!(state.overview_loaded);
        assert_eq!(state.overview.git_revision, "abc123");

        handle.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_keeps_last_good_overview() {
        let store = Store::new(DashboardState::default());
        let calls = Arc::new(AtomicU32::new(0));
        let connector = {
            let calls = Arc::clone(&calls);
            move |_auth: AuthHeader| {
                let call = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if call == 0 {
                        let overview = Overview {
                            git_revision: "good".to_string(),
                            ..Default::default()
                        };
                        Ok(open_stream(vec![
                            Ok(overview),
                            Err(StreamError::Status {
                                code: 14,
                                message: "unavailable".to_string(),
                            }),
                        ]))
                    } else {
                        Err(StreamError::Transport("still down".to_string()))
                    }
                }
            }
        };
        let handle =
            spawn_overview_subscriber(store.clone(), connector, AuthHeader::new("token"));

        settle().await;
        tokio::time::sleep(Duration::from_secs(5)).await;
        settle().await;

        let state = store.get();
        // banner is up, but the stale snapshot is still being displayed
        assert!(state.connectivity_error.is_some());
        assert!(state.overview_loaded);
        assert_eq!(state.overview.git_revision, "good");

        handle.cancel();
    }

    fn rollout_event(environment: &str, status: RolloutState) -> RolloutStatusEvent {
        RolloutStatusEvent {
            application: "billing".to_string(),
            environment: environment.to_string(),
            rollout_status: status,
        }
    }

    #[tokio::test]
    async fn test_rollout_events_merge_per_environment() {
        let store = Store::new(DashboardState::default());
        let connector = move |_auth: AuthHeader| async move {
            Ok(open_stream(vec![
                Ok(rollout_event("dev", RolloutState::Progressing)),
                Ok(rollout_event("prod", RolloutState::Pending)),
                Ok(rollout_event("dev", RolloutState::Successful)),
            ]))
        };
        let handle =
            spawn_rollout_subscriber(store.clone(), connector, AuthHeader::new("token"));

        settle().await;
        let rollout = store.get().rollout;
        assert!(rollout.enabled);
        let billing = &rollout.applications["billing"];
        assert_eq!(billing.len(), 2);
        assert_eq!(billing["dev"].rollout_status, RolloutState::Successful);

        handle.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn test_rollout_flushes_on_stream_error() {
        let store = Store::new(DashboardState::default());
        let calls = Arc::new(AtomicU32::new(0));
        let connector = {
            let calls = Arc::clone(&calls);
            move |_auth: AuthHeader| {
                let call = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if call == 0 {
                        Ok(open_stream(vec![
                            Ok(rollout_event("dev", RolloutState::Progressing)),
                            Err(StreamError::Transport("reset".to_string())),
                        ]))
                    } else {
                        Err(StreamError::Transport("still down".to_string()))
                    }
                }
            }
        };
        let handle =
            spawn_rollout_subscriber(store.clone(), connector, AuthHeader::new("token"));

        settle().await;
        let state = store.get();
        assert!(!state.rollout.enabled);
        assert!(state.rollout.applications.is_empty());
        assert!(state
            .connectivity_error
            .as_deref()
            .unwrap()
            .contains("error in rollout stream"));

        handle.cancel();
    }

    struct DropCounter(Arc<AtomicU32>);

    impl Drop for DropCounter {
        fn drop(&mut self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn pending_connector(
        connects: Arc<AtomicU32>,
        drops: Arc<AtomicU32>,
    ) -> impl StreamConnector<Overview> {
        move |_auth: AuthHeader| {
            connects.fetch_add(1, Ordering::SeqCst);
            let guard = DropCounter(Arc::clone(&drops));
            async move {
                let stream: MessageStream<Overview> =
                    Box::pin(tokio_stream::pending().map(move |item| {
                        let _held = &guard;
                        item
                    }));
                Ok(stream)
            }
        }
    }

    #[tokio::test]
    async fn test_supervise_gates_on_auth_and_resubscribes_once() {
        let store = Store::new(DashboardState::default());
        let connects = Arc::new(AtomicU32::new(0));
        let drops = Arc::new(AtomicU32::new(0));
        let signal = AuthSignal::new();

        let supervisor = {
            let store = store.clone();
            let connects = Arc::clone(&connects);
            let drops = Arc::clone(&drops);
            supervise(signal.subscribe(), move |auth| {
                spawn_overview_subscriber(
                    store.clone(),
                    pending_connector(Arc::clone(&connects), Arc::clone(&drops)),
                    auth,
                )
            })
        };

        // not ready: nothing opens
        settle().await;
        assert_eq!(connects.load(Ordering::SeqCst), 0);

        signal.set_ready(AuthHeader::new("header-a"));
        settle().await;
        assert_eq!(connects.load(Ordering::SeqCst), 1);

        // same auth state again: no churn
        signal.set_ready(AuthHeader::new("header-a"));
        settle().await;
        assert_eq!(connects.load(Ordering::SeqCst), 1);
        assert_eq!(drops.load(Ordering::SeqCst), 0);

        // header change: old stream disposed exactly once, new one opened
        signal.set_ready(AuthHeader::new("header-b"));
        settle().await;
        assert_eq!(connects.load(Ordering::SeqCst), 2);
        assert_eq!(drops.load(Ordering::SeqCst), 1);

        // readiness lost: live stream torn down, nothing new opened
        signal.clear();
        settle().await;
        assert_eq!(connects.load(Ordering::SeqCst), 2);
        assert_eq!(drops.load(Ordering::SeqCst), 2);

        supervisor.shutdown();
        settle().await;
        assert!(supervisor.is_finished());
    }
}
