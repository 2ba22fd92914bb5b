//! Resilient stream subscriber - subscribe, feed, retry with backoff
//!
//! One spawned task per subscription, walking the lifecycle
//! `IDLE -> SUBSCRIBED -> (ERROR -> SCHEDULED -> SUBSCRIBED)* -> CANCELLED`.
//! Transport failures are never fatal: every error records itself through the
//! caller's `on_error` hook and arms the next retry from the backoff schedule.
//! The only way out is cancellation (or, optionally, server completion).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_stream::StreamExt;
use tracing::{debug, error, info, warn};

use crate::api::{AuthHeader, StreamConnector, StreamError};
use crate::backoff::RetrySchedule;

/// What to do when the server completes the stream (as opposed to failing it).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompletionPolicy {
    /// Treat completion like an error and re-subscribe.
    #[default]
    Retry,
    /// Treat completion as terminal success and stop.
    Terminate,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SubscribeOptions {
    pub on_complete: CompletionPolicy,
}

/// Handle owning one subscription task.
///
/// Cancelling (or dropping) the handle disposes the live stream and clears any
/// pending retry timer. The abort lands on an await point, so a fired timer or
/// in-flight message after cancellation is a no-op: neither callback runs
/// again.
#[derive(Debug)]
pub struct SubscriptionHandle {
    join: JoinHandle<()>,
    cancelled: Arc<AtomicBool>,
}

impl SubscriptionHandle {
    /// Cancel the subscription. Idempotent; only the first call takes effect.
    pub fn cancel(&self) {
        if !self.cancelled.swap(true, Ordering::AcqRel) {
            debug!("subscription cancelled");
            self.join.abort();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// True once the task exited (terminal completion or cancellation).
    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Open a server-streamed subscription and keep it alive.
///
/// `on_message` runs for every received message, in transport delivery order.
/// `on_error` runs once per failed attempt, before the retry timer is armed;
/// merging into the store and maintaining the connectivity banner are the
/// caller's job inside these hooks.
pub fn spawn_stream_subscriber<T, C, FM, FE>(
    connector: C,
    auth: AuthHeader,
    mut on_message: FM,
    mut on_error: FE,
    options: SubscribeOptions,
) -> SubscriptionHandle
where
    T: Send + 'static,
    C: StreamConnector<T>,
    FM: FnMut(T) + Send + 'static,
    FE: FnMut(&StreamError) + Send + 'static,
{
    let cancelled = Arc::new(AtomicBool::new(false));
    let join = tokio::spawn(async move {
        let mut schedule = RetrySchedule::new();
        loop {
            let failure = match connector.connect(auth.clone()).await {
                Ok(mut stream) => {
                    debug!(attempt = schedule.attempt(), "stream subscribed");
                    let failure = loop {
                        match stream.next().await {
                            Some(Ok(message)) => on_message(message),
                            Some(Err(err)) => break err,
                            None => match options.on_complete {
                                CompletionPolicy::Retry => break StreamError::Closed,
                                CompletionPolicy::Terminate => {
                                    info!(attempt = schedule.attempt(), "stream completed");
                                    return;
                                }
                            },
                        }
                    };
                    // dispose the failed call before the retry timer is armed
                    drop(stream);
                    failure
                }
                Err(err) => err,
            };
            on_error(&failure);
            let delay = schedule.next_delay();
            if failure.is_retryable_status() {
                warn!(
                    attempt = schedule.attempt(),
                    delay_ms = delay.as_millis() as u64,
                    error = %failure,
                    "stream failed; retry scheduled"
                );
            } else {
                error!(
                    attempt = schedule.attempt(),
                    delay_ms = delay.as_millis() as u64,
                    error = %failure,
                    "stream failed with non-retryable status; retrying anyway"
                );
            }
            tokio::time::sleep(delay).await;
        }
    });
    SubscriptionHandle { join, cancelled }
}
