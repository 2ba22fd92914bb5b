//! Backend collaborator surface - streams, errors, auth signal
//!
//! The sync core never speaks a wire protocol itself. A backend service is "a
//! callable that returns a cancellable stream of messages" and authentication
//! is an opaque header plus a readiness flag published by the auth provider.

use std::pin::Pin;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::watch;
use tokio_stream::Stream;

/// Server-streamed sequence of messages.
///
/// Dropping the stream is the dispose operation: the underlying call is torn
/// down and no further items are delivered.
pub type MessageStream<T> = Pin<Box<dyn Stream<Item = Result<T, StreamError>> + Send>>;

/// Status codes the gRPC-web transport re-establishes on its own.
pub const RETRYABLE_STATUS_CODES: [u32; 8] = [2, 4, 8, 9, 10, 13, 14, 15];

#[derive(Debug, Error)]
pub enum StreamError {
    /// Transport-level failure (connection refused, reset, ...).
    #[error("transport error: {0}")]
    Transport(String),
    /// The server answered with a non-OK status.
    #[error("status {code}: {message}")]
    Status { code: u32, message: String },
    /// The server completed the stream.
    #[error("stream closed by server")]
    Closed,
}

impl StreamError {
    /// Whether the failure is in the transport's own retryable set.
    ///
    /// The subscriber retries either way; this only grades log severity.
    pub fn is_retryable_status(&self) -> bool {
        match self {
            StreamError::Status { code, .. } => RETRYABLE_STATUS_CODES.contains(code),
            _ => true,
        }
    }
}

/// A callable that opens one server-streamed call.
///
/// Every `connect` is a fresh call. Implemented for closures, so a service
/// client method can be passed directly.
#[async_trait]
pub trait StreamConnector<T>: Send + Sync + 'static {
    async fn connect(&self, auth: AuthHeader) -> Result<MessageStream<T>, StreamError>;
}

#[async_trait]
impl<T, F, Fut> StreamConnector<T> for F
where
    F: Fn(AuthHeader) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = Result<MessageStream<T>, StreamError>> + Send,
{
    async fn connect(&self, auth: AuthHeader) -> Result<MessageStream<T>, StreamError> {
        (self)(auth).await
    }
}

/// Opaque authentication header forwarded with every streamed call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthHeader(String);

impl AuthHeader {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Authentication readiness as published by the auth provider.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthState {
    pub ready: bool,
    pub header: AuthHeader,
}

/// Publisher half of the auth dependency signal.
///
/// The authentication provider drives this; subscribers only consume receivers
/// (see [`crate::overview::supervise`]). Starts out not ready.
#[derive(Debug)]
pub struct AuthSignal {
    tx: watch::Sender<AuthState>,
}

impl AuthSignal {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(AuthState::default());
        Self { tx }
    }

    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.tx.subscribe()
    }

    /// Mark authentication ready with the given header.
    pub fn set_ready(&self, header: AuthHeader) {
        let _ = self.tx.send(AuthState {
            ready: true,
            header,
        });
    }

    /// Revoke readiness (sign-out, token invalidation); open subscriptions
    /// gated on this signal are torn down.
    pub fn clear(&self) {
        let _ = self.tx.send(AuthState::default());
    }
}

impl Default for AuthSignal {
    fn default() -> Self {
        Self::new()
    }
}
