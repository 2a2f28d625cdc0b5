//! Boundary to the control plane's lifecycle event stream.

use async_trait::async_trait;
use gridgate_protocol::BrowserEvent;
use tokio::sync::mpsc;

use crate::error::Result;

/// A live subscription to lifecycle events for one group.
///
/// Events arrive on `events` in delivery order; the stream guarantees
/// per-key ordering. Transport failures arrive on `errors`. The events
/// channel closing without an error means the stream ended unexpectedly.
///
/// Dropping the subscription releases the underlying stream; both channels
/// close and the producer side stops.
#[derive(Debug)]
pub struct Subscription {
    pub events: mpsc::Receiver<BrowserEvent>,
    pub errors: mpsc::Receiver<String>,
}

/// Source of lifecycle event streams, scoped by group.
#[async_trait]
pub trait EventSource: Send + Sync {
    /// Open the lifecycle event stream for `group`.
    ///
    /// Fails with [`crate::Error::StreamUnavailable`] when the stream
    /// cannot be established.
    async fn subscribe(&self, group: &str) -> Result<Subscription>;
}
