//! Reconciles the control plane's lifecycle event stream into the session
//! registry.

use std::sync::Arc;

use gridgate_protocol::{BrowserEvent, EventType, Session};
use tokio::sync::watch;
use tracing::{debug, error, info};

use crate::error::{Error, Result};
use crate::ipid;
use crate::source::EventSource;
use crate::store::SessionStore;

/// The registry's single writer.
///
/// Subscribes to the event stream for one group and applies every event to
/// the store, in stream order, until the stream breaks or shutdown is
/// signaled.
pub struct Collector<S> {
    source: S,
    group: String,
    store: Arc<SessionStore>,
}

impl<S: EventSource> Collector<S> {
    pub fn new(source: S, group: impl Into<String>, store: Arc<SessionStore>) -> Self {
        Self {
            source,
            group: group.into(),
            store,
        }
    }

    /// Run the reconciliation loop until the stream breaks or `shutdown`
    /// fires.
    ///
    /// Returns [`Error::Canceled`] on a clean external shutdown; any other
    /// return is a stream failure the supervisor should treat as fatal.
    /// The subscription is released on every exit path.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        let mut subscription = self.source.subscribe(&self.group).await?;

        info!(group = %self.group, "collector started");

        // A closed error channel must not keep winning the select; gate the
        // branch off once it closes.
        let mut errors_open = true;

        loop {
            tokio::select! {
                event = subscription.events.recv() => {
                    let Some(event) = event else {
                        error!("browser event stream closed unexpectedly");
                        return Err(Error::StreamClosed);
                    };
                    self.apply(event)?;
                }
                err = subscription.errors.recv(), if errors_open => {
                    match err {
                        Some(err) => return Err(Error::StreamTransport(err)),
                        None => errors_open = false,
                    }
                }
                _ = shutdown.changed() => {
                    info!("collector shutting down");
                    return Err(Error::Canceled);
                }
            }
        }
    }

    fn apply(&self, event: BrowserEvent) -> Result<()> {
        match event.event_type {
            EventType::Deleted => {
                // Unconditional: fires whether or not an entry exists.
                self.store.delete(&event.browser_id);
                debug!(browser_id = %event.browser_id, "session deleted from registry");
            }
            EventType::Added | EventType::Modified => {
                if event.address.is_empty() {
                    // Instance not reachable yet. Leave any prior entry
                    // untouched rather than fabricating a pending record.
                    return Ok(());
                }
                let session_id = ipid::session_id_for(&event.address).inspect_err(|_| {
                    error!(
                        browser_id = %event.browser_id,
                        address = %event.address,
                        "address does not map to a session id",
                    );
                })?;
                let session = Session {
                    session_id: session_id.to_string(),
                    browser_id: event.browser_id.clone(),
                    address: event.address,
                    browser_name: event.browser_name,
                    browser_version: event.browser_version,
                    start_time: event.creation_time,
                    phase: event.phase,
                };
                debug!(
                    browser_id = %event.browser_id,
                    session_id = %session.session_id,
                    "session stored in registry",
                );
                self.store.set(event.browser_id, session);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use gridgate_protocol::Phase;
    use parking_lot::Mutex;
    use tokio::sync::mpsc;

    use super::*;
    use crate::source::Subscription;

    struct FakeSource {
        subscription: Mutex<Option<Subscription>>,
    }

    impl FakeSource {
        fn new(subscription: Subscription) -> Self {
            Self {
                subscription: Mutex::new(Some(subscription)),
            }
        }

        fn unavailable() -> Self {
            Self {
                subscription: Mutex::new(None),
            }
        }
    }

    #[async_trait]
    impl EventSource for FakeSource {
        async fn subscribe(&self, _group: &str) -> Result<Subscription> {
            self.subscription
                .lock()
                .take()
                .ok_or_else(|| Error::StreamUnavailable("no stream".into()))
        }
    }

    struct Channels {
        events: mpsc::Sender<BrowserEvent>,
        errors: mpsc::Sender<String>,
    }

    fn subscription() -> (Channels, Subscription) {
        let (events_tx, events) = mpsc::channel(16);
        let (errors_tx, errors) = mpsc::channel(16);
        (
            Channels {
                events: events_tx,
                errors: errors_tx,
            },
            Subscription { events, errors },
        )
    }

    fn event(event_type: EventType, browser_id: &str, address: &str) -> BrowserEvent {
        BrowserEvent {
            event_type,
            browser_id: browser_id.into(),
            address: address.into(),
            browser_name: "chrome".into(),
            browser_version: "123".into(),
            creation_time: None,
            phase: Phase::Running,
        }
    }

    fn seeded(browser_id: &str, address: &str) -> Session {
        Session {
            session_id: "stale".into(),
            browser_id: browser_id.into(),
            address: address.into(),
            browser_name: "chrome".into(),
            browser_version: "122".into(),
            start_time: None,
            phase: Phase::Pending,
        }
    }

    /// Feeds the given events, drops the senders, and runs the collector to
    /// the resulting StreamClosed exit.
    async fn run_to_stream_end(store: &Arc<SessionStore>, events: Vec<BrowserEvent>) -> Error {
        let (channels, sub) = subscription();
        for event in events {
            channels.events.send(event).await.unwrap();
        }
        drop(channels);

        let collector = Collector::new(FakeSource::new(sub), "default", store.clone());
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        collector.run(shutdown_rx).await.unwrap_err()
    }

    #[tokio::test]
    async fn subscribe_failure_is_stream_unavailable() {
        let store = Arc::new(SessionStore::new());
        let collector = Collector::new(FakeSource::unavailable(), "default", store);
        let (_tx, rx) = watch::channel(false);
        let err = collector.run(rx).await.unwrap_err();
        assert!(matches!(err, Error::StreamUnavailable(_)));
    }

    #[tokio::test]
    async fn closed_event_channel_is_fatal() {
        let store = Arc::new(SessionStore::new());
        let err = run_to_stream_end(&store, vec![]).await;
        assert!(matches!(err, Error::StreamClosed));
    }

    #[tokio::test]
    async fn transport_error_is_fatal() {
        let store = Arc::new(SessionStore::new());
        let (channels, sub) = subscription();
        channels.errors.send("connection reset".into()).await.unwrap();

        let collector = Collector::new(FakeSource::new(sub), "default", store);
        let (_tx, rx) = watch::channel(false);
        let err = collector.run(rx).await.unwrap_err();
        assert!(matches!(err, Error::StreamTransport(msg) if msg == "connection reset"));
    }

    #[tokio::test]
    async fn shutdown_signal_cancels_cleanly() {
        let store = Arc::new(SessionStore::new());
        let (channels, sub) = subscription();
        let collector = Collector::new(FakeSource::new(sub), "default", store);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(collector.run(shutdown_rx));
        shutdown_tx.send(true).unwrap();
        let err = handle.await.unwrap().unwrap_err();
        assert!(err.is_canceled());
        drop(channels);
    }

    #[tokio::test]
    async fn added_event_creates_session() {
        let store = Arc::new(SessionStore::new());
        run_to_stream_end(&store, vec![event(EventType::Added, "b1", "127.0.0.1")]).await;

        let session = store.get("b1").unwrap();
        assert_eq!(
            session.session_id,
            ipid::session_id_for("127.0.0.1").unwrap().to_string()
        );
        assert_eq!(session.address, "127.0.0.1");
        assert_eq!(session.browser_name, "chrome");
        assert_eq!(session.phase, Phase::Running);
    }

    #[tokio::test]
    async fn deleted_event_removes_session() {
        let store = Arc::new(SessionStore::new());
        store.set("b1", seeded("b1", "10.0.0.1"));
        run_to_stream_end(&store, vec![event(EventType::Deleted, "b1", "")]).await;
        assert!(store.get("b1").is_none());
    }

    #[tokio::test]
    async fn deleted_event_for_absent_key_is_idempotent() {
        let store = Arc::new(SessionStore::new());
        run_to_stream_end(&store, vec![event(EventType::Deleted, "ghost", "")]).await;
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn empty_address_leaves_registry_untouched() {
        let store = Arc::new(SessionStore::new());
        store.set("b1", seeded("b1", "10.0.0.1"));
        run_to_stream_end(
            &store,
            vec![
                event(EventType::Modified, "b1", ""),
                event(EventType::Added, "b2", ""),
            ],
        )
        .await;

        // b1 keeps its prior entry, b2 never appears.
        assert_eq!(store.get("b1").unwrap().session_id, "stale");
        assert!(store.get("b2").is_none());
    }

    #[tokio::test]
    async fn modified_event_overwrites_wholesale() {
        let store = Arc::new(SessionStore::new());
        run_to_stream_end(
            &store,
            vec![
                event(EventType::Added, "b1", "10.0.0.1"),
                event(EventType::Modified, "b1", "10.0.0.2"),
            ],
        )
        .await;

        let session = store.get("b1").unwrap();
        assert_eq!(session.address, "10.0.0.2");
        assert_eq!(
            session.session_id,
            ipid::session_id_for("10.0.0.2").unwrap().to_string()
        );
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn invalid_address_terminates_the_run() {
        let store = Arc::new(SessionStore::new());
        let (channels, sub) = subscription();
        channels
            .events
            .send(event(EventType::Added, "b1", "not-an-ip"))
            .await
            .unwrap();

        let collector = Collector::new(FakeSource::new(sub), "default", store.clone());
        let (_tx, rx) = watch::channel(false);
        let err = collector.run(rx).await.unwrap_err();
        assert!(matches!(err, Error::AddressConversion { ref address } if address == "not-an-ip"));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn events_apply_in_stream_order() {
        let store = Arc::new(SessionStore::new());
        run_to_stream_end(
            &store,
            vec![
                event(EventType::Added, "b1", "10.0.0.1"),
                event(EventType::Deleted, "b1", ""),
                event(EventType::Added, "b2", "10.0.0.2"),
            ],
        )
        .await;

        assert!(store.get("b1").is_none());
        assert!(store.get("b2").is_some());
    }

    #[tokio::test]
    async fn closed_error_channel_does_not_break_the_loop() {
        let store = Arc::new(SessionStore::new());
        let (channels, sub) = subscription();
        drop(channels.errors);
        channels
            .events
            .send(event(EventType::Added, "b1", "10.0.0.1"))
            .await
            .unwrap();
        drop(channels.events);

        let collector = Collector::new(FakeSource::new(sub), "default", store.clone());
        let (_tx, rx) = watch::channel(false);
        let err = collector.run(rx).await.unwrap_err();
        assert!(matches!(err, Error::StreamClosed));
        assert!(store.get("b1").is_some());
    }
}
