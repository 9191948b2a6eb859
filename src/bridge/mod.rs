//! Subscription bridge - the boundary between the store and whatever produces transfers
//!
//! The store only needs three things from a data source:
//! - `fetch_snapshot`: the full current transfer set (may fail)
//! - `subscribe`: start pushing payloads into an [`EventSink`] (may fail)
//! - `unsubscribe`: best-effort release, never fails
//!
//! Implementations:
//! - [`HttpBridge`] - indexer REST snapshot + server-sent events stream
//! - [`ChannelBridge`] - in-process fan-out, used for replays and tests

pub mod backoff;
pub mod channel;
pub mod http;
pub mod sse;

use {
    crate::{
        error::{FetchError, SubscriptionError},
        model::Transfer,
    },
    async_trait::async_trait,
    std::fmt,
    tokio::sync::mpsc,
};

pub use channel::ChannelBridge;
pub use http::HttpBridge;

#[async_trait]
pub trait Bridge: Send + Sync {
    /// Request the full current transfer set
    async fn fetch_snapshot(&self) -> Result<Vec<Transfer>, FetchError>;

    /// Start pushing payloads into `sink`
    ///
    /// Payloads may be delivered at least once and may start flowing before
    /// this call returns.
    async fn subscribe(&self, sink: EventSink) -> Result<SubscriptionHandle, SubscriptionError>;

    /// Release a subscription
    fn unsubscribe(&self, handle: SubscriptionHandle) {
        handle.release();
    }
}

/// Live connection health as seen by the bridge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionStatus {
    #[default]
    Disconnected,
    Connected,
    Reconnecting,
}

impl ConnectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionStatus::Disconnected => "Disconnected",
            ConnectionStatus::Connected => "Connected",
            ConnectionStatus::Reconnecting => "Reconnecting",
        }
    }
}

/// Something a subscription pushed towards the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeEvent {
    /// Raw payload text (a transfer JSON object or the stop sentinel)
    Payload(String),
    Connection(ConnectionStatus),
}

/// A bridge event tagged with the subscription attempt that produced it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub generation: u64,
    pub event: BridgeEvent,
}

/// Receiving side of a subscription has gone away
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SinkClosed;

impl fmt::Display for SinkClosed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Event sink closed")
    }
}

impl std::error::Error for SinkClosed {}

/// Where a subscription pushes its events
///
/// Bounded: `deliver` waits when the store falls behind instead of dropping.
#[derive(Debug, Clone)]
pub struct EventSink {
    generation: u64,
    tx: mpsc::Sender<Delivery>,
}

impl EventSink {
    pub fn new(generation: u64, tx: mpsc::Sender<Delivery>) -> Self {
        Self { generation, tx }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub async fn deliver(&self, payload: impl Into<String>) -> Result<(), SinkClosed> {
        self.send(BridgeEvent::Payload(payload.into())).await
    }

    pub async fn connection(&self, status: ConnectionStatus) -> Result<(), SinkClosed> {
        self.send(BridgeEvent::Connection(status)).await
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    async fn send(&self, event: BridgeEvent) -> Result<(), SinkClosed> {
        self.tx
            .send(Delivery {
                generation: self.generation,
                event,
            })
            .await
            .map_err(|_| SinkClosed)
    }
}

type ReleaseFn = Box<dyn FnOnce() + Send>;

/// Ownership of one live subscription
///
/// The underlying resource is released exactly once: explicitly through
/// [`SubscriptionHandle::release`] or implicitly when the handle is dropped.
pub struct SubscriptionHandle {
    id: u64,
    release: Option<ReleaseFn>,
}

impl SubscriptionHandle {
    pub fn new<F>(id: u64, release: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            id,
            release: Some(Box::new(release)),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn release(mut self) {
        self.run_release();
    }

    fn run_release(&mut self) {
        if let Some(release) = self.release.take() {
            log::debug!("Releasing subscription {}", self.id);
            release();
        }
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        self.run_release();
    }
}

impl fmt::Debug for SubscriptionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionHandle")
            .field("id", &self.id)
            .field("released", &self.release.is_none())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    #[test]
    fn test_handle_releases_once() {
        let released = Arc::new(AtomicUsize::new(0));

        let counter = released.clone();
        let handle = SubscriptionHandle::new(1, move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        handle.release();
        assert_eq!(released.load(Ordering::SeqCst), 1);

        let counter = released.clone();
        let handle = SubscriptionHandle::new(2, move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        drop(handle);
        assert_eq!(released.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_sink_tags_generation() {
        let (tx, mut rx) = mpsc::channel(4);
        let sink = EventSink::new(9, tx);

        sink.connection(ConnectionStatus::Connected).await.unwrap();
        sink.deliver("stop").await.unwrap();

        let first = rx.recv().await.unwrap();
        assert_eq!(first.generation, 9);
        assert_eq!(first.event, BridgeEvent::Connection(ConnectionStatus::Connected));

        let second = rx.recv().await.unwrap();
        assert_eq!(second.event, BridgeEvent::Payload("stop".to_string()));

        drop(rx);
        assert_eq!(sink.deliver("late").await, Err(SinkClosed));
    }
}
