use {
    super::{Bridge, ConnectionStatus, EventSink, SubscriptionHandle},
    crate::{
        error::{FetchError, SubscriptionError},
        model::{Transfer, STOP_SENTINEL},
    },
    async_trait::async_trait,
    std::{
        collections::HashMap,
        sync::{
            atomic::{AtomicU64, Ordering},
            Arc, Mutex,
        },
    },
};

type Subscribers = Arc<Mutex<HashMap<u64, EventSink>>>;

/// In-process bridge: a settable snapshot plus fan-out to every subscriber
pub struct ChannelBridge {
    snapshot: Mutex<Vec<Transfer>>,
    subscribers: Subscribers,
    next_id: AtomicU64,
}

impl ChannelBridge {
    pub fn new(snapshot: Vec<Transfer>) -> Self {
        Self {
            snapshot: Mutex::new(snapshot),
            subscribers: Arc::new(Mutex::new(HashMap::new())),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn set_snapshot(&self, transfers: Vec<Transfer>) {
        if let Ok(mut snapshot) = self.snapshot.lock() {
            *snapshot = transfers;
        }
    }

    /// Number of subscriptions that have not been released
    pub fn active_subscriptions(&self) -> usize {
        self.subscribers.lock().map(|s| s.len()).unwrap_or(0)
    }

    /// Push a transfer to every subscriber, returning how many received it
    pub async fn publish(&self, transfer: &Transfer) -> usize {
        match serde_json::to_string(transfer) {
            Ok(payload) => self.publish_raw(&payload).await,
            Err(e) => {
                log::warn!("Failed to serialize transfer {}: {}", transfer.id, e);
                0
            }
        }
    }

    pub async fn publish_stop(&self) -> usize {
        self.publish_raw(STOP_SENTINEL).await
    }

    /// Push an arbitrary payload as-is
    pub async fn publish_raw(&self, payload: &str) -> usize {
        let sinks = self.sinks();
        let mut delivered = 0;

        for (id, sink) in sinks {
            if sink.deliver(payload).await.is_ok() {
                delivered += 1;
            } else {
                log::debug!("Dropping closed subscriber {}", id);
                if let Ok(mut subscribers) = self.subscribers.lock() {
                    subscribers.remove(&id);
                }
            }
        }
        delivered
    }

    // Clone sinks out of the lock so no guard is held across an await
    fn sinks(&self) -> Vec<(u64, EventSink)> {
        self.subscribers
            .lock()
            .map(|s| s.iter().map(|(id, sink)| (*id, sink.clone())).collect())
            .unwrap_or_default()
    }
}

impl Default for ChannelBridge {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

#[async_trait]
impl Bridge for ChannelBridge {
    async fn fetch_snapshot(&self) -> Result<Vec<Transfer>, FetchError> {
        self.snapshot
            .lock()
            .map(|s| s.clone())
            .map_err(|e| FetchError::Request(e.to_string()))
    }

    async fn subscribe(&self, sink: EventSink) -> Result<SubscriptionHandle, SubscriptionError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);

        if sink.connection(ConnectionStatus::Connected).await.is_err() {
            return Err(SubscriptionError::Connect("event sink closed".to_string()));
        }

        self.subscribers
            .lock()
            .map_err(|e| SubscriptionError::Connect(e.to_string()))?
            .insert(id, sink);

        let subscribers = self.subscribers.clone();
        Ok(SubscriptionHandle::new(id, move || {
            if let Ok(mut subscribers) = subscribers.lock() {
                subscribers.remove(&id);
            }
        }))
    }
}
