//! Canonical transfer collection and live-subscription lifecycle
//!
//! [`TransferStore`] is a plain state container: every mutation is a
//! synchronous `&mut self` call and listeners are notified right after it
//! completes. [`runtime::StoreRuntime`] drives it from a single task, turning
//! bridge calls into messages so the store is never mutated concurrently.
//!
//! Subscription lifecycle:
//! `Idle -> Subscribing -> Active -> Idle` (stop) and
//! `Idle -> Subscribing -> Failed -> Idle` (stop after an error).
//!
//! Each subscription attempt gets a new generation number. A late attempt or
//! a delivery carrying an old generation is ignored.

pub mod runtime;

use {
    crate::{
        bridge::{BridgeEvent, ConnectionStatus, Delivery, SubscriptionHandle},
        error::{FetchError, MalformedEventError, StoreError, SubscriptionError},
        model::{StreamMessage, Transfer},
    },
    std::{collections::HashMap, sync::Arc},
};

pub use runtime::{StoreHandle, StoreRuntime};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SubscriptionState {
    #[default]
    Idle,
    Subscribing,
    Active,
    Failed,
}

impl SubscriptionState {
    /// An attempt is running or established
    pub fn is_live(&self) -> bool {
        matches!(self, SubscriptionState::Subscribing | SubscriptionState::Active)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionState::Idle => "Idle",
            SubscriptionState::Subscribing => "Subscribing",
            SubscriptionState::Active => "Active",
            SubscriptionState::Failed => "Failed",
        }
    }
}

/// What a listener is told after a mutation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreChange {
    SnapshotReplaced { len: usize },
    Inserted { id: i64, index: usize },
    Replaced { id: i64, index: usize },
    Subscription(SubscriptionState),
    Connection(ConnectionStatus),
    Error(StoreError),
    MalformedEvent(MalformedEventError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    Inserted(usize),
    Replaced(usize),
    /// Identical transfer already stored at this index
    Unchanged(usize),
}

/// Result of resolving a subscription attempt
#[derive(Debug)]
pub enum Resolution {
    Installed,
    Failed(SubscriptionError),
    /// Attempt was superseded or stopped; the handle (if any) must be released
    Stale(Option<SubscriptionHandle>),
}

pub type ListenerId = u64;

type Listener = Box<dyn FnMut(&StoreChange) + Send>;

/// Immutable copy of store state handed to renderers
#[derive(Debug, Clone, Default)]
pub struct StoreView {
    pub version: u64,
    pub transfers: Arc<Vec<Transfer>>,
    pub subscription: SubscriptionState,
    pub connection: ConnectionStatus,
    pub last_error: Option<StoreError>,
    pub malformed_events: u64,
    pub last_block: Option<i64>,
}

pub struct TransferStore {
    /// Insertion-ordered, at most one entry per id
    transfers: Arc<Vec<Transfer>>,
    /// id -> index into `transfers`
    positions: HashMap<i64, usize>,
    /// Bumped whenever the collection changes
    version: u64,
    /// Bumped on every observable change (collection or status)
    revision: u64,

    subscription: SubscriptionState,
    generation: u64,
    handle: Option<SubscriptionHandle>,
    connection: ConnectionStatus,

    fetch_seq: u64,
    applied_fetch: u64,
    fetches_in_flight: usize,
    /// Live transfers ingested while a snapshot fetch was outstanding
    live_during_fetch: Vec<Transfer>,

    last_error: Option<StoreError>,
    malformed_events: u64,

    listeners: Vec<(ListenerId, Listener)>,
    next_listener: ListenerId,
}

impl TransferStore {
    pub fn new() -> Self {
        Self {
            transfers: Arc::new(Vec::new()),
            positions: HashMap::new(),
            version: 0,
            revision: 0,
            subscription: SubscriptionState::Idle,
            generation: 0,
            handle: None,
            connection: ConnectionStatus::Disconnected,
            fetch_seq: 0,
            applied_fetch: 0,
            fetches_in_flight: 0,
            live_during_fetch: Vec::new(),
            last_error: None,
            malformed_events: 0,
            listeners: Vec::new(),
            next_listener: 1,
        }
    }

    /// Canonical collection in insertion order
    pub fn get_snapshot(&self) -> Arc<Vec<Transfer>> {
        self.transfers.clone()
    }

    pub fn transfers(&self) -> &[Transfer] {
        &self.transfers
    }

    pub fn get(&self, id: i64) -> Option<&Transfer> {
        self.positions.get(&id).map(|&index| &self.transfers[index])
    }

    pub fn len(&self) -> usize {
        self.transfers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transfers.is_empty()
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn subscription_state(&self) -> SubscriptionState {
        self.subscription
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn has_subscription_handle(&self) -> bool {
        self.handle.is_some()
    }

    pub fn connection(&self) -> ConnectionStatus {
        self.connection
    }

    pub fn last_error(&self) -> Option<&StoreError> {
        self.last_error.as_ref()
    }

    pub fn malformed_events(&self) -> u64 {
        self.malformed_events
    }

    /// Highest block number currently stored
    pub fn last_block(&self) -> Option<i64> {
        self.transfers.iter().map(|t| t.block_number).max()
    }

    pub fn view(&self) -> StoreView {
        StoreView {
            version: self.version,
            transfers: self.transfers.clone(),
            subscription: self.subscription,
            connection: self.connection,
            last_error: self.last_error.clone(),
            malformed_events: self.malformed_events,
            last_block: self.last_block(),
        }
    }

    /// Register a listener, called synchronously after every mutation
    pub fn add_listener<F>(&mut self, listener: F) -> ListenerId
    where
        F: FnMut(&StoreChange) + Send + 'static,
    {
        let id = self.next_listener;
        self.next_listener += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    pub fn remove_listener(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(listener_id, _)| *listener_id != id);
        self.listeners.len() != before
    }

    // ------------------------------------------------------------------
    // Collection
    // ------------------------------------------------------------------

    /// Upsert by id: replace in place, or append
    pub fn ingest(&mut self, transfer: Transfer) -> IngestOutcome {
        if self.fetches_in_flight > 0 {
            self.live_during_fetch.push(transfer.clone());
        }

        let id = transfer.id;
        let outcome = self.upsert(transfer);
        match outcome {
            IngestOutcome::Inserted(index) => self.notify(StoreChange::Inserted { id, index }),
            IngestOutcome::Replaced(index) => self.notify(StoreChange::Replaced { id, index }),
            IngestOutcome::Unchanged(_) => {}
        }
        outcome
    }

    /// Decode and ingest one stream payload
    ///
    /// The stop sentinel is absorbed (`Ok(None)`). Malformed payloads are
    /// counted, logged and dropped.
    pub fn ingest_payload(
        &mut self,
        payload: &str,
    ) -> Result<Option<IngestOutcome>, MalformedEventError> {
        let decoded = StreamMessage::decode(payload).and_then(|message| match message {
            StreamMessage::Transfer(transfer) => transfer.validate().map(|_| Some(transfer)),
            StreamMessage::Stop => Ok(None),
        });

        match decoded {
            Ok(Some(transfer)) => Ok(Some(self.ingest(transfer))),
            Ok(None) => {
                log::debug!("Stream stop sentinel received");
                Ok(None)
            }
            Err(e) => {
                self.malformed_events += 1;
                log::warn!("⚠️  Dropping malformed stream event: {}", e);
                self.notify(StoreChange::MalformedEvent(e.clone()));
                Err(e)
            }
        }
    }

    /// Replace the collection wholesale; the snapshot is authoritative
    ///
    /// Duplicate ids inside the snapshot collapse onto the first position,
    /// keeping the later value.
    pub fn replace_snapshot(&mut self, snapshot: Vec<Transfer>) {
        let mut transfers: Vec<Transfer> = Vec::with_capacity(snapshot.len());
        let mut positions = HashMap::with_capacity(snapshot.len());

        for transfer in snapshot {
            match positions.get(&transfer.id) {
                Some(&index) => transfers[index] = transfer,
                None => {
                    positions.insert(transfer.id, transfers.len());
                    transfers.push(transfer);
                }
            }
        }

        let len = transfers.len();
        self.transfers = Arc::new(transfers);
        self.positions = positions;
        self.version += 1;
        self.notify(StoreChange::SnapshotReplaced { len });
    }

    /// Mark a snapshot fetch as outstanding, returning its sequence number
    pub fn begin_fetch(&mut self) -> u64 {
        self.fetch_seq += 1;
        self.fetches_in_flight += 1;
        self.fetch_seq
    }

    /// Apply the outcome of a fetch started with [`TransferStore::begin_fetch`]
    ///
    /// On failure the collection is left exactly as it was.
    pub fn complete_fetch(
        &mut self,
        fetch: u64,
        result: Result<Vec<Transfer>, FetchError>,
    ) -> Result<(), FetchError> {
        self.fetches_in_flight = self.fetches_in_flight.saturating_sub(1);

        let outcome = match result {
            Ok(_) if fetch < self.applied_fetch => {
                log::debug!(
                    "Discarding snapshot from fetch {} (fetch {} already applied)",
                    fetch,
                    self.applied_fetch
                );
                Ok(())
            }
            Ok(snapshot) => {
                log::info!("📦 Applying snapshot of {} transfers", snapshot.len());
                self.applied_fetch = fetch;
                self.replace_snapshot(snapshot);
                self.reapply_live_during_fetch();
                if matches!(self.last_error, Some(StoreError::Fetch(_))) {
                    self.last_error = None;
                }
                Ok(())
            }
            Err(e) => {
                log::error!("❌ Failed to fetch initial data: {}", e);
                self.record_error(e.clone().into());
                Err(e)
            }
        };

        if self.fetches_in_flight == 0 {
            self.live_during_fetch.clear();
        }
        outcome
    }

    // Live transfers that raced the fetch and are missing from the snapshot
    fn reapply_live_during_fetch(&mut self) {
        let pending = self.live_during_fetch.clone();
        for transfer in pending {
            if self.positions.contains_key(&transfer.id) {
                continue;
            }
            let id = transfer.id;
            if let IngestOutcome::Inserted(index) = self.upsert(transfer) {
                log::debug!("Re-applied live transfer {} received during fetch", id);
                self.notify(StoreChange::Inserted { id, index });
            }
        }
    }

    fn upsert(&mut self, transfer: Transfer) -> IngestOutcome {
        if let Some(&index) = self.positions.get(&transfer.id) {
            if self.transfers[index] == transfer {
                return IngestOutcome::Unchanged(index);
            }
            Arc::make_mut(&mut self.transfers)[index] = transfer;
            self.version += 1;
            return IngestOutcome::Replaced(index);
        }

        let index = self.transfers.len();
        self.positions.insert(transfer.id, index);
        Arc::make_mut(&mut self.transfers).push(transfer);
        self.version += 1;
        IngestOutcome::Inserted(index)
    }

    // ------------------------------------------------------------------
    // Subscription lifecycle
    // ------------------------------------------------------------------

    /// Start a subscription attempt
    ///
    /// Returns the new generation, or `None` when an attempt is already
    /// running or established.
    pub fn begin_subscribe(&mut self) -> Option<u64> {
        if self.subscription.is_live() {
            log::debug!(
                "Live updates already {} (generation {})",
                self.subscription.as_str(),
                self.generation
            );
            return None;
        }

        self.generation += 1;
        self.set_subscription(SubscriptionState::Subscribing);
        Some(self.generation)
    }

    /// Resolve the attempt started for `generation`
    pub fn complete_subscribe(
        &mut self,
        generation: u64,
        result: Result<SubscriptionHandle, SubscriptionError>,
    ) -> Resolution {
        if generation != self.generation || self.subscription != SubscriptionState::Subscribing {
            log::info!(
                "Discarding stale subscription attempt {} (current generation {})",
                generation,
                self.generation
            );
            return Resolution::Stale(result.ok());
        }

        match result {
            Ok(handle) => {
                log::info!("✅ Live updates active (subscription {})", handle.id());
                self.handle = Some(handle);
                if matches!(self.last_error, Some(StoreError::Subscription(_))) {
                    self.last_error = None;
                }
                self.set_subscription(SubscriptionState::Active);
                Resolution::Installed
            }
            Err(e) => {
                log::error!("❌ Failed to start live updates: {}", e);
                self.set_subscription(SubscriptionState::Failed);
                self.record_error(e.clone().into());
                Resolution::Failed(e)
            }
        }
    }

    /// Stop live updates; safe from any state
    ///
    /// Returns the handle that must be released. Any attempt still in flight
    /// becomes stale.
    pub fn stop_live_updates(&mut self) -> Option<SubscriptionHandle> {
        let handle = self.handle.take();

        if self.subscription != SubscriptionState::Idle {
            self.generation += 1;
            self.set_subscription(SubscriptionState::Idle);
            self.set_connection(ConnectionStatus::Disconnected);
            log::info!("⏹️  Live updates stopped");
        }

        handle
    }

    /// Route one bridge delivery; returns `false` if it was ignored as stale
    pub fn accept_delivery(&mut self, delivery: Delivery) -> bool {
        if delivery.generation != self.generation || !self.subscription.is_live() {
            log::trace!(
                "Ignoring delivery from generation {} (current {}, {})",
                delivery.generation,
                self.generation,
                self.subscription.as_str()
            );
            return false;
        }

        match delivery.event {
            BridgeEvent::Payload(payload) => {
                let _ = self.ingest_payload(&payload);
            }
            BridgeEvent::Connection(status) => self.set_connection(status),
        }
        true
    }

    fn set_subscription(&mut self, state: SubscriptionState) {
        if self.subscription != state {
            self.subscription = state;
            self.notify(StoreChange::Subscription(state));
        }
    }

    fn set_connection(&mut self, status: ConnectionStatus) {
        if self.connection != status {
            self.connection = status;
            self.notify(StoreChange::Connection(status));
        }
    }

    fn record_error(&mut self, error: StoreError) {
        self.last_error = Some(error.clone());
        self.notify(StoreChange::Error(error));
    }

    fn notify(&mut self, change: StoreChange) {
        self.revision += 1;
        for (_, listener) in self.listeners.iter_mut() {
            listener(&change);
        }
    }
}

impl Default for TransferStore {
    fn default() -> Self {
        Self::new()
    }
}
