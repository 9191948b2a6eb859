use {
    super::{Resolution, StoreView, TransferStore},
    crate::{
        bridge::{Bridge, Delivery, EventSink, SubscriptionHandle},
        error::{FetchError, StoreError, SubscriptionError},
        model::Transfer,
    },
    std::sync::Arc,
    tokio::{
        sync::{mpsc, oneshot, watch},
        task::JoinHandle,
    },
};

const COMMAND_BUFFER: usize = 32;

enum Command {
    LoadSnapshot(oneshot::Sender<Result<(), FetchError>>),
    StartLive(oneshot::Sender<Result<(), SubscriptionError>>),
    StopLive(oneshot::Sender<()>),
    Shutdown(oneshot::Sender<()>),
}

/// Bridge call results routed back into the store task
enum Completion {
    Snapshot {
        fetch: u64,
        result: Result<Vec<Transfer>, FetchError>,
        reply: oneshot::Sender<Result<(), FetchError>>,
    },
    Subscribed {
        generation: u64,
        result: Result<SubscriptionHandle, SubscriptionError>,
        reply: oneshot::Sender<Result<(), SubscriptionError>>,
    },
}

/// Owns a [`TransferStore`] and applies every mutation from one task
///
/// Bridge calls run in their own tasks and report back through a channel, so
/// a slow fetch or subscribe never blocks deliveries or a stop request.
pub struct StoreRuntime {
    store: TransferStore,
    bridge: Arc<dyn Bridge>,
    deliveries: mpsc::Sender<Delivery>,
    completions: mpsc::UnboundedSender<Completion>,
    view: watch::Sender<Arc<StoreView>>,
    published_revision: u64,
}

impl StoreRuntime {
    /// Spawn the store task; must be called inside a tokio runtime
    ///
    /// `delivery_buffer` bounds how many bridge events may queue before
    /// subscriptions are made to wait.
    pub fn spawn(
        store: TransferStore,
        bridge: Arc<dyn Bridge>,
        delivery_buffer: usize,
    ) -> (StoreHandle, JoinHandle<()>) {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
        let (delivery_tx, delivery_rx) = mpsc::channel(delivery_buffer.max(1));
        let (completion_tx, completion_rx) = mpsc::unbounded_channel();
        let (view_tx, view_rx) = watch::channel(Arc::new(store.view()));

        let runtime = StoreRuntime {
            published_revision: store.revision(),
            store,
            bridge,
            deliveries: delivery_tx,
            completions: completion_tx,
            view: view_tx,
        };

        let task = tokio::spawn(runtime.run(command_rx, completion_rx, delivery_rx));
        let handle = StoreHandle {
            commands: command_tx,
            view: view_rx,
        };
        (handle, task)
    }

    async fn run(
        mut self,
        mut commands: mpsc::Receiver<Command>,
        mut completions: mpsc::UnboundedReceiver<Completion>,
        mut deliveries: mpsc::Receiver<Delivery>,
    ) {
        log::info!("Store runtime started");

        loop {
            tokio::select! {
                biased;

                command = commands.recv() => {
                    let Some(command) = command else {
                        log::info!("All store handles dropped");
                        self.teardown();
                        break;
                    };
                    if !self.handle_command(command) {
                        break;
                    }
                }
                Some(completion) = completions.recv() => self.handle_completion(completion),
                Some(delivery) = deliveries.recv() => {
                    self.store.accept_delivery(delivery);
                }
            }

            self.publish();
        }

        self.publish();
        log::info!("Store runtime stopped");
    }

    /// Returns `false` once the runtime should stop
    fn handle_command(&mut self, command: Command) -> bool {
        match command {
            Command::LoadSnapshot(reply) => {
                let fetch = self.store.begin_fetch();
                log::info!("🔄 Loading transfer snapshot (fetch {})", fetch);

                let bridge = self.bridge.clone();
                let completions = self.completions.clone();
                tokio::spawn(async move {
                    let result = bridge.fetch_snapshot().await;
                    let _ = completions.send(Completion::Snapshot {
                        fetch,
                        result,
                        reply,
                    });
                });
            }
            Command::StartLive(reply) => {
                let Some(generation) = self.store.begin_subscribe() else {
                    let _ = reply.send(Ok(()));
                    return true;
                };
                log::info!("🔌 Starting live updates (generation {})", generation);

                let sink = EventSink::new(generation, self.deliveries.clone());
                let bridge = self.bridge.clone();
                let completions = self.completions.clone();
                tokio::spawn(async move {
                    let result = bridge.subscribe(sink).await;
                    // A send error means the runtime is gone; dropping the
                    // completion drops the handle, which releases it
                    let _ = completions.send(Completion::Subscribed {
                        generation,
                        result,
                        reply,
                    });
                });
            }
            Command::StopLive(reply) => {
                self.teardown();
                self.publish();
                let _ = reply.send(());
            }
            Command::Shutdown(reply) => {
                log::info!("Store runtime received shutdown signal");
                self.teardown();
                self.publish();
                let _ = reply.send(());
                return false;
            }
        }
        true
    }

    fn handle_completion(&mut self, completion: Completion) {
        match completion {
            Completion::Snapshot {
                fetch,
                result,
                reply,
            } => {
                let outcome = self.store.complete_fetch(fetch, result);
                self.publish();
                let _ = reply.send(outcome);
            }
            Completion::Subscribed {
                generation,
                result,
                reply,
            } => {
                let outcome = match self.store.complete_subscribe(generation, result) {
                    Resolution::Installed => Ok(()),
                    Resolution::Failed(e) => Err(e),
                    Resolution::Stale(handle) => {
                        if let Some(handle) = handle {
                            self.bridge.unsubscribe(handle);
                        }
                        Err(SubscriptionError::Cancelled)
                    }
                };
                self.publish();
                let _ = reply.send(outcome);
            }
        }
    }

    fn teardown(&mut self) {
        if let Some(handle) = self.store.stop_live_updates() {
            self.bridge.unsubscribe(handle);
        }
    }

    // Callers publish before replying so a resolved request sees its effect
    fn publish(&mut self) {
        let revision = self.store.revision();
        if revision != self.published_revision {
            self.published_revision = revision;
            self.view.send_replace(Arc::new(self.store.view()));
        }
    }
}

/// Cloneable front end to a running [`StoreRuntime`]
///
/// Once the runtime has stopped, requests fail with the `Unavailable`
/// variants and `stop_live_updates` is a no-op.
#[derive(Clone)]
pub struct StoreHandle {
    commands: mpsc::Sender<Command>,
    view: watch::Receiver<Arc<StoreView>>,
}

impl StoreHandle {
    /// Fetch the full snapshot and replace the collection with it
    pub async fn load_initial_snapshot(&self) -> Result<(), FetchError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(Command::LoadSnapshot(reply))
            .await
            .map_err(|_| FetchError::Unavailable)?;
        response.await.unwrap_or(Err(FetchError::Unavailable))
    }

    /// Begin receiving live transfers
    ///
    /// Returns once the attempt resolves. Calling it while an attempt is
    /// running or established returns immediately.
    pub async fn start_live_updates(&self) -> Result<(), SubscriptionError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(Command::StartLive(reply))
            .await
            .map_err(|_| SubscriptionError::Unavailable)?;
        response.await.unwrap_or(Err(SubscriptionError::Cancelled))
    }

    pub async fn stop_live_updates(&self) {
        let (reply, response) = oneshot::channel();
        if self.commands.send(Command::StopLive(reply)).await.is_ok() {
            let _ = response.await;
        }
    }

    /// Load the snapshot, then start live updates
    ///
    /// Live updates are started even when the snapshot fails; the first
    /// error is returned.
    pub async fn bootstrap(&self) -> Result<(), StoreError> {
        let snapshot = self.load_initial_snapshot().await;
        let live = self.start_live_updates().await;
        snapshot?;
        live?;
        Ok(())
    }

    /// Latest published store state
    pub fn view(&self) -> Arc<StoreView> {
        self.view.borrow().clone()
    }

    /// Receiver that wakes on every published change
    pub fn watch(&self) -> watch::Receiver<Arc<StoreView>> {
        self.view.clone()
    }

    /// Stop live updates and end the runtime task
    pub async fn shutdown(&self) {
        let (reply, response) = oneshot::channel();
        if self.commands.send(Command::Shutdown(reply)).await.is_ok() {
            let _ = response.await;
        }
    }
}
