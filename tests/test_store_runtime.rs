//! Integration tests for the store runtime against a scripted bridge
//!
//! The scripted bridge lets each test decide what a snapshot fetch or a
//! subscribe call returns, and can hold a subscribe call open until the test
//! releases it. That is enough to exercise:
//! - Snapshot authority and failed fetches
//! - Stop while a subscribe attempt is still in flight
//! - Stale deliveries from a previous subscription
//! - Idempotent start and duplicate deliveries

#[cfg(test)]
mod store_runtime_tests {
    use async_trait::async_trait;
    use ruta_dashboard::{
        bridge::{Bridge, EventSink, SubscriptionHandle},
        error::{FetchError, StoreError, SubscriptionError},
        model::Transfer,
        store::{StoreHandle, StoreRuntime, StoreView, SubscriptionState, TransferStore},
    };
    use std::{
        collections::VecDeque,
        sync::{
            atomic::{AtomicBool, AtomicUsize, Ordering},
            Arc, Mutex,
        },
        time::Duration,
    };
    use tokio::sync::Notify;

    fn transfer(id: i64, block_number: i64, amount: &str) -> Transfer {
        Transfer {
            id,
            block_number,
            transaction_hash: format!("0x{:064x}", id),
            log_index: 0,
            from_address: "0x1111111111111111111111111111111111111111".to_string(),
            to_address: "0x2222222222222222222222222222222222222222".to_string(),
            amount: amount.to_string(),
            contract_address: "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48".to_string(),
            created_at: Some("2025-10-02 10:15:00".to_string()),
        }
    }

    fn payload(transfer: &Transfer) -> String {
        serde_json::to_string(transfer).unwrap()
    }

    #[derive(Default)]
    struct ScriptedBridge {
        snapshots: Mutex<VecDeque<Result<Vec<Transfer>, FetchError>>>,
        subscribe_results: Mutex<VecDeque<Result<(), SubscriptionError>>>,
        sinks: Mutex<Vec<EventSink>>,
        gated: AtomicBool,
        gate: Notify,
        subscribe_calls: AtomicUsize,
        released: Arc<AtomicUsize>,
    }

    impl ScriptedBridge {
        fn push_snapshot(&self, result: Result<Vec<Transfer>, FetchError>) {
            self.snapshots.lock().unwrap().push_back(result);
        }

        fn push_subscribe(&self, result: Result<(), SubscriptionError>) {
            self.subscribe_results.lock().unwrap().push_back(result);
        }

        fn hold_subscribe(&self) {
            self.gated.store(true, Ordering::SeqCst);
        }

        fn release_subscribe(&self) {
            self.gated.store(false, Ordering::SeqCst);
            self.gate.notify_one();
        }

        fn sink(&self, index: usize) -> EventSink {
            self.sinks.lock().unwrap()[index].clone()
        }

        fn subscribe_calls(&self) -> usize {
            self.subscribe_calls.load(Ordering::SeqCst)
        }

        fn released(&self) -> usize {
            self.released.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Bridge for ScriptedBridge {
        async fn fetch_snapshot(&self) -> Result<Vec<Transfer>, FetchError> {
            self.snapshots
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(Vec::new()))
        }

        async fn subscribe(&self, sink: EventSink) -> Result<SubscriptionHandle, SubscriptionError> {
            let call = self.subscribe_calls.fetch_add(1, Ordering::SeqCst) as u64;

            if self.gated.load(Ordering::SeqCst) {
                self.gate.notified().await;
            }

            let result = self
                .subscribe_results
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Ok(()));
            result?;

            self.sinks.lock().unwrap().push(sink);
            let released = self.released.clone();
            Ok(SubscriptionHandle::new(call, move || {
                released.fetch_add(1, Ordering::SeqCst);
            }))
        }
    }

    fn spawn(bridge: &Arc<ScriptedBridge>) -> StoreHandle {
        let (handle, _task) = StoreRuntime::spawn(TransferStore::new(), bridge.clone(), 64);
        handle
    }

    async fn wait_for<F>(handle: &StoreHandle, mut condition: F) -> Arc<StoreView>
    where
        F: FnMut(&StoreView) -> bool,
    {
        let mut watch = handle.watch();
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let view = watch.borrow_and_update().clone();
                if condition(&view) {
                    return view;
                }
                watch.changed().await.unwrap();
            }
        })
        .await
        .expect("condition not reached in time")
    }

    async fn wait_for_subscribe_calls(bridge: &ScriptedBridge, calls: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while bridge.subscribe_calls() < calls {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("subscribe was not called in time");
    }

    fn ids(view: &StoreView) -> Vec<i64> {
        view.transfers.iter().map(|t| t.id).collect()
    }

    #[tokio::test]
    async fn test_snapshot_replaces_and_failure_keeps_previous() {
        let bridge = Arc::new(ScriptedBridge::default());
        bridge.push_snapshot(Ok(vec![transfer(1, 10, "5"), transfer(2, 11, "3")]));
        bridge.push_snapshot(Err(FetchError::Status(503)));
        bridge.push_snapshot(Ok(vec![transfer(3, 12, "1")]));
        let handle = spawn(&bridge);

        handle.load_initial_snapshot().await.unwrap();
        assert_eq!(ids(&handle.view()), vec![1, 2]);

        assert_eq!(
            handle.load_initial_snapshot().await,
            Err(FetchError::Status(503))
        );
        let view = handle.view();
        assert_eq!(ids(&view), vec![1, 2]);
        assert_eq!(view.last_error, Some(StoreError::Fetch(FetchError::Status(503))));

        // A later successful snapshot is authoritative and clears the error
        handle.load_initial_snapshot().await.unwrap();
        let view = handle.view();
        assert_eq!(ids(&view), vec![3]);
        assert!(view.last_error.is_none());

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_stop_while_subscribe_in_flight() {
        let bridge = Arc::new(ScriptedBridge::default());
        bridge.hold_subscribe();
        let handle = spawn(&bridge);

        let starter = handle.clone();
        let start = tokio::spawn(async move { starter.start_live_updates().await });
        wait_for_subscribe_calls(&bridge, 1).await;
        assert_eq!(handle.view().subscription, SubscriptionState::Subscribing);

        handle.stop_live_updates().await;
        assert_eq!(handle.view().subscription, SubscriptionState::Idle);

        bridge.release_subscribe();
        assert_eq!(start.await.unwrap(), Err(SubscriptionError::Cancelled));

        // The late handle was released and nothing was installed
        assert_eq!(bridge.released(), 1);
        let view = handle.view();
        assert_eq!(view.subscription, SubscriptionState::Idle);

        // Events pushed through the late sink are ignored; a fresh
        // subscription's events queue behind them and do arrive
        handle.start_live_updates().await.unwrap();
        bridge.sink(0).deliver(payload(&transfer(9, 90, "1"))).await.unwrap();
        bridge.sink(1).deliver(payload(&transfer(2, 20, "1"))).await.unwrap();

        let view = wait_for(&handle, |v| !v.transfers.is_empty()).await;
        assert_eq!(ids(&view), vec![2]);

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_restart_ignores_previous_subscription() {
        let bridge = Arc::new(ScriptedBridge::default());
        let handle = spawn(&bridge);

        handle.start_live_updates().await.unwrap();
        handle.stop_live_updates().await;
        assert_eq!(bridge.released(), 1);

        handle.start_live_updates().await.unwrap();
        assert_eq!(handle.view().subscription, SubscriptionState::Active);

        let old_sink = bridge.sink(0);
        let new_sink = bridge.sink(1);
        assert_ne!(old_sink.generation(), new_sink.generation());

        old_sink.deliver(payload(&transfer(1, 10, "1"))).await.unwrap();
        new_sink.deliver(payload(&transfer(2, 11, "1"))).await.unwrap();

        let view = wait_for(&handle, |v| !v.transfers.is_empty()).await;
        assert_eq!(ids(&view), vec![2]);

        handle.shutdown().await;
        assert_eq!(bridge.released(), 2);
    }

    #[tokio::test]
    async fn test_subscribe_failure_then_retry() {
        let bridge = Arc::new(ScriptedBridge::default());
        bridge.push_subscribe(Err(SubscriptionError::Connect("connection refused".into())));
        let handle = spawn(&bridge);

        let result = handle.start_live_updates().await;
        assert!(matches!(result, Err(SubscriptionError::Connect(_))));
        let view = handle.view();
        assert_eq!(view.subscription, SubscriptionState::Failed);
        assert!(matches!(view.last_error, Some(StoreError::Subscription(_))));

        handle.start_live_updates().await.unwrap();
        let view = handle.view();
        assert_eq!(view.subscription, SubscriptionState::Active);
        assert!(view.last_error.is_none());

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_concurrent_start_subscribes_once() {
        let bridge = Arc::new(ScriptedBridge::default());
        bridge.hold_subscribe();
        let handle = spawn(&bridge);

        let starter = handle.clone();
        let first = tokio::spawn(async move { starter.start_live_updates().await });
        wait_for_subscribe_calls(&bridge, 1).await;

        // Second call sees the attempt in flight and returns at once
        handle.start_live_updates().await.unwrap();

        bridge.release_subscribe();
        first.await.unwrap().unwrap();

        assert_eq!(bridge.subscribe_calls(), 1);
        assert_eq!(handle.view().subscription, SubscriptionState::Active);

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_redelivery_and_bad_payloads() {
        let bridge = Arc::new(ScriptedBridge::default());
        bridge.push_snapshot(Ok(vec![transfer(1, 10, "5")]));
        let handle = spawn(&bridge);
        handle.bootstrap().await.unwrap();

        let sink = bridge.sink(0);
        let version = handle.view().version;

        sink.deliver(payload(&transfer(1, 10, "5"))).await.unwrap();
        sink.deliver(payload(&transfer(2, 11, "2"))).await.unwrap();
        sink.deliver(payload(&transfer(2, 11, "2"))).await.unwrap();
        sink.deliver("stop").await.unwrap();
        sink.deliver("{\"id\": \"oops\"}").await.unwrap();

        let view = wait_for(&handle, |v| v.malformed_events == 1).await;
        assert_eq!(ids(&view), vec![1, 2]);
        assert_eq!(view.version, version + 1);
        assert_eq!(view.last_block, Some(11));
        assert_eq!(view.subscription, SubscriptionState::Active);

        handle.shutdown().await;
    }
}
