//! Indexer HTTP bridge
//!
//! - Snapshot: `GET {INDEXER_URL}/transfers` returning a JSON array of transfers
//! - Stream: `GET {INDEXER_URL}/transfers/stream`, server-sent events carrying
//!   one transfer per `data:` line
//!
//! The first stream connection is opened inside `subscribe`, so an unreachable
//! indexer surfaces as a `SubscriptionError`. After that a background task owns
//! the stream and reconnects with exponential backoff. Opening a stream is
//! bounded by `request_timeout`; a stream silent for longer than
//! `stream_idle_timeout` is treated as dead and reopened.

use {
    super::{
        backoff::ExponentialBackoff, sse::SseDecoder, Bridge, ConnectionStatus, EventSink,
        SubscriptionHandle,
    },
    crate::{
        config::Config,
        error::{FetchError, SubscriptionError},
        model::Transfer,
    },
    async_trait::async_trait,
    futures_util::StreamExt,
    std::{
        sync::atomic::{AtomicU64, Ordering},
        time::Duration,
    },
};

#[derive(Debug, Clone)]
struct StreamSettings {
    url: String,
    open_timeout: Duration,
    idle_timeout: Duration,
    retry_delay: Duration,
    max_retry_delay: Duration,
    max_retries: u32,
    buffer_limit: usize,
}

pub struct HttpBridge {
    client: reqwest::Client,
    snapshot_url: String,
    request_timeout: Duration,
    stream: StreamSettings,
    next_id: AtomicU64,
}

impl HttpBridge {
    pub fn new(config: &Config) -> Result<Self, FetchError> {
        // No total timeout on the client: it would cut the long-lived stream
        let client = reqwest::Client::builder()
            .connect_timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            client,
            snapshot_url: config.snapshot_url(),
            request_timeout: config.request_timeout,
            stream: StreamSettings {
                url: config.stream_url(),
                open_timeout: config.request_timeout,
                idle_timeout: config.stream_idle_timeout,
                retry_delay: config.stream_retry_delay,
                max_retry_delay: config.stream_max_retry_delay,
                max_retries: config.stream_max_retries,
                buffer_limit: config.stream_buffer_limit,
            },
            next_id: AtomicU64::new(1),
        })
    }
}

#[async_trait]
impl Bridge for HttpBridge {
    async fn fetch_snapshot(&self) -> Result<Vec<Transfer>, FetchError> {
        log::info!("📥 Fetching transfer snapshot from {}", self.snapshot_url);

        let response = self
            .client
            .get(&self.snapshot_url)
            .timeout(self.request_timeout)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(FetchError::Status(response.status().as_u16()));
        }

        let text = response.text().await?;
        let rows: Vec<Transfer> =
            serde_json::from_str(&text).map_err(|e| FetchError::Decode(e.to_string()))?;

        let received = rows.len();
        let transfers: Vec<Transfer> = rows
            .into_iter()
            .filter(|transfer| match transfer.validate() {
                Ok(()) => true,
                Err(e) => {
                    log::warn!("⚠️  Dropping snapshot row: {}", e);
                    false
                }
            })
            .collect();

        if transfers.len() < received {
            log::warn!(
                "⚠️  Snapshot dropped {} of {} rows",
                received - transfers.len(),
                received
            );
        }
        log::info!("✅ Snapshot contains {} transfers", transfers.len());
        Ok(transfers)
    }

    async fn subscribe(&self, sink: EventSink) -> Result<SubscriptionHandle, SubscriptionError> {
        log::info!("🔌 Connecting to transfer stream: {}", self.stream.url);

        let response = open_stream(&self.client, &self.stream).await?;
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);

        let client = self.client.clone();
        let settings = self.stream.clone();
        let task = tokio::spawn(async move {
            stream_task(client, settings, response, sink).await;
        });

        log::info!("✅ Stream subscription {} established", id);
        Ok(SubscriptionHandle::new(id, move || task.abort()))
    }
}

async fn open_stream(
    client: &reqwest::Client,
    settings: &StreamSettings,
) -> Result<reqwest::Response, SubscriptionError> {
    let request = client
        .get(&settings.url)
        .header(reqwest::header::ACCEPT, "text/event-stream")
        .send();

    let response = tokio::time::timeout(settings.open_timeout, request)
        .await
        .map_err(|_| {
            SubscriptionError::Connect(format!(
                "no response from {} within {:?}",
                settings.url, settings.open_timeout
            ))
        })??;

    if !response.status().is_success() {
        return Err(SubscriptionError::Status(response.status().as_u16()));
    }
    Ok(response)
}

/// Pump one subscription until the sink closes or reconnects are exhausted
async fn stream_task(
    client: reqwest::Client,
    settings: StreamSettings,
    first: reqwest::Response,
    sink: EventSink,
) {
    let mut backoff = ExponentialBackoff::new(
        settings.retry_delay,
        settings.max_retry_delay,
        settings.max_retries,
    );
    let mut next_response = Some(first);

    loop {
        let response = match next_response.take() {
            Some(response) => response,
            None => match open_stream(&client, &settings).await {
                Ok(response) => {
                    log::info!("✅ Reconnected to transfer stream");
                    response
                }
                Err(e) => {
                    log::error!("❌ Stream reconnect failed: {}", e);
                    if !wait_before_retry(&mut backoff, &sink).await {
                        return;
                    }
                    continue;
                }
            },
        };

        if sink.connection(ConnectionStatus::Connected).await.is_err() {
            return;
        }

        let mut decoder = SseDecoder::new(settings.buffer_limit);
        let stream = response.bytes_stream();
        tokio::pin!(stream);
        let mut received_any = false;

        loop {
            let item = match tokio::time::timeout(settings.idle_timeout, stream.next()).await {
                Ok(Some(item)) => item,
                Ok(None) => break,
                Err(_) => {
                    log::warn!(
                        "⚠️  No stream data for {:?}, dropping connection",
                        settings.idle_timeout
                    );
                    break;
                }
            };

            match item {
                Ok(chunk) => {
                    for payload in decoder.push(&chunk) {
                        received_any = true;
                        log::debug!("Stream payload: {}", payload);
                        if sink.deliver(payload).await.is_err() {
                            log::debug!("Sink closed, stopping stream task");
                            return;
                        }
                    }
                }
                Err(e) => {
                    log::warn!("⚠️  Stream error: {}", e);
                    break;
                }
            }
        }

        if sink.is_closed() {
            return;
        }

        if received_any {
            backoff.reset();
        }
        log::warn!("⚠️  Transfer stream ended, reconnecting");
        if !wait_before_retry(&mut backoff, &sink).await {
            return;
        }
    }
}

/// Report reconnecting and sleep; `false` once retries are exhausted or the sink closed
async fn wait_before_retry(backoff: &mut ExponentialBackoff, sink: &EventSink) -> bool {
    if sink.connection(ConnectionStatus::Reconnecting).await.is_err() {
        return false;
    }

    if let Err(e) = backoff.sleep().await {
        log::error!("❌ Giving up on transfer stream: {}", e);
        let _ = sink.connection(ConnectionStatus::Disconnected).await;
        return false;
    }
    true
}
