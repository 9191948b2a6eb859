//! Offline transfer source
//!
//! Reads a JSON array of transfers and plays it through a [`ChannelBridge`]:
//! the first half becomes the snapshot, the rest is published one transfer
//! per tick, followed by the stop sentinel.

use {
    crate::{
        bridge::{Bridge, ChannelBridge, HttpBridge},
        config::Config,
        model::Transfer,
    },
    std::{fs, path::Path, sync::Arc, time::Duration},
    tokio::{task::JoinHandle, time::interval},
};

/// Where the dashboard gets its transfers from
pub enum DataSource {
    Indexer(Arc<HttpBridge>),
    Replay {
        bridge: Arc<ChannelBridge>,
        live: Vec<Transfer>,
        period: Duration,
    },
}

impl DataSource {
    /// Replay when `REPLAY_FILE` is set, the indexer otherwise
    pub fn from_config(config: &Config) -> Result<Self, Box<dyn std::error::Error>> {
        match &config.replay_file {
            Some(file_path) => {
                let plan = ReplayPlan::from_transfers(load_transfers(file_path)?);
                log::info!(
                    "🎞️  Replay mode: {} snapshot + {} live transfers",
                    plan.snapshot.len(),
                    plan.live.len()
                );
                Ok(DataSource::Replay {
                    bridge: Arc::new(ChannelBridge::new(plan.snapshot)),
                    live: plan.live,
                    period: config.replay_interval,
                })
            }
            None => {
                log::info!("🔌 Indexer: {}", config.indexer_url);
                Ok(DataSource::Indexer(Arc::new(HttpBridge::new(config)?)))
            }
        }
    }

    pub fn bridge(&self) -> Arc<dyn Bridge> {
        match self {
            DataSource::Indexer(bridge) => bridge.clone(),
            DataSource::Replay { bridge, .. } => bridge.clone(),
        }
    }

    /// Start producing live events (replay only; the indexer pushes by itself)
    pub fn start(self) -> Option<JoinHandle<()>> {
        match self {
            DataSource::Indexer(_) => None,
            DataSource::Replay {
                bridge,
                live,
                period,
            } => Some(tokio::spawn(run_replay(bridge, live, period))),
        }
    }
}

/// Transfers split into what the snapshot returns and what arrives live
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayPlan {
    pub snapshot: Vec<Transfer>,
    pub live: Vec<Transfer>,
}

impl ReplayPlan {
    pub fn from_transfers(mut transfers: Vec<Transfer>) -> Self {
        let live = transfers.split_off(transfers.len() / 2);
        Self {
            snapshot: transfers,
            live,
        }
    }
}

/// Load a replay file (JSON array of transfers)
pub fn load_transfers(file_path: impl AsRef<Path>) -> Result<Vec<Transfer>, Box<dyn std::error::Error>> {
    let file_path = file_path.as_ref();
    let json = fs::read_to_string(file_path)?;
    let transfers: Vec<Transfer> = serde_json::from_str(&json)?;

    for transfer in &transfers {
        transfer.validate()?;
    }

    log::info!("Loaded {} transfers from {}", transfers.len(), file_path.display());
    Ok(transfers)
}

/// Publish `live` through `bridge`, one transfer per `period`, then stop
pub async fn run_replay(bridge: Arc<ChannelBridge>, live: Vec<Transfer>, period: Duration) {
    let mut ticker = interval(period);
    let total = live.len();

    for (published, transfer) in live.iter().enumerate() {
        ticker.tick().await;
        let receivers = bridge.publish(transfer).await;
        log::debug!(
            "Replayed transfer {} ({}/{}) to {} subscriber(s)",
            transfer.id,
            published + 1,
            total,
            receivers
        );
    }

    ticker.tick().await;
    bridge.publish_stop().await;
    log::info!("🏁 Replay finished after {} transfers", total);
}
