//! Headless transfer tail
//!
//! Bootstraps the store like the dashboard does, then logs every store change
//! and a periodic aggregate summary until Ctrl+C.

use {
    ruta_dashboard::{
        aggregation::Aggregates,
        config::Config,
        projection::{project, FilterCriteria},
        replay::DataSource,
        store::{StoreChange, StoreRuntime, TransferStore},
        ui::renderer::format_amount,
    },
    std::time::Duration,
};

const SUMMARY_INTERVAL: Duration = Duration::from_secs(10);

#[tokio::main]
pub async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();

    let config = Config::from_env();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    log::info!("🚀 Starting transfer tail...");

    let mut store = TransferStore::new();
    store.add_listener(|change| match change {
        StoreChange::SnapshotReplaced { len } => log::info!("📦 Snapshot: {} transfers", len),
        StoreChange::Inserted { id, index } => log::info!("➕ Transfer {} at #{}", id, index),
        StoreChange::Replaced { id, index } => log::info!("♻️  Transfer {} updated at #{}", id, index),
        StoreChange::Subscription(state) => log::info!("🔌 Live updates: {}", state.as_str()),
        StoreChange::Connection(status) => log::info!("📡 Connection: {}", status.as_str()),
        StoreChange::Error(e) => log::error!("❌ {}", e),
        StoreChange::MalformedEvent(e) => log::warn!("⚠️  Malformed event: {}", e),
    });

    let source = DataSource::from_config(&config)?;
    let (handle, runtime_task) =
        StoreRuntime::spawn(store, source.bridge(), config.event_channel_buffer);

    if let Err(e) = handle.bootstrap().await {
        log::warn!("⚠️  Bootstrap incomplete: {}", e);
    }
    let replay_task = source.start();

    let criteria = FilterCriteria::default();
    let mut summary = tokio::time::interval(SUMMARY_INTERVAL);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                log::info!("Received Ctrl+C, shutting down");
                break;
            }
            _ = summary.tick() => {
                let view = handle.view();
                let projected = project(&view.transfers, &criteria);
                let aggregates = Aggregates::derive(&projected, &criteria, config.chart_block_limit);

                log::info!(
                    "📊 {} transfers | last block {} | {} malformed events",
                    view.transfers.len(),
                    view.last_block.map(|b| b.to_string()).unwrap_or_else(|| "-".to_string()),
                    view.malformed_events
                );
                for total in &aggregates.block_totals {
                    log::info!("   block {}: {}", total.block_number, format_amount(&total.total));
                }
            }
        }
    }

    handle.shutdown().await;
    if let Some(replay) = replay_task {
        replay.abort();
    }
    runtime_task.await?;
    Ok(())
}
