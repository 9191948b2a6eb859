use {
    ruta_dashboard::{
        config::Config,
        replay::DataSource,
        store::{StoreRuntime, TransferStore},
        ui,
    },
};

#[tokio::main]
pub async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();

    let config = Config::from_env();

    // Logs go to stderr; without RUST_LOG only errors reach the terminal
    let mut builder = if config.rust_log.is_some() {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
    } else {
        env_logger::Builder::from_default_env()
    };
    builder.target(env_logger::Target::Stderr).init();

    log::info!("🚀 Starting RUTA Dashboard...");
    log::info!("📊 Configuration:");
    log::info!("   INDEXER_URL: {}", config.indexer_url);
    log::info!("   Chart blocks: {}", config.chart_block_limit);
    log::info!("   Table rows: {}", config.table_row_limit);

    let source = DataSource::from_config(&config)?;
    let (handle, runtime_task) =
        StoreRuntime::spawn(TransferStore::new(), source.bridge(), config.event_channel_buffer);

    if let Err(e) = handle.bootstrap().await {
        // The dashboard still starts; the status strip shows the error
        log::warn!("⚠️  Bootstrap incomplete: {}", e);
    }
    let replay_task = source.start();

    let ui_result = ui::run_ui(handle.clone(), &config).await;

    handle.stop_live_updates().await;
    handle.shutdown().await;
    if let Some(replay) = replay_task {
        replay.abort();
    }
    if let Err(e) = runtime_task.await {
        log::error!("Store runtime panicked: {}", e);
    }

    if let Err(e) = &ui_result {
        log::error!("UI error: {}", e);
    }
    ui_result
}
