//! Standalone host binary wiring the game services to a storage backend and
//! the logging transport.

use std::{env, sync::Arc};

use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mafia_host_core::config::GameConfig;
use mafia_host_core::dao::game_store::GameStore;
use mafia_host_core::dao::game_store::memory::MemoryGameStore;
use mafia_host_core::services::GameHost;
use mafia_host_core::services::scheduler::StageSweeper;
use mafia_host_core::transport::{LogStatsSink, LogTransport};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = GameConfig::load();
    let store = build_store().await?;
    let host = GameHost::new(
        store,
        Arc::new(LogTransport::new()),
        Arc::new(LogStatsSink),
        config,
    );

    let sweeper = StageSweeper::start(host.clone());
    info!("mafia host ready");

    shutdown_signal().await;
    info!("shutting down");
    sweeper.stop().await;
    Ok(())
}

/// Pick the storage backend from the environment: MongoDB when `MONGO_URI`
/// is set, the in-process store otherwise.
async fn build_store() -> anyhow::Result<Arc<dyn GameStore>> {
    #[cfg(feature = "mongo-store")]
    if let Ok(uri) = env::var("MONGO_URI") {
        use anyhow::Context;
        use mafia_host_core::dao::game_store::mongodb::{MongoConfig, MongoGameStore};

        let db_name = env::var("MONGO_DB").ok();
        let config = MongoConfig::from_uri(&uri, db_name.as_deref())
            .await
            .context("parsing MongoDB URI")?;
        let store = MongoGameStore::connect(config)
            .await
            .context("connecting to MongoDB")?;
        info!("using the MongoDB store");
        return Ok(Arc::new(store));
    }

    if env::var_os("MONGO_URI").is_some() && !cfg!(feature = "mongo-store") {
        anyhow::bail!("MONGO_URI is set but the mongo-store feature is disabled");
    }
    info!("using the in-process store; games will not survive a restart");
    Ok(Arc::new(MemoryGameStore::new()))
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM before tearing the host down.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut term = signal(SignalKind::terminate()).expect("install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = term.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
