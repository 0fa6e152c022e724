use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use asset_registry::audit::UsageAuditor;
use asset_registry::config::Config;
use asset_registry::db::Store;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Optional .env in the working directory
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "asset_registry=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let cfg = Config::load();
    tracing::info!("Starting asset registry");
    tracing::info!("Database: {}", cfg.db_path);

    // Initialize database
    let store = Store::with_pool_size(&cfg.db_path, cfg.db_max_connections).await?;
    tracing::info!("Database initialized (pool_size={})", cfg.db_max_connections);

    // Start usage auditor
    let mut auditor = if cfg.audit_interval_secs > 0 {
        let mut auditor = UsageAuditor::new(store.clone(), cfg.audit_interval_secs, cfg.audit_repair);
        auditor.start();
        tracing::info!(
            "Usage auditor running every {}s (repair={})",
            cfg.audit_interval_secs,
            cfg.audit_repair
        );
        Some(auditor)
    } else {
        tracing::info!("Usage auditor disabled");
        None
    };

    shutdown_signal().await;

    if let Some(auditor) = auditor.as_mut() {
        auditor.stop();
    }
    tracing::info!("Asset registry shutting down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => { sig.recv().await; }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
