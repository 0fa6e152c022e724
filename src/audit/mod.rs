use tokio::time::{interval, Duration};

use crate::db::Store;
use crate::models::UsageReport;

/// Usage auditor periodically compares IP address in_use flags with interface claims
pub struct UsageAuditor {
    store: Store,
    interval_secs: u64,
    repair: bool,
    stop_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl UsageAuditor {
    pub fn new(store: Store, interval_secs: u64, repair: bool) -> Self {
        Self {
            store,
            interval_secs,
            repair,
            stop_tx: None,
        }
    }

    /// Start the auditor. The first pass runs immediately.
    pub fn start(&mut self) {
        let (stop_tx, mut stop_rx) = tokio::sync::oneshot::channel();
        self.stop_tx = Some(stop_tx);

        let store = self.store.clone();
        let interval_secs = self.interval_secs.max(1);
        let repair = self.repair;

        tokio::spawn(async move {
            let mut ticker = interval(Duration::from_secs(interval_secs));

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(e) = audit_once(&store, repair).await {
                            tracing::warn!("Error auditing IP address usage: {}", e);
                        }
                    }
                    _ = &mut stop_rx => {
                        tracing::info!("Usage auditor stopped");
                        break;
                    }
                }
            }
        });
    }

    /// Stop the auditor
    pub fn stop(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
    }
}

async fn audit_once(store: &Store, repair: bool) -> anyhow::Result<UsageReport> {
    let report = store.audit_ip_usage(repair).await?;
    if report.is_clean() {
        tracing::debug!("Usage audit checked {} address(es), no drift", report.checked);
    } else if report.repaired {
        tracing::info!(
            "Usage audit repaired {} of {} address(es)",
            report.drifted.len(),
            report.checked
        );
    } else {
        tracing::warn!(
            "Usage audit found {} drifted address(es) of {}; repair disabled",
            report.drifted.len(),
            report.checked
        );
    }
    Ok(report)
}
