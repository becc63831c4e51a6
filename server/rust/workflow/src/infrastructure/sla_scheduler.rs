use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;

use crate::usecase::CheckSlaBreachesUseCase;

/// SlaScheduler は一定間隔で SLA 超過チェックを起動するバックグラウンドループ。
/// チェック自体は状態を持たないため、取りこぼした周期は次の周期で拾われる。
pub struct SlaScheduler {
    check_uc: Arc<CheckSlaBreachesUseCase>,
    interval: Duration,
    cancel_token: CancellationToken,
}

impl SlaScheduler {
    pub fn new(check_uc: Arc<CheckSlaBreachesUseCase>, interval: Duration) -> Self {
        Self {
            check_uc,
            interval,
            cancel_token: CancellationToken::new(),
        }
    }

    pub fn start(&self) -> tokio::task::JoinHandle<()> {
        let check_uc = self.check_uc.clone();
        let interval = self.interval;
        let token = self.cancel_token.clone();

        tokio::spawn(async move {
            tracing::info!(interval_secs = interval.as_secs(), "sla monitor started");
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = tokio::time::sleep(interval) => {
                        Self::tick(&check_uc).await;
                    }
                }
            }
            tracing::info!("sla monitor stopped");
        })
    }

    async fn tick(check_uc: &CheckSlaBreachesUseCase) {
        match check_uc.execute(Utc::now()).await {
            Ok(out) => {
                tracing::debug!(
                    scanned = out.scanned,
                    escalated = out.escalated.len(),
                    failed = out.failures.len(),
                    "sla tick finished"
                );
            }
            Err(e) => tracing::error!("sla tick error: {}", e),
        }
    }

    pub fn stop(&self) {
        self.cancel_token.cancel();
    }
}
