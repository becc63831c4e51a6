use std::future::Future;
use std::time::Duration;

use crate::infrastructure::config::ConcurrencyConfig;

/// ConflictError は楽観的排他の競合を表すエラーを判別する。
pub trait ConflictError {
    fn is_conflict(&self) -> bool;
}

/// ConflictRetryPolicy はバージョン競合時の再試行回数と待機時間を表す。
#[derive(Debug, Clone)]
pub struct ConflictRetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
}

impl Default for ConflictRetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(500),
            multiplier: 2.0,
        }
    }
}

impl ConflictRetryPolicy {
    pub fn from_config(cfg: &ConcurrencyConfig) -> Self {
        Self {
            max_attempts: cfg.max_attempts.max(1),
            initial_delay: Duration::from_millis(cfg.initial_delay_ms),
            multiplier: cfg.multiplier,
            ..Default::default()
        }
    }

    /// 1回だけ実行し、競合しても再試行しない。
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }

    pub fn compute_delay(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let base = self.initial_delay.as_secs_f64() * self.multiplier.powi(exponent);
        Duration::from_secs_f64(base.min(self.max_delay.as_secs_f64()).max(0.0))
    }
}

/// 競合エラーの間だけ operation を再実行する。競合以外のエラーと成功は即座に返す。
/// 試行回数を使い切った場合は最後の競合エラーを返す。
pub async fn retry_on_conflict<F, Fut, T, E>(
    policy: &ConflictRetryPolicy,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: ConflictError + std::fmt::Display,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;
    loop {
        match operation().await {
            Err(e) if e.is_conflict() && attempt + 1 < max_attempts => {
                tracing::debug!(
                    attempt = attempt + 1,
                    max_attempts,
                    error = %e,
                    "version conflict, retrying"
                );
                tokio::time::sleep(policy.compute_delay(attempt)).await;
                attempt += 1;
            }
            Err(e) if e.is_conflict() => {
                if max_attempts > 1 {
                    tracing::warn!(max_attempts, error = %e, "version conflict retries exhausted");
                }
                return Err(e);
            }
            other => return other,
        }
    }
}
