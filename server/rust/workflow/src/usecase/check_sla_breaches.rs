use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::domain::repository::{RepositoryError, WorkflowInstanceRepository};
use crate::domain::service::TransitionEngine;
use crate::infrastructure::kafka_producer::{NotificationDispatcher, WorkflowEvent};
use crate::usecase::conflict_retry::{retry_on_conflict, ConflictError, ConflictRetryPolicy};
use crate::usecase::notification::dispatch_all;

/// SlaFailure は1件のインスタンスの SLA 処理失敗を表す。
#[derive(Debug, Clone, PartialEq)]
pub struct SlaFailure {
    pub instance_id: String,
    pub error: String,
}

#[derive(Debug, Clone, Default)]
pub struct CheckSlaBreachesOutput {
    pub scanned: usize,
    /// 今回の実行で SLA 超過を記録したインスタンス ID。
    pub escalated: Vec<String>,
    pub failures: Vec<SlaFailure>,
}

#[derive(Debug, thiserror::Error)]
pub enum CheckSlaBreachesError {
    #[error("concurrent modification: {0}")]
    ConcurrentModification(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ConflictError for CheckSlaBreachesError {
    fn is_conflict(&self) -> bool {
        matches!(self, Self::ConcurrentModification(_))
    }
}

/// CheckSlaBreachesUseCase は期限を過ぎた開いているステップ実行に SLA 超過を記録し、
/// エスカレーションを通知する。実行間で状態を持たず、何度呼んでも同じ超過を二重に記録しない。
pub struct CheckSlaBreachesUseCase {
    instance_repo: Arc<dyn WorkflowInstanceRepository>,
    dispatcher: Arc<dyn NotificationDispatcher>,
    engine: TransitionEngine,
    actor_id: String,
    retry: ConflictRetryPolicy,
}

impl CheckSlaBreachesUseCase {
    pub fn new(
        instance_repo: Arc<dyn WorkflowInstanceRepository>,
        dispatcher: Arc<dyn NotificationDispatcher>,
        actor_id: impl Into<String>,
    ) -> Self {
        Self {
            instance_repo,
            dispatcher,
            engine: TransitionEngine::new(),
            actor_id: actor_id.into(),
            retry: ConflictRetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry: ConflictRetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub async fn execute(
        &self,
        now: DateTime<Utc>,
    ) -> Result<CheckSlaBreachesOutput, CheckSlaBreachesError> {
        let candidates = self
            .instance_repo
            .find_sla_candidates(now)
            .await
            .map_err(|e| CheckSlaBreachesError::Internal(e.to_string()))?;

        let mut output = CheckSlaBreachesOutput {
            scanned: candidates.len(),
            ..Default::default()
        };

        for candidate in candidates {
            let Some(execution_id) = candidate.open_execution().map(|e| e.id.clone()) else {
                continue;
            };
            let result = retry_on_conflict(&self.retry, || {
                self.mark_breach(&candidate.id, &execution_id, now)
            })
            .await;

            match result {
                Ok(Some(event)) => {
                    dispatch_all(self.dispatcher.as_ref(), &[event]).await;
                    output.escalated.push(candidate.id);
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(
                        instance_id = %candidate.id,
                        error = %e,
                        "failed to record sla breach"
                    );
                    output.failures.push(SlaFailure {
                        instance_id: candidate.id,
                        error: e.to_string(),
                    });
                }
            }
        }

        if !output.escalated.is_empty() {
            info!(
                scanned = output.scanned,
                escalated = output.escalated.len(),
                "sla breaches recorded"
            );
        }
        Ok(output)
    }

    /// 最新の状態を読み直してから超過を記録する。既に閉じた実行や記録済みの超過は何もしない。
    async fn mark_breach(
        &self,
        instance_id: &str,
        execution_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<WorkflowEvent>, CheckSlaBreachesError> {
        let Some(mut instance) = self
            .instance_repo
            .find_by_id(instance_id)
            .await
            .map_err(|e| CheckSlaBreachesError::Internal(e.to_string()))?
        else {
            return Ok(None);
        };

        let Some(record) = self
            .engine
            .mark_sla_breach(&mut instance, execution_id, &self.actor_id, now)
        else {
            return Ok(None);
        };
        let read_version = instance.bump_version(now);

        self.instance_repo
            .save(&instance, read_version, std::slice::from_ref(&record))
            .await
            .map_err(|e| match e {
                e @ RepositoryError::VersionConflict { .. } => {
                    CheckSlaBreachesError::ConcurrentModification(e.to_string())
                }
                other => CheckSlaBreachesError::Internal(other.to_string()),
            })?;

        let step_key = record.to_step_key.clone().unwrap_or_default();
        let recipients = instance
            .open_execution()
            .and_then(|e| e.assignee_id.clone())
            .into_iter()
            .collect();
        Ok(Some(WorkflowEvent::escalation(
            &instance, &step_key, recipients, now,
        )))
    }
}
