use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use crate::domain::entity::sub_task::SubTask;
use crate::domain::repository::{RepositoryError, WorkflowInstanceRepository};
use crate::usecase::conflict_retry::{retry_on_conflict, ConflictError, ConflictRetryPolicy};

#[derive(Debug, Clone)]
pub struct AddSubTaskInput {
    pub execution_id: String,
    pub key: String,
    pub label: Option<String>,
    pub actor_id: String,
}

#[derive(Debug, thiserror::Error)]
pub enum AddSubTaskError {
    #[error("step execution not found: {0}")]
    ExecutionNotFound(String),

    #[error("step execution is not open: {0}")]
    ExecutionNotOpen(String),

    #[error("sub-task already exists: {0}")]
    AlreadyExists(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("concurrent modification: {0}")]
    ConcurrentModification(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ConflictError for AddSubTaskError {
    fn is_conflict(&self) -> bool {
        matches!(self, Self::ConcurrentModification(_))
    }
}

/// AddSubTaskUseCase は開いているステップ実行に任意のサブタスクを追加する。
/// 追加したサブタスクは完了条件に含まれない。
pub struct AddSubTaskUseCase {
    instance_repo: Arc<dyn WorkflowInstanceRepository>,
    retry: ConflictRetryPolicy,
}

impl AddSubTaskUseCase {
    pub fn new(instance_repo: Arc<dyn WorkflowInstanceRepository>) -> Self {
        Self {
            instance_repo,
            retry: ConflictRetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry: ConflictRetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub async fn execute(&self, input: &AddSubTaskInput) -> Result<SubTask, AddSubTaskError> {
        if input.key.trim().is_empty() {
            return Err(AddSubTaskError::Validation("sub-task key is required".to_string()));
        }
        retry_on_conflict(&self.retry, || self.try_add(input)).await
    }

    async fn try_add(&self, input: &AddSubTaskInput) -> Result<SubTask, AddSubTaskError> {
        let mut instance = self
            .instance_repo
            .find_by_execution_id(&input.execution_id)
            .await
            .map_err(|e| AddSubTaskError::Internal(e.to_string()))?
            .ok_or_else(|| AddSubTaskError::ExecutionNotFound(input.execution_id.clone()))?;

        let execution = instance
            .find_execution_mut(&input.execution_id)
            .ok_or_else(|| AddSubTaskError::ExecutionNotFound(input.execution_id.clone()))?;
        if !execution.is_open() {
            return Err(AddSubTaskError::ExecutionNotOpen(input.execution_id.clone()));
        }
        if execution.find_sub_task(&input.key).is_some() {
            return Err(AddSubTaskError::AlreadyExists(input.key.clone()));
        }

        let sub_task = SubTask::informational(
            input.key.clone(),
            input.label.clone().unwrap_or_else(|| input.key.clone()),
        );
        execution.sub_tasks.push(sub_task.clone());

        let read_version = instance.bump_version(Utc::now());
        self.instance_repo
            .save(&instance, read_version, &[])
            .await
            .map_err(|e| match e {
                e @ RepositoryError::VersionConflict { .. } => {
                    AddSubTaskError::ConcurrentModification(e.to_string())
                }
                other => AddSubTaskError::Internal(other.to_string()),
            })?;

        info!(
            instance_id = %instance.id,
            execution_id = %input.execution_id,
            key = %input.key,
            actor_id = %input.actor_id,
            "sub-task added"
        );
        Ok(sub_task)
    }
}
