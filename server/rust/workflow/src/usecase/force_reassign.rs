use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use crate::domain::entity::step_execution::StepExecution;
use crate::domain::entity::transition_record::TransitionRecord;
use crate::domain::repository::{RepositoryError, WorkflowInstanceRepository};
use crate::domain::service::{AssignmentResolver, TransitionEngine, TransitionError};
use crate::infrastructure::kafka_producer::{NotificationDispatcher, WorkflowEvent};
use crate::usecase::conflict_retry::{retry_on_conflict, ConflictError, ConflictRetryPolicy};
use crate::usecase::notification::dispatch_all;

#[derive(Debug, Clone)]
pub struct ForceReassignInput {
    pub execution_id: String,
    pub new_assignee_id: String,
    pub actor_id: String,
}

#[derive(Debug, Clone)]
pub struct ForceReassignOutput {
    pub instance_id: String,
    pub execution: StepExecution,
    pub record: TransitionRecord,
}

#[derive(Debug, thiserror::Error)]
pub enum ForceReassignError {
    #[error("step execution not found: {0}")]
    ExecutionNotFound(String),

    #[error("step execution is not open: {0}")]
    ExecutionNotOpen(String),

    #[error("instance is not active: {0}")]
    InstanceNotActive(String),

    #[error("actor is not authorized to reassign: {0}")]
    NotAuthorized(String),

    #[error("concurrent modification: {0}")]
    ConcurrentModification(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ConflictError for ForceReassignError {
    fn is_conflict(&self) -> bool {
        matches!(self, Self::ConcurrentModification(_))
    }
}

/// ForceReassignUseCase はロール適格性を無視して担当者を差し替える。上書き権限が必要。
pub struct ForceReassignUseCase {
    instance_repo: Arc<dyn WorkflowInstanceRepository>,
    resolver: Arc<AssignmentResolver>,
    dispatcher: Arc<dyn NotificationDispatcher>,
    engine: TransitionEngine,
    retry: ConflictRetryPolicy,
}

impl ForceReassignUseCase {
    pub fn new(
        instance_repo: Arc<dyn WorkflowInstanceRepository>,
        resolver: Arc<AssignmentResolver>,
        dispatcher: Arc<dyn NotificationDispatcher>,
    ) -> Self {
        Self {
            instance_repo,
            resolver,
            dispatcher,
            engine: TransitionEngine::new(),
            retry: ConflictRetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry: ConflictRetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub async fn execute(
        &self,
        input: &ForceReassignInput,
    ) -> Result<ForceReassignOutput, ForceReassignError> {
        let allowed = self
            .resolver
            .has_override_capability(&input.actor_id)
            .await
            .map_err(|e| ForceReassignError::Internal(e.to_string()))?;
        if !allowed {
            return Err(ForceReassignError::NotAuthorized(input.actor_id.clone()));
        }

        let (output, event) = retry_on_conflict(&self.retry, || self.try_reassign(input)).await?;
        dispatch_all(self.dispatcher.as_ref(), &[event]).await;
        Ok(output)
    }

    async fn try_reassign(
        &self,
        input: &ForceReassignInput,
    ) -> Result<(ForceReassignOutput, WorkflowEvent), ForceReassignError> {
        let mut instance = self
            .instance_repo
            .find_by_execution_id(&input.execution_id)
            .await
            .map_err(|e| ForceReassignError::Internal(e.to_string()))?
            .ok_or_else(|| ForceReassignError::ExecutionNotFound(input.execution_id.clone()))?;

        let now = Utc::now();
        let record = self
            .engine
            .reassign(
                &mut instance,
                &input.execution_id,
                &input.new_assignee_id,
                &input.actor_id,
                now,
            )
            .map_err(|e| match e {
                TransitionError::ExecutionNotFound(id) => ForceReassignError::ExecutionNotFound(id),
                TransitionError::ExecutionNotOpen(id) => ForceReassignError::ExecutionNotOpen(id),
                TransitionError::InstanceNotActive { id, .. } => {
                    ForceReassignError::InstanceNotActive(id)
                }
                other => ForceReassignError::Internal(other.to_string()),
            })?;
        let read_version = instance.bump_version(now);

        self.instance_repo
            .save(&instance, read_version, std::slice::from_ref(&record))
            .await
            .map_err(|e| match e {
                e @ RepositoryError::VersionConflict { .. } => {
                    ForceReassignError::ConcurrentModification(e.to_string())
                }
                other => ForceReassignError::Internal(other.to_string()),
            })?;

        info!(
            instance_id = %instance.id,
            execution_id = %input.execution_id,
            new_assignee_id = %input.new_assignee_id,
            actor_id = %input.actor_id,
            "step execution reassigned"
        );

        let execution = instance
            .find_execution(&input.execution_id)
            .cloned()
            .ok_or_else(|| ForceReassignError::ExecutionNotFound(input.execution_id.clone()))?;
        let event = WorkflowEvent::transition(&instance, now);
        Ok((
            ForceReassignOutput {
                instance_id: instance.id,
                execution,
                record,
            },
            event,
        ))
    }
}
