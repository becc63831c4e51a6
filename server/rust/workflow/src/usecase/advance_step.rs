use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use crate::domain::entity::transition_record::TransitionRecord;
use crate::domain::entity::workflow_instance::WorkflowInstance;
use crate::domain::repository::{
    RepositoryError, WorkflowInstanceRepository, WorkflowTemplateRepository,
};
use crate::domain::service::{
    Assignment, AssignmentResolver, ClaimContext, TransitionEngine, TransitionError,
};
use crate::infrastructure::kafka_producer::{NotificationDispatcher, WorkflowEvent};
use crate::usecase::conflict_retry::{retry_on_conflict, ConflictError, ConflictRetryPolicy};
use crate::usecase::notification::{assignment_events, dispatch_all};

#[derive(Debug, Clone)]
pub struct AdvanceStepInput {
    pub instance_id: String,
    pub actor_id: String,
    /// None は終端ステップの完了を意味する。
    pub target_step_key: Option<String>,
    /// 呼び出し側が読み込んだ version。指定時は不一致で即座に失敗し、再試行しない。
    pub expected_version: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct AdvanceStepOutput {
    pub instance: WorkflowInstance,
    pub records: Vec<TransitionRecord>,
    /// 次のステップを開いた場合の担当者解決結果。完了時は None。
    pub assignment: Option<Assignment>,
}

#[derive(Debug, thiserror::Error)]
pub enum AdvanceStepError {
    #[error("instance not found: {0}")]
    InstanceNotFound(String),

    #[error("template not found: {0}")]
    TemplateNotFound(String),

    #[error("instance is not active: {0}")]
    InstanceNotActive(String),

    #[error("instance has no open step: {0}")]
    NoOpenStep(String),

    #[error("illegal transition from '{from}' to '{to}'")]
    IllegalTransition { from: String, to: String },

    #[error("required sub-tasks are incomplete: {}", .0.join(", "))]
    SubTasksIncomplete(Vec<String>),

    #[error("actor is not authorized to advance this step: {0}")]
    NotAuthorized(String),

    #[error("concurrent modification: {0}")]
    ConcurrentModification(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ConflictError for AdvanceStepError {
    fn is_conflict(&self) -> bool {
        matches!(self, Self::ConcurrentModification(_))
    }
}

impl From<TransitionError> for AdvanceStepError {
    fn from(err: TransitionError) -> Self {
        match err {
            TransitionError::InstanceNotActive { id, .. } => Self::InstanceNotActive(id),
            TransitionError::NoOpenStep(id) => Self::NoOpenStep(id),
            TransitionError::IllegalTransition { from, to } => Self::IllegalTransition { from, to },
            TransitionError::SubTasksIncomplete(keys) => Self::SubTasksIncomplete(keys),
            other => Self::Internal(other.to_string()),
        }
    }
}

/// AdvanceStepUseCase は現在のステップを閉じ、指定された次のステップへ進める。
/// 検証はすべて書き込み前に行い、失敗時はインスタンスを一切変更しない。
pub struct AdvanceStepUseCase {
    template_repo: Arc<dyn WorkflowTemplateRepository>,
    instance_repo: Arc<dyn WorkflowInstanceRepository>,
    resolver: Arc<AssignmentResolver>,
    dispatcher: Arc<dyn NotificationDispatcher>,
    engine: TransitionEngine,
    retry: ConflictRetryPolicy,
}

impl AdvanceStepUseCase {
    pub fn new(
        template_repo: Arc<dyn WorkflowTemplateRepository>,
        instance_repo: Arc<dyn WorkflowInstanceRepository>,
        resolver: Arc<AssignmentResolver>,
        dispatcher: Arc<dyn NotificationDispatcher>,
    ) -> Self {
        Self {
            template_repo,
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
        input: &AdvanceStepInput,
    ) -> Result<AdvanceStepOutput, AdvanceStepError> {
        let output = if input.expected_version.is_some() {
            self.try_advance(input).await?
        } else {
            retry_on_conflict(&self.retry, || self.try_advance(input)).await?
        };

        let now = Utc::now();
        let mut events = vec![WorkflowEvent::transition(&output.instance, now)];
        if let (Some(assignment), Some(step_key)) =
            (&output.assignment, &output.instance.current_step_key)
        {
            events.extend(assignment_events(&output.instance, step_key, assignment, now));
        }
        dispatch_all(self.dispatcher.as_ref(), &events).await;

        Ok(output)
    }

    async fn try_advance(
        &self,
        input: &AdvanceStepInput,
    ) -> Result<AdvanceStepOutput, AdvanceStepError> {
        let mut instance = self
            .instance_repo
            .find_by_id(&input.instance_id)
            .await
            .map_err(|e| AdvanceStepError::Internal(e.to_string()))?
            .ok_or_else(|| AdvanceStepError::InstanceNotFound(input.instance_id.clone()))?;

        if let Some(expected) = input.expected_version {
            if instance.version != expected {
                return Err(AdvanceStepError::ConcurrentModification(format!(
                    "instance {} expected version {}, found {}",
                    instance.id, expected, instance.version
                )));
            }
        }

        let template = self
            .template_repo
            .find(&instance.template_id, instance.template_version)
            .await
            .map_err(|e| AdvanceStepError::Internal(e.to_string()))?
            .ok_or_else(|| {
                AdvanceStepError::TemplateNotFound(format!(
                    "{}@v{}",
                    instance.template_id, instance.template_version
                ))
            })?;

        let plan = self
            .engine
            .check_advance(&instance, &template, input.target_step_key.as_deref())?;

        let assignee_id = instance
            .open_execution()
            .and_then(|e| e.assignee_id.clone());
        let authorized = self
            .resolver
            .is_authorized(&input.actor_id, assignee_id.as_deref())
            .await
            .map_err(|e| AdvanceStepError::Internal(e.to_string()))?;
        if !authorized {
            return Err(AdvanceStepError::NotAuthorized(input.actor_id.clone()));
        }

        let assignment = match plan.target {
            Some(next) => Some(
                self.resolver
                    .resolve(next, &ClaimContext::of(&instance))
                    .await
                    .map_err(|e| AdvanceStepError::Internal(e.to_string()))?,
            ),
            None => None,
        };

        let now = Utc::now();
        let records = self.engine.apply_advance(
            &mut instance,
            &plan,
            assignment.as_ref().and_then(Assignment::assignee_id),
            &input.actor_id,
            now,
        );
        let read_version = instance.bump_version(now);

        self.instance_repo
            .save(&instance, read_version, &records)
            .await
            .map_err(|e| match e {
                e @ RepositoryError::VersionConflict { .. } => {
                    AdvanceStepError::ConcurrentModification(e.to_string())
                }
                RepositoryError::NotFound(id) => AdvanceStepError::InstanceNotFound(id),
                other => AdvanceStepError::Internal(other.to_string()),
            })?;

        info!(
            instance_id = %instance.id,
            claim_id = %instance.claim_id,
            from = %plan.current.key,
            to = plan.target.map_or("<end>", |s| s.key.as_str()),
            actor_id = %input.actor_id,
            status = %instance.status,
            "workflow step advanced"
        );

        Ok(AdvanceStepOutput {
            instance,
            records,
            assignment,
        })
    }
}
