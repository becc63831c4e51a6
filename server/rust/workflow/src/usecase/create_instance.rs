use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use crate::domain::entity::workflow_instance::WorkflowInstance;
use crate::domain::repository::{
    RepositoryError, WorkflowInstanceRepository, WorkflowTemplateRepository,
};
use crate::domain::service::{
    Assignment, AssignmentResolver, ClaimContext, TransitionEngine, TransitionError,
};
use crate::infrastructure::kafka_producer::{NotificationDispatcher, WorkflowEvent};
use crate::usecase::notification::{assignment_events, dispatch_all};

#[derive(Debug, Clone)]
pub struct CreateInstanceInput {
    pub claim_id: String,
    /// クレームの所属単位。担当者解決のスコープとしてインスタンスに保存される。
    pub scope_id: String,
    pub template_id: String,
    /// None の場合は最新バージョンを使う。
    pub template_version: Option<u32>,
    pub actor_id: String,
}

#[derive(Debug, Clone)]
pub struct CreateInstanceOutput {
    pub instance: WorkflowInstance,
    pub assignment: Assignment,
}

#[derive(Debug, thiserror::Error)]
pub enum CreateInstanceError {
    #[error("template not found: {0}")]
    TemplateNotFound(String),

    #[error("claim already has an active instance: {0}")]
    ClaimAlreadyActive(String),

    #[error("invalid template: {0}")]
    InvalidTemplate(String),

    #[error("internal error: {0}")]
    Internal(String),
}

/// CreateInstanceUseCase はクレームにテンプレートを割り当て、最初のステップを開く。
pub struct CreateInstanceUseCase {
    template_repo: Arc<dyn WorkflowTemplateRepository>,
    instance_repo: Arc<dyn WorkflowInstanceRepository>,
    resolver: Arc<AssignmentResolver>,
    dispatcher: Arc<dyn NotificationDispatcher>,
    engine: TransitionEngine,
}

impl CreateInstanceUseCase {
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
        }
    }

    pub async fn execute(
        &self,
        input: &CreateInstanceInput,
    ) -> Result<CreateInstanceOutput, CreateInstanceError> {
        let template = match input.template_version {
            Some(version) => self.template_repo.find(&input.template_id, version).await,
            None => self.template_repo.find_latest(&input.template_id).await,
        }
        .map_err(|e| CreateInstanceError::Internal(e.to_string()))?
        .ok_or_else(|| CreateInstanceError::TemplateNotFound(input.template_id.clone()))?;

        if self
            .instance_repo
            .find_active_by_claim(&input.claim_id)
            .await
            .map_err(|e| CreateInstanceError::Internal(e.to_string()))?
            .is_some()
        {
            return Err(CreateInstanceError::ClaimAlreadyActive(input.claim_id.clone()));
        }

        let first_step = template
            .first_step()
            .ok_or_else(|| CreateInstanceError::InvalidTemplate(template.id.clone()))?;
        let ctx = ClaimContext::new(input.claim_id.clone(), input.scope_id.clone());
        let assignment = self
            .resolver
            .resolve(first_step, &ctx)
            .await
            .map_err(|e| CreateInstanceError::Internal(e.to_string()))?;

        let now = Utc::now();
        let (instance, records) = self
            .engine
            .start(
                &input.claim_id,
                &input.scope_id,
                &template,
                assignment.assignee_id(),
                &input.actor_id,
                now,
            )
            .map_err(|e| match e {
                TransitionError::EmptyTemplate(id) => CreateInstanceError::InvalidTemplate(id),
                other => CreateInstanceError::Internal(other.to_string()),
            })?;

        self.instance_repo
            .create(&instance, &records)
            .await
            .map_err(|e| match e {
                RepositoryError::ClaimAlreadyActive(claim_id) => {
                    CreateInstanceError::ClaimAlreadyActive(claim_id)
                }
                other => CreateInstanceError::Internal(other.to_string()),
            })?;

        info!(
            instance_id = %instance.id,
            claim_id = %instance.claim_id,
            template_id = %instance.template_id,
            template_version = instance.template_version,
            step_key = %first_step.key,
            "workflow instance created"
        );

        let mut events = vec![WorkflowEvent::transition(&instance, now)];
        events.extend(assignment_events(&instance, &first_step.key, &assignment, now));
        dispatch_all(self.dispatcher.as_ref(), &events).await;

        Ok(CreateInstanceOutput {
            instance,
            assignment,
        })
    }
}
