use std::sync::Arc;

use crate::domain::entity::workflow_instance::WorkflowInstance;
use crate::domain::repository::WorkflowInstanceRepository;

#[derive(Debug, Clone)]
pub struct GetInstanceInput {
    pub id: String,
}

#[derive(Debug, thiserror::Error)]
pub enum GetInstanceError {
    #[error("instance not found: {0}")]
    NotFound(String),

    #[error("internal error: {0}")]
    Internal(String),
}

pub struct GetInstanceUseCase {
    repo: Arc<dyn WorkflowInstanceRepository>,
}

impl GetInstanceUseCase {
    pub fn new(repo: Arc<dyn WorkflowInstanceRepository>) -> Self {
        Self { repo }
    }

    pub async fn execute(
        &self,
        input: &GetInstanceInput,
    ) -> Result<WorkflowInstance, GetInstanceError> {
        self.repo
            .find_by_id(&input.id)
            .await
            .map_err(|e| GetInstanceError::Internal(e.to_string()))?
            .ok_or_else(|| GetInstanceError::NotFound(input.id.clone()))
    }
}
