use std::sync::Arc;

use crate::domain::entity::transition_record::{sort_history, TransitionRecord};
use crate::domain::repository::WorkflowInstanceRepository;

#[derive(Debug, Clone)]
pub struct GetHistoryInput {
    pub instance_id: String,
}

#[derive(Debug, thiserror::Error)]
pub enum GetHistoryError {
    #[error("instance not found: {0}")]
    NotFound(String),

    #[error("internal error: {0}")]
    Internal(String),
}

/// GetHistoryUseCase はインスタンスの遷移履歴を (timestamp, sequence) 順で返す。
pub struct GetHistoryUseCase {
    repo: Arc<dyn WorkflowInstanceRepository>,
}

impl GetHistoryUseCase {
    pub fn new(repo: Arc<dyn WorkflowInstanceRepository>) -> Self {
        Self { repo }
    }

    pub async fn execute(
        &self,
        input: &GetHistoryInput,
    ) -> Result<Vec<TransitionRecord>, GetHistoryError> {
        self.repo
            .find_by_id(&input.instance_id)
            .await
            .map_err(|e| GetHistoryError::Internal(e.to_string()))?
            .ok_or_else(|| GetHistoryError::NotFound(input.instance_id.clone()))?;

        let mut records = self
            .repo
            .find_history(&input.instance_id)
            .await
            .map_err(|e| GetHistoryError::Internal(e.to_string()))?;
        sort_history(&mut records);
        Ok(records)
    }
}
