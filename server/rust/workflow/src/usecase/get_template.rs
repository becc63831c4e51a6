use std::sync::Arc;

use crate::domain::entity::workflow_template::WorkflowTemplate;
use crate::domain::repository::WorkflowTemplateRepository;

#[derive(Debug, Clone)]
pub struct GetTemplateInput {
    pub id: String,
    /// None の場合は最新バージョン。
    pub version: Option<u32>,
}

#[derive(Debug, thiserror::Error)]
pub enum GetTemplateError {
    #[error("template not found: {0}")]
    NotFound(String),

    #[error("internal error: {0}")]
    Internal(String),
}

pub struct GetTemplateUseCase {
    template_repo: Arc<dyn WorkflowTemplateRepository>,
}

impl GetTemplateUseCase {
    pub fn new(template_repo: Arc<dyn WorkflowTemplateRepository>) -> Self {
        Self { template_repo }
    }

    pub async fn execute(
        &self,
        input: &GetTemplateInput,
    ) -> Result<WorkflowTemplate, GetTemplateError> {
        let found = match input.version {
            Some(version) => self.template_repo.find(&input.id, version).await,
            None => self.template_repo.find_latest(&input.id).await,
        }
        .map_err(|e| GetTemplateError::Internal(e.to_string()))?;

        found.ok_or_else(|| {
            GetTemplateError::NotFound(match input.version {
                Some(version) => format!("{}@v{}", input.id, version),
                None => input.id.clone(),
            })
        })
    }
}
