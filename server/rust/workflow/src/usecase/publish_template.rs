use std::sync::Arc;

use tracing::info;

use crate::domain::entity::step_definition::StepDefinition;
use crate::domain::entity::workflow_template::WorkflowTemplate;
use crate::domain::repository::WorkflowTemplateRepository;

#[derive(Debug, Clone)]
pub struct PublishTemplateInput {
    pub id: String,
    pub name: String,
    pub description: String,
    pub steps: Vec<StepDefinition>,
}

impl From<WorkflowTemplate> for PublishTemplateInput {
    fn from(template: WorkflowTemplate) -> Self {
        Self {
            id: template.id,
            name: template.name,
            description: template.description,
            steps: template.steps,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PublishTemplateError {
    #[error("invalid template: {0}")]
    InvalidTemplate(String),

    #[error("internal error: {0}")]
    Internal(String),
}

/// PublishTemplateUseCase はテンプレートを検証し、最新版の次のバージョンとして保存する。
/// 既存のバージョンは変更しないため、稼働中のインスタンスの参照は固定されたまま。
pub struct PublishTemplateUseCase {
    template_repo: Arc<dyn WorkflowTemplateRepository>,
}

impl PublishTemplateUseCase {
    pub fn new(template_repo: Arc<dyn WorkflowTemplateRepository>) -> Self {
        Self { template_repo }
    }

    pub async fn execute(
        &self,
        input: &PublishTemplateInput,
    ) -> Result<WorkflowTemplate, PublishTemplateError> {
        let mut template = WorkflowTemplate::new(
            input.id.clone(),
            input.name.clone(),
            input.description.clone(),
            input.steps.clone(),
        );
        template
            .validate()
            .map_err(|e| PublishTemplateError::InvalidTemplate(e.to_string()))?;

        let latest = self
            .template_repo
            .list_versions(&template.id)
            .await
            .map_err(|e| PublishTemplateError::Internal(e.to_string()))?
            .into_iter()
            .max()
            .unwrap_or(0);
        template.version = latest + 1;

        self.template_repo
            .create(&template)
            .await
            .map_err(|e| PublishTemplateError::Internal(e.to_string()))?;

        info!(
            template_id = %template.id,
            version = template.version,
            steps = template.steps.len(),
            "workflow template published"
        );
        Ok(template)
    }
}
