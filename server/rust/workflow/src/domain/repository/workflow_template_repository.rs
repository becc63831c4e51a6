use async_trait::async_trait;

use crate::domain::entity::workflow_template::WorkflowTemplate;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait WorkflowTemplateRepository: Send + Sync {
    async fn find(&self, id: &str, version: u32) -> anyhow::Result<Option<WorkflowTemplate>>;
    async fn find_latest(&self, id: &str) -> anyhow::Result<Option<WorkflowTemplate>>;
    async fn list_versions(&self, id: &str) -> anyhow::Result<Vec<u32>>;
    /// 同じ (id, version) が既に存在する場合はエラーを返す。既存テンプレートは上書きしない。
    async fn create(&self, template: &WorkflowTemplate) -> anyhow::Result<()>;
}
