use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::entity::workflow_template::WorkflowTemplate;
use crate::domain::repository::WorkflowTemplateRepository;

/// InMemoryWorkflowTemplateRepository はインメモリのテンプレートリポジトリ。
pub struct InMemoryWorkflowTemplateRepository {
    templates: RwLock<HashMap<String, BTreeMap<u32, WorkflowTemplate>>>,
}

impl InMemoryWorkflowTemplateRepository {
    pub fn new() -> Self {
        Self {
            templates: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryWorkflowTemplateRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WorkflowTemplateRepository for InMemoryWorkflowTemplateRepository {
    async fn find(&self, id: &str, version: u32) -> anyhow::Result<Option<WorkflowTemplate>> {
        let templates = self.templates.read().await;
        Ok(templates.get(id).and_then(|v| v.get(&version)).cloned())
    }

    async fn find_latest(&self, id: &str) -> anyhow::Result<Option<WorkflowTemplate>> {
        let templates = self.templates.read().await;
        Ok(templates
            .get(id)
            .and_then(|v| v.values().next_back())
            .cloned())
    }

    async fn list_versions(&self, id: &str) -> anyhow::Result<Vec<u32>> {
        let templates = self.templates.read().await;
        Ok(templates
            .get(id)
            .map(|v| v.keys().copied().collect())
            .unwrap_or_default())
    }

    async fn create(&self, template: &WorkflowTemplate) -> anyhow::Result<()> {
        let mut templates = self.templates.write().await;
        let versions = templates.entry(template.id.clone()).or_default();
        if versions.contains_key(&template.version) {
            anyhow::bail!(
                "template already exists: {}@v{}",
                template.id,
                template.version
            );
        }
        versions.insert(template.version, template.clone());
        Ok(())
    }
}
