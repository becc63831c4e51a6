use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::domain::entity::step_definition::StepDefinition;
use crate::domain::entity::workflow_template::WorkflowTemplate;
use crate::domain::repository::WorkflowTemplateRepository;

pub struct TemplatePostgresRepository {
    pool: Arc<PgPool>,
}

impl TemplatePostgresRepository {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct TemplateRow {
    id: String,
    version: i32,
    name: String,
    description: String,
    steps: serde_json::Value,
    created_at: DateTime<Utc>,
}

impl TryFrom<TemplateRow> for WorkflowTemplate {
    type Error = anyhow::Error;

    fn try_from(r: TemplateRow) -> anyhow::Result<Self> {
        let steps: Vec<StepDefinition> = serde_json::from_value(r.steps)
            .map_err(|e| anyhow::anyhow!("failed to deserialize steps: {}", e))?;
        Ok(WorkflowTemplate {
            id: r.id,
            name: r.name,
            description: r.description,
            version: u32::try_from(r.version)?,
            steps,
            created_at: r.created_at,
        })
    }
}

#[async_trait]
impl WorkflowTemplateRepository for TemplatePostgresRepository {
    async fn find(&self, id: &str, version: u32) -> anyhow::Result<Option<WorkflowTemplate>> {
        let row: Option<TemplateRow> = sqlx::query_as(
            "SELECT id, version, name, description, steps, created_at \
             FROM workflow.workflow_templates WHERE id = $1 AND version = $2",
        )
        .bind(id)
        .bind(i32::try_from(version)?)
        .fetch_optional(self.pool.as_ref())
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn find_latest(&self, id: &str) -> anyhow::Result<Option<WorkflowTemplate>> {
        let row: Option<TemplateRow> = sqlx::query_as(
            "SELECT id, version, name, description, steps, created_at \
             FROM workflow.workflow_templates WHERE id = $1 \
             ORDER BY version DESC LIMIT 1",
        )
        .bind(id)
        .fetch_optional(self.pool.as_ref())
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn list_versions(&self, id: &str) -> anyhow::Result<Vec<u32>> {
        let versions: Vec<i32> = sqlx::query_scalar(
            "SELECT version FROM workflow.workflow_templates WHERE id = $1 ORDER BY version",
        )
        .bind(id)
        .fetch_all(self.pool.as_ref())
        .await?;

        versions
            .into_iter()
            .map(|v| u32::try_from(v).map_err(Into::into))
            .collect()
    }

    async fn create(&self, template: &WorkflowTemplate) -> anyhow::Result<()> {
        let steps = serde_json::to_value(&template.steps)?;
        sqlx::query(
            "INSERT INTO workflow.workflow_templates \
             (id, version, name, description, steps, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(&template.id)
        .bind(i32::try_from(template.version)?)
        .bind(&template.name)
        .bind(&template.description)
        .bind(steps)
        .bind(template.created_at)
        .execute(self.pool.as_ref())
        .await?;

        Ok(())
    }
}
