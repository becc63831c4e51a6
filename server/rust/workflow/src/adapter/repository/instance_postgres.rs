use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};

use crate::domain::entity::step_execution::StepExecution;
use crate::domain::entity::transition_record::{TransitionKind, TransitionRecord};
use crate::domain::entity::workflow_instance::{InstanceStatus, WorkflowInstance};
use crate::domain::repository::{RepositoryError, WorkflowInstanceRepository};

/// 1クレームにつき ACTIVE なインスタンスを1件に制限する部分ユニークインデックス。
const ACTIVE_CLAIM_INDEX: &str = "uq_workflow_instances_active_claim";

const INSTANCE_COLUMNS: &str = "id, claim_id, scope_id, template_id, template_version, \
     current_step_key, status, executions, version, last_sequence, \
     created_at, updated_at, completed_at";

/// InstancePostgresRepository はインスタンス集約を1行の JSONB として保存し、
/// 履歴を別テーブルに追記する。両者は同じトランザクションで書き込む。
pub struct InstancePostgresRepository {
    pool: Arc<PgPool>,
}

impl InstancePostgresRepository {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct InstanceRow {
    id: String,
    claim_id: String,
    scope_id: String,
    template_id: String,
    template_version: i32,
    current_step_key: Option<String>,
    status: String,
    executions: serde_json::Value,
    version: i64,
    last_sequence: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
}

impl TryFrom<InstanceRow> for WorkflowInstance {
    type Error = anyhow::Error;

    fn try_from(r: InstanceRow) -> anyhow::Result<Self> {
        let executions: Vec<StepExecution> = serde_json::from_value(r.executions)
            .map_err(|e| anyhow::anyhow!("failed to deserialize executions: {}", e))?;
        Ok(WorkflowInstance {
            id: r.id,
            claim_id: r.claim_id,
            scope_id: r.scope_id,
            template_id: r.template_id,
            template_version: u32::try_from(r.template_version)?,
            current_step_key: r.current_step_key,
            status: InstanceStatus::from_str_value(&r.status)?,
            executions,
            version: u64::try_from(r.version)?,
            last_sequence: u64::try_from(r.last_sequence)?,
            created_at: r.created_at,
            updated_at: r.updated_at,
            completed_at: r.completed_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct TransitionRow {
    id: String,
    instance_id: String,
    sequence: i64,
    kind: String,
    from_step_key: Option<String>,
    to_step_key: Option<String>,
    actor_id: String,
    reason: String,
    detail: Option<String>,
    occurred_at: DateTime<Utc>,
}

impl TryFrom<TransitionRow> for TransitionRecord {
    type Error = anyhow::Error;

    fn try_from(r: TransitionRow) -> anyhow::Result<Self> {
        Ok(TransitionRecord {
            id: r.id,
            instance_id: r.instance_id,
            sequence: u64::try_from(r.sequence)?,
            kind: TransitionKind::from_str_value(&r.kind)?,
            from_step_key: r.from_step_key,
            to_step_key: r.to_step_key,
            actor_id: r.actor_id,
            reason: r.reason,
            detail: r.detail,
            timestamp: r.occurred_at,
        })
    }
}

/// SLA 監視クエリ用に、開いている実行の期限と通知済みフラグを取り出す。
fn open_sla_columns(instance: &WorkflowInstance) -> (Option<DateTime<Utc>>, bool) {
    instance
        .open_execution()
        .map_or((None, false), |e| (e.sla_deadline, e.sla_breached))
}

fn storage_error(e: impl std::fmt::Display) -> RepositoryError {
    RepositoryError::Storage(e.to_string())
}

fn to_i64(value: u64) -> Result<i64, RepositoryError> {
    i64::try_from(value).map_err(storage_error)
}

async fn insert_records(
    tx: &mut Transaction<'_, Postgres>,
    records: &[TransitionRecord],
) -> Result<(), RepositoryError> {
    for record in records {
        sqlx::query(
            "INSERT INTO workflow.transition_records \
             (id, instance_id, sequence, kind, from_step_key, to_step_key, \
              actor_id, reason, detail, occurred_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(&record.id)
        .bind(&record.instance_id)
        .bind(to_i64(record.sequence)?)
        .bind(record.kind.to_string())
        .bind(&record.from_step_key)
        .bind(&record.to_step_key)
        .bind(&record.actor_id)
        .bind(&record.reason)
        .bind(&record.detail)
        .bind(record.timestamp)
        .execute(&mut **tx)
        .await
        .map_err(storage_error)?;
    }
    Ok(())
}

#[async_trait]
impl WorkflowInstanceRepository for InstancePostgresRepository {
    async fn find_by_id(&self, id: &str) -> anyhow::Result<Option<WorkflowInstance>> {
        let sql = format!("SELECT {INSTANCE_COLUMNS} FROM workflow.workflow_instances WHERE id = $1");
        let row: Option<InstanceRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(self.pool.as_ref())
            .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn find_by_execution_id(
        &self,
        execution_id: &str,
    ) -> anyhow::Result<Option<WorkflowInstance>> {
        let sql = format!(
            "SELECT {INSTANCE_COLUMNS} FROM workflow.workflow_instances \
             WHERE executions @> jsonb_build_array(jsonb_build_object('id', $1::text))"
        );
        let row: Option<InstanceRow> = sqlx::query_as(&sql)
            .bind(execution_id)
            .fetch_optional(self.pool.as_ref())
            .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn find_active_by_claim(
        &self,
        claim_id: &str,
    ) -> anyhow::Result<Option<WorkflowInstance>> {
        let sql = format!(
            "SELECT {INSTANCE_COLUMNS} FROM workflow.workflow_instances \
             WHERE claim_id = $1 AND status = 'ACTIVE'"
        );
        let row: Option<InstanceRow> = sqlx::query_as(&sql)
            .bind(claim_id)
            .fetch_optional(self.pool.as_ref())
            .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn find_sla_candidates(
        &self,
        now: DateTime<Utc>,
    ) -> anyhow::Result<Vec<WorkflowInstance>> {
        let sql = format!(
            "SELECT {INSTANCE_COLUMNS} FROM workflow.workflow_instances \
             WHERE status = 'ACTIVE' AND sla_breached = FALSE AND sla_deadline < $1 \
             ORDER BY created_at"
        );
        let rows: Vec<InstanceRow> = sqlx::query_as(&sql)
            .bind(now)
            .fetch_all(self.pool.as_ref())
            .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn find_history(&self, instance_id: &str) -> anyhow::Result<Vec<TransitionRecord>> {
        let rows: Vec<TransitionRow> = sqlx::query_as(
            "SELECT id, instance_id, sequence, kind, from_step_key, to_step_key, \
                    actor_id, reason, detail, occurred_at \
             FROM workflow.transition_records WHERE instance_id = $1 \
             ORDER BY occurred_at, sequence",
        )
        .bind(instance_id)
        .fetch_all(self.pool.as_ref())
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn create(
        &self,
        instance: &WorkflowInstance,
        records: &[TransitionRecord],
    ) -> Result<(), RepositoryError> {
        let executions = serde_json::to_value(&instance.executions).map_err(storage_error)?;
        let (sla_deadline, sla_breached) = open_sla_columns(instance);
        let mut tx = self.pool.begin().await.map_err(storage_error)?;

        sqlx::query(
            "INSERT INTO workflow.workflow_instances \
             (id, claim_id, scope_id, template_id, template_version, current_step_key, \
              status, executions, version, last_sequence, sla_deadline, sla_breached, \
              created_at, updated_at, completed_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)",
        )
        .bind(&instance.id)
        .bind(&instance.claim_id)
        .bind(&instance.scope_id)
        .bind(&instance.template_id)
        .bind(i32::try_from(instance.template_version).map_err(storage_error)?)
        .bind(&instance.current_step_key)
        .bind(instance.status.to_string())
        .bind(executions)
        .bind(to_i64(instance.version)?)
        .bind(to_i64(instance.last_sequence)?)
        .bind(sla_deadline)
        .bind(sla_breached)
        .bind(instance.created_at)
        .bind(instance.updated_at)
        .bind(instance.completed_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db)
                if db.is_unique_violation() && db.constraint() == Some(ACTIVE_CLAIM_INDEX) =>
            {
                RepositoryError::ClaimAlreadyActive(instance.claim_id.clone())
            }
            other => storage_error(other),
        })?;

        insert_records(&mut tx, records).await?;
        tx.commit().await.map_err(storage_error)?;
        Ok(())
    }

    async fn save(
        &self,
        instance: &WorkflowInstance,
        expected_version: u64,
        records: &[TransitionRecord],
    ) -> Result<(), RepositoryError> {
        let executions = serde_json::to_value(&instance.executions).map_err(storage_error)?;
        let (sla_deadline, sla_breached) = open_sla_columns(instance);
        let mut tx = self.pool.begin().await.map_err(storage_error)?;

        let result = sqlx::query(
            "UPDATE workflow.workflow_instances \
             SET current_step_key = $3, status = $4, executions = $5, version = $6, \
                 last_sequence = $7, sla_deadline = $8, sla_breached = $9, \
                 updated_at = $10, completed_at = $11 \
             WHERE id = $1 AND version = $2",
        )
        .bind(&instance.id)
        .bind(to_i64(expected_version)?)
        .bind(&instance.current_step_key)
        .bind(instance.status.to_string())
        .bind(executions)
        .bind(to_i64(instance.version)?)
        .bind(to_i64(instance.last_sequence)?)
        .bind(sla_deadline)
        .bind(sla_breached)
        .bind(instance.updated_at)
        .bind(instance.completed_at)
        .execute(&mut *tx)
        .await
        .map_err(storage_error)?;

        if result.rows_affected() == 0 {
            let actual: Option<i64> =
                sqlx::query_scalar("SELECT version FROM workflow.workflow_instances WHERE id = $1")
                    .bind(&instance.id)
                    .fetch_optional(&mut *tx)
                    .await
                    .map_err(storage_error)?;
            return Err(match actual {
                Some(actual) => RepositoryError::VersionConflict {
                    expected: expected_version,
                    actual: u64::try_from(actual).map_err(storage_error)?,
                },
                None => RepositoryError::NotFound(instance.id.clone()),
            });
        }

        insert_records(&mut tx, records).await?;
        tx.commit().await.map_err(storage_error)?;
        Ok(())
    }
}
