use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::entity::transition_record::TransitionRecord;
use crate::domain::entity::workflow_instance::WorkflowInstance;

/// RepositoryError はインスタンス書き込み時のエラーを表す。
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("version conflict: expected={expected}, actual={actual}")]
    VersionConflict { expected: u64, actual: u64 },

    #[error("instance not found: {0}")]
    NotFound(String),

    #[error("claim already has an active instance: {0}")]
    ClaimAlreadyActive(String),

    #[error("storage error: {0}")]
    Storage(String),
}

/// WorkflowInstanceRepository はインスタンス集約と履歴の永続化を担う。
/// 書き込みは集約の更新と履歴の追記を1つの原子的な単位として行う。
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait WorkflowInstanceRepository: Send + Sync {
    async fn find_by_id(&self, id: &str) -> anyhow::Result<Option<WorkflowInstance>>;
    async fn find_by_execution_id(
        &self,
        execution_id: &str,
    ) -> anyhow::Result<Option<WorkflowInstance>>;
    async fn find_active_by_claim(&self, claim_id: &str)
        -> anyhow::Result<Option<WorkflowInstance>>;
    /// 開いているステップ実行の期限が now を過ぎ、未通知のインスタンスを返す。
    async fn find_sla_candidates(
        &self,
        now: DateTime<Utc>,
    ) -> anyhow::Result<Vec<WorkflowInstance>>;
    async fn find_history(&self, instance_id: &str) -> anyhow::Result<Vec<TransitionRecord>>;
    async fn create(
        &self,
        instance: &WorkflowInstance,
        records: &[TransitionRecord],
    ) -> Result<(), RepositoryError>;
    /// 保存済み version が expected_version と一致する場合のみ書き込む。
    async fn save(
        &self,
        instance: &WorkflowInstance,
        expected_version: u64,
        records: &[TransitionRecord],
    ) -> Result<(), RepositoryError>;
}
