use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use crate::domain::entity::step_definition::StepDefinition;
use crate::domain::entity::workflow_instance::WorkflowInstance;

/// UserDirectory はロール保持者と上書き権限を解決する外部ディレクトリ。
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn users_with_role(&self, role: &str, scope_id: &str) -> anyhow::Result<Vec<String>>;
    async fn has_override_capability(&self, user_id: &str) -> anyhow::Result<bool>;
}

/// ClaimContext は担当者解決に使うクレーム情報を表す。
#[derive(Debug, Clone, PartialEq)]
pub struct ClaimContext {
    pub claim_id: String,
    pub scope_id: String,
}

impl ClaimContext {
    pub fn new(claim_id: impl Into<String>, scope_id: impl Into<String>) -> Self {
        Self {
            claim_id: claim_id.into(),
            scope_id: scope_id.into(),
        }
    }

    pub fn of(instance: &WorkflowInstance) -> Self {
        Self::new(instance.claim_id.clone(), instance.scope_id.clone())
    }
}

/// Assignment は担当者解決の結果を表す。
#[derive(Debug, Clone, PartialEq)]
pub enum Assignment {
    /// 候補が1人だけの場合は直接割り当てる。
    Assigned(String),
    /// 候補が複数の場合は未割当のまま候補一覧を返す。
    Unassigned { eligible: Vec<String> },
    /// 候補が0人の場合。遷移は止めず、警告イベントを発行する。
    NoEligibleAssignee,
}

impl Assignment {
    pub fn assignee_id(&self) -> Option<String> {
        match self {
            Self::Assigned(user_id) => Some(user_id.clone()),
            Self::Unassigned { .. } | Self::NoEligibleAssignee => None,
        }
    }
}

pub struct AssignmentResolver {
    directory: Arc<dyn UserDirectory>,
}

impl AssignmentResolver {
    pub fn new(directory: Arc<dyn UserDirectory>) -> Self {
        Self { directory }
    }

    pub async fn resolve(
        &self,
        step: &StepDefinition,
        ctx: &ClaimContext,
    ) -> anyhow::Result<Assignment> {
        let mut users = self
            .directory
            .users_with_role(&step.required_role, &ctx.scope_id)
            .await?;
        users.sort();
        users.dedup();

        match users.len() {
            0 => {
                warn!(
                    claim_id = %ctx.claim_id,
                    scope_id = %ctx.scope_id,
                    step_key = %step.key,
                    role = %step.required_role,
                    "no eligible assignee for step"
                );
                Ok(Assignment::NoEligibleAssignee)
            }
            1 => Ok(Assignment::Assigned(users.remove(0))),
            _ => Ok(Assignment::Unassigned { eligible: users }),
        }
    }

    /// actor が現在の担当者、または上書き権限を持つ場合に true を返す。
    pub async fn is_authorized(
        &self,
        actor_id: &str,
        assignee_id: Option<&str>,
    ) -> anyhow::Result<bool> {
        if assignee_id == Some(actor_id) {
            return Ok(true);
        }
        self.directory.has_override_capability(actor_id).await
    }

    pub async fn has_override_capability(&self, actor_id: &str) -> anyhow::Result<bool> {
        self.directory.has_override_capability(actor_id).await
    }
}
