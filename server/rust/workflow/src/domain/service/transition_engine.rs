use chrono::{DateTime, Utc};

use crate::domain::entity::step_definition::StepDefinition;
use crate::domain::entity::step_execution::{ExecutionStatus, StepExecution};
use crate::domain::entity::transition_record::{
    TransitionKind, TransitionRecord, REASON_CANCELLED, REASON_FORCE_REASSIGN,
    REASON_INSTANCE_CREATED, REASON_MANUAL_ADVANCE, REASON_SLA_BREACH, REASON_WORKFLOW_COMPLETED,
};
use crate::domain::entity::workflow_instance::{InstanceStatus, WorkflowInstance};
use crate::domain::entity::workflow_template::WorkflowTemplate;

/// TransitionError は状態遷移ルール違反を表す。
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TransitionError {
    #[error("template '{0}' has no steps")]
    EmptyTemplate(String),

    #[error("instance '{id}' is not active: {status}")]
    InstanceNotActive { id: String, status: InstanceStatus },

    #[error("instance '{0}' has no open step")]
    NoOpenStep(String),

    #[error("step '{0}' is not defined in the template")]
    UnknownStep(String),

    #[error("illegal transition from '{from}' to '{to}'")]
    IllegalTransition { from: String, to: String },

    #[error("required sub-tasks are incomplete: {}", .0.join(", "))]
    SubTasksIncomplete(Vec<String>),

    #[error("step execution not found: {0}")]
    ExecutionNotFound(String),

    #[error("step execution '{0}' is not open")]
    ExecutionNotOpen(String),
}

/// AdvancePlan は検証済みの前進要求を表す。target が None なら終端ステップの完了。
#[derive(Debug, Clone, Copy)]
pub struct AdvancePlan<'t> {
    pub current: &'t StepDefinition,
    pub target: Option<&'t StepDefinition>,
}

/// TransitionEngine はワークフローインスタンスの状態遷移を行う純粋なドメインサービス。
/// 永続化や通知は行わず、集約の変更と追記すべき履歴レコードを返す。
#[derive(Debug, Default, Clone, Copy)]
pub struct TransitionEngine;

impl TransitionEngine {
    pub fn new() -> Self {
        Self
    }

    /// テンプレートの最初のステップを開いた新しいインスタンスを作る。
    pub fn start(
        &self,
        claim_id: &str,
        scope_id: &str,
        template: &WorkflowTemplate,
        assignee_id: Option<String>,
        actor_id: &str,
        now: DateTime<Utc>,
    ) -> Result<(WorkflowInstance, Vec<TransitionRecord>), TransitionError> {
        let first = template
            .first_step()
            .ok_or_else(|| TransitionError::EmptyTemplate(template.id.clone()))?;

        let mut instance = WorkflowInstance::new(
            claim_id.to_string(),
            scope_id.to_string(),
            template.id.clone(),
            template.version,
            now,
        );
        instance.enter(StepExecution::open(first, assignee_id, now));
        let record = instance.record(
            TransitionKind::Entered,
            None,
            Some(first.key.clone()),
            actor_id,
            REASON_INSTANCE_CREATED,
            now,
        );
        Ok((instance, vec![record]))
    }

    /// 前進要求を検証する。状態、開いているステップ、遷移先、必須サブタスクの順に確認する。
    /// 認可はディレクトリ参照が必要なため呼び出し側で行う。
    pub fn check_advance<'t>(
        &self,
        instance: &WorkflowInstance,
        template: &'t WorkflowTemplate,
        target_step_key: Option<&str>,
    ) -> Result<AdvancePlan<'t>, TransitionError> {
        ensure_active(instance)?;

        let execution = instance
            .open_execution()
            .ok_or_else(|| TransitionError::NoOpenStep(instance.id.clone()))?;
        let current = template
            .find_step(&execution.step_key)
            .ok_or_else(|| TransitionError::UnknownStep(execution.step_key.clone()))?;

        let target = match target_step_key {
            None if current.is_terminal() => None,
            None => {
                return Err(TransitionError::IllegalTransition {
                    from: current.key.clone(),
                    to: "<end>".to_string(),
                })
            }
            Some(key) if current.allows(key) => Some(
                template
                    .find_step(key)
                    .ok_or_else(|| TransitionError::UnknownStep(key.to_string()))?,
            ),
            Some(key) => {
                return Err(TransitionError::IllegalTransition {
                    from: current.key.clone(),
                    to: key.to_string(),
                })
            }
        };

        let pending = execution.pending_required_keys(current);
        if !pending.is_empty() {
            return Err(TransitionError::SubTasksIncomplete(pending));
        }

        Ok(AdvancePlan { current, target })
    }

    /// 検証済みの前進を適用する。現在の実行を閉じ、次の実行を開くか、インスタンスを完了する。
    pub fn apply_advance(
        &self,
        instance: &mut WorkflowInstance,
        plan: &AdvancePlan<'_>,
        assignee_id: Option<String>,
        actor_id: &str,
        now: DateTime<Utc>,
    ) -> Vec<TransitionRecord> {
        let from = instance.close_open_execution(ExecutionStatus::Completed, now);

        match plan.target {
            Some(next) => {
                instance.enter(StepExecution::open(next, assignee_id, now));
                vec![instance.record(
                    TransitionKind::Advanced,
                    from,
                    Some(next.key.clone()),
                    actor_id,
                    REASON_MANUAL_ADVANCE,
                    now,
                )]
            }
            None => {
                instance.complete(now);
                vec![instance.record(
                    TransitionKind::Completed,
                    from,
                    None,
                    actor_id,
                    REASON_WORKFLOW_COMPLETED,
                    now,
                )]
            }
        }
    }

    /// インスタンスを取り消す。開いている実行は Skipped で閉じる。
    pub fn cancel(
        &self,
        instance: &mut WorkflowInstance,
        actor_id: &str,
        reason: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Vec<TransitionRecord>, TransitionError> {
        ensure_active(instance)?;

        let from = instance.close_open_execution(ExecutionStatus::Skipped, now);
        instance.cancel(now);
        let record = instance.record(
            TransitionKind::Cancelled,
            from,
            None,
            actor_id,
            reason.unwrap_or(REASON_CANCELLED),
            now,
        );
        Ok(vec![record])
    }

    /// 開いている実行の担当者を差し替える。current_step_key は変わらない。
    pub fn reassign(
        &self,
        instance: &mut WorkflowInstance,
        execution_id: &str,
        new_assignee_id: &str,
        actor_id: &str,
        now: DateTime<Utc>,
    ) -> Result<TransitionRecord, TransitionError> {
        ensure_active(instance)?;

        let execution = instance
            .find_execution_mut(execution_id)
            .ok_or_else(|| TransitionError::ExecutionNotFound(execution_id.to_string()))?;
        if !execution.is_open() {
            return Err(TransitionError::ExecutionNotOpen(execution_id.to_string()));
        }

        let previous = execution
            .assignee_id
            .replace(new_assignee_id.to_string())
            .unwrap_or_else(|| "<unassigned>".to_string());
        let step_key = execution.step_key.clone();

        let mut record = instance.record(
            TransitionKind::Reassigned,
            Some(step_key.clone()),
            Some(step_key),
            actor_id,
            REASON_FORCE_REASSIGN,
            now,
        );
        record.detail = Some(format!("{previous} -> {new_assignee_id}"));
        Ok(record)
    }

    /// 開いている実行の SLA 超過を記録する。既に記録済み、期限内、または別の実行に
    /// 移っている場合は何もせず None を返す。
    pub fn mark_sla_breach(
        &self,
        instance: &mut WorkflowInstance,
        execution_id: &str,
        actor_id: &str,
        now: DateTime<Utc>,
    ) -> Option<TransitionRecord> {
        if !instance.is_active() {
            return None;
        }
        let execution = instance.open_execution_mut()?;
        if execution.id != execution_id || !execution.is_breached_at(now) {
            return None;
        }
        execution.sla_breached = true;
        let step_key = execution.step_key.clone();
        let deadline = execution.sla_deadline;

        let mut record = instance.record(
            TransitionKind::SlaBreach,
            Some(step_key.clone()),
            Some(step_key),
            actor_id,
            REASON_SLA_BREACH,
            now,
        );
        record.detail = deadline.map(|d| format!("deadline {}", d.to_rfc3339()));
        Some(record)
    }
}

fn ensure_active(instance: &WorkflowInstance) -> Result<(), TransitionError> {
    if instance.is_active() {
        Ok(())
    } else {
        Err(TransitionError::InstanceNotActive {
            id: instance.id.clone(),
            status: instance.status,
        })
    }
}
