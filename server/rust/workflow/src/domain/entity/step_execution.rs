use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::step_definition::StepDefinition;
use super::sub_task::SubTask;

/// ExecutionStatus はステップ実行の状態を表す。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionStatus {
    Open,
    Completed,
    Skipped,
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Open => write!(f, "OPEN"),
            Self::Completed => write!(f, "COMPLETED"),
            Self::Skipped => write!(f, "SKIPPED"),
        }
    }
}

/// StepExecution はインスタンスがあるステップに滞在した1回分の記録を表す。
/// 分岐による再突入では新しい StepExecution が作られる。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StepExecution {
    pub id: String,
    pub step_key: String,
    pub opened_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    pub status: ExecutionStatus,
    pub assignee_id: Option<String>,
    pub sla_deadline: Option<DateTime<Utc>>,
    pub sla_breached: bool,
    pub sub_tasks: Vec<SubTask>,
}

impl StepExecution {
    /// ステップ定義からステップ実行を開く。必須サブタスクは Pending で作成される。
    pub fn open(definition: &StepDefinition, assignee_id: Option<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: format!("exec_{}", uuid::Uuid::new_v4().simple()),
            step_key: definition.key.clone(),
            opened_at: now,
            closed_at: None,
            status: ExecutionStatus::Open,
            assignee_id,
            sla_deadline: definition.sla_duration().map(|d| now + d),
            sla_breached: false,
            sub_tasks: definition
                .required_sub_task_keys
                .iter()
                .cloned()
                .map(SubTask::required)
                .collect(),
        }
    }

    pub fn is_open(&self) -> bool {
        self.status == ExecutionStatus::Open
    }

    pub fn close(&mut self, status: ExecutionStatus, now: DateTime<Utc>) {
        self.status = status;
        self.closed_at = Some(now);
    }

    /// 期限超過かつ未通知の場合に true を返す。
    pub fn is_breached_at(&self, now: DateTime<Utc>) -> bool {
        match self.sla_deadline {
            Some(deadline) => self.is_open() && !self.sla_breached && now > deadline,
            None => false,
        }
    }

    pub fn find_sub_task(&self, key: &str) -> Option<&SubTask> {
        self.sub_tasks.iter().find(|t| t.key == key)
    }

    pub fn find_sub_task_mut(&mut self, key: &str) -> Option<&mut SubTask> {
        self.sub_tasks.iter_mut().find(|t| t.key == key)
    }

    /// 定義上の必須サブタスクのうち未完了のキーを返す。
    pub fn pending_required_keys(&self, definition: &StepDefinition) -> Vec<String> {
        definition
            .required_sub_task_keys
            .iter()
            .filter(|key| !self.find_sub_task(key).is_some_and(SubTask::is_done))
            .cloned()
            .collect()
    }
}
