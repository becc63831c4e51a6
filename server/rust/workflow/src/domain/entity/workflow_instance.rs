use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::step_execution::{ExecutionStatus, StepExecution};
use super::transition_record::{NewTransitionRecord, TransitionKind, TransitionRecord};

/// InstanceStatus はワークフローインスタンスの状態を表す。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InstanceStatus {
    Active,
    Completed,
    Cancelled,
}

impl std::fmt::Display for InstanceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active => write!(f, "ACTIVE"),
            Self::Completed => write!(f, "COMPLETED"),
            Self::Cancelled => write!(f, "CANCELLED"),
        }
    }
}

impl InstanceStatus {
    pub fn from_str_value(s: &str) -> anyhow::Result<Self> {
        match s {
            "ACTIVE" => Ok(Self::Active),
            "COMPLETED" => Ok(Self::Completed),
            "CANCELLED" => Ok(Self::Cancelled),
            _ => anyhow::bail!("invalid instance status: {}", s),
        }
    }
}

/// WorkflowInstance はクレームに紐づくワークフロー実行の集約ルート。
/// ステップ実行とサブタスクを内包し、version による楽観的排他制御で更新される。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkflowInstance {
    pub id: String,
    pub claim_id: String,
    /// クレームの所属単位（店舗・支店など）。担当者解決のスコープに使う。
    pub scope_id: String,
    pub template_id: String,
    pub template_version: u32,
    pub current_step_key: Option<String>,
    pub status: InstanceStatus,
    pub executions: Vec<StepExecution>,
    pub version: u64,
    pub last_sequence: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl WorkflowInstance {
    pub fn new(
        claim_id: String,
        scope_id: String,
        template_id: String,
        template_version: u32,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: format!("inst_{}", uuid::Uuid::new_v4().simple()),
            claim_id,
            scope_id,
            template_id,
            template_version,
            current_step_key: None,
            status: InstanceStatus::Active,
            executions: Vec::new(),
            version: 1,
            last_sequence: 0,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == InstanceStatus::Active
    }

    pub fn open_execution(&self) -> Option<&StepExecution> {
        self.executions.iter().find(|e| e.is_open())
    }

    pub fn open_execution_mut(&mut self) -> Option<&mut StepExecution> {
        self.executions.iter_mut().find(|e| e.is_open())
    }

    pub fn open_execution_count(&self) -> usize {
        self.executions.iter().filter(|e| e.is_open()).count()
    }

    pub fn find_execution(&self, execution_id: &str) -> Option<&StepExecution> {
        self.executions.iter().find(|e| e.id == execution_id)
    }

    pub fn find_execution_mut(&mut self, execution_id: &str) -> Option<&mut StepExecution> {
        self.executions.iter_mut().find(|e| e.id == execution_id)
    }

    /// 新しいステップ実行を開き、current_step_key を移す。
    pub fn enter(&mut self, execution: StepExecution) {
        self.current_step_key = Some(execution.step_key.clone());
        self.executions.push(execution);
    }

    /// 開いているステップ実行を閉じる。閉じた実行の step_key を返す。
    pub fn close_open_execution(
        &mut self,
        status: ExecutionStatus,
        now: DateTime<Utc>,
    ) -> Option<String> {
        let execution = self.open_execution_mut()?;
        execution.close(status, now);
        Some(execution.step_key.clone())
    }

    pub fn complete(&mut self, now: DateTime<Utc>) {
        self.status = InstanceStatus::Completed;
        self.completed_at = Some(now);
        self.current_step_key = None;
    }

    pub fn cancel(&mut self, now: DateTime<Utc>) {
        self.status = InstanceStatus::Cancelled;
        self.completed_at = Some(now);
        self.current_step_key = None;
    }

    /// 次の履歴レコードを作成する。連番はインスタンス内で単調増加する。
    pub fn record(
        &mut self,
        kind: TransitionKind,
        from_step_key: Option<String>,
        to_step_key: Option<String>,
        actor_id: &str,
        reason: &str,
        now: DateTime<Utc>,
    ) -> TransitionRecord {
        self.last_sequence += 1;
        TransitionRecord::new(NewTransitionRecord {
            instance_id: self.id.clone(),
            sequence: self.last_sequence,
            kind,
            from_step_key,
            to_step_key,
            actor_id: actor_id.to_string(),
            reason: reason.to_string(),
            detail: None,
            timestamp: now,
        })
    }

    /// 書き込み前に version を進め、読み込み時点の version を返す。
    /// 戻り値はリポジトリの楽観的排他チェックに渡す。
    pub fn bump_version(&mut self, now: DateTime<Utc>) -> u64 {
        let read_version = self.version;
        self.version += 1;
        self.updated_at = now;
        read_version
    }
}
