use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const REASON_INSTANCE_CREATED: &str = "instance-created";
pub const REASON_MANUAL_ADVANCE: &str = "manual-advance";
pub const REASON_WORKFLOW_COMPLETED: &str = "workflow-completed";
pub const REASON_SLA_BREACH: &str = "sla-breach";
pub const REASON_FORCE_REASSIGN: &str = "force-reassign";
pub const REASON_CANCELLED: &str = "cancelled";

/// TransitionKind は履歴レコードの種別を表す。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransitionKind {
    Entered,
    Advanced,
    Completed,
    Cancelled,
    SlaBreach,
    Reassigned,
}

impl std::fmt::Display for TransitionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Entered => write!(f, "ENTERED"),
            Self::Advanced => write!(f, "ADVANCED"),
            Self::Completed => write!(f, "COMPLETED"),
            Self::Cancelled => write!(f, "CANCELLED"),
            Self::SlaBreach => write!(f, "SLA_BREACH"),
            Self::Reassigned => write!(f, "REASSIGNED"),
        }
    }
}

impl TransitionKind {
    pub fn from_str_value(s: &str) -> anyhow::Result<Self> {
        match s {
            "ENTERED" => Ok(Self::Entered),
            "ADVANCED" => Ok(Self::Advanced),
            "COMPLETED" => Ok(Self::Completed),
            "CANCELLED" => Ok(Self::Cancelled),
            "SLA_BREACH" => Ok(Self::SlaBreach),
            "REASSIGNED" => Ok(Self::Reassigned),
            _ => anyhow::bail!("invalid transition kind: {}", s),
        }
    }

    /// current_step_key を変化させる種別かどうか。SLA 超過と再割当はマーカーのみ。
    pub fn changes_step(self) -> bool {
        matches!(
            self,
            Self::Entered | Self::Advanced | Self::Completed | Self::Cancelled
        )
    }
}

/// TransitionRecord は追記専用の履歴レコードを表す。作成後は変更・削除されない。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TransitionRecord {
    pub id: String,
    pub instance_id: String,
    /// インスタンス内で単調増加する連番。同一時刻のレコードの順序を決める。
    pub sequence: u64,
    pub kind: TransitionKind,
    pub from_step_key: Option<String>,
    pub to_step_key: Option<String>,
    pub actor_id: String,
    pub reason: String,
    pub detail: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// NewTransitionRecord は履歴レコード作成リクエストを表す。
#[derive(Debug, Clone)]
pub struct NewTransitionRecord {
    pub instance_id: String,
    pub sequence: u64,
    pub kind: TransitionKind,
    pub from_step_key: Option<String>,
    pub to_step_key: Option<String>,
    pub actor_id: String,
    pub reason: String,
    pub detail: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl TransitionRecord {
    pub fn new(req: NewTransitionRecord) -> Self {
        Self {
            id: format!("tr_{}", uuid::Uuid::new_v4().simple()),
            instance_id: req.instance_id,
            sequence: req.sequence,
            kind: req.kind,
            from_step_key: req.from_step_key,
            to_step_key: req.to_step_key,
            actor_id: req.actor_id,
            reason: req.reason,
            detail: req.detail,
            timestamp: req.timestamp,
        }
    }
}

/// 履歴を (timestamp, sequence) 順に並べ替える。
pub fn sort_history(records: &mut [TransitionRecord]) {
    records.sort_by(|a, b| {
        a.timestamp
            .cmp(&b.timestamp)
            .then_with(|| a.sequence.cmp(&b.sequence))
    });
}

/// 履歴を再生し、インスタンスが取った current_step_key の列を復元する。
pub fn replay_step_keys(records: &[TransitionRecord]) -> Vec<Option<String>> {
    let mut ordered = records.to_vec();
    sort_history(&mut ordered);
    ordered
        .into_iter()
        .filter(|r| r.kind.changes_step())
        .map(|r| r.to_step_key)
        .collect()
}
