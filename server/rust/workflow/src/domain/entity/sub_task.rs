use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// SubTaskStatus はサブタスクの状態を表す。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubTaskStatus {
    Pending,
    Done,
}

impl std::fmt::Display for SubTaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "PENDING"),
            Self::Done => write!(f, "DONE"),
        }
    }
}

/// SubTask はステップ実行に紐づくチェックリスト項目を表す。
/// required が true のものだけがステップ完了をゲートする。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SubTask {
    pub key: String,
    pub label: String,
    pub required: bool,
    pub status: SubTaskStatus,
    pub completed_by: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl SubTask {
    pub fn required(key: String) -> Self {
        Self {
            label: key.clone(),
            key,
            required: true,
            status: SubTaskStatus::Pending,
            completed_by: None,
            completed_at: None,
        }
    }

    pub fn informational(key: String, label: String) -> Self {
        Self {
            key,
            label,
            required: false,
            status: SubTaskStatus::Pending,
            completed_by: None,
            completed_at: None,
        }
    }

    pub fn is_done(&self) -> bool {
        self.status == SubTaskStatus::Done
    }

    /// 完了にする。既に完了済みの場合は何もせず false を返す。
    pub fn complete(&mut self, actor_id: &str, now: DateTime<Utc>) -> bool {
        if self.is_done() {
            return false;
        }
        self.status = SubTaskStatus::Done;
        self.completed_by = Some(actor_id.to_string());
        self.completed_at = Some(now);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn required_sub_task_uses_key_as_label() {
        let task = SubTask::required("photos-uploaded".to_string());
        assert_eq!(task.label, "photos-uploaded");
        assert!(task.required);
        assert_eq!(task.status, SubTaskStatus::Pending);
    }

    #[test]
    fn complete_is_idempotent() {
        let mut task = SubTask::informational("note".to_string(), "Customer note".to_string());
        let first = Utc::now();
        assert!(task.complete("user-001", first));
        assert!(!task.complete("user-002", first + chrono::Duration::minutes(5)));
        assert_eq!(task.completed_by.as_deref(), Some("user-001"));
        assert_eq!(task.completed_at, Some(first));
        assert!(task.is_done());
    }
}
