use serde::{Deserialize, Serialize};

/// StepDefinition はテンプレート内の1ステップの定義を表す。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StepDefinition {
    pub key: String,
    pub required_role: String,
    /// None の場合は期限なし。
    #[serde(default)]
    pub sla_minutes: Option<u32>,
    #[serde(default)]
    pub required_sub_task_keys: Vec<String>,
    /// 空の場合は終端ステップ。
    #[serde(default)]
    pub allowed_next_keys: Vec<String>,
}

impl StepDefinition {
    pub fn new(
        key: String,
        required_role: String,
        sla_minutes: Option<u32>,
        required_sub_task_keys: Vec<String>,
        allowed_next_keys: Vec<String>,
    ) -> Self {
        Self {
            key,
            required_role,
            sla_minutes,
            required_sub_task_keys,
            allowed_next_keys,
        }
    }

    pub fn sla_duration(&self) -> Option<chrono::Duration> {
        self.sla_minutes
            .map(|m| chrono::Duration::minutes(i64::from(m)))
    }

    pub fn is_terminal(&self) -> bool {
        self.allowed_next_keys.is_empty()
    }

    pub fn allows(&self, next_key: &str) -> bool {
        self.allowed_next_keys.iter().any(|k| k == next_key)
    }
}
