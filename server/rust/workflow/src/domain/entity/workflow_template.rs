use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::step_definition::StepDefinition;

/// TemplateError はテンプレート公開時のステップグラフ検証エラーを表す。
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TemplateError {
    #[error("template id must not be empty")]
    EmptyId,

    #[error("template name must not be empty")]
    EmptyName,

    #[error("template must have at least one step")]
    NoSteps,

    #[error("step {0} key must not be empty")]
    EmptyStepKey(usize),

    #[error("duplicate step key: {0}")]
    DuplicateStepKey(String),

    #[error("step '{0}' has no required role")]
    EmptyRole(String),

    #[error("step '{step}' references unknown next step '{next}'")]
    UnknownNextKey { step: String, next: String },

    #[error("step '{step}' lists sub-task '{key}' more than once")]
    DuplicateSubTaskKey { step: String, key: String },

    #[error("step '{0}' has a zero SLA duration")]
    ZeroSla(String),
}

/// WorkflowTemplate は公開済みワークフローテンプレートを表す。
/// 公開後は変更されず、編集は新しい version として保存される。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkflowTemplate {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub version: u32,
    pub steps: Vec<StepDefinition>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl WorkflowTemplate {
    pub fn new(id: String, name: String, description: String, steps: Vec<StepDefinition>) -> Self {
        Self {
            id,
            name,
            description,
            version: 1,
            steps,
            created_at: Utc::now(),
        }
    }

    /// YAML からテンプレートを解析し、ステップグラフを検証する。
    pub fn from_yaml(content: &str) -> anyhow::Result<Self> {
        let template: Self = serde_yaml::from_str(content)?;
        template.validate()?;
        Ok(template)
    }

    /// ステップグラフの不変条件を検証する。
    /// キーの一意性、allowed_next_keys の解決可能性、ロールとサブタスクの整合性を確認する。
    pub fn validate(&self) -> Result<(), TemplateError> {
        if self.id.trim().is_empty() {
            return Err(TemplateError::EmptyId);
        }
        if self.name.trim().is_empty() {
            return Err(TemplateError::EmptyName);
        }
        if self.steps.is_empty() {
            return Err(TemplateError::NoSteps);
        }

        let mut keys = HashSet::new();
        for (i, step) in self.steps.iter().enumerate() {
            if step.key.trim().is_empty() {
                return Err(TemplateError::EmptyStepKey(i));
            }
            if !keys.insert(step.key.as_str()) {
                return Err(TemplateError::DuplicateStepKey(step.key.clone()));
            }
            if step.required_role.trim().is_empty() {
                return Err(TemplateError::EmptyRole(step.key.clone()));
            }
            if step.sla_minutes == Some(0) {
                return Err(TemplateError::ZeroSla(step.key.clone()));
            }
            let mut sub_task_keys = HashSet::new();
            for key in &step.required_sub_task_keys {
                if !sub_task_keys.insert(key.as_str()) {
                    return Err(TemplateError::DuplicateSubTaskKey {
                        step: step.key.clone(),
                        key: key.clone(),
                    });
                }
            }
        }

        for step in &self.steps {
            if let Some(next) = step
                .allowed_next_keys
                .iter()
                .find(|next| !keys.contains(next.as_str()))
            {
                return Err(TemplateError::UnknownNextKey {
                    step: step.key.clone(),
                    next: next.clone(),
                });
            }
        }

        Ok(())
    }

    pub fn find_step(&self, key: &str) -> Option<&StepDefinition> {
        self.steps.iter().find(|s| s.key == key)
    }

    pub fn first_step(&self) -> Option<&StepDefinition> {
        self.steps.first()
    }

    /// 現在ステップから遷移可能な後続ステップを返す。空の場合は終端。
    pub fn resolve_next_steps(&self, current_key: &str) -> Vec<&StepDefinition> {
        self.find_step(current_key)
            .map(|current| {
                current
                    .allowed_next_keys
                    .iter()
                    .filter_map(|k| self.find_step(k))
                    .collect()
            })
            .unwrap_or_default()
    }
}
