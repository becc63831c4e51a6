use std::sync::Arc;

use crate::domain::entity::sub_task::SubTask;
use crate::domain::repository::WorkflowInstanceRepository;

#[derive(Debug, Clone)]
pub struct ListSubTasksInput {
    pub execution_id: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ListSubTasksError {
    #[error("step execution not found: {0}")]
    ExecutionNotFound(String),

    #[error("internal error: {0}")]
    Internal(String),
}

pub struct ListSubTasksUseCase {
    repo: Arc<dyn WorkflowInstanceRepository>,
}

impl ListSubTasksUseCase {
    pub fn new(repo: Arc<dyn WorkflowInstanceRepository>) -> Self {
        Self { repo }
    }

    pub async fn execute(
        &self,
        input: &ListSubTasksInput,
    ) -> Result<Vec<SubTask>, ListSubTasksError> {
        let instance = self
            .repo
            .find_by_execution_id(&input.execution_id)
            .await
            .map_err(|e| ListSubTasksError::Internal(e.to_string()))?
            .ok_or_else(|| ListSubTasksError::ExecutionNotFound(input.execution_id.clone()))?;

        instance
            .find_execution(&input.execution_id)
            .map(|e| e.sub_tasks.clone())
            .ok_or_else(|| ListSubTasksError::ExecutionNotFound(input.execution_id.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entity::step_definition::StepDefinition;
    use crate::domain::entity::step_execution::StepExecution;
    use crate::domain::entity::workflow_instance::WorkflowInstance;
    use crate::domain::repository::workflow_instance_repository::MockWorkflowInstanceRepository;
    use chrono::Utc;

    #[tokio::test]
    async fn test_list_sub_tasks() {
        let mut mock = MockWorkflowInstanceRepository::new();
        mock.expect_find_by_execution_id().returning(|_| {
            let now = Utc::now();
            let mut inst = WorkflowInstance::new(
                "claim-001".to_string(),
                "shop-osaka".to_string(),
                "warranty-repair".to_string(),
                1,
                now,
            );
            let step = StepDefinition::new(
                "intake".to_string(),
                "clerk".to_string(),
                None,
                vec!["photos-uploaded".to_string(), "serial-verified".to_string()],
                vec![],
            );
            let mut exec = StepExecution::open(&step, None, now);
            exec.id = "exec_001".to_string();
            inst.enter(exec);
            Ok(Some(inst))
        });

        let uc = ListSubTasksUseCase::new(Arc::new(mock));
        let subs = uc
            .execute(&ListSubTasksInput {
                execution_id: "exec_001".to_string(),
            })
            .await
            .unwrap();
        let keys: Vec<&str> = subs.iter().map(|s| s.key.as_str()).collect();
        assert_eq!(keys, vec!["photos-uploaded", "serial-verified"]);
    }

    #[tokio::test]
    async fn test_unknown_execution() {
        let mut mock = MockWorkflowInstanceRepository::new();
        mock.expect_find_by_execution_id().returning(|_| Ok(None));

        let uc = ListSubTasksUseCase::new(Arc::new(mock));
        let result = uc
            .execute(&ListSubTasksInput {
                execution_id: "exec_missing".to_string(),
            })
            .await;
        assert!(matches!(result, Err(ListSubTasksError::ExecutionNotFound(_))));
    }
}
