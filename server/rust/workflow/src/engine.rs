use std::sync::Arc;

use crate::domain::repository::{WorkflowInstanceRepository, WorkflowTemplateRepository};
use crate::domain::service::AssignmentResolver;
use crate::infrastructure::kafka_producer::NotificationDispatcher;
use crate::usecase::{
    AddSubTaskUseCase, AdvanceStepUseCase, CancelInstanceUseCase, CheckSlaBreachesUseCase,
    CompleteSubTaskUseCase, ConflictRetryPolicy, CreateInstanceUseCase, ForceReassignUseCase,
    GetHistoryUseCase, GetInstanceUseCase, GetTemplateUseCase, ListSubTasksUseCase,
    PublishTemplateUseCase,
};

/// WorkflowEngine はエンジンが公開する全ユースケースをまとめたもの。
/// 呼び出し側（API 層・ワーカー）はこの構造体だけを保持すればよい。
#[derive(Clone)]
pub struct WorkflowEngine {
    pub publish_template_uc: Arc<PublishTemplateUseCase>,
    pub get_template_uc: Arc<GetTemplateUseCase>,
    pub create_instance_uc: Arc<CreateInstanceUseCase>,
    pub advance_step_uc: Arc<AdvanceStepUseCase>,
    pub cancel_instance_uc: Arc<CancelInstanceUseCase>,
    pub force_reassign_uc: Arc<ForceReassignUseCase>,
    pub add_sub_task_uc: Arc<AddSubTaskUseCase>,
    pub complete_sub_task_uc: Arc<CompleteSubTaskUseCase>,
    pub list_sub_tasks_uc: Arc<ListSubTasksUseCase>,
    pub get_instance_uc: Arc<GetInstanceUseCase>,
    pub get_history_uc: Arc<GetHistoryUseCase>,
    pub check_sla_breaches_uc: Arc<CheckSlaBreachesUseCase>,
}

/// EngineDeps は WorkflowEngine の構築に必要な依存を表す。
pub struct EngineDeps {
    pub template_repo: Arc<dyn WorkflowTemplateRepository>,
    pub instance_repo: Arc<dyn WorkflowInstanceRepository>,
    pub resolver: Arc<AssignmentResolver>,
    pub dispatcher: Arc<dyn NotificationDispatcher>,
    pub retry: ConflictRetryPolicy,
    /// SLA 監視が履歴に記録するアクター ID。
    pub sla_actor_id: String,
}

impl WorkflowEngine {
    pub fn new(deps: EngineDeps) -> Self {
        let EngineDeps {
            template_repo,
            instance_repo,
            resolver,
            dispatcher,
            retry,
            sla_actor_id,
        } = deps;

        Self {
            publish_template_uc: Arc::new(PublishTemplateUseCase::new(template_repo.clone())),
            get_template_uc: Arc::new(GetTemplateUseCase::new(template_repo.clone())),
            create_instance_uc: Arc::new(CreateInstanceUseCase::new(
                template_repo.clone(),
                instance_repo.clone(),
                resolver.clone(),
                dispatcher.clone(),
            )),
            advance_step_uc: Arc::new(
                AdvanceStepUseCase::new(
                    template_repo,
                    instance_repo.clone(),
                    resolver.clone(),
                    dispatcher.clone(),
                )
                .with_retry_policy(retry.clone()),
            ),
            cancel_instance_uc: Arc::new(
                CancelInstanceUseCase::new(
                    instance_repo.clone(),
                    resolver.clone(),
                    dispatcher.clone(),
                )
                .with_retry_policy(retry.clone()),
            ),
            force_reassign_uc: Arc::new(
                ForceReassignUseCase::new(instance_repo.clone(), resolver, dispatcher.clone())
                    .with_retry_policy(retry.clone()),
            ),
            add_sub_task_uc: Arc::new(
                AddSubTaskUseCase::new(instance_repo.clone()).with_retry_policy(retry.clone()),
            ),
            complete_sub_task_uc: Arc::new(
                CompleteSubTaskUseCase::new(instance_repo.clone())
                    .with_retry_policy(retry.clone()),
            ),
            list_sub_tasks_uc: Arc::new(ListSubTasksUseCase::new(instance_repo.clone())),
            get_instance_uc: Arc::new(GetInstanceUseCase::new(instance_repo.clone())),
            get_history_uc: Arc::new(GetHistoryUseCase::new(instance_repo.clone())),
            check_sla_breaches_uc: Arc::new(
                CheckSlaBreachesUseCase::new(instance_repo, dispatcher, sla_actor_id)
                    .with_retry_policy(retry),
            ),
        }
    }
}
