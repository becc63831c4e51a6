//! インメモリアダプターを使ったワークフローエンジンの統合テスト。

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use tokio::sync::Mutex;

use claimflow_workflow_server::adapter::repository::{
    InMemoryWorkflowInstanceRepository, InMemoryWorkflowTemplateRepository,
};
use claimflow_workflow_server::domain::entity::step_definition::StepDefinition;
use claimflow_workflow_server::domain::entity::step_execution::ExecutionStatus;
use claimflow_workflow_server::domain::entity::transition_record::{
    replay_step_keys, TransitionKind,
};
use claimflow_workflow_server::domain::entity::workflow_instance::{
    InstanceStatus, WorkflowInstance,
};
use claimflow_workflow_server::domain::service::{Assignment, AssignmentResolver};
use claimflow_workflow_server::engine::{EngineDeps, WorkflowEngine};
use claimflow_workflow_server::infrastructure::config::DirectoryConfig;
use claimflow_workflow_server::infrastructure::kafka_producer::{
    EventKind, NotificationDispatcher, WorkflowEvent,
};
use claimflow_workflow_server::infrastructure::user_directory::ConfigUserDirectory;
use claimflow_workflow_server::usecase::add_sub_task::AddSubTaskInput;
use claimflow_workflow_server::usecase::advance_step::AdvanceStepInput;
use claimflow_workflow_server::usecase::cancel_instance::CancelInstanceInput;
use claimflow_workflow_server::usecase::complete_sub_task::CompleteSubTaskInput;
use claimflow_workflow_server::usecase::create_instance::CreateInstanceInput;
use claimflow_workflow_server::usecase::force_reassign::ForceReassignInput;
use claimflow_workflow_server::usecase::get_history::GetHistoryInput;
use claimflow_workflow_server::usecase::get_instance::GetInstanceInput;
use claimflow_workflow_server::usecase::list_sub_tasks::ListSubTasksInput;
use claimflow_workflow_server::usecase::publish_template::PublishTemplateInput;
use claimflow_workflow_server::usecase::{
    AdvanceStepError, CancelInstanceError, ConflictRetryPolicy, CreateInstanceError,
};

// ---------------------------------------------------------------------------
// テスト用ディスパッチャー
// ---------------------------------------------------------------------------

/// 配信されたイベントを記録するディスパッチャー。
#[derive(Default)]
struct RecordingDispatcher {
    events: Mutex<Vec<WorkflowEvent>>,
}

impl RecordingDispatcher {
    async fn of_kind(&self, kind: EventKind) -> Vec<WorkflowEvent> {
        self.events
            .lock()
            .await
            .iter()
            .filter(|e| e.kind == kind)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl NotificationDispatcher for RecordingDispatcher {
    async fn notify(&self, event: &WorkflowEvent) -> anyhow::Result<()> {
        self.events.lock().await.push(event.clone());
        Ok(())
    }

    async fn close(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// ヘルパー
// ---------------------------------------------------------------------------

fn step(key: &str, role: &str, sla_minutes: Option<u32>, subs: &[&str], next: &[&str]) -> StepDefinition {
    StepDefinition::new(
        key.to_string(),
        role.to_string(),
        sla_minutes,
        subs.iter().map(|s| s.to_string()).collect(),
        next.iter().map(|s| s.to_string()).collect(),
    )
}

fn warranty_repair() -> PublishTemplateInput {
    PublishTemplateInput {
        id: "warranty-repair".to_string(),
        name: "Warranty repair".to_string(),
        description: String::new(),
        steps: vec![
            step("intake", "clerk", None, &["photos-uploaded"], &["diagnosis"]),
            step("diagnosis", "technician", None, &[], &["quotation"]),
            step("quotation", "estimator", Some(48 * 60), &[], &["approved", "rejected"]),
            step("approved", "technician", None, &[], &["closed"]),
            step("rejected", "clerk", None, &[], &["closed"]),
            step("closed", "clerk", None, &[], &[]),
        ],
    }
}

fn inspection_flow() -> PublishTemplateInput {
    PublishTemplateInput {
        id: "inspection-flow".to_string(),
        name: "Inspection".to_string(),
        description: String::new(),
        steps: vec![
            step("inspection", "inspector", None, &[], &["closed"]),
            step("closed", "clerk", None, &[], &[]),
        ],
    }
}

fn field_inspection() -> PublishTemplateInput {
    PublishTemplateInput {
        id: "field-inspection".to_string(),
        name: "Field inspection".to_string(),
        description: String::new(),
        steps: vec![
            step("intake", "clerk", None, &[], &["inspection"]),
            step("inspection", "inspector", Some(24 * 60), &[], &["closed"]),
            step("closed", "clerk", None, &[], &[]),
        ],
    }
}

fn directory() -> DirectoryConfig {
    let mut roles: HashMap<String, HashMap<String, Vec<String>>> = HashMap::new();
    let any = |users: &[&str]| -> HashMap<String, Vec<String>> {
        HashMap::from([("*".to_string(), users.iter().map(|u| u.to_string()).collect())])
    };
    roles.insert("clerk".to_string(), any(&["clerk-01"]));
    roles.insert("technician".to_string(), any(&["tech-01"]));
    roles.insert("estimator".to_string(), any(&["est-01"]));
    DirectoryConfig {
        roles,
        override_users: vec!["supervisor-001".to_string()],
    }
}

struct Harness {
    engine: WorkflowEngine,
    dispatcher: Arc<RecordingDispatcher>,
}

async fn setup() -> Harness {
    let dispatcher = Arc::new(RecordingDispatcher::default());
    let engine = WorkflowEngine::new(EngineDeps {
        template_repo: Arc::new(InMemoryWorkflowTemplateRepository::new()),
        instance_repo: Arc::new(InMemoryWorkflowInstanceRepository::new()),
        resolver: Arc::new(AssignmentResolver::new(Arc::new(ConfigUserDirectory::new(
            &directory(),
        )))),
        dispatcher: dispatcher.clone(),
        retry: ConflictRetryPolicy::no_retry(),
        sla_actor_id: "system:sla-monitor".to_string(),
    });
    engine
        .publish_template_uc
        .execute(&warranty_repair())
        .await
        .unwrap();
    engine
        .publish_template_uc
        .execute(&inspection_flow())
        .await
        .unwrap();
    engine
        .publish_template_uc
        .execute(&field_inspection())
        .await
        .unwrap();
    Harness { engine, dispatcher }
}

async fn create(h: &Harness, claim_id: &str, template_id: &str) -> WorkflowInstance {
    h.engine
        .create_instance_uc
        .execute(&CreateInstanceInput {
            claim_id: claim_id.to_string(),
            scope_id: "shop-osaka".to_string(),
            template_id: template_id.to_string(),
            template_version: None,
            actor_id: "clerk-01".to_string(),
        })
        .await
        .unwrap()
        .instance
}

fn advance_input(instance_id: &str, actor: &str, target: Option<&str>) -> AdvanceStepInput {
    AdvanceStepInput {
        instance_id: instance_id.to_string(),
        actor_id: actor.to_string(),
        target_step_key: target.map(str::to_string),
        expected_version: None,
    }
}

async fn complete_sub_task(h: &Harness, inst: &WorkflowInstance, key: &str) {
    let execution_id = inst.open_execution().unwrap().id.clone();
    h.engine
        .complete_sub_task_uc
        .execute(&CompleteSubTaskInput {
            execution_id,
            key: key.to_string(),
            actor_id: "clerk-01".to_string(),
        })
        .await
        .unwrap();
}

async fn reload(h: &Harness, id: &str) -> WorkflowInstance {
    h.engine
        .get_instance_uc
        .execute(&GetInstanceInput { id: id.to_string() })
        .await
        .unwrap()
}

/// intake → diagnosis → quotation まで進める。
async fn advance_to_quotation(h: &Harness, inst: &WorkflowInstance) {
    complete_sub_task(h, inst, "photos-uploaded").await;
    h.engine
        .advance_step_uc
        .execute(&advance_input(&inst.id, "clerk-01", Some("diagnosis")))
        .await
        .unwrap();
    h.engine
        .advance_step_uc
        .execute(&advance_input(&inst.id, "tech-01", Some("quotation")))
        .await
        .unwrap();
}

// ---------------------------------------------------------------------------
// インスタンス作成
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_create_opens_only_first_step() {
    let h = setup().await;
    let inst = create(&h, "claim-001", "warranty-repair").await;

    assert_eq!(inst.status, InstanceStatus::Active);
    assert_eq!(inst.current_step_key.as_deref(), Some("intake"));
    assert_eq!(inst.executions.len(), 1);
    let exec = &inst.executions[0];
    assert_eq!(exec.status, ExecutionStatus::Open);
    assert!(exec.closed_at.is_none());
    assert_eq!(exec.assignee_id.as_deref(), Some("clerk-01"));
    assert_eq!(inst.template_version, 1);
}

#[tokio::test]
async fn test_second_active_instance_for_claim_is_rejected() {
    let h = setup().await;
    create(&h, "claim-001", "warranty-repair").await;

    let result = h
        .engine
        .create_instance_uc
        .execute(&CreateInstanceInput {
            claim_id: "claim-001".to_string(),
            scope_id: "shop-osaka".to_string(),
            template_id: "warranty-repair".to_string(),
            template_version: None,
            actor_id: "clerk-01".to_string(),
        })
        .await;
    assert!(matches!(result, Err(CreateInstanceError::ClaimAlreadyActive(_))));
}

#[tokio::test]
async fn test_running_instance_keeps_its_template_version() {
    let h = setup().await;
    let inst = create(&h, "claim-001", "warranty-repair").await;

    // v2 では intake から直接 closed に進める
    let mut v2 = warranty_repair();
    v2.steps[0] = step("intake", "clerk", None, &["photos-uploaded"], &["diagnosis", "closed"]);
    let published = h.engine.publish_template_uc.execute(&v2).await.unwrap();
    assert_eq!(published.version, 2);

    complete_sub_task(&h, &inst, "photos-uploaded").await;
    let result = h
        .engine
        .advance_step_uc
        .execute(&advance_input(&inst.id, "clerk-01", Some("closed")))
        .await;
    assert!(matches!(result, Err(AdvanceStepError::IllegalTransition { .. })));
}

// ---------------------------------------------------------------------------
// シナリオ A: 分岐とサブタスクのゲート
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_scenario_a_sub_task_gate_and_branching() {
    let h = setup().await;
    let inst = create(&h, "claim-001", "warranty-repair").await;

    // 必須サブタスク未完了のため拒否され、状態は変わらない
    let rejected = h
        .engine
        .advance_step_uc
        .execute(&advance_input(&inst.id, "clerk-01", Some("diagnosis")))
        .await;
    match rejected {
        Err(AdvanceStepError::SubTasksIncomplete(keys)) => {
            assert_eq!(keys, vec!["photos-uploaded".to_string()]);
        }
        other => panic!("unexpected result: {other:?}"),
    }
    assert_eq!(reload(&h, &inst.id).await, inst);

    // 許可されていない遷移も状態を変えない
    let illegal = h
        .engine
        .advance_step_uc
        .execute(&advance_input(&inst.id, "clerk-01", Some("closed")))
        .await;
    assert!(matches!(
        illegal,
        Err(AdvanceStepError::IllegalTransition { ref from, ref to }) if from == "intake" && to == "closed"
    ));
    assert_eq!(reload(&h, &inst.id).await, inst);

    complete_sub_task(&h, &inst, "photos-uploaded").await;
    let out = h
        .engine
        .advance_step_uc
        .execute(&advance_input(&inst.id, "clerk-01", Some("diagnosis")))
        .await
        .unwrap();
    assert_eq!(out.instance.current_step_key.as_deref(), Some("diagnosis"));
    assert_eq!(out.instance.open_execution_count(), 1);
    assert_eq!(out.instance.executions[0].status, ExecutionStatus::Completed);
    assert_eq!(
        out.instance.open_execution().unwrap().assignee_id.as_deref(),
        Some("tech-01")
    );

    h.engine
        .advance_step_uc
        .execute(&advance_input(&inst.id, "tech-01", Some("quotation")))
        .await
        .unwrap();
    h.engine
        .advance_step_uc
        .execute(&advance_input(&inst.id, "est-01", Some("rejected")))
        .await
        .unwrap();
    h.engine
        .advance_step_uc
        .execute(&advance_input(&inst.id, "clerk-01", Some("closed")))
        .await
        .unwrap();
    let done = h
        .engine
        .advance_step_uc
        .execute(&advance_input(&inst.id, "clerk-01", None))
        .await
        .unwrap();

    assert_eq!(done.instance.status, InstanceStatus::Completed);
    assert_eq!(done.instance.open_execution_count(), 0);
    assert!(done.instance.current_step_key.is_none());
    assert_eq!(done.records[0].kind, TransitionKind::Completed);

    // 履歴を再生すると current_step_key の推移が復元できる
    let history = h
        .engine
        .get_history_uc
        .execute(&GetHistoryInput {
            instance_id: inst.id.clone(),
        })
        .await
        .unwrap();
    let replayed = replay_step_keys(&history);
    let expected: Vec<Option<String>> = vec![
        Some("intake".to_string()),
        Some("diagnosis".to_string()),
        Some("quotation".to_string()),
        Some("rejected".to_string()),
        Some("closed".to_string()),
        None,
    ];
    assert_eq!(replayed, expected);

    let sequences: Vec<u64> = history.iter().map(|r| r.sequence).collect();
    assert_eq!(sequences, (1..=6).collect::<Vec<u64>>());
}

#[tokio::test]
async fn test_advance_by_non_assignee_is_rejected() {
    let h = setup().await;
    let inst = create(&h, "claim-001", "warranty-repair").await;
    complete_sub_task(&h, &inst, "photos-uploaded").await;

    let result = h
        .engine
        .advance_step_uc
        .execute(&advance_input(&inst.id, "tech-01", Some("diagnosis")))
        .await;
    assert!(matches!(result, Err(AdvanceStepError::NotAuthorized(_))));

    // 上書き権限を持つアクターは担当者でなくても進められる
    let out = h
        .engine
        .advance_step_uc
        .execute(&advance_input(&inst.id, "supervisor-001", Some("diagnosis")))
        .await
        .unwrap();
    assert_eq!(out.records[0].actor_id, "supervisor-001");
}

// ---------------------------------------------------------------------------
// シナリオ B: SLA 超過の検出と冪等性
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_scenario_b_sla_breach_is_escalated_once() {
    let h = setup().await;
    let inst = create(&h, "claim-001", "warranty-repair").await;
    advance_to_quotation(&h, &inst).await;

    let opened_at = reload(&h, &inst.id).await.open_execution().unwrap().opened_at;

    let first = h
        .engine
        .check_sla_breaches_uc
        .execute(opened_at + Duration::hours(49))
        .await
        .unwrap();
    assert_eq!(first.escalated, vec![inst.id.clone()]);

    let breached = reload(&h, &inst.id).await;
    let exec = breached.open_execution().unwrap();
    assert_eq!(exec.step_key, "quotation");
    assert!(exec.sla_breached);

    let second = h
        .engine
        .check_sla_breaches_uc
        .execute(opened_at + Duration::hours(50))
        .await
        .unwrap();
    assert!(second.escalated.is_empty());

    let escalations = h.dispatcher.of_kind(EventKind::Escalation).await;
    assert_eq!(escalations.len(), 1);
    assert_eq!(escalations[0].step_key.as_deref(), Some("quotation"));
    assert_eq!(escalations[0].recipients, vec!["est-01".to_string()]);

    // SLA 超過はマーカーであり current_step_key は変わらない
    let history = h
        .engine
        .get_history_uc
        .execute(&GetHistoryInput {
            instance_id: inst.id.clone(),
        })
        .await
        .unwrap();
    let breaches: Vec<_> = history
        .iter()
        .filter(|r| r.kind == TransitionKind::SlaBreach)
        .collect();
    assert_eq!(breaches.len(), 1);
    assert_eq!(breaches[0].actor_id, "system:sla-monitor");
    assert_eq!(breached.current_step_key.as_deref(), Some("quotation"));
}

#[tokio::test]
async fn test_sla_not_breached_before_deadline() {
    let h = setup().await;
    let inst = create(&h, "claim-001", "warranty-repair").await;
    advance_to_quotation(&h, &inst).await;

    let out = h
        .engine
        .check_sla_breaches_uc
        .execute(Utc::now() + Duration::hours(47))
        .await
        .unwrap();
    assert!(out.escalated.is_empty());
    assert!(h.dispatcher.of_kind(EventKind::Escalation).await.is_empty());
}

// ---------------------------------------------------------------------------
// シナリオ C: 楽観的排他制御
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_scenario_c_concurrent_advance_with_stale_version() {
    let h = setup().await;
    let inst = create(&h, "claim-001", "warranty-repair").await;
    complete_sub_task(&h, &inst, "photos-uploaded").await;
    let read = reload(&h, &inst.id).await;

    let pinned = |actor: &str| AdvanceStepInput {
        instance_id: inst.id.clone(),
        actor_id: actor.to_string(),
        target_step_key: Some("diagnosis".to_string()),
        expected_version: Some(read.version),
    };
    let first_input = pinned("clerk-01");
    let second_input = pinned("supervisor-001");

    let (first, second) = tokio::join!(
        h.engine.advance_step_uc.execute(&first_input),
        h.engine.advance_step_uc.execute(&second_input),
    );

    let results = [first, second];
    let successes = results.iter().filter(|r| r.is_ok()).count();
    let conflicts = results
        .iter()
        .filter(|r| matches!(r, Err(AdvanceStepError::ConcurrentModification(_))))
        .count();
    assert_eq!(successes, 1);
    assert_eq!(conflicts, 1);

    let after = reload(&h, &inst.id).await;
    assert_eq!(after.current_step_key.as_deref(), Some("diagnosis"));
    assert_eq!(after.executions.len(), 2);
    assert_eq!(after.open_execution_count(), 1);
}

// ---------------------------------------------------------------------------
// シナリオ D: 適格な担当者がいないステップ
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_scenario_d_no_eligible_assignee() {
    let h = setup().await;
    let out = h
        .engine
        .create_instance_uc
        .execute(&CreateInstanceInput {
            claim_id: "claim-009".to_string(),
            scope_id: "shop-osaka".to_string(),
            template_id: "inspection-flow".to_string(),
            template_version: None,
            actor_id: "clerk-01".to_string(),
        })
        .await
        .unwrap();

    assert_eq!(out.assignment, Assignment::NoEligibleAssignee);
    assert!(out.instance.open_execution().unwrap().assignee_id.is_none());

    let unassigned = h.dispatcher.of_kind(EventKind::Unassigned).await;
    assert_eq!(unassigned.len(), 1);
    assert_eq!(unassigned[0].step_key.as_deref(), Some("inspection"));
    assert!(unassigned[0].recipients.is_empty());
    assert_eq!(unassigned[0].detail.as_deref(), Some("no eligible assignee"));

    // 未割当のステップは上書き権限で進められる
    let advanced = h
        .engine
        .advance_step_uc
        .execute(&advance_input(&out.instance.id, "supervisor-001", Some("closed")))
        .await
        .unwrap();
    assert_eq!(advanced.instance.current_step_key.as_deref(), Some("closed"));
}

#[tokio::test]
async fn test_scenario_d_advance_into_unstaffed_step() {
    let h = setup().await;
    let inst = create(&h, "claim-011", "field-inspection").await;
    assert_eq!(
        inst.open_execution().unwrap().assignee_id.as_deref(),
        Some("clerk-01")
    );
    assert!(h.dispatcher.of_kind(EventKind::Unassigned).await.is_empty());

    let out = h
        .engine
        .advance_step_uc
        .execute(&advance_input(&inst.id, "clerk-01", Some("inspection")))
        .await
        .unwrap();

    assert_eq!(out.assignment, Some(Assignment::NoEligibleAssignee));
    assert_eq!(out.instance.current_step_key.as_deref(), Some("inspection"));
    let open = out.instance.open_execution().unwrap();
    assert_eq!(open.step_key, "inspection");
    assert!(open.assignee_id.is_none());
    assert!(open.sla_deadline.is_some());

    let unassigned = h.dispatcher.of_kind(EventKind::Unassigned).await;
    assert_eq!(unassigned.len(), 1);
    assert_eq!(unassigned[0].instance_id, inst.id);
    assert_eq!(unassigned[0].step_key.as_deref(), Some("inspection"));
    assert!(unassigned[0].recipients.is_empty());
    assert_eq!(unassigned[0].detail.as_deref(), Some("no eligible assignee"));

    let stored = reload(&h, &inst.id).await;
    assert!(stored.open_execution().unwrap().assignee_id.is_none());
}

#[tokio::test]
async fn test_force_reassign_then_assignee_advances() {
    let h = setup().await;
    let created = h
        .engine
        .create_instance_uc
        .execute(&CreateInstanceInput {
            claim_id: "claim-010".to_string(),
            scope_id: "shop-osaka".to_string(),
            template_id: "inspection-flow".to_string(),
            template_version: None,
            actor_id: "clerk-01".to_string(),
        })
        .await
        .unwrap()
        .instance;
    let execution_id = created.open_execution().unwrap().id.clone();

    let out = h
        .engine
        .force_reassign_uc
        .execute(&ForceReassignInput {
            execution_id,
            new_assignee_id: "insp-contractor".to_string(),
            actor_id: "supervisor-001".to_string(),
        })
        .await
        .unwrap();
    assert_eq!(out.record.kind, TransitionKind::Reassigned);

    let advanced = h
        .engine
        .advance_step_uc
        .execute(&advance_input(&created.id, "insp-contractor", Some("closed")))
        .await
        .unwrap();
    assert_eq!(advanced.instance.current_step_key.as_deref(), Some("closed"));
}

// ---------------------------------------------------------------------------
// 取り消し・サブタスク
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_cancel_closes_open_step_and_frees_claim() {
    let h = setup().await;
    let inst = create(&h, "claim-001", "warranty-repair").await;

    let cancelled = h
        .engine
        .cancel_instance_uc
        .execute(&CancelInstanceInput {
            instance_id: inst.id.clone(),
            actor_id: "clerk-01".to_string(),
            reason: Some("duplicate claim".to_string()),
        })
        .await
        .unwrap();
    assert_eq!(cancelled.status, InstanceStatus::Cancelled);
    assert_eq!(cancelled.open_execution_count(), 0);

    let history = h
        .engine
        .get_history_uc
        .execute(&GetHistoryInput {
            instance_id: inst.id.clone(),
        })
        .await
        .unwrap();
    let last = history.last().unwrap();
    assert_eq!(last.kind, TransitionKind::Cancelled);
    assert_eq!(last.reason, "duplicate claim");
    assert_eq!(last.from_step_key.as_deref(), Some("intake"));
    assert!(last.to_step_key.is_none());

    let again = h
        .engine
        .cancel_instance_uc
        .execute(&CancelInstanceInput {
            instance_id: inst.id.clone(),
            actor_id: "clerk-01".to_string(),
            reason: None,
        })
        .await;
    assert!(matches!(again, Err(CancelInstanceError::InstanceNotActive(_))));

    let advanced = h
        .engine
        .advance_step_uc
        .execute(&advance_input(&inst.id, "supervisor-001", Some("diagnosis")))
        .await;
    assert!(matches!(advanced, Err(AdvanceStepError::InstanceNotActive(_))));

    // 取り消し後は同じクレームで新しいインスタンスを作成できる
    let next = create(&h, "claim-001", "warranty-repair").await;
    assert_ne!(next.id, inst.id);
}

#[tokio::test]
async fn test_informational_sub_task_does_not_gate_advance() {
    let h = setup().await;
    let inst = create(&h, "claim-001", "warranty-repair").await;
    let execution_id = inst.open_execution().unwrap().id.clone();

    h.engine
        .add_sub_task_uc
        .execute(&AddSubTaskInput {
            execution_id: execution_id.clone(),
            key: "customer-callback".to_string(),
            label: None,
            actor_id: "clerk-01".to_string(),
        })
        .await
        .unwrap();
    complete_sub_task(&h, &inst, "photos-uploaded").await;

    let sub_tasks = h
        .engine
        .list_sub_tasks_uc
        .execute(&ListSubTasksInput {
            execution_id: execution_id.clone(),
        })
        .await
        .unwrap();
    assert_eq!(sub_tasks.len(), 2);

    let out = h
        .engine
        .advance_step_uc
        .execute(&advance_input(&inst.id, "clerk-01", Some("diagnosis")))
        .await
        .unwrap();
    assert_eq!(out.instance.current_step_key.as_deref(), Some("diagnosis"));
}
