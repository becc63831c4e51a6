use chrono::{DateTime, Utc};
use tracing::warn;

use crate::domain::entity::workflow_instance::WorkflowInstance;
use crate::domain::service::Assignment;
use crate::infrastructure::kafka_producer::{NotificationDispatcher, WorkflowEvent};

/// 担当者が決まらなかった場合の通知イベントを返す。割り当て済みなら空。
pub(crate) fn assignment_events(
    instance: &WorkflowInstance,
    step_key: &str,
    assignment: &Assignment,
    now: DateTime<Utc>,
) -> Vec<WorkflowEvent> {
    match assignment {
        Assignment::Assigned(_) => Vec::new(),
        Assignment::Unassigned { eligible } => vec![WorkflowEvent::unassigned(
            instance,
            step_key,
            eligible.clone(),
            now,
        )],
        Assignment::NoEligibleAssignee => {
            vec![WorkflowEvent::unassigned(instance, step_key, Vec::new(), now)]
        }
    }
}

/// 保存済みの変更に対するイベントを配信する。配信失敗は警告ログのみで、操作は失敗させない。
pub(crate) async fn dispatch_all(dispatcher: &dyn NotificationDispatcher, events: &[WorkflowEvent]) {
    for event in events {
        if let Err(e) = dispatcher.notify(event).await {
            warn!(
                instance_id = %event.instance_id,
                kind = %event.kind,
                error = %e,
                "failed to dispatch workflow event"
            );
        }
    }
}
