use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::entity::workflow_instance::WorkflowInstance;
use crate::infrastructure::metrics::WorkflowMetrics;

/// EventKind は通知イベントの種別を表す。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    Transition,
    Escalation,
    Unassigned,
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Transition => write!(f, "TRANSITION"),
            Self::Escalation => write!(f, "ESCALATION"),
            Self::Unassigned => write!(f, "UNASSIGNED"),
        }
    }
}

/// WorkflowEvent は通知ディスパッチャーへ渡すイベント。
/// 配信手段と最終的な宛先ポリシーはディスパッチャー側の責務。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowEvent {
    pub kind: EventKind,
    pub instance_id: String,
    pub claim_id: String,
    pub step_key: Option<String>,
    pub recipients: Vec<String>,
    #[serde(default)]
    pub detail: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

impl WorkflowEvent {
    fn for_instance(
        kind: EventKind,
        instance: &WorkflowInstance,
        step_key: Option<String>,
        recipients: Vec<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            kind,
            instance_id: instance.id.clone(),
            claim_id: instance.claim_id.clone(),
            step_key,
            recipients,
            detail: None,
            occurred_at: now,
        }
    }

    /// 遷移後の状態を通知する。宛先は新しいステップの担当者。
    pub fn transition(instance: &WorkflowInstance, now: DateTime<Utc>) -> Self {
        let recipients = instance
            .open_execution()
            .and_then(|e| e.assignee_id.clone())
            .into_iter()
            .collect();
        Self::for_instance(
            EventKind::Transition,
            instance,
            instance.current_step_key.clone(),
            recipients,
            now,
        )
    }

    pub fn escalation(
        instance: &WorkflowInstance,
        step_key: &str,
        recipients: Vec<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self::for_instance(
            EventKind::Escalation,
            instance,
            Some(step_key.to_string()),
            recipients,
            now,
        )
    }

    /// 担当者が決まらなかったステップを通知する。宛先は候補者一覧（0人なら空）。
    pub fn unassigned(
        instance: &WorkflowInstance,
        step_key: &str,
        eligible: Vec<String>,
        now: DateTime<Utc>,
    ) -> Self {
        let mut event = Self::for_instance(
            EventKind::Unassigned,
            instance,
            Some(step_key.to_string()),
            eligible,
            now,
        );
        if event.recipients.is_empty() {
            event.detail = Some("no eligible assignee".to_string());
        }
        event
    }
}

/// NotificationDispatcher は遷移・エスカレーション・未割当イベントの配信を担う。
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    async fn notify(&self, event: &WorkflowEvent) -> anyhow::Result<()>;
    async fn close(&self) -> anyhow::Result<()>;
}

/// NoopNotificationDispatcher は何も配信しないディスパッチャー（InMemory / テスト用）。
pub struct NoopNotificationDispatcher;

#[async_trait]
impl NotificationDispatcher for NoopNotificationDispatcher {
    async fn notify(&self, _event: &WorkflowEvent) -> anyhow::Result<()> {
        Ok(())
    }

    async fn close(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

/// KafkaNotificationDispatcher は rdkafka FutureProducer を使った実装。
/// メッセージキーはインスタンス ID とし、同一インスタンスのイベント順序を保つ。
pub struct KafkaNotificationDispatcher {
    producer: rdkafka::producer::FutureProducer,
    topic: String,
    metrics: Option<std::sync::Arc<WorkflowMetrics>>,
}

impl KafkaNotificationDispatcher {
    pub fn new(config: &crate::infrastructure::config::KafkaConfig) -> anyhow::Result<Self> {
        use rdkafka::config::ClientConfig;

        let mut client_config = ClientConfig::new();
        client_config.set("bootstrap.servers", config.brokers.join(","));
        client_config.set("security.protocol", &config.security_protocol);
        client_config.set("acks", "all");
        client_config.set("message.timeout.ms", "5000");

        let producer: rdkafka::producer::FutureProducer = client_config.create()?;

        Ok(Self {
            producer,
            topic: config.notification_topic.clone(),
            metrics: None,
        })
    }

    pub fn with_metrics(mut self, metrics: std::sync::Arc<WorkflowMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }
}

#[async_trait]
impl NotificationDispatcher for KafkaNotificationDispatcher {
    async fn notify(&self, event: &WorkflowEvent) -> anyhow::Result<()> {
        use rdkafka::producer::FutureRecord;
        use std::time::Duration;

        let payload = serde_json::to_vec(event)?;
        let key = format!("instance:{}", event.instance_id);
        let record = FutureRecord::to(&self.topic).key(&key).payload(&payload);

        let kind = event.kind.to_string();
        if let Err((err, _)) = self.producer.send(record, Duration::from_secs(5)).await {
            if let Some(ref m) = self.metrics {
                m.record_notification_failure(&self.topic, &kind);
            }
            return Err(anyhow::anyhow!("failed to publish {} event: {}", kind, err));
        }

        if let Some(ref m) = self.metrics {
            m.record_kafka_message_produced(&self.topic, &kind);
        }

        Ok(())
    }

    async fn close(&self) -> anyhow::Result<()> {
        use rdkafka::producer::Producer;
        self.producer.flush(std::time::Duration::from_secs(5))?;
        Ok(())
    }
}
