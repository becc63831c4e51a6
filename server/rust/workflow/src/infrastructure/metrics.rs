use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};

/// WorkflowMetrics は通知配信の Prometheus メトリクスを保持する。
/// service ラベルは全メトリクスに定数ラベルとして付与する。
pub struct WorkflowMetrics {
    kafka_messages_produced_total: IntCounterVec,
    notification_failures_total: IntCounterVec,
    registry: Registry,
}

impl WorkflowMetrics {
    pub fn new(service_name: &str) -> anyhow::Result<Self> {
        let registry = Registry::new();

        let kafka_messages_produced_total = IntCounterVec::new(
            Opts::new(
                "kafka_messages_produced_total",
                "Total number of Kafka messages produced",
            )
            .const_label("service", service_name),
            &["topic", "kind"],
        )?;

        let notification_failures_total = IntCounterVec::new(
            Opts::new(
                "notification_failures_total",
                "Total number of workflow notifications that failed to publish",
            )
            .const_label("service", service_name),
            &["topic", "kind"],
        )?;

        registry.register(Box::new(kafka_messages_produced_total.clone()))?;
        registry.register(Box::new(notification_failures_total.clone()))?;

        Ok(Self {
            kafka_messages_produced_total,
            notification_failures_total,
            registry,
        })
    }

    pub fn record_kafka_message_produced(&self, topic: &str, kind: &str) {
        self.kafka_messages_produced_total
            .with_label_values(&[topic, kind])
            .inc();
    }

    pub fn record_notification_failure(&self, topic: &str, kind: &str) {
        self.notification_failures_total
            .with_label_values(&[topic, kind])
            .inc();
    }

    /// gather_metrics は Prometheus テキストフォーマットでメトリクスを返す。
    pub fn gather_metrics(&self) -> anyhow::Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}
