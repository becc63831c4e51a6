use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use claimflow_workflow_server::adapter::repository::{
    InMemoryWorkflowInstanceRepository, InMemoryWorkflowTemplateRepository,
    InstancePostgresRepository, TemplatePostgresRepository,
};
use claimflow_workflow_server::domain::entity::workflow_template::WorkflowTemplate;
use claimflow_workflow_server::domain::repository::{
    WorkflowInstanceRepository, WorkflowTemplateRepository,
};
use claimflow_workflow_server::domain::service::AssignmentResolver;
use claimflow_workflow_server::engine::{EngineDeps, WorkflowEngine};
use claimflow_workflow_server::infrastructure::config::Config;
use claimflow_workflow_server::infrastructure::kafka_producer::{
    KafkaNotificationDispatcher, NoopNotificationDispatcher, NotificationDispatcher,
};
use claimflow_workflow_server::infrastructure::metrics::WorkflowMetrics;
use claimflow_workflow_server::infrastructure::sla_scheduler::SlaScheduler;
use claimflow_workflow_server::infrastructure::template_loader::TemplateLoader;
use claimflow_workflow_server::infrastructure::user_directory::ConfigUserDirectory;
use claimflow_workflow_server::infrastructure::{database, telemetry};
use claimflow_workflow_server::usecase::get_template::{GetTemplateError, GetTemplateInput};
use claimflow_workflow_server::usecase::publish_template::PublishTemplateInput;
use claimflow_workflow_server::usecase::ConflictRetryPolicy;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Config
    let config_path =
        std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config/config.yaml".to_string());
    let cfg = Config::load(&config_path)?;

    // Logging
    telemetry::init_logger(&cfg.log)?;

    info!(
        app_name = %cfg.app.name,
        version = %cfg.app.version,
        environment = %cfg.app.environment,
        "starting claim workflow worker"
    );

    // Repositories
    let (template_repo, instance_repo): (
        Arc<dyn WorkflowTemplateRepository>,
        Arc<dyn WorkflowInstanceRepository>,
    ) = if let Some(ref db_config) = cfg.database {
        let pool = Arc::new(database::connect(db_config).await?);
        (
            Arc::new(TemplatePostgresRepository::new(pool.clone())),
            Arc::new(InstancePostgresRepository::new(pool)),
        )
    } else {
        info!("no database configured, using in-memory repositories");
        (
            Arc::new(InMemoryWorkflowTemplateRepository::new()),
            Arc::new(InMemoryWorkflowInstanceRepository::new()),
        )
    };

    // Metrics
    let metrics = Arc::new(WorkflowMetrics::new(&cfg.app.name)?);

    // Notification dispatcher (optional)
    let dispatcher: Arc<dyn NotificationDispatcher> = if let Some(ref kafka_config) = cfg.kafka {
        match KafkaNotificationDispatcher::new(kafka_config) {
            Ok(producer) => {
                info!(topic = %producer.topic(), "kafka notification dispatcher initialized");
                Arc::new(producer.with_metrics(metrics.clone()))
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to create kafka producer, notifications will be dropped");
                Arc::new(NoopNotificationDispatcher)
            }
        }
    } else {
        info!("no kafka configured, notifications will be dropped");
        Arc::new(NoopNotificationDispatcher)
    };

    let resolver = Arc::new(AssignmentResolver::new(Arc::new(ConfigUserDirectory::new(
        &cfg.directory,
    ))));

    let engine = WorkflowEngine::new(EngineDeps {
        template_repo,
        instance_repo,
        resolver,
        dispatcher: dispatcher.clone(),
        retry: ConflictRetryPolicy::from_config(&cfg.concurrency),
        sla_actor_id: cfg.sla_monitor.actor_id.clone(),
    });

    // Templates
    let loader = TemplateLoader::new(&cfg.templates.dir);
    let templates = loader.load_all().await?;
    let published = publish_changed_templates(&engine, templates).await?;
    info!(count = published, dir = %cfg.templates.dir, "workflow templates synchronized");

    // SLA monitor
    let scheduler = SlaScheduler::new(
        engine.check_sla_breaches_uc.clone(),
        Duration::from_secs(cfg.sla_monitor.interval_secs),
    );
    let handle = scheduler.start();

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");

    scheduler.stop();
    handle.await?;
    dispatcher.close().await?;

    match metrics.gather_metrics() {
        Ok(snapshot) => tracing::debug!(metrics = %snapshot, "final metrics snapshot"),
        Err(e) => tracing::warn!(error = %e, "failed to gather metrics"),
    }

    info!("claim workflow worker stopped");
    Ok(())
}

/// 読み込んだテンプレートのうち、最新版と内容が異なるものだけを新しいバージョンとして公開する。
async fn publish_changed_templates(
    engine: &WorkflowEngine,
    templates: Vec<WorkflowTemplate>,
) -> anyhow::Result<usize> {
    let mut published = 0;
    for template in templates {
        let latest = match engine
            .get_template_uc
            .execute(&GetTemplateInput {
                id: template.id.clone(),
                version: None,
            })
            .await
        {
            Ok(latest) => Some(latest),
            Err(GetTemplateError::NotFound(_)) => None,
            Err(e) => return Err(e.into()),
        };

        let unchanged = latest.is_some_and(|l| {
            l.name == template.name
                && l.description == template.description
                && l.steps == template.steps
        });
        if unchanged {
            continue;
        }

        let input = PublishTemplateInput::from(template);
        engine.publish_template_uc.execute(&input).await?;
        published += 1;
    }
    Ok(published)
}
