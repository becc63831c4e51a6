pub mod config;
pub mod database;
pub mod kafka_producer;
pub mod metrics;
pub mod sla_scheduler;
pub mod telemetry;
pub mod template_loader;
pub mod user_directory;
