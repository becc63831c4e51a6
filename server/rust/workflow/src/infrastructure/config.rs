use std::collections::HashMap;

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

/// Application configuration for the claim workflow worker.
#[derive(Debug, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    #[serde(default)]
    pub log: LogConfig,
    #[serde(default)]
    pub database: Option<DatabaseConfig>,
    #[serde(default)]
    pub kafka: Option<KafkaConfig>,
    #[serde(default)]
    pub sla_monitor: SlaMonitorConfig,
    #[serde(default)]
    pub concurrency: ConcurrencyConfig,
    #[serde(default)]
    pub templates: TemplatesConfig,
    #[serde(default)]
    pub directory: DirectoryConfig,
}

impl Config {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> anyhow::Result<Self> {
        let cfg: Config = serde_yaml::from_str(content)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// 設定値のバリデーション。
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.app.name.is_empty() {
            anyhow::bail!("app.name is required");
        }
        if self.sla_monitor.interval_secs == 0 {
            anyhow::bail!("sla_monitor.interval_secs must be > 0");
        }
        if self.sla_monitor.actor_id.is_empty() {
            anyhow::bail!("sla_monitor.actor_id is required");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub name: String,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default = "default_environment")]
    pub environment: String,
}

fn default_version() -> String {
    "0.1.0".to_string()
}

fn default_environment() -> String {
    "dev".to_string()
}

/// LogConfig はログ出力の設定を表す。format が "text" 以外なら JSON で出力する。
#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

/// DatabaseConfig はデータベース接続の設定を表す。
#[derive(Debug, Deserialize)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub name: String,
    pub user: String,
    #[serde(default = "default_password")]
    pub password: SecretString,
    #[serde(default = "default_ssl_mode")]
    pub ssl_mode: String,
    #[serde(default = "default_max_open_conns")]
    pub max_open_conns: u32,
    #[serde(default = "default_run_migrations")]
    pub run_migrations: bool,
}

fn default_password() -> SecretString {
    SecretString::new(String::new())
}

fn default_ssl_mode() -> String {
    "disable".to_string()
}

fn default_max_open_conns() -> u32 {
    25
}

fn default_run_migrations() -> bool {
    true
}

impl DatabaseConfig {
    /// PostgreSQL 接続 URL を生成する。
    pub fn connection_url(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}?sslmode={}",
            self.user,
            self.password.expose_secret(),
            self.host,
            self.port,
            self.name,
            self.ssl_mode
        )
    }
}

/// KafkaConfig は Kafka ブローカー接続の設定を表す。
#[derive(Debug, Clone, Deserialize)]
pub struct KafkaConfig {
    pub brokers: Vec<String>,
    #[serde(default = "default_security_protocol")]
    pub security_protocol: String,
    /// Producer topic: 遷移・エスカレーション・未割当の通知依頼
    #[serde(default = "default_notification_topic")]
    pub notification_topic: String,
}

fn default_security_protocol() -> String {
    "PLAINTEXT".to_string()
}

fn default_notification_topic() -> String {
    "claimflow.workflow.notification.v1".to_string()
}

/// SlaMonitorConfig は SLA 監視ループの設定を表す。
#[derive(Debug, Clone, Deserialize)]
pub struct SlaMonitorConfig {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    /// SLA 超過レコードに記録するアクター ID。
    #[serde(default = "default_monitor_actor_id")]
    pub actor_id: String,
}

impl Default for SlaMonitorConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            actor_id: default_monitor_actor_id(),
        }
    }
}

fn default_interval_secs() -> u64 {
    60
}

fn default_monitor_actor_id() -> String {
    "system:sla-monitor".to_string()
}

/// ConcurrencyConfig は楽観的排他の競合時リトライの設定を表す。
#[derive(Debug, Clone, Deserialize)]
pub struct ConcurrencyConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
            multiplier: default_multiplier(),
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay_ms() -> u64 {
    10
}

fn default_multiplier() -> f64 {
    2.0
}

#[derive(Debug, Clone, Deserialize)]
pub struct TemplatesConfig {
    #[serde(default = "default_templates_dir")]
    pub dir: String,
}

impl Default for TemplatesConfig {
    fn default() -> Self {
        Self {
            dir: default_templates_dir(),
        }
    }
}

fn default_templates_dir() -> String {
    "templates".to_string()
}

/// DirectoryConfig は設定ファイルで定義する静的ユーザーディレクトリ。
/// roles は role → scope → user ID 一覧の対応を持つ。scope "*" は全スコープに一致する。
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DirectoryConfig {
    #[serde(default)]
    pub roles: HashMap<String, HashMap<String, Vec<String>>>,
    #[serde(default)]
    pub override_users: Vec<String>,
}
