use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::info;

use crate::infrastructure::config::DatabaseConfig;

/// connect は接続プールを作成し、設定に応じてマイグレーションを適用する。
/// DATABASE_URL が設定されている場合は設定ファイルの接続情報より優先する。
pub async fn connect(cfg: &DatabaseConfig) -> anyhow::Result<PgPool> {
    let url = std::env::var("DATABASE_URL").unwrap_or_else(|_| cfg.connection_url());
    info!(host = %cfg.host, name = %cfg.name, "connecting to database");

    let pool = PgPoolOptions::new()
        .max_connections(cfg.max_open_conns)
        .connect(&url)
        .await?;
    info!("database connection pool established");

    if cfg.run_migrations {
        sqlx::migrate!("../../../database/workflow-db/migrations")
            .run(&pool)
            .await?;
        info!("database migrations applied");
    }

    Ok(pool)
}
