use crate::config::StoreConfig;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{ConnectOptions, PgPool, SqlitePool};
use std::str::FromStr;
use std::time::Duration;

/// 创建本地发票缓存连接池 (SQLite)
pub async fn create_store_pool(config: &StoreConfig) -> Result<SqlitePool, sqlx::Error> {
    let connect_options = SqliteConnectOptions::from_str(&config.url)?
        .create_if_missing(true)
        .log_slow_statements(tracing::log::LevelFilter::Warn, Duration::from_secs(1));

    let options = SqlitePoolOptions::new().acquire_timeout(Duration::from_secs(10));

    // 内存库的数据随连接销毁, 固定单连接且不回收
    let options = if config.is_memory() {
        options.max_connections(1).idle_timeout(None).max_lifetime(None)
    } else {
        options.max_connections(config.max_connections.max(1))
    };

    options.connect_with(connect_options).await
}

/// 创建同步目标连接池 (PostgreSQL)
pub async fn create_sync_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    let mut connect_options = PgConnectOptions::from_str(database_url)?;

    // 设置慢查询日志阈值为 5秒
    connect_options = connect_options.log_slow_statements(
        tracing::log::LevelFilter::Warn,
        Duration::from_secs(5)
    );

    PgPoolOptions::new()
        .max_connections(5)
        .acquire_timeout(Duration::from_secs(10))
        .connect_with(connect_options)
        .await
}
