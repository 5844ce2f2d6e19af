use serde::{Deserialize, Serialize};

const DEFAULT_STORE_URL: &str = "sqlite://invoices.db";

/// 应用配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub store: StoreConfig,
    #[serde(default)]
    pub sync: SyncConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// 本地发票缓存 (SQLite)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    pub url: String,
    pub max_connections: u32,
}

impl StoreConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_connections: 5,
        }
    }

    /// 内存库: 每个连接各自一份数据, 连接池只能保留单连接
    pub fn is_memory(&self) -> bool {
        self.url.contains(":memory:") || self.url.contains("mode=memory")
    }
}

/// 规范化数据同步目标 (PostgreSQL), 未配置时同步接口不可用
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default)]
    pub database_url: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
            },
            store: StoreConfig::new(DEFAULT_STORE_URL),
            sync: SyncConfig::default(),
        }
    }
}

impl AppConfig {
    /// 从环境变量加载配置 (分层加载失败时的退路)
    pub fn from_env() -> Self {
        Self {
            server: ServerConfig {
                host: std::env::var("SERVER_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
                port: std::env::var("SERVER_PORT")
                    .ok()
                    .and_then(|p| p.parse().ok())
                    .unwrap_or(8080),
            },
            store: StoreConfig {
                url: std::env::var("STORE_URL").unwrap_or_else(|_| DEFAULT_STORE_URL.to_string()),
                max_connections: std::env::var("STORE_MAX_CONNECTIONS")
                    .ok()
                    .and_then(|n| n.parse().ok())
                    .unwrap_or(5),
            },
            sync: SyncConfig {
                database_url: std::env::var("SYNC_DATABASE_URL").ok().filter(|u| !u.is_empty()),
            },
        }
    }

    /// 分层加载: 默认值 -> invoice-ingest.toml (可选) -> INGEST__* 环境变量
    pub fn load() -> Result<Self, config::ConfigError> {
        Self::load_from("invoice-ingest")
    }

    pub fn load_from(file_stem: &str) -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080i64)?
            .set_default("store.url", DEFAULT_STORE_URL)?
            .set_default("store.max_connections", 5i64)?
            .add_source(config::File::with_name(file_stem).required(false))
            .add_source(
                config::Environment::with_prefix("INGEST")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}
