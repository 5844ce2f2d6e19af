use invoice_ingest::db::{create_sync_pool, global_store};
use invoice_ingest::{create_router, AppConfig, IngestService};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::fmt::time::ChronoLocal;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 初始化日志 - 使用本地时间格式
    tracing_subscriber::fmt()
        .with_timer(ChronoLocal::new("%Y-%m-%d %H:%M:%S".to_string()))
        .with_target(true)
        .with_level(true)
        .init();

    // 加载配置: 默认值 -> invoice-ingest.toml -> INGEST__* 环境变量, 失败时退回普通环境变量
    let config = AppConfig::load().unwrap_or_else(|e| {
        warn!("Layered config failed ({}), falling back to environment variables", e);
        AppConfig::from_env()
    });
    info!("Starting server with config: {:?}", config);

    // 打开本地发票缓存
    let store = global_store(&config.store).await?;
    let mut service = IngestService::new(store);

    // 可选: 同步目标数据库
    if let Some(url) = &config.sync.database_url {
        let pool = create_sync_pool(url).await?;
        info!("Sync database pool created");
        service = service.with_sync_pool(pool);
    }

    let app = create_router(Arc::new(service));

    // 启动服务器
    let addr = format!("{}:{}", config.server.host, config.server.port);
    info!("Server listening on {}", addr);
    info!("API Endpoints:");
    info!("  GET/POST/DELETE /api/invoices   - invoice history");
    info!("  DELETE /api/invoices/:id        - delete one invoice");
    info!("  GET  /api/tables                - normalized tables");
    info!("  GET  /api/export                - sectioned CSV export");
    info!("  GET  /api/summary               - processing summary");
    info!("  POST /api/sync                  - sync tables to PostgreSQL");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
