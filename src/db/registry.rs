//! 进程级发票存储句柄: 首次使用时初始化, 测试可显式拆除.

use crate::config::StoreConfig;
use crate::db::store::InvoiceStore;
use crate::error::Result;
use std::sync::OnceLock;
use tokio::sync::Mutex;

static GLOBAL_STORE: OnceLock<Mutex<Option<InvoiceStore>>> = OnceLock::new();

fn slot() -> &'static Mutex<Option<InvoiceStore>> {
    GLOBAL_STORE.get_or_init(|| Mutex::new(None))
}

/// 获取全局存储, 未初始化时按配置打开
pub async fn global_store(config: &StoreConfig) -> Result<InvoiceStore> {
    let mut guard = slot().lock().await;
    if let Some(store) = guard.as_ref() {
        return Ok(store.clone());
    }

    let store = InvoiceStore::open(config).await?;
    tracing::info!("Invoice store opened at {}", config.url);
    *guard = Some(store.clone());
    Ok(store)
}

/// 替换全局存储, 返回原句柄
pub async fn install_global_store(store: InvoiceStore) -> Option<InvoiceStore> {
    slot().lock().await.replace(store)
}

/// 关闭并移除全局存储, 下一次 `global_store` 会重新打开
pub async fn reset_global_store() {
    let previous = slot().lock().await.take();
    if let Some(store) = previous {
        store.close().await;
        tracing::debug!("Global invoice store reset");
    }
}
