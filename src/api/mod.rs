pub mod handlers;

pub use handlers::*;

use crate::service::IngestService;
use axum::{
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;

/// 构建路由
pub fn create_router(service: Arc<IngestService>) -> Router {
    let invoice_routes = Router::new()
        .route(
            "/api/invoices",
            get(list_invoices).post(add_invoices).delete(clear_invoices),
        )
        .route("/api/invoices/:id", delete(delete_invoice))
        .route("/api/invoices/export", get(export_history))
        .route("/api/tables", get(mapped_tables))
        .route("/api/export", get(export_tables))
        .route("/api/summary", get(summary))
        .route("/api/sync", post(sync_tables))
        .with_state(service);

    Router::new()
        .route("/health", get(health_check))
        .merge(invoice_routes)
}
