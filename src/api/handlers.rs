use crate::db::SyncReport;
use crate::error::IngestError;
use crate::models::{InvoiceRecord, MappedTables};
use crate::service::export::{export_file_name, ProcessSummary};
use crate::service::IngestService;
use axum::{
    extract::{Json, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use std::sync::Arc;

/// 通用响应体
#[derive(Debug, Serialize)]
pub struct ApiResponse {
    pub success: bool,
    pub message: String,
}

/// 错误响应体 (校验失败时包含全部错误)
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct InvoiceListResponse {
    pub success: bool,
    pub message: String,
    pub invoices: Vec<InvoiceRecord>,
}

#[derive(Debug, Serialize)]
pub struct IngestResponse {
    pub success: bool,
    pub message: String,
    pub added_count: usize,
    pub duplicate_count: usize,
}

#[derive(Debug, Serialize)]
pub struct TablesResponse {
    pub success: bool,
    pub message: String,
    pub tables: MappedTables,
}

#[derive(Debug, Serialize)]
pub struct SummaryResponse {
    pub success: bool,
    pub message: String,
    pub summary: ProcessSummary,
}

#[derive(Debug, Serialize)]
pub struct SyncResponse {
    pub success: bool,
    pub message: String,
    pub report: SyncReport,
}

/// 错误 -> HTTP 状态码
fn error_response(e: IngestError) -> Response {
    let status = match &e {
        IngestError::NotFound(_) => StatusCode::NOT_FOUND,
        IngestError::Decode(_)
        | IngestError::Validation(_)
        | IngestError::InvalidInvoiceNumber(_)
        | IngestError::InvalidQuantity(_) => StatusCode::UNPROCESSABLE_ENTITY,
        IngestError::Extraction(_) | IngestError::Analysis(_) => StatusCode::BAD_GATEWAY,
        IngestError::SyncDisabled => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        tracing::error!("Request failed: {}", e);
    }

    let message = format!("Error: {}", e);
    let errors = match e {
        IngestError::Validation(errors) => errors,
        _ => Vec::new(),
    };
    let response = ErrorResponse {
        success: false,
        message,
        errors,
    };
    (status, Json(response)).into_response()
}

fn csv_attachment(file_name: &str, body: String) -> Response {
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", file_name),
            ),
        ],
        body,
    )
        .into_response()
}

/// 健康检查
pub async fn health_check() -> &'static str {
    "OK"
}

/// 发票历史
pub async fn list_invoices(State(service): State<Arc<IngestService>>) -> Response {
    match service.list().await {
        Ok(invoices) => {
            let response = InvoiceListResponse {
                success: true,
                message: format!("{} invoice(s) stored", invoices.len()),
                invoices,
            };
            (StatusCode::OK, Json(response)).into_response()
        }
        Err(e) => error_response(e),
    }
}

/// 写入抽取协作方返回的发票数组 (原始 JSON 请求体)
pub async fn add_invoices(State(service): State<Arc<IngestService>>, body: String) -> Response {
    match service.ingest_extraction_payload(&body).await {
        Ok(outcome) => {
            let response = IngestResponse {
                success: true,
                message: outcome.message(),
                added_count: outcome.added_count,
                duplicate_count: outcome.duplicate_count,
            };
            (StatusCode::OK, Json(response)).into_response()
        }
        Err(e) => error_response(e),
    }
}

pub async fn delete_invoice(
    State(service): State<Arc<IngestService>>,
    Path(id): Path<i64>,
) -> Response {
    match service.delete(id).await {
        Ok(()) => {
            let response = ApiResponse {
                success: true,
                message: format!("Invoice {} deleted", id),
            };
            (StatusCode::OK, Json(response)).into_response()
        }
        Err(e) => error_response(e),
    }
}

pub async fn clear_invoices(State(service): State<Arc<IngestService>>) -> Response {
    match service.clear().await {
        Ok(()) => {
            let response = ApiResponse {
                success: true,
                message: "Invoice history cleared".to_string(),
            };
            (StatusCode::OK, Json(response)).into_response()
        }
        Err(e) => error_response(e),
    }
}

/// 规范化四张表 (已校验)
pub async fn mapped_tables(State(service): State<Arc<IngestService>>) -> Response {
    match service.build_tables().await {
        Ok(tables) => {
            let response = TablesResponse {
                success: true,
                message: format!(
                    "{} customers, {} products, {} sales, {} details",
                    tables.clientes.len(),
                    tables.productos.len(),
                    tables.ventas.len(),
                    tables.detalle_ventas.len()
                ),
                tables,
            };
            (StatusCode::OK, Json(response)).into_response()
        }
        Err(e) => error_response(e),
    }
}

/// 分段 CSV 导出
pub async fn export_tables(State(service): State<Arc<IngestService>>) -> Response {
    match service.export_csv().await {
        Ok(body) => {
            let file_name = export_file_name(chrono::Local::now().date_naive());
            csv_attachment(&file_name, body)
        }
        Err(e) => error_response(e),
    }
}

/// 发票历史平铺导出
pub async fn export_history(State(service): State<Arc<IngestService>>) -> Response {
    match service.export_history_csv().await {
        Ok(body) => csv_attachment("historial_facturas.csv", body),
        Err(e) => error_response(e),
    }
}

pub async fn summary(State(service): State<Arc<IngestService>>) -> Response {
    match service.summary().await {
        Ok(summary) => {
            let response = SummaryResponse {
                success: true,
                message: summary.to_string(),
                summary,
            };
            (StatusCode::OK, Json(response)).into_response()
        }
        Err(e) => error_response(e),
    }
}

/// 同步到 PostgreSQL
pub async fn sync_tables(State(service): State<Arc<IngestService>>) -> Response {
    match service.sync().await {
        Ok(report) => {
            let response = SyncResponse {
                success: true,
                message: format!(
                    "Synced {} customers, {} products, {} sales, {} details",
                    report.clientes, report.productos, report.ventas, report.detalle_ventas
                ),
                report,
            };
            (StatusCode::OK, Json(response)).into_response()
        }
        Err(e) => error_response(e),
    }
}
