//! 统一错误类型

use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    /// 读取上传文件失败
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// 非去重类的存储错误, 整批回滚
    #[error("storage error: {0}")]
    Store(#[from] sqlx::Error),

    #[error("invoice {0} not found")]
    NotFound(i64),

    /// 外部协作方返回的数据不符合发票 schema
    #[error("malformed extraction payload: {0}")]
    Decode(String),

    #[error("extraction failed: {0}")]
    Extraction(String),

    #[error("analysis failed: {0}")]
    Analysis(String),

    /// 规范化数据校验失败, 包含全部违反的规则
    #[error("validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),

    #[error("invoice number is not numeric: {0:?}")]
    InvalidInvoiceNumber(String),

    #[error("quantity cannot be represented as whole units: {0}")]
    InvalidQuantity(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("sync database is not configured")]
    SyncDisabled,
}

impl From<serde_json::Error> for IngestError {
    fn from(e: serde_json::Error) -> Self {
        IngestError::Decode(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, IngestError>;
