use crate::db::{sync_tables, InvoiceStore, SyncReport};
use crate::error::{IngestError, Result};
use crate::models::{InsertOutcome, InvoiceRecord, MappedTables};
use crate::service::assistant::{decode_extraction_response, GenerativeModel, InvoiceAssistant};
use crate::service::export::{self, ProcessSummary};
use crate::service::mapper::map_invoices;
use crate::service::validator::validate_tables;
use sqlx::PgPool;
use std::path::Path;

/// 发票导入服务: 每个用户操作对应一次显式的请求/响应调用
#[derive(Debug, Clone)]
pub struct IngestService {
    store: InvoiceStore,
    sync_pool: Option<PgPool>,
}

impl IngestService {
    pub fn new(store: InvoiceStore) -> Self {
        Self { store, sync_pool: None }
    }

    pub fn with_sync_pool(mut self, pool: PgPool) -> Self {
        self.sync_pool = Some(pool);
        self
    }

    pub fn store(&self) -> &InvoiceStore {
        &self.store
    }

    pub fn sync_enabled(&self) -> bool {
        self.sync_pool.is_some()
    }

    /// 写入已抽取的发票, 重复发票计数跳过
    pub async fn ingest_records(&self, records: &[InvoiceRecord]) -> Result<InsertOutcome> {
        self.store.add_invoices(records).await
    }

    /// 写入抽取协作方返回的原始 JSON
    pub async fn ingest_extraction_payload(&self, payload: &str) -> Result<InsertOutcome> {
        let records = decode_extraction_response(payload)?;
        self.ingest_records(&records).await
    }

    /// XML -> AI 抽取 -> 写入
    pub async fn ingest_xml<M: GenerativeModel>(
        &self,
        assistant: &InvoiceAssistant<M>,
        xml: &str,
    ) -> Result<InsertOutcome> {
        let records = assistant.extract(xml).await?;
        self.ingest_records(&records).await
    }

    pub async fn ingest_xml_file<M: GenerativeModel>(
        &self,
        assistant: &InvoiceAssistant<M>,
        path: &Path,
    ) -> Result<InsertOutcome> {
        let xml = tokio::fs::read_to_string(path).await.map_err(|e| {
            tracing::error!("Failed to read {}: {}", path.display(), e);
            IngestError::Io(e)
        })?;
        tracing::info!("Processing {} ({} bytes)", path.display(), xml.len());
        self.ingest_xml(assistant, &xml).await
    }

    pub async fn list(&self) -> Result<Vec<InvoiceRecord>> {
        self.store.list_invoices().await
    }

    pub async fn delete(&self, id: i64) -> Result<()> {
        self.store.delete_invoice(id).await
    }

    pub async fn clear(&self) -> Result<()> {
        self.store.clear_invoices().await
    }

    /// 读取全部发票 -> 映射 -> 校验; 校验失败时丢弃映射结果并返回全部错误
    pub async fn build_tables(&self) -> Result<MappedTables> {
        let invoices = self.store.list_invoices().await?;
        let tables = map_invoices(&invoices);

        let report = validate_tables(&tables);
        if !report.is_valid {
            tracing::warn!("Mapped data rejected with {} errors", report.errors.len());
            return Err(IngestError::Validation(report.errors));
        }
        Ok(tables)
    }

    pub async fn export_csv(&self) -> Result<String> {
        let tables = self.build_tables().await?;
        export::tables_to_csv(&tables)
    }

    pub async fn export_history_csv(&self) -> Result<String> {
        let invoices = self.store.list_invoices().await?;
        export::invoices_to_csv(&invoices)
    }

    pub async fn summary(&self) -> Result<ProcessSummary> {
        let tables = self.build_tables().await?;
        Ok(export::process_summary(&tables))
    }

    pub async fn analyze<M: GenerativeModel>(
        &self,
        assistant: &InvoiceAssistant<M>,
        prompt: &str,
    ) -> Result<String> {
        let invoices = self.store.list_invoices().await?;
        assistant.analyze(&invoices, prompt).await
    }

    /// 同步规范化数据到 PostgreSQL
    pub async fn sync(&self) -> Result<SyncReport> {
        let pool = self.sync_pool.as_ref().ok_or(IngestError::SyncDisabled)?;
        let tables = self.build_tables().await?;
        sync_tables(pool, &tables).await
    }
}
