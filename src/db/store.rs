use crate::config::StoreConfig;
use crate::db::pool::create_store_pool;
use crate::error::{IngestError, Result};
use crate::models::{InsertOutcome, InvoiceRecord};
use sqlx::{FromRow, SqlitePool};

const CREATE_INVOICES_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS invoices (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        numero_factura TEXT NOT NULL,
        emisor_identificacion_fiscal TEXT NOT NULL,
        payload TEXT NOT NULL,
        UNIQUE (numero_factura, emisor_identificacion_fiscal)
    )
"#;

#[derive(Debug, FromRow)]
struct InvoiceRow {
    id: i64,
    payload: String,
}

impl InvoiceRow {
    fn into_record(self) -> Result<InvoiceRecord> {
        let mut record: InvoiceRecord = serde_json::from_str(&self.payload)?;
        record.id = Some(self.id);
        Ok(record)
    }
}

/// 本地发票缓存
///
/// 以 (发票号, 开票方税号) 唯一约束去重, 记录写入后只读, 只能删除不能修改.
#[derive(Debug, Clone)]
pub struct InvoiceStore {
    pool: SqlitePool,
}

impl InvoiceStore {
    /// 打开 (必要时创建) 存储
    pub async fn open(config: &StoreConfig) -> Result<Self> {
        let pool = create_store_pool(config).await?;
        Self::with_pool(pool).await
    }

    pub async fn with_pool(pool: SqlitePool) -> Result<Self> {
        sqlx::query(CREATE_INVOICES_TABLE).execute(&pool).await?;
        Ok(Self { pool })
    }

    /// 批量写入
    ///
    /// 唯一约束冲突计为重复并跳过; 其它任何错误放弃整批 (事务回滚) 并返回错误.
    pub async fn add_invoices(&self, invoices: &[InvoiceRecord]) -> Result<InsertOutcome> {
        let mut outcome = InsertOutcome::default();
        if invoices.is_empty() {
            return Ok(outcome);
        }

        let mut tx = self.pool.begin().await?;

        for invoice in invoices {
            let (numero, emisor) = invoice.dedup_key();

            // id 由存储分配, 不进入 payload
            let mut stored = invoice.clone();
            stored.id = None;
            let payload = serde_json::to_string(&stored)?;

            let result = sqlx::query(
                r#"
                INSERT INTO invoices (numero_factura, emisor_identificacion_fiscal, payload)
                VALUES (?1, ?2, ?3)
                "#,
            )
            .bind(numero)
            .bind(emisor)
            .bind(payload)
            .execute(&mut *tx)
            .await;

            match result {
                Ok(_) => outcome.added_count += 1,
                Err(sqlx::Error::Database(ref db_err)) if db_err.is_unique_violation() => {
                    tracing::warn!("Duplicate invoice {} from issuer {}, skipping", numero, emisor);
                    outcome.duplicate_count += 1;
                }
                Err(e) => {
                    // tx 析构时回滚
                    tracing::error!("✗ 写入发票 {} 失败, 整批放弃: {:?}", numero, e);
                    return Err(e.into());
                }
            }
        }

        tx.commit().await?;
        tracing::info!(
            "✓ 写入完成: 新增 {} 张, 重复 {} 张",
            outcome.added_count, outcome.duplicate_count
        );
        Ok(outcome)
    }

    /// 按存储顺序读取全部发票
    pub async fn list_invoices(&self) -> Result<Vec<InvoiceRecord>> {
        let rows = sqlx::query_as::<_, InvoiceRow>(
            r#"
            SELECT id, payload
            FROM invoices
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(InvoiceRow::into_record).collect()
    }

    /// 按去重键查找
    pub async fn find_invoice(
        &self,
        numero_factura: &str,
        emisor_identificacion_fiscal: &str,
    ) -> Result<Option<InvoiceRecord>> {
        let row = sqlx::query_as::<_, InvoiceRow>(
            r#"
            SELECT id, payload
            FROM invoices
            WHERE numero_factura = ?1 AND emisor_identificacion_fiscal = ?2
            "#,
        )
        .bind(numero_factura)
        .bind(emisor_identificacion_fiscal)
        .fetch_optional(&self.pool)
        .await?;

        row.map(InvoiceRow::into_record).transpose()
    }

    pub async fn count_invoices(&self) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM invoices")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// 删除单张发票, 不存在时返回 NotFound
    pub async fn delete_invoice(&self, id: i64) -> Result<()> {
        let result = sqlx::query("DELETE FROM invoices WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(IngestError::NotFound(id));
        }
        tracing::info!("Invoice {} deleted", id);
        Ok(())
    }

    /// 清空全部发票
    pub async fn clear_invoices(&self) -> Result<()> {
        let result = sqlx::query("DELETE FROM invoices").execute(&self.pool).await?;
        tracing::info!("Invoice history cleared, {} rows removed", result.rows_affected());
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}
