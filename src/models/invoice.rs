use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};

/// 交易方 (开票方 emisor / 收票方 receptor)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Party {
    pub nombre: String,
    pub identificacion_fiscal: String,
    pub direccion: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contacto: Option<String>,
}

/// 发票明细行
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub descripcion: String,
    pub cantidad: BigDecimal,
    pub precio_unitario: BigDecimal,
    pub total_linea: BigDecimal,
}

/// 税项
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tax {
    pub tipo: String,
    /// 税率 (百分比, 16 表示 16%)
    pub tasa: BigDecimal,
    pub monto: BigDecimal,
}

/// 发票记录 (由外部 AI 抽取, 字段名与抽取 schema 一致)
///
/// `id` 只在写入本地存储后才会被赋值, 抽取结果中不携带.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub numero_factura: String,
    pub fecha_emision: String,
    pub fecha_vencimiento: String,
    pub moneda: String,
    pub emisor: Party,
    pub receptor: Party,
    pub items: Vec<LineItem>,
    pub subtotal: BigDecimal,
    pub impuestos: Vec<Tax>,
    pub total: BigDecimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notas: Option<String>,
}

impl InvoiceRecord {
    /// 去重键: (发票号, 开票方税号)
    pub fn dedup_key(&self) -> (&str, &str) {
        (&self.numero_factura, &self.emisor.identificacion_fiscal)
    }
}

/// 批量写入结果
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsertOutcome {
    pub added_count: usize,
    pub duplicate_count: usize,
}

impl InsertOutcome {
    pub fn message(&self) -> String {
        format!(
            "{} new invoice(s) added, {} duplicate(s) skipped",
            self.added_count, self.duplicate_count
        )
    }
}
