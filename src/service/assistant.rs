//! 外部 AI 协作方边界
//!
//! 抽取: XML 文本 -> 发票数组 (JSON); 分析: 发票集合 + 自由提问 -> markdown 文本.
//! 具体厂商的 HTTP 客户端不在本 crate 内, 通过 [`GenerativeModel`] 注入.

use crate::error::{IngestError, Result};
use crate::models::InvoiceRecord;
use async_trait::async_trait;
use serde_json::{json, Value};

pub type ModelError = Box<dyn std::error::Error + Send + Sync>;

/// 一次生成请求
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub prompt: String,
    /// 要求模型以 JSON 输出
    pub json_response: bool,
    /// 输出须符合的 JSON schema
    pub response_schema: Option<Value>,
}

/// 生成式模型接口
#[async_trait]
pub trait GenerativeModel: Send + Sync {
    async fn generate(&self, request: GenerationRequest) -> std::result::Result<String, ModelError>;
}

/// 抽取 schema 的必填字段
pub const REQUIRED_FIELDS: [&str; 10] = [
    "numero_factura",
    "fecha_emision",
    "fecha_vencimiento",
    "moneda",
    "emisor",
    "receptor",
    "items",
    "subtotal",
    "impuestos",
    "total",
];

fn party_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "nombre": {"type": "string"},
            "identificacion_fiscal": {"type": "string"},
            "direccion": {"type": "string"},
            "contacto": {"type": "string"}
        },
        "required": ["nombre", "identificacion_fiscal", "direccion"]
    })
}

/// 抽取结果 schema: 发票数组, 必填字段与 [`REQUIRED_FIELDS`] 一致
pub fn extraction_schema() -> Value {
    json!({
        "type": "array",
        "items": {
            "type": "object",
            "properties": {
                "numero_factura": {"type": "string"},
                "fecha_emision": {"type": "string", "description": "YYYY-MM-DD"},
                "fecha_vencimiento": {"type": "string", "description": "YYYY-MM-DD"},
                "moneda": {"type": "string"},
                "emisor": party_schema(),
                "receptor": party_schema(),
                "items": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "descripcion": {"type": "string"},
                            "cantidad": {"type": "number"},
                            "precio_unitario": {"type": "number"},
                            "total_linea": {"type": "number"}
                        },
                        "required": ["descripcion", "cantidad", "precio_unitario", "total_linea"]
                    }
                },
                "subtotal": {"type": "number"},
                "impuestos": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "tipo": {"type": "string"},
                            "tasa": {"type": "number"},
                            "monto": {"type": "number"}
                        },
                        "required": ["tipo", "tasa", "monto"]
                    }
                },
                "total": {"type": "number"},
                "notas": {"type": "string"}
            },
            "required": REQUIRED_FIELDS
        }
    })
}

pub fn build_extraction_prompt(xml: &str) -> String {
    format!(
        r#"You are an accounting assistant that processes electronic invoices.
The XML below may contain one or more invoices. Find every invoice and extract it.

Return a JSON array with one object per invoice. Each object has the fields:
numero_factura (string), fecha_emision (string, YYYY-MM-DD), fecha_vencimiento (string, YYYY-MM-DD),
moneda (string), emisor and receptor (objects with nombre, identificacion_fiscal, direccion and
optional contacto), items (array of objects with descripcion, cantidad, precio_unitario, total_linea),
subtotal (number), impuestos (array of objects with tipo, tasa as a percentage, monto),
total (number) and optional notas (string).
Numeric values must be JSON numbers. Omit optional fields that are not present.

XML content:
```xml
{xml}
```"#
    )
}

pub fn build_analysis_prompt(invoices: &[InvoiceRecord], user_prompt: &str) -> Result<String> {
    let data = serde_json::to_string_pretty(invoices)?;
    Ok(format!(
        r#"You are a business and financial analyst. You are given an invoice history as a JSON array.
Answer the user's request using only this data.

User request: "{user_prompt}"

Invoice data:
```json
{data}
```

Answer clearly and concisely in Markdown (headings, lists, bold) and offer actionable insights where possible."#
    ))
}

/// 去掉模型偶尔附带的 ``` 代码块包装
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

/// 按 schema 解码抽取结果, 任一元素不合法即整体拒绝
pub fn decode_extraction_response(text: &str) -> Result<Vec<InvoiceRecord>> {
    let value: Value = serde_json::from_str(strip_code_fence(text))?;
    let Value::Array(elements) = value else {
        return Err(IngestError::Decode("response is not a JSON array".to_string()));
    };

    elements
        .into_iter()
        .enumerate()
        .map(|(idx, element)| {
            if let Some(missing) = REQUIRED_FIELDS.iter().find(|f| element.get(**f).is_none()) {
                return Err(IngestError::Decode(format!(
                    "invoice {} is missing required field `{}`",
                    idx + 1,
                    missing
                )));
            }
            let mut record: InvoiceRecord = serde_json::from_value(element)
                .map_err(|e| IngestError::Decode(format!("invoice {}: {}", idx + 1, e)))?;
            record.id = None;
            Ok(record)
        })
        .collect()
}

/// 抽取/分析协作方, 失败时原样上报协作方信息, 不重试
pub struct InvoiceAssistant<M> {
    model: M,
}

impl<M: GenerativeModel> InvoiceAssistant<M> {
    pub fn new(model: M) -> Self {
        Self { model }
    }

    /// XML -> 发票记录
    pub async fn extract(&self, xml: &str) -> Result<Vec<InvoiceRecord>> {
        let request = GenerationRequest {
            prompt: build_extraction_prompt(xml),
            json_response: true,
            response_schema: Some(extraction_schema()),
        };
        let text = self.model.generate(request).await.map_err(|e| {
            tracing::error!("Extraction call failed: {}", e);
            IngestError::Extraction(e.to_string())
        })?;

        let invoices = decode_extraction_response(&text).map_err(|e| {
            tracing::error!("Extraction response rejected: {}", e);
            e
        })?;
        tracing::info!("AI 抽取到 {} 张发票", invoices.len());
        Ok(invoices)
    }

    /// 对发票历史进行自然语言分析, 返回 markdown
    pub async fn analyze(&self, invoices: &[InvoiceRecord], user_prompt: &str) -> Result<String> {
        if invoices.is_empty() {
            return Err(IngestError::Analysis("no invoices to analyze".to_string()));
        }

        let request = GenerationRequest {
            prompt: build_analysis_prompt(invoices, user_prompt)?,
            json_response: false,
            response_schema: None,
        };
        self.model.generate(request).await.map_err(|e| {
            tracing::error!("Analysis call failed: {}", e);
            IngestError::Analysis(e.to_string())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures::{invoice, item};
    use std::sync::Mutex;

    struct CannedModel {
        reply: std::result::Result<String, String>,
        seen: Mutex<Vec<GenerationRequest>>,
    }

    impl CannedModel {
        fn ok(reply: &str) -> Self {
            Self { reply: Ok(reply.to_string()), seen: Mutex::new(Vec::new()) }
        }

        fn failing(message: &str) -> Self {
            Self { reply: Err(message.to_string()), seen: Mutex::new(Vec::new()) }
        }
    }

    #[async_trait]
    impl GenerativeModel for CannedModel {
        async fn generate(&self, request: GenerationRequest) -> std::result::Result<String, ModelError> {
            self.seen.lock().unwrap().push(request);
            self.reply.clone().map_err(|m| m.into())
        }
    }

    fn payload() -> String {
        serde_json::to_string(&vec![invoice(
            "1001",
            "76000000",
            "12345678-9",
            vec![item("Beer A", "2.5")],
        )])
        .unwrap()
    }

    #[test]
    fn decode_accepts_schema_payload() {
        let invoices = decode_extraction_response(&payload()).unwrap();
        assert_eq!(invoices.len(), 1);
        assert_eq!(invoices[0].numero_factura, "1001");
        assert_eq!(invoices[0].items[0].descripcion, "Beer A");
    }

    #[test]
    fn decode_accepts_plain_numbers_and_fenced_output() {
        let text = r#"```json
        [{"numero_factura": "7", "fecha_emision": "2024-01-02", "fecha_vencimiento": "2024-02-02",
          "moneda": "CLP",
          "emisor": {"nombre": "A", "identificacion_fiscal": "76000000", "direccion": "x"},
          "receptor": {"nombre": "B", "identificacion_fiscal": "12345678-9", "direccion": "y", "contacto": "b@x.cl"},
          "items": [{"descripcion": "IPA", "cantidad": 2, "precio_unitario": 1500.5, "total_linea": 3001}],
          "subtotal": 3001, "impuestos": [{"tipo": "IVA", "tasa": 19, "monto": 570.19}], "total": 3571.19,
          "id": 42}]
        ```"#;
        let invoices = decode_extraction_response(text).unwrap();
        assert_eq!(invoices[0].receptor.contacto.as_deref(), Some("b@x.cl"));
        assert_eq!(invoices[0].id, None);
        assert!(invoices[0].notas.is_none());
    }

    #[test]
    fn decode_rejects_non_array() {
        let err = decode_extraction_response(r#"{"numero_factura": "1"}"#).unwrap_err();
        assert!(matches!(err, IngestError::Decode(ref m) if m.contains("not a JSON array")));
    }

    #[test]
    fn decode_rejects_missing_required_field() {
        let mut value: Value = serde_json::from_str(&payload()).unwrap();
        value[0].as_object_mut().unwrap().remove("total");
        let err = decode_extraction_response(&value.to_string()).unwrap_err();
        assert!(matches!(err, IngestError::Decode(ref m) if m.contains("`total`")));
    }

    #[test]
    fn decode_rejects_later_malformed_elements() {
        let mut value: Value = serde_json::from_str(&payload()).unwrap();
        let mut second = value[0].clone();
        second["items"] = Value::String("none".into());
        value.as_array_mut().unwrap().push(second);
        let err = decode_extraction_response(&value.to_string()).unwrap_err();
        assert!(matches!(err, IngestError::Decode(ref m) if m.starts_with("invoice 2")));
    }

    #[tokio::test]
    async fn extract_requests_json_and_decodes() {
        let assistant = InvoiceAssistant::new(CannedModel::ok(&payload()));
        let invoices = assistant.extract("<Factura/>").await.unwrap();
        assert_eq!(invoices.len(), 1);

        let seen = assistant.model.seen.lock().unwrap();
        assert!(seen[0].json_response);
        assert!(seen[0].prompt.contains("<Factura/>"));

        let schema = seen[0].response_schema.as_ref().unwrap();
        assert_eq!(schema["type"], "array");
        let required: Vec<_> = schema["items"]["required"]
            .as_array()
            .unwrap()
            .iter()
            .map(|f| f.as_str().unwrap())
            .collect();
        assert_eq!(required, REQUIRED_FIELDS);
    }

    #[test]
    fn schema_covers_every_record_field() {
        let schema = extraction_schema();
        let properties = schema["items"]["properties"].as_object().unwrap();
        let sample = serde_json::to_value(invoice("1", "76000000", "12345678-9", vec![item("IPA", "1")])).unwrap();
        for field in sample.as_object().unwrap().keys() {
            assert!(properties.contains_key(field), "schema lacks `{field}`");
        }
    }

    #[tokio::test]
    async fn extract_surfaces_collaborator_message() {
        let assistant = InvoiceAssistant::new(CannedModel::failing("quota exceeded"));
        let err = assistant.extract("<Factura/>").await.unwrap_err();
        assert!(matches!(err, IngestError::Extraction(ref m) if m == "quota exceeded"));
    }

    #[tokio::test]
    async fn analyze_requires_invoices() {
        let assistant = InvoiceAssistant::new(CannedModel::ok("# Report"));
        let err = assistant.analyze(&[], "top customers?").await.unwrap_err();
        assert!(matches!(err, IngestError::Analysis(_)));
        assert!(assistant.model.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn analyze_returns_model_text() {
        let assistant = InvoiceAssistant::new(CannedModel::ok("# Report"));
        let invoices = vec![invoice("1", "76000000", "12345678-9", vec![item("IPA", "1")])];
        let text = assistant.analyze(&invoices, "top customers?").await.unwrap();
        assert_eq!(text, "# Report");

        let seen = assistant.model.seen.lock().unwrap();
        assert!(!seen[0].json_response);
        assert!(seen[0].response_schema.is_none());
        assert!(seen[0].prompt.contains("top customers?"));
        assert!(seen[0].prompt.contains("\"numero_factura\": \"1\""));
    }
}
