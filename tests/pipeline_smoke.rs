mod common;

use async_trait::async_trait;
use common::{dec, invoice, item, memory_store};
use invoice_ingest::service::assistant::ModelError;
use invoice_ingest::service::{GenerationRequest, GenerativeModel, InvoiceAssistant};
use invoice_ingest::{IngestError, IngestService};
use std::io::Write;

/// 固定返回抽取结果的模型
struct FixedModel(String);

#[async_trait]
impl GenerativeModel for FixedModel {
    async fn generate(&self, request: GenerationRequest) -> Result<String, ModelError> {
        if request.json_response {
            Ok(self.0.clone())
        } else {
            Ok("## Top customer\n**Bar La Esquina**".to_string())
        }
    }
}

fn extraction_payload() -> String {
    serde_json::to_string(&vec![
        invoice("1001", "76000000", "12345678-9", vec![item("Beer A", "2.5"), item("Beer B", "1")]),
        invoice("1002", "76000000", "98765432-1", vec![item("Beer A", "4")]),
        invoice("1001", "76000000", "12345678-9", vec![item("Beer A", "2.5")]),
    ])
    .unwrap()
}

#[tokio::test]
async fn xml_file_flows_through_to_tables_and_export() {
    let service = IngestService::new(memory_store().await);
    let assistant = InvoiceAssistant::new(FixedModel(extraction_payload()));

    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "<Facturas><Factura numero=\"1001\"/></Facturas>").unwrap();

    let outcome = service.ingest_xml_file(&assistant, file.path()).await.unwrap();
    assert_eq!(outcome.added_count, 2);
    assert_eq!(outcome.duplicate_count, 1);

    let tables = service.build_tables().await.unwrap();
    assert_eq!(tables.clientes.len(), 2);
    assert_eq!(tables.productos.len(), 2);
    assert_eq!(tables.ventas.len(), 2);
    assert_eq!(tables.detalle_ventas.len(), 3);
    assert_eq!(tables.ventas[0].monto_total_factura, dec("5206.25"));

    let csv = service.export_csv().await.unwrap();
    assert!(csv.contains("=== TABLA DETALLE_VENTAS ==="));
    assert!(csv.contains("1001,Beer A,3"));

    let summary = service.summary().await.unwrap();
    assert_eq!(summary.total_invoices, 2);
    assert_eq!(summary.top_products[0], ("Beer A".to_string(), 7));

    let text = service.analyze(&assistant, "who buys the most?").await.unwrap();
    assert!(text.contains("Bar La Esquina"));
}

#[tokio::test]
async fn missing_file_is_reported_as_io_error() {
    let service = IngestService::new(memory_store().await);
    let assistant = InvoiceAssistant::new(FixedModel(extraction_payload()));
    let dir = tempfile::tempdir().unwrap();

    let err = service
        .ingest_xml_file(&assistant, &dir.path().join("missing.xml"))
        .await
        .unwrap_err();
    assert!(matches!(err, IngestError::Io(_)));
    assert!(service.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn malformed_payload_stores_nothing() {
    let service = IngestService::new(memory_store().await);
    let err = service
        .ingest_extraction_payload(r#"[{"numero_factura": "1"}]"#)
        .await
        .unwrap_err();
    assert!(matches!(err, IngestError::Decode(_)));
    assert!(service.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn validation_failure_lists_every_violation() {
    let service = IngestService::new(memory_store().await);
    let mut bad = invoice("1", "76000000", "1234", vec![]);
    bad.total = dec("0");
    service.ingest_records(&[bad]).await.unwrap();

    let err = service.build_tables().await.unwrap_err();
    let IngestError::Validation(errors) = err else {
        panic!("expected validation error");
    };
    assert!(errors.contains(&"no products found".to_string()));
    assert!(errors.contains(&"no sale details found".to_string()));
    assert!(errors.iter().any(|e| e.contains("invalid tax id (1234)")));
    assert!(errors.iter().any(|e| e.contains("invalid amount")));
}

#[tokio::test]
async fn analysis_on_empty_history_fails() {
    let service = IngestService::new(memory_store().await);
    let assistant = InvoiceAssistant::new(FixedModel("[]".to_string()));
    let err = service.analyze(&assistant, "anything").await.unwrap_err();
    assert!(matches!(err, IngestError::Analysis(_)));
}

#[tokio::test]
async fn sync_without_database_is_disabled() {
    let service = IngestService::new(memory_store().await);
    assert!(!service.sync_enabled());
    assert!(matches!(service.sync().await, Err(IngestError::SyncDisabled)));
}
