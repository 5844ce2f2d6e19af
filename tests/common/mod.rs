#![allow(dead_code)]

use bigdecimal::BigDecimal;
use invoice_ingest::config::StoreConfig;
use invoice_ingest::models::{InvoiceRecord, LineItem, Party, Tax};
use invoice_ingest::InvoiceStore;
use std::str::FromStr;

pub fn dec(value: &str) -> BigDecimal {
    BigDecimal::from_str(value).unwrap()
}

pub fn item(descripcion: &str, cantidad: &str) -> LineItem {
    LineItem {
        descripcion: descripcion.to_string(),
        cantidad: dec(cantidad),
        precio_unitario: dec("1250"),
        total_linea: dec(cantidad) * dec("1250"),
    }
}

fn party(nombre: &str, identificacion_fiscal: &str) -> Party {
    Party {
        nombre: nombre.to_string(),
        identificacion_fiscal: identificacion_fiscal.to_string(),
        direccion: "Los Carrera 455, Concepción".to_string(),
        contacto: Some("ventas@example.cl".to_string()),
    }
}

pub fn invoice(numero: &str, emisor: &str, receptor: &str, items: Vec<LineItem>) -> InvoiceRecord {
    InvoiceRecord {
        id: None,
        numero_factura: numero.to_string(),
        fecha_emision: "2024-06-03T08:15:00".to_string(),
        fecha_vencimiento: "2024-07-03".to_string(),
        moneda: "CLP".to_string(),
        emisor: party("Cervecera Austral", emisor),
        receptor: party("Bar La Esquina", receptor),
        items,
        subtotal: dec("4375"),
        impuestos: vec![Tax {
            tipo: "IVA".to_string(),
            tasa: dec("19"),
            monto: dec("831.25"),
        }],
        total: dec("5206.25"),
        notas: None,
    }
}

pub async fn memory_store() -> InvoiceStore {
    InvoiceStore::open(&StoreConfig::new("sqlite::memory:"))
        .await
        .expect("open in-memory store")
}
