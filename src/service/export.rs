use crate::error::{IngestError, Result};
use crate::models::{InvoiceRecord, MappedTables};
use bigdecimal::{BigDecimal, Zero};
use chrono::NaiveDate;
use indexmap::IndexMap;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

const TOP_N: usize = 3;

/// 导出文件名: facturas_YYYY-MM-DD.csv
pub fn export_file_name(date: NaiveDate) -> String {
    format!("facturas_{}.csv", date.format("%Y-%m-%d"))
}

fn section(title: &str, header: &[&str], rows: Vec<Vec<String>>) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(header)?;
    for row in rows {
        writer.write_record(&row)?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| IngestError::Io(e.into_error()))?;
    let body = String::from_utf8(bytes)
        .map_err(|e| IngestError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))?;
    Ok(format!("=== {} ===\n{}", title, body))
}

/// 将四张表导出为分段 CSV 文本
pub fn tables_to_csv(tables: &MappedTables) -> Result<String> {
    let sections = [
        section(
            "TABLA CLIENTES",
            &["rut", "razon_social"],
            tables
                .clientes
                .iter()
                .map(|c| vec![c.rut.clone(), c.razon_social.clone()])
                .collect(),
        )?,
        section(
            "TABLA PRODUCTOS",
            &["descripcion_producto"],
            tables
                .productos
                .iter()
                .map(|p| vec![p.descripcion_producto.clone()])
                .collect(),
        )?,
        section(
            "TABLA VENTAS",
            &["numero_factura", "fecha_factura", "monto_total_factura", "rut_cliente"],
            tables
                .ventas
                .iter()
                .map(|v| {
                    vec![
                        v.numero_factura.to_string(),
                        v.fecha_factura.clone(),
                        v.monto_total_factura.to_string(),
                        v.rut_cliente.clone(),
                    ]
                })
                .collect(),
        )?,
        section(
            "TABLA DETALLE_VENTAS",
            &["numero_factura", "descripcion_producto", "unidades_vendidas"],
            tables
                .detalle_ventas
                .iter()
                .map(|d| {
                    vec![
                        d.numero_factura.to_string(),
                        d.descripcion_producto.clone(),
                        d.unidades_vendidas.to_string(),
                    ]
                })
                .collect(),
        )?,
    ];

    Ok(sections.join("\n"))
}

/// 发票历史平铺导出: 每个明细行一行, 无明细的发票输出一行空明细
pub fn invoices_to_csv(invoices: &[InvoiceRecord]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record([
        "numero_factura", "fecha_emision", "fecha_vencimiento", "moneda",
        "emisor_nombre", "emisor_identificacion_fiscal", "emisor_direccion", "emisor_contacto",
        "receptor_nombre", "receptor_identificacion_fiscal", "receptor_direccion", "receptor_contacto",
        "subtotal", "impuestos", "total", "notas",
        "item_descripcion", "item_cantidad", "item_precio_unitario", "item_total_linea",
    ])?;

    for invoice in invoices {
        let impuestos = invoice
            .impuestos
            .iter()
            .map(|t| format!("{} {}%: {}", t.tipo, t.tasa, t.monto.round(2)))
            .collect::<Vec<_>>()
            .join("; ");

        let header = [
            invoice.numero_factura.clone(),
            invoice.fecha_emision.clone(),
            invoice.fecha_vencimiento.clone(),
            invoice.moneda.clone(),
            invoice.emisor.nombre.clone(),
            invoice.emisor.identificacion_fiscal.clone(),
            invoice.emisor.direccion.clone(),
            invoice.emisor.contacto.clone().unwrap_or_default(),
            invoice.receptor.nombre.clone(),
            invoice.receptor.identificacion_fiscal.clone(),
            invoice.receptor.direccion.clone(),
            invoice.receptor.contacto.clone().unwrap_or_default(),
            invoice.subtotal.to_string(),
            impuestos,
            invoice.total.to_string(),
            invoice.notas.clone().unwrap_or_default(),
        ];

        if invoice.items.is_empty() {
            let mut row = header.to_vec();
            row.extend(["N/A".to_string(), "0".to_string(), "0".to_string(), "0".to_string()]);
            writer.write_record(&row)?;
            continue;
        }

        for item in &invoice.items {
            let mut row = header.to_vec();
            row.extend([
                item.descripcion.clone(),
                item.cantidad.to_string(),
                item.precio_unitario.to_string(),
                item.total_linea.to_string(),
            ]);
            writer.write_record(&row)?;
        }
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| IngestError::Io(e.into_error()))?;
    String::from_utf8(bytes)
        .map_err(|e| IngestError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))
}

/// 处理摘要
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessSummary {
    pub total_invoices: usize,
    pub unique_customers: usize,
    pub unique_products: usize,
    pub total_units: i64,
    pub total_amount: BigDecimal,
    pub first_date: Option<NaiveDate>,
    pub last_date: Option<NaiveDate>,
    /// (商品描述, 销售数量)
    pub top_products: Vec<(String, i64)>,
    /// (客户名称, 消费金额)
    pub top_customers: Vec<(String, BigDecimal)>,
}

pub fn process_summary(tables: &MappedTables) -> ProcessSummary {
    let total_units: i64 = tables.detalle_ventas.iter().map(|d| d.unidades_vendidas).sum();
    let total_amount = tables
        .ventas
        .iter()
        .fold(BigDecimal::zero(), |acc, v| acc + &v.monto_total_factura);

    // 无法解析的日期不参与区间统计
    let mut dates: Vec<NaiveDate> = tables
        .ventas
        .iter()
        .filter_map(|v| NaiveDate::parse_from_str(&v.fecha_factura, "%Y-%m-%d").ok())
        .collect();
    dates.sort();

    let mut units_by_product: IndexMap<&str, i64> = IndexMap::new();
    for detalle in &tables.detalle_ventas {
        *units_by_product.entry(detalle.descripcion_producto.as_str()).or_insert(0) +=
            detalle.unidades_vendidas;
    }
    let mut top_products: Vec<(String, i64)> = units_by_product
        .into_iter()
        .map(|(name, units)| (name.to_string(), units))
        .collect();
    // 稳定排序, 并列时保持首次出现顺序
    top_products.sort_by(|a, b| b.1.cmp(&a.1));
    top_products.truncate(TOP_N);

    let names: HashMap<&str, &str> = tables
        .clientes
        .iter()
        .map(|c| (c.rut.as_str(), c.razon_social.as_str()))
        .collect();
    let mut spend_by_customer: IndexMap<&str, BigDecimal> = IndexMap::new();
    for venta in &tables.ventas {
        let entry = spend_by_customer
            .entry(venta.rut_cliente.as_str())
            .or_insert_with(BigDecimal::zero);
        *entry = &*entry + &venta.monto_total_factura;
    }
    let mut top_customers: Vec<(String, BigDecimal)> = spend_by_customer
        .into_iter()
        .map(|(rut, amount)| (names.get(rut).copied().unwrap_or(rut).to_string(), amount))
        .collect();
    top_customers.sort_by(|a, b| b.1.cmp(&a.1));
    top_customers.truncate(TOP_N);

    ProcessSummary {
        total_invoices: tables.ventas.len(),
        unique_customers: tables.clientes.len(),
        unique_products: tables.productos.len(),
        total_units,
        total_amount,
        first_date: dates.first().copied(),
        last_date: dates.last().copied(),
        top_products,
        top_customers,
    }
}

impl ProcessSummary {
    pub fn date_range(&self) -> String {
        match (self.first_date, self.last_date) {
            (Some(first), Some(last)) if first == last => first.format("%d-%m-%Y").to_string(),
            (Some(first), Some(last)) => {
                format!("{} - {}", first.format("%d-%m-%Y"), last.format("%d-%m-%Y"))
            }
            _ => "no dates".to_string(),
        }
    }
}

impl fmt::Display for ProcessSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "PROCESSING SUMMARY")?;
        writeln!(f, "Invoices: {}", self.total_invoices)?;
        writeln!(f, "Unique customers: {}", self.unique_customers)?;
        writeln!(f, "Unique products: {}", self.unique_products)?;
        writeln!(f, "Units sold: {}", self.total_units)?;
        writeln!(f, "Total amount: {}", self.total_amount)?;
        writeln!(f, "Date range: {}", self.date_range())?;
        writeln!(f, "Top products:")?;
        for (idx, (name, units)) in self.top_products.iter().enumerate() {
            writeln!(f, "  {}. {}: {} units", idx + 1, name, units)?;
        }
        writeln!(f, "Top customers:")?;
        for (idx, (name, amount)) in self.top_customers.iter().enumerate() {
            writeln!(f, "  {}. {}: {}", idx + 1, name, amount)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures::{dec, invoice, item};
    use crate::service::mapper::map_invoices;

    fn sample_tables() -> MappedTables {
        let mut a = invoice("1001", "76000000", "12345678-9", vec![item("IPA", "2"), item("Lager \"Sur\", 350cc", "1")]);
        a.receptor.nombre = "Bar Central".into();
        let mut b = invoice("1002", "76000000", "98765432-1", vec![item("Stout", "5"), item("IPA", "4")]);
        b.fecha_emision = "2024-03-20T12:00:00".into();
        b.total = dec("5000");
        let c = invoice("1003", "76000000", "12345678-9", vec![item("Porter", "1")]);
        map_invoices(&[a, b, c])
    }

    #[test]
    fn csv_has_four_labeled_sections() {
        let csv = tables_to_csv(&sample_tables()).unwrap();

        let titles: Vec<_> = csv.lines().filter(|l| l.starts_with("===")).collect();
        assert_eq!(
            titles,
            vec![
                "=== TABLA CLIENTES ===",
                "=== TABLA PRODUCTOS ===",
                "=== TABLA VENTAS ===",
                "=== TABLA DETALLE_VENTAS ===",
            ]
        );
        assert!(csv.contains("rut,razon_social\n12345678-9,Bar Central\n"));
        assert!(csv.contains("\"Lager \"\"Sur\"\", 350cc\""));
        assert!(csv.contains("1002,2024-03-20,5000.00,98765432-1"));
        assert!(csv.contains("1003,Porter,1"));
    }

    #[test]
    fn summary_totals_and_rankings() {
        let summary = process_summary(&sample_tables());

        assert_eq!(summary.total_invoices, 3);
        assert_eq!(summary.unique_customers, 2);
        assert_eq!(summary.unique_products, 4);
        assert_eq!(summary.total_units, 13);
        assert_eq!(summary.total_amount, dec("7380.92"));
        assert_eq!(summary.date_range(), "15-03-2024 - 20-03-2024");
        assert_eq!(
            summary.top_products,
            vec![("IPA".to_string(), 6), ("Stout".to_string(), 5), ("Lager \"Sur\", 350cc".to_string(), 1)]
        );
        assert_eq!(summary.top_customers[0], ("Cliente 98765432-1".to_string(), dec("5000")));
        assert_eq!(summary.top_customers[1], ("Bar Central".to_string(), dec("2380.92")));

        let text = summary.to_string();
        assert!(text.contains("Invoices: 3"));
        assert!(text.contains("  1. IPA: 6 units"));
    }

    #[test]
    fn empty_summary_has_no_dates() {
        let summary = process_summary(&MappedTables::default());
        assert_eq!(summary.date_range(), "no dates");
        assert!(summary.top_products.is_empty());
        assert_eq!(summary.total_amount, dec("0"));
    }

    #[test]
    fn flat_export_emits_one_row_per_item() {
        let mut empty = invoice("9", "76000000", "12345678-9", vec![]);
        empty.notas = Some("sin detalle".into());
        let full = invoice("10", "76000000", "12345678-9", vec![item("IPA", "1"), item("Stout", "2")]);

        let csv = invoices_to_csv(&[empty, full]).unwrap();
        let lines: Vec<_> = csv.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[1].contains("sin detalle,N/A,0,0,0"));
        assert!(lines[1].contains("IVA 19%: 190.08"));
    }

    #[test]
    fn file_name_uses_iso_date() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
        assert_eq!(export_file_name(date), "facturas_2024-03-15.csv");
    }
}
