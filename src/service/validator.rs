use crate::models::{MappedTables, ValidationReport};
use bigdecimal::{BigDecimal, Zero};

/// 客户税号最小长度
const MIN_RUT_LEN: usize = 8;

/// 校验规范化数据的结构完整性, 累积所有错误
pub fn validate_tables(tables: &MappedTables) -> ValidationReport {
    let mut errors = Vec::new();

    if tables.clientes.is_empty() {
        errors.push("no customers found".to_string());
    }
    if tables.productos.is_empty() {
        errors.push("no products found".to_string());
    }
    if tables.ventas.is_empty() {
        errors.push("no sales found".to_string());
    }
    if tables.detalle_ventas.is_empty() {
        errors.push("no sale details found".to_string());
    }

    for (idx, cliente) in tables.clientes.iter().enumerate() {
        if cliente.rut.chars().count() < MIN_RUT_LEN {
            errors.push(format!("Customer {}: invalid tax id ({})", idx + 1, cliente.rut));
        }
        if cliente.razon_social.trim().is_empty() {
            errors.push(format!("Customer {}: empty name", idx + 1));
        }
    }

    for (idx, producto) in tables.productos.iter().enumerate() {
        if producto.descripcion_producto.trim().is_empty() {
            errors.push(format!("Product {}: empty description", idx + 1));
        }
    }

    for (idx, venta) in tables.ventas.iter().enumerate() {
        if venta.numero_factura <= 0 {
            errors.push(format!(
                "Sale {}: invalid invoice number ({})",
                idx + 1, venta.numero_factura
            ));
        }
        if !is_iso_date(&venta.fecha_factura) {
            errors.push(format!("Sale {}: invalid date ({})", idx + 1, venta.fecha_factura));
        }
        if venta.monto_total_factura <= BigDecimal::zero() {
            errors.push(format!(
                "Sale {}: invalid amount ({})",
                idx + 1, venta.monto_total_factura
            ));
        }
    }

    ValidationReport {
        is_valid: errors.is_empty(),
        errors,
    }
}

/// 严格的 YYYY-MM-DD 数字格式 (只校验形状, 不校验日历)
fn is_iso_date(value: &str) -> bool {
    let bytes = value.as_bytes();
    bytes.len() == 10
        && bytes.iter().enumerate().all(|(i, b)| match i {
            4 | 7 => *b == b'-',
            _ => b.is_ascii_digit(),
        })
}
