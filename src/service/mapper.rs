use crate::error::{IngestError, Result};
use crate::models::{Cliente, DetalleVenta, InvoiceRecord, MappedTables, Producto, Venta};
use bigdecimal::{BigDecimal, ToPrimitive};
use indexmap::{IndexMap, IndexSet};

/// 将发票记录规范化为 clientes / productos / ventas / detalle_ventas 四张表
///
/// - 客户按收票方税号去重, 保留首次出现的名称 (去空白)
/// - 商品按去空白后的描述去重, 保持首次出现顺序
/// - 每张发票一条销售, 每个明细行一条销售明细 (不去重)
/// - 单张发票映射失败时记录日志并跳过, 已登记的客户/商品不回滚
pub fn map_invoices(invoices: &[InvoiceRecord]) -> MappedTables {
    tracing::info!("开始映射 {} 张发票", invoices.len());

    let mut clientes: IndexMap<String, Cliente> = IndexMap::new(); // 保序去重
    let mut productos: IndexSet<String> = IndexSet::new();
    let mut ventas: Vec<Venta> = Vec::with_capacity(invoices.len());
    let mut detalle_ventas: Vec<DetalleVenta> = Vec::new();
    let mut skipped = 0usize;

    for invoice in invoices {
        match map_single_invoice(invoice, &mut clientes, &mut productos) {
            Ok((venta, detalles)) => {
                tracing::debug!(
                    "Invoice {} mapped with {} items",
                    venta.numero_factura,
                    detalles.len()
                );
                ventas.push(venta);
                detalle_ventas.extend(detalles);
            }
            Err(e) => {
                skipped += 1;
                tracing::warn!("Invoice {:?} skipped: {}", invoice.numero_factura, e);
            }
        }
    }

    tracing::info!(
        "映射完成: 发票 {} 张 (跳过 {}), 客户 {}, 商品 {}, 销售 {}, 明细 {}",
        invoices.len(),
        skipped,
        clientes.len(),
        productos.len(),
        ventas.len(),
        detalle_ventas.len()
    );

    MappedTables {
        clientes: clientes.into_values().collect(),
        productos: productos
            .into_iter()
            .map(|descripcion_producto| Producto { descripcion_producto })
            .collect(),
        ventas,
        detalle_ventas,
    }
}

/// 单张发票映射; 客户和商品先于可能失败的步骤登记
fn map_single_invoice(
    invoice: &InvoiceRecord,
    clientes: &mut IndexMap<String, Cliente>,
    productos: &mut IndexSet<String>,
) -> Result<(Venta, Vec<DetalleVenta>)> {
    // 1. 客户 (收票方)
    let rut = invoice.receptor.identificacion_fiscal.clone();
    if !clientes.contains_key(&rut) {
        tracing::debug!("➕ 新客户: {} ({})", invoice.receptor.nombre.trim(), rut);
        clientes.insert(
            rut.clone(),
            Cliente {
                rut: rut.clone(),
                razon_social: invoice.receptor.nombre.trim().to_string(),
            },
        );
    }

    // 2. 商品
    for item in &invoice.items {
        let descripcion = item.descripcion.trim();
        if !productos.contains(descripcion) {
            tracing::debug!("➕ 新商品: {}", descripcion);
            productos.insert(descripcion.to_string());
        }
    }

    // 3. 销售
    let numero_factura = parse_invoice_number(&invoice.numero_factura)?;

    // 4. 明细: 全部成功后才输出
    let detalles = invoice
        .items
        .iter()
        .map(|item| {
            Ok(DetalleVenta {
                numero_factura,
                descripcion_producto: item.descripcion.trim().to_string(),
                unidades_vendidas: round_units(&item.cantidad)?,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let venta = Venta {
        numero_factura,
        fecha_factura: date_part(&invoice.fecha_emision),
        monto_total_factura: round_half_up(&invoice.total, 2),
        rut_cliente: rut,
    };

    Ok((venta, detalles))
}

/// 发票号必须是整数, 否则视为该发票映射失败
pub fn parse_invoice_number(raw: &str) -> Result<i64> {
    raw.trim()
        .parse::<i64>()
        .map_err(|_| IngestError::InvalidInvoiceNumber(raw.to_string()))
}

/// 取前 10 个字符作为日期 (丢弃时间部分)
pub fn date_part(fecha: &str) -> String {
    fecha.trim().chars().take(10).collect()
}

/// 数量四舍五入为整数 (half-up: -2.5 -> -2)
pub fn round_units(cantidad: &BigDecimal) -> Result<i64> {
    round_half_up(cantidad, 0)
        .to_i64()
        .ok_or_else(|| IngestError::InvalidQuantity(cantidad.to_string()))
}

/// floor(x * 10^scale + 0.5) / 10^scale, 结果固定为 `scale` 位小数
pub fn round_half_up(value: &BigDecimal, scale: u32) -> BigDecimal {
    let step = BigDecimal::from(1) / BigDecimal::from(10u64.pow(scale));
    let half = step.clone() / BigDecimal::from(2);
    let shifted = value + &half;
    // with_scale 向零截断, 负数需再减一步
    let truncated = shifted.with_scale(scale as i64);
    if truncated > shifted {
        (truncated - step).with_scale(scale as i64)
    } else {
        truncated
    }
}
