use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};

/// 客户表 (clientes), 自然键 = 收票方税号
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cliente {
    pub rut: String,
    pub razon_social: String,
}

/// 商品表 (productos), 自然键 = 去空白后的明细描述
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Producto {
    pub descripcion_producto: String,
}

/// 销售表 (ventas), 每张发票一行
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Venta {
    pub numero_factura: i64,
    pub fecha_factura: String,            // YYYY-MM-DD
    pub monto_total_factura: BigDecimal,  // 保留两位小数
    pub rut_cliente: String,
}

/// 销售明细表 (detalle_ventas), 每个明细行一行, 不去重
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetalleVenta {
    pub numero_factura: i64,
    pub descripcion_producto: String,
    pub unidades_vendidas: i64,
}

/// 规范化后的四张表
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MappedTables {
    pub clientes: Vec<Cliente>,
    pub productos: Vec<Producto>,
    pub ventas: Vec<Venta>,
    pub detalle_ventas: Vec<DetalleVenta>,
}

/// 校验结果
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub is_valid: bool,
    pub errors: Vec<String>,
}
