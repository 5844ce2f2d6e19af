use crate::error::{IngestError, Result};
use crate::models::{Cliente, MappedTables, Producto, Venta};
use chrono::NaiveDate;
use indexmap::IndexMap;
use serde::Serialize;
use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};

/// PostgreSQL 批量插入分块大小
const CHUNK_SIZE: usize = 1000;

const SCHEMA: [&str; 4] = [
    r#"
    CREATE TABLE IF NOT EXISTS clientes (
        rut VARCHAR(20) PRIMARY KEY,
        razon_social VARCHAR(255) NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS productos (
        id_producto SERIAL PRIMARY KEY,
        descripcion_producto VARCHAR(255) NOT NULL UNIQUE
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS ventas (
        numero_factura BIGINT PRIMARY KEY,
        fecha_factura DATE NOT NULL,
        monto_total_factura NUMERIC(12,2) NOT NULL,
        rut_cliente VARCHAR(20) NOT NULL REFERENCES clientes (rut)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS detalle_ventas (
        id_detalle_venta SERIAL PRIMARY KEY,
        numero_factura BIGINT NOT NULL REFERENCES ventas (numero_factura),
        id_producto INTEGER NOT NULL REFERENCES productos (id_producto),
        unidades_vendidas BIGINT NOT NULL,
        UNIQUE (numero_factura, id_producto)
    )
    "#,
];

/// 同步结果: 各表受影响行数
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub clientes: u64,
    pub productos: u64,
    pub ventas: u64,
    pub detalle_ventas: u64,
}

/// 建表 (幂等)
pub async fn ensure_schema(pool: &PgPool) -> Result<()> {
    for ddl in SCHEMA {
        sqlx::query(ddl).execute(pool).await?;
    }
    Ok(())
}

/// 在单个事务中同步四张表, 任一步失败整体回滚
pub async fn sync_tables(pool: &PgPool, tables: &MappedTables) -> Result<SyncReport> {
    let start_time = std::time::Instant::now();
    check_unique_invoice_numbers(tables)?;
    ensure_schema(pool).await?;

    let mut tx = pool.begin().await?;
    let mut report = SyncReport::default();

    for chunk in tables.clientes.chunks(CHUNK_SIZE) {
        report.clientes += upsert_clientes(&mut tx, chunk).await?;
    }
    for chunk in tables.productos.chunks(CHUNK_SIZE) {
        report.productos += insert_productos(&mut tx, chunk).await?;
    }
    for chunk in tables.ventas.chunks(CHUNK_SIZE) {
        report.ventas += insert_ventas(&mut tx, chunk).await?;
    }
    report.detalle_ventas = upsert_detalles(&mut tx, tables).await?;

    tx.commit().await?;
    tracing::info!("✓ 同步完成 {:?}, 耗时: {:?}", report, start_time.elapsed());
    Ok(report)
}

async fn upsert_clientes(tx: &mut Transaction<'_, Postgres>, clientes: &[Cliente]) -> Result<u64> {
    let mut query_builder = QueryBuilder::<Postgres>::new("INSERT INTO clientes (rut, razon_social) ");
    query_builder.push_values(clientes, |mut b, cliente| {
        b.push_bind(&cliente.rut).push_bind(&cliente.razon_social);
    });
    query_builder.push(" ON CONFLICT (rut) DO UPDATE SET razon_social = EXCLUDED.razon_social");

    let result = query_builder.build().execute(&mut **tx).await?;
    Ok(result.rows_affected())
}

async fn insert_productos(tx: &mut Transaction<'_, Postgres>, productos: &[Producto]) -> Result<u64> {
    let mut query_builder = QueryBuilder::<Postgres>::new("INSERT INTO productos (descripcion_producto) ");
    query_builder.push_values(productos, |mut b, producto| {
        b.push_bind(&producto.descripcion_producto);
    });
    query_builder.push(" ON CONFLICT (descripcion_producto) DO NOTHING");

    let result = query_builder.build().execute(&mut **tx).await?;
    Ok(result.rows_affected())
}

async fn insert_ventas(tx: &mut Transaction<'_, Postgres>, ventas: &[Venta]) -> Result<u64> {
    let fechas = ventas
        .iter()
        .map(|v| {
            NaiveDate::parse_from_str(&v.fecha_factura, "%Y-%m-%d").map_err(|_| {
                IngestError::Validation(vec![format!(
                    "Venta {}: invalid date ({})",
                    v.numero_factura, v.fecha_factura
                )])
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let mut query_builder = QueryBuilder::<Postgres>::new(
        "INSERT INTO ventas (numero_factura, fecha_factura, monto_total_factura, rut_cliente) "
    );
    query_builder.push_values(ventas.iter().zip(fechas), |mut b, (venta, fecha)| {
        b.push_bind(venta.numero_factura)
            .push_bind(fecha)
            .push_bind(venta.monto_total_factura.clone())
            .push_bind(&venta.rut_cliente);
    });
    query_builder.push(" ON CONFLICT (numero_factura) DO NOTHING");

    let result = query_builder.build().execute(&mut **tx).await?;
    Ok(result.rows_affected())
}

/// 同一发票同一商品的多行明细合并数量, 商品 id 通过描述关联解析
async fn upsert_detalles(tx: &mut Transaction<'_, Postgres>, tables: &MappedTables) -> Result<u64> {
    let merged = merge_detail_units(tables);
    if merged.is_empty() {
        return Ok(0);
    }

    let mut numeros = Vec::with_capacity(merged.len());
    let mut descripciones = Vec::with_capacity(merged.len());
    let mut unidades = Vec::with_capacity(merged.len());
    for ((numero, descripcion), cantidad) in merged {
        numeros.push(numero);
        descripciones.push(descripcion.to_string());
        unidades.push(cantidad);
    }

    let result = sqlx::query(
        r#"
        INSERT INTO detalle_ventas (numero_factura, id_producto, unidades_vendidas)
        SELECT d.numero_factura, p.id_producto, d.unidades_vendidas
        FROM UNNEST($1::int8[], $2::varchar[], $3::int8[])
             AS d(numero_factura, descripcion_producto, unidades_vendidas)
        INNER JOIN productos p ON p.descripcion_producto = d.descripcion_producto
        ON CONFLICT (numero_factura, id_producto)
        DO UPDATE SET unidades_vendidas = EXCLUDED.unidades_vendidas
        "#,
    )
    .bind(&numeros)
    .bind(&descripciones)
    .bind(&unidades)
    .execute(&mut **tx)
    .await?;

    Ok(result.rows_affected())
}

/// ventas 以 numero_factura 为主键; 不同开票方的同号发票无法区分, 拒绝同步
pub(crate) fn check_unique_invoice_numbers(tables: &MappedTables) -> Result<()> {
    let mut ruts_by_numero: IndexMap<i64, Vec<&str>> = IndexMap::new();
    for venta in &tables.ventas {
        ruts_by_numero
            .entry(venta.numero_factura)
            .or_default()
            .push(venta.rut_cliente.as_str());
    }

    let errors: Vec<String> = ruts_by_numero
        .into_iter()
        .filter(|(_, ruts)| ruts.len() > 1)
        .map(|(numero, ruts)| {
            format!(
                "Venta {}: invoice number appears {} times (customers {})",
                numero,
                ruts.len(),
                ruts.join(", ")
            )
        })
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        tracing::warn!("同步被拒绝: {} 个重复发票号", errors.len());
        Err(IngestError::Validation(errors))
    }
}

pub(crate) fn merge_detail_units(tables: &MappedTables) -> IndexMap<(i64, &str), i64> {
    let mut merged: IndexMap<(i64, &str), i64> = IndexMap::new();
    for detalle in &tables.detalle_ventas {
        *merged
            .entry((detalle.numero_factura, detalle.descripcion_producto.as_str()))
            .or_insert(0) += detalle.unidades_vendidas;
    }
    merged
}
