pub mod invoice;
pub mod tables;

pub use invoice::{InsertOutcome, InvoiceRecord, LineItem, Party, Tax};
pub use tables::{Cliente, DetalleVenta, MappedTables, Producto, ValidationReport, Venta};
