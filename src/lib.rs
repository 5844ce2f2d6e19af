pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod service;

pub use api::create_router;
pub use config::AppConfig;
pub use db::{global_store, InvoiceStore};
pub use error::{IngestError, Result};
pub use service::IngestService;
