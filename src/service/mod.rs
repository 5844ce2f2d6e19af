pub mod assistant;
pub mod export;
pub mod ingest;
pub mod mapper;
pub mod validator;

pub use assistant::{GenerationRequest, GenerativeModel, InvoiceAssistant};
pub use export::ProcessSummary;
pub use ingest::IngestService;
pub use mapper::map_invoices;
pub use validator::validate_tables;
