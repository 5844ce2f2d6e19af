pub mod pool;
pub mod registry;
pub mod store;
pub mod sync;

pub use pool::{create_store_pool, create_sync_pool};
pub use registry::{global_store, install_global_store, reset_global_store};
pub use store::InvoiceStore;
pub use sync::{sync_tables, SyncReport};
