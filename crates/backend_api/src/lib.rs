pub mod error;
pub mod handlers;
pub mod query;
pub mod repository;
pub mod router;
pub mod server;
pub mod state;
pub mod upload;

pub use error::{ApiError, Result};
pub use query::{Dataset, TransactionQuery};
pub use repository::{FileLedgerRepository, LedgerRepository};
pub use router::create_router;
pub use server::run_server;
pub use state::{AppState, PipelineSettings};
