//! Persistence layer for the workflow engine.
//!
//! Exposes the `WorkflowStore`/`RunStore` traits the engine depends on, plus
//! an in-memory implementation (tests, the demo CLI) and a PostgreSQL one
//! backed by the `workflows`, `steps`, `runs`, and `run_steps` tables.

pub mod error;
pub mod memory;
pub mod pg;
pub mod pool;
pub mod store;

pub use error::StorageError;
pub use memory::{InMemoryRunStore, InMemoryWorkflowStore};
pub use pg::{PgRunStore, PgWorkflowStore};
pub use pool::{create_pool, DatabaseConfig};
pub use store::{RunStore, WorkflowStore};
