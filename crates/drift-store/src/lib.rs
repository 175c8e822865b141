pub mod analytics;
pub mod error;
pub mod fold;
pub mod input;
pub mod memory;
pub mod sqlite_store;
pub mod store;

pub use analytics::compute_analytics;
pub use error::{StoreError, StoreResult};
pub use fold::persist_concurrently;
pub use input::{PersistInput, ResultStream};
pub use memory::InMemoryStore;
pub use sqlite_store::SqliteStore;
pub use store::ProjectAnalysisResultStore;
