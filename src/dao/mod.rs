/// JSON file backend for statistics.
pub mod json_file;
/// Persisted record definitions.
pub mod models;
/// Storage abstraction layer for persistence operations.
pub mod storage;

use futures::future::BoxFuture;

use crate::dao::{models::StatsDocument, storage::StorageResult};

/// Abstraction over where historical statistics are kept.
pub trait StatsStore: Send + Sync {
    /// Read the whole document; a store that was never written yields the default document.
    fn load(&self) -> BoxFuture<'static, StorageResult<StatsDocument>>;
    /// Replace the whole document.
    fn save(&self, document: StatsDocument) -> BoxFuture<'static, StorageResult<()>>;
}
