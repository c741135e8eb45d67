use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// A named bucket of byte keys and values with optional expiry.
#[async_trait]
pub trait KeyValueCollection: Send + Sync {
    async fn get(&self, key: &[u8]) -> Option<Vec<u8>>;
    async fn put(&self, key: &[u8], value: &[u8], ttl: Option<Duration>);
}

pub trait Store: Send + Sync {
    /// Returns the collection `name`, creating it when `create_if_missing`.
    /// Persistent collections survive restarts; others live in memory.
    fn get_collection(
        &self,
        name: &str,
        persist: bool,
        create_if_missing: bool,
    ) -> Option<Arc<dyn KeyValueCollection>>;
}
