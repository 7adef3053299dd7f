use std::collections::HashMap;
use std::sync::Arc;

use crate::Result;
use crate::checkpoint::CheckpointStore;
use crate::message::Watermark;

/// `InMemoryCheckpointStore` keeps checkpoint records in a `HashMap` behind a
/// shared mutex. Clones share the same records.
#[derive(Clone, Default)]
pub struct InMemoryCheckpointStore {
    data: Arc<tokio::sync::Mutex<HashMap<String, Watermark>>>,
}

impl InMemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CheckpointStore for InMemoryCheckpointStore {
    async fn read_latest(&mut self, subscription: &str) -> Result<Option<Watermark>> {
        let data = self.data.lock().await;
        Ok(data.get(subscription).copied())
    }

    async fn upsert(&mut self, subscription: &str, watermark: Watermark) -> Result<()> {
        let mut data = self.data.lock().await;
        let stored = data.entry(subscription.to_string()).or_insert(watermark);
        if watermark >= *stored {
            *stored = watermark;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_upsert_creates_and_advances() {
        let mut store = InMemoryCheckpointStore::new();
        assert_eq!(store.read_latest("notify_winners").await.unwrap(), None);

        store.upsert("notify_winners", 100).await.unwrap();
        assert_eq!(
            store.read_latest("notify_winners").await.unwrap(),
            Some(100)
        );

        store.upsert("notify_winners", 160).await.unwrap();
        assert_eq!(
            store.read_latest("notify_winners").await.unwrap(),
            Some(160)
        );
    }

    #[tokio::test]
    async fn test_upsert_guards_against_regression() {
        let mut store = InMemoryCheckpointStore::new();
        store.upsert("notify_winners", 100).await.unwrap();

        // A stale write completing late must not move the resume point back.
        store.upsert("notify_winners", 50).await.unwrap();
        assert_eq!(
            store.read_latest("notify_winners").await.unwrap(),
            Some(100)
        );

        // Equal watermarks are idempotent.
        store.upsert("notify_winners", 100).await.unwrap();
        assert_eq!(
            store.read_latest("notify_winners").await.unwrap(),
            Some(100)
        );
    }

    #[tokio::test]
    async fn test_subscriptions_are_independent() {
        let mut store = InMemoryCheckpointStore::new();
        store.upsert("notify_winners", 100).await.unwrap();
        assert_eq!(store.read_latest("other").await.unwrap(), None);
    }
}
