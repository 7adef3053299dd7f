use tokio::sync::watch;
use tracing::error;

use crate::checkpoint::CheckpointStore;
use crate::message::Watermark;

struct CheckpointWriterActor<S> {
    pending: watch::Receiver<Option<Watermark>>,
    store: S,
    subscription: String,
}

impl<S> CheckpointWriterActor<S>
where
    S: CheckpointStore,
{
    async fn run(&mut self) {
        while self.pending.changed().await.is_ok() {
            let Some(watermark) = *self.pending.borrow_and_update() else {
                continue;
            };
            if let Err(e) = self.store.upsert(&self.subscription, watermark).await {
                // Non-fatal: a restart may resume from an older watermark,
                // never a newer one.
                error!(
                    subscription = %self.subscription,
                    watermark,
                    %e,
                    "Checkpoint write failed"
                );
            }
        }
    }
}

/// Handle to the checkpoint writer task. Dropping every handle lets the task
/// finish its in-flight write and exit.
#[derive(Clone)]
pub(crate) struct CheckpointWriterHandle {
    pending: watch::Sender<Option<Watermark>>,
}

impl CheckpointWriterHandle {
    pub(crate) fn new<S>(store: S, subscription: String) -> Self
    where
        S: CheckpointStore + 'static,
    {
        let (pending_tx, pending_rx) = watch::channel(None);
        tokio::spawn(async move {
            let mut actor = CheckpointWriterActor {
                pending: pending_rx,
                store,
                subscription,
            };
            actor.run().await;
        });
        Self {
            pending: pending_tx,
        }
    }

    /// Schedule a write without waiting for it. Pending values coalesce to
    /// the newest watermark; the store's monotonicity guard makes skipped or
    /// reordered writes harmless.
    pub(crate) fn record(&self, watermark: Watermark) {
        self.pending.send_replace(Some(watermark));
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use tokio::sync::Semaphore;

    use super::*;
    use crate::checkpoint::memstore::InMemoryCheckpointStore;
    use crate::error::Error;

    async fn wait_for<F: Fn() -> bool>(cond: F) {
        for _ in 0..100 {
            if cond() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not reached within timeout");
    }

    #[tokio::test]
    async fn test_recorded_watermark_lands() {
        let mut store = InMemoryCheckpointStore::new();
        let writer = CheckpointWriterHandle::new(store.clone(), "notify_winners".to_string());

        writer.record(100);

        for _ in 0..100 {
            if store.read_latest("notify_winners").await.unwrap() == Some(100) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("checkpoint was never persisted");
    }

    /// Store whose writes park on a semaphore so the test can hold the actor
    /// mid-upsert and observe coalescing.
    #[derive(Clone)]
    struct GatedStore {
        upserts: Arc<Mutex<Vec<Watermark>>>,
        gate: Arc<Semaphore>,
    }

    impl CheckpointStore for GatedStore {
        async fn read_latest(&mut self, _subscription: &str) -> crate::Result<Option<Watermark>> {
            Ok(self.upserts.lock().unwrap().last().copied())
        }

        async fn upsert(&mut self, _subscription: &str, watermark: Watermark) -> crate::Result<()> {
            self.upserts.lock().unwrap().push(watermark);
            let permit = self.gate.acquire().await.expect("gate closed");
            permit.forget();
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_pending_watermarks_coalesce_to_newest() {
        let upserts = Arc::new(Mutex::new(Vec::new()));
        let gate = Arc::new(Semaphore::new(0));
        let store = GatedStore {
            upserts: Arc::clone(&upserts),
            gate: Arc::clone(&gate),
        };
        let writer = CheckpointWriterHandle::new(store, "notify_winners".to_string());

        writer.record(10);
        wait_for(|| *upserts.lock().unwrap() == vec![10]).await;

        // Scheduled while the first write is still in flight; only the
        // newest survives.
        writer.record(20);
        writer.record(30);
        gate.add_permits(1);

        wait_for(|| upserts.lock().unwrap().len() == 2).await;
        assert_eq!(*upserts.lock().unwrap(), vec![10, 30]);
        gate.add_permits(1);
    }

    #[derive(Clone)]
    struct FlakyStore {
        inner: InMemoryCheckpointStore,
        fail_next: Arc<AtomicBool>,
    }

    impl CheckpointStore for FlakyStore {
        async fn read_latest(&mut self, subscription: &str) -> crate::Result<Option<Watermark>> {
            self.inner.read_latest(subscription).await
        }

        async fn upsert(&mut self, subscription: &str, watermark: Watermark) -> crate::Result<()> {
            if self.fail_next.swap(false, Ordering::SeqCst) {
                return Err(Error::CheckpointWrite("store unavailable".to_string()));
            }
            self.inner.upsert(subscription, watermark).await
        }
    }

    #[tokio::test]
    async fn test_write_failure_does_not_stop_the_writer() {
        let mut inner = InMemoryCheckpointStore::new();
        let fail_next = Arc::new(AtomicBool::new(true));
        let store = FlakyStore {
            inner: inner.clone(),
            fail_next: Arc::clone(&fail_next),
        };
        let writer = CheckpointWriterHandle::new(store, "notify_winners".to_string());

        writer.record(10);
        wait_for(|| !fail_next.load(Ordering::SeqCst)).await;
        writer.record(20);

        for _ in 0..100 {
            if inner.read_latest("notify_winners").await.unwrap() == Some(20) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("writer stopped after a failed write");
    }
}
