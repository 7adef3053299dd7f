use crate::Result;
use crate::message::Watermark;

/// In-memory implementation, also the test double of choice.
pub mod memstore;

/// Fire-and-forget persistence of confirmed watermarks.
pub(crate) mod writer;

pub(crate) use writer::CheckpointWriterHandle;

/// Durable record store for confirmed watermarks, one record per
/// subscription name.
#[trait_variant::make(CheckpointStore: Send)]
pub trait LocalCheckpointStore {
    /// Highest persisted watermark for the subscription, or None if it has
    /// never been checkpointed.
    async fn read_latest(&mut self, subscription: &str) -> Result<Option<Watermark>>;

    /// Create the record if absent, otherwise advance it. The update is
    /// applied only when `watermark` is at or above the stored value, so a
    /// stale write that completes late cannot regress the resume point.
    async fn upsert(&mut self, subscription: &str, watermark: Watermark) -> Result<()>;
}
