//! Watermark-synchronized change-stream consumer with durable resume
//! checkpoints.
//!
//! A [`Pipeline`] owns one stream session: it reads the last confirmed
//! watermark for a subscription, opens the source feed at that point, and
//! forwards rows downstream only once a progress marker confirms them.
//! The confirmed watermark is persisted asynchronously so a restarted
//! session resumes without re-delivering confirmed rows (best-effort, not
//! exactly-once, because the checkpoint write may lag).
//!
//! ```text
//! (checkpoint store) --resume--> (source) --[c]--> (forwarder) --[c]--> downstream
//!                                                      |
//!                                                      v
//!                                              {checkpoint writer}
//!
//! [c] - channel
//! {} - fire-and-forget
//! ```

/// Checkpoint store seam and the asynchronous checkpoint writer.
pub mod checkpoint;

pub mod config;

pub mod error;
pub use crate::error::{Error, Result};

pub mod message;

/// Source adapters and the actor-backed read handle.
pub mod source;

mod forwarder;

pub mod pipeline;
pub use crate::pipeline::Pipeline;
