//! The forwarder turns the raw subscribe feed into the confirmed stream a
//! client may see. Rows are staged as they arrive and released only when a
//! progress marker closes their interval:
//!
//! ```text
//! (source) --[c]--> (forwarder) --[c]--> downstream
//!                       |
//!                       v
//!               {checkpoint writer}
//!
//! [c] - channel
//! {} - fire-and-forget
//! ```
//!
//! A row that was never covered by a marker is never emitted, in this
//! session or any later one. The checkpoint write is scheduled after the
//! flush and never awaited.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::checkpoint::CheckpointWriterHandle;
use crate::config::config;
use crate::message::{RawRecord, Watermark, WinningBid};
use crate::{Error, Result};

pub(crate) struct Forwarder {
    records: ReceiverStream<RawRecord>,
    checkpoint: CheckpointWriterHandle,
    subscription: String,
    last_confirmed: Option<Watermark>,
}

impl Forwarder {
    pub(crate) fn new(
        records: ReceiverStream<RawRecord>,
        checkpoint: CheckpointWriterHandle,
        subscription: String,
        resume_from: Option<Watermark>,
    ) -> Self {
        Self {
            records,
            checkpoint,
            subscription,
            last_confirmed: resume_from,
        }
    }

    /// Runs until the record stream ends, the token fires, or a malformed
    /// record fails the session. Returns the stream of confirmed bids and
    /// the task handle carrying the session outcome.
    pub(crate) fn start(
        self,
        cln_token: CancellationToken,
    ) -> (ReceiverStream<WinningBid>, JoinHandle<Result<()>>) {
        let (events_tx, events_rx) = mpsc::channel(config().stream_buffer);
        let handle = tokio::spawn(async move { self.run(cln_token, events_tx).await });
        (ReceiverStream::new(events_rx), handle)
    }

    async fn run(
        mut self,
        cln_token: CancellationToken,
        events_tx: mpsc::Sender<WinningBid>,
    ) -> Result<()> {
        let mut staged: Vec<WinningBid> = Vec::new();

        loop {
            let record = tokio::select! {
                biased;

                _ = cln_token.cancelled() => {
                    info!(
                        subscription = %self.subscription,
                        discarded = staged.len(),
                        "Cancellation received, discarding unconfirmed rows"
                    );
                    return Ok(());
                }
                record = self.records.next() => record,
            };

            let Some(record) = record else {
                info!(
                    subscription = %self.subscription,
                    discarded = staged.len(),
                    "Record stream ended, discarding unconfirmed rows"
                );
                return Ok(());
            };

            match record {
                RawRecord::Data(bid) => staged.push(bid),
                RawRecord::Progress { watermark } => {
                    if let Some(last) = self.last_confirmed {
                        if watermark < last {
                            error!(
                                subscription = %self.subscription,
                                watermark,
                                last_confirmed = last,
                                "Progress marker went backwards"
                            );
                            return Err(Error::MalformedRecord(format!(
                                "progress marker {watermark} below confirmed watermark {last}"
                            )));
                        }
                    }

                    for bid in staged.drain(..) {
                        tokio::select! {
                            biased;

                            _ = cln_token.cancelled() => {
                                info!(
                                    subscription = %self.subscription,
                                    "Cancellation received while flushing"
                                );
                                return Ok(());
                            }
                            sent = events_tx.send(bid) => {
                                if sent.is_err() {
                                    info!(
                                        subscription = %self.subscription,
                                        "Downstream closed, ending the session"
                                    );
                                    return Ok(());
                                }
                            }
                        }
                    }

                    self.last_confirmed = Some(watermark);
                    self.checkpoint.record(watermark);
                }
            }
        }
    }
}
