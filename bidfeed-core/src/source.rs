use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::config::config;
use crate::message::{RawRecord, Watermark};
use crate::{Error, Result};

/// Feed backed by an in-process channel, for tests and embedders that bridge
/// an external subscription in.
pub mod channel;

/// Synthetic auction feed for demos and load testing.
pub mod generator;

/// Read side of a subscribe feed.
///
/// The feed is ordered: every data row of a watermark interval precedes the
/// progress marker that closes it, and markers never go backwards.
#[trait_variant::make(SubscribeReader: Send)]
pub trait LocalSubscribeReader {
    fn name(&self) -> &'static str;

    /// Next record from the feed. `Ok(None)` means the feed closed normally;
    /// an error is fatal to the session.
    async fn read(&mut self) -> Result<Option<RawRecord>>;
}

/// Establishes a subscribe feed at a resume point.
///
/// Connection failures are retryable; [`Error::ResumeExpired`] is not, since
/// reconnecting cannot bring expired history back.
#[trait_variant::make(SourceConnector: Send)]
pub trait LocalSourceConnector {
    async fn connect(&mut self, resume_from: Option<Watermark>) -> Result<SourceType>;
}

pub enum SourceType {
    Channel(channel::ChannelSubscribe),
    Generator(generator::BidGenerator),
}

enum ActorMessage {
    Read {
        respond_to: oneshot::Sender<Result<Option<RawRecord>>>,
    },
}

struct SourceActor<R> {
    receiver: mpsc::Receiver<ActorMessage>,
    reader: R,
}

impl<R> SourceActor<R>
where
    R: SubscribeReader,
{
    fn new(receiver: mpsc::Receiver<ActorMessage>, reader: R) -> Self {
        Self { receiver, reader }
    }

    async fn handle_message(&mut self, msg: ActorMessage) {
        match msg {
            ActorMessage::Read { respond_to } => {
                let record = self.reader.read().await;
                let _ = respond_to.send(record);
            }
        }
    }
}

#[derive(Clone)]
pub struct Source {
    sender: mpsc::Sender<ActorMessage>,
}

impl Source {
    pub fn new(src_type: SourceType) -> Self {
        let (sender, receiver) = mpsc::channel(10);
        match src_type {
            SourceType::Channel(reader) => {
                tokio::spawn(async move {
                    let mut actor = SourceActor::new(receiver, reader);
                    while let Some(msg) = actor.receiver.recv().await {
                        actor.handle_message(msg).await;
                    }
                });
            }
            SourceType::Generator(reader) => {
                tokio::spawn(async move {
                    let mut actor = SourceActor::new(receiver, reader);
                    while let Some(msg) = actor.receiver.recv().await {
                        actor.handle_message(msg).await;
                    }
                });
            }
        };
        Self { sender }
    }

    async fn read(&self) -> Result<Option<RawRecord>> {
        let (sender, receiver) = oneshot::channel();
        let msg = ActorMessage::Read { respond_to: sender };
        // Ignore send errors. If send fails, so does the recv.await below.
        let _ = self.sender.send(msg).await;
        receiver
            .await
            .map_err(|e| Error::ActorTaskTerminated(e.to_string()))?
    }

    /// Streams raw records until the feed ends, fails, or the token fires.
    /// The wait for the next record is itself interruptible by the token.
    pub(crate) fn streaming_read(
        &self,
        cln_token: CancellationToken,
    ) -> (ReceiverStream<RawRecord>, JoinHandle<Result<()>>) {
        let (records_tx, records_rx) = mpsc::channel(config().stream_buffer);
        let source = self.clone();
        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;

                    _ = cln_token.cancelled() => {
                        info!("Cancellation received, stopping the read loop");
                        return Ok(());
                    }
                    record = source.read() => match record {
                        Ok(Some(record)) => {
                            if records_tx.send(record).await.is_err() {
                                // Downstream is gone; nothing left to read for.
                                return Ok(());
                            }
                        }
                        Ok(None) => {
                            info!("Source closed the feed");
                            return Ok(());
                        }
                        Err(e) => {
                            error!(%e, "Reading from the source failed");
                            return Err(e);
                        }
                    },
                }
            }
        });
        (ReceiverStream::new(records_rx), handle)
    }
}

#[cfg(test)]
mod tests {
    use tokio_stream::StreamExt;

    use super::channel::ChannelSubscribe;
    use super::*;
    use crate::message::WinningBid;

    fn bid(bid_id: i64) -> WinningBid {
        WinningBid {
            auction_id: 1,
            bid_id,
            item: "Gift Basket".to_string(),
            amount: 100,
        }
    }

    #[tokio::test]
    async fn test_streaming_read_preserves_order_and_ends() {
        let (tx, rx) = mpsc::channel(10);
        let source = Source::new(SourceType::Channel(ChannelSubscribe::new(rx)));

        tx.send(Ok(RawRecord::Data(bid(1)))).await.unwrap();
        tx.send(Ok(RawRecord::Data(bid(2)))).await.unwrap();
        tx.send(Ok(RawRecord::Progress { watermark: 100 }))
            .await
            .unwrap();
        drop(tx);

        let (records, handle) = source.streaming_read(CancellationToken::new());
        let records: Vec<RawRecord> = records.collect().await;
        assert_eq!(
            records,
            vec![
                RawRecord::Data(bid(1)),
                RawRecord::Data(bid(2)),
                RawRecord::Progress { watermark: 100 },
            ]
        );
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_streaming_read_surfaces_source_error() {
        let (tx, rx) = mpsc::channel(10);
        let source = Source::new(SourceType::Channel(ChannelSubscribe::new(rx)));

        tx.send(Ok(RawRecord::Data(bid(1)))).await.unwrap();
        tx.send(Err(Error::Source("connection reset".to_string())))
            .await
            .unwrap();

        let (records, handle) = source.streaming_read(CancellationToken::new());
        let records: Vec<RawRecord> = records.collect().await;
        assert_eq!(records, vec![RawRecord::Data(bid(1))]);

        let err = handle.await.unwrap().unwrap_err();
        assert!(matches!(err, Error::Source(_)));
    }

    #[tokio::test]
    async fn test_streaming_read_stops_on_cancellation() {
        // The feed stays open and silent; only the token ends the loop.
        let (_tx, rx) = mpsc::channel::<Result<RawRecord>>(10);
        let source = Source::new(SourceType::Channel(ChannelSubscribe::new(rx)));

        let cln_token = CancellationToken::new();
        let (mut records, handle) = source.streaming_read(cln_token.clone());

        cln_token.cancel();
        assert_eq!(records.next().await, None);
        handle.await.unwrap().unwrap();
    }
}
