use tokio::sync::mpsc;

use crate::message::{RawRecord, Watermark};
use crate::source::{SourceConnector, SourceType, SubscribeReader};
use crate::{Error, Result};

/// Subscribe feed backed by an in-process channel. The sending side plays
/// the remote end: records to deliver, an error value to fail the session,
/// or a drop to close the feed normally. Resume filtering is the feeding
/// side's responsibility.
pub struct ChannelSubscribe {
    records: mpsc::Receiver<Result<RawRecord>>,
}

impl ChannelSubscribe {
    pub fn new(records: mpsc::Receiver<Result<RawRecord>>) -> Self {
        Self { records }
    }
}

impl SubscribeReader for ChannelSubscribe {
    fn name(&self) -> &'static str {
        "channel"
    }

    async fn read(&mut self) -> Result<Option<RawRecord>> {
        match self.records.recv().await {
            Some(Ok(record)) => Ok(Some(record)),
            Some(Err(e)) => Err(e),
            None => Ok(None),
        }
    }
}

/// Connector for [`ChannelSubscribe`]. The feed is pre-wired, so connecting
/// consumes it; a second connect on the same feed fails.
pub struct ChannelConnector {
    records: Option<mpsc::Receiver<Result<RawRecord>>>,
}

impl ChannelConnector {
    pub fn new(records: mpsc::Receiver<Result<RawRecord>>) -> Self {
        Self {
            records: Some(records),
        }
    }
}

impl SourceConnector for ChannelConnector {
    async fn connect(&mut self, _resume_from: Option<Watermark>) -> Result<SourceType> {
        let records = self
            .records
            .take()
            .ok_or_else(|| Error::Source("channel feed already consumed".to_string()))?;
        Ok(SourceType::Channel(ChannelSubscribe::new(records)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::WinningBid;

    #[tokio::test]
    async fn test_channel_reader_passthrough() {
        let (tx, rx) = mpsc::channel(10);
        let mut reader = ChannelSubscribe::new(rx);

        let bid = WinningBid {
            auction_id: 3,
            bid_id: 11,
            item: "City Bar Crawl".to_string(),
            amount: 240,
        };
        tx.send(Ok(RawRecord::Data(bid.clone()))).await.unwrap();
        tx.send(Err(Error::Source("broken pipe".to_string())))
            .await
            .unwrap();

        assert_eq!(reader.read().await.unwrap(), Some(RawRecord::Data(bid)));
        assert!(matches!(reader.read().await, Err(Error::Source(_))));

        drop(tx);
        assert_eq!(reader.read().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_channel_connector_is_single_use() {
        let (_tx, rx) = mpsc::channel(1);
        let mut connector = ChannelConnector::new(rx);

        assert!(connector.connect(None).await.is_ok());
        assert!(matches!(
            connector.connect(None).await,
            Err(Error::Source(_))
        ));
    }
}
