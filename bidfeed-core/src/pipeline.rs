use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::checkpoint::{CheckpointStore, CheckpointWriterHandle};
use crate::config::config;
use crate::forwarder::Forwarder;
use crate::message::{Watermark, WinningBid};
use crate::source::{Source, SourceConnector, SourceType};
use crate::{Error, Result};

/// One logical stream session for a subscription: resume-point lookup,
/// source connection, confirmed emission, teardown. Sessions are one-shot;
/// restarting means building a new pipeline, which resumes from the last
/// confirmed checkpoint.
pub struct Pipeline<S> {
    store: S,
    subscription: String,
}

impl<S> Pipeline<S>
where
    S: CheckpointStore + Clone + 'static,
{
    pub fn new(store: S, subscription: impl Into<String>) -> Self {
        Self {
            store,
            subscription: subscription.into(),
        }
    }

    /// Starts the session and returns the stream of confirmed winning bids
    /// together with the session handle. The stream ends on cancellation,
    /// source exhaustion, or a fatal error; the handle reports which.
    pub async fn stream<C>(
        mut self,
        mut connector: C,
        cln_token: CancellationToken,
    ) -> Result<(ReceiverStream<WinningBid>, JoinHandle<Result<()>>)>
    where
        C: SourceConnector,
    {
        let resume_from = self.resume_point().await;
        info!(subscription = %self.subscription, ?resume_from, "Starting stream session");

        let source_type = self.connect_source(&mut connector, resume_from).await?;
        let source = Source::new(source_type);

        // Child of the caller's token: external cancellation propagates
        // down, and the supervisor can stop the reader on its own if the
        // forwarder quits first.
        let session_token = cln_token.child_token();

        let (records, reader_handle) = source.streaming_read(session_token.clone());
        let checkpoint = CheckpointWriterHandle::new(self.store.clone(), self.subscription.clone());
        let forwarder = Forwarder::new(records, checkpoint, self.subscription.clone(), resume_from);
        let (events, forwarder_handle) = forwarder.start(session_token.clone());

        let subscription = self.subscription;
        let handle = tokio::spawn(async move {
            let forwarder_result = forwarder_handle
                .await
                .map_err(|e| Error::Forwarder(format!("Joining forwarder task: {e:?}")))?;
            // The forwarder is gone; stop the reader so its handle resolves
            // even when the feed is still open.
            session_token.cancel();
            let reader_result = reader_handle
                .await
                .map_err(|e| Error::Forwarder(format!("Joining reader task: {e:?}")))?;

            reader_result
                .inspect_err(|e| error!(subscription = %subscription, %e, "Source read failed"))?;
            forwarder_result
                .inspect_err(|e| error!(subscription = %subscription, %e, "Forwarder failed"))?;

            info!(subscription = %subscription, "Stream session completed");
            Ok(())
        });

        Ok((events, handle))
    }

    /// Resume point for this subscription. A failed read is a degraded
    /// start: the session falls back to a full snapshot rather than
    /// refusing to serve.
    async fn resume_point(&mut self) -> Option<Watermark> {
        match self.store.read_latest(&self.subscription).await {
            Ok(watermark) => watermark,
            Err(e) => {
                warn!(
                    subscription = %self.subscription,
                    %e,
                    "Reading the checkpoint failed, starting from scratch"
                );
                None
            }
        }
    }

    async fn connect_source<C>(
        &self,
        connector: &mut C,
        resume_from: Option<Watermark>,
    ) -> Result<SourceType>
    where
        C: SourceConnector,
    {
        let mut attempt = 0;
        loop {
            match connector.connect(resume_from).await {
                Ok(source_type) => return Ok(source_type),
                Err(e @ Error::ResumeExpired { .. }) => {
                    error!(
                        subscription = %self.subscription,
                        %e,
                        "Resume point no longer retained by the source"
                    );
                    return Err(e);
                }
                Err(e) => {
                    attempt += 1;
                    if attempt > config().source_retries {
                        error!(
                            subscription = %self.subscription,
                            %e,
                            "Source connection retries exhausted"
                        );
                        return Err(e);
                    }
                    warn!(
                        subscription = %self.subscription,
                        attempt,
                        %e,
                        "Source connection failed, retrying"
                    );
                    tokio::time::sleep(config().source_retry_interval).await;
                }
            }
        }
    }
}
