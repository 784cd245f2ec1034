use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use company_common::health::HealthHandle;
use company_common::kafka::{Offset, OffsetErr, RecvErr, SingleTopicConsumer};
use tracing::{info, warn};

use crate::metrics_consts::{EMPTY_EVENTS, EVENTS_RECEIVED, OFFSET_STORE_FAILED};
use crate::pipeline::Pipeline;

/// Where the ingestion loop pulls messages from.
#[async_trait]
pub trait MessageSource: Send + Sync {
    type Offset: Send;

    /// The next message and the offset to store once it is processed.
    /// `Ok(None)` means the source is exhausted.
    async fn recv(&self) -> Result<Option<(Vec<u8>, Self::Offset)>, RecvErr>;

    fn store_offset(&self, offset: Self::Offset) -> Result<(), OffsetErr>;
}

#[async_trait]
impl MessageSource for SingleTopicConsumer {
    type Offset = Offset;

    async fn recv(&self) -> Result<Option<(Vec<u8>, Offset)>, RecvErr> {
        SingleTopicConsumer::recv(self).await.map(Some)
    }

    fn store_offset(&self, offset: Offset) -> Result<(), OffsetErr> {
        offset.store()
    }
}

/// Pull messages one at a time until `shutdown` resolves or the source runs dry.
///
/// The offset of every message is stored once it has been processed, whatever
/// the outcome. Shutdown is only observed between messages. Errors from the
/// source other than an empty payload end the loop.
pub async fn run<S, F>(
    source: &S,
    pipeline: &Pipeline,
    liveness: &HealthHandle,
    idle_report: Duration,
    shutdown: F,
) -> Result<(), RecvErr>
where
    S: MessageSource,
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);
    let mut heartbeat = tokio::time::interval(idle_report);

    loop {
        let received = tokio::select! {
            biased;
            _ = &mut shutdown => {
                info!("shutdown requested, stopping consumer");
                return Ok(());
            }
            _ = heartbeat.tick() => {
                liveness.report_healthy();
                continue;
            }
            received = source.recv() => received,
        };

        let (payload, offset) = match received {
            Ok(Some(message)) => message,
            Ok(None) => {
                info!("message source exhausted, stopping consumer");
                return Ok(());
            }
            Err(RecvErr::Empty { partition, offset }) => {
                warn!(partition, offset, "received empty event");
                metrics::counter!(EMPTY_EVENTS).increment(1);
                continue;
            }
            Err(e) => return Err(e),
        };

        metrics::counter!(EVENTS_RECEIVED).increment(1);
        pipeline.process(&payload).await;
        liveness.report_healthy();

        if let Err(e) = source.store_offset(offset) {
            warn!(error = %e, "failed to store offset");
            metrics::counter!(OFFSET_STORE_FAILED).increment(1);
        }
    }
}
