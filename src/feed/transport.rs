// =============================================================================
// Feed transport: the seam between the controller and real network I/O
// =============================================================================

use std::time::Duration;

use tracing::debug;

use crate::feed::channel::{channel_url, run_channel, ChannelHandle, ChannelKind};
use crate::feed::client::MarketClient;
use crate::feed::{FeedEvent, FeedSender};
use crate::types::Selection;

/// I/O the feed controller starts. Every method returns immediately; results
/// arrive later on `events`, tagged with `generation`.
pub trait FeedTransport: Send + Sync {
    /// Fetch the historical snapshot and send `FeedEvent::SnapshotFetched`.
    fn fetch_snapshot(&self, selection: &Selection, generation: u64, events: FeedSender);

    /// Open a push channel. The returned handle owns it.
    fn open_channel(
        &self,
        kind: ChannelKind,
        selection: &Selection,
        generation: u64,
        events: FeedSender,
    ) -> ChannelHandle;

    /// Send `FeedEvent::ReconnectDue` after `delay`.
    fn schedule_reconnect(&self, delay: Duration, generation: u64, events: FeedSender);
}

/// Tokio-backed transport talking to the market-data service.
pub struct LiveTransport {
    client: MarketClient,
    ws_base: String,
    snapshot_limit: usize,
}

impl LiveTransport {
    pub fn new(client: MarketClient, ws_base: impl Into<String>, snapshot_limit: usize) -> Self {
        Self {
            client,
            ws_base: ws_base.into(),
            snapshot_limit,
        }
    }
}

impl FeedTransport for LiveTransport {
    fn fetch_snapshot(&self, selection: &Selection, generation: u64, events: FeedSender) {
        let client = self.client.clone();
        let selection = selection.clone();
        let limit = self.snapshot_limit;
        tokio::spawn(async move {
            let result = client.fetch_ohlcv(&selection, limit).await;
            let _ = events.send(FeedEvent::SnapshotFetched { generation, result });
        });
    }

    fn open_channel(
        &self,
        kind: ChannelKind,
        selection: &Selection,
        generation: u64,
        events: FeedSender,
    ) -> ChannelHandle {
        let url = channel_url(&self.ws_base, kind, selection);
        let task = tokio::spawn(run_channel(url, kind, generation, events));
        ChannelHandle::spawned(kind, generation, task)
    }

    fn schedule_reconnect(&self, delay: Duration, generation: u64, events: FeedSender) {
        debug!(delay_ms = delay.as_millis() as u64, generation, "reconnect scheduled");
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = events.send(FeedEvent::ReconnectDue { generation });
        });
    }
}
