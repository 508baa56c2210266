// =============================================================================
// Trade journal poller
// =============================================================================

use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use crate::feed::client::MarketClient;
use crate::feed::{FeedEvent, FeedSender};
use crate::market_data::TradeMarker;

/// Poll `GET /bot/trades` every `interval` and forward the list to the
/// controller whenever it changes. Returns when the controller is gone.
pub async fn run_trade_poller(client: MarketClient, interval: Duration, events: FeedSender) {
    info!(interval_secs = interval.as_secs(), "trade poller started");

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut last: Option<Vec<TradeMarker>> = None;

    loop {
        ticker.tick().await;

        if events.is_closed() {
            break;
        }

        match client.fetch_trades().await {
            Ok(trades) => {
                if last.as_ref() == Some(&trades) {
                    continue;
                }
                last = Some(trades.clone());
                if events.send(FeedEvent::TradesPolled(trades)).is_err() {
                    break;
                }
            }
            Err(e) => {
                // Markers are optional; keep whatever we had.
                warn!(error = %e, "trade journal fetch failed");
            }
        }
    }

    info!("trade poller stopped");
}
