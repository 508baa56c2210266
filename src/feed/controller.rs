// =============================================================================
// Feed Controller: the state machine that owns the candle store
// =============================================================================
//
//   Idle → FetchingSnapshot → Connecting → Live ⇄ Reconnecting → Closed
//
// Runs as a single tokio task. Commands (selection, retry, indicator toggles)
// and I/O completions arrive on one queue and are handled strictly one at a
// time, so the store, the channel handles and the phase never need a lock.
//
// Every selection bumps `generation`. Spawned I/O is tagged with the
// generation it was started for and anything older than the current one is
// dropped on arrival. Together with `ChannelHandle` aborting on replace, this
// keeps stale data out of the store after an instrument switch.
// =============================================================================

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, info, warn};

use crate::app_state::ChartState;
use crate::chart::compose;
use crate::feed::channel::{ChannelHandle, ChannelKind};
use crate::feed::messages::{parse_ohlcv_message, OhlcvMessage};
use crate::feed::transport::FeedTransport;
use crate::feed::{FeedEvent, FeedSender};
use crate::market_data::ticker::parse_ticker_message;
use crate::market_data::{Candle, CandleStore, TradeMarker};
use crate::runtime_config::{ChartConfig, IndicatorParams, IndicatorToggles};
use crate::types::{FeedFault, FeedPhase, FeedStatus, Selection};

pub struct FeedController<T: FeedTransport> {
    transport: T,
    /// Our own queue; handed to every piece of I/O we start.
    events: FeedSender,
    shared: Arc<ChartState>,

    params: IndicatorParams,
    toggles: IndicatorToggles,
    reconnect_delay: Option<Duration>,

    phase: FeedPhase,
    selection: Option<Selection>,
    generation: u64,
    store: CandleStore,
    trades: Vec<TradeMarker>,
    fault: Option<FeedFault>,

    ohlcv_channel: Option<ChannelHandle>,
    ticker_channel: Option<ChannelHandle>,
}

impl<T: FeedTransport> FeedController<T> {
    pub fn new(transport: T, events: FeedSender, shared: Arc<ChartState>, config: &ChartConfig) -> Self {
        let reconnect_delay =
            (config.reconnect_delay_secs > 0).then(|| Duration::from_secs(config.reconnect_delay_secs));

        Self {
            transport,
            events,
            shared,
            params: config.indicator_params.clone(),
            toggles: config.indicators,
            reconnect_delay,
            phase: FeedPhase::Idle,
            selection: None,
            generation: 0,
            store: CandleStore::new(config.max_candles),
            trades: Vec::new(),
            fault: None,
            ohlcv_channel: None,
            ticker_channel: None,
        }
    }

    /// Process events until `Shutdown` (or until every sender is gone).
    pub async fn run(mut self, mut inbox: UnboundedReceiver<FeedEvent>) {
        info!("feed controller started");

        while let Some(event) = inbox.recv().await {
            let shutdown = matches!(event, FeedEvent::Shutdown);
            self.process(event);
            if shutdown {
                break;
            }
        }

        self.close_channels();
        info!("feed controller stopped");
    }

    /// Handle one event and republish if anything visible changed.
    pub fn process(&mut self, event: FeedEvent) {
        if self.handle(event) {
            self.publish();
        }
    }

    /// Apply one event. Returns `true` when the dataset or status changed.
    pub fn handle(&mut self, event: FeedEvent) -> bool {
        if self.phase == FeedPhase::Closed {
            debug!(event = ?event, "controller closed -- event ignored");
            return false;
        }

        match event {
            FeedEvent::Select(selection) => {
                self.start(selection);
                true
            }
            FeedEvent::Retry => match self.selection.clone() {
                Some(selection) => {
                    info!(selection = %selection, "manual retry");
                    self.start(selection);
                    true
                }
                None => {
                    warn!("retry requested with no selection");
                    false
                }
            },
            FeedEvent::SetIndicators(update) => {
                let changes = self.toggles.apply(update);
                if changes.is_empty() {
                    return false;
                }
                info!(changes = ?changes, "indicator toggles updated");
                true
            }
            FeedEvent::Shutdown => {
                self.close_channels();
                self.phase = FeedPhase::Closed;
                info!("feed closed");
                true
            }
            FeedEvent::TradesPolled(trades) => {
                if trades == self.trades {
                    return false;
                }
                debug!(count = trades.len(), "trade markers updated");
                self.shared.set_trades(trades.clone());
                self.trades = trades;
                true
            }
            FeedEvent::SnapshotFetched { generation, result } => {
                if self.is_stale(generation, "snapshot") {
                    return false;
                }
                self.on_snapshot(result);
                true
            }
            FeedEvent::ChannelOpened { generation, kind } => {
                if self.is_stale(generation, "channel open") {
                    return false;
                }
                self.on_channel_opened(kind)
            }
            FeedEvent::ChannelMessage {
                generation,
                kind,
                text,
            } => {
                if self.is_stale(generation, "channel message") {
                    return false;
                }
                self.on_channel_message(kind, &text)
            }
            FeedEvent::ChannelClosed {
                generation,
                kind,
                error,
            } => {
                if self.is_stale(generation, "channel close") {
                    return false;
                }
                self.on_channel_closed(kind, error)
            }
            FeedEvent::ReconnectDue { generation } => {
                if self.is_stale(generation, "reconnect timer") || self.phase != FeedPhase::Reconnecting {
                    return false;
                }
                match self.selection.clone() {
                    Some(selection) => {
                        info!(selection = %selection, "timed reconnect");
                        self.start(selection);
                        true
                    }
                    None => false,
                }
            }
        }
    }

    // -------------------------------------------------------------------------
    // Transitions
    // -------------------------------------------------------------------------

    /// Enter `FetchingSnapshot` for `selection`, dropping everything tied to
    /// the previous generation.
    ///
    /// The store and ticker are only discarded when the selection actually
    /// changes. A retry of the same selection keeps the last candles on screen
    /// until the next snapshot or `initial_ohlcv` replaces them wholesale.
    fn start(&mut self, selection: Selection) {
        self.close_channels();
        self.generation += 1;
        self.fault = None;
        self.phase = FeedPhase::FetchingSnapshot;

        if self.selection.as_ref() != Some(&selection) {
            self.store.clear();
            self.shared.set_ticker(None);
        }

        info!(selection = %selection, generation = self.generation, "fetching snapshot");
        self.transport
            .fetch_snapshot(&selection, self.generation, self.events.clone());
        self.selection = Some(selection);
    }

    fn on_snapshot(&mut self, result: anyhow::Result<Vec<Candle>>) {
        match result {
            Ok(candles) => {
                info!(count = candles.len(), "snapshot loaded");
                self.store.replace_all(candles);
            }
            Err(e) => {
                warn!(error = %e, "snapshot fetch failed -- connecting anyway");
                self.fault = Some(FeedFault::SnapshotFailed(format!("{e:#}")));
            }
        }
        self.connect();
    }

    /// Enter `Connecting`: open both channels for the current generation.
    fn connect(&mut self) {
        let Some(selection) = self.selection.clone() else {
            return;
        };
        self.phase = FeedPhase::Connecting;

        let ohlcv = self.transport.open_channel(
            ChannelKind::Ohlcv,
            &selection,
            self.generation,
            self.events.clone(),
        );
        let ticker = self.transport.open_channel(
            ChannelKind::Ticker,
            &selection,
            self.generation,
            self.events.clone(),
        );

        // Assigning drops (and aborts) any previous handle.
        self.ohlcv_channel = Some(ohlcv);
        self.ticker_channel = Some(ticker);
    }

    fn on_channel_opened(&mut self, kind: ChannelKind) -> bool {
        match kind {
            ChannelKind::Ohlcv => {
                self.phase = FeedPhase::Live;
                self.fault = None;
                info!(
                    generation = self.generation,
                    has_history = !self.store.is_empty(),
                    "feed live"
                );
                true
            }
            ChannelKind::Ticker => {
                debug!("ticker channel open");
                false
            }
        }
    }

    fn on_channel_message(&mut self, kind: ChannelKind, text: &str) -> bool {
        match kind {
            ChannelKind::Ohlcv => match parse_ohlcv_message(text) {
                Ok(OhlcvMessage::InitialOhlcv { data }) => {
                    debug!(count = data.len(), "initial OHLCV received");
                    self.store.replace_all(data);
                    true
                }
                Ok(OhlcvMessage::OhlcvUpdate(candle)) => {
                    let outcome = self.store.apply_update(candle);
                    debug!(
                        timestamp = candle.timestamp,
                        outcome = ?outcome,
                        tail = ?self.store.last().map(|c| c.timestamp),
                        "OHLCV update"
                    );
                    true
                }
                Err(e) => {
                    warn!(error = %e, "dropping malformed OHLCV message");
                    false
                }
            },
            ChannelKind::Ticker => {
                match parse_ticker_message(text) {
                    Ok(ticker) => self.shared.set_ticker(Some(ticker)),
                    Err(e) => warn!(error = %e, "dropping malformed ticker message"),
                }
                // Ticker updates don't touch the dataset.
                false
            }
        }
    }

    fn on_channel_closed(&mut self, kind: ChannelKind, error: Option<String>) -> bool {
        match kind {
            ChannelKind::Ohlcv => {
                self.ohlcv_channel = None;
                self.phase = FeedPhase::Reconnecting;

                match error {
                    Some(msg) => {
                        warn!(error = %msg, "OHLCV channel failed");
                        self.fault = Some(FeedFault::ChannelFailed(msg));
                    }
                    None => info!("OHLCV channel closed"),
                }

                if let Some(delay) = self.reconnect_delay {
                    self.transport
                        .schedule_reconnect(delay, self.generation, self.events.clone());
                }
                true
            }
            ChannelKind::Ticker => {
                self.ticker_channel = None;
                match error {
                    Some(msg) => warn!(error = %msg, "ticker channel failed"),
                    None => debug!("ticker channel closed"),
                }
                false
            }
        }
    }

    fn close_channels(&mut self) {
        if let Some(handle) = self.ohlcv_channel.take() {
            handle.close();
        }
        if let Some(handle) = self.ticker_channel.take() {
            handle.close();
        }
    }

    fn is_stale(&self, generation: u64, what: &'static str) -> bool {
        if generation == self.generation {
            return false;
        }
        debug!(what, generation, current = self.generation, "discarding stale result");
        true
    }

    // -------------------------------------------------------------------------
    // Publishing
    // -------------------------------------------------------------------------

    pub fn status(&self) -> FeedStatus {
        FeedStatus {
            phase: self.phase,
            selection: self.selection.clone(),
            fault: self.fault.clone(),
            candle_count: self.store.len(),
            anomalies: self.store.anomalies(),
        }
    }

    /// Recompose from scratch and swap the result into the shared state.
    pub fn publish(&self) {
        let dataset = compose(
            self.selection.as_ref(),
            self.store.candles().iter().copied().collect(),
            self.toggles,
            &self.params,
            &self.trades,
        );
        self.shared.publish(dataset, self.status(), self.toggles);
    }
}
