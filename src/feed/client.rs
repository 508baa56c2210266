// =============================================================================
// Market Data REST Client: historical snapshots & bot trade journal
// =============================================================================
//
// Both endpoints are public, unsigned GETs. Every request carries a 10 s
// timeout; non-2xx responses become errors carrying the status and body so
// the controller can surface them verbatim.
// =============================================================================

use anyhow::{Context, Result};
use tracing::{debug, instrument};

use crate::feed::messages::SnapshotResponse;
use crate::market_data::trades::parse_trades_payload;
use crate::market_data::{Candle, TradeMarker};
use crate::types::Selection;

/// REST client for the market-data service.
#[derive(Clone)]
pub struct MarketClient {
    base_url: String,
    client: reqwest::Client,
}

impl MarketClient {
    /// Create a new `MarketClient` rooted at `base_url`
    /// (e.g. `http://localhost:8000`).
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .context("failed to build reqwest client")?;

        debug!(base_url = %base_url, "MarketClient initialised");

        Ok(Self { base_url, client })
    }

    /// `GET /ohlcv/{exchange}/{symbol}` URL, without the query string.
    ///
    /// The symbol is inserted verbatim: the service routes `{symbol}` as a
    /// path, so `ADA/USD` keeps its slash.
    pub fn ohlcv_url(&self, selection: &Selection) -> String {
        format!(
            "{}/ohlcv/{}/{}",
            self.base_url, selection.exchange, selection.symbol
        )
    }

    // -------------------------------------------------------------------------
    // Snapshot
    // -------------------------------------------------------------------------

    /// GET /ohlcv/{exchange}/{symbol}?timeframe={tf}&limit={n}
    #[instrument(skip(self), name = "market::fetch_ohlcv")]
    pub async fn fetch_ohlcv(&self, selection: &Selection, limit: usize) -> Result<Vec<Candle>> {
        let url = self.ohlcv_url(selection);
        let limit = limit.to_string();

        let resp = self
            .client
            .get(&url)
            .query(&[("timeframe", selection.timeframe.as_str()), ("limit", limit.as_str())])
            .send()
            .await
            .with_context(|| format!("GET {url} request failed"))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("GET {url} returned {status}: {body}");
        }

        let body: SnapshotResponse = resp
            .json()
            .await
            .context("failed to parse OHLCV snapshot response")?;

        debug!(count = body.data.len(), "OHLCV snapshot retrieved");
        Ok(body.data)
    }

    // -------------------------------------------------------------------------
    // Trade journal
    // -------------------------------------------------------------------------

    /// GET /bot/trades
    #[instrument(skip(self), name = "market::fetch_trades")]
    pub async fn fetch_trades(&self) -> Result<Vec<TradeMarker>> {
        let url = format!("{}/bot/trades", self.base_url);

        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("GET {url} request failed"))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("GET {url} returned {status}: {body}");
        }

        let body: serde_json::Value = resp
            .json()
            .await
            .context("failed to parse trades response")?;

        let trades = parse_trades_payload(&body)?;
        debug!(count = trades.len(), "bot trades retrieved");
        Ok(trades)
    }
}
