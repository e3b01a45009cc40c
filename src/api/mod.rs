pub mod kraken;

pub use kraken::KrakenClient;

use crate::error::KrakenError;
use crate::models::{Balances, CancelAck, Candle, OpenOrder, OpenPosition, OrderSide};

/// Operations the strategy loop needs from an exchange
#[allow(async_fn_in_trait)]
pub trait Exchange {
    /// OHLC candles for `pair`, ascending by time. `interval` is in minutes.
    async fn fetch_candles(
        &self,
        pair: &str,
        interval: u32,
        since: Option<i64>,
    ) -> Result<Vec<Candle>, KrakenError>;

    async fn fetch_balance(&self) -> Result<Balances, KrakenError>;

    async fn fetch_open_orders(&self, pair: &str) -> Result<Vec<OpenOrder>, KrakenError>;

    async fn fetch_open_positions(&self) -> Result<Vec<OpenPosition>, KrakenError>;

    async fn cancel_order(&self, txid: &str) -> Result<CancelAck, KrakenError>;

    async fn place_market_order(
        &self,
        pair: &str,
        side: OrderSide,
        volume: f64,
    ) -> Result<String, KrakenError>;
}
