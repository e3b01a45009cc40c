use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// OHLC candlestick as returned by Kraken
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Candle {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub vwap: f64, // volume-weighted average price
    pub volume: f64,
    pub count: u64, // number of trades
}

/// One page of OHLC data plus the cursor for the next `since` query
#[derive(Debug, Clone)]
pub struct OhlcPage {
    pub candles: Vec<Candle>,
    pub last: Option<i64>,
}

/// Asset symbol -> available amount
pub type Balances = BTreeMap<String, f64>;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderSide::Buy => "buy",
            OrderSide::Sell => "sell",
        }
    }

    /// Side of the order that offsets a position opened on this side
    pub fn opposite(&self) -> OrderSide {
        match self {
            OrderSide::Buy => OrderSide::Sell,
            OrderSide::Sell => OrderSide::Buy,
        }
    }
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resting order on the book
#[derive(Debug, Clone, PartialEq)]
pub struct OpenOrder {
    pub txid: String,
    pub pair: String,
    pub side: OrderSide,
    pub volume: f64,
}

/// Open margin position
#[derive(Debug, Clone, PartialEq)]
pub struct OpenPosition {
    pub txid: String,
    pub pair: String,
    pub side: OrderSide,
    pub volume: f64,
}

/// Acknowledgement for a CancelOrder request
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct CancelAck {
    pub count: u32,
    #[serde(default)]
    pub pending: bool,
}

/// A buy or sell condition that fired on a specific candle
#[derive(Debug, Clone, PartialEq)]
pub struct SignalEvent {
    pub index: usize,
    pub timestamp: DateTime<Utc>,
    pub side: OrderSide,
    pub price: f64,
}
