// Trading strategy module
pub mod fib_bollinger;
pub mod signals;

pub use fib_bollinger::FibBollingerStrategy;
pub use signals::{LastPriceSeed, SignalConfig};

use crate::error::ComputationError;
use crate::indicators::{BollingerBands, FibonacciLevels};
use crate::models::{Candle, SignalEvent};

/// Indicators a strategy derived from one candle window
#[derive(Debug, Clone)]
pub struct Analysis {
    pub bands: BollingerBands,
    pub fib_levels: FibonacciLevels,
    pub last_close: f64,
}

/// Base trait for all trading strategies
pub trait Strategy: Send + Sync {
    /// Compute indicators for a candle window
    fn analyze(&self, candles: &[Candle]) -> Result<Analysis, ComputationError>;

    /// Turn a previous `analyze` of the same window into buy/sell events
    fn evaluate(
        &self,
        candles: &[Candle],
        analysis: &Analysis,
    ) -> Result<Vec<SignalEvent>, ComputationError>;

    /// Get strategy name
    fn name(&self) -> &str;

    /// Minimum candles required before any signal can be evaluated
    fn min_candles_required(&self) -> usize;
}
