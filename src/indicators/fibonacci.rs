use crate::error::ComputationError;
use crate::models::Candle;

const RATIO_TOLERANCE: f64 = 1e-9;

/// A single retracement ratio and the price it maps to
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FibonacciLevel {
    pub ratio: f64,
    pub price: f64,
}

/// Fibonacci retracement levels for one high/low range
#[derive(Debug, Clone, PartialEq)]
pub struct FibonacciLevels {
    pub high: f64,
    pub low: f64,
    pub levels: Vec<FibonacciLevel>,
}

impl FibonacciLevels {
    /// Derive levels from the extremes of the whole candle window
    pub fn from_candles(candles: &[Candle], ratios: &[f64]) -> Result<Self, ComputationError> {
        let highs: Vec<f64> = candles.iter().map(|c| c.high).collect();
        let lows: Vec<f64> = candles.iter().map(|c| c.low).collect();
        calculate_fibonacci_levels(&highs, &lows, ratios)
    }

    /// Price for `ratio`, if that ratio was configured
    pub fn price(&self, ratio: f64) -> Option<f64> {
        self.levels
            .iter()
            .find(|l| (l.ratio - ratio).abs() <= RATIO_TOLERANCE)
            .map(|l| l.price)
    }

    pub fn require(&self, ratio: f64) -> Result<f64, ComputationError> {
        self.price(ratio).ok_or(ComputationError::MissingLevel(ratio))
    }
}

/// Calculate Fibonacci retracement levels
///
/// `price = min(low) + (max(high) - min(low)) * ratio` for each ratio, in
/// the order the ratios were given.
pub fn calculate_fibonacci_levels(
    highs: &[f64],
    lows: &[f64],
    ratios: &[f64],
) -> Result<FibonacciLevels, ComputationError> {
    if highs.is_empty() || lows.is_empty() {
        return Err(ComputationError::EmptySeries("Fibonacci levels"));
    }
    if ratios.is_empty() {
        return Err(ComputationError::EmptySeries("Fibonacci ratios"));
    }

    let high = highs.iter().copied().fold(f64::MIN, f64::max);
    let low = lows.iter().copied().fold(f64::MAX, f64::min);
    let range = high - low;

    let levels = ratios
        .iter()
        .map(|&ratio| FibonacciLevel {
            ratio,
            price: low + range * ratio,
        })
        .collect();

    Ok(FibonacciLevels { high, low, levels })
}
