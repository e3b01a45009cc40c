use super::signals::{evaluate_signals, SignalConfig};
use super::{Analysis, Strategy};
use crate::error::ComputationError;
use crate::indicators::{calculate_bollinger_bands, FibonacciLevels};
use crate::models::{Candle, SignalEvent};

/// Fibonacci retracement crossings confirmed by Bollinger Band position
///
/// Sells when the close crosses the upper retracement level while moving from
/// the lower half of the bands into the upper half, buys on the mirrored move
/// through the lower retracement level.
#[derive(Debug, Clone, Default)]
pub struct FibBollingerStrategy {
    config: SignalConfig,
}

impl FibBollingerStrategy {
    pub fn new(config: SignalConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SignalConfig {
        &self.config
    }
}

impl Strategy for FibBollingerStrategy {
    fn analyze(&self, candles: &[Candle]) -> Result<Analysis, ComputationError> {
        let last_close = candles
            .last()
            .map(|c| c.close)
            .ok_or(ComputationError::EmptySeries("candle window"))?;

        let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
        let bands = calculate_bollinger_bands(
            &closes,
            self.config.bbands_period,
            self.config.bbands_dev_up,
            self.config.bbands_dev_down,
        )?;
        let fib_levels = FibonacciLevels::from_candles(candles, &self.config.fib_levels)?;

        tracing::debug!(
            "Fibonacci range {:.4}..{:.4} over {} candles",
            fib_levels.low,
            fib_levels.high,
            candles.len()
        );

        if candles.len() <= self.config.lookback_period {
            tracing::warn!(
                "Only {} candles fetched, nothing to evaluate past lookback {}",
                candles.len(),
                self.config.lookback_period
            );
        }

        Ok(Analysis {
            bands,
            fib_levels,
            last_close,
        })
    }

    fn evaluate(
        &self,
        candles: &[Candle],
        analysis: &Analysis,
    ) -> Result<Vec<SignalEvent>, ComputationError> {
        evaluate_signals(candles, &analysis.bands, &analysis.fib_levels, &self.config)
    }

    fn name(&self) -> &str {
        "Fibonacci/Bollinger"
    }

    fn min_candles_required(&self) -> usize {
        (self.config.lookback_period + 1).max(self.config.bbands_period)
    }
}
