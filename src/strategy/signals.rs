use crate::error::ComputationError;
use crate::indicators::{BandPoint, BollingerBands, FibonacciLevels};
use crate::models::{Candle, OrderSide, SignalEvent};
use serde::Deserialize;

/// Where the `last_price` reference starts before the first evaluated candle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LastPriceSeed {
    /// Close of the most recent candle in the window
    #[default]
    LatestClose,
    /// Close of the candle right before the first evaluated index, or the
    /// latest close when there is none
    PreviousClose,
}

/// Configuration for signal generation
#[derive(Debug, Clone)]
pub struct SignalConfig {
    pub lookback_period: usize, // first candle index that is evaluated
    pub bbands_period: usize,
    pub bbands_dev_up: f64,
    pub bbands_dev_down: f64,
    pub fib_levels: Vec<f64>,
    pub sell_level: f64, // price must cross this level upwards
    pub buy_level: f64,  // price must cross this level downwards
    pub last_price_seed: LastPriceSeed,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            lookback_period: 200,
            bbands_period: 20,
            bbands_dev_up: 2.0,
            bbands_dev_down: 2.0,
            fib_levels: vec![0.236, 0.382, 0.618],
            sell_level: 0.618,
            buy_level: 0.382,
            last_price_seed: LastPriceSeed::LatestClose,
        }
    }
}

/// Close crossed `level` upwards while moving from the lower half of the
/// bands into the upper half.
pub fn is_sell_signal(current: f64, last: f64, bands: &BandPoint, level: f64) -> bool {
    current >= level
        && last < level
        && bands.upper >= current
        && current >= bands.middle
        && bands.lower < last
        && last < bands.middle
}

/// Close crossed `level` downwards while moving from the upper half of the
/// bands into the lower half.
pub fn is_buy_signal(current: f64, last: f64, bands: &BandPoint, level: f64) -> bool {
    current <= level
        && last > level
        && bands.lower <= current
        && current <= bands.middle
        && bands.upper > last
        && last > bands.middle
}

/// Reference price before the first evaluated candle, `None` for an empty
/// window.
///
/// `PreviousClose` needs a candle before `lookback_period`; with a lookback
/// of 0 (or one past the window) it falls back to the latest close.
fn seed_price(candles: &[Candle], config: &SignalConfig) -> Option<f64> {
    let latest = candles.last()?.close;

    match config.last_price_seed {
        LastPriceSeed::LatestClose => Some(latest),
        LastPriceSeed::PreviousClose => Some(
            config
                .lookback_period
                .checked_sub(1)
                .and_then(|i| candles.get(i))
                .map_or(latest, |c| c.close),
        ),
    }
}

/// Walk candles from `lookback_period` to the end and collect every buy/sell
/// crossing.
///
/// Indices where the bands are still warming up are skipped, but the
/// reference price still advances past them.
pub fn evaluate_signals(
    candles: &[Candle],
    bands: &BollingerBands,
    fib: &FibonacciLevels,
    config: &SignalConfig,
) -> Result<Vec<SignalEvent>, ComputationError> {
    let sell_level = fib.require(config.sell_level)?;
    let buy_level = fib.require(config.buy_level)?;

    let Some(mut last_price) = seed_price(candles, config) else {
        return Ok(Vec::new());
    };
    let start = config.lookback_period;

    let mut events = Vec::new();

    for (i, candle) in candles.iter().enumerate().skip(start) {
        let current = candle.close;

        match bands.at(i) {
            Some(band) => {
                if is_sell_signal(current, last_price, &band, sell_level) {
                    tracing::debug!(
                        "SELL at #{}: close={:.4} last={:.4} fib={:.4} mid={:.4} up={:.4}",
                        i,
                        current,
                        last_price,
                        sell_level,
                        band.middle,
                        band.upper
                    );
                    events.push(SignalEvent {
                        index: i,
                        timestamp: candle.timestamp,
                        side: OrderSide::Sell,
                        price: current,
                    });
                }

                if is_buy_signal(current, last_price, &band, buy_level) {
                    tracing::debug!(
                        "BUY at #{}: close={:.4} last={:.4} fib={:.4} mid={:.4} low={:.4}",
                        i,
                        current,
                        last_price,
                        buy_level,
                        band.middle,
                        band.lower
                    );
                    events.push(SignalEvent {
                        index: i,
                        timestamp: candle.timestamp,
                        side: OrderSide::Buy,
                        price: current,
                    });
                }
            }
            None => tracing::trace!("Bands not ready at #{}, skipping", i),
        }

        last_price = current;
    }

    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::calculate_bollinger_bands;
    use chrono::{TimeZone, Utc};

    fn make_candles(closes: &[f64]) -> Vec<Candle> {
        closes
            .iter()
            .enumerate()
            .map(|(i, &close)| Candle {
                timestamp: Utc.timestamp_opt(1_700_000_000 + i as i64 * 900, 0).unwrap(),
                open: close,
                high: close + 1.0,
                low: close - 1.0,
                close,
                vwap: close,
                volume: 1.0,
                count: 1,
            })
            .collect()
    }

    fn config(lookback: usize, seed: LastPriceSeed) -> SignalConfig {
        SignalConfig {
            lookback_period: lookback,
            bbands_period: 3,
            last_price_seed: seed,
            ..SignalConfig::default()
        }
    }

    fn run(closes: &[f64], config: &SignalConfig) -> Vec<SignalEvent> {
        let candles = make_candles(closes);
        let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
        let bands = calculate_bollinger_bands(
            &closes,
            config.bbands_period,
            config.bbands_dev_up,
            config.bbands_dev_down,
        )
        .unwrap();
        let fib = FibonacciLevels::from_candles(&candles, &config.fib_levels).unwrap();
        evaluate_signals(&candles, &bands, &fib, config).unwrap()
    }

    // 100 + k^2: strictly increasing and accelerating, so with a 3-candle
    // window the previous close always sits below the middle band.
    fn rising() -> Vec<f64> {
        (0..10).map(|k| 100.0 + (k * k) as f64).collect()
    }

    // 200 - k^2: the mirror image of `rising`
    fn falling() -> Vec<f64> {
        (0..10).map(|k| 200.0 - (k * k) as f64).collect()
    }

    #[test]
    fn test_sell_condition() {
        let band = BandPoint {
            upper: 110.0,
            middle: 100.0,
            lower: 90.0,
        };
        assert!(is_sell_signal(105.0, 95.0, &band, 104.0));
        assert!(!is_sell_signal(105.0, 104.0, &band, 104.0)); // no crossing
        assert!(!is_sell_signal(111.0, 95.0, &band, 104.0)); // above upper band
        assert!(!is_sell_signal(105.0, 90.0, &band, 104.0)); // last on lower band
    }

    #[test]
    fn test_buy_condition() {
        let band = BandPoint {
            upper: 110.0,
            middle: 100.0,
            lower: 90.0,
        };
        assert!(is_buy_signal(95.0, 105.0, &band, 96.0));
        assert!(!is_buy_signal(95.0, 96.0, &band, 96.0)); // no crossing
        assert!(!is_buy_signal(89.0, 105.0, &band, 96.0)); // below lower band
        assert!(!is_buy_signal(95.0, 110.0, &band, 96.0)); // last on upper band
    }

    #[test]
    fn test_sell_fires_once_at_crossing() {
        // fib 0.618 = 99 + 83 * 0.618 = 150.294, crossed between 149 and 164
        let events = run(&rising(), &config(2, LastPriceSeed::PreviousClose));

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].side, OrderSide::Sell);
        assert_eq!(events[0].index, 8);
        assert_eq!(events[0].price, 164.0);
    }

    #[test]
    fn test_buy_fires_once_at_crossing() {
        // fib 0.382 = 118 + 83 * 0.382 = 149.706, crossed between 151 and 136
        let events = run(&falling(), &config(2, LastPriceSeed::PreviousClose));

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].side, OrderSide::Buy);
        assert_eq!(events[0].index, 8);
        assert_eq!(events[0].price, 136.0);
    }

    #[test]
    fn test_latest_close_seed_hides_first_crossing() {
        // Starting right at the crossing: the latest close (181) is above the
        // level, so the first comparison sees no crossing.
        let latest = run(&rising(), &config(8, LastPriceSeed::LatestClose));
        assert!(latest.is_empty());

        let previous = run(&rising(), &config(8, LastPriceSeed::PreviousClose));
        assert_eq!(previous.len(), 1);
        assert_eq!(previous[0].index, 8);
    }

    #[test]
    fn test_previous_close_seed_without_preceding_candle() {
        let candles = make_candles(&rising());

        assert_eq!(
            seed_price(&candles, &config(3, LastPriceSeed::PreviousClose)),
            Some(104.0)
        );
        // Nothing precedes index 0, so the latest close is used
        assert_eq!(
            seed_price(&candles, &config(0, LastPriceSeed::PreviousClose)),
            Some(181.0)
        );
        assert_eq!(
            seed_price(&candles, &config(0, LastPriceSeed::LatestClose)),
            Some(181.0)
        );
        assert_eq!(seed_price(&[], &config(0, LastPriceSeed::PreviousClose)), None);
    }

    #[test]
    fn test_warmup_indices_are_skipped() {
        let mut cfg = config(0, LastPriceSeed::PreviousClose);
        cfg.bbands_period = 20;
        // Every band is undefined, nothing can fire
        let events = run(&rising(), &cfg);
        assert!(events.is_empty());
    }

    #[test]
    fn test_lookback_beyond_window() {
        let events = run(&rising(), &config(50, LastPriceSeed::LatestClose));
        assert!(events.is_empty());
    }

    #[test]
    fn test_missing_sell_level_is_an_error() {
        let candles = make_candles(&rising());
        let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
        let bands = calculate_bollinger_bands(&closes, 3, 2.0, 2.0).unwrap();
        let fib = FibonacciLevels::from_candles(&candles, &[0.236, 0.382]).unwrap();

        let result = evaluate_signals(&candles, &bands, &fib, &SignalConfig::default());
        assert_eq!(result, Err(ComputationError::MissingLevel(0.618)));
    }
}
