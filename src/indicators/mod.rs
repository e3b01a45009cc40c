// Technical indicators module
// Implements Bollinger Bands and Fibonacci retracement levels

pub mod bollinger;
pub mod fibonacci;
pub mod moving_average;

pub use bollinger::{calculate_bollinger_bands, BandPoint, BollingerBands};
pub use fibonacci::{calculate_fibonacci_levels, FibonacciLevel, FibonacciLevels};
pub use moving_average::{calculate_sma, calculate_std_dev};
