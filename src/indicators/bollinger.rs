use super::moving_average::{calculate_sma, calculate_std_dev};
use crate::error::ComputationError;

/// Bollinger Bands aligned index-for-index with the input closes
///
/// The first `period - 1` entries of every band are `None` (warm-up).
#[derive(Debug, Clone, PartialEq)]
pub struct BollingerBands {
    pub upper: Vec<Option<f64>>,
    pub middle: Vec<Option<f64>>,
    pub lower: Vec<Option<f64>>,
}

/// Band values at a single index
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BandPoint {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
}

impl BollingerBands {
    pub fn len(&self) -> usize {
        self.middle.len()
    }

    pub fn is_empty(&self) -> bool {
        self.middle.is_empty()
    }

    /// All three bands at `index`, or `None` while warming up or out of range
    pub fn at(&self, index: usize) -> Option<BandPoint> {
        Some(BandPoint {
            upper: (*self.upper.get(index)?)?,
            middle: (*self.middle.get(index)?)?,
            lower: (*self.lower.get(index)?)?,
        })
    }
}

/// Calculate Bollinger Bands
///
/// Middle band is the SMA of the window, upper/lower are the middle band
/// plus/minus the multiplier times the population standard deviation of the
/// same window.
pub fn calculate_bollinger_bands(
    closes: &[f64],
    period: usize,
    dev_up: f64,
    dev_down: f64,
) -> Result<BollingerBands, ComputationError> {
    if closes.is_empty() {
        return Err(ComputationError::EmptySeries("Bollinger Bands"));
    }
    if period < 2 {
        return Err(ComputationError::InvalidPeriod {
            indicator: "Bollinger Bands",
            period,
        });
    }

    let mut upper = Vec::with_capacity(closes.len());
    let mut middle = Vec::with_capacity(closes.len());
    let mut lower = Vec::with_capacity(closes.len());

    for i in 0..closes.len() {
        let window = &closes[..=i];
        let point = calculate_sma(window, period).and_then(|mean| {
            let sd = calculate_std_dev(window, period, mean)?;
            Some((mean + dev_up * sd, mean, mean - dev_down * sd))
        });

        match point {
            Some((u, m, l)) => {
                upper.push(Some(u));
                middle.push(Some(m));
                lower.push(Some(l));
            }
            None => {
                upper.push(None);
                middle.push(None);
                lower.push(None);
            }
        }
    }

    Ok(BollingerBands {
        upper,
        middle,
        lower,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bollinger_warmup() {
        let closes = vec![10.0, 20.0, 30.0, 40.0, 50.0];
        let bands = calculate_bollinger_bands(&closes, 3, 2.0, 2.0).unwrap();

        assert_eq!(bands.len(), closes.len());
        assert!(bands.at(0).is_none());
        assert!(bands.at(1).is_none());
        assert!(bands.at(2).is_some());
        assert!(bands.at(4).is_some());
        assert!(bands.at(5).is_none());
    }

    #[test]
    fn test_bollinger_shorter_than_period() {
        let closes = vec![1.0, 2.0, 3.0];
        let bands = calculate_bollinger_bands(&closes, 20, 2.0, 2.0).unwrap();

        assert_eq!(bands.len(), 3);
        assert!(bands.upper.iter().all(Option::is_none));
        assert!(bands.middle.iter().all(Option::is_none));
        assert!(bands.lower.iter().all(Option::is_none));
    }

    #[test]
    fn test_bollinger_constant_series() {
        let closes = vec![100.0; 5];
        let bands = calculate_bollinger_bands(&closes, 3, 2.0, 2.0).unwrap();

        let p = bands.at(4).unwrap();
        assert_eq!(p.middle, 100.0);
        assert_eq!(p.upper, 100.0);
        assert_eq!(p.lower, 100.0);
    }

    #[test]
    fn test_bollinger_known_values() {
        // window [10, 20, 30]: mean 20, population sd sqrt(200/3)
        let closes = vec![10.0, 20.0, 30.0];
        let bands = calculate_bollinger_bands(&closes, 3, 2.0, 1.0).unwrap();
        let sd = (200.0f64 / 3.0).sqrt();

        let p = bands.at(2).unwrap();
        assert!((p.middle - 20.0).abs() < 1e-12);
        assert!((p.upper - (20.0 + 2.0 * sd)).abs() < 1e-12);
        assert!((p.lower - (20.0 - sd)).abs() < 1e-12);
    }

    #[test]
    fn test_bollinger_empty_series() {
        let result = calculate_bollinger_bands(&[], 20, 2.0, 2.0);
        assert_eq!(
            result,
            Err(ComputationError::EmptySeries("Bollinger Bands"))
        );
    }

    #[test]
    fn test_bollinger_invalid_period() {
        let result = calculate_bollinger_bands(&[1.0, 2.0], 1, 2.0, 2.0);
        assert!(matches!(
            result,
            Err(ComputationError::InvalidPeriod { period: 1, .. })
        ));
    }

    #[test]
    fn test_bollinger_deterministic() {
        let closes: Vec<f64> = (0..50).map(|i| 100.0 + (i as f64 * 0.7).sin() * 5.0).collect();
        let a = calculate_bollinger_bands(&closes, 20, 2.0, 2.0).unwrap();
        let b = calculate_bollinger_bands(&closes, 20, 2.0, 2.0).unwrap();
        assert_eq!(a, b);
    }
}
