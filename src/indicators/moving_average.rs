/// Calculate Simple Moving Average (SMA) over the last `period` prices
pub fn calculate_sma(prices: &[f64], period: usize) -> Option<f64> {
    if period == 0 || prices.len() < period {
        return None;
    }

    let sum: f64 = prices.iter().rev().take(period).sum();
    Some(sum / period as f64)
}

/// Population standard deviation of the last `period` prices around `mean`
pub fn calculate_std_dev(prices: &[f64], period: usize, mean: f64) -> Option<f64> {
    if period == 0 || prices.len() < period {
        return None;
    }

    let variance: f64 = prices
        .iter()
        .rev()
        .take(period)
        .map(|p| (p - mean).powi(2))
        .sum::<f64>()
        / period as f64;

    Some(variance.sqrt())
}
