/// Computes the arithmetic mean of a slice of values. Returns 0.0 for empty input.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Computes the population standard deviation given a pre-computed mean.
/// Returns 0.0 for empty input.
pub fn stddev(values: &[f64], mean: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;

    variance.sqrt()
}

/// Absolute differences between chronologically consecutive values.
///
/// The first value has no predecessor and contributes nothing; fewer than
/// two values yield an empty set.
pub fn abs_deltas(values: &[i64]) -> Vec<i64> {
    values.windows(2).map(|w| (w[1] - w[0]).abs()).collect()
}
