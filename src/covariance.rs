//! Sample covariance over a trailing window of returns.

use ndarray::{Array2, ArrayView1, ArrayView2};

use crate::error::{EngineError, Result};
use crate::matrix::{column_means, same_len, symmetrize};

/// Unbiased sample covariance of a T' x N window (divisor T'-1, per-column
/// mean subtracted). Output is symmetrized by averaging with its transpose.
pub fn sample_covariance(window: ArrayView2<f64>) -> Result<Array2<f64>> {
    let t = window.nrows();
    if t < 2 {
        return Err(EngineError::Input(format!(
            "covariance window needs at least 2 observations, got {t}"
        )));
    }
    let means = column_means(window);
    let mut centered = window.to_owned();
    for mut row in centered.rows_mut() {
        row -= &means;
    }
    let cov = centered.t().dot(&centered) / (t as f64 - 1.0);
    Ok(symmetrize(&cov))
}

/// Covariance of returns in excess of the aligned benchmark slice.
pub fn excess_covariance(
    window: ArrayView2<f64>,
    benchmark: ArrayView1<f64>,
) -> Result<Array2<f64>> {
    same_len(window.nrows(), benchmark.len(), "excess_covariance")?;
    let mut excess = window.to_owned();
    for (t, mut row) in excess.rows_mut().into_iter().enumerate() {
        row -= benchmark[t];
    }
    sample_covariance(excess.view())
}
