//! Dense linear-algebra helpers shared by the estimator, solver, projector
//! and metrics. Thin layer over ndarray / ndarray-linalg with the error
//! conversions the rest of the engine expects.

use ndarray::{s, Array1, Array2, ArrayView1, ArrayView2};
use ndarray_linalg::{Determinant, Inverse};

use crate::error::{EngineError, Result};

/// Threshold on the scale-free determinant below which a covariance is
/// treated as singular. The raw determinant of a daily covariance shrinks
/// like (1e-4)^N with the asset count, so the guard normalises by the
/// product of the diagonal (the determinant of the associated correlation
/// matrix) before comparing.
pub const DET_TOLERANCE: f64 = 1e-12;

/// Inverts a square matrix after guarding against near-singularity.
pub fn checked_inverse(m: &Array2<f64>, op: &'static str) -> Result<Array2<f64>> {
    if m.nrows() != m.ncols() {
        return Err(EngineError::Shape {
            op,
            expected: "square matrix".to_string(),
            got: format!("{}x{}", m.nrows(), m.ncols()),
        });
    }
    let det = m.det().map_err(|e| EngineError::Numerical {
        op,
        detail: format!("determinant failed: {e}"),
    })?;
    let diag_product: f64 = m.diag().iter().product();
    let scaled = det / diag_product;
    if !scaled.is_finite() || scaled.abs() < DET_TOLERANCE {
        return Err(EngineError::Numerical {
            op,
            detail: format!(
                "matrix is singular (det = {det:.3e}, scale-free {scaled:.3e})"
            ),
        });
    }
    m.inv().map_err(|e| EngineError::Numerical {
        op,
        detail: format!("inversion failed: {e}"),
    })
}

/// w' * M * w, with a shape guard on both operands.
pub fn quad_form(w: ArrayView1<f64>, m: ArrayView2<f64>, op: &'static str) -> Result<f64> {
    if m.nrows() != w.len() || m.ncols() != w.len() {
        return Err(EngineError::Shape {
            op,
            expected: format!("{n}x{n} matrix for length-{n} vector", n = w.len()),
            got: format!("{}x{}", m.nrows(), m.ncols()),
        });
    }
    Ok(w.dot(&m.dot(&w)))
}

/// 0.5 * (M + M') — absorbs floating-point asymmetry in estimator output.
pub fn symmetrize(m: &Array2<f64>) -> Array2<f64> {
    0.5 * (m + &m.t())
}

/// Guards that two vectors agree in length.
pub fn same_len(a: usize, b: usize, op: &'static str) -> Result<()> {
    if a != b {
        return Err(EngineError::Shape {
            op,
            expected: format!("length {a}"),
            got: format!("length {b}"),
        });
    }
    Ok(())
}

/// Trailing window of `len` rows ending at row `end` (exclusive), clamped at
/// the top of the panel.
pub fn trailing_window(m: &Array2<f64>, end: usize, len: usize) -> ArrayView2<f64> {
    let end = end.min(m.nrows());
    let start = end.saturating_sub(len);
    m.slice(s![start..end, ..])
}

/// Trailing slice of a series, aligned with [`trailing_window`].
pub fn trailing_slice(v: &Array1<f64>, end: usize, len: usize) -> ArrayView1<f64> {
    let end = end.min(v.len());
    let start = end.saturating_sub(len);
    v.slice(s![start..end])
}

/// Per-column means of a matrix view.
pub fn column_means(m: ArrayView2<f64>) -> Array1<f64> {
    let rows = m.nrows().max(1) as f64;
    let mut means = Array1::zeros(m.ncols());
    for (j, col) in m.columns().into_iter().enumerate() {
        means[j] = col.sum() / rows;
    }
    means
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn inverse_of_diagonal() {
        let m = array![[2.0, 0.0], [0.0, 4.0]];
        let inv = checked_inverse(&m, "test").unwrap();
        assert!((inv[[0, 0]] - 0.5).abs() < 1e-12);
        assert!((inv[[1, 1]] - 0.25).abs() < 1e-12);
        assert!(inv[[0, 1]].abs() < 1e-12);
    }

    #[test]
    fn singular_matrix_rejected() {
        let m = array![[1.0, 2.0], [2.0, 4.0]];
        let err = checked_inverse(&m, "test").unwrap_err();
        assert!(matches!(err, EngineError::Numerical { .. }));
    }

    #[test]
    fn non_square_is_shape_error() {
        let m = Array2::<f64>::zeros((2, 3));
        let err = checked_inverse(&m, "test").unwrap_err();
        assert!(matches!(err, EngineError::Shape { .. }));
    }

    #[test]
    fn quad_form_matches_manual() {
        let w = array![0.5, 0.5];
        let m = array![[0.0001, 0.0], [0.0, 0.0004]];
        let q = quad_form(w.view(), m.view(), "test").unwrap();
        assert!((q - 0.000125).abs() < 1e-15);
    }

    #[test]
    fn symmetrize_averages_off_diagonal() {
        let m = array![[1.0, 2.0], [4.0, 1.0]];
        let s = symmetrize(&m);
        assert!((s[[0, 1]] - 3.0).abs() < 1e-15);
        assert!((s[[1, 0]] - 3.0).abs() < 1e-15);
    }

    #[test]
    fn trailing_window_clamps_at_top() {
        let m = Array2::from_shape_fn((10, 2), |(i, _)| i as f64);
        let w = trailing_window(&m, 5, 20);
        assert_eq!(w.nrows(), 5);
        assert_eq!(w[[0, 0]], 0.0);
        let w = trailing_window(&m, 10, 4);
        assert_eq!(w.nrows(), 4);
        assert_eq!(w[[0, 0]], 6.0);
    }
}
