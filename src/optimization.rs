//! Closed-form Markowitz solver and the efficient-frontier sweep.
//!
//! One solver serves both objectives: plain mean-variance takes the window
//! mean and covariance of raw returns, the tracking-error objective takes the
//! mean and covariance of benchmark-excess returns. The solution minimises
//! w'Σw subject to μ'w = τ and 1'w = 1, using the scalars
//! a = μ'Σ⁻¹μ, b = μ'Σ⁻¹1, c = 1'Σ⁻¹1, Δ = ac - b²:
//!
//!   w = [Σ⁻¹1·(a - bτ) + Σ⁻¹μ·(cτ - b)] / Δ
//!
//! Weights are unconstrained (possibly negative, possibly > 1); feasibility
//! is the constraints projector's job.

use ndarray::{Array1, Array2, ArrayView1};
use tracing::debug;

use crate::error::{EngineError, Result};
use crate::matrix::{checked_inverse, quad_form, same_len};

/// Δ threshold below which the frontier is degenerate (μ collinear with 1).
pub const DELTA_TOLERANCE: f64 = 1e-12;

/// Frontier scalars of a (μ, Σ) pair, reusable across targets.
#[derive(Debug, Clone)]
pub struct ClosedForm {
    inv_ones: Array1<f64>,
    inv_mean: Array1<f64>,
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub delta: f64,
}

impl ClosedForm {
    /// Inverts the covariance once and derives the scalars.
    pub fn prepare(mean: ArrayView1<f64>, cov: &Array2<f64>) -> Result<Self> {
        same_len(mean.len(), cov.nrows(), "markowitz")?;
        let inv = checked_inverse(cov, "markowitz")?;
        let ones = Array1::<f64>::ones(mean.len());
        let inv_ones = inv.dot(&ones);
        let inv_mean = inv.dot(&mean);
        let a = mean.dot(&inv_mean);
        let b = mean.dot(&inv_ones);
        let c = ones.dot(&inv_ones);
        let delta = a * c - b * b;
        if delta.abs() < DELTA_TOLERANCE {
            return Err(EngineError::DegenerateFrontier { delta });
        }
        if c.abs() < DELTA_TOLERANCE {
            return Err(EngineError::Numerical {
                op: "markowitz",
                detail: format!("1'inv(cov)1 = {c:.3e} is not positive"),
            });
        }
        Ok(Self {
            inv_ones,
            inv_mean,
            a,
            b,
            c,
            delta,
        })
    }

    /// Optimal fully-invested weights for target return `tau`.
    pub fn weights_for(&self, tau: f64) -> Result<Array1<f64>> {
        let w = (&self.inv_ones * (self.a - self.b * tau)
            + &self.inv_mean * (self.c * tau - self.b))
            / self.delta;
        if w.iter().any(|x| !x.is_finite()) {
            return Err(EngineError::Numerical {
                op: "markowitz",
                detail: format!("non-finite weight at target {tau}"),
            });
        }
        Ok(w)
    }

    /// Return of the global minimum-variance portfolio.
    pub fn min_variance_return(&self) -> f64 {
        self.b / self.c
    }

    /// Variance of the global minimum-variance portfolio.
    pub fn min_variance(&self) -> f64 {
        1.0 / self.c
    }
}

/// Solver output: weights plus the minimum-variance point for diagnostics.
#[derive(Debug, Clone)]
pub struct MarkowitzSolution {
    pub weights: Array1<f64>,
    pub target_return: f64,
    pub min_variance_return: f64,
    pub min_variance: f64,
}

/// Solves min w'Σw s.t. μ'w = τ, 1'w = 1 in closed form.
pub fn solve(mean: ArrayView1<f64>, cov: &Array2<f64>, tau: f64) -> Result<MarkowitzSolution> {
    let form = ClosedForm::prepare(mean, cov)?;
    let weights = form.weights_for(tau)?;
    Ok(MarkowitzSolution {
        weights,
        target_return: tau,
        min_variance_return: form.min_variance_return(),
        min_variance: form.min_variance(),
    })
}

/// One swept point: daily tracking error and daily volatility at a target.
#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct FrontierPoint {
    pub target_return: f64,
    pub tracking_error: f64,
    pub volatility: f64,
}

/// Sweeps `points` equally spaced targets in [min_target, max_target],
/// solving on `solve_cov` and measuring each solution against both the total
/// covariance and the excess covariance. A point that fails numerically is
/// dropped and the sweep continues; if every point fails the last error
/// surfaces.
pub fn efficient_frontier(
    mean: ArrayView1<f64>,
    solve_cov: &Array2<f64>,
    total_cov: &Array2<f64>,
    excess_cov: &Array2<f64>,
    min_target: f64,
    max_target: f64,
    points: usize,
) -> Result<Vec<FrontierPoint>> {
    let form = ClosedForm::prepare(mean, solve_cov)?;
    let step = if points > 1 {
        (max_target - min_target) / (points as f64 - 1.0)
    } else {
        0.0
    };

    let mut frontier = Vec::with_capacity(points);
    let mut last_err = None;
    for k in 0..points {
        let tau = min_target + step * k as f64;
        let point = form.weights_for(tau).and_then(|w| {
            let vol = quad_form(w.view(), total_cov.view(), "frontier volatility")?;
            let te = quad_form(w.view(), excess_cov.view(), "frontier tracking error")?;
            if !vol.is_finite() || !te.is_finite() {
                return Err(EngineError::Numerical {
                    op: "frontier",
                    detail: format!("non-finite risk at target {tau}"),
                });
            }
            Ok(FrontierPoint {
                target_return: tau,
                tracking_error: te.max(0.0).sqrt(),
                volatility: vol.max(0.0).sqrt(),
            })
        });
        match point {
            Ok(p) => frontier.push(p),
            Err(e) => {
                debug!(target_return = tau, error = %e, "dropping frontier point");
                last_err = Some(e);
            }
        }
    }

    match (frontier.is_empty(), last_err) {
        (true, Some(e)) => Err(e),
        _ => Ok(frontier),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn two_asset_diagonal_splits_evenly() {
        let mean = array![0.001, 0.002];
        let cov = array![[0.0001, 0.0], [0.0, 0.0004]];
        let sol = solve(mean.view(), &cov, 0.0015).unwrap();
        assert!((sol.weights[0] - 0.5).abs() < 1e-10);
        assert!((sol.weights[1] - 0.5).abs() < 1e-10);
        let variance = quad_form(sol.weights.view(), cov.view(), "test").unwrap();
        assert!((variance - 0.000125).abs() < 1e-12);
    }

    #[test]
    fn constraints_hold_for_three_assets() {
        let mean = array![0.0005, 0.0012, 0.0009];
        let cov = array![
            [0.00020, 0.00003, 0.00001],
            [0.00003, 0.00045, 0.00008],
            [0.00001, 0.00008, 0.00030],
        ];
        for tau in [-0.001, 0.0, 0.0008, 0.002] {
            let sol = solve(mean.view(), &cov, tau).unwrap();
            assert!((mean.dot(&sol.weights) - tau).abs() < 1e-8);
            assert!((sol.weights.sum() - 1.0).abs() < 1e-8);
        }
    }

    #[test]
    fn collinear_mean_is_degenerate() {
        // μ proportional to the unit vector makes Δ vanish.
        let mean = array![0.001, 0.001, 0.001];
        let cov = array![
            [0.0002, 0.0, 0.0],
            [0.0, 0.0003, 0.0],
            [0.0, 0.0, 0.0004],
        ];
        let err = solve(mean.view(), &cov, 0.001).unwrap_err();
        assert!(matches!(err, EngineError::DegenerateFrontier { .. }));
    }

    #[test]
    fn singular_covariance_is_numerical_error() {
        let mean = array![0.001, 0.002];
        let cov = array![[0.0001, 0.0001], [0.0001, 0.0001]];
        let err = solve(mean.view(), &cov, 0.0015).unwrap_err();
        assert!(matches!(err, EngineError::Numerical { .. }));
    }

    #[test]
    fn mismatched_shapes_rejected() {
        let mean = array![0.001, 0.002, 0.003];
        let cov = array![[0.0001, 0.0], [0.0, 0.0004]];
        let err = solve(mean.view(), &cov, 0.001).unwrap_err();
        assert!(matches!(err, EngineError::Shape { .. }));
    }

    #[test]
    fn frontier_is_convex_with_minimum_at_b_over_c() {
        let mean = array![0.0005, 0.0012, 0.0009];
        let cov = array![
            [0.00020, 0.00003, 0.00001],
            [0.00003, 0.00045, 0.00008],
            [0.00001, 0.00008, 0.00030],
        ];
        let form = ClosedForm::prepare(mean.view(), &cov).unwrap();
        let mv_return = form.min_variance_return();
        let mv_vol = form.min_variance().sqrt();

        let points = efficient_frontier(
            mean.view(),
            &cov,
            &cov,
            &cov,
            mv_return - 0.002,
            mv_return + 0.002,
            41,
        )
        .unwrap();
        assert_eq!(points.len(), 41);

        // Convexity of variance in the target: second differences >= 0.
        let variances: Vec<f64> = points.iter().map(|p| p.volatility * p.volatility).collect();
        for w in variances.windows(3) {
            assert!(w[0] - 2.0 * w[1] + w[2] >= -1e-12);
        }

        // The swept minimum sits at the b/c centre point by construction.
        let min_point = points
            .iter()
            .min_by(|x, y| x.volatility.partial_cmp(&y.volatility).unwrap())
            .unwrap();
        assert!((min_point.target_return - mv_return).abs() < 1e-6);
        assert!((min_point.volatility - mv_vol).abs() < 1e-9);
    }

    #[test]
    fn solution_reports_min_variance_point() {
        let mean = array![0.001, 0.002];
        let cov = array![[0.0001, 0.0], [0.0, 0.0004]];
        let sol = solve(mean.view(), &cov, 0.0015).unwrap();
        // c = 1e4 + 2.5e3 = 12500, b = 15.
        assert!((sol.min_variance - 1.0 / 12_500.0).abs() < 1e-12);
        assert!((sol.min_variance_return - 15.0 / 12_500.0).abs() < 1e-12);
    }
}
