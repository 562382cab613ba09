//! Risk-constraint checks and the iterative feasibility projector.
//!
//! The projector applies a fixed sequence of passes (position clip, sector
//! scale, volatility scale, liquidity clip) and re-checks the full predicate
//! set after each sweep, up to a bounded iteration count. Once feasible, one
//! final multiplicative renormalisation restores Σw = 1; that last step is
//! not re-clipped (see DESIGN.md).

use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use tracing::debug;

use crate::config::ConstraintLimits;
use crate::data::SectorMap;
use crate::error::{EngineError, Result};
use crate::metrics;
use crate::{costs, matrix};

/// Iteration cap of the projection loop.
pub const MAX_PROJECTION_ITERATIONS: usize = 100;

/// Outcome of evaluating every enabled predicate on a weight vector.
#[derive(Debug, Clone, Default)]
pub struct ConstraintStatus {
    pub violations: Vec<String>,
}

impl ConstraintStatus {
    pub fn feasible(&self) -> bool {
        self.violations.is_empty()
    }
}

/// Market context the checks need beyond the weight vector itself.
#[derive(Clone, Copy)]
pub struct ProjectionInputs<'a, 'b> {
    /// Incumbent weights, for the turnover check.
    pub current: ArrayView1<'a, f64>,
    /// Trailing window of asset returns.
    pub returns: ArrayView2<'a, f64>,
    pub cov: &'b Array2<f64>,
    pub excess_cov: &'b Array2<f64>,
    /// Benchmark slice aligned with `returns`.
    pub benchmark: ArrayView1<'a, f64>,
    pub sectors: &'a SectorMap,
    /// Average daily volume per asset, notional currency per day.
    pub adv: ArrayView1<'a, f64>,
}

#[derive(Debug, Clone)]
pub struct RiskConstraintsProjector {
    limits: ConstraintLimits,
    max_iterations: usize,
}

impl RiskConstraintsProjector {
    pub fn new(limits: ConstraintLimits) -> Self {
        Self {
            limits,
            max_iterations: MAX_PROJECTION_ITERATIONS,
        }
    }

    pub fn limits(&self) -> &ConstraintLimits {
        &self.limits
    }

    /// Evaluates all eight predicates, collecting named violations.
    pub fn check_all(
        &self,
        weights: ArrayView1<f64>,
        inputs: &ProjectionInputs,
    ) -> Result<ConstraintStatus> {
        let mut status = ConstraintStatus::default();
        self.check_positions(weights, &mut status);
        self.check_sectors(weights, inputs.sectors, &mut status)?;
        self.check_volatility(weights, inputs.cov, &mut status)?;
        self.check_tracking_error(weights, inputs.excess_cov, &mut status)?;
        self.check_beta(weights, inputs, &mut status)?;
        self.check_turnover(weights, inputs.current, &mut status)?;
        self.check_liquidity(weights, inputs, &mut status);
        self.check_diversification(weights, &mut status);
        Ok(status)
    }

    fn check_positions(&self, weights: ArrayView1<f64>, status: &mut ConstraintStatus) {
        for (i, &w) in weights.iter().enumerate() {
            if w < self.limits.min_position - 1e-12 || w > self.limits.max_position + 1e-12 {
                status.violations.push(format!(
                    "position: w[{i}] = {w:.4} outside [{:.4}, {:.4}]",
                    self.limits.min_position, self.limits.max_position
                ));
            }
        }
        let short: f64 = weights.iter().filter(|w| **w < 0.0).map(|w| -w).sum();
        if short > self.limits.max_short_exposure + 1e-12 {
            status.violations.push(format!(
                "short exposure: {short:.4} exceeds {:.4}",
                self.limits.max_short_exposure
            ));
        }
    }

    fn check_sectors(
        &self,
        weights: ArrayView1<f64>,
        sectors: &SectorMap,
        status: &mut ConstraintStatus,
    ) -> Result<()> {
        for (name, sum) in sector_sums(weights, sectors)? {
            if sum.abs() > self.limits.max_sector_exposure + 1e-12 {
                status.violations.push(format!(
                    "sector: {name} exposure {sum:.4} exceeds {:.4}",
                    self.limits.max_sector_exposure
                ));
            }
        }
        Ok(())
    }

    fn check_volatility(
        &self,
        weights: ArrayView1<f64>,
        cov: &Array2<f64>,
        status: &mut ConstraintStatus,
    ) -> Result<()> {
        let vol = annualised_vol(weights, cov)?;
        if vol > self.limits.max_volatility + 1e-12 {
            status.violations.push(format!(
                "volatility: {vol:.4} exceeds {:.4}",
                self.limits.max_volatility
            ));
        }
        Ok(())
    }

    fn check_tracking_error(
        &self,
        weights: ArrayView1<f64>,
        excess_cov: &Array2<f64>,
        status: &mut ConstraintStatus,
    ) -> Result<()> {
        if let Some(cap) = self.limits.max_tracking_error {
            let te = metrics::tracking_error(weights, excess_cov.view())?;
            if te > cap + 1e-12 {
                status
                    .violations
                    .push(format!("tracking error: {te:.4} exceeds {cap:.4}"));
            }
        }
        Ok(())
    }

    fn check_beta(
        &self,
        weights: ArrayView1<f64>,
        inputs: &ProjectionInputs,
        status: &mut ConstraintStatus,
    ) -> Result<()> {
        let p = metrics::portfolio_returns(weights, inputs.returns)?;
        let beta = metrics::beta(p.view(), inputs.benchmark)?;
        if (beta - 1.0).abs() > self.limits.max_beta_deviation + 1e-12 {
            status.violations.push(format!(
                "beta: deviation |{beta:.4} - 1| exceeds {:.4}",
                self.limits.max_beta_deviation
            ));
        }
        Ok(())
    }

    fn check_turnover(
        &self,
        weights: ArrayView1<f64>,
        current: ArrayView1<f64>,
        status: &mut ConstraintStatus,
    ) -> Result<()> {
        let to = costs::turnover(current, weights)?;
        if to > self.limits.max_turnover + 1e-12 {
            status.violations.push(format!(
                "turnover: {to:.4} exceeds {:.4}",
                self.limits.max_turnover
            ));
        }
        Ok(())
    }

    fn check_liquidity(
        &self,
        weights: ArrayView1<f64>,
        inputs: &ProjectionInputs,
        status: &mut ConstraintStatus,
    ) {
        for (i, &w) in weights.iter().enumerate() {
            let demand = w.abs() * self.limits.min_liquidity;
            let supply = inputs.adv[i] * self.limits.max_adv_percent;
            if demand > supply + 1e-9 {
                status.violations.push(format!(
                    "liquidity: w[{i}] needs {demand:.0} notional against ADV capacity {supply:.0}"
                ));
            }
        }
    }

    fn check_diversification(&self, weights: ArrayView1<f64>, status: &mut ConstraintStatus) {
        let active = weights
            .iter()
            .filter(|w| w.abs() > self.limits.min_trade_size)
            .count();
        if active < self.limits.min_positions || active > self.limits.max_positions {
            status.violations.push(format!(
                "diversification: {active} active positions outside [{}, {}]",
                self.limits.min_positions, self.limits.max_positions
            ));
        }
    }

    /// Projects `proposed` onto the feasible set. Fails with
    /// `ConstraintsUnsatisfiable` when the iteration cap is reached with
    /// violations outstanding.
    pub fn project(
        &self,
        proposed: ArrayView1<f64>,
        inputs: &ProjectionInputs,
    ) -> Result<Array1<f64>> {
        matrix::same_len(proposed.len(), inputs.current.len(), "project")?;
        let mut w = proposed.to_owned();

        for iteration in 0..self.max_iterations {
            self.clip_positions(&mut w);
            self.scale_sectors(&mut w, inputs.sectors)?;
            self.scale_volatility(&mut w, inputs.cov)?;
            self.clip_liquidity(&mut w, inputs);

            let status = self.check_all(w.view(), inputs)?;
            if status.feasible() {
                debug!(iteration, "projection converged");
                break;
            }
            if iteration + 1 == self.max_iterations {
                return Err(EngineError::ConstraintsUnsatisfiable {
                    iterations: self.max_iterations,
                    violations: status.violations,
                });
            }
        }

        // Final renormalisation onto the fully-invested hyperplane.
        let sum = w.sum();
        if sum.abs() < 1e-12 {
            return Err(EngineError::Numerical {
                op: "project",
                detail: format!("weight sum {sum:.3e} too small to renormalise"),
            });
        }
        Ok(w / sum)
    }

    fn clip_positions(&self, w: &mut Array1<f64>) {
        w.mapv_inplace(|x| x.clamp(self.limits.min_position, self.limits.max_position));
    }

    fn scale_sectors(&self, w: &mut Array1<f64>, sectors: &SectorMap) -> Result<()> {
        for (name, sum) in sector_sums(w.view(), sectors)? {
            if sum.abs() > self.limits.max_sector_exposure {
                let scale = self.limits.max_sector_exposure / sum.abs();
                for i in 0..w.len() {
                    if sectors.sector_of(i)? == name {
                        w[i] *= scale;
                    }
                }
            }
        }
        Ok(())
    }

    fn scale_volatility(&self, w: &mut Array1<f64>, cov: &Array2<f64>) -> Result<()> {
        let vol = annualised_vol(w.view(), cov)?;
        if vol > self.limits.max_volatility {
            *w *= self.limits.max_volatility / vol;
        }
        Ok(())
    }

    fn clip_liquidity(&self, w: &mut Array1<f64>, inputs: &ProjectionInputs) {
        for i in 0..w.len() {
            let bound = inputs.adv[i] * self.limits.max_adv_percent / self.limits.min_liquidity;
            if w[i].abs() > bound {
                w[i] = bound.copysign(w[i]);
            }
        }
    }
}

/// Volatility used by the cap check and the scaling pass: annualised, so the
/// limit shares units with the tracking-error cap.
fn annualised_vol(weights: ArrayView1<f64>, cov: &Array2<f64>) -> Result<f64> {
    Ok(metrics::annualised_volatility(metrics::daily_volatility(
        weights,
        cov.view(),
    )?))
}

/// Sums weights per distinct sector, in first-seen order.
fn sector_sums<'a>(
    weights: ArrayView1<f64>,
    sectors: &'a SectorMap,
) -> Result<Vec<(&'a str, f64)>> {
    let mut sums: Vec<(&str, f64)> = Vec::new();
    for (i, &w) in weights.iter().enumerate() {
        let name = sectors.sector_of(i)?;
        match sums.iter_mut().find(|(n, _)| *n == name) {
            Some((_, s)) => *s += w,
            None => sums.push((name, w)),
        }
    }
    Ok(sums)
}

/// Sector exposures of a weight vector, for reporting.
pub fn sector_exposures(
    weights: ArrayView1<f64>,
    sectors: &SectorMap,
) -> Result<Vec<(String, f64)>> {
    Ok(sector_sums(weights, sectors)?
        .into_iter()
        .map(|(n, s)| (n.to_string(), s))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::covariance;
    use ndarray::array;

    /// Limits loose enough that only the constraint under test can bind.
    fn permissive_limits() -> ConstraintLimits {
        ConstraintLimits {
            max_position: 10.0,
            min_position: -10.0,
            max_short_exposure: 100.0,
            max_sector_exposure: 100.0,
            max_volatility: 100.0,
            max_tracking_error: None,
            max_beta_deviation: 100.0,
            max_turnover: 100.0,
            min_trade_size: 0.0,
            min_liquidity: 1.0,
            max_adv_percent: 1.0,
            min_positions: 0,
            max_positions: 1000,
        }
    }

    struct Fixture {
        returns: ndarray::Array2<f64>,
        bench: Array1<f64>,
        cov: Array2<f64>,
        excess_cov: Array2<f64>,
        sectors: SectorMap,
        adv: Array1<f64>,
        current: Array1<f64>,
    }

    fn fixture(n: usize) -> Fixture {
        let t = 12;
        let bench = Array1::from_vec(
            (0..t).map(|i| ((i % 5) as f64 - 2.0) / 100.0).collect::<Vec<_>>(),
        );
        let returns = ndarray::Array2::from_shape_fn((t, n), |(ti, a)| {
            bench[ti] * (0.8 + 0.1 * a as f64) + ((ti * (a + 2)) % 7) as f64 / 1000.0 - 0.003
        });
        let cov = covariance::sample_covariance(returns.view()).unwrap();
        let excess_cov = covariance::excess_covariance(returns.view(), bench.view()).unwrap();
        Fixture {
            returns,
            bench,
            cov,
            excess_cov,
            sectors: SectorMap::rotation(n, &["Tech", "Fin"]),
            adv: Array1::from_elem(n, 1e9),
            current: Array1::from_elem(n, 1.0 / n as f64),
        }
    }

    fn inputs(fx: &Fixture) -> ProjectionInputs<'_, '_> {
        ProjectionInputs {
            current: fx.current.view(),
            returns: fx.returns.view(),
            cov: &fx.cov,
            excess_cov: &fx.excess_cov,
            benchmark: fx.bench.view(),
            sectors: &fx.sectors,
            adv: fx.adv.view(),
        }
    }

    #[test]
    fn clip_then_renormalise_matches_expected_weights() {
        let fx = fixture(3);
        let limits = ConstraintLimits {
            max_position: 0.25,
            min_position: 0.0,
            ..permissive_limits()
        };
        let projector = RiskConstraintsProjector::new(limits);
        let projected = projector
            .project(array![0.4, 0.4, 0.2].view(), &inputs(&fx))
            .unwrap();
        // Clip to (0.25, 0.25, 0.2), then scale onto the sum-one hyperplane.
        assert!((projected[0] - 0.25 / 0.7).abs() < 1e-12);
        assert!((projected[1] - 0.25 / 0.7).abs() < 1e-12);
        assert!((projected[2] - 0.2 / 0.7).abs() < 1e-12);
        assert!((projected.sum() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn projection_is_idempotent_once_feasible() {
        let fx = fixture(4);
        let projector = RiskConstraintsProjector::new(permissive_limits());
        let first = projector
            .project(array![0.4, 0.3, 0.2, 0.1].view(), &inputs(&fx))
            .unwrap();
        let second = projector.project(first.view(), &inputs(&fx)).unwrap();
        for (a, b) in first.iter().zip(second.iter()) {
            assert!((a - b).abs() < 1e-10);
        }
    }

    #[test]
    fn sector_cap_scales_the_offending_sector() {
        let fx = fixture(4);
        let limits = ConstraintLimits {
            max_sector_exposure: 0.4,
            ..permissive_limits()
        };
        let projector = RiskConstraintsProjector::new(limits);
        // Tech holds assets 0 and 2 (rotation of two sectors over 4 assets).
        let projected = projector
            .project(array![0.5, 0.2, 0.2, 0.1].view(), &inputs(&fx))
            .unwrap();
        let exposures = sector_exposures(projected.view(), &fx.sectors).unwrap();
        let tech = exposures.iter().find(|(n, _)| n == "Tech").unwrap().1;
        // Pre-renormalisation the sector is scaled exactly to the cap; the
        // final sum-to-one step can push it above only by the global factor.
        assert!(tech <= 0.4 / (0.4 + 0.3) + 1e-12);
    }

    #[test]
    fn volatility_cap_shrinks_the_book() {
        let fx = fixture(3);
        let unconstrained = RiskConstraintsProjector::new(permissive_limits());
        let raw = unconstrained
            .project(array![0.6, 0.3, 0.1].view(), &inputs(&fx))
            .unwrap();
        let raw_vol = annualised_vol(raw.view(), &fx.cov).unwrap();

        let limits = ConstraintLimits {
            max_volatility: raw_vol / 2.0,
            ..permissive_limits()
        };
        let capped = RiskConstraintsProjector::new(limits.clone());
        // Before renormalisation the scaled vector satisfies the cap; check
        // the pass directly to avoid the sum-to-one rescale.
        let mut w = array![0.6, 0.3, 0.1];
        capped.scale_volatility(&mut w, &fx.cov).unwrap();
        assert!(annualised_vol(w.view(), &fx.cov).unwrap() <= limits.max_volatility + 1e-12);
    }

    #[test]
    fn liquidity_clip_preserves_sign() {
        let fx = fixture(2);
        let mut adv = fx.adv.clone();
        adv[0] = 1e4; // tiny capacity for asset 0
        let limits = ConstraintLimits {
            min_liquidity: 1e6,
            max_adv_percent: 0.05,
            ..permissive_limits()
        };
        let projector = RiskConstraintsProjector::new(limits);
        let mut w = array![-0.5, 1.5];
        let mut inp = inputs(&fx);
        inp.adv = adv.view();
        projector.clip_liquidity(&mut w, &inp);
        // Bound = 1e4 * 0.05 / 1e6 = 5e-4, sign kept.
        assert!((w[0] + 5e-4).abs() < 1e-15);
        assert!((w[1] - 1.5).abs() < 1e-15);
    }

    #[test]
    fn unsatisfiable_turnover_reports_violations() {
        let fx = fixture(3);
        let limits = ConstraintLimits {
            max_turnover: 1e-6,
            ..permissive_limits()
        };
        let projector = RiskConstraintsProjector::new(limits);
        // Far from the incumbent equal-weight book; no pass reduces turnover.
        let err = projector
            .project(array![1.0, 0.0, 0.0].view(), &inputs(&fx))
            .unwrap_err();
        match err {
            EngineError::ConstraintsUnsatisfiable { iterations, violations } => {
                assert_eq!(iterations, MAX_PROJECTION_ITERATIONS);
                assert!(violations.iter().any(|v| v.starts_with("turnover")));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn short_exposure_and_diversification_checks_fire() {
        let fx = fixture(4);
        let limits = ConstraintLimits {
            max_short_exposure: 0.05,
            min_positions: 4,
            max_positions: 4,
            min_trade_size: 0.01,
            ..permissive_limits()
        };
        let projector = RiskConstraintsProjector::new(limits);
        let status = projector
            .check_all(array![0.6, 0.5, -0.1, 0.0].view(), &inputs(&fx))
            .unwrap();
        assert!(!status.feasible());
        assert!(status.violations.iter().any(|v| v.starts_with("short exposure")));
        assert!(status.violations.iter().any(|v| v.starts_with("diversification")));
    }

    #[test]
    fn missing_sector_assignment_is_input_error() {
        let fx = fixture(3);
        let bad_sectors = SectorMap::new(vec!["Tech".into()]); // too short
        let projector = RiskConstraintsProjector::new(permissive_limits());
        let mut inp = inputs(&fx);
        inp.sectors = &bad_sectors;
        let err = projector
            .project(array![0.5, 0.3, 0.2].view(), &inp)
            .unwrap_err();
        assert!(matches!(err, EngineError::Input(_)));
    }
}
