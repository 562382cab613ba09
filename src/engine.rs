//! Portfolio engine facade: owns the returns panel and per-period state,
//! and sequences slice -> covariance refit -> solve -> frontier sweep ->
//! cost estimate -> projection -> metrics for each rebalance period.

use ndarray::{Array1, Array2, ArrayView1};
use tracing::info;

use crate::config::{
    ConstraintLimits, CostParams, EngineParams, RiskParams, TRADING_DAYS_PER_MONTH,
};
use crate::constraints::{ProjectionInputs, RiskConstraintsProjector};
use crate::costs::TransactionCostModel;
use crate::covariance::{excess_covariance, sample_covariance};
use crate::data::{ReturnsPanel, SectorMap};
use crate::error::{EngineError, Result};
use crate::matrix::{column_means, same_len, trailing_slice, trailing_window};
use crate::metrics::{self, RiskRecord};
use crate::optimization::{self, FrontierPoint};

/// Everything one optimise() call produces for a period.
#[derive(Debug, Clone)]
pub struct PeriodResult {
    pub period: usize,
    /// Panel row range of the estimation window.
    pub window_start: usize,
    pub window_end: usize,
    /// Unconstrained tracking-error solution.
    pub raw_tracking_weights: Array1<f64>,
    /// Tracking-error solution after the constraints projector.
    pub tracking_weights: Array1<f64>,
    /// Unconstrained mean-variance solution at the shifted target.
    pub mpt_weights: Array1<f64>,
    pub covariance: Array2<f64>,
    pub excess_covariance: Array2<f64>,
    pub tracking_frontier: Vec<FrontierPoint>,
    pub mpt_frontier: Vec<FrontierPoint>,
    pub risk: RiskRecord,
    /// Mean excess return of the projected weights over one period.
    pub expected_excess_return: f64,
    /// Estimated currency cost of moving to the raw tracking target.
    pub cost_estimate: f64,
}

pub struct PortfolioEngine {
    panel: ReturnsPanel,
    excess: Array2<f64>,
    sectors: SectorMap,
    adv: Array1<f64>,
    params: EngineParams,
    risk_params: RiskParams,
    cost_model: TransactionCostModel,
    projector: RiskConstraintsProjector,
    calendar: Vec<String>,
    last: Option<PeriodResult>,
}

impl PortfolioEngine {
    pub fn new(
        panel: ReturnsPanel,
        sectors: SectorMap,
        adv: Array1<f64>,
        params: EngineParams,
        risk_params: RiskParams,
        cost_params: CostParams,
        limits: ConstraintLimits,
    ) -> Result<Self> {
        same_len(sectors.len(), panel.n_assets(), "engine sector map")?;
        same_len(adv.len(), panel.n_assets(), "engine adv")?;
        for &v in adv.iter() {
            if v <= 0.0 {
                return Err(EngineError::InvalidInput {
                    param: "adv",
                    value: v,
                    detail: "average daily volume must be positive for every asset",
                });
            }
        }
        let excess = panel.excess_returns();
        let calendar = panel.rebalance_calendar()?;
        Ok(Self {
            excess,
            sectors,
            adv,
            params,
            risk_params,
            cost_model: TransactionCostModel::new(cost_params)?,
            projector: RiskConstraintsProjector::new(limits),
            calendar,
            last: None,
            panel,
        })
    }

    pub fn panel(&self) -> &ReturnsPanel {
        &self.panel
    }

    pub fn calendar(&self) -> &[String] {
        &self.calendar
    }

    pub fn sectors(&self) -> &SectorMap {
        &self.sectors
    }

    pub fn adv(&self) -> ArrayView1<f64> {
        self.adv.view()
    }

    pub fn params(&self) -> &EngineParams {
        &self.params
    }

    pub fn risk_params(&self) -> &RiskParams {
        &self.risk_params
    }

    pub fn cost_model(&self) -> &TransactionCostModel {
        &self.cost_model
    }

    pub fn projector(&self) -> &RiskConstraintsProjector {
        &self.projector
    }

    /// Most recent period result, if any optimise() call has succeeded.
    pub fn last_result(&self) -> Option<&PeriodResult> {
        self.last.as_ref()
    }

    /// Runs the full per-period pipeline for `period`, estimating on the
    /// trailing window that ends after that period's trading days.
    /// `current` is the incumbent weight vector held by the rebalancer.
    pub fn optimise<'a>(&'a mut self, period: usize, current: ArrayView1<'a, f64>) -> Result<PeriodResult> {
        same_len(current.len(), self.panel.n_assets(), "optimise current weights")?;
        let window_end = ((period + 1) * TRADING_DAYS_PER_MONTH).min(self.panel.n_days());
        if window_end < 2 {
            return Err(EngineError::Input(format!(
                "period {period}: window ends at row {window_end}, not enough data"
            )));
        }
        let window_start = window_end.saturating_sub(self.params.window_size);

        let returns_window = trailing_window(&self.panel.returns, window_end, self.params.window_size);
        let excess_window = trailing_window(&self.excess, window_end, self.params.window_size);
        let bench_window = trailing_slice(&self.panel.benchmark, window_end, self.params.window_size);

        let cov = sample_covariance(returns_window)?;
        let excess_cov = excess_covariance(returns_window, bench_window)?;

        let mean_returns = column_means(returns_window);
        let mean_excess = column_means(excess_window);
        let bench_mean = metrics::mean(bench_window);

        // Tracking objective on excess moments at the configured target;
        // MPT objective on raw moments at the benchmark-shifted target.
        let tracking =
            optimization::solve(mean_excess.view(), &excess_cov, self.params.target_daily_return)?;
        let mpt = optimization::solve(
            mean_returns.view(),
            &cov,
            self.params.target_daily_return + bench_mean,
        )?;

        let te_min = self.params.frontier_min_target;
        let te_max = te_min + self.params.frontier_points as f64 * self.params.frontier_step;
        let tracking_frontier = optimization::efficient_frontier(
            mean_excess.view(),
            &excess_cov,
            &cov,
            &excess_cov,
            te_min,
            te_max,
            self.params.frontier_points,
        )?;

        let mu_min = mean_returns.iter().cloned().fold(f64::INFINITY, f64::min);
        let mu_max = mean_returns.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let mpt_frontier = optimization::efficient_frontier(
            mean_returns.view(),
            &cov,
            &cov,
            &excess_cov,
            mu_min,
            mu_max,
            self.params.frontier_points,
        )?;

        let cost_estimate = self.cost_model.total_cost(
            current,
            tracking.weights.view(),
            self.params.book_value,
            self.adv.view(),
        )?;

        let inputs = ProjectionInputs {
            current,
            returns: returns_window,
            cov: &cov,
            excess_cov: &excess_cov,
            benchmark: bench_window,
            sectors: &self.sectors,
            adv: self.adv.view(),
        };
        let projected = self.projector.project(tracking.weights.view(), &inputs)?;

        let risk = metrics::compute_risk_record(
            projected.view(),
            returns_window,
            cov.view(),
            excess_cov.view(),
            bench_window,
            &self.risk_params,
        )?;

        let expected_excess_return =
            mean_excess.dot(&projected) * TRADING_DAYS_PER_MONTH as f64;

        info!(
            period,
            window_start,
            window_end,
            expected_excess_return,
            "optimised period"
        );

        let result = PeriodResult {
            period,
            window_start,
            window_end,
            raw_tracking_weights: tracking.weights,
            tracking_weights: projected,
            mpt_weights: mpt.weights,
            covariance: cov,
            excess_covariance: excess_cov,
            tracking_frontier,
            mpt_frontier,
            risk,
            expected_excess_return,
            cost_estimate,
        };
        self.last = Some(result.clone());
        Ok(result)
    }
}
