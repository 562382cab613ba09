//! Tunable parameter records. All tunables live here as plain structs with
//! defaults matching the reference dataset; there is no config file and no
//! environment lookup.

pub const TRADING_DAYS_PER_YEAR: usize = 252;
pub const TRADING_DAYS_PER_MONTH: usize = 21;

/// Engine-level parameters: window sizing, objective targets, sweep range.
#[derive(Debug, Clone)]
pub struct EngineParams {
    /// Trailing estimation window in trading days.
    pub window_size: usize,
    /// Target daily excess return for the tracking-error objective.
    pub target_daily_return: f64,
    /// Number of frontier points per sweep.
    pub frontier_points: usize,
    /// Tracking-error sweep: lowest target and per-point step.
    pub frontier_min_target: f64,
    pub frontier_step: f64,
    /// Portfolio book value in currency, used for cost and liquidity scaling.
    pub book_value: f64,
}

impl Default for EngineParams {
    fn default() -> Self {
        Self {
            window_size: 252,
            target_daily_return: 0.0013,
            frontier_points: 50,
            frontier_min_target: -0.001,
            frontier_step: 0.00005,
            book_value: 1_000_000.0,
        }
    }
}

/// Transaction-cost parameters. Fixed commission is absolute currency per
/// non-zero trade leg; the variable rate, slippage and impact coefficients
/// are applied to trade notionals as in the cost model.
#[derive(Debug, Clone)]
pub struct CostParams {
    pub fixed_commission: f64,
    pub variable_rate: f64,
    pub slippage_coeff: f64,
    pub impact_coeff: f64,
    /// Days over which a trade is worked (>= 1).
    pub days_to_execute: usize,
    /// Exponential decay rate of impact across execution days.
    pub impact_decay: f64,
}

impl Default for CostParams {
    fn default() -> Self {
        // 1bp fixed on a $1M book, 5bp variable, 2bp slippage.
        Self {
            fixed_commission: 100.0,
            variable_rate: 0.0005,
            slippage_coeff: 0.0002,
            impact_coeff: 0.1,
            days_to_execute: 1,
            impact_decay: 0.1,
        }
    }
}

impl CostParams {
    /// Defaults scaled to a given book value (fixed commission = 1bp of book).
    pub fn for_book(book_value: f64) -> Self {
        Self {
            fixed_commission: 0.0001 * book_value,
            ..Self::default()
        }
    }
}

/// Feasible-set limits consumed by the constraints projector. `None` disables
/// the optional tracking-error check.
#[derive(Debug, Clone)]
pub struct ConstraintLimits {
    pub max_position: f64,
    pub min_position: f64,
    /// Cap on the sum of absolute short weights.
    pub max_short_exposure: f64,
    /// Cap on |sum of weights| per sector.
    pub max_sector_exposure: f64,
    /// Cap on daily portfolio volatility sqrt(w'Σw).
    pub max_volatility: f64,
    /// Optional cap on annualised tracking error.
    pub max_tracking_error: Option<f64>,
    /// Cap on |beta - 1|.
    pub max_beta_deviation: f64,
    /// Cap on one-way turnover vs the incumbent weights.
    pub max_turnover: f64,
    /// Positions smaller than this are not counted as active.
    pub min_trade_size: f64,
    /// Book notional used on the left side of the liquidity check.
    pub min_liquidity: f64,
    /// Fraction of ADV a position's notional may absorb.
    pub max_adv_percent: f64,
    pub min_positions: usize,
    pub max_positions: usize,
}

impl Default for ConstraintLimits {
    fn default() -> Self {
        Self {
            max_position: 0.15,
            min_position: -0.05,
            max_short_exposure: 0.30,
            max_sector_exposure: 0.25,
            max_volatility: 0.20,
            max_tracking_error: Some(0.06),
            max_beta_deviation: 0.25,
            max_turnover: 0.15,
            min_trade_size: 0.005,
            min_liquidity: 1_000_000.0,
            max_adv_percent: 0.05,
            min_positions: 1,
            max_positions: 50,
        }
    }
}

/// Risk-metric parameters shared by the metrics calculator and reports.
#[derive(Debug, Clone)]
pub struct RiskParams {
    /// Daily risk-free rate.
    pub risk_free_rate: f64,
    /// Confidence level for VaR and expected shortfall.
    pub confidence_level: f64,
    /// Minimum-acceptable daily return for the Sortino downside.
    pub downside_target: f64,
}

impl Default for RiskParams {
    fn default() -> Self {
        Self {
            risk_free_rate: 0.0,
            confidence_level: 0.95,
            downside_target: 0.0,
        }
    }
}
