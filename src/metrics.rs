//! Portfolio risk and performance metrics.
//!
//! Scalar calculators plus rolling variants over overlapping windows. Every
//! ratio with a vanishing denominator surfaces a degenerate-metric error
//! instead of returning infinities.

use ndarray::{s, Array1, ArrayView1, ArrayView2};

use crate::config::{RiskParams, TRADING_DAYS_PER_YEAR};
use crate::error::{EngineError, Result};
use crate::matrix::{quad_form, same_len};

/// Days used to scale daily volatility to monthly.
const MONTH_SCALE_DAYS: f64 = 21.0;

/// Daily portfolio return series p[t] = Σ_a w_a · R[t,a].
pub fn portfolio_returns(weights: ArrayView1<f64>, returns: ArrayView2<f64>) -> Result<Array1<f64>> {
    same_len(weights.len(), returns.ncols(), "portfolio_returns")?;
    Ok(returns.dot(&weights))
}

pub fn mean(series: ArrayView1<f64>) -> f64 {
    if series.is_empty() {
        return 0.0;
    }
    series.sum() / series.len() as f64
}

/// Unbiased sample variance of a series.
pub fn variance(series: ArrayView1<f64>) -> Result<f64> {
    let n = series.len();
    if n < 2 {
        return Err(EngineError::Input(format!(
            "variance needs at least 2 observations, got {n}"
        )));
    }
    let m = mean(series);
    Ok(series.iter().map(|x| (x - m) * (x - m)).sum::<f64>() / (n as f64 - 1.0))
}

/// Unbiased sample covariance of two aligned series.
pub fn covariance(a: ArrayView1<f64>, b: ArrayView1<f64>) -> Result<f64> {
    same_len(a.len(), b.len(), "covariance")?;
    let n = a.len();
    if n < 2 {
        return Err(EngineError::Input(format!(
            "covariance needs at least 2 observations, got {n}"
        )));
    }
    let (ma, mb) = (mean(a), mean(b));
    let sum: f64 = a
        .iter()
        .zip(b.iter())
        .map(|(x, y)| (x - ma) * (y - mb))
        .sum();
    Ok(sum / (n as f64 - 1.0))
}

/// sqrt(w'Σw): one-day portfolio volatility.
pub fn daily_volatility(weights: ArrayView1<f64>, cov: ArrayView2<f64>) -> Result<f64> {
    let v = quad_form(weights, cov, "daily_volatility")?;
    if !v.is_finite() {
        return Err(EngineError::Numerical {
            op: "daily_volatility",
            detail: "non-finite variance".to_string(),
        });
    }
    Ok(v.max(0.0).sqrt())
}

pub fn monthly_volatility(daily_vol: f64) -> f64 {
    daily_vol * MONTH_SCALE_DAYS.sqrt()
}

pub fn annualised_volatility(daily_vol: f64) -> f64 {
    daily_vol * (TRADING_DAYS_PER_YEAR as f64).sqrt()
}

/// Annualised tracking error sqrt(w'Σᵉw)·sqrt(252).
pub fn tracking_error(weights: ArrayView1<f64>, excess_cov: ArrayView2<f64>) -> Result<f64> {
    let daily = daily_volatility(weights, excess_cov)?;
    Ok(annualised_volatility(daily))
}

/// cov(p, b) / var(b) with unbiased divisors.
pub fn beta(portfolio: ArrayView1<f64>, benchmark: ArrayView1<f64>) -> Result<f64> {
    let var_b = variance(benchmark)?;
    if var_b < 1e-18 {
        return Err(EngineError::DegenerateMetric {
            metric: "beta",
            detail: format!("benchmark variance {var_b:.3e} vanishes"),
        });
    }
    Ok(covariance(portfolio, benchmark)? / var_b)
}

/// CAPM alpha: p̄ - (r_f + β·(b̄ - r_f)), all in daily units.
pub fn alpha(
    portfolio: ArrayView1<f64>,
    benchmark: ArrayView1<f64>,
    risk_free: f64,
) -> Result<f64> {
    let b = beta(portfolio, benchmark)?;
    Ok(mean(portfolio) - (risk_free + b * (mean(benchmark) - risk_free)))
}

/// (p̄ - r_f) / daily volatility.
pub fn sharpe(mean_return: f64, daily_vol: f64, risk_free: f64) -> Result<f64> {
    if daily_vol <= 0.0 {
        return Err(EngineError::DegenerateMetric {
            metric: "sharpe",
            detail: format!("volatility {daily_vol} is not positive"),
        });
    }
    Ok((mean_return - risk_free) / daily_vol)
}

/// (p̄ - r_f) / tracking error. The numerator stays in daily units; the
/// denominator is the annualised tracking error, as in the source.
pub fn information_ratio(mean_return: f64, te: f64, risk_free: f64) -> Result<f64> {
    if te <= 0.0 {
        return Err(EngineError::DegenerateMetric {
            metric: "information_ratio",
            detail: format!("tracking error {te} is not positive"),
        });
    }
    Ok((mean_return - risk_free) / te)
}

/// Downside deviation: sqrt of the mean squared shortfall below `target`,
/// averaged over the below-target observations only.
pub fn downside_deviation(series: ArrayView1<f64>, target: f64) -> Result<f64> {
    let mut sum = 0.0;
    let mut count = 0usize;
    for &x in series.iter() {
        if x < target {
            let short = target - x;
            sum += short * short;
            count += 1;
        }
    }
    if count == 0 {
        return Err(EngineError::DegenerateMetric {
            metric: "downside_deviation",
            detail: format!("no observations below target {target}"),
        });
    }
    Ok((sum / count as f64).sqrt())
}

/// (p̄ - τ) / downside deviation at τ.
pub fn sortino(series: ArrayView1<f64>, target: f64) -> Result<f64> {
    let dd = downside_deviation(series, target)?;
    if dd <= 0.0 {
        return Err(EngineError::DegenerateMetric {
            metric: "sortino",
            detail: "zero downside deviation".to_string(),
        });
    }
    Ok((mean(series) - target) / dd)
}

/// (p̄ - r_f) / β, failing when beta is numerically zero.
pub fn treynor(mean_return: f64, beta: f64, risk_free: f64) -> Result<f64> {
    if beta.abs() < 1e-6 {
        return Err(EngineError::DegenerateMetric {
            metric: "treynor",
            detail: format!("beta {beta:.3e} is numerically zero"),
        });
    }
    Ok((mean_return - risk_free) / beta)
}

/// Largest peak-to-trough fractional loss of the compounded value series.
pub fn max_drawdown(series: ArrayView1<f64>) -> f64 {
    let mut value = 1.0_f64;
    let mut peak = 1.0_f64;
    let mut max_dd = 0.0_f64;
    for &r in series.iter() {
        value *= 1.0 + r;
        if value > peak {
            peak = value;
        }
        let dd = (peak - value) / peak;
        if dd > max_dd {
            max_dd = dd;
        }
    }
    max_dd
}

/// Historical VaR: sort ascending, take index ⌊(1-α)·T⌋ (clamped), negate.
pub fn value_at_risk(series: ArrayView1<f64>, confidence: f64) -> Result<f64> {
    if series.is_empty() {
        return Err(EngineError::Input("VaR of an empty series".to_string()));
    }
    let mut sorted: Vec<f64> = series.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let idx = (((1.0 - confidence) * sorted.len() as f64).floor() as usize).min(sorted.len() - 1);
    Ok(-sorted[idx])
}

/// Expected shortfall: mean of the tail at or below the VaR index, negated.
pub fn expected_shortfall(series: ArrayView1<f64>, confidence: f64) -> Result<f64> {
    if series.is_empty() {
        return Err(EngineError::Input(
            "expected shortfall of an empty series".to_string(),
        ));
    }
    let mut sorted: Vec<f64> = series.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let tail_len = (((1.0 - confidence) * sorted.len() as f64).floor() as usize)
        .clamp(1, sorted.len());
    let tail = &sorted[..tail_len];
    Ok(-(tail.iter().sum::<f64>() / tail.len() as f64))
}

/// Per-asset risk contributions (Σw ∘ w) / sqrt(w'Σw).
pub fn risk_contributions(
    weights: ArrayView1<f64>,
    cov: ArrayView2<f64>,
) -> Result<Array1<f64>> {
    let vol = daily_volatility(weights, cov)?;
    if vol <= 0.0 {
        return Err(EngineError::DegenerateMetric {
            metric: "risk_contributions",
            detail: "zero portfolio volatility".to_string(),
        });
    }
    let marginal = cov.dot(&weights);
    Ok((&marginal * &weights) / vol)
}

fn check_window(series_len: usize, window: usize, op: &'static str) -> Result<()> {
    if window < 2 || window > series_len {
        return Err(EngineError::Input(format!(
            "{op}: window {window} invalid for series of length {series_len}"
        )));
    }
    Ok(())
}

/// Rolling annualised volatility; output length T - W + 1.
pub fn rolling_volatility(series: ArrayView1<f64>, window: usize) -> Result<Vec<f64>> {
    check_window(series.len(), window, "rolling_volatility")?;
    let mut out = Vec::with_capacity(series.len() - window + 1);
    for start in 0..=series.len() - window {
        let slice = series.slice(s![start..start + window]);
        out.push(annualised_volatility(variance(slice)?.sqrt()));
    }
    Ok(out)
}

/// Rolling Sharpe on daily units; output length T - W + 1. Flat windows
/// (zero volatility) produce 0 rather than failing the whole sweep.
pub fn rolling_sharpe(series: ArrayView1<f64>, window: usize, risk_free: f64) -> Result<Vec<f64>> {
    check_window(series.len(), window, "rolling_sharpe")?;
    let mut out = Vec::with_capacity(series.len() - window + 1);
    for start in 0..=series.len() - window {
        let slice = series.slice(s![start..start + window]);
        let vol = variance(slice)?.sqrt();
        out.push(if vol > 0.0 {
            (mean(slice) - risk_free) / vol
        } else {
            0.0
        });
    }
    Ok(out)
}

/// Rolling annualised tracking error of p against b; output length T - W + 1.
pub fn rolling_tracking_error(
    portfolio: ArrayView1<f64>,
    benchmark: ArrayView1<f64>,
    window: usize,
) -> Result<Vec<f64>> {
    same_len(portfolio.len(), benchmark.len(), "rolling_tracking_error")?;
    check_window(portfolio.len(), window, "rolling_tracking_error")?;
    let active = &portfolio.to_owned() - &benchmark;
    let mut out = Vec::with_capacity(portfolio.len() - window + 1);
    for start in 0..=portfolio.len() - window {
        let slice = active.slice(s![start..start + window]);
        out.push(annualised_volatility(variance(slice)?.sqrt()));
    }
    Ok(out)
}

/// Rolling CAPM alpha of p against b; output length T - W + 1.
pub fn rolling_alpha(
    portfolio: ArrayView1<f64>,
    benchmark: ArrayView1<f64>,
    window: usize,
    risk_free: f64,
) -> Result<Vec<f64>> {
    same_len(portfolio.len(), benchmark.len(), "rolling_alpha")?;
    check_window(portfolio.len(), window, "rolling_alpha")?;
    let mut out = Vec::with_capacity(portfolio.len() - window + 1);
    for start in 0..=portfolio.len() - window {
        let p = portfolio.slice(s![start..start + window]);
        let b = benchmark.slice(s![start..start + window]);
        out.push(alpha(p, b, risk_free)?);
    }
    Ok(out)
}

/// Rolling information ratio: per-window mean excess over the window's
/// annualised tracking error. Flat windows produce 0 instead of failing.
pub fn rolling_information_ratio(
    portfolio: ArrayView1<f64>,
    benchmark: ArrayView1<f64>,
    window: usize,
    risk_free: f64,
) -> Result<Vec<f64>> {
    same_len(portfolio.len(), benchmark.len(), "rolling_information_ratio")?;
    check_window(portfolio.len(), window, "rolling_information_ratio")?;
    let active = &portfolio.to_owned() - &benchmark;
    let mut out = Vec::with_capacity(portfolio.len() - window + 1);
    for start in 0..=portfolio.len() - window {
        let p = portfolio.slice(s![start..start + window]);
        let slice = active.slice(s![start..start + window]);
        let te = annualised_volatility(variance(slice)?.sqrt());
        out.push(if te > 0.0 {
            (mean(p) - risk_free) / te
        } else {
            0.0
        });
    }
    Ok(out)
}

/// Rolling beta of the portfolio implied by fixed `weights`, recomputing the
/// portfolio return series per window from the asset returns.
pub fn rolling_beta(
    weights: ArrayView1<f64>,
    returns: ArrayView2<f64>,
    benchmark: ArrayView1<f64>,
    window: usize,
) -> Result<Vec<f64>> {
    same_len(returns.nrows(), benchmark.len(), "rolling_beta")?;
    check_window(benchmark.len(), window, "rolling_beta")?;
    let mut out = Vec::with_capacity(benchmark.len() - window + 1);
    for start in 0..=benchmark.len() - window {
        let window_returns = returns.slice(s![start..start + window, ..]);
        let p = portfolio_returns(weights, window_returns)?;
        out.push(beta(p.view(), benchmark.slice(s![start..start + window]))?);
    }
    Ok(out)
}

/// Aggregated scalar diagnostics for one period's accepted weights.
#[derive(Debug, Clone)]
pub struct RiskRecord {
    pub mean_return: f64,
    pub daily_volatility: f64,
    pub monthly_volatility: f64,
    pub annualised_volatility: f64,
    pub tracking_error: f64,
    pub beta: f64,
    pub alpha: f64,
    pub sharpe: Option<f64>,
    pub sortino: Option<f64>,
    pub information_ratio: Option<f64>,
    pub treynor: Option<f64>,
    pub max_drawdown: f64,
    pub value_at_risk: f64,
    pub expected_shortfall: f64,
    pub risk_contributions: Vec<f64>,
}

/// Computes the full record for `weights` over a returns window. The ratios
/// that can be degenerate on flat windows are carried as `None` rather than
/// failing the period.
pub fn compute_risk_record(
    weights: ArrayView1<f64>,
    returns: ArrayView2<f64>,
    cov: ArrayView2<f64>,
    excess_cov: ArrayView2<f64>,
    benchmark: ArrayView1<f64>,
    params: &RiskParams,
) -> Result<RiskRecord> {
    let p = portfolio_returns(weights, returns)?;
    let p_mean = mean(p.view());
    let daily_vol = daily_volatility(weights, cov)?;
    let te = tracking_error(weights, excess_cov)?;
    let b = beta(p.view(), benchmark)?;
    let a = alpha(p.view(), benchmark, params.risk_free_rate)?;

    Ok(RiskRecord {
        mean_return: p_mean,
        daily_volatility: daily_vol,
        monthly_volatility: monthly_volatility(daily_vol),
        annualised_volatility: annualised_volatility(daily_vol),
        tracking_error: te,
        beta: b,
        alpha: a,
        sharpe: sharpe(p_mean, daily_vol, params.risk_free_rate).ok(),
        sortino: sortino(p.view(), params.downside_target).ok(),
        information_ratio: information_ratio(p_mean, te, params.risk_free_rate).ok(),
        treynor: treynor(p_mean, b, params.risk_free_rate).ok(),
        max_drawdown: max_drawdown(p.view()),
        value_at_risk: value_at_risk(p.view(), params.confidence_level)?,
        expected_shortfall: expected_shortfall(p.view(), params.confidence_level)?,
        risk_contributions: risk_contributions(weights, cov)?.to_vec(),
    })
}
