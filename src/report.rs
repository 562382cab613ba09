//! Report writers: per-period portfolio CSV, human-readable risk report and
//! the final aggregate. Output directories are created on demand; dates are
//! sanitised for use in file names (M/D/YYYY carries path separators).

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::constraints::sector_exposures;
use crate::data::SectorMap;
use crate::engine::PeriodResult;
use crate::error::Result;

#[derive(Debug, Serialize)]
struct WeightRow<'a> {
    asset: &'a str,
    tracking_weight: f64,
    mpt_weight: f64,
}

#[derive(Debug, Serialize)]
struct MetricRow<'a> {
    metric: &'a str,
    value: f64,
}

fn sanitize_date(date: &str) -> String {
    date.replace('/', "-")
}

fn ensure_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}

fn metric_rows(result: &PeriodResult) -> Vec<MetricRow<'_>> {
    let risk = &result.risk;
    let mut rows = vec![
        MetricRow { metric: "mean_daily_return", value: risk.mean_return },
        MetricRow { metric: "daily_volatility", value: risk.daily_volatility },
        MetricRow { metric: "monthly_volatility", value: risk.monthly_volatility },
        MetricRow { metric: "annualised_volatility", value: risk.annualised_volatility },
        MetricRow { metric: "tracking_error", value: risk.tracking_error },
        MetricRow { metric: "beta", value: risk.beta },
        MetricRow { metric: "alpha", value: risk.alpha },
        MetricRow { metric: "max_drawdown", value: risk.max_drawdown },
        MetricRow { metric: "value_at_risk", value: risk.value_at_risk },
        MetricRow { metric: "expected_shortfall", value: risk.expected_shortfall },
        MetricRow { metric: "expected_excess_return", value: result.expected_excess_return },
        MetricRow { metric: "cost_estimate", value: result.cost_estimate },
    ];
    if let Some(v) = risk.sharpe {
        rows.push(MetricRow { metric: "sharpe", value: v });
    }
    if let Some(v) = risk.sortino {
        rows.push(MetricRow { metric: "sortino", value: v });
    }
    if let Some(v) = risk.information_ratio {
        rows.push(MetricRow { metric: "information_ratio", value: v });
    }
    if let Some(v) = risk.treynor {
        rows.push(MetricRow { metric: "treynor", value: v });
    }
    rows
}

/// Writes `portfolio_<date>.csv`: weights, metrics block, frontier block.
pub fn write_portfolio_csv(
    dir: &Path,
    date: &str,
    assets: &[String],
    result: &PeriodResult,
) -> Result<PathBuf> {
    let path = dir.join(format!("portfolio_{}.csv", sanitize_date(date)));
    ensure_dir(&path)?;
    let mut wtr = csv::WriterBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(&path)?;

    wtr.write_record(["asset", "tracking_weight", "mpt_weight"])?;
    for (i, asset) in assets.iter().enumerate() {
        wtr.serialize(WeightRow {
            asset,
            tracking_weight: result.tracking_weights[i],
            mpt_weight: result.mpt_weights[i],
        })?;
    }

    wtr.write_record(["metric", "value"])?;
    for row in metric_rows(result) {
        wtr.serialize(row)?;
    }

    wtr.write_record(["frontier", "target_return", "tracking_error", "volatility"])?;
    for point in &result.tracking_frontier {
        wtr.write_record([
            "tracking".to_string(),
            format!("{:.8}", point.target_return),
            format!("{:.8}", point.tracking_error),
            format!("{:.8}", point.volatility),
        ])?;
    }
    for point in &result.mpt_frontier {
        wtr.write_record([
            "mpt".to_string(),
            format!("{:.8}", point.target_return),
            format!("{:.8}", point.tracking_error),
            format!("{:.8}", point.volatility),
        ])?;
    }
    wtr.flush()?;
    Ok(path)
}

/// Writes `risk_report_<date>.txt`, the human-readable period summary. The
/// cost estimate is converted to basis points of book at print time.
pub fn write_risk_report(
    dir: &Path,
    date: &str,
    assets: &[String],
    sectors: &SectorMap,
    result: &PeriodResult,
    book_value: f64,
) -> Result<PathBuf> {
    let path = dir.join(format!("risk_report_{}.txt", sanitize_date(date)));
    ensure_dir(&path)?;
    let risk = &result.risk;

    let mut out = String::new();
    let _ = writeln!(out, "Risk report for {date}");
    let _ = writeln!(out, "====================================");
    let _ = writeln!(out, "Daily volatility:      {:>10.6}", risk.daily_volatility);
    let _ = writeln!(out, "Monthly volatility:    {:>10.6}", risk.monthly_volatility);
    let _ = writeln!(out, "Annualised volatility: {:>10.6}", risk.annualised_volatility);
    let _ = writeln!(out, "Tracking error:        {:>10.6}", risk.tracking_error);
    let _ = writeln!(
        out,
        "Information ratio:     {}",
        fmt_opt(risk.information_ratio)
    );
    let _ = writeln!(out, "Sharpe ratio:          {}", fmt_opt(risk.sharpe));
    let _ = writeln!(out, "Sortino ratio:         {}", fmt_opt(risk.sortino));
    let _ = writeln!(out, "Max drawdown:          {:>10.6}", risk.max_drawdown);
    let _ = writeln!(out, "Beta:                  {:>10.6}", risk.beta);
    let _ = writeln!(out, "Alpha:                 {:>10.6}", risk.alpha);
    let _ = writeln!(
        out,
        "VaR:                   {:>10.6}  ES: {:>10.6}",
        risk.value_at_risk, risk.expected_shortfall
    );

    let _ = writeln!(out, "\nPositions");
    let _ = writeln!(out, "------------------------------------");
    for (i, asset) in assets.iter().enumerate() {
        let _ = writeln!(
            out,
            "{asset:<12} {:>9.4}  risk contribution {:>10.6}",
            result.tracking_weights[i], risk.risk_contributions[i]
        );
    }

    let _ = writeln!(out, "\nSector exposures");
    let _ = writeln!(out, "------------------------------------");
    for (sector, exposure) in sector_exposures(result.tracking_weights.view(), sectors)? {
        let _ = writeln!(out, "{sector:<12} {exposure:>9.4}");
    }

    let cost_bps = result.cost_estimate / book_value * 10_000.0;
    let _ = writeln!(out, "\nTransaction cost estimate: {cost_bps:.2} bps of book");

    std::fs::write(&path, out)?;
    Ok(path)
}

/// Writes `final_portfolio_analysis.csv` for the last completed period.
pub fn write_final_analysis(
    dir: &Path,
    date: &str,
    assets: &[String],
    result: &PeriodResult,
) -> Result<PathBuf> {
    let path = dir.join("final_portfolio_analysis.csv");
    ensure_dir(&path)?;
    let mut wtr = csv::WriterBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(&path)?;

    wtr.write_record(["final_date", date])?;
    wtr.write_record(["asset", "tracking_weight", "mpt_weight"])?;
    for (i, asset) in assets.iter().enumerate() {
        wtr.serialize(WeightRow {
            asset,
            tracking_weight: result.tracking_weights[i],
            mpt_weight: result.mpt_weights[i],
        })?;
    }
    wtr.write_record(["metric", "value"])?;
    for row in metric_rows(result) {
        wtr.serialize(row)?;
    }
    wtr.flush()?;
    Ok(path)
}

fn fmt_opt(v: Option<f64>) -> String {
    match v {
        Some(x) => format!("{x:>10.6}"),
        None => "       n/a".to_string(),
    }
}
