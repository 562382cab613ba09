use std::error::Error;
use std::path::Path;

use ndarray::Array1;
use tracing::info;
use tracing_subscriber::EnvFilter;

use portopt::config::{ConstraintLimits, CostParams, EngineParams, RiskParams};
use portopt::data::{load_panel, SectorMap};
use portopt::engine::{PeriodResult, PortfolioEngine};
use portopt::rebalance::{Rebalancer, TickOutcome};
use portopt::{report, visualization};

const SECTOR_NAMES: [&str; 4] = ["Technology", "Financials", "Energy", "Consumer"];
const REPORT_DIR: &str = "reports";
/// Flat ADV assumption, notional currency per day per asset.
const DEFAULT_ADV: f64 = 5e7;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    if let Err(e) = run() {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    let path = std::env::args()
        .nth(1)
        .ok_or("usage: portopt <portfolio.csv>")?;

    let panel = load_panel(&path)?;
    info!(
        days = panel.n_days(),
        assets = panel.n_assets(),
        "loaded returns panel"
    );

    let n = panel.n_assets();
    let params = EngineParams::default();
    let cost_params = CostParams::for_book(params.book_value);
    let limits = ConstraintLimits {
        min_liquidity: params.book_value,
        ..ConstraintLimits::default()
    };
    let mut engine = PortfolioEngine::new(
        panel,
        SectorMap::rotation(n, &SECTOR_NAMES),
        Array1::from_elem(n, DEFAULT_ADV),
        params,
        RiskParams::default(),
        cost_params,
        limits,
    )?;

    let dates = engine.panel().dates.clone();
    let assets = engine.panel().assets.clone();
    let out_dir = Path::new(REPORT_DIR);

    let mut rebalancer = Rebalancer::new(&mut engine);
    let mut last: Option<(String, Box<PeriodResult>)> = None;

    for date in &dates {
        let result = match rebalancer.tick(date)? {
            TickOutcome::Accepted { result, .. } | TickOutcome::Rejected { result, .. } => result,
            TickOutcome::NotInCalendar | TickOutcome::Skipped { .. } => continue,
        };
        let book = rebalancer.engine().params().book_value;
        report::write_portfolio_csv(out_dir, date, &assets, &result)?;
        report::write_risk_report(
            out_dir,
            date,
            &assets,
            rebalancer.engine().sectors(),
            &result,
            book,
        )?;
        last = Some((date.clone(), result));
    }

    let (final_date, final_result) =
        last.ok_or("no rebalance period completed; input too short?")?;
    report::write_final_analysis(out_dir, &final_date, &assets, &final_result)?;
    visualization::plot_efficient_frontier(
        &out_dir.join("efficient_frontier.png"),
        &final_result.tracking_frontier,
        &final_result.mpt_frontier,
    )?;
    info!(date = %final_date, "analysis complete");
    Ok(())
}
