//! Efficient-frontier chart for the final period.

use plotters::prelude::*;
use std::error::Error;
use std::path::Path;

use crate::optimization::FrontierPoint;

/// Renders both frontier traces (volatility on x, target return on y) to a
/// PNG. The tracking-error sweep is drawn in blue, the mean-variance sweep
/// in red.
pub fn plot_efficient_frontier(
    output_path: &Path,
    tracking: &[FrontierPoint],
    mpt: &[FrontierPoint],
) -> Result<(), Box<dyn Error>> {
    if let Some(parent) = output_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let root = BitMapBackend::new(output_path, (800, 600)).into_drawing_area();
    root.fill(&WHITE)?;

    let all = tracking.iter().chain(mpt.iter());
    let mut x_max = 0.0_f64;
    let mut y_min = f64::INFINITY;
    let mut y_max = f64::NEG_INFINITY;
    for p in all {
        x_max = x_max.max(p.volatility);
        y_min = y_min.min(p.target_return);
        y_max = y_max.max(p.target_return);
    }
    if !x_max.is_finite() || !y_min.is_finite() || !y_max.is_finite() {
        return Err("no frontier points to plot".into());
    }
    let pad = (y_max - y_min).abs().max(1e-6) * 0.1;

    let mut chart = ChartBuilder::on(&root)
        .caption("Efficient Frontier", ("sans-serif", 30))
        .margin(20)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(0f64..x_max * 1.1, (y_min - pad)..(y_max + pad))?;

    chart
        .configure_mesh()
        .x_desc("Volatility (daily)")
        .y_desc("Target Return (daily)")
        .draw()?;

    chart
        .draw_series(
            tracking
                .iter()
                .map(|p| Circle::new((p.volatility, p.target_return), 3, BLUE.filled())),
        )?
        .label("Tracking-error sweep")
        .legend(|(x, y)| Circle::new((x, y), 3, BLUE.filled()));

    chart
        .draw_series(
            mpt.iter()
                .map(|p| Circle::new((p.volatility, p.target_return), 3, RED.filled())),
        )?
        .label("Mean-variance sweep")
        .legend(|(x, y)| Circle::new((x, y), 3, RED.filled()));

    chart.configure_series_labels().border_style(BLACK).draw()?;
    root.present()?;
    Ok(())
}
