//! Monthly rebalancing controller. Holds the incumbent weights across
//! periods, replays caller-ordered date ticks against the engine's
//! month-start calendar and applies the cost/benefit acceptance gate.

use ndarray::{Array1, ArrayView1};
use tracing::{info, warn};

use crate::costs;
use crate::engine::{PeriodResult, PortfolioEngine};
use crate::error::{EngineError, Result};

/// What a single tick did.
#[derive(Debug, Clone)]
pub enum TickOutcome {
    /// Date not in the rebalance calendar; weights untouched.
    NotInCalendar,
    /// New weights accepted and swapped in.
    Accepted {
        result: Box<PeriodResult>,
        turnover: f64,
        cost_fraction: f64,
    },
    /// Proposed weights rejected by the cost/benefit gate; weights retained.
    Rejected {
        result: Box<PeriodResult>,
        turnover: f64,
        cost_fraction: f64,
    },
    /// Constraints were unsatisfiable this period; weights retained.
    Skipped { reason: String },
}

/// Drives the engine across month-end ticks. Borrows the engine mutably, so
/// it cannot outlive it; ticks must arrive in non-decreasing date order (the
/// rebalancer does not sort).
pub struct Rebalancer<'a> {
    engine: &'a mut PortfolioEngine,
    current: Array1<f64>,
    period: usize,
}

impl<'a> Rebalancer<'a> {
    /// Starts from an equal-weight book.
    pub fn new(engine: &'a mut PortfolioEngine) -> Self {
        let n = engine.panel().n_assets();
        let current = Array1::from_elem(n, 1.0 / n as f64);
        Self {
            engine,
            current,
            period: 0,
        }
    }

    pub fn with_initial_weights(engine: &'a mut PortfolioEngine, weights: Array1<f64>) -> Self {
        Self {
            engine,
            current: weights,
            period: 0,
        }
    }

    pub fn current_weights(&self) -> ArrayView1<f64> {
        self.current.view()
    }

    pub fn period(&self) -> usize {
        self.period
    }

    pub fn engine(&self) -> &PortfolioEngine {
        self.engine
    }

    /// Processes one observed date. Non-calendar dates are a strict no-op.
    /// On calendar dates the engine optimises, the cost/benefit gate runs,
    /// and the period counter advances whatever the gate decides. A
    /// constraints failure is caught and logged; other errors propagate.
    pub fn tick(&mut self, date: &str) -> Result<TickOutcome> {
        if !self.engine.calendar().iter().any(|d| d == date) {
            return Ok(TickOutcome::NotInCalendar);
        }

        let period = self.period;
        self.period += 1;

        let result = match self.engine.optimise(period, self.current.view()) {
            Ok(result) => result,
            Err(EngineError::ConstraintsUnsatisfiable { iterations, violations }) => {
                let reason =
                    format!("period {period}: infeasible after {iterations} iterations: {violations:?}");
                warn!(date, %reason, "keeping current weights");
                return Ok(TickOutcome::Skipped { reason });
            }
            Err(e) => return Err(e),
        };

        let proposed = &result.tracking_weights;
        let turnover = costs::turnover(self.current.view(), proposed.view())?;
        let book = self.engine.params().book_value;
        let cost = self.engine.cost_model().rebalance_estimate(
            self.current.view(),
            proposed.view(),
            book,
            self.engine.adv(),
        )?;
        let cost_fraction = cost / book;

        if cost_fraction < result.expected_excess_return {
            info!(
                date,
                period,
                turnover,
                cost_fraction,
                expected = result.expected_excess_return,
                "rebalance accepted"
            );
            self.current = proposed.clone();
            Ok(TickOutcome::Accepted {
                result: Box::new(result),
                turnover,
                cost_fraction,
            })
        } else {
            info!(
                date,
                period,
                turnover,
                cost_fraction,
                expected = result.expected_excess_return,
                "rebalance rejected, retaining weights"
            );
            Ok(TickOutcome::Rejected {
                result: Box::new(result),
                turnover,
                cost_fraction,
            })
        }
    }
}
