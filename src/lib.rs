//! Quantitative portfolio construction engine.
//!
//! Given a panel of daily asset returns and an aligned benchmark series, the
//! engine solves the closed-form mean-variance and tracking-error problems,
//! sweeps an efficient frontier, enforces risk constraints by fixed-point
//! projection and drives a monthly rebalancing loop with a transaction-cost
//! acceptance gate.

pub mod config;
pub mod constraints;
pub mod costs;
pub mod covariance;
pub mod data;
pub mod engine;
pub mod error;
pub mod matrix;
pub mod metrics;
pub mod optimization;
pub mod rebalance;
pub mod report;
pub mod visualization;

pub use config::{ConstraintLimits, CostParams, EngineParams, RiskParams};
pub use engine::{PeriodResult, PortfolioEngine};
pub use error::{EngineError, Result};
pub use rebalance::{Rebalancer, TickOutcome};
