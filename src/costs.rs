//! Transaction-cost model: fixed and variable commission, square-root
//! slippage, and power-law market impact decayed over the execution horizon.
//! All outputs are absolute currency; callers divide by book value where a
//! turnover-normalised figure is needed.

use ndarray::ArrayView1;

use crate::config::CostParams;
use crate::error::{EngineError, Result};
use crate::matrix::same_len;

#[derive(Debug, Clone)]
pub struct TransactionCostModel {
    params: CostParams,
}

impl TransactionCostModel {
    /// Validates the coefficient record up front so the per-trade paths can
    /// stay arithmetic-only.
    pub fn new(params: CostParams) -> Result<Self> {
        let checks = [
            ("fixed_commission", params.fixed_commission),
            ("variable_rate", params.variable_rate),
            ("slippage_coeff", params.slippage_coeff),
            ("impact_coeff", params.impact_coeff),
            ("impact_decay", params.impact_decay),
        ];
        for (name, value) in checks {
            if value < 0.0 {
                return Err(EngineError::InvalidInput {
                    param: name,
                    value,
                    detail: "cost coefficients must be non-negative",
                });
            }
        }
        if params.days_to_execute < 1 {
            return Err(EngineError::InvalidInput {
                param: "days_to_execute",
                value: params.days_to_execute as f64,
                detail: "execution horizon must be at least one day",
            });
        }
        Ok(Self { params })
    }

    pub fn params(&self) -> &CostParams {
        &self.params
    }

    /// Market impact of working `notional` against daily volume `adv`,
    /// split evenly across the execution horizon with exponential decay:
    /// Σ_d coeff · (s/D / v)^1.5 · exp(-decay · d).
    pub fn market_impact(&self, notional: f64, adv: f64) -> Result<f64> {
        if adv <= 0.0 {
            return Err(EngineError::InvalidInput {
                param: "adv",
                value: adv,
                detail: "average daily volume must be positive",
            });
        }
        let days = self.params.days_to_execute;
        let daily = notional / days as f64;
        let participation = daily / adv;
        let mut impact = 0.0;
        for d in 0..days {
            impact +=
                self.params.impact_coeff * participation.powf(1.5) * (-self.params.impact_decay * d as f64).exp();
        }
        Ok(impact)
    }

    /// Square-root slippage: coeff · sqrt(s / v).
    pub fn slippage(&self, notional: f64, adv: f64) -> Result<f64> {
        if adv <= 0.0 {
            return Err(EngineError::InvalidInput {
                param: "adv",
                value: adv,
                detail: "average daily volume must be positive",
            });
        }
        Ok(self.params.slippage_coeff * (notional / adv).sqrt())
    }

    /// Total estimated cost of trading from `current` to `target` on a book
    /// of `book_value`: per non-zero leg, fixed commission + variable
    /// commission + impact + slippage.
    pub fn total_cost(
        &self,
        current: ArrayView1<f64>,
        target: ArrayView1<f64>,
        book_value: f64,
        adv: ArrayView1<f64>,
    ) -> Result<f64> {
        same_len(current.len(), target.len(), "total_cost")?;
        same_len(current.len(), adv.len(), "total_cost")?;
        let mut cost = 0.0;
        for i in 0..current.len() {
            let notional = (target[i] - current[i]).abs() * book_value;
            if notional <= 0.0 {
                continue;
            }
            cost += self.params.fixed_commission;
            cost += notional * self.params.variable_rate;
            cost += self.market_impact(notional, adv[i])?;
            cost += self.slippage(notional, adv[i])?;
        }
        Ok(cost)
    }

    /// Total cost as a fraction of book value.
    pub fn cost_fraction(
        &self,
        current: ArrayView1<f64>,
        target: ArrayView1<f64>,
        book_value: f64,
        adv: ArrayView1<f64>,
    ) -> Result<f64> {
        if book_value <= 0.0 {
            return Err(EngineError::InvalidInput {
                param: "book_value",
                value: book_value,
                detail: "book value must be positive",
            });
        }
        Ok(self.total_cost(current, target, book_value, adv)? / book_value)
    }

    /// Turnover-based estimate: fixed commission charged once when anything
    /// trades, variable on the one-way turnover notional, plus the per-leg
    /// impact and slippage sums.
    pub fn rebalance_estimate(
        &self,
        current: ArrayView1<f64>,
        target: ArrayView1<f64>,
        book_value: f64,
        adv: ArrayView1<f64>,
    ) -> Result<f64> {
        same_len(current.len(), target.len(), "rebalance_estimate")?;
        same_len(current.len(), adv.len(), "rebalance_estimate")?;
        let to = turnover(current, target)?;
        let mut cost = if to > 0.0 {
            self.params.fixed_commission
        } else {
            0.0
        };
        cost += to * book_value * self.params.variable_rate;
        for i in 0..current.len() {
            let notional = (target[i] - current[i]).abs() * book_value;
            if notional <= 0.0 {
                continue;
            }
            cost += self.market_impact(notional, adv[i])?;
            cost += self.slippage(notional, adv[i])?;
        }
        Ok(cost)
    }
}

/// One-way turnover: ½ Σ |w1 - w0|.
pub fn turnover(current: ArrayView1<f64>, target: ArrayView1<f64>) -> Result<f64> {
    same_len(current.len(), target.len(), "turnover")?;
    Ok(current
        .iter()
        .zip(target.iter())
        .map(|(a, b)| (b - a).abs())
        .sum::<f64>()
        / 2.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn seed_model() -> TransactionCostModel {
        TransactionCostModel::new(CostParams {
            fixed_commission: 100.0,
            variable_rate: 0.0005,
            slippage_coeff: 0.0002,
            impact_coeff: 0.1,
            days_to_execute: 1,
            impact_decay: 0.1,
        })
        .unwrap()
    }

    #[test]
    fn pinned_two_leg_cost() {
        let model = seed_model();
        let current = array![0.5, 0.5];
        let target = array![0.6, 0.4];
        let adv = array![1e7, 1e7];
        let cost = model.total_cost(current.view(), target.view(), 1e6, adv.view()).unwrap();
        // 2 legs of 1e5 notional: 2*100 fixed + 2*50 variable
        // + 2 * 0.1*(0.01)^1.5 impact + 2 * 0.0002*0.1 slippage.
        assert!((cost - 300.00024).abs() < 1e-9);
    }

    #[test]
    fn no_trade_costs_nothing() {
        let model = seed_model();
        let w = array![0.5, 0.5];
        let adv = array![1e7, 1e7];
        assert_eq!(model.total_cost(w.view(), w.view(), 1e6, adv.view()).unwrap(), 0.0);
        assert_eq!(
            model.rebalance_estimate(w.view(), w.view(), 1e6, adv.view()).unwrap(),
            0.0
        );
    }

    #[test]
    fn turnover_is_half_absolute_change() {
        let t = turnover(array![0.5, 0.5].view(), array![0.6, 0.4].view()).unwrap();
        assert!((t - 0.1).abs() < 1e-15);
        let t = turnover(array![0.8, 0.2].view(), array![0.2, 0.8].view()).unwrap();
        assert!((t - 0.6).abs() < 1e-15);
    }

    #[test]
    fn doubling_trades_scales_each_term() {
        let model = seed_model();
        let single_impact = model.market_impact(1e5, 1e7).unwrap();
        let double_impact = model.market_impact(2e5, 1e7).unwrap();
        assert!((double_impact / single_impact - 2.0_f64.powf(1.5)).abs() < 1e-9);

        let single_slip = model.slippage(1e5, 1e7).unwrap();
        let double_slip = model.slippage(2e5, 1e7).unwrap();
        assert!((double_slip / single_slip - 2.0_f64.sqrt()).abs() < 1e-9);

        // Variable commission is linear in the notional, so doubling every
        // trade at least doubles total cost net of the fixed part.
        let current = array![0.5, 0.5];
        let adv = array![1e7, 1e7];
        let small = model
            .total_cost(current.view(), array![0.55, 0.45].view(), 1e6, adv.view())
            .unwrap();
        let large = model
            .total_cost(current.view(), array![0.6, 0.4].view(), 1e6, adv.view())
            .unwrap();
        assert!(large - 200.0 >= 2.0 * (small - 200.0) - 1e-9);
    }

    #[test]
    fn multi_day_impact_decays() {
        let one_day = seed_model();
        let three_day = TransactionCostModel::new(CostParams {
            days_to_execute: 3,
            ..one_day.params().clone()
        })
        .unwrap();
        // Working the order over more days lowers participation and impact.
        let fast = one_day.market_impact(3e5, 1e7).unwrap();
        let slow = three_day.market_impact(3e5, 1e7).unwrap();
        assert!(slow < fast);

        // Hand check for D=3: 3 days of (s/3/v)^1.5 with decay 0.1.
        let participation: f64 = 1e5 / 1e7;
        let per_day = 0.1 * participation.powf(1.5);
        let expected = per_day * (1.0 + (-0.1_f64).exp() + (-0.2_f64).exp());
        assert!((slow - expected).abs() < 1e-12);
    }

    #[test]
    fn invalid_parameters_rejected() {
        let bad = CostParams {
            variable_rate: -0.001,
            ..CostParams::default()
        };
        assert!(matches!(
            TransactionCostModel::new(bad),
            Err(EngineError::InvalidInput { .. })
        ));

        let bad = CostParams {
            days_to_execute: 0,
            ..CostParams::default()
        };
        assert!(matches!(
            TransactionCostModel::new(bad),
            Err(EngineError::InvalidInput { .. })
        ));

        let model = seed_model();
        assert!(matches!(
            model.market_impact(1e5, 0.0),
            Err(EngineError::InvalidInput { .. })
        ));
        assert!(matches!(
            model.slippage(1e5, -1.0),
            Err(EngineError::InvalidInput { .. })
        ));
    }

    #[test]
    fn rebalance_estimate_charges_fixed_once() {
        let model = seed_model();
        let current = array![0.5, 0.5];
        let target = array![0.6, 0.4];
        let adv = array![1e7, 1e7];
        let estimate = model
            .rebalance_estimate(current.view(), target.view(), 1e6, adv.view())
            .unwrap();
        // turnover 0.1: 100 fixed + 0.1*1e6*0.0005 variable + impact/slippage.
        assert!((estimate - (100.0 + 50.0 + 0.00024)).abs() < 1e-9);
    }
}
