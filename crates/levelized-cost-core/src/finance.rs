use serde::{Deserialize, Serialize};

use crate::error::LevelizedCostError;
use crate::types::{Money, Rate};
use crate::LevelizedCostResult;

const SCHEDULE_TOLERANCE: f64 = 1e-9;

/// Capital structure, tax and incentive assumptions shared by both engines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FinancingParameters {
    /// Nominal discount rate (WACC)
    pub discount_rate: Rate,
    /// Annual escalation applied to O&M and fuel
    pub inflation_rate: Rate,
    /// Corporate tax rate
    pub tax_rate: Rate,
    /// Share of net capex funded with debt
    pub debt_fraction: Rate,
    /// Interest rate on the debt tranche
    pub debt_interest_rate: Rate,
    /// Investment tax credit as a fraction of gross capex
    pub federal_itc: Rate,
    /// Rebate per unit of capacity (kW or kWh depending on the asset)
    pub state_rebate: Money,
    /// Tax depreciation fractions by year (MACRS 5-year by default)
    pub depreciation_schedule: Vec<Rate>,
}

impl Default for FinancingParameters {
    fn default() -> Self {
        FinancingParameters {
            discount_rate: 0.07,
            inflation_rate: 0.025,
            tax_rate: 0.21,
            debt_fraction: 0.6,
            debt_interest_rate: 0.05,
            federal_itc: 0.30,
            state_rebate: 0.0,
            depreciation_schedule: vec![0.2, 0.32, 0.192, 0.1152, 0.1152, 0.0576],
        }
    }
}

impl FinancingParameters {
    /// Discount rate after the debt tax shield.
    pub fn effective_discount_rate(&self) -> Rate {
        effective_discount_rate(self)
    }

    pub fn validate(&self) -> LevelizedCostResult<()> {
        let rates = [
            ("financing.discount_rate", self.discount_rate),
            ("financing.inflation_rate", self.inflation_rate),
            ("financing.tax_rate", self.tax_rate),
            ("financing.debt_fraction", self.debt_fraction),
            ("financing.debt_interest_rate", self.debt_interest_rate),
            ("financing.federal_itc", self.federal_itc),
            ("financing.state_rebate", self.state_rebate),
        ];
        for (field, value) in rates {
            if !value.is_finite() {
                return Err(LevelizedCostError::invalid(field, "Must be a finite number"));
            }
        }

        if self.effective_discount_rate() <= -1.0 {
            return Err(LevelizedCostError::invalid(
                "financing.discount_rate",
                "Effective discount rate must be greater than -100%",
            ));
        }
        if self.inflation_rate <= -1.0 {
            return Err(LevelizedCostError::invalid(
                "financing.inflation_rate",
                "Inflation rate must be greater than -100%",
            ));
        }

        if let Some(bad) = self
            .depreciation_schedule
            .iter()
            .find(|f| !f.is_finite() || **f < 0.0)
        {
            return Err(LevelizedCostError::invalid(
                "financing.depreciation_schedule",
                format!("Depreciation fractions must be non-negative, got {bad}"),
            ));
        }
        let total: f64 = self.depreciation_schedule.iter().sum();
        if total > 1.0 + SCHEDULE_TOLERANCE {
            return Err(LevelizedCostError::invalid(
                "financing.depreciation_schedule",
                format!("Depreciation fractions must sum to at most 1 (got {total})"),
            ));
        }

        Ok(())
    }
}

/// `discount_rate × (1 − tax_rate × debt_fraction)`. All discounting in the
/// engines goes through this rate, never the nominal one.
pub fn effective_discount_rate(financing: &FinancingParameters) -> Rate {
    financing.discount_rate * (1.0 - financing.tax_rate * financing.debt_fraction)
}

/// Present-value factor for a cash flow `year` years out.
pub fn discount_factor(rate: Rate, year: u32) -> f64 {
    1.0 / (1.0 + rate).powi(year as i32)
}

/// NPV of a level annual amount escalating at `inflation_rate`.
///
/// Year 0 is neither inflated nor discounted; `years = 0` yields 0.
pub fn npv_of_annual_series(
    annual_amount: Money,
    years: u32,
    discount_rate: Rate,
    inflation_rate: Rate,
) -> Money {
    let mut npv = 0.0;
    for year in 0..years {
        let inflated = annual_amount * (1.0 + inflation_rate).powi(year as i32);
        npv += inflated * discount_factor(discount_rate, year);
    }
    npv
}

/// Capex after the investment tax credit and the per-unit rebate, floored at 0.
pub fn net_capex(capex_per_unit: Money, size: f64, financing: &FinancingParameters) -> Money {
    let gross = capex_per_unit * size;
    let itc_benefit = gross * financing.federal_itc;
    let rebate = financing.state_rebate * size;
    (gross - itc_benefit - rebate).max(0.0)
}

/// NPV of interest on the debt-funded share of capex, with the loan term
/// equal to `years` and no escalation.
pub fn financing_cost_npv(net_capex: Money, years: u32, financing: &FinancingParameters) -> Money {
    let annual_interest = net_capex * financing.debt_fraction * financing.debt_interest_rate;
    npv_of_annual_series(
        annual_interest,
        years,
        financing.effective_discount_rate(),
        0.0,
    )
}

/// Capital recovery factor: the level annual payment per unit of present value.
pub fn capital_recovery_factor(lifetime: u32, discount_rate: Rate) -> f64 {
    if lifetime == 0 {
        return 0.0;
    }
    if discount_rate == 0.0 {
        return 1.0 / lifetime as f64;
    }
    let factor = (1.0 + discount_rate).powi(lifetime as i32);
    discount_rate * factor / (factor - 1.0)
}

/// Spread a present-value cost over discounted energy; 0 when there is no energy.
pub fn levelize(cost: Money, discounted_energy: f64) -> f64 {
    if discounted_energy > 0.0 {
        cost / discounted_energy
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effective_discount_rate() {
        let f = FinancingParameters::default();
        // 0.07 * (1 - 0.21 * 0.6) = 0.06118
        assert!((f.effective_discount_rate() - 0.06118).abs() < 1e-12);
    }

    #[test]
    fn test_npv_zero_years() {
        assert_eq!(npv_of_annual_series(1000.0, 0, 0.07, 0.02), 0.0);
    }

    #[test]
    fn test_npv_year_zero_undiscounted() {
        assert_eq!(npv_of_annual_series(250.0, 1, 0.5, 0.5), 250.0);
    }

    #[test]
    fn test_npv_matches_closed_form_annuity_due() {
        // Annuity-due: A * (1 - (1+r)^-n) / r * (1+r)
        let r: f64 = 0.08;
        let expected = 100.0 * (1.0 - (1.0 + r).powi(-10)) / r * (1.0 + r);
        let npv = npv_of_annual_series(100.0, 10, r, 0.0);
        assert!((npv - expected).abs() < 1e-9);
    }

    #[test]
    fn test_equal_inflation_and_discount_is_undiscounted_sum() {
        let npv = npv_of_annual_series(10.0, 20, 0.03, 0.03);
        assert!((npv - 200.0).abs() < 1e-9);
    }

    #[test]
    fn test_net_capex_floor() {
        let f = FinancingParameters {
            federal_itc: 0.3,
            state_rebate: 5000.0,
            ..FinancingParameters::default()
        };
        assert_eq!(net_capex(2000.0, 10.0, &f), 0.0);
    }

    #[test]
    fn test_net_capex_with_incentives() {
        let f = FinancingParameters {
            federal_itc: 0.3,
            state_rebate: 100.0,
            ..FinancingParameters::default()
        };
        // 2000*10 = 20000; -6000 ITC; -1000 rebate
        assert!((net_capex(2000.0, 10.0, &f) - 13_000.0).abs() < 1e-9);
    }

    #[test]
    fn test_schedule_over_one_rejected() {
        let f = FinancingParameters {
            depreciation_schedule: vec![0.6, 0.6],
            ..FinancingParameters::default()
        };
        assert!(f.validate().is_err());
    }

    #[test]
    fn test_default_schedule_valid() {
        assert!(FinancingParameters::default().validate().is_ok());
    }

    #[test]
    fn test_levelize_zero_guard() {
        assert_eq!(levelize(1_000.0, 0.0), 0.0);
        assert_eq!(levelize(1_000.0, 4.0), 250.0);
    }

    #[test]
    fn test_capital_recovery_factor() {
        assert_eq!(capital_recovery_factor(0, 0.05), 0.0);
        assert!((capital_recovery_factor(4, 0.0) - 0.25).abs() < 1e-12);
        // 10y @ 8% ≈ 0.14903
        assert!((capital_recovery_factor(10, 0.08) - 0.149_029_5).abs() < 1e-6);
    }
}
