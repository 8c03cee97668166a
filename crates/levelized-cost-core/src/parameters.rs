//! Addressable numeric parameters of the engine inputs.
//!
//! The analyzers and the scenario builder name fields by dotted path
//! (`capex_per_kw`, `financing.discount_rate`). Each path resolves to a
//! variant of a closed enum, so an unknown path fails at parse time and every
//! getter/setter pair is checked by the compiler.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::LevelizedCostError;
use crate::finance::FinancingParameters;
use crate::lcoe::{compute_lcoe, LcoeInput};
use crate::lcos::{compute_lcos, LcosInput};
use crate::LevelizedCostResult;

/// An engine input that can be priced and varied one parameter at a time.
pub trait LevelizedCostModel: Clone + Serialize {
    type Parameter: Copy + Eq + fmt::Debug + fmt::Display + FromStr<Err = LevelizedCostError>;

    /// Name of the output metric, e.g. `lcoe_usd_per_kwh`.
    const METRIC: &'static str;

    /// Run the engine and return the levelized cost in USD/kWh.
    fn levelized_cost_per_kwh(&self) -> LevelizedCostResult<f64>;

    /// Current value of a parameter.
    fn parameter(&self, parameter: Self::Parameter) -> LevelizedCostResult<f64>;

    /// A copy of `self` with one parameter replaced.
    fn with_parameter(&self, parameter: Self::Parameter, value: f64) -> LevelizedCostResult<Self>;

    /// Parameters swept when the caller does not name any.
    fn default_sensitivity_parameters() -> Vec<Self::Parameter>;
}

/// Apply `path → value` overrides in key order, failing on the first unknown path.
pub fn apply_overrides<M: LevelizedCostModel>(
    base: &M,
    overrides: &BTreeMap<String, f64>,
) -> LevelizedCostResult<M> {
    let mut current = base.clone();
    for (path, value) in overrides {
        let parameter: M::Parameter = path.parse()?;
        current = current.with_parameter(parameter, *value)?;
    }
    Ok(current)
}

/// Round a sampled value to whole years/cycles, rejecting negatives.
fn whole_units(field: &str, value: f64) -> LevelizedCostResult<u32> {
    if !value.is_finite() {
        return Err(LevelizedCostError::invalid(field, "Must be a finite number"));
    }
    let rounded = value.round();
    if rounded < 0.0 {
        return Err(LevelizedCostError::invalid(
            field,
            format!("Must be non-negative, got {value}"),
        ));
    }
    if rounded > u32::MAX as f64 {
        return Err(LevelizedCostError::invalid(field, "Value too large"));
    }
    Ok(rounded as u32)
}

// ---------------------------------------------------------------------------
// Financing
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FinancingParameter {
    DiscountRate,
    InflationRate,
    TaxRate,
    DebtFraction,
    DebtInterestRate,
    FederalItc,
    StateRebate,
}

impl FinancingParameter {
    pub const ALL: [FinancingParameter; 7] = [
        FinancingParameter::DiscountRate,
        FinancingParameter::InflationRate,
        FinancingParameter::TaxRate,
        FinancingParameter::DebtFraction,
        FinancingParameter::DebtInterestRate,
        FinancingParameter::FederalItc,
        FinancingParameter::StateRebate,
    ];

    pub fn path(&self) -> &'static str {
        match self {
            FinancingParameter::DiscountRate => "financing.discount_rate",
            FinancingParameter::InflationRate => "financing.inflation_rate",
            FinancingParameter::TaxRate => "financing.tax_rate",
            FinancingParameter::DebtFraction => "financing.debt_fraction",
            FinancingParameter::DebtInterestRate => "financing.debt_interest_rate",
            FinancingParameter::FederalItc => "financing.federal_itc",
            FinancingParameter::StateRebate => "financing.state_rebate",
        }
    }

    pub fn get(&self, f: &FinancingParameters) -> f64 {
        match self {
            FinancingParameter::DiscountRate => f.discount_rate,
            FinancingParameter::InflationRate => f.inflation_rate,
            FinancingParameter::TaxRate => f.tax_rate,
            FinancingParameter::DebtFraction => f.debt_fraction,
            FinancingParameter::DebtInterestRate => f.debt_interest_rate,
            FinancingParameter::FederalItc => f.federal_itc,
            FinancingParameter::StateRebate => f.state_rebate,
        }
    }

    pub fn with(&self, f: &FinancingParameters, value: f64) -> FinancingParameters {
        let mut next = f.clone();
        match self {
            FinancingParameter::DiscountRate => next.discount_rate = value,
            FinancingParameter::InflationRate => next.inflation_rate = value,
            FinancingParameter::TaxRate => next.tax_rate = value,
            FinancingParameter::DebtFraction => next.debt_fraction = value,
            FinancingParameter::DebtInterestRate => next.debt_interest_rate = value,
            FinancingParameter::FederalItc => next.federal_itc = value,
            FinancingParameter::StateRebate => next.state_rebate = value,
        }
        next
    }
}

// ---------------------------------------------------------------------------
// LCOE
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LcoeParameter {
    CapexPerKw,
    SystemSizeKw,
    FixedOmPerKwYear,
    VariableOmPerMwh,
    FuelCostPerMwh,
    CapacityFactor,
    SystemLifetimeYears,
    DegradationRate,
    Financing(FinancingParameter),
}

impl LcoeParameter {
    /// Every addressable LCOE parameter.
    pub const ALL: [LcoeParameter; 15] = [
        LcoeParameter::CapexPerKw,
        LcoeParameter::SystemSizeKw,
        LcoeParameter::FixedOmPerKwYear,
        LcoeParameter::VariableOmPerMwh,
        LcoeParameter::FuelCostPerMwh,
        LcoeParameter::CapacityFactor,
        LcoeParameter::SystemLifetimeYears,
        LcoeParameter::DegradationRate,
        LcoeParameter::Financing(FinancingParameter::DiscountRate),
        LcoeParameter::Financing(FinancingParameter::InflationRate),
        LcoeParameter::Financing(FinancingParameter::TaxRate),
        LcoeParameter::Financing(FinancingParameter::DebtFraction),
        LcoeParameter::Financing(FinancingParameter::DebtInterestRate),
        LcoeParameter::Financing(FinancingParameter::FederalItc),
        LcoeParameter::Financing(FinancingParameter::StateRebate),
    ];

    pub fn path(&self) -> &'static str {
        match self {
            LcoeParameter::CapexPerKw => "capex_per_kw",
            LcoeParameter::SystemSizeKw => "system_size_kw",
            LcoeParameter::FixedOmPerKwYear => "fixed_om_per_kw_year",
            LcoeParameter::VariableOmPerMwh => "variable_om_per_mwh",
            LcoeParameter::FuelCostPerMwh => "fuel_cost_per_mwh",
            LcoeParameter::CapacityFactor => "capacity_factor",
            LcoeParameter::SystemLifetimeYears => "system_lifetime_years",
            LcoeParameter::DegradationRate => "degradation.annual_rate",
            LcoeParameter::Financing(f) => f.path(),
        }
    }
}

impl fmt::Display for LcoeParameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

impl FromStr for LcoeParameter {
    type Err = LevelizedCostError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let path = s.trim();
        if path == "degradation.annual_degradation_rate" {
            return Ok(LcoeParameter::DegradationRate);
        }
        Self::ALL
            .into_iter()
            .find(|p| p.path() == path)
            .ok_or_else(|| {
                LevelizedCostError::invalid(path, "Not an addressable LCOE parameter")
            })
    }
}

impl LevelizedCostModel for LcoeInput {
    type Parameter = LcoeParameter;

    const METRIC: &'static str = "lcoe_usd_per_kwh";

    fn levelized_cost_per_kwh(&self) -> LevelizedCostResult<f64> {
        Ok(compute_lcoe(self)?.lcoe_usd_per_kwh)
    }

    fn parameter(&self, parameter: LcoeParameter) -> LevelizedCostResult<f64> {
        let value = match parameter {
            LcoeParameter::CapexPerKw => self.capex_per_kw,
            LcoeParameter::SystemSizeKw => self.system_size_kw,
            LcoeParameter::FixedOmPerKwYear => self.fixed_om_per_kw_year,
            LcoeParameter::VariableOmPerMwh => self.variable_om_per_mwh,
            LcoeParameter::FuelCostPerMwh => self.fuel_cost_per_mwh,
            LcoeParameter::CapacityFactor => self.capacity_factor,
            LcoeParameter::SystemLifetimeYears => self.system_lifetime_years as f64,
            LcoeParameter::DegradationRate => {
                self.degradation.annual_rate().ok_or_else(|| {
                    LevelizedCostError::invalid(
                        parameter.path(),
                        format!("{} degradation has no annual rate", self.degradation.name()),
                    )
                })?
            }
            LcoeParameter::Financing(f) => f.get(&self.financing),
        };
        Ok(value)
    }

    fn with_parameter(&self, parameter: LcoeParameter, value: f64) -> LevelizedCostResult<Self> {
        let mut next = self.clone();
        match parameter {
            LcoeParameter::CapexPerKw => next.capex_per_kw = value,
            LcoeParameter::SystemSizeKw => next.system_size_kw = value,
            LcoeParameter::FixedOmPerKwYear => next.fixed_om_per_kw_year = value,
            LcoeParameter::VariableOmPerMwh => next.variable_om_per_mwh = value,
            LcoeParameter::FuelCostPerMwh => next.fuel_cost_per_mwh = value,
            LcoeParameter::CapacityFactor => next.capacity_factor = value,
            LcoeParameter::SystemLifetimeYears => {
                next.system_lifetime_years = whole_units(parameter.path(), value)?
            }
            LcoeParameter::DegradationRate => {
                next.degradation = self.degradation.with_annual_rate(value)?
            }
            LcoeParameter::Financing(f) => next.financing = f.with(&self.financing, value),
        }
        Ok(next)
    }

    fn default_sensitivity_parameters() -> Vec<LcoeParameter> {
        vec![
            LcoeParameter::CapexPerKw,
            LcoeParameter::CapacityFactor,
            LcoeParameter::SystemLifetimeYears,
            LcoeParameter::FixedOmPerKwYear,
            LcoeParameter::Financing(FinancingParameter::DiscountRate),
        ]
    }
}

// ---------------------------------------------------------------------------
// LCOS
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LcosParameter {
    CapexPerKwh,
    SystemSizeKwh,
    PowerRatingKw,
    FixedOmPerKwhYear,
    VariableOmPerCycle,
    RoundTripEfficiency,
    CyclesPerYear,
    CycleLife,
    CalendarLifeYears,
    DepthOfDischarge,
    CapacityFadePerYear,
    EfficiencyFadePerCycle,
    Financing(FinancingParameter),
}

impl LcosParameter {
    /// Every addressable LCOS parameter.
    pub const ALL: [LcosParameter; 19] = [
        LcosParameter::CapexPerKwh,
        LcosParameter::SystemSizeKwh,
        LcosParameter::PowerRatingKw,
        LcosParameter::FixedOmPerKwhYear,
        LcosParameter::VariableOmPerCycle,
        LcosParameter::RoundTripEfficiency,
        LcosParameter::CyclesPerYear,
        LcosParameter::CycleLife,
        LcosParameter::CalendarLifeYears,
        LcosParameter::DepthOfDischarge,
        LcosParameter::CapacityFadePerYear,
        LcosParameter::EfficiencyFadePerCycle,
        LcosParameter::Financing(FinancingParameter::DiscountRate),
        LcosParameter::Financing(FinancingParameter::InflationRate),
        LcosParameter::Financing(FinancingParameter::TaxRate),
        LcosParameter::Financing(FinancingParameter::DebtFraction),
        LcosParameter::Financing(FinancingParameter::DebtInterestRate),
        LcosParameter::Financing(FinancingParameter::FederalItc),
        LcosParameter::Financing(FinancingParameter::StateRebate),
    ];

    pub fn path(&self) -> &'static str {
        match self {
            LcosParameter::CapexPerKwh => "capex_per_kwh",
            LcosParameter::SystemSizeKwh => "system_size_kwh",
            LcosParameter::PowerRatingKw => "power_rating_kw",
            LcosParameter::FixedOmPerKwhYear => "fixed_om_per_kwh_year",
            LcosParameter::VariableOmPerCycle => "variable_om_per_cycle",
            LcosParameter::RoundTripEfficiency => "round_trip_efficiency",
            LcosParameter::CyclesPerYear => "cycles_per_year",
            LcosParameter::CycleLife => "cycle_life",
            LcosParameter::CalendarLifeYears => "calendar_life_years",
            LcosParameter::DepthOfDischarge => "depth_of_discharge",
            LcosParameter::CapacityFadePerYear => "capacity_fade_per_year",
            LcosParameter::EfficiencyFadePerCycle => "efficiency_fade_per_cycle",
            LcosParameter::Financing(f) => f.path(),
        }
    }
}

impl fmt::Display for LcosParameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

impl FromStr for LcosParameter {
    type Err = LevelizedCostError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let path = s.trim();
        Self::ALL
            .into_iter()
            .find(|p| p.path() == path)
            .ok_or_else(|| {
                LevelizedCostError::invalid(path, "Not an addressable LCOS parameter")
            })
    }
}

impl LevelizedCostModel for LcosInput {
    type Parameter = LcosParameter;

    const METRIC: &'static str = "lcos_usd_per_kwh";

    fn levelized_cost_per_kwh(&self) -> LevelizedCostResult<f64> {
        Ok(compute_lcos(self)?.lcos_usd_per_kwh)
    }

    fn parameter(&self, parameter: LcosParameter) -> LevelizedCostResult<f64> {
        let value = match parameter {
            LcosParameter::CapexPerKwh => self.capex_per_kwh,
            LcosParameter::SystemSizeKwh => self.system_size_kwh,
            LcosParameter::PowerRatingKw => self.power_rating_kw,
            LcosParameter::FixedOmPerKwhYear => self.fixed_om_per_kwh_year,
            LcosParameter::VariableOmPerCycle => self.variable_om_per_cycle,
            LcosParameter::RoundTripEfficiency => self.round_trip_efficiency,
            LcosParameter::CyclesPerYear => self.cycles_per_year,
            LcosParameter::CycleLife => self.cycle_life as f64,
            LcosParameter::CalendarLifeYears => self.calendar_life_years as f64,
            LcosParameter::DepthOfDischarge => self.depth_of_discharge,
            LcosParameter::CapacityFadePerYear => self.capacity_fade_per_year,
            LcosParameter::EfficiencyFadePerCycle => self.efficiency_fade_per_cycle,
            LcosParameter::Financing(f) => f.get(&self.financing),
        };
        Ok(value)
    }

    fn with_parameter(&self, parameter: LcosParameter, value: f64) -> LevelizedCostResult<Self> {
        let mut next = self.clone();
        match parameter {
            LcosParameter::CapexPerKwh => next.capex_per_kwh = value,
            LcosParameter::SystemSizeKwh => next.system_size_kwh = value,
            LcosParameter::PowerRatingKw => next.power_rating_kw = value,
            LcosParameter::FixedOmPerKwhYear => next.fixed_om_per_kwh_year = value,
            LcosParameter::VariableOmPerCycle => next.variable_om_per_cycle = value,
            LcosParameter::RoundTripEfficiency => next.round_trip_efficiency = value,
            LcosParameter::CyclesPerYear => next.cycles_per_year = value,
            LcosParameter::CycleLife => next.cycle_life = whole_units(parameter.path(), value)?,
            LcosParameter::CalendarLifeYears => {
                next.calendar_life_years = whole_units(parameter.path(), value)?
            }
            LcosParameter::DepthOfDischarge => next.depth_of_discharge = value,
            LcosParameter::CapacityFadePerYear => next.capacity_fade_per_year = value,
            LcosParameter::EfficiencyFadePerCycle => next.efficiency_fade_per_cycle = value,
            LcosParameter::Financing(f) => next.financing = f.with(&self.financing, value),
        }
        Ok(next)
    }

    fn default_sensitivity_parameters() -> Vec<LcosParameter> {
        vec![
            LcosParameter::CapexPerKwh,
            LcosParameter::RoundTripEfficiency,
            LcosParameter::CycleLife,
            LcosParameter::CyclesPerYear,
            LcosParameter::CapacityFadePerYear,
            LcosParameter::Financing(FinancingParameter::DiscountRate),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::degradation::DegradationModel;

    #[test]
    fn test_every_lcoe_path_round_trips() {
        for p in LcoeParameter::ALL {
            assert_eq!(p.to_string().parse::<LcoeParameter>().unwrap(), p);
        }
    }

    #[test]
    fn test_every_lcos_path_round_trips() {
        for p in LcosParameter::ALL {
            assert_eq!(p.to_string().parse::<LcosParameter>().unwrap(), p);
        }
    }

    #[test]
    fn test_unknown_path_is_invalid_input() {
        let err = "financing.colour".parse::<LcoeParameter>().unwrap_err();
        assert!(matches!(err, LevelizedCostError::InvalidInput { .. }));
        assert!("capex_per_kw".parse::<LcosParameter>().is_err());
    }

    #[test]
    fn test_with_parameter_leaves_original_untouched() {
        let base = LcoeInput::default();
        let varied = base
            .with_parameter(LcoeParameter::Financing(FinancingParameter::DiscountRate), 0.1)
            .unwrap();
        assert_eq!(base.financing.discount_rate, 0.07);
        assert_eq!(varied.financing.discount_rate, 0.1);
    }

    #[test]
    fn test_integer_parameters_round() {
        let base = LcosInput::default();
        let varied = base.with_parameter(LcosParameter::CycleLife, 3199.6).unwrap();
        assert_eq!(varied.cycle_life, 3200);
        assert!(base
            .with_parameter(LcosParameter::CalendarLifeYears, -3.0)
            .is_err());
    }

    #[test]
    fn test_degradation_rate_alias_and_step_rejection() {
        let p: LcoeParameter = "degradation.annual_degradation_rate".parse().unwrap();
        assert_eq!(p, LcoeParameter::DegradationRate);

        let input = LcoeInput {
            degradation: DegradationModel::None,
            ..LcoeInput::default()
        };
        assert!(input.parameter(p).is_err());
    }

    #[test]
    fn test_apply_overrides_in_order() {
        let overrides: BTreeMap<String, f64> = [
            ("capex_per_kw".to_string(), 1800.0),
            ("financing.federal_itc".to_string(), 0.0),
        ]
        .into_iter()
        .collect();
        let out = apply_overrides(&LcoeInput::default(), &overrides).unwrap();
        assert_eq!(out.capex_per_kw, 1800.0);
        assert_eq!(out.financing.federal_itc, 0.0);
    }

    #[test]
    fn test_apply_overrides_unknown_key_fails() {
        let overrides: BTreeMap<String, f64> =
            [("capex_per_mw".to_string(), 1.0)].into_iter().collect();
        assert!(apply_overrides(&LcoeInput::default(), &overrides).is_err());
    }
}
