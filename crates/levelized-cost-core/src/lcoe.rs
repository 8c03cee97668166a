use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::degradation::DegradationModel;
use crate::error::LevelizedCostError;
use crate::finance::{
    discount_factor, financing_cost_npv, levelize, net_capex, npv_of_annual_series,
    FinancingParameters,
};
use crate::types::*;
use crate::units::{KWH_PER_MWH, MWH_PER_KW_YEAR};
use crate::LevelizedCostResult;

// ---------------------------------------------------------------------------
// Input types
// ---------------------------------------------------------------------------

/// Input for a levelized cost of energy calculation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LcoeInput {
    /// Installed cost per kW of nameplate capacity
    pub capex_per_kw: Money,
    /// Nameplate capacity in kW
    pub system_size_kw: f64,
    /// Fixed O&M per kW per year
    pub fixed_om_per_kw_year: Money,
    /// Variable O&M per MWh generated
    pub variable_om_per_mwh: Money,
    /// Fuel cost per MWh generated (thermal plants)
    pub fuel_cost_per_mwh: Money,
    /// First-year capacity factor
    pub capacity_factor: Rate,
    /// Operating life in whole years
    pub system_lifetime_years: u32,
    pub degradation: DegradationModel,
    pub financing: FinancingParameters,
    pub technology: TechnologyType,
    pub use_case: UseCase,
}

impl Default for LcoeInput {
    fn default() -> Self {
        LcoeInput {
            capex_per_kw: 1500.0,
            system_size_kw: 100.0,
            fixed_om_per_kw_year: 15.0,
            variable_om_per_mwh: 0.0,
            fuel_cost_per_mwh: 0.0,
            capacity_factor: 0.25,
            system_lifetime_years: 25,
            degradation: DegradationModel::default(),
            financing: FinancingParameters::default(),
            technology: TechnologyType::Pv,
            use_case: UseCase::Residential,
        }
    }
}

impl LcoeInput {
    pub fn validate(&self) -> LevelizedCostResult<()> {
        let fields = [
            ("capex_per_kw", self.capex_per_kw),
            ("system_size_kw", self.system_size_kw),
            ("fixed_om_per_kw_year", self.fixed_om_per_kw_year),
            ("variable_om_per_mwh", self.variable_om_per_mwh),
            ("fuel_cost_per_mwh", self.fuel_cost_per_mwh),
            ("capacity_factor", self.capacity_factor),
        ];
        for (field, value) in fields {
            if !value.is_finite() {
                return Err(LevelizedCostError::invalid(field, "Must be a finite number"));
            }
        }
        if self.system_size_kw < 0.0 {
            return Err(LevelizedCostError::invalid(
                "system_size_kw",
                "System size cannot be negative",
            ));
        }
        if self.capacity_factor < 0.0 {
            return Err(LevelizedCostError::invalid(
                "capacity_factor",
                "Capacity factor cannot be negative",
            ));
        }
        self.degradation.validate()?;
        self.financing.validate()
    }

    /// First-year generation in MWh.
    pub fn first_year_energy_mwh(&self) -> f64 {
        self.system_size_kw * self.capacity_factor * MWH_PER_KW_YEAR
    }
}

// ---------------------------------------------------------------------------
// Output types
// ---------------------------------------------------------------------------

/// Levelized cost split by cost bucket, in USD/MWh.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LcoeBreakdown {
    pub capex: f64,
    pub opex: f64,
    pub fuel: f64,
    pub financing: f64,
}

impl LcoeBreakdown {
    pub fn total(&self) -> f64 {
        self.capex + self.opex + self.fuel + self.financing
    }
}

/// Present values and energy totals behind the levelized figure.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LcoeMetrics {
    /// Net capex after ITC and rebates
    pub total_capex: Money,
    pub total_opex_npv: Money,
    pub total_fuel_npv: Money,
    pub financing_cost_npv: Money,
    /// Lifetime energy, discounted at the effective rate
    pub total_energy_mwh: f64,
    pub first_year_energy_mwh: f64,
    /// First-year energy over nameplate hours
    pub capacity_factor_actual: Rate,
}

/// Output of a levelized cost of energy calculation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LcoeOutput {
    pub lcoe_usd_per_mwh: f64,
    pub lcoe_usd_per_kwh: f64,
    pub breakdown: LcoeBreakdown,
    pub metrics: LcoeMetrics,
    /// Filled in only after an uncertainty pass
    pub uncertainty: UncertaintyBand,
}

impl LcoeOutput {
    /// Attach a percentile band (USD/kWh) from an uncertainty pass.
    pub fn with_uncertainty(mut self, band: UncertaintyBand) -> Self {
        self.uncertainty = band;
        self
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Lifetime generation with degradation, discounted at the effective rate.
fn discounted_lifetime_energy(input: &LcoeInput, first_year_energy: f64) -> f64 {
    let rate = input.financing.effective_discount_rate();
    (0..input.system_lifetime_years)
        .map(|year| {
            first_year_energy * input.degradation.performance_factor(year)
                * discount_factor(rate, year)
        })
        .sum()
}

/// Compute the LCOE without the output envelope.
///
/// This is the entry point the sensitivity and Monte Carlo analyzers call for
/// every perturbed input.
pub fn compute_lcoe(input: &LcoeInput) -> LevelizedCostResult<LcoeOutput> {
    input.validate()?;

    let financing = &input.financing;
    let rate = financing.effective_discount_rate();
    let years = input.system_lifetime_years;

    let total_capex = net_capex(input.capex_per_kw, input.system_size_kw, financing);
    let first_year_energy = input.first_year_energy_mwh();
    let lifetime_energy = discounted_lifetime_energy(input, first_year_energy);

    let annual_opex = input.fixed_om_per_kw_year * input.system_size_kw
        + input.variable_om_per_mwh * first_year_energy;
    let opex_npv = npv_of_annual_series(annual_opex, years, rate, financing.inflation_rate);

    let fuel_npv = if input.fuel_cost_per_mwh > 0.0 {
        npv_of_annual_series(
            input.fuel_cost_per_mwh * first_year_energy,
            years,
            rate,
            financing.inflation_rate,
        )
    } else {
        0.0
    };

    let financing_cost = financing_cost_npv(total_capex, years, financing);

    let total_cost = total_capex + opex_npv + fuel_npv + financing_cost;
    let lcoe_usd_per_mwh = levelize(total_cost, lifetime_energy);

    let breakdown = LcoeBreakdown {
        capex: levelize(total_capex, lifetime_energy),
        opex: levelize(opex_npv, lifetime_energy),
        fuel: levelize(fuel_npv, lifetime_energy),
        financing: levelize(financing_cost, lifetime_energy),
    };

    let capacity_factor_actual = if input.system_size_kw > 0.0 {
        first_year_energy / (input.system_size_kw * MWH_PER_KW_YEAR)
    } else {
        0.0
    };

    log::debug!(
        "LCOE {:.4} $/kWh over {} years ({:.1} discounted MWh)",
        lcoe_usd_per_mwh / KWH_PER_MWH,
        years,
        lifetime_energy
    );

    Ok(LcoeOutput {
        lcoe_usd_per_mwh,
        lcoe_usd_per_kwh: lcoe_usd_per_mwh / KWH_PER_MWH,
        breakdown,
        metrics: LcoeMetrics {
            total_capex,
            total_opex_npv: opex_npv,
            total_fuel_npv: fuel_npv,
            financing_cost_npv: financing_cost,
            total_energy_mwh: lifetime_energy,
            first_year_energy_mwh: first_year_energy,
            capacity_factor_actual,
        },
        uncertainty: UncertaintyBand::default(),
    })
}

/// Calculate the levelized cost of energy for a generation asset.
///
/// Total cost is net capex plus the NPVs of O&M, fuel and debt interest;
/// it is divided by lifetime energy discounted at the same effective rate.
pub fn calculate_lcoe(input: &LcoeInput) -> LevelizedCostResult<ComputationOutput<LcoeOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    let output = compute_lcoe(input)?;

    if input.system_lifetime_years == 0 {
        warnings.push("System lifetime is zero; levelized cost reported as 0".into());
    } else if output.metrics.total_energy_mwh <= 0.0 {
        warnings.push("No discounted energy produced; levelized cost reported as 0".into());
    }
    if input.capacity_factor > 1.0 {
        warnings.push(format!(
            "Capacity factor {} exceeds 100%",
            input.capacity_factor
        ));
    }
    let gross_capex = input.capex_per_kw * input.system_size_kw;
    if gross_capex > 0.0 && output.metrics.total_capex == 0.0 {
        warnings.push("Incentives exceed gross capex; net capex floored at 0".into());
    }

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Levelized Cost of Energy (discounted lifetime generation)",
        &serde_json::json!({
            "technology": input.technology,
            "use_case": input.use_case,
            "effective_discount_rate": input.financing.effective_discount_rate(),
            "system_lifetime_years": input.system_lifetime_years,
            "degradation": input.degradation.name(),
            "hours_per_year": crate::units::HOURS_PER_YEAR,
        }),
        warnings,
        elapsed,
        output,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference_input() -> LcoeInput {
        LcoeInput {
            capex_per_kw: 2000.0,
            system_size_kw: 100.0,
            fixed_om_per_kw_year: 15.0,
            capacity_factor: 0.22,
            system_lifetime_years: 25,
            degradation: DegradationModel::Linear { annual_rate: 0.005 },
            ..LcoeInput::default()
        }
    }

    #[test]
    fn test_first_year_energy() {
        // 100 kW * 0.22 * 8760 h = 192.72 MWh
        let input = reference_input();
        assert!((input.first_year_energy_mwh() - 192.72).abs() < 1e-9);
    }

    #[test]
    fn test_reference_lcoe_in_plausible_band() {
        let out = compute_lcoe(&reference_input()).unwrap();
        assert!(
            out.lcoe_usd_per_kwh > 0.03 && out.lcoe_usd_per_kwh < 0.12,
            "LCOE {} outside band",
            out.lcoe_usd_per_kwh
        );
        assert!((out.lcoe_usd_per_mwh / 1000.0 - out.lcoe_usd_per_kwh).abs() < 1e-15);
    }

    #[test]
    fn test_net_capex_reflects_itc() {
        let out = compute_lcoe(&reference_input()).unwrap();
        assert!((out.metrics.total_capex - 140_000.0).abs() < 1e-6);
    }

    #[test]
    fn test_zero_lifetime_yields_zero() {
        let input = LcoeInput {
            system_lifetime_years: 0,
            ..reference_input()
        };
        let out = compute_lcoe(&input).unwrap();
        assert_eq!(out.lcoe_usd_per_kwh, 0.0);
        assert_eq!(out.breakdown.total(), 0.0);
    }

    #[test]
    fn test_zero_lifetime_warning_in_envelope() {
        let input = LcoeInput {
            system_lifetime_years: 0,
            ..reference_input()
        };
        let out = calculate_lcoe(&input).unwrap();
        assert_eq!(out.warnings.len(), 1);
    }

    #[test]
    fn test_negative_fuel_cost_ignored() {
        let base = compute_lcoe(&reference_input()).unwrap();
        let input = LcoeInput {
            fuel_cost_per_mwh: -10.0,
            ..reference_input()
        };
        let out = compute_lcoe(&input).unwrap();
        assert_eq!(out.breakdown.fuel, 0.0);
        assert_eq!(out.lcoe_usd_per_mwh, base.lcoe_usd_per_mwh);
    }

    #[test]
    fn test_fuel_component_positive_for_thermal() {
        let input = LcoeInput {
            fuel_cost_per_mwh: 30.0,
            technology: TechnologyType::Thermal,
            ..reference_input()
        };
        let out = compute_lcoe(&input).unwrap();
        assert!(out.breakdown.fuel > 0.0);
    }

    #[test]
    fn test_realized_capacity_factor() {
        let out = compute_lcoe(&reference_input()).unwrap();
        assert!((out.metrics.capacity_factor_actual - 0.22).abs() < 1e-12);
    }

    #[test]
    fn test_negative_size_rejected() {
        let input = LcoeInput {
            system_size_kw: -1.0,
            ..reference_input()
        };
        assert!(matches!(
            compute_lcoe(&input),
            Err(LevelizedCostError::InvalidInput { .. })
        ));
    }

    #[test]
    fn test_input_not_mutated() {
        let input = reference_input();
        let before = input.clone();
        let _ = calculate_lcoe(&input).unwrap();
        assert_eq!(input, before);
    }
}
