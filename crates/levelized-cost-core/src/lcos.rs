use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::error::LevelizedCostError;
use crate::finance::{
    discount_factor, financing_cost_npv, levelize, net_capex, npv_of_annual_series,
    FinancingParameters,
};
use crate::load_profile::LoadProfile;
use crate::types::*;
use crate::units::KWH_PER_MWH;
use crate::LevelizedCostResult;

/// Faded cells never fall below half of nameplate capacity.
const CAPACITY_FLOOR: f64 = 0.5;
/// Round-trip efficiency never falls below 70%.
const EFFICIENCY_FLOOR: f64 = 0.7;
/// A replacement pack costs 70% of the original (30% cost-down).
const REPLACEMENT_COST_FRACTION: f64 = 0.7;

// ---------------------------------------------------------------------------
// Input types
// ---------------------------------------------------------------------------

/// Input for a levelized cost of storage calculation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LcosInput {
    /// Installed cost per kWh of energy capacity
    pub capex_per_kwh: Money,
    /// Nameplate energy capacity in kWh
    pub system_size_kwh: f64,
    /// Inverter power rating in kW
    pub power_rating_kw: f64,
    /// Fixed O&M per kWh of capacity per year
    pub fixed_om_per_kwh_year: Money,
    /// Variable O&M per full cycle
    pub variable_om_per_cycle: Money,
    /// Round-trip efficiency when new (0-1)
    pub round_trip_efficiency: Rate,
    /// Full cycles per year
    pub cycles_per_year: f64,
    /// Full cycles before the pack is worn out
    pub cycle_life: u32,
    /// Calendar life of the installation in years
    pub calendar_life_years: u32,
    /// Usable fraction of nameplate capacity
    pub depth_of_discharge: Rate,
    /// Capacity lost per year, as a fraction of nameplate
    pub capacity_fade_per_year: Rate,
    /// Round-trip efficiency lost per cycle
    pub efficiency_fade_per_cycle: Rate,
    pub financing: FinancingParameters,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub load_profile: Option<LoadProfile>,
    pub technology: TechnologyType,
    pub use_case: UseCase,
}

impl Default for LcosInput {
    fn default() -> Self {
        LcosInput {
            capex_per_kwh: 400.0,
            system_size_kwh: 100.0,
            power_rating_kw: 50.0,
            fixed_om_per_kwh_year: 5.0,
            variable_om_per_cycle: 0.01,
            round_trip_efficiency: 0.90,
            cycles_per_year: 365.0,
            cycle_life: 4000,
            calendar_life_years: 15,
            depth_of_discharge: 0.90,
            capacity_fade_per_year: 0.02,
            efficiency_fade_per_cycle: 0.00001,
            financing: FinancingParameters::default(),
            load_profile: None,
            technology: TechnologyType::Battery,
            use_case: UseCase::Residential,
        }
    }
}

impl LcosInput {
    pub fn validate(&self) -> LevelizedCostResult<()> {
        let fields = [
            ("capex_per_kwh", self.capex_per_kwh),
            ("system_size_kwh", self.system_size_kwh),
            ("power_rating_kw", self.power_rating_kw),
            ("fixed_om_per_kwh_year", self.fixed_om_per_kwh_year),
            ("variable_om_per_cycle", self.variable_om_per_cycle),
            ("round_trip_efficiency", self.round_trip_efficiency),
            ("cycles_per_year", self.cycles_per_year),
            ("depth_of_discharge", self.depth_of_discharge),
            ("capacity_fade_per_year", self.capacity_fade_per_year),
            ("efficiency_fade_per_cycle", self.efficiency_fade_per_cycle),
        ];
        for (field, value) in fields {
            if !value.is_finite() {
                return Err(LevelizedCostError::invalid(field, "Must be a finite number"));
            }
        }
        if self.cycles_per_year <= 0.0 {
            return Err(LevelizedCostError::invalid(
                "cycles_per_year",
                "Must be greater than zero",
            ));
        }
        if self.round_trip_efficiency <= 0.0 {
            return Err(LevelizedCostError::invalid(
                "round_trip_efficiency",
                "Must be greater than zero",
            ));
        }
        if self.system_size_kwh < 0.0 {
            return Err(LevelizedCostError::invalid(
                "system_size_kwh",
                "System size cannot be negative",
            ));
        }
        if self.depth_of_discharge < 0.0 {
            return Err(LevelizedCostError::invalid(
                "depth_of_discharge",
                "Depth of discharge cannot be negative",
            ));
        }
        self.financing.validate()
    }

    /// Years until the cycle life is exhausted.
    pub fn cycle_limited_years(&self) -> f64 {
        self.cycle_life as f64 / self.cycles_per_year
    }

    /// Whichever of cycle life and calendar life runs out first.
    pub fn effective_lifetime_years(&self) -> f64 {
        self.cycle_limited_years()
            .min(self.calendar_life_years as f64)
    }

    /// Whole years of throughput counted by the engine.
    pub fn throughput_years(&self) -> u32 {
        self.effective_lifetime_years().floor() as u32
    }

    /// Remaining capacity fraction in `year`.
    pub fn capacity_factor_at(&self, year: u32) -> f64 {
        (1.0 - year as f64 * self.capacity_fade_per_year).max(CAPACITY_FLOOR)
    }

    /// Round-trip efficiency in `year` after per-cycle fade.
    pub fn efficiency_at(&self, year: u32) -> f64 {
        let cumulative_cycles = year as f64 * self.cycles_per_year;
        (self.round_trip_efficiency - cumulative_cycles * self.efficiency_fade_per_cycle)
            .max(EFFICIENCY_FLOOR)
    }

    /// First-year delivered energy in MWh before any fade.
    pub fn base_annual_throughput_mwh(&self) -> f64 {
        let usable_capacity_kwh = self.system_size_kwh * self.depth_of_discharge;
        usable_capacity_kwh * self.cycles_per_year * self.round_trip_efficiency / KWH_PER_MWH
    }
}

// ---------------------------------------------------------------------------
// Output types
// ---------------------------------------------------------------------------

/// Levelized cost split by cost bucket, in USD/MWh.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LcosBreakdown {
    pub capex: f64,
    pub opex: f64,
    pub replacement: f64,
    pub financing: f64,
}

impl LcosBreakdown {
    pub fn total(&self) -> f64 {
        self.capex + self.opex + self.replacement + self.financing
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LcosPerformance {
    /// Lifetime delivered energy, discounted at the effective rate
    pub total_throughput_mwh: f64,
    pub effective_cycles: f64,
    pub end_of_life_capacity: f64,
    pub average_efficiency: f64,
    pub cycle_limited_years: f64,
    pub effective_lifetime_years: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LcosMetrics {
    /// Net capex after ITC and rebates
    pub total_capex: Money,
    pub total_opex_npv: Money,
    pub replacement_cost_npv: Money,
    pub financing_cost_npv: Money,
}

/// Output of a levelized cost of storage calculation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LcosOutput {
    pub lcos_usd_per_mwh: f64,
    pub lcos_usd_per_kwh: f64,
    pub breakdown: LcosBreakdown,
    pub performance: LcosPerformance,
    pub metrics: LcosMetrics,
    /// Filled in only after an uncertainty pass
    pub uncertainty: UncertaintyBand,
}

impl LcosOutput {
    /// Attach a percentile band (USD/kWh) from an uncertainty pass.
    pub fn with_uncertainty(mut self, band: UncertaintyBand) -> Self {
        self.uncertainty = band;
        self
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

fn discounted_lifetime_throughput(input: &LcosInput) -> f64 {
    let rate = input.financing.effective_discount_rate();
    let base = input.base_annual_throughput_mwh();

    (0..input.throughput_years())
        .map(|year| {
            let efficiency_ratio = input.efficiency_at(year) / input.round_trip_efficiency;
            base * input.capacity_factor_at(year) * efficiency_ratio * discount_factor(rate, year)
        })
        .sum()
}

/// Present value of the single mid-life pack replacement.
///
/// Only one replacement is modelled even when the calendar life would need
/// several; `calculate_lcos` reports a warning in that case.
fn replacement_cost_npv(input: &LcosInput) -> Money {
    let cycle_limited = input.cycle_limited_years();
    if cycle_limited >= input.calendar_life_years as f64 {
        return 0.0;
    }
    let replacement_year = cycle_limited.floor() as u32;
    let cost = input.capex_per_kwh * input.system_size_kwh * REPLACEMENT_COST_FRACTION;
    cost * discount_factor(input.financing.effective_discount_rate(), replacement_year)
}

/// Compute the LCOS without the output envelope.
pub fn compute_lcos(input: &LcosInput) -> LevelizedCostResult<LcosOutput> {
    input.validate()?;

    let financing = &input.financing;
    let rate = financing.effective_discount_rate();
    let calendar_years = input.calendar_life_years;

    let total_capex = net_capex(input.capex_per_kwh, input.system_size_kwh, financing);
    let throughput = discounted_lifetime_throughput(input);

    let annual_opex = input.fixed_om_per_kwh_year * input.system_size_kwh
        + input.variable_om_per_cycle * input.cycles_per_year;
    let opex_npv = npv_of_annual_series(annual_opex, calendar_years, rate, financing.inflation_rate);

    let replacement_npv = replacement_cost_npv(input);
    let financing_cost = financing_cost_npv(total_capex, calendar_years, financing);

    let total_cost = total_capex + opex_npv + replacement_npv + financing_cost;
    let lcos_usd_per_mwh = levelize(total_cost, throughput);

    let end_of_life_year = input.throughput_years();
    let performance = LcosPerformance {
        total_throughput_mwh: throughput,
        effective_cycles: end_of_life_year as f64 * input.cycles_per_year,
        end_of_life_capacity: input.capacity_factor_at(end_of_life_year),
        average_efficiency: (input.efficiency_at(0) + input.efficiency_at(end_of_life_year)) / 2.0,
        cycle_limited_years: input.cycle_limited_years(),
        effective_lifetime_years: input.effective_lifetime_years(),
    };

    log::debug!(
        "LCOS {:.4} $/kWh over {} throughput years ({:.1} discounted MWh)",
        lcos_usd_per_mwh / KWH_PER_MWH,
        end_of_life_year,
        throughput
    );

    Ok(LcosOutput {
        lcos_usd_per_mwh,
        lcos_usd_per_kwh: lcos_usd_per_mwh / KWH_PER_MWH,
        breakdown: LcosBreakdown {
            capex: levelize(total_capex, throughput),
            opex: levelize(opex_npv, throughput),
            replacement: levelize(replacement_npv, throughput),
            financing: levelize(financing_cost, throughput),
        },
        performance,
        metrics: LcosMetrics {
            total_capex,
            total_opex_npv: opex_npv,
            replacement_cost_npv: replacement_npv,
            financing_cost_npv: financing_cost,
        },
        uncertainty: UncertaintyBand::default(),
    })
}

/// Calculate the levelized cost of storage for a battery system.
///
/// Throughput is integrated over the shorter of cycle life and calendar
/// life with capacity and efficiency fade; O&M and debt interest run over
/// the full calendar life.
pub fn calculate_lcos(input: &LcosInput) -> LevelizedCostResult<ComputationOutput<LcosOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    let output = compute_lcos(input)?;

    let cycle_limited = input.cycle_limited_years();
    let calendar = input.calendar_life_years as f64;
    if cycle_limited > 0.0 && calendar >= 2.0 * cycle_limited {
        warnings.push(format!(
            "Cycle life is exhausted after {cycle_limited:.1} years against a {calendar}-year \
             calendar life; only one replacement is costed"
        ));
    }
    if output.performance.total_throughput_mwh <= 0.0 {
        warnings.push("No discounted throughput; levelized cost reported as 0".into());
    }
    if input.round_trip_efficiency > 1.0 {
        warnings.push(format!(
            "Round-trip efficiency {} exceeds 100%",
            input.round_trip_efficiency
        ));
    }

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Levelized Cost of Storage (discounted lifetime throughput)",
        &serde_json::json!({
            "technology": input.technology,
            "use_case": input.use_case,
            "effective_discount_rate": input.financing.effective_discount_rate(),
            "calendar_life_years": input.calendar_life_years,
            "cycle_limited_years": cycle_limited,
            "capacity_floor": CAPACITY_FLOOR,
            "efficiency_floor": EFFICIENCY_FLOOR,
            "replacement_cost_fraction": REPLACEMENT_COST_FRACTION,
        }),
        warnings,
        elapsed,
        output,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn powerwall_like() -> LcosInput {
        LcosInput {
            capex_per_kwh: 800.0,
            system_size_kwh: 13.5,
            power_rating_kw: 11.5,
            round_trip_efficiency: 0.975,
            cycle_life: 4000,
            calendar_life_years: 10,
            cycles_per_year: 365.0,
            depth_of_discharge: 1.0,
            ..LcosInput::default()
        }
    }

    #[test]
    fn test_calendar_limited_has_no_replacement() {
        let out = compute_lcos(&powerwall_like()).unwrap();
        assert_eq!(out.metrics.replacement_cost_npv, 0.0);
        assert_eq!(out.breakdown.replacement, 0.0);
        assert_eq!(out.performance.effective_lifetime_years, 10.0);
    }

    #[test]
    fn test_cycle_limited_triggers_replacement() {
        let input = LcosInput {
            calendar_life_years: 15,
            ..powerwall_like()
        };
        let out = compute_lcos(&input).unwrap();
        assert!(out.breakdown.replacement > 0.0);
        // 800 * 13.5 * 0.7 discounted 10 years
        let rate = input.financing.effective_discount_rate();
        let expected = 7560.0 / (1.0 + rate).powi(10);
        assert!((out.metrics.replacement_cost_npv - expected).abs() < 1e-6);
    }

    #[test]
    fn test_end_of_life_capacity() {
        let out = compute_lcos(&powerwall_like()).unwrap();
        // 1 - 10 * 0.02
        assert!((out.performance.end_of_life_capacity - 0.8).abs() < 1e-12);
    }

    #[test]
    fn test_capacity_floor() {
        let input = LcosInput {
            capacity_fade_per_year: 0.2,
            ..powerwall_like()
        };
        assert_eq!(input.capacity_factor_at(9), 0.5);
    }

    #[test]
    fn test_efficiency_floor() {
        let input = LcosInput {
            efficiency_fade_per_cycle: 0.001,
            ..powerwall_like()
        };
        assert_eq!(input.efficiency_at(5), 0.7);
    }

    #[test]
    fn test_effective_cycles_use_whole_years() {
        let input = LcosInput {
            calendar_life_years: 15,
            ..powerwall_like()
        };
        let out = compute_lcos(&input).unwrap();
        assert_eq!(out.performance.effective_cycles, 3650.0);
    }

    #[test]
    fn test_average_efficiency() {
        let out = compute_lcos(&powerwall_like()).unwrap();
        // end efficiency = 0.975 - 3650 * 0.00001 = 0.9385
        assert!((out.performance.average_efficiency - (0.975 + 0.9385) / 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_zero_cycles_rejected() {
        let input = LcosInput {
            cycles_per_year: 0.0,
            ..powerwall_like()
        };
        assert!(compute_lcos(&input).is_err());
    }

    #[test]
    fn test_multi_replacement_warning() {
        let input = LcosInput {
            cycle_life: 1000,
            calendar_life_years: 20,
            ..powerwall_like()
        };
        let out = calculate_lcos(&input).unwrap();
        assert!(out.warnings.iter().any(|w| w.contains("only one replacement")));
    }

    #[test]
    fn test_breakdown_sums_to_total() {
        let out = compute_lcos(&LcosInput::default()).unwrap();
        let rel = (out.breakdown.total() - out.lcos_usd_per_mwh).abs() / out.lcos_usd_per_mwh;
        assert!(rel < 1e-9);
    }
}
