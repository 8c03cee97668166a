//! Product presets for common residential and utility hardware.
//!
//! Storage presets carry the manufacturer's datasheet figures and scale
//! linearly with the unit count. Solar presets start from installed-cost
//! figures and pick up the regional irradiance and cost multipliers of the
//! scenario tables.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Instant;

use crate::degradation::DegradationModel;
use crate::error::LevelizedCostError;
use crate::finance::{capital_recovery_factor, FinancingParameters};
use crate::lcoe::{calculate_lcoe, compute_lcoe, LcoeInput, LcoeOutput};
use crate::lcos::{calculate_lcos, compute_lcos, LcosInput, LcosOutput};
use crate::load_profile::LoadProfile;
use crate::parameters::apply_overrides;
use crate::scenarios::ScenarioBuilder;
use crate::types::*;
use crate::LevelizedCostResult;

/// Usable capacity of one Powerwall, used to size solar-plus-storage bundles.
pub const POWERWALL_CAPACITY_KWH: f64 = 13.5;

/// Household load assumed when reporting backup duration.
const BACKUP_LOAD_KW: f64 = 5.0;

/// Inverter efficiency assumed when reporting backup duration.
pub const DEFAULT_BACKUP_EFFICIENCY: f64 = 0.95;

// ---------------------------------------------------------------------------
// Storage products
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StorageProduct {
    #[serde(rename = "powerwall_3")]
    Powerwall3,
    #[serde(rename = "powerwall_2")]
    Powerwall2,
    #[serde(rename = "megapack")]
    Megapack,
}

/// Datasheet figures for a single unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageSpec {
    pub capex_per_kwh: Money,
    pub power_rating_kw: f64,
    pub usable_capacity_kwh: f64,
    pub round_trip_efficiency: Rate,
    pub cycle_life: u32,
    pub calendar_life_years: u32,
    pub capacity_fade_per_year: Rate,
    pub efficiency_fade_per_cycle: Rate,
    pub fixed_om_per_kwh_year: Money,
    pub variable_om_per_cycle: Money,
    pub depth_of_discharge: Rate,
}

impl StorageProduct {
    pub const ALL: [StorageProduct; 3] = [
        StorageProduct::Powerwall3,
        StorageProduct::Powerwall2,
        StorageProduct::Megapack,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StorageProduct::Powerwall3 => "powerwall_3",
            StorageProduct::Powerwall2 => "powerwall_2",
            StorageProduct::Megapack => "megapack",
        }
    }

    pub fn spec(&self) -> StorageSpec {
        match self {
            StorageProduct::Powerwall3 => StorageSpec {
                capex_per_kwh: 800.0,
                power_rating_kw: 11.5,
                usable_capacity_kwh: 13.5,
                round_trip_efficiency: 0.975,
                cycle_life: 4000,
                calendar_life_years: 10,
                capacity_fade_per_year: 0.02,
                efficiency_fade_per_cycle: 0.000005,
                fixed_om_per_kwh_year: 3.0,
                variable_om_per_cycle: 0.005,
                depth_of_discharge: 1.0,
            },
            StorageProduct::Powerwall2 => StorageSpec {
                capex_per_kwh: 700.0,
                power_rating_kw: 5.0,
                usable_capacity_kwh: 13.5,
                round_trip_efficiency: 0.90,
                cycle_life: 3650,
                calendar_life_years: 10,
                capacity_fade_per_year: 0.025,
                efficiency_fade_per_cycle: 0.00001,
                fixed_om_per_kwh_year: 4.0,
                variable_om_per_cycle: 0.01,
                depth_of_discharge: 1.0,
            },
            StorageProduct::Megapack => StorageSpec {
                capex_per_kwh: 300.0,
                power_rating_kw: 1900.0,
                usable_capacity_kwh: 3900.0,
                round_trip_efficiency: 0.92,
                cycle_life: 4000,
                calendar_life_years: 20,
                capacity_fade_per_year: 0.015,
                efficiency_fade_per_cycle: 0.000003,
                fixed_om_per_kwh_year: 2.0,
                variable_om_per_cycle: 0.002,
                depth_of_discharge: 1.0,
            },
        }
    }

    /// Segment the product is sold into when the caller does not say.
    pub fn default_use_case(&self) -> UseCase {
        match self {
            StorageProduct::Megapack => UseCase::Utility,
            _ => UseCase::Residential,
        }
    }
}

impl fmt::Display for StorageProduct {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StorageProduct {
    type Err = LevelizedCostError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        let normalized = match normalized.as_str() {
            "powerwall3" => "powerwall_3",
            "powerwall2" => "powerwall_2",
            other => other,
        }
        .to_string();
        StorageProduct::ALL
            .into_iter()
            .find(|p| p.as_str() == normalized)
            .ok_or_else(|| {
                LevelizedCostError::invalid("product", format!("Unknown storage product '{s}'"))
            })
    }
}

/// Request for a storage preset calculation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoragePreset {
    pub product: StorageProduct,
    pub units: u32,
    /// Defaults to the product's own segment
    pub use_case: Option<UseCase>,
    pub cycles_per_year: f64,
    /// Defaults to one full discharge per cycle
    pub load_profile: Option<LoadProfile>,
    pub financing: FinancingParameters,
    pub overrides: BTreeMap<String, f64>,
}

impl Default for StoragePreset {
    fn default() -> Self {
        StoragePreset {
            product: StorageProduct::Powerwall3,
            units: 1,
            use_case: None,
            cycles_per_year: 365.0,
            load_profile: None,
            financing: FinancingParameters::default(),
            overrides: BTreeMap::new(),
        }
    }
}

impl StoragePreset {
    pub fn new(product: StorageProduct, units: u32) -> Self {
        StoragePreset {
            product,
            units,
            ..StoragePreset::default()
        }
    }

    /// Resolve the preset into an engine input.
    pub fn input(&self) -> LevelizedCostResult<LcosInput> {
        if self.units == 0 {
            return Err(LevelizedCostError::invalid("units", "At least one unit is required"));
        }
        let spec = self.product.spec();
        let units = self.units as f64;
        let system_size_kwh = spec.usable_capacity_kwh * units;
        let power_rating_kw = spec.power_rating_kw * units;

        let load_profile = self.load_profile.clone().unwrap_or_else(|| match self.product {
            StorageProduct::Megapack => LoadProfile {
                annual_energy_kwh: system_size_kwh * self.cycles_per_year,
                peak_demand_kw: power_rating_kw,
                load_factor: 0.4,
                ..LoadProfile::default()
            },
            _ => LoadProfile {
                annual_energy_kwh: system_size_kwh * self.cycles_per_year,
                peak_demand_kw: power_rating_kw * 0.8,
                load_factor: 0.3,
                ..LoadProfile::default()
            },
        });

        let base = LcosInput {
            capex_per_kwh: spec.capex_per_kwh,
            system_size_kwh,
            power_rating_kw,
            fixed_om_per_kwh_year: spec.fixed_om_per_kwh_year,
            variable_om_per_cycle: spec.variable_om_per_cycle,
            round_trip_efficiency: spec.round_trip_efficiency,
            cycles_per_year: self.cycles_per_year,
            cycle_life: spec.cycle_life,
            calendar_life_years: spec.calendar_life_years,
            depth_of_discharge: spec.depth_of_discharge,
            capacity_fade_per_year: spec.capacity_fade_per_year,
            efficiency_fade_per_cycle: spec.efficiency_fade_per_cycle,
            financing: self.financing.clone(),
            load_profile: Some(load_profile),
            technology: TechnologyType::Battery,
            use_case: self.use_case.unwrap_or_else(|| self.product.default_use_case()),
        };
        apply_overrides(&base, &self.overrides)
    }
}

/// LCOS for a storage product preset.
pub fn calculate_storage_preset(
    preset: &StoragePreset,
) -> LevelizedCostResult<ComputationOutput<LcosOutput>> {
    let input = preset.input()?;
    let mut out = calculate_lcos(&input)?;
    out.methodology = format!("{} preset: {}", preset.product, out.methodology);
    if let Some(assumptions) = out.assumptions.as_object_mut() {
        assumptions.insert("product".into(), serde_json::to_value(preset.product)?);
        assumptions.insert("units".into(), preset.units.into());
        assumptions.insert("spec".into(), serde_json::to_value(preset.product.spec())?);
    }
    Ok(out)
}

// ---------------------------------------------------------------------------
// Solar products
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolarProduct {
    SolarPanels,
    SolarRoof,
}

impl SolarProduct {
    pub fn as_str(&self) -> &'static str {
        match self {
            SolarProduct::SolarPanels => "solar_panels",
            SolarProduct::SolarRoof => "solar_roof",
        }
    }

    fn capex_per_kw(&self) -> Money {
        match self {
            SolarProduct::SolarPanels => 2500.0,
            SolarProduct::SolarRoof => 4000.0,
        }
    }

    fn fixed_om_per_kw_year(&self) -> Money {
        match self {
            SolarProduct::SolarPanels => 12.0,
            SolarProduct::SolarRoof => 8.0,
        }
    }

    fn capacity_factor(&self, use_case: UseCase) -> Rate {
        match (self, use_case) {
            (SolarProduct::SolarRoof, _) => 0.18,
            (SolarProduct::SolarPanels, UseCase::Residential) => 0.19,
            (SolarProduct::SolarPanels, UseCase::Commercial) => 0.22,
            (SolarProduct::SolarPanels, UseCase::Utility) => 0.25,
        }
    }
}

impl fmt::Display for SolarProduct {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SolarProduct {
    type Err = LevelizedCostError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace(['-', ' '], "_").as_str() {
            "solar_panels" | "panels" => Ok(SolarProduct::SolarPanels),
            "solar_roof" | "roof" => Ok(SolarProduct::SolarRoof),
            _ => Err(LevelizedCostError::invalid(
                "product",
                format!("Unknown solar product '{s}'"),
            )),
        }
    }
}

/// Cost multiplier for integrated roof tiles; 15 W per square foot of roof.
///
/// A system that covers less of the roof needs more inactive tiles per kW.
pub fn roof_complexity(system_size_kw: f64, roof_area_sqft: f64) -> LevelizedCostResult<f64> {
    if roof_area_sqft <= 0.0 || !roof_area_sqft.is_finite() {
        return Err(LevelizedCostError::invalid(
            "roof_area_sqft",
            "Roof area must be a positive number",
        ));
    }
    let coverage = system_size_kw * 1000.0 / (roof_area_sqft * 15.0);
    Ok(1.0 + ((1.0 - coverage) * 0.5).max(0.0))
}

/// Request for a solar preset calculation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolarPreset {
    pub product: SolarProduct,
    pub system_size_kw: f64,
    pub use_case: UseCase,
    pub region: String,
    /// Required for the solar roof
    pub roof_area_sqft: Option<f64>,
    pub financing: FinancingParameters,
    pub overrides: BTreeMap<String, f64>,
}

impl Default for SolarPreset {
    fn default() -> Self {
        SolarPreset {
            product: SolarProduct::SolarPanels,
            system_size_kw: 7.0,
            use_case: UseCase::Residential,
            region: "CA".into(),
            roof_area_sqft: None,
            financing: FinancingParameters::default(),
            overrides: BTreeMap::new(),
        }
    }
}

impl SolarPreset {
    /// Resolve the preset against the built-in regional table.
    pub fn input(&self) -> LevelizedCostResult<(LcoeInput, Vec<String>)> {
        self.input_with(&ScenarioBuilder::default())
    }

    /// Resolve the preset, taking regional multipliers from `builder`.
    ///
    /// Unknown regions get no adjustment and a warning.
    pub fn input_with(
        &self,
        builder: &ScenarioBuilder,
    ) -> LevelizedCostResult<(LcoeInput, Vec<String>)> {
        let mut warnings = Vec::new();

        let (mut capex_per_kw, use_case) = match self.product {
            SolarProduct::SolarPanels => (self.product.capex_per_kw(), self.use_case),
            SolarProduct::SolarRoof => {
                let area = self.roof_area_sqft.ok_or_else(|| {
                    LevelizedCostError::invalid("roof_area_sqft", "Required for solar roof")
                })?;
                let complexity = roof_complexity(self.system_size_kw, area)?;
                (self.product.capex_per_kw() * complexity, UseCase::Residential)
            }
        };
        let mut capacity_factor = self.product.capacity_factor(use_case);

        match builder.region(&self.region) {
            Some(regional) => {
                capacity_factor *= regional.solar_irradiance_factor;
                capex_per_kw *= regional.cost_multiplier;
            }
            None => {
                log::warn!("No regional adjustment for '{}'", self.region);
                warnings.push(format!(
                    "Unknown region '{}'; no regional adjustment applied",
                    self.region
                ));
            }
        }

        let base = LcoeInput {
            capex_per_kw,
            system_size_kw: self.system_size_kw,
            fixed_om_per_kw_year: self.product.fixed_om_per_kw_year(),
            variable_om_per_mwh: 0.0,
            fuel_cost_per_mwh: 0.0,
            capacity_factor,
            system_lifetime_years: 25,
            degradation: DegradationModel::Linear { annual_rate: 0.004 },
            financing: self.financing.clone(),
            technology: TechnologyType::Pv,
            use_case,
        };
        Ok((apply_overrides(&base, &self.overrides)?, warnings))
    }
}

/// LCOE for a solar product preset.
pub fn calculate_solar_preset(
    preset: &SolarPreset,
) -> LevelizedCostResult<ComputationOutput<LcoeOutput>> {
    calculate_solar_preset_with(preset, &ScenarioBuilder::default())
}

/// LCOE for a solar product preset priced against custom regional tables.
pub fn calculate_solar_preset_with(
    preset: &SolarPreset,
    builder: &ScenarioBuilder,
) -> LevelizedCostResult<ComputationOutput<LcoeOutput>> {
    let (input, warnings) = preset.input_with(builder)?;
    let mut out = calculate_lcoe(&input)?;
    out.methodology = format!("{} preset: {}", preset.product, out.methodology);
    out.warnings.extend(warnings);
    if let Some(assumptions) = out.assumptions.as_object_mut() {
        assumptions.insert("product".into(), serde_json::to_value(preset.product)?);
        assumptions.insert("region".into(), preset.region.clone().into());
    }
    Ok(out)
}

// ---------------------------------------------------------------------------
// Bundles
// ---------------------------------------------------------------------------

/// Hours a battery can carry a constant load; 0 when the load is not positive.
pub fn backup_hours(battery_kwh: f64, load_kw: f64, efficiency: f64) -> f64 {
    if load_kw > 0.0 {
        battery_kwh * efficiency / load_kw
    } else {
        0.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolarPlusStorageInput {
    pub solar_kw: f64,
    pub battery_kwh: f64,
    pub region: String,
    pub use_case: UseCase,
}

impl Default for SolarPlusStorageInput {
    fn default() -> Self {
        SolarPlusStorageInput {
            solar_kw: 7.0,
            battery_kwh: POWERWALL_CAPACITY_KWH,
            region: "CA".into(),
            use_case: UseCase::Residential,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombinedMetrics {
    pub total_capex: Money,
    /// Net capex of each half spread over its own life at its own rate
    pub annualized_capex: Money,
    /// Unweighted mean of the solar LCOE and storage LCOS, USD/kWh
    pub combined_lcoe_kwh: f64,
    pub backup_hours: f64,
    pub powerwall_units: u32,
    pub solar_kw: f64,
    pub battery_kwh: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolarPlusStorageOutput {
    pub solar_lcoe: LcoeOutput,
    pub storage_lcos: LcosOutput,
    pub combined_metrics: CombinedMetrics,
}

/// Solar panels paired with enough Powerwall 3 units to cover `battery_kwh`.
pub fn solar_plus_storage(
    input: &SolarPlusStorageInput,
) -> LevelizedCostResult<ComputationOutput<SolarPlusStorageOutput>> {
    solar_plus_storage_with(input, &ScenarioBuilder::default())
}

/// Solar-plus-storage bundle with the solar half priced against custom
/// regional tables.
pub fn solar_plus_storage_with(
    input: &SolarPlusStorageInput,
    builder: &ScenarioBuilder,
) -> LevelizedCostResult<ComputationOutput<SolarPlusStorageOutput>> {
    let start = Instant::now();

    if !input.battery_kwh.is_finite() || input.battery_kwh < 0.0 {
        return Err(LevelizedCostError::invalid(
            "battery_kwh",
            "Battery capacity must be a non-negative number",
        ));
    }

    let solar = SolarPreset {
        product: SolarProduct::SolarPanels,
        system_size_kw: input.solar_kw,
        use_case: input.use_case,
        region: input.region.clone(),
        ..SolarPreset::default()
    };
    let (solar_input, warnings) = solar.input_with(builder)?;
    let solar_lcoe = compute_lcoe(&solar_input)?;

    let powerwall_units = ((input.battery_kwh / POWERWALL_CAPACITY_KWH).floor() as u32).max(1);
    let storage = StoragePreset {
        use_case: Some(input.use_case),
        ..StoragePreset::new(StorageProduct::Powerwall3, powerwall_units)
    };
    let storage_input = storage.input()?;
    let storage_lcos = compute_lcos(&storage_input)?;

    let total_capex = solar_lcoe.metrics.total_capex + storage_lcos.metrics.total_capex;
    let annualized_capex = solar_lcoe.metrics.total_capex
        * capital_recovery_factor(
            solar_input.system_lifetime_years,
            solar_input.financing.effective_discount_rate(),
        )
        + storage_lcos.metrics.total_capex
            * capital_recovery_factor(
                storage_input.calendar_life_years,
                storage_input.financing.effective_discount_rate(),
            );

    let combined_metrics = CombinedMetrics {
        total_capex,
        annualized_capex,
        combined_lcoe_kwh: (solar_lcoe.lcoe_usd_per_kwh + storage_lcos.lcos_usd_per_kwh) / 2.0,
        backup_hours: backup_hours(input.battery_kwh, BACKUP_LOAD_KW, DEFAULT_BACKUP_EFFICIENCY),
        powerwall_units,
        solar_kw: input.solar_kw,
        battery_kwh: input.battery_kwh,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Solar panels + Powerwall 3 (mean of LCOE and LCOS)",
        &serde_json::json!({
            "region": input.region,
            "use_case": input.use_case,
            "powerwall_capacity_kwh": POWERWALL_CAPACITY_KWH,
            "backup_load_kw": BACKUP_LOAD_KW,
            "backup_efficiency": DEFAULT_BACKUP_EFFICIENCY,
        }),
        warnings,
        elapsed,
        SolarPlusStorageOutput {
            solar_lcoe,
            storage_lcos,
            combined_metrics,
        },
    ))
}
