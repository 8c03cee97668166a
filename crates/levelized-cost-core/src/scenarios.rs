use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Instant;

use crate::degradation::DegradationModel;
use crate::error::LevelizedCostError;
use crate::finance::FinancingParameters;
use crate::lcoe::LcoeInput;
use crate::lcos::LcosInput;
use crate::load_profile::LoadProfile;
use crate::parameters::apply_overrides;
use crate::types::*;
use crate::LevelizedCostResult;

// ---------------------------------------------------------------------------
// Tables
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Incentives {
    pub federal_itc: Rate,
    /// USD per kW (generation) or per kWh (storage)
    pub state_rebate: Money,
    pub net_metering: bool,
}

/// Cost and resource multipliers for one region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionalData {
    pub solar_irradiance_factor: f64,
    pub cost_multiplier: f64,
    pub incentives: Incentives,
    /// Retail rate in USD/kWh
    pub electricity_rate: Money,
    /// USD per kW-month
    pub peak_demand_charge: Money,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UseCaseFinancing {
    pub discount_rate: Rate,
    pub debt_fraction: Rate,
    pub debt_interest_rate: Rate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UseCaseLoad {
    pub annual_energy_kwh: f64,
    pub peak_demand_kw: f64,
    pub load_factor: f64,
}

/// Battery sizing used for storage scenarios.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageSizing {
    pub system_size_kwh: f64,
    pub power_rating_kw: f64,
    /// Before the regional cost multiplier
    pub capex_per_kwh: Money,
    pub cycles_per_year: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UseCaseProfile {
    pub typical_size_kw: f64,
    pub capacity_factor: Rate,
    pub load_profile: UseCaseLoad,
    pub financing: UseCaseFinancing,
    pub storage: StorageSizing,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UseCaseProfiles {
    pub residential: UseCaseProfile,
    pub commercial: UseCaseProfile,
    pub utility: UseCaseProfile,
}

impl UseCaseProfiles {
    pub fn get(&self, use_case: UseCase) -> &UseCaseProfile {
        match use_case {
            UseCase::Residential => &self.residential,
            UseCase::Commercial => &self.commercial,
            UseCase::Utility => &self.utility,
        }
    }
}

/// Default tables a [`ScenarioBuilder`] draws from.
///
/// Deserializable so a caller can replace any of them from a config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioTables {
    /// Region used when a requested code is not in `regions`
    pub default_region: String,
    pub regions: BTreeMap<String, RegionalData>,
    pub use_cases: UseCaseProfiles,
}

fn region(
    irradiance: f64,
    cost_multiplier: f64,
    state_rebate: Money,
    net_metering: bool,
    electricity_rate: Money,
    peak_demand_charge: Money,
) -> RegionalData {
    RegionalData {
        solar_irradiance_factor: irradiance,
        cost_multiplier,
        incentives: Incentives {
            federal_itc: 0.30,
            state_rebate,
            net_metering,
        },
        electricity_rate,
        peak_demand_charge,
    }
}

impl Default for ScenarioTables {
    fn default() -> Self {
        let regions = BTreeMap::from([
            ("CA".to_string(), region(1.1, 1.2, 1000.0, true, 0.25, 15.0)),
            ("TX".to_string(), region(1.05, 0.9, 0.0, false, 0.12, 10.0)),
            ("FL".to_string(), region(1.0, 1.0, 0.0, true, 0.13, 8.0)),
            ("NY".to_string(), region(0.85, 1.3, 1500.0, true, 0.20, 18.0)),
            ("AZ".to_string(), region(1.2, 0.95, 0.0, true, 0.14, 12.0)),
        ]);

        let use_cases = UseCaseProfiles {
            residential: UseCaseProfile {
                typical_size_kw: 7.0,
                capacity_factor: 0.19,
                load_profile: UseCaseLoad {
                    annual_energy_kwh: 10_000.0,
                    peak_demand_kw: 5.0,
                    load_factor: 0.3,
                },
                financing: UseCaseFinancing {
                    discount_rate: 0.06,
                    debt_fraction: 0.8,
                    debt_interest_rate: 0.04,
                },
                storage: StorageSizing {
                    system_size_kwh: 13.5,
                    power_rating_kw: 5.0,
                    capex_per_kwh: 800.0,
                    cycles_per_year: 365.0,
                },
            },
            commercial: UseCaseProfile {
                typical_size_kw: 100.0,
                capacity_factor: 0.22,
                load_profile: UseCaseLoad {
                    annual_energy_kwh: 150_000.0,
                    peak_demand_kw: 75.0,
                    load_factor: 0.4,
                },
                financing: UseCaseFinancing {
                    discount_rate: 0.08,
                    debt_fraction: 0.7,
                    debt_interest_rate: 0.05,
                },
                storage: StorageSizing {
                    system_size_kwh: 100.0,
                    power_rating_kw: 50.0,
                    capex_per_kwh: 600.0,
                    cycles_per_year: 300.0,
                },
            },
            utility: UseCaseProfile {
                typical_size_kw: 50_000.0,
                capacity_factor: 0.25,
                load_profile: UseCaseLoad {
                    annual_energy_kwh: 100_000_000.0,
                    peak_demand_kw: 40_000.0,
                    load_factor: 0.5,
                },
                financing: UseCaseFinancing {
                    discount_rate: 0.07,
                    debt_fraction: 0.6,
                    debt_interest_rate: 0.04,
                },
                storage: StorageSizing {
                    system_size_kwh: 1000.0,
                    power_rating_kw: 500.0,
                    capex_per_kwh: 400.0,
                    cycles_per_year: 250.0,
                },
            },
        };

        ScenarioTables {
            default_region: "CA".into(),
            regions,
            use_cases,
        }
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Generation defaults for one technology, before regional adjustment.
struct GenerationDefaults {
    capex_per_kw: Money,
    /// `None` uses the use-case capacity factor scaled by irradiance
    capacity_factor: Option<Rate>,
    fixed_om_per_kw_year: Money,
    variable_om_per_mwh: Money,
    lifetime_years: u32,
    degradation_rate: Rate,
}

fn generation_defaults(technology: TechnologyType) -> LevelizedCostResult<GenerationDefaults> {
    match technology {
        TechnologyType::Pv => Ok(GenerationDefaults {
            capex_per_kw: 2000.0,
            capacity_factor: None,
            fixed_om_per_kw_year: 15.0,
            variable_om_per_mwh: 0.0,
            lifetime_years: 25,
            degradation_rate: 0.005,
        }),
        TechnologyType::Wind => Ok(GenerationDefaults {
            capex_per_kw: 1500.0,
            capacity_factor: Some(0.35),
            fixed_om_per_kw_year: 25.0,
            variable_om_per_mwh: 5.0,
            lifetime_years: 20,
            degradation_rate: 0.002,
        }),
        other => Err(LevelizedCostError::invalid(
            "technology",
            format!("No generation defaults for '{other}'"),
        )),
    }
}

fn normalize_region(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}

/// Builds populated engine inputs from use case, region and technology.
#[derive(Debug, Clone, Default)]
pub struct ScenarioBuilder {
    tables: ScenarioTables,
}

impl ScenarioBuilder {
    /// Use caller-supplied tables. The default region must be present.
    ///
    /// Region codes are stored trimmed and uppercased; two codes that only
    /// differ in case or surrounding whitespace are rejected.
    pub fn new(mut tables: ScenarioTables) -> LevelizedCostResult<Self> {
        let mut regions = BTreeMap::new();
        for (code, data) in std::mem::take(&mut tables.regions) {
            let normalized = normalize_region(&code);
            if regions.insert(normalized.clone(), data).is_some() {
                return Err(LevelizedCostError::invalid(
                    "regions",
                    format!("Region '{code}' collides with another entry for {normalized}"),
                ));
            }
        }
        tables.regions = regions;
        tables.default_region = normalize_region(&tables.default_region);

        if !tables.regions.contains_key(&tables.default_region) {
            return Err(LevelizedCostError::invalid(
                "default_region",
                format!("'{}' is not in the regional table", tables.default_region),
            ));
        }
        Ok(ScenarioBuilder { tables })
    }

    pub fn tables(&self) -> &ScenarioTables {
        &self.tables
    }

    /// Regional data for a known code, matched case-insensitively.
    pub fn region(&self, code: &str) -> Option<&RegionalData> {
        self.tables.regions.get(&normalize_region(code))
    }

    /// Resolve a region code, falling back to the default region.
    fn resolve_region(
        &self,
        code: &str,
        warnings: &mut Vec<String>,
    ) -> LevelizedCostResult<(String, &RegionalData)> {
        if let Some(data) = self.region(code) {
            return Ok((normalize_region(code), data));
        }
        let fallback = &self.tables.default_region;
        let data = self.tables.regions.get(fallback).ok_or_else(|| {
            LevelizedCostError::invalid(
                "default_region",
                format!("'{fallback}' is not in the regional table"),
            )
        })?;
        log::warn!("Unknown region '{code}', using {fallback}");
        warnings.push(format!("Unknown region '{code}'; defaults for {fallback} used"));
        Ok((fallback.clone(), data))
    }

    fn financing(profile: &UseCaseProfile, regional: &RegionalData) -> FinancingParameters {
        FinancingParameters {
            discount_rate: profile.financing.discount_rate,
            debt_fraction: profile.financing.debt_fraction,
            debt_interest_rate: profile.financing.debt_interest_rate,
            federal_itc: regional.incentives.federal_itc,
            state_rebate: regional.incentives.state_rebate,
            ..FinancingParameters::default()
        }
    }

    /// Build an LCOE input for a generation technology (`pv` or `wind`).
    ///
    /// Overrides are applied last by parameter path; an unknown path is an
    /// error.
    pub fn build_lcoe(
        &self,
        use_case: UseCase,
        region: &str,
        technology: TechnologyType,
        overrides: &BTreeMap<String, f64>,
    ) -> LevelizedCostResult<ComputationOutput<LcoeInput>> {
        let start = Instant::now();
        let mut warnings: Vec<String> = Vec::new();

        let defaults = generation_defaults(technology)?;
        let profile = self.tables.use_cases.get(use_case);
        let (region_code, regional) = self.resolve_region(region, &mut warnings)?;

        let capacity_factor = defaults
            .capacity_factor
            .unwrap_or(profile.capacity_factor * regional.solar_irradiance_factor);

        let base = LcoeInput {
            capex_per_kw: defaults.capex_per_kw * regional.cost_multiplier,
            system_size_kw: profile.typical_size_kw,
            fixed_om_per_kw_year: defaults.fixed_om_per_kw_year,
            variable_om_per_mwh: defaults.variable_om_per_mwh,
            fuel_cost_per_mwh: 0.0,
            capacity_factor,
            system_lifetime_years: defaults.lifetime_years,
            degradation: DegradationModel::Linear {
                annual_rate: defaults.degradation_rate,
            },
            financing: Self::financing(profile, regional),
            technology,
            use_case,
        };
        let input = apply_overrides(&base, overrides)?;

        let elapsed = start.elapsed().as_micros() as u64;
        Ok(with_metadata(
            "LCOE scenario (use case x region x technology defaults)",
            &serde_json::json!({
                "use_case": use_case,
                "region": region_code,
                "technology": technology,
                "cost_multiplier": regional.cost_multiplier,
                "solar_irradiance_factor": regional.solar_irradiance_factor,
                "overrides": overrides,
            }),
            warnings,
            elapsed,
            input,
        ))
    }

    /// Build an LCOS input. Only `battery` has storage defaults.
    pub fn build_lcos(
        &self,
        use_case: UseCase,
        region: &str,
        technology: TechnologyType,
        overrides: &BTreeMap<String, f64>,
    ) -> LevelizedCostResult<ComputationOutput<LcosInput>> {
        let start = Instant::now();
        let mut warnings: Vec<String> = Vec::new();

        if technology != TechnologyType::Battery {
            return Err(LevelizedCostError::invalid(
                "technology",
                format!("No storage defaults for '{technology}'"),
            ));
        }
        let profile = self.tables.use_cases.get(use_case);
        let (region_code, regional) = self.resolve_region(region, &mut warnings)?;
        let sizing = &profile.storage;

        let base = LcosInput {
            capex_per_kwh: sizing.capex_per_kwh * regional.cost_multiplier,
            system_size_kwh: sizing.system_size_kwh,
            power_rating_kw: sizing.power_rating_kw,
            cycles_per_year: sizing.cycles_per_year,
            financing: Self::financing(profile, regional),
            load_profile: Some(LoadProfile {
                annual_energy_kwh: profile.load_profile.annual_energy_kwh,
                peak_demand_kw: profile.load_profile.peak_demand_kw,
                load_factor: profile.load_profile.load_factor,
                ..LoadProfile::default()
            }),
            technology,
            use_case,
            ..LcosInput::default()
        };
        let input = apply_overrides(&base, overrides)?;

        let elapsed = start.elapsed().as_micros() as u64;
        Ok(with_metadata(
            "LCOS scenario (use case x region battery defaults)",
            &serde_json::json!({
                "use_case": use_case,
                "region": region_code,
                "technology": technology,
                "cost_multiplier": regional.cost_multiplier,
                "overrides": overrides,
            }),
            warnings,
            elapsed,
            input,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_overrides() -> BTreeMap<String, f64> {
        BTreeMap::new()
    }

    #[test]
    fn test_residential_pv_in_california() {
        let out = ScenarioBuilder::default()
            .build_lcoe(UseCase::Residential, "CA", TechnologyType::Pv, &no_overrides())
            .unwrap();
        let input = out.result;
        assert!((input.capex_per_kw - 2400.0).abs() < 1e-9);
        assert!((input.capacity_factor - 0.209).abs() < 1e-12);
        assert_eq!(input.system_size_kw, 7.0);
        assert_eq!(input.financing.state_rebate, 1000.0);
        assert_eq!(input.financing.discount_rate, 0.06);
        assert!(out.warnings.is_empty());
    }

    #[test]
    fn test_wind_ignores_irradiance() {
        let input = ScenarioBuilder::default()
            .build_lcoe(UseCase::Utility, "NY", TechnologyType::Wind, &no_overrides())
            .unwrap()
            .result;
        assert_eq!(input.capacity_factor, 0.35);
        assert_eq!(input.system_lifetime_years, 20);
        assert!((input.capex_per_kw - 1950.0).abs() < 1e-9);
    }

    #[test]
    fn test_unknown_region_falls_back_with_warning() {
        let out = ScenarioBuilder::default()
            .build_lcoe(UseCase::Commercial, "ZZ", TechnologyType::Pv, &no_overrides())
            .unwrap();
        assert_eq!(out.warnings.len(), 1);
        assert!((out.result.capex_per_kw - 2400.0).abs() < 1e-9);
    }

    #[test]
    fn test_region_code_case_insensitive() {
        let out = ScenarioBuilder::default()
            .build_lcoe(UseCase::Residential, "tx", TechnologyType::Pv, &no_overrides())
            .unwrap();
        assert!(out.warnings.is_empty());
        assert!((out.result.capex_per_kw - 1800.0).abs() < 1e-9);
    }

    #[test]
    fn test_battery_has_no_generation_defaults() {
        let err = ScenarioBuilder::default()
            .build_lcoe(UseCase::Residential, "CA", TechnologyType::Battery, &no_overrides())
            .unwrap_err();
        assert!(matches!(err, LevelizedCostError::InvalidInput { .. }));
    }

    #[test]
    fn test_lcos_only_for_battery() {
        assert!(ScenarioBuilder::default()
            .build_lcos(UseCase::Residential, "CA", TechnologyType::Pv, &no_overrides())
            .is_err());
    }

    #[test]
    fn test_commercial_battery_sizing() {
        let input = ScenarioBuilder::default()
            .build_lcos(UseCase::Commercial, "FL", TechnologyType::Battery, &no_overrides())
            .unwrap()
            .result;
        assert_eq!(input.system_size_kwh, 100.0);
        assert_eq!(input.capex_per_kwh, 600.0);
        assert_eq!(input.cycles_per_year, 300.0);
        let load = input.load_profile.unwrap();
        assert_eq!(load.annual_energy_kwh, 150_000.0);
    }

    #[test]
    fn test_overrides_applied_last() {
        let overrides = BTreeMap::from([
            ("capex_per_kw".to_string(), 1000.0),
            ("financing.discount_rate".to_string(), 0.09),
        ]);
        let input = ScenarioBuilder::default()
            .build_lcoe(UseCase::Residential, "CA", TechnologyType::Pv, &overrides)
            .unwrap()
            .result;
        assert_eq!(input.capex_per_kw, 1000.0);
        assert_eq!(input.financing.discount_rate, 0.09);
    }

    #[test]
    fn test_unknown_override_rejected() {
        let overrides = BTreeMap::from([("capex_per_kwh".to_string(), 1000.0)]);
        assert!(ScenarioBuilder::default()
            .build_lcoe(UseCase::Residential, "CA", TechnologyType::Pv, &overrides)
            .is_err());
    }

    #[test]
    fn test_custom_tables_need_default_region() {
        let tables = ScenarioTables {
            default_region: "WA".into(),
            ..ScenarioTables::default()
        };
        assert!(ScenarioBuilder::new(tables).is_err());
    }

    #[test]
    fn test_tables_deserialize_with_defaults() {
        let tables: ScenarioTables = serde_json::from_str(r#"{"default_region": "TX"}"#).unwrap();
        let builder = ScenarioBuilder::new(tables).unwrap();
        let out = builder
            .build_lcoe(UseCase::Residential, "??", TechnologyType::Pv, &no_overrides())
            .unwrap();
        assert!((out.result.capex_per_kw - 1800.0).abs() < 1e-9);
    }
}
