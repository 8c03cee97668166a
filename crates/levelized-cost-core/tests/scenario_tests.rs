use levelized_cost_core::lcoe::calculate_lcoe;
use levelized_cost_core::lcos::calculate_lcos;
use levelized_cost_core::presets::{
    calculate_solar_preset, solar_plus_storage, solar_plus_storage_with, SolarPlusStorageInput,
    SolarPreset, SolarProduct,
};
use levelized_cost_core::scenarios::{ScenarioBuilder, ScenarioTables};
use levelized_cost_core::{LevelizedCostError, TechnologyType, UseCase};
use pretty_assertions::assert_eq;
use std::collections::BTreeMap;

fn no_overrides() -> BTreeMap<String, f64> {
    BTreeMap::new()
}

#[test]
fn test_every_use_case_region_pair_prices() {
    let builder = ScenarioBuilder::default();
    for use_case in UseCase::ALL {
        for region in ["CA", "TX", "FL", "NY", "AZ"] {
            let lcoe_input = builder
                .build_lcoe(use_case, region, TechnologyType::Pv, &no_overrides())
                .unwrap()
                .result;
            let lcoe = calculate_lcoe(&lcoe_input).unwrap().result;
            assert!(lcoe.lcoe_usd_per_kwh > 0.0, "{use_case}/{region}");

            let lcos_input = builder
                .build_lcos(use_case, region, TechnologyType::Battery, &no_overrides())
                .unwrap()
                .result;
            let lcos = calculate_lcos(&lcos_input).unwrap().result;
            assert!(lcos.lcos_usd_per_kwh > 0.0, "{use_case}/{region}");
        }
    }
}

#[test]
fn test_sunnier_region_cheaper_for_same_costs() {
    let builder = ScenarioBuilder::default();
    let overrides = BTreeMap::from([
        ("capex_per_kw".to_string(), 2000.0),
        ("financing.state_rebate".to_string(), 0.0),
    ]);
    let az = builder
        .build_lcoe(UseCase::Utility, "AZ", TechnologyType::Pv, &overrides)
        .unwrap()
        .result;
    let ny = builder
        .build_lcoe(UseCase::Utility, "NY", TechnologyType::Pv, &overrides)
        .unwrap()
        .result;
    let az_cost = calculate_lcoe(&az).unwrap().result.lcoe_usd_per_kwh;
    let ny_cost = calculate_lcoe(&ny).unwrap().result.lcoe_usd_per_kwh;
    assert!(az_cost < ny_cost);
}

#[test]
fn test_tag_parsing_errors_are_hard() {
    let err = "industrial".parse::<UseCase>().unwrap_err();
    assert!(matches!(err, LevelizedCostError::InvalidInput { .. }));
    assert!("geothermal".parse::<TechnologyType>().is_err());
}

#[test]
fn test_build_is_deterministic() {
    let builder = ScenarioBuilder::default();
    let a = builder
        .build_lcos(UseCase::Utility, "TX", TechnologyType::Battery, &no_overrides())
        .unwrap()
        .result;
    let b = builder
        .build_lcos(UseCase::Utility, "TX", TechnologyType::Battery, &no_overrides())
        .unwrap()
        .result;
    assert_eq!(a, b);
}

#[test]
fn test_tables_round_trip_through_json() {
    let tables = ScenarioTables::default();
    let json = serde_json::to_string(&tables).unwrap();
    let back: ScenarioTables = serde_json::from_str(&json).unwrap();
    assert_eq!(back, tables);
}

#[test]
fn test_custom_region_table() {
    let mut tables = ScenarioTables::default();
    let mut wa = tables.regions["FL"].clone();
    wa.cost_multiplier = 1.1;
    wa.solar_irradiance_factor = 0.8;
    tables.regions.insert("WA".into(), wa);

    let builder = ScenarioBuilder::new(tables).unwrap();
    let out = builder
        .build_lcoe(UseCase::Residential, "wa", TechnologyType::Pv, &no_overrides())
        .unwrap();
    assert!(out.warnings.is_empty());
    assert!((out.result.capex_per_kw - 2200.0).abs() < 1e-9);
}

#[test]
fn test_solar_roof_costs_more_than_panels() {
    let panels = calculate_solar_preset(&SolarPreset {
        system_size_kw: 10.0,
        ..SolarPreset::default()
    })
    .unwrap()
    .result;
    let roof = calculate_solar_preset(&SolarPreset {
        product: SolarProduct::SolarRoof,
        system_size_kw: 10.0,
        roof_area_sqft: Some(2000.0),
        ..SolarPreset::default()
    })
    .unwrap()
    .result;
    assert!(roof.lcoe_usd_per_kwh > panels.lcoe_usd_per_kwh);
}

#[test]
fn test_solar_plus_storage_bundle() {
    let out = solar_plus_storage(&SolarPlusStorageInput {
        solar_kw: 8.0,
        battery_kwh: 27.0,
        ..SolarPlusStorageInput::default()
    })
    .unwrap()
    .result;
    let combined = &out.combined_metrics;
    assert_eq!(combined.powerwall_units, 2);
    // 27 kWh × 0.95 / 5 kW
    assert!((combined.backup_hours - 5.13).abs() < 1e-12);
    assert!(
        (combined.total_capex
            - (out.solar_lcoe.metrics.total_capex + out.storage_lcos.metrics.total_capex))
            .abs()
            < 1e-9
    );
}

#[test]
fn test_lowercase_region_keys_are_matched() {
    let mut tables = ScenarioTables::default();
    let mut wa = tables.regions["FL"].clone();
    wa.cost_multiplier = 2.0;
    tables.regions.insert("wa".into(), wa);
    tables.default_region = "ca".into();

    let builder = ScenarioBuilder::new(tables).unwrap();
    assert_eq!(builder.tables().default_region, "CA");
    for code in ["wa", "WA", " Wa "] {
        let out = builder
            .build_lcoe(UseCase::Residential, code, TechnologyType::Pv, &no_overrides())
            .unwrap();
        assert!(out.warnings.is_empty(), "{code}");
        assert!((out.result.capex_per_kw - 4000.0).abs() < 1e-9, "{code}");
    }
}

#[test]
fn test_region_keys_colliding_after_case_folding_rejected() {
    let mut tables = ScenarioTables::default();
    let fl = tables.regions["FL"].clone();
    tables.regions.insert("wa".into(), fl.clone());
    tables.regions.insert("WA".into(), fl);
    let err = ScenarioBuilder::new(tables).unwrap_err();
    assert!(matches!(err, LevelizedCostError::InvalidInput { .. }));
}

#[test]
fn test_solar_plus_storage_uses_custom_tables() {
    let mut tables = ScenarioTables::default();
    tables.regions.get_mut("CA").unwrap().cost_multiplier = 2.4;
    let builder = ScenarioBuilder::new(tables).unwrap();

    let bundle = SolarPlusStorageInput::default();
    let default_out = solar_plus_storage(&bundle).unwrap();
    let custom_out = solar_plus_storage_with(&bundle, &builder).unwrap();
    assert!(default_out.warnings.is_empty());
    assert!(custom_out.warnings.is_empty());
    assert!(
        custom_out.result.solar_lcoe.metrics.total_capex
            > default_out.result.solar_lcoe.metrics.total_capex
    );
    assert_eq!(custom_out.result.storage_lcos, default_out.result.storage_lcos);

    let unknown = SolarPlusStorageInput {
        region: "ZZ".into(),
        ..SolarPlusStorageInput::default()
    };
    let out = solar_plus_storage_with(&unknown, &builder).unwrap();
    assert_eq!(out.warnings.len(), 1);
    assert!(out.warnings[0].contains("ZZ"));
}
