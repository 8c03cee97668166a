use levelized_cost_core::degradation::{DegradationModel, DegradationStep};
use levelized_cost_core::finance::FinancingParameters;
use levelized_cost_core::lcoe::{calculate_lcoe, compute_lcoe, LcoeInput};
use levelized_cost_core::{LevelizedCostError, TechnologyType};
use pretty_assertions::assert_eq;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rstest::rstest;

// ===========================================================================
// Reference scenario
// ===========================================================================

fn reference_pv() -> LcoeInput {
    LcoeInput {
        capex_per_kw: 2000.0,
        system_size_kw: 100.0,
        fixed_om_per_kw_year: 15.0,
        capacity_factor: 0.22,
        system_lifetime_years: 25,
        degradation: DegradationModel::Linear { annual_rate: 0.005 },
        financing: FinancingParameters {
            discount_rate: 0.07,
            inflation_rate: 0.025,
            debt_fraction: 0.6,
            debt_interest_rate: 0.05,
            federal_itc: 0.30,
            ..FinancingParameters::default()
        },
        ..LcoeInput::default()
    }
}

#[test]
fn test_reference_scenario_in_plausible_band() {
    let out = calculate_lcoe(&reference_pv()).unwrap();
    let lcoe = out.result.lcoe_usd_per_kwh;
    assert!(lcoe > 0.03 && lcoe < 0.12, "lcoe={lcoe}");
    assert!(out.warnings.is_empty());
    assert_eq!(out.metadata.precision, "ieee754_f64");
}

#[test]
fn test_reference_scenario_is_deterministic() {
    let first = compute_lcoe(&reference_pv()).unwrap();
    for _ in 0..3 {
        assert_eq!(compute_lcoe(&reference_pv()).unwrap(), first);
    }
}

#[test]
fn test_output_serializes_nested() {
    let out = compute_lcoe(&reference_pv()).unwrap();
    let json = serde_json::to_value(&out).unwrap();
    assert!(json["breakdown"]["capex"].is_number());
    assert!(json["metrics"]["total_energy_mwh"].is_number());
    assert!(json["uncertainty"]["p50"].is_null());
}

// ===========================================================================
// Zero-division guard
// ===========================================================================

#[rstest]
#[case(DegradationModel::Linear { annual_rate: 0.005 })]
#[case(DegradationModel::Exponential { annual_rate: 0.01 })]
#[case(DegradationModel::None)]
fn test_zero_lifetime_zero_cost(#[case] degradation: DegradationModel) {
    let input = LcoeInput {
        system_lifetime_years: 0,
        degradation,
        ..reference_pv()
    };
    let out = compute_lcoe(&input).unwrap();
    assert_eq!(out.lcoe_usd_per_kwh, 0.0);
    assert_eq!(out.lcoe_usd_per_mwh, 0.0);
    assert_eq!(out.breakdown.capex, 0.0);
    assert_eq!(out.breakdown.opex, 0.0);
    assert_eq!(out.breakdown.fuel, 0.0);
    assert_eq!(out.breakdown.financing, 0.0);
}

#[test]
fn test_zero_capacity_factor_zero_cost() {
    let input = LcoeInput {
        capacity_factor: 0.0,
        ..reference_pv()
    };
    let out = calculate_lcoe(&input).unwrap();
    assert_eq!(out.result.lcoe_usd_per_kwh, 0.0);
    assert_eq!(out.warnings.len(), 1);
}

// ===========================================================================
// Breakdown consistency
// ===========================================================================

#[test]
fn test_breakdown_sums_to_total() {
    let mut rng = StdRng::seed_from_u64(2024);
    for case in 0..200 {
        let fuel_cost_per_mwh = if rng.gen_bool(0.3) {
            rng.gen_range(5.0..60.0)
        } else {
            0.0
        };
        let input = LcoeInput {
            capex_per_kw: rng.gen_range(500.0..5000.0),
            system_size_kw: rng.gen_range(1.0..100_000.0),
            fixed_om_per_kw_year: rng.gen_range(0.0..50.0),
            variable_om_per_mwh: rng.gen_range(0.0..10.0),
            fuel_cost_per_mwh,
            capacity_factor: rng.gen_range(0.05..0.95),
            system_lifetime_years: rng.gen_range(1..=40),
            degradation: DegradationModel::Linear {
                annual_rate: rng.gen_range(0.0..0.02),
            },
            technology: if fuel_cost_per_mwh > 0.0 {
                TechnologyType::Thermal
            } else {
                TechnologyType::Pv
            },
            financing: FinancingParameters {
                discount_rate: rng.gen_range(0.02..0.12),
                ..reference_pv().financing
            },
            ..reference_pv()
        };
        let out = compute_lcoe(&input).unwrap();
        let rel = (out.breakdown.total() - out.lcoe_usd_per_mwh).abs() / out.lcoe_usd_per_mwh;
        assert!(rel < 1e-9, "case {case}: relative gap {rel} for {input:?}");
    }
}

// ===========================================================================
// Degradation behaviour through the engine
// ===========================================================================

#[test]
fn test_faster_degradation_raises_cost() {
    let slow = compute_lcoe(&reference_pv()).unwrap();
    let fast = compute_lcoe(&LcoeInput {
        degradation: DegradationModel::Linear { annual_rate: 0.02 },
        ..reference_pv()
    })
    .unwrap();
    assert!(fast.lcoe_usd_per_kwh > slow.lcoe_usd_per_kwh);
    assert!(fast.metrics.total_energy_mwh < slow.metrics.total_energy_mwh);
}

#[test]
fn test_step_degradation_applies_after_trigger() {
    let none = compute_lcoe(&LcoeInput {
        degradation: DegradationModel::None,
        ..reference_pv()
    })
    .unwrap();
    let stepped = compute_lcoe(&LcoeInput {
        degradation: DegradationModel::Step {
            steps: vec![DegradationStep { year: 10, loss: 0.1 }],
        },
        ..reference_pv()
    })
    .unwrap();
    assert!(stepped.metrics.total_energy_mwh < none.metrics.total_energy_mwh);
    assert_eq!(
        stepped.metrics.first_year_energy_mwh,
        none.metrics.first_year_energy_mwh
    );
}

// ===========================================================================
// Validation
// ===========================================================================

#[test]
fn test_non_finite_capex_rejected() {
    let input = LcoeInput {
        capex_per_kw: f64::NAN,
        ..reference_pv()
    };
    match compute_lcoe(&input) {
        Err(LevelizedCostError::InvalidInput { field, .. }) => assert_eq!(field, "capex_per_kw"),
        other => panic!("expected InvalidInput, got {other:?}"),
    }
}

#[test]
fn test_runaway_degradation_rate_rejected() {
    let input = LcoeInput {
        degradation: DegradationModel::Exponential { annual_rate: 1.5 },
        ..LcoeInput::default()
    };
    match compute_lcoe(&input) {
        Err(LevelizedCostError::InvalidInput { field, .. }) => {
            assert_eq!(field, "degradation.annual_rate")
        }
        other => panic!("expected InvalidInput, got {other:?}"),
    }
}

#[test]
fn test_input_deserializes_with_defaults() {
    let input: LcoeInput = serde_json::from_str(
        r#"{"capex_per_kw": 1800, "degradation": {"type": "exponential", "annual_rate": 0.004}}"#,
    )
    .unwrap();
    assert_eq!(input.capex_per_kw, 1800.0);
    assert_eq!(input.system_lifetime_years, 25);
    assert_eq!(
        input.degradation,
        DegradationModel::Exponential { annual_rate: 0.004 }
    );
}

#[test]
fn test_unknown_degradation_tag_rejected() {
    let parsed: Result<LcoeInput, _> =
        serde_json::from_str(r#"{"degradation": {"type": "logarithmic", "annual_rate": 0.01}}"#);
    assert!(parsed.is_err());
}
