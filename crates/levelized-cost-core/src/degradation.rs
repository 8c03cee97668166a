use serde::{Deserialize, Serialize};

use crate::error::LevelizedCostError;
use crate::types::Rate;
use crate::LevelizedCostResult;

/// One discrete loss event of a step degradation profile.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DegradationStep {
    /// First operating year (0-based) in which the loss applies
    pub year: u32,
    /// Fraction of output lost from that year onwards
    pub loss: Rate,
}

/// Output decay of a generation asset over its life.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DegradationModel {
    /// `1 − year × rate`, floored at zero
    Linear { annual_rate: Rate },
    /// `(1 − rate)^year`
    Exponential { annual_rate: Rate },
    /// Product of `(1 − loss)` over every step already reached, in declared order
    Step { steps: Vec<DegradationStep> },
    /// No degradation; the performance factor is always 1
    None,
}

impl Default for DegradationModel {
    fn default() -> Self {
        DegradationModel::Linear { annual_rate: 0.005 }
    }
}

impl DegradationModel {
    /// Fraction of first-year output delivered in `year` (0-based).
    pub fn performance_factor(&self, year: u32) -> f64 {
        match self {
            DegradationModel::Linear { annual_rate } => {
                (1.0 - year as f64 * annual_rate).max(0.0)
            }
            DegradationModel::Exponential { annual_rate } => {
                (1.0 - annual_rate).powi(year as i32)
            }
            DegradationModel::Step { steps } => steps
                .iter()
                .filter(|s| year >= s.year)
                .fold(1.0, |factor, s| factor * (1.0 - s.loss)),
            DegradationModel::None => 1.0,
        }
    }

    /// Annual rate of the continuous variants.
    pub fn annual_rate(&self) -> Option<Rate> {
        match self {
            DegradationModel::Linear { annual_rate }
            | DegradationModel::Exponential { annual_rate } => Some(*annual_rate),
            DegradationModel::Step { .. } | DegradationModel::None => None,
        }
    }

    /// Same variant with a different annual rate. Step and no-degradation
    /// profiles have no annual rate to replace.
    pub fn with_annual_rate(&self, rate: Rate) -> LevelizedCostResult<Self> {
        match self {
            DegradationModel::Linear { .. } => Ok(DegradationModel::Linear { annual_rate: rate }),
            DegradationModel::Exponential { .. } => {
                Ok(DegradationModel::Exponential { annual_rate: rate })
            }
            DegradationModel::Step { .. } | DegradationModel::None => {
                Err(LevelizedCostError::invalid(
                    "degradation.annual_rate",
                    format!("{} degradation has no annual rate", self.name()),
                ))
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            DegradationModel::Linear { .. } => "linear",
            DegradationModel::Exponential { .. } => "exponential",
            DegradationModel::Step { .. } => "step",
            DegradationModel::None => "none",
        }
    }

    pub fn validate(&self) -> LevelizedCostResult<()> {
        if let Some(rate) = self.annual_rate() {
            if !rate.is_finite() {
                return Err(LevelizedCostError::invalid(
                    "degradation.annual_rate",
                    "Must be a finite number",
                ));
            }
            // Outside [0, 1] the factor leaves [0, 1] (or oscillates in sign)
            if !(0.0..=1.0).contains(&rate) {
                return Err(LevelizedCostError::invalid(
                    "degradation.annual_rate",
                    format!("Annual rate must be within [0, 1], got {rate}"),
                ));
            }
        }
        if let DegradationModel::Step { steps } = self {
            if let Some(step) = steps
                .iter()
                .find(|s| !s.loss.is_finite() || s.loss < 0.0 || s.loss > 1.0)
            {
                return Err(LevelizedCostError::invalid(
                    "degradation.steps",
                    format!("Step loss at year {} must be within [0, 1]", step.year),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0, 1.0)]
    #[case(10, 0.95)]
    #[case(100, 0.5)]
    #[case(250, 0.0)]
    fn test_linear(#[case] year: u32, #[case] expected: f64) {
        let model = DegradationModel::Linear { annual_rate: 0.005 };
        assert!((model.performance_factor(year) - expected).abs() < 1e-12);
    }

    #[rstest]
    #[case(0, 1.0)]
    #[case(1, 0.99)]
    #[case(2, 0.9801)]
    fn test_exponential(#[case] year: u32, #[case] expected: f64) {
        let model = DegradationModel::Exponential { annual_rate: 0.01 };
        assert!((model.performance_factor(year) - expected).abs() < 1e-12);
    }

    #[test]
    fn test_linear_floor_at_zero() {
        let model = DegradationModel::Linear { annual_rate: 0.2 };
        assert_eq!(model.performance_factor(6), 0.0);
    }

    #[test]
    fn test_step_applies_reached_steps_in_order() {
        let model = DegradationModel::Step {
            steps: vec![
                DegradationStep { year: 5, loss: 0.1 },
                DegradationStep { year: 10, loss: 0.2 },
                DegradationStep { year: 40, loss: 0.5 },
            ],
        };
        assert_eq!(model.performance_factor(4), 1.0);
        assert!((model.performance_factor(5) - 0.9).abs() < 1e-12);
        assert!((model.performance_factor(25) - 0.72).abs() < 1e-12);
    }

    #[test]
    fn test_none_is_flat() {
        assert_eq!(DegradationModel::None.performance_factor(30), 1.0);
    }

    #[test]
    fn test_monotonic_for_positive_rate() {
        for model in [
            DegradationModel::Linear { annual_rate: 0.007 },
            DegradationModel::Exponential { annual_rate: 0.007 },
        ] {
            for year in 0..200 {
                assert!(model.performance_factor(year + 1) <= model.performance_factor(year));
            }
        }
    }

    #[test]
    fn test_with_annual_rate_keeps_variant() {
        let m = DegradationModel::Exponential { annual_rate: 0.01 };
        assert_eq!(
            m.with_annual_rate(0.02).unwrap(),
            DegradationModel::Exponential { annual_rate: 0.02 }
        );
        assert!(DegradationModel::None.with_annual_rate(0.02).is_err());
    }

    #[test]
    fn test_serde_tagged_representation() {
        let json = serde_json::json!({"type": "step", "steps": [{"year": 3, "loss": 0.05}]});
        let model: DegradationModel = serde_json::from_value(json).unwrap();
        assert_eq!(model.name(), "step");
        assert!(serde_json::from_value::<DegradationModel>(
            serde_json::json!({"type": "quadratic", "annual_rate": 0.01})
        )
        .is_err());
    }

    #[rstest]
    #[case(DegradationModel::Linear { annual_rate: -0.01 }, "degradation.annual_rate")]
    #[case(DegradationModel::Linear { annual_rate: 1.5 }, "degradation.annual_rate")]
    #[case(DegradationModel::Exponential { annual_rate: 1.5 }, "degradation.annual_rate")]
    #[case(DegradationModel::Exponential { annual_rate: -0.1 }, "degradation.annual_rate")]
    #[case(DegradationModel::Step { steps: vec![DegradationStep { year: 1, loss: 1.5 }] }, "degradation.steps")]
    #[case(DegradationModel::Step { steps: vec![DegradationStep { year: 2, loss: -0.1 }] }, "degradation.steps")]
    fn test_out_of_range_rejected(#[case] model: DegradationModel, #[case] expected: &str) {
        match model.validate() {
            Err(LevelizedCostError::InvalidInput { field, .. }) => assert_eq!(field, expected),
            other => panic!("expected InvalidInput, got {other:?}"),
        }
    }

    #[rstest]
    #[case(DegradationModel::Linear { annual_rate: 0.0 })]
    #[case(DegradationModel::Linear { annual_rate: 1.0 })]
    #[case(DegradationModel::Exponential { annual_rate: 1.0 })]
    #[case(DegradationModel::Step { steps: vec![DegradationStep { year: 0, loss: 1.0 }] })]
    #[case(DegradationModel::None)]
    fn test_accepted_models_stay_in_unit_interval(#[case] model: DegradationModel) {
        model.validate().unwrap();
        for year in 0..50 {
            assert!((0.0..=1.0).contains(&model.performance_factor(year)));
        }
    }
}
