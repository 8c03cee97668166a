use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::error::LevelizedCostError;
use crate::parameters::LevelizedCostModel;
use crate::types::*;
use crate::LevelizedCostResult;

/// Input for one-at-a-time sensitivity analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensitivityInput {
    /// Parameter paths to vary; the model's default list when absent
    pub parameters: Option<Vec<String>>,
    /// Relative step applied below and above each base value
    pub variation_fraction: f64,
    /// Fail the whole analysis on the first bad parameter
    pub strict: bool,
}

impl Default for SensitivityInput {
    fn default() -> Self {
        SensitivityInput {
            parameters: None,
            variation_fraction: 0.2,
            strict: false,
        }
    }
}

/// Response of the levelized cost (USD/kWh) to one parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensitivityResult {
    pub parameter: String,
    pub base_value: f64,
    pub low_value: f64,
    pub high_value: f64,
    pub base_output: f64,
    pub low_output: f64,
    pub high_output: f64,
    /// Δoutput / Δinput
    pub sensitivity: f64,
    /// %Δoutput / %Δinput
    pub elasticity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterFailure {
    pub parameter: String,
    pub reason: String,
}

/// Output of a sensitivity analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensitivityOutput {
    pub metric: String,
    pub base_output: f64,
    /// Sorted by descending absolute elasticity
    pub results: Vec<SensitivityResult>,
    pub failures: Vec<ParameterFailure>,
}

impl SensitivityOutput {
    /// The parameter the output is most elastic to.
    pub fn most_sensitive(&self) -> Option<&SensitivityResult> {
        self.results.first()
    }
}

/// Perturb one parameter low and high around its base value.
fn perturb<M: LevelizedCostModel>(
    base: &M,
    path: &str,
    variation: f64,
    base_output: f64,
) -> LevelizedCostResult<SensitivityResult> {
    let parameter: M::Parameter = path.parse()?;
    let base_value = base.parameter(parameter)?;
    let low_value = base_value * (1.0 - variation);
    let high_value = base_value * (1.0 + variation);

    let low_output = base
        .with_parameter(parameter, low_value)?
        .levelized_cost_per_kwh()?;
    let high_output = base
        .with_parameter(parameter, high_value)?
        .levelized_cost_per_kwh()?;

    let input_span = high_value - low_value;
    let sensitivity = if input_span != 0.0 {
        (high_output - low_output) / input_span
    } else {
        0.0
    };
    let elasticity = if base_value != 0.0 && base_output != 0.0 {
        sensitivity * base_value / base_output
    } else {
        0.0
    };

    Ok(SensitivityResult {
        parameter: parameter.to_string(),
        base_value,
        low_value,
        high_value,
        base_output,
        low_output,
        high_output,
        sensitivity,
        elasticity,
    })
}

/// Run one-at-a-time sensitivity analysis around `base`.
///
/// Each parameter is moved to `base × (1 ± variation_fraction)` on a copy of
/// the input while everything else is held fixed. Integer parameters round
/// to whole units, so the realized span can differ from the nominal one; the
/// slope uses the nominal values. A parameter that cannot be resolved or
/// priced is recorded in `failures` unless `strict` is set.
pub fn analyze_sensitivity<M: LevelizedCostModel>(
    base: &M,
    input: &SensitivityInput,
) -> LevelizedCostResult<ComputationOutput<SensitivityOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    let variation = input.variation_fraction;
    if !variation.is_finite() || variation < 0.0 {
        return Err(LevelizedCostError::invalid(
            "variation_fraction",
            "Must be a non-negative number",
        ));
    }

    let paths: Vec<String> = match &input.parameters {
        Some(paths) => paths.clone(),
        None => M::default_sensitivity_parameters()
            .iter()
            .map(|p| p.to_string())
            .collect(),
    };

    let base_output = base.levelized_cost_per_kwh()?;

    let mut results = Vec::with_capacity(paths.len());
    let mut failures = Vec::new();
    for path in &paths {
        match perturb(base, path, variation, base_output) {
            Ok(result) => results.push(result),
            Err(e) if input.strict => {
                return Err(LevelizedCostError::invalid(
                    format!("parameter:{path}"),
                    e.to_string(),
                ))
            }
            Err(e) => {
                log::warn!("Sensitivity on '{path}' skipped: {e}");
                warnings.push(format!("Parameter '{path}' skipped: {e}"));
                failures.push(ParameterFailure {
                    parameter: path.clone(),
                    reason: e.to_string(),
                });
            }
        }
    }

    results.sort_by(|a, b| b.elasticity.abs().total_cmp(&a.elasticity.abs()));

    let output = SensitivityOutput {
        metric: M::METRIC.to_string(),
        base_output,
        results,
        failures,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "One-at-a-time sensitivity (symmetric relative perturbation)",
        &serde_json::json!({
            "metric": M::METRIC,
            "variation_fraction": variation,
            "parameters": paths,
            "strict": input.strict,
        }),
        warnings,
        elapsed,
        output,
    ))
}
