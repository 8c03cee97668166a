use rand::rngs::StdRng;
use rand::Rng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use statrs::distribution::{Normal, Triangular, Uniform};
use std::fmt;
use std::time::Instant;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::error::LevelizedCostError;
use crate::parameters::LevelizedCostModel;
use crate::types::*;
use crate::LevelizedCostResult;

/// Default spread of a normal distribution, as a fraction of |base|.
const DEFAULT_STD_FRACTION: f64 = 0.10;
/// Default half-width of uniform and triangular bounds, as a fraction of |base|.
const DEFAULT_BOUND_FRACTION: f64 = 0.20;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Distribution shape for one uncertain parameter.
///
/// Any unspecified bound is derived from the parameter's base value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DistributionKind {
    Normal {
        #[serde(default)]
        std_dev: Option<f64>,
    },
    Uniform {
        #[serde(default)]
        min: Option<f64>,
        #[serde(default)]
        max: Option<f64>,
    },
    Triangular {
        #[serde(default)]
        min: Option<f64>,
        #[serde(default)]
        mode: Option<f64>,
        #[serde(default)]
        max: Option<f64>,
    },
}

/// A parameter path and the distribution its samples are drawn from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterDistribution {
    pub parameter: String,
    /// Centre of the distribution; read from the base input when absent
    #[serde(default)]
    pub base_value: Option<f64>,
    pub distribution: DistributionKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonteCarloInput {
    pub distributions: Vec<ParameterDistribution>,
    /// Number of samples (minimum 1).
    #[serde(default = "default_n_samples")]
    pub n_samples: usize,
    /// Optional seed for reproducibility.
    #[serde(default)]
    pub seed: Option<u64>,
    /// Return every valid output alongside the statistics
    #[serde(default)]
    pub keep_samples: bool,
}

fn default_n_samples() -> usize {
    10_000
}

/// A sample whose input could not be built or priced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleFailure {
    pub index: usize,
    pub reason: String,
}

/// Pearson correlation between a parameter's samples and the outputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterCorrelation {
    pub parameter: String,
    pub correlation: f64,
}

/// Statistics over the valid simulated levelized costs (USD/kWh).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonteCarloOutput {
    pub metric: String,
    /// Deterministic output of the unperturbed input
    pub base_output: f64,
    pub mean: f64,
    /// Population standard deviation
    pub std_dev: f64,
    pub p10: f64,
    pub p25: f64,
    pub p50: f64,
    pub p75: f64,
    pub p90: f64,
    pub min: f64,
    pub max: f64,
    pub requested_samples: usize,
    pub valid_samples: usize,
    pub invalid_samples: Vec<SampleFailure>,
    pub parameter_correlations: Vec<ParameterCorrelation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub samples: Option<Vec<f64>>,
}

impl MonteCarloOutput {
    /// Standard error of the mean.
    pub fn standard_error(&self) -> f64 {
        if self.valid_samples == 0 {
            return 0.0;
        }
        self.std_dev / (self.valid_samples as f64).sqrt()
    }
}

impl From<&MonteCarloOutput> for UncertaintyBand {
    fn from(mc: &MonteCarloOutput) -> Self {
        UncertaintyBand {
            p10: Some(mc.p10),
            p50: Some(mc.p50),
            p90: Some(mc.p90),
        }
    }
}

// ---------------------------------------------------------------------------
// Sampling
// ---------------------------------------------------------------------------

/// A resolved distribution, built once per parameter.
enum Sampler {
    /// Zero-width spread
    Constant(f64),
    Normal(Normal),
    Uniform(Uniform),
    Triangular(Triangular),
}

impl Sampler {
    fn new(parameter: &str, base: f64, kind: &DistributionKind) -> LevelizedCostResult<Self> {
        match kind {
            DistributionKind::Normal { std_dev } => {
                let std_dev = std_dev.unwrap_or(base.abs() * DEFAULT_STD_FRACTION);
                if std_dev == 0.0 {
                    return Ok(Sampler::Constant(base));
                }
                Ok(Sampler::Normal(
                    Normal::new(base, std_dev).map_err(|e| invalid(parameter, "Normal", e))?,
                ))
            }
            DistributionKind::Uniform { min, max } => {
                let (lo, hi) = bounds(base, *min, *max);
                if lo == hi {
                    return Ok(Sampler::Constant(lo));
                }
                Ok(Sampler::Uniform(
                    Uniform::new(lo, hi).map_err(|e| invalid(parameter, "Uniform", e))?,
                ))
            }
            DistributionKind::Triangular { min, mode, max } => {
                let (lo, hi) = bounds(base, *min, *max);
                let mode = mode.unwrap_or(base);
                if lo == hi {
                    return Ok(Sampler::Constant(lo));
                }
                Ok(Sampler::Triangular(
                    Triangular::new(lo, hi, mode).map_err(|e| invalid(parameter, "Triangular", e))?,
                ))
            }
        }
    }

    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        match self {
            Sampler::Constant(v) => *v,
            Sampler::Normal(d) => rng.sample(d),
            Sampler::Uniform(d) => rng.sample(d),
            Sampler::Triangular(d) => rng.sample(d),
        }
    }
}

fn invalid(parameter: &str, name: &str, e: impl fmt::Display) -> LevelizedCostError {
    LevelizedCostError::invalid(
        format!("distribution:{parameter}"),
        format!("Invalid {name} parameters: {e}"),
    )
}

/// Explicit bounds, or base ± 20% of |base|, returned in ascending order.
fn bounds(base: f64, min: Option<f64>, max: Option<f64>) -> (f64, f64) {
    let spread = base.abs() * DEFAULT_BOUND_FRACTION;
    let lo = min.unwrap_or(base - spread);
    let hi = max.unwrap_or(base + spread);
    (lo.min(hi), lo.max(hi))
}

// ---------------------------------------------------------------------------
// Statistics helpers
// ---------------------------------------------------------------------------

/// Compute the percentile value from a **sorted** slice using linear interpolation.
fn percentile_sorted(sorted: &[f64], p: f64) -> f64 {
    if sorted.len() == 1 {
        return sorted[0];
    }
    let rank = p / 100.0 * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    if lower == upper {
        sorted[lower]
    } else {
        let frac = rank - lower as f64;
        sorted[lower] * (1.0 - frac) + sorted[upper] * frac
    }
}

/// Pearson correlation; 0 when either series has no variance.
fn pearson(xs: &[f64], ys: &[f64]) -> f64 {
    let n = xs.len().min(ys.len());
    if n < 2 {
        return 0.0;
    }
    let (xs, ys) = (&xs[..n], &ys[..n]);
    let mean_x = xs.iter().sum::<f64>() / n as f64;
    let mean_y = ys.iter().sum::<f64>() / n as f64;

    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (x, y) in xs.iter().zip(ys) {
        let dx = x - mean_x;
        let dy = y - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }
    if var_x <= 0.0 || var_y <= 0.0 {
        return 0.0;
    }
    cov / (var_x * var_y).sqrt()
}

// ---------------------------------------------------------------------------
// Simulation
// ---------------------------------------------------------------------------

/// Price one sample: apply every drawn value, then run the engine.
fn evaluate<M: LevelizedCostModel>(
    base: &M,
    parameters: &[M::Parameter],
    draws: &[Vec<f64>],
    index: usize,
) -> LevelizedCostResult<f64> {
    let mut input = base.clone();
    for (parameter, values) in parameters.iter().zip(draws) {
        input = input.with_parameter(*parameter, values[index])?;
    }
    let cost = input.levelized_cost_per_kwh()?;
    if !cost.is_finite() {
        return Err(LevelizedCostError::Computation(format!(
            "Non-finite levelized cost {cost}"
        )));
    }
    Ok(cost)
}

/// Run a Monte Carlo analysis, seeding from `input.seed` or from entropy.
pub fn run_monte_carlo<M>(
    base: &M,
    input: &MonteCarloInput,
) -> LevelizedCostResult<ComputationOutput<MonteCarloOutput>>
where
    M: LevelizedCostModel + Sync,
    M::Parameter: Sync,
{
    let mut rng = match input.seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_entropy(),
    };
    run_monte_carlo_with_rng(base, input, &mut rng)
}

/// Run a Monte Carlo analysis with a caller-supplied generator.
///
/// Every sample is drawn up front, parameter by parameter, so the result for
/// a given generator state does not depend on how evaluation is scheduled.
/// Samples whose input is rejected or whose engine run fails are recorded in
/// `invalid_samples` and left out of the statistics.
pub fn run_monte_carlo_with_rng<M, R>(
    base: &M,
    input: &MonteCarloInput,
    rng: &mut R,
) -> LevelizedCostResult<ComputationOutput<MonteCarloOutput>>
where
    M: LevelizedCostModel + Sync,
    M::Parameter: Sync,
    R: Rng + ?Sized,
{
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    let n = input.n_samples;
    if n == 0 {
        return Err(LevelizedCostError::invalid(
            "n_samples",
            "At least one sample is required",
        ));
    }
    if input.distributions.is_empty() {
        warnings.push("No distributions given; every sample equals the base case".into());
    }

    let base_output = base.levelized_cost_per_kwh()?;

    let mut parameters = Vec::with_capacity(input.distributions.len());
    let mut samplers = Vec::with_capacity(input.distributions.len());
    for dist in &input.distributions {
        let parameter: M::Parameter = dist.parameter.parse()?;
        let centre = match dist.base_value {
            Some(v) => v,
            None => base.parameter(parameter)?,
        };
        samplers.push(Sampler::new(&dist.parameter, centre, &dist.distribution)?);
        parameters.push(parameter);
    }

    let draws: Vec<Vec<f64>> = samplers
        .iter()
        .map(|s| (0..n).map(|_| s.sample(rng)).collect())
        .collect();

    #[cfg(feature = "parallel")]
    let results: Vec<LevelizedCostResult<f64>> = (0..n)
        .into_par_iter()
        .map(|i| evaluate(base, &parameters, &draws, i))
        .collect();
    #[cfg(not(feature = "parallel"))]
    let results: Vec<LevelizedCostResult<f64>> = (0..n)
        .map(|i| evaluate(base, &parameters, &draws, i))
        .collect();

    let mut valid_indices = Vec::with_capacity(n);
    let mut outputs = Vec::with_capacity(n);
    let mut invalid_samples = Vec::new();
    for (index, result) in results.into_iter().enumerate() {
        match result {
            Ok(v) => {
                valid_indices.push(index);
                outputs.push(v);
            }
            Err(e) => invalid_samples.push(SampleFailure {
                index,
                reason: e.to_string(),
            }),
        }
    }

    if outputs.is_empty() {
        return Err(LevelizedCostError::InsufficientSamples {
            requested: n,
            failed: invalid_samples.len(),
        });
    }
    if !invalid_samples.is_empty() {
        log::warn!(
            "{} of {} Monte Carlo samples failed; first: {}",
            invalid_samples.len(),
            n,
            invalid_samples[0].reason
        );
        warnings.push(format!(
            "{} of {} samples were invalid and excluded",
            invalid_samples.len(),
            n
        ));
    }

    let count = outputs.len() as f64;
    let mean = outputs.iter().sum::<f64>() / count;
    let variance = outputs.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / count;

    let mut sorted = outputs.clone();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let parameter_correlations = parameters
        .iter()
        .zip(&draws)
        .map(|(parameter, values)| {
            let paired: Vec<f64> = valid_indices.iter().map(|&i| values[i]).collect();
            ParameterCorrelation {
                parameter: parameter.to_string(),
                correlation: pearson(&paired, &outputs),
            }
        })
        .collect();

    log::debug!(
        "Monte Carlo {}: {} valid samples, mean {:.5}",
        M::METRIC,
        outputs.len(),
        mean
    );

    let output = MonteCarloOutput {
        metric: M::METRIC.to_string(),
        base_output,
        mean,
        std_dev: variance.sqrt(),
        p10: percentile_sorted(&sorted, 10.0),
        p25: percentile_sorted(&sorted, 25.0),
        p50: percentile_sorted(&sorted, 50.0),
        p75: percentile_sorted(&sorted, 75.0),
        p90: percentile_sorted(&sorted, 90.0),
        min: sorted[0],
        max: sorted[sorted.len() - 1],
        requested_samples: n,
        valid_samples: outputs.len(),
        invalid_samples,
        parameter_correlations,
        samples: input.keep_samples.then_some(outputs),
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Monte Carlo simulation (pre-drawn samples, population statistics)",
        &serde_json::json!({
            "metric": M::METRIC,
            "n_samples": n,
            "seed": input.seed,
            "parameters": input.distributions.iter().map(|d| &d.parameter).collect::<Vec<_>>(),
            "default_std_fraction": DEFAULT_STD_FRACTION,
            "default_bound_fraction": DEFAULT_BOUND_FRACTION,
            "parallel": cfg!(feature = "parallel"),
        }),
        warnings,
        elapsed,
        output,
    ))
}
