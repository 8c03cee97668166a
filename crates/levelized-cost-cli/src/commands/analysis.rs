use clap::Args;
use serde::de::DeserializeOwned;
use serde_json::Value;

use levelized_cost_core::lcoe::{calculate_lcoe, LcoeInput};
use levelized_cost_core::lcos::{calculate_lcos, LcosInput};
use levelized_cost_core::monte_carlo::{
    self, DistributionKind, MonteCarloInput, MonteCarloOutput, ParameterDistribution,
};
use levelized_cost_core::sensitivity::{self, SensitivityInput};
use levelized_cost_core::{ComputationOutput, LevelizedCostModel, UncertaintyBand};

use super::CostKind;
use crate::input;

/// Arguments for one-at-a-time sensitivity analysis
#[derive(Args)]
pub struct SensitivityArgs {
    /// Metric to analyse
    #[arg(value_enum)]
    pub model: CostKind,

    /// Base case JSON/YAML file; engine defaults when omitted
    #[arg(long)]
    pub base: Option<String>,

    /// Parameter paths to vary (comma separated); model defaults when omitted
    #[arg(long, value_delimiter = ',')]
    pub parameters: Vec<String>,

    /// Relative step below and above each base value
    #[arg(long, default_value_t = 0.2)]
    pub variation: f64,

    /// Fail on the first parameter that cannot be analysed
    #[arg(long)]
    pub strict: bool,
}

/// Arguments for Monte Carlo uncertainty analysis
#[derive(Args)]
#[command(allow_hyphen_values = true)]
pub struct MonteCarloArgs {
    /// Metric to analyse
    #[arg(value_enum)]
    pub model: CostKind,

    /// Base case JSON/YAML file; engine defaults when omitted
    #[arg(long)]
    pub base: Option<String>,

    /// Simulation settings file (distributions, n_samples, seed)
    #[arg(long)]
    pub input: Option<String>,

    /// Uncertain parameter as path=kind[:a[:b[:c]]], e.g.
    /// capex_per_kw=normal:150 or cycle_life=triangular:3000:4000:5000
    #[arg(long, value_name = "PATH=KIND[:ARGS]")]
    pub vary: Vec<String>,

    /// Number of samples
    #[arg(long)]
    pub samples: Option<usize>,

    /// Seed for a reproducible run
    #[arg(long)]
    pub seed: Option<u64>,

    /// Return every valid sample output
    #[arg(long)]
    pub keep_samples: bool,

    /// Price the base case and attach the P10/P50/P90 band to it
    #[arg(long)]
    pub attach: bool,
}

fn read_base<M: DeserializeOwned + Default>(
    path: Option<&str>,
) -> Result<M, Box<dyn std::error::Error>> {
    match path {
        Some(path) => input::file::read_structured(path),
        None => Ok(M::default()),
    }
}

fn sensitivity_for<M>(args: &SensitivityArgs) -> Result<Value, Box<dyn std::error::Error>>
where
    M: LevelizedCostModel + DeserializeOwned + Default,
{
    let base: M = read_base(args.base.as_deref())?;
    let request = SensitivityInput {
        parameters: if args.parameters.is_empty() {
            None
        } else {
            Some(args.parameters.clone())
        },
        variation_fraction: args.variation,
        strict: args.strict,
    };
    let result = sensitivity::analyze_sensitivity(&base, &request)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_sensitivity(args: SensitivityArgs) -> Result<Value, Box<dyn std::error::Error>> {
    match args.model {
        CostKind::Lcoe => sensitivity_for::<LcoeInput>(&args),
        CostKind::Lcos => sensitivity_for::<LcosInput>(&args),
    }
}

/// Parse one `--vary` flag. Omitted or empty arguments fall back to
/// bounds derived from the base value.
pub fn parse_vary(spec: &str) -> Result<ParameterDistribution, Box<dyn std::error::Error>> {
    let (parameter, shape) = spec
        .split_once('=')
        .ok_or_else(|| format!("--vary must be path=kind[:args], got '{}'", spec))?;
    let mut parts = shape.split(':');
    let kind = parts.next().unwrap_or_default().trim().to_lowercase();
    let numbers: Vec<Option<f64>> = parts
        .map(|p| {
            let p = p.trim();
            if p.is_empty() {
                Ok(None)
            } else {
                p.parse::<f64>().map(Some)
            }
        })
        .collect::<Result<_, _>>()
        .map_err(|e| format!("--vary '{}': {}", spec, e))?;
    let arg = |i: usize| numbers.get(i).copied().flatten();

    let (expected, distribution) = match kind.as_str() {
        "normal" => (1, DistributionKind::Normal { std_dev: arg(0) }),
        "uniform" => (
            2,
            DistributionKind::Uniform {
                min: arg(0),
                max: arg(1),
            },
        ),
        "triangular" => (
            3,
            DistributionKind::Triangular {
                min: arg(0),
                mode: arg(1),
                max: arg(2),
            },
        ),
        other => {
            return Err(format!(
                "Unknown distribution '{}' (expected normal, uniform or triangular)",
                other
            )
            .into())
        }
    };
    if numbers.len() > expected {
        return Err(format!("--vary '{}': {} takes at most {} values", spec, kind, expected).into());
    }

    Ok(ParameterDistribution {
        parameter: parameter.trim().to_string(),
        base_value: None,
        distribution,
    })
}

fn simulation_input(args: &MonteCarloArgs) -> Result<MonteCarloInput, Box<dyn std::error::Error>> {
    let mut mc_input: MonteCarloInput = match input::read_optional(args.input.as_deref())? {
        Some(mc_input) => mc_input,
        None if !args.vary.is_empty() => MonteCarloInput {
            distributions: Vec::new(),
            n_samples: 10_000,
            seed: None,
            keep_samples: false,
        },
        None => {
            return Err("--input <file>, stdin or at least one --vary required for Monte Carlo".into())
        }
    };
    for spec in &args.vary {
        mc_input.distributions.push(parse_vary(spec)?);
    }
    if let Some(n) = args.samples {
        mc_input.n_samples = n;
    }
    if args.seed.is_some() {
        mc_input.seed = args.seed;
    }
    mc_input.keep_samples |= args.keep_samples;
    Ok(mc_input)
}

fn simulate<M>(
    args: &MonteCarloArgs,
    mc_input: &MonteCarloInput,
) -> Result<(M, ComputationOutput<MonteCarloOutput>), Box<dyn std::error::Error>>
where
    M: LevelizedCostModel + DeserializeOwned + Default + Sync,
    M::Parameter: Sync,
{
    let base: M = read_base(args.base.as_deref())?;
    log::info!(
        "Running {} samples over {} parameters",
        mc_input.n_samples,
        mc_input.distributions.len()
    );
    let result = monte_carlo::run_monte_carlo(&base, mc_input)?;
    Ok((base, result))
}

/// Fold the simulation's band and warnings into the priced base case.
fn attach_band<T: serde::Serialize>(
    mut priced: ComputationOutput<T>,
    mc: ComputationOutput<MonteCarloOutput>,
    with_band: impl FnOnce(T, UncertaintyBand) -> T,
) -> ComputationOutput<T> {
    priced.result = with_band(priced.result, UncertaintyBand::from(&mc.result));
    priced.methodology = format!(
        "{} with Monte Carlo band ({} valid samples)",
        priced.methodology, mc.result.valid_samples
    );
    priced.warnings.extend(mc.warnings);
    priced
}

pub fn run_monte_carlo(args: MonteCarloArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let mc_input = simulation_input(&args)?;
    match args.model {
        CostKind::Lcoe => {
            let (base, mc) = simulate::<LcoeInput>(&args, &mc_input)?;
            if args.attach {
                let priced = attach_band(calculate_lcoe(&base)?, mc, |r, band| {
                    r.with_uncertainty(band)
                });
                return Ok(serde_json::to_value(priced)?);
            }
            Ok(serde_json::to_value(mc)?)
        }
        CostKind::Lcos => {
            let (base, mc) = simulate::<LcosInput>(&args, &mc_input)?;
            if args.attach {
                let priced = attach_band(calculate_lcos(&base)?, mc, |r, band| {
                    r.with_uncertainty(band)
                });
                return Ok(serde_json::to_value(priced)?);
            }
            Ok(serde_json::to_value(mc)?)
        }
    }
}
