use clap::Args;
use serde_json::Value;

use levelized_cost_core::lcoe::calculate_lcoe;
use levelized_cost_core::lcos::calculate_lcos;
use levelized_cost_core::scenarios::{ScenarioBuilder, ScenarioTables};
use levelized_cost_core::{TechnologyType, UseCase};

use super::{parse_overrides, CostKind};
use crate::input;

/// Arguments for a scenario built from use case and region tables
#[derive(Args)]
#[command(allow_hyphen_values = true)]
pub struct ScenarioArgs {
    /// Metric to price
    #[arg(value_enum)]
    pub kind: CostKind,

    /// Customer segment: residential, commercial, utility
    #[arg(long, default_value = "residential")]
    pub use_case: UseCase,

    /// Region code (e.g. CA, TX)
    #[arg(long, default_value = "CA")]
    pub region: String,

    /// Technology tag; pv for lcoe and battery for lcos when omitted
    #[arg(long)]
    pub technology: Option<TechnologyType>,

    /// Set any parameter by path after the tables are applied
    #[arg(long = "set", value_name = "PATH=VALUE")]
    pub set: Vec<String>,

    /// Print the built engine input instead of pricing it
    #[arg(long)]
    pub build_only: bool,
}

/// Scenario builder over the built-in tables or a `--tables` file.
pub fn load_builder(tables: Option<&str>) -> Result<ScenarioBuilder, Box<dyn std::error::Error>> {
    match tables {
        Some(path) => {
            let tables: ScenarioTables = input::file::read_structured(path)?;
            log::info!(
                "Loaded {} regions from {} (default {})",
                tables.regions.len(),
                path,
                tables.default_region
            );
            Ok(ScenarioBuilder::new(tables)?)
        }
        None => Ok(ScenarioBuilder::default()),
    }
}

pub fn run_scenario(
    args: ScenarioArgs,
    tables: Option<&str>,
) -> Result<Value, Box<dyn std::error::Error>> {
    let builder = load_builder(tables)?;
    let overrides = parse_overrides(&args.set)?;

    match args.kind {
        CostKind::Lcoe => {
            let technology = args.technology.unwrap_or(TechnologyType::Pv);
            let built = builder.build_lcoe(args.use_case, &args.region, technology, &overrides)?;
            if args.build_only {
                return Ok(serde_json::to_value(built)?);
            }
            let mut priced = calculate_lcoe(&built.result)?;
            let mut warnings = built.warnings;
            warnings.append(&mut priced.warnings);
            priced.warnings = warnings;
            priced.methodology = format!("{}; {}", built.methodology, priced.methodology);
            Ok(serde_json::to_value(priced)?)
        }
        CostKind::Lcos => {
            let technology = args.technology.unwrap_or(TechnologyType::Battery);
            let built = builder.build_lcos(args.use_case, &args.region, technology, &overrides)?;
            if args.build_only {
                return Ok(serde_json::to_value(built)?);
            }
            let mut priced = calculate_lcos(&built.result)?;
            let mut warnings = built.warnings;
            warnings.append(&mut priced.warnings);
            priced.warnings = warnings;
            priced.methodology = format!("{}; {}", built.methodology, priced.methodology);
            Ok(serde_json::to_value(priced)?)
        }
    }
}
