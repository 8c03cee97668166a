use clap::Args;
use serde_json::Value;

use levelized_cost_core::lcos::{self, LcosInput};
use levelized_cost_core::parameters::apply_overrides;

use super::{parse_overrides, push_flag};
use crate::input;

/// Arguments for an LCOS calculation
#[derive(Args)]
#[command(allow_hyphen_values = true)]
pub struct LcosArgs {
    /// Path to JSON/YAML input file (flags are applied on top)
    #[arg(long)]
    pub input: Option<String>,

    /// Installed cost per kWh
    #[arg(long)]
    pub capex_per_kwh: Option<f64>,

    /// Energy capacity in kWh
    #[arg(long)]
    pub system_size_kwh: Option<f64>,

    /// Inverter rating in kW
    #[arg(long)]
    pub power_rating_kw: Option<f64>,

    /// Round-trip efficiency when new
    #[arg(long, alias = "rte")]
    pub round_trip_efficiency: Option<f64>,

    /// Full cycles per year
    #[arg(long)]
    pub cycles_per_year: Option<f64>,

    /// Rated cycle life
    #[arg(long)]
    pub cycle_life: Option<u32>,

    /// Calendar life in years
    #[arg(long)]
    pub calendar_life: Option<u32>,

    /// Nominal discount rate
    #[arg(long)]
    pub discount_rate: Option<f64>,

    /// Set any parameter by path, e.g. depth_of_discharge=0.95
    #[arg(long = "set", value_name = "PATH=VALUE")]
    pub set: Vec<String>,
}

pub fn resolve_input(args: &LcosArgs) -> Result<LcosInput, Box<dyn std::error::Error>> {
    let base: LcosInput = input::read_optional(args.input.as_deref())?.unwrap_or_default();

    let mut overrides = parse_overrides(&args.set)?;
    push_flag(&mut overrides, "capex_per_kwh", args.capex_per_kwh);
    push_flag(&mut overrides, "system_size_kwh", args.system_size_kwh);
    push_flag(&mut overrides, "power_rating_kw", args.power_rating_kw);
    push_flag(&mut overrides, "round_trip_efficiency", args.round_trip_efficiency);
    push_flag(&mut overrides, "cycles_per_year", args.cycles_per_year);
    push_flag(&mut overrides, "cycle_life", args.cycle_life.map(f64::from));
    push_flag(&mut overrides, "calendar_life_years", args.calendar_life.map(f64::from));
    push_flag(&mut overrides, "financing.discount_rate", args.discount_rate);

    Ok(apply_overrides(&base, &overrides)?)
}

pub fn run_lcos(args: LcosArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let lcos_input = resolve_input(&args)?;
    log::debug!("LCOS input: {:?}", lcos_input);
    let result = lcos::calculate_lcos(&lcos_input)?;
    Ok(serde_json::to_value(result)?)
}
