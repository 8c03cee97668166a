use clap::Args;
use serde_json::Value;

use levelized_cost_core::lcoe::{self, LcoeInput};
use levelized_cost_core::parameters::apply_overrides;
use levelized_cost_core::TechnologyType;

use super::{parse_overrides, push_flag};
use crate::input;

/// Arguments for an LCOE calculation
#[derive(Args)]
#[command(allow_hyphen_values = true)]
pub struct LcoeArgs {
    /// Path to JSON/YAML input file (flags are applied on top)
    #[arg(long)]
    pub input: Option<String>,

    /// Generation technology: pv, wind, hydro, thermal
    #[arg(long)]
    pub technology: Option<TechnologyType>,

    /// Installed cost per kW
    #[arg(long)]
    pub capex_per_kw: Option<f64>,

    /// Nameplate capacity in kW
    #[arg(long)]
    pub system_size_kw: Option<f64>,

    /// First-year capacity factor (e.g. 0.22)
    #[arg(long)]
    pub capacity_factor: Option<f64>,

    /// Fixed O&M per kW-year
    #[arg(long)]
    pub fixed_om_per_kw_year: Option<f64>,

    /// Operating life in years
    #[arg(long)]
    pub lifetime: Option<u32>,

    /// Nominal discount rate
    #[arg(long)]
    pub discount_rate: Option<f64>,

    /// Set any parameter by path, e.g. financing.federal_itc=0.26
    #[arg(long = "set", value_name = "PATH=VALUE")]
    pub set: Vec<String>,
}

/// Resolve the base input plus flags into an engine input.
pub fn resolve_input(args: &LcoeArgs) -> Result<LcoeInput, Box<dyn std::error::Error>> {
    let mut base: LcoeInput = input::read_optional(args.input.as_deref())?.unwrap_or_default();
    if let Some(technology) = args.technology {
        base.technology = technology;
    }

    let mut overrides = parse_overrides(&args.set)?;
    push_flag(&mut overrides, "capex_per_kw", args.capex_per_kw);
    push_flag(&mut overrides, "system_size_kw", args.system_size_kw);
    push_flag(&mut overrides, "capacity_factor", args.capacity_factor);
    push_flag(&mut overrides, "fixed_om_per_kw_year", args.fixed_om_per_kw_year);
    push_flag(&mut overrides, "system_lifetime_years", args.lifetime.map(f64::from));
    push_flag(&mut overrides, "financing.discount_rate", args.discount_rate);

    Ok(apply_overrides(&base, &overrides)?)
}

pub fn run_lcoe(args: LcoeArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let lcoe_input = resolve_input(&args)?;
    log::debug!("LCOE input: {:?}", lcoe_input);
    let result = lcoe::calculate_lcoe(&lcoe_input)?;
    Ok(serde_json::to_value(result)?)
}
