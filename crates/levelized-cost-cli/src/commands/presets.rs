use clap::Args;
use serde_json::Value;

use levelized_cost_core::presets::{
    self, SolarPlusStorageInput, SolarPreset, SolarProduct, StoragePreset, StorageProduct,
};
use levelized_cost_core::UseCase;

use super::parse_overrides;
use super::scenario::load_builder;
use crate::input;

/// Arguments for a storage product preset
#[derive(Args)]
#[command(allow_hyphen_values = true)]
pub struct StoragePresetArgs {
    /// Product: powerwall-3, powerwall-2, megapack
    #[arg(long, default_value = "powerwall-3")]
    pub product: StorageProduct,

    /// Number of units installed together
    #[arg(long, default_value_t = 1)]
    pub units: u32,

    /// Customer segment; the product's own segment when omitted
    #[arg(long)]
    pub use_case: Option<UseCase>,

    /// Full cycles per year
    #[arg(long)]
    pub cycles_per_year: Option<f64>,

    /// Set any LCOS parameter by path
    #[arg(long = "set", value_name = "PATH=VALUE")]
    pub set: Vec<String>,

    /// Path to a full preset request (flags are ignored)
    #[arg(long)]
    pub input: Option<String>,
}

/// Arguments for a solar product preset
#[derive(Args)]
#[command(allow_hyphen_values = true)]
pub struct SolarPresetArgs {
    /// Product: solar-panels, solar-roof
    #[arg(long, default_value = "solar-panels")]
    pub product: SolarProduct,

    /// System size in kW
    #[arg(long)]
    pub size_kw: Option<f64>,

    /// Region code for irradiance and cost adjustment
    #[arg(long)]
    pub region: Option<String>,

    /// Customer segment
    #[arg(long)]
    pub use_case: Option<UseCase>,

    /// Roof area in square feet (required for the solar roof)
    #[arg(long)]
    pub roof_area_sqft: Option<f64>,

    /// Set any LCOE parameter by path
    #[arg(long = "set", value_name = "PATH=VALUE")]
    pub set: Vec<String>,

    /// Path to a full preset request (flags are ignored)
    #[arg(long)]
    pub input: Option<String>,
}

/// Arguments for a solar-plus-storage bundle
#[derive(Args)]
#[command(allow_hyphen_values = true)]
pub struct SolarPlusStorageArgs {
    /// Solar array size in kW
    #[arg(long)]
    pub solar_kw: Option<f64>,

    /// Battery capacity in kWh, rounded down to whole Powerwall 3 units (at least one)
    #[arg(long)]
    pub battery_kwh: Option<f64>,

    /// Region code
    #[arg(long)]
    pub region: Option<String>,

    /// Customer segment
    #[arg(long)]
    pub use_case: Option<UseCase>,
}

pub fn run_storage_preset(args: StoragePresetArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let preset = match input::read_optional::<StoragePreset>(args.input.as_deref())? {
        Some(preset) => preset,
        None => {
            let mut preset = StoragePreset::new(args.product, args.units);
            preset.use_case = args.use_case;
            if let Some(cycles) = args.cycles_per_year {
                preset.cycles_per_year = cycles;
            }
            preset.overrides = parse_overrides(&args.set)?;
            preset
        }
    };
    let result = presets::calculate_storage_preset(&preset)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_solar_preset(
    args: SolarPresetArgs,
    tables: Option<&str>,
) -> Result<Value, Box<dyn std::error::Error>> {
    let preset = match input::read_optional::<SolarPreset>(args.input.as_deref())? {
        Some(preset) => preset,
        None => {
            let defaults = SolarPreset::default();
            SolarPreset {
                product: args.product,
                system_size_kw: args.size_kw.unwrap_or(defaults.system_size_kw),
                use_case: args.use_case.unwrap_or(defaults.use_case),
                region: args.region.unwrap_or(defaults.region),
                roof_area_sqft: args.roof_area_sqft,
                overrides: parse_overrides(&args.set)?,
                financing: defaults.financing,
            }
        }
    };
    let builder = load_builder(tables)?;
    let result = presets::calculate_solar_preset_with(&preset, &builder)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_solar_plus_storage(
    args: SolarPlusStorageArgs,
    tables: Option<&str>,
) -> Result<Value, Box<dyn std::error::Error>> {
    let defaults = SolarPlusStorageInput::default();
    let bundle = SolarPlusStorageInput {
        solar_kw: args.solar_kw.unwrap_or(defaults.solar_kw),
        battery_kwh: args.battery_kwh.unwrap_or(defaults.battery_kwh),
        region: args.region.unwrap_or(defaults.region),
        use_case: args.use_case.unwrap_or(defaults.use_case),
    };
    let builder = load_builder(tables)?;
    let result = presets::solar_plus_storage_with(&bundle, &builder)?;
    Ok(serde_json::to_value(result)?)
}
