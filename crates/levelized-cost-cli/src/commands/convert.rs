use clap::{Args, ValueEnum};
use serde_json::{json, Value};

use levelized_cost_core::units::{self, EnergyUnit, PowerUnit};

/// Kind of quantity being normalised
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum Quantity {
    /// Energy into kWh
    Energy,
    /// Power into kW
    Power,
    /// Price per energy unit into $/kWh
    EnergyPrice,
    /// Price per power unit into $/kW
    PowerPrice,
}

/// Arguments for unit normalisation
#[derive(Args)]
#[command(allow_hyphen_values = true)]
pub struct ConvertArgs {
    #[arg(value_enum)]
    pub quantity: Quantity,

    /// Value to convert
    pub value: f64,

    /// Unit the value is quoted in (e.g. MWh, MW, hp, BTU)
    pub unit: String,

    /// For energy prices, also report the $/kW-year equivalent at this capacity factor
    #[arg(long)]
    pub capacity_factor: Option<f64>,
}

pub fn run_convert(args: ConvertArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let value = match args.quantity {
        Quantity::Energy => {
            let unit: EnergyUnit = args.unit.parse()?;
            json!({
                "input": args.value,
                "unit": unit.symbol(),
                "kwh": units::energy_to_kwh(args.value, unit),
            })
        }
        Quantity::Power => {
            let unit: PowerUnit = args.unit.parse()?;
            json!({
                "input": args.value,
                "unit": args.unit,
                "kw": units::power_to_kw(args.value, unit),
            })
        }
        Quantity::EnergyPrice => {
            let per_kwh = units::price_per_kwh(args.value, &args.unit)?;
            let mut out = json!({
                "input": args.value,
                "unit": args.unit,
                "usd_per_kwh": per_kwh,
            });
            if let Some(cf) = args.capacity_factor {
                out["usd_per_kw_year"] = json!(units::energy_cost_to_power_cost(per_kwh, cf));
            }
            out
        }
        Quantity::PowerPrice => json!({
            "input": args.value,
            "unit": args.unit,
            "usd_per_kw": units::price_per_kw(args.value, &args.unit)?,
        }),
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn convert(quantity: Quantity, value: f64, unit: &str) -> Value {
        run_convert(ConvertArgs {
            quantity,
            value,
            unit: unit.to_string(),
            capacity_factor: Some(0.25),
        })
        .unwrap()
    }

    #[test]
    fn test_energy_to_kwh() {
        assert_eq!(convert(Quantity::Energy, 2.0, "MWh")["kwh"], json!(2000.0));
    }

    #[test]
    fn test_price_per_mwh_to_kwh() {
        let out = convert(Quantity::EnergyPrice, 50.0, "$/MWh");
        assert_eq!(out["usd_per_kwh"], json!(0.05));
        assert!(out["usd_per_kw_year"].is_number());
    }

    #[test]
    fn test_unknown_unit_is_error() {
        let err = run_convert(ConvertArgs {
            quantity: Quantity::Power,
            value: 1.0,
            unit: "furlongs".to_string(),
            capacity_factor: None,
        });
        assert!(err.is_err());
    }
}
