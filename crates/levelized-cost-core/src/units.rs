//! Physical unit constants and conversions.
//!
//! Engines work internally in kW, kWh and MWh. Quantities quoted in other
//! units are normalised here before they reach an input struct.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::LevelizedCostError;
use crate::LevelizedCostResult;

/// Hours in a non-leap year.
pub const HOURS_PER_YEAR: f64 = 8760.0;

/// kWh in one MWh.
pub const KWH_PER_MWH: f64 = 1000.0;

/// Annual MWh produced by 1 kW running flat out all year.
pub const MWH_PER_KW_YEAR: f64 = HOURS_PER_YEAR / KWH_PER_MWH;

/// Energy units, normalised to kWh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EnergyUnit {
    Wh,
    KWh,
    MWh,
    GWh,
    J,
    KJ,
    MJ,
    Btu,
    KBtu,
}

impl EnergyUnit {
    /// Multiplier converting one of this unit into kWh.
    pub fn to_kwh_factor(&self) -> f64 {
        match self {
            EnergyUnit::Wh => 0.001,
            EnergyUnit::KWh => 1.0,
            EnergyUnit::MWh => 1_000.0,
            EnergyUnit::GWh => 1_000_000.0,
            EnergyUnit::J => 2.78e-7,
            EnergyUnit::KJ => 2.78e-4,
            EnergyUnit::MJ => 0.278,
            EnergyUnit::Btu => 2.93e-4,
            EnergyUnit::KBtu => 0.293,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            EnergyUnit::Wh => "Wh",
            EnergyUnit::KWh => "kWh",
            EnergyUnit::MWh => "MWh",
            EnergyUnit::GWh => "GWh",
            EnergyUnit::J => "J",
            EnergyUnit::KJ => "kJ",
            EnergyUnit::MJ => "MJ",
            EnergyUnit::Btu => "BTU",
            EnergyUnit::KBtu => "kBTU",
        }
    }
}

impl fmt::Display for EnergyUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl FromStr for EnergyUnit {
    type Err = LevelizedCostError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let unit = match clean_unit(s).as_str() {
            "wh" | "watt-hour" | "watt-hours" => EnergyUnit::Wh,
            "kwh" | "kilowatt-hour" | "kilowatt-hours" => EnergyUnit::KWh,
            "mwh" | "megawatt-hour" | "megawatt-hours" => EnergyUnit::MWh,
            "gwh" | "gigawatt-hour" | "gigawatt-hours" => EnergyUnit::GWh,
            "j" | "joule" | "joules" => EnergyUnit::J,
            "kj" => EnergyUnit::KJ,
            "mj" => EnergyUnit::MJ,
            "btu" => EnergyUnit::Btu,
            "kbtu" => EnergyUnit::KBtu,
            _ => {
                return Err(LevelizedCostError::invalid(
                    "unit",
                    format!("Unknown energy unit '{s}'"),
                ))
            }
        };
        Ok(unit)
    }
}

/// Power units, normalised to kW.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PowerUnit {
    W,
    KW,
    MW,
    GW,
    Hp,
    BtuPerHour,
}

impl PowerUnit {
    /// Multiplier converting one of this unit into kW.
    pub fn to_kw_factor(&self) -> f64 {
        match self {
            PowerUnit::W => 0.001,
            PowerUnit::KW => 1.0,
            PowerUnit::MW => 1_000.0,
            PowerUnit::GW => 1_000_000.0,
            PowerUnit::Hp => 0.746,
            PowerUnit::BtuPerHour => 2.93e-4,
        }
    }
}

impl FromStr for PowerUnit {
    type Err = LevelizedCostError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let unit = match clean_unit(s).as_str() {
            "w" | "watt" | "watts" => PowerUnit::W,
            "kw" | "kilowatt" | "kilowatts" => PowerUnit::KW,
            "mw" | "megawatt" | "megawatts" => PowerUnit::MW,
            "gw" | "gigawatt" | "gigawatts" => PowerUnit::GW,
            "hp" | "horsepower" => PowerUnit::Hp,
            "btu/h" | "btu/hr" => PowerUnit::BtuPerHour,
            _ => {
                return Err(LevelizedCostError::invalid(
                    "unit",
                    format!("Unknown power unit '{s}'"),
                ))
            }
        };
        Ok(unit)
    }
}

fn clean_unit(s: &str) -> String {
    s.trim()
        .trim_start_matches('$')
        .trim_start_matches('/')
        .to_ascii_lowercase()
        .replace(' ', "")
}

/// Convert an energy quantity into kWh.
pub fn energy_to_kwh(value: f64, unit: EnergyUnit) -> f64 {
    value * unit.to_kwh_factor()
}

/// Convert a power quantity into kW.
pub fn power_to_kw(value: f64, unit: PowerUnit) -> f64 {
    value * unit.to_kw_factor()
}

/// Normalise a price quoted per energy unit (e.g. "$/MWh") into $/kWh.
pub fn price_per_kwh(price: f64, unit: &str) -> LevelizedCostResult<f64> {
    let unit: EnergyUnit = unit.parse()?;
    Ok(price / unit.to_kwh_factor())
}

/// Normalise a price quoted per power unit (e.g. "$/MW") into $/kW.
pub fn price_per_kw(price: f64, unit: &str) -> LevelizedCostResult<f64> {
    let unit: PowerUnit = unit.parse()?;
    Ok(price / unit.to_kw_factor())
}

/// Convert a $/kWh energy cost into an equivalent $/kW-year cost at a given
/// capacity factor.
pub fn energy_cost_to_power_cost(cost_per_kwh: f64, capacity_factor: f64) -> f64 {
    cost_per_kwh * HOURS_PER_YEAR * capacity_factor
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mwh_per_kw_year() {
        assert!((MWH_PER_KW_YEAR - 8.76).abs() < 1e-12);
    }

    #[test]
    fn test_energy_aliases() {
        assert_eq!("MWh".parse::<EnergyUnit>().unwrap(), EnergyUnit::MWh);
        assert_eq!(" kilowatt-hours ".parse::<EnergyUnit>().unwrap(), EnergyUnit::KWh);
        assert!("furlong".parse::<EnergyUnit>().is_err());
    }

    #[test]
    fn test_price_per_mwh_to_kwh() {
        let p = price_per_kwh(45.0, "/MWh").unwrap();
        assert!((p - 0.045).abs() < 1e-12);
        assert_eq!(price_per_kwh(45.0, "$/MWh").unwrap(), p);
    }

    #[test]
    fn test_power_conversion() {
        assert!((power_to_kw(2.5, PowerUnit::MW) - 2_500.0).abs() < 1e-9);
        assert!((price_per_kw(1_500_000.0, "MW").unwrap() - 1_500.0).abs() < 1e-9);
    }

    #[test]
    fn test_energy_cost_to_power_cost() {
        // 0.10 $/kWh at 25% CF => 219 $/kW-yr
        assert!((energy_cost_to_power_cost(0.10, 0.25) - 219.0).abs() < 1e-9);
    }
}
