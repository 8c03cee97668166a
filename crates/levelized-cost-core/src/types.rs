use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::LevelizedCostError;

/// Currency amounts (USD unless the caller states otherwise).
pub type Money = f64;

/// Rates expressed as fractions (0.05 = 5%). Never as percentages.
pub type Rate = f64;

/// Customer segment a scenario is sized for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UseCase {
    #[default]
    Residential,
    Commercial,
    Utility,
}

impl UseCase {
    pub const ALL: [UseCase; 3] = [UseCase::Residential, UseCase::Commercial, UseCase::Utility];

    pub fn as_str(&self) -> &'static str {
        match self {
            UseCase::Residential => "residential",
            UseCase::Commercial => "commercial",
            UseCase::Utility => "utility",
        }
    }
}

impl fmt::Display for UseCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UseCase {
    type Err = LevelizedCostError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        UseCase::ALL
            .into_iter()
            .find(|u| u.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                LevelizedCostError::invalid(
                    "use_case",
                    format!("Unknown use case '{s}' (expected residential, commercial or utility)"),
                )
            })
    }
}

/// Asset technology tag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TechnologyType {
    #[default]
    Pv,
    Battery,
    Wind,
    Hydro,
    Thermal,
}

impl TechnologyType {
    pub const ALL: [TechnologyType; 5] = [
        TechnologyType::Pv,
        TechnologyType::Battery,
        TechnologyType::Wind,
        TechnologyType::Hydro,
        TechnologyType::Thermal,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TechnologyType::Pv => "pv",
            TechnologyType::Battery => "battery",
            TechnologyType::Wind => "wind",
            TechnologyType::Hydro => "hydro",
            TechnologyType::Thermal => "thermal",
        }
    }
}

impl fmt::Display for TechnologyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TechnologyType {
    type Err = LevelizedCostError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TechnologyType::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                LevelizedCostError::invalid("technology", format!("Unknown technology '{s}'"))
            })
    }
}

/// Percentile band attached to a levelized cost once an uncertainty pass has run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct UncertaintyBand {
    pub p10: Option<f64>,
    pub p50: Option<f64>,
    pub p90: Option<f64>,
}

impl UncertaintyBand {
    pub fn is_populated(&self) -> bool {
        self.p10.is_some() && self.p50.is_some() && self.p90.is_some()
    }
}

/// Standard computation output envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationOutput<T: Serialize> {
    pub result: T,
    pub methodology: String,
    pub assumptions: serde_json::Value,
    pub warnings: Vec<String>,
    pub metadata: ComputationMetadata,
}

/// Metadata for every computation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationMetadata {
    pub version: String,
    pub computation_time_us: u64,
    pub precision: String,
}

/// Helper to wrap computation results with metadata
pub fn with_metadata<T: Serialize>(
    methodology: &str,
    assumptions: &impl Serialize,
    warnings: Vec<String>,
    elapsed_us: u64,
    result: T,
) -> ComputationOutput<T> {
    ComputationOutput {
        result,
        methodology: methodology.to_string(),
        assumptions: serde_json::to_value(assumptions).unwrap_or_default(),
        warnings,
        metadata: ComputationMetadata {
            version: env!("CARGO_PKG_VERSION").to_string(),
            computation_time_us: elapsed_us,
            precision: "ieee754_f64".to_string(),
        },
    }
}
