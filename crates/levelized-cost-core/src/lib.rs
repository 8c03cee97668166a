pub mod degradation;
pub mod error;
pub mod finance;
pub mod lcoe;
pub mod lcos;
pub mod load_profile;
pub mod parameters;
pub mod types;
pub mod units;

#[cfg(feature = "scenarios")]
pub mod scenarios;

#[cfg(feature = "presets")]
pub mod presets;

#[cfg(feature = "sensitivity")]
pub mod sensitivity;

#[cfg(feature = "monte_carlo")]
pub mod monte_carlo;

pub use error::LevelizedCostError;
pub use parameters::LevelizedCostModel;
pub use types::*;

/// Standard result type for all levelized-cost operations
pub type LevelizedCostResult<T> = Result<T, LevelizedCostError>;
