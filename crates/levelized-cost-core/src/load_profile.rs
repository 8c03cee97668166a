use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

use crate::units::HOURS_PER_YEAR;

/// Site demand a storage system is sized against.
///
/// The levelized cost engines do not read it; product sizing and reporting do.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadProfile {
    pub annual_energy_kwh: f64,
    pub peak_demand_kw: f64,
    /// Average load over peak load
    pub load_factor: f64,
    /// Amplitude of the seasonal swing (0.2 = ±20%)
    pub seasonal_variation: f64,
    /// Explicit hourly loads in kW; replaces the synthetic shape when present
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hourly_profile: Option<Vec<f64>>,
}

impl Default for LoadProfile {
    fn default() -> Self {
        LoadProfile {
            annual_energy_kwh: 10_000.0,
            peak_demand_kw: 5.0,
            load_factor: 0.3,
            seasonal_variation: 0.2,
            hourly_profile: None,
        }
    }
}

impl LoadProfile {
    /// 8760-hour load shape in kW.
    ///
    /// The synthetic shape peaks in the evening and swings seasonally around
    /// the flat average `annual_energy_kwh / 8760`.
    pub fn hourly_load_profile(&self) -> Vec<f64> {
        if let Some(profile) = &self.hourly_profile {
            return profile.clone();
        }

        let base_load = self.annual_energy_kwh / HOURS_PER_YEAR;
        (0..HOURS_PER_YEAR as usize)
            .map(|h| {
                let hour = h as f64;
                let hour_of_day = (h % 24) as f64;
                let daily = 0.8 + 0.4 * (2.0 * PI * (hour_of_day - 18.0) / 24.0).sin();
                let seasonal = 1.0 + self.seasonal_variation * (2.0 * PI * hour / HOURS_PER_YEAR).sin();
                base_load * daily * seasonal
            })
            .collect()
    }

    /// Highest hourly load of the profile.
    pub fn profile_peak_kw(&self) -> f64 {
        self.hourly_load_profile()
            .into_iter()
            .fold(0.0, f64::max)
    }
}
