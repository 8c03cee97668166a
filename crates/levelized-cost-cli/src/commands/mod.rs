pub mod analysis;
pub mod convert;
pub mod lcoe;
pub mod lcos;
pub mod presets;
pub mod scenario;

use clap::ValueEnum;
use std::collections::BTreeMap;

/// Which levelized cost metric a command works on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CostKind {
    /// Levelized cost of energy (generation)
    Lcoe,
    /// Levelized cost of storage
    Lcos,
}

/// Parse repeated `--set path=value` flags into an override map.
pub fn parse_overrides(pairs: &[String]) -> Result<BTreeMap<String, f64>, Box<dyn std::error::Error>> {
    let mut overrides = BTreeMap::new();
    for pair in pairs {
        let (path, value) = pair
            .split_once('=')
            .ok_or_else(|| format!("Override must be path=value, got '{}'", pair))?;
        let value: f64 = value
            .trim()
            .parse()
            .map_err(|e| format!("Override '{}': {}", pair, e))?;
        overrides.insert(path.trim().to_string(), value);
    }
    Ok(overrides)
}

/// Add a flag's value to the override map under its parameter path.
pub fn push_flag(overrides: &mut BTreeMap<String, f64>, path: &str, value: Option<f64>) {
    if let Some(v) = value {
        overrides.insert(path.to_string(), v);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_overrides() {
        let parsed = parse_overrides(&[
            "capex_per_kw=1800".to_string(),
            " financing.discount_rate = 0.06".to_string(),
        ])
        .unwrap();
        assert_eq!(parsed["capex_per_kw"], 1800.0);
        assert_eq!(parsed["financing.discount_rate"], 0.06);
    }

    #[test]
    fn test_parse_overrides_rejects_malformed() {
        assert!(parse_overrides(&["capex_per_kw".to_string()]).is_err());
        assert!(parse_overrides(&["capex_per_kw=cheap".to_string()]).is_err());
    }

    #[test]
    fn test_push_flag_skips_absent() {
        let mut overrides = BTreeMap::new();
        push_flag(&mut overrides, "capacity_factor", None);
        push_flag(&mut overrides, "capex_per_kw", Some(1200.0));
        assert_eq!(overrides.len(), 1);
    }
}
