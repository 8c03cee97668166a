mod commands;
mod input;
mod logging;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::process;

use commands::analysis::{MonteCarloArgs, SensitivityArgs};
use commands::convert::ConvertArgs;
use commands::lcoe::LcoeArgs;
use commands::lcos::LcosArgs;
use commands::presets::{SolarPlusStorageArgs, SolarPresetArgs, StoragePresetArgs};
use commands::scenario::ScenarioArgs;

/// Levelized cost of energy and storage
#[derive(Parser)]
#[command(
    name = "lcx",
    version,
    about = "Levelized cost of energy and storage calculations",
    long_about = "A CLI for levelized cost of energy (LCOE) and storage (LCOS) \
                  calculations. Supports direct inputs, use case and regional \
                  scenarios, product presets, sensitivity and Monte Carlo analysis."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, default_value = "json", global = true)]
    output: OutputFormat,

    /// Replacement regional and use case tables (JSON or YAML); read by
    /// scenario, solar-preset and solar-plus-storage
    #[arg(long, global = true)]
    tables: Option<String>,

    /// Log debug detail to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Levelized cost of energy for a generation asset
    Lcoe(LcoeArgs),
    /// Levelized cost of storage for a battery
    Lcos(LcosArgs),
    /// Build and price a scenario from use case and region tables
    Scenario(ScenarioArgs),
    /// One-at-a-time sensitivity of the levelized cost
    Sensitivity(SensitivityArgs),
    /// Monte Carlo distribution of the levelized cost
    MonteCarlo(MonteCarloArgs),
    /// LCOS for a storage product preset
    StoragePreset(StoragePresetArgs),
    /// LCOE for a solar product preset
    SolarPreset(SolarPresetArgs),
    /// Solar panels paired with Powerwall storage
    SolarPlusStorage(SolarPlusStorageArgs),
    /// Normalise energy, power and price units
    Convert(ConvertArgs),
    /// Print version information
    Version,
}

impl Commands {
    /// Whether the command reads the regional tables.
    fn uses_tables(&self) -> bool {
        matches!(
            self,
            Commands::Scenario(_) | Commands::SolarPreset(_) | Commands::SolarPlusStorage(_)
        )
    }
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Csv,
    Minimal,
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = logging::init(cli.verbose) {
        eprintln!("{}: {}", "error".red().bold(), e);
        process::exit(1);
    }

    if cli.tables.is_some() && !cli.command.uses_tables() {
        eprintln!(
            "{}: --tables only applies to scenario, solar-preset and solar-plus-storage",
            "error".red().bold()
        );
        process::exit(2);
    }

    let tables = cli.tables.as_deref();
    let result: Result<serde_json::Value, Box<dyn std::error::Error>> = match cli.command {
        Commands::Lcoe(args) => commands::lcoe::run_lcoe(args),
        Commands::Lcos(args) => commands::lcos::run_lcos(args),
        Commands::Scenario(args) => commands::scenario::run_scenario(args, tables),
        Commands::Sensitivity(args) => commands::analysis::run_sensitivity(args),
        Commands::MonteCarlo(args) => commands::analysis::run_monte_carlo(args),
        Commands::StoragePreset(args) => commands::presets::run_storage_preset(args),
        Commands::SolarPreset(args) => commands::presets::run_solar_preset(args, tables),
        Commands::SolarPlusStorage(args) => {
            commands::presets::run_solar_plus_storage(args, tables)
        }
        Commands::Convert(args) => commands::convert::run_convert(args),
        Commands::Version => {
            println!("lcx {}", env!("CARGO_PKG_VERSION"));
            return;
        }
    };

    match result {
        Ok(value) => {
            output::format_output(&cli.output, &value);
            process::exit(0);
        }
        Err(e) => {
            log::debug!("command failed: {:?}", e);
            eprintln!("{}: {}", "error".red().bold(), e);
            process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap()
    }

    #[test]
    fn test_tables_flag_scope() {
        for command in [&["scenario", "lcoe"][..], &["solar-preset"], &["solar-plus-storage"]] {
            let mut args = vec!["lcx", "--tables", "t.json"];
            args.extend_from_slice(command);
            assert!(parse(&args).command.uses_tables(), "{command:?}");
        }
        for command in ["lcoe", "lcos", "storage-preset", "version"] {
            let cli = parse(&["lcx", "--tables", "t.json", command]);
            assert!(cli.tables.is_some());
            assert!(!cli.command.uses_tables(), "{command}");
        }
    }
}
