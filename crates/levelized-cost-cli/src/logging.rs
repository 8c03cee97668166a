//! Logger set-up for the `lcx` binary.
//!
//! All log records go to stderr so that stdout only ever carries the
//! formatted result. The level comes from `--verbose`, then the
//! `LCX_LOG_LEVEL` environment variable, then [`DEFAULT_LOG_LEVEL`].
use fern::colors::{Color, ColoredLevelConfig};
use fern::{Dispatch, FormatCallback};
use log::{LevelFilter, Record};
use std::env;
use std::fmt::{Arguments, Display};

/// Environment variable holding the requested log level.
pub const LOG_LEVEL_ENV: &str = "LCX_LOG_LEVEL";

/// Level used when neither `--verbose` nor the environment asks for one.
const DEFAULT_LOG_LEVEL: &str = "warn";

/// Parse a level name as accepted in `LCX_LOG_LEVEL`.
pub fn parse_level(level: &str) -> Result<LevelFilter, String> {
    match level.trim().to_lowercase().as_str() {
        "off" => Ok(LevelFilter::Off),
        "error" => Ok(LevelFilter::Error),
        "warn" => Ok(LevelFilter::Warn),
        "info" => Ok(LevelFilter::Info),
        "debug" => Ok(LevelFilter::Debug),
        "trace" => Ok(LevelFilter::Trace),
        unknown => Err(format!("Unknown log level: {}", unknown)),
    }
}

/// Install the global logger.
pub fn init(verbose: bool) -> Result<(), Box<dyn std::error::Error>> {
    let log_level = if verbose {
        LevelFilter::Debug
    } else {
        let requested = env::var(LOG_LEVEL_ENV).unwrap_or_else(|_| DEFAULT_LOG_LEVEL.to_string());
        parse_level(&requested)?
    };

    let colours = ColoredLevelConfig::new()
        .error(Color::Red)
        .warn(Color::Yellow)
        .info(Color::Green)
        .debug(Color::Blue)
        .trace(Color::Magenta);
    let use_colour = atty::is(atty::Stream::Stderr);

    Dispatch::new()
        .format(move |out, message, record| {
            write_log_colour(out, message, record, use_colour, &colours);
        })
        .level(log_level)
        .chain(std::io::stderr())
        .apply()?;

    Ok(())
}

fn write_log<T: Display>(out: FormatCallback, level: T, target: &str, message: &Arguments) {
    out.finish(format_args!("[{level} {target}] {message}"));
}

fn write_log_colour(
    out: FormatCallback,
    message: &Arguments,
    record: &Record,
    use_colour: bool,
    colours: &ColoredLevelConfig,
) {
    if use_colour {
        write_log(out, colours.color(record.level()), record.target(), message);
    } else {
        write_log(out, record.level(), record.target(), message);
    }
}
