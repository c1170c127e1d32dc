//! Command-line argument parsing for the orbital server.

use std::path::PathBuf;

use clap::Parser;
use orbis_orbital::TimeDilation;

use crate::Config;

/// Orbital server command-line arguments.
///
/// CLI values override settings loaded from `config.ron`.
#[derive(Parser, Debug, Default)]
#[command(name = "orbis", about = "Orbital simulation server")]
pub struct CliArgs {
    /// Log level (error, warn, info, debug, trace).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Simulation ticks per real second.
    #[arg(long)]
    pub tick_rate: Option<u32>,

    /// Seconds before a finished trajectory is force-completed.
    #[arg(long, value_parser = parse_gc_delay)]
    pub gc_delay: Option<f64>,

    /// Area catalog file (RON).
    #[arg(long)]
    pub catalog: Option<PathBuf>,

    /// Path to config directory (overrides default location).
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Stop after this many ticks (runs until interrupted otherwise).
    #[arg(long)]
    pub ticks: Option<u64>,

    /// Time dilation: normal, level1, level2 or level3.
    #[arg(long, value_parser = parse_dilation)]
    pub dilation: Option<TimeDilation>,

    /// Skip ahead to the next arrival once the fleet is set up.
    #[arg(long)]
    pub fast_forward: bool,
}

/// Parses a garbage-collection delay: a finite, non-negative number of seconds.
pub fn parse_gc_delay(value: &str) -> Result<f64, String> {
    let delay: f64 = value
        .parse()
        .map_err(|e| format!("invalid delay '{value}': {e}"))?;
    if !delay.is_finite() || delay < 0.0 {
        return Err(format!(
            "delay must be a finite number of seconds >= 0, got '{value}'"
        ));
    }
    Ok(delay)
}

/// Parses a dilation name, case-insensitively.
pub fn parse_dilation(value: &str) -> Result<TimeDilation, String> {
    match value.to_ascii_lowercase().as_str() {
        "normal" | "0" => Ok(TimeDilation::Normal),
        "level1" | "1" => Ok(TimeDilation::Level1),
        "level2" | "2" => Ok(TimeDilation::Level2),
        "level3" | "3" => Ok(TimeDilation::Level3),
        other => Err(format!(
            "unknown time dilation '{other}' (expected normal, level1, level2 or level3)"
        )),
    }
}

impl Config {
    /// Apply CLI overrides to a loaded config.
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        if let Some(ref level) = args.log_level {
            self.debug.log_level = level.clone();
        }
        if let Some(rate) = args.tick_rate {
            self.simulation.tick_rate = rate;
        }
        if let Some(delay) = args.gc_delay {
            self.simulation.orbit_gc_delay_secs = delay;
        }
        if let Some(ref path) = args.catalog {
            self.catalog.path = Some(path.clone());
        }
        if let Some(dilation) = args.dilation {
            self.simulation.time_dilation = dilation;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_override() {
        let mut config = Config::default();
        let args = CliArgs {
            tick_rate: Some(30),
            catalog: Some(PathBuf::from("belt.ron")),
            dilation: Some(TimeDilation::Level3),
            ..Default::default()
        };
        config.apply_cli_overrides(&args);
        assert_eq!(config.simulation.tick_rate, 30);
        assert_eq!(config.catalog.path, Some(PathBuf::from("belt.ron")));
        assert_eq!(config.simulation.time_dilation, TimeDilation::Level3);
        // Non-overridden fields retain defaults
        assert_eq!(config.simulation.orbit_gc_delay_secs, 30.0);
        assert_eq!(config.debug.log_level, "info");
    }

    #[test]
    fn test_cli_no_override() {
        let original = Config::default();
        let mut config = Config::default();
        config.apply_cli_overrides(&CliArgs::default());
        assert_eq!(config, original);
    }

    #[test]
    fn test_parse_from_command_line() {
        let args = CliArgs::parse_from([
            "orbis",
            "--gc-delay",
            "5",
            "--dilation",
            "Level1",
            "--ticks",
            "120",
            "--log-level",
            "debug",
        ]);
        assert_eq!(args.gc_delay, Some(5.0));
        assert_eq!(args.dilation, Some(TimeDilation::Level1));
        assert_eq!(args.ticks, Some(120));
        assert_eq!(args.log_level.as_deref(), Some("debug"));

        assert!(CliArgs::try_parse_from(["orbis", "--dilation", "warp"]).is_err());
    }

    #[test]
    fn test_parse_gc_delay() {
        assert_eq!(parse_gc_delay("0"), Ok(0.0));
        assert_eq!(parse_gc_delay("42.5"), Ok(42.5));
        assert!(parse_gc_delay("-1").is_err());
        assert!(parse_gc_delay("NaN").is_err());
        assert!(parse_gc_delay("inf").is_err());
        assert!(parse_gc_delay("soon").is_err());

        assert!(CliArgs::try_parse_from(["orbis", "--gc-delay=-5"]).is_err());
        let args = CliArgs::parse_from(["orbis", "--fast-forward"]);
        assert!(args.fast_forward);
    }

    #[test]
    fn test_parse_dilation() {
        assert_eq!(parse_dilation("normal"), Ok(TimeDilation::Normal));
        assert_eq!(parse_dilation("2"), Ok(TimeDilation::Level2));
        assert!(parse_dilation("fast").is_err());
    }
}
