//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser};
use softplc_traits::Tunings;
use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(
    name = "softplc",
    version,
    about = "Soft PLC: Modbus register surface bridged to a PID tank-level loop"
)]
pub struct Cli {
    /// Plant (simulator) address: IPv4 literal or `localhost`
    #[arg(value_name = "PLANT_ADDR", value_parser = parse_host)]
    pub plant_addr: Option<String>,

    /// Local register server bind address: IPv4 literal or `localhost`
    #[arg(value_name = "SERVER_ADDR", value_parser = parse_host)]
    pub server_addr: Option<String>,

    /// Plant port (overrides plant.port)
    #[arg(long, value_name = "PORT")]
    pub plant_port: Option<u16>,

    /// Register server port (overrides server.port)
    #[arg(long, value_name = "PORT")]
    pub server_port: Option<u16>,

    /// PID gains KP,KI,KD in the regulator's sign (overrides [pid])
    #[arg(long, value_name = "KP,KI,KD", value_parser = parse_tunings, allow_hyphen_values = true)]
    pub tunings: Option<Tunings>,

    /// Path to config TOML; defaults are used when the default path is absent
    #[arg(long, value_name = "FILE", default_value = "etc/softplc.toml")]
    pub config: PathBuf,

    /// Log as JSON lines instead of pretty
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace); RUST_LOG wins when set
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Drive the in-process simulated tank instead of a network plant
    #[arg(long, action = ArgAction::SetTrue)]
    pub sim: bool,

    /// Unattended run: stop once the level has been flat past the stop timeout
    #[arg(long, action = ArgAction::SetTrue)]
    pub batch: bool,
}

/// Accept an IPv4 literal or `localhost`.
pub fn parse_host(s: &str) -> Result<String, String> {
    if s.eq_ignore_ascii_case("localhost") || s.parse::<Ipv4Addr>().is_ok() {
        Ok(s.to_string())
    } else {
        Err(format!("invalid address '{s}': expected an IPv4 address or 'localhost'"))
    }
}

pub fn parse_tunings(s: &str) -> Result<Tunings, String> {
    let parts: Vec<&str> = s.split(',').map(str::trim).collect();
    let [kp, ki, kd] = parts[..] else {
        return Err(format!("expected KP,KI,KD, got '{s}'"));
    };
    let num = |name: &str, v: &str| -> Result<f64, String> {
        v.parse::<f64>()
            .ok()
            .filter(|x| x.is_finite())
            .ok_or_else(|| format!("{name} must be a finite number, got '{v}'"))
    };
    Ok(Tunings::new(num("KP", kp)?, num("KI", ki)?, num("KD", kd)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hosts_are_ipv4_or_localhost() {
        assert!(parse_host("127.0.0.1").is_ok());
        assert!(parse_host("LOCALHOST").is_ok());
        assert!(parse_host("::1").is_err());
        assert!(parse_host("plant.example").is_err());
        assert!(parse_host("300.1.1.1").is_err());
    }

    #[test]
    fn tunings_parse_with_signs_and_spaces() {
        let t = parse_tunings("-12.5, -1.25,0").unwrap();
        assert_eq!(t, Tunings::new(-12.5, -1.25, 0.0));
        assert!(parse_tunings("1,2").is_err());
        assert!(parse_tunings("1,x,3").is_err());
        assert!(parse_tunings("1,NaN,3").is_err());
    }

    #[test]
    fn positional_addresses_are_optional() {
        let cli = Cli::try_parse_from(["softplc", "--sim"]).unwrap();
        assert!(cli.plant_addr.is_none());
        let cli = Cli::try_parse_from(["softplc", "localhost", "0.0.0.0", "--batch"]).unwrap();
        assert_eq!(cli.server_addr.as_deref(), Some("0.0.0.0"));
        assert!(cli.batch);
    }
}
