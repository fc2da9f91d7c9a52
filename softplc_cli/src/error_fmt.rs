//! Human-readable error descriptions, stable exit codes and structured JSON
//! error formatting.

use softplc_core::error::{BuildError, PlcError};
use softplc_plant::PlantError;

pub const EXIT_GENERIC: i32 = 1;
pub const EXIT_CONNECT: i32 = 3;
pub const EXIT_LOG: i32 = 4;
pub const EXIT_CONFIG: i32 = 5;

/// Marker wrapped around configuration load/validation failures so the exit
/// code survives `wrap_err` context.
#[derive(Debug, thiserror::Error)]
#[error("invalid configuration: {0}")]
pub struct ConfigError(pub String);

fn is_snapshot_log_failure(err: &eyre::Report) -> bool {
    if matches!(err.downcast_ref::<PlcError>(), Some(PlcError::Log(_))) {
        return true;
    }
    err.chain()
        .any(|c| c.to_string().contains("snapshot log") || c.to_string().contains("log directory"))
}

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    if let Some(ce) = err.downcast_ref::<ConfigError>() {
        return format!(
            "What happened: {ce}.\nLikely causes: Missing or out-of-range values in the TOML.\nHow to fix: Edit the config file (see etc/softplc.toml), then rerun."
        );
    }

    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::MissingPlant => {
                "What happened: No plant connection was provided to the control loop.\nLikely causes: The plant failed to connect or was not wired into the builder.\nHow to fix: Check the plant address/port or run with --sim.".to_string()
            }
            BuildError::MissingContext => {
                "What happened: The control loop has no shared register context.\nLikely causes: Internal wiring error.\nHow to fix: Report a bug with the log output.".to_string()
            }
            BuildError::InvalidConfig(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Out-of-range control or PID values.\nHow to fix: Edit [control]/[pid]/[stability] in the config or the --tunings override."
            ),
        };
    }

    if let Some(pe) = err.downcast_ref::<PlantError>() {
        return format!(
            "What happened: Could not reach the plant ({pe}).\nLikely causes: Simulator not running, wrong address or port, or a firewall.\nHow to fix: Start the plant simulator, check PLANT_ADDR/--plant-port, or run with --sim."
        );
    }

    if is_snapshot_log_failure(err) {
        return format!(
            "What happened: Writing the snapshot CSV log failed ({err}).\nLikely causes: Directory not writable or disk full.\nHow to fix: Check logging.csv_dir permissions and free space."
        );
    }

    let msg = err.to_string();
    let lower = msg.to_ascii_lowercase();
    if lower.contains("bind register server") {
        return format!(
            "What happened: The register server could not bind ({msg}).\nLikely causes: Port already in use or a privileged port without rights.\nHow to fix: Pick another --server-port or stop the other process."
        );
    }

    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

/// Stable exit codes: 3 plant connection, 4 snapshot log, 5 configuration,
/// 1 anything else. Usage errors (2) are reported by clap before this runs.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    if err.downcast_ref::<ConfigError>().is_some() || err.downcast_ref::<BuildError>().is_some() {
        return EXIT_CONFIG;
    }
    if err.downcast_ref::<PlantError>().is_some() {
        return EXIT_CONNECT;
    }
    if is_snapshot_log_failure(err) {
        return EXIT_LOG;
    }
    EXIT_GENERIC
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    use serde_json::json;
    let reason = match exit_code_for_error(err) {
        EXIT_CONFIG => "Config",
        EXIT_CONNECT => "PlantConnect",
        EXIT_LOG => "SnapshotLog",
        _ => "Error",
    };
    json!({
        "reason": reason,
        "exit_code": exit_code_for_error(err),
        "message": humanize(err),
    })
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plant_connect_failure_maps_to_three() {
        let e = PlantError::Connect {
            addr: "127.0.0.1:1".into(),
            source: std::io::Error::from(std::io::ErrorKind::ConnectionRefused),
        };
        let report = eyre::Report::new(e);
        assert_eq!(exit_code_for_error(&report), EXIT_CONNECT);
        assert!(humanize(&report).contains("--sim"));
    }

    #[test]
    fn log_failure_maps_to_four() {
        let report = eyre::Report::new(PlcError::Log("disk full".into()));
        assert_eq!(exit_code_for_error(&report), EXIT_LOG);
    }

    #[test]
    fn config_errors_keep_their_code_under_context() {
        use eyre::WrapErr;
        let report: eyre::Result<()> = Err(eyre::Report::new(ConfigError("x".into())));
        let report = report.wrap_err("loading").unwrap_err();
        assert_eq!(exit_code_for_error(&report), EXIT_CONFIG);
    }

    #[test]
    fn json_error_carries_reason_and_code() {
        let report = eyre::Report::new(PlcError::Log("disk full".into()));
        let v: serde_json::Value = serde_json::from_str(&format_error_json(&report)).unwrap();
        assert_eq!(v["reason"], "SnapshotLog");
        assert_eq!(v["exit_code"], 4);
    }

    #[test]
    fn unknown_errors_are_generic() {
        let report = eyre::eyre!("boom");
        assert_eq!(exit_code_for_error(&report), EXIT_GENERIC);
    }
}
