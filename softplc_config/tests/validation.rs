use rstest::rstest;
use softplc_config::{load_path, load_toml};

#[test]
fn empty_file_is_a_valid_default_config() {
    let cfg = load_toml("").expect("parse TOML");
    cfg.validate().expect("defaults should pass");
    assert_eq!(cfg.control.period_ms, 300);
    assert_eq!(cfg.queues.capacity, 50);
    assert_eq!(cfg.scaling.decimal_factor, 1000);
    assert!((cfg.pid.kp + 12.7426).abs() < 1e-12);
    assert!(!cfg.stability.enabled);
}

#[test]
fn partial_sections_keep_remaining_defaults() {
    let toml = r#"
[plant]
address = "10.0.0.7"

[control]
setpoint = 0.4
"#;
    let cfg = load_toml(toml).expect("parse TOML");
    cfg.validate().expect("valid config should pass");
    assert_eq!(cfg.plant.address, "10.0.0.7");
    assert_eq!(cfg.plant.port, 5020);
    assert!((cfg.control.setpoint - 0.4).abs() < 1e-12);
    assert!(cfg.control.autostart);
    assert!(!cfg.control.stop_on_end);
    assert!(!cfg.control.read_setpoint);
}

#[test]
fn continued_run_names_the_csv_to_append_to() {
    let toml = r#"
[logging]
continue_run = true
csv_file = "log/previous.csv"
"#;
    let cfg = load_toml(toml).expect("parse TOML");
    cfg.validate().expect("valid config should pass");
    assert_eq!(cfg.logging.csv_file.as_deref(), Some("log/previous.csv"));
}

#[rstest]
#[case("[control]\nperiod_ms = 0", "control.period_ms must be >= 1")]
#[case("[control]\nsetpoint = 1.5", "control.setpoint must be in [0.0, 1.0]")]
#[case("[control]\nout_valve = -0.1", "control.out_valve must be in [0.0, 1.0]")]
#[case("[bridge]\ntick_ms = 0", "bridge.tick_ms must be >= 1")]
#[case("[bridge]\ntick_ms = 500", "bridge.tick_ms must be <= control.period_ms")]
#[case("[queues]\ncapacity = 0", "queues.capacity must be >= 1")]
#[case("[scaling]\ndecimal_factor = 0", "scaling.decimal_factor must be >= 1")]
#[case("[stability]\nwindow = 1", "stability.window must be >= 2")]
#[case("[server]\nport = 0", "server.port must be > 0")]
#[case("[pid]\nkp = nan", "pid gains must be finite")]
#[case("[logging]\nrotation = \"weekly\"", "logging.rotation must be one of")]
#[case("[logging]\ncontinue_run = true", "logging.continue_run requires logging.csv_file")]
fn rejects_invalid_values(#[case] toml: &str, #[case] message: &str) {
    let cfg = load_toml(toml).expect("parse TOML");
    let err = cfg.validate().expect_err("should be rejected");
    assert!(
        format!("{err}").contains(message),
        "unexpected error: {err}"
    );
}

#[test]
fn load_path_reads_and_validates() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("softplc.toml");
    std::fs::write(&path, "[queues]\ncapacity = 0\n").unwrap();
    let err = load_path(&path).expect_err("invalid capacity");
    assert!(format!("{err}").contains("queues.capacity"));

    std::fs::write(&path, "[queues]\ncapacity = 8\n").unwrap();
    assert_eq!(load_path(&path).unwrap().queues.capacity, 8);
}

#[test]
fn load_path_reports_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let err = load_path(&dir.path().join("absent.toml")).unwrap_err();
    assert!(format!("{err}").contains("read config"));
}
