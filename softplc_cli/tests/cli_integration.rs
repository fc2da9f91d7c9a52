use assert_cmd::prelude::*;
use predicates::prelude::*;
use rstest::rstest;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::tempdir;

// Short batch run against the simulated tank: autostart off keeps the level
// flat, so the stability timeout ends the run quickly.
fn write_batch_config(dir: &Path) -> PathBuf {
    let csv_dir = dir.join("log");
    let toml = format!(
        r#"
[control]
period_ms = 5
autostart = false

[bridge]
tick_ms = 1

[stability]
window = 3
stop_timeout_ms = 40

[logging]
csv_dir = "{}"
"#,
        csv_dir.display().to_string().replace('\\', "/")
    );
    let path = dir.join("cfg.toml");
    fs::write(&path, toml).unwrap();
    path
}

fn free_port() -> u16 {
    std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

#[rstest]
#[case(&["--help"], 0, "Usage:", "stdout")]
#[case(&["plant.example"], 2, "invalid address", "stderr")]
#[case(&["127.0.0.1", "::1"], 2, "invalid address", "stderr")]
#[case(&["--tunings", "1,2"], 2, "KP,KI,KD", "stderr")]
fn cli_table_cases(
    #[case] args: &[&str],
    #[case] exit_code: i32,
    #[case] needle: &str,
    #[case] stream: &str,
) {
    let mut cmd = Command::cargo_bin("softplc").unwrap();
    for a in args {
        cmd.arg(a);
    }
    let assert = cmd.assert().code(exit_code);
    match stream {
        "stdout" => {
            assert.stdout(predicate::str::contains(needle));
        }
        "stderr" => {
            assert.stderr(predicate::str::contains(needle));
        }
        other => panic!("unknown stream: {other}"),
    }
}

#[rstest]
#[case("[control]\nperiod_ms = 0\n", "control.period_ms")]
#[case("[bridge]\ntick_ms = 500\n", "bridge.tick_ms")]
#[case("[control\n", "parse config")]
fn invalid_config_exits_with_five(#[case] body: &str, #[case] needle: &str) {
    let dir = tempdir().unwrap();
    let cfg = dir.path().join("bad.toml");
    fs::write(&cfg, body).unwrap();

    Command::cargo_bin("softplc")
        .unwrap()
        .arg("--config")
        .arg(&cfg)
        .arg("--sim")
        .assert()
        .code(5)
        .stderr(predicate::str::contains(needle));
}

#[rstest]
fn missing_explicit_config_exits_with_five() {
    let dir = tempdir().unwrap();
    Command::cargo_bin("softplc")
        .unwrap()
        .arg("--config")
        .arg(dir.path().join("nope.toml"))
        .assert()
        .code(5);
}

#[rstest]
fn unreachable_plant_exits_with_three() {
    let dir = tempdir().unwrap();
    let cfg = write_batch_config(dir.path());
    Command::cargo_bin("softplc")
        .unwrap()
        .arg("--config")
        .arg(&cfg)
        .arg("127.0.0.1")
        .arg("--plant-port")
        .arg(free_port().to_string())
        .assert()
        .code(3)
        .stderr(predicate::str::contains("Could not reach the plant"));
}

#[rstest]
fn batch_sim_run_ends_on_stability_and_writes_csv() {
    let dir = tempdir().unwrap();
    let cfg = write_batch_config(dir.path());

    Command::cargo_bin("softplc")
        .unwrap()
        .arg("--config")
        .arg(&cfg)
        .arg("--sim")
        .arg("--batch")
        .arg("127.0.0.1")
        .arg("127.0.0.1")
        .arg("--server-port")
        .arg(free_port().to_string())
        .arg("--tunings=-10,-1,0")
        .assert()
        .success()
        .stdout(predicate::str::contains("reason=StableTimeout"));

    let logs: Vec<_> = fs::read_dir(dir.path().join("log"))
        .unwrap()
        .map(|e| e.unwrap().path())
        .collect();
    assert_eq!(logs.len(), 1);
    let name = logs[0].file_name().unwrap().to_string_lossy().into_owned();
    assert!(name.starts_with("data_log_"), "{name}");
    assert!(name.contains("_P-10.000_I-1.000_D0.000"), "{name}");

    let text = fs::read_to_string(&logs[0]).unwrap();
    let mut lines = text.lines();
    assert_eq!(
        lines.next(),
        Some("time,level,outflow,in_valve,out_valve,setpoint,dt")
    );
    assert!(lines.count() >= 3);
}
