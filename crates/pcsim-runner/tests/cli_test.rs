//! Command line integration tests for the pcsim binary.
//!
//! These tests run the binary against the bundled scenario files and check
//! the JSON reports it writes.

use std::fs;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

use serde::Deserialize;

// ============================================================================
// JSON Deserialization Types for Reports
// ============================================================================

#[derive(Debug, Deserialize)]
struct Convergence {
    final_max_delta: f64,
}

#[derive(Debug, Deserialize)]
struct IsmTrace {
    powers: Vec<Vec<f64>>,
    capacity_before: f64,
    capacity_after: f64,
    convergence: Convergence,
}

#[derive(Debug, Deserialize)]
struct IsmReport {
    seed: u64,
    users: usize,
    final_powers: Vec<f64>,
    trace: IsmTrace,
}

#[derive(Debug, Deserialize)]
struct NetworkSummary {
    index: (usize, usize),
    final_ap_power: f64,
}

#[derive(Debug, Deserialize)]
struct WlanReport {
    rule: String,
    networks: Vec<NetworkSummary>,
    interior: Vec<(usize, usize)>,
    recordings: Vec<serde_json::Value>,
}

// ============================================================================
// Helpers
// ============================================================================

fn run_pcsim(args: &[&str]) -> Output {
    // CARGO_BIN_EXE_pcsim is set by cargo when running tests for this crate
    let binary = env!("CARGO_BIN_EXE_pcsim");

    // Run from workspace root (two levels up from crate)
    let mut cmd = Command::new(binary);
    cmd.current_dir(concat!(env!("CARGO_MANIFEST_DIR"), "/../.."));
    cmd.args(args);
    cmd.output().expect("Failed to execute pcsim")
}

fn run_to_file(args: &[&str], output_path: &Path) -> String {
    let mut all: Vec<&str> = args.to_vec();
    let output_arg = output_path.to_str().expect("temp path is not UTF-8");
    all.push("--output");
    all.push(output_arg);

    let output = run_pcsim(&all);
    if !output.status.success() {
        panic!(
            "pcsim failed:\nstdout: {}\nstderr: {}",
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        );
    }
    fs::read_to_string(output_path).expect("Failed to read report")
}

// ============================================================================
// Tests
// ============================================================================

#[test]
fn test_ism_report_from_scenario_file() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let path = temp_dir.path().join("ism.json");
    let json = run_to_file(&["ism", "scenarios/default.yaml", "--seed", "17"], &path);

    let report: IsmReport = serde_json::from_str(&json).expect("Invalid ISM report");
    assert_eq!(report.seed, 17);
    assert_eq!(report.users, 10);
    assert_eq!(report.final_powers.len(), 10);
    assert_eq!(report.trace.powers.len(), 10);
    assert!(report.trace.capacity_before > 0.0);
    assert!(report.trace.capacity_after > 0.0);
    assert!(report.trace.convergence.final_max_delta >= 0.0);
}

#[test]
fn test_simultaneous_game_respects_power_limit() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let path = temp_dir.path().join("ism.json");
    let json = run_to_file(
        &["ism", "--users", "4", "--max-power", "0.5", "--simultaneous", "--seed", "1"],
        &path,
    );

    let report: IsmReport = serde_json::from_str(&json).expect("Invalid ISM report");
    assert_eq!(report.users, 4);
    for series in &report.trace.powers {
        assert_eq!(series.len(), 21);
        for p in &series[1..] {
            assert!(*p > 0.0 && *p <= 0.5, "power {}", p);
        }
    }
}

#[test]
fn test_ism_runs_are_reproducible() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let a = run_to_file(&["ism", "--seed", "23"], &temp_dir.path().join("a.json"));
    let b = run_to_file(&["ism", "--seed", "23"], &temp_dir.path().join("b.json"));
    assert_eq!(a, b);
}

#[test]
fn test_wlan_report_with_rule_override() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let path = temp_dir.path().join("wlan.json");
    let json = run_to_file(
        &[
            "wlan",
            "--seed",
            "3",
            "--columns",
            "3",
            "--rows",
            "3",
            "--iterations",
            "4",
            "--rule",
            "hill-climb",
        ],
        &path,
    );

    let report: WlanReport = serde_json::from_str(&json).expect("Invalid WLAN report");
    assert_eq!(report.rule, "hill_climb");
    assert_eq!(report.networks.len(), 9);
    assert_eq!(report.recordings.len(), 9);
    assert_eq!(report.interior, vec![(1, 1)]);
    for network in &report.networks {
        assert!(network.index.0 < 3 && network.index.1 < 3);
        assert!(network.final_ap_power >= 0.001 && network.final_ap_power <= 1.0);
    }
}

#[test]
fn test_coexistence_report_to_stdout() {
    let output = run_pcsim(&["coexistence", "--seed", "2"]);
    assert!(output.status.success());

    let report: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("Invalid coexistence report");
    let cochannel = report["classification"]["cochannel"].as_array().map(|a| a.len());
    let interchannel = report["classification"]["interchannel"].as_array().map(|a| a.len());
    assert_eq!(cochannel.unwrap_or(0) + interchannel.unwrap_or(0), 10);
}

#[test]
fn test_invalid_scenario_fails() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let scenario = temp_dir.path().join("bad.yaml");
    fs::write(&scenario, "ism:\n  users: 0\n").expect("Failed to write scenario");

    let output = run_pcsim(&["ism", scenario.to_str().expect("temp path is not UTF-8")]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("ism.users"), "stderr: {}", stderr);
}

#[test]
fn test_defaults_command_prints_loadable_yaml() {
    let output = run_pcsim(&["defaults"]);
    assert!(output.status.success());

    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let scenario = temp_dir.path().join("defaults.yaml");
    fs::write(&scenario, &output.stdout).expect("Failed to write scenario");
    let path = temp_dir.path().join("coexistence.json");
    run_to_file(
        &["coexistence", scenario.to_str().expect("temp path is not UTF-8")],
        &path,
    );
}
