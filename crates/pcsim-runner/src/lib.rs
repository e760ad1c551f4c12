//! # pcsim-runner library
//!
//! Library interface for the PCSim runner.
//!
//! Each `run_*` function builds the random topology of one simulation from a
//! [`Scenario`], runs it and returns a serializable report. The `pcsim`
//! binary is a thin CLI over these functions.

use pcsim_common::{seeded_rng, ConvergenceReport, PathLoss, PowerBounds};
use pcsim_ism::{run_game, GameTrace, IsmSystem, UpdateOrder};
use pcsim_model::Scenario;
use pcsim_wlan::{
    analyse, create_networks, run_power_control, select_recordings, CoexistenceReport, NetworkIndex,
    Recording,
};
use serde::Serialize;
use std::io::Write;
use std::path::Path;
use thiserror::Error;
use tracing::info;

// ============================================================================
// Error Types
// ============================================================================

/// Errors that can occur while running a simulation.
#[derive(Debug, Error)]
pub enum RunnerError {
    /// Model error.
    #[error("Model error: {0}")]
    Model(#[from] pcsim_model::ModelError),

    /// Simulation error.
    #[error("Simulation error: {0}")]
    Simulation(#[from] pcsim_common::SimError),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

// ============================================================================
// ISM Power Game
// ============================================================================

/// Outcome of an ISM power game run.
#[derive(Debug, Clone, Serialize)]
pub struct IsmReport {
    /// Seed the topology was drawn with.
    pub seed: u64,
    /// Number of transmitter/receiver pairs.
    pub users: usize,
    /// Update schedule used.
    pub order: UpdateOrder,
    /// Power of each transmitter after the last iteration, in watts.
    pub final_powers: Vec<f64>,
    /// SINR of each link after the last iteration (linear).
    pub final_sinr: Vec<f64>,
    /// Full power history and capacities.
    pub trace: GameTrace,
}

/// Allocate random links and play the power game.
pub fn run_ism(scenario: &Scenario) -> Result<IsmReport, RunnerError> {
    let ism = &scenario.ism;
    let model: &dyn PathLoss = &scenario.propagation;
    let mut rng = seeded_rng(scenario.seed);

    let mut system = IsmSystem::allocate(ism.users, &ism.topology, &mut rng)?;
    let trace = run_game(&mut system, model, &ism.game, ism.iterations, ism.tolerance)?;

    let final_sinr = (0..system.len())
        .map(|k| system.sinr(k, model, ism.game.noise_w))
        .collect();

    info!(
        "ISM game finished: capacity per user {:.4} -> {:.4} bits/s/Hz (converged: {})",
        trace.capacity_before, trace.capacity_after, trace.convergence.converged
    );

    Ok(IsmReport {
        seed: scenario.seed,
        users: system.len(),
        order: ism.game.order,
        final_powers: system.powers(),
        final_sinr,
        trace,
    })
}

// ============================================================================
// 802.11 Grid Power Control
// ============================================================================

/// Per-network summary of a power control run.
#[derive(Debug, Clone, Serialize)]
pub struct NetworkSummary {
    /// Grid position of the network.
    pub index: NetworkIndex,
    /// AP power after the last update, in watts.
    pub final_ap_power: f64,
    /// Mean delivered throughput over all iterations, in Mb/s.
    pub mean_throughput_mbps: f64,
}

/// Outcome of an 802.11 power control run.
#[derive(Debug, Clone, Serialize)]
pub struct WlanReport {
    /// Seed the grid was drawn with.
    pub seed: u64,
    /// Name of the power rule.
    pub rule: &'static str,
    /// Power range the rule operated in.
    pub bounds: PowerBounds,
    /// One summary per network, in grid order.
    pub networks: Vec<NetworkSummary>,
    /// Networks not on the edge of the grid.
    pub interior: Vec<NetworkIndex>,
    /// Mean throughput of the interior networks, in Mb/s.
    pub interior_mean_throughput_mbps: Option<f64>,
    /// How AP powers settled.
    pub convergence: ConvergenceReport,
    /// Per-iteration recordings of every network.
    pub recordings: Vec<Recording>,
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// Build the grid of networks and run power control on it.
pub fn run_wlan(scenario: &Scenario) -> Result<WlanReport, RunnerError> {
    let wlan = &scenario.wlan;
    let model: &dyn PathLoss = &scenario.propagation;
    let mut rng = seeded_rng(scenario.seed);

    let mut networks = create_networks(&wlan.grid, &mut rng)?;
    let outcome = run_power_control(&mut networks, model, &wlan.control)?;

    let summaries: Vec<NetworkSummary> = networks
        .iter()
        .zip(&outcome.recordings)
        .map(|(network, recording)| NetworkSummary {
            index: network.index,
            final_ap_power: network.access_point.power_w,
            mean_throughput_mbps: mean(&recording.throughput()),
        })
        .collect();

    // Edge networks see interference from fewer sides, so only a grid with
    // at least one full ring around it has an interior.
    let (columns, rows) = (wlan.grid.columns, wlan.grid.rows);
    let interior_recordings = if columns >= 3 && rows >= 3 {
        select_recordings(&outcome.recordings, 1..=columns - 2, 1..=rows - 2)
    } else {
        Vec::new()
    };
    let interior: Vec<NetworkIndex> = interior_recordings.iter().map(|r| r.index).collect();
    let interior_mean_throughput_mbps = if interior_recordings.is_empty() {
        None
    } else {
        let means: Vec<f64> = interior_recordings.iter().map(|r| mean(&r.throughput())).collect();
        Some(mean(&means))
    };

    info!(
        "WLAN {} run finished on {} networks (converged: {})",
        outcome.rule,
        networks.len(),
        outcome.convergence.converged
    );

    Ok(WlanReport {
        seed: scenario.seed,
        rule: outcome.rule,
        bounds: wlan.control.rule.bounds(wlan.control.bounds)?,
        networks: summaries,
        interior,
        interior_mean_throughput_mbps,
        convergence: outcome.convergence,
        recordings: outcome.recordings,
    })
}

// ============================================================================
// Coexistence
// ============================================================================

/// Build the two flats and classify the first flat's stations.
pub fn run_coexistence(scenario: &Scenario) -> Result<CoexistenceReport, RunnerError> {
    let mut rng = seeded_rng(scenario.seed);
    let report = analyse(&scenario.coexistence, &scenario.propagation, &mut rng)?;
    info!(
        "Coexistence analysis finished: {} of {} stations co-channel",
        report.classification.cochannel.len(),
        report.network.mobile_stations.len()
    );
    Ok(report)
}

// ============================================================================
// Output
// ============================================================================

/// Write a report as pretty-printed JSON to `output`, or to stdout.
pub fn write_report<T: Serialize>(report: &T, output: Option<&Path>) -> Result<(), RunnerError> {
    let json = serde_json::to_string_pretty(report)?;
    match output {
        Some(path) => {
            std::fs::write(path, json)?;
            info!("Report written to {}", path.display());
        }
        None => {
            let stdout = std::io::stdout();
            let mut handle = stdout.lock();
            writeln!(handle, "{}", json)?;
        }
    }
    Ok(())
}
