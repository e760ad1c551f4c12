//! Iterated power control over a grid of networks.

use crate::control::{Observation, PowerRule};
use crate::dcf::{normalised_network_throughput, DcfParams};
use crate::interference::{average_data_rate, downlink_sinrs, WHITE_NOISE_W};
use crate::station::{Network, NetworkIndex, Station};
use pcsim_common::{
    require_positive, ConvergenceMonitor, ConvergenceReport, PathLoss, PowerBounds, SimError,
    SimResult,
};
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;
use tracing::{debug, info, trace};

/// Parameters of a power control run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WlanParams {
    /// Number of observe/update rounds.
    pub iterations: usize,
    /// Rule every access point follows.
    pub rule: PowerRule,
    /// Power range for access points.
    pub bounds: PowerBounds,
    /// Noise power at every receiver, in watts.
    pub noise_w: f64,
    /// MAC timing.
    pub dcf: DcfParams,
    /// Largest AP power change, in watts, that still counts as settled.
    pub tolerance_w: f64,
}

impl Default for WlanParams {
    fn default() -> Self {
        WlanParams {
            iterations: 10,
            rule: PowerRule::Standard,
            bounds: PowerBounds::default(),
            noise_w: WHITE_NOISE_W,
            dcf: DcfParams::default(),
            tolerance_w: 1e-4,
        }
    }
}

/// Per-iteration time series of one network.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recording {
    /// Grid position of the network.
    pub index: NetworkIndex,
    /// AP transmit power in watts.
    pub ap_power: Vec<f64>,
    /// AP receive antenna gain.
    pub ap_gain: Vec<f64>,
    /// DCF normalised throughput `S`.
    pub normalised_throughput: Vec<f64>,
    /// Mean downlink PHY rate in Mb/s.
    pub data_rate: Vec<f64>,
    /// Utility the power rule climbs, evaluated at the recorded AP power.
    pub utility: Vec<f64>,
}

impl Recording {
    /// Empty recording for the network at `index`.
    pub fn new(index: NetworkIndex) -> Self {
        Recording {
            index,
            ap_power: Vec::new(),
            ap_gain: Vec::new(),
            normalised_throughput: Vec::new(),
            data_rate: Vec::new(),
            utility: Vec::new(),
        }
    }

    /// Append one iteration.
    pub fn add_data_point(
        &mut self,
        power_w: f64,
        gain: f64,
        observation: &Observation,
        utility: f64,
    ) {
        self.ap_power.push(power_w);
        self.ap_gain.push(gain);
        self.normalised_throughput.push(observation.normalised_throughput);
        self.data_rate.push(observation.data_rate_mbps);
        self.utility.push(utility);
    }

    /// Delivered throughput `S · r` per iteration, in Mb/s.
    pub fn throughput(&self) -> Vec<f64> {
        self.normalised_throughput
            .iter()
            .zip(&self.data_rate)
            .map(|(s, r)| s * r)
            .collect()
    }

    /// Number of recorded iterations.
    pub fn len(&self) -> usize {
        self.ap_power.len()
    }

    /// Whether nothing has been recorded yet.
    pub fn is_empty(&self) -> bool {
        self.ap_power.is_empty()
    }
}

/// Result of a power control run.
#[derive(Debug, Clone, Serialize)]
pub struct WlanOutcome {
    /// Name of the rule that was applied.
    pub rule: &'static str,
    /// One recording per network, in network order.
    pub recordings: Vec<Recording>,
    /// How AP powers settled.
    pub convergence: ConvergenceReport,
}

/// Every station outside network `k`.
pub fn interferers_of(networks: &[Network], k: usize) -> Vec<Station> {
    networks
        .iter()
        .enumerate()
        .filter(|(m, _)| *m != k)
        .flat_map(|(_, n)| n.all_stations().copied())
        .collect()
}

/// What the AP of network `k` observes given every other network's state.
pub fn observe(
    networks: &[Network],
    k: usize,
    model: &dyn PathLoss,
    params: &WlanParams,
) -> Observation {
    let network = &networks[k];
    let interferers = interferers_of(networks, k);
    let min_sinr = downlink_sinrs(network, &interferers, model, params.noise_w)
        .into_iter()
        .fold(f64::INFINITY, f64::min);
    Observation {
        normalised_throughput: normalised_network_throughput(
            network,
            &interferers,
            model,
            params.noise_w,
            &params.dcf,
        ),
        data_rate_mbps: average_data_rate(network, &interferers, model, params.noise_w),
        min_sinr,
    }
}

/// Run `params.iterations` rounds of observe, record and update.
///
/// Within a round every network observes the same snapshot and all access
/// points switch to their new power together.
pub fn run_power_control(
    networks: &mut [Network],
    model: &dyn PathLoss,
    params: &WlanParams,
) -> SimResult<WlanOutcome> {
    if networks.is_empty() {
        return Err(SimError::EmptyTopology("no networks to simulate".to_string()));
    }
    if params.iterations == 0 {
        return Err(SimError::InvalidParameter {
            name: "iterations",
            reason: "power control needs at least one iteration".to_string(),
        });
    }
    require_positive("noise_w", params.noise_w)?;
    params.rule.validate()?;
    let bounds = params.rule.bounds(params.bounds)?;

    info!(
        "Running {} power control on {} networks for {} iterations",
        params.rule.name(),
        networks.len(),
        params.iterations
    );

    let mut recordings: Vec<Recording> = networks.iter().map(|n| Recording::new(n.index)).collect();
    let ap_powers = |networks: &[Network]| -> Vec<f64> {
        networks.iter().map(|n| n.access_point.power_w).collect()
    };

    let mut monitor = ConvergenceMonitor::new(params.tolerance_w);
    monitor.start(&ap_powers(networks));

    for iteration in 0..params.iterations {
        let snapshot: &[Network] = networks;
        let observations: Vec<Observation> = (0..snapshot.len())
            .map(|k| observe(snapshot, k, model, params))
            .collect();

        for ((network, recording), obs) in networks.iter().zip(&mut recordings).zip(&observations) {
            if !obs.normalised_throughput.is_finite() {
                return Err(SimError::NonFinite {
                    quantity: "normalised throughput",
                    value: obs.normalised_throughput,
                });
            }
            let ap = &network.access_point;
            recording.add_data_point(
                ap.power_w,
                ap.antenna_gain,
                obs,
                params.rule.utility(obs, ap.power_w),
            );
        }

        let next: Vec<f64> = networks
            .iter_mut()
            .zip(&observations)
            .map(|(network, obs)| params.rule.next_power(&mut network.access_point, obs, bounds))
            .collect();
        for (network, p) in networks.iter_mut().zip(next) {
            network.access_point.power_w = p;
        }

        let delta = monitor.observe(&ap_powers(networks));
        trace!("Iteration {}: max AP power change {:.3e} W", iteration + 1, delta);
    }

    let convergence = monitor.report();
    debug!(
        "Power control finished (converged: {}, last change {:.3e} W)",
        convergence.converged, convergence.final_max_delta
    );

    Ok(WlanOutcome {
        rule: params.rule.name(),
        recordings,
        convergence,
    })
}

/// Recordings of networks whose column lies in `columns` and row in `rows`.
///
/// Used to look at interior networks, which see interference from all sides.
pub fn select_recordings<'a>(
    recordings: &'a [Recording],
    columns: RangeInclusive<usize>,
    rows: RangeInclusive<usize>,
) -> Vec<&'a Recording> {
    recordings
        .iter()
        .filter(|r| columns.contains(&r.index.0) && rows.contains(&r.index.1))
        .collect()
}
