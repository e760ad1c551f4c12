//! Saturation throughput of the 802.11 distributed coordination function.
//!
//! Basic DCF with RTS/CTS and fixed packet sizes. Neighbours from other
//! networks that a station can hear (see
//! [`is_cochannel_interference`](crate::interference::is_cochannel_interference))
//! contend for the same slots and lower the chance of a clean transmission.

use crate::interference::is_cochannel_interference;
use crate::station::{Network, Station};
use pcsim_common::PathLoss;
use serde::{Deserialize, Serialize};

/// Speed of light in m/s.
pub const SPEED_OF_LIGHT: f64 = 3e8;

/// 802.11n timing and frame sizes for the 2.4 GHz band.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DcfParams {
    /// Minimum contention window.
    pub cw_min: u32,
    /// Short inter-frame space in seconds.
    pub sifs_s: f64,
    /// DCF inter-frame space in seconds.
    pub difs_s: f64,
    /// Slot time in seconds.
    pub slot_time_s: f64,
    /// RTS frame size in bytes.
    pub rts_bytes: f64,
    /// CTS frame size in bytes.
    pub cts_bytes: f64,
    /// ACK frame size in bytes.
    pub ack_bytes: f64,
    /// Expected data payload in bytes (above the RTS threshold).
    pub payload_bytes: f64,
    /// PHY rate used for airtime, in bit/s.
    pub phy_rate_bps: f64,
}

impl Default for DcfParams {
    fn default() -> Self {
        DcfParams {
            cw_min: 16,
            sifs_s: 10e-6,
            difs_s: 28e-6,
            slot_time_s: 9e-6,
            rts_bytes: 20.0,
            cts_bytes: 14.0,
            ack_bytes: 14.0,
            payload_bytes: 2500.0,
            phy_rate_bps: 65e6,
        }
    }
}

impl DcfParams {
    /// Airtime of a frame of `bytes` bytes, in seconds.
    pub fn airtime(&self, bytes: f64) -> f64 {
        bytes / (self.phy_rate_bps / 8.0)
    }

    /// Per-slot transmission probability of a station with buffer occupancy `q`.
    ///
    /// Saturated stations transmit with `τ = 2 / (CW_min + 1)`.
    pub fn transmission_probability(&self, q: f64) -> f64 {
        2.0 / (self.cw_min as f64 + 1.0) * q
    }
}

/// Mean one-way propagation delay between the AP and its stations, in seconds.
pub fn expected_propagation_delay(network: &Network) -> f64 {
    if network.mobile_stations.is_empty() {
        return 0.0;
    }
    let total: f64 = network
        .mobile_stations
        .iter()
        .map(|ms| network.access_point.distance_to(ms) / SPEED_OF_LIGHT)
        .sum();
    total / network.mobile_stations.len() as f64
}

/// Probability that exactly one station of the network transmits in a slot
/// without any station it can hear transmitting too.
pub fn probability_of_exactly_one_transmission(
    network: &Network,
    interferers: &[Station],
    model: &dyn PathLoss,
    noise_w: f64,
    params: &DcfParams,
) -> f64 {
    let stations: Vec<&Station> = network.all_stations().collect();
    stations
        .iter()
        .enumerate()
        .map(|(i, station)| {
            let tau_i = params.transmission_probability(station.contention_q);
            let own_idle: f64 = stations
                .iter()
                .enumerate()
                .filter(|(j, _)| *j != i)
                .map(|(_, s)| 1.0 - params.transmission_probability(s.contention_q))
                .product();
            let neighbours_idle: f64 = interferers
                .iter()
                .filter(|s| is_cochannel_interference(s, station, model, noise_w))
                .map(|s| 1.0 - params.transmission_probability(s.contention_q))
                .product();
            tau_i * own_idle * neighbours_idle
        })
        .sum()
}

/// Probability that at least one station of the network transmits in a slot.
pub fn probability_of_at_least_one_transmission(network: &Network, params: &DcfParams) -> f64 {
    let all_idle: f64 = network
        .all_stations()
        .map(|s| 1.0 - params.transmission_probability(s.contention_q))
        .product();
    1.0 - all_idle
}

/// Fraction of airtime that carries payload.
pub fn normalised_network_throughput(
    network: &Network,
    interferers: &[Station],
    model: &dyn PathLoss,
    noise_w: f64,
    params: &DcfParams,
) -> f64 {
    let delta = expected_propagation_delay(network);
    let t_rts = params.airtime(params.rts_bytes);
    let t_payload = params.airtime(params.payload_bytes);

    let time_busy_collision = delta + params.difs_s + t_rts;
    let time_busy_successful = t_rts
        + params.airtime(params.cts_bytes)
        + params.airtime(params.ack_bytes)
        + t_payload
        + 4.0 * delta
        + 3.0 * params.sifs_s
        + params.difs_s;

    let p_exactly_one =
        probability_of_exactly_one_transmission(network, interferers, model, noise_w, params);
    let p_tr = probability_of_at_least_one_transmission(network, params);
    if p_tr <= 0.0 {
        return 0.0;
    }
    let p_s = p_exactly_one / p_tr;

    let average_slot_time = (1.0 - p_tr) * params.slot_time_s
        + p_tr * p_s * time_busy_successful
        + p_tr * (1.0 - p_s) * time_busy_collision;

    p_s * p_tr * t_payload / average_slot_time
}
