//! Received power, co-channel classification, SINR and rate adaptation.

use crate::station::{Network, Station};
use pcsim_common::PathLoss;

/// Background noise power at every receiver, in watts.
pub const WHITE_NOISE_W: f64 = 7.9e-11;

/// Power from `node` arriving at `receiver` after the receive antenna, in watts.
pub fn received_power(node: &Station, receiver: &Station, model: &dyn PathLoss) -> f64 {
    node.power_w * model.gain(node.distance_to(receiver)) * receiver.antenna_gain
}

/// Whether `receiver` can decode `node` well enough to defer to it.
///
/// Such neighbours share the medium through CSMA/CA and show up as
/// contention rather than as interference power.
pub fn is_cochannel_interference(
    node: &Station,
    receiver: &Station,
    model: &dyn PathLoss,
    noise_w: f64,
) -> bool {
    received_power(node, receiver, model) > noise_w * receiver.snr_floor
}

/// SINR at `receiver` for a frame from `transmitter`.
///
/// Only interferers below the receiver's co-channel threshold add power to
/// the denominator.
pub fn sinr(
    transmitter: &Station,
    receiver: &Station,
    interferers: &[Station],
    model: &dyn PathLoss,
    noise_w: f64,
) -> f64 {
    let signal = received_power(transmitter, receiver, model);
    let interference: f64 = interferers
        .iter()
        .filter(|node| !is_cochannel_interference(node, receiver, model, noise_w))
        .map(|node| received_power(node, receiver, model))
        .sum();
    signal / (interference + noise_w)
}

/// Downlink SINR of every mobile station in the network.
pub fn downlink_sinrs(
    network: &Network,
    interferers: &[Station],
    model: &dyn PathLoss,
    noise_w: f64,
) -> Vec<f64> {
    network
        .mobile_stations
        .iter()
        .map(|ms| sinr(&network.access_point, ms, interferers, model, noise_w))
        .collect()
}

// ============================================================================
// Rate Adaptation
// ============================================================================

/// SINR thresholds (linear) and PHY rates of 802.11n MCS 0-7, 20 MHz channel.
///
/// Entry `k` is `(minimum SINR, rate in Mb/s)` for MCS `k`.
pub const MCS_TABLE: [(f64, f64); 8] = [
    (3.0, 6.5),
    (5.0, 13.0),
    (9.0, 19.5),
    (11.0, 26.0),
    (15.0, 39.0),
    (18.0, 52.0),
    (20.0, 58.5),
    (25.0, 65.0),
];

/// Highest PHY rate in the table, in Mb/s.
pub const PEAK_DATA_RATE_MBPS: f64 = 65.0;

/// Highest MCS whose threshold the SINR reaches, or `None` if the link is
/// unusable.
pub fn mcs_index(sinr: f64) -> Option<usize> {
    MCS_TABLE.iter().rposition(|(threshold, _)| sinr >= *threshold)
}

/// PHY rate selected for the given SINR, in Mb/s.
pub fn data_rate_mbps(sinr: f64) -> f64 {
    mcs_index(sinr).map_or(0.0, |mcs| MCS_TABLE[mcs].1)
}

/// Mean downlink PHY rate over the network's mobile stations, in Mb/s.
pub fn average_data_rate(
    network: &Network,
    interferers: &[Station],
    model: &dyn PathLoss,
    noise_w: f64,
) -> f64 {
    let sinrs = downlink_sinrs(network, interferers, model, noise_w);
    if sinrs.is_empty() {
        return 0.0;
    }
    sinrs.iter().map(|s| data_rate_mbps(*s)).sum::<f64>() / sinrs.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use pcsim_common::{ItuIndoorPathLoss, Position};

    fn mobile_at(x: f64, y: f64) -> Station {
        Station::mobile(Position::new(x, y))
    }

    #[test]
    fn test_received_power_applies_receiver_gain() {
        let model = ItuIndoorPathLoss::default();
        let ms = mobile_at(3.0, 0.0);
        let ap = Station::access_point(Position::default(), false);
        let expected = 0.1 * model.gain(3.0) * 10.0;
        assert!((received_power(&ms, &ap, &model) - expected).abs() < 1e-18);
    }

    #[test]
    fn test_nearby_node_is_cochannel() {
        let model = ItuIndoorPathLoss::default();
        let near = mobile_at(2.0, 0.0);
        let receiver = mobile_at(0.0, 0.0);
        assert!(is_cochannel_interference(&near, &receiver, &model, WHITE_NOISE_W));
    }

    #[test]
    fn test_distant_node_is_not_cochannel() {
        let model = ItuIndoorPathLoss::default();
        let far = mobile_at(500.0, 0.0);
        let receiver = mobile_at(0.0, 0.0);
        assert!(!is_cochannel_interference(&far, &receiver, &model, WHITE_NOISE_W));
    }

    #[test]
    fn test_sinr_ignores_cochannel_nodes() {
        let model = ItuIndoorPathLoss::default();
        let ap = Station::access_point(Position::default(), true);
        let ms = mobile_at(5.0, 0.0);
        let alone = sinr(&ap, &ms, &[], &model, WHITE_NOISE_W);

        // Close enough to be heard: contends, does not interfere.
        let cochannel = mobile_at(6.0, 0.0);
        assert_eq!(sinr(&ap, &ms, &[cochannel], &model, WHITE_NOISE_W), alone);
    }

    #[test]
    fn test_sinr_counts_weak_interferers() {
        let model = ItuIndoorPathLoss::default();
        let ap = Station::access_point(Position::default(), true);
        let ms = mobile_at(5.0, 0.0);
        let alone = sinr(&ap, &ms, &[], &model, WHITE_NOISE_W);

        let weak = mobile_at(60.0, 0.0);
        assert!(!is_cochannel_interference(&weak, &ms, &model, WHITE_NOISE_W));
        assert!(sinr(&ap, &ms, &[weak], &model, WHITE_NOISE_W) < alone);
    }

    #[test]
    fn test_mcs_thresholds() {
        assert_eq!(mcs_index(2.9), None);
        assert_eq!(mcs_index(3.0), Some(0));
        assert_eq!(mcs_index(4.9), Some(0));
        assert_eq!(mcs_index(10.0), Some(2));
        assert_eq!(mcs_index(24.9), Some(6));
        assert_eq!(mcs_index(1000.0), Some(7));

        assert_eq!(data_rate_mbps(0.5), 0.0);
        assert_eq!(data_rate_mbps(16.0), 39.0);
        assert_eq!(data_rate_mbps(25.0), PEAK_DATA_RATE_MBPS);
    }

    #[test]
    fn test_average_data_rate_for_close_stations() {
        let model = ItuIndoorPathLoss::default();
        let mut network = Network::new(
            (0, 0),
            Position::default(),
            7.0,
            7.0,
            Station::access_point(Position::default(), false),
        );
        network.mobile_stations.push(mobile_at(1.0, 1.0));
        network.mobile_stations.push(mobile_at(2.0, 3.0));
        assert_eq!(average_data_rate(&network, &[], &model, WHITE_NOISE_W), 65.0);
    }
}
