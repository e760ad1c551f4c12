//! Two flat networks on the same channel.
//!
//! A station that hears the neighbouring AP above its SINR floor defers to
//! it (co-channel); any other station treats the AP as interference
//! (inter-channel).

use crate::interference::{is_cochannel_interference, received_power};
use crate::station::{Network, NetworkIndex, Station, UNITY_GAIN};
use pcsim_common::{require_positive, PathLoss, Position, SimError, SimResult};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Layout and radio constants for the two-flat scenario.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CoexistenceParams {
    /// Flat width in metres.
    pub flat_width_m: f64,
    /// Flat length in metres.
    pub flat_length_m: f64,
    /// Mobile stations per flat.
    pub stations: usize,
    /// AP transmit power in watts.
    pub ap_power_w: f64,
    /// Mobile station transmit power in watts.
    pub ms_power_w: f64,
    /// SINR a receiver needs to decode a neighbour.
    pub sinr_floor: f64,
    /// Noise power in watts.
    pub white_noise_w: f64,
    /// Lower-left corner of the second flat.
    pub second_offset: Position,
}

impl Default for CoexistenceParams {
    fn default() -> Self {
        CoexistenceParams {
            flat_width_m: 8.0,
            flat_length_m: 8.0,
            stations: 10,
            ap_power_w: 1.0,
            ms_power_w: 0.1,
            sinr_floor: 3.0,
            white_noise_w: 5.0,
            second_offset: Position::new(16.0, 0.0),
        }
    }
}

impl CoexistenceParams {
    fn configure(&self, mut station: Station, power_w: f64) -> Station {
        station.power_w = power_w;
        station.antenna_gain = UNITY_GAIN;
        station.snr_floor = self.sinr_floor;
        station
    }
}

/// Place an AP and the configured stations at random inside one flat.
pub fn create_flat<R: Rng>(
    index: NetworkIndex,
    offset: Position,
    params: &CoexistenceParams,
    rng: &mut R,
) -> SimResult<Network> {
    if params.stations == 0 {
        return Err(SimError::EmptyTopology("a flat needs at least one station".to_string()));
    }
    require_positive("flat_width_m", params.flat_width_m)?;
    require_positive("flat_length_m", params.flat_length_m)?;

    let ap_position = Position::random_in(rng, offset, params.flat_width_m, params.flat_length_m);
    let ap = params.configure(Station::access_point(ap_position, true), params.ap_power_w);
    let mut network = Network::new(index, offset, params.flat_width_m, params.flat_length_m, ap);
    for _ in 0..params.stations {
        let position = Position::random_in(rng, offset, params.flat_width_m, params.flat_length_m);
        network
            .mobile_stations
            .push(params.configure(Station::mobile(position), params.ms_power_w));
    }
    Ok(network)
}

/// Mobile stations of a network split by how they experience a foreign AP.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InterferenceClassification {
    /// Indices of stations that hear the foreign AP and defer to it.
    pub cochannel: Vec<usize>,
    /// Indices of stations that see the foreign AP as interference.
    pub interchannel: Vec<usize>,
}

/// Split the stations of `network` by co-channel reception of `interfering_ap`.
pub fn classify(
    network: &Network,
    interfering_ap: &Station,
    model: &dyn PathLoss,
    noise_w: f64,
) -> InterferenceClassification {
    let (cochannel, interchannel): (Vec<usize>, Vec<usize>) = (0..network.mobile_stations.len())
        .partition(|&i| {
            is_cochannel_interference(interfering_ap, &network.mobile_stations[i], model, noise_w)
        });
    InterferenceClassification {
        cochannel,
        interchannel,
    }
}

/// SINR at `receiver` with a single foreign AP.
///
/// A co-channel AP defers to this link, so only noise remains; otherwise its
/// power adds to the noise.
pub fn isolated_sinr(
    transmitter: &Station,
    receiver: &Station,
    interfering_ap: &Station,
    model: &dyn PathLoss,
    noise_w: f64,
) -> f64 {
    let signal = received_power(transmitter, receiver, model);
    if is_cochannel_interference(interfering_ap, receiver, model, noise_w) {
        signal / noise_w
    } else {
        signal / (received_power(interfering_ap, receiver, model) + noise_w)
    }
}

/// Outcome of the two-flat analysis, seen from the first flat.
#[derive(Debug, Clone, Serialize)]
pub struct CoexistenceReport {
    /// The flat under study.
    pub network: Network,
    /// The neighbouring flat.
    pub neighbour: Network,
    /// Station split relative to the neighbouring AP.
    pub classification: InterferenceClassification,
    /// Whether the first AP hears the neighbouring AP above its floor.
    pub ap_is_cochannel: bool,
    /// Downlink SINR of each station of the first flat.
    pub downlink_sinr: Vec<f64>,
}

/// Build both flats and analyse how the second AP affects the first flat.
pub fn analyse<R: Rng>(
    params: &CoexistenceParams,
    model: &dyn PathLoss,
    rng: &mut R,
) -> SimResult<CoexistenceReport> {
    require_positive("white_noise_w", params.white_noise_w)?;

    let network = create_flat((0, 0), Position::default(), params, rng)?;
    let neighbour = create_flat((1, 0), params.second_offset, params, rng)?;
    let foreign_ap = &neighbour.access_point;

    let classification = classify(&network, foreign_ap, model, params.white_noise_w);
    let ap_is_cochannel =
        is_cochannel_interference(foreign_ap, &network.access_point, model, params.white_noise_w);
    let downlink_sinr = network
        .mobile_stations
        .iter()
        .map(|ms| isolated_sinr(&network.access_point, ms, foreign_ap, model, params.white_noise_w))
        .collect();

    debug!(
        "Coexistence: {} co-channel, {} inter-channel stations, AP co-channel: {}",
        classification.cochannel.len(),
        classification.interchannel.len(),
        ap_is_cochannel
    );

    Ok(CoexistenceReport {
        network,
        neighbour,
        classification,
        ap_is_cochannel,
        downlink_sinr,
    })
}
