//! Stations, networks and grid topologies.

use pcsim_common::{derive_seed, require_positive, seeded_rng, Position, SimError, SimResult};
use rand::Rng;
use serde::{Deserialize, Serialize};

// ============================================================================
// Constants
// ============================================================================

/// Initial access point transmit power in watts.
pub const AP_INITIAL_POWER_W: f64 = 0.1;
/// Initial mobile station transmit power in watts.
pub const MS_INITIAL_POWER_W: f64 = 0.1;
/// Minimum SNR an access point needs to decode a neighbour.
pub const AP_INITIAL_SNR_FLOOR: f64 = 20.0;
/// Minimum SNR a mobile station needs to decode a neighbour.
pub const MS_INITIAL_SNR_FLOOR: f64 = 2.0;
/// Receive antenna gain of an omnidirectional device.
pub const UNITY_GAIN: f64 = 1.0;
/// Receive antenna gain of a non-standard (directional) access point.
pub const AP_GAIN: f64 = 10.0;
/// Probability that an access point has a frame queued.
pub const AP_PROBABILITY_OF_NONEMPTY_BUFFER: f64 = 0.97;
/// Probability that a mobile station has a frame queued.
pub const MS_PROBABILITY_OF_NONEMPTY_BUFFER: f64 = 0.4;

// ============================================================================
// Station
// ============================================================================

/// State a power controller keeps between iterations.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ControlMemory {
    /// Utility observed in the latest iteration.
    pub u_ref: f64,
    /// Number of updates applied so far.
    pub iteration: usize,
    /// Direction of the last power move, `+1.0` or `-1.0`.
    pub direction: f64,
}

impl Default for ControlMemory {
    fn default() -> Self {
        ControlMemory {
            u_ref: 0.0,
            iteration: 0,
            direction: 1.0,
        }
    }
}

/// An 802.11 station: either an access point or a mobile station.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Station {
    /// Location.
    pub position: Position,
    /// Transmit power in watts.
    pub power_w: f64,
    /// Probability of a non-empty transmit buffer.
    pub contention_q: f64,
    /// Receive antenna gain (linear).
    pub antenna_gain: f64,
    /// SNR above which a neighbour is heard and contended with instead of
    /// counted as interference.
    pub snr_floor: f64,
    /// Power controller state.
    #[serde(skip)]
    pub memory: ControlMemory,
}

impl Station {
    /// Access point at `position`. Standard access points use an
    /// omnidirectional antenna; others get [`AP_GAIN`].
    pub fn access_point(position: Position, is_standard: bool) -> Self {
        Station {
            position,
            power_w: AP_INITIAL_POWER_W,
            contention_q: AP_PROBABILITY_OF_NONEMPTY_BUFFER,
            antenna_gain: if is_standard { UNITY_GAIN } else { AP_GAIN },
            snr_floor: AP_INITIAL_SNR_FLOOR,
            memory: ControlMemory::default(),
        }
    }

    /// Mobile station at `position`.
    pub fn mobile(position: Position) -> Self {
        Station {
            position,
            power_w: MS_INITIAL_POWER_W,
            contention_q: MS_PROBABILITY_OF_NONEMPTY_BUFFER,
            antenna_gain: UNITY_GAIN,
            snr_floor: MS_INITIAL_SNR_FLOOR,
            memory: ControlMemory::default(),
        }
    }

    /// Distance to another station in metres.
    pub fn distance_to(&self, other: &Station) -> f64 {
        self.position.distance_to(&other.position)
    }
}

// ============================================================================
// Network
// ============================================================================

/// Grid coordinate of a network: `(column, row)`.
pub type NetworkIndex = (usize, usize);

/// One access point and its associated mobile stations inside a cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Network {
    /// Position of the network in the grid.
    pub index: NetworkIndex,
    /// Lower-left corner of the cell.
    pub offset: Position,
    /// Cell width in metres.
    pub width: f64,
    /// Cell length in metres.
    pub length: f64,
    /// The access point.
    pub access_point: Station,
    /// Associated mobile stations.
    pub mobile_stations: Vec<Station>,
}

impl Network {
    /// Create a network with an access point and no stations.
    pub fn new(
        index: NetworkIndex,
        offset: Position,
        width: f64,
        length: f64,
        access_point: Station,
    ) -> Self {
        Network {
            index,
            offset,
            width,
            length,
            access_point,
            mobile_stations: Vec::new(),
        }
    }

    /// Place an access point and `num_stations` mobile stations uniformly
    /// inside the cell.
    pub fn random<R: Rng>(
        index: NetworkIndex,
        offset: Position,
        width: f64,
        length: f64,
        num_stations: usize,
        is_standard: bool,
        rng: &mut R,
    ) -> SimResult<Self> {
        if num_stations == 0 {
            return Err(SimError::EmptyTopology(format!(
                "network {:?} needs at least one mobile station",
                index
            )));
        }
        require_positive("width", width)?;
        require_positive("length", length)?;

        let ap_position = Position::random_in(rng, offset, width, length);
        let ap = Station::access_point(ap_position, is_standard);
        let mut network = Network::new(index, offset, width, length, ap);
        network.add_random_mobile_stations(num_stations, rng);
        Ok(network)
    }

    /// Add mobile stations at uniformly random positions inside the cell.
    pub fn add_random_mobile_stations<R: Rng>(&mut self, num_stations: usize, rng: &mut R) {
        for _ in 0..num_stations {
            let position = Position::random_in(rng, self.offset, self.width, self.length);
            self.mobile_stations.push(Station::mobile(position));
        }
    }

    /// Every station of the network, mobile stations first.
    pub fn all_stations(&self) -> impl Iterator<Item = &Station> {
        self.mobile_stations
            .iter()
            .chain(std::iter::once(&self.access_point))
    }

    /// Number of stations including the access point.
    pub fn station_count(&self) -> usize {
        self.mobile_stations.len() + 1
    }
}

// ============================================================================
// Grid
// ============================================================================

/// Layout of a rectangular grid of networks.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GridParams {
    /// Networks along x.
    pub columns: usize,
    /// Networks along y.
    pub rows: usize,
    /// Cell width in metres.
    pub width_m: f64,
    /// Cell length in metres.
    pub length_m: f64,
    /// Gap between neighbouring cells along x, in metres.
    pub x_space_m: f64,
    /// Gap between neighbouring cells along y, in metres.
    pub y_space_m: f64,
    /// Mobile stations per network.
    pub stations_per_network: usize,
    /// Use omnidirectional access points.
    pub standard: bool,
}

impl Default for GridParams {
    fn default() -> Self {
        GridParams {
            columns: 5,
            rows: 4,
            width_m: 7.0,
            length_m: 7.0,
            x_space_m: 7.0,
            y_space_m: 7.0,
            stations_per_network: 6,
            standard: false,
        }
    }
}

/// Build the `columns × rows` grid of random networks.
///
/// Network `(i, j)` occupies the cell at
/// `(i·(width + x_space), j·(length + y_space))` and draws its positions from
/// its own generator seeded from `rng`.
pub fn create_networks<R: Rng>(grid: &GridParams, rng: &mut R) -> SimResult<Vec<Network>> {
    if grid.columns == 0 || grid.rows == 0 {
        return Err(SimError::EmptyTopology(format!(
            "grid of {}x{} networks",
            grid.columns, grid.rows
        )));
    }
    if grid.x_space_m < 0.0 || grid.y_space_m < 0.0 {
        return Err(SimError::InvalidParameter {
            name: "spacing",
            reason: "cell spacing must not be negative".to_string(),
        });
    }

    let mut networks = Vec::with_capacity(grid.columns * grid.rows);
    for i in 0..grid.columns {
        for j in 0..grid.rows {
            let offset = Position::new(
                i as f64 * (grid.width_m + grid.x_space_m),
                j as f64 * (grid.length_m + grid.y_space_m),
            );
            let mut network_rng = seeded_rng(derive_seed(rng));
            networks.push(Network::random(
                (i, j),
                offset,
                grid.width_m,
                grid.length_m,
                grid.stations_per_network,
                grid.standard,
                &mut network_rng,
            )?);
        }
    }
    Ok(networks)
}
