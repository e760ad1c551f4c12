//! Path loss models and power unit conversions.
//!
//! All models work on linear watts at the boundary: [`PathLoss::gain`]
//! returns the fraction of transmitted power that reaches the receiver.

use serde::{Deserialize, Serialize};

/// Convert a dB value to a linear ratio.
pub fn db_to_linear(db: f64) -> f64 {
    10.0_f64.powf(db / 10.0)
}

/// Convert a linear ratio to dB.
pub fn linear_to_db(linear: f64) -> f64 {
    10.0 * linear.log10()
}

/// Convert watts to dBm.
pub fn watts_to_dbm(watts: f64) -> f64 {
    linear_to_db(watts) + 30.0
}

/// Convert dBm to watts.
pub fn dbm_to_watts(dbm: f64) -> f64 {
    db_to_linear(dbm - 30.0)
}

/// Signal to interference plus noise ratio (linear).
pub fn sinr(signal_w: f64, interference_w: f64, noise_w: f64) -> f64 {
    signal_w / (interference_w + noise_w)
}

/// Attenuation of a radio signal over distance.
pub trait PathLoss {
    /// Path loss in dB at the given distance in metres.
    fn loss_db(&self, distance_m: f64) -> f64;

    /// Linear path gain at the given distance.
    fn gain(&self, distance_m: f64) -> f64 {
        1.0 / db_to_linear(self.loss_db(distance_m))
    }
}

/// ITU-R P.1238 indoor site-general model.
///
/// `L = 20 log10(f) + N log10(d) + Lf - 28` with `f` in MHz and `d` in metres.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ItuIndoorPathLoss {
    /// Carrier frequency in MHz.
    pub frequency_mhz: f64,
    /// Distance power loss coefficient N.
    pub distance_coefficient: f64,
    /// Floor penetration loss Lf in dB.
    pub floor_penetration_db: f64,
    /// Distances below this are evaluated at this distance (the model is
    /// only defined beyond 1 m).
    pub min_distance_m: f64,
}

impl ItuIndoorPathLoss {
    /// 2.4 GHz ISM band centre frequency used by both simulators.
    pub const DEFAULT_FREQUENCY_MHZ: f64 = 2400.0;
    /// Residential distance power loss coefficient.
    pub const DEFAULT_DISTANCE_COEFFICIENT: f64 = 30.0;
    /// Single-floor penetration loss.
    pub const DEFAULT_FLOOR_PENETRATION_DB: f64 = 14.0;
}

impl Default for ItuIndoorPathLoss {
    fn default() -> Self {
        ItuIndoorPathLoss {
            frequency_mhz: Self::DEFAULT_FREQUENCY_MHZ,
            distance_coefficient: Self::DEFAULT_DISTANCE_COEFFICIENT,
            floor_penetration_db: Self::DEFAULT_FLOOR_PENETRATION_DB,
            min_distance_m: 1.0,
        }
    }
}

impl PathLoss for ItuIndoorPathLoss {
    fn loss_db(&self, distance_m: f64) -> f64 {
        let d = distance_m.max(self.min_distance_m);
        20.0 * self.frequency_mhz.log10() + self.distance_coefficient * d.log10()
            + self.floor_penetration_db
            - 28.0
    }
}

/// Generic log-distance model `L = L0 + 10 n log10(d / d0)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LogDistancePathLoss {
    /// Path loss exponent n.
    pub exponent: f64,
    /// Loss at the reference distance in dB.
    pub reference_loss_db: f64,
    /// Reference distance d0 in metres; closer distances are clamped to it.
    pub reference_distance_m: f64,
}

impl Default for LogDistancePathLoss {
    fn default() -> Self {
        // Free space at 2.4 GHz, 1 m reference.
        LogDistancePathLoss {
            exponent: 2.0,
            reference_loss_db: 40.05,
            reference_distance_m: 1.0,
        }
    }
}

impl PathLoss for LogDistancePathLoss {
    fn loss_db(&self, distance_m: f64) -> f64 {
        let d = distance_m.max(self.reference_distance_m);
        self.reference_loss_db + 10.0 * self.exponent * (d / self.reference_distance_m).log10()
    }
}

/// Selectable propagation model, as it appears in scenario files.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PropagationModel {
    /// ITU-R P.1238 indoor model.
    ItuIndoor(ItuIndoorPathLoss),
    /// Log-distance model.
    LogDistance(LogDistancePathLoss),
}

impl Default for PropagationModel {
    fn default() -> Self {
        PropagationModel::ItuIndoor(ItuIndoorPathLoss::default())
    }
}

impl PathLoss for PropagationModel {
    fn loss_db(&self, distance_m: f64) -> f64 {
        match self {
            PropagationModel::ItuIndoor(m) => m.loss_db(distance_m),
            PropagationModel::LogDistance(m) => m.loss_db(distance_m),
        }
    }
}
