//! Access point power control rules.

use crate::interference::PEAK_DATA_RATE_MBPS;
use crate::station::{ControlMemory, Station};
use pcsim_common::{require_positive, PowerBounds, SimError, SimResult};
use serde::{Deserialize, Serialize};

/// Step used by the additive rules and as the first move of the
/// proportional controller, in watts.
pub const POWER_INCREMENT_W: f64 = 0.05;

/// What an access point sees about its own network in one iteration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Observation {
    /// DCF normalised throughput `S`.
    pub normalised_throughput: f64,
    /// Mean downlink PHY rate `r` in Mb/s.
    pub data_rate_mbps: f64,
    /// Worst downlink SINR among the mobile stations (linear).
    pub min_sinr: f64,
}

impl Observation {
    /// Delivered throughput `S · r` in Mb/s.
    pub fn throughput_mbps(&self) -> f64 {
        self.normalised_throughput * self.data_rate_mbps
    }
}

/// How an access point picks its next transmit power.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PowerRule {
    /// Keep the initial power, as unmodified 802.11 equipment does.
    #[default]
    Standard,
    /// Move by a fixed step; reverse whenever throughput drops.
    HillClimb {
        /// Step size in watts.
        #[serde(default = "default_step_w")]
        step_w: f64,
    },
    /// Step proportionally to the change in `S·r/65 − cost·p`; reverse
    /// whenever that utility drops.
    Proportional {
        /// Upper power limit for this controller, in watts.
        max_power_w: f64,
        /// Utility lost per watt transmitted.
        power_cost: f64,
        /// Proportional gain.
        #[serde(default = "default_gain")]
        gain: f64,
    },
    /// Scale power so the worst station reaches the target SINR.
    TargetSinr {
        /// Target SINR (linear).
        target: f64,
    },
}

fn default_step_w() -> f64 {
    POWER_INCREMENT_W
}

fn default_gain() -> f64 {
    2.0
}

impl PowerRule {
    /// Short name used in logs and reports.
    pub fn name(&self) -> &'static str {
        match self {
            PowerRule::Standard => "standard",
            PowerRule::HillClimb { .. } => "hill_climb",
            PowerRule::Proportional { .. } => "proportional",
            PowerRule::TargetSinr { .. } => "target_sinr",
        }
    }

    /// Check rule parameters.
    pub fn validate(&self) -> SimResult<()> {
        match *self {
            PowerRule::Standard => Ok(()),
            PowerRule::HillClimb { step_w } => require_positive("step_w", step_w).map(|_| ()),
            PowerRule::Proportional {
                max_power_w,
                power_cost,
                gain,
            } => {
                require_positive("max_power_w", max_power_w)?;
                require_positive("gain", gain)?;
                if !power_cost.is_finite() || power_cost < 0.0 {
                    return Err(SimError::InvalidParameter {
                        name: "power_cost",
                        reason: format!("must be a non-negative finite number, got {}", power_cost),
                    });
                }
                Ok(())
            }
            PowerRule::TargetSinr { target } => require_positive("target", target).map(|_| ()),
        }
    }

    /// Power range this rule operates in, given the simulation-wide bounds.
    pub fn bounds(&self, default: PowerBounds) -> SimResult<PowerBounds> {
        match *self {
            PowerRule::Proportional { max_power_w, .. } => {
                PowerBounds::new(default.min_w, max_power_w)
            }
            _ => Ok(default),
        }
    }

    /// Utility the rule climbs, for the given observation and power.
    pub fn utility(&self, observation: &Observation, power_w: f64) -> f64 {
        match *self {
            PowerRule::Proportional { power_cost, .. } => {
                observation.throughput_mbps() / PEAK_DATA_RATE_MBPS - power_cost * power_w
            }
            _ => observation.throughput_mbps(),
        }
    }

    /// Choose the next power of `station` and update its controller memory.
    ///
    /// The station's power itself is left untouched; the caller applies the
    /// returned value once every access point has decided.
    pub fn next_power(
        &self,
        station: &mut Station,
        observation: &Observation,
        bounds: PowerBounds,
    ) -> f64 {
        let power = station.power_w;
        let utility = self.utility(observation, power);
        let memory = &mut station.memory;

        let next = match *self {
            PowerRule::Standard => power,
            PowerRule::HillClimb { step_w } => {
                if memory.iteration > 0 && utility < memory.u_ref {
                    memory.direction = -memory.direction;
                }
                bounds.clamp(power + memory.direction * step_w)
            }
            PowerRule::Proportional {
                max_power_w, gain, ..
            } => {
                let step = if memory.iteration == 0 {
                    POWER_INCREMENT_W
                } else {
                    let error = utility - memory.u_ref;
                    if error < 0.0 {
                        memory.direction = -memory.direction;
                    }
                    gain * error.abs() * max_power_w
                };
                bounds.clamp(power + memory.direction * step)
            }
            PowerRule::TargetSinr { target } => {
                if observation.min_sinr > 0.0 && observation.min_sinr.is_finite() {
                    bounds.clamp(power * target / observation.min_sinr)
                } else {
                    bounds.max_w
                }
            }
        };

        remember(memory, utility);
        next
    }
}

fn remember(memory: &mut ControlMemory, utility: f64) {
    memory.u_ref = utility;
    memory.iteration += 1;
}
