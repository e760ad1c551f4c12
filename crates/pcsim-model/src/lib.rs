//! # pcsim-model
//!
//! YAML scenario loading for PCSim.
//!
//! A scenario holds the parameters of every simulation the runner knows
//! about. Each section and every field inside it is optional and falls back
//! to the built-in default, so an empty document is a valid scenario:
//!
//! ```yaml
//! seed: 7
//! propagation:
//!   type: itu_indoor
//! ism:
//!   users: 10
//!   game:
//!     price: 0.5
//! wlan:
//!   grid:
//!     columns: 5
//!     rows: 4
//!   control:
//!     rule:
//!       type: hill_climb
//! ```

use pcsim_common::{ConvergenceMonitor, PowerBounds, PropagationModel, SimError};
use pcsim_ism::{GameParams, TopologyParams};
use pcsim_wlan::{CoexistenceParams, GridParams, WlanParams};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing::debug;

// ============================================================================
// Error Types
// ============================================================================

/// Errors that can occur while loading a scenario.
#[derive(Debug, Error)]
pub enum ModelError {
    /// YAML parsing error.
    #[error("YAML parse error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// IO error.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl From<SimError> for ModelError {
    fn from(err: SimError) -> Self {
        ModelError::InvalidConfig(err.to_string())
    }
}

// ============================================================================
// Scenario Schema
// ============================================================================

/// A complete simulation scenario.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Scenario {
    /// Seed for every random draw of a run.
    pub seed: u64,
    /// Path loss model shared by all simulations.
    pub propagation: PropagationModel,
    /// ISM-band power game.
    pub ism: IsmScenario,
    /// 802.11 grid power control.
    pub wlan: WlanScenario,
    /// Two-flat coexistence analysis.
    pub coexistence: CoexistenceParams,
}

/// Parameters of the ISM power game.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IsmScenario {
    /// Number of transmitter/receiver pairs.
    pub users: usize,
    /// Number of best-response rounds.
    pub iterations: usize,
    /// Largest power change, in watts, that still counts as settled.
    pub tolerance: f64,
    /// Random link placement.
    pub topology: TopologyParams,
    /// Game parameters.
    pub game: GameParams,
}

impl Default for IsmScenario {
    fn default() -> Self {
        IsmScenario {
            users: 10,
            iterations: 20,
            tolerance: ConvergenceMonitor::DEFAULT_TOLERANCE,
            topology: TopologyParams::default(),
            game: GameParams::default(),
        }
    }
}

/// Parameters of the 802.11 grid simulation.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WlanScenario {
    /// Grid layout.
    pub grid: GridParams,
    /// Power control run.
    pub control: WlanParams,
}

impl Scenario {
    /// Check every section for values the simulations cannot run with.
    pub fn validate(&self) -> Result<(), ModelError> {
        self.ism.validate()?;
        self.wlan.validate()?;
        self.validate_coexistence()?;
        Ok(())
    }

    fn validate_coexistence(&self) -> Result<(), ModelError> {
        let c = &self.coexistence;
        if c.stations == 0 {
            return Err(ModelError::InvalidConfig(
                "coexistence.stations must be at least 1".to_string(),
            ));
        }
        for (name, value) in [
            ("coexistence.flat_width_m", c.flat_width_m),
            ("coexistence.flat_length_m", c.flat_length_m),
            ("coexistence.white_noise_w", c.white_noise_w),
            ("coexistence.sinr_floor", c.sinr_floor),
        ] {
            positive(name, value)?;
        }
        for (name, value) in [
            ("coexistence.ap_power_w", c.ap_power_w),
            ("coexistence.ms_power_w", c.ms_power_w),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ModelError::InvalidConfig(format!(
                    "{} must be a non-negative number, got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }
}

impl IsmScenario {
    /// Check the game and topology parameters.
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.users == 0 {
            return Err(ModelError::InvalidConfig("ism.users must be at least 1".to_string()));
        }
        if self.iterations == 0 {
            return Err(ModelError::InvalidConfig(
                "ism.iterations must be at least 1".to_string(),
            ));
        }
        positive("ism.tolerance", self.tolerance)?;
        positive("ism.topology.area_m", self.topology.area_m)?;
        if !self.topology.receiver_spread_m.is_finite() || self.topology.receiver_spread_m < 0.0 {
            return Err(ModelError::InvalidConfig(format!(
                "ism.topology.receiver_spread_m must be a non-negative number, got {}",
                self.topology.receiver_spread_m
            )));
        }
        positive("ism.topology.initial_power_w", self.topology.initial_power_w)?;
        self.game.validate()?;
        Ok(())
    }
}

impl WlanScenario {
    /// Check the grid layout and the power control run.
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.grid.columns == 0 || self.grid.rows == 0 {
            return Err(ModelError::InvalidConfig(format!(
                "wlan.grid must have at least one network, got {}x{}",
                self.grid.columns, self.grid.rows
            )));
        }
        if self.control.iterations == 0 {
            return Err(ModelError::InvalidConfig(
                "wlan.control.iterations must be at least 1".to_string(),
            ));
        }
        if self.grid.stations_per_network == 0 {
            return Err(ModelError::InvalidConfig(
                "wlan.grid.stations_per_network must be at least 1".to_string(),
            ));
        }
        positive("wlan.grid.width_m", self.grid.width_m)?;
        positive("wlan.grid.length_m", self.grid.length_m)?;
        positive("wlan.control.noise_w", self.control.noise_w)?;
        positive("wlan.control.tolerance_w", self.control.tolerance_w)?;
        PowerBounds::new(self.control.bounds.min_w, self.control.bounds.max_w)?;
        self.control.rule.validate()?;
        self.control.rule.bounds(self.control.bounds)?;
        Ok(())
    }
}

fn positive(name: &str, value: f64) -> Result<(), ModelError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ModelError::InvalidConfig(format!(
            "{} must be a positive number, got {}",
            name, value
        )))
    }
}

// ============================================================================
// Loading
// ============================================================================

/// Load a scenario from a YAML file.
pub fn load_scenario(path: &Path) -> Result<Scenario, ModelError> {
    debug!("Loading scenario from {}", path.display());
    let yaml = std::fs::read_to_string(path)?;
    load_scenario_from_str(&yaml)
}

/// Parse and validate a scenario from a YAML string.
pub fn load_scenario_from_str(yaml_str: &str) -> Result<Scenario, ModelError> {
    // serde_yaml rejects an empty document, which should mean "all defaults".
    let scenario: Scenario = if yaml_str.trim().is_empty() {
        Scenario::default()
    } else {
        serde_yaml::from_str(yaml_str)?
    };
    scenario.validate()?;
    Ok(scenario)
}

/// Render a scenario as YAML that [`load_scenario_from_str`] accepts.
pub fn to_yaml(scenario: &Scenario) -> Result<String, ModelError> {
    Ok(serde_yaml::to_string(scenario)?)
}
