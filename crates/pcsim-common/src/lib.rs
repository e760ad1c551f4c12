//! # pcsim-common
//!
//! Common types for the PCSim power-control simulators.
//!
//! This crate provides:
//! - Planar positions ([`Position`])
//! - Transmit power limits ([`PowerBounds`])
//! - Propagation models ([`propagation`])
//! - Seeded random number generation ([`seeded_rng`], [`derive_seed`])
//! - Convergence tracking for power iterations ([`ConvergenceMonitor`])

pub mod propagation;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use propagation::{ItuIndoorPathLoss, LogDistancePathLoss, PathLoss, PropagationModel};

// ============================================================================
// Error Types
// ============================================================================

/// Simulation errors.
#[derive(Debug, Error, PartialEq)]
pub enum SimError {
    /// A parameter is outside its valid range.
    #[error("Invalid parameter '{name}': {reason}")]
    InvalidParameter {
        /// Parameter name.
        name: &'static str,
        /// Why the value was rejected.
        reason: String,
    },

    /// A topology without the nodes required to evaluate it.
    #[error("Empty topology: {0}")]
    EmptyTopology(String),

    /// A computed quantity became NaN or infinite.
    #[error("Non-finite {quantity}: {value}")]
    NonFinite {
        /// Name of the quantity.
        quantity: &'static str,
        /// Offending value.
        value: f64,
    },
}

/// Result alias for simulation operations.
pub type SimResult<T> = Result<T, SimError>;

/// Reject values that are NaN, infinite or not strictly positive.
pub fn require_positive(name: &'static str, value: f64) -> SimResult<f64> {
    if !value.is_finite() || value <= 0.0 {
        return Err(SimError::InvalidParameter {
            name,
            reason: format!("must be a positive finite number, got {}", value),
        });
    }
    Ok(value)
}

// ============================================================================
// Geometry
// ============================================================================

/// Position on the simulation plane, in metres.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    /// X coordinate in metres.
    pub x: f64,
    /// Y coordinate in metres.
    pub y: f64,
}

impl Position {
    /// Create a new position.
    pub fn new(x: f64, y: f64) -> Self {
        Position { x, y }
    }

    /// Euclidean distance to another position in metres.
    pub fn distance_to(&self, other: &Position) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }

    /// Uniformly random position inside the rectangle anchored at `origin`.
    pub fn random_in<R: Rng>(rng: &mut R, origin: Position, width: f64, length: f64) -> Position {
        let x = origin.x + rng.gen::<f64>() * width;
        let y = origin.y + rng.gen::<f64>() * length;
        Position::new(x, y)
    }
}

// ============================================================================
// Power Limits
// ============================================================================

/// Inclusive transmit power range in watts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PowerBounds {
    /// Lowest allowed power in watts.
    pub min_w: f64,
    /// Highest allowed power in watts.
    pub max_w: f64,
}

impl Default for PowerBounds {
    /// One milliwatt to one watt.
    fn default() -> Self {
        PowerBounds {
            min_w: 0.001,
            max_w: 1.0,
        }
    }
}

impl PowerBounds {
    /// Create validated bounds.
    pub fn new(min_w: f64, max_w: f64) -> SimResult<Self> {
        if !min_w.is_finite() || !max_w.is_finite() {
            return Err(SimError::InvalidParameter {
                name: "power_bounds",
                reason: format!("bounds must be finite, got [{}, {}]", min_w, max_w),
            });
        }
        if min_w < 0.0 {
            return Err(SimError::InvalidParameter {
                name: "power_bounds",
                reason: format!("minimum power must not be negative, got {}", min_w),
            });
        }
        if min_w > max_w {
            return Err(SimError::InvalidParameter {
                name: "power_bounds",
                reason: format!("minimum {} exceeds maximum {}", min_w, max_w),
            });
        }
        Ok(PowerBounds { min_w, max_w })
    }

    /// Clip a power value into the bounds.
    pub fn clamp(&self, power_w: f64) -> f64 {
        power_w.clamp(self.min_w, self.max_w)
    }

    /// Check whether a power value lies inside the bounds.
    pub fn contains(&self, power_w: f64) -> bool {
        power_w >= self.min_w && power_w <= self.max_w
    }
}

// ============================================================================
// Randomness
// ============================================================================

/// Create the deterministic generator used by all simulations.
pub fn seeded_rng(seed: u64) -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(seed)
}

/// Draw a child seed from a parent generator.
///
/// Sub-topologies get their own stream so adding a network does not shift
/// the random positions of the ones before it.
pub fn derive_seed<R: Rng>(rng: &mut R) -> u64 {
    rng.gen()
}

// ============================================================================
// Convergence
// ============================================================================

/// Summary of how a power iteration settled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvergenceReport {
    /// Whether the largest power change fell below the tolerance.
    pub converged: bool,
    /// First iteration (1-based) whose change was below the tolerance.
    pub iteration: Option<usize>,
    /// Largest absolute power change in the last observed iteration.
    pub final_max_delta: f64,
    /// Tolerance used for the decision, in watts.
    pub tolerance: f64,
}

/// Tracks the per-iteration change of a power vector.
#[derive(Debug, Clone)]
pub struct ConvergenceMonitor {
    tolerance: f64,
    previous: Option<Vec<f64>>,
    iterations: usize,
    converged_at: Option<usize>,
    last_max_delta: f64,
}

impl ConvergenceMonitor {
    /// Default tolerance in watts.
    pub const DEFAULT_TOLERANCE: f64 = 1e-6;

    /// Create a monitor with the given tolerance in watts.
    pub fn new(tolerance: f64) -> Self {
        ConvergenceMonitor {
            tolerance,
            previous: None,
            iterations: 0,
            converged_at: None,
            last_max_delta: f64::INFINITY,
        }
    }

    /// Feed the initial power vector.
    pub fn start(&mut self, powers: &[f64]) {
        self.previous = Some(powers.to_vec());
        self.iterations = 0;
        self.converged_at = None;
        self.last_max_delta = f64::INFINITY;
    }

    /// Feed the power vector after one iteration and return the largest change.
    ///
    /// The first call without [`start`](Self::start) only records the baseline.
    pub fn observe(&mut self, powers: &[f64]) -> f64 {
        let delta = match &self.previous {
            Some(prev) => prev
                .iter()
                .zip(powers)
                .map(|(a, b)| (a - b).abs())
                .fold(0.0_f64, f64::max),
            None => {
                self.previous = Some(powers.to_vec());
                return f64::INFINITY;
            }
        };

        self.iterations += 1;
        self.last_max_delta = delta;
        if delta < self.tolerance {
            if self.converged_at.is_none() {
                self.converged_at = Some(self.iterations);
            }
        } else {
            self.converged_at = None;
        }
        self.previous = Some(powers.to_vec());
        delta
    }

    /// Number of iterations observed since the baseline.
    pub fn iterations(&self) -> usize {
        self.iterations
    }

    /// Build the report for the iterations seen so far.
    ///
    /// The run counts as converged only if it is still below the tolerance
    /// at the last observed iteration.
    pub fn report(&self) -> ConvergenceReport {
        ConvergenceReport {
            converged: self.converged_at.is_some(),
            iteration: self.converged_at,
            final_max_delta: self.last_max_delta,
            tolerance: self.tolerance,
        }
    }
}
