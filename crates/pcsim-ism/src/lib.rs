//! # pcsim-ism
//!
//! Power allocation game for transmitter/receiver pairs sharing an ISM band.
//!
//! Every transmitter maximises its own utility `ln(1 + SINR) - c·p`, where
//! `c` is the price of power. The best response to the current interference
//! is `p = 1/c - (I + σ²)/h`, so repeated best responses walk the system
//! toward the Nash equilibrium of the game.
//!
//! This crate provides:
//! - Link entities ([`Transmitter`], [`Receiver`]) and the system ([`IsmSystem`])
//! - SINR, utility and capacity evaluation
//! - Best-response power updates ([`IsmSystem::next_power_configuration`])
//! - Iterated play with convergence tracking ([`run_game`])

use pcsim_common::{
    require_positive, ConvergenceMonitor, ConvergenceReport, PathLoss, Position, SimError,
    SimResult,
};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

// ============================================================================
// Entities
// ============================================================================

/// A transmitter with its current power.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transmitter {
    /// Location.
    pub position: Position,
    /// Transmit power in watts.
    pub power_w: f64,
}

/// A receiver paired with exactly one transmitter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Receiver {
    /// Location.
    pub position: Position,
}

/// How random link topologies are laid out.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TopologyParams {
    /// Side of the square transmitters are placed in, in metres.
    pub area_m: f64,
    /// Receivers sit at `U(0, spread)` from their transmitter on each axis.
    pub receiver_spread_m: f64,
    /// Power every transmitter starts with, in watts.
    pub initial_power_w: f64,
}

impl Default for TopologyParams {
    fn default() -> Self {
        TopologyParams {
            area_m: 100.0,
            receiver_spread_m: 40.0,
            initial_power_w: 0.1,
        }
    }
}

/// Whether users respond one after another or all at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateOrder {
    /// Gauss-Seidel: user k sees the powers already chosen by users before it.
    #[default]
    Sequential,
    /// Jacobi: every user responds to the same snapshot.
    Simultaneous,
}

/// Parameters of the game.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GameParams {
    /// White noise power at every receiver (σ²), in watts.
    pub noise_w: f64,
    /// Largest power a transmitter may choose, in watts.
    pub max_power_w: f64,
    /// Price of power `c` in the utility.
    pub price: f64,
    /// Replacement for non-positive best responses; power is never exactly zero.
    pub power_floor_w: f64,
    /// Update schedule.
    pub order: UpdateOrder,
}

impl GameParams {
    /// Default receiver noise power.
    pub const DEFAULT_NOISE_W: f64 = 1e-12;
    /// Default power floor.
    pub const DEFAULT_POWER_FLOOR_W: f64 = 1e-10;

    /// Check the parameters before playing.
    pub fn validate(&self) -> SimResult<()> {
        require_positive("noise_w", self.noise_w)?;
        require_positive("max_power_w", self.max_power_w)?;
        require_positive("price", self.price)?;
        require_positive("power_floor_w", self.power_floor_w)?;
        if self.power_floor_w > self.max_power_w {
            return Err(SimError::InvalidParameter {
                name: "power_floor_w",
                reason: format!(
                    "floor {} exceeds maximum power {}",
                    self.power_floor_w, self.max_power_w
                ),
            });
        }
        Ok(())
    }
}

impl Default for GameParams {
    fn default() -> Self {
        GameParams {
            noise_w: Self::DEFAULT_NOISE_W,
            max_power_w: 2.0,
            price: 0.5,
            power_floor_w: Self::DEFAULT_POWER_FLOOR_W,
            order: UpdateOrder::Sequential,
        }
    }
}

// ============================================================================
// System
// ============================================================================

/// A set of interfering transmitter/receiver pairs.
///
/// Transmitter `k` serves receiver `k`; every other transmitter interferes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IsmSystem {
    transmitters: Vec<Transmitter>,
    receivers: Vec<Receiver>,
}

impl IsmSystem {
    /// Build a system from explicit links.
    pub fn from_links(links: Vec<(Transmitter, Receiver)>) -> SimResult<Self> {
        if links.is_empty() {
            return Err(SimError::EmptyTopology(
                "an ISM system needs at least one link".to_string(),
            ));
        }
        let (transmitters, receivers) = links.into_iter().unzip();
        Ok(IsmSystem {
            transmitters,
            receivers,
        })
    }

    /// Place `n` random links.
    pub fn allocate<R: Rng>(n: usize, topology: &TopologyParams, rng: &mut R) -> SimResult<Self> {
        if n == 0 {
            return Err(SimError::EmptyTopology(
                "an ISM system needs at least one link".to_string(),
            ));
        }
        require_positive("area_m", topology.area_m)?;
        require_positive("initial_power_w", topology.initial_power_w)?;

        let links = (0..n)
            .map(|_| {
                let tx = Position::random_in(
                    rng,
                    Position::default(),
                    topology.area_m,
                    topology.area_m,
                );
                let rx = Position::random_in(
                    rng,
                    tx,
                    topology.receiver_spread_m,
                    topology.receiver_spread_m,
                );
                (
                    Transmitter {
                        position: tx,
                        power_w: topology.initial_power_w,
                    },
                    Receiver { position: rx },
                )
            })
            .collect();
        Self::from_links(links)
    }

    /// Number of links.
    pub fn len(&self) -> usize {
        self.transmitters.len()
    }

    /// Always false; construction rejects empty systems.
    pub fn is_empty(&self) -> bool {
        self.transmitters.is_empty()
    }

    /// Transmitters in link order.
    pub fn transmitters(&self) -> &[Transmitter] {
        &self.transmitters
    }

    /// Receivers in link order.
    pub fn receivers(&self) -> &[Receiver] {
        &self.receivers
    }

    /// Current powers in link order.
    pub fn powers(&self) -> Vec<f64> {
        self.transmitters.iter().map(|t| t.power_w).collect()
    }

    /// Path gain from transmitter `j` to receiver `k`.
    pub fn channel_gain(&self, j: usize, k: usize, model: &dyn PathLoss) -> f64 {
        let d = self.transmitters[j]
            .position
            .distance_to(&self.receivers[k].position);
        model.gain(d)
    }

    /// Interference plus noise seen by receiver `k`, in watts.
    pub fn interference_plus_noise(&self, k: usize, model: &dyn PathLoss, noise_w: f64) -> f64 {
        let interference: f64 = self
            .transmitters
            .iter()
            .enumerate()
            .filter(|(j, _)| *j != k)
            .map(|(j, tx)| self.channel_gain(j, k, model) * tx.power_w)
            .sum();
        interference + noise_w
    }

    /// SINR of link `k` (linear).
    pub fn sinr(&self, k: usize, model: &dyn PathLoss, noise_w: f64) -> f64 {
        let signal = self.channel_gain(k, k, model) * self.transmitters[k].power_w;
        signal / self.interference_plus_noise(k, model, noise_w)
    }

    /// Utility `ln(1 + SINR) - c·p` of link `k`.
    pub fn utility(&self, k: usize, model: &dyn PathLoss, noise_w: f64, price: f64) -> f64 {
        (1.0 + self.sinr(k, model, noise_w)).ln() - price * self.transmitters[k].power_w
    }

    /// Average Shannon capacity per link in bits/s/Hz.
    pub fn capacity_per_user(&self, model: &dyn PathLoss, noise_w: f64) -> f64 {
        let total: f64 = (0..self.len())
            .map(|k| (1.0 + self.sinr(k, model, noise_w)).log2())
            .sum();
        total / self.len() as f64
    }

    /// Sum of Shannon capacities over all links in bits/s/Hz.
    pub fn total_capacity(&self, model: &dyn PathLoss, noise_w: f64) -> f64 {
        self.capacity_per_user(model, noise_w) * self.len() as f64
    }

    /// Best response of link `k` to the current interference.
    pub fn best_response(&self, k: usize, model: &dyn PathLoss, params: &GameParams) -> f64 {
        let h_kk = self.channel_gain(k, k, model);
        let p = 1.0 / params.price - self.interference_plus_noise(k, model, params.noise_w) / h_kk;
        if p <= 0.0 {
            params.power_floor_w
        } else {
            p.min(params.max_power_w)
        }
    }

    /// Let every user play its best response once.
    pub fn next_power_configuration(&mut self, model: &dyn PathLoss, params: &GameParams) {
        match params.order {
            UpdateOrder::Sequential => {
                for k in 0..self.len() {
                    self.transmitters[k].power_w = self.best_response(k, model, params);
                }
            }
            UpdateOrder::Simultaneous => {
                let next: Vec<f64> = (0..self.len())
                    .map(|k| self.best_response(k, model, params))
                    .collect();
                for (tx, p) in self.transmitters.iter_mut().zip(next) {
                    tx.power_w = p;
                }
            }
        }
    }
}

// ============================================================================
// Iterated Play
// ============================================================================

/// Record of an iterated game.
#[derive(Debug, Clone, Serialize)]
pub struct GameTrace {
    /// `powers[user][t]`: power of each user before play (`t = 0`) and after
    /// every iteration.
    pub powers: Vec<Vec<f64>>,
    /// Capacity per user before the first iteration, bits/s/Hz.
    pub capacity_before: f64,
    /// Capacity per user after the last iteration, bits/s/Hz.
    pub capacity_after: f64,
    /// Total system capacity after the last iteration, bits/s/Hz.
    pub total_capacity_after: f64,
    /// How the powers settled.
    pub convergence: ConvergenceReport,
}

/// Play `iterations` rounds of best responses.
pub fn run_game(
    system: &mut IsmSystem,
    model: &dyn PathLoss,
    params: &GameParams,
    iterations: usize,
    tolerance: f64,
) -> SimResult<GameTrace> {
    params.validate()?;
    if iterations == 0 {
        return Err(SimError::InvalidParameter {
            name: "iterations",
            reason: "the game needs at least one iteration".to_string(),
        });
    }

    let mut powers: Vec<Vec<f64>> = system
        .transmitters()
        .iter()
        .map(|t| {
            let mut series = Vec::with_capacity(iterations + 1);
            series.push(t.power_w);
            series
        })
        .collect();

    let capacity_before = system.capacity_per_user(model, params.noise_w);
    debug!(
        "ISM game: {} users, capacity before play {:.4} bits/s/Hz",
        system.len(),
        capacity_before
    );

    let mut monitor = ConvergenceMonitor::new(tolerance);
    monitor.start(&system.powers());

    for iteration in 0..iterations {
        system.next_power_configuration(model, params);
        let current = system.powers();
        for (series, p) in powers.iter_mut().zip(&current) {
            series.push(*p);
        }
        let delta = monitor.observe(&current);
        trace!("ISM game: iteration {} max power change {:.3e} W", iteration + 1, delta);
    }

    let capacity_after = system.capacity_per_user(model, params.noise_w);
    if !capacity_after.is_finite() {
        return Err(SimError::NonFinite {
            quantity: "capacity",
            value: capacity_after,
        });
    }

    let convergence = monitor.report();
    debug!(
        "ISM game: capacity after {} iterations {:.4} bits/s/Hz (converged: {})",
        iterations, capacity_after, convergence.converged
    );

    Ok(GameTrace {
        powers,
        capacity_before,
        capacity_after,
        total_capacity_after: system.total_capacity(model, params.noise_w),
        convergence,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pcsim_common::{seeded_rng, ItuIndoorPathLoss};

    fn link(tx: (f64, f64), rx: (f64, f64), p: f64) -> (Transmitter, Receiver) {
        (
            Transmitter {
                position: Position::new(tx.0, tx.1),
                power_w: p,
            },
            Receiver {
                position: Position::new(rx.0, rx.1),
            },
        )
    }

    #[test]
    fn test_allocate_places_links_in_area() {
        let mut rng = seeded_rng(1);
        let topology = TopologyParams::default();
        let system = IsmSystem::allocate(25, &topology, &mut rng).unwrap();
        assert_eq!(system.len(), 25);
        for (tx, rx) in system.transmitters().iter().zip(system.receivers()) {
            assert!(tx.position.x >= 0.0 && tx.position.x < 100.0);
            assert!(tx.position.y >= 0.0 && tx.position.y < 100.0);
            assert!(rx.position.x >= tx.position.x && rx.position.x < tx.position.x + 40.0);
            assert!(rx.position.y >= tx.position.y && rx.position.y < tx.position.y + 40.0);
            assert_eq!(tx.power_w, 0.1);
        }
    }

    #[test]
    fn test_allocate_rejects_empty_system() {
        let mut rng = seeded_rng(1);
        let result = IsmSystem::allocate(0, &TopologyParams::default(), &mut rng);
        assert!(matches!(result, Err(SimError::EmptyTopology(_))));
    }

    #[test]
    fn test_single_link_sinr_is_snr() {
        let model = ItuIndoorPathLoss::default();
        let system = IsmSystem::from_links(vec![link((0.0, 0.0), (10.0, 0.0), 0.1)]).unwrap();
        let expected = model.gain(10.0) * 0.1 / 1e-12;
        let sinr = system.sinr(0, &model, 1e-12);
        assert!((sinr - expected).abs() / expected < 1e-12);
    }

    #[test]
    fn test_interference_lowers_sinr() {
        let model = ItuIndoorPathLoss::default();
        let alone = IsmSystem::from_links(vec![link((0.0, 0.0), (5.0, 0.0), 0.1)]).unwrap();
        let shared = IsmSystem::from_links(vec![
            link((0.0, 0.0), (5.0, 0.0), 0.1),
            link((8.0, 0.0), (12.0, 0.0), 0.1),
        ])
        .unwrap();
        assert!(shared.sinr(0, &model, 1e-12) < alone.sinr(0, &model, 1e-12));
    }

    #[test]
    fn test_best_response_clipped_to_max_power() {
        let model = ItuIndoorPathLoss::default();
        let system = IsmSystem::from_links(vec![link((0.0, 0.0), (1.0, 0.0), 0.1)]).unwrap();
        let params = GameParams {
            max_power_w: 1.0,
            ..GameParams::default()
        };
        // 1/c = 2 W is above the cap.
        assert_eq!(system.best_response(0, &model, &params), 1.0);
    }

    #[test]
    fn test_best_response_unclipped_value() {
        let model = ItuIndoorPathLoss::default();
        let system = IsmSystem::from_links(vec![link((0.0, 0.0), (1.0, 0.0), 0.1)]).unwrap();
        let params = GameParams {
            max_power_w: 4.0,
            ..GameParams::default()
        };
        let expected = 2.0 - 1e-12 / model.gain(1.0);
        assert!((system.best_response(0, &model, &params) - expected).abs() < 1e-12);
    }

    #[test]
    fn test_best_response_uses_floor_for_hopeless_link() {
        let model = ItuIndoorPathLoss::default();
        // At 1 km the noise alone needs more than 1/c watts to overcome.
        let system = IsmSystem::from_links(vec![link((0.0, 0.0), (1000.0, 0.0), 0.1)]).unwrap();
        let params = GameParams::default();
        assert_eq!(system.best_response(0, &model, &params), params.power_floor_w);
    }

    #[test]
    fn test_best_response_maximises_utility() {
        let model = ItuIndoorPathLoss::default();
        let mut system = IsmSystem::from_links(vec![
            link((0.0, 0.0), (3.0, 0.0), 0.1),
            link((20.0, 0.0), (24.0, 0.0), 0.1),
        ])
        .unwrap();
        let params = GameParams {
            max_power_w: 10.0,
            ..GameParams::default()
        };
        let best = system.best_response(0, &model, &params);
        system.transmitters[0].power_w = best;
        let u_best = system.utility(0, &model, params.noise_w, params.price);
        for factor in [0.5, 0.9, 1.1, 1.5] {
            system.transmitters[0].power_w = best * factor;
            assert!(system.utility(0, &model, params.noise_w, params.price) <= u_best);
        }
    }

    #[test]
    fn test_powers_stay_within_bounds() {
        let model = ItuIndoorPathLoss::default();
        let mut rng = seeded_rng(3);
        let mut system = IsmSystem::allocate(10, &TopologyParams::default(), &mut rng).unwrap();
        let params = GameParams::default();
        for _ in 0..10 {
            system.next_power_configuration(&model, &params);
            for p in system.powers() {
                assert!(p > 0.0);
                assert!(p <= params.max_power_w);
            }
        }
    }

    #[test]
    fn test_run_game_records_every_iteration() {
        let model = ItuIndoorPathLoss::default();
        let mut rng = seeded_rng(11);
        let mut system = IsmSystem::allocate(10, &TopologyParams::default(), &mut rng).unwrap();
        let trace = run_game(&mut system, &model, &GameParams::default(), 20, 1e-6).unwrap();
        assert_eq!(trace.powers.len(), 10);
        for series in &trace.powers {
            assert_eq!(series.len(), 21);
            assert_eq!(series[0], 0.1);
        }
        assert!(trace.capacity_after.is_finite());
        assert!((trace.total_capacity_after - trace.capacity_after * 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_two_separated_links_converge() {
        let model = ItuIndoorPathLoss::default();
        let mut system = IsmSystem::from_links(vec![
            link((0.0, 0.0), (5.0, 5.0), 0.1),
            link((60.0, 60.0), (65.0, 65.0), 0.1),
        ])
        .unwrap();
        let trace = run_game(&mut system, &model, &GameParams::default(), 20, 1e-9).unwrap();
        assert!(trace.convergence.converged);
        assert!(trace.convergence.iteration.unwrap() <= 20);
    }

    #[test]
    fn test_coupled_pair_settles_at_default_tolerance() {
        let model = ItuIndoorPathLoss::default();
        // Each receiver is 5 m from its own transmitter and 10 m from the
        // other one, so the cross gain is 1/8 of the direct gain.
        let mut system = IsmSystem::from_links(vec![
            link((0.0, 0.0), (5.0, 0.0), 0.1),
            link((15.0, 0.0), (10.0, 0.0), 0.1),
        ])
        .unwrap();
        let params = GameParams::default();
        let trace = run_game(
            &mut system,
            &model,
            &params,
            20,
            ConvergenceMonitor::DEFAULT_TOLERANCE,
        )
        .unwrap();
        assert!(trace.convergence.converged);
        assert_eq!(trace.convergence.iteration, Some(5));

        let h = model.gain(5.0);
        let cross = model.gain(10.0);
        let equilibrium = (1.0 / params.price - params.noise_w / h) / (1.0 + cross / h);
        for p in system.powers() {
            assert!((p - equilibrium).abs() < 1e-9, "power {} vs {}", p, equilibrium);
        }
    }

    #[test]
    fn test_total_capacity_sums_links() {
        let model = ItuIndoorPathLoss::default();
        let system = IsmSystem::from_links(vec![
            link((0.0, 0.0), (5.0, 0.0), 0.1),
            link((15.0, 0.0), (10.0, 0.0), 0.1),
        ])
        .unwrap();
        let expected: f64 = (0..2).map(|k| (1.0 + system.sinr(k, &model, 1e-12)).log2()).sum();
        assert!((system.total_capacity(&model, 1e-12) - expected).abs() < 1e-9);
    }

    #[test]
    fn test_zero_iterations_rejected() {
        let model = ItuIndoorPathLoss::default();
        let mut system = IsmSystem::from_links(vec![link((0.0, 0.0), (1.0, 0.0), 0.1)]).unwrap();
        let result = run_game(&mut system, &model, &GameParams::default(), 0, 1e-6);
        assert!(matches!(
            result,
            Err(SimError::InvalidParameter {
                name: "iterations",
                ..
            })
        ));
    }

    #[test]
    fn test_run_game_is_reproducible() {
        let model = ItuIndoorPathLoss::default();
        let run = |seed| {
            let mut rng = seeded_rng(seed);
            let mut system = IsmSystem::allocate(8, &TopologyParams::default(), &mut rng).unwrap();
            run_game(&mut system, &model, &GameParams::default(), 10, 1e-6)
                .unwrap()
                .powers
        };
        assert_eq!(run(99), run(99));
    }

    #[test]
    fn test_simultaneous_order_responds_to_snapshot() {
        let model = ItuIndoorPathLoss::default();
        let links = vec![
            link((0.0, 0.0), (4.0, 0.0), 0.1),
            link((6.0, 0.0), (10.0, 0.0), 0.1),
        ];
        let params = GameParams {
            order: UpdateOrder::Simultaneous,
            max_power_w: 10.0,
            ..GameParams::default()
        };
        let mut system = IsmSystem::from_links(links.clone()).unwrap();
        let snapshot = system.clone();
        system.next_power_configuration(&model, &params);
        for k in 0..2 {
            assert_eq!(system.powers()[k], snapshot.best_response(k, &model, &params));
        }
    }

    #[test]
    fn test_invalid_price_rejected() {
        let model = ItuIndoorPathLoss::default();
        let mut system = IsmSystem::from_links(vec![link((0.0, 0.0), (1.0, 0.0), 0.1)]).unwrap();
        let params = GameParams {
            price: 0.0,
            ..GameParams::default()
        };
        assert!(run_game(&mut system, &model, &params, 5, 1e-6).is_err());
    }
}
