//! # pcsim
//!
//! CLI runner for the PCSim power-control simulators.

use pcsim_model::{load_scenario, to_yaml, Scenario};
use pcsim_runner::{run_coexistence, run_ism, run_wlan, write_report, RunnerError};
use pcsim_wlan::{PowerRule, POWER_INCREMENT_W};

use clap::{Args, Parser, Subcommand, ValueEnum};
use pcsim_ism::UpdateOrder;
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Default SINR target of the target-SINR rule (MCS 7 threshold).
const DEFAULT_TARGET_SINR: f64 = 25.0;

// ============================================================================
// Command Line
// ============================================================================

/// PCSim - power control simulation for unlicensed radio networks
#[derive(Parser, Debug)]
#[command(name = "pcsim")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Play the ISM-band power allocation game on random links
    Ism(IsmConfig),
    /// Run AP power control on a grid of 802.11 networks
    Wlan(WlanConfig),
    /// Classify the stations of two neighbouring flats
    Coexistence(CoexistenceConfig),
    /// Print the default scenario as YAML
    Defaults,
}

/// Options shared by every simulation command
#[derive(Args, Debug, Clone, Default)]
pub struct ScenarioArgs {
    /// Scenario YAML file (defaults are used when omitted)
    pub scenario: Option<PathBuf>,

    /// Random seed (overrides the scenario)
    #[arg(short, long)]
    pub seed: Option<u64>,

    /// Write the JSON report to this file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Configuration for the ISM power game
#[derive(Parser, Debug)]
pub struct IsmConfig {
    #[command(flatten)]
    pub common: ScenarioArgs,

    /// Number of transmitter/receiver pairs
    #[arg(long)]
    pub users: Option<usize>,

    /// Number of best-response rounds
    #[arg(long)]
    pub iterations: Option<usize>,

    /// Price of power in the utility
    #[arg(long)]
    pub price: Option<f64>,

    /// Highest power a transmitter may choose, in watts
    #[arg(long)]
    pub max_power: Option<f64>,

    /// Let every user respond to the same snapshot
    #[arg(long)]
    pub simultaneous: bool,
}

/// Power rule selectable on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RuleKind {
    /// Fixed AP power
    Standard,
    /// Fixed steps, reversing when throughput drops
    HillClimb,
    /// Steps proportional to the utility change
    Proportional,
    /// Multiplicative update toward a target SINR
    TargetSinr,
}

/// Configuration for the 802.11 grid simulation
#[derive(Parser, Debug)]
pub struct WlanConfig {
    #[command(flatten)]
    pub common: ScenarioArgs,

    /// Number of observe/update rounds
    #[arg(long)]
    pub iterations: Option<usize>,

    /// Networks along x
    #[arg(long)]
    pub columns: Option<usize>,

    /// Networks along y
    #[arg(long)]
    pub rows: Option<usize>,

    /// Mobile stations per network
    #[arg(long)]
    pub stations: Option<usize>,

    /// Use omnidirectional access points
    #[arg(long)]
    pub standard_ap: bool,

    /// Power control rule
    #[arg(long, value_enum)]
    pub rule: Option<RuleKind>,

    /// Step of the hill-climb rule, in watts
    #[arg(long)]
    pub step: Option<f64>,

    /// Upper power limit of the proportional rule, in watts
    #[arg(long)]
    pub max_power: Option<f64>,

    /// Utility lost per watt for the proportional rule
    #[arg(long)]
    pub power_cost: Option<f64>,

    /// Target SINR (linear) of the target-SINR rule
    #[arg(long)]
    pub target_sinr: Option<f64>,
}

/// Configuration for the two-flat coexistence analysis
#[derive(Parser, Debug)]
pub struct CoexistenceConfig {
    #[command(flatten)]
    pub common: ScenarioArgs,

    /// Mobile stations per flat
    #[arg(long)]
    pub stations: Option<usize>,

    /// Noise power in watts
    #[arg(long)]
    pub noise: Option<f64>,
}

// ============================================================================
// Scenario Overrides
// ============================================================================

fn load(common: &ScenarioArgs) -> Result<Scenario, RunnerError> {
    let mut scenario = match &common.scenario {
        Some(path) => load_scenario(path)?,
        None => Scenario::default(),
    };
    if let Some(seed) = common.seed {
        scenario.seed = seed;
    }
    Ok(scenario)
}

fn apply_ism_overrides(scenario: &mut Scenario, config: &IsmConfig) {
    let ism = &mut scenario.ism;
    if let Some(users) = config.users {
        ism.users = users;
    }
    if let Some(iterations) = config.iterations {
        ism.iterations = iterations;
    }
    if let Some(price) = config.price {
        ism.game.price = price;
    }
    if let Some(max_power) = config.max_power {
        ism.game.max_power_w = max_power;
    }
    if config.simultaneous {
        ism.game.order = UpdateOrder::Simultaneous;
    }
}

fn rule_from_args(kind: RuleKind, config: &WlanConfig, max_power_w: f64) -> PowerRule {
    match kind {
        RuleKind::Standard => PowerRule::Standard,
        RuleKind::HillClimb => PowerRule::HillClimb {
            step_w: config.step.unwrap_or(POWER_INCREMENT_W),
        },
        RuleKind::Proportional => PowerRule::Proportional {
            max_power_w: config.max_power.unwrap_or(max_power_w),
            power_cost: config.power_cost.unwrap_or(0.0),
            gain: 2.0,
        },
        RuleKind::TargetSinr => PowerRule::TargetSinr {
            target: config.target_sinr.unwrap_or(DEFAULT_TARGET_SINR),
        },
    }
}

fn apply_wlan_overrides(scenario: &mut Scenario, config: &WlanConfig) {
    let wlan = &mut scenario.wlan;
    if let Some(iterations) = config.iterations {
        wlan.control.iterations = iterations;
    }
    if let Some(columns) = config.columns {
        wlan.grid.columns = columns;
    }
    if let Some(rows) = config.rows {
        wlan.grid.rows = rows;
    }
    if let Some(stations) = config.stations {
        wlan.grid.stations_per_network = stations;
    }
    if config.standard_ap {
        wlan.grid.standard = true;
    }
    if let Some(kind) = config.rule {
        wlan.control.rule = rule_from_args(kind, config, wlan.control.bounds.max_w);
    }
}

fn apply_coexistence_overrides(scenario: &mut Scenario, config: &CoexistenceConfig) {
    if let Some(stations) = config.stations {
        scenario.coexistence.stations = stations;
    }
    if let Some(noise) = config.noise {
        scenario.coexistence.white_noise_w = noise;
    }
}

// ============================================================================
// Main
// ============================================================================

fn main() -> Result<(), RunnerError> {
    // Initialize tracing subscriber with RUST_LOG env filter
    // Default to "warn" level if RUST_LOG is not set
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Ism(config) => {
            let mut scenario = load(&config.common)?;
            apply_ism_overrides(&mut scenario, &config);
            scenario.validate()?;
            debug!("Running ISM game with seed {}", scenario.seed);
            let report = run_ism(&scenario)?;
            write_report(&report, config.common.output.as_deref())?;
        }
        Commands::Wlan(config) => {
            let mut scenario = load(&config.common)?;
            apply_wlan_overrides(&mut scenario, &config);
            scenario.validate()?;
            debug!("Running WLAN power control with seed {}", scenario.seed);
            let report = run_wlan(&scenario)?;
            write_report(&report, config.common.output.as_deref())?;
        }
        Commands::Coexistence(config) => {
            let mut scenario = load(&config.common)?;
            apply_coexistence_overrides(&mut scenario, &config);
            scenario.validate()?;
            let report = run_coexistence(&scenario)?;
            write_report(&report, config.common.output.as_deref())?;
        }
        Commands::Defaults => {
            print!("{}", to_yaml(&Scenario::default())?);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wlan_config(args: &[&str]) -> WlanConfig {
        let mut argv = vec!["pcsim", "wlan"];
        argv.extend_from_slice(args);
        match Cli::parse_from(argv).command {
            Commands::Wlan(config) => config,
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_ism_overrides() {
        let cli = Cli::parse_from([
            "pcsim", "ism", "--seed", "9", "--users", "4", "--price", "0.2", "--simultaneous",
        ]);
        let config = match cli.command {
            Commands::Ism(config) => config,
            other => panic!("unexpected command {:?}", other),
        };
        let mut scenario = load(&config.common).unwrap();
        apply_ism_overrides(&mut scenario, &config);
        assert_eq!(scenario.seed, 9);
        assert_eq!(scenario.ism.users, 4);
        assert_eq!(scenario.ism.game.price, 0.2);
        assert_eq!(scenario.ism.game.order, UpdateOrder::Simultaneous);
        assert_eq!(scenario.ism.iterations, 20);
    }

    #[test]
    fn test_wlan_rule_defaults() {
        let config = wlan_config(&["--rule", "hill-climb"]);
        let mut scenario = Scenario::default();
        apply_wlan_overrides(&mut scenario, &config);
        assert_eq!(scenario.wlan.control.rule, PowerRule::HillClimb { step_w: 0.05 });

        let config = wlan_config(&["--rule", "target-sinr"]);
        apply_wlan_overrides(&mut scenario, &config);
        assert_eq!(scenario.wlan.control.rule, PowerRule::TargetSinr { target: 25.0 });

        let config = wlan_config(&["--rule", "proportional", "--power-cost", "0.1"]);
        apply_wlan_overrides(&mut scenario, &config);
        assert_eq!(
            scenario.wlan.control.rule,
            PowerRule::Proportional {
                max_power_w: 1.0,
                power_cost: 0.1,
                gain: 2.0,
            }
        );
    }

    #[test]
    fn test_wlan_grid_overrides() {
        let config = wlan_config(&[
            "--columns",
            "3",
            "--rows",
            "2",
            "--stations",
            "4",
            "--standard-ap",
        ]);
        let mut scenario = Scenario::default();
        apply_wlan_overrides(&mut scenario, &config);
        assert_eq!(scenario.wlan.grid.columns, 3);
        assert_eq!(scenario.wlan.grid.rows, 2);
        assert_eq!(scenario.wlan.grid.stations_per_network, 4);
        assert!(scenario.wlan.grid.standard);
        assert_eq!(scenario.wlan.control.rule, PowerRule::Standard);
    }

    #[test]
    fn test_invalid_override_is_rejected_by_validation() {
        let config = wlan_config(&["--rows", "0"]);
        let mut scenario = Scenario::default();
        apply_wlan_overrides(&mut scenario, &config);
        assert!(scenario.validate().is_err());
    }

    #[test]
    fn test_coexistence_overrides() {
        let cli = Cli::parse_from(["pcsim", "coexistence", "--stations", "3", "--noise", "1e-10"]);
        let config = match cli.command {
            Commands::Coexistence(config) => config,
            other => panic!("unexpected command {:?}", other),
        };
        let mut scenario = Scenario::default();
        apply_coexistence_overrides(&mut scenario, &config);
        assert_eq!(scenario.coexistence.stations, 3);
        assert_eq!(scenario.coexistence.white_noise_w, 1e-10);
    }
}
