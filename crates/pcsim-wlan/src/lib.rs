//! # pcsim-wlan
//!
//! Power control for a grid of 802.11 networks sharing one channel.
//!
//! Each network is an access point with its mobile stations inside a cell.
//! Neighbouring stations either contend for the medium (when they hear each
//! other above the SNR floor) or add interference power. Every iteration the
//! access points observe their DCF throughput and downlink rate, and adjust
//! their transmit power according to a [`PowerRule`].
//!
//! This crate provides:
//! - Stations, networks and grid layouts ([`station`])
//! - Co-channel classification, SINR and MCS rate selection ([`interference`])
//! - DCF saturation throughput ([`dcf`])
//! - Power control rules ([`control`])
//! - The iteration loop and recordings ([`sim`])
//! - The two-flat coexistence analysis ([`coexistence`])

pub mod coexistence;
pub mod control;
pub mod dcf;
pub mod interference;
pub mod sim;
pub mod station;

pub use coexistence::{analyse, CoexistenceParams, CoexistenceReport, InterferenceClassification};
pub use control::{Observation, PowerRule, POWER_INCREMENT_W};
pub use dcf::DcfParams;
pub use interference::{data_rate_mbps, is_cochannel_interference, sinr, WHITE_NOISE_W};
pub use sim::{run_power_control, select_recordings, Recording, WlanOutcome, WlanParams};
pub use station::{create_networks, ControlMemory, GridParams, Network, NetworkIndex, Station};
