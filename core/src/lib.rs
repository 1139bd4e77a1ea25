//! Digital-twin replay core.
//!
//! A `Simulator` replays a static recording into an append-only database
//! file; `Modeling` trains a linear model on that data and predicts only
//! the rows that arrived since its last prediction, tracking windowed
//! monitoring statistics. `TwinEngine` wires one poll cycle of both.

pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod features;
pub mod frame;
pub mod ledger;
pub mod metrics;
pub mod modeling;
pub mod record_store;
pub mod recording;
pub mod regression;
pub mod simulator;
pub mod synth;
pub mod table;
pub mod types;
