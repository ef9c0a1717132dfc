//! Competitive ladder backend: queue pairing, per-mode Elo ratings, match
//! lifecycle, token economy with side-bets, reward tiers and perks.

pub mod api_error;
pub mod clock;
pub mod config;
pub mod db;
pub mod error;
pub mod http;
pub mod middleware;
pub mod models;
pub mod service;
pub mod store;
pub mod telemetry;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{ErrorKind, LadderError};
pub use service::LadderService;
