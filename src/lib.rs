//! ThingNode connectivity library.
//!
//! Exposes the connectivity core and its adapters for integration testing
//! and for the firmware binary. All ESP-IDF-specific code is guarded by
//! `#[cfg(target_os = "espidf")]` within each module.

#![deny(unused_must_use)]

pub mod app;
pub mod bridge;
pub mod config;
pub mod error;
pub mod network;
pub mod settings;
pub mod thing;

pub mod adapters;
pub mod drivers;

pub use config::NetworkConfig;
pub use error::{Error, Result};
pub use network::Network;
