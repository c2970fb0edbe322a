//! Multi-endpoint RPC host for the minnow instrument platform.
//!
//! One process hosts the manager control plane plus one listener per
//! attached device. All listeners share a single bounded worker cap, and
//! start/stop/drain is orchestrated as a single lifecycle across the whole
//! set. See [`host::Host`] for the lifecycle contract.

pub mod config;
pub mod host;
pub mod services;

pub use config::{DeviceConfig, ServerConfig};
pub use host::{Host, HostError};
