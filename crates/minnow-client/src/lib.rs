//! Client facades for the minnow instrument control surface.
//!
//! Talk to the manager listener with [`ManagerClient`] to discover flow cell
//! positions, then open a [`DeviceClient`] and [`ProtocolClient`] against the
//! port each position advertises. Facades bind their generated stubs lazily
//! on first use and reuse them for every later call.

pub use minnow_proto as proto;

pub mod client;
pub mod connection;
pub mod error;
pub mod stub;

pub use client::{DeviceClient, ManagerClient, ProtocolClient};
pub use connection::{ChannelConfig, DEFAULT_HOST, DEFAULT_MANAGER_PORT};
pub use error::{ClientError, Result};
pub use stub::{BindService, LazyStub, Service};
