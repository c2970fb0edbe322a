//! Service implementations hosted by the endpoint host.
//!
//! The manager listener carries [`manager::ManagerApi`]; every device
//! listener carries a [`device::DeviceApi`] and a [`protocol::ProtocolApi`]
//! stamped with that device's identity. The wire contract lives in
//! `minnow-proto`; these types only fill it with simulated instrument
//! behaviour.

pub mod device;
pub mod manager;
pub mod protocol;
