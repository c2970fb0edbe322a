//! Protocol buffer definitions for the minnow instrument RPC surface.
//!
//! This crate contains the generated bindings for the three externally
//! defined services:
//! - `minnow.manager` — control plane (one listener per process)
//! - `minnow.device` — per-device status and flow-cell state
//! - `minnow.protocol` — per-device scientific run execution
//!
//! The wire schema is an external contract; this crate owns no behaviour
//! beyond codegen. Server and client code live in `minnow-server` and
//! `minnow-client` respectively.

#![allow(missing_docs)] // Generated code doesn't have docs

/// Generated manager service types.
pub mod manager {
    tonic::include_proto!("minnow.manager");
}

/// Generated device service types.
pub mod device {
    tonic::include_proto!("minnow.device");
}

/// Generated protocol service types.
pub mod protocol {
    tonic::include_proto!("minnow.protocol");
}
