//! Server configuration.
//!
//! Configuration is layered: built-in defaults, then an optional TOML file
//! (`minnow.toml` unless a path is given), then `MINNOW_`-prefixed
//! environment variables. Device entries are static for the lifetime of the
//! process; the host never adds or removes devices at runtime.

use std::net::IpAddr;
use std::path::Path;
use std::time::Duration;

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

/// Default manager listener port.
pub const DEFAULT_MANAGER_PORT: u16 = 9501;

/// Default grace period granted to in-flight calls on shutdown.
pub const DEFAULT_GRACE_SECS: u64 = 5;

/// One attached measurement device.
///
/// `name` must be unique within a process run; `insecure_port` must be
/// unique across the whole endpoint set, manager port included. Both
/// invariants are enforced by [`crate::Host::bind`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Position name, e.g. `X1`.
    pub name: String,
    /// Port for this device's plaintext RPC listener. Port 0 requests an
    /// ephemeral port (used by tests).
    pub insecure_port: u16,
}

impl DeviceConfig {
    /// Convenience constructor, mostly for tests and examples.
    pub fn new(name: impl Into<String>, insecure_port: u16) -> Self {
        Self {
            name: name.into(),
            insecure_port,
        }
    }
}

/// Full host configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address every listener binds to.
    pub bind_address: IpAddr,
    /// Manager (control-plane) listener port.
    pub manager_port: u16,
    /// Shutdown grace period in seconds.
    pub grace_secs: u64,
    /// Attached devices; one extra listener is created per entry.
    pub devices: Vec<DeviceConfig>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: IpAddr::V4(std::net::Ipv4Addr::LOCALHOST),
            manager_port: DEFAULT_MANAGER_PORT,
            grace_secs: DEFAULT_GRACE_SECS,
            devices: vec![
                DeviceConfig::new("X1", 8000),
                DeviceConfig::new("X2", 8001),
            ],
        }
    }
}

impl ServerConfig {
    /// Load configuration from defaults, a TOML file and the environment.
    ///
    /// `path` overrides the default `minnow.toml` lookup; a missing file is
    /// not an error (defaults and env still apply).
    pub fn load(path: Option<&Path>) -> Result<Self, figment::Error> {
        let toml = match path {
            Some(p) => Toml::file(p),
            None => Toml::file("minnow.toml"),
        };

        Figment::from(Serialized::defaults(Self::default()))
            .merge(toml)
            .merge(Env::prefixed("MINNOW_").split("__"))
            .extract()
    }

    /// Shutdown grace period as a [`Duration`].
    pub fn grace(&self) -> Duration {
        Duration::from_secs(self.grace_secs)
    }
}
