//! Lazy service stubs.
//!
//! A facade owns one channel and a [`LazyStub`] per service it fronts. The
//! generated client is only constructed on first use and then reused for
//! every later call, so the bind cost is paid at most once per facade.

use std::fmt;
use std::str::FromStr;

use tonic::transport::Channel;

use minnow_proto::device::device_service_client::DeviceServiceClient;
use minnow_proto::manager::manager_service_client::ManagerServiceClient;
use minnow_proto::protocol::protocol_service_client::ProtocolServiceClient;

use crate::error::ClientError;

/// The services a host exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Service {
    /// Control-plane service on the manager listener.
    Manager,
    /// Per-device status service.
    Device,
    /// Per-device protocol execution service.
    Protocol,
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Service::Manager => "manager",
            Service::Device => "device",
            Service::Protocol => "protocol",
        };
        f.write_str(name)
    }
}

impl FromStr for Service {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "manager" => Ok(Service::Manager),
            "device" => Ok(Service::Device),
            "protocol" => Ok(Service::Protocol),
            other => Err(ClientError::UnknownService(other.to_string())),
        }
    }
}

/// A generated client that can be constructed from a shared channel.
pub trait BindService {
    /// Which service this stub speaks to.
    const SERVICE: Service;

    /// Construct the stub over the channel.
    fn bind(channel: Channel) -> Self;
}

impl BindService for ManagerServiceClient<Channel> {
    const SERVICE: Service = Service::Manager;

    fn bind(channel: Channel) -> Self {
        Self::new(channel)
    }
}

impl BindService for DeviceServiceClient<Channel> {
    const SERVICE: Service = Service::Device;

    fn bind(channel: Channel) -> Self {
        Self::new(channel)
    }
}

impl BindService for ProtocolServiceClient<Channel> {
    const SERVICE: Service = Service::Protocol;

    fn bind(channel: Channel) -> Self {
        Self::new(channel)
    }
}

/// A stub bound on first use and cached for the facade's lifetime.
#[derive(Debug, Clone)]
pub struct LazyStub<T> {
    channel: Channel,
    stub: Option<T>,
}

impl<T: BindService> LazyStub<T> {
    /// Wrap a channel without binding anything yet.
    pub fn new(channel: Channel) -> Self {
        Self {
            channel,
            stub: None,
        }
    }

    /// The stub, binding it now if this is the first call.
    pub fn get(&mut self) -> &mut T {
        if self.stub.is_none() {
            tracing::debug!(service = %T::SERVICE, "binding service stub");
        }
        let channel = self.channel.clone();
        self.stub.get_or_insert_with(|| T::bind(channel))
    }

    /// Whether the stub has been bound.
    pub fn is_bound(&self) -> bool {
        self.stub.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_names_round_trip() {
        for service in [Service::Manager, Service::Device, Service::Protocol] {
            assert_eq!(service.to_string().parse::<Service>().unwrap(), service);
        }
    }

    #[test]
    fn unknown_service_name_is_an_error() {
        let err = "acquisition".parse::<Service>().unwrap_err();
        assert!(matches!(err, ClientError::UnknownService(name) if name == "acquisition"));
    }
}
