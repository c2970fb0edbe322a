//! Channel establishment.

use std::time::Duration;

use tonic::transport::Channel;

use crate::error::{ClientError, Result};

/// Host most clients talk to.
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default manager listener port.
pub const DEFAULT_MANAGER_PORT: u16 = 9501;

/// Transport knobs for a client channel.
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// Deadline for establishing the TCP/HTTP2 connection.
    pub connect_timeout: Duration,
    /// Per-request deadline applied to every call on the channel.
    pub request_timeout: Duration,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Open a plaintext channel to `host:port`.
///
/// One channel per endpoint is enough; service stubs multiplex over it.
pub async fn connect(host: &str, port: u16, config: &ChannelConfig) -> Result<Channel> {
    let uri = format!("http://{host}:{port}");
    let endpoint = Channel::from_shared(uri.clone())
        .map_err(|_| ClientError::InvalidAddress(uri))?
        .connect_timeout(config.connect_timeout)
        .timeout(config.request_timeout)
        .tcp_keepalive(Some(Duration::from_secs(60)));

    Ok(endpoint.connect().await?)
}
