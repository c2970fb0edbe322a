//! The endpoint host.
//!
//! A [`Host`] owns a fixed topology of listeners derived from static
//! configuration: exactly one manager listener, plus one listener per
//! configured device carrying that device's `DeviceService` and
//! `ProtocolService`. All listeners service calls through one shared
//! bounded worker cap, and are started, drained and stopped as a single
//! lifecycle.

use std::collections::HashSet;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::transport::Server;
use tower::limit::GlobalConcurrencyLimitLayer;

use minnow_proto::device::device_service_server::DeviceServiceServer;
use minnow_proto::manager::manager_service_server::ManagerServiceServer;
use minnow_proto::protocol::protocol_service_server::ProtocolServiceServer;

use crate::config::{DeviceConfig, ServerConfig};
use crate::services::device::DeviceApi;
use crate::services::manager::ManagerApi;
use crate::services::protocol::ProtocolApi;

/// Ceiling on concurrent RPC handling across the whole endpoint set.
///
/// A single semaphore is shared by every listener, so total in-flight work
/// is bounded fleet-wide rather than per listener: one busy device cannot
/// starve the rest behind uncapped per-listener pools, and many devices
/// together still cannot overrun the cap.
pub const MAX_CONCURRENT_RPCS: usize = 100;

/// Construction faults. Any of these leaves nothing serving.
#[derive(Debug, Error)]
pub enum HostError {
    /// The same port appears more than once in the configured endpoint set.
    #[error("port {0} is configured for more than one listener")]
    PortCollision(u16),

    /// A listener socket could not be bound.
    #[error("failed to bind port {port}: {source}")]
    Bind {
        /// The configured port that failed to bind.
        port: u16,
        #[source]
        source: std::io::Error,
    },
}

/// One bound-but-not-yet-serving endpoint.
#[derive(Debug)]
struct Endpoint {
    label: String,
    listener: TcpListener,
    services: EndpointServices,
}

#[derive(Debug)]
enum EndpointServices {
    Manager(ManagerApi),
    Device {
        device: DeviceApi,
        protocol: ProtocolApi,
    },
}

/// The multi-endpoint RPC host.
///
/// Constructed once per process with [`Host::bind`]; afterwards the
/// lifecycle is `start` → (`wait` | `stop`), or just [`Host::serve`] which
/// composes all three and hooks the interrupt signal.
#[derive(Debug)]
pub struct Host {
    endpoints: Vec<Endpoint>,
    pool: Arc<Semaphore>,
    shutdown: watch::Sender<bool>,
    tasks: JoinSet<Result<(), tonic::transport::Error>>,
    started: bool,
    manager_addr: SocketAddr,
    device_addrs: Vec<(String, SocketAddr)>,
}

impl Host {
    /// Bind every listener and construct every service, without serving.
    ///
    /// All sockets are bound here so that port collisions and
    /// already-in-use ports fail the whole construction up front; a failure
    /// part-way drops the sockets bound so far and nothing is left
    /// serving. Port 0 entries bind ephemeral ports; the resolved ports are
    /// what the manager service reports to clients.
    pub async fn bind(config: &ServerConfig) -> Result<Self, HostError> {
        check_port_collisions(config)?;

        let manager_listener = bind_port(config.bind_address, config.manager_port).await?;
        let manager_addr = local_addr(&manager_listener, config.manager_port)?;

        let mut bound_devices = Vec::with_capacity(config.devices.len());
        for device in &config.devices {
            let listener = bind_port(config.bind_address, device.insecure_port).await?;
            let addr = local_addr(&listener, device.insecure_port)?;
            bound_devices.push((device.clone(), listener, addr));
        }

        // The manager reports resolved ports, not configured ones, so that
        // ephemeral binds are still discoverable.
        let resolved: Vec<DeviceConfig> = bound_devices
            .iter()
            .map(|(device, _, addr)| DeviceConfig::new(&device.name, addr.port()))
            .collect();

        let mut endpoints = Vec::with_capacity(config.devices.len() + 1);
        endpoints.push(Endpoint {
            label: "manager".to_string(),
            listener: manager_listener,
            services: EndpointServices::Manager(ManagerApi::new(resolved)),
        });

        let mut device_addrs = Vec::with_capacity(bound_devices.len());
        for (device, listener, addr) in bound_devices {
            let resolved_device = DeviceConfig::new(&device.name, addr.port());
            endpoints.push(Endpoint {
                label: device.name.clone(),
                listener,
                services: EndpointServices::Device {
                    device: DeviceApi::new(resolved_device),
                    protocol: ProtocolApi::new(&device.name),
                },
            });
            tracing::info!(device = %device.name, port = addr.port(), "bound device listener");
            device_addrs.push((device.name, addr));
        }

        let (shutdown, _) = watch::channel(false);

        Ok(Self {
            endpoints,
            pool: Arc::new(Semaphore::new(MAX_CONCURRENT_RPCS)),
            shutdown,
            tasks: JoinSet::new(),
            started: false,
            manager_addr,
            device_addrs,
        })
    }

    /// Number of listeners in the topology (devices + 1).
    pub fn num_listeners(&self) -> usize {
        self.device_addrs.len() + 1
    }

    /// Resolved address of the manager listener.
    pub fn manager_addr(&self) -> SocketAddr {
        self.manager_addr
    }

    /// Resolved addresses of the device listeners, in configuration order.
    pub fn device_addrs(&self) -> &[(String, SocketAddr)] {
        &self.device_addrs
    }

    /// Begin accepting connections on every listener.
    ///
    /// Each listener runs on the shared runtime with the shared worker cap;
    /// the calling task never services requests itself. Calling this twice
    /// is a programming error.
    pub fn start(&mut self) {
        assert!(!self.started, "Host::start called more than once");
        self.started = true;

        for endpoint in self.endpoints.drain(..) {
            let Endpoint {
                label,
                listener,
                services,
            } = endpoint;

            let limit = GlobalConcurrencyLimitLayer::with_semaphore(self.pool.clone());
            let mut rx = self.shutdown.subscribe();
            let shutdown = async move {
                // Resolves on the stop broadcast, or if the host is dropped.
                let _ = rx.changed().await;
            };
            let incoming = TcpListenerStream::new(listener);

            tracing::info!(endpoint = %label, "listener started");
            let mut builder = Server::builder().layer(limit);
            match services {
                EndpointServices::Manager(api) => {
                    let router = builder.add_service(ManagerServiceServer::new(api));
                    self.tasks
                        .spawn(router.serve_with_incoming_shutdown(incoming, shutdown));
                }
                EndpointServices::Device { device, protocol } => {
                    let router = builder
                        .add_service(DeviceServiceServer::new(device))
                        .add_service(ProtocolServiceServer::new(protocol));
                    self.tasks
                        .spawn(router.serve_with_incoming_shutdown(incoming, shutdown));
                }
            }
        }
    }

    /// Stop every listener as one batch.
    ///
    /// All listeners receive the stop request at once and drain
    /// concurrently, so total shutdown latency is bounded by a single grace
    /// period regardless of listener count. Calls still in flight when the
    /// grace period elapses are aborted.
    pub async fn stop(&mut self, grace: Duration) {
        tracing::info!(grace_secs = grace.as_secs_f64(), "stopping all listeners");
        let _ = self.shutdown.send(true);

        if tokio::time::timeout(grace, join_remaining(&mut self.tasks))
            .await
            .is_err()
        {
            tracing::warn!("grace period elapsed; aborting remaining in-flight calls");
            self.tasks.shutdown().await;
        }
        tracing::info!("all listeners stopped");
    }

    /// Block until every listener has fully terminated.
    pub async fn wait(&mut self) {
        join_remaining(&mut self.tasks).await;
    }

    /// Run the host: start, then wait; on interrupt, stop with `grace`.
    ///
    /// This is the normal-operation entry point; the individual primitives
    /// exist for tests and embedding.
    pub async fn serve(mut self, grace: Duration) {
        self.start();

        tokio::select! {
            () = join_remaining(&mut self.tasks) => {
                tracing::info!("all listeners terminated");
            }
            signal = tokio::signal::ctrl_c() => {
                if let Err(error) = signal {
                    tracing::error!(%error, "failed to listen for interrupt signal");
                }
                self.stop(grace).await;
            }
        }
    }
}

/// Await every remaining listener task. Cancel-safe: partially awaited
/// tasks stay in the set and can be re-awaited or aborted later.
async fn join_remaining(tasks: &mut JoinSet<Result<(), tonic::transport::Error>>) {
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(Ok(())) => {}
            Ok(Err(error)) => {
                tracing::error!(%error, "listener terminated with transport error");
            }
            Err(join_error) if join_error.is_cancelled() => {}
            Err(join_error) => {
                tracing::error!(%join_error, "listener task failed");
            }
        }
    }
}

fn check_port_collisions(config: &ServerConfig) -> Result<(), HostError> {
    let mut seen = HashSet::new();
    let ports = std::iter::once(config.manager_port)
        .chain(config.devices.iter().map(|device| device.insecure_port));
    for port in ports {
        // Port 0 binds an ephemeral port, so duplicates are fine.
        if port != 0 && !seen.insert(port) {
            return Err(HostError::PortCollision(port));
        }
    }
    Ok(())
}

async fn bind_port(ip: IpAddr, port: u16) -> Result<TcpListener, HostError> {
    TcpListener::bind(SocketAddr::new(ip, port))
        .await
        .map_err(|source| HostError::Bind { port, source })
}

fn local_addr(listener: &TcpListener, port: u16) -> Result<SocketAddr, HostError> {
    listener
        .local_addr()
        .map_err(|source| HostError::Bind { port, source })
}
