//! Service facades.
//!
//! Each facade owns one channel to one listener and hides the wire shape of
//! the underlying service: streamed pages come back flattened, run-scoped
//! calls default to the most recent run, and enum states come back typed.

use futures::stream::{self, Stream, TryStreamExt};
use tonic::transport::Channel;
use tonic::Status;

use minnow_proto::device::device_service_client::DeviceServiceClient;
use minnow_proto::device::get_device_state_response::DeviceState;
use minnow_proto::device::{
    GetDeviceInfoRequest, GetDeviceInfoResponse, GetDeviceStateRequest, GetFlowCellInfoRequest,
    GetFlowCellInfoResponse,
};
use minnow_proto::manager::list_devices_response::ActiveDevice;
use minnow_proto::manager::manager_service_client::ManagerServiceClient;
use minnow_proto::manager::{
    DescribeHostRequest, DescribeHostResponse, FlowCellPosition, FlowCellPositionsRequest,
    ListDevicesRequest,
};
use minnow_proto::protocol::protocol_service_client::ProtocolServiceClient;
use minnow_proto::protocol::{
    GetRunInfoRequest, ListProtocolRunsRequest, ListProtocolsRequest, ProtocolInfo,
    ProtocolRunInfo, ProtocolRunUserInfo, StartProtocolRequest,
};

use crate::connection::{self, ChannelConfig};
use crate::error::{ClientError, Result};
use crate::stub::LazyStub;

/// Facade over the control-plane service on the manager listener.
pub struct ManagerClient {
    stub: LazyStub<ManagerServiceClient<Channel>>,
}

impl ManagerClient {
    /// Wrap an already-established channel.
    pub fn new(channel: Channel) -> Self {
        Self {
            stub: LazyStub::new(channel),
        }
    }

    /// Connect to the manager listener with default transport settings.
    pub async fn connect(host: &str, port: u16) -> Result<Self> {
        let channel = connection::connect(host, port, &ChannelConfig::default()).await?;
        Ok(Self::new(channel))
    }

    /// Identity of the host this manager fronts.
    pub async fn describe_host(&mut self) -> Result<DescribeHostResponse> {
        let response = self.stub.get().describe_host(DescribeHostRequest {}).await?;
        Ok(response.into_inner())
    }

    /// The active device list, via the superseded flat RPC.
    ///
    /// Kept functional for older callers; every call logs one deprecation
    /// advisory. New code should walk [`Self::flow_cell_positions`].
    #[deprecated(note = "superseded by flow_cell_positions")]
    pub async fn list_devices(&mut self) -> Result<Vec<ActiveDevice>> {
        tracing::warn!("list_devices is deprecated; use flow_cell_positions instead");
        let response = self.stub.get().list_devices(ListDevicesRequest {}).await?;
        Ok(response.into_inner().active)
    }

    /// All flow cell positions, with the server's pagination flattened away.
    ///
    /// Yields positions one by one in the order the server pages them, so
    /// callers never see page boundaries.
    pub async fn flow_cell_positions(
        &mut self,
    ) -> Result<impl Stream<Item = std::result::Result<FlowCellPosition, Status>>> {
        let pages = self
            .stub
            .get()
            .flow_cell_positions(FlowCellPositionsRequest {})
            .await?
            .into_inner();

        Ok(pages
            .map_ok(|page| stream::iter(page.positions.into_iter().map(Ok)))
            .try_flatten())
    }

    /// Whether the manager stub has been bound yet.
    pub fn is_bound(&self) -> bool {
        self.stub.is_bound()
    }
}

/// Facade over one device listener's status service.
pub struct DeviceClient {
    stub: LazyStub<DeviceServiceClient<Channel>>,
}

impl DeviceClient {
    /// Wrap an already-established channel to a device listener.
    pub fn new(channel: Channel) -> Self {
        Self {
            stub: LazyStub::new(channel),
        }
    }

    /// Connect to a device listener with default transport settings.
    pub async fn connect(host: &str, port: u16) -> Result<Self> {
        let channel = connection::connect(host, port, &ChannelConfig::default()).await?;
        Ok(Self::new(channel))
    }

    /// Current device state, as the typed enum.
    pub async fn get_device_state(&mut self) -> Result<DeviceState> {
        let response = self
            .stub
            .get()
            .get_device_state(GetDeviceStateRequest {})
            .await?
            .into_inner();
        let state = response.device_state();
        tracing::debug!(state = state.as_str_name(), "device state");
        Ok(state)
    }

    /// Static device identity and capabilities.
    pub async fn get_device_info(&mut self) -> Result<GetDeviceInfoResponse> {
        let response = self.stub.get().get_device_info(GetDeviceInfoRequest {}).await?;
        Ok(response.into_inner())
    }

    /// Flow cell presence and identity.
    pub async fn get_flow_cell_info(&mut self) -> Result<GetFlowCellInfoResponse> {
        let info = self
            .stub
            .get()
            .get_flow_cell_info(GetFlowCellInfoRequest {})
            .await?
            .into_inner();
        tracing::debug!(has_flow_cell = info.has_flow_cell, "flow cell info");
        Ok(info)
    }

    /// Whether the device stub has been bound yet.
    pub fn is_bound(&self) -> bool {
        self.stub.is_bound()
    }
}

/// Facade over one device listener's protocol service.
pub struct ProtocolClient {
    stub: LazyStub<ProtocolServiceClient<Channel>>,
}

impl ProtocolClient {
    /// Wrap an already-established channel to a device listener.
    pub fn new(channel: Channel) -> Self {
        Self {
            stub: LazyStub::new(channel),
        }
    }

    /// Connect to a device listener with default transport settings.
    pub async fn connect(host: &str, port: u16) -> Result<Self> {
        let channel = connection::connect(host, port, &ChannelConfig::default()).await?;
        Ok(Self::new(channel))
    }

    /// The protocols this device can run.
    pub async fn list_protocols(&mut self) -> Result<Vec<ProtocolInfo>> {
        let response = self.stub.get().list_protocols(ListProtocolsRequest {}).await?;
        Ok(response.into_inner().protocols)
    }

    /// Launch a protocol run and return its run id.
    ///
    /// `group_id` and `sample_id` are carried exactly as given: `None` stays
    /// absent on the wire, an empty string stays an empty string.
    pub async fn start_protocol(
        &mut self,
        identifier: &str,
        group_id: Option<&str>,
        sample_id: Option<&str>,
        args: Vec<String>,
    ) -> Result<String> {
        let user_info = if group_id.is_some() || sample_id.is_some() {
            Some(ProtocolRunUserInfo {
                protocol_group_id: group_id.map(str::to_string),
                sample_id: sample_id.map(str::to_string),
            })
        } else {
            None
        };

        let response = self
            .stub
            .get()
            .start_protocol(StartProtocolRequest {
                identifier: identifier.to_string(),
                user_info,
                args,
            })
            .await?
            .into_inner();

        tracing::info!(run_id = %response.run_id, "protocol started");
        Ok(response.run_id)
    }

    /// Run ids on this device, most recent first.
    pub async fn list_protocol_runs(&mut self) -> Result<Vec<String>> {
        let response = self
            .stub
            .get()
            .list_protocol_runs(ListProtocolRunsRequest {})
            .await?;
        Ok(response.into_inner().run_ids)
    }

    /// The most recent run id, or [`ClientError::NoRunsAvailable`].
    pub async fn latest_run_id(&mut self) -> Result<String> {
        self.list_protocol_runs()
            .await?
            .into_iter()
            .next()
            .ok_or(ClientError::NoRunsAvailable)
    }

    /// Details for one run; `None` means the most recent run.
    pub async fn get_run_info(&mut self, run_id: Option<&str>) -> Result<ProtocolRunInfo> {
        let run_id = match run_id {
            Some(id) => id.to_string(),
            None => self.latest_run_id().await?,
        };

        let response = self
            .stub
            .get()
            .get_run_info(GetRunInfoRequest { run_id })
            .await?;
        Ok(response.into_inner())
    }

    /// Whether the protocol stub has been bound yet.
    pub fn is_bound(&self) -> bool {
        self.stub.is_bound()
    }
}
