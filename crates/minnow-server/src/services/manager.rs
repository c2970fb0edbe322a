//! Control-plane service: host description and device enumeration.

use tokio_stream::wrappers::ReceiverStream;
use tonic::{Request, Response, Status};

use minnow_proto::manager::flow_cell_position::{RpcPorts, State};
use minnow_proto::manager::list_devices_response::ActiveDevice;
use minnow_proto::manager::manager_service_server::ManagerService;
use minnow_proto::manager::{
    DescribeHostRequest, DescribeHostResponse, FlowCellPosition, FlowCellPositionsRequest,
    FlowCellPositionsResponse, ListDevicesRequest, ListDevicesResponse,
};

use crate::config::DeviceConfig;

/// Positions per streamed page. Small pages keep individual responses
/// bounded; clients are expected to flatten the stream.
pub const POSITIONS_PER_PAGE: usize = 2;

/// Manager service implementation.
///
/// Holds the resolved device set (names and actually-bound ports) for the
/// lifetime of the host; devices never change at runtime.
#[derive(Debug, Clone)]
pub struct ManagerApi {
    network_name: String,
    devices: Vec<DeviceConfig>,
}

impl ManagerApi {
    /// Create a manager over the resolved device set.
    pub fn new(devices: Vec<DeviceConfig>) -> Self {
        let network_name = hostname::get()
            .ok()
            .and_then(|name| name.into_string().ok())
            .unwrap_or_else(|| "localhost".to_string());
        Self {
            network_name,
            devices,
        }
    }

    fn positions(&self) -> Vec<FlowCellPosition> {
        self.devices
            .iter()
            .map(|device| FlowCellPosition {
                name: device.name.clone(),
                state: State::Running.into(),
                rpc_ports: Some(RpcPorts {
                    insecure: u32::from(device.insecure_port),
                }),
            })
            .collect()
    }
}

#[tonic::async_trait]
impl ManagerService for ManagerApi {
    async fn describe_host(
        &self,
        _request: Request<DescribeHostRequest>,
    ) -> Result<Response<DescribeHostResponse>, Status> {
        Ok(Response::new(DescribeHostResponse {
            product_name: format!("minnow {}", env!("CARGO_PKG_VERSION")),
            product_code: "MINNOW-SIM".to_string(),
            serial: format!("MINNOW-{}", self.network_name.to_uppercase()),
            network_name: self.network_name.clone(),
        }))
    }

    async fn list_devices(
        &self,
        _request: Request<ListDevicesRequest>,
    ) -> Result<Response<ListDevicesResponse>, Status> {
        let active = self
            .devices
            .iter()
            .map(|device| ActiveDevice {
                name: device.name.clone(),
                insecure_port: u32::from(device.insecure_port),
            })
            .collect();
        Ok(Response::new(ListDevicesResponse { active }))
    }

    type FlowCellPositionsStream = ReceiverStream<Result<FlowCellPositionsResponse, Status>>;

    /// Stream the position list in fixed-size pages, preserving
    /// configuration order across pages.
    async fn flow_cell_positions(
        &self,
        _request: Request<FlowCellPositionsRequest>,
    ) -> Result<Response<Self::FlowCellPositionsStream>, Status> {
        let positions = self.positions();
        let total_count = positions.len() as u32;
        let (tx, rx) = tokio::sync::mpsc::channel(4);

        tokio::spawn(async move {
            for page in positions.chunks(POSITIONS_PER_PAGE) {
                let response = FlowCellPositionsResponse {
                    total_count,
                    positions: page.to_vec(),
                };
                if tx.send(Ok(response)).await.is_err() {
                    break; // Client disconnected
                }
            }
        });

        Ok(Response::new(ReceiverStream::new(rx)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_stream::StreamExt;

    fn five_devices() -> Vec<DeviceConfig> {
        (1..=5)
            .map(|n| DeviceConfig::new(format!("X{n}"), 8000 + n))
            .collect()
    }

    #[tokio::test]
    async fn positions_are_paged_in_configuration_order() {
        let api = ManagerApi::new(five_devices());
        let response = api
            .flow_cell_positions(Request::new(FlowCellPositionsRequest {}))
            .await
            .unwrap();

        let mut pages = Vec::new();
        let mut stream = response.into_inner();
        while let Some(page) = stream.next().await {
            pages.push(page.unwrap());
        }

        let sizes: Vec<usize> = pages.iter().map(|page| page.positions.len()).collect();
        assert_eq!(sizes, vec![2, 2, 1]);
        assert!(pages.iter().all(|page| page.total_count == 5));

        let names: Vec<&str> = pages
            .iter()
            .flat_map(|page| page.positions.iter().map(|p| p.name.as_str()))
            .collect();
        assert_eq!(names, vec!["X1", "X2", "X3", "X4", "X5"]);
    }

    #[tokio::test]
    async fn list_devices_reports_resolved_ports() {
        let api = ManagerApi::new(vec![DeviceConfig::new("X1", 8000)]);
        let response = api
            .list_devices(Request::new(ListDevicesRequest {}))
            .await
            .unwrap()
            .into_inner();

        assert_eq!(response.active.len(), 1);
        assert_eq!(response.active[0].name, "X1");
        assert_eq!(response.active[0].insecure_port, 8000);
    }
}
