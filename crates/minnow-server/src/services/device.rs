//! Per-device control surface: device status and flow-cell state.

use tonic::{Request, Response, Status};

use minnow_proto::device::device_service_server::DeviceService;
use minnow_proto::device::get_device_state_response::DeviceState;
use minnow_proto::device::{
    GetDeviceInfoRequest, GetDeviceInfoResponse, GetDeviceStateRequest, GetDeviceStateResponse,
    GetFlowCellInfoRequest, GetFlowCellInfoResponse,
};

use crate::config::DeviceConfig;

const CHANNEL_COUNT: u32 = 512;

/// Device service implementation for one configured device.
#[derive(Debug, Clone)]
pub struct DeviceApi {
    device: DeviceConfig,
}

impl DeviceApi {
    /// Create the service for one device (resolved port, not configured).
    pub fn new(device: DeviceConfig) -> Self {
        Self { device }
    }
}

#[tonic::async_trait]
impl DeviceService for DeviceApi {
    async fn get_device_state(
        &self,
        _request: Request<GetDeviceStateRequest>,
    ) -> Result<Response<GetDeviceStateResponse>, Status> {
        Ok(Response::new(GetDeviceStateResponse {
            device_state: DeviceState::DeviceReady.into(),
        }))
    }

    async fn get_device_info(
        &self,
        _request: Request<GetDeviceInfoRequest>,
    ) -> Result<Response<GetDeviceInfoResponse>, Status> {
        Ok(Response::new(GetDeviceInfoResponse {
            device_id: self.device.name.clone(),
            device_type: "simulated".to_string(),
            firmware_version: env!("CARGO_PKG_VERSION").to_string(),
            max_channel_count: CHANNEL_COUNT,
        }))
    }

    async fn get_flow_cell_info(
        &self,
        _request: Request<GetFlowCellInfoRequest>,
    ) -> Result<Response<GetFlowCellInfoResponse>, Status> {
        Ok(Response::new(GetFlowCellInfoResponse {
            has_flow_cell: true,
            flow_cell_id: format!("FC{:05}", self.device.insecure_port),
            product_code: "FLO-SIM001".to_string(),
            channel_count: CHANNEL_COUNT,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reports_ready_state_and_identity() {
        let api = DeviceApi::new(DeviceConfig::new("X1", 8000));

        let state = api
            .get_device_state(Request::new(GetDeviceStateRequest {}))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(state.device_state(), DeviceState::DeviceReady);

        let info = api
            .get_device_info(Request::new(GetDeviceInfoRequest {}))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(info.device_id, "X1");

        let flow_cell = api
            .get_flow_cell_info(Request::new(GetFlowCellInfoRequest {}))
            .await
            .unwrap()
            .into_inner();
        assert!(flow_cell.has_flow_cell);
        assert_eq!(flow_cell.flow_cell_id, "FC08000");
    }
}
