//! Per-device protocol execution: catalogue, run launching, run history.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::sync::RwLock;
use tonic::{Request, Response, Status};
use uuid::Uuid;

use minnow_proto::protocol::protocol_run_info::State;
use minnow_proto::protocol::protocol_service_server::ProtocolService;
use minnow_proto::protocol::{
    GetRunInfoRequest, ListProtocolRunsRequest, ListProtocolRunsResponse, ListProtocolsRequest,
    ListProtocolsResponse, ProtocolInfo, ProtocolRunInfo, StartProtocolRequest,
    StartProtocolResponse,
};

/// Protocols every simulated device can run.
fn catalogue() -> Vec<ProtocolInfo> {
    vec![
        ProtocolInfo {
            identifier: "sequencing/dna_lsk109".to_string(),
            name: "DNA sequencing".to_string(),
            tags: vec!["dna".to_string(), "sequencing".to_string()],
        },
        ProtocolInfo {
            identifier: "sequencing/rna_002".to_string(),
            name: "Direct RNA sequencing".to_string(),
            tags: vec!["rna".to_string(), "sequencing".to_string()],
        },
        ProtocolInfo {
            identifier: "flush/wash_kit_004".to_string(),
            name: "Flow cell wash".to_string(),
            tags: vec!["maintenance".to_string()],
        },
    ]
}

fn now_unix_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

/// Protocol service implementation for one configured device.
///
/// Run history is in-memory and per device: the newest run is kept at the
/// front so the run-id listing is most-recent-first without sorting.
#[derive(Debug, Clone)]
pub struct ProtocolApi {
    device_name: String,
    runs: Arc<RwLock<Vec<ProtocolRunInfo>>>,
}

impl ProtocolApi {
    /// Create the service for the named device, with no prior runs.
    pub fn new(device_name: &str) -> Self {
        Self {
            device_name: device_name.to_string(),
            runs: Arc::new(RwLock::new(Vec::new())),
        }
    }
}

#[tonic::async_trait]
impl ProtocolService for ProtocolApi {
    async fn list_protocols(
        &self,
        _request: Request<ListProtocolsRequest>,
    ) -> Result<Response<ListProtocolsResponse>, Status> {
        Ok(Response::new(ListProtocolsResponse {
            protocols: catalogue(),
        }))
    }

    async fn start_protocol(
        &self,
        request: Request<StartProtocolRequest>,
    ) -> Result<Response<StartProtocolResponse>, Status> {
        let req = request.into_inner();

        if !catalogue()
            .iter()
            .any(|protocol| protocol.identifier == req.identifier)
        {
            return Err(Status::not_found(format!(
                "unknown protocol: {}",
                req.identifier
            )));
        }

        let run_id = Uuid::new_v4().to_string();
        let info = ProtocolRunInfo {
            run_id: run_id.clone(),
            protocol_id: req.identifier,
            // Stored verbatim: absent optional fields stay absent, empty
            // strings stay empty.
            user_info: req.user_info,
            args: req.args,
            state: State::ProtocolRunning.into(),
            start_time_unix_ms: now_unix_ms(),
        };

        self.runs.write().await.insert(0, info);
        tracing::info!(device = %self.device_name, %run_id, "started protocol run");

        Ok(Response::new(StartProtocolResponse { run_id }))
    }

    async fn list_protocol_runs(
        &self,
        _request: Request<ListProtocolRunsRequest>,
    ) -> Result<Response<ListProtocolRunsResponse>, Status> {
        let run_ids = self
            .runs
            .read()
            .await
            .iter()
            .map(|run| run.run_id.clone())
            .collect();
        Ok(Response::new(ListProtocolRunsResponse { run_ids }))
    }

    async fn get_run_info(
        &self,
        request: Request<GetRunInfoRequest>,
    ) -> Result<Response<ProtocolRunInfo>, Status> {
        let run_id = request.into_inner().run_id;
        self.runs
            .read()
            .await
            .iter()
            .find(|run| run.run_id == run_id)
            .cloned()
            .map(Response::new)
            .ok_or_else(|| Status::not_found(format!("unknown run: {run_id}")))
    }
}
