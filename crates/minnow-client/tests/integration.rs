//! End-to-end facade tests against an in-process host on ephemeral ports.

use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

use futures::TryStreamExt;
use tracing_test::traced_test;

use minnow_client::{ClientError, DeviceClient, ManagerClient, ProtocolClient};
use minnow_server::{DeviceConfig, Host, ServerConfig};

fn ephemeral_config(device_count: usize) -> ServerConfig {
    ServerConfig {
        bind_address: IpAddr::V4(Ipv4Addr::LOCALHOST),
        manager_port: 0,
        grace_secs: 1,
        devices: (1..=device_count)
            .map(|n| DeviceConfig::new(format!("X{n}"), 0))
            .collect(),
    }
}

async fn spawn_host(device_count: usize) -> Host {
    let mut host = Host::bind(&ephemeral_config(device_count)).await.unwrap();
    host.start();
    host
}

async fn stop(mut host: Host) {
    host.stop(Duration::from_secs(1)).await;
}

#[tokio::test]
async fn positions_stream_is_flattened_in_configuration_order() {
    let host = spawn_host(5).await;
    let mut manager = ManagerClient::connect("127.0.0.1", host.manager_addr().port())
        .await
        .unwrap();

    // The facade hides the server's paging; two calls, same flat view.
    for _ in 0..2 {
        let positions: Vec<_> = manager
            .flow_cell_positions()
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();

        let names: Vec<&str> = positions.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["X1", "X2", "X3", "X4", "X5"]);
    }

    stop(host).await;
}

#[tokio::test]
async fn positions_advertise_connectable_device_ports() {
    let host = spawn_host(2).await;
    let mut manager = ManagerClient::connect("127.0.0.1", host.manager_addr().port())
        .await
        .unwrap();

    let positions: Vec<_> = manager
        .flow_cell_positions()
        .await
        .unwrap()
        .try_collect()
        .await
        .unwrap();

    for position in positions {
        let port = position.rpc_ports.unwrap().insecure as u16;
        let mut device = DeviceClient::connect("127.0.0.1", port).await.unwrap();
        let info = device.get_device_info().await.unwrap();
        assert_eq!(info.device_id, position.name);
    }

    stop(host).await;
}

#[tokio::test]
async fn run_info_defaults_to_the_most_recent_run() {
    let host = spawn_host(1).await;
    let port = host.device_addrs()[0].1.port();
    let mut protocol = ProtocolClient::connect("127.0.0.1", port).await.unwrap();

    protocol
        .start_protocol("sequencing/dna_lsk109", Some("grp-1"), None, Vec::new())
        .await
        .unwrap();
    let newest = protocol
        .start_protocol("flush/wash_kit_004", None, None, Vec::new())
        .await
        .unwrap();

    let info = protocol.get_run_info(None).await.unwrap();
    assert_eq!(info.run_id, newest);
    assert_eq!(info.protocol_id, "flush/wash_kit_004");

    stop(host).await;
}

#[tokio::test]
async fn run_defaulting_with_no_history_is_a_clean_error() {
    let host = spawn_host(1).await;
    let port = host.device_addrs()[0].1.port();
    let mut protocol = ProtocolClient::connect("127.0.0.1", port).await.unwrap();

    let err = protocol.get_run_info(None).await.unwrap_err();
    assert!(matches!(err, ClientError::NoRunsAvailable));

    let err = protocol.latest_run_id().await.unwrap_err();
    assert!(matches!(err, ClientError::NoRunsAvailable));

    stop(host).await;
}

#[tokio::test]
async fn absent_user_info_fields_stay_absent() {
    let host = spawn_host(1).await;
    let port = host.device_addrs()[0].1.port();
    let mut protocol = ProtocolClient::connect("127.0.0.1", port).await.unwrap();

    let run_id = protocol
        .start_protocol("sequencing/rna_002", None, Some(""), Vec::new())
        .await
        .unwrap();

    let info = protocol.get_run_info(Some(&run_id)).await.unwrap();
    let user_info = info.user_info.unwrap();
    assert_eq!(user_info.protocol_group_id, None);
    assert_eq!(user_info.sample_id, Some(String::new()));

    stop(host).await;
}

#[tokio::test]
#[traced_test]
async fn deprecated_list_devices_matches_positions_and_warns_once_per_call() {
    let host = spawn_host(3).await;
    let mut manager = ManagerClient::connect("127.0.0.1", host.manager_addr().port())
        .await
        .unwrap();

    #[allow(deprecated)]
    let devices = manager.list_devices().await.unwrap();
    let positions: Vec<_> = manager
        .flow_cell_positions()
        .await
        .unwrap()
        .try_collect()
        .await
        .unwrap();

    let device_names: Vec<&str> = devices.iter().map(|d| d.name.as_str()).collect();
    let position_names: Vec<&str> = positions.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(device_names, position_names);

    logs_assert(|lines: &[&str]| {
        let advisories = lines
            .iter()
            .filter(|line| line.contains("list_devices is deprecated"))
            .count();
        if advisories == 1 {
            Ok(())
        } else {
            Err(format!("expected exactly one advisory, saw {advisories}"))
        }
    });

    stop(host).await;
}

#[tokio::test]
#[traced_test]
async fn manager_stub_is_bound_at_most_once() {
    let host = spawn_host(0).await;
    let mut manager = ManagerClient::connect("127.0.0.1", host.manager_addr().port())
        .await
        .unwrap();
    assert!(!manager.is_bound());

    manager.describe_host().await.unwrap();
    assert!(manager.is_bound());
    manager.describe_host().await.unwrap();

    logs_assert(|lines: &[&str]| {
        let binds = lines
            .iter()
            .filter(|line| line.contains("binding service stub"))
            .count();
        if binds == 1 {
            Ok(())
        } else {
            Err(format!("expected one stub bind, saw {binds}"))
        }
    });

    stop(host).await;
}

#[tokio::test]
async fn device_and_protocol_stubs_bind_on_first_use() {
    let host = spawn_host(1).await;
    let port = host.device_addrs()[0].1.port();

    let mut device = DeviceClient::connect("127.0.0.1", port).await.unwrap();
    assert!(!device.is_bound());
    device.get_device_info().await.unwrap();
    assert!(device.is_bound());

    let mut protocol = ProtocolClient::connect("127.0.0.1", port).await.unwrap();
    assert!(!protocol.is_bound());
    protocol.list_protocols().await.unwrap();
    assert!(protocol.is_bound());

    stop(host).await;
}

#[tokio::test]
async fn unknown_protocol_surfaces_as_rpc_error() {
    let host = spawn_host(1).await;
    let port = host.device_addrs()[0].1.port();
    let mut protocol = ProtocolClient::connect("127.0.0.1", port).await.unwrap();

    let err = protocol
        .start_protocol("sequencing/bogus", None, None, Vec::new())
        .await
        .unwrap_err();
    match err {
        ClientError::Rpc(status) => assert_eq!(status.code(), tonic::Code::NotFound),
        other => panic!("expected rpc error, got {other:?}"),
    }

    stop(host).await;
}
