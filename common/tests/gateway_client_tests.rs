// HTTP-level tests for the device-gateway bridge client

use common::device::{DeviceGateway, HttpDeviceGateway, HttpGatewayConfig};
use common::errors::DeviceError;
use common::models::DeviceCommand;
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn gateway(server: &MockServer, send_retries: u32) -> HttpDeviceGateway {
    HttpDeviceGateway::new(HttpGatewayConfig {
        endpoint: server.uri(),
        api_key: "psk-456".to_string(),
        request_timeout_seconds: 5,
        send_retries,
    })
    .expect("client creation failed")
}

fn mount_status(server: &MockServer) -> impl std::future::Future<Output = ()> + '_ {
    Mock::given(method("GET"))
        .and(path("/status"))
        .and(header("X-Api-Key", "psk-456"))
        .respond_with(ResponseTemplate::new(200))
        .mount(server)
}

#[tokio::test]
async fn test_send_posts_serialized_batch() {
    let server = MockServer::start().await;
    mount_status(&server).await;

    let batch = vec![
        DeviceCommand::SetBlindPosition {
            device: "65538".to_string(),
            position: 30,
        },
        DeviceCommand::SetBlindPosition {
            device: "65539".to_string(),
            position: 30,
        },
    ];

    Mock::given(method("POST"))
        .and(path("/commands"))
        .and(header("X-Api-Key", "psk-456"))
        .and(body_json(json!([
            { "type": "set_blind_position", "device": "65538", "position": 30 },
            { "type": "set_blind_position", "device": "65539", "position": 30 }
        ])))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let session = gateway(&server, 0).connect().await.unwrap();
    session.send(&batch).await.unwrap();
}

#[tokio::test]
async fn test_transient_server_error_is_retried() {
    let server = MockServer::start().await;
    mount_status(&server).await;

    Mock::given(method("POST"))
        .and(path("/commands"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/commands"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let session = gateway(&server, 2).connect().await.unwrap();
    let batch = vec![DeviceCommand::SetLightPower {
        device: "65537".to_string(),
        on: false,
    }];
    session.send(&batch).await.unwrap();
}

#[tokio::test]
async fn test_client_error_is_not_retried() {
    let server = MockServer::start().await;
    mount_status(&server).await;

    Mock::given(method("POST"))
        .and(path("/commands"))
        .respond_with(ResponseTemplate::new(400).set_body_string("bad command"))
        .expect(1)
        .mount(&server)
        .await;

    let session = gateway(&server, 3).connect().await.unwrap();
    let batch = vec![DeviceCommand::SetLightPower {
        device: "65537".to_string(),
        on: true,
    }];

    let err = session.send(&batch).await.unwrap_err();
    match err {
        DeviceError::Rejected { status, body } => {
            assert_eq!(status, 400);
            assert!(body.contains("bad command"));
        }
        other => panic!("expected Rejected, got {:?}", other.to_string()),
    }
}

#[tokio::test]
async fn test_unreachable_gateway_fails_connect() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/status"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let err = gateway(&server, 0).connect().await.unwrap_err();
    assert!(matches!(err, DeviceError::ConnectFailed(_)));
}
