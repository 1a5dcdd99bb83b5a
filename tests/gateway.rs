//! End-to-end tests of the gateway surface over a scripted link.
//!
//! These exercise the full path: facade -> request broker -> scripted
//! transport -> receiver task -> component dispatch.

mod common;

use std::sync::{Arc, Mutex, Once};
use std::time::Duration;

use airlink::link::{LinkEvent, LinkRequest};
use airlink::types::{
    AckResult, BroadcastFrame, FlightStatus, GlobalPosition, Quaternion, StreamRate, Topic,
    TopicValue, Vector3f,
};
use airlink::{
    CallbackEvent, CameraImage, CameraView, GatewayConfig, GatewayError, PackageDef, PackageState,
    StreamCodec, Vehicle,
};
use anyhow::Result;
use futures::StreamExt;

use common::{encode_frame, healthy_ack, healthy_link, scripted_link};

const TIMEOUT: Duration = Duration::from_secs(1);

fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "warn".into()),
            )
            .with_test_writer()
            .try_init();
    });
}

fn test_config() -> GatewayConfig {
    GatewayConfig::new(1_024_991, "integration-key")
}

fn attitude_package(id: u8) -> PackageDef {
    PackageDef {
        id,
        frequency_hz: 50,
        topics: vec![Topic::Quaternion, Topic::VelocityGround],
        send_timestamp: false,
    }
}

async fn connected_vehicle() -> Result<(Vehicle, common::Remote)> {
    init_tracing();
    let (tx, rx, remote) = healthy_link();
    let vehicle = Vehicle::connect(test_config(), tx, rx).await?;
    Ok((vehicle, remote))
}

#[tokio::test]
async fn connect_produces_activation_snapshot() -> Result<()> {
    let (vehicle, remote) = connected_vehicle().await?;

    assert_eq!(vehicle.activation().app_id, 1_024_991);
    assert_eq!(vehicle.firmware_version().to_string(), "4.1.0.3");
    assert_eq!(vehicle.hardware_version(), "SIM300");

    let sent = remote.sent_requests();
    assert!(matches!(sent[0], LinkRequest::Activate { app_id: 1_024_991, .. }));
    assert!(matches!(sent[1], LinkRequest::QueryVersion));
    Ok(())
}

#[tokio::test]
async fn subscription_lifecycle_delivers_decoded_frames() -> Result<()> {
    let (vehicle, remote) = connected_vehicle().await?;
    vehicle.verify(TIMEOUT).await?;
    vehicle.set_up_subscription(attitude_package(0), TIMEOUT).await?;
    assert_eq!(vehicle.package_state(0), PackageState::Active);

    let hook_frames = Arc::new(Mutex::new(Vec::new()));
    let sink = hook_frames.clone();
    vehicle.register_user_package_unpack_callback(
        0,
        Arc::new(move |frame| sink.lock().unwrap().push(frame.clone())),
    );

    let mut stream = vehicle.package_stream(0, StreamRate::Native)?;

    let values = vec![
        TopicValue::Quaternion(Quaternion { q0: 1.0, ..Default::default() }),
        TopicValue::VelocityGround(Vector3f { x: 2.0, y: 0.0, z: -0.5 }),
    ];
    remote.inject(LinkEvent::PackageData { id: 0, payload: encode_frame(None, &values) });

    let frame = stream.next().await.expect("frame");
    assert_eq!(frame.package_id, 0);
    assert_eq!(frame.values, values);

    // The unpack hook saw the same decoded frame.
    assert_eq!(*hook_frames.lock().unwrap(), vec![(*frame).clone()]);
    Ok(())
}

#[tokio::test]
async fn duplicate_subscribe_is_deterministic_and_harmless() -> Result<()> {
    let (vehicle, remote) = connected_vehicle().await?;
    vehicle.verify(TIMEOUT).await?;
    vehicle.set_up_subscription(attitude_package(1), TIMEOUT).await?;

    let err = vehicle.set_up_subscription(attitude_package(1), TIMEOUT).await.unwrap_err();
    assert!(matches!(err, GatewayError::DuplicatePackage { id: 1 }));
    assert_eq!(vehicle.package_state(1), PackageState::Active);

    // The original package still dispatches.
    let mut stream = vehicle.package_stream(1, StreamRate::Native)?;
    let values = vec![
        TopicValue::Quaternion(Quaternion::default()),
        TopicValue::VelocityGround(Vector3f::default()),
    ];
    remote.inject(LinkEvent::PackageData { id: 1, payload: encode_frame(None, &values) });
    assert!(stream.next().await.is_some());
    Ok(())
}

#[tokio::test]
async fn teardown_twice_and_on_unknown_id_succeeds() -> Result<()> {
    let (vehicle, _remote) = connected_vehicle().await?;
    vehicle.verify(TIMEOUT).await?;
    vehicle.set_up_subscription(attitude_package(2), TIMEOUT).await?;

    vehicle.teardown_subscription(2, TIMEOUT).await?;
    vehicle.teardown_subscription(2, TIMEOUT).await?;
    vehicle.teardown_subscription(4, TIMEOUT).await?;
    assert_eq!(vehicle.package_state(2), PackageState::Unbound);

    // The released id is immediately reusable.
    vehicle.set_up_subscription(attitude_package(2), TIMEOUT).await?;
    assert_eq!(vehicle.package_state(2), PackageState::Active);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn verify_times_out_on_a_dead_link() -> Result<()> {
    init_tracing();
    let (tx, rx, _remote) = scripted_link(Arc::new(|request: &LinkRequest| match request {
        LinkRequest::Verify => None,
        other => healthy_ack(other),
    }));
    let vehicle = Vehicle::connect(test_config(), tx, rx).await?;

    let err = vehicle.verify(Duration::from_millis(200)).await.unwrap_err();
    assert!(matches!(err, GatewayError::LinkTimeout { .. }));

    // Retryable: nothing was consumed by the failed attempt.
    assert!(err.is_retryable());
    Ok(())
}

#[tokio::test]
async fn go_home_rejection_fails_fast_without_landing_poll() -> Result<()> {
    init_tracing();
    let (tx, rx, _remote) = scripted_link(Arc::new(|request: &LinkRequest| match request {
        LinkRequest::Flight(_) => Some(AckResult::rejected(0x2a)),
        other => healthy_ack(other),
    }));
    let vehicle = Vehicle::connect(test_config(), tx, rx).await?;

    let started = std::time::Instant::now();
    let err = vehicle.go_home_and_confirm_landing(Duration::from_secs(30)).await.unwrap_err();
    assert!(matches!(err, GatewayError::CommandRejected { .. }));

    // Fail-fast: nowhere near the 30s landing budget.
    assert!(started.elapsed() < Duration::from_secs(5));
    Ok(())
}

#[tokio::test]
async fn go_home_confirms_landing_from_broadcast_status() -> Result<()> {
    let (vehicle, remote) = connected_vehicle().await?;

    // Vehicle reports flying, then landed shortly after the command.
    remote.inject(LinkEvent::Broadcast(BroadcastFrame {
        values: vec![TopicValue::FlightStatus(FlightStatus::InAir)],
    }));
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        remote.inject(LinkEvent::Broadcast(BroadcastFrame {
            values: vec![TopicValue::FlightStatus(FlightStatus::OnGround)],
        }));
    });

    vehicle.go_home_and_confirm_landing(Duration::from_secs(5)).await?;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn unconfirmed_landing_reports_landing_timeout() -> Result<()> {
    let (vehicle, remote) = connected_vehicle().await?;

    remote.inject(LinkEvent::Broadcast(BroadcastFrame {
        values: vec![TopicValue::FlightStatus(FlightStatus::InAir)],
    }));
    // Give the receiver task a chance to fold the status in.
    tokio::time::sleep(Duration::from_millis(10)).await;

    let err = vehicle.go_home_and_confirm_landing(Duration::from_secs(2)).await.unwrap_err();
    assert!(matches!(err, GatewayError::LandingTimeout { .. }));
    Ok(())
}

#[tokio::test]
async fn broadcast_callbacks_fire_in_registration_order() -> Result<()> {
    let (vehicle, remote) = connected_vehicle().await?;

    let order = Arc::new(Mutex::new(Vec::new()));
    for tag in [1, 2] {
        let order = order.clone();
        vehicle.register_topic_callback(
            Topic::GpsFused,
            Arc::new(move |event| {
                if let CallbackEvent::Telemetry(TopicValue::GpsFused(_)) = event {
                    order.lock().unwrap().push(tag);
                }
            }),
        );
    }

    let position =
        GlobalPosition { latitude: 47.397742, longitude: 8.545594, altitude: 490.0 };
    remote.inject(LinkEvent::Broadcast(BroadcastFrame {
        values: vec![TopicValue::GpsFused(position)],
    }));

    // The snapshot getter observes the same broadcast.
    let deadline = std::time::Instant::now() + TIMEOUT;
    while vehicle.global_position().is_none() {
        assert!(std::time::Instant::now() < deadline, "broadcast never arrived");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(vehicle.global_position(), Some(position));
    assert_eq!(*order.lock().unwrap(), vec![1, 2]);
    Ok(())
}

#[tokio::test]
async fn camera_frames_reach_the_buffer_through_the_driver() -> Result<()> {
    init_tracing();
    let (tx, rx, remote) = healthy_link();
    let mut config = test_config();
    config.enable_advanced_sensing = true;
    let vehicle = Vehicle::connect(config, tx, rx).await?;

    // Empty until the stream delivers.
    assert!(matches!(
        vehicle.try_camera_image(),
        Err(GatewayError::BufferEmpty { channel: "image" })
    ));

    vehicle.start_stream(StreamCodec::Rgb, CameraView::Main).await?;
    assert!(
        remote
            .sent_requests()
            .iter()
            .any(|r| matches!(r, LinkRequest::StartStream { codec: StreamCodec::Rgb, .. }))
    );

    let image = CameraImage { width: 2, height: 2, pixels: vec![8; 12] };
    remote.inject(LinkEvent::CameraImage(image.clone()));
    remote.inject(LinkEvent::CameraRaw(bytes::Bytes::from_static(&[1, 2, 3])));

    let deadline = std::time::Instant::now() + TIMEOUT;
    while vehicle.try_camera_image().is_err() {
        assert!(std::time::Instant::now() < deadline, "camera frame never arrived");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(vehicle.camera_image(), image);

    let deadline = std::time::Instant::now() + TIMEOUT;
    while vehicle.try_camera_raw_data().is_err() {
        assert!(std::time::Instant::now() < deadline, "raw run never arrived");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(vehicle.camera_raw_data(), vec![1, 2, 3]);
    Ok(())
}

#[tokio::test]
async fn camera_streaming_requires_advanced_sensing() -> Result<()> {
    let (vehicle, _remote) = connected_vehicle().await?;
    let err = vehicle.start_stream(StreamCodec::H264, CameraView::Fpv).await.unwrap_err();
    assert!(matches!(err, GatewayError::Config { .. }));
    Ok(())
}

#[tokio::test]
async fn companion_channels_enforce_the_size_limit() -> Result<()> {
    let (vehicle, remote) = connected_vehicle().await?;

    vehicle.send_to_mobile(b"hello mobile").await?;
    vehicle.send_to_payload(b"hello payload").await?;

    let err = vehicle.send_to_mobile(&[0u8; 101]).await.unwrap_err();
    assert!(matches!(err, GatewayError::OversizedPayload { len: 101, max: 100 }));

    let sent = remote.sent_requests();
    assert!(sent.iter().any(|r| matches!(r, LinkRequest::MobileData(_))));
    assert!(sent.iter().any(|r| matches!(r, LinkRequest::PayloadData(_))));
    Ok(())
}

#[tokio::test]
async fn inbound_companion_blobs_dispatch_to_callbacks() -> Result<()> {
    let (vehicle, remote) = connected_vehicle().await?;

    let received = Arc::new(Mutex::new(Vec::new()));
    let sink = received.clone();
    vehicle.register_mobile_callback(Arc::new(move |event| {
        if let CallbackEvent::Mobile(bytes) = event {
            sink.lock().unwrap().push(bytes.to_vec());
        }
    }));

    remote.inject(LinkEvent::FromMobile(bytes::Bytes::from_static(b"ping")));

    let deadline = std::time::Instant::now() + TIMEOUT;
    loop {
        if received.lock().unwrap().as_slice() == [b"ping".to_vec()] {
            break;
        }
        assert!(std::time::Instant::now() < deadline, "blob never dispatched");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    Ok(())
}

#[tokio::test]
async fn pass_through_setters_forward_typed_operations() -> Result<()> {
    use airlink::payload::{CameraOp, Iso, PayloadIndex};

    let (vehicle, remote) = connected_vehicle().await?;
    vehicle.set_iso(PayloadIndex::Payload0, Iso(400)).await?;
    vehicle.reset_gimbal(PayloadIndex::Payload0).await?;
    vehicle.set_avoid(true).await?;

    let sent = remote.sent_requests();
    assert!(sent.iter().any(|r| matches!(
        r,
        LinkRequest::Camera { op: CameraOp::SetIso(Iso(400)), .. }
    )));
    assert!(sent.iter().any(|r| matches!(r, LinkRequest::Gimbal { .. })));
    assert!(sent.iter().any(|r| matches!(r, LinkRequest::Avoidance { enable: true, .. })));
    Ok(())
}

#[tokio::test]
async fn monitored_takeoff_completes_when_vehicle_lifts_off() -> Result<()> {
    let (vehicle, remote) = connected_vehicle().await?;

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(30)).await;
        remote.inject(LinkEvent::Broadcast(BroadcastFrame {
            values: vec![TopicValue::DisplayMode(airlink::DisplayMode::AutoTakeoff)],
        }));
        tokio::time::sleep(Duration::from_millis(30)).await;
        remote.inject(LinkEvent::Broadcast(BroadcastFrame {
            values: vec![TopicValue::FlightStatus(FlightStatus::InAir)],
        }));
    });

    vehicle.monitored_takeoff(Duration::from_secs(5)).await?;
    assert_eq!(vehicle.flight_status(), Some(FlightStatus::InAir));
    Ok(())
}
