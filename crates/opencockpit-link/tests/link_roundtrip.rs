//! End-to-end link tests against a local WebSocket relay.
//!
//! The relay records every text frame it receives and answers latency
//! requests by echoing the probe timestamp, optionally after a delay.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::sync::Arc;
use std::time::Duration;

use chrono::TimeDelta;
use futures_util::{SinkExt, StreamExt};
use opencockpit_calibration::{AxisCalibration, CalibrationPatch, VehicleStatePatch};
use opencockpit_link::{ControlLink, LinkConfig, LinkPhase, LinkStatus};
use opencockpit_protocol::{
    ClientType, LatencyResponse, LinkMessage, encode_message, parse_message,
};
use opencockpit_settings::{MemorySettings, SettingsStore};
use tokio::net::TcpListener;
use tokio::sync::{mpsc, watch};
use tokio::time::timeout;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;
use uuid::Uuid;

const EVENT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, PartialEq)]
enum ServerEvent {
    Connected,
    Frame(String),
    Disconnected,
}

#[derive(Default)]
struct ServerOptions {
    /// Delay before answering a latency request.
    latency_delay: Option<Duration>,
    /// Frames pushed to the client right after the handshake.
    greetings: Vec<String>,
}

async fn spawn_server(options: ServerOptions) -> (String, mpsc::UnboundedReceiver<ServerEvent>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = mpsc::unbounded_channel();
    let options = Arc::new(options);

    tokio::spawn(async move {
        loop {
            let Ok((socket, _)) = listener.accept().await else {
                break;
            };
            let tx = tx.clone();
            let options = options.clone();
            tokio::spawn(async move {
                let Ok(ws) = accept_async(socket).await else {
                    return;
                };
                let _ = tx.send(ServerEvent::Connected);
                let (mut sink, mut stream) = ws.split();

                for greeting in &options.greetings {
                    let _ = sink.send(Message::text(greeting.clone())).await;
                }

                while let Some(Ok(message)) = stream.next().await {
                    let Message::Text(text) = message else {
                        continue;
                    };
                    let raw = text.as_str().to_owned();
                    let _ = tx.send(ServerEvent::Frame(raw.clone()));

                    if let Ok(LinkMessage::LatencyRequest(request)) = parse_message(&raw) {
                        if let Some(delay) = options.latency_delay {
                            tokio::time::sleep(delay).await;
                        }
                        let response = LinkMessage::LatencyResponse(LatencyResponse {
                            initiator_id: Some(request.initiator_id),
                            responder_id: None,
                            timestamp: request.timestamp,
                        });
                        let _ = sink
                            .send(Message::text(encode_message(&response).unwrap()))
                            .await;
                    }
                }
                let _ = tx.send(ServerEvent::Disconnected);
            });
        }
    });

    (format!("ws://{addr}"), rx)
}

async fn next_event(rx: &mut mpsc::UnboundedReceiver<ServerEvent>) -> ServerEvent {
    timeout(EVENT_TIMEOUT, rx.recv())
        .await
        .expect("timed out waiting for server event")
        .expect("server event channel closed")
}

async fn wait_for_phase(status: &mut watch::Receiver<LinkStatus>, phase: LinkPhase) {
    timeout(EVENT_TIMEOUT, status.wait_for(|current| current.phase == phase))
        .await
        .expect("timed out waiting for link phase")
        .expect("status channel closed");
}

fn test_config(endpoint: String) -> LinkConfig {
    let mut config = LinkConfig::new(endpoint, Uuid::new_v4());
    // Keep probe frames out of the way unless a test wants them.
    config.probe_interval_ms = 60_000;
    config.reconnect_delay_ms = 50;
    config.connect_timeout_ms = 1_000;
    config
}

#[tokio::test]
async fn test_identification_is_first_frame_then_control() {
    let (endpoint, mut server) = spawn_server(ServerOptions::default()).await;
    let settings = Arc::new(MemorySettings::new());
    let config = test_config(endpoint);
    let group_id = config.group_id;
    let mut link = ControlLink::new(config, settings);

    link.initialize().await.unwrap();
    let mut status = link.subscribe();
    wait_for_phase(&mut status, LinkPhase::Connected).await;

    assert_eq!(next_event(&mut server).await, ServerEvent::Connected);
    let ServerEvent::Frame(first) = next_event(&mut server).await else {
        panic!("expected identification frame");
    };
    match parse_message(&first).unwrap() {
        LinkMessage::Identification(identification) => {
            assert_eq!(identification.id, link.vehicle_id().unwrap());
            assert_eq!(identification.group_id, group_id);
            assert_eq!(identification.client_type, ClientType::Pilot);
        }
        other => panic!("first frame was not identification: {other:?}"),
    }

    link.update_state(VehicleStatePatch {
        ailerons: Some(0.5),
        ..Default::default()
    })
    .await
    .unwrap();
    link.update_state(VehicleStatePatch {
        throttle: Some(1.0),
        ..Default::default()
    })
    .await
    .unwrap();

    let ServerEvent::Frame(second) = next_event(&mut server).await else {
        panic!("expected control frame");
    };
    match parse_message(&second).unwrap() {
        LinkMessage::Control(control) => {
            assert_eq!(control.axes, vec![-0.5, 0.0, 0.0, 0.0]);
        }
        other => panic!("expected control frame, got: {other:?}"),
    }

    let ServerEvent::Frame(third) = next_event(&mut server).await else {
        panic!("expected control frame");
    };
    match parse_message(&third).unwrap() {
        LinkMessage::Control(control) => {
            // Partial update: ailerons kept, throttle merged in.
            assert_eq!(control.axes, vec![-0.5, 0.0, 0.0, -1.0]);
        }
        other => panic!("expected control frame, got: {other:?}"),
    }

    link.teardown().await;
}

#[tokio::test]
async fn test_calibration_applied_at_transmission_time() {
    let (endpoint, mut server) = spawn_server(ServerOptions::default()).await;
    let settings = Arc::new(MemorySettings::new());
    let mut link = ControlLink::new(test_config(endpoint), settings.clone());

    link.initialize().await.unwrap();
    let mut status = link.subscribe();
    wait_for_phase(&mut status, LinkPhase::Connected).await;
    assert_eq!(next_event(&mut server).await, ServerEvent::Connected);
    let _identification = next_event(&mut server).await;

    link.update_calibration(CalibrationPatch {
        ailerons: Some(AxisCalibration::new(0.25, false)),
        elevator: Some(AxisCalibration::new(0.25, true)),
        ..Default::default()
    })
    .await
    .unwrap();

    link.update_state(VehicleStatePatch {
        ailerons: Some(0.5),
        elevator: Some(0.5),
        ..Default::default()
    })
    .await
    .unwrap();

    let ServerEvent::Frame(frame) = next_event(&mut server).await else {
        panic!("expected control frame");
    };
    match parse_message(&frame).unwrap() {
        LinkMessage::Control(control) => {
            // Trim flips sign together with the value under reverse.
            assert_eq!(control.axes, vec![-0.75, 0.75, 0.0, 0.0]);
        }
        other => panic!("expected control frame, got: {other:?}"),
    }

    // The stored state stays raw; calibration was applied on the wire only.
    let persisted = settings.vehicle_state().await.unwrap().unwrap();
    assert_eq!(persisted.ailerons, 0.5);
    assert_eq!(persisted.elevator, 0.5);

    link.teardown().await;
}

#[tokio::test]
async fn test_latency_is_measured_from_echoed_timestamp() {
    let (endpoint, _server) = spawn_server(ServerOptions {
        latency_delay: Some(Duration::from_millis(120)),
        ..Default::default()
    })
    .await;
    let mut config = test_config(endpoint);
    config.probe_interval_ms = 100;
    let mut link = ControlLink::new(config, Arc::new(MemorySettings::new()));

    link.initialize().await.unwrap();
    let mut status = link.subscribe();
    let measured = timeout(
        EVENT_TIMEOUT,
        status.wait_for(|current| current.latency.is_some()),
    )
    .await
    .expect("timed out waiting for latency")
    .expect("status channel closed")
    .latency
    .unwrap();

    assert!(measured >= TimeDelta::milliseconds(120), "latency {measured}");
    assert!(measured < TimeDelta::seconds(5), "latency {measured}");

    link.teardown().await;
}

#[tokio::test]
async fn test_reinitialize_keeps_exactly_one_connection() {
    let (endpoint, mut server) = spawn_server(ServerOptions::default()).await;
    let settings = Arc::new(MemorySettings::new());
    let mut link = ControlLink::new(test_config(endpoint), settings);

    link.initialize().await.unwrap();
    let mut status = link.subscribe();
    wait_for_phase(&mut status, LinkPhase::Connected).await;
    assert_eq!(next_event(&mut server).await, ServerEvent::Connected);
    let ServerEvent::Frame(first) = next_event(&mut server).await else {
        panic!("expected identification frame");
    };
    assert!(first.contains("identification"));

    // Close-before-open: the old transport is fully torn down before the
    // new one connects.
    link.initialize().await.unwrap();
    let mut status = link.subscribe();
    wait_for_phase(&mut status, LinkPhase::Connected).await;

    let mut saw_disconnect = false;
    let mut saw_connect = false;
    let mut frames = Vec::new();
    while !(saw_disconnect && saw_connect) {
        match next_event(&mut server).await {
            ServerEvent::Disconnected => saw_disconnect = true,
            ServerEvent::Connected => saw_connect = true,
            ServerEvent::Frame(frame) => frames.push(frame),
        }
    }
    if frames.is_empty() {
        let ServerEvent::Frame(frame) = next_event(&mut server).await else {
            panic!("expected identification frame on the new connection");
        };
        frames.push(frame);
    }
    assert_eq!(frames.len(), 1, "{frames:?}");
    assert!(frames[0].contains("identification"));

    // Exactly one control frame arrives for one update, on the live
    // connection only.
    link.update_state(VehicleStatePatch {
        rudder: Some(0.3),
        ..Default::default()
    })
    .await
    .unwrap();
    let ServerEvent::Frame(control) = next_event(&mut server).await else {
        panic!("expected control frame");
    };
    assert!(control.contains("control"));
    assert!(timeout(Duration::from_millis(300), server.recv()).await.is_err());

    link.teardown().await;
}

#[tokio::test]
async fn test_connected_phase_is_never_overwritten_by_initialization() {
    let (endpoint, mut server) = spawn_server(ServerOptions::default()).await;
    let mut link = ControlLink::new(test_config(endpoint), Arc::new(MemorySettings::new()));

    // Subscribe before initialize so every phase write is observable.
    let mut status = link.subscribe();
    link.initialize().await.unwrap();

    let mut phases = vec![status.borrow_and_update().phase];
    while !phases.contains(&LinkPhase::Connected) {
        timeout(EVENT_TIMEOUT, status.changed())
            .await
            .expect("timed out waiting for Connected")
            .expect("status channel closed");
        phases.push(status.borrow_and_update().phase);
    }

    // Once Connected, the phase holds until a transport event says
    // otherwise; a stale Connecting write would also gate off control
    // frames.
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(link.status().phase, LinkPhase::Connected, "{phases:?}");

    link.update_state(VehicleStatePatch {
        throttle: Some(0.4),
        ..Default::default()
    })
    .await
    .unwrap();

    loop {
        let ServerEvent::Frame(frame) = next_event(&mut server).await else {
            panic!("connection dropped unexpectedly");
        };
        if frame.contains("\"control\"") {
            break;
        }
    }

    link.teardown().await;
}

#[tokio::test]
async fn test_no_frames_after_teardown() {
    let (endpoint, mut server) = spawn_server(ServerOptions::default()).await;
    let mut config = test_config(endpoint);
    config.probe_interval_ms = 100;
    let mut link = ControlLink::new(config, Arc::new(MemorySettings::new()));

    link.initialize().await.unwrap();
    let mut status = link.subscribe();
    wait_for_phase(&mut status, LinkPhase::Connected).await;

    link.teardown().await;
    assert_eq!(link.status().phase, LinkPhase::Uninitialized);

    // Drain everything up to the disconnect, then verify silence longer
    // than several probe periods.
    loop {
        match next_event(&mut server).await {
            ServerEvent::Disconnected => break,
            _ => continue,
        }
    }
    assert!(timeout(Duration::from_millis(400), server.recv()).await.is_err());
}

#[tokio::test]
async fn test_malformed_and_unknown_inbound_frames_are_ignored() {
    let (endpoint, mut server) = spawn_server(ServerOptions {
        greetings: vec![
            "not even json".to_string(),
            r#"{"type": "video_keyframe", "data": []}"#.to_string(),
        ],
        ..Default::default()
    })
    .await;
    let mut link = ControlLink::new(test_config(endpoint), Arc::new(MemorySettings::new()));

    link.initialize().await.unwrap();
    let mut status = link.subscribe();
    wait_for_phase(&mut status, LinkPhase::Connected).await;
    assert_eq!(next_event(&mut server).await, ServerEvent::Connected);

    // The link survives the garbage and keeps operating.
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(link.status().phase, LinkPhase::Connected);

    link.update_state(VehicleStatePatch {
        ailerons: Some(0.1),
        ..Default::default()
    })
    .await
    .unwrap();

    loop {
        let ServerEvent::Frame(frame) = next_event(&mut server).await else {
            panic!("connection dropped unexpectedly");
        };
        if frame.contains("\"control\"") {
            break;
        }
    }

    link.teardown().await;
}

#[tokio::test]
async fn test_unreachable_endpoint_never_connects_but_persists() {
    // Bind then drop to get a port with nothing listening.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let settings = Arc::new(MemorySettings::new());
    let mut config = test_config(format!("ws://{addr}"));
    config.reconnect_delay_ms = 20;
    let mut link = ControlLink::new(config, settings.clone());

    link.initialize().await.unwrap();
    link.update_state(VehicleStatePatch {
        elevator: Some(-0.6),
        ..Default::default()
    })
    .await
    .unwrap();

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_ne!(link.status().phase, LinkPhase::Connected);
    assert!(link.status().latency.is_none());

    let persisted = settings.vehicle_state().await.unwrap().unwrap();
    assert_eq!(persisted.elevator, -0.6);

    link.teardown().await;
}
