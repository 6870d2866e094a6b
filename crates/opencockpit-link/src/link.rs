//! Control link aggregate: lifecycle state machine and control-state fan-out
//!
//! The link composes the connection manager, the latency prober, and the
//! settings collaborator. Transport events are serialized through a single
//! event-loop task, which is the only writer of the observable phase and
//! latency; pilot input flows in on the caller's context and is guarded
//! by a mutex shared with nothing else that writes it.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{TimeDelta, Utc};
use opencockpit_calibration::{
    CalibrationPatch, VehicleCalibration, VehicleState, VehicleStatePatch, control_axes,
};
use opencockpit_protocol::{
    ClientType, Control, Identification, LinkMessage, encode_message, parse_message,
};
use opencockpit_settings::SettingsStore;
use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::LinkConfig;
use crate::connection::{ConnectionEvent, ConnectionManager, FrameSender};
use crate::prober::{LatencyProber, measure_round_trip};

const EVENT_QUEUE_DEPTH: usize = 64;

/// Lifecycle phase of the link, derived from transport events only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LinkPhase {
    #[default]
    Uninitialized,
    Disconnected,
    Connecting,
    Connected,
}

impl LinkPhase {
    pub fn is_connected(&self) -> bool {
        matches!(self, LinkPhase::Connected)
    }

    pub fn is_initialized(&self) -> bool {
        !matches!(self, LinkPhase::Uninitialized)
    }
}

/// Observable snapshot of the link: current phase and the last measured
/// round-trip latency (`None` before the first successful probe).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LinkStatus {
    pub phase: LinkPhase,
    pub latency: Option<TimeDelta>,
}

#[derive(Debug, Default, Clone, Copy)]
struct PilotState {
    state: VehicleState,
    calibration: VehicleCalibration,
}

#[derive(Debug)]
struct LinkSession {
    manager: ConnectionManager,
    frames: FrameSender,
    events_task: JoinHandle<()>,
    events_shutdown: watch::Sender<bool>,
}

/// The control link. Constructed once, initialized explicitly, and torn
/// down explicitly; re-initialization always closes the previous
/// transport and timer before opening new ones.
pub struct ControlLink {
    config: LinkConfig,
    settings: Arc<dyn SettingsStore>,
    vehicle_id: Option<Uuid>,
    shared: Arc<Mutex<PilotState>>,
    status_tx: watch::Sender<LinkStatus>,
    status_rx: watch::Receiver<LinkStatus>,
    session: Option<LinkSession>,
}

impl ControlLink {
    pub fn new(config: LinkConfig, settings: Arc<dyn SettingsStore>) -> Self {
        let (status_tx, status_rx) = watch::channel(LinkStatus::default());
        Self {
            config,
            settings,
            vehicle_id: None,
            shared: Arc::new(Mutex::new(PilotState::default())),
            status_tx,
            status_rx,
            session: None,
        }
    }

    /// Resolve the session identity, load persisted control state, and
    /// open a fresh transport + event loop. Any previous session is torn
    /// down completely first.
    ///
    /// # Errors
    ///
    /// Fails only on settings persistence errors; transport failures are
    /// absorbed by the reconnect loop.
    pub async fn initialize(&mut self) -> Result<()> {
        self.teardown().await;

        let vehicle_id = self.resolve_vehicle_id().await?;

        {
            let state = self
                .settings
                .vehicle_state()
                .await
                .context("Failed to load persisted vehicle state")?
                .unwrap_or_default();
            let calibration = self
                .settings
                .calibration()
                .await
                .context("Failed to load persisted calibration")?
                .unwrap_or_default();
            let mut shared = self.shared.lock();
            shared.state = state;
            shared.calibration = calibration;
        }

        // Connecting must be observable before the first transport event
        // can fire; the event loop is the only writer from here on.
        self.status_tx.send_replace(LinkStatus {
            phase: LinkPhase::Connecting,
            latency: None,
        });

        let (events_tx, events_rx) = mpsc::channel(EVENT_QUEUE_DEPTH);
        let manager = ConnectionManager::open(self.config.connection_config(), events_tx);
        let frames = manager.frames();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let events_task = tokio::spawn(run_link_events(
            events_rx,
            shutdown_rx,
            frames.clone(),
            vehicle_id,
            self.config.group_id,
            self.config.probe_interval(),
            self.status_tx.clone(),
        ));

        self.session = Some(LinkSession {
            manager,
            frames,
            events_task,
            events_shutdown: shutdown_tx,
        });

        info!(%vehicle_id, endpoint = %self.config.endpoint, "Control link initialized");
        Ok(())
    }

    /// Merge a partial state update, persist the full state, and if the
    /// link is currently Connected transmit a control frame with the four
    /// calibrated axis values. While disconnected the frame is simply not
    /// built; nothing is queued for later.
    ///
    /// # Errors
    ///
    /// Fails only if persisting the merged state fails.
    pub async fn update_state(&self, patch: VehicleStatePatch) -> Result<()> {
        let (state, axes) = {
            let mut shared = self.shared.lock();
            shared.state.apply(&patch);
            // Calibration is applied here, at transmission time; the
            // stored state stays raw.
            (
                shared.state,
                control_axes(&shared.state, &shared.calibration),
            )
        };

        self.settings
            .set_vehicle_state(Some(state))
            .await
            .context("Failed to persist vehicle state")?;

        if self.status_rx.borrow().phase.is_connected() {
            if let Some(session) = &self.session {
                let message = LinkMessage::Control(Control {
                    axes: axes.to_vec(),
                });
                match encode_message(&message) {
                    Ok(frame) => session.frames.send(frame),
                    Err(err) => warn!("Failed to encode control frame: {err}"),
                }
            }
        }

        Ok(())
    }

    /// Merge and persist a calibration change. Takes effect on the next
    /// transmitted control frame.
    ///
    /// # Errors
    ///
    /// Fails only if persisting the merged calibration fails.
    pub async fn update_calibration(&self, patch: CalibrationPatch) -> Result<()> {
        let calibration = {
            let mut shared = self.shared.lock();
            shared.calibration.apply(&patch);
            shared.calibration
        };
        self.settings
            .set_calibration(Some(calibration))
            .await
            .context("Failed to persist calibration")
    }

    /// Stop the event loop, abort the prober, and close the transport.
    /// After this returns no frame of any kind is sent, even if the
    /// transport had events queued.
    pub async fn teardown(&mut self) {
        let Some(session) = self.session.take() else {
            return;
        };

        // Stop consuming transport events first so nothing can react
        // mid-close; the prober is owned by the event task and dies with
        // it. Then close the transport.
        let _ = session.events_shutdown.send(true);
        if let Err(err) = session.events_task.await {
            if !err.is_cancelled() {
                warn!("Link event task failed during teardown: {err}");
            }
        }
        session.manager.close().await;

        self.status_tx.send_replace(LinkStatus::default());
        info!("Control link torn down");
    }

    /// Current observable status.
    pub fn status(&self) -> LinkStatus {
        *self.status_rx.borrow()
    }

    /// Subscribe to status changes.
    pub fn subscribe(&self) -> watch::Receiver<LinkStatus> {
        self.status_rx.clone()
    }

    /// The session identity, stable for the process lifetime once the
    /// link has been initialized.
    pub fn vehicle_id(&self) -> Option<Uuid> {
        self.vehicle_id
    }

    /// Camera stream endpoint, passed through untouched for the UI.
    pub fn camera_stream_url(&self) -> Option<&str> {
        self.config.camera_stream_url.as_deref()
    }

    /// Current desired axis positions (raw, uncalibrated).
    pub fn vehicle_state(&self) -> VehicleState {
        self.shared.lock().state
    }

    /// Current calibration.
    pub fn calibration(&self) -> VehicleCalibration {
        self.shared.lock().calibration
    }

    async fn resolve_vehicle_id(&mut self) -> Result<Uuid> {
        if let Some(id) = self.vehicle_id {
            return Ok(id);
        }

        let id = self
            .settings
            .vehicle_id()
            .await
            .context("Failed to load persisted vehicle id")?
            .unwrap_or_else(Uuid::new_v4);
        self.settings
            .set_vehicle_id(Some(id))
            .await
            .context("Failed to persist vehicle id")?;
        self.vehicle_id = Some(id);
        Ok(id)
    }
}

impl Drop for ControlLink {
    fn drop(&mut self) {
        if let Some(session) = self.session.take() {
            session.events_task.abort();
            session.manager.abort();
        }
    }
}

impl std::fmt::Debug for ControlLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControlLink")
            .field("endpoint", &self.config.endpoint)
            .field("vehicle_id", &self.vehicle_id)
            .field("status", &*self.status_rx.borrow())
            .finish_non_exhaustive()
    }
}

async fn run_link_events(
    mut events: mpsc::Receiver<ConnectionEvent>,
    mut shutdown: watch::Receiver<bool>,
    frames: FrameSender,
    vehicle_id: Uuid,
    group_id: Uuid,
    probe_interval: std::time::Duration,
    status: watch::Sender<LinkStatus>,
) {
    let mut prober: Option<LatencyProber> = None;

    loop {
        let event = tokio::select! {
            biased;
            _ = shutdown.changed() => break,
            event = events.recv() => match event {
                Some(event) => event,
                None => break,
            },
        };

        match event {
            ConnectionEvent::Opened => {
                // Identification is the first frame of every connection,
                // sent once per opened event.
                let identification = LinkMessage::Identification(Identification {
                    id: vehicle_id,
                    group_id,
                    client_type: ClientType::Pilot,
                });
                match encode_message(&identification) {
                    Ok(frame) => frames.send(frame),
                    Err(err) => warn!("Failed to encode identification frame: {err}"),
                }

                prober = Some(LatencyProber::start(
                    vehicle_id,
                    probe_interval,
                    frames.clone(),
                ));
                status.send_modify(|current| current.phase = LinkPhase::Connected);
            }
            ConnectionEvent::Closed => {
                prober = None;
                status.send_modify(|current| current.phase = LinkPhase::Disconnected);
            }
            ConnectionEvent::Message(raw) => match parse_message(&raw) {
                Ok(LinkMessage::LatencyResponse(response)) => {
                    let latency = measure_round_trip(response.timestamp, Utc::now());
                    debug!(latency_ms = latency.num_milliseconds(), "Latency updated");
                    status.send_modify(|current| current.latency = Some(latency));
                }
                // Not requests this link issued; nothing to retry.
                Ok(other) => debug!("Ignoring unexpected inbound message: {other:?}"),
                Err(err) => debug!("Ignoring malformed inbound message: {err}"),
            },
        }
    }

    // Dropping the prober here guarantees no probe outlives the session.
    drop(prober);
}
