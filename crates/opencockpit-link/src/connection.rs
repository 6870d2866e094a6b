//! Connection manager: owns the WebSocket transport and its reconnect loop
//!
//! One manager instance owns at most one live socket and exactly one
//! outstanding connection attempt at a time. Transport lifecycle is
//! exposed through three events (`Opened`, `Closed`, `Message`); explicit
//! `close()` is terminal and never re-enters the reconnect path.

use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use crate::config::ConnectionConfig;

const OUTBOUND_QUEUE_DEPTH: usize = 64;

/// Transport lifecycle events, delivered in order over a bounded channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    Opened,
    Closed,
    Message(String),
}

/// Cheap handle for queueing outbound text frames.
///
/// Sending is fire-and-forget: frames are dropped (debug-logged) when the
/// socket is down or the queue is unavailable. Transient disconnects are
/// expected, not exceptional, so no error reaches the caller.
#[derive(Debug, Clone)]
pub struct FrameSender {
    tx: mpsc::Sender<String>,
}

impl FrameSender {
    pub fn send(&self, frame: String) {
        if self.tx.try_send(frame).is_err() {
            debug!("Dropping outbound frame, transport unavailable");
        }
    }
}

/// Owns the transport supervisor task for a single endpoint.
#[derive(Debug)]
pub struct ConnectionManager {
    frames: FrameSender,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl ConnectionManager {
    /// Spawn the supervisor task and start connecting to the configured
    /// endpoint. Events are delivered on `events` until `close()`.
    pub fn open(config: ConnectionConfig, events: mpsc::Sender<ConnectionEvent>) -> Self {
        let (frame_tx, frame_rx) = mpsc::channel(OUTBOUND_QUEUE_DEPTH);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(run_transport(config, events, frame_rx, shutdown_rx));

        Self {
            frames: FrameSender { tx: frame_tx },
            shutdown: shutdown_tx,
            task,
        }
    }

    pub fn frames(&self) -> FrameSender {
        self.frames.clone()
    }

    pub fn send(&self, frame: String) {
        self.frames.send(frame);
    }

    /// Explicit, terminal teardown. A close frame is sent if connected,
    /// the reconnect loop exits, and no event fires after this returns.
    pub async fn close(self) {
        let _ = self.shutdown.send(true);
        if let Err(err) = self.task.await {
            if !err.is_cancelled() {
                warn!("Transport task failed during close: {err}");
            }
        }
    }

    /// Non-graceful teardown for drop paths.
    pub fn abort(&self) {
        self.task.abort();
    }
}

async fn run_transport(
    config: ConnectionConfig,
    events: mpsc::Sender<ConnectionEvent>,
    mut frames: mpsc::Receiver<String>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        if *shutdown.borrow() {
            return;
        }

        // Exactly one outstanding attempt at a time.
        let attempt = tokio::time::timeout(
            config.connect_timeout(),
            tokio_tungstenite::connect_async(config.endpoint.clone()),
        );

        let stream = tokio::select! {
            biased;
            _ = shutdown.changed() => return,
            connected = attempt => match connected {
                Ok(Ok((stream, _response))) => Some(stream),
                Ok(Err(err)) => {
                    debug!("Connection attempt to {} failed: {err}", config.endpoint);
                    None
                }
                Err(_) => {
                    debug!("Connection attempt to {} timed out", config.endpoint);
                    None
                }
            },
        };

        let Some(stream) = stream else {
            if wait_before_retry(&config, &mut frames, &mut shutdown).await.is_err() {
                return;
            }
            continue;
        };

        info!("Connected to {}", config.endpoint);
        if events.send(ConnectionEvent::Opened).await.is_err() {
            return;
        }

        let (mut sink, mut incoming) = stream.split();
        let mut open = true;

        while open {
            tokio::select! {
                biased;
                _ = shutdown.changed() => {
                    let _ = sink.send(Message::Close(None)).await;
                    return;
                }
                frame = frames.recv() => match frame {
                    Some(text) => {
                        if let Err(err) = sink.send(Message::text(text)).await {
                            debug!("Failed to send frame: {err}");
                            open = false;
                        }
                    }
                    // All senders gone means the owning link is gone.
                    None => {
                        let _ = sink.send(Message::Close(None)).await;
                        return;
                    }
                },
                message = incoming.next() => match message {
                    Some(Ok(Message::Text(text))) => {
                        if events
                            .send(ConnectionEvent::Message(text.as_str().to_owned()))
                            .await
                            .is_err()
                        {
                            return;
                        }
                    }
                    Some(Ok(Message::Close(_))) => {
                        debug!("Peer closed the connection");
                        open = false;
                    }
                    // Ping/pong are handled by the transport itself;
                    // binary frames have no meaning on this link.
                    Some(Ok(_)) => {}
                    Some(Err(err)) => {
                        debug!("Transport error: {err}");
                        open = false;
                    }
                    None => open = false,
                },
            }
        }

        if events.send(ConnectionEvent::Closed).await.is_err() {
            return;
        }
        if wait_before_retry(&config, &mut frames, &mut shutdown).await.is_err() {
            return;
        }
    }
}

/// Sleep out the reconnect delay. Frames queued while disconnected are
/// drained and discarded: replaying stale control input after a reconnect
/// is worse than losing it. Returns `Err(())` on shutdown.
async fn wait_before_retry(
    config: &ConnectionConfig,
    frames: &mut mpsc::Receiver<String>,
    shutdown: &mut watch::Receiver<bool>,
) -> Result<(), ()> {
    let delay = tokio::time::sleep(config.reconnect_delay());
    tokio::pin!(delay);

    loop {
        tokio::select! {
            biased;
            _ = shutdown.changed() => return Err(()),
            _ = &mut delay => return Ok(()),
            frame = frames.recv() => match frame {
                Some(_) => debug!("Dropping outbound frame while disconnected"),
                None => return Err(()),
            },
        }
    }
}

#[cfg(test)]
pub(crate) fn test_frame_sender(tx: mpsc::Sender<String>) -> FrameSender {
    FrameSender { tx }
}
