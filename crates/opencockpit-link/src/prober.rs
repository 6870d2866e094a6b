//! Periodic round-trip latency probing

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use opencockpit_protocol::{LatencyRequest, LinkMessage, encode_message};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::warn;
use uuid::Uuid;

use crate::connection::FrameSender;

/// Emits a `latency_request` frame at a fixed cadence while alive.
///
/// Started when the link reaches Connected and dropped the moment it
/// leaves that state, so the timer never outlives the connection that
/// created it. Responses are matched only by the echoed timestamp; the
/// most recently processed response wins.
#[derive(Debug)]
pub struct LatencyProber {
    task: JoinHandle<()>,
}

impl LatencyProber {
    pub fn start(initiator_id: Uuid, interval: Duration, frames: FrameSender) -> Self {
        let task = tokio::spawn(async move {
            // First probe goes out one full period after connect, not
            // immediately: identification must stay the first frame.
            let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
            loop {
                ticker.tick().await;
                let request = LinkMessage::LatencyRequest(LatencyRequest {
                    initiator_id,
                    timestamp: Utc::now(),
                });
                match encode_message(&request) {
                    Ok(frame) => frames.send(frame),
                    Err(err) => warn!("Failed to encode latency request: {err}"),
                }
            }
        });

        Self { task }
    }
}

impl Drop for LatencyProber {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Round-trip time of a probe whose echoed send time is `echoed`.
///
/// Signed on purpose: a future echoed timestamp (clock skew) yields a
/// negative measurement, unclamped. Clock skew is not corrected.
pub fn measure_round_trip(echoed: DateTime<Utc>, now: DateTime<Utc>) -> TimeDelta {
    now - echoed
}
