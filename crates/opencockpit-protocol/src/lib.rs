//! Wire protocol for the vehicle control link
//!
//! Frames are JSON text messages tagged by a `type` field. Four kinds
//! exist: `identification` (announces a session to the peer on connect),
//! `control` (the four transformed axis values in fixed order),
//! `latency_request`, and `latency_response` (a round-trip probe pair
//! correlated only by the echoed timestamp).
//!
//! Both console and vehicle peers use this crate, so every kind is
//! modeled in both directions.

#![deny(unsafe_op_in_unsafe_fn)]
#![deny(clippy::unwrap_used)]

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Opaque session/group identifier.
pub type Id = Uuid;

#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Failed to encode link message: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("Malformed link message: {0}")]
    Decode(#[source] serde_json::Error),
}

/// Role a peer announces in its identification frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientType {
    Pilot,
    Vehicle,
}

/// Payload of an `identification` frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Identification {
    pub id: Id,
    pub group_id: Id,
    pub client_type: ClientType,
}

/// Payload of a `control` frame. Axis order is fixed:
/// ailerons, elevator, rudder, throttle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Control {
    pub axes: Vec<f64>,
}

/// Payload of a `latency_request` probe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LatencyRequest {
    pub initiator_id: Id,
    pub timestamp: DateTime<Utc>,
}

/// Payload of a `latency_response`.
///
/// `timestamp` echoes the request's send time; the responder and
/// initiator ids are echoed by vehicle peers but optional on parse, so
/// the minimal `{type, timestamp}` shape is also accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LatencyResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initiator_id: Option<Id>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub responder_id: Option<Id>,
    pub timestamp: DateTime<Utc>,
}

/// A frame on the wire, tagged by its `type` field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LinkMessage {
    Identification(Identification),
    Control(Control),
    LatencyRequest(LatencyRequest),
    LatencyResponse(LatencyResponse),
}

/// Serialize a frame to its wire form.
///
/// # Errors
///
/// Returns [`ProtocolError::Encode`] if serialization fails; none of the
/// message types can actually produce one.
pub fn encode_message(message: &LinkMessage) -> Result<String, ProtocolError> {
    serde_json::to_string(message).map_err(ProtocolError::Encode)
}

/// Parse a wire frame.
///
/// # Errors
///
/// Returns [`ProtocolError::Decode`] for unparseable payloads and for
/// unknown `type` tags. Callers on the link treat both as ignorable.
pub fn parse_message(raw: &str) -> Result<LinkMessage, ProtocolError> {
    serde_json::from_str(raw).map_err(ProtocolError::Decode)
}
