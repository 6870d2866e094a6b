//! Vehicle control link
//!
//! The core aggregate of the pilot console: one logical WebSocket
//! connection to a vehicle-side controller, with session identification
//! on connect, periodic round-trip latency probing, and calibrated
//! control frames built from pilot input.
//!
//! The link is constructed once and passed around by handle; connection
//! lifecycle and latency are observable through a watch channel of
//! [`LinkStatus`] values.

#![deny(unsafe_op_in_unsafe_fn)]
#![deny(clippy::unwrap_used)]

pub mod config;
pub mod connection;
pub mod link;
pub mod prober;

pub use config::{ConnectionConfig, LinkConfig};
pub use connection::{ConnectionEvent, ConnectionManager, FrameSender};
pub use link::{ControlLink, LinkPhase, LinkStatus};
pub use prober::{LatencyProber, measure_round_trip};
