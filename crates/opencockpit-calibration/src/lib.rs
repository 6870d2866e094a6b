//! Axis calibration and control state for the vehicle control link
//!
//! This crate holds the pure data model shared across the link: the four
//! control axes, the desired-position state mutated by the pilot console,
//! and the per-axis trim/reverse calibration applied when a control frame
//! is built for the wire.

#![deny(unsafe_op_in_unsafe_fn)]
#![deny(clippy::unwrap_used)]

pub mod transform;
pub mod types;

pub use transform::*;
pub use types::*;
