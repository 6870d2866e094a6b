//! Raw axis input to transmittable value

use crate::{AXIS_COUNT, Axis, AxisCalibration, VehicleCalibration, VehicleState};

/// Transform a raw axis value into its transmittable form.
///
/// The polarity sign applies to the trim offset together with the raw
/// value: `sign = +1` when reversed, `-1` otherwise, and the output is
/// `value * sign + trim * sign`. The default (non-reversed) polarity is
/// negative because the console's raw sliders read inverted relative to
/// the servo sense on the vehicle.
///
/// Pure and deterministic; no clamping is performed here. Range limits,
/// if any, are the caller's concern at the input boundary.
pub fn transform_axis(value: f64, calibration: AxisCalibration) -> f64 {
    let sign = if calibration.reverse { 1.0 } else { -1.0 };
    value * sign + calibration.trim * sign
}

/// Build the four transmittable axis values in wire order
/// [ailerons, elevator, rudder, throttle].
///
/// Calibration is read here, at frame build time, so stored state stays
/// raw across calibration changes and reconnects.
pub fn control_axes(state: &VehicleState, calibration: &VehicleCalibration) -> [f64; AXIS_COUNT] {
    Axis::ALL.map(|axis| transform_axis(state.axis(axis), calibration.axis(axis)))
}
