//! Control axes, vehicle state, and calibration types

use serde::{Deserialize, Serialize};

/// Number of independent control channels on the vehicle.
pub const AXIS_COUNT: usize = 4;

/// One independent control channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Axis {
    Ailerons,
    Elevator,
    Rudder,
    Throttle,
}

impl Axis {
    /// All axes in wire order. Control frames carry values in exactly
    /// this order.
    pub const ALL: [Axis; AXIS_COUNT] = [
        Axis::Ailerons,
        Axis::Elevator,
        Axis::Rudder,
        Axis::Throttle,
    ];
}

/// Current desired position of each axis, nominal range [-1.0, 1.0].
///
/// This is raw pilot input; calibration is applied at transmission time
/// and is never baked into the stored values.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct VehicleState {
    pub ailerons: f64,
    pub elevator: f64,
    pub rudder: f64,
    pub throttle: f64,
}

impl VehicleState {
    pub fn axis(&self, axis: Axis) -> f64 {
        match axis {
            Axis::Ailerons => self.ailerons,
            Axis::Elevator => self.elevator,
            Axis::Rudder => self.rudder,
            Axis::Throttle => self.throttle,
        }
    }

    /// Merge a partial update field-wise. Absent fields leave the
    /// corresponding axis untouched.
    pub fn apply(&mut self, patch: &VehicleStatePatch) {
        if let Some(value) = patch.ailerons {
            self.ailerons = value;
        }
        if let Some(value) = patch.elevator {
            self.elevator = value;
        }
        if let Some(value) = patch.rudder {
            self.rudder = value;
        }
        if let Some(value) = patch.throttle {
            self.throttle = value;
        }
    }
}

/// Field-wise partial update of [`VehicleState`].
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", default)]
pub struct VehicleStatePatch {
    pub ailerons: Option<f64>,
    pub elevator: Option<f64>,
    pub rudder: Option<f64>,
    pub throttle: Option<f64>,
}

impl VehicleStatePatch {
    pub fn is_empty(&self) -> bool {
        self.ailerons.is_none()
            && self.elevator.is_none()
            && self.rudder.is_none()
            && self.throttle.is_none()
    }
}

/// Calibration of a single axis: an additive trim offset and a polarity
/// flip. Under the reverse flag the trim offset flips sign together with
/// the raw value.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", default)]
pub struct AxisCalibration {
    pub trim: f64,
    pub reverse: bool,
}

impl AxisCalibration {
    pub fn new(trim: f64, reverse: bool) -> Self {
        Self { trim, reverse }
    }
}

/// Per-axis calibration, persisted independently of [`VehicleState`].
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", default)]
pub struct VehicleCalibration {
    pub ailerons: AxisCalibration,
    pub elevator: AxisCalibration,
    pub rudder: AxisCalibration,
    pub throttle: AxisCalibration,
}

impl VehicleCalibration {
    pub fn axis(&self, axis: Axis) -> AxisCalibration {
        match axis {
            Axis::Ailerons => self.ailerons,
            Axis::Elevator => self.elevator,
            Axis::Rudder => self.rudder,
            Axis::Throttle => self.throttle,
        }
    }

    /// Merge a partial calibration update field-wise.
    pub fn apply(&mut self, patch: &CalibrationPatch) {
        if let Some(calibration) = patch.ailerons {
            self.ailerons = calibration;
        }
        if let Some(calibration) = patch.elevator {
            self.elevator = calibration;
        }
        if let Some(calibration) = patch.rudder {
            self.rudder = calibration;
        }
        if let Some(calibration) = patch.throttle {
            self.throttle = calibration;
        }
    }
}

/// Field-wise partial update of [`VehicleCalibration`].
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", default)]
pub struct CalibrationPatch {
    pub ailerons: Option<AxisCalibration>,
    pub elevator: Option<AxisCalibration>,
    pub rudder: Option<AxisCalibration>,
    pub throttle: Option<AxisCalibration>,
}
