//! Persisted settings collaborator for the pilot console
//!
//! The control link treats persistence as an external collaborator with a
//! typed get/set surface: the session's vehicle id, the last-known control
//! state and calibration, and a display preference that is outside the
//! link's concern but lives in the same store. `clear()` wipes all keys.

#![deny(unsafe_op_in_unsafe_fn)]
#![deny(clippy::unwrap_used)]

pub mod error;
pub mod file;
pub mod memory;

pub use error::{SettingsError, SettingsResult};
pub use file::FileSettings;
pub use memory::MemorySettings;

use async_trait::async_trait;
use opencockpit_calibration::{VehicleCalibration, VehicleState};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Everything the store persists, as one serializable document.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", default)]
pub struct SettingsDocument {
    pub vehicle_id: Option<Uuid>,
    pub vehicle_state: Option<VehicleState>,
    pub calibration: Option<VehicleCalibration>,
    pub flip_camera_stream: bool,
}

/// Typed key/value persistence surface. Setters accept `None` to remove
/// a key, mirroring the console's settings semantics.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn vehicle_id(&self) -> SettingsResult<Option<Uuid>>;
    async fn set_vehicle_id(&self, id: Option<Uuid>) -> SettingsResult<()>;

    async fn vehicle_state(&self) -> SettingsResult<Option<VehicleState>>;
    async fn set_vehicle_state(&self, state: Option<VehicleState>) -> SettingsResult<()>;

    async fn calibration(&self) -> SettingsResult<Option<VehicleCalibration>>;
    async fn set_calibration(&self, calibration: Option<VehicleCalibration>)
    -> SettingsResult<()>;

    async fn flip_camera_stream(&self) -> SettingsResult<bool>;
    async fn set_flip_camera_stream(&self, flip: bool) -> SettingsResult<()>;

    /// Remove every persisted key.
    async fn clear(&self) -> SettingsResult<()>;
}
