//! In-memory settings store for tests and ephemeral runs

use async_trait::async_trait;
use opencockpit_calibration::{VehicleCalibration, VehicleState};
use parking_lot::Mutex;
use uuid::Uuid;

use crate::{SettingsDocument, SettingsResult, SettingsStore};

/// Volatile [`SettingsStore`]: same semantics as the file-backed store,
/// nothing survives the process.
#[derive(Debug, Default)]
pub struct MemorySettings {
    document: Mutex<SettingsDocument>,
}

impl MemorySettings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from a pre-populated document.
    pub fn with_document(document: SettingsDocument) -> Self {
        Self {
            document: Mutex::new(document),
        }
    }
}

#[async_trait]
impl SettingsStore for MemorySettings {
    async fn vehicle_id(&self) -> SettingsResult<Option<Uuid>> {
        Ok(self.document.lock().vehicle_id)
    }

    async fn set_vehicle_id(&self, id: Option<Uuid>) -> SettingsResult<()> {
        self.document.lock().vehicle_id = id;
        Ok(())
    }

    async fn vehicle_state(&self) -> SettingsResult<Option<VehicleState>> {
        Ok(self.document.lock().vehicle_state)
    }

    async fn set_vehicle_state(&self, state: Option<VehicleState>) -> SettingsResult<()> {
        self.document.lock().vehicle_state = state;
        Ok(())
    }

    async fn calibration(&self) -> SettingsResult<Option<VehicleCalibration>> {
        Ok(self.document.lock().calibration)
    }

    async fn set_calibration(
        &self,
        calibration: Option<VehicleCalibration>,
    ) -> SettingsResult<()> {
        self.document.lock().calibration = calibration;
        Ok(())
    }

    async fn flip_camera_stream(&self) -> SettingsResult<bool> {
        Ok(self.document.lock().flip_camera_stream)
    }

    async fn set_flip_camera_stream(&self, flip: bool) -> SettingsResult<()> {
        self.document.lock().flip_camera_stream = flip;
        Ok(())
    }

    async fn clear(&self) -> SettingsResult<()> {
        *self.document.lock() = SettingsDocument::default();
        Ok(())
    }
}
