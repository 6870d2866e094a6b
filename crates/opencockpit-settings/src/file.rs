//! File-backed settings store with atomic writes

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use opencockpit_calibration::{VehicleCalibration, VehicleState};
use tokio::fs as async_fs;
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use crate::{SettingsDocument, SettingsResult, SettingsStore};

const SETTINGS_FILE: &str = "settings.json";

/// Settings persisted as a single JSON document in a data directory.
///
/// Writes use the atomic temp-write-then-rename pattern so a failed write
/// never corrupts the existing document. The document is cached in memory
/// behind a mutex; every mutation rewrites the whole file.
#[derive(Debug)]
pub struct FileSettings {
    path: PathBuf,
    document: Mutex<SettingsDocument>,
}

impl FileSettings {
    /// Open (or bootstrap) the settings store under `data_dir`.
    ///
    /// # Errors
    ///
    /// Fails if the directory cannot be created or an existing document
    /// cannot be read or parsed.
    pub async fn open(data_dir: &Path) -> SettingsResult<Self> {
        async_fs::create_dir_all(data_dir).await?;
        let path = data_dir.join(SETTINGS_FILE);

        let document = match async_fs::read_to_string(&path).await {
            Ok(raw) => serde_json::from_str(&raw)?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => SettingsDocument::default(),
            Err(err) => return Err(err.into()),
        };

        debug!(path = ?path, "Opened settings store");
        Ok(Self {
            path,
            document: Mutex::new(document),
        })
    }

    /// Write the document to a temporary file, then rename it over the
    /// target. The original file is preserved if the write fails.
    async fn write_atomic(&self, document: &SettingsDocument) -> SettingsResult<()> {
        let content = serde_json::to_string_pretty(document)?;
        let temp_path = self.path.with_extension("tmp");

        async_fs::write(&temp_path, content).await?;
        async_fs::rename(&temp_path, &self.path).await?;

        debug!(path = ?self.path, "Settings written");
        Ok(())
    }

    async fn mutate<F>(&self, apply: F) -> SettingsResult<()>
    where
        F: FnOnce(&mut SettingsDocument),
    {
        let mut document = self.document.lock().await;
        apply(&mut document);
        self.write_atomic(&document).await
    }
}

#[async_trait]
impl SettingsStore for FileSettings {
    async fn vehicle_id(&self) -> SettingsResult<Option<Uuid>> {
        Ok(self.document.lock().await.vehicle_id)
    }

    async fn set_vehicle_id(&self, id: Option<Uuid>) -> SettingsResult<()> {
        self.mutate(|document| document.vehicle_id = id).await
    }

    async fn vehicle_state(&self) -> SettingsResult<Option<VehicleState>> {
        Ok(self.document.lock().await.vehicle_state)
    }

    async fn set_vehicle_state(&self, state: Option<VehicleState>) -> SettingsResult<()> {
        self.mutate(|document| document.vehicle_state = state).await
    }

    async fn calibration(&self) -> SettingsResult<Option<VehicleCalibration>> {
        Ok(self.document.lock().await.calibration)
    }

    async fn set_calibration(
        &self,
        calibration: Option<VehicleCalibration>,
    ) -> SettingsResult<()> {
        self.mutate(|document| document.calibration = calibration)
            .await
    }

    async fn flip_camera_stream(&self) -> SettingsResult<bool> {
        Ok(self.document.lock().await.flip_camera_stream)
    }

    async fn set_flip_camera_stream(&self, flip: bool) -> SettingsResult<()> {
        self.mutate(|document| document.flip_camera_stream = flip)
            .await
    }

    async fn clear(&self) -> SettingsResult<()> {
        self.mutate(|document| *document = SettingsDocument::default())
            .await
    }
}
