//! Link and transport configuration

use std::time::Duration;

use uuid::Uuid;

pub const DEFAULT_PROBE_INTERVAL_MS: u64 = 2000;
pub const DEFAULT_RECONNECT_DELAY_MS: u64 = 1000;
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 5000;

/// Transport-level configuration for the connection manager.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// WebSocket endpoint of the relay server.
    pub endpoint: String,
    /// Delay between reconnection attempts after a transport loss.
    pub reconnect_delay_ms: u64,
    /// Upper bound on a single connection attempt.
    pub connect_timeout_ms: u64,
}

impl ConnectionConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            reconnect_delay_ms: DEFAULT_RECONNECT_DELAY_MS,
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
        }
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

/// Configuration of one control link instance, resolved at startup.
#[derive(Debug, Clone)]
pub struct LinkConfig {
    /// WebSocket endpoint of the relay server.
    pub endpoint: String,
    /// Camera stream endpoint, exposed to the UI untouched; the link
    /// never decodes it.
    pub camera_stream_url: Option<String>,
    /// Static group identifier shared by pilot and vehicle.
    pub group_id: Uuid,
    /// Cadence of latency probes while connected.
    pub probe_interval_ms: u64,
    /// Delay between reconnection attempts after a transport loss.
    pub reconnect_delay_ms: u64,
    /// Upper bound on a single connection attempt.
    pub connect_timeout_ms: u64,
}

impl LinkConfig {
    pub fn new(endpoint: impl Into<String>, group_id: Uuid) -> Self {
        Self {
            endpoint: endpoint.into(),
            camera_stream_url: None,
            group_id,
            probe_interval_ms: DEFAULT_PROBE_INTERVAL_MS,
            reconnect_delay_ms: DEFAULT_RECONNECT_DELAY_MS,
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
        }
    }

    pub fn with_camera_stream_url(mut self, url: impl Into<String>) -> Self {
        self.camera_stream_url = Some(url.into());
        self
    }

    pub fn probe_interval(&self) -> Duration {
        Duration::from_millis(self.probe_interval_ms)
    }

    pub fn connection_config(&self) -> ConnectionConfig {
        ConnectionConfig {
            endpoint: self.endpoint.clone(),
            reconnect_delay_ms: self.reconnect_delay_ms,
            connect_timeout_ms: self.connect_timeout_ms,
        }
    }
}
