//! Remote state store contract
//!
//! The backend holds one record per device (the desired state) and a queue
//! of commands addressed to it. Implementations are bound to a single device
//! id at construction time.

pub mod rest;

pub use rest::RestStateClient;

use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Desired state as stored remotely. Not what the device is observed doing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceState {
    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub kiosk_mode: bool,
}

impl DeviceState {
    pub fn new(is_active: bool, kiosk_mode: bool) -> Self {
        Self {
            is_active,
            kiosk_mode,
        }
    }
}

/// One queued command. Consumed once, then marked executed remotely.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RemoteCommand {
    #[serde(deserialize_with = "opaque_id")]
    pub id: String,
    pub command: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl RemoteCommand {
    pub fn new(id: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            command: command.into(),
            created_at: None,
        }
    }
}

/// Accept string or numeric primary keys
fn opaque_id<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "unsupported command id: {}",
            other
        ))),
    }
}

#[async_trait]
pub trait RemoteStateClient: Send + Sync {
    /// The device this client reads and writes
    fn device_id(&self) -> &str;

    /// Idempotent upsert of the device record
    async fn register_device(&self) -> Result<()>;

    /// `Ok(None)` when no record exists for this device
    async fn fetch_state(&self) -> Result<Option<DeviceState>>;

    async fn set_device_state(&self, state: DeviceState) -> Result<()>;

    /// Liveness heartbeat
    async fn touch_last_seen(&self) -> Result<()>;

    /// Not-yet-executed commands, oldest first, at most `limit`
    async fn fetch_pending_commands(&self, limit: usize) -> Result<Vec<RemoteCommand>>;

    /// Mark one command executed
    async fn acknowledge_command(&self, command_id: &str) -> Result<()>;
}
