//! Status line shared with supervisors and displays

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;

pub const MSG_STARTING: &str = "Orchestrator starting...";
pub const MSG_ACTIVE: &str = "Active: managed apps supervised";
pub const MSG_INACTIVE: &str = "Inactive: waiting for is_active = true";
pub const MSG_COMM_FAILURE: &str = "Communication failure, retrying...";
pub const MSG_MANUAL_START: &str = "Started manually: apps running";
pub const MSG_RESTARTED: &str = "Apps restarted by remote command";
pub const MSG_STOPPED: &str = "Orchestrator stopped";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Starting,
    Active,
    Inactive,
    CommunicationFailure,
    ConfigurationError,
    Stopped,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Starting => write!(f, "starting"),
            Phase::Active => write!(f, "active"),
            Phase::Inactive => write!(f, "inactive"),
            Phase::CommunicationFailure => write!(f, "communication-failure"),
            Phase::ConfigurationError => write!(f, "configuration-error"),
            Phase::Stopped => write!(f, "stopped"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Status {
    pub phase: Phase,
    pub message: String,
    pub updated_at: DateTime<Utc>,
}

/// Cheap to clone; all clones publish to the same channel
#[derive(Clone)]
pub struct StatusReporter {
    tx: Arc<watch::Sender<Status>>,
}

impl Default for StatusReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusReporter {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(Status {
            phase: Phase::Starting,
            message: MSG_STARTING.to_string(),
            updated_at: Utc::now(),
        });
        Self { tx: Arc::new(tx) }
    }

    /// Publish a status. Repeats of the current phase and message are not re-sent.
    pub fn set(&self, phase: Phase, message: impl Into<String>) {
        let message = message.into();
        let changed = self.tx.send_if_modified(|current| {
            if current.phase == phase && current.message == message {
                return false;
            }
            current.phase = phase;
            current.message = message.clone();
            current.updated_at = Utc::now();
            true
        });
        if changed {
            info!(%phase, "{}", message);
        }
    }

    pub fn current(&self) -> Status {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Status> {
        self.tx.subscribe()
    }
}
