//! Remote command queue: drain, dispatch, acknowledge
//!
//! Delivery is at-least-once. A command whose acknowledgment fails stays
//! pending and runs again on a later drain, so every effect here must be
//! idempotent.

use super::actuator::AppActuator;
use super::policy::PolicyEnforcer;
use super::status::{Phase, StatusReporter, MSG_RESTARTED};
use crate::error::Result;
use crate::remote::{RemoteCommand, RemoteStateClient};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandKind {
    RestartApps,
    StartKiosk,
    StopKiosk,
    Unknown(String),
}

impl CommandKind {
    /// Commands match case-insensitively, ignoring surrounding whitespace
    pub fn parse(raw: &str) -> Self {
        let normalized = raw.trim().to_lowercase();
        match normalized.as_str() {
            "restart_apps" => CommandKind::RestartApps,
            "start_kiosk" => CommandKind::StartKiosk,
            "stop_kiosk" => CommandKind::StopKiosk,
            _ => CommandKind::Unknown(normalized),
        }
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandKind::RestartApps => write!(f, "restart_apps"),
            CommandKind::StartKiosk => write!(f, "start_kiosk"),
            CommandKind::StopKiosk => write!(f, "stop_kiosk"),
            CommandKind::Unknown(raw) => write!(f, "{}", raw),
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DrainReport {
    /// Ids of every command dispatched, in execution order
    pub executed: Vec<String>,
    /// Ids left pending because the acknowledgment failed
    pub unacknowledged: Vec<String>,
}

pub struct CommandProcessor {
    policy: Arc<PolicyEnforcer>,
    batch_limit: usize,
}

impl CommandProcessor {
    pub fn new(policy: Arc<PolicyEnforcer>, batch_limit: usize) -> Self {
        Self {
            policy,
            batch_limit: batch_limit.max(1),
        }
    }

    /// Execute pending commands oldest first. Only fetching the queue can fail.
    pub async fn drain(
        &self,
        remote: &dyn RemoteStateClient,
        actuator: &mut AppActuator,
        kiosk_enabled: bool,
        status: &StatusReporter,
    ) -> Result<DrainReport> {
        let mut commands = remote.fetch_pending_commands(self.batch_limit).await?;
        order_oldest_first(&mut commands);

        let mut report = DrainReport::default();
        for command in commands {
            let kind = CommandKind::parse(&command.command);
            info!(command_id = %command.id, command = %kind, "Executing remote command");

            match &kind {
                CommandKind::RestartApps => {
                    let outcome = actuator.restart(kiosk_enabled).await;
                    debug!(command_id = %command.id, ?outcome, "Restart finished");
                }
                CommandKind::StartKiosk => {
                    if !actuator.ensure_foreground(true).await {
                        warn!(command_id = %command.id, "start_kiosk only partially applied");
                    }
                }
                CommandKind::StopKiosk => self.policy.clear().await,
                CommandKind::Unknown(raw) => {
                    warn!(command_id = %command.id, command = %raw, "Unrecognized command, acknowledging without effect");
                }
            }
            report.executed.push(command.id.clone());

            match remote.acknowledge_command(&command.id).await {
                Ok(()) => {
                    if kind == CommandKind::RestartApps {
                        status.set(Phase::Active, MSG_RESTARTED);
                    }
                }
                Err(e) => {
                    warn!(command_id = %command.id, error = %e, "Acknowledgment failed, command stays pending");
                    report.unacknowledged.push(command.id);
                }
            }
        }
        Ok(report)
    }
}

/// Server order is authoritative unless every row carries a timestamp
fn order_oldest_first(commands: &mut [RemoteCommand]) {
    if commands.iter().all(|c| c.created_at.is_some()) {
        commands.sort_by_key(|c| c.created_at);
    }
}
