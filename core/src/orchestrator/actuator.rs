//! Brings the managed apps up in order and keeps the kiosk app in front

use super::policy::PolicyEnforcer;
use crate::error::KioskError;
use crate::platform::{AppLauncher, LaunchMode, UiExecutor};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Whether the cold-start sequence has completed in the current run period
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionState {
    pub started: bool,
}

/// Per-step outcome of one actuation. `None` means the step did not run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActuationReport {
    pub primary_launched: Option<bool>,
    pub kiosk_launched: Option<bool>,
    pub foregrounded: Option<bool>,
    pub lockdown_applied: Option<bool>,
}

impl ActuationReport {
    /// No step that ran has failed
    pub fn is_ok(&self) -> bool {
        [
            self.primary_launched,
            self.kiosk_launched,
            self.foregrounded,
            self.lockdown_applied,
        ]
        .iter()
        .all(|step| step.unwrap_or(true))
    }
}

pub struct AppActuator {
    launcher: Arc<dyn AppLauncher>,
    policy: Arc<PolicyEnforcer>,
    ui: UiExecutor,
    primary_app: String,
    kiosk_app: String,
    settle_delay: Duration,
    session: SessionState,
}

impl AppActuator {
    pub fn new(
        launcher: Arc<dyn AppLauncher>,
        policy: Arc<PolicyEnforcer>,
        ui: UiExecutor,
        primary_app: impl Into<String>,
        kiosk_app: impl Into<String>,
        settle_delay: Duration,
    ) -> Self {
        Self {
            launcher,
            policy,
            ui,
            primary_app: primary_app.into(),
            kiosk_app: kiosk_app.into(),
            settle_delay,
            session: SessionState::default(),
        }
    }

    pub fn kiosk_app(&self) -> &str {
        &self.kiosk_app
    }

    pub fn session(&self) -> SessionState {
        self.session
    }

    pub fn reset_session(&mut self) {
        if self.session.started {
            debug!("Session reset");
        }
        self.session = SessionState::default();
    }

    /// Converge to "both apps running", launching them at most once per session
    pub async fn ensure_running(&mut self, kiosk_enabled: bool) -> ActuationReport {
        let mut report = if !self.session.started {
            self.cold_start(kiosk_enabled, LaunchMode::Reuse).await
        } else if kiosk_enabled {
            ActuationReport {
                foregrounded: Some(self.launch(&self.kiosk_app, LaunchMode::Reuse).await),
                ..ActuationReport::default()
            }
        } else {
            ActuationReport::default()
        };

        if kiosk_enabled {
            report.lockdown_applied = Some(self.policy.apply(&self.kiosk_app).await);
        }
        report
    }

    /// Lock to the kiosk app and bring it to the front. Does nothing when kiosk is off.
    pub async fn ensure_foreground(&self, kiosk_enabled: bool) -> bool {
        if !kiosk_enabled {
            return false;
        }
        let locked = self.policy.apply(&self.kiosk_app).await;
        let launched = self.launch(&self.kiosk_app, LaunchMode::Reuse).await;
        locked && launched
    }

    /// Stop and relaunch both apps with the full cold-start sequence
    pub async fn restart(&mut self, kiosk_enabled: bool) -> ActuationReport {
        self.reset_session();
        let mut report = self.cold_start(kiosk_enabled, LaunchMode::Fresh).await;
        if kiosk_enabled {
            report.lockdown_applied = Some(self.policy.apply(&self.kiosk_app).await);
        }
        report
    }

    async fn cold_start(&mut self, kiosk_enabled: bool, mode: LaunchMode) -> ActuationReport {
        info!(
            primary = %self.primary_app,
            kiosk = %self.kiosk_app,
            delay_ms = self.settle_delay.as_millis() as u64,
            "Starting managed apps"
        );
        let primary = self.launch(&self.primary_app, mode).await;

        tokio::time::sleep(self.settle_delay).await;

        let mut lockdown = None;
        if kiosk_enabled {
            lockdown = Some(self.policy.apply(&self.kiosk_app).await);
        }
        let kiosk = self.launch(&self.kiosk_app, mode).await;

        if primary && kiosk {
            self.session.started = true;
        } else {
            warn!(primary, kiosk, "Cold start incomplete, retrying next cycle");
        }

        ActuationReport {
            primary_launched: Some(primary),
            kiosk_launched: Some(kiosk),
            foregrounded: None,
            lockdown_applied: lockdown,
        }
    }

    async fn launch(&self, app_id: &str, mode: LaunchMode) -> bool {
        let launcher = self.launcher.clone();
        let app = app_id.to_string();
        let outcome = self
            .ui
            .run(move || async move {
                if !launcher.is_installed(&app).await {
                    return Err(KioskError::AppNotInstalled { app_id: app });
                }
                launcher.launch(&app, mode).await
            })
            .await;

        match outcome {
            Ok(Ok(())) => {
                debug!(app = app_id, ?mode, "Launch ok");
                true
            }
            Ok(Err(e)) | Err(e) => {
                warn!(app = app_id, error = %e, "Launch failed");
                false
            }
        }
    }
}
