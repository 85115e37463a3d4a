//! The reconciliation control loop
//!
//! Each cycle registers the device (until that succeeds once), fetches the
//! desired state, decides, actuates and drains the command queue. Cycles are
//! strictly sequential. Nothing that fails inside a cycle stops the loop: the
//! cycle falls back to the last known state and the next cycle retries.

use super::actuator::AppActuator;
use super::commands::CommandProcessor;
use super::policy::PolicyEnforcer;
use super::reconcile::{decide, lock_for, Decision, FetchOutcome, LastKnownState};
use super::status::{
    Phase, StatusReporter, MSG_ACTIVE, MSG_COMM_FAILURE, MSG_INACTIVE, MSG_MANUAL_START,
    MSG_STOPPED,
};
use crate::config::ScheduleConfig;
use crate::error::{ErrorClass, KioskError, Result};
use crate::remote::{DeviceState, RemoteStateClient};
use crate::state::LocalStateCache;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopTiming {
    pub poll_interval: Duration,
    pub kiosk_interval: Duration,
}

impl Default for LoopTiming {
    fn default() -> Self {
        Self::from(&ScheduleConfig::default())
    }
}

impl From<&ScheduleConfig> for LoopTiming {
    fn from(schedule: &ScheduleConfig) -> Self {
        Self {
            poll_interval: Duration::from_millis(schedule.poll_interval_ms),
            kiosk_interval: Duration::from_millis(schedule.kiosk_interval_ms),
        }
    }
}

enum Wake {
    Cancelled,
    Timer,
    Foreground,
}

pub struct ReconciliationLoop {
    remote: Arc<dyn RemoteStateClient>,
    cache: LocalStateCache,
    actuator: AppActuator,
    policy: Arc<PolicyEnforcer>,
    commands: CommandProcessor,
    status: StatusReporter,
    timing: LoopTiming,
    last: LastKnownState,
    last_decision: Option<Decision>,
    last_failure: Option<ErrorClass>,
    registered: bool,
    foreground: Arc<Notify>,
}

impl ReconciliationLoop {
    pub fn new(
        remote: Arc<dyn RemoteStateClient>,
        cache: LocalStateCache,
        actuator: AppActuator,
        policy: Arc<PolicyEnforcer>,
        commands: CommandProcessor,
        status: StatusReporter,
        timing: LoopTiming,
    ) -> Self {
        let last = LastKnownState::with_local_lock(cache.load_or_unlocked());
        Self {
            remote,
            cache,
            actuator,
            policy,
            commands,
            status,
            timing,
            last,
            last_decision: None,
            last_failure: None,
            registered: false,
            foreground: Arc::new(Notify::new()),
        }
    }

    /// Notified to re-assert the kiosk app between cycles
    pub fn foreground_signal(&self) -> Arc<Notify> {
        self.foreground.clone()
    }

    pub fn last_known(&self) -> LastKnownState {
        self.last
    }

    pub fn last_decision(&self) -> Option<Decision> {
        self.last_decision
    }

    /// Class of the error that failed the most recent cycle, if it failed
    pub fn last_failure(&self) -> Option<ErrorClass> {
        self.last_failure
    }

    pub fn actuator(&self) -> &AppActuator {
        &self.actuator
    }

    /// Run cycles until `cancel` fires. A cycle in flight always completes.
    pub async fn run(mut self, cancel: CancellationToken) {
        info!(
            poll_ms = self.timing.poll_interval.as_millis() as u64,
            kiosk_ms = self.timing.kiosk_interval.as_millis() as u64,
            "Reconciliation loop started"
        );
        let foreground = self.foreground.clone();

        while !cancel.is_cancelled() {
            let delay = self.run_cycle().await;
            debug!(delay_ms = delay.as_millis() as u64, "Cycle done");

            let wake = tokio::select! {
                _ = cancel.cancelled() => Wake::Cancelled,
                _ = tokio::time::sleep(delay) => Wake::Timer,
                _ = foreground.notified() => Wake::Foreground,
            };
            match wake {
                Wake::Cancelled => break,
                Wake::Timer => {}
                Wake::Foreground => self.resume_foreground().await,
            }
        }

        info!("Reconciliation loop stopped");
        self.status.set(Phase::Stopped, MSG_STOPPED);
    }

    /// One full cycle. Returns the delay before the next one.
    pub async fn run_cycle(&mut self) -> Duration {
        let decision = match self.cycle_body().await {
            Ok(decision) => {
                self.last_failure = None;
                decision
            }
            Err(e) => {
                let class = e.class();
                if e.is_transient() {
                    warn!(error = %e, ?class, "Cycle failed, falling back to last known state");
                } else {
                    error!(error = %e, ?class, "Cycle failed, falling back to last known state");
                }
                self.last_failure = Some(class);
                let decision = decide(FetchOutcome::Unreachable, &self.last);
                if let Err(e) = self.enforce(decision).await {
                    error!(error = %e, "Fallback enforcement failed");
                }
                self.status.set(Phase::CommunicationFailure, MSG_COMM_FAILURE);
                decision
            }
        };
        self.last_decision = Some(decision);
        self.next_delay(decision)
    }

    /// Manual start: mark the device active with kiosk on, then bring the apps up
    pub async fn force_start(&mut self, restart_sequence: bool) {
        info!(restart_sequence, "Forced start");
        self.register_once().await;

        if let Err(e) = self.remote.set_device_state(DeviceState::new(true, true)).await {
            warn!(error = %e, "Could not publish forced state");
        }
        self.persist_lock(true);
        self.last = LastKnownState {
            active: true,
            kiosk_mode: true,
            local_lock: true,
        };

        if restart_sequence {
            self.actuator.reset_session();
        }
        let report = self.actuator.ensure_running(true).await;
        if !report.is_ok() {
            warn!(?report, "Forced start incomplete");
        }
        self.status.set(Phase::Active, MSG_MANUAL_START);
    }

    async fn cycle_body(&mut self) -> Result<Decision> {
        self.register_once().await;

        let state = self
            .remote
            .fetch_state()
            .await?
            .ok_or_else(|| KioskError::DeviceNotFound {
                device_id: self.remote.device_id().to_string(),
            })?;

        if let Err(e) = self.remote.touch_last_seen().await {
            debug!(error = %e, "last_seen update failed");
        }
        self.persist_lock(lock_for(state));
        self.last.observe(state);

        let decision = decide(FetchOutcome::Reachable(state), &self.last);
        self.enforce(decision).await?;

        if decision.should_run {
            self.status.set(Phase::Active, MSG_ACTIVE);
        } else {
            self.status.set(Phase::Inactive, MSG_INACTIVE);
        }
        Ok(decision)
    }

    async fn enforce(&mut self, decision: Decision) -> Result<()> {
        if !decision.should_run {
            self.last = LastKnownState::default();
            self.actuator.reset_session();
            self.policy.clear().await;
            self.persist_lock(false);
            return Ok(());
        }

        let report = self.actuator.ensure_running(decision.kiosk_enabled).await;
        if !report.is_ok() {
            debug!(?report, "Actuation incomplete");
        }

        if decision.reachable {
            let drained = self
                .commands
                .drain(
                    self.remote.as_ref(),
                    &mut self.actuator,
                    decision.kiosk_enabled,
                    &self.status,
                )
                .await?;
            if !drained.executed.is_empty() {
                info!(
                    executed = drained.executed.len(),
                    pending = drained.unacknowledged.len(),
                    "Commands drained"
                );
            }
        }
        Ok(())
    }

    async fn register_once(&mut self) {
        if self.registered {
            return;
        }
        match self.remote.register_device().await {
            Ok(()) => {
                info!("Device registered");
                self.registered = true;
            }
            Err(e) => warn!(error = %e, "Device registration failed, retrying next cycle"),
        }
    }

    async fn resume_foreground(&self) {
        let kiosk = self
            .last_decision
            .map_or(false, |d| d.should_run && d.kiosk_enabled);
        if kiosk && !self.actuator.ensure_foreground(true).await {
            warn!("Could not re-assert kiosk app");
        }
    }

    fn persist_lock(&self, locked: bool) {
        if let Err(e) = self.cache.set(locked) {
            error!("Failed to persist local lock: {:#}", e);
        }
    }

    fn next_delay(&self, decision: Decision) -> Duration {
        if decision.should_run && decision.kiosk_enabled {
            self.timing.kiosk_interval
        } else {
            self.timing.poll_interval
        }
    }
}
