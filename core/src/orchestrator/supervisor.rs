//! Owns at most one running reconciliation loop

use super::actuator::AppActuator;
use super::commands::CommandProcessor;
use super::control_loop::{LoopTiming, ReconciliationLoop};
use super::policy::PolicyEnforcer;
use super::status::{Phase, Status, StatusReporter};
use crate::config::Config;
use crate::error::Result;
use crate::platform::{AppLauncher, HookLockdown, LockdownPlatform, ProcessLauncher, UiExecutor};
use crate::remote::{RemoteStateClient, RestStateClient};
use crate::state::LocalStateCache;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

pub const UI_THREAD_NAME: &str = "kiosk-ui";

/// Host-side implementations the loop drives
pub struct Bindings {
    pub launcher: Arc<dyn AppLauncher>,
    pub lockdown: Arc<dyn LockdownPlatform>,
    /// `None` builds a REST client from the config on every start
    pub remote: Option<Arc<dyn RemoteStateClient>>,
    pub cache: LocalStateCache,
}

impl Bindings {
    /// Process launcher, hook lockdown and REST remote, as configured
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            launcher: Arc::new(ProcessLauncher::new(config.launchers.clone())),
            lockdown: Arc::new(HookLockdown::new(config.lockdown.clone())),
            remote: None,
            cache: LocalStateCache::new()?,
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StartOptions {
    /// Mark the device active with kiosk on before the first cycle
    pub force_start: bool,
    /// With `force_start`, rerun the full cold start even if a session exists
    pub restart_sequence: bool,
}

struct Running {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
    foreground: Arc<Notify>,
}

pub struct Supervisor {
    config: Config,
    bindings: Bindings,
    status: StatusReporter,
    ui: Option<UiExecutor>,
    running: Option<Running>,
}

impl Supervisor {
    pub fn new(config: Config, bindings: Bindings) -> Self {
        Self {
            config,
            bindings,
            status: StatusReporter::new(),
            ui: None,
            running: None,
        }
    }

    pub async fn start(&mut self, force_start: bool) -> Result<()> {
        self.start_with(StartOptions {
            force_start,
            restart_sequence: false,
        })
        .await
    }

    /// Validate config, stop any previous loop and spawn a new one.
    /// Incomplete config fails here, before anything touches the remote.
    pub async fn start_with(&mut self, options: StartOptions) -> Result<()> {
        let settings = match self.config.orchestrator_config() {
            Ok(settings) => settings,
            Err(e) => {
                error!(error = %e, "Refusing to start");
                self.status.set(Phase::ConfigurationError, e.user_message());
                return Err(e);
            }
        };

        self.stop().await;

        let remote: Arc<dyn RemoteStateClient> = match &self.bindings.remote {
            Some(remote) => remote.clone(),
            None => Arc::new(RestStateClient::new(
                &settings,
                self.config.remote.request_timeout(),
            )?),
        };
        let ui = self.ui_executor()?;
        let schedule = &self.config.schedule;

        let policy = Arc::new(PolicyEnforcer::new(
            self.bindings.lockdown.clone(),
            ui.clone(),
            self.config.apps.self_id.clone(),
        ));
        let actuator = AppActuator::new(
            self.bindings.launcher.clone(),
            policy.clone(),
            ui,
            settings.primary_app.clone(),
            settings.kiosk_app.clone(),
            Duration::from_millis(schedule.settle_delay_ms),
        );
        let commands = CommandProcessor::new(policy.clone(), schedule.command_batch);
        let mut control = ReconciliationLoop::new(
            remote,
            self.bindings.cache.clone(),
            actuator,
            policy,
            commands,
            self.status.clone(),
            LoopTiming::from(schedule),
        );

        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let foreground = control.foreground_signal();
        let handle = tokio::spawn(async move {
            if options.force_start {
                control.force_start(options.restart_sequence).await;
            }
            control.run(token).await;
        });

        info!(
            device_id = %settings.device_id,
            site_id = %settings.site_id,
            force_start = options.force_start,
            "Orchestrator started"
        );
        self.running = Some(Running {
            cancel,
            handle,
            foreground,
        });
        Ok(())
    }

    /// Cancel the loop and wait for its current cycle to finish
    pub async fn stop(&mut self) {
        let Some(running) = self.running.take() else {
            return;
        };
        running.cancel.cancel();
        if let Err(e) = running.handle.await {
            warn!(error = %e, "Reconciliation loop ended abnormally");
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
            .as_ref()
            .is_some_and(|running| !running.handle.is_finished())
    }

    /// Ask the loop to re-assert the kiosk app at the next opportunity
    pub fn request_foreground(&self) -> bool {
        match &self.running {
            Some(running) => {
                running.foreground.notify_one();
                true
            }
            None => false,
        }
    }

    pub fn status(&self) -> watch::Receiver<Status> {
        self.status.subscribe()
    }

    pub fn current_status(&self) -> Status {
        self.status.current()
    }

    fn ui_executor(&mut self) -> Result<UiExecutor> {
        if let Some(ui) = &self.ui {
            return Ok(ui.clone());
        }
        let ui = UiExecutor::spawn(UI_THREAD_NAME)?;
        self.ui = Some(ui.clone());
        Ok(ui)
    }
}
