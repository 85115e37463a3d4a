//! In-memory fakes for the remote store and platform primitives

use crate::error::{KioskError, Result};
use crate::platform::{AppLauncher, LaunchMode, LockdownPlatform};
use crate::remote::{DeviceState, RemoteCommand, RemoteStateClient};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Instant;

fn unreachable_err() -> KioskError {
    KioskError::ConnectionFailed {
        message: "backend unreachable".to_string(),
    }
}

// ---------------------------------------------------------------------------
// Remote
// ---------------------------------------------------------------------------

struct QueuedCommand {
    command: RemoteCommand,
    executed: bool,
}

pub struct FakeRemote {
    state: Mutex<Option<DeviceState>>,
    reachable: AtomicBool,
    commands: Mutex<Vec<QueuedCommand>>,
    fail_acks: AtomicBool,
    fail_touch: AtomicBool,
    fail_register: AtomicBool,
    registrations: AtomicUsize,
    touches: AtomicUsize,
    acks: AtomicUsize,
    written_states: Mutex<Vec<DeviceState>>,
}

impl FakeRemote {
    pub fn with_state(is_active: bool, kiosk_mode: bool) -> Self {
        Self {
            state: Mutex::new(Some(DeviceState::new(is_active, kiosk_mode))),
            reachable: AtomicBool::new(true),
            commands: Mutex::new(Vec::new()),
            fail_acks: AtomicBool::new(false),
            fail_touch: AtomicBool::new(false),
            fail_register: AtomicBool::new(false),
            registrations: AtomicUsize::new(0),
            touches: AtomicUsize::new(0),
            acks: AtomicUsize::new(0),
            written_states: Mutex::new(Vec::new()),
        }
    }

    pub fn set_state(&self, is_active: bool, kiosk_mode: bool) {
        *self.state.lock() = Some(DeviceState::new(is_active, kiosk_mode));
    }

    pub fn remove_record(&self) {
        *self.state.lock() = None;
    }

    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    pub fn fail_acks(&self, fail: bool) {
        self.fail_acks.store(fail, Ordering::SeqCst);
    }

    pub fn fail_touch(&self, fail: bool) {
        self.fail_touch.store(fail, Ordering::SeqCst);
    }

    pub fn fail_register(&self, fail: bool) {
        self.fail_register.store(fail, Ordering::SeqCst);
    }

    pub fn push_command(&self, id: &str, command: &str) {
        self.commands.lock().push(QueuedCommand {
            command: RemoteCommand::new(id, command),
            executed: false,
        });
    }

    /// Queue a command carrying a creation time, in server row order
    pub fn push_command_at(&self, id: &str, command: &str, created_at: DateTime<Utc>) {
        self.commands.lock().push(QueuedCommand {
            command: RemoteCommand {
                created_at: Some(created_at),
                ..RemoteCommand::new(id, command)
            },
            executed: false,
        });
    }

    pub fn pending_ids(&self) -> Vec<String> {
        self.commands
            .lock()
            .iter()
            .filter(|c| !c.executed)
            .map(|c| c.command.id.clone())
            .collect()
    }

    pub fn registrations(&self) -> usize {
        self.registrations.load(Ordering::SeqCst)
    }

    pub fn touches(&self) -> usize {
        self.touches.load(Ordering::SeqCst)
    }

    pub fn acks(&self) -> usize {
        self.acks.load(Ordering::SeqCst)
    }

    pub fn written_states(&self) -> Vec<DeviceState> {
        self.written_states.lock().clone()
    }

    fn check_reachable(&self) -> Result<()> {
        if self.reachable.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(unreachable_err())
        }
    }
}

#[async_trait]
impl RemoteStateClient for FakeRemote {
    fn device_id(&self) -> &str {
        "dev-test"
    }

    async fn register_device(&self) -> Result<()> {
        self.check_reachable()?;
        self.registrations.fetch_add(1, Ordering::SeqCst);
        if self.fail_register.load(Ordering::SeqCst) {
            return Err(KioskError::RemoteStatus {
                status: 400,
                body: "column site_id does not exist".to_string(),
            });
        }
        Ok(())
    }

    async fn fetch_state(&self) -> Result<Option<DeviceState>> {
        self.check_reachable()?;
        Ok(*self.state.lock())
    }

    async fn set_device_state(&self, state: DeviceState) -> Result<()> {
        self.check_reachable()?;
        self.written_states.lock().push(state);
        *self.state.lock() = Some(state);
        Ok(())
    }

    async fn touch_last_seen(&self) -> Result<()> {
        self.check_reachable()?;
        self.touches.fetch_add(1, Ordering::SeqCst);
        if self.fail_touch.load(Ordering::SeqCst) {
            return Err(KioskError::RemoteStatus {
                status: 500,
                body: "boom".to_string(),
            });
        }
        Ok(())
    }

    async fn fetch_pending_commands(&self, limit: usize) -> Result<Vec<RemoteCommand>> {
        self.check_reachable()?;
        Ok(self
            .commands
            .lock()
            .iter()
            .filter(|c| !c.executed)
            .take(limit)
            .map(|c| c.command.clone())
            .collect())
    }

    async fn acknowledge_command(&self, command_id: &str) -> Result<()> {
        self.check_reachable()?;
        if self.fail_acks.load(Ordering::SeqCst) {
            return Err(KioskError::AckFailed {
                command_id: command_id.to_string(),
                reason: "503".to_string(),
            });
        }
        self.acks.fetch_add(1, Ordering::SeqCst);
        if let Some(c) = self
            .commands
            .lock()
            .iter_mut()
            .find(|c| c.command.id == command_id)
        {
            c.executed = true;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Launcher
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct LaunchRecord {
    pub app_id: String,
    pub mode: LaunchMode,
    pub at: Instant,
}

pub struct FakeLauncher {
    installed: Mutex<HashSet<String>>,
    launches: Mutex<Vec<LaunchRecord>>,
    reject: AtomicBool,
}

impl FakeLauncher {
    pub fn with_apps(apps: &[&str]) -> Self {
        Self {
            installed: Mutex::new(apps.iter().map(|a| a.to_string()).collect()),
            launches: Mutex::new(Vec::new()),
            reject: AtomicBool::new(false),
        }
    }

    pub fn install(&self, app_id: &str) {
        self.installed.lock().insert(app_id.to_string());
    }

    pub fn reject_launches(&self, reject: bool) {
        self.reject.store(reject, Ordering::SeqCst);
    }

    pub fn launches(&self) -> Vec<LaunchRecord> {
        self.launches.lock().clone()
    }

    pub fn launched_ids(&self) -> Vec<String> {
        self.launches.lock().iter().map(|l| l.app_id.clone()).collect()
    }

    pub fn count(&self, app_id: &str) -> usize {
        self.launches
            .lock()
            .iter()
            .filter(|l| l.app_id == app_id)
            .count()
    }

    pub fn clear(&self) {
        self.launches.lock().clear();
    }
}

#[async_trait]
impl AppLauncher for FakeLauncher {
    async fn is_installed(&self, app_id: &str) -> bool {
        self.installed.lock().contains(app_id)
    }

    async fn launch(&self, app_id: &str, mode: LaunchMode) -> Result<()> {
        if self.reject.load(Ordering::SeqCst) {
            return Err(KioskError::LaunchFailed {
                app_id: app_id.to_string(),
                reason: "rejected".to_string(),
            });
        }
        self.launches.lock().push(LaunchRecord {
            app_id: app_id.to_string(),
            mode,
            at: Instant::now(),
        });
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Lockdown
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockdownCall {
    Tasks(Vec<String>),
    StatusBar(bool),
    Keyguard(bool),
}

pub struct FakeLockdown {
    capable: AtomicBool,
    calls: Mutex<Vec<LockdownCall>>,
    allowlist: Mutex<Vec<String>>,
    fail_tasks: AtomicBool,
    fail_status_bar: AtomicBool,
}

impl FakeLockdown {
    pub fn capable() -> Self {
        Self {
            capable: AtomicBool::new(true),
            calls: Mutex::new(Vec::new()),
            allowlist: Mutex::new(Vec::new()),
            fail_tasks: AtomicBool::new(false),
            fail_status_bar: AtomicBool::new(false),
        }
    }

    pub fn incapable() -> Self {
        let fake = Self::capable();
        fake.capable.store(false, Ordering::SeqCst);
        fake
    }

    pub fn fail_tasks(&self, fail: bool) {
        self.fail_tasks.store(fail, Ordering::SeqCst);
    }

    pub fn fail_status_bar(&self, fail: bool) {
        self.fail_status_bar.store(fail, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<LockdownCall> {
        self.calls.lock().clone()
    }

    /// Task switching is currently restricted
    pub fn is_locked(&self) -> bool {
        !self.allowlist.lock().is_empty()
    }

    pub fn locked_to(&self) -> Vec<String> {
        self.allowlist.lock().clone()
    }
}

#[async_trait]
impl LockdownPlatform for FakeLockdown {
    fn is_lockdown_capable(&self) -> bool {
        self.capable.load(Ordering::SeqCst)
    }

    async fn set_task_allowlist(&self, apps: &[String]) -> Result<()> {
        self.calls.lock().push(LockdownCall::Tasks(apps.to_vec()));
        if self.fail_tasks.load(Ordering::SeqCst) {
            return Err(KioskError::PolicyRejected {
                step: "tasks".to_string(),
                reason: "not device owner".to_string(),
            });
        }
        *self.allowlist.lock() = apps.to_vec();
        Ok(())
    }

    async fn set_status_bar_disabled(&self, disabled: bool) -> Result<()> {
        self.calls.lock().push(LockdownCall::StatusBar(disabled));
        if self.fail_status_bar.load(Ordering::SeqCst) {
            return Err(KioskError::PolicyRejected {
                step: "status_bar".to_string(),
                reason: "unsupported".to_string(),
            });
        }
        Ok(())
    }

    async fn set_keyguard_disabled(&self, disabled: bool) -> Result<()> {
        self.calls.lock().push(LockdownCall::Keyguard(disabled));
        Ok(())
    }
}
