//! Platform primitives: launching apps and toggling device lockdown
//!
//! No decision logic lives here. Callers route every call through the
//! [`UiExecutor`] so OS-interactive work happens on one designated thread.

pub mod hooks;
pub mod process;
pub mod ui;

pub use hooks::HookLockdown;
pub use process::ProcessLauncher;
pub use ui::UiExecutor;

use crate::error::Result;
use async_trait::async_trait;

/// How a launch treats an instance that is already running
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchMode {
    /// Bring the running instance to the foreground, start it only if absent
    Reuse,
    /// Stop any running instance and start a new one
    Fresh,
}

#[async_trait]
pub trait AppLauncher: Send + Sync {
    /// Whether the app exists and has a launchable entry point
    async fn is_installed(&self, app_id: &str) -> bool;

    async fn launch(&self, app_id: &str, mode: LaunchMode) -> Result<()>;
}

/// Lockdown sub-steps. Each one may fail independently.
#[async_trait]
pub trait LockdownPlatform: Send + Sync {
    fn is_lockdown_capable(&self) -> bool;

    /// Restrict task switching to `apps`; an empty slice lifts the restriction
    async fn set_task_allowlist(&self, apps: &[String]) -> Result<()>;

    async fn set_status_bar_disabled(&self, disabled: bool) -> Result<()>;

    async fn set_keyguard_disabled(&self, disabled: bool) -> Result<()>;
}
