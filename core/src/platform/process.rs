//! Apps as host processes
//!
//! Each app id maps to a [`LauncherEntry`]. The launcher keeps the child it
//! spawned so a `Reuse` launch of a live app only runs its focus command
//! instead of starting a second instance.

use super::hooks::run_command_line;
use super::{AppLauncher, LaunchMode};
use crate::config::LauncherEntry;
use crate::error::{KioskError, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::process::Stdio;
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

pub struct ProcessLauncher {
    entries: BTreeMap<String, LauncherEntry>,
    children: Mutex<HashMap<String, Child>>,
}

impl ProcessLauncher {
    pub fn new(entries: BTreeMap<String, LauncherEntry>) -> Self {
        Self {
            entries,
            children: Mutex::new(HashMap::new()),
        }
    }

    fn entry(&self, app_id: &str) -> Result<&LauncherEntry> {
        self.entries
            .get(app_id)
            .ok_or_else(|| KioskError::AppNotInstalled {
                app_id: app_id.to_string(),
            })
    }

    fn is_running(&self, app_id: &str) -> bool {
        let mut children = self.children.lock();
        let polled = match children.get_mut(app_id) {
            Some(child) => child.try_wait(),
            None => return false,
        };
        match polled {
            Ok(None) => true,
            Ok(Some(status)) => {
                debug!(app = app_id, %status, "Tracked instance has exited");
                children.remove(app_id);
                false
            }
            Err(e) => {
                warn!(app = app_id, error = %e, "Could not poll tracked instance");
                children.remove(app_id);
                false
            }
        }
    }

    async fn stop(&self, app_id: &str) {
        let child = self.children.lock().remove(app_id);
        if let Some(mut child) = child {
            if let Err(e) = child.kill().await {
                warn!(app = app_id, error = %e, "Failed to stop running instance");
            }
        }
    }

    fn spawn(&self, app_id: &str, entry: &LauncherEntry) -> Result<()> {
        let mut cmd = Command::new(&entry.program);
        cmd.args(&entry.args)
            .envs(&entry.env)
            .stdin(Stdio::null());
        if let Some(cwd) = &entry.cwd {
            cmd.current_dir(cwd);
        }

        let child = cmd.spawn().map_err(|e| KioskError::LaunchFailed {
            app_id: app_id.to_string(),
            reason: e.to_string(),
        })?;
        info!(app = app_id, pid = child.id(), "Launched");
        self.children.lock().insert(app_id.to_string(), child);
        Ok(())
    }
}

#[async_trait]
impl AppLauncher for ProcessLauncher {
    async fn is_installed(&self, app_id: &str) -> bool {
        let Ok(entry) = self.entry(app_id) else {
            return false;
        };
        let program = Path::new(&entry.program);
        if program.components().count() > 1 {
            program.is_file()
        } else {
            which::which(program).is_ok()
        }
    }

    async fn launch(&self, app_id: &str, mode: LaunchMode) -> Result<()> {
        let entry = self.entry(app_id)?.clone();

        if self.is_running(app_id) {
            match mode {
                LaunchMode::Reuse => {
                    if let Some(focus) = &entry.focus {
                        if let Err(reason) = run_command_line(focus, &[]).await {
                            warn!(app = app_id, %reason, "Focus command failed");
                        }
                    }
                    return Ok(());
                }
                LaunchMode::Fresh => self.stop(app_id).await,
            }
        }

        self.spawn(app_id, &entry)
    }
}
