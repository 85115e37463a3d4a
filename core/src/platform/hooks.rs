//! Lockdown through configured host commands
//!
//! Each sub-step maps to one command line. `{apps}` is replaced by the
//! allowed app ids, one argument each. A sub-step without a command is
//! treated as unsupported on this host and succeeds without doing anything.

use super::LockdownPlatform;
use crate::config::LockdownHooks;
use crate::error::{KioskError, Result};
use async_trait::async_trait;
use std::process::Stdio;
use tracing::debug;

pub struct HookLockdown {
    hooks: LockdownHooks,
}

impl HookLockdown {
    pub fn new(hooks: LockdownHooks) -> Self {
        Self { hooks }
    }

    async fn run_step(&self, step: &str, hook: Option<&String>, apps: &[String]) -> Result<()> {
        let Some(line) = hook else {
            debug!(step, "No hook configured, skipping");
            return Ok(());
        };
        run_command_line(line, apps)
            .await
            .map_err(|reason| KioskError::PolicyRejected {
                step: step.to_string(),
                reason,
            })
    }
}

#[async_trait]
impl LockdownPlatform for HookLockdown {
    fn is_lockdown_capable(&self) -> bool {
        self.hooks.is_capable()
    }

    async fn set_task_allowlist(&self, apps: &[String]) -> Result<()> {
        if apps.is_empty() {
            self.run_step("release_tasks", self.hooks.release_tasks.as_ref(), apps)
                .await
        } else {
            self.run_step("restrict_tasks", self.hooks.restrict_tasks.as_ref(), apps)
                .await
        }
    }

    async fn set_status_bar_disabled(&self, disabled: bool) -> Result<()> {
        if disabled {
            self.run_step("disable_status_bar", self.hooks.disable_status_bar.as_ref(), &[])
                .await
        } else {
            self.run_step("enable_status_bar", self.hooks.enable_status_bar.as_ref(), &[])
                .await
        }
    }

    async fn set_keyguard_disabled(&self, disabled: bool) -> Result<()> {
        if disabled {
            self.run_step("disable_keyguard", self.hooks.disable_keyguard.as_ref(), &[])
                .await
        } else {
            self.run_step("enable_keyguard", self.hooks.enable_keyguard.as_ref(), &[])
                .await
        }
    }
}

/// Split `line` shell-style, expand `{apps}`, run it and wait for exit status
pub(crate) async fn run_command_line(
    line: &str,
    apps: &[String],
) -> std::result::Result<(), String> {
    let argv = expand(line, apps)?;
    let (program, args) = argv
        .split_first()
        .ok_or_else(|| "empty command".to_string())?;

    let output = tokio::process::Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|e| format!("{}: {}", program, e))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(format!("{} exited with {}: {}", program, output.status, stderr.trim()));
    }
    Ok(())
}

fn expand(line: &str, apps: &[String]) -> std::result::Result<Vec<String>, String> {
    let words = shell_words::split(line).map_err(|e| format!("unparsable command: {}", e))?;
    let mut argv = Vec::with_capacity(words.len() + apps.len());
    for word in words {
        if word == "{apps}" {
            argv.extend(apps.iter().cloned());
        } else {
            argv.push(word);
        }
    }
    Ok(argv)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expands_apps_placeholder() {
        let apps = vec!["gelafit-go".to_string(), "kioskd".to_string()];
        assert_eq!(
            expand("kioskctl allow {apps} --quiet", &apps).unwrap(),
            vec!["kioskctl", "allow", "gelafit-go", "kioskd", "--quiet"]
        );
        assert_eq!(
            expand("kioskctl 'allow none'", &[]).unwrap(),
            vec!["kioskctl", "allow none"]
        );
        assert!(expand("kioskctl 'unterminated", &[]).is_err());
    }

    #[test]
    fn capability_requires_task_hooks() {
        let mut hooks = LockdownHooks::default();
        hooks.disable_status_bar = Some("true".to_string());
        assert!(!HookLockdown::new(hooks.clone()).is_lockdown_capable());

        hooks.restrict_tasks = Some("true".to_string());
        hooks.release_tasks = Some("true".to_string());
        assert!(HookLockdown::new(hooks).is_lockdown_capable());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failing_hook_is_rejected_and_missing_hook_is_skipped() {
        let hooks = LockdownHooks {
            restrict_tasks: Some("false".to_string()),
            release_tasks: Some("true".to_string()),
            ..LockdownHooks::default()
        };
        let lockdown = HookLockdown::new(hooks);

        let err = lockdown
            .set_task_allowlist(&["gelafit-go".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, KioskError::PolicyRejected { ref step, .. } if step == "restrict_tasks"));

        assert!(lockdown.set_task_allowlist(&[]).await.is_ok());
        assert!(lockdown.set_keyguard_disabled(true).await.is_ok());
    }
}
