//! Idempotent lockdown apply/clear over the platform primitive

use crate::platform::{LockdownPlatform, UiExecutor};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// What the enforcer last did to the device
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyState {
    /// Nothing issued yet in this process; the device may still be locked
    Unknown,
    Applied(String),
    Cleared,
}

pub struct PolicyEnforcer {
    platform: Arc<dyn LockdownPlatform>,
    ui: UiExecutor,
    own_app: String,
    state: Mutex<PolicyState>,
}

impl PolicyEnforcer {
    pub fn new(platform: Arc<dyn LockdownPlatform>, ui: UiExecutor, own_app: impl Into<String>) -> Self {
        Self {
            platform,
            ui,
            own_app: own_app.into(),
            state: Mutex::new(PolicyState::Unknown),
        }
    }

    pub fn state(&self) -> PolicyState {
        self.state.lock().clone()
    }

    /// Lock the device to `app_id` (plus our own app). Returns whether lockdown is in place.
    pub async fn apply(&self, app_id: &str) -> bool {
        if !self.platform.is_lockdown_capable() {
            debug!(app = app_id, "Lockdown not available, skipping apply");
            return false;
        }
        if *self.state.lock() == PolicyState::Applied(app_id.to_string()) {
            return true;
        }

        let platform = self.platform.clone();
        let allowed = vec![app_id.to_string(), self.own_app.clone()];
        let outcome = self
            .ui
            .run(move || async move {
                // Sub-steps are independent: a rejected one never skips the rest
                let tasks = platform.set_task_allowlist(&allowed).await;
                if let Err(e) = &tasks {
                    warn!(error = %e, "Task restriction failed");
                }
                if let Err(e) = platform.set_status_bar_disabled(true).await {
                    warn!(error = %e, "Status bar disable failed");
                }
                if let Err(e) = platform.set_keyguard_disabled(true).await {
                    warn!(error = %e, "Keyguard disable failed");
                }
                tasks.is_ok()
            })
            .await;

        // A partial apply may have disabled the status bar or keyguard already
        let (next, applied) = match outcome {
            Ok(true) => {
                info!(app = app_id, "Lockdown applied");
                (PolicyState::Applied(app_id.to_string()), true)
            }
            Ok(false) => (PolicyState::Unknown, false),
            Err(e) => {
                warn!(error = %e, "Could not reach ui executor for lockdown");
                (PolicyState::Unknown, false)
            }
        };
        *self.state.lock() = next;
        applied
    }

    /// Lift every restriction. Safe to call when nothing was applied.
    pub async fn clear(&self) {
        if !self.platform.is_lockdown_capable() {
            return;
        }
        if *self.state.lock() == PolicyState::Cleared {
            return;
        }

        let platform = self.platform.clone();
        let outcome = self
            .ui
            .run(move || async move {
                if let Err(e) = platform.set_status_bar_disabled(false).await {
                    warn!(error = %e, "Status bar enable failed");
                }
                if let Err(e) = platform.set_keyguard_disabled(false).await {
                    warn!(error = %e, "Keyguard enable failed");
                }
                let tasks = platform.set_task_allowlist(&[]).await;
                if let Err(e) = &tasks {
                    warn!(error = %e, "Task restriction release failed");
                }
                tasks.is_ok()
            })
            .await;

        let next = match outcome {
            Ok(true) => {
                info!("Lockdown cleared");
                PolicyState::Cleared
            }
            Ok(false) => PolicyState::Unknown,
            Err(e) => {
                warn!(error = %e, "Could not reach ui executor for lockdown");
                PolicyState::Unknown
            }
        };
        *self.state.lock() = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::testing::{FakeLockdown, LockdownCall};

    fn enforcer(platform: Arc<FakeLockdown>) -> PolicyEnforcer {
        PolicyEnforcer::new(platform, UiExecutor::spawn("test-ui").unwrap(), "kioskd")
    }

    #[tokio::test]
    async fn apply_restricts_to_app_and_self() {
        let platform = Arc::new(FakeLockdown::capable());
        let policy = enforcer(platform.clone());

        assert!(policy.apply("gelafit-go").await);
        assert_eq!(
            platform.calls(),
            vec![
                LockdownCall::Tasks(vec!["gelafit-go".to_string(), "kioskd".to_string()]),
                LockdownCall::StatusBar(true),
                LockdownCall::Keyguard(true),
            ]
        );
        assert!(platform.is_locked());
        assert_eq!(policy.state(), PolicyState::Applied("gelafit-go".to_string()));
    }

    #[tokio::test]
    async fn second_apply_is_a_noop() {
        let platform = Arc::new(FakeLockdown::capable());
        let policy = enforcer(platform.clone());

        policy.apply("gelafit-go").await;
        let after_first = platform.calls().len();
        assert!(policy.apply("gelafit-go").await);
        assert_eq!(platform.calls().len(), after_first);

        // A different app is a real change
        policy.apply("other").await;
        assert!(platform.calls().len() > after_first);
    }

    #[tokio::test]
    async fn not_capable_means_no_calls() {
        let platform = Arc::new(FakeLockdown::incapable());
        let policy = enforcer(platform.clone());

        assert!(!policy.apply("gelafit-go").await);
        policy.clear().await;
        assert!(platform.calls().is_empty());
    }

    #[tokio::test]
    async fn failing_substep_does_not_skip_the_others() {
        let platform = Arc::new(FakeLockdown::capable());
        platform.fail_status_bar(true);
        let policy = enforcer(platform.clone());

        assert!(policy.apply("gelafit-go").await);
        let calls = platform.calls();
        assert!(calls.contains(&LockdownCall::Keyguard(true)));
        assert!(platform.is_locked());
    }

    #[tokio::test]
    async fn failed_task_restriction_is_retried() {
        let platform = Arc::new(FakeLockdown::capable());
        platform.fail_tasks(true);
        let policy = enforcer(platform.clone());

        assert!(!policy.apply("gelafit-go").await);
        assert_eq!(policy.state(), PolicyState::Unknown);

        platform.fail_tasks(false);
        assert!(policy.apply("gelafit-go").await);
        assert!(platform.is_locked());
    }

    #[tokio::test]
    async fn clear_after_partial_apply_releases_everything() {
        let platform = Arc::new(FakeLockdown::capable());
        let policy = enforcer(platform.clone());

        policy.clear().await;
        assert_eq!(policy.state(), PolicyState::Cleared);

        platform.fail_tasks(true);
        assert!(!policy.apply("gelafit-go").await);
        assert_eq!(policy.state(), PolicyState::Unknown);

        platform.fail_tasks(false);
        let before = platform.calls().len();
        policy.clear().await;
        assert_eq!(
            platform.calls()[before..].to_vec(),
            vec![
                LockdownCall::StatusBar(false),
                LockdownCall::Keyguard(false),
                LockdownCall::Tasks(vec![]),
            ]
        );
        assert_eq!(policy.state(), PolicyState::Cleared);
    }

    #[tokio::test]
    async fn clear_is_idempotent_and_safe_before_apply() {
        let platform = Arc::new(FakeLockdown::capable());
        let policy = enforcer(platform.clone());

        // Unknown state after a restart: the first clear is issued
        policy.clear().await;
        assert_eq!(platform.calls().len(), 3);
        assert_eq!(policy.state(), PolicyState::Cleared);

        policy.clear().await;
        assert_eq!(platform.calls().len(), 3);

        policy.apply("gelafit-go").await;
        policy.clear().await;
        assert!(!platform.is_locked());
        assert_eq!(platform.calls().last(), Some(&LockdownCall::Tasks(vec![])));
    }
}
