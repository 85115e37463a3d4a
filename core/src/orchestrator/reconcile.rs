//! Desired-state decision
//!
//! `decide` is a pure function of the fetch result and the last state seen
//! remotely. All side effects stay in the loop.

use crate::remote::DeviceState;

/// Last desired state observed, plus the persisted lock it implies
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LastKnownState {
    pub active: bool,
    pub kiosk_mode: bool,
    pub local_lock: bool,
}

impl LastKnownState {
    /// Start of a loop: nothing seen remotely, lock as persisted
    pub fn with_local_lock(local_lock: bool) -> Self {
        Self {
            active: false,
            kiosk_mode: false,
            local_lock,
        }
    }

    /// Record a successful fetch. An inactive device remembers no kiosk mode.
    pub fn observe(&mut self, state: DeviceState) {
        if !state.is_active {
            *self = Self::default();
            return;
        }
        self.active = true;
        self.kiosk_mode = state.kiosk_mode;
        self.local_lock = lock_for(state);
    }
}

/// The lock persisted for a given desired state
pub fn lock_for(state: DeviceState) -> bool {
    state.is_active && state.kiosk_mode
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    Reachable(DeviceState),
    /// Transport failure, error status, or no record for this device
    Unreachable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub should_run: bool,
    pub kiosk_enabled: bool,
    pub reachable: bool,
}

pub fn decide(fetch: FetchOutcome, last: &LastKnownState) -> Decision {
    match fetch {
        FetchOutcome::Reachable(state) if state.is_active => Decision {
            should_run: true,
            kiosk_enabled: state.kiosk_mode,
            reachable: true,
        },
        FetchOutcome::Reachable(_) => Decision {
            should_run: false,
            kiosk_enabled: false,
            reachable: true,
        },
        FetchOutcome::Unreachable => Decision {
            should_run: last.active || last.local_lock,
            kiosk_enabled: last.kiosk_mode || last.local_lock,
            reachable: false,
        },
    }
}
