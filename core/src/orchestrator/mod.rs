//! Device orchestration
//!
//! The reconciliation loop converges the device to the remote desired state:
//! managed apps running, kiosk lockdown applied or cleared, queued commands
//! executed and acknowledged. The [`Supervisor`] is the entry point.

pub mod actuator;
pub mod commands;
pub mod control_loop;
pub mod policy;
pub mod reconcile;
pub mod status;
pub mod supervisor;

#[cfg(test)]
pub(crate) mod testing;


pub use actuator::{ActuationReport, AppActuator, SessionState};
pub use commands::{CommandKind, CommandProcessor, DrainReport};
pub use control_loop::{LoopTiming, ReconciliationLoop};
pub use policy::{PolicyEnforcer, PolicyState};
pub use reconcile::{decide, Decision, FetchOutcome, LastKnownState};
pub use status::{Phase, Status, StatusReporter};
pub use supervisor::{Bindings, StartOptions, Supervisor};
