pub mod config;
pub mod error;
pub mod identity;
pub mod orchestrator;
pub mod platform;
pub mod remote;
pub mod state;
pub mod util;

// Re-exports for convenience
pub use config::Config;
pub use error::{KioskError, Result};
pub use orchestrator::{Bindings, Phase, StartOptions, Status, Supervisor};
pub use state::LocalStateCache;
