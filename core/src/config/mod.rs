//! Configuration management
//!
//! One TOML file per device. See [`store::Config`] for the layout.

pub mod store;

pub use store::{
    data_dir, AppsConfig, Config, DeviceConfig, LauncherEntry, LockdownHooks,
    OrchestratorConfig, RemoteConfig, ScheduleConfig,
};
