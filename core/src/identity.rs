//! Stable device identifier derived from host attributes

use sha2::{Digest, Sha256};

const MACHINE_ID_PATHS: &[&str] = &["/etc/machine-id", "/var/lib/dbus/machine-id"];

/// Host attributes that feed the device id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentitySource {
    pub os: String,
    pub arch: String,
    pub hostname: String,
    pub machine_id: String,
}

impl IdentitySource {
    pub fn collect() -> Self {
        let hostname = hostname::get()
            .map(|h| h.to_string_lossy().into_owned())
            .unwrap_or_default();
        let machine_id = MACHINE_ID_PATHS
            .iter()
            .find_map(|p| std::fs::read_to_string(p).ok())
            .map(|s| s.trim().to_string())
            .unwrap_or_default();

        Self {
            os: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
            hostname,
            machine_id,
        }
    }

    /// `dev-` followed by the first 24 hex chars of the SHA-256 of the joined attributes
    pub fn device_id(&self) -> String {
        let raw = format!(
            "{}|{}|{}|{}",
            self.os, self.arch, self.hostname, self.machine_id
        );
        let digest = hex::encode(Sha256::digest(raw.as_bytes()));
        format!("dev-{}", &digest[..24])
    }
}

/// Device id for the current host
pub fn stable_device_id() -> String {
    IdentitySource::collect().device_id()
}
