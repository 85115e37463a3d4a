//! Structured error types for kioskd
//!
//! Every failure the orchestrator can see falls into one of five classes.
//! Only configuration errors are fatal, and only at startup; everything else
//! is absorbed at the cycle boundary and retried on the next poll.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Primary error type for kioskd operations
#[derive(Error, Debug)]
pub enum KioskError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Missing required config
    #[error("missing required configuration: {key}")]
    MissingConfig { key: String },

    /// Invalid configuration
    #[error("invalid configuration: {message}")]
    InvalidConfig { message: String },

    // =========================================================================
    // Communication Errors
    // =========================================================================
    /// Network/connection error
    #[error("connection failed: {message}")]
    ConnectionFailed { message: String },

    /// Request timeout
    #[error("request timed out after {duration:?}")]
    Timeout { duration: Duration },

    /// Backend answered with a non-2xx status
    #[error("remote returned {status}: {body}")]
    RemoteStatus { status: u16, body: String },

    /// Response body could not be decoded
    #[error("malformed payload: {message}")]
    MalformedPayload { message: String },

    /// No device record exists for this device id
    #[error("device record not found: {device_id}")]
    DeviceNotFound { device_id: String },

    // =========================================================================
    // Actuation Errors
    // =========================================================================
    /// App is not installed or has no launchable entry point
    #[error("app not installed: {app_id}")]
    AppNotInstalled { app_id: String },

    /// Launch primitive rejected the request
    #[error("failed to launch {app_id}: {reason}")]
    LaunchFailed { app_id: String, reason: String },

    /// A lockdown sub-step was rejected by the platform
    #[error("lockdown step {step} rejected: {reason}")]
    PolicyRejected { step: String, reason: String },

    /// The UI-affinity executor thread is gone
    #[error("ui executor is not running")]
    UiExecutorClosed,

    // =========================================================================
    // Acknowledgment Errors
    // =========================================================================
    /// Command acknowledgment write failed
    #[error("failed to acknowledge command {command_id}: {reason}")]
    AckFailed { command_id: String, reason: String },

    // =========================================================================
    // Internal Errors
    // =========================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(String),

    /// Internal system error
    #[error("internal error: {message}")]
    Internal { message: String },
}

/// Coarse classification used by the loop to decide how a failure is handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Fatal for loop startup
    Configuration,
    /// Timeout, non-2xx, malformed payload; handled by the fallback row
    Communication,
    /// App launch or policy call rejected; retried next cycle
    Actuation,
    /// Command stays pending and is redelivered
    Acknowledgment,
    Internal,
}

impl KioskError {
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::MissingConfig { .. } | Self::InvalidConfig { .. } => ErrorClass::Configuration,

            Self::ConnectionFailed { .. }
            | Self::Timeout { .. }
            | Self::RemoteStatus { .. }
            | Self::MalformedPayload { .. }
            | Self::DeviceNotFound { .. } => ErrorClass::Communication,

            Self::AppNotInstalled { .. }
            | Self::LaunchFailed { .. }
            | Self::PolicyRejected { .. }
            | Self::UiExecutorClosed => ErrorClass::Actuation,

            Self::AckFailed { .. } => ErrorClass::Acknowledgment,

            Self::Io(_) | Self::Json(_) | Self::Internal { .. } => ErrorClass::Internal,
        }
    }

    /// Check if error is recoverable by simply trying again next cycle
    pub fn is_transient(&self) -> bool {
        match self.class() {
            ErrorClass::Communication | ErrorClass::Actuation | ErrorClass::Acknowledgment => true,
            ErrorClass::Configuration => false,
            ErrorClass::Internal => matches!(
                self,
                Self::Io(io_err) if matches!(
                    io_err.kind(),
                    std::io::ErrorKind::Interrupted
                        | std::io::ErrorKind::WouldBlock
                        | std::io::ErrorKind::TimedOut
                )
            ),
        }
    }

    /// Get a short message suitable for the status line
    pub fn user_message(&self) -> String {
        match self.class() {
            ErrorClass::Configuration => {
                format!("Configuration incomplete: {}", self)
            }
            ErrorClass::Communication => "Communication failure, retrying...".to_string(),
            ErrorClass::Actuation => format!("Actuation failed: {}", self),
            ErrorClass::Acknowledgment => "Command pending, acknowledgment failed".to_string(),
            ErrorClass::Internal => self.to_string(),
        }
    }
}

impl From<reqwest::Error> for KioskError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            // reqwest does not report the configured duration back
            return Self::Timeout {
                duration: Duration::ZERO,
            };
        }
        if err.is_decode() {
            return Self::MalformedPayload {
                message: err.to_string(),
            };
        }
        if let Some(status) = err.status() {
            return Self::RemoteStatus {
                status: status.as_u16(),
                body: err.to_string(),
            };
        }
        Self::ConnectionFailed {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for KioskError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}

impl From<anyhow::Error> for KioskError {
    fn from(err: anyhow::Error) -> Self {
        if let Some(io_err) = err.downcast_ref::<std::io::Error>() {
            return Self::Io(std::io::Error::new(io_err.kind(), io_err.to_string()));
        }

        Self::Internal {
            message: format!("{:#}", err),
        }
    }
}

/// Result type alias using KioskError
pub type Result<T> = std::result::Result<T, KioskError>;

/// Extension trait for converting Option to Result with KioskError
pub trait OptionExt<T> {
    fn ok_or_missing(self, key: impl Into<String>) -> Result<T>;
    fn ok_or_invalid_path(self, path: impl Into<PathBuf>) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_missing(self, key: impl Into<String>) -> Result<T> {
        self.ok_or_else(|| KioskError::MissingConfig { key: key.into() })
    }

    fn ok_or_invalid_path(self, path: impl Into<PathBuf>) -> Result<T> {
        let path = path.into();
        self.ok_or_else(|| KioskError::InvalidConfig {
            message: format!("unusable path: {}", path.display()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classes() {
        assert_eq!(
            KioskError::MissingConfig {
                key: "device.device_id".to_string()
            }
            .class(),
            ErrorClass::Configuration
        );
        assert_eq!(
            KioskError::RemoteStatus {
                status: 503,
                body: String::new()
            }
            .class(),
            ErrorClass::Communication
        );
        assert_eq!(
            KioskError::AppNotInstalled {
                app_id: "a".to_string()
            }
            .class(),
            ErrorClass::Actuation
        );
        assert_eq!(
            KioskError::AckFailed {
                command_id: "1".to_string(),
                reason: "500".to_string()
            }
            .class(),
            ErrorClass::Acknowledgment
        );
    }

    #[test]
    fn test_transient_errors() {
        assert!(KioskError::Timeout {
            duration: Duration::from_secs(5)
        }
        .is_transient());

        assert!(KioskError::DeviceNotFound {
            device_id: "dev-1".to_string()
        }
        .is_transient());

        assert!(!KioskError::InvalidConfig {
            message: "bad url".to_string()
        }
        .is_transient());
    }

    #[test]
    fn test_user_messages() {
        let err = KioskError::ConnectionFailed {
            message: "dns".to_string(),
        };
        assert!(err.user_message().contains("Communication failure"));

        let err = KioskError::MissingConfig {
            key: "remote.api_key".to_string(),
        };
        assert!(err.user_message().contains("remote.api_key"));
    }

    #[test]
    fn test_option_ext() {
        let opt: Option<i32> = None;
        let result = opt.ok_or_missing("device.site_id");
        assert!(matches!(result, Err(KioskError::MissingConfig { .. })));

        let opt: Option<i32> = None;
        let result = opt.ok_or_invalid_path("/nonexistent");
        assert!(matches!(result, Err(KioskError::InvalidConfig { .. })));
    }
}
