use crate::domain::permissions::Permission;
use crate::infrastructure::bluetooth::protocol::ProtocolError;
use std::path::Path;
use thiserror::Error;

/// Scan failure codes, numbered like the platform scanner reports them.
pub mod scan_failure {
    pub const INTERNAL_ERROR: i32 = 3;
    pub const FEATURE_UNSUPPORTED: i32 = 4;
}

#[derive(Error, Debug)]
pub enum GloveError {
    #[error("Permission not granted: {0:?}")]
    PermissionDenied(Permission),

    #[error("Scan failed with error: {0}")]
    ScanFailed(i32),

    #[error("Connection to the glove was lost")]
    ConnectionLost,

    #[error("Sensor service or characteristic not found on device")]
    ServiceNotFound,

    #[error("No samples available for training")]
    NoData,

    #[error("Model artifact missing: {0}")]
    ArtifactMissing(String),

    #[error("Database unavailable: {0}")]
    DatabaseUnavailable(String),

    #[error("Characteristic read timed out after {0} ms")]
    ReadTimeout(u64),

    #[error("Invalid session transition from {from} on {event}")]
    InvalidTransition {
        from: &'static str,
        event: &'static str,
    },

    #[error("Bluetooth error: {0}")]
    Ble(#[from] btleplug::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("Inference error: {0}")]
    Inference(String),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ort::Error> for GloveError {
    fn from(err: ort::Error) -> Self {
        GloveError::Inference(err.to_string())
    }
}

impl GloveError {
    pub fn artifact_missing(path: &Path) -> Self {
        GloveError::ArtifactMissing(path.display().to_string())
    }

    /// Failures that the UI recovers from by returning to the start screen.
    pub fn returns_to_start(&self) -> bool {
        matches!(
            self,
            GloveError::PermissionDenied(_) | GloveError::ConnectionLost
        )
    }
}

pub type GloveResult<T> = Result<T, GloveError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recovery_by_navigation() {
        assert!(GloveError::ConnectionLost.returns_to_start());
        assert!(GloveError::PermissionDenied(Permission::BluetoothScan).returns_to_start());
        assert!(!GloveError::NoData.returns_to_start());
        assert!(!GloveError::ServiceNotFound.returns_to_start());
    }

    #[test]
    fn test_scan_failed_message_carries_code() {
        let err = GloveError::ScanFailed(scan_failure::INTERNAL_ERROR);
        assert_eq!(err.to_string(), "Scan failed with error: 3");
    }
}
