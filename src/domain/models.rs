use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Connection state of the selected glove, as shown in the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    ServiceReady,
}

/// A glove found during scanning.
#[derive(Debug, Clone, PartialEq)]
pub struct PeripheralHandle {
    /// Hardware address, e.g. `AA:BB:CC:DD:EE:FF`
    pub address: String,
    pub name: String,
    pub signal_strength: Option<i16>,
}

impl PeripheralHandle {
    pub fn new(address: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            name: name.into(),
            signal_strength: None,
        }
    }

    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            "Unknown"
        } else {
            &self.name
        }
    }
}

/// One decoded characteristic read.
///
/// Channel order matches the wire layout: five finger channels followed by
/// the three motion channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SensorReading {
    pub middle_flex: i16,
    pub middle_pressure: i16,
    pub ring_flex: i16,
    pub ring_pressure: i16,
    pub pinky_flex: i16,
    pub acceleration: i16,
    pub gyroscope: i16,
    pub magnetic_field: i16,
}

impl SensorReading {
    pub const CHANNELS: usize = 8;

    pub fn from_channels(c: [i16; Self::CHANNELS]) -> Self {
        Self {
            middle_flex: c[0],
            middle_pressure: c[1],
            ring_flex: c[2],
            ring_pressure: c[3],
            pinky_flex: c[4],
            acceleration: c[5],
            gyroscope: c[6],
            magnetic_field: c[7],
        }
    }

    pub fn channels(&self) -> [i16; Self::CHANNELS] {
        [
            self.middle_flex,
            self.middle_pressure,
            self.ring_flex,
            self.ring_pressure,
            self.pinky_flex,
            self.acceleration,
            self.gyroscope,
            self.magnetic_field,
        ]
    }

    /// Channels widened to `f32`, the row layout fed to the trainer.
    pub fn as_features(&self) -> [f32; Self::CHANNELS] {
        self.channels().map(f32::from)
    }
}

/// A stored capture row.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorSample {
    pub reading: SensorReading,
    pub captured_at: DateTime<Utc>,
    pub device_address: String,
    pub label: Option<String>,
}

/// Metadata written after every completed training pass.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelArtifactRecord {
    /// Row sequence number; `None` until inserted
    pub id: Option<i64>,
    pub device_address: String,
    pub name: String,
    pub artifact_path: PathBuf,
    pub analysis_summary: String,
    /// Mean of the per-row output averages. Descriptive only.
    pub quality_score: f32,
    pub created_at: DateTime<Utc>,
}

/// Screens of the capture/control flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Screen {
    #[default]
    Start,
    Scan,
    Record,
    Train,
    Run,
}

/// Requests sent from the UI to the Bluetooth worker.
#[derive(Debug, Clone)]
pub enum WorkerCommand {
    CheckReady,
    StartScan,
    StopScan,
    Select(PeripheralHandle),
    StartCapture { label: Option<String> },
    StopCapture,
    ResetSamples,
    Train,
    StartControl,
    Retrain,
    Disconnect,
}

/// Notifications sent from the Bluetooth worker to the UI.
#[derive(Debug, Clone)]
pub enum AppEvent {
    DeviceFound(PeripheralHandle),
    ScanState(bool),
    ConnectionState(ConnectionState),
    SampleStored { count: u64 },
    CaptureState(bool),
    TrainingFinished(ModelArtifactRecord),
    CommandSent(String),
    Navigate(Screen),
    LogMessage(StatusMessage),
}

#[derive(Debug, Clone)]
pub struct StatusMessage {
    pub message: String,
    pub severity: MessageSeverity,
}

impl StatusMessage {
    pub fn new(message: impl Into<String>, severity: MessageSeverity) -> Self {
        Self {
            message: message.into(),
            severity,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageSeverity {
    Info,
    Success,
    Warning,
    Error,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channels_keep_wire_order() {
        let reading = SensorReading::from_channels([1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(reading.middle_flex, 1);
        assert_eq!(reading.pinky_flex, 5);
        assert_eq!(reading.magnetic_field, 8);
        assert_eq!(reading.channels(), [1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(reading.as_features()[7], 8.0);
    }

    #[test]
    fn test_display_name_falls_back() {
        let handle = PeripheralHandle::new("AA:BB:CC:DD:EE:FF", "");
        assert_eq!(handle.display_name(), "Unknown");
    }
}
