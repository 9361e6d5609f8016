//! Sensor Glove Protocol
//!
//! Wire definitions for the glove's GATT service: the 16-byte sensor
//! payload and the text control command written back to the device.

use crate::domain::models::SensorReading;
use thiserror::Error;
use uuid::Uuid;

/// Glove BLE Service UUID
pub const SERVICE_UUID: Uuid = uuid::uuid!("4fafc201-1fb5-459e-8fcc-c5c9c331914b");

/// Sensor characteristic UUID. The firmware accepts control commands on the
/// same characteristic.
pub const DATA_CHAR_UUID: Uuid = uuid::uuid!("beb5483e-36e1-4688-b7f5-ea07361b26a8");

/// Size of one sensor payload in bytes
pub const SENSOR_PAYLOAD_LEN: usize = 16;

/// Prefix of every control command
pub const COMMAND_PREFIX: &str = "SENSOR_CONTROL:";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Invalid payload size: expected {expected}, got {actual}")]
    InvalidPayloadSize { expected: usize, actual: usize },

    #[error("Invalid UUID '{0}'")]
    InvalidUuid(String),
}

/// Decode a 16-byte sensor payload
///
/// # Payload Structure (16 bytes, big-endian signed 16-bit)
///
/// ```text
/// [0-1]   : Middle finger flex
/// [2-3]   : Middle finger pressure
/// [4-5]   : Ring finger flex
/// [6-7]   : Ring finger pressure
/// [8-9]   : Pinky flex
/// [10-11] : Acceleration
/// [12-13] : Gyroscope
/// [14-15] : Magnetic field
/// ```
pub fn decode_reading(bytes: &[u8]) -> Result<SensorReading, ProtocolError> {
    if bytes.len() != SENSOR_PAYLOAD_LEN {
        return Err(ProtocolError::InvalidPayloadSize {
            expected: SENSOR_PAYLOAD_LEN,
            actual: bytes.len(),
        });
    }

    let mut channels = [0i16; SensorReading::CHANNELS];
    for (channel, pair) in channels.iter_mut().zip(bytes.chunks_exact(2)) {
        *channel = i16::from_be_bytes([pair[0], pair[1]]);
    }

    Ok(SensorReading::from_channels(channels))
}

/// Encode a reading back into its wire layout.
#[cfg(test)]
pub fn encode_reading(reading: &SensorReading) -> [u8; SENSOR_PAYLOAD_LEN] {
    let mut bytes = [0u8; SENSOR_PAYLOAD_LEN];
    for (pair, channel) in bytes.chunks_exact_mut(2).zip(reading.channels()) {
        pair.copy_from_slice(&channel.to_be_bytes());
    }
    bytes
}

/// Live inference input: every payload byte, sign-extended, as one `f32`.
///
/// This does not match the 8-channel rows used for training; the control
/// loop has always fed the model this way.
pub fn widen_payload(bytes: &[u8]) -> Vec<f32> {
    bytes.iter().map(|&b| f32::from(b as i8)).collect()
}

/// Build the control command for a 1x2 model output.
///
/// Values use Rust's shortest round-trip float formatting, so whole numbers
/// keep their decimal point (`1.0`).
pub fn format_command(v0: f32, v1: f32) -> String {
    format!("{}{:?},{:?}", COMMAND_PREFIX, v0, v1)
}

/// Parse a command produced by [`format_command`].
#[cfg(test)]
pub fn parse_command(text: &str) -> Option<(f32, f32)> {
    let body = text.strip_prefix(COMMAND_PREFIX)?;
    let (a, b) = body.split_once(',')?;
    Some((a.trim().parse().ok()?, b.trim().parse().ok()?))
}

/// Parse a UUID string from settings.
pub fn parse_uuid(uuid_str: &str) -> Result<Uuid, ProtocolError> {
    Uuid::parse_str(uuid_str.trim()).map_err(|_| ProtocolError::InvalidUuid(uuid_str.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_uuid() {
        let uuid = parse_uuid("4fafc201-1fb5-459e-8fcc-c5c9c331914b").unwrap();
        assert_eq!(uuid, SERVICE_UUID);
        assert!(parse_uuid("not-a-uuid").is_err());
    }

    #[test]
    fn test_decode_big_endian_channel_order() {
        let bytes = [
            0x00, 0x01, // middle flex
            0x01, 0x00, // middle pressure
            0xFF, 0xFF, // ring flex
            0x80, 0x00, // ring pressure
            0x7F, 0xFF, // pinky flex
            0x12, 0x34, // acceleration
            0xFE, 0xDC, // gyroscope
            0x00, 0x00, // magnetic field
        ];
        let reading = decode_reading(&bytes).unwrap();
        assert_eq!(reading.middle_flex, 1);
        assert_eq!(reading.middle_pressure, 256);
        assert_eq!(reading.ring_flex, -1);
        assert_eq!(reading.ring_pressure, i16::MIN);
        assert_eq!(reading.pinky_flex, i16::MAX);
        assert_eq!(reading.acceleration, 0x1234);
        assert_eq!(reading.gyroscope, -292);
        assert_eq!(reading.magnetic_field, 0);
    }

    #[test]
    fn test_encode_reproduces_payload() {
        let payloads: [[u8; 16]; 3] = [
            [0; 16],
            [0xFF; 16],
            [
                0x80, 0x00, 0x7F, 0xFF, 0x00, 0x01, 0xFF, 0xFE, 0x12, 0x34, 0x56, 0x78, 0x9A,
                0xBC, 0xDE, 0xF0,
            ],
        ];
        for payload in payloads {
            let reading = decode_reading(&payload).unwrap();
            assert_eq!(encode_reading(&reading), payload);
        }
    }

    #[test]
    fn test_decode_rejects_wrong_length() {
        assert_eq!(
            decode_reading(&[0u8; 15]),
            Err(ProtocolError::InvalidPayloadSize {
                expected: 16,
                actual: 15
            })
        );
        assert!(decode_reading(&[0u8; 20]).is_err());
    }

    #[test]
    fn test_widen_payload_sign_extends() {
        assert_eq!(widen_payload(&[0x00, 0x7F, 0x80, 0xFF]), vec![0.0, 127.0, -128.0, -1.0]);
    }

    #[test]
    fn test_command_format() {
        assert_eq!(format_command(0.25, 1.0), "SENSOR_CONTROL:0.25,1.0");
        assert_eq!(format_command(-0.5, 0.0), "SENSOR_CONTROL:-0.5,0.0");
        assert_eq!(parse_command("SENSOR_CONTROL:0.25,1.0"), Some((0.25, 1.0)));
        assert_eq!(parse_command("OTHER:1,2"), None);
    }
}
