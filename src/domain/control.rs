use crate::domain::errors::{GloveError, GloveResult};
use crate::domain::models::ModelArtifactRecord;
use crate::infrastructure::bluetooth::protocol;
use crate::infrastructure::bluetooth::session::{BleSession, GattLink};
use crate::infrastructure::inference::Interpreter;
use crate::infrastructure::storage::Database;
use std::path::Path;
use tracing::{debug, info};

/// Turns live sensor reads into control commands using the latest trained
/// artifact of one device.
pub struct ControlLoop<I: Interpreter> {
    interpreter: I,
    record: ModelArtifactRecord,
}

impl<I: Interpreter> ControlLoop<I> {
    pub fn new(interpreter: I, record: ModelArtifactRecord) -> Self {
        Self {
            interpreter,
            record,
        }
    }

    /// Load the most recent artifact of `device_address`.
    pub fn load_latest<F>(db: &Database, device_address: &str, loader: F) -> GloveResult<Self>
    where
        F: FnOnce(&Path) -> GloveResult<I>,
    {
        let record = db.latest_artifact(device_address)?.ok_or_else(|| {
            GloveError::ArtifactMissing(format!("no model trained for {device_address}"))
        })?;

        if !record.artifact_path.is_file() {
            return Err(GloveError::artifact_missing(&record.artifact_path));
        }

        let interpreter = loader(&record.artifact_path)?;
        info!(
            "Control loop using '{}' ({})",
            record.name,
            record.artifact_path.display()
        );
        Ok(Self::new(interpreter, record))
    }

    /// Put `session` into reading mode for this loop. The loop is handed
    /// back only once reads are running.
    pub fn attach<L: GattLink>(self, session: &mut BleSession<L>) -> GloveResult<Self> {
        session.start_reading()?;
        Ok(self)
    }

    pub fn record(&self) -> &ModelArtifactRecord {
        &self.record
    }

    /// Run one payload through the model and build the command text.
    pub fn on_sensor_read(&mut self, raw: &[u8]) -> GloveResult<String> {
        let input = protocol::widen_payload(raw);
        let output = self.interpreter.run(&input, 1, input.len())?;
        let [v0, v1] = output
            .first()
            .copied()
            .ok_or_else(|| GloveError::Inference("model returned no rows".to_string()))?;
        Ok(protocol::format_command(v0, v1))
    }

    /// Read, infer, write back. Returns the command that was sent, if any.
    pub async fn step<L: GattLink>(
        &mut self,
        session: &mut BleSession<L>,
    ) -> GloveResult<Option<String>> {
        let Some(raw) = session.read_once().await? else {
            return Ok(None);
        };
        let command = self.on_sensor_read(&raw)?;
        if session.send_command(&command).await? {
            debug!("Sent {}", command);
            Ok(Some(command))
        } else {
            Ok(None)
        }
    }
}
