//! Persistent Store
//!
//! SQLite tables for captured samples (`sensing`) and training-pass
//! metadata (`deep_learning`).

use crate::domain::errors::{GloveError, GloveResult};
use crate::domain::models::{ModelArtifactRecord, SensorReading, SensorSample};
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::{Path, PathBuf};
use tracing::{error, info};

mod migrations;

use migrations::run_migrations;

fn parse_datetime(idx: usize, value: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|err| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err)))
}

fn to_u64(value: i64) -> GloveResult<u64> {
    u64::try_from(value)
        .map_err(|_| GloveError::DatabaseUnavailable(format!("negative count {value}")))
}

fn sample_from_row(row: &Row<'_>) -> rusqlite::Result<SensorSample> {
    let mut channels = [0i16; SensorReading::CHANNELS];
    for (i, channel) in channels.iter_mut().enumerate() {
        *channel = row.get(2 + i)?;
    }
    Ok(SensorSample {
        device_address: row.get(0)?,
        label: row.get(1)?,
        reading: SensorReading::from_channels(channels),
        captured_at: parse_datetime(10, &row.get::<_, String>(10)?)?,
    })
}

fn artifact_from_row(row: &Row<'_>) -> rusqlite::Result<ModelArtifactRecord> {
    Ok(ModelArtifactRecord {
        id: Some(row.get(0)?),
        device_address: row.get(1)?,
        name: row.get(2)?,
        artifact_path: PathBuf::from(row.get::<_, String>(3)?),
        analysis_summary: row.get(4)?,
        quality_score: row.get::<_, f64>(5)? as f32,
        created_at: parse_datetime(6, &row.get::<_, String>(6)?)?,
    })
}

const INSERT_ARTIFACT_SQL: &str = "INSERT INTO deep_learning
     (device_mac, model_name, artifact_path, analysis_result, prediction_rate, created_at)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6)";

fn insert_artifact(conn: &Connection, record: &ModelArtifactRecord) -> rusqlite::Result<i64> {
    conn.execute(
        INSERT_ARTIFACT_SQL,
        params![
            record.device_address,
            record.name,
            record.artifact_path.to_string_lossy().into_owned(),
            record.analysis_summary,
            f64::from(record.quality_score),
            record.created_at.to_rfc3339(),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open (creating if needed) the database file and bring its schema up
    /// to date. Any failure is [`GloveError::DatabaseUnavailable`].
    pub fn open(db_path: &Path) -> GloveResult<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|err| {
                GloveError::DatabaseUnavailable(format!(
                    "failed to create database directory {}: {err}",
                    parent.display()
                ))
            })?;
        }

        let conn = Connection::open(db_path).map_err(|err| {
            GloveError::DatabaseUnavailable(format!("failed to open SQLite database: {err}"))
        })?;

        if let Err(err) = conn.pragma_update(None, "journal_mode", "WAL") {
            error!("Failed to enable WAL mode: {err}");
        }

        let db = Self::init(conn)?;
        info!("Database initialized at {}", db_path.display());
        Ok(db)
    }

    pub fn open_in_memory() -> GloveResult<Self> {
        let conn = Connection::open_in_memory().map_err(|err| {
            GloveError::DatabaseUnavailable(format!("failed to open in-memory database: {err}"))
        })?;
        Self::init(conn)
    }

    fn init(mut conn: Connection) -> GloveResult<Self> {
        run_migrations(&mut conn)
            .map_err(|err| GloveError::DatabaseUnavailable(format!("{err:#}")))?;
        Ok(Self { conn })
    }

    pub fn insert_sample(&self, sample: &SensorSample) -> GloveResult<i64> {
        let c = sample.reading.channels();
        self.conn.execute(
            "INSERT INTO sensing (device_mac, gender_label, middle_flex, middle_pressure, ring_flex,
                 ring_pressure, pinky_flex, acceleration, gyroscope, magnetic_field, captured_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                sample.device_address,
                sample.label,
                c[0],
                c[1],
                c[2],
                c[3],
                c[4],
                c[5],
                c[6],
                c[7],
                sample.captured_at.to_rfc3339(),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn count_samples(&self, device_address: &str) -> GloveResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM sensing WHERE device_mac = ?1",
            params![device_address],
            |row| row.get(0),
        )?;
        to_u64(count)
    }

    /// Samples for one device in capture order.
    pub fn load_samples(&self, device_address: &str) -> GloveResult<Vec<SensorSample>> {
        let mut stmt = self.conn.prepare(
            "SELECT device_mac, gender_label, middle_flex, middle_pressure, ring_flex,
                    ring_pressure, pinky_flex, acceleration, gyroscope, magnetic_field, captured_at
             FROM sensing
             WHERE device_mac = ?1
             ORDER BY sample_idx ASC",
        )?;
        let samples = stmt
            .query_map(params![device_address], sample_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(samples)
    }

    /// Explicit user reset: drop every captured sample and compact the file.
    pub fn reset_all_samples(&self) -> GloveResult<()> {
        self.conn.execute("DELETE FROM sensing", [])?;
        self.conn.execute_batch("VACUUM")?;
        info!("Sensing data reset");
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn insert_artifact_record(&self, record: &ModelArtifactRecord) -> GloveResult<i64> {
        Ok(insert_artifact(&self.conn, record)?)
    }

    /// Store a finished training pass and drop the samples it consumed, as
    /// one transaction.
    pub fn record_training_pass(&mut self, record: &ModelArtifactRecord) -> GloveResult<i64> {
        let tx = self.conn.transaction()?;
        let id = insert_artifact(&tx, record)?;
        tx.execute(
            "DELETE FROM sensing WHERE device_mac = ?1",
            params![record.device_address],
        )?;
        tx.commit()?;
        Ok(id)
    }

    /// Most recent record for a device; the highest sequence number wins.
    pub fn latest_artifact(&self, device_address: &str) -> GloveResult<Option<ModelArtifactRecord>> {
        let record = self
            .conn
            .query_row(
                "SELECT model_idx, device_mac, model_name, artifact_path, analysis_result,
                        prediction_rate, created_at
                 FROM deep_learning
                 WHERE device_mac = ?1
                 ORDER BY model_idx DESC
                 LIMIT 1",
                params![device_address],
                artifact_from_row,
            )
            .optional()?;
        Ok(record)
    }

    pub fn has_artifact(&self, device_address: &str) -> GloveResult<bool> {
        Ok(self.latest_artifact(device_address)?.is_some())
    }

    #[cfg(test)]
    pub(crate) fn count_artifacts(&self) -> i64 {
        self.conn
            .query_row("SELECT COUNT(*) FROM deep_learning", [], |row| row.get(0))
            .unwrap()
    }
}
