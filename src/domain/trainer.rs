//! Training pass
//!
//! A "training pass" runs the captured samples through the pre-built base
//! artifact, scores the output and stores a copy of the artifact together
//! with a metadata record. No weights are updated.

use crate::domain::errors::{GloveError, GloveResult};
use crate::domain::models::{ModelArtifactRecord, SensorReading, SensorSample};
use crate::domain::settings::Settings;
use crate::infrastructure::inference::Interpreter;
use crate::infrastructure::storage::Database;
use chrono::Utc;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct TrainerConfig {
    pub model_name: String,
    pub analysis_summary: String,
    /// Pre-built artifact every pass starts from
    pub base_artifact: PathBuf,
    pub artifacts_dir: PathBuf,
    pub extension: String,
}

impl TrainerConfig {
    pub fn from_settings(settings: &Settings, data_dir: &Path) -> Self {
        Self {
            model_name: settings.model_name.clone(),
            analysis_summary: settings.analysis_summary.clone(),
            base_artifact: data_dir.join(format!(
                "{}.{}",
                settings.base_artifact_name, settings.artifact_extension
            )),
            artifacts_dir: Settings::artifacts_dir(data_dir),
            extension: settings.artifact_extension.clone(),
        }
    }
}

/// Samples as one row-major buffer, eight values per row.
pub fn flatten(samples: &[SensorSample]) -> Vec<f32> {
    samples
        .iter()
        .flat_map(|s| s.reading.as_features())
        .collect()
}

/// Mean over rows of the average of the two output columns.
///
/// Descriptive only; an empty output scores 0.
pub fn evaluate(output: &[[f32; 2]]) -> f32 {
    if output.is_empty() {
        return 0.0;
    }
    let total: f32 = output.iter().map(|[a, b]| (a + b) / 2.0).sum();
    total / output.len() as f32
}

pub struct ModelTrainer {
    config: TrainerConfig,
}

impl ModelTrainer {
    pub fn new(config: TrainerConfig) -> Self {
        Self { config }
    }

    pub fn train(
        &self,
        samples: &[SensorSample],
        interpreter: &mut impl Interpreter,
    ) -> GloveResult<Vec<[f32; 2]>> {
        if samples.is_empty() {
            return Err(GloveError::NoData);
        }
        let input = flatten(samples);
        interpreter.run(&input, samples.len(), SensorReading::CHANNELS)
    }

    /// Copy the base artifact under a fresh name and store its record,
    /// clearing the device's samples. Nothing is left behind on failure.
    pub fn persist(
        &self,
        db: &mut Database,
        device_address: &str,
        quality_score: f32,
    ) -> GloveResult<ModelArtifactRecord> {
        std::fs::create_dir_all(&self.config.artifacts_dir)?;
        let artifact_path = self
            .config
            .artifacts_dir
            .join(format!("{}.{}", Uuid::new_v4(), self.config.extension));
        std::fs::copy(&self.config.base_artifact, &artifact_path)?;

        let mut record = ModelArtifactRecord {
            id: None,
            device_address: device_address.to_string(),
            name: self.config.model_name.clone(),
            artifact_path,
            analysis_summary: self.config.analysis_summary.clone(),
            quality_score,
            created_at: Utc::now(),
        };

        match db.record_training_pass(&record) {
            Ok(id) => {
                record.id = Some(id);
                Ok(record)
            }
            Err(e) => {
                if let Err(rm) = std::fs::remove_file(&record.artifact_path) {
                    warn!(
                        "Failed to remove orphaned artifact {}: {}",
                        record.artifact_path.display(),
                        rm
                    );
                }
                Err(e)
            }
        }
    }

    /// Full pass for one device. Fails with `NoData` before touching the
    /// store when nothing was captured.
    pub fn run_pass<I, F>(
        &self,
        db: &mut Database,
        device_address: &str,
        loader: F,
    ) -> GloveResult<ModelArtifactRecord>
    where
        I: Interpreter,
        F: FnOnce(&Path) -> GloveResult<I>,
    {
        let samples = db.load_samples(device_address)?;
        if samples.is_empty() {
            warn!("No samples captured for {}, nothing to train", device_address);
            return Err(GloveError::NoData);
        }

        info!(
            "Training pass for {} over {} samples",
            device_address,
            samples.len()
        );

        let result = loader(&self.config.base_artifact)
            .and_then(|mut interpreter| self.train(&samples, &mut interpreter))
            .and_then(|output| {
                let score = evaluate(&output);
                self.persist(db, device_address, score)
            });

        match &result {
            Ok(record) => info!(
                "Training pass stored as {} (score {:.4})",
                record.artifact_path.display(),
                record.quality_score
            ),
            Err(e) => error!("Training pass for {} failed: {}", device_address, e),
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GLOVE: &str = "AA:BB:CC:DD:EE:FF";

    /// Echoes the first two columns of every row back.
    struct EchoInterpreter {
        calls: usize,
    }

    impl Interpreter for EchoInterpreter {
        fn run(&mut self, input: &[f32], rows: usize, cols: usize) -> GloveResult<Vec<[f32; 2]>> {
            self.calls += 1;
            assert_eq!(input.len(), rows * cols);
            Ok(input.chunks_exact(cols).map(|r| [r[0], r[1]]).collect())
        }
    }

    fn sample(a: i16, b: i16) -> SensorSample {
        SensorSample {
            reading: SensorReading::from_channels([a, b, 0, 0, 0, 0, 0, 0]),
            captured_at: Utc::now(),
            device_address: GLOVE.to_string(),
            label: None,
        }
    }

    fn trainer(dir: &Path) -> ModelTrainer {
        let base = dir.join("sensor_pair_model.onnx");
        std::fs::write(&base, b"model-bytes").unwrap();
        ModelTrainer::new(TrainerConfig {
            model_name: "Sensor Pair Model".to_string(),
            analysis_summary: "Analysis Result".to_string(),
            base_artifact: base,
            artifacts_dir: dir.join("artifacts"),
            extension: "onnx".to_string(),
        })
    }

    #[test]
    fn test_evaluate_single_row() {
        assert!((evaluate(&[[0.2, 0.6]]) - 0.4).abs() < 1e-6);
    }

    #[test]
    fn test_evaluate_mean_of_row_averages() {
        let score = evaluate(&[[1.0, 3.0], [0.0, 0.0], [2.0, 4.0]]);
        assert!((score - 2.0).abs() < f32::EPSILON);
        let reordered = evaluate(&[[2.0, 4.0], [1.0, 3.0], [0.0, 0.0]]);
        assert!((score - reordered).abs() < f32::EPSILON);
        assert_eq!(evaluate(&[]), 0.0);
    }

    #[test]
    fn test_flatten_keeps_row_order() {
        let flat = flatten(&[sample(1, 2), sample(3, 4)]);
        assert_eq!(flat.len(), 16);
        assert_eq!(&flat[..2], &[1.0, 2.0]);
        assert_eq!(&flat[8..10], &[3.0, 4.0]);
    }

    #[test]
    fn test_train_without_samples_is_no_data() {
        let dir = tempfile::tempdir().unwrap();
        let mut interpreter = EchoInterpreter { calls: 0 };
        assert!(matches!(
            trainer(dir.path()).train(&[], &mut interpreter),
            Err(GloveError::NoData)
        ));
        assert_eq!(interpreter.calls, 0);
    }

    #[test]
    fn test_run_pass_without_samples_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mut db = Database::open_in_memory().unwrap();
        let result = trainer(dir.path()).run_pass(&mut db, GLOVE, |_| {
            Ok(EchoInterpreter { calls: 0 })
        });
        assert!(matches!(result, Err(GloveError::NoData)));
        assert_eq!(db.count_artifacts(), 0);
        assert!(!dir.path().join("artifacts").exists());
    }

    #[test]
    fn test_run_pass_stores_record_and_clears_samples() {
        let dir = tempfile::tempdir().unwrap();
        let mut db = Database::open_in_memory().unwrap();
        db.insert_sample(&sample(1, 3)).unwrap();
        db.insert_sample(&sample(2, 4)).unwrap();

        let base = dir.path().join("sensor_pair_model.onnx");
        let record = trainer(dir.path())
            .run_pass(&mut db, GLOVE, |path| {
                assert_eq!(path, base.as_path());
                Ok(EchoInterpreter { calls: 0 })
            })
            .unwrap();

        assert!(record.id.is_some());
        assert!((record.quality_score - 2.5).abs() < f32::EPSILON);
        assert_eq!(record.name, "Sensor Pair Model");
        assert_eq!(std::fs::read(&record.artifact_path).unwrap(), b"model-bytes");
        assert_eq!(db.count_samples(GLOVE).unwrap(), 0);
        assert_eq!(db.latest_artifact(GLOVE).unwrap(), Some(record));
    }

    #[test]
    fn test_failed_load_persists_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mut db = Database::open_in_memory().unwrap();
        db.insert_sample(&sample(1, 1)).unwrap();

        let result = trainer(dir.path()).run_pass::<EchoInterpreter, _>(&mut db, GLOVE, |path| {
            Err(GloveError::artifact_missing(path))
        });
        assert!(matches!(result, Err(GloveError::ArtifactMissing(_))));
        assert_eq!(db.count_artifacts(), 0);
        assert_eq!(db.count_samples(GLOVE).unwrap(), 1);
    }

    #[test]
    fn test_config_paths_follow_settings() {
        let config = TrainerConfig::from_settings(&Settings::default(), Path::new("/data"));
        assert_eq!(
            config.base_artifact,
            PathBuf::from("/data/sensor_pair_model.onnx")
        );
        assert_eq!(config.artifacts_dir, Settings::artifacts_dir(Path::new("/data")));
    }
}
