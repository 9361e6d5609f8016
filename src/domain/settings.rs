use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const APP_DIR_NAME: &str = "SensorGlove";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogSettings {
    #[serde(default = "default_level")]
    pub level: String, // "trace", "debug", "info", "warn", "error"
    #[serde(default = "default_true")]
    pub file_logging_enabled: bool,
    #[serde(default = "default_true")]
    pub console_logging_enabled: bool,
    #[serde(default = "default_log_dir")]
    pub log_dir: String,
    #[serde(default = "default_prefix")]
    pub file_name_prefix: String,
    #[serde(default = "default_true")]
    pub show_file_line: bool,
    #[serde(default = "default_false")]
    pub show_thread_ids: bool,
    #[serde(default = "default_true")]
    pub show_target: bool,
    #[serde(default = "default_true")]
    pub ansi_colors: bool,
    #[serde(default = "default_rotation")]
    pub rotation: String, // "daily", "hourly", "minutely", "never"
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: default_level(),
            file_logging_enabled: default_true(),
            console_logging_enabled: default_true(),
            log_dir: default_log_dir(),
            file_name_prefix: default_prefix(),
            show_file_line: default_true(),
            show_thread_ids: default_false(),
            show_target: default_true(),
            ansi_colors: default_true(),
            rotation: default_rotation(),
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}
fn default_true() -> bool {
    true
}
fn default_false() -> bool {
    false
}
fn default_log_dir() -> String {
    "logs".to_string()
}
fn default_prefix() -> String {
    "sensor_glove".to_string()
}
fn default_rotation() -> String {
    "daily".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub known_device_addresses: Vec<String>,
    #[serde(default)]
    pub last_connected_address: Option<String>,

    // Logging Settings
    #[serde(default)]
    pub log_settings: LogSettings,

    // BLE Settings
    #[serde(default = "default_service_uuid")]
    pub ble_service_uuid: String,
    #[serde(default = "default_data_uuid")]
    pub ble_data_char_uuid: String,
    #[serde(default = "default_command_uuid")]
    pub ble_command_char_uuid: String,
    #[serde(default = "default_false")]
    pub debug_show_all_devices: bool,
    #[serde(default = "default_scan_poll_interval_ms")]
    pub scan_poll_interval_ms: u64,

    // Capture Settings
    #[serde(default = "default_read_interval_ms")]
    pub read_interval_ms: u64,
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,
    #[serde(default = "default_training_threshold")]
    pub training_threshold: u64,
    #[serde(default = "default_labels")]
    pub labels: Vec<String>,

    // Model Settings
    #[serde(default = "default_model_name")]
    pub model_name: String,
    #[serde(default = "default_analysis_summary")]
    pub analysis_summary: String,
    #[serde(default = "default_base_artifact_name")]
    pub base_artifact_name: String,
    #[serde(default = "default_artifact_extension")]
    pub artifact_extension: String,

    // Storage Settings
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
    #[serde(default = "default_database_file_name")]
    pub database_file_name: String,

    // Debug Settings
    #[serde(default = "default_false")]
    pub debug_raw_data_logging: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            known_device_addresses: Vec::new(),
            last_connected_address: None,
            log_settings: LogSettings::default(),

            ble_service_uuid: default_service_uuid(),
            ble_data_char_uuid: default_data_uuid(),
            ble_command_char_uuid: default_command_uuid(),
            debug_show_all_devices: false,
            scan_poll_interval_ms: default_scan_poll_interval_ms(),

            read_interval_ms: default_read_interval_ms(),
            read_timeout_ms: default_read_timeout_ms(),
            training_threshold: default_training_threshold(),
            labels: default_labels(),

            model_name: default_model_name(),
            analysis_summary: default_analysis_summary(),
            base_artifact_name: default_base_artifact_name(),
            artifact_extension: default_artifact_extension(),

            data_dir: None,
            database_file_name: default_database_file_name(),

            debug_raw_data_logging: false,
        }
    }
}

impl Settings {
    /// Directory holding the database and the `artifacts/` folder.
    pub fn resolve_data_dir(&self) -> anyhow::Result<PathBuf> {
        if let Some(dir) = &self.data_dir {
            return Ok(dir.clone());
        }
        let mut path = dirs::data_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine data directory"))?;
        path.push(APP_DIR_NAME);
        Ok(path)
    }

    pub fn artifacts_dir(data_dir: &Path) -> PathBuf {
        data_dir.join("artifacts")
    }
}

// The glove firmware exposes a single characteristic for both directions.
fn default_service_uuid() -> String {
    "4fafc201-1fb5-459e-8fcc-c5c9c331914b".to_string()
}
fn default_data_uuid() -> String {
    "beb5483e-36e1-4688-b7f5-ea07361b26a8".to_string()
}
fn default_command_uuid() -> String {
    "beb5483e-36e1-4688-b7f5-ea07361b26a8".to_string()
}
fn default_scan_poll_interval_ms() -> u64 {
    500
}
fn default_read_interval_ms() -> u64 {
    50
}
fn default_read_timeout_ms() -> u64 {
    1000
}
fn default_training_threshold() -> u64 {
    6000
}
fn default_labels() -> Vec<String> {
    vec!["Male".to_string(), "Female".to_string()]
}
fn default_model_name() -> String {
    "Sensor Pair Model".to_string()
}
fn default_analysis_summary() -> String {
    "Analysis Result".to_string()
}
fn default_base_artifact_name() -> String {
    "sensor_pair_model".to_string()
}
fn default_artifact_extension() -> String {
    "onnx".to_string()
}
fn default_database_file_name() -> String {
    "database.db".to_string()
}

pub struct SettingsService {
    settings: Settings,
    settings_path: PathBuf,
}

impl SettingsService {
    pub fn new() -> anyhow::Result<Self> {
        Ok(Self::load_from(Self::get_settings_path()?))
    }

    /// Settings backed by `settings_path`; a missing or corrupt file yields
    /// defaults.
    pub fn load_from(settings_path: PathBuf) -> Self {
        let settings = Self::load_from_file(&settings_path).unwrap_or_default();
        Self {
            settings,
            settings_path,
        }
    }

    fn get_settings_path() -> anyhow::Result<PathBuf> {
        let mut path = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
        path.push(APP_DIR_NAME);
        fs::create_dir_all(&path)?;
        path.push("settings.json");
        Ok(path)
    }

    fn load_from_file(path: &Path) -> anyhow::Result<Settings> {
        let contents = fs::read_to_string(path)?;
        let settings = serde_json::from_str(&contents)?;
        Ok(settings)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(&self.settings)?;
        fs::write(&self.settings_path, json)?;
        Ok(())
    }

    pub fn get(&self) -> &Settings {
        &self.settings
    }

    pub fn remember_device(&mut self, address: &str) -> anyhow::Result<()> {
        if !self
            .settings
            .known_device_addresses
            .iter()
            .any(|a| a == address)
        {
            self.settings
                .known_device_addresses
                .push(address.to_string());
        }
        self.settings.last_connected_address = Some(address.to_string());
        self.save()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_uses_defaults() {
        let settings: Settings = serde_json::from_str("{}").unwrap();
        assert_eq!(settings.read_interval_ms, 50);
        assert_eq!(settings.training_threshold, 6000);
        assert_eq!(settings.artifact_extension, "onnx");
        assert_eq!(settings.ble_data_char_uuid, settings.ble_command_char_uuid);
        assert_eq!(settings.log_settings.level, "info");
    }

    #[test]
    fn test_partial_file_keeps_overrides() {
        let settings: Settings =
            serde_json::from_str(r#"{"training_threshold": 10, "labels": ["A"]}"#).unwrap();
        assert_eq!(settings.training_threshold, 10);
        assert_eq!(settings.labels, vec!["A".to_string()]);
        assert_eq!(settings.read_timeout_ms, 1000);
    }

    #[test]
    fn test_remember_device_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let mut service = SettingsService::load_from(path.clone());
        assert!(service.get().known_device_addresses.is_empty());

        service.remember_device("AA:BB:CC:DD:EE:FF").unwrap();
        service.remember_device("AA:BB:CC:DD:EE:FF").unwrap();

        let reloaded = SettingsService::load_from(path);
        assert_eq!(reloaded.get().known_device_addresses.len(), 1);
        assert_eq!(
            reloaded.get().last_connected_address.as_deref(),
            Some("AA:BB:CC:DD:EE:FF")
        );
    }

    #[test]
    fn test_data_dir_override() {
        let settings = Settings {
            data_dir: Some(PathBuf::from("/tmp/glove")),
            ..Default::default()
        };
        let dir = settings.resolve_data_dir().unwrap();
        assert_eq!(dir, PathBuf::from("/tmp/glove"));
        assert_eq!(
            Settings::artifacts_dir(&dir),
            PathBuf::from("/tmp/glove/artifacts")
        );
    }
}
