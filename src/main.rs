mod domain;
mod infrastructure;
mod presentation;

use anyhow::Context;
use domain::settings::SettingsService;
use eframe::egui;
use infrastructure::storage::Database;

fn main() -> anyhow::Result<()> {
    let settings = SettingsService::new()?;
    let data_dir = settings.get().resolve_data_dir()?;

    let logging_guard = infrastructure::logging::init_logger(&settings.get().log_settings, &data_dir)
        .map_err(|e| eprintln!("Failed to initialize logging: {}", e))
        .ok();

    tracing::info!("Starting Sensor Glove Application");

    // Without the store nothing can be recorded; refuse to start.
    let db_path = data_dir.join(&settings.get().database_file_name);
    let db = Database::open(&db_path).context("cannot start without the sample database")?;

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([760.0, 640.0])
            .with_title("Sensor Glove"),
        ..Default::default()
    };

    eframe::run_native(
        "Sensor Glove",
        options,
        Box::new(move |cc| {
            Ok(Box::new(presentation::app::SensorGloveApp::new(
                cc,
                settings,
                db,
                data_dir,
                logging_guard,
            )))
        }),
    )
    .map_err(|e| anyhow::anyhow!("UI terminated with error: {e}"))
}
