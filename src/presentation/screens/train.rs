use crate::domain::models::WorkerCommand;
use crate::presentation::app::SensorGloveApp;
use crate::presentation::components::Components;
use eframe::egui;

pub fn render(app: &mut SensorGloveApp, ui: &mut egui::Ui) {
    Components::heading(ui, "Training");
    ui.add_space(20.0);

    if app.state.training_in_progress {
        Components::card(ui, "Working", |ui| {
            ui.horizontal(|ui| {
                ui.spinner();
                ui.label("Running the collected samples through the model...");
            });
        });
        return;
    }

    match app.state.last_training.clone() {
        Some(record) => {
            Components::card(ui, "Result", |ui| {
                egui::Grid::new("training_result")
                    .spacing([30.0, 6.0])
                    .show(ui, |ui| {
                        ui.label("Model:");
                        ui.label(&record.name);
                        ui.end_row();
                        ui.label("Summary:");
                        ui.label(&record.analysis_summary);
                        ui.end_row();
                        ui.label("Score:");
                        ui.label(format!("{:.4}", record.quality_score));
                        ui.end_row();
                        ui.label("Stored:");
                        ui.label(record.created_at.format("%Y-%m-%d %H:%M:%S").to_string());
                        ui.end_row();
                    });
                ui.label(
                    egui::RichText::new("The score is descriptive, not an accuracy.").weak(),
                );
            });
            ui.add_space(10.0);
            if ui.button("Start control").clicked() {
                app.send(WorkerCommand::StartControl);
            }
        }
        None => {
            Components::card(ui, "Training stopped", |ui| {
                ui.label("No model was stored. See the status bar for details.");
            });
            ui.add_space(10.0);
            if ui.button("Back to recording").clicked() {
                app.send(WorkerCommand::Retrain);
            }
        }
    }
}
