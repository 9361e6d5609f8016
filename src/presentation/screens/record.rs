use crate::domain::models::WorkerCommand;
use crate::presentation::app::SensorGloveApp;
use crate::presentation::components::Components;
use crate::presentation::theme::GlovePalette;
use eframe::egui;

pub fn render(app: &mut SensorGloveApp, ui: &mut egui::Ui) {
    Components::heading(ui, "Record Samples");
    if let Some(device) = &app.state.selected_device {
        Components::sub_heading(ui, &format!("{} ({})", device.display_name(), device.address));
    }
    ui.add_space(20.0);

    let palette = GlovePalette::new(app.is_dark_mode);
    let (text, color) = palette.connection(app.state.connection_state);
    Components::banner(ui, text, color);
    ui.add_space(10.0);

    ui_capture_panel(app, ui);
    ui.add_space(10.0);
    ui_progress_panel(app, ui);
    ui.add_space(10.0);

    if ui.button("Disconnect").clicked() {
        app.send(WorkerCommand::Disconnect);
    }
}

fn ui_capture_panel(app: &mut SensorGloveApp, ui: &mut egui::Ui) {
    Components::card(ui, "Capture", |ui| {
        ui.add_enabled_ui(!app.state.capture_active, |ui| {
            ui.horizontal(|ui| {
                ui.label("Label:");
                for (idx, label) in app.labels.iter().enumerate() {
                    ui.selectable_value(&mut app.selected_label, idx, label.as_str());
                }
            });
        });

        ui.horizontal(|ui| {
            if app.state.capture_active {
                if ui.button("Stop").clicked() {
                    app.send(WorkerCommand::StopCapture);
                }
                ui.spinner();
            } else if ui.button("Start").clicked() {
                app.send(WorkerCommand::StartCapture {
                    label: app.current_label(),
                });
            }

            if ui.button("Reset").clicked() {
                app.send(WorkerCommand::ResetSamples);
            }
        });
    });
}

fn ui_progress_panel(app: &mut SensorGloveApp, ui: &mut egui::Ui) {
    Components::card(ui, "Collected", |ui| {
        let count = app.state.sample_count;
        let threshold = app.training_threshold.max(1);
        let fraction = (count as f32 / threshold as f32).min(1.0);

        ui.add(
            egui::ProgressBar::new(fraction)
                .text(format!("{count} / {threshold} samples"))
                .desired_width(ui.available_width()),
        );
        ui.label("Training starts automatically once enough samples are collected.");

        if ui
            .add_enabled(count > 0, egui::Button::new("Train now"))
            .clicked()
        {
            app.send(WorkerCommand::Train);
        }
    });
}
