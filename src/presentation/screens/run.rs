use crate::domain::models::WorkerCommand;
use crate::presentation::app::SensorGloveApp;
use crate::presentation::components::Components;
use crate::presentation::theme::GlovePalette;
use eframe::egui;

pub fn render(app: &mut SensorGloveApp, ui: &mut egui::Ui) {
    Components::heading(ui, "Control");
    ui.add_space(20.0);

    let palette = GlovePalette::new(app.is_dark_mode);
    let (text, color) = palette.connection(app.state.connection_state);
    Components::banner(ui, text, color);
    ui.add_space(10.0);

    Components::card(ui, "Commands sent", |ui| {
        if app.state.sent_commands.is_empty() {
            ui.label(egui::RichText::new("Waiting for sensor data...").weak());
        }
        egui::ScrollArea::vertical()
            .id_salt("command_log")
            .max_height(240.0)
            .stick_to_bottom(true)
            .show(ui, |ui| {
                for command in &app.state.sent_commands {
                    ui.monospace(command);
                }
            });
    });
    ui.add_space(10.0);

    ui.horizontal(|ui| {
        if ui.button("Retrain").clicked() {
            app.send(WorkerCommand::Retrain);
        }
        if ui.button("Disconnect").clicked() {
            app.send(WorkerCommand::Disconnect);
        }
    });
}
