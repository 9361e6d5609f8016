use crate::domain::models::WorkerCommand;
use crate::presentation::app::SensorGloveApp;
use crate::presentation::components::Components;
use eframe::egui;

pub fn render(app: &mut SensorGloveApp, ui: &mut egui::Ui) {
    Components::heading(ui, "Sensor Glove");
    Components::sub_heading(ui, "Record, train and drive the glove over Bluetooth LE");
    ui.add_space(30.0);

    Components::card(ui, "Get Started", |ui| {
        ui.label("Switch on the glove and make sure Bluetooth is enabled on this computer.");
        ui.add_space(10.0);
        if ui
            .add_sized([220.0, 44.0], egui::Button::new("START"))
            .clicked()
        {
            app.send(WorkerCommand::CheckReady);
        }
    });
}
