use crate::domain::models::WorkerCommand;
use crate::presentation::app::SensorGloveApp;
use crate::presentation::components::Components;
use eframe::egui;

pub fn render(app: &mut SensorGloveApp, ui: &mut egui::Ui) {
    Components::heading(ui, "Find Your Glove");
    ui.add_space(20.0);

    Components::card(ui, "Nearby Gloves", |ui| {
        ui.horizontal(|ui| {
            if app.state.is_scanning {
                if ui.button("Stop Scan").clicked() {
                    app.send(WorkerCommand::StopScan);
                }
                ui.spinner();
            } else if ui.button("Refresh").clicked() {
                app.send(WorkerCommand::StartScan);
            }
        });

        ui.separator();

        if app.state.devices.is_empty() {
            ui.label(egui::RichText::new("No gloves found yet").weak());
            return;
        }

        let known = app
            .settings
            .lock()
            .map(|s| s.get().known_device_addresses.clone())
            .unwrap_or_default();

        let mut picked = None;
        egui::ScrollArea::vertical()
            .id_salt("scan_results")
            .max_height(260.0)
            .show(ui, |ui| {
                for device in &app.state.devices {
                    ui.horizontal(|ui| {
                        let rssi = device
                            .signal_strength
                            .map_or_else(|| "?".to_string(), |r| r.to_string());
                        ui.label(format!(
                            "{}  {}  ({} dBm)",
                            device.display_name(),
                            device.address,
                            rssi
                        ));
                        if known.contains(&device.address) {
                            ui.label(egui::RichText::new("known").weak());
                        }
                        if ui.button("Connect").clicked() {
                            picked = Some(device.clone());
                        }
                    });
                }
            });

        if let Some(device) = picked {
            app.state.selected_device = Some(device.clone());
            app.send(WorkerCommand::Select(device));
        }
    });
}
