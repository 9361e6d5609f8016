use crate::domain::models::StatusMessage;
use crate::presentation::theme::GlovePalette;
use eframe::egui;

pub struct Components;

impl Components {
    pub fn heading(ui: &mut egui::Ui, text: &str) {
        ui.label(egui::RichText::new(text).heading().strong());
    }

    pub fn sub_heading(ui: &mut egui::Ui, text: &str) {
        ui.label(egui::RichText::new(text).size(14.0).weak());
    }

    pub fn card<R>(
        ui: &mut egui::Ui,
        title: &str,
        add_contents: impl FnOnce(&mut egui::Ui) -> R,
    ) -> R {
        let stroke = ui.style().visuals.widgets.noninteractive.bg_stroke;
        let bg = ui.style().visuals.widgets.noninteractive.bg_fill;

        egui::Frame::none()
            .inner_margin(egui::Margin::same(14.0))
            .stroke(stroke)
            .fill(bg)
            .show(ui, |ui| {
                ui.vertical(|ui| {
                    ui.label(egui::RichText::new(title).strong().size(18.0));
                    ui.add_space(6.0);
                    add_contents(ui)
                })
                .inner
            })
            .inner
    }

    pub fn banner(ui: &mut egui::Ui, text: &str, bg_color: egui::Color32) {
        ui.add_sized(
            [ui.available_width(), 34.0],
            egui::Label::new(
                egui::RichText::new(text)
                    .color(egui::Color32::BLACK)
                    .background_color(bg_color)
                    .size(16.0)
                    .strong(),
            )
            .wrap_mode(egui::TextWrapMode::Extend),
        );
    }

    pub fn status_line(ui: &mut egui::Ui, palette: &GlovePalette, message: &StatusMessage) {
        ui.horizontal(|ui| {
            ui.label(
                egui::RichText::new("  ")
                    .background_color(palette.severity(message.severity)),
            );
            ui.label(&message.message);
        });
    }
}
