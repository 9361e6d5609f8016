use crate::domain::models::{ConnectionState, MessageSeverity};
use eframe::egui;

pub struct GlovePalette {
    pub bg: egui::Color32,
    pub fg: egui::Color32,
    pub stroke: egui::Color32,
    pub accent_yellow: egui::Color32,
    pub accent_green: egui::Color32,
    pub accent_cyan: egui::Color32,
    pub accent_red: egui::Color32,
    pub muted: egui::Color32,
}

impl GlovePalette {
    pub fn new(is_dark: bool) -> Self {
        if is_dark {
            Self {
                bg: egui::Color32::from_rgb(24, 26, 28),
                fg: egui::Color32::WHITE,
                stroke: egui::Color32::WHITE,
                accent_yellow: egui::Color32::from_rgb(255, 200, 0),
                accent_green: egui::Color32::from_rgb(0, 230, 120),
                accent_cyan: egui::Color32::from_rgb(0, 230, 255),
                accent_red: egui::Color32::from_rgb(255, 90, 90),
                muted: egui::Color32::from_gray(110),
            }
        } else {
            Self {
                bg: egui::Color32::from_rgb(244, 244, 240),
                fg: egui::Color32::BLACK,
                stroke: egui::Color32::BLACK,
                accent_yellow: egui::Color32::from_rgb(255, 215, 0),
                accent_green: egui::Color32::from_rgb(0, 210, 100),
                accent_cyan: egui::Color32::from_rgb(0, 190, 255),
                accent_red: egui::Color32::from_rgb(240, 50, 50),
                muted: egui::Color32::from_gray(120),
            }
        }
    }

    pub fn severity(&self, severity: MessageSeverity) -> egui::Color32 {
        match severity {
            MessageSeverity::Info => self.accent_cyan,
            MessageSeverity::Success => self.accent_green,
            MessageSeverity::Warning => self.accent_yellow,
            MessageSeverity::Error => self.accent_red,
        }
    }

    /// Banner text plus background for a connection state.
    pub fn connection(&self, state: ConnectionState) -> (&'static str, egui::Color32) {
        match state {
            ConnectionState::ServiceReady => ("GLOVE READY", self.accent_green),
            ConnectionState::Connected => ("CONNECTED (NO SENSOR SERVICE)", self.accent_yellow),
            ConnectionState::Connecting => ("CONNECTING...", self.accent_yellow),
            ConnectionState::Disconnected => ("DISCONNECTED", self.muted),
        }
    }
}

pub fn configure_style(ctx: &egui::Context, is_dark: bool) {
    let mut style = (*ctx.style()).clone();
    let palette = GlovePalette::new(is_dark);

    style
        .text_styles
        .iter_mut()
        .for_each(|(text_style, font_id)| {
            font_id.size = match text_style {
                egui::TextStyle::Heading => 26.0,
                egui::TextStyle::Body => 15.0,
                egui::TextStyle::Button => 16.0,
                egui::TextStyle::Monospace => 14.0,
                _ => font_id.size,
            };
        });

    style.spacing.item_spacing = egui::vec2(10.0, 10.0);
    style.spacing.button_padding = egui::vec2(18.0, 10.0);

    let widgets = &mut style.visuals.widgets;
    for (visuals, width) in [
        (&mut widgets.noninteractive, 2.0),
        (&mut widgets.inactive, 2.0),
        (&mut widgets.hovered, 2.5),
        (&mut widgets.active, 3.0),
    ] {
        visuals.bg_stroke = egui::Stroke::new(width, palette.stroke);
        visuals.rounding = egui::Rounding::ZERO;
    }

    widgets.noninteractive.fg_stroke = egui::Stroke::new(1.0, palette.fg);
    widgets.noninteractive.bg_fill = palette.bg;
    widgets.inactive.fg_stroke = egui::Stroke::new(1.0, palette.fg);
    widgets.inactive.bg_fill = if is_dark {
        egui::Color32::from_gray(34)
    } else {
        egui::Color32::WHITE
    };
    widgets.hovered.bg_fill = palette.accent_yellow;
    widgets.hovered.fg_stroke = egui::Stroke::new(1.0, egui::Color32::BLACK);
    widgets.hovered.expansion = 2.0;
    widgets.active.bg_fill = palette.accent_green;
    widgets.active.fg_stroke = egui::Stroke::new(1.0, egui::Color32::BLACK);

    style.visuals.selection.stroke = egui::Stroke::new(1.0, palette.stroke);
    style.visuals.selection.bg_fill = palette.accent_cyan;

    style.visuals.window_rounding = egui::Rounding::ZERO;
    style.visuals.window_stroke = egui::Stroke::new(2.0, palette.stroke);
    style.visuals.window_shadow = egui::Shadow {
        offset: egui::vec2(6.0, 6.0),
        blur: 0.0,
        spread: 0.0,
        color: palette.stroke,
    };
    style.visuals.window_fill = palette.bg;
    style.visuals.panel_fill = palette.bg;
    style.visuals.override_text_color = Some(palette.fg);

    ctx.set_style(style);
}
