use crate::domain::models::{
    AppEvent, ConnectionState, MessageSeverity, ModelArtifactRecord, PeripheralHandle, Screen,
    StatusMessage, WorkerCommand,
};
use crate::domain::settings::SettingsService;
use crate::infrastructure::bluetooth::GloveService;
use crate::infrastructure::logging::LoggingGuard;
use crate::infrastructure::storage::Database;
use eframe::egui;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::error;

const COMMAND_HISTORY: usize = 20;

/// Everything the screens render, updated only from worker events.
#[derive(Debug, Default)]
pub struct UiState {
    pub screen: Screen,
    pub connection_state: ConnectionState,
    pub is_scanning: bool,
    pub devices: Vec<PeripheralHandle>,
    pub selected_device: Option<PeripheralHandle>,
    pub sample_count: u64,
    pub capture_active: bool,
    pub training_in_progress: bool,
    pub last_training: Option<ModelArtifactRecord>,
    pub sent_commands: VecDeque<String>,
    pub status_message: Option<StatusMessage>,
}

impl UiState {
    pub fn apply(&mut self, event: AppEvent) {
        match event {
            AppEvent::DeviceFound(device) => {
                if let Some(existing) = self
                    .devices
                    .iter_mut()
                    .find(|d| d.address == device.address)
                {
                    existing.signal_strength = device.signal_strength;
                } else {
                    self.devices.push(device);
                }
            }
            AppEvent::ScanState(scanning) => {
                if scanning && !self.is_scanning {
                    self.devices.clear();
                }
                self.is_scanning = scanning;
            }
            AppEvent::ConnectionState(state) => {
                self.connection_state = state;
                if state == ConnectionState::Disconnected {
                    self.capture_active = false;
                }
            }
            AppEvent::SampleStored { count } => self.sample_count = count,
            AppEvent::CaptureState(active) => self.capture_active = active,
            AppEvent::TrainingFinished(record) => {
                self.training_in_progress = false;
                self.sample_count = 0;
                self.last_training = Some(record);
            }
            AppEvent::CommandSent(command) => {
                if self.sent_commands.len() == COMMAND_HISTORY {
                    self.sent_commands.pop_front();
                }
                self.sent_commands.push_back(command);
            }
            AppEvent::Navigate(screen) => {
                if screen == Screen::Train {
                    self.training_in_progress = true;
                    self.last_training = None;
                }
                if screen == Screen::Run {
                    self.sent_commands.clear();
                }
                if screen == Screen::Start {
                    self.selected_device = None;
                }
                self.screen = screen;
            }
            AppEvent::LogMessage(msg) => {
                if self.screen == Screen::Train
                    && matches!(msg.severity, MessageSeverity::Warning | MessageSeverity::Error)
                {
                    self.training_in_progress = false;
                }
                self.status_message = Some(msg);
            }
        }
    }
}

pub struct SensorGloveApp {
    pub(crate) settings: Arc<Mutex<SettingsService>>,
    pub(crate) worker_tx: mpsc::UnboundedSender<WorkerCommand>,
    event_rx: mpsc::UnboundedReceiver<AppEvent>,

    pub(crate) state: UiState,

    // Record screen
    pub(crate) labels: Vec<String>,
    pub(crate) selected_label: usize,
    pub(crate) training_threshold: u64,

    pub(crate) is_dark_mode: bool,

    _logging_guard: Option<LoggingGuard>,
}

impl SensorGloveApp {
    pub fn new(
        cc: &eframe::CreationContext<'_>,
        settings_service: SettingsService,
        db: Database,
        data_dir: PathBuf,
        logging_guard: Option<LoggingGuard>,
    ) -> Self {
        crate::presentation::theme::configure_style(&cc.egui_ctx, false);

        let (labels, training_threshold) = {
            let s = settings_service.get();
            (s.labels.clone(), s.training_threshold)
        };

        let settings = Arc::new(Mutex::new(settings_service));
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (worker_tx, worker_rx) = mpsc::unbounded_channel();
        let worker_settings = settings.clone();
        let repaint_ctx = cc.egui_ctx.clone();

        std::thread::spawn(move || {
            let rt = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(rt) => rt,
                Err(e) => {
                    error!("Failed to create tokio runtime for the glove worker: {}", e);
                    return;
                }
            };

            rt.block_on(async move {
                let service = GloveService::new(worker_settings, db, &data_dir, event_tx);
                service.run(worker_rx).await;
            });
            repaint_ctx.request_repaint();
        });

        Self {
            settings,
            worker_tx,
            event_rx,
            state: UiState::default(),
            labels,
            selected_label: 0,
            training_threshold,
            is_dark_mode: false,
            _logging_guard: logging_guard,
        }
    }

    pub(crate) fn send(&self, cmd: WorkerCommand) {
        if self.worker_tx.send(cmd).is_err() {
            error!("Glove worker is not running");
        }
    }

    pub(crate) fn current_label(&self) -> Option<String> {
        self.labels.get(self.selected_label).cloned()
    }
}

impl eframe::App for SensorGloveApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        while let Ok(event) = self.event_rx.try_recv() {
            self.state.apply(event);
        }

        // Workers push events without waking the UI.
        ctx.request_repaint_after(Duration::from_millis(50));

        egui::TopBottomPanel::top("top_panel").show(ctx, |ui| {
            egui::menu::bar(ui, |ui| {
                ui.label(egui::RichText::new("SENSOR GLOVE").strong());
                ui.separator();
                ui.label(format!("{:?}", self.state.screen));

                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    let switch_icon = if self.is_dark_mode {
                        "☀ Light"
                    } else {
                        "🌙 Dark"
                    };
                    if ui.button(switch_icon).clicked() {
                        self.is_dark_mode = !self.is_dark_mode;
                        crate::presentation::theme::configure_style(ctx, self.is_dark_mode);
                    }
                });
            });
        });

        egui::TopBottomPanel::bottom("status_panel").show(ctx, |ui| {
            let palette = crate::presentation::theme::GlovePalette::new(self.is_dark_mode);
            match &self.state.status_message {
                Some(msg) => crate::presentation::components::Components::status_line(
                    ui, &palette, msg,
                ),
                None => {
                    ui.label("Ready");
                }
            }
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            egui::ScrollArea::vertical().show(ui, |ui| {
                ui.vertical_centered(|ui| {
                    ui.set_max_width(720.0);
                    ui.add_space(20.0);

                    use crate::presentation::screens;
                    match self.state.screen {
                        Screen::Start => screens::start::render(self, ui),
                        Screen::Scan => screens::scan::render(self, ui),
                        Screen::Record => screens::record::render(self, ui),
                        Screen::Train => screens::train::render(self, ui),
                        Screen::Run => screens::run::render(self, ui),
                    }

                    ui.add_space(40.0);
                });
            });
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device(address: &str, rssi: i16) -> PeripheralHandle {
        let mut handle = PeripheralHandle::new(address, "Glove");
        handle.signal_strength = Some(rssi);
        handle
    }

    #[test]
    fn test_device_list_dedupes_and_refreshes_signal() {
        let mut state = UiState::default();
        state.apply(AppEvent::ScanState(true));
        state.apply(AppEvent::DeviceFound(device("AA:BB:CC:DD:EE:FF", -70)));
        state.apply(AppEvent::DeviceFound(device("AA:BB:CC:DD:EE:FF", -50)));
        state.apply(AppEvent::DeviceFound(device("11:22:33:44:55:66", -80)));

        assert_eq!(state.devices.len(), 2);
        assert_eq!(state.devices[0].signal_strength, Some(-50));

        // A new scan starts from an empty list.
        state.apply(AppEvent::ScanState(false));
        state.apply(AppEvent::ScanState(true));
        assert!(state.devices.is_empty());
    }

    #[test]
    fn test_training_lifecycle() {
        let mut state = UiState::default();
        state.apply(AppEvent::SampleStored { count: 6001 });
        state.apply(AppEvent::Navigate(Screen::Train));
        assert!(state.training_in_progress);

        state.apply(AppEvent::LogMessage(StatusMessage::new(
            "No samples available for training",
            MessageSeverity::Warning,
        )));
        assert!(!state.training_in_progress);
        assert_eq!(state.screen, Screen::Train);
    }

    #[test]
    fn test_command_history_is_bounded() {
        let mut state = UiState::default();
        state.apply(AppEvent::Navigate(Screen::Run));
        for i in 0..30 {
            state.apply(AppEvent::CommandSent(format!("SENSOR_CONTROL:{i}.0,0.0")));
        }
        assert_eq!(state.sent_commands.len(), COMMAND_HISTORY);
        assert_eq!(
            state.sent_commands.back().map(String::as_str),
            Some("SENSOR_CONTROL:29.0,0.0")
        );
    }

    #[test]
    fn test_disconnect_stops_capture_indicator() {
        let mut state = UiState::default();
        state.apply(AppEvent::CaptureState(true));
        state.apply(AppEvent::ConnectionState(ConnectionState::Disconnected));
        assert!(!state.capture_active);
    }
}
