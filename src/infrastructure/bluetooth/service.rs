//! Glove Service Module
//!
//! Worker that owns the adapter, the active session, the store and the
//! loaded model. It runs on its own current-thread runtime and talks to the
//! UI only through [`WorkerCommand`] and [`AppEvent`] channels.

use crate::domain::capture::{CaptureController, CaptureOutcome};
use crate::domain::control::ControlLoop;
use crate::domain::errors::{GloveError, GloveResult};
use crate::domain::models::{
    AppEvent, ConnectionState, MessageSeverity, PeripheralHandle, Screen, StatusMessage,
    WorkerCommand,
};
use crate::domain::permissions::{
    check_permission, ensure_permissions, recover_by_navigation, AdapterPermissions,
    ChannelNavigator, Navigator, Permission,
};
use crate::domain::settings::{Settings, SettingsService};
use crate::domain::trainer::{ModelTrainer, TrainerConfig};
use crate::infrastructure::bluetooth::connection::{BtleLink, LinkConfig};
use crate::infrastructure::bluetooth::protocol;
use crate::infrastructure::bluetooth::scanner::{first_adapter, DeviceDirectory};
use crate::infrastructure::bluetooth::session::{BleSession, LinkEvent, SessionState};
use crate::infrastructure::inference::OnnxInterpreter;
use crate::infrastructure::storage::Database;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

/// Screen to open once a device is connected.
pub fn route_after_connect(has_artifact: bool) -> Screen {
    if has_artifact {
        Screen::Run
    } else {
        Screen::Record
    }
}

pub struct GloveService {
    settings: Arc<Mutex<SettingsService>>,
    config: Settings,
    db: Database,
    trainer: ModelTrainer,
    directory: Option<DeviceDirectory>,
    device: Option<PeripheralHandle>,
    capture: Option<CaptureController<BtleLink>>,
    control: Option<ControlLoop<OnnxInterpreter>>,
    navigator: ChannelNavigator,
    event_sender: mpsc::UnboundedSender<AppEvent>,
    link_sender: mpsc::UnboundedSender<LinkEvent>,
    link_events: Option<mpsc::UnboundedReceiver<LinkEvent>>,
}

impl GloveService {
    pub fn new(
        settings: Arc<Mutex<SettingsService>>,
        db: Database,
        data_dir: &Path,
        event_sender: mpsc::UnboundedSender<AppEvent>,
    ) -> Self {
        let config = settings
            .lock()
            .map(|s| s.get().clone())
            .unwrap_or_default();
        let trainer = ModelTrainer::new(TrainerConfig::from_settings(&config, data_dir));
        let (link_sender, link_events) = mpsc::unbounded_channel();

        Self {
            settings,
            config,
            db,
            trainer,
            directory: None,
            device: None,
            capture: None,
            control: None,
            navigator: ChannelNavigator::new(event_sender.clone()),
            event_sender,
            link_sender,
            link_events: Some(link_events),
        }
    }

    /// Process commands until the UI side hangs up.
    pub async fn run(mut self, mut commands: mpsc::UnboundedReceiver<WorkerCommand>) {
        let mut read_tick =
            tokio::time::interval(Duration::from_millis(self.config.read_interval_ms.max(1)));
        read_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut scan_tick =
            tokio::time::interval(Duration::from_millis(self.config.scan_poll_interval_ms.max(1)));
        scan_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut link_events = self
            .link_events
            .take()
            .unwrap_or_else(|| mpsc::unbounded_channel().1);

        loop {
            tokio::select! {
                cmd = commands.recv() => match cmd {
                    Some(cmd) => self.handle(cmd).await,
                    None => break,
                },
                _ = read_tick.tick(), if self.is_streaming() => self.on_read_tick().await,
                _ = scan_tick.tick(), if self.is_scanning() => self.on_scan_tick().await,
                Some(event) = link_events.recv() => self.on_link_event(event).await,
            }
        }

        self.disconnect().await;
        info!("Glove worker stopped");
    }

    pub async fn handle(&mut self, cmd: WorkerCommand) {
        let result = match cmd {
            WorkerCommand::CheckReady => self.check_ready().await,
            WorkerCommand::StartScan => self.start_scan().await,
            WorkerCommand::StopScan => {
                self.stop_scan().await;
                Ok(())
            }
            WorkerCommand::Select(handle) => self.select(handle).await,
            WorkerCommand::StartCapture { label } => self.start_capture(label),
            WorkerCommand::StopCapture => {
                self.stop_capture();
                Ok(())
            }
            WorkerCommand::ResetSamples => self.reset_samples(),
            WorkerCommand::Train => self.train(),
            WorkerCommand::StartControl => self.start_control(),
            WorkerCommand::Retrain => {
                self.retrain();
                Ok(())
            }
            WorkerCommand::Disconnect => {
                self.disconnect().await;
                self.navigator.navigate(Screen::Start);
                Ok(())
            }
        };

        if let Err(e) = result {
            self.report(e).await;
        }
    }

    fn emit(&self, event: AppEvent) {
        let _ = self.event_sender.send(event);
    }

    fn status(&self, message: impl Into<String>, severity: MessageSeverity) {
        self.emit(AppEvent::LogMessage(StatusMessage::new(message, severity)));
    }

    fn permissions(&self) -> AdapterPermissions {
        AdapterPermissions {
            adapter_available: self.directory.is_some(),
        }
    }

    fn is_scanning(&self) -> bool {
        self.directory.as_ref().is_some_and(|d| d.is_scanning())
    }

    fn is_streaming(&self) -> bool {
        self.capture.as_ref().is_some_and(|c| {
            c.is_armed()
                || (self.control.is_some() && c.session().state() == SessionState::Reading)
        })
    }

    /// Log a failure, tell the UI, and recover by navigation where that is
    /// the policy for the error.
    async fn report(&mut self, err: GloveError) {
        let severity = match &err {
            GloveError::ServiceNotFound | GloveError::NoData | GloveError::ReadTimeout(_) => {
                warn!("{}", err);
                MessageSeverity::Warning
            }
            _ => {
                error!("{}", err);
                MessageSeverity::Error
            }
        };
        self.status(err.to_string(), severity);

        if matches!(err, GloveError::ConnectionLost) {
            self.disconnect().await;
        }
        recover_by_navigation(&err, &mut self.navigator);
    }

    async fn check_ready(&mut self) -> GloveResult<()> {
        if self.directory.is_none() {
            if let Some(adapter) = first_adapter().await? {
                let directory = DeviceDirectory::new(adapter);
                if let Err(e) = directory.watch_links(self.link_sender.clone()).await {
                    warn!("Adapter events unavailable, drops surface on read: {}", e);
                }
                self.directory = Some(directory);
            }
        }
        ensure_permissions(&self.permissions())?;

        self.status("Bluetooth adapter ready", MessageSeverity::Success);
        self.navigator.navigate(Screen::Scan);
        self.start_scan().await
    }

    async fn start_scan(&mut self) -> GloveResult<()> {
        check_permission(&self.permissions(), Permission::BluetoothScan)?;
        let service = protocol::parse_uuid(&self.config.ble_service_uuid)?;
        let show_all = self.config.debug_show_all_devices;

        if let Some(directory) = self.directory.as_mut() {
            directory.start_scan(service, show_all).await?;
            self.emit(AppEvent::ScanState(true));
        }
        Ok(())
    }

    async fn stop_scan(&mut self) {
        if let Some(directory) = self.directory.as_mut() {
            directory.stop_scan().await;
        }
        self.emit(AppEvent::ScanState(false));
    }

    async fn on_scan_tick(&mut self) {
        let Some(directory) = self.directory.as_mut() else {
            return;
        };
        match directory.poll().await {
            Ok(found) => {
                for handle in found {
                    self.emit(AppEvent::DeviceFound(handle));
                }
            }
            Err(e) => {
                self.stop_scan().await;
                self.report(e).await;
            }
        }
    }

    async fn select(&mut self, handle: PeripheralHandle) -> GloveResult<()> {
        self.stop_scan().await;
        self.disconnect().await;
        check_permission(&self.permissions(), Permission::BluetoothConnect)?;

        let Some(directory) = self.directory.as_ref() else {
            return Err(GloveError::PermissionDenied(Permission::BluetoothConnect));
        };
        let peripheral = directory
            .peripheral(&handle.address)
            .await?
            .ok_or(GloveError::ConnectionLost)?;

        let link = BtleLink::new(peripheral, LinkConfig::from_settings(&self.config)?);
        let mut session = BleSession::new(
            link,
            handle.address.clone(),
            Duration::from_millis(self.config.read_timeout_ms),
        );

        self.emit(AppEvent::ConnectionState(ConnectionState::Connecting));
        let service_missing = match session.connect().await {
            Ok(()) => false,
            // Link stays up without a data path; the user sees the warning.
            Err(GloveError::ServiceNotFound) => true,
            Err(e) => {
                self.emit(AppEvent::ConnectionState(ConnectionState::Disconnected));
                return Err(e);
            }
        };
        self.emit(AppEvent::ConnectionState(session.state().connection_state()));

        self.capture = Some(CaptureController::new(
            session,
            self.config.training_threshold,
            self.config.debug_raw_data_logging,
        ));
        self.device = Some(handle.clone());

        if let Ok(mut settings) = self.settings.lock() {
            if let Err(e) = settings.remember_device(&handle.address) {
                warn!("Failed to save settings: {}", e);
            }
        }
        self.status(
            format!("Connected to {}", handle.display_name()),
            MessageSeverity::Success,
        );

        if service_missing {
            self.announce_count()?;
            self.navigator.navigate(Screen::Record);
            return Err(GloveError::ServiceNotFound);
        }

        self.enter_after_connect().await
    }

    /// Open the screen for the connected device. A device whose model cannot
    /// be loaded falls back to recording so it can be retrained.
    async fn enter_after_connect(&mut self) -> GloveResult<()> {
        let Some(device) = self.device.clone() else {
            return Ok(());
        };
        match route_after_connect(self.db.has_artifact(&device.address)?) {
            Screen::Run => {
                if let Err(e) = self.start_control() {
                    self.report(e).await;
                    self.retrain();
                }
                Ok(())
            }
            screen => {
                self.announce_count()?;
                self.navigator.navigate(screen);
                Ok(())
            }
        }
    }

    async fn on_link_event(&mut self, event: LinkEvent) {
        let LinkEvent::Disconnected { address } = event;
        let Some(capture) = self.capture.as_mut() else {
            return;
        };
        if capture.session_mut().on_peer_disconnect(&address).await {
            self.report(GloveError::ConnectionLost).await;
        }
    }

    fn announce_count(&self) -> GloveResult<()> {
        if let Some(device) = &self.device {
            let count = self.db.count_samples(&device.address)?;
            self.emit(AppEvent::SampleStored { count });
        }
        Ok(())
    }

    fn start_capture(&mut self, label: Option<String>) -> GloveResult<()> {
        let Some(capture) = self.capture.as_mut() else {
            self.status("No glove connected", MessageSeverity::Warning);
            return Ok(());
        };
        capture.arm(label)?;
        self.emit(AppEvent::CaptureState(true));
        Ok(())
    }

    fn stop_capture(&mut self) {
        if let Some(capture) = self.capture.as_mut() {
            capture.disarm();
        }
        self.emit(AppEvent::CaptureState(false));
    }

    fn reset_samples(&mut self) -> GloveResult<()> {
        self.stop_capture();
        self.db.reset_all_samples()?;
        if let Some(capture) = self.capture.as_mut() {
            capture.reset_trigger();
        }
        self.emit(AppEvent::SampleStored { count: 0 });
        self.status("Captured samples cleared", MessageSeverity::Info);
        Ok(())
    }

    async fn on_read_tick(&mut self) {
        let Some(capture) = self.capture.as_mut() else {
            return;
        };

        if capture.is_armed() {
            match capture.tick(&self.db).await {
                Ok(CaptureOutcome::Idle) => {}
                Ok(CaptureOutcome::Stored { count }) => {
                    self.emit(AppEvent::SampleStored { count });
                }
                Ok(CaptureOutcome::ThresholdReached { count }) => {
                    self.emit(AppEvent::SampleStored { count });
                    self.emit(AppEvent::CaptureState(false));
                    if let Err(e) = self.train() {
                        self.report(e).await;
                    }
                }
                Err(e) => self.report(e).await,
            }
        } else if let Some(control) = self.control.as_mut() {
            match control.step(capture.session_mut()).await {
                Ok(Some(command)) => self.emit(AppEvent::CommandSent(command)),
                Ok(None) => {}
                Err(e) => self.report(e).await,
            }
        }
    }

    /// Run one training pass for the connected device. A failure halts the
    /// flow on the Train screen without storing anything.
    fn train(&mut self) -> GloveResult<()> {
        let Some(device) = self.device.clone() else {
            self.status("No glove selected", MessageSeverity::Warning);
            return Ok(());
        };
        if let Some(capture) = self.capture.as_mut() {
            capture.disarm();
        }
        self.navigator.navigate(Screen::Train);

        let record = self
            .trainer
            .run_pass(&mut self.db, &device.address, OnnxInterpreter::load)?;

        if let Some(capture) = self.capture.as_mut() {
            capture.reset_trigger();
        }
        self.status(
            format!("Training finished, score {:.4}", record.quality_score),
            MessageSeverity::Success,
        );
        self.emit(AppEvent::TrainingFinished(record));
        Ok(())
    }

    fn start_control(&mut self) -> GloveResult<()> {
        let Some(device) = self.device.clone() else {
            self.status("No glove selected", MessageSeverity::Warning);
            return Ok(());
        };
        let control = ControlLoop::load_latest(&self.db, &device.address, OnnxInterpreter::load)?;
        let control = match self.capture.as_mut() {
            Some(capture) => {
                capture.disarm();
                control.attach(capture.session_mut())?
            }
            None => control,
        };
        self.control = Some(control);
        self.navigator.navigate(Screen::Run);
        Ok(())
    }

    fn retrain(&mut self) {
        self.control = None;
        if let Some(capture) = self.capture.as_mut() {
            capture.session_mut().stop_reading();
        }
        if let Err(e) = self.announce_count() {
            warn!("Failed to count samples: {}", e);
        }
        self.navigator.navigate(Screen::Record);
    }

    async fn disconnect(&mut self) {
        self.control = None;
        if let Some(capture) = self.capture.take() {
            let mut session = capture.into_session();
            session.release().await;
            self.emit(AppEvent::CaptureState(false));
            self.emit(AppEvent::ConnectionState(ConnectionState::Disconnected));
        }
    }

    #[cfg(test)]
    fn set_device(&mut self, handle: PeripheralHandle) {
        self.device = Some(handle);
    }
}
