//! BLE Session Module
//!
//! One connection to a glove, driven through an explicit state machine.
//! Every screen talks to the device through [`BleSession`]; the platform
//! specifics sit behind [`GattLink`].

use crate::domain::errors::{GloveError, GloveResult};
use crate::domain::models::ConnectionState;
use crate::infrastructure::bluetooth::scanner::normalize_address;
use std::time::{Duration, Instant};
use tracing::{debug, info, trace, warn};

/// Platform GATT operations needed by a session.
#[allow(async_fn_in_trait)]
pub trait GattLink {
    /// Open the connection.
    async fn connect(&mut self) -> GloveResult<()>;

    /// Discover services and resolve the sensor/command characteristics.
    /// Returns `false` when the expected service is not present.
    async fn discover(&mut self) -> GloveResult<bool>;

    /// Read the sensor characteristic once.
    async fn read_data(&mut self) -> GloveResult<Vec<u8>>;

    /// Write a command to the command characteristic.
    async fn write_command(&mut self, payload: &[u8]) -> GloveResult<()>;

    /// Release the connection.
    async fn release(&mut self) -> GloveResult<()>;

    async fn is_connected(&self) -> bool;
}

/// Link change reported by the platform outside of any session call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    Disconnected { address: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Connected,
    ServicesDiscovered,
    Reading,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    Connect,
    LinkUp,
    ServicesFound,
    StartReading,
    StopReading,
    LinkDown,
}

impl SessionState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Disconnected => "Disconnected",
            Self::Connecting => "Connecting",
            Self::Connected => "Connected",
            Self::ServicesDiscovered => "ServicesDiscovered",
            Self::Reading => "Reading",
        }
    }

    pub fn next(self, event: SessionEvent) -> GloveResult<SessionState> {
        use SessionEvent as E;
        use SessionState as S;

        match (self, event) {
            (_, E::LinkDown) => Ok(S::Disconnected),
            (S::Disconnected, E::Connect) => Ok(S::Connecting),
            (S::Connecting, E::LinkUp) => Ok(S::Connected),
            (S::Connected, E::ServicesFound) => Ok(S::ServicesDiscovered),
            (S::ServicesDiscovered, E::StartReading) => Ok(S::Reading),
            (S::Reading, E::StopReading) => Ok(S::ServicesDiscovered),
            (from, event) => Err(GloveError::InvalidTransition {
                from: from.name(),
                event: event_name(event),
            }),
        }
    }

    /// Whether the data path (both characteristics) is resolved.
    pub fn has_data_path(&self) -> bool {
        matches!(self, Self::ServicesDiscovered | Self::Reading)
    }

    pub fn connection_state(&self) -> ConnectionState {
        match self {
            Self::Disconnected => ConnectionState::Disconnected,
            Self::Connecting => ConnectionState::Connecting,
            Self::Connected => ConnectionState::Connected,
            Self::ServicesDiscovered | Self::Reading => ConnectionState::ServiceReady,
        }
    }
}

fn event_name(event: SessionEvent) -> &'static str {
    match event {
        SessionEvent::Connect => "Connect",
        SessionEvent::LinkUp => "LinkUp",
        SessionEvent::ServicesFound => "ServicesFound",
        SessionEvent::StartReading => "StartReading",
        SessionEvent::StopReading => "StopReading",
        SessionEvent::LinkDown => "LinkDown",
    }
}

pub struct BleSession<L: GattLink> {
    link: L,
    address: String,
    state: SessionState,
    read_timeout: Duration,
    read_started: Option<Instant>,
}

impl<L: GattLink> BleSession<L> {
    pub fn new(link: L, address: impl Into<String>, read_timeout: Duration) -> Self {
        Self {
            link,
            address: address.into(),
            state: SessionState::Disconnected,
            read_timeout,
            read_started: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    #[cfg(test)]
    pub(crate) fn link(&self) -> &L {
        &self.link
    }

    #[cfg(test)]
    pub(crate) fn link_mut(&mut self) -> &mut L {
        &mut self.link
    }

    fn apply(&mut self, event: SessionEvent) -> GloveResult<()> {
        let next = self.state.next(event)?;
        if next != self.state {
            debug!(
                "Session {} {} -> {}",
                self.address,
                self.state.name(),
                next.name()
            );
        }
        self.state = next;
        Ok(())
    }

    /// Connect and immediately discover services.
    ///
    /// `Err(ServiceNotFound)` leaves the session connected but idle; any
    /// other error leaves it disconnected with the link released.
    pub async fn connect(&mut self) -> GloveResult<()> {
        self.apply(SessionEvent::Connect)?;
        info!("Connecting to glove {}", self.address);

        if let Err(e) = self.link.connect().await {
            warn!("Connection to {} failed: {}", self.address, e);
            self.release().await;
            return Err(e);
        }
        self.apply(SessionEvent::LinkUp)?;
        info!("Connected to {}", self.address);

        self.on_services_discovered().await
    }

    async fn on_services_discovered(&mut self) -> GloveResult<()> {
        match self.link.discover().await {
            Ok(true) => {
                self.apply(SessionEvent::ServicesFound)?;
                info!("Sensor service ready on {}", self.address);
                Ok(())
            }
            Ok(false) => {
                warn!(
                    "Sensor service not found on {}, connection left idle",
                    self.address
                );
                Err(GloveError::ServiceNotFound)
            }
            Err(e) => {
                warn!("Service discovery failed on {}: {}", self.address, e);
                self.release().await;
                Err(e)
            }
        }
    }

    pub fn start_reading(&mut self) -> GloveResult<()> {
        if self.state == SessionState::Reading {
            return Ok(());
        }
        self.apply(SessionEvent::StartReading)
    }

    pub fn stop_reading(&mut self) {
        if self.state == SessionState::Reading {
            // Reading -> ServicesDiscovered is always legal.
            let _ = self.apply(SessionEvent::StopReading);
        }
    }

    /// Issue one characteristic read.
    ///
    /// Returns `Ok(None)` when no data path is resolved or another read is
    /// still in flight; reads are coalesced, never queued.
    pub async fn read_once(&mut self) -> GloveResult<Option<Vec<u8>>> {
        if !self.state.has_data_path() {
            return Ok(None);
        }

        if let Some(started) = self.read_started {
            if started.elapsed() < self.read_timeout {
                trace!("Read still in flight, skipping tick");
                return Ok(None);
            }
        }

        self.read_started = Some(Instant::now());
        let result = tokio::time::timeout(self.read_timeout, self.link.read_data()).await;
        self.read_started = None;

        match result {
            Ok(Ok(bytes)) => Ok(Some(bytes)),
            Ok(Err(e)) => {
                if self.link.is_connected().await {
                    Err(e)
                } else {
                    warn!("Lost connection to {} during read: {}", self.address, e);
                    self.release().await;
                    Err(GloveError::ConnectionLost)
                }
            }
            Err(_) => {
                let ms = self.read_timeout.as_millis() as u64;
                warn!("Read from {} timed out after {} ms", self.address, ms);
                Err(GloveError::ReadTimeout(ms))
            }
        }
    }

    /// Write a text command. Returns `false` without writing when no
    /// characteristic is resolved.
    pub async fn send_command(&mut self, text: &str) -> GloveResult<bool> {
        if !self.state.has_data_path() {
            debug!("No command characteristic resolved, dropping '{}'", text);
            return Ok(false);
        }
        self.link.write_command(text.as_bytes()).await?;
        Ok(true)
    }

    /// Handle a disconnect reported by the platform for `address`.
    ///
    /// Returns `true` when it was this session's link that went down; the
    /// session is then released. Events for other devices, and stale events
    /// while the link is still up, are ignored.
    pub async fn on_peer_disconnect(&mut self, address: &str) -> bool {
        if self.state == SessionState::Disconnected
            || normalize_address(address) != normalize_address(&self.address)
        {
            return false;
        }
        if self.link.is_connected().await {
            debug!("Ignoring stale disconnect for {}", self.address);
            return false;
        }
        warn!("Glove {} dropped the connection", self.address);
        self.release().await;
        true
    }

    /// Release the connection. Safe to call repeatedly; a platform refusal
    /// counts as already released.
    pub async fn release(&mut self) {
        if self.state == SessionState::Disconnected {
            return;
        }
        if let Err(e) = self.link.release().await {
            debug!("Release of {} refused ({}), treating as released", self.address, e);
        }
        self.read_started = None;
        // LinkDown is legal from every state.
        let _ = self.apply(SessionEvent::LinkDown);
    }
}

#[cfg(test)]
pub(crate) mod fake {
    use super::*;
    use std::collections::VecDeque;

    /// Scripted link for exercising sessions without a radio.
    #[derive(Default)]
    pub struct FakeLink {
        pub fail_connect: bool,
        pub service_missing: bool,
        pub fail_release: bool,
        pub drop_on_read: bool,
        pub read_delay: Option<Duration>,
        pub payloads: VecDeque<Vec<u8>>,
        pub written: Vec<Vec<u8>>,
        pub connected: bool,
        pub release_calls: usize,
        pub read_calls: usize,
    }

    impl FakeLink {
        pub fn with_payloads(payloads: impl IntoIterator<Item = Vec<u8>>) -> Self {
            Self {
                payloads: payloads.into_iter().collect(),
                ..Default::default()
            }
        }
    }

    impl GattLink for FakeLink {
        async fn connect(&mut self) -> GloveResult<()> {
            if self.fail_connect {
                return Err(GloveError::ConnectionLost);
            }
            self.connected = true;
            Ok(())
        }

        async fn discover(&mut self) -> GloveResult<bool> {
            Ok(!self.service_missing)
        }

        async fn read_data(&mut self) -> GloveResult<Vec<u8>> {
            self.read_calls += 1;
            if let Some(delay) = self.read_delay {
                tokio::time::sleep(delay).await;
            }
            if self.drop_on_read {
                self.connected = false;
                return Err(GloveError::ConnectionLost);
            }
            Ok(self.payloads.pop_front().unwrap_or_else(|| vec![0u8; 16]))
        }

        async fn write_command(&mut self, payload: &[u8]) -> GloveResult<()> {
            self.written.push(payload.to_vec());
            Ok(())
        }

        async fn release(&mut self) -> GloveResult<()> {
            self.release_calls += 1;
            self.connected = false;
            if self.fail_release {
                return Err(GloveError::ConnectionLost);
            }
            Ok(())
        }

        async fn is_connected(&self) -> bool {
            self.connected
        }
    }
}
