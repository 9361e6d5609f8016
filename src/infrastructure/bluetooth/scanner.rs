//! BLE Scanner Module
//!
//! Discovers gloves advertising the sensor service.

use crate::domain::errors::{scan_failure, GloveError, GloveResult};
use crate::domain::models::PeripheralHandle;
use crate::domain::permissions::Permission;
use crate::infrastructure::bluetooth::session::LinkEvent;
use btleplug::api::{Central, CentralEvent, Manager as _, Peripheral as _, ScanFilter};
use btleplug::platform::{Adapter, Manager, Peripheral};
use futures::StreamExt;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Normalise a hardware address for comparison: upper-case hex pairs joined
/// by colons.
pub fn normalize_address(raw: &str) -> String {
    let hex: Vec<char> = raw
        .chars()
        .filter(|c| c.is_ascii_hexdigit())
        .map(|c| c.to_ascii_uppercase())
        .collect();
    hex.chunks(2)
        .map(|pair| pair.iter().collect::<String>())
        .collect::<Vec<_>>()
        .join(":")
}

/// Visible list of discovered gloves, one entry per hardware address.
#[derive(Debug, Default)]
pub struct DiscoveryList {
    entries: Vec<PeripheralHandle>,
}

impl DiscoveryList {
    /// Add a discovery. Returns `false` for an address already listed (its
    /// signal strength is refreshed).
    pub fn insert(&mut self, handle: PeripheralHandle) -> bool {
        let key = normalize_address(&handle.address);
        if let Some(existing) = self
            .entries
            .iter_mut()
            .find(|e| normalize_address(&e.address) == key)
        {
            existing.signal_strength = handle.signal_strength;
            return false;
        }
        self.entries.push(handle);
        true
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    #[cfg(test)]
    pub fn entries(&self) -> &[PeripheralHandle] {
        &self.entries
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

fn scan_error(err: btleplug::Error) -> GloveError {
    match err {
        btleplug::Error::PermissionDenied => GloveError::PermissionDenied(Permission::BluetoothScan),
        btleplug::Error::NotSupported(reason) => {
            warn!("Scanning not supported: {}", reason);
            GloveError::ScanFailed(scan_failure::FEATURE_UNSUPPORTED)
        }
        other => {
            warn!("Scan error: {}", other);
            GloveError::ScanFailed(scan_failure::INTERNAL_ERROR)
        }
    }
}

/// First available Bluetooth adapter, if any.
pub async fn first_adapter() -> GloveResult<Option<Adapter>> {
    let manager = Manager::new().await?;
    let adapters = manager.adapters().await?;
    Ok(adapters.into_iter().next())
}

pub struct DeviceDirectory {
    adapter: Adapter,
    service_filter: Uuid,
    show_all_devices: bool,
    scanning: bool,
    discovered: DiscoveryList,
}

impl DeviceDirectory {
    pub fn new(adapter: Adapter) -> Self {
        Self {
            adapter,
            service_filter: Uuid::nil(),
            show_all_devices: false,
            scanning: false,
            discovered: DiscoveryList::default(),
        }
    }

    /// Start (or restart) discovery restricted to `service_filter`.
    pub async fn start_scan(
        &mut self,
        service_filter: Uuid,
        show_all_devices: bool,
    ) -> GloveResult<()> {
        self.stop_scan().await;
        self.discovered.clear();

        info!("Starting BLE scan for service UUID: {}", service_filter);
        let filter = if show_all_devices {
            ScanFilter::default()
        } else {
            ScanFilter {
                services: vec![service_filter],
            }
        };
        self.adapter.start_scan(filter).await.map_err(scan_error)?;

        self.service_filter = service_filter;
        self.show_all_devices = show_all_devices;
        self.scanning = true;
        Ok(())
    }

    /// Stop scanning. Does nothing when no scan is active.
    pub async fn stop_scan(&mut self) {
        if !self.scanning {
            return;
        }
        self.scanning = false;
        info!("Stopping BLE scan...");
        if let Err(e) = self.adapter.stop_scan().await {
            debug!("Stop scan refused: {}", e);
        }
    }

    pub fn is_scanning(&self) -> bool {
        self.scanning
    }

    /// Peripherals discovered since the previous poll.
    pub async fn poll(&mut self) -> GloveResult<Vec<PeripheralHandle>> {
        if !self.scanning {
            return Ok(Vec::new());
        }

        let mut found = Vec::new();
        for peripheral in self.adapter.peripherals().await.map_err(scan_error)? {
            let Some(props) = peripheral.properties().await? else {
                continue;
            };

            // Some backends ignore the scan filter.
            if !self.show_all_devices && !props.services.contains(&self.service_filter) {
                continue;
            }

            let mut handle = PeripheralHandle::new(
                props.address.to_string(),
                props.local_name.unwrap_or_default(),
            );
            handle.signal_strength = props.rssi;

            if self.discovered.insert(handle.clone()) {
                debug!("Discovered {} ({})", handle.display_name(), handle.address);
                found.push(handle);
            }
        }
        Ok(found)
    }

    /// Forward adapter disconnect notifications to `sender` until the
    /// receiving side goes away.
    pub async fn watch_links(&self, sender: mpsc::UnboundedSender<LinkEvent>) -> GloveResult<()> {
        let mut events = self.adapter.events().await?;
        let adapter = self.adapter.clone();

        tokio::spawn(async move {
            while let Some(event) = events.next().await {
                let CentralEvent::DeviceDisconnected(id) = event else {
                    continue;
                };
                let address = match adapter.peripheral(&id).await {
                    Ok(peripheral) => peripheral.address().to_string(),
                    Err(e) => {
                        debug!("Disconnect for unknown peripheral {:?}: {}", id, e);
                        continue;
                    }
                };
                if sender.send(LinkEvent::Disconnected { address }).is_err() {
                    break;
                }
            }
            debug!("Adapter event stream closed");
        });
        Ok(())
    }

    /// Platform peripheral for a previously discovered address.
    pub async fn peripheral(&self, address: &str) -> GloveResult<Option<Peripheral>> {
        let key = normalize_address(address);
        for peripheral in self.adapter.peripherals().await? {
            if normalize_address(&peripheral.address().to_string()) == key {
                return Ok(Some(peripheral));
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_address() {
        assert_eq!(normalize_address("aa:bb:cc:dd:ee:ff"), "AA:BB:CC:DD:EE:FF");
        assert_eq!(normalize_address("AA-BB-CC-DD-EE-FF"), "AA:BB:CC:DD:EE:FF");
        assert_eq!(normalize_address(" aabbccddeeff "), "AA:BB:CC:DD:EE:FF");
    }

    #[test]
    fn test_duplicates_are_suppressed() {
        let mut list = DiscoveryList::default();
        assert!(list.insert(PeripheralHandle::new("AA:BB:CC:DD:EE:FF", "Glove")));

        let mut again = PeripheralHandle::new("aa:bb:cc:dd:ee:ff", "Glove");
        again.signal_strength = Some(-40);
        assert!(!list.insert(again));

        assert_eq!(list.len(), 1);
        assert_eq!(list.entries()[0].signal_strength, Some(-40));

        assert!(list.insert(PeripheralHandle::new("11:22:33:44:55:66", "Other")));
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn test_clear_allows_rediscovery() {
        let mut list = DiscoveryList::default();
        list.insert(PeripheralHandle::new("AA:BB:CC:DD:EE:FF", "Glove"));
        list.clear();
        assert!(list.insert(PeripheralHandle::new("AA:BB:CC:DD:EE:FF", "Glove")));
    }

    #[test]
    fn test_scan_error_codes() {
        assert!(matches!(
            scan_error(btleplug::Error::NotSupported("le".into())),
            GloveError::ScanFailed(scan_failure::FEATURE_UNSUPPORTED)
        ));
        assert!(matches!(
            scan_error(btleplug::Error::RuntimeError("boom".into())),
            GloveError::ScanFailed(scan_failure::INTERNAL_ERROR)
        ));
        assert!(matches!(
            scan_error(btleplug::Error::PermissionDenied),
            GloveError::PermissionDenied(Permission::BluetoothScan)
        ));
    }
}
