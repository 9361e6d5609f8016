//! Runtime permission checks and navigation capabilities.
//!
//! Both are passed into the worker instead of being looked up globally, so a
//! missing permission always ends in a "back to start" navigation rather
//! than a crash.

use crate::domain::errors::{GloveError, GloveResult};
use crate::domain::models::{AppEvent, Screen};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::warn;

/// First platform API level with split scan/connect permissions.
pub const SPLIT_BLUETOOTH_PERMISSIONS_API: u32 = 31;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Permission {
    BluetoothScan,
    BluetoothConnect,
    FineLocation,
    CoarseLocation,
    /// Pre-split classic permission
    Bluetooth,
    BluetoothAdmin,
}

pub fn required_permissions(api_level: u32) -> &'static [Permission] {
    if api_level >= SPLIT_BLUETOOTH_PERMISSIONS_API {
        &[
            Permission::BluetoothConnect,
            Permission::BluetoothScan,
            Permission::FineLocation,
            Permission::CoarseLocation,
        ]
    } else {
        &[
            Permission::Bluetooth,
            Permission::BluetoothAdmin,
            Permission::FineLocation,
            Permission::CoarseLocation,
        ]
    }
}

pub trait PermissionProbe {
    fn is_granted(&self, permission: Permission) -> bool;

    fn api_level(&self) -> u32 {
        SPLIT_BLUETOOTH_PERMISSIONS_API
    }
}

pub trait Navigator {
    fn navigate(&mut self, screen: Screen);
}

/// Returns the first required permission that is not granted.
pub fn ensure_permissions(probe: &impl PermissionProbe) -> GloveResult<()> {
    required_permissions(probe.api_level())
        .iter()
        .copied()
        .find(|p| !probe.is_granted(*p))
        .map_or(Ok(()), |missing| Err(GloveError::PermissionDenied(missing)))
}

pub fn check_permission(probe: &impl PermissionProbe, permission: Permission) -> GloveResult<()> {
    if probe.is_granted(permission) {
        Ok(())
    } else {
        Err(GloveError::PermissionDenied(permission))
    }
}

/// Navigate back to start for failures recovered that way. Returns whether
/// it navigated.
pub fn recover_by_navigation(err: &GloveError, navigator: &mut impl Navigator) -> bool {
    if !err.returns_to_start() {
        return false;
    }
    warn!("{}, returning to start", err);
    navigator.navigate(Screen::Start);
    true
}

/// Desktop permission model: the Bluetooth permissions are granted when an
/// adapter is present; location is never gated.
#[derive(Debug, Clone, Copy)]
pub struct AdapterPermissions {
    pub adapter_available: bool,
}

impl PermissionProbe for AdapterPermissions {
    fn is_granted(&self, permission: Permission) -> bool {
        match permission {
            Permission::FineLocation | Permission::CoarseLocation => true,
            _ => self.adapter_available,
        }
    }
}

/// Navigator that forwards navigation requests to the UI thread.
pub struct ChannelNavigator {
    sender: mpsc::UnboundedSender<AppEvent>,
}

impl ChannelNavigator {
    pub fn new(sender: mpsc::UnboundedSender<AppEvent>) -> Self {
        Self { sender }
    }
}

impl Navigator for ChannelNavigator {
    fn navigate(&mut self, screen: Screen) {
        let _ = self.sender.send(AppEvent::Navigate(screen));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    struct Granted {
        granted: HashSet<Permission>,
        api: u32,
    }

    impl PermissionProbe for Granted {
        fn is_granted(&self, permission: Permission) -> bool {
            self.granted.contains(&permission)
        }

        fn api_level(&self) -> u32 {
            self.api
        }
    }

    #[derive(Default)]
    struct RecordingNavigator(Vec<Screen>);

    impl Navigator for RecordingNavigator {
        fn navigate(&mut self, screen: Screen) {
            self.0.push(screen);
        }
    }

    #[test]
    fn test_required_permissions_by_api_level() {
        assert!(required_permissions(31).contains(&Permission::BluetoothScan));
        assert!(!required_permissions(31).contains(&Permission::BluetoothAdmin));
        assert!(required_permissions(30).contains(&Permission::BluetoothAdmin));
        assert!(required_permissions(30).contains(&Permission::FineLocation));
    }

    #[test]
    fn test_ensure_permissions_reports_missing() {
        let probe = Granted {
            granted: [
                Permission::BluetoothConnect,
                Permission::FineLocation,
                Permission::CoarseLocation,
            ]
            .into_iter()
            .collect(),
            api: 33,
        };
        match ensure_permissions(&probe) {
            Err(GloveError::PermissionDenied(p)) => assert_eq!(p, Permission::BluetoothScan),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_denial_navigates_to_start() {
        let probe = AdapterPermissions {
            adapter_available: false,
        };
        let mut nav = RecordingNavigator::default();
        let err = check_permission(&probe, Permission::BluetoothConnect).unwrap_err();
        assert!(recover_by_navigation(&err, &mut nav));
        assert_eq!(nav.0, vec![Screen::Start]);

        assert!(check_permission(&probe, Permission::FineLocation).is_ok());
        assert!(!recover_by_navigation(&GloveError::NoData, &mut nav));
        assert_eq!(nav.0.len(), 1);
    }

    #[test]
    fn test_adapter_permissions_grant_all_with_adapter() {
        let probe = AdapterPermissions {
            adapter_available: true,
        };
        assert!(ensure_permissions(&probe).is_ok());
    }
}
