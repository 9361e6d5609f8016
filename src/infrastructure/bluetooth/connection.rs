//! BLE Connection Module
//!
//! [`GattLink`] implementation on top of btleplug.

use crate::domain::errors::{GloveError, GloveResult};
use crate::domain::settings::Settings;
use crate::infrastructure::bluetooth::protocol;
use crate::infrastructure::bluetooth::session::GattLink;
use btleplug::api::{Characteristic, Peripheral as _, WriteType};
use btleplug::platform::Peripheral;
use tracing::{debug, info};
use uuid::Uuid;

/// UUIDs the link resolves after service discovery
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkConfig {
    pub service_uuid: Uuid,
    pub data_char_uuid: Uuid,
    pub command_char_uuid: Uuid,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            service_uuid: protocol::SERVICE_UUID,
            data_char_uuid: protocol::DATA_CHAR_UUID,
            command_char_uuid: protocol::DATA_CHAR_UUID,
        }
    }
}

impl LinkConfig {
    pub fn from_settings(settings: &Settings) -> GloveResult<Self> {
        Ok(Self {
            service_uuid: protocol::parse_uuid(&settings.ble_service_uuid)?,
            data_char_uuid: protocol::parse_uuid(&settings.ble_data_char_uuid)?,
            command_char_uuid: protocol::parse_uuid(&settings.ble_command_char_uuid)?,
        })
    }

    fn find<'a>(
        &self,
        characteristics: impl IntoIterator<Item = &'a Characteristic>,
        uuid: Uuid,
    ) -> Option<Characteristic> {
        characteristics
            .into_iter()
            .find(|c| c.service_uuid == self.service_uuid && c.uuid == uuid)
            .cloned()
    }
}

pub struct BtleLink {
    peripheral: Peripheral,
    config: LinkConfig,
    data_characteristic: Option<Characteristic>,
    command_characteristic: Option<Characteristic>,
}

impl BtleLink {
    pub fn new(peripheral: Peripheral, config: LinkConfig) -> Self {
        Self {
            peripheral,
            config,
            data_characteristic: None,
            command_characteristic: None,
        }
    }
}

impl GattLink for BtleLink {
    async fn connect(&mut self) -> GloveResult<()> {
        if !self.peripheral.is_connected().await? {
            self.peripheral.connect().await?;
        }
        Ok(())
    }

    async fn discover(&mut self) -> GloveResult<bool> {
        self.peripheral.discover_services().await?;

        let characteristics = self.peripheral.characteristics();
        info!("Found {} characteristics", characteristics.len());

        self.data_characteristic = self
            .config
            .find(&characteristics, self.config.data_char_uuid);
        self.command_characteristic = self
            .config
            .find(&characteristics, self.config.command_char_uuid);

        Ok(self.data_characteristic.is_some() && self.command_characteristic.is_some())
    }

    async fn read_data(&mut self) -> GloveResult<Vec<u8>> {
        let characteristic = self
            .data_characteristic
            .as_ref()
            .ok_or(GloveError::ServiceNotFound)?;
        Ok(self.peripheral.read(characteristic).await?)
    }

    async fn write_command(&mut self, payload: &[u8]) -> GloveResult<()> {
        let characteristic = self
            .command_characteristic
            .as_ref()
            .ok_or(GloveError::ServiceNotFound)?;
        self.peripheral
            .write(characteristic, payload, WriteType::WithResponse)
            .await?;
        Ok(())
    }

    async fn release(&mut self) -> GloveResult<()> {
        self.data_characteristic = None;
        self.command_characteristic = None;
        debug!("Disconnecting peripheral {}", self.peripheral.address());
        self.peripheral.disconnect().await?;
        Ok(())
    }

    async fn is_connected(&self) -> bool {
        self.peripheral.is_connected().await.unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use btleplug::api::CharPropFlags;
    use std::collections::BTreeSet;

    fn characteristic(service: Uuid, uuid: Uuid) -> Characteristic {
        Characteristic {
            uuid,
            service_uuid: service,
            properties: CharPropFlags::READ | CharPropFlags::WRITE,
            descriptors: BTreeSet::new(),
        }
    }

    #[test]
    fn test_default_config_uses_shared_characteristic() {
        let config = LinkConfig::default();
        assert_eq!(config.data_char_uuid, config.command_char_uuid);
        assert_eq!(
            LinkConfig::from_settings(&Settings::default()).unwrap(),
            config
        );
    }

    #[test]
    fn test_find_requires_matching_service() {
        let config = LinkConfig::default();
        let other_service = uuid::uuid!("0000180f-0000-1000-8000-00805f9b34fb");
        let chars = vec![
            characteristic(other_service, config.data_char_uuid),
            characteristic(config.service_uuid, config.data_char_uuid),
        ];
        let found = config.find(&chars, config.data_char_uuid).unwrap();
        assert_eq!(found.service_uuid, config.service_uuid);

        let only_other = vec![characteristic(other_service, config.data_char_uuid)];
        assert!(config.find(&only_other, config.data_char_uuid).is_none());
    }

    #[test]
    fn test_bad_uuid_setting_is_rejected() {
        let settings = Settings {
            ble_service_uuid: "bogus".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            LinkConfig::from_settings(&settings),
            Err(GloveError::Protocol(_))
        ));
    }
}
