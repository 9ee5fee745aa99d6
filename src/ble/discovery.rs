//! Service discovery result model.
//!
//! The BLE central adapter runs GATT discovery against the connected
//! peripheral and condenses the attribute table into these plain data
//! types before handing them to [`LnsClient`](super::lns::LnsClient).
//! Keeping the model transport-free means tests can fabricate any
//! peripheral layout without a radio.

use heapless::Vec;

/// 16-bit UUID of the Location and Navigation Service.
pub const UUID_LNS: u16 = 0x1819;
/// 16-bit UUID of the Location and Speed characteristic.
pub const UUID_LOCATION_AND_SPEED: u16 = 0x2A67;
/// 16-bit UUID of the Client Characteristic Configuration descriptor.
pub const UUID_GATT_CCC: u16 = 0x2902;

/// Characteristic property bit: server supports value-changed notifications.
pub const PROP_NOTIFY: u8 = 0x10;
/// Characteristic property bit: server supports reads.
pub const PROP_READ: u8 = 0x02;

/// Maximum characteristics retained per discovered service.
const MAX_CHARS: usize = 8;
/// Maximum descriptors retained per characteristic.
const MAX_DESCS: usize = 4;

/// Opaque connection identifier.
///
/// The BLE adapter owns the underlying connection object; the rest of
/// the firmware only carries this non-owning id and must treat it as
/// stale once a disconnect event has been observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnId(pub u16);

/// One descriptor found under a characteristic.
#[derive(Debug, Clone, Copy)]
pub struct DiscoveredDescriptor {
    pub uuid: u16,
    pub handle: u16,
}

/// One characteristic found under a service.
#[derive(Debug, Clone)]
pub struct DiscoveredCharacteristic {
    pub uuid: u16,
    /// Property bitmask from the characteristic declaration.
    pub properties: u8,
    pub descriptors: Vec<DiscoveredDescriptor, MAX_DESCS>,
}

impl DiscoveredCharacteristic {
    /// Find a descriptor under this characteristic by UUID.
    pub fn descriptor(&self, uuid: u16) -> Option<&DiscoveredDescriptor> {
        self.descriptors.iter().find(|d| d.uuid == uuid)
    }
}

/// A completed discovery result for a single primary service.
#[derive(Debug, Clone)]
pub struct DiscoveredService {
    /// Connection the discovery ran on.
    pub conn: ConnId,
    /// 16-bit UUID of the discovered service.
    pub uuid: u16,
    pub characteristics: Vec<DiscoveredCharacteristic, MAX_CHARS>,
}

impl DiscoveredService {
    /// Find a characteristic by UUID.
    pub fn characteristic(&self, uuid: u16) -> Option<&DiscoveredCharacteristic> {
        self.characteristics.iter().find(|c| c.uuid == uuid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lns_service() -> DiscoveredService {
        let mut descriptors = Vec::new();
        descriptors
            .push(DiscoveredDescriptor {
                uuid: UUID_LOCATION_AND_SPEED,
                handle: 0x0012,
            })
            .unwrap();
        descriptors
            .push(DiscoveredDescriptor {
                uuid: UUID_GATT_CCC,
                handle: 0x0013,
            })
            .unwrap();

        let mut characteristics = Vec::new();
        characteristics
            .push(DiscoveredCharacteristic {
                uuid: UUID_LOCATION_AND_SPEED,
                properties: PROP_NOTIFY | PROP_READ,
                descriptors,
            })
            .unwrap();

        DiscoveredService {
            conn: ConnId(1),
            uuid: UUID_LNS,
            characteristics,
        }
    }

    #[test]
    fn characteristic_lookup_by_uuid() {
        let svc = lns_service();
        assert!(svc.characteristic(UUID_LOCATION_AND_SPEED).is_some());
        assert!(svc.characteristic(0x2A19).is_none());
    }

    #[test]
    fn descriptor_lookup_by_uuid() {
        let svc = lns_service();
        let chrc = svc.characteristic(UUID_LOCATION_AND_SPEED).unwrap();
        assert_eq!(chrc.descriptor(UUID_GATT_CCC).unwrap().handle, 0x0013);
        assert!(chrc.descriptor(0x2901).is_none());
    }
}
