use bit::BitIndex;

use crate::address::{BLOCK_SIZE, PAGE_SIZE, SECTOR_SIZE};

/// JEDEC identification, in the order the chip sends it
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JedecId {
    pub manufacturer: u8,
    pub device_high: u8,
    pub device_low: u8,
}

impl JedecId {
    /// Winbond manufacturer id
    pub const WINBOND: u8 = 0xEF;

    /// 16 bit device id, memory type then capacity
    pub fn device_id(&self) -> u16 {
        u16::from_be_bytes([self.device_high, self.device_low])
    }

    /// Packed as `0xMMHHLL`
    pub fn as_u32(&self) -> u32 {
        u32::from_be_bytes([0, self.manufacturer, self.device_high, self.device_low])
    }
}

impl From<[u8; 3]> for JedecId {
    fn from(val: [u8; 3]) -> JedecId {
        JedecId {
            manufacturer: val[0],
            device_high: val[1],
            device_low: val[2],
        }
    }
}

impl From<JedecId> for u32 {
    fn from(id: JedecId) -> u32 {
        id.as_u32()
    }
}

/// What [`init`](crate::blocking::W25Q::init) found on the bus
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceInfo {
    pub jedec_id: JedecId,
    pub unique_id: [u8; 8],
    pub capacity: u32,
    pub page_size: u32,
    pub sector_size: u32,
    pub block_size: u32,
}

impl DeviceInfo {
    pub(crate) fn new(jedec_id: JedecId, unique_id: [u8; 8], capacity: u32) -> Self {
        let info = DeviceInfo {
            jedec_id,
            unique_id,
            capacity,
            page_size: PAGE_SIZE,
            sector_size: SECTOR_SIZE,
            block_size: BLOCK_SIZE,
        };
        #[cfg(feature = "defmt")]
        {
            defmt::info!(
                "Manufacturer ID: {=u8:#x}, Device ID: {=u16:#x}",
                info.jedec_id.manufacturer,
                info.jedec_id.device_id()
            );
            defmt::info!("Unique ID: {=[u8]:x}", info.unique_id);
            defmt::info!(
                "Page {=u32}B, Sector {=u32}B, Block {=u32}B, Capacity {=u32}B",
                info.page_size,
                info.sector_size,
                info.block_size,
                info.capacity
            );
        }
        info
    }
}

/// Status register 1
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusRegister1 {
    pub status_register_protect: bool,
    pub sector_protect: bool,
    pub top_bottom_protect: bool,
    pub block_protect: u8,
    pub write_enable_latch: bool,
    pub busy: bool,
}

impl From<u8> for StatusRegister1 {
    fn from(val: u8) -> StatusRegister1 {
        StatusRegister1 {
            status_register_protect: val.bit(7),
            sector_protect: val.bit(6),
            top_bottom_protect: val.bit(5),
            block_protect: val.bit_range(2..5),
            write_enable_latch: val.bit(1),
            busy: val.bit(0),
        }
    }
}

/// Status register 2
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusRegister2 {
    pub suspend: bool,
    pub complement_protect: bool,
    pub security_register_lock: u8,
    pub quad_enable: bool,
    pub status_register_lock: bool,
}

impl From<u8> for StatusRegister2 {
    fn from(val: u8) -> StatusRegister2 {
        StatusRegister2 {
            suspend: val.bit(7),
            complement_protect: val.bit(6),
            security_register_lock: val.bit_range(3..6),
            quad_enable: val.bit(1),
            status_register_lock: val.bit(0),
        }
    }
}

/// Status register 3
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusRegister3 {
    pub driver_strength: u8,
    pub write_protect_selection: bool,
}

impl From<u8> for StatusRegister3 {
    fn from(val: u8) -> StatusRegister3 {
        StatusRegister3 {
            driver_strength: val.bit_range(5..7),
            write_protect_selection: val.bit(2),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jedec_id_packs_in_bus_order() {
        let id = JedecId::from([0xEF, 0x40, 0x18]);
        assert_eq!(id.as_u32(), 0xEF4018);
        assert_eq!(id.device_id(), 0x4018);
        assert_eq!(u32::from(id), 0xEF4018);
    }

    #[test]
    fn status1_decode() {
        let status = StatusRegister1::from(0b0001_0011);
        assert!(status.busy);
        assert!(status.write_enable_latch);
        assert_eq!(status.block_protect, 0b100);
        assert!(!status.top_bottom_protect);

        let idle = StatusRegister1::from(0);
        assert!(!idle.busy);
        assert!(!idle.write_enable_latch);
    }

    #[test]
    fn status2_and_3_decode() {
        let status2 = StatusRegister2::from(0b1010_0010);
        assert!(status2.suspend);
        assert!(status2.quad_enable);
        assert_eq!(status2.security_register_lock, 0b100);
        assert!(!status2.status_register_lock);

        let status3 = StatusRegister3::from(0b0110_0100);
        assert_eq!(status3.driver_strength, 0b11);
        assert!(status3.write_protect_selection);
    }
}
