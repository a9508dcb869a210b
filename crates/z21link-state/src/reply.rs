//! Replies to the station-level queries.

use std::fmt;

use serde::Serialize;
use z21link_frame::{
    XBusMessage, XBUS_BC_TRACK_POWER, XBUS_GET_FIRMWARE_VERSION_REPLY, XBUS_GET_VERSION_REPLY,
};

use crate::error::{LengthRule, Result, StateError};

/// Station serial number from a `LAN_GET_SERIAL_NUMBER` reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct SerialNumber(pub u32);

impl SerialNumber {
    pub fn from_bytes(payload: &[u8]) -> Result<Self> {
        LengthRule::AtLeast(4).check("SerialNumber", payload.len())?;
        Ok(Self(u32::from_le_bytes([
            payload[0], payload[1], payload[2], payload[3],
        ])))
    }
}

impl fmt::Display for SerialNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Firmware version; both parts are BCD (`0x01`, `0x43` is 1.43).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FirmwareVersion {
    pub major: u8,
    pub minor: u8,
}

impl FirmwareVersion {
    pub fn from_reply(reply: &XBusMessage) -> Result<Self> {
        expect_header("FirmwareVersion", reply, XBUS_GET_FIRMWARE_VERSION_REPLY)?;
        LengthRule::AtLeast(3).check("FirmwareVersion", reply.data.len())?;
        Ok(Self {
            major: reply.data[1],
            minor: reply.data[2],
        })
    }
}

impl fmt::Display for FirmwareVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:x}.{:02x}", self.major, self.minor)
    }
}

/// X-Bus protocol version and command station id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct XBusVersion {
    /// BCD, `0x36` is 3.6.
    pub version: u8,
    pub station_id: u8,
}

impl XBusVersion {
    pub fn from_reply(reply: &XBusMessage) -> Result<Self> {
        expect_header("XBusVersion", reply, XBUS_GET_VERSION_REPLY)?;
        LengthRule::AtLeast(3).check("XBusVersion", reply.data.len())?;
        Ok(Self {
            version: reply.data[1],
            station_id: reply.data[2],
        })
    }
}

impl fmt::Display for XBusVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.version >> 4, self.version & 0x0F)
    }
}

/// Track power as announced by a `BC_TRACK_POWER` broadcast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackPower {
    Off,
    On,
    /// A status byte other than on/off.
    Other(u8),
}

impl TrackPower {
    pub fn from_broadcast(msg: &XBusMessage) -> Result<Self> {
        expect_header("TrackPower", msg, XBUS_BC_TRACK_POWER)?;
        LengthRule::AtLeast(1).check("TrackPower", msg.data.len())?;
        Ok(match msg.data[0] {
            0x00 => Self::Off,
            0x01 => Self::On,
            other => Self::Other(other),
        })
    }
}

impl fmt::Display for TrackPower {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Off => f.write_str("off"),
            Self::On => f.write_str("on"),
            Self::Other(status) => write!(f, "0x{status:02X}"),
        }
    }
}

fn expect_header(record: &'static str, msg: &XBusMessage, expected: u8) -> Result<()> {
    if msg.header != expected {
        return Err(StateError::UnexpectedHeader {
            record,
            expected,
            actual: msg.header,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serial_number_is_little_endian() {
        let serial = SerialNumber::from_bytes(&[0x4E, 0x61, 0xBC, 0x00, 0xFF]).unwrap();
        assert_eq!(serial, SerialNumber(0x00BC_614E));
        assert_eq!(serial.to_string(), "12345678");
        assert!(SerialNumber::from_bytes(&[0x01, 0x02, 0x03]).is_err());
    }

    #[test]
    fn firmware_version_from_reply() {
        let reply = XBusMessage::new(0xF3, vec![0x0A, 0x01, 0x43]);
        let version = FirmwareVersion::from_reply(&reply).unwrap();
        assert_eq!(version, FirmwareVersion { major: 1, minor: 0x43 });
        assert_eq!(version.to_string(), "1.43");
    }

    #[test]
    fn firmware_version_rejects_short_or_foreign_reply() {
        let short = XBusMessage::new(0xF3, vec![0x0A, 0x01]);
        assert!(matches!(
            FirmwareVersion::from_reply(&short),
            Err(StateError::Length { actual: 2, .. })
        ));
        let foreign = XBusMessage::new(0x63, vec![0x21, 0x30, 0x12]);
        assert!(matches!(
            FirmwareVersion::from_reply(&foreign),
            Err(StateError::UnexpectedHeader { .. })
        ));
    }

    #[test]
    fn xbus_version_from_reply() {
        let reply = XBusMessage::new(0x63, vec![0x21, 0x36, 0x12]);
        let version = XBusVersion::from_reply(&reply).unwrap();
        assert_eq!(version.version, 0x36);
        assert_eq!(version.station_id, 0x12);
        assert_eq!(version.to_string(), "3.6");
    }

    #[test]
    fn track_power_broadcast() {
        let on = XBusMessage::new(0x61, vec![0x01]);
        assert_eq!(TrackPower::from_broadcast(&on).unwrap(), TrackPower::On);
        let off = XBusMessage::new(0x61, vec![0x00]);
        assert_eq!(TrackPower::from_broadcast(&off).unwrap(), TrackPower::Off);
        let other = XBusMessage::new(0x61, vec![0x08]);
        assert_eq!(
            TrackPower::from_broadcast(&other).unwrap(),
            TrackPower::Other(0x08)
        );
    }
}
