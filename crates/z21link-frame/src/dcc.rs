//! DCC field encodings shared by the locomotive commands and decoders.

use std::fmt;

use serde::Serialize;

use crate::error::{FrameError, Result};

/// Highest DCC locomotive address.
pub const MAX_LOCO_ADDRESS: u16 = 9999;

/// Addresses from here on are sent with the long-address marker.
pub const LONG_ADDRESS_THRESHOLD: u16 = 128;

/// Highest locomotive function index.
pub const MAX_FUNCTION_INDEX: u8 = 31;

/// Speed byte for a normal stop.
pub const SPEED_STOP: u8 = 0x00;

/// Speed byte for an emergency stop.
pub const SPEED_EMERGENCY_STOP: u8 = 0x01;

/// A validated DCC locomotive address (1-9999).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct LocoAddress(u16);

impl LocoAddress {
    pub fn new(address: u16) -> Result<Self> {
        if address == 0 || address > MAX_LOCO_ADDRESS {
            return Err(FrameError::OutOfRange {
                what: "locomotive address",
                value: u32::from(address),
                allowed: "1..=9999",
            });
        }
        Ok(Self(address))
    }

    pub fn get(self) -> u16 {
        self.0
    }

    /// Whether the long-address marker is set on the wire.
    pub fn is_long(self) -> bool {
        self.0 >= LONG_ADDRESS_THRESHOLD
    }

    /// MSB/LSB pair; long addresses carry `11` in the top two MSB bits.
    pub fn to_bytes(self) -> [u8; 2] {
        let [mut msb, lsb] = self.0.to_be_bytes();
        if self.is_long() {
            msb |= 0xC0;
        }
        [msb, lsb]
    }
}

impl TryFrom<u16> for LocoAddress {
    type Error = FrameError;

    fn try_from(address: u16) -> Result<Self> {
        Self::new(address)
    }
}

impl From<LocoAddress> for u16 {
    fn from(address: LocoAddress) -> Self {
        address.0
    }
}

impl fmt::Display for LocoAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Speed step mode of a locomotive decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(into = "u8")]
pub enum ThrottleSteps {
    Steps14,
    Steps28,
    #[default]
    Steps128,
}

impl ThrottleSteps {
    /// Map a step count (14, 28, 128) to its mode.
    pub fn from_steps(steps: u8) -> Result<Self> {
        match steps {
            14 => Ok(Self::Steps14),
            28 => Ok(Self::Steps28),
            128 => Ok(Self::Steps128),
            other => Err(FrameError::OutOfRange {
                what: "throttle steps",
                value: u32::from(other),
                allowed: "14, 28 or 128",
            }),
        }
    }

    /// Number of speed steps.
    pub fn steps(self) -> u8 {
        match self {
            Self::Steps14 => 14,
            Self::Steps28 => 28,
            Self::Steps128 => 128,
        }
    }

    /// Largest magnitude a percentage maps onto.
    pub fn max_speed(self) -> u8 {
        self.steps()
    }

    /// First data byte of a drive command in this mode.
    pub fn drive_prefix(self) -> u8 {
        match self {
            Self::Steps14 => 0x10,
            Self::Steps28 => 0x12,
            Self::Steps128 => 0x13,
        }
    }
}

/// Decodes the low three bits of a locomotive status byte.
impl TryFrom<u8> for ThrottleSteps {
    type Error = FrameError;

    fn try_from(status: u8) -> Result<Self> {
        match status & 0x07 {
            0 => Ok(Self::Steps14),
            2 => Ok(Self::Steps28),
            4 => Ok(Self::Steps128),
            other => Err(FrameError::InvalidThrottleSteps(other)),
        }
    }
}

impl From<ThrottleSteps> for u8 {
    fn from(steps: ThrottleSteps) -> Self {
        steps.steps()
    }
}

impl fmt::Display for ThrottleSteps {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} steps", self.steps())
    }
}

/// What a function command does to its function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FunctionAction {
    Off = 0,
    On = 1,
    Toggle = 2,
}

/// Encode a signed percentage as a speed/direction byte.
///
/// The percentage is clamped to `-100.0..=100.0` (NaN counts as zero). The
/// magnitude never exceeds 127 and bit 7 is set for forward travel.
pub fn speed_byte(steps: ThrottleSteps, percent: f64) -> u8 {
    let percent = if percent.is_nan() {
        0.0
    } else {
        percent.clamp(-100.0, 100.0)
    };
    let forward = percent >= 0.0;
    let magnitude = (percent.abs() / 100.0 * f64::from(steps.max_speed())).floor();
    let magnitude = (magnitude as u8).min(0x7F);
    if forward {
        0x80 | magnitude
    } else {
        magnitude
    }
}

/// Encode a function control byte: action in bits 7-6, index in bits 5-0.
pub fn function_byte(index: u8, action: FunctionAction) -> Result<u8> {
    if index > MAX_FUNCTION_INDEX {
        return Err(FrameError::OutOfRange {
            what: "function index",
            value: u32::from(index),
            allowed: "0..=31",
        });
    }
    Ok(((action as u8) << 6) | index)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_and_long_addresses() {
        assert_eq!(LocoAddress::new(3).unwrap().to_bytes(), [0x00, 0x03]);
        assert_eq!(LocoAddress::new(127).unwrap().to_bytes(), [0x00, 0x7F]);
        assert_eq!(LocoAddress::new(128).unwrap().to_bytes(), [0xC0, 0x80]);
        assert_eq!(LocoAddress::new(1234).unwrap().to_bytes(), [0xC4, 0xD2]);
    }

    #[test]
    fn address_range_enforced() {
        assert!(LocoAddress::new(0).is_err());
        assert!(LocoAddress::new(9999).is_ok());
        assert!(matches!(
            LocoAddress::try_from(10_000),
            Err(FrameError::OutOfRange { value: 10_000, .. })
        ));
    }

    #[test]
    fn speed_byte_examples() {
        let s = ThrottleSteps::Steps128;
        assert_eq!(speed_byte(s, 50.0), 0xC0);
        assert_eq!(speed_byte(s, 100.0), 0xFF);
        assert_eq!(speed_byte(s, -50.0), 0x40);
        assert_eq!(speed_byte(s, 0.0), 0x80);
    }

    #[test]
    fn speed_byte_clamps_and_ignores_nan() {
        let s = ThrottleSteps::Steps128;
        assert_eq!(speed_byte(s, 250.0), 0xFF);
        assert_eq!(speed_byte(s, -250.0), 0x7F);
        assert_eq!(speed_byte(s, f64::NAN), 0x80);
        assert_eq!(speed_byte(ThrottleSteps::Steps14, 100.0), 0x80 | 14);
        assert_eq!(speed_byte(ThrottleSteps::Steps28, 50.0), 0x80 | 14);
    }

    #[test]
    fn function_byte_examples() {
        assert_eq!(function_byte(2, FunctionAction::On).unwrap(), 0x42);
        assert_eq!(function_byte(5, FunctionAction::Off).unwrap(), 0x05);
        assert_eq!(function_byte(10, FunctionAction::Toggle).unwrap(), 0x8A);
        assert_eq!(function_byte(31, FunctionAction::On).unwrap(), 0x5F);
        assert!(function_byte(32, FunctionAction::On).is_err());
    }

    #[test]
    fn throttle_steps_wire_values() {
        assert_eq!(ThrottleSteps::default(), ThrottleSteps::Steps128);
        assert_eq!(ThrottleSteps::Steps14.drive_prefix(), 0x10);
        assert_eq!(ThrottleSteps::Steps28.drive_prefix(), 0x12);
        assert_eq!(ThrottleSteps::Steps128.drive_prefix(), 0x13);
        assert_eq!(ThrottleSteps::from_steps(28).unwrap(), ThrottleSteps::Steps28);
        assert!(ThrottleSteps::from_steps(27).is_err());
    }

    #[test]
    fn throttle_steps_from_status_bits() {
        assert_eq!(ThrottleSteps::try_from(0x00).unwrap(), ThrottleSteps::Steps14);
        assert_eq!(ThrottleSteps::try_from(0x0A).unwrap(), ThrottleSteps::Steps28);
        assert_eq!(ThrottleSteps::try_from(0xF4).unwrap(), ThrottleSteps::Steps128);
        assert_eq!(
            ThrottleSteps::try_from(0x03).unwrap_err(),
            FrameError::InvalidThrottleSteps(3)
        );
    }
}
