//! X-Bus sub-frames and the command builders that produce them.

use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};

use crate::codec::{Envelope, HexBytes};
use crate::dcc::{function_byte, speed_byte, FunctionAction, LocoAddress, ThrottleSteps};
use crate::error::{FrameError, Result};
use crate::kind::{
    xbus_name, LAN_X, XBUS_GET_FIRMWARE_VERSION, XBUS_GET_VERSION, XBUS_LOCO_DRIVE,
    XBUS_LOCO_GET_INFO, XBUS_SET_TRACK_POWER, XBUS_SET_TURNOUT, XBUS_TURNOUT_INFO,
};

const TRACK_POWER_OFF: u8 = 0x80;
const TRACK_POWER_ON: u8 = 0x81;
const GET_VERSION_DB0: u8 = 0x21;
const GET_FIRMWARE_VERSION_DB0: u8 = 0x0A;
const LOCO_GET_INFO_DB0: u8 = 0xF0;
const LOCO_FUNCTION_DB0: u8 = 0xF8;

/// A checksum-protected X-Bus command or reply.
#[derive(Clone, PartialEq, Eq)]
pub struct XBusMessage {
    /// Header byte; doubles as the X-Bus message kind.
    pub header: u8,
    /// Data bytes between header and checksum.
    pub data: Bytes,
}

impl XBusMessage {
    pub fn new(header: u8, data: impl Into<Bytes>) -> Self {
        Self {
            header,
            data: data.into(),
        }
    }

    /// XOR over the header and every data byte.
    pub fn checksum(&self) -> u8 {
        xor_fold(self.header, &self.data)
    }

    /// Serialize as `header | data | checksum`.
    pub fn to_bytes(&self) -> Bytes {
        let mut dst = BytesMut::with_capacity(self.data.len() + 2);
        dst.put_u8(self.header);
        dst.put_slice(&self.data);
        dst.put_u8(self.checksum());
        dst.freeze()
    }

    /// Parse and validate a sub-frame.
    pub fn from_bytes(raw: &[u8]) -> Result<Self> {
        let Some((&actual, body)) = raw.split_last() else {
            return Err(FrameError::XBusTooShort(0));
        };
        let Some((&header, data)) = body.split_first() else {
            return Err(FrameError::XBusTooShort(raw.len()));
        };

        let expected = xor_fold(header, data);
        if expected != actual {
            return Err(FrameError::ChecksumMismatch { expected, actual });
        }

        Ok(Self {
            header,
            data: Bytes::copy_from_slice(data),
        })
    }

    /// Data byte `index`, if present.
    pub fn db(&self, index: usize) -> Option<u8> {
        self.data.get(index).copied()
    }

    /// Wrap into a [`LAN_X`] envelope.
    pub fn into_envelope(self) -> Envelope {
        Envelope::new(LAN_X, self.to_bytes())
    }

    pub fn track_power_on() -> Self {
        Self::new(XBUS_SET_TRACK_POWER, vec![TRACK_POWER_ON])
    }

    pub fn track_power_off() -> Self {
        Self::new(XBUS_SET_TRACK_POWER, vec![TRACK_POWER_OFF])
    }

    pub fn get_firmware_version() -> Self {
        Self::new(XBUS_GET_FIRMWARE_VERSION, vec![GET_FIRMWARE_VERSION_DB0])
    }

    pub fn get_version() -> Self {
        Self::new(XBUS_GET_VERSION, vec![GET_VERSION_DB0])
    }

    /// Request the state of one locomotive. The reply arrives as `LOCO_INFO`.
    pub fn loco_get_info(address: LocoAddress) -> Self {
        let [msb, lsb] = address.to_bytes();
        Self::new(XBUS_LOCO_GET_INFO, vec![LOCO_GET_INFO_DB0, msb, lsb])
    }

    /// Drive a locomotive at a signed percentage of full speed.
    pub fn loco_drive(address: LocoAddress, steps: ThrottleSteps, percent: f64) -> Self {
        Self::loco_drive_raw(address, steps, speed_byte(steps, percent))
    }

    /// Drive with an already encoded speed byte (`0x00` stop, `0x01` emergency stop).
    pub fn loco_drive_raw(address: LocoAddress, steps: ThrottleSteps, speed: u8) -> Self {
        let [msb, lsb] = address.to_bytes();
        Self::new(
            XBUS_LOCO_DRIVE,
            vec![steps.drive_prefix(), msb, lsb, speed],
        )
    }

    /// Switch locomotive function `index` (0-31).
    pub fn loco_function(address: LocoAddress, index: u8, action: FunctionAction) -> Result<Self> {
        let function = function_byte(index, action)?;
        let [msb, lsb] = address.to_bytes();
        Ok(Self::new(
            XBUS_LOCO_DRIVE,
            vec![LOCO_FUNCTION_DB0, msb, lsb, function],
        ))
    }

    /// Request the position of one turnout.
    pub fn get_turnout_info(address: u16) -> Self {
        let [msb, lsb] = address.to_be_bytes();
        Self::new(XBUS_TURNOUT_INFO, vec![msb, lsb])
    }

    /// Activate or deactivate turnout output `output` (0 or 1).
    pub fn set_turnout(address: u16, output: u8, activate: bool, queue: bool) -> Result<Self> {
        let control = turnout_byte(output, activate, queue)?;
        let [msb, lsb] = address.to_be_bytes();
        Ok(Self::new(XBUS_SET_TURNOUT, vec![msb, lsb, control]))
    }
}

impl From<XBusMessage> for Envelope {
    fn from(msg: XBusMessage) -> Self {
        msg.into_envelope()
    }
}

impl fmt::Debug for XBusMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("XBusMessage")
            .field(
                "header",
                &format_args!("0x{:02X} [{}]", self.header, xbus_name(self.header)),
            )
            .field("data", &format_args!("{}", HexBytes(&self.data)))
            .finish()
    }
}

/// Turnout control byte `1 0 Q 0 A 0 0 P`.
pub fn turnout_byte(output: u8, activate: bool, queue: bool) -> Result<u8> {
    if output > 1 {
        return Err(FrameError::OutOfRange {
            what: "turnout output",
            value: u32::from(output),
            allowed: "0..=1",
        });
    }
    Ok(0x80 | (u8::from(queue) << 5) | (u8::from(activate) << 3) | output)
}

fn xor_fold(header: u8, data: &[u8]) -> u8 {
    data.iter().fold(header, |acc, b| acc ^ b)
}
