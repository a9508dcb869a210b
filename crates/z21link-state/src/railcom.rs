use serde::Serialize;

use crate::error::{LengthRule, Result};

/// Option bits of a RailCom record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(transparent)]
pub struct RailComOptions(u8);

impl RailComOptions {
    pub const SPEED1: u8 = 0x01;
    pub const SPEED2: u8 = 0x02;
    pub const QOS: u8 = 0x04;

    pub const fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }
}

/// RailCom decoder feedback from `LAN_RAILCOM_DATACHANGED`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RailComData {
    pub loco_address: u16,
    /// Valid RailCom messages received.
    pub receive_counter: u32,
    /// RailCom reception errors.
    pub error_counter: u16,
    pub options: RailComOptions,
    /// Speed as reported by the decoder; see [`RailComData::has_speed1`].
    pub speed: u8,
    /// Quality of service, higher is better.
    pub qos: u8,
}

impl RailComData {
    pub const LEN: usize = 13;

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        LengthRule::Exactly(Self::LEN).check("RailComData", data.len())?;
        Ok(Self {
            loco_address: u16::from_le_bytes([data[0], data[1]]),
            receive_counter: u32::from_le_bytes([data[2], data[3], data[4], data[5]]),
            error_counter: u16::from_le_bytes([data[6], data[7]]),
            options: RailComOptions(data[9]),
            speed: data[10],
            qos: data[11],
        })
    }

    pub fn has_speed1(&self) -> bool {
        self.options.0 & RailComOptions::SPEED1 != 0
    }

    pub fn has_speed2(&self) -> bool {
        self.options.0 & RailComOptions::SPEED2 != 0
    }

    pub fn has_qos(&self) -> bool {
        self.options.0 & RailComOptions::QOS != 0
    }

    /// Reception errors as a percentage of all messages, 0 when none arrived.
    pub fn error_rate(&self) -> f64 {
        let total = u64::from(self.receive_counter) + u64::from(self.error_counter);
        if total == 0 {
            return 0.0;
        }
        f64::from(self.error_counter) / total as f64 * 100.0
    }
}
