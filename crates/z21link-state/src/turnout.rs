use std::fmt;

use serde::Serialize;

use crate::error::{LengthRule, Result};

/// Turnout position from the two low bits of a `TURNOUT_INFO` status byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnoutPosition {
    /// Not switched since power-up.
    Unknown,
    /// Output 0 is the last one switched.
    P0,
    /// Output 1 is the last one switched.
    P1,
    Invalid,
}

impl TurnoutPosition {
    pub fn from_status(status: u8) -> Self {
        match status & 0x03 {
            0 => Self::Unknown,
            1 => Self::P0,
            2 => Self::P1,
            _ => Self::Invalid,
        }
    }

    /// The turnout output that selects this position.
    pub fn output(self) -> Option<u8> {
        match self {
            Self::P0 => Some(0),
            Self::P1 => Some(1),
            Self::Unknown | Self::Invalid => None,
        }
    }
}

impl fmt::Display for TurnoutPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Unknown => "unknown",
            Self::P0 => "p0",
            Self::P1 => "p1",
            Self::Invalid => "invalid",
        })
    }
}

/// Turnout state from a `TURNOUT_INFO` reply or broadcast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TurnoutState {
    pub address: u16,
    pub position: TurnoutPosition,
}

impl TurnoutState {
    pub const LEN: usize = 3;

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        LengthRule::Exactly(Self::LEN).check("TurnoutState", data.len())?;
        Ok(Self {
            address: u16::from_be_bytes([data[0], data[1]]),
            position: TurnoutPosition::from_status(data[2]),
        })
    }
}
