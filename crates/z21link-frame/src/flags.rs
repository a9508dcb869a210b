use std::fmt;
use std::ops::{BitOr, BitOrAssign};

use serde::Serialize;

/// Event classes a station broadcasts to this client.
///
/// Sent as a little-endian `u32` in `LAN_SET_BROADCASTFLAGS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct BroadcastFlags(u32);

impl BroadcastFlags {
    /// No broadcasts.
    pub const NONE: Self = Self(0);
    /// Locomotive info for locomotives this client has addressed.
    pub const LOCO_INFO: Self = Self(0x0000_0001);
    /// Turnout info. Shares its bit with [`Self::LOCO_INFO`].
    pub const TURNOUT_INFO: Self = Self(0x0000_0001);
    /// RailCom data for locomotives this client has addressed.
    pub const RAILCOM_SUBSCRIBED: Self = Self(0x0000_0004);
    /// System state changes.
    pub const SYSTEM_STATE: Self = Self(0x0000_0100);
    /// RailCom data for every locomotive.
    pub const RAILCOM_ALL: Self = Self(0x0004_0000);

    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: Self) {
        self.0 &= !other.0;
    }

    /// Payload of a `LAN_SET_BROADCASTFLAGS` envelope.
    pub fn to_le_bytes(self) -> [u8; 4] {
        self.0.to_le_bytes()
    }

    /// Parse a `LAN_GET_BROADCASTFLAGS` reply payload.
    pub fn from_le_slice(payload: &[u8]) -> Option<Self> {
        let bytes: [u8; 4] = payload.get(..4)?.try_into().ok()?;
        Some(Self(u32::from_le_bytes(bytes)))
    }
}

impl Default for BroadcastFlags {
    fn default() -> Self {
        Self::LOCO_INFO
    }
}

impl BitOr for BroadcastFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for BroadcastFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for BroadcastFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08X}", self.0)
    }
}
