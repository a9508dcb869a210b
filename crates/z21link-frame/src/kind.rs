//! Envelope kinds and X-Bus headers.
//!
//! Envelope kinds are the 16-bit discriminant of the outer frame. Envelopes of
//! kind [`LAN_X`] carry an X-Bus sub-frame whose first byte is the X-Bus
//! header; routing treats that header as the message kind instead.

use std::fmt;

use serde::Serialize;

/// Station serial number request and reply.
pub const LAN_GET_SERIAL_NUMBER: u16 = 0x10;

/// Client logout.
pub const LAN_LOGOFF: u16 = 0x30;

/// Device discovery request.
pub const LAN_DISCOVER_DEVICES: u16 = 0x35;

/// Wrapper for X-Bus sub-frames.
pub const LAN_X: u16 = 0x40;

/// Set the broadcast flags for this client.
pub const LAN_SET_BROADCASTFLAGS: u16 = 0x50;

/// Read back the broadcast flags for this client.
pub const LAN_GET_BROADCASTFLAGS: u16 = 0x51;

/// System state broadcast / reply.
pub const LAN_SYSTEMSTATE_DATACHANGED: u16 = 0x84;

/// System state request.
pub const LAN_SYSTEMSTATE_GETDATA: u16 = 0x85;

/// RailCom data broadcast / reply.
pub const LAN_RAILCOM_DATACHANGED: u16 = 0x88;

/// RailCom data request.
pub const LAN_RAILCOM_GETDATA: u16 = 0x89;

/// Track power on/off. Shares its value with [`XBUS_GET_VERSION`]; the data byte tells them apart.
pub const XBUS_SET_TRACK_POWER: u8 = 0x21;

/// X-Bus version request.
pub const XBUS_GET_VERSION: u8 = 0x21;

/// Track power broadcast (DB0 0x00 = off, 0x01 = on).
pub const XBUS_BC_TRACK_POWER: u8 = 0x61;

/// X-Bus version reply.
pub const XBUS_GET_VERSION_REPLY: u8 = 0x63;

/// Turnout info request (2 data bytes) and reply/broadcast (3 data bytes).
pub const XBUS_TURNOUT_INFO: u8 = 0x43;

/// Switch a turnout output.
pub const XBUS_SET_TURNOUT: u8 = 0x53;

/// Locomotive info request.
pub const XBUS_LOCO_GET_INFO: u8 = 0xE3;

/// Locomotive drive and function commands.
pub const XBUS_LOCO_DRIVE: u8 = 0xE4;

/// Locomotive info reply / broadcast.
pub const XBUS_LOCO_INFO: u8 = 0xEF;

/// Firmware version request.
pub const XBUS_GET_FIRMWARE_VERSION: u8 = 0xF1;

/// Firmware version reply.
pub const XBUS_GET_FIRMWARE_VERSION_REPLY: u8 = 0xF3;

/// Returns a human-readable name for an envelope kind.
pub fn lan_name(kind: u16) -> &'static str {
    match kind {
        LAN_GET_SERIAL_NUMBER => "LAN_GET_SERIAL_NUMBER",
        LAN_LOGOFF => "LAN_LOGOFF",
        LAN_DISCOVER_DEVICES => "LAN_DISCOVER_DEVICES",
        LAN_X => "LAN_X",
        LAN_SET_BROADCASTFLAGS => "LAN_SET_BROADCASTFLAGS",
        LAN_GET_BROADCASTFLAGS => "LAN_GET_BROADCASTFLAGS",
        LAN_SYSTEMSTATE_DATACHANGED => "LAN_SYSTEMSTATE_DATACHANGED",
        LAN_SYSTEMSTATE_GETDATA => "LAN_SYSTEMSTATE_GETDATA",
        LAN_RAILCOM_DATACHANGED => "LAN_RAILCOM_DATACHANGED",
        LAN_RAILCOM_GETDATA => "LAN_RAILCOM_GETDATA",
        _ => "UNKNOWN",
    }
}

/// Returns a human-readable name for an X-Bus header.
pub fn xbus_name(header: u8) -> &'static str {
    match header {
        XBUS_SET_TRACK_POWER => "SET_TRACK_POWER/GET_VERSION",
        XBUS_BC_TRACK_POWER => "BC_TRACK_POWER",
        XBUS_GET_VERSION_REPLY => "GET_VERSION_REPLY",
        XBUS_TURNOUT_INFO => "TURNOUT_INFO",
        XBUS_SET_TURNOUT => "SET_TURNOUT",
        XBUS_LOCO_GET_INFO => "LOCO_GET_INFO",
        XBUS_LOCO_DRIVE => "LOCO_DRIVE",
        XBUS_LOCO_INFO => "LOCO_INFO",
        XBUS_GET_FIRMWARE_VERSION => "GET_FIRMWARE_VERSION",
        XBUS_GET_FIRMWARE_VERSION_REPLY => "GET_FIRMWARE_VERSION_REPLY",
        _ => "UNKNOWN",
    }
}

/// The key inbound messages are dispatched on.
///
/// The two framing layers keep separate namespaces, so an X-Bus header never
/// collides with an envelope kind of the same numeric value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum MessageKind {
    /// An envelope kind other than [`LAN_X`].
    Lan(u16),
    /// The header of an X-Bus sub-frame carried in a [`LAN_X`] envelope.
    XBus(u8),
}

impl MessageKind {
    /// Returns a human-readable name for this kind.
    pub fn name(self) -> &'static str {
        match self {
            MessageKind::Lan(kind) => lan_name(kind),
            MessageKind::XBus(header) => xbus_name(header),
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageKind::Lan(kind) => write!(f, "0x{kind:04X} [{}]", self.name()),
            MessageKind::XBus(header) => write!(f, "x 0x{header:02X} [{}]", self.name()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_known_kinds() {
        assert_eq!(lan_name(LAN_X), "LAN_X");
        assert_eq!(lan_name(0x1234), "UNKNOWN");
        assert_eq!(xbus_name(XBUS_LOCO_INFO), "LOCO_INFO");
        assert_eq!(xbus_name(0x00), "UNKNOWN");
    }

    #[test]
    fn lan_and_xbus_namespaces_are_distinct() {
        assert_ne!(MessageKind::Lan(0x43), MessageKind::XBus(0x43));
    }

    #[test]
    fn display_includes_value_and_name() {
        assert_eq!(
            MessageKind::Lan(LAN_GET_SERIAL_NUMBER).to_string(),
            "0x0010 [LAN_GET_SERIAL_NUMBER]"
        );
        assert_eq!(
            MessageKind::XBus(XBUS_BC_TRACK_POWER).to_string(),
            "x 0x61 [BC_TRACK_POWER]"
        );
    }
}
