//! Z21 LAN envelope and X-Bus sub-frame codecs.
//!
//! Two nested framings travel over the wire:
//! - The outer envelope: a 2-byte little-endian total length, a 2-byte
//!   little-endian kind, then the payload.
//! - The X-Bus sub-frame, carried as the payload of [`LAN_X`] envelopes:
//!   a header byte, data bytes, then an XOR checksum over both.
//!
//! Everything in this crate is pure: no sockets, no shared state.

pub mod codec;
pub mod datagram;
pub mod dcc;
pub mod error;
pub mod flags;
pub mod kind;
pub mod xbus;

pub use codec::{decode_envelope, encode_envelope, Envelope, HEADER_SIZE, MAX_PAYLOAD};
pub use datagram::{envelopes, Envelopes};
pub use dcc::{
    function_byte, speed_byte, FunctionAction, LocoAddress, ThrottleSteps, MAX_FUNCTION_INDEX,
    MAX_LOCO_ADDRESS, SPEED_EMERGENCY_STOP, SPEED_STOP,
};
pub use error::{FrameError, Result};
pub use flags::BroadcastFlags;
pub use kind::{
    lan_name, xbus_name, MessageKind, LAN_DISCOVER_DEVICES, LAN_GET_BROADCASTFLAGS,
    LAN_GET_SERIAL_NUMBER, LAN_LOGOFF, LAN_RAILCOM_DATACHANGED, LAN_RAILCOM_GETDATA,
    LAN_SET_BROADCASTFLAGS, LAN_SYSTEMSTATE_DATACHANGED, LAN_SYSTEMSTATE_GETDATA, LAN_X,
    XBUS_BC_TRACK_POWER, XBUS_GET_FIRMWARE_VERSION, XBUS_GET_FIRMWARE_VERSION_REPLY,
    XBUS_GET_VERSION, XBUS_GET_VERSION_REPLY, XBUS_LOCO_DRIVE, XBUS_LOCO_GET_INFO,
    XBUS_LOCO_INFO, XBUS_SET_TRACK_POWER, XBUS_SET_TURNOUT, XBUS_TURNOUT_INFO,
};
pub use xbus::{turnout_byte, XBusMessage};
