//! Typed decoders for Z21 telemetry and status records.
//!
//! Each decoder is a pure function from the payload bytes of one message to
//! a record. Length violations are reported as [`StateError::Length`]; no
//! decoder pads or truncates its input.

pub mod error;
pub mod loco;
pub mod railcom;
pub mod reply;
pub mod system;
pub mod turnout;

pub use error::{LengthRule, Result, StateError};
pub use loco::{LocoState, FUNCTION_COUNT};
pub use railcom::{RailComData, RailComOptions};
pub use reply::{FirmwareVersion, SerialNumber, TrackPower, XBusVersion};
pub use system::SystemState;
pub use turnout::{TurnoutPosition, TurnoutState};
