//! Z21 station session.
//!
//! Connect to a station, send commands and receive its replies and
//! broadcasts. Inbound datagrams are split into envelopes and dispatched by
//! message kind to one-shot waiters and persistent subscribers; [`LAN_X`]
//! envelopes are dispatched by their X-Bus header.
//!
//! [`Loco`] and [`Turnout`] wrap one address each with the usual verbs.
//!
//! [`LAN_X`]: z21link_frame::LAN_X

pub mod config;
pub mod error;
pub mod loco;
pub mod router;
pub mod station;
pub mod turnout;

#[cfg(test)]
mod testutil;

pub use config::StationConfig;
pub use error::{Result, RouteError, StationError};
pub use loco::Loco;
pub use router::{Callback, CallbackResult, Delivery, Router, Waiter};
pub use station::{PollHandle, SessionState, Station};
pub use turnout::{SwitchMode, Turnout};
