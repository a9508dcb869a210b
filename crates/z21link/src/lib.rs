//! Client for the Z21 model railway command station.
//!
//! The Z21 speaks a small binary protocol over UDP. This crate bundles the
//! layers that implement it:
//!
//! - [`transport`]: connected UDP socket to the station
//! - [`frame`]: LAN envelopes, X-Bus sub-frames and DCC field encodings
//! - [`state`]: decoders for the records the station reports
//! - [`station`]: session with routing, keep-alive and locomotive/turnout
//!   control (behind the `station` feature)

/// Re-export transport types.
pub mod transport {
    pub use z21link_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use z21link_frame::*;
}

/// Re-export state decoders.
pub mod state {
    pub use z21link_state::*;
}

/// Re-export session types (requires `station` feature).
#[cfg(feature = "station")]
pub mod station {
    pub use z21link_station::*;
}
