use std::time::Duration;

use z21link_frame::MessageKind;
use z21link_state::TurnoutPosition;

/// Errors that can occur in station operations.
#[derive(Debug, thiserror::Error)]
pub enum StationError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] z21link_transport::TransportError),

    /// Envelope or sub-frame error.
    #[error("frame error: {0}")]
    Frame(#[from] z21link_frame::FrameError),

    /// A reply payload could not be decoded.
    #[error("state error: {0}")]
    State(#[from] z21link_state::StateError),

    /// No message of the awaited kind arrived in time.
    #[error("timed out after {after:?} waiting for {kind}")]
    Timeout { kind: MessageKind, after: Duration },

    /// The session is closing or closed.
    #[error("not connected to station")]
    NotConnected,

    /// A turnout can only be switched to `p0` or `p1`.
    #[error("cannot switch turnout to position {0}")]
    InvalidPosition(TurnoutPosition),
}

impl StationError {
    /// Timeouts are an expected outcome, e.g. for a locomotive that is not on the track.
    pub fn is_timeout(&self) -> bool {
        matches!(self, StationError::Timeout { .. })
    }
}

pub type Result<T> = std::result::Result<T, StationError>;

/// Errors raised while routing one inbound envelope.
///
/// These never leave the read loop; they are logged there.
#[derive(Debug, thiserror::Error)]
pub enum RouteError {
    /// The X-Bus sub-frame of a `LAN_X` envelope is malformed.
    #[error("malformed x-bus sub-frame: {0}")]
    Frame(#[from] z21link_frame::FrameError),

    /// The waiter queue for this kind is full; the envelope was not queued.
    #[error("waiter queue full for {0}")]
    QueueFull(MessageKind),
}
