use std::fmt;
use std::io;

use z21link_frame::FrameError;
use z21link_state::StateError;
use z21link_station::StationError;
use z21link_transport::TransportError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::ConnectionRefused => FAILURE,
        _ => TRANSPORT_ERROR,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    match err {
        TransportError::Io(source) => io_error(context, source),
        other => CliError::new(TRANSPORT_ERROR, format!("{context}: {other}")),
    }
}

pub fn frame_error(context: &str, err: FrameError) -> CliError {
    match err {
        FrameError::OutOfRange { .. } => CliError::new(USAGE, format!("{context}: {err}")),
        other => CliError::new(DATA_INVALID, format!("{context}: {other}")),
    }
}

pub fn state_error(context: &str, err: StateError) -> CliError {
    CliError::new(DATA_INVALID, format!("{context}: {err}"))
}

pub fn station_error(context: &str, err: StationError) -> CliError {
    match err {
        StationError::Transport(err) => transport_error(context, err),
        StationError::Frame(err) => frame_error(context, err),
        StationError::State(err) => state_error(context, err),
        StationError::Timeout { .. } => CliError::new(TIMEOUT, format!("{context}: {err}")),
        StationError::NotConnected => CliError::new(FAILURE, format!("{context}: {err}")),
        StationError::InvalidPosition(_) => CliError::new(USAGE, format!("{context}: {err}")),
    }
}
