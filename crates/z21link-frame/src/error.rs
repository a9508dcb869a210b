/// Errors that can occur during envelope and sub-frame encoding/decoding.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    /// The buffer is shorter than the header or the declared envelope length.
    #[error("truncated envelope (need {needed} bytes, have {available})")]
    Truncated { needed: usize, available: usize },

    /// The payload does not fit the 16-bit length field.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// An X-Bus sub-frame needs at least a header and a checksum byte.
    #[error("x-bus frame requires at least 2 bytes, got {0}")]
    XBusTooShort(usize),

    /// The trailing X-Bus checksum does not match the XOR over header and data.
    #[error("x-bus checksum mismatch: calculated 0x{expected:02X}, received 0x{actual:02X}")]
    ChecksumMismatch { expected: u8, actual: u8 },

    /// A caller-supplied parameter is outside its protocol-legal range.
    #[error("{what} out of range: {value} (allowed {allowed})")]
    OutOfRange {
        what: &'static str,
        value: u32,
        allowed: &'static str,
    },

    /// The low three bits of a status byte name no throttle step mode.
    #[error("invalid throttle steps value: 0x{0:02X}")]
    InvalidThrottleSteps(u8),

    /// An X-Bus view was requested from an envelope of another kind.
    #[error("envelope kind 0x{actual:04X} is not 0x{expected:04X}")]
    UnexpectedKind { expected: u16, actual: u16 },
}

pub type Result<T> = std::result::Result<T, FrameError>;
