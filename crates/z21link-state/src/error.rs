use std::fmt;

/// How long a record payload must be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LengthRule {
    Exactly(usize),
    AtLeast(usize),
}

impl LengthRule {
    pub(crate) fn check(self, record: &'static str, actual: usize) -> Result<()> {
        let ok = match self {
            LengthRule::Exactly(n) => actual == n,
            LengthRule::AtLeast(n) => actual >= n,
        };
        if ok {
            Ok(())
        } else {
            Err(StateError::Length {
                record,
                expected: self,
                actual,
            })
        }
    }
}

impl fmt::Display for LengthRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LengthRule::Exactly(n) => write!(f, "{n}"),
            LengthRule::AtLeast(n) => write!(f, "at least {n}"),
        }
    }
}

/// Errors that can occur while decoding a record.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StateError {
    /// The payload length is outside what the record allows.
    #[error("{record} requires {expected} bytes, got {actual}")]
    Length {
        record: &'static str,
        expected: LengthRule,
        actual: usize,
    },

    /// A reply record was decoded from an X-Bus message of another kind.
    #[error("{record} expects x-bus header 0x{expected:02X}, got 0x{actual:02X}")]
    UnexpectedHeader {
        record: &'static str,
        expected: u8,
        actual: u8,
    },
}

pub type Result<T> = std::result::Result<T, StateError>;
