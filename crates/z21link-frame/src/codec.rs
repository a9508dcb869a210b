use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};
use crate::kind::{lan_name, xbus_name, MessageKind, LAN_X};
use crate::xbus::XBusMessage;

/// Envelope header: length (2) + kind (2) = 4 bytes.
pub const HEADER_SIZE: usize = 4;

/// Largest payload the 16-bit length field can describe.
pub const MAX_PAYLOAD: usize = u16::MAX as usize - HEADER_SIZE;

/// One Z21 LAN message.
#[derive(Clone, PartialEq, Eq)]
pub struct Envelope {
    /// The envelope kind (LAN header).
    pub kind: u16,
    /// The message payload.
    pub payload: Bytes,
}

impl Envelope {
    /// Create a new envelope.
    pub fn new(kind: u16, payload: impl Into<Bytes>) -> Self {
        Self {
            kind,
            payload: payload.into(),
        }
    }

    /// Create an envelope with an empty payload.
    pub fn empty(kind: u16) -> Self {
        Self {
            kind,
            payload: Bytes::new(),
        }
    }

    /// The total wire size of this envelope (header + payload).
    pub fn wire_size(&self) -> usize {
        HEADER_SIZE + self.payload.len()
    }

    /// Serialize into a fresh buffer.
    pub fn to_bytes(&self) -> Result<Bytes> {
        let mut dst = BytesMut::with_capacity(self.wire_size());
        encode_envelope(self.kind, &self.payload, &mut dst)?;
        Ok(dst.freeze())
    }

    /// Parse the X-Bus sub-frame carried by a [`LAN_X`] envelope.
    pub fn xbus(&self) -> Result<XBusMessage> {
        if self.kind != LAN_X {
            return Err(FrameError::UnexpectedKind {
                expected: LAN_X,
                actual: self.kind,
            });
        }
        XBusMessage::from_bytes(&self.payload)
    }

    /// The key this envelope is dispatched on.
    ///
    /// [`LAN_X`] envelopes are keyed by their X-Bus header; the sub-frame is
    /// validated, checksum included, before its header is trusted.
    pub fn route_kind(&self) -> Result<MessageKind> {
        if self.kind == LAN_X {
            Ok(MessageKind::XBus(self.xbus()?.header))
        } else {
            Ok(MessageKind::Lan(self.kind))
        }
    }
}

impl fmt::Debug for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut dbg = f.debug_struct("Envelope");
        dbg.field(
            "kind",
            &format_args!("0x{:04X} [{}]", self.kind, lan_name(self.kind)),
        );
        if self.kind == LAN_X {
            if let Some(&header) = self.payload.first() {
                dbg.field(
                    "x_header",
                    &format_args!("0x{header:02X} [{}]", xbus_name(header)),
                );
            }
        }
        dbg.field("payload", &format_args!("{}", HexBytes(&self.payload)))
            .finish()
    }
}

pub(crate) struct HexBytes<'a>(pub(crate) &'a [u8]);

impl fmt::Display for HexBytes<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, byte) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

/// Encode an envelope into the wire format.
///
/// Wire format:
/// ```text
/// ┌──────────────┬──────────┬─────────────────────┐
/// │ Length       │ Kind     │ Payload             │
/// │ (2B LE)      │ (2B LE)  │ (Length - 4 bytes)  │
/// │ incl. header │          │                     │
/// └──────────────┴──────────┴─────────────────────┘
/// ```
pub fn encode_envelope(kind: u16, payload: &[u8], dst: &mut BytesMut) -> Result<()> {
    if payload.len() > MAX_PAYLOAD {
        return Err(FrameError::PayloadTooLarge {
            size: payload.len(),
            max: MAX_PAYLOAD,
        });
    }
    dst.reserve(HEADER_SIZE + payload.len());
    dst.put_u16_le((HEADER_SIZE + payload.len()) as u16);
    dst.put_u16_le(kind);
    dst.put_slice(payload);
    Ok(())
}

/// Decode one envelope from the front of `src`.
///
/// Returns the envelope and the number of bytes it occupied. Bytes after the
/// declared length are left for the caller; they usually hold the next
/// envelope of a batched datagram.
pub fn decode_envelope(src: &[u8]) -> Result<(Envelope, usize)> {
    if src.len() < HEADER_SIZE {
        return Err(FrameError::Truncated {
            needed: HEADER_SIZE,
            available: src.len(),
        });
    }

    let declared = u16::from_le_bytes([src[0], src[1]]) as usize;
    let kind = u16::from_le_bytes([src[2], src[3]]);

    if declared > src.len() {
        return Err(FrameError::Truncated {
            needed: declared,
            available: src.len(),
        });
    }

    // A declared length below the header still occupies the header itself.
    let consumed = declared.max(HEADER_SIZE);
    let payload = Bytes::copy_from_slice(&src[HEADER_SIZE..consumed]);

    Ok((Envelope { kind, payload }, consumed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kind::{LAN_GET_SERIAL_NUMBER, LAN_SYSTEMSTATE_DATACHANGED};

    #[test]
    fn test_encode_empty_payload() {
        let bytes = Envelope::empty(LAN_GET_SERIAL_NUMBER).to_bytes().unwrap();
        assert_eq!(bytes.as_ref(), b"\x04\x00\x10\x00");
    }

    #[test]
    fn test_encode_with_payload() {
        let bytes = Envelope::new(LAN_X, &b"\x21\x81\xa0"[..]).to_bytes().unwrap();
        assert_eq!(&bytes[..2], b"\x07\x00");
        assert_eq!(&bytes[2..4], b"\x40\x00");
        assert_eq!(&bytes[4..], b"\x21\x81\xa0");
    }

    #[test]
    fn test_encode_decode_roundtrip() {
        let payload = b"\x01\x02\x03\x04\x05\x06\x07\x08";
        let mut buf = BytesMut::new();
        encode_envelope(LAN_SYSTEMSTATE_DATACHANGED, payload, &mut buf).unwrap();

        let (envelope, consumed) = decode_envelope(&buf).unwrap();
        assert_eq!(consumed, HEADER_SIZE + payload.len());
        assert_eq!(envelope.kind, LAN_SYSTEMSTATE_DATACHANGED);
        assert_eq!(envelope.payload.as_ref(), payload);
    }

    #[test]
    fn test_roundtrip_extreme_kinds_and_sizes() {
        for kind in [0u16, 1, 0x40, 0x8000, u16::MAX] {
            for len in [0usize, 1, 255, 1024] {
                let payload: Vec<u8> = (0..len).map(|i| i as u8).collect();
                let wire = Envelope::new(kind, payload.clone()).to_bytes().unwrap();
                let (envelope, consumed) = decode_envelope(&wire).unwrap();
                assert_eq!(envelope.kind, kind);
                assert_eq!(envelope.payload.as_ref(), payload.as_slice());
                assert_eq!(consumed, wire.len());
            }
        }
    }

    #[test]
    fn test_decode_too_short() {
        let err = decode_envelope(b"\x04\x00").unwrap_err();
        assert_eq!(
            err,
            FrameError::Truncated {
                needed: 4,
                available: 2
            }
        );
    }

    #[test]
    fn test_decode_declared_length_exceeds_buffer() {
        let err = decode_envelope(b"\x08\x00\x10\x00\x01").unwrap_err();
        assert!(matches!(err, FrameError::Truncated { needed: 8, .. }));
    }

    #[test]
    fn test_decode_honors_declared_length() {
        let wire = b"\x05\x00\x10\x00\xaa\x04\x00\x30\x00";
        let (envelope, consumed) = decode_envelope(wire).unwrap();
        assert_eq!(consumed, 5);
        assert_eq!(envelope.payload.as_ref(), b"\xaa");
    }

    #[test]
    fn test_decode_declared_length_below_header() {
        let (envelope, consumed) = decode_envelope(b"\x00\x00\x10\x00\xff").unwrap();
        assert_eq!(consumed, HEADER_SIZE);
        assert!(envelope.payload.is_empty());
    }

    #[test]
    fn test_payload_too_large() {
        let mut buf = BytesMut::new();
        let payload = vec![0u8; MAX_PAYLOAD + 1];
        let err = encode_envelope(LAN_X, &payload, &mut buf).unwrap_err();
        assert!(matches!(err, FrameError::PayloadTooLarge { .. }));
        assert!(buf.is_empty());
    }

    #[test]
    fn test_route_kind_unwraps_xbus() {
        let envelope = Envelope::new(LAN_X, &b"\x61\x01\x60"[..]);
        assert_eq!(envelope.route_kind().unwrap(), MessageKind::XBus(0x61));

        let plain = Envelope::empty(LAN_GET_SERIAL_NUMBER);
        assert_eq!(
            plain.route_kind().unwrap(),
            MessageKind::Lan(LAN_GET_SERIAL_NUMBER)
        );
    }

    #[test]
    fn test_route_kind_rejects_bad_checksum() {
        let envelope = Envelope::new(LAN_X, &b"\x61\x01\x00"[..]);
        assert!(matches!(
            envelope.route_kind(),
            Err(FrameError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn test_xbus_view_requires_lan_x() {
        let err = Envelope::empty(LAN_GET_SERIAL_NUMBER).xbus().unwrap_err();
        assert!(matches!(err, FrameError::UnexpectedKind { .. }));
    }

    #[test]
    fn test_debug_names_kinds() {
        let rendered = format!("{:?}", Envelope::new(LAN_X, &b"\x61\x01\x60"[..]));
        assert!(rendered.contains("LAN_X"));
        assert!(rendered.contains("BC_TRACK_POWER"));
        assert!(rendered.contains("61 01 60"));
    }

    #[test]
    fn test_wire_size() {
        let envelope = Envelope::new(LAN_X, Bytes::from_static(b"test"));
        assert_eq!(envelope.wire_size(), HEADER_SIZE + 4);
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(proptest::test_runner::Config::with_cases(512))]

            #[test]
            fn prop_envelope_roundtrip(
                kind in any::<u16>(),
                payload in proptest::collection::vec(any::<u8>(), 0usize..=1024)
            ) {
                let wire = Envelope::new(kind, payload.clone()).to_bytes().unwrap();
                prop_assert_eq!(wire.len(), HEADER_SIZE + payload.len());

                let (envelope, consumed) = decode_envelope(&wire).unwrap();
                prop_assert_eq!(envelope.kind, kind);
                prop_assert_eq!(envelope.payload.as_ref(), payload.as_slice());
                prop_assert_eq!(consumed, wire.len());
            }

            #[test]
            fn prop_arbitrary_bytes_never_panic(
                data in proptest::collection::vec(any::<u8>(), 0usize..2048)
            ) {
                if let Ok((envelope, consumed)) = decode_envelope(&data) {
                    prop_assert!(consumed >= HEADER_SIZE);
                    prop_assert!(consumed <= data.len());
                    prop_assert_eq!(HEADER_SIZE + envelope.payload.len(), consumed);
                }
            }

            #[test]
            fn prop_short_buffer_is_truncated(
                data in proptest::collection::vec(any::<u8>(), 0usize..HEADER_SIZE)
            ) {
                let is_truncated = matches!(
                    decode_envelope(&data),
                    Err(FrameError::Truncated { .. })
                );
                prop_assert!(is_truncated);
            }
        }
    }
}
