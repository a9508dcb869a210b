use crate::codec::{decode_envelope, Envelope};
use crate::error::Result;

/// Iterator over the envelopes batched into one datagram.
///
/// Yields envelopes in wire order. After the first decode error the
/// iterator yields that error once and then ends: framing corruption cannot
/// be resynchronized within a datagram.
#[derive(Debug, Clone)]
pub struct Envelopes<'a> {
    buf: &'a [u8],
    offset: usize,
    failed: bool,
}

/// Split a received datagram into envelopes.
pub fn envelopes(buf: &[u8]) -> Envelopes<'_> {
    Envelopes {
        buf,
        offset: 0,
        failed: false,
    }
}

impl Envelopes<'_> {
    /// Byte offset of the next envelope.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Bytes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.offset
    }
}

impl Iterator for Envelopes<'_> {
    type Item = Result<Envelope>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.offset >= self.buf.len() {
            return None;
        }
        match decode_envelope(&self.buf[self.offset..]) {
            Ok((envelope, consumed)) => {
                self.offset += consumed;
                Some(Ok(envelope))
            }
            Err(err) => {
                self.failed = true;
                Some(Err(err))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use bytes::BytesMut;

    use super::*;
    use crate::codec::encode_envelope;
    use crate::error::FrameError;

    #[test]
    fn splits_batched_envelopes() {
        let mut wire = BytesMut::new();
        encode_envelope(0x10, &[0x01, 0x02, 0x03, 0x04], &mut wire).unwrap();
        encode_envelope(0x40, &[0x61, 0x01, 0x60], &mut wire).unwrap();
        encode_envelope(0x30, &[], &mut wire).unwrap();

        let kinds: Vec<u16> = envelopes(&wire).map(|e| e.unwrap().kind).collect();
        assert_eq!(kinds, vec![0x10, 0x40, 0x30]);
    }

    #[test]
    fn empty_datagram_yields_nothing() {
        assert_eq!(envelopes(&[]).count(), 0);
    }

    #[test]
    fn corruption_abandons_remainder() {
        let mut wire = BytesMut::new();
        encode_envelope(0x10, &[0xAA], &mut wire).unwrap();
        // Declares 0x20 bytes but only a few follow.
        wire.extend_from_slice(&[0x20, 0x00, 0x40, 0x00, 0x61]);

        let mut iter = envelopes(&wire);
        assert_eq!(iter.next().unwrap().unwrap().kind, 0x10);
        assert_eq!(iter.offset(), 5);
        assert!(matches!(
            iter.next(),
            Some(Err(FrameError::Truncated { needed: 0x20, .. }))
        ));
        assert!(iter.next().is_none());
        assert_eq!(iter.remaining(), 5);
    }

    #[test]
    fn trailing_fragment_is_an_error() {
        let mut wire = BytesMut::new();
        encode_envelope(0x10, &[], &mut wire).unwrap();
        wire.extend_from_slice(&[0x04, 0x00]);

        let results: Vec<_> = envelopes(&wire).collect();
        assert_eq!(results.len(), 2);
        assert!(results[1].is_err());
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn prop_arbitrary_datagram_never_panics(
                data in proptest::collection::vec(any::<u8>(), 0usize..1024)
            ) {
                let mut iter = envelopes(&data);
                let mut errors = 0;
                for item in iter.by_ref() {
                    if item.is_err() {
                        errors += 1;
                    }
                }
                prop_assert!(errors <= 1);
                prop_assert!(iter.offset() <= data.len());
            }
        }
    }
}
