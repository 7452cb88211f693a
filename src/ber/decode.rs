//! BER decoding.
//!
//! Zero-copy decoding over `Bytes`. Every slice is bounds-checked so the
//! decoder can face adversarial input without panicking; a fuzz-style
//! property test drives this (see `tests/proptest.rs`).

use super::length::decode_length;
use super::tag;
use crate::error::{DecodeErrorKind, Error, Result};
use crate::oid::Oid;
use bytes::Bytes;

/// BER decoder reading from a byte buffer.
pub struct Decoder {
    data: Bytes,
    offset: usize,
}

impl Decoder {
    /// Create a decoder over the given bytes.
    pub fn new(data: Bytes) -> Self {
        Self { data, offset: 0 }
    }

    /// Create a decoder from a slice (copies the data).
    pub fn from_slice(data: &[u8]) -> Self {
        Self::new(Bytes::copy_from_slice(data))
    }

    /// Current read offset.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Remaining unread bytes.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.offset
    }

    /// Check if all input has been consumed.
    pub fn is_empty(&self) -> bool {
        self.offset >= self.data.len()
    }

    /// Peek at the next byte without consuming it.
    pub fn peek_byte(&self) -> Option<u8> {
        self.data.get(self.offset).copied()
    }

    /// Read a single byte.
    pub fn read_byte(&mut self) -> Result<u8> {
        match self.data.get(self.offset) {
            Some(&byte) => {
                self.offset += 1;
                Ok(byte)
            }
            None => Err(Error::decode(self.offset, DecodeErrorKind::TruncatedData)),
        }
    }

    /// Read a tag byte.
    pub fn read_tag(&mut self) -> Result<u8> {
        self.read_byte()
    }

    /// Read a length header.
    pub fn read_length(&mut self) -> Result<usize> {
        let (len, consumed) = decode_length(&self.data[self.offset..], self.offset)?;
        self.offset += consumed;
        if len > self.remaining() {
            return Err(Error::decode(self.offset, DecodeErrorKind::TlvOverflow));
        }
        Ok(len)
    }

    /// Read `len` raw bytes without copying.
    pub fn read_bytes(&mut self, len: usize) -> Result<Bytes> {
        // saturating_add so a hostile length cannot wrap past the check
        if self.offset.saturating_add(len) > self.data.len() {
            return Err(Error::decode(self.offset, DecodeErrorKind::TruncatedData));
        }
        let bytes = self.data.slice(self.offset..self.offset + len);
        self.offset += len;
        Ok(bytes)
    }

    /// Read and expect a specific tag, returning the content length.
    pub fn expect_tag(&mut self, expected: u8) -> Result<usize> {
        let actual = self.read_tag()?;
        if actual != expected {
            return Err(Error::decode(
                self.offset - 1,
                DecodeErrorKind::UnexpectedTag { expected, actual },
            ));
        }
        self.read_length()
    }

    /// Read an INTEGER TLV as i32.
    pub fn read_integer(&mut self) -> Result<i32> {
        let len = self.expect_tag(tag::universal::INTEGER)?;
        self.read_integer_value(len)
    }

    /// Read an i32 integer value whose length header was already consumed.
    ///
    /// Non-minimal encodings are accepted; values longer than four
    /// significant bytes are truncated with a warning, matching net-snmp.
    pub fn read_integer_value(&mut self, len: usize) -> Result<i32> {
        if len == 0 {
            return Err(Error::decode(
                self.offset,
                DecodeErrorKind::ZeroLengthInteger,
            ));
        }
        if len > 4 {
            tracing::warn!(
                target: "snmpkit::ber",
                offset = self.offset,
                length = len,
                "integer too long, truncating to 4 bytes"
            );
        }

        let bytes = self.read_bytes(len)?;
        let mut value: i32 = if bytes[0] & 0x80 != 0 { -1 } else { 0 };
        for &byte in bytes.iter().take(4) {
            value = (value << 8) | (byte as i32);
        }
        Ok(value)
    }

    /// Read an i64 integer value whose length header was already consumed.
    pub fn read_integer64_value(&mut self, len: usize) -> Result<i64> {
        if len == 0 {
            return Err(Error::decode(
                self.offset,
                DecodeErrorKind::ZeroLengthInteger,
            ));
        }
        if len > 9 {
            return Err(Error::decode(
                self.offset,
                DecodeErrorKind::Integer64TooLong { length: len },
            ));
        }

        let bytes = self.read_bytes(len)?;
        let mut value: i64 = if bytes[0] & 0x80 != 0 { -1 } else { 0 };
        for &byte in bytes.iter().take(8) {
            value = (value << 8) | (byte as i64);
        }
        Ok(value)
    }

    /// Read an unsigned 64-bit value (Counter64) with a specific tag.
    pub fn read_unsigned64(&mut self, expected_tag: u8) -> Result<u64> {
        let len = self.expect_tag(expected_tag)?;
        self.read_unsigned64_value(len)
    }

    /// Read a u64 value whose length header was already consumed.
    pub fn read_unsigned64_value(&mut self, len: usize) -> Result<u64> {
        if len == 0 {
            return Err(Error::decode(
                self.offset,
                DecodeErrorKind::ZeroLengthInteger,
            ));
        }
        // 9 bytes max: one leading zero plus eight value bytes
        if len > 9 {
            return Err(Error::decode(
                self.offset,
                DecodeErrorKind::Integer64TooLong { length: len },
            ));
        }

        let bytes = self.read_bytes(len)?;
        if len == 9 && bytes[0] != 0 {
            return Err(Error::decode(self.offset, DecodeErrorKind::IntegerOverflow));
        }
        let mut value: u64 = 0;
        for &byte in bytes.iter() {
            value = (value << 8) | (byte as u64);
        }
        Ok(value)
    }

    /// Read an unsigned 32-bit value with a specific tag.
    pub fn read_unsigned32(&mut self, expected_tag: u8) -> Result<u32> {
        let len = self.expect_tag(expected_tag)?;
        self.read_unsigned32_value(len)
    }

    /// Read a u32 value whose length header was already consumed.
    ///
    /// Values longer than five bytes are truncated with a warning,
    /// matching net-snmp's counter overflow handling.
    pub fn read_unsigned32_value(&mut self, len: usize) -> Result<u32> {
        if len == 0 {
            return Err(Error::decode(
                self.offset,
                DecodeErrorKind::ZeroLengthInteger,
            ));
        }
        if len > 5 {
            tracing::warn!(
                target: "snmpkit::ber",
                offset = self.offset,
                length = len,
                "unsigned integer too long, truncating to 4 bytes"
            );
        }

        let bytes = self.read_bytes(len)?;
        let mut value: u32 = 0;
        for &byte in bytes.iter().take(5) {
            value = (value << 8) | (byte as u32);
        }
        Ok(value)
    }

    /// Read an OCTET STRING.
    pub fn read_octet_string(&mut self) -> Result<Bytes> {
        let len = self.expect_tag(tag::universal::OCTET_STRING)?;
        self.read_bytes(len)
    }

    /// Read a NULL.
    pub fn read_null(&mut self) -> Result<()> {
        let len = self.expect_tag(tag::universal::NULL)?;
        if len != 0 {
            return Err(Error::decode(self.offset, DecodeErrorKind::InvalidNull));
        }
        Ok(())
    }

    /// Read an OBJECT IDENTIFIER.
    pub fn read_oid(&mut self) -> Result<Oid> {
        let len = self.expect_tag(tag::universal::OBJECT_IDENTIFIER)?;
        self.read_oid_value(len)
    }

    /// Read an OID value whose length header was already consumed.
    pub fn read_oid_value(&mut self, len: usize) -> Result<Oid> {
        let bytes = self.read_bytes(len)?;
        Oid::from_ber(&bytes)
    }

    /// Read a SEQUENCE, returning a sub-decoder over its content.
    pub fn read_sequence(&mut self) -> Result<Decoder> {
        self.read_constructed(tag::universal::SEQUENCE)
    }

    /// Read a constructed type with a specific tag, returning a
    /// sub-decoder over its content.
    pub fn read_constructed(&mut self, expected_tag: u8) -> Result<Decoder> {
        let len = self.expect_tag(expected_tag)?;
        let content = self.read_bytes(len)?;
        Ok(Decoder {
            data: content,
            offset: 0,
        })
    }

    /// Read an IpAddress (APPLICATION 0, four bytes).
    pub fn read_ip_address(&mut self) -> Result<[u8; 4]> {
        let len = self.expect_tag(tag::application::IP_ADDRESS)?;
        if len != 4 {
            return Err(Error::decode(
                self.offset,
                DecodeErrorKind::InvalidIpAddressLength { length: len },
            ));
        }
        let bytes = self.read_bytes(4)?;
        Ok([bytes[0], bytes[1], bytes[2], bytes[3]])
    }

    /// Skip a full TLV without interpreting it.
    pub fn skip_tlv(&mut self) -> Result<()> {
        let _tag = self.read_tag()?;
        let len = self.read_length()?;
        let new_offset = self.offset.saturating_add(len);
        if new_offset > self.data.len() {
            return Err(Error::decode(self.offset, DecodeErrorKind::TlvOverflow));
        }
        self.offset = new_offset;
        Ok(())
    }

    /// Create a sub-decoder over the next `len` bytes.
    pub fn sub_decoder(&mut self, len: usize) -> Result<Decoder> {
        let content = self.read_bytes(len)?;
        Ok(Decoder {
            data: content,
            offset: 0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_integer() {
        let mut dec = Decoder::from_slice(&[0x02, 0x01, 0x00]);
        assert_eq!(dec.read_integer().unwrap(), 0);

        let mut dec = Decoder::from_slice(&[0x02, 0x01, 0x7F]);
        assert_eq!(dec.read_integer().unwrap(), 127);

        let mut dec = Decoder::from_slice(&[0x02, 0x02, 0x00, 0x80]);
        assert_eq!(dec.read_integer().unwrap(), 128);

        let mut dec = Decoder::from_slice(&[0x02, 0x01, 0xFF]);
        assert_eq!(dec.read_integer().unwrap(), -1);

        let mut dec = Decoder::from_slice(&[0x02, 0x01, 0x80]);
        assert_eq!(dec.read_integer().unwrap(), -128);
    }

    #[test]
    fn test_accept_non_minimal_integer() {
        // Permissive parsing per X.690, matching net-snmp
        let mut dec = Decoder::from_slice(&[0x02, 0x02, 0x00, 0x01]);
        assert_eq!(dec.read_integer().unwrap(), 1);

        let mut dec = Decoder::from_slice(&[0x02, 0x03, 0x00, 0x00, 0x80]);
        assert_eq!(dec.read_integer().unwrap(), 128);

        let mut dec = Decoder::from_slice(&[0x02, 0x02, 0xFF, 0xFF]);
        assert_eq!(dec.read_integer().unwrap(), -1);
    }

    #[test]
    fn test_integer_overflow_truncation() {
        // Oversize integers truncate to the first 4 bytes (net-snmp behavior)
        let mut dec = Decoder::from_slice(&[0x02, 0x05, 0x01, 0x02, 0x03, 0x04, 0x05]);
        assert_eq!(dec.read_integer().unwrap(), 0x01020304);
    }

    #[test]
    fn test_decode_null() {
        let mut dec = Decoder::from_slice(&[0x05, 0x00]);
        dec.read_null().unwrap();

        let mut dec = Decoder::from_slice(&[0x05, 0x01, 0x00]);
        assert!(dec.read_null().is_err());
    }

    #[test]
    fn test_decode_octet_string() {
        let mut dec = Decoder::from_slice(&[0x04, 0x05, b'h', b'e', b'l', b'l', b'o']);
        assert_eq!(&dec.read_octet_string().unwrap()[..], b"hello");
    }

    #[test]
    fn test_decode_oid() {
        let mut dec = Decoder::from_slice(&[0x06, 0x03, 0x2B, 0x06, 0x01]);
        assert_eq!(dec.read_oid().unwrap().arcs(), &[1, 3, 6, 1]);
    }

    #[test]
    fn test_decode_sequence() {
        let mut dec = Decoder::from_slice(&[0x30, 0x06, 0x02, 0x01, 0x01, 0x02, 0x01, 0x02]);
        let mut seq = dec.read_sequence().unwrap();
        assert_eq!(seq.read_integer().unwrap(), 1);
        assert_eq!(seq.read_integer().unwrap(), 2);
        assert!(seq.is_empty());
    }

    #[test]
    fn test_read_bytes_rejects_oversized_length() {
        let mut dec = Decoder::from_slice(&[0x01, 0x02, 0x03]);
        assert!(dec.read_bytes(100).is_err());
    }

    #[test]
    fn test_length_capped_to_remaining() {
        // Tag claims 256 content bytes, buffer has 3
        let mut dec = Decoder::from_slice(&[0x04, 0x82, 0x01, 0x00, 0xAA, 0xBB, 0xCC]);
        let err = dec.read_octet_string().unwrap_err();
        assert!(matches!(
            err,
            Error::Decode {
                kind: DecodeErrorKind::TlvOverflow,
                ..
            }
        ));
    }

    #[test]
    fn test_skip_tlv() {
        let mut dec = Decoder::from_slice(&[0x02, 0x01, 0x2A, 0x05, 0x00]);
        dec.skip_tlv().unwrap();
        dec.read_null().unwrap();
    }

    #[test]
    fn test_unsigned64() {
        let mut dec = Decoder::from_slice(&[0x46, 0x01, 0x2A]);
        assert_eq!(dec.read_unsigned64(0x46).unwrap(), 42);

        // Full-width value with leading zero pad
        let mut dec = Decoder::from_slice(&[
            0x46, 0x09, 0x00, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF,
        ]);
        assert_eq!(dec.read_unsigned64(0x46).unwrap(), u64::MAX);

        // Nine significant bytes overflow u64
        let mut dec = Decoder::from_slice(&[
            0x46, 0x09, 0x01, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF,
        ]);
        assert!(dec.read_unsigned64(0x46).is_err());
    }

    #[test]
    fn test_unexpected_tag_reports_both() {
        let mut dec = Decoder::from_slice(&[0x04, 0x00]);
        let err = dec.read_integer().unwrap_err();
        assert!(matches!(
            err,
            Error::Decode {
                kind: DecodeErrorKind::UnexpectedTag {
                    expected: 0x02,
                    actual: 0x04
                },
                ..
            }
        ));
    }
}
